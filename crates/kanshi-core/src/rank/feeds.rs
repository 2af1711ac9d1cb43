/// A known Douban subject collection.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RankFeed {
    /// Config value and cache key.
    pub value: &'static str,
    pub title: &'static str,
    pub referer: &'static str,
    query: &'static str,
}

/// The feed with its own minimum year and cache duration.
pub const DISTINGUISHED_FEED: &str = "movie_top250";

const API_BASE: &str = "https://m.douban.com/rexxar/api/v2/subject_collection";

/// Every supported collection, in refresh order.
pub const CATALOGUE: &[RankFeed] = &[
    RankFeed {
        value: "movie_top250",
        title: "Douban Top 250",
        referer: "https://m.douban.com/subject_collection/movie_top250",
        query: "start=0&count=250&items_only=1&for_mobile=1",
    },
    RankFeed {
        value: "subject_real_time_hotest",
        title: "Real-time trending",
        referer: "https://m.douban.com/subject_collection/subject_real_time_hotest",
        query: "type=subject&start=0&count=20&items_only=1&for_mobile=1",
    },
    RankFeed {
        value: "movie_weekly_best",
        title: "Weekly best movies",
        referer: "https://m.douban.com/subject_collection/movie_weekly_best",
        query: "start=0&count=20&items_only=1&for_mobile=1",
    },
    RankFeed {
        value: "tv_chinese_best_weekly",
        title: "Weekly best Chinese series",
        referer: "https://m.douban.com/subject_collection/tv_chinese_best_weekly",
        query: "start=0&count=20&items_only=1&for_mobile=1",
    },
    RankFeed {
        value: "tv_global_best_weekly",
        title: "Weekly best global series",
        referer: "https://m.douban.com/subject_collection/tv_global_best_weekly",
        query: "start=0&count=20&items_only=1&for_mobile=1",
    },
    RankFeed {
        value: "show_chinese_best_weekly",
        title: "Weekly best Chinese shows",
        referer: "https://m.douban.com/subject_collection/show_chinese_best_weekly",
        query: "start=0&count=20&items_only=1&for_mobile=1",
    },
    RankFeed {
        value: "show_global_best_weekly",
        title: "Weekly best global shows",
        referer: "https://m.douban.com/subject_collection/show_global_best_weekly",
        query: "start=0&count=20&items_only=1&for_mobile=1",
    },
    RankFeed {
        value: "tv_animation",
        title: "Recent popular animation",
        referer: "https://m.douban.com/subject_collection/tv_animation",
        query: "start=0&count=20&items_only=1&for_mobile=1",
    },
    RankFeed {
        value: "movie_showing",
        title: "Now in cinemas",
        referer: "https://m.douban.com/app_topic/movie_showing",
        query: "start=0&count=20&items_only=1&for_mobile=1",
    },
    RankFeed {
        value: "movie_hot_gaia",
        title: "Douban trending",
        referer: "https://m.douban.com/app_topic/movie_hot_gaia",
        query: "start=0&count=20&items_only=1&for_mobile=1",
    },
];

impl RankFeed {
    pub fn is_distinguished(&self) -> bool {
        self.value == DISTINGUISHED_FEED
    }

    /// Full API address of the collection items.
    pub fn address(&self) -> String {
        format!("{API_BASE}/{}/items?{}", self.value, self.query)
    }
}

/// Look up a collection by its config value.
pub fn find(value: &str) -> Option<&'static RankFeed> {
    CATALOGUE.iter().find(|f| f.value == value)
}

/// Resolve configured rank names to feeds, in catalogue order.
pub fn resolve(selected: &[String]) -> Vec<&'static RankFeed> {
    for name in selected {
        if find(name).is_none() {
            tracing::warn!(rank = %name, "Unknown rank feed, ignoring");
        }
    }
    CATALOGUE
        .iter()
        .filter(|f| selected.iter().any(|s| s == f.value))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_resolve_uses_catalogue_order() {
        let selected = vec![
            "tv_animation".to_string(),
            "nonexistent".to_string(),
            "movie_top250".to_string(),
        ];
        let feeds = resolve(&selected);
        let values: Vec<&str> = feeds.iter().map(|f| f.value).collect();
        assert_eq!(values, vec!["movie_top250", "tv_animation"]);
    }

    #[test]
    fn test_addresses() {
        let top = find("movie_top250").unwrap();
        assert!(top.is_distinguished());
        assert!(top.address().contains("count=250"));
        assert_eq!(
            top.referer,
            "https://m.douban.com/subject_collection/movie_top250"
        );

        let showing = find("movie_showing").unwrap();
        assert!(!showing.is_distinguished());
        assert_eq!(showing.referer, "https://m.douban.com/app_topic/movie_showing");
        assert!(showing
            .address()
            .starts_with("https://m.douban.com/rexxar/api/v2/subject_collection/movie_showing/items?"));
    }
}

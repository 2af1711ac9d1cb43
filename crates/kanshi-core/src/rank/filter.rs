use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::KanshiError;
use crate::models::{MediaType, RankEntry, Region};
use crate::rank::subtitle;

/// Minimum rating per (region, media type). Zero accepts everything.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct RateThresholds {
    pub domestic_movie: f64,
    pub japan_movie: f64,
    pub other_movie: f64,
    pub domestic_tv: f64,
    pub japan_tv: f64,
    pub other_tv: f64,
}

impl RateThresholds {
    pub fn get(&self, region: Region, media_type: MediaType) -> f64 {
        match (region, media_type) {
            (Region::Domestic, MediaType::Movie) => self.domestic_movie,
            (Region::Japan, MediaType::Movie) => self.japan_movie,
            (Region::Other, MediaType::Movie) => self.other_movie,
            (Region::Domestic, MediaType::Tv) => self.domestic_tv,
            (Region::Japan, MediaType::Tv) => self.japan_tv,
            (Region::Other, MediaType::Tv) => self.other_tv,
        }
    }
}

/// A custom rule: entries carrying every listed genre pass at `threshold`.
#[derive(Debug, Clone, PartialEq)]
pub struct GenreRateRule {
    pub genres: Vec<String>,
    pub threshold: f64,
}

impl FromStr for GenreRateRule {
    type Err = KanshiError;

    /// Parse `genre1,genre2:7.5`.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let invalid = |reason: &str| KanshiError::Config(format!("genre rule {s:?}: {reason}"));
        let mut parts = s.split(':');
        let (Some(genres), Some(threshold), None) = (parts.next(), parts.next(), parts.next())
        else {
            return Err(invalid("expected exactly one ':'"));
        };
        let threshold = threshold
            .trim()
            .parse()
            .map_err(|_| invalid("threshold is not a number"))?;
        Ok(Self {
            genres: genres.split(',').map(str::to_string).collect(),
            threshold,
        })
    }
}

impl std::fmt::Display for GenreRateRule {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}:{}", self.genres.join(","), self.threshold)
    }
}

/// Everything [`should_subscribe`] needs, resolved from config.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FilterConfig {
    pub thresholds: RateThresholds,
    pub min_year: i32,
    /// Minimum year for the distinguished (Top 250) feed.
    pub min_year_distinguished: i32,
    pub min_vote_count: u64,
    pub blacklist: Vec<String>,
    pub genre_rules: Vec<GenreRateRule>,
}

/// Decide whether a feed entry should be subscribed.
pub fn should_subscribe(entry: &RankEntry, cfg: &FilterConfig, is_distinguished: bool) -> bool {
    let min_year = if is_distinguished {
        cfg.min_year_distinguished
    } else {
        cfg.min_year
    };
    if entry.year < min_year || entry.vote_count < cfg.min_vote_count {
        return false;
    }

    if entry.genres.iter().any(|g| cfg.blacklist.contains(g)) {
        return false;
    }

    region_pass(entry, &cfg.thresholds) || genre_rule_pass(entry, &cfg.genre_rules)
}

/// Rating meets the threshold for the entry's region and type.
pub fn region_pass(entry: &RankEntry, thresholds: &RateThresholds) -> bool {
    let region = subtitle::region(&entry.subtitle);
    entry.rating >= thresholds.get(region, entry.media_type)
}

/// The first rule whose genres all match and whose threshold is met passes.
///
/// A rule whose genres match but whose threshold fails does not stop the
/// search; later rules are still tried.
pub fn genre_rule_pass(entry: &RankEntry, rules: &[GenreRateRule]) -> bool {
    rules.iter().any(|rule| {
        rule.genres.iter().all(|g| entry.genres.contains(g)) && entry.rating >= rule.threshold
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn entry(subtitle: &str, rating: f64) -> RankEntry {
        let (genres_text, genres) = subtitle::extract_genres(subtitle);
        RankEntry {
            title: "Test".into(),
            douban_id: "1".into(),
            media_type: MediaType::Movie,
            year: subtitle::extract_year(subtitle).unwrap(),
            rating,
            vote_count: 10_000,
            genres,
            genres_text,
            subtitle: subtitle.into(),
        }
    }

    fn config() -> FilterConfig {
        FilterConfig {
            thresholds: RateThresholds {
                domestic_movie: 8.0,
                japan_movie: 7.5,
                other_movie: 8.5,
                domestic_tv: 8.0,
                japan_tv: 7.5,
                other_tv: 8.5,
            },
            min_year: 2020,
            min_year_distinguished: 1990,
            min_vote_count: 5000,
            blacklist: vec!["纪录片".into()],
            genre_rules: Vec::new(),
        }
    }

    fn rule(s: &str) -> GenreRateRule {
        s.parse().unwrap()
    }

    #[test]
    fn test_year_and_vote_count_reject_regardless_of_rating() {
        let cfg = config();
        let old = entry("2019 / 美国 / 剧情 / 导演", 9.9);
        assert!(!should_subscribe(&old, &cfg, false));

        let mut few_votes = entry("2022 / 美国 / 剧情 / 导演", 9.9);
        few_votes.vote_count = 4999;
        assert!(!should_subscribe(&few_votes, &cfg, false));
    }

    #[test]
    fn test_distinguished_feed_uses_its_own_min_year() {
        let cfg = config();
        let classic = entry("1994 / 美国 / 犯罪 剧情 / 导演", 9.7);
        assert!(!should_subscribe(&classic, &cfg, false));
        assert!(should_subscribe(&classic, &cfg, true));
    }

    #[test]
    fn test_blacklist_overrides_rating() {
        let mut cfg = config();
        cfg.genre_rules = vec![rule("纪录片:1.0")];
        let doc = entry("2022 / 美国 / 纪录片 历史 / 导演", 9.9);
        assert!(!should_subscribe(&doc, &cfg, false));
    }

    #[test]
    fn test_region_thresholds() {
        let cfg = config();
        assert!(should_subscribe(&entry("2022 / 中国大陆 / 剧情 / 导演", 8.0), &cfg, false));
        assert!(!should_subscribe(&entry("2022 / 中国大陆 / 剧情 / 导演", 7.9), &cfg, false));
        assert!(should_subscribe(&entry("2022 / 日本 / 动画 / 导演", 7.5), &cfg, false));
        assert!(!should_subscribe(&entry("2022 / 美国 / 剧情 / 导演", 8.4), &cfg, false));

        let mut tv = entry("2022 / 日本 / 动画 / 导演", 7.4);
        tv.media_type = MediaType::Tv;
        assert!(!should_subscribe(&tv, &cfg, false));
    }

    #[test]
    fn test_genre_rule_pass() {
        let rules = vec![rule("科幻,恐怖:7.0")];
        let passing = entry("2022 / 美国 / 科幻 恐怖 剧情 / 导演", 7.5);
        assert!(genre_rule_pass(&passing, &rules));

        let failing = entry("2022 / 美国 / 科幻 恐怖 剧情 / 导演", 6.9);
        assert!(!genre_rule_pass(&failing, &rules));

        let partial = entry("2022 / 美国 / 科幻 剧情 / 导演", 9.0);
        assert!(!genre_rule_pass(&partial, &rules));
    }

    #[test]
    fn test_genre_rule_rating_miss_falls_through() {
        let rules = vec![rule("科幻:8.0"), rule("科幻,恐怖:7.0")];
        let e = entry("2022 / 美国 / 科幻 恐怖 / 导演", 7.2);
        assert!(genre_rule_pass(&e, &rules));
    }

    #[test]
    fn test_genre_rule_rescues_region_miss() {
        let mut cfg = config();
        cfg.genre_rules = vec![rule("动画:6.0")];
        let e = entry("2022 / 美国 / 动画 / 导演", 6.5);
        assert!(!region_pass(&e, &cfg.thresholds));
        assert!(should_subscribe(&e, &cfg, false));
    }

    #[test]
    fn test_rule_parse() {
        let r = rule("科幻,恐怖:7.5");
        assert_eq!(r.genres, vec!["科幻", "恐怖"]);
        assert_eq!(r.threshold, 7.5);
        assert_eq!(r.to_string(), "科幻,恐怖:7.5");
        assert!("科幻".parse::<GenreRateRule>().is_err());
        assert!("科幻:7:8".parse::<GenreRateRule>().is_err());
        assert!("科幻:high".parse::<GenreRateRule>().is_err());
    }
}

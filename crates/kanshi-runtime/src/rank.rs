use serde::Serialize;
use tracing::{debug, info, warn};

use kanshi_api::traits::{MediaChain, RankFeedSource, RecognizeRequest};
use kanshi_core::config::RankConfig;
use kanshi_core::models::RankEntry;
use kanshi_core::rank::cache::{ttl_for, unix_now};
use kanshi_core::rank::feeds::{self, RankFeed};
use kanshi_core::rank::history::{self, now_label, TIP_TITLE_MISMATCH};
use kanshi_core::rank::{parse_feed_item, should_subscribe, CachedFeed, FilterConfig, HistoryRecord};

use crate::db::DbHandle;
use crate::RuntimeError;

/// Counters for one refresh run.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct RefreshReport {
    pub feeds: usize,
    pub items: usize,
    pub accepted: usize,
    pub subscribed: usize,
    pub mismatched: usize,
    /// The run started from an empty history.
    pub cleared: bool,
}

/// Periodic ranking-feed subscriber.
pub struct RankSubscriber<F, C> {
    source: F,
    chain: C,
    db: DbHandle,
}

impl<F: RankFeedSource, C: MediaChain> RankSubscriber<F, C> {
    pub fn new(source: F, chain: C, db: DbHandle) -> Self {
        Self { source, chain, db }
    }

    /// Raw items of a feed, from cache while fresh. A failed fetch yields
    /// nothing for this run.
    pub async fn load_feed(&self, feed: &RankFeed, cfg: &RankConfig) -> Vec<serde_json::Value> {
        let now = unix_now();
        let ttl = ttl_for(feed, cfg.cache_minutes, cfg.cache_minutes_top250);

        match self.db.cached_feed(feed.value).await {
            Ok(Some(cached)) if cached.is_fresh(now, ttl) => {
                debug!(feed = feed.value, "using cached feed");
                return cached.data;
            }
            Ok(_) => info!(feed = feed.value, "feed cache expired, fetching"),
            Err(e) => warn!(feed = feed.value, "failed to read feed cache: {e}"),
        }

        match self.source.fetch_items(feed).await {
            Ok(items) => {
                let cached = CachedFeed::new(items.clone(), now);
                if let Err(e) = self.db.save_cached_feed(feed.value, cached).await {
                    warn!(feed = feed.value, "failed to cache feed: {e}");
                }
                items
            }
            Err(e) => {
                warn!(feed = feed.value, "failed to fetch feed: {e}");
                Vec::new()
            }
        }
    }

    /// Entries of one feed that pass the filter. Unparsable items are logged
    /// and skipped.
    async fn accepted_entries(
        &self,
        feed: &RankFeed,
        cfg: &RankConfig,
        filter: &FilterConfig,
    ) -> (usize, Vec<RankEntry>) {
        let items = self.load_feed(feed, cfg).await;
        let total = items.len();
        let accepted = items
            .iter()
            .filter_map(|raw| match parse_feed_item(raw) {
                Ok(entry) => Some(entry),
                Err(e) => {
                    warn!(feed = feed.value, item = %raw, "skipping feed item: {e}");
                    None
                }
            })
            .filter(|entry| should_subscribe(entry, filter, feed.is_distinguished()))
            .collect();
        (total, accepted)
    }

    /// Accepted entries per configured feed, without subscribing.
    pub async fn preview(
        &self,
        cfg: &RankConfig,
    ) -> Result<Vec<(&'static RankFeed, Vec<RankEntry>)>, RuntimeError> {
        let filter = cfg
            .filter_config()
            .map_err(|e| RuntimeError::Config(e.to_string()))?;
        let mut out = Vec::new();
        for feed in feeds::resolve(&cfg.ranks) {
            let (_, accepted) = self.accepted_entries(feed, cfg, &filter).await;
            out.push((feed, accepted));
        }
        Ok(out)
    }

    /// Run the full pipeline over every configured feed and persist history.
    pub async fn refresh(&self, cfg: &RankConfig) -> Result<RefreshReport, RuntimeError> {
        let filter = cfg
            .filter_config()
            .map_err(|e| RuntimeError::Config(e.to_string()))?;

        let mut report = RefreshReport {
            cleared: cfg.clear_history,
            ..Default::default()
        };
        let mut records = if cfg.clear_history {
            info!("starting from an empty history");
            Vec::new()
        } else {
            self.db
                .history()
                .await
                .map_err(|e| RuntimeError::Database(e.to_string()))?
                .unwrap_or_default()
        };

        for feed in feeds::resolve(&cfg.ranks) {
            report.feeds += 1;
            let (total, accepted) = self.accepted_entries(feed, cfg, &filter).await;
            info!(feed = feed.value, total, accepted = accepted.len(), "feed loaded");
            report.items += total;
            report.accepted += accepted.len();

            for entry in accepted {
                if let Some(record) = self.process_entry(&entry, &records).await {
                    if record.tip.is_empty() {
                        report.subscribed += 1;
                    } else {
                        report.mismatched += 1;
                    }
                    records.push(record);
                }
            }
        }

        self.db
            .save_history(records)
            .await
            .map_err(|e| RuntimeError::Database(e.to_string()))?;
        info!(?report, "rank refresh finished");
        Ok(report)
    }

    /// Recognize and subscribe one accepted entry. Returns the history record
    /// to keep, or `None` when the entry should be retried on a later run.
    async fn process_entry(
        &self,
        entry: &RankEntry,
        seen: &[HistoryRecord],
    ) -> Option<HistoryRecord> {
        let key = history::unique_key(&entry.title, &entry.douban_id);
        if history::contains(seen, &key) {
            return None;
        }
        info!(
            title = %entry.title,
            genres = %entry.genres_text,
            rating = entry.rating,
            "https://movie.douban.com/subject/{}",
            entry.douban_id
        );

        let request = RecognizeRequest {
            title: entry.title.clone(),
            year: Some(entry.year),
            media_type: entry.media_type,
            douban_id: Some(entry.douban_id.clone()).filter(|id| !id.is_empty()),
        };
        let info = match self.chain.recognize(&request).await {
            Ok(Some(info)) => info,
            Ok(None) => {
                warn!(title = %entry.title, douban_id = %entry.douban_id, "not recognized");
                return None;
            }
            Err(e) => {
                warn!(title = %entry.title, "recognition failed: {e}");
                return None;
            }
        };

        let tip = if entry.title.contains(&info.title) {
            String::new()
        } else {
            warn!(feed_title = %entry.title, recognized = %info.title, "recognized title differs");
            TIP_TITLE_MISMATCH.to_string()
        };

        match self.chain.exists_in_library(&info).await {
            Ok(true) => {
                info!(title = %info.title_year(), "already in library");
                return None;
            }
            Ok(false) => {}
            Err(e) => {
                warn!(title = %info.title_year(), "library lookup failed: {e}");
                return None;
            }
        }
        match self.chain.subscription_exists(&info).await {
            Ok(true) => {
                info!(title = %info.title_year(), "already subscribed");
                return None;
            }
            Ok(false) => {}
            Err(e) => {
                warn!(title = %info.title_year(), "subscription lookup failed: {e}");
                return None;
            }
        }

        if tip.is_empty() {
            if let Err(e) = self.chain.add_subscription(&info).await {
                warn!(title = %info.title_year(), "failed to add subscription: {e}");
                return None;
            }
        }

        Some(HistoryRecord {
            title: entry.title.clone(),
            rate: entry.rating,
            count: entry.vote_count,
            kind: entry.media_type.to_string(),
            genres: entry.genres_text.clone(),
            year: info.year.clone(),
            poster: info.poster.clone(),
            overview: info.overview.clone(),
            tmdbid: info.tmdb_id,
            doubanid: entry.douban_id.clone(),
            time: now_label(),
            tip,
            unique: key,
        })
    }
}

/// Response of the history endpoint.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ApiResponse {
    pub success: bool,
    pub message: String,
}

impl ApiResponse {
    pub fn ok(message: impl Into<String>) -> Self {
        Self {
            success: true,
            message: message.into(),
        }
    }

    pub fn fail(message: impl Into<String>) -> Self {
        Self {
            success: false,
            message: message.into(),
        }
    }
}

/// Remove history records by key, authorized by the configured API token.
/// An empty configured token rejects every request.
pub async fn delete_history(db: &DbHandle, key: &str, apikey: &str, token: &str) -> ApiResponse {
    if token.is_empty() || apikey != token {
        return ApiResponse::fail("invalid API token");
    }
    let mut records = match db.history().await {
        Ok(Some(records)) if !records.is_empty() => records,
        Ok(_) => return ApiResponse::fail("no history found"),
        Err(e) => {
            warn!("failed to load history: {e}");
            return ApiResponse::fail("no history found");
        }
    };

    let removed = history::delete_history_entry(&mut records, key);
    if let Err(e) = db.save_history(records).await {
        warn!("failed to save history: {e}");
        return ApiResponse::fail(format!("failed to save history: {e}"));
    }
    info!(key, removed, "history entry deleted");
    ApiResponse::ok("deleted")
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::{Arc, Mutex};

    use kanshi_api::traits::MediaInfo;
    use kanshi_core::config::AppConfig;
    use serde_json::json;

    #[derive(Debug, thiserror::Error)]
    #[error("mock failure")]
    struct MockError;

    #[derive(Default)]
    struct MockFeed {
        items: Vec<serde_json::Value>,
        fail: bool,
        fetches: AtomicUsize,
    }

    impl RankFeedSource for MockFeed {
        type Error = MockError;

        async fn fetch_items(&self, _feed: &RankFeed) -> Result<Vec<serde_json::Value>, MockError> {
            self.fetches.fetch_add(1, Ordering::SeqCst);
            if self.fail {
                Err(MockError)
            } else {
                Ok(self.items.clone())
            }
        }
    }

    #[derive(Default)]
    struct MockChain {
        in_library: Vec<String>,
        renamed: Vec<(String, String)>,
        unknown: Vec<String>,
        added: Mutex<Vec<String>>,
    }

    impl MediaChain for MockChain {
        type Error = MockError;

        async fn recognize(&self, req: &RecognizeRequest) -> Result<Option<MediaInfo>, MockError> {
            if self.unknown.contains(&req.title) {
                return Ok(None);
            }
            let title = self
                .renamed
                .iter()
                .find(|(from, _)| *from == req.title)
                .map(|(_, to)| to.clone())
                .unwrap_or_else(|| req.title.clone());
            Ok(Some(MediaInfo {
                title,
                year: req.year.map(|y| y.to_string()),
                media_type: req.media_type,
                tmdb_id: Some(1),
                douban_id: req.douban_id.clone(),
                poster: None,
                overview: None,
                season: None,
            }))
        }

        async fn exists_in_library(&self, info: &MediaInfo) -> Result<bool, MockError> {
            Ok(self.in_library.contains(&info.title))
        }

        async fn subscription_exists(&self, info: &MediaInfo) -> Result<bool, MockError> {
            Ok(self.added.lock().unwrap().contains(&info.title))
        }

        async fn add_subscription(&self, info: &MediaInfo) -> Result<(), MockError> {
            self.added.lock().unwrap().push(info.title.clone());
            Ok(())
        }
    }

    fn item(id: &str, title: &str, rating: f64) -> serde_json::Value {
        json!({
            "id": id,
            "title": title,
            "type": "movie",
            "card_subtitle": "2023 / 美国 / 科幻 冒险 / 导演 / 演员",
            "rating": { "value": rating, "count": 80000 }
        })
    }

    fn rank_config() -> RankConfig {
        let mut cfg = AppConfig::default().rank;
        cfg.ranks = vec!["movie_weekly_best".into()];
        cfg.min_year = 2020;
        cfg.min_vote_count = 1000;
        cfg.thresholds.other_movie = 7.0;
        cfg
    }

    fn subscriber(feed: MockFeed, chain: MockChain) -> RankSubscriber<MockFeed, MockChain> {
        RankSubscriber::new(feed, chain, DbHandle::open_memory().unwrap())
    }

    #[tokio::test]
    async fn test_refresh_pipeline() {
        let feed = MockFeed {
            items: vec![
                item("1", "奥本海默", 8.8),
                item("2", "低分片", 5.0),
                item("3", "库中已有", 8.0),
                item("4", "沙丘2", 8.3),
                item("5", "无法识别", 8.0),
                json!({ "id": "6", "title": "坏数据" }),
            ],
            ..Default::default()
        };
        let chain = MockChain {
            in_library: vec!["库中已有".into()],
            renamed: vec![("沙丘2".into(), "Dune: Part Two".into())],
            unknown: vec!["无法识别".into()],
            ..Default::default()
        };
        let sub = subscriber(feed, chain);

        let report = sub.refresh(&rank_config()).await.unwrap();
        assert_eq!(report.feeds, 1);
        assert_eq!(report.items, 6);
        assert_eq!(report.accepted, 4);
        assert_eq!(report.subscribed, 1);
        assert_eq!(report.mismatched, 1);
        assert_eq!(*sub.chain.added.lock().unwrap(), vec!["奥本海默".to_string()]);

        let history = sub.db.history().await.unwrap().unwrap();
        assert_eq!(history.len(), 2);
        assert_eq!(history[0].unique, "doubanrank: 奥本海默 (DB:1)");
        assert_eq!(history[0].tip, "");
        assert_eq!(history[1].tip, TIP_TITLE_MISMATCH);
    }

    #[tokio::test]
    async fn test_history_dedup_and_cache() {
        let feed = MockFeed {
            items: vec![item("1", "奥本海默", 8.8)],
            ..Default::default()
        };
        let sub = subscriber(feed, MockChain::default());
        let cfg = rank_config();

        sub.refresh(&cfg).await.unwrap();
        let second = sub.refresh(&cfg).await.unwrap();
        assert_eq!(second.subscribed, 0);
        assert_eq!(sub.source.fetches.load(Ordering::SeqCst), 1);
        assert_eq!(sub.chain.added.lock().unwrap().len(), 1);
        assert_eq!(sub.db.history().await.unwrap().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_clear_history_reprocesses() {
        let feed = MockFeed {
            items: vec![item("1", "奥本海默", 8.8)],
            ..Default::default()
        };
        let sub = subscriber(feed, MockChain::default());
        let mut cfg = rank_config();
        sub.refresh(&cfg).await.unwrap();

        // Subscription already exists, so nothing is re-recorded.
        cfg.clear_history = true;
        let report = sub.refresh(&cfg).await.unwrap();
        assert!(report.cleared);
        assert!(sub.db.history().await.unwrap().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_fetch_failure_yields_no_data() {
        let feed = MockFeed {
            fail: true,
            ..Default::default()
        };
        let sub = subscriber(feed, MockChain::default());
        let report = sub.refresh(&rank_config()).await.unwrap();
        assert_eq!(report.items, 0);
        assert!(sub.db.cached_feed("movie_weekly_best").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_preview_does_not_subscribe() {
        let feed = MockFeed {
            items: vec![item("1", "奥本海默", 8.8), item("2", "低分片", 5.0)],
            ..Default::default()
        };
        let sub = subscriber(feed, MockChain::default());
        let preview = sub.preview(&rank_config()).await.unwrap();
        assert_eq!(preview.len(), 1);
        assert_eq!(preview[0].1.len(), 1);
        assert!(sub.chain.added.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_delete_history_responses() {
        let db = DbHandle::open_memory().unwrap();
        assert_eq!(
            delete_history(&db, "k", "wrong", "secret").await,
            ApiResponse::fail("invalid API token")
        );
        assert_eq!(
            delete_history(&db, "k", "secret", "secret").await,
            ApiResponse::fail("no history found")
        );

        let sub = RankSubscriber::new(
            MockFeed {
                items: vec![item("1", "奥本海默", 8.8)],
                ..Default::default()
            },
            MockChain::default(),
            db.clone(),
        );
        sub.refresh(&rank_config()).await.unwrap();

        let key = "doubanrank: 奥本海默 (DB:1)";
        assert_eq!(
            delete_history(&db, key, "secret", "secret").await,
            ApiResponse::ok("deleted")
        );
        assert!(db.history().await.unwrap().unwrap().is_empty());
    }
}

use serde::{Deserialize, Serialize};

use crate::rank::feeds::RankFeed;

/// Raw feed items cached under the feed key, with the unix time of the fetch.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CachedFeed {
    pub data: Vec<serde_json::Value>,
    pub timestamp: f64,
}

impl CachedFeed {
    pub fn new(data: Vec<serde_json::Value>, now: f64) -> Self {
        Self { data, timestamp: now }
    }

    /// Still usable at `now` given a TTL in seconds.
    pub fn is_fresh(&self, now: f64, ttl_secs: u64) -> bool {
        now - self.timestamp <= ttl_secs as f64
    }
}

/// Cache TTL in seconds for a feed.
pub fn ttl_for(feed: &RankFeed, minutes: u64, minutes_distinguished: u64) -> u64 {
    if feed.is_distinguished() {
        minutes_distinguished * 60
    } else {
        minutes * 60
    }
}

/// Current unix time in fractional seconds.
pub fn unix_now() -> f64 {
    chrono::Utc::now().timestamp_millis() as f64 / 1000.0
}

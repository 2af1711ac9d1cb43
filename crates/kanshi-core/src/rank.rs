pub mod cache;
pub mod feeds;
pub mod filter;
pub mod history;
pub mod subtitle;

pub use cache::CachedFeed;
pub use feeds::RankFeed;
pub use filter::{should_subscribe, FilterConfig, GenreRateRule, RateThresholds};
pub use history::{delete_history_entry, unique_key, HistoryRecord, HISTORY_KEY};
pub use subtitle::parse_feed_item;

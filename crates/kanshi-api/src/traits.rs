//! Service seams.
//!
//! Media servers, downloaders, the rank feed and the notification channel are
//! reached through these traits so the runtime pipelines stay backend-agnostic
//! and can be driven by mocks in tests. The media chain (recognition, library
//! lookups, subscriptions) belongs to the hosting application.

use std::future::Future;

use kanshi_core::limiter::DownloaderKind;
use kanshi_core::models::{MediaType, PlaybackSession};
use kanshi_core::rank::RankFeed;

/// Source of raw ranking feed items.
pub trait RankFeedSource: Send + Sync {
    type Error: std::error::Error + Send + Sync + 'static;

    /// Fetch the raw `subject_collection_items` of a feed.
    fn fetch_items(
        &self,
        feed: &RankFeed,
    ) -> impl Future<Output = Result<Vec<serde_json::Value>, Self::Error>> + Send;
}

/// A media server that can report its playback sessions.
pub trait MediaServer: Send + Sync {
    type Error: std::error::Error + Send + Sync + 'static;

    /// Configured name, as referenced by webhook events.
    fn name(&self) -> &str;

    /// Active sessions, normalized. Sessions with nothing playing are omitted.
    fn sessions(&self) -> impl Future<Output = Result<Vec<PlaybackSession>, Self::Error>> + Send;

    /// Web link that opens an item on this server.
    fn play_url(
        &self,
        item_id: &str,
    ) -> impl Future<Output = Result<Option<String>, Self::Error>> + Send;
}

/// A downloader whose global speed limits can be set.
pub trait Downloader: Send + Sync {
    type Error: std::error::Error + Send + Sync + 'static;

    fn name(&self) -> &str;

    fn kind(&self) -> DownloaderKind;

    /// Apply limits in KiB/s, already encoded for this downloader kind
    /// (see [`DownloaderKind::encode_limit`]).
    fn set_speed_limit(
        &self,
        upload: i64,
        download: i64,
    ) -> impl Future<Output = Result<(), Self::Error>> + Send;
}

/// Outgoing notification channel.
pub trait Notifier: Send + Sync {
    type Error: std::error::Error + Send + Sync + 'static;

    fn post(
        &self,
        title: &str,
        body: &str,
        link: Option<&str>,
    ) -> impl Future<Output = Result<(), Self::Error>> + Send;
}

/// What the rank subscriber asks the host to recognize.
#[derive(Debug, Clone, PartialEq)]
pub struct RecognizeRequest {
    pub title: String,
    pub year: Option<i32>,
    pub media_type: MediaType,
    pub douban_id: Option<String>,
}

/// Host-side media metadata for a recognized title.
#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct MediaInfo {
    pub title: String,
    pub year: Option<String>,
    pub media_type: MediaType,
    pub tmdb_id: Option<u64>,
    pub douban_id: Option<String>,
    pub poster: Option<String>,
    pub overview: Option<String>,
    /// First season parsed from the request title, for series.
    pub season: Option<u32>,
}

impl MediaInfo {
    /// `Title (Year)`, or just the title when the year is unknown.
    pub fn title_year(&self) -> String {
        match &self.year {
            Some(year) => format!("{} ({year})", self.title),
            None => self.title.clone(),
        }
    }
}

/// Recognition, library and subscription services of the host.
pub trait MediaChain: Send + Sync {
    type Error: std::error::Error + Send + Sync + 'static;

    fn recognize(
        &self,
        request: &RecognizeRequest,
    ) -> impl Future<Output = Result<Option<MediaInfo>, Self::Error>> + Send;

    fn exists_in_library(
        &self,
        info: &MediaInfo,
    ) -> impl Future<Output = Result<bool, Self::Error>> + Send;

    fn subscription_exists(
        &self,
        info: &MediaInfo,
    ) -> impl Future<Output = Result<bool, Self::Error>> + Send;

    fn add_subscription(
        &self,
        info: &MediaInfo,
    ) -> impl Future<Output = Result<(), Self::Error>> + Send;
}

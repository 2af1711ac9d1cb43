use serde::{Deserialize, Serialize};

/// Media type as reported by the ranking feed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MediaType {
    Movie,
    Tv,
}

impl MediaType {
    /// Feed items use `"tv"` for series; everything else is treated as a movie.
    pub fn from_feed(value: &str) -> Self {
        if value == "tv" {
            Self::Tv
        } else {
            Self::Movie
        }
    }
}

impl std::fmt::Display for MediaType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Movie => write!(f, "Movie"),
            Self::Tv => write!(f, "TV"),
        }
    }
}

/// Production region, derived from the feed subtitle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Region {
    Domestic,
    Japan,
    Other,
}

/// A single ranked title from a feed, ready for filtering.
#[derive(Debug, Clone, PartialEq)]
pub struct RankEntry {
    pub title: String,
    pub douban_id: String,
    pub media_type: MediaType,
    pub year: i32,
    pub rating: f64,
    pub vote_count: u64,
    pub genres: Vec<String>,
    /// Raw genre segment of the subtitle, as shown in history.
    pub genres_text: String,
    /// Raw `card_subtitle` text.
    pub subtitle: String,
}

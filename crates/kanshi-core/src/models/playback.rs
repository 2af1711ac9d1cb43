use serde::{Deserialize, Serialize};

/// Supported media-server backends.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ServerKind {
    Emby,
    Jellyfin,
    Plex,
}

impl std::fmt::Display for ServerKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Emby => write!(f, "Emby"),
            Self::Jellyfin => write!(f, "Jellyfin"),
            Self::Plex => write!(f, "Plex"),
        }
    }
}

/// What kind of media a session is streaming. Only video counts toward limits.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum MediaKind {
    Video,
    Audio,
    #[default]
    Other,
}

/// A backend-agnostic playback session.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlaybackSession {
    pub server: ServerKind,
    pub user: String,
    pub remote_address: String,
    pub path: Option<String>,
    /// Bits per second.
    pub bitrate: u64,
    pub paused: bool,
    pub kind: MediaKind,
    /// Display title, e.g. `Show S1E2 Name` or `Movie (2020)`.
    pub title: String,
    pub item_id: Option<String>,
}

/// Summary of a playing session for notification text.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlayingItem {
    pub user: String,
    pub title: String,
    pub bitrate: u64,
}

impl PlayingItem {
    pub fn from_session(session: &PlaybackSession) -> Self {
        Self {
            user: session.user.clone(),
            title: session.title.clone(),
            bitrate: session.bitrate,
        }
    }
}

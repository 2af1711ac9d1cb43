//! Session payloads of the supported media servers, and their normalization
//! into [`PlaybackSession`].

use serde::Deserialize;

use crate::models::{MediaKind, PlaybackSession, ServerKind};

/// One `/Sessions` element from Emby or Jellyfin.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct EmbySession {
    #[serde(default)]
    pub user_name: Option<String>,
    #[serde(default)]
    pub remote_end_point: Option<String>,
    #[serde(default)]
    pub now_playing_item: Option<EmbyItem>,
    #[serde(default)]
    pub play_state: Option<EmbyPlayState>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct EmbyItem {
    #[serde(default)]
    pub id: Option<String>,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub series_name: Option<String>,
    #[serde(default)]
    pub parent_index_number: Option<u32>,
    #[serde(default)]
    pub index_number: Option<u32>,
    #[serde(default)]
    pub production_year: Option<u32>,
    #[serde(default)]
    pub media_type: Option<String>,
    #[serde(default)]
    pub path: Option<String>,
    /// Emby reports a single container bitrate.
    #[serde(default)]
    pub bitrate: Option<u64>,
    /// Jellyfin reports per-stream bitrates.
    #[serde(default)]
    pub media_streams: Option<Vec<EmbyMediaStream>>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct EmbyMediaStream {
    #[serde(default)]
    pub bit_rate: Option<u64>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct EmbyPlayState {
    #[serde(default)]
    pub is_paused: bool,
}

/// `/status/sessions` response from Plex.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct PlexSessions {
    #[serde(rename = "MediaContainer", default)]
    pub media_container: PlexContainer,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct PlexContainer {
    #[serde(rename = "Metadata", default)]
    pub metadata: Vec<PlexSession>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PlexSession {
    #[serde(rename = "type", default)]
    pub kind: String,
    #[serde(default)]
    pub rating_key: Option<String>,
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub grandparent_title: Option<String>,
    #[serde(default)]
    pub parent_index: Option<u32>,
    #[serde(default)]
    pub index: Option<u32>,
    #[serde(default)]
    pub year: Option<u32>,
    #[serde(rename = "Media", default)]
    pub media: Vec<PlexMedia>,
    #[serde(rename = "Player", default)]
    pub player: PlexPlayer,
    #[serde(rename = "User", default)]
    pub user: Option<PlexUser>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct PlexMedia {
    /// Kilobits per second.
    #[serde(default)]
    pub bitrate: Option<u64>,
    #[serde(rename = "Part", default)]
    pub parts: Vec<PlexPart>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct PlexPart {
    #[serde(default)]
    pub file: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct PlexPlayer {
    #[serde(default)]
    pub address: String,
    #[serde(default)]
    pub state: String,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct PlexUser {
    #[serde(default)]
    pub title: String,
}

/// A raw session from any backend.
#[derive(Debug, Clone)]
pub enum SessionRecord {
    Emby(EmbySession),
    Jellyfin(EmbySession),
    Plex(PlexSession),
}

impl SessionRecord {
    /// Normalize into a [`PlaybackSession`]. Sessions with nothing playing
    /// yield `None`.
    pub fn normalize(&self) -> Option<PlaybackSession> {
        match self {
            Self::Emby(s) => normalize_emby(s, ServerKind::Emby),
            Self::Jellyfin(s) => normalize_emby(s, ServerKind::Jellyfin),
            Self::Plex(s) => Some(normalize_plex(s)),
        }
    }
}

fn episode_title(series: &str, season: Option<u32>, episode: Option<u32>, name: &str) -> String {
    format!(
        "{series} S{}E{} {name}",
        season.unwrap_or(0),
        episode.unwrap_or(0)
    )
}

fn normalize_emby(session: &EmbySession, server: ServerKind) -> Option<PlaybackSession> {
    let item = session.now_playing_item.as_ref()?;
    let name = item.name.clone().unwrap_or_default();
    let kind = match item.media_type.as_deref() {
        Some("Video") => MediaKind::Video,
        Some("Audio") => MediaKind::Audio,
        _ => MediaKind::Other,
    };
    let bitrate = match server {
        ServerKind::Jellyfin => item
            .media_streams
            .iter()
            .flatten()
            .filter_map(|s| s.bit_rate)
            .sum(),
        _ => item.bitrate.unwrap_or(0),
    };
    let title = match item.series_name.as_deref().filter(|s| !s.is_empty()) {
        Some(series) => episode_title(
            series,
            item.parent_index_number,
            item.index_number,
            &name,
        ),
        None => format!("{name} ({})", item.production_year.unwrap_or(0)),
    };

    Some(PlaybackSession {
        server,
        user: session.user_name.clone().unwrap_or_default(),
        remote_address: session.remote_end_point.clone().unwrap_or_default(),
        path: item.path.clone(),
        bitrate,
        paused: session.play_state.as_ref().is_some_and(|p| p.is_paused),
        kind,
        title,
        item_id: item.id.clone(),
    })
}

fn normalize_plex(session: &PlexSession) -> PlaybackSession {
    let kind = match session.kind.as_str() {
        "movie" | "episode" | "clip" => MediaKind::Video,
        "track" => MediaKind::Audio,
        _ => MediaKind::Other,
    };
    let kbps: u64 = session.media.iter().filter_map(|m| m.bitrate).sum();
    let title = match session.grandparent_title.as_deref() {
        Some(show) if session.kind == "episode" => {
            episode_title(show, session.parent_index, session.index, &session.title)
        }
        _ => format!("{} ({})", session.title, session.year.unwrap_or(0)),
    };

    PlaybackSession {
        server: ServerKind::Plex,
        user: session.user.as_ref().map(|u| u.title.clone()).unwrap_or_default(),
        remote_address: session.player.address.clone(),
        path: session
            .media
            .iter()
            .flat_map(|m| &m.parts)
            .find_map(|p| p.file.clone()),
        bitrate: kbps * 1000,
        paused: session.player.state == "paused",
        kind,
        title,
        item_id: session.rating_key.clone(),
    }
}

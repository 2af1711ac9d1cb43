//! Config-driven dispatch over the concrete backends.

use kanshi_core::config::{DownloaderConfig, MediaServerConfig};
use kanshi_core::limiter::DownloaderKind;
use kanshi_core::models::{PlaybackSession, ServerKind};

use crate::emby::EmbyClient;
use crate::error::ApiError;
use crate::plex::PlexClient;
use crate::qbittorrent::QbittorrentClient;
use crate::traits::{Downloader, MediaServer};
use crate::transmission::TransmissionClient;

/// Any supported media server.
pub enum MediaServerClient {
    Emby(EmbyClient),
    Plex(PlexClient),
}

impl MediaServerClient {
    pub fn from_config(cfg: &MediaServerConfig) -> Result<Self, ApiError> {
        let name = cfg.name.clone();
        let key = cfg.api_key.clone();
        Ok(match cfg.kind {
            ServerKind::Emby => Self::Emby(EmbyClient::emby(name, &cfg.host, key)?),
            ServerKind::Jellyfin => Self::Emby(EmbyClient::jellyfin(name, &cfg.host, key)?),
            ServerKind::Plex => Self::Plex(PlexClient::new(name, &cfg.host, key)?),
        })
    }
}

impl MediaServer for MediaServerClient {
    type Error = ApiError;

    fn name(&self) -> &str {
        match self {
            Self::Emby(c) => c.name(),
            Self::Plex(c) => c.name(),
        }
    }

    async fn sessions(&self) -> Result<Vec<PlaybackSession>, ApiError> {
        match self {
            Self::Emby(c) => c.sessions().await,
            Self::Plex(c) => c.sessions().await,
        }
    }

    async fn play_url(&self, item_id: &str) -> Result<Option<String>, ApiError> {
        match self {
            Self::Emby(c) => c.play_url(item_id).await,
            Self::Plex(c) => c.play_url(item_id).await,
        }
    }
}

/// Any supported downloader.
pub enum DownloaderClient {
    Qbittorrent(QbittorrentClient),
    Transmission(TransmissionClient),
}

impl DownloaderClient {
    pub fn from_config(cfg: &DownloaderConfig) -> Result<Self, ApiError> {
        let name = cfg.name.clone();
        let user = cfg.username.clone();
        let pass = cfg.password.clone();
        Ok(match cfg.kind {
            DownloaderKind::Qbittorrent => {
                Self::Qbittorrent(QbittorrentClient::new(name, &cfg.host, user, pass)?)
            }
            DownloaderKind::Transmission => {
                Self::Transmission(TransmissionClient::new(name, &cfg.host, user, pass)?)
            }
        })
    }
}

impl Downloader for DownloaderClient {
    type Error = ApiError;

    fn name(&self) -> &str {
        match self {
            Self::Qbittorrent(c) => c.name(),
            Self::Transmission(c) => c.name(),
        }
    }

    fn kind(&self) -> DownloaderKind {
        match self {
            Self::Qbittorrent(c) => c.kind(),
            Self::Transmission(c) => c.kind(),
        }
    }

    async fn set_speed_limit(&self, upload: i64, download: i64) -> Result<(), ApiError> {
        match self {
            Self::Qbittorrent(c) => c.set_speed_limit(upload, download).await,
            Self::Transmission(c) => c.set_speed_limit(upload, download).await,
        }
    }
}

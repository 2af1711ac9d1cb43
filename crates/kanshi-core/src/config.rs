use std::path::{Path, PathBuf};

use directories::ProjectDirs;
use serde::{Deserialize, Serialize};

use crate::error::KanshiError;
use crate::limiter::{AllowList, DownloaderKind, PathRules};
use crate::models::ServerKind;
use crate::rank::{FilterConfig, GenreRateRule, RateThresholds};

const DEFAULT_CONFIG: &str = include_str!("../../../config/default.toml");

/// Top-level application configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    #[serde(default)]
    pub media_servers: Vec<MediaServerConfig>,
    #[serde(default)]
    pub downloader_clients: Vec<DownloaderConfig>,
    pub general: GeneralConfig,
    pub rank: RankConfig,
    pub limiter: LimiterConfig,
    pub notify: NotifyConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GeneralConfig {
    /// Credential required by the history endpoint.
    pub api_token: String,
    /// Address of the HTTP surface.
    pub listen: String,
    /// Directory for rolling log files; console only when unset.
    pub log_dir: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RankConfig {
    pub enabled: bool,
    /// Crontab expression in local time, or a daily `HH:MM`.
    pub schedule: String,
    pub proxy: Option<String>,
    /// Collection values from the feed catalogue.
    pub ranks: Vec<String>,
    pub min_year: i32,
    pub min_year_top250: i32,
    pub min_vote_count: u64,
    pub blacklist: Vec<String>,
    /// Rules in `genre1,genre2:rating` form.
    pub genre_rate: Vec<String>,
    pub cache_minutes: u64,
    pub cache_minutes_top250: u64,
    /// Start the next refresh from an empty history, once.
    pub clear_history: bool,
    pub thresholds: RateThresholds,
}

impl RankConfig {
    /// Resolve filter settings, parsing the genre rules.
    pub fn filter_config(&self) -> Result<FilterConfig, KanshiError> {
        let genre_rules = self
            .genre_rate
            .iter()
            .filter(|r| !r.trim().is_empty())
            .map(|r| r.parse::<GenreRateRule>())
            .collect::<Result<Vec<_>, _>>()?;
        Ok(FilterConfig {
            thresholds: self.thresholds,
            min_year: self.min_year,
            min_year_distinguished: self.min_year_top250,
            min_vote_count: self.min_vote_count,
            blacklist: self.blacklist.clone(),
            genre_rules,
        })
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LimiterConfig {
    pub enabled: bool,
    /// Polling interval in seconds.
    pub interval: u64,
    pub notify: bool,
    /// Seconds to wait for further playback events before notifying.
    pub notify_delay: u64,
    /// Static caps in KiB/s; 0 means unlimited.
    pub play_up_speed: f64,
    pub play_down_speed: f64,
    pub noplay_up_speed: f64,
    pub noplay_down_speed: f64,
    /// Total bandwidth in Mbps. Either one non-zero enables auto mode.
    pub bandwidth_up: f64,
    pub bandwidth_down: f64,
    pub allocation_ratio_up: String,
    pub allocation_ratio_down: String,
    /// Comma-separated CIDR blocks never limited.
    pub unlimited_ipv4: String,
    pub unlimited_ipv6: String,
    /// Newline-separated path fragments.
    pub include_path_up: String,
    pub include_path_down: String,
    /// Downloader names from `downloader_clients`, in allocation order.
    pub downloaders: Vec<String>,
}

impl LimiterConfig {
    /// Upload bandwidth in bits per second (whole Mbps).
    pub fn bandwidth_up_bits(&self) -> u64 {
        mbps_to_bits(self.bandwidth_up)
    }

    pub fn bandwidth_down_bits(&self) -> u64 {
        mbps_to_bits(self.bandwidth_down)
    }

    pub fn auto_mode(&self) -> bool {
        self.bandwidth_up_bits() > 0 || self.bandwidth_down_bits() > 0
    }

    /// Nothing to enforce when neither static play caps nor auto mode are set.
    pub fn limit_enabled(&self) -> bool {
        self.play_up_speed > 0.0 || self.play_down_speed > 0.0 || self.auto_mode()
    }

    pub fn path_rules(&self) -> PathRules {
        PathRules::parse(&self.include_path_up, &self.include_path_down)
    }

    pub fn allow_list(&self) -> AllowList {
        AllowList::parse(&self.unlimited_ipv4, &self.unlimited_ipv6)
    }
}

fn mbps_to_bits(mbps: f64) -> u64 {
    if mbps.is_finite() && mbps > 0.0 {
        (mbps.trunc() as u64).saturating_mul(1_000_000)
    } else {
        0
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct NotifyConfig {
    /// Endpoint receiving `{title, text, link}` JSON; log only when unset.
    pub webhook_url: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MediaServerConfig {
    pub name: String,
    pub kind: ServerKind,
    pub host: String,
    /// API key (Emby/Jellyfin) or X-Plex-Token.
    pub api_key: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DownloaderConfig {
    pub name: String,
    pub kind: DownloaderKind,
    pub host: String,
    #[serde(default)]
    pub username: String,
    #[serde(default)]
    pub password: String,
}

impl AppConfig {
    /// Load config: user file (if exists) merged over built-in defaults.
    pub fn load() -> Result<Self, KanshiError> {
        Self::load_from(&Self::config_path())
    }

    /// Load from an explicit path; a missing file yields the defaults.
    pub fn load_from(path: &Path) -> Result<Self, KanshiError> {
        if path.exists() {
            let user_str = std::fs::read_to_string(path)?;
            Self::from_toml(&user_str)
        } else {
            Self::from_toml("")
        }
    }

    /// Parse a (possibly partial) user config over the defaults.
    pub fn from_toml(user: &str) -> Result<Self, KanshiError> {
        let mut merged: toml::Table =
            toml::from_str(DEFAULT_CONFIG).map_err(|e| KanshiError::Config(e.to_string()))?;
        let user: toml::Table =
            toml::from_str(user).map_err(|e| KanshiError::Config(e.to_string()))?;
        merge_tables(&mut merged, user);
        toml::Value::Table(merged)
            .try_into()
            .map_err(|e: toml::de::Error| KanshiError::Config(e.to_string()))
    }

    /// Save current config to the user config file.
    pub fn save(&self) -> Result<(), KanshiError> {
        self.save_to(&Self::config_path())
    }

    pub fn save_to(&self, path: &Path) -> Result<(), KanshiError> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let content =
            toml::to_string_pretty(self).map_err(|e| KanshiError::Config(e.to_string()))?;
        std::fs::write(path, content)?;
        Ok(())
    }

    /// Path to user config file (XDG on Linux, AppData on Windows).
    pub fn config_path() -> PathBuf {
        Self::project_dirs()
            .map(|d| d.config_dir().join("config.toml"))
            .unwrap_or_else(|| PathBuf::from("config.toml"))
    }

    /// Path to the database file.
    pub fn db_path() -> PathBuf {
        Self::project_dirs()
            .map(|d| d.data_dir().join("kanshi.db"))
            .unwrap_or_else(|| PathBuf::from("kanshi.db"))
    }

    /// Ensure the data directory exists and return the DB path.
    pub fn ensure_db_path() -> Result<PathBuf, KanshiError> {
        let path = Self::db_path();
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        Ok(path)
    }

    pub fn downloader(&self, name: &str) -> Option<&DownloaderConfig> {
        self.downloader_clients.iter().find(|d| d.name == name)
    }

    fn project_dirs() -> Option<ProjectDirs> {
        ProjectDirs::from("", "", "kanshi")
    }
}

/// Recursively overlay `overlay` onto `base`. Arrays are replaced wholesale.
fn merge_tables(base: &mut toml::Table, overlay: toml::Table) {
    for (key, value) in overlay {
        match (base.get_mut(&key), value) {
            (Some(toml::Value::Table(base_t)), toml::Value::Table(over_t)) => {
                merge_tables(base_t, over_t)
            }
            (_, value) => {
                base.insert(key, value);
            }
        }
    }
}

impl Default for AppConfig {
    fn default() -> Self {
        toml::from_str(DEFAULT_CONFIG).expect("built-in default config is valid TOML")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config_parses() {
        let config = AppConfig::default();
        assert_eq!(config.limiter.interval, 60);
        assert_eq!(config.rank.min_year, 2020);
        assert_eq!(config.rank.min_vote_count, 5000);
        assert_eq!(config.rank.cache_minutes_top250, 1200);
        assert!(!config.limiter.auto_mode());
        assert!(config.media_servers.is_empty());
    }

    #[test]
    fn test_partial_user_config_merges() {
        let config = AppConfig::from_toml(
            r#"
            [limiter]
            bandwidth_up = 100.7
            downloaders = ["qb"]

            [rank.thresholds]
            japan_tv = 7.5

            [[downloader_clients]]
            name = "qb"
            kind = "qbittorrent"
            host = "http://127.0.0.1:8080"
            "#,
        )
        .unwrap();
        assert_eq!(config.limiter.bandwidth_up_bits(), 100_000_000);
        assert!(config.limiter.auto_mode());
        assert!(config.limiter.limit_enabled());
        assert_eq!(config.limiter.interval, 60);
        assert_eq!(config.rank.thresholds.japan_tv, 7.5);
        assert_eq!(config.rank.thresholds.other_movie, 0.0);
        assert_eq!(config.downloader("qb").unwrap().kind, DownloaderKind::Qbittorrent);
    }

    #[test]
    fn test_huge_bandwidth_saturates() {
        let mut limiter = AppConfig::default().limiter;
        limiter.bandwidth_up = 1e30;
        limiter.bandwidth_down = -5.0;
        assert_eq!(limiter.bandwidth_up_bits(), u64::MAX);
        assert_eq!(limiter.bandwidth_down_bits(), 0);
        assert!(limiter.auto_mode());
    }

    #[test]
    fn test_filter_config_rejects_bad_rule() {
        let mut config = AppConfig::default();
        config.rank.genre_rate = vec!["科幻:7".into(), "".into()];
        assert_eq!(config.rank.filter_config().unwrap().genre_rules.len(), 1);

        config.rank.genre_rate.push("broken".into());
        assert!(config.rank.filter_config().is_err());
    }

    #[test]
    fn test_roundtrip() {
        let config = AppConfig::default();
        let serialized = toml::to_string_pretty(&config).unwrap();
        let deserialized: AppConfig = toml::from_str(&serialized).unwrap();
        assert_eq!(deserialized.limiter.interval, config.limiter.interval);
    }

    #[test]
    fn test_save_and_load_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("config.toml");
        assert_eq!(AppConfig::load_from(&path).unwrap().limiter.interval, 60);

        let mut config = AppConfig::default();
        config.rank.clear_history = true;
        config.limiter.downloaders = vec!["qb".into(), "tr".into()];
        config.save_to(&path).unwrap();

        let loaded = AppConfig::load_from(&path).unwrap();
        assert!(loaded.rank.clear_history);
        assert_eq!(loaded.limiter.downloaders, vec!["qb", "tr"]);
    }
}

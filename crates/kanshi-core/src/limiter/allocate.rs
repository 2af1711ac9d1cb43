use std::sync::LazyLock;

use regex::Regex;
use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::config::LimiterConfig;
use crate::error::KanshiError;
use crate::limiter::classify::Usage;

/// Cap used in auto mode when a direction has no bandwidth configured, and
/// the lowest cap auto mode will ever set.
pub const AUTO_FALLBACK_KIB: f64 = 10.0;

static RE_RATIO_SEPARATOR: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"[:：,，;；\s\-\|\./]").unwrap());

/// Supported downloader backends.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DownloaderKind {
    Qbittorrent,
    Transmission,
}

impl DownloaderKind {
    /// Wire value for a limit in KiB/s, where 0 means unlimited.
    ///
    /// qBittorrent treats 0 as "no limit"; Transmission needs -1 to switch
    /// the limit off.
    pub fn encode_limit(self, kib: u64) -> i64 {
        let kib = i64::try_from(kib).unwrap_or(i64::MAX);
        match self {
            Self::Qbittorrent => kib,
            Self::Transmission if kib > 0 => kib,
            Self::Transmission => -1,
        }
    }
}

impl std::fmt::Display for DownloaderKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Qbittorrent => write!(f, "qBittorrent"),
            Self::Transmission => write!(f, "Transmission"),
        }
    }
}

/// Total caps for one tick, in KiB/s. Zero means unlimited.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize)]
pub struct Caps {
    pub up: f64,
    pub down: f64,
}

/// Pick the caps for the current usage.
///
/// While limiting, auto mode leaves what the bandwidth has left after
/// countable playback; static mode uses the play caps. While idle, auto mode
/// restores the full bandwidth and static mode uses the no-play caps.
pub fn compute_caps(cfg: &LimiterConfig, usage: &Usage) -> Caps {
    let auto = cfg.auto_mode();
    match (usage.is_limiting(), auto) {
        (true, true) => Caps {
            up: remaining_kib(cfg.bandwidth_up_bits(), usage.up),
            down: remaining_kib(cfg.bandwidth_down_bits(), usage.down),
        },
        (true, false) => Caps {
            up: cfg.play_up_speed,
            down: cfg.play_down_speed,
        },
        (false, true) => Caps {
            up: bits_to_kib(cfg.bandwidth_up_bits()).trunc(),
            down: bits_to_kib(cfg.bandwidth_down_bits()).trunc(),
        },
        (false, false) => Caps {
            up: cfg.noplay_up_speed,
            down: cfg.noplay_down_speed,
        },
    }
}

fn bits_to_kib(bits: u64) -> f64 {
    bits as f64 / 8.0 / 1024.0
}

fn remaining_kib(bandwidth: u64, used: u64) -> f64 {
    if bandwidth == 0 {
        return AUTO_FALLBACK_KIB;
    }
    let kib = (bandwidth as f64 - used as f64) / 8.0 / 1024.0;
    ((kib * 100.0).round() / 100.0).max(AUTO_FALLBACK_KIB)
}

/// Parse a ratio string such as `1:1:0` or `3，2` into weights.
pub fn parse_ratio(ratio: &str) -> Result<Vec<u64>, KanshiError> {
    RE_RATIO_SEPARATOR
        .split(ratio.trim())
        .map(|w| {
            w.parse::<u64>().map_err(|_| KanshiError::Ratio {
                ratio: ratio.to_string(),
                reason: format!("weight {w:?} is not a whole number"),
            })
        })
        .collect()
}

/// Split a total cap across `count` downloaders.
///
/// With weights, slot `i` gets `floor(limit * w[i] / sum)` and a zero weight
/// leaves that slot unlimited. Without weights the cap is divided evenly.
pub fn split_limit(limit: f64, count: usize, weights: Option<&[u64]>) -> Vec<u64> {
    match (count, weights) {
        (0, _) => Vec::new(),
        (1, _) => vec![to_kib(limit)],
        (n, None) => vec![to_kib(limit / n as f64); n],
        (n, Some(weights)) => {
            let sum: u64 = weights.iter().sum();
            weights
                .iter()
                .take(n)
                .map(|&w| {
                    if w == 0 {
                        0
                    } else {
                        to_kib(limit * w as f64 / sum as f64)
                    }
                })
                .collect()
        }
    }
}

fn to_kib(value: f64) -> u64 {
    if value.is_finite() && value > 0.0 {
        value.floor() as u64
    } else {
        0
    }
}

/// A limit pair for one downloader, in KiB/s. Zero means unlimited.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DownloaderLimit {
    pub name: String,
    pub upload: u64,
    pub download: u64,
}

/// Distribute caps across downloaders in configured order.
///
/// Upload and download ratios are independent; an empty or unusable ratio
/// falls back to the even split for that direction.
pub fn distribute_limits(
    caps: Caps,
    downloaders: &[String],
    ratio_up: &str,
    ratio_down: &str,
) -> Vec<DownloaderLimit> {
    let n = downloaders.len();
    let up_weights = weights_for(ratio_up, n, "upload");
    let down_weights = weights_for(ratio_down, n, "download");
    let up = split_limit(caps.up, n, up_weights.as_deref());
    let down = split_limit(caps.down, n, down_weights.as_deref());

    downloaders
        .iter()
        .zip(up.into_iter().zip(down))
        .map(|(name, (upload, download))| DownloaderLimit {
            name: name.clone(),
            upload,
            download,
        })
        .collect()
}

fn weights_for(ratio: &str, count: usize, direction: &str) -> Option<Vec<u64>> {
    if count < 2 || ratio.trim().is_empty() {
        return None;
    }
    let checked = parse_ratio(ratio).and_then(|w| {
        if w.len() < count {
            Err(KanshiError::Ratio {
                ratio: ratio.to_string(),
                reason: format!("{} weights for {count} downloaders", w.len()),
            })
        } else if w.iter().sum::<u64>() == 0 {
            Err(KanshiError::Ratio {
                ratio: ratio.to_string(),
                reason: "weights sum to zero".into(),
            })
        } else {
            Ok(w)
        }
    });
    match checked {
        Ok(w) => Some(w),
        Err(e) => {
            warn!(direction, "{e}, splitting evenly");
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::AppConfig;

    fn names(n: usize) -> Vec<String> {
        (0..n).map(|i| format!("dl{i}")).collect()
    }

    fn limiting(up: u64, down: u64) -> Usage {
        Usage {
            up,
            down,
            total: up + down,
            playing: Vec::new(),
        }
    }

    #[test]
    fn test_ratio_split() {
        let weights = parse_ratio("1:1:0").unwrap();
        assert_eq!(split_limit(300.0, 3, Some(&weights)), vec![150, 150, 0]);
    }

    #[test]
    fn test_ratio_separators() {
        assert_eq!(parse_ratio("3，2").unwrap(), vec![3, 2]);
        assert_eq!(parse_ratio("1|2/3").unwrap(), vec![1, 2, 3]);
        assert_eq!(parse_ratio(" 1 2 ").unwrap(), vec![1, 2]);
        assert!(parse_ratio("1::2").is_err());
        assert!(parse_ratio("a:b").is_err());
    }

    #[test]
    fn test_single_and_even_split() {
        assert_eq!(split_limit(1234.7, 1, None), vec![1234]);
        assert_eq!(split_limit(1000.0, 3, None), vec![333, 333, 333]);
        assert_eq!(split_limit(0.0, 2, None), vec![0, 0]);
        assert!(split_limit(100.0, 0, None).is_empty());
    }

    #[test]
    fn test_ratio_floors() {
        let weights = [2, 1];
        assert_eq!(split_limit(100.0, 2, Some(&weights)), vec![66, 33]);
    }

    #[test]
    fn test_independent_directions() {
        let caps = Caps {
            up: 300.0,
            down: 900.0,
        };
        let limits = distribute_limits(caps, &names(3), "1:1:0", "");
        assert_eq!(
            limits.iter().map(|l| l.upload).collect::<Vec<_>>(),
            vec![150, 150, 0]
        );
        assert_eq!(
            limits.iter().map(|l| l.download).collect::<Vec<_>>(),
            vec![300, 300, 300]
        );
        assert_eq!(limits[2].name, "dl2");
    }

    #[test]
    fn test_bad_ratio_falls_back_to_even() {
        let caps = Caps {
            up: 200.0,
            down: 200.0,
        };
        let short = distribute_limits(caps, &names(3), "1:1", "0:0:0");
        assert!(short.iter().all(|l| l.upload == 66 && l.download == 66));
    }

    #[test]
    fn test_ratio_ignored_for_single_downloader() {
        let caps = Caps {
            up: 512.9,
            down: 0.0,
        };
        let limits = distribute_limits(caps, &names(1), "0", "0");
        assert_eq!(limits[0].upload, 512);
        assert_eq!(limits[0].download, 0);
    }

    #[test]
    fn test_encode_limit() {
        assert_eq!(DownloaderKind::Qbittorrent.encode_limit(0), 0);
        assert_eq!(DownloaderKind::Qbittorrent.encode_limit(150), 150);
        assert_eq!(DownloaderKind::Transmission.encode_limit(0), -1);
        assert_eq!(DownloaderKind::Transmission.encode_limit(150), 150);
    }

    #[test]
    fn test_auto_mode_caps() {
        let mut cfg = AppConfig::default().limiter;
        cfg.bandwidth_up = 100.0;
        let caps = compute_caps(&cfg, &limiting(40_000_000, 0));
        assert_eq!(caps.up, 7324.22);
        assert_eq!(caps.down, AUTO_FALLBACK_KIB);

        let idle = compute_caps(&cfg, &Usage::default());
        assert_eq!(idle.up, 12207.0);
        assert_eq!(idle.down, 0.0);
    }

    #[test]
    fn test_auto_mode_never_below_fallback() {
        let mut cfg = AppConfig::default().limiter;
        cfg.bandwidth_up = 10.0;
        let caps = compute_caps(&cfg, &limiting(50_000_000, 0));
        assert_eq!(caps.up, AUTO_FALLBACK_KIB);
    }

    #[test]
    fn test_static_caps() {
        let mut cfg = AppConfig::default().limiter;
        cfg.play_up_speed = 1024.0;
        cfg.play_down_speed = 2048.0;
        cfg.noplay_up_speed = 0.0;
        cfg.noplay_down_speed = 4096.0;
        assert_eq!(
            compute_caps(&cfg, &limiting(1, 0)),
            Caps {
                up: 1024.0,
                down: 2048.0
            }
        );
        assert_eq!(
            compute_caps(&cfg, &Usage::default()),
            Caps {
                up: 0.0,
                down: 4096.0
            }
        );
    }
}

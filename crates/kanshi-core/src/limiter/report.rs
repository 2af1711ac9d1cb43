//! Plain-text notification bodies.

use std::fmt::Write;

use serde::Serialize;

use crate::limiter::allocate::DownloaderLimit;
use crate::limiter::classify::Usage;

/// A message ready for the notifier.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Notification {
    pub title: String,
    pub body: String,
    pub link: Option<String>,
}

fn mib(kib: u64) -> String {
    if kib == 0 {
        "∞".to_string()
    } else {
        format!("{:.1}", kib as f64 / 1024.0)
    }
}

fn mbps(bits: u64) -> String {
    format!("{:.1}", bits as f64 / 1_000_000.0)
}

/// `qb ↑ 1.5 ↓ ∞ MiB/s`
pub fn status_line(limit: &DownloaderLimit) -> String {
    format!(
        "{} ↑ {} ↓ {} MiB/s",
        limit.name,
        mib(limit.upload),
        mib(limit.download)
    )
}

pub fn status_text(limits: &[DownloaderLimit]) -> String {
    let mut text = String::from("═══ Speed limits ═══\n\n");
    for limit in limits {
        text.push_str(&status_line(limit));
        text.push('\n');
    }
    text
}

/// The "now playing" section; empty when nothing is playing.
pub fn playing_text(usage: &Usage) -> String {
    if usage.playing.is_empty() {
        return String::new();
    }
    let mut text = String::from("\n═══ Now playing ═══\n\n");
    if usage.total > 0 {
        let _ = write!(text, "Total bitrate: {} Mbps", mbps(usage.total));
        if usage.up > 0 {
            let _ = write!(text, " ⇡ {}", mbps(usage.up));
        }
        if usage.down > 0 {
            let _ = write!(text, " ⇣ {}", mbps(usage.down));
        }
        text.push_str("\n\n");
    }
    for (i, item) in usage.playing.iter().enumerate() {
        let _ = write!(
            text,
            "{}. {}\n    User: {} | Bitrate: {} Mbps\n\n",
            i + 1,
            item.title,
            item.user,
            mbps(item.bitrate)
        );
    }
    text
}

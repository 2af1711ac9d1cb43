use serde::Serialize;

use crate::limiter::address::{self, AllowList};
use crate::models::{MediaKind, PlaybackSession, PlayingItem};

/// Which limit a session's bitrate counts toward.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    Upload,
    Download,
}

/// Path fragments that make a session count toward a limit.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PathRules {
    up: Vec<String>,
    down: Vec<String>,
}

impl PathRules {
    /// Build from newline-separated fragment lists. Blank lines are ignored.
    pub fn parse(include_up: &str, include_down: &str) -> Self {
        Self {
            up: split_lines(include_up),
            down: split_lines(include_down),
        }
    }

    /// The upload list is consulted first; a path matching neither list
    /// does not count.
    pub fn classify(&self, path: Option<&str>) -> Option<Direction> {
        let path = path?;
        if self.up.iter().any(|f| path.contains(f.as_str())) {
            Some(Direction::Upload)
        } else if self.down.iter().any(|f| path.contains(f.as_str())) {
            Some(Direction::Download)
        } else {
            None
        }
    }
}

fn split_lines(list: &str) -> Vec<String> {
    list.lines()
        .map(|l| l.trim_end_matches('\r'))
        .filter(|l| !l.trim().is_empty())
        .map(str::to_string)
        .collect()
}

/// Bitrate totals for one tick, in bits per second.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct Usage {
    pub up: u64,
    pub down: u64,
    /// Every playing session, counted or not.
    pub total: u64,
    pub playing: Vec<PlayingItem>,
}

impl Usage {
    /// Any session counts toward a limit.
    pub fn is_limiting(&self) -> bool {
        self.up > 0 || self.down > 0
    }
}

/// Sum playing sessions into upload/download/total bitrates.
///
/// Upload-countable sessions count when their address is outside the
/// allow-list, or public when no allow-list is configured. Download-countable
/// sessions count when outside the allow-list, or private when none is
/// configured. Only video counts toward either limit.
pub fn aggregate(sessions: &[PlaybackSession], rules: &PathRules, allow: &AllowList) -> Usage {
    let mut usage = Usage::default();

    for session in sessions.iter().filter(|s| !s.paused) {
        usage.total += session.bitrate;
        if session.kind != MediaKind::Video {
            continue;
        }
        usage.playing.push(PlayingItem::from_session(session));

        let Some(direction) = rules.classify(session.path.as_deref()) else {
            continue;
        };
        let addr = session.remote_address.as_str();
        let counts = if allow.is_configured() {
            !allow.allows(addr)
        } else {
            match direction {
                Direction::Upload => !address::is_private(addr),
                Direction::Download => address::is_private(addr),
            }
        };
        if counts {
            match direction {
                Direction::Upload => usage.up += session.bitrate,
                Direction::Download => usage.down += session.bitrate,
            }
        }
    }

    usage
}

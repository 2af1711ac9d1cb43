use serde::Serialize;

use crate::config::LimiterConfig;
use crate::limiter::allocate::{self, Caps, DownloaderLimit};
use crate::limiter::classify::Usage;
use crate::limiter::report::{self, Notification};

/// Encodes the applied `(upload, download)` cap pair, e.g. `U:10,D:20`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Signature(String);

impl Signature {
    pub fn new(up: f64, down: f64) -> Self {
        Self(format!("U:{up},D:{down}"))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for Signature {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// What a tick has to do after classification.
#[derive(Debug, Clone, PartialEq)]
pub enum TickPlan {
    /// Caps match the applied signature; no downloader calls.
    Unchanged,
    /// New caps, one entry per configured downloader.
    Apply(Vec<DownloaderLimit>),
}

/// Serializable view for status endpoints.
#[derive(Debug, Clone, Serialize)]
pub struct LimiterSnapshot {
    pub signature: Signature,
    pub caps: Caps,
    pub usage: Usage,
    pub pending_title: String,
}

/// Mutable limiter state, carried from tick to tick.
#[derive(Debug, Clone)]
pub struct LimiterState {
    signature: Signature,
    caps: Caps,
    usage: Usage,
    pending_title: String,
    pending_link: Option<String>,
    status_text: String,
}

impl LimiterState {
    /// Starts out assuming the static no-play caps are applied.
    pub fn new(cfg: &LimiterConfig) -> Self {
        Self::with_signature(Signature::new(cfg.noplay_up_speed, cfg.noplay_down_speed))
    }

    pub fn with_signature(signature: Signature) -> Self {
        Self {
            signature,
            caps: Caps::default(),
            usage: Usage::default(),
            pending_title: String::new(),
            pending_link: None,
            status_text: String::new(),
        }
    }

    pub fn signature(&self) -> &Signature {
        &self.signature
    }

    /// Store `next`; returns whether it differs from the applied signature.
    pub fn update_signature(&mut self, next: Signature) -> bool {
        if self.signature == next {
            false
        } else {
            self.signature = next;
            true
        }
    }

    /// Record this tick's usage and decide whether downloaders need new caps.
    pub fn plan(&mut self, cfg: &LimiterConfig, usage: Usage, downloaders: &[String]) -> TickPlan {
        let caps = allocate::compute_caps(cfg, &usage);
        self.caps = caps;
        self.usage = usage;

        if !self.update_signature(Signature::new(caps.up, caps.down)) {
            return TickPlan::Unchanged;
        }

        let limits = allocate::distribute_limits(
            caps,
            downloaders,
            &cfg.allocation_ratio_up,
            &cfg.allocation_ratio_down,
        );
        self.status_text = report::status_text(&limits);
        TickPlan::Apply(limits)
    }

    /// Queue a title line from a playback event. A new link replaces the old one.
    pub fn record_event(&mut self, line: &str, link: Option<String>) {
        self.pending_title.push_str(line);
        if link.is_some() {
            self.pending_link = link;
        }
    }

    pub fn has_pending(&self) -> bool {
        !self.pending_title.is_empty()
    }

    /// Build the notification for everything queued so far.
    pub fn notification(&self) -> Notification {
        Notification {
            title: self.pending_title.trim_end().to_string(),
            body: format!("{}{}", self.status_text, report::playing_text(&self.usage)),
            link: self.pending_link.clone(),
        }
    }

    pub fn clear_pending(&mut self) {
        self.pending_title.clear();
        self.pending_link = None;
    }

    pub fn snapshot(&self) -> LimiterSnapshot {
        LimiterSnapshot {
            signature: self.signature.clone(),
            caps: self.caps,
            usage: self.usage.clone(),
            pending_title: self.pending_title.clone(),
        }
    }
}

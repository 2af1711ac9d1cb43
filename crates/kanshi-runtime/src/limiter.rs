use std::sync::Arc;
use std::time::Duration;

use futures::future::join_all;
use serde::Serialize;
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

use kanshi_api::traits::{Downloader, MediaServer, Notifier};
use kanshi_core::config::LimiterConfig;
use kanshi_core::debounce::Debouncer;
use kanshi_core::limiter::report::status_line;
use kanshi_core::limiter::state::{LimiterSnapshot, TickPlan};
use kanshi_core::limiter::{aggregate, AllowList, DownloaderLimit, LimiterState, PathRules, WebhookEvent};
use kanshi_core::models::PlaybackSession;

/// What a tick did.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "outcome", content = "limits", rename_all = "lowercase")]
pub enum TickOutcome {
    Disabled,
    Unchanged,
    Applied(Vec<DownloaderLimit>),
}

/// Playback-aware downloader limiter.
///
/// Ticks take turns on `ticking`, so planned caps reach the downloaders in
/// the order they were planned. State lives behind its own mutex that is
/// never held across the debouncer call; the debouncer guards its own slot.
pub struct SpeedLimiter<M, D, N> {
    config: LimiterConfig,
    rules: PathRules,
    allow: AllowList,
    servers: Vec<M>,
    downloaders: Vec<D>,
    notifier: Arc<N>,
    state: Arc<Mutex<LimiterState>>,
    ticking: Mutex<()>,
    debouncer: Debouncer,
}

impl<M, D, N> SpeedLimiter<M, D, N>
where
    M: MediaServer,
    D: Downloader,
    N: Notifier + 'static,
{
    pub fn new(config: LimiterConfig, servers: Vec<M>, downloaders: Vec<D>, notifier: N) -> Self {
        for name in &config.downloaders {
            if !downloaders.iter().any(|d| d.name() == name) {
                warn!(downloader = %name, "configured downloader has no client");
            }
        }
        Self {
            rules: config.path_rules(),
            allow: config.allow_list(),
            state: Arc::new(Mutex::new(LimiterState::new(&config))),
            ticking: Mutex::new(()),
            debouncer: Debouncer::new(Duration::from_secs(config.notify_delay)),
            notifier: Arc::new(notifier),
            servers,
            downloaders,
            config,
        }
    }

    pub async fn snapshot(&self) -> LimiterSnapshot {
        self.state.lock().await.snapshot()
    }

    /// Sessions from every server. A failing server contributes nothing.
    async fn collect_sessions(&self) -> Vec<PlaybackSession> {
        let results = join_all(self.servers.iter().map(|s| s.sessions())).await;
        let mut sessions = Vec::new();
        for (server, result) in self.servers.iter().zip(results) {
            match result {
                Ok(found) => {
                    debug!(server = server.name(), count = found.len(), "sessions");
                    sessions.extend(found);
                }
                Err(e) => warn!(server = server.name(), "failed to query sessions: {e}"),
            }
        }
        sessions
    }

    /// Classify current playback, apply new caps if they changed, and
    /// schedule any pending notification.
    pub async fn tick(&self) -> TickOutcome {
        if !self.config.enabled {
            debug!("limiter disabled, skipping tick");
            return TickOutcome::Disabled;
        }
        let _turn = self.ticking.lock().await;

        let sessions = self.collect_sessions().await;
        let usage = aggregate(&sessions, &self.rules, &self.allow);
        debug!(up = usage.up, down = usage.down, total = usage.total, "usage");

        let (plan, pending) = {
            let mut state = self.state.lock().await;
            let plan = state.plan(&self.config, usage, &self.config.downloaders);
            (plan, state.has_pending())
        };

        let outcome = match plan {
            TickPlan::Unchanged => TickOutcome::Unchanged,
            TickPlan::Apply(limits) => {
                self.apply(&limits).await;
                TickOutcome::Applied(limits)
            }
        };

        if pending {
            self.schedule_notification().await;
        }
        outcome
    }

    async fn apply(&self, limits: &[DownloaderLimit]) {
        for limit in limits {
            let Some(downloader) = self.downloaders.iter().find(|d| d.name() == limit.name) else {
                warn!(downloader = %limit.name, "no client for downloader, skipping");
                continue;
            };
            let kind = downloader.kind();
            let upload = kind.encode_limit(limit.upload);
            let download = kind.encode_limit(limit.download);
            match downloader.set_speed_limit(upload, download).await {
                Ok(()) => info!("{}", status_line(limit)),
                Err(e) => warn!(downloader = %limit.name, "failed to set speed limit: {e}"),
            }
        }
    }

    /// Record a playback webhook and re-run the tick. Returns whether the
    /// event was one the limiter reacts to.
    pub async fn handle_webhook(&self, event: &WebhookEvent) -> bool {
        if !self.config.enabled {
            return false;
        }
        let Some(line) = event.title_line() else {
            debug!(event = %event.event, "ignoring webhook event");
            return false;
        };
        info!("{}", line.trim_end());

        let link = self.resume_link(event).await;
        self.state.lock().await.record_event(&line, link);
        self.tick().await;
        true
    }

    async fn resume_link(&self, event: &WebhookEvent) -> Option<String> {
        let item_id = event.item_id.as_deref()?;
        let server_name = event.server_name.as_deref()?;
        let server = self.servers.iter().find(|s| s.name() == server_name)?;
        match server.play_url(item_id).await {
            Ok(link) => link,
            Err(e) => {
                warn!(server = server_name, "failed to resolve play link: {e}");
                None
            }
        }
    }

    /// Drop any notification still waiting on the debounce timer.
    pub async fn shutdown(&self) {
        self.debouncer.cancel().await;
    }

    async fn schedule_notification(&self) {
        let state = Arc::clone(&self.state);
        let notifier = Arc::clone(&self.notifier);
        let enabled = self.config.notify;
        self.debouncer
            .schedule(move || flush_notification(state, notifier, enabled))
            .await;
    }
}

/// Send what is queued. The buffer is cleared only after a successful send;
/// with notifications off it is dropped.
async fn flush_notification<N: Notifier>(
    state: Arc<Mutex<LimiterState>>,
    notifier: Arc<N>,
    enabled: bool,
) {
    let mut state = state.lock().await;
    if !state.has_pending() {
        return;
    }
    if !enabled {
        state.clear_pending();
        return;
    }
    let note = state.notification();
    match notifier.post(&note.title, &note.body, note.link.as_deref()).await {
        Ok(()) => state.clear_pending(),
        Err(e) => warn!("failed to send notification: {e}"),
    }
}

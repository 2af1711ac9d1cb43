use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Local, NaiveTime, TimeZone, Timelike};
use cron::Schedule;
use tokio::sync::RwLock;
use tokio::time::MissedTickBehavior;
use tracing::{error, info, warn};

use kanshi_api::traits::{Downloader, MediaChain, MediaServer, Notifier, RankFeedSource};
use kanshi_core::config::AppConfig;

use crate::limiter::SpeedLimiter;
use crate::rank::{RankSubscriber, RefreshReport};
use crate::RuntimeError;

/// Tick the limiter every `interval` seconds, forever.
pub async fn run_limiter_loop<M, D, N>(limiter: Arc<SpeedLimiter<M, D, N>>, interval: u64)
where
    M: MediaServer,
    D: Downloader,
    N: Notifier + 'static,
{
    let mut ticker = tokio::time::interval(Duration::from_secs(interval.max(1)));
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
    info!(interval, "speed limiter started");
    loop {
        ticker.tick().await;
        limiter.tick().await;
    }
}

/// Parse the rank schedule: a five-field crontab expression, a six or
/// seven field expression with seconds, or a plain daily `HH:MM`.
pub fn parse_schedule(text: &str) -> Result<Schedule, RuntimeError> {
    let text = text.trim();
    let invalid = |e: &dyn std::fmt::Display| {
        RuntimeError::Config(format!("invalid schedule {text:?}: {e}"))
    };

    let expr = if let Ok(at) = NaiveTime::parse_from_str(text, "%H:%M") {
        format!("0 {} {} * * *", at.minute(), at.hour())
    } else {
        let fields: Vec<&str> = text.split_whitespace().collect();
        match fields.as_slice() {
            [minute, hour, day, month, weekday] => {
                let weekday = crontab_weekdays(weekday).map_err(|e| invalid(&e))?;
                format!("0 {minute} {hour} {day} {month} {weekday}")
            }
            _ => fields.join(" "),
        }
    };
    Schedule::from_str(&expr).map_err(|e| invalid(&e))
}

/// Renumber a crontab day-of-week field (0 or 7 = Sunday) to the 1-7,
/// Sunday-first numbering `cron` expects. Named days pass through.
fn crontab_weekdays(field: &str) -> Result<String, String> {
    let day = |n: &str| -> Result<u32, String> {
        match n.parse::<u32>() {
            Ok(d) if d <= 7 => Ok(d % 7 + 1),
            _ => Err(format!("bad day of week {n:?}")),
        }
    };

    let mut parts = Vec::new();
    for item in field.split(',') {
        let (range, step) = match item.split_once('/') {
            Some((range, step)) => (range, Some(step)),
            None => (item, None),
        };
        let mapped = if range == "*" || range.starts_with(|c: char| c.is_ascii_alphabetic()) {
            range.to_string()
        } else if let Some((from, to)) = range.split_once('-') {
            let (from, to) = (day(from)?, day(to)?);
            if to == 1 && from > 1 {
                // `5-7` ends on Sunday, which now sorts first.
                match step {
                    None => {
                        parts.push(format!("{from}-7"));
                        "1".to_string()
                    }
                    Some(_) => return Err(format!("unsupported weekday range {item:?}")),
                }
            } else {
                format!("{from}-{to}")
            }
        } else {
            day(range)?.to_string()
        };
        parts.push(match step {
            Some(step) => format!("{mapped}/{step}"),
            None => mapped,
        });
    }
    Ok(parts.join(","))
}

/// First run of `schedule` strictly after `now`.
pub fn next_run<Tz: TimeZone>(schedule: &Schedule, now: &DateTime<Tz>) -> Option<DateTime<Tz>> {
    schedule.after(now).next()
}

/// One refresh with the current rank settings. A consumed `clear_history`
/// directive is reset in the shared config, and written to `save_path` when
/// one is given.
pub async fn run_rank_refresh<F, C>(
    subscriber: &RankSubscriber<F, C>,
    config: &RwLock<AppConfig>,
    save_path: Option<&Path>,
) -> Result<RefreshReport, RuntimeError>
where
    F: RankFeedSource,
    C: MediaChain,
{
    let rank = config.read().await.rank.clone();
    let report = subscriber.refresh(&rank).await?;
    if report.cleared {
        let mut cfg = config.write().await;
        cfg.rank.clear_history = false;
        if let Some(path) = save_path {
            cfg.save_to(path)
                .map_err(|e| RuntimeError::Config(e.to_string()))?;
        }
    }
    Ok(report)
}

/// Refresh the rank feeds every day at the configured local time, forever.
pub async fn run_rank_loop<F, C>(
    subscriber: Arc<RankSubscriber<F, C>>,
    config: Arc<RwLock<AppConfig>>,
    save_path: Option<PathBuf>,
) where
    F: RankFeedSource,
    C: MediaChain,
{
    let text = config.read().await.rank.schedule.clone();
    let schedule = match parse_schedule(&text) {
        Ok(schedule) => schedule,
        Err(e) => {
            error!("rank subscriber not started: {e}");
            return;
        }
    };
    info!(schedule = %text, "rank subscriber started");

    loop {
        let now = Local::now();
        let Some(next) = next_run(&schedule, &now) else {
            warn!(schedule = %text, "schedule has no upcoming run, rank subscriber stopped");
            return;
        };
        let wait = (next - now).to_std().unwrap_or_default();
        info!(next = %next.format("%Y-%m-%d %H:%M"), "next rank refresh");
        tokio::time::sleep(wait).await;

        if let Err(e) = run_rank_refresh(&subscriber, &config, save_path.as_deref()).await {
            warn!("rank refresh failed: {e}");
        }
    }
}

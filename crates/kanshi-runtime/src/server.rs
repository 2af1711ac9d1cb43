//! HTTP surface: history deletion, playback webhooks, limiter status.

use std::future::Future;
use std::sync::Arc;

use axum::{
    extract::{Query, State},
    routing::{get, post},
    Json, Router,
};
use serde::Deserialize;
use tokio::net::TcpListener;
use tracing::{debug, info};

use kanshi_api::traits::{Downloader, MediaServer, Notifier};
use kanshi_core::limiter::state::LimiterSnapshot;
use kanshi_core::limiter::WebhookEvent;

use crate::db::DbHandle;
use crate::limiter::SpeedLimiter;
use crate::rank::{self, ApiResponse};
use crate::RuntimeError;

/// Shared handler state.
pub struct AppState<M, D, N> {
    pub limiter: Arc<SpeedLimiter<M, D, N>>,
    pub db: DbHandle,
    pub api_token: String,
}

#[derive(Debug, Default, Deserialize)]
pub struct DeleteHistoryQuery {
    #[serde(default)]
    pub key: String,
    #[serde(default)]
    pub apikey: String,
}

pub fn router<M, D, N>(state: Arc<AppState<M, D, N>>) -> Router
where
    M: MediaServer + 'static,
    D: Downloader + 'static,
    N: Notifier + 'static,
{
    Router::new()
        .route(
            "/api/v1/rank/delete_history",
            get(delete_history_handler::<M, D, N>),
        )
        .route("/api/v1/webhook", post(webhook_handler::<M, D, N>))
        .route("/api/v1/limiter/status", get(status_handler::<M, D, N>))
        .with_state(state)
}

/// Serve `app` on `listener` until `shutdown` resolves.
pub async fn serve(
    listener: TcpListener,
    app: Router,
    shutdown: impl Future<Output = ()> + Send + 'static,
) -> Result<(), RuntimeError> {
    if let Ok(addr) = listener.local_addr() {
        info!(%addr, "HTTP server listening");
    }
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown)
        .await
        .map_err(|e| RuntimeError::Server(e.to_string()))
}

async fn delete_history_handler<M, D, N>(
    State(state): State<Arc<AppState<M, D, N>>>,
    Query(query): Query<DeleteHistoryQuery>,
) -> Json<ApiResponse>
where
    M: MediaServer + 'static,
    D: Downloader + 'static,
    N: Notifier + 'static,
{
    Json(rank::delete_history(&state.db, &query.key, &query.apikey, &state.api_token).await)
}

/// Qualifying events are handled on a spawned task; the response does not
/// wait for the tick.
async fn webhook_handler<M, D, N>(
    State(state): State<Arc<AppState<M, D, N>>>,
    Json(event): Json<WebhookEvent>,
) -> Json<ApiResponse>
where
    M: MediaServer + 'static,
    D: Downloader + 'static,
    N: Notifier + 'static,
{
    if event.kind().is_none() {
        debug!(event = %event.event, "webhook ignored");
        return Json(ApiResponse::ok("ignored"));
    }
    let limiter = Arc::clone(&state.limiter);
    tokio::spawn(async move {
        limiter.handle_webhook(&event).await;
    });
    Json(ApiResponse::ok("accepted"))
}

async fn status_handler<M, D, N>(
    State(state): State<Arc<AppState<M, D, N>>>,
) -> Json<LimiterSnapshot>
where
    M: MediaServer + 'static,
    D: Downloader + 'static,
    N: Notifier + 'static,
{
    Json(state.limiter.snapshot().await)
}

#[cfg(test)]
mod tests {
    use super::*;
    use kanshi_api::{DownloaderClient, MediaServerClient};
    use kanshi_core::config::AppConfig;

    use crate::notify::LogNotifier;

    type TestState = AppState<MediaServerClient, DownloaderClient, LogNotifier>;

    fn state() -> Arc<TestState> {
        let mut cfg = AppConfig::default().limiter;
        cfg.noplay_up_speed = 100.0;
        cfg.noplay_down_speed = 200.0;
        Arc::new(AppState {
            limiter: Arc::new(SpeedLimiter::new(cfg, Vec::new(), Vec::new(), LogNotifier)),
            db: DbHandle::open_memory().unwrap(),
            api_token: "secret".into(),
        })
    }

    #[tokio::test]
    async fn test_status() {
        let Json(snapshot) = status_handler(State(state())).await;
        assert_eq!(snapshot.signature.as_str(), "U:100,D:200");
        assert!(snapshot.pending_title.is_empty());
    }

    #[tokio::test]
    async fn test_delete_history_requires_token() {
        let query = DeleteHistoryQuery {
            key: "doubanrank: x (DB:1)".into(),
            apikey: "nope".into(),
        };
        let Json(resp) = delete_history_handler(State(state()), Query(query)).await;
        assert!(!resp.success);
        assert_eq!(resp.message, "invalid API token");
    }

    #[tokio::test]
    async fn test_webhook_filters_events() {
        let event = WebhookEvent {
            event: "library.new".into(),
            ..Default::default()
        };
        let Json(resp) = webhook_handler(State(state()), Json(event)).await;
        assert_eq!(resp, ApiResponse::ok("ignored"));

        let event = WebhookEvent {
            event: "playback.start".into(),
            item_name: "Dune (2021)".into(),
            ..Default::default()
        };
        let Json(resp) = webhook_handler(State(state()), Json(event)).await;
        assert_eq!(resp, ApiResponse::ok("accepted"));
    }

    #[test]
    fn test_router_builds() {
        let _app = router(state());
    }
}

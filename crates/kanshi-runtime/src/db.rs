use std::path::Path;

use tokio::sync::{mpsc, oneshot};

use kanshi_core::error::KanshiError;
use kanshi_core::rank::{CachedFeed, HistoryRecord};
use kanshi_core::storage::Storage;

/// Async handle to the storage actor thread.
#[derive(Clone)]
pub struct DbHandle {
    tx: mpsc::UnboundedSender<DbCommand>,
}

enum DbCommand {
    GetHistory {
        reply: oneshot::Sender<Result<Option<Vec<HistoryRecord>>, KanshiError>>,
    },
    SaveHistory {
        history: Vec<HistoryRecord>,
        reply: oneshot::Sender<Result<(), KanshiError>>,
    },
    GetCachedFeed {
        feed: String,
        reply: oneshot::Sender<Result<Option<CachedFeed>, KanshiError>>,
    },
    SaveCachedFeed {
        feed: String,
        cached: CachedFeed,
        reply: oneshot::Sender<Result<(), KanshiError>>,
    },
    GetValue {
        plugin: String,
        key: String,
        reply: oneshot::Sender<Result<Option<serde_json::Value>, KanshiError>>,
    },
    SaveValue {
        plugin: String,
        key: String,
        value: serde_json::Value,
        reply: oneshot::Sender<Result<(), KanshiError>>,
    },
}

impl DbHandle {
    pub fn open(path: &Path) -> Option<Self> {
        let storage = Storage::open(path)
            .map_err(|e| tracing::error!("Failed to open database: {e}"))
            .ok()?;
        Self::spawn(storage)
    }

    /// Actor over an in-memory database (for tests and dry runs).
    pub fn open_memory() -> Option<Self> {
        let storage = Storage::open_memory()
            .map_err(|e| tracing::error!("Failed to open database: {e}"))
            .ok()?;
        Self::spawn(storage)
    }

    fn spawn(storage: Storage) -> Option<Self> {
        let (tx, rx) = mpsc::unbounded_channel();

        std::thread::Builder::new()
            .name("db-actor".into())
            .spawn(move || actor_loop(storage, rx))
            .map_err(|e| tracing::error!("Failed to spawn DB thread: {e}"))
            .ok()?;

        Some(Self { tx })
    }

    async fn request<T>(
        &self,
        make: impl FnOnce(oneshot::Sender<Result<T, KanshiError>>) -> DbCommand,
    ) -> Result<T, KanshiError> {
        let (reply, rx) = oneshot::channel();
        let _ = self.tx.send(make(reply));
        rx.await
            .unwrap_or_else(|_| Err(KanshiError::Config("DB actor closed".into())))
    }

    pub async fn history(&self) -> Result<Option<Vec<HistoryRecord>>, KanshiError> {
        self.request(|reply| DbCommand::GetHistory { reply }).await
    }

    pub async fn save_history(&self, history: Vec<HistoryRecord>) -> Result<(), KanshiError> {
        self.request(|reply| DbCommand::SaveHistory { history, reply })
            .await
    }

    pub async fn cached_feed(&self, feed: &str) -> Result<Option<CachedFeed>, KanshiError> {
        let feed = feed.to_string();
        self.request(|reply| DbCommand::GetCachedFeed { feed, reply })
            .await
    }

    pub async fn save_cached_feed(&self, feed: &str, cached: CachedFeed) -> Result<(), KanshiError> {
        let feed = feed.to_string();
        self.request(|reply| DbCommand::SaveCachedFeed {
            feed,
            cached,
            reply,
        })
        .await
    }

    pub async fn get_value(
        &self,
        plugin: &str,
        key: &str,
    ) -> Result<Option<serde_json::Value>, KanshiError> {
        let (plugin, key) = (plugin.to_string(), key.to_string());
        self.request(|reply| DbCommand::GetValue { plugin, key, reply })
            .await
    }

    pub async fn save_value(
        &self,
        plugin: &str,
        key: &str,
        value: serde_json::Value,
    ) -> Result<(), KanshiError> {
        let (plugin, key) = (plugin.to_string(), key.to_string());
        self.request(|reply| DbCommand::SaveValue {
            plugin,
            key,
            value,
            reply,
        })
        .await
    }
}

fn actor_loop(storage: Storage, mut rx: mpsc::UnboundedReceiver<DbCommand>) {
    while let Some(cmd) = rx.blocking_recv() {
        match cmd {
            DbCommand::GetHistory { reply } => {
                let _ = reply.send(storage.history());
            }
            DbCommand::SaveHistory { history, reply } => {
                let _ = reply.send(storage.save_history(&history));
            }
            DbCommand::GetCachedFeed { feed, reply } => {
                let _ = reply.send(storage.cached_feed(&feed));
            }
            DbCommand::SaveCachedFeed {
                feed,
                cached,
                reply,
            } => {
                let _ = reply.send(storage.save_cached_feed(&feed, &cached));
            }
            DbCommand::GetValue { plugin, key, reply } => {
                let _ = reply.send(storage.get_data(&plugin, &key));
            }
            DbCommand::SaveValue {
                plugin,
                key,
                value,
                reply,
            } => {
                let _ = reply.send(storage.save_data(&plugin, &key, &value));
            }
        }
    }
    tracing::debug!("DB actor stopped");
}

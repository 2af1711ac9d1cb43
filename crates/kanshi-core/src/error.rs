use thiserror::Error;

#[derive(Debug, Error)]
pub enum KanshiError {
    #[error("config error: {0}")]
    Config(String),

    #[error("parse failed: {0}")]
    Parse(String),

    #[error("invalid allocation ratio {ratio:?}: {reason}")]
    Ratio { ratio: String, reason: String },

    #[error("storage error: {0}")]
    Storage(#[from] rusqlite::Error),

    #[error("serialization error: {0}")]
    Serde(#[from] serde_json::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

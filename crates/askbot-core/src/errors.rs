use std::path::PathBuf;

/// Core error type.
///
/// Adapter crates map their specific errors into this type so the bot can
/// pick a user-facing reply by kind instead of inspecting message text.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("permission denied: {0}")]
    PermissionDenied(String),

    #[error("upstream error: {0}")]
    Upstream(String),

    #[error("invalid input: {0}")]
    Input(String),

    #[error("config error: {0}")]
    Config(String),

    #[error("i/o error: {0}")]
    Io(#[from] std::io::Error),

    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("invalid path: {path}: {reason}")]
    InvalidPath { path: PathBuf, reason: String },
}

pub type Result<T> = std::result::Result<T, Error>;

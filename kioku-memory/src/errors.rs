use std::sync::Arc;

#[derive(Debug, thiserror::Error)]
pub enum MemoryError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error("settings error: {0}")]
    Settings(#[from] kioku_core::SettingsError),
    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),
    #[error("notify error: {0}")]
    Notify(#[from] notify::Error),
    /// Every file-reader rejection. Deliberately carries no detail.
    #[error("path required")]
    PathRejected,
    #[error("sync failed: {0}")]
    Sync(Arc<MemoryError>),
    #[error("sync task aborted: {0}")]
    SyncTask(String),
}

pub type MemoryResult<T> = Result<T, MemoryError>;

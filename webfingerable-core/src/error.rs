use thiserror::Error;
use webfingerable_scanner::ScanError;

#[derive(Error, Debug)]
pub enum StoreError {
    #[error("Database error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    #[error("Database connection lock poisoned")]
    Poisoned,

    #[error("Invalid cursor: {0}")]
    InvalidCursor(String),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("Invalid blocklist: {0}")]
    Blocklist(#[from] serde_json::Error),
}

pub type Result<T> = std::result::Result<T, StoreError>;

/// Errors that abort a whole run.
#[derive(Error, Debug)]
pub enum DispatchError {
    #[error("Store failure: {0}")]
    Store(#[from] StoreError),

    #[error("Probe setup failed: {0}")]
    Scan(#[from] ScanError),

    #[error("Task pool at capacity ({0} in flight)")]
    PoolSaturated(usize),

    #[error("Task pool closed")]
    PoolClosed,

    #[error("Probe task failed: {0}")]
    JoinError(#[from] tokio::task::JoinError),
}

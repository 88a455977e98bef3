//! Error types for dotasks.

use dotasks_sites::SiteError;

/// Top-level error type for tasks, persistence and scheduling.
#[derive(Debug, thiserror::Error)]
pub enum TaskError {
    /// Configuration error.
    #[error("config error: {0}")]
    Config(String),

    /// Progress store read, decode or write error.
    #[error("store error: {0}")]
    Store(String),

    /// A progress value kept changing underneath a read-modify-write.
    #[error("store conflict on '{key}' after {attempts} attempts")]
    Conflict {
        /// Store key being updated.
        key: String,
        /// Attempts made before giving up.
        attempts: u32,
    },

    /// I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Remote site error.
    #[error(transparent)]
    Site(#[from] SiteError),

    /// Scheduler error (dispatch, shutdown).
    #[error("scheduler error: {0}")]
    Scheduler(String),

    /// Download service error.
    #[error("download service error: {0}")]
    Download(String),
}

/// Convenience result type.
pub type Result<T> = std::result::Result<T, TaskError>;

//! State backend error types.

/// Errors produced by [`StateBackend`](crate::StateBackend) operations.
#[derive(Debug, thiserror::Error)]
pub enum StateError {
    /// Underlying `SQLite` failure.
    #[error("sqlite error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    /// File-system I/O failure (e.g. creating the state directory).
    #[error("i/o error: {0}")]
    Io(#[from] std::io::Error),

    /// State document could not be encoded or decoded.
    #[error("state json error: {0}")]
    Json(#[from] serde_json::Error),

    /// Stored value could not be interpreted.
    #[error("corrupt state: {0}")]
    Corrupt(String),

    /// Internal mutex was poisoned by a panicked thread.
    #[error("state backend lock poisoned")]
    LockPoisoned,
}

/// Convenience alias used throughout this crate.
pub type Result<T> = std::result::Result<T, StateError>;

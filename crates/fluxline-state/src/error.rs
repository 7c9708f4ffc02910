//! State storage error types.

use fluxline_types::pipeline::PipelineId;

/// Errors produced by the storage contracts in [`crate::backend`].
#[derive(Debug, thiserror::Error)]
pub enum StateError {
    /// Underlying `SQLite` failure.
    #[error("sqlite error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    /// File-system I/O failure (e.g. creating the database directory).
    #[error("i/o error: {0}")]
    Io(#[from] std::io::Error),

    /// Snapshot or error-record payload failed to (de)serialize.
    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),

    /// Internal mutex was poisoned by a panicked thread.
    #[error("state store lock poisoned")]
    LockPoisoned,

    /// Snapshot retrieval for a pipeline that has none stored.
    #[error("no snapshot stored for pipeline {0}")]
    SnapshotMissing(PipelineId),
}

/// Convenience alias used throughout this crate.
pub type Result<T> = std::result::Result<T, StateError>;

//! Storage & pooling (C1): a single embedded SQLite store behind a
//! bounded connection pool, with lock-retrying scoped acquisitions.

mod migrations;
mod pool;

pub use migrations::{apply_migrations, Migration, MIGRATIONS};
pub use pool::{Pool, ReadGuard};

/// Storage-layer error type.
#[derive(Debug, thiserror::Error)]
pub enum StorageError {
    #[error("database error: {0}")]
    Database(#[from] rusqlite::Error),
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
    #[error("initialization error: {0}")]
    Init(String),
    #[error("database is locked, retries exhausted")]
    LockRetriesExhausted,
    #[error("row not found: {0}")]
    NotFound(String),
}

pub type Result<T> = std::result::Result<T, StorageError>;

/// A SQLite error message indicating a schema problem — never retried
/// (spec.md §4.1).
pub fn is_schema_error(err: &rusqlite::Error) -> bool {
    let msg = err.to_string();
    msg.contains("no such table") || msg.contains("no such column")
}

/// A SQLite error indicating lock contention — retried with jittered
/// backoff (spec.md §4.1).
pub fn is_lock_error(err: &rusqlite::Error) -> bool {
    matches!(
        err,
        rusqlite::Error::SqliteFailure(e, _)
            if e.code == rusqlite::ErrorCode::DatabaseBusy
                || e.code == rusqlite::ErrorCode::DatabaseLocked
    )
}

//! Fixed-size connection pool (default 5) with two scoped acquisitions:
//! a read connection (no implicit transaction) and a transaction (commit
//! on normal exit, rollback on any failure). Both guarantee release on
//! all exit paths via RAII — the pool never hands out a connection that
//! isn't returned when its guard drops.

use std::path::Path;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Mutex, MutexGuard};
use std::time::Duration;

use rusqlite::Connection;

use super::{apply_migrations, is_lock_error, is_schema_error, StorageError};
use crate::retry::RetryPolicy;

fn configure_connection(conn: &Connection) -> Result<(), StorageError> {
    conn.execute_batch(
        "PRAGMA journal_mode = WAL;
         PRAGMA synchronous = NORMAL;
         PRAGMA foreign_keys = ON;
         PRAGMA busy_timeout = 5000;",
    )?;
    Ok(())
}

/// Pooled connection handle for reads. No implicit transaction is opened;
/// callers that need one should use [`Pool::transaction`] instead.
pub struct ReadGuard<'p> {
    guard: MutexGuard<'p, Connection>,
}

impl<'p> std::ops::Deref for ReadGuard<'p> {
    type Target = Connection;
    fn deref(&self) -> &Connection {
        &self.guard
    }
}

/// A process-wide pool of SQLite connections to a single embedded
/// database file.
pub struct Pool {
    connections: Vec<Mutex<Connection>>,
    next: AtomicUsize,
    lock_retry: RetryPolicy,
}

impl Pool {
    /// Opens `size` connections to `path`, applies pragmas, and runs
    /// schema bootstrap once against the first connection.
    pub fn open(path: &Path, size: usize) -> Result<Self, StorageError> {
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }

        let mut connections = Vec::with_capacity(size.max(1));
        for i in 0..size.max(1) {
            let conn = Connection::open(path)?;
            configure_connection(&conn)?;
            if i == 0 {
                apply_migrations(&conn)?;
            }
            connections.push(Mutex::new(conn));
        }

        Ok(Pool {
            connections,
            next: AtomicUsize::new(0),
            lock_retry: RetryPolicy::db_lock_default(),
        })
    }

    /// In-memory pool for tests; each connection is a distinct `:memory:`
    /// database sharing nothing, so `size` should be 1 for tests that
    /// rely on a single logical database.
    pub fn open_in_memory() -> Result<Self, StorageError> {
        let conn = Connection::open_in_memory()?;
        configure_connection(&conn)?;
        apply_migrations(&conn)?;
        Ok(Pool {
            connections: vec![Mutex::new(conn)],
            next: AtomicUsize::new(0),
            lock_retry: RetryPolicy::db_lock_default(),
        })
    }

    fn pick(&self) -> &Mutex<Connection> {
        let idx = self.next.fetch_add(1, Ordering::Relaxed) % self.connections.len();
        &self.connections[idx]
    }

    /// Acquire a read connection. No transaction is opened.
    pub fn read(&self) -> Result<ReadGuard<'_>, StorageError> {
        let guard = self
            .pick()
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        Ok(ReadGuard { guard })
    }

    /// Runs `f` inside a transaction with lock-retry: commits on
    /// `Ok`, rolls back on `Err`. "database is locked" is retried with
    /// exponential backoff; schema errors (`no such table/column`) are
    /// never retried.
    pub fn transaction<T>(
        &self,
        f: impl Fn(&rusqlite::Transaction) -> Result<T, StorageError>,
    ) -> Result<T, StorageError> {
        self.lock_retry.execute(
            |e: &StorageError| match e {
                StorageError::Database(db_err) => {
                    is_lock_error(db_err) && !is_schema_error(db_err)
                }
                _ => false,
            },
            |_attempt| {
                let mut guard = self
                    .pick()
                    .lock()
                    .unwrap_or_else(|poisoned| poisoned.into_inner());
                let tx = guard.transaction()?;
                let result = f(&tx)?;
                tx.commit()?;
                Ok(result)
            },
        )
    }

    /// Checkpoints the WAL journal and reports frames reclaimed, for
    /// observability (spec.md §4.1: "the checkpoint operation returns
    /// bytes reclaimed").
    pub fn checkpoint(&self) -> Result<CheckpointReport, StorageError> {
        let guard = self
            .pick()
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        let (log_frames, checkpointed_frames): (i64, i64) = guard.query_row(
            "PRAGMA wal_checkpoint(TRUNCATE)",
            [],
            |row| Ok((row.get(1)?, row.get(2)?)),
        )?;
        let page_size: i64 = guard.query_row("PRAGMA page_size", [], |row| row.get(0))?;
        Ok(CheckpointReport {
            frames_in_log: log_frames.max(0) as u64,
            frames_checkpointed: checkpointed_frames.max(0) as u64,
            bytes_reclaimed: checkpointed_frames.max(0) as u64 * page_size.max(0) as u64,
        })
    }

    pub fn size(&self) -> usize {
        self.connections.len()
    }
}

#[derive(Debug, Clone, Copy)]
pub struct CheckpointReport {
    pub frames_in_log: u64,
    pub frames_checkpointed: u64,
    pub bytes_reclaimed: u64,
}

/// Retry wrapper used by components that need to retry DB-locked errors
/// outside the transaction helper above (e.g. a single non-transactional
/// write statement).
pub fn with_lock_retry<T>(
    policy: &RetryPolicy,
    mut op: impl FnMut() -> Result<T, StorageError>,
) -> Result<T, StorageError> {
    policy.execute(
        |e: &StorageError| match e {
            StorageError::Database(db_err) => is_lock_error(db_err) && !is_schema_error(db_err),
            _ => false,
        },
        |_attempt| op(),
    )
}

pub const DEFAULT_POOL_SIZE: usize = 5;
pub const DEFAULT_CHECKPOINT_INTERVAL: Duration = Duration::from_secs(300);

//! Error taxonomy (spec.md §7), kept by *kind* rather than by originating
//! component so the coordinator can map any failure to a recovery policy
//! without knowing which stage produced it.

use crate::model::{ParseError, ValidationError};
use crate::retry::CircuitOpen;

/// Top-level error the pipeline coordinator can return for a batch.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("parse error: {0}")]
    Parse(#[from] ParseError),

    #[error("classification produced an invalid output: {0}")]
    Validation(#[from] ValidationError),

    #[error("LLM output was malformed JSON after repair: {0}")]
    Json(String),

    #[error("adapter call failed transiently after retries exhausted: {0}")]
    TransientAdapter(String),

    #[error("adapter call failed permanently: {0}")]
    PermanentAdapter(String),

    #[error("database is locked, retries exhausted")]
    Concurrency,

    #[error(transparent)]
    CircuitOpen(#[from] CircuitOpen),

    #[error("storage error: {0}")]
    Storage(#[from] crate::storage::StorageError),

    #[error("no new emails to process")]
    EmptyBatch,
}

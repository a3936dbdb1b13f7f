//! Sink trait and error types
//!
//! A sink is any durable store that accepts completed records. Sinks do not
//! share a schema; each one only needs to accept the [`JobRecord`] shape.

use crate::storage::JobRecord;
use thiserror::Error;

/// Errors that can occur while writing to a sink
#[derive(Debug, Error)]
pub enum SinkError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("SQLite error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    #[error("Run not found: {0}")]
    RunNotFound(i64),
}

/// Result type for sink operations
pub type SinkResult<T> = Result<T, SinkError>;

/// Trait for record sinks
///
/// The persister owns every sink and calls them from a single task, so
/// implementations need `Send` but not `Sync`.
pub trait Sink: Send {
    /// Short name used in logs and reports
    fn name(&self) -> &str;

    /// Appends `records` in the given order
    fn append_batch(&mut self, records: &[JobRecord]) -> SinkResult<()>;

    /// Identity keys already stored by earlier runs
    ///
    /// Sinks that cannot answer cheaply return nothing.
    fn known_keys(&self) -> SinkResult<Vec<String>> {
        Ok(Vec::new())
    }
}

//! Error types for statistics refresh.

use thiserror::Error;

/// Errors raised while recomputing or persisting statistics.
#[derive(Debug, Error)]
pub enum StatsError {
    /// Scanning persisted records failed.
    #[error("Status scan error: {0}")]
    Scan(String),

    /// Writing or reading the snapshot failed.
    #[error("Snapshot store error: {0}")]
    Store(String),
}

//! Error types for batch persistence.

use thiserror::Error;

/// Errors raised by the destination document sink.
#[derive(Debug, Error)]
pub enum CommitError {
    /// The sink rejected or failed the batch write.
    #[error("Sink error: {0}")]
    Sink(String),

    /// Could not reach the sink.
    #[error("Sink connection error: {0}")]
    Connection(String),
}

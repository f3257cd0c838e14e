//! Error types for source retrieval.
//!
//! Every error here is fatal to the run: the pipeline aborts rather than
//! continuing with a partial view of the source.

use thiserror::Error;

/// Errors raised while reading from the source search store.
#[derive(Debug, Error)]
pub enum SourceError {
    /// Could not reach the store or the connection dropped mid-request.
    #[error("Source connection error: {0}")]
    Connection(String),

    /// The store rejected the query.
    #[error("Source query error: {0}")]
    Query(String),

    /// The response did not match the expected protocol shape.
    #[error("Source protocol error: {0}")]
    Protocol(String),
}

impl From<reqwest::Error> for SourceError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_connect() || err.is_timeout() {
            SourceError::Connection(err.to_string())
        } else {
            SourceError::Query(err.to_string())
        }
    }
}

//! Internal error type for the destination-side HTTP clients.
//!
//! Each trait implementation maps this into the error type its consumer
//! crate expects.

use thiserror::Error;

/// Errors from the document store, blob storage, and push channel clients.
#[derive(Debug, Error)]
pub enum StoreError {
    /// Could not reach the service.
    #[error("Store connection error: {0}")]
    Connection(String),

    /// The service rejected the request.
    #[error("Store request error: {0}")]
    Request(String),

    /// The response did not parse.
    #[error("Store response error: {0}")]
    Response(String),
}

impl From<reqwest::Error> for StoreError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_connect() || err.is_timeout() {
            StoreError::Connection(err.to_string())
        } else {
            StoreError::Request(err.to_string())
        }
    }
}

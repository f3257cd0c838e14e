//! Destination sink contract.

use async_trait::async_trait;

use crate::document::DocumentWrite;
use crate::error::CommitError;

/// Narrow persistence capability over the destination document store.
#[async_trait]
pub trait DocumentSink: Send + Sync {
    /// Persist a batch of documents in a single atomic write.
    ///
    /// Returns the number of documents committed. Writes are upserts keyed
    /// by `DocumentWrite::key`, so re-committing the same records is safe.
    async fn commit_batch(
        &self,
        collection: &str,
        writes: Vec<DocumentWrite>,
    ) -> Result<usize, CommitError>;

    /// Whether the store is reachable.
    async fn health(&self) -> bool;
}

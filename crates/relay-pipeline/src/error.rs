//! Error types for pipeline orchestration.
//!
//! Only fatal conditions surface here. Degrading, batch-skip, and
//! best-effort failures are handled where they occur and never abort a
//! run.

use thiserror::Error;

use relay_enrich::EnrichError;
use relay_source::SourceError;

/// Fatal pipeline errors.
#[derive(Debug, Error)]
pub enum PipelineError {
    /// Reading from the source store failed.
    #[error("Source error: {0}")]
    Source(#[from] SourceError),

    /// Obtaining the image API bearer token failed.
    #[error("Enrichment error: {0}")]
    Enrich(#[from] EnrichError),
}

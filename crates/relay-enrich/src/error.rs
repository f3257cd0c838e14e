//! Error types for image enrichment.

use thiserror::Error;

/// Errors raised while enriching records with images.
///
/// Only [`EnrichError::Auth`] is fatal to a run; everything else degrades
/// the affected record and processing continues.
#[derive(Debug, Error)]
pub enum EnrichError {
    /// Obtaining the bearer token failed. Aborts the whole run.
    #[error("Image auth error: {0}")]
    Auth(String),

    /// Image fetch failed at the transport level.
    #[error("Image fetch error: {0}")]
    Fetch(String),

    /// Image bytes could not be decoded or re-encoded.
    #[error("Image processing error: {0}")]
    Image(String),

    /// Blob upload failed.
    #[error("Blob upload error: {0}")]
    Upload(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = EnrichError::Auth("401".to_string());
        assert_eq!(err.to_string(), "Image auth error: 401");

        let err = EnrichError::Upload("bucket missing".to_string());
        assert_eq!(err.to_string(), "Blob upload error: bucket missing");
    }
}

//! Blob storage contract for annotated images.

use async_trait::async_trait;

use crate::error::EnrichError;

/// Location of an uploaded blob with its candidate public URLs.
#[derive(Debug, Clone)]
pub struct BlobRef {
    /// Bucket the blob landed in.
    pub bucket: String,

    /// Object path within the bucket.
    pub path: String,

    /// Public URL without an access token.
    pub url: String,

    /// Public URL carrying the download token query parameter.
    pub url_with_token: String,
}

impl BlobRef {
    /// The URL written onto records. The token-bearing form is preferred
    /// because it works for private buckets.
    pub fn preferred_url(&self) -> &str {
        if self.url_with_token.is_empty() {
            &self.url
        } else {
            &self.url_with_token
        }
    }
}

/// Narrow upload capability over blob storage.
#[async_trait]
pub trait BlobStore: Send + Sync {
    /// Upload bytes to `path`, attaching `download_token` as blob metadata.
    async fn upload(
        &self,
        bytes: Vec<u8>,
        path: &str,
        content_type: &str,
        download_token: &str,
    ) -> Result<BlobRef, EnrichError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_preferred_url_favors_token_form() {
        let blob = BlobRef {
            bucket: "b".to_string(),
            path: "p".to_string(),
            url: "https://blob/p".to_string(),
            url_with_token: "https://blob/p?token=t".to_string(),
        };
        assert_eq!(blob.preferred_url(), "https://blob/p?token=t");
    }

    #[test]
    fn test_preferred_url_falls_back() {
        let blob = BlobRef {
            bucket: "b".to_string(),
            path: "p".to_string(),
            url: "https://blob/p".to_string(),
            url_with_token: String::new(),
        };
        assert_eq!(blob.preferred_url(), "https://blob/p");
    }
}

//! HTTP client for blob storage uploads.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Client, Url};
use tracing::info;

use relay_enrich::{BlobRef, BlobStore, EnrichError};
use relay_types::BlobSettings;

use crate::error::StoreError;

/// Header carrying the download token stored as blob metadata.
const DOWNLOAD_TOKEN_HEADER: &str = "x-download-token";

/// Production implementation of [`BlobStore`].
pub struct HttpBlobStore {
    client: Client,
    base_url: String,
    bucket: String,
}

impl HttpBlobStore {
    /// Build a client from blob storage settings.
    pub fn new(settings: &BlobSettings) -> Result<Self, StoreError> {
        let client = Client::builder()
            .timeout(Duration::from_secs(60))
            .build()
            .map_err(|e| StoreError::Connection(e.to_string()))?;

        Ok(Self {
            client,
            base_url: settings.base_url.trim_end_matches('/').to_string(),
            bucket: settings.bucket.clone(),
        })
    }

    fn upload_url(&self, path: &str) -> Result<Url, StoreError> {
        let mut url = Url::parse(&format!("{}/upload/b/{}/o", self.base_url, self.bucket))
            .map_err(|e| StoreError::Request(format!("bad blob url: {}", e)))?;
        url.query_pairs_mut().append_pair("name", path);
        Ok(url)
    }

    /// Public media URL for an object. The object path is encoded as a
    /// single segment, slashes included.
    fn media_url(&self, path: &str) -> Result<Url, StoreError> {
        let mut url = Url::parse(&format!("{}/v0/b/{}/o", self.base_url, self.bucket))
            .map_err(|e| StoreError::Request(format!("bad blob url: {}", e)))?;
        {
            let mut segments = url
                .path_segments_mut()
                .map_err(|_| StoreError::Request("blob base url cannot carry a path".into()))?;
            segments.push(path);
        }
        url.query_pairs_mut().append_pair("alt", "media");
        Ok(url)
    }
}

#[async_trait]
impl BlobStore for HttpBlobStore {
    async fn upload(
        &self,
        bytes: Vec<u8>,
        path: &str,
        content_type: &str,
        download_token: &str,
    ) -> Result<BlobRef, EnrichError> {
        if self.bucket.is_empty() {
            return Err(EnrichError::Upload("blob bucket not configured".into()));
        }

        let url = self
            .upload_url(path)
            .map_err(|e| EnrichError::Upload(e.to_string()))?;

        let response = self
            .client
            .post(url)
            .header(reqwest::header::CONTENT_TYPE, content_type)
            .header(DOWNLOAD_TOKEN_HEADER, download_token)
            .body(bytes)
            .send()
            .await
            .map_err(|e| EnrichError::Upload(e.to_string()))?;

        if !response.status().is_success() {
            return Err(EnrichError::Upload(format!(
                "upload returned HTTP {}",
                response.status()
            )));
        }

        let media = self
            .media_url(path)
            .map_err(|e| EnrichError::Upload(e.to_string()))?;
        let mut with_token = media.clone();
        with_token
            .query_pairs_mut()
            .append_pair("token", download_token);

        info!(bucket = %self.bucket, path = %path, "Uploaded image to blob storage");

        Ok(BlobRef {
            bucket: self.bucket.clone(),
            path: path.to_string(),
            url: media.into(),
            url_with_token: with_token.into(),
        })
    }
}

//! Authenticated image API client.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Client, StatusCode, Url};
use secrecy::ExposeSecret;
use tracing::{debug, warn};

use relay_types::ImageSettings;

use crate::error::EnrichError;

/// Reserved collection-name prefix for backing data streams.
///
/// Collections without it get an alternate fetch URL with the prefix
/// added, used only as a 404 fallback.
const DATA_STREAM_PREFIX: &str = ".ds-";

/// Bearer token obtained once per run.
#[derive(Clone)]
pub struct BearerToken(String);

impl BearerToken {
    pub fn new(token: impl Into<String>) -> Self {
        Self(token.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Debug for BearerToken {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        // Token value stays out of logs.
        f.write_str("BearerToken(***)")
    }
}

/// Image bytes with their reported content type.
#[derive(Debug, Clone)]
pub struct FetchedImage {
    pub bytes: Vec<u8>,
    pub content_type: String,
}

/// Narrow fetch capability over the image API.
#[async_trait]
pub trait ImageFetch: Send + Sync {
    /// Obtain a bearer token for this run. Failure aborts the run.
    async fn authorize(&self) -> Result<BearerToken, EnrichError>;

    /// Fetch the image for a record.
    ///
    /// `Ok(None)` means the API had no usable image for the record; the
    /// record continues through the pipeline without one.
    async fn fetch(
        &self,
        token: &BearerToken,
        collection: &str,
        id: &str,
    ) -> Result<Option<FetchedImage>, EnrichError>;
}

/// HTTP implementation of [`ImageFetch`].
pub struct ImageApiClient {
    client: Client,
    auth_url: String,
    username: String,
    password: secrecy::SecretString,
    base_url: String,
}

impl ImageApiClient {
    /// Build a client from image API settings.
    pub fn new(settings: &ImageSettings) -> Result<Self, EnrichError> {
        let client = Client::builder()
            .timeout(Duration::from_secs(20))
            .danger_accept_invalid_certs(settings.accept_invalid_certs)
            .build()
            .map_err(|e| EnrichError::Fetch(e.to_string()))?;

        Ok(Self {
            client,
            auth_url: settings.auth_url.clone(),
            username: settings.username.clone(),
            password: settings.password.clone(),
            base_url: settings.base_url.clone(),
        })
    }

    /// Primary fetch URL for a record's image.
    pub fn image_url(&self, collection: &str, id: &str) -> Result<Url, EnrichError> {
        let mut url = Url::parse(self.base_url.trim().trim_end_matches('/'))
            .map_err(|e| EnrichError::Fetch(format!("bad image base url: {}", e)))?;
        {
            let mut path = url
                .path_segments_mut()
                .map_err(|_| EnrichError::Fetch("image base url cannot carry a path".into()))?;
            path.extend([collection, id]);
        }
        url.query_pairs_mut().append_pair("overlay", "false");
        Ok(url)
    }

    /// Alternate URL with the data-stream prefix added.
    pub fn alternate_image_url(&self, collection: &str, id: &str) -> Result<Url, EnrichError> {
        if collection.starts_with(DATA_STREAM_PREFIX) {
            return self.image_url(collection, id);
        }
        self.image_url(&format!("{}{}", DATA_STREAM_PREFIX, collection), id)
    }

    async fn get_image(
        &self,
        url: Url,
        token: &BearerToken,
    ) -> Result<reqwest::Response, EnrichError> {
        self.client
            .get(url)
            .bearer_auth(token.as_str())
            .send()
            .await
            .map_err(|e| EnrichError::Fetch(e.to_string()))
    }
}

#[async_trait]
impl ImageFetch for ImageApiClient {
    async fn authorize(&self) -> Result<BearerToken, EnrichError> {
        let response = self
            .client
            .post(&self.auth_url)
            .json(&serde_json::json!({
                "username": self.username,
                "password": self.password.expose_secret(),
            }))
            .send()
            .await
            .map_err(|e| EnrichError::Auth(e.to_string()))?;

        if !response.status().is_success() {
            return Err(EnrichError::Auth(format!(
                "authorization returned HTTP {}",
                response.status()
            )));
        }

        let body = response
            .text()
            .await
            .map_err(|e| EnrichError::Auth(e.to_string()))?;
        let token = body.trim().trim_matches('"').to_string();
        if token.is_empty() {
            return Err(EnrichError::Auth("authorization returned empty token".into()));
        }

        debug!("Obtained image API bearer token");
        Ok(BearerToken::new(token))
    }

    async fn fetch(
        &self,
        token: &BearerToken,
        collection: &str,
        id: &str,
    ) -> Result<Option<FetchedImage>, EnrichError> {
        let url = self.image_url(collection, id)?;
        let mut response = self.get_image(url, token).await?;

        if response.status() == StatusCode::NOT_FOUND {
            let alt_url = self.alternate_image_url(collection, id)?;
            warn!(
                collection = %collection,
                id = %id,
                alt_url = %alt_url,
                "Primary image URL returned 404, retrying alternate form"
            );
            response = self.get_image(alt_url, token).await?;
        }

        if !response.status().is_success() {
            warn!(
                collection = %collection,
                id = %id,
                status = %response.status(),
                "No image available"
            );
            return Ok(None);
        }

        let content_type = response
            .headers()
            .get(reqwest::header::CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .unwrap_or("image/jpeg")
            .to_string();

        let bytes = response
            .bytes()
            .await
            .map_err(|e| EnrichError::Fetch(e.to_string()))?;

        if bytes.is_empty() {
            warn!(collection = %collection, id = %id, "Image response had an empty body");
            return Ok(None);
        }

        Ok(Some(FetchedImage {
            bytes: bytes.to_vec(),
            content_type,
        }))
    }
}

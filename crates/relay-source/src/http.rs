//! HTTP client for the source search store.

use std::collections::HashMap;
use std::time::Duration;

use async_trait::async_trait;
use backoff::backoff::Backoff;
use backoff::ExponentialBackoff;
use reqwest::{Client, Url};
use secrecy::{ExposeSecret, SecretString};
use serde::Deserialize;
use serde_json::{json, Value};
use tracing::{debug, warn};

use relay_types::{EventRecord, SourceSettings};

use crate::error::SourceError;
use crate::search::{SearchPage, SearchRequest, SourceSearch};

/// How long the store should keep a scan cursor alive between pages.
const CURSOR_KEEPALIVE: &str = "1m";

/// Production implementation of [`SourceSearch`] over HTTP.
///
/// Transport failures are retried with exponential backoff; this is the
/// only layer in the system with client-provided retry.
pub struct HttpSourceClient {
    client: Client,
    base_url: String,
    username: Option<String>,
    password: Option<SecretString>,
    max_retries: u32,
}

#[derive(Deserialize)]
struct SearchResponse {
    #[serde(rename = "_scroll_id", default)]
    scroll_id: Option<String>,
    hits: HitsEnvelope,
}

#[derive(Deserialize)]
struct HitsEnvelope {
    hits: Vec<Hit>,
}

#[derive(Deserialize)]
struct Hit {
    #[serde(rename = "_index")]
    index: String,
    #[serde(rename = "_id")]
    id: String,
    #[serde(rename = "_score", default)]
    score: Option<f64>,
    #[serde(rename = "_source", default)]
    source: HashMap<String, Value>,
}

#[derive(Deserialize)]
struct HealthResponse {
    status: String,
}

impl HttpSourceClient {
    /// Build a client from connection settings.
    pub fn new(settings: &SourceSettings) -> Result<Self, SourceError> {
        let client = Client::builder()
            .timeout(Duration::from_secs(30))
            .danger_accept_invalid_certs(!settings.verify_certs)
            .build()
            .map_err(|e| SourceError::Connection(e.to_string()))?;

        Ok(Self {
            client,
            base_url: settings.url(),
            username: settings.username.clone(),
            password: settings.password.clone(),
            max_retries: 3,
        })
    }

    fn endpoint(&self, segments: &[&str]) -> Result<Url, SourceError> {
        let mut url = Url::parse(&self.base_url)
            .map_err(|e| SourceError::Connection(format!("bad base url: {}", e)))?;
        {
            let mut path = url
                .path_segments_mut()
                .map_err(|_| SourceError::Connection("base url cannot carry a path".into()))?;
            path.extend(segments);
        }
        Ok(url)
    }

    /// POST a JSON body, retrying transport failures with backoff.
    async fn post_json(&self, url: Url, body: &Value) -> Result<SearchResponse, SourceError> {
        let mut backoff = ExponentialBackoff {
            max_elapsed_time: Some(Duration::from_secs(30)),
            ..Default::default()
        };
        let mut attempts = 0;

        loop {
            attempts += 1;
            match self.try_post_json(url.clone(), body).await {
                Ok(response) => return Ok(response),
                Err(err @ SourceError::Connection(_)) if attempts < self.max_retries => {
                    match backoff.next_backoff() {
                        Some(delay) => {
                            warn!(
                                error = %err,
                                retry_in_ms = delay.as_millis(),
                                "Source request failed, retrying"
                            );
                            tokio::time::sleep(delay).await;
                        }
                        None => return Err(err),
                    }
                }
                Err(err) => return Err(err),
            }
        }
    }

    async fn try_post_json(&self, url: Url, body: &Value) -> Result<SearchResponse, SourceError> {
        let mut request = self.client.post(url).json(body);
        if let Some(username) = &self.username {
            let password = self.password.as_ref().map(|p| p.expose_secret().to_string());
            request = request.basic_auth(username, password);
        }

        let response = request.send().await?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(SourceError::Query(format!("HTTP {}: {}", status, body)));
        }

        response
            .json::<SearchResponse>()
            .await
            .map_err(|e| SourceError::Protocol(e.to_string()))
    }
}

fn into_page(response: SearchResponse) -> SearchPage {
    let records = response
        .hits
        .hits
        .into_iter()
        .map(|hit| {
            let mut record = EventRecord::new(hit.index, hit.id).with_fields(hit.source);
            record.score = hit.score;
            record
        })
        .collect();

    SearchPage {
        records,
        cursor: response.scroll_id,
    }
}

#[async_trait]
impl SourceSearch for HttpSourceClient {
    async fn search(&self, request: SearchRequest) -> Result<SearchPage, SourceError> {
        let mut url = self.endpoint(&[&request.collection, "_search"])?;
        if request.open_cursor {
            url.query_pairs_mut().append_pair("scroll", CURSOR_KEEPALIVE);
        }

        let mut body = json!({
            "query": request.filter,
            "size": request.page_size,
        });
        if let Some((field, order)) = &request.sort {
            body["sort"] = json!([{ field: { "order": order.as_str() } }]);
        }

        debug!(collection = %request.collection, size = request.page_size, "Source search");
        let response = self.post_json(url, &body).await?;
        Ok(into_page(response))
    }

    async fn scan_next(&self, cursor: &str) -> Result<SearchPage, SourceError> {
        let url = self.endpoint(&["_search", "scroll"])?;
        let body = json!({
            "scroll": CURSOR_KEEPALIVE,
            "scroll_id": cursor,
        });

        let response = self.post_json(url, &body).await?;
        Ok(into_page(response))
    }

    async fn health(&self) -> bool {
        let url = match self.endpoint(&["_cluster", "health"]) {
            Ok(url) => url,
            Err(_) => return false,
        };

        let mut request = self.client.get(url);
        if let Some(username) = &self.username {
            let password = self.password.as_ref().map(|p| p.expose_secret().to_string());
            request = request.basic_auth(username, password);
        }

        match request.send().await {
            Ok(response) if response.status().is_success() => {
                match response.json::<HealthResponse>().await {
                    Ok(health) => matches!(health.status.as_str(), "green" | "yellow"),
                    Err(_) => false,
                }
            }
            _ => false,
        }
    }
}

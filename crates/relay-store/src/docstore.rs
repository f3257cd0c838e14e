//! HTTP client for the destination document store.
//!
//! One client implements every narrow capability the pipeline consumes:
//! batched atomic writes, responder directory queries, status scans, and
//! the statistics snapshot document.

use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use reqwest::{Client, StatusCode, Url};
use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};
use serde_json::{json, Map, Value};
use tracing::{debug, info};

use relay_commit::{CommitError, DocumentSink, DocumentWrite};
use relay_notify::{NotifyError, Responder, ResponderDirectory};
use relay_stats::{SnapshotStore, StatsError, StatusSnapshot, StatusSource};
use relay_types::DocStoreSettings;

use crate::error::StoreError;

/// Production client for the destination document store REST surface.
pub struct HttpDocStore {
    client: Client,
    base_url: String,
    api_key: Option<SecretString>,
    events_collection: String,
    responders_collection: String,
    stats_collection: String,
}

#[derive(Serialize)]
struct BatchWriteRequest<'a> {
    writes: &'a [WireWrite],
}

#[derive(Serialize)]
struct WireWrite {
    key: String,
    fields: Map<String, Value>,
}

#[derive(Deserialize)]
struct BatchWriteResponse {
    committed: usize,
}

#[derive(Serialize)]
struct QueryRequest {
    filters: Vec<QueryFilter>,
    #[serde(skip_serializing_if = "Option::is_none")]
    select: Option<Vec<String>>,
}

#[derive(Serialize)]
struct QueryFilter {
    field: String,
    op: String,
    value: Value,
}

#[derive(Deserialize)]
struct QueryResponse {
    #[serde(default)]
    documents: Vec<QueryDocument>,
}

#[derive(Deserialize)]
struct QueryDocument {
    id: String,
    #[serde(default)]
    fields: Map<String, Value>,
}

impl HttpDocStore {
    /// Build a client from document store settings.
    pub fn new(settings: &DocStoreSettings) -> Result<Self, StoreError> {
        let client = Client::builder()
            .timeout(Duration::from_secs(30))
            .build()
            .map_err(|e| StoreError::Connection(e.to_string()))?;

        Ok(Self {
            client,
            base_url: settings.base_url.trim_end_matches('/').to_string(),
            api_key: settings.api_key.clone(),
            events_collection: settings.events_collection.clone(),
            responders_collection: settings.responders_collection.clone(),
            stats_collection: settings.stats_collection.clone(),
        })
    }

    fn endpoint(&self, suffix: &str) -> Result<Url, StoreError> {
        Url::parse(&format!("{}/v1/{}", self.base_url, suffix))
            .map_err(|e| StoreError::Request(format!("bad store url: {}", e)))
    }

    fn authorized(&self, request: reqwest::RequestBuilder) -> reqwest::RequestBuilder {
        match &self.api_key {
            Some(key) => request.bearer_auth(key.expose_secret()),
            None => request,
        }
    }

    async fn query(
        &self,
        collection: &str,
        filters: Vec<QueryFilter>,
        select: Option<Vec<String>>,
    ) -> Result<Vec<QueryDocument>, StoreError> {
        let url = self.endpoint(&format!("{}:query", collection))?;
        let request = QueryRequest { filters, select };

        let response = self
            .authorized(self.client.post(url))
            .json(&request)
            .send()
            .await?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(StoreError::Request(format!("HTTP {}: {}", status, body)));
        }

        let parsed: QueryResponse = response
            .json()
            .await
            .map_err(|e| StoreError::Response(e.to_string()))?;
        Ok(parsed.documents)
    }

    async fn patch(
        &self,
        collection: &str,
        id: &str,
        fields: Value,
    ) -> Result<(), StoreError> {
        let url = self.endpoint(&format!("{}/{}", collection, id))?;
        let response = self
            .authorized(self.client.patch(url))
            .json(&fields)
            .send()
            .await?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(StoreError::Request(format!("HTTP {}: {}", status, body)));
        }
        Ok(())
    }

    fn eq_filter(field: &str, value: Value) -> QueryFilter {
        QueryFilter {
            field: field.to_string(),
            op: "eq".to_string(),
            value,
        }
    }
}

#[async_trait]
impl DocumentSink for HttpDocStore {
    async fn commit_batch(
        &self,
        collection: &str,
        writes: Vec<DocumentWrite>,
    ) -> Result<usize, CommitError> {
        if writes.is_empty() {
            return Ok(0);
        }

        let wire: Vec<WireWrite> = writes
            .into_iter()
            .map(|w| WireWrite {
                key: w.key,
                fields: w.fields,
            })
            .collect();

        let url = self
            .endpoint(&format!("{}:batchWrite", collection))
            .map_err(|e| CommitError::Connection(e.to_string()))?;

        let response = self
            .authorized(self.client.post(url))
            .json(&BatchWriteRequest { writes: &wire })
            .send()
            .await
            .map_err(|e| CommitError::Connection(e.to_string()))?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(CommitError::Sink(format!("HTTP {}: {}", status, body)));
        }

        let parsed: BatchWriteResponse = response
            .json()
            .await
            .map_err(|e| CommitError::Sink(e.to_string()))?;

        debug!(collection = %collection, committed = parsed.committed, "Batch write accepted");
        Ok(parsed.committed)
    }

    async fn health(&self) -> bool {
        let url = match Url::parse(&format!("{}/healthz", self.base_url)) {
            Ok(url) => url,
            Err(_) => return false,
        };
        matches!(
            self.authorized(self.client.get(url)).send().await,
            Ok(response) if response.status().is_success()
        )
    }
}

#[async_trait]
impl ResponderDirectory for HttpDocStore {
    async fn online_tokens(&self, filters: &[(String, String)]) -> Result<Vec<String>, NotifyError> {
        let mut query_filters = vec![Self::eq_filter("status", json!("online"))];
        for (field, value) in filters {
            query_filters.push(Self::eq_filter(field, json!(value)));
        }

        let documents = self
            .query(&self.responders_collection, query_filters, None)
            .await
            .map_err(|e| NotifyError::Directory(e.to_string()))?;

        let tokens: Vec<String> = documents
            .into_iter()
            .filter_map(|doc| {
                serde_json::from_value::<Responder>(Value::Object(doc.fields)).ok()
            })
            .filter_map(|responder| responder.usable_token().map(String::from))
            .collect();

        debug!(count = tokens.len(), "Fetched online responder tokens");
        Ok(tokens)
    }

    async fn flag_invalid(&self, token: &str) -> Result<(), NotifyError> {
        let documents = self
            .query(
                &self.responders_collection,
                vec![Self::eq_filter("notification_token", json!(token))],
                None,
            )
            .await
            .map_err(|e| NotifyError::Directory(e.to_string()))?;

        for doc in documents {
            self.patch(
                &self.responders_collection,
                &doc.id,
                json!({
                    "status": "offline",
                    "token_invalid": true,
                    "last_token_error": Utc::now().to_rfc3339(),
                }),
            )
            .await
            .map_err(|e| NotifyError::Directory(e.to_string()))?;
            info!(responder = %doc.id, "Marked responder offline due to invalid token");
        }
        Ok(())
    }

    async fn cleanup_flagged(&self) -> Result<usize, NotifyError> {
        let documents = self
            .query(
                &self.responders_collection,
                vec![Self::eq_filter("token_invalid", json!(true))],
                None,
            )
            .await
            .map_err(|e| NotifyError::Directory(e.to_string()))?;

        let mut cleaned = 0;
        for doc in documents {
            self.patch(
                &self.responders_collection,
                &doc.id,
                json!({
                    "status": "offline",
                    "notification_token": Value::Null,
                    "token_invalid": false,
                    "last_cleanup": Utc::now().to_rfc3339(),
                }),
            )
            .await
            .map_err(|e| NotifyError::Directory(e.to_string()))?;
            cleaned += 1;
        }
        Ok(cleaned)
    }
}

#[async_trait]
impl StatusSource for HttpDocStore {
    async fn fetch_statuses(
        &self,
        created_after: Option<DateTime<Utc>>,
    ) -> Result<Vec<String>, StatsError> {
        let mut filters = Vec::new();
        if let Some(cutoff) = created_after {
            filters.push(QueryFilter {
                field: "created_at".to_string(),
                op: "gte".to_string(),
                value: json!(cutoff.to_rfc3339()),
            });
        }

        let documents = self
            .query(
                &self.events_collection,
                filters,
                Some(vec!["status".to_string()]),
            )
            .await
            .map_err(|e| StatsError::Scan(e.to_string()))?;

        Ok(documents
            .iter()
            .map(|doc| {
                doc.fields
                    .get("status")
                    .and_then(Value::as_str)
                    .unwrap_or("")
                    .to_string()
            })
            .collect())
    }
}

#[async_trait]
impl SnapshotStore for HttpDocStore {
    async fn put_snapshot(&self, id: &str, snapshot: &StatusSnapshot) -> Result<(), StatsError> {
        let body = serde_json::to_value(snapshot).map_err(|e| StatsError::Store(e.to_string()))?;
        self.patch(&self.stats_collection, id, body)
            .await
            .map_err(|e| StatsError::Store(e.to_string()))
    }

    async fn get_snapshot(&self, id: &str) -> Result<Option<StatusSnapshot>, StatsError> {
        let url = self
            .endpoint(&format!("{}/{}", self.stats_collection, id))
            .map_err(|e| StatsError::Store(e.to_string()))?;

        let response = self
            .authorized(self.client.get(url))
            .send()
            .await
            .map_err(|e| StatsError::Store(e.to_string()))?;

        if response.status() == StatusCode::NOT_FOUND {
            return Ok(None);
        }
        if !response.status().is_success() {
            return Err(StatsError::Store(format!("HTTP {}", response.status())));
        }

        response
            .json::<StatusSnapshot>()
            .await
            .map(Some)
            .map_err(|e| StatsError::Store(e.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn store() -> HttpDocStore {
        HttpDocStore::new(&DocStoreSettings::default()).unwrap()
    }

    #[test]
    fn test_endpoint_shapes() {
        let store = store();
        assert_eq!(
            store.endpoint("events:batchWrite").unwrap().as_str(),
            "http://localhost:8086/v1/events:batchWrite"
        );
        assert_eq!(
            store.endpoint("event_statistics/current").unwrap().as_str(),
            "http://localhost:8086/v1/event_statistics/current"
        );
    }

    #[test]
    fn test_query_response_parsing() {
        let raw = r#"{
            "documents": [
                {"id": "r1", "fields": {"notification_token": "tok-1", "status": "online"}},
                {"id": "r2", "fields": {"status": "online"}}
            ]
        }"#;
        let parsed: QueryResponse = serde_json::from_str(raw).unwrap();
        assert_eq!(parsed.documents.len(), 2);
        assert_eq!(parsed.documents[0].id, "r1");
        assert!(parsed.documents[1].fields.get("notification_token").is_none());
    }

    #[test]
    fn test_responder_parse_from_fields() {
        let raw = r#"{"notification_token": " tok-9 ", "status": "online"}"#;
        let responder: Responder = serde_json::from_str(raw).unwrap();
        assert_eq!(responder.usable_token(), Some("tok-9"));
    }

    #[test]
    fn test_query_request_omits_empty_select() {
        let request = QueryRequest {
            filters: vec![HttpDocStore::eq_filter("status", json!("online"))],
            select: None,
        };
        let encoded = serde_json::to_value(&request).unwrap();
        assert!(encoded.get("select").is_none());
        assert_eq!(encoded["filters"][0]["op"], "eq");
    }
}

//! HTTP client for the push notification channel.
//!
//! Sends are token-at-a-time so the server's per-token verdict (including
//! "not found"/"invalid" rejections) maps cleanly onto the report.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use secrecy::{ExposeSecret, SecretString};
use serde::Deserialize;
use serde_json::json;
use tracing::debug;

use relay_notify::{NotifyError, PushChannel, PushReport, SendStatus, TokenSend};
use relay_types::PushSettings;

use crate::error::StoreError;

/// Production implementation of [`PushChannel`].
pub struct HttpPushChannel {
    client: Client,
    endpoint: String,
    api_key: Option<SecretString>,
}

#[derive(Deserialize)]
struct SendResponse {
    message_id: String,
}

impl HttpPushChannel {
    /// Build a client from push settings.
    pub fn new(settings: &PushSettings) -> Result<Self, StoreError> {
        let client = Client::builder()
            .timeout(Duration::from_secs(15))
            .build()
            .map_err(|e| StoreError::Connection(e.to_string()))?;

        Ok(Self {
            client,
            endpoint: settings.endpoint.clone(),
            api_key: settings.api_key.clone(),
        })
    }

    fn authorized(&self, request: reqwest::RequestBuilder) -> reqwest::RequestBuilder {
        match &self.api_key {
            Some(key) => request.bearer_auth(key.expose_secret()),
            None => request,
        }
    }

    async fn send_one(&self, payload: serde_json::Value) -> Result<String, String> {
        let response = self
            .authorized(self.client.post(&self.endpoint))
            .json(&payload)
            .send()
            .await
            .map_err(|e| e.to_string())?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(format!("HTTP {}: {}", status, body));
        }

        response
            .json::<SendResponse>()
            .await
            .map(|r| r.message_id)
            .map_err(|e| e.to_string())
    }
}

#[async_trait]
impl PushChannel for HttpPushChannel {
    async fn send_to_tokens(
        &self,
        tokens: &[String],
        title: &str,
        body: &str,
    ) -> Result<PushReport, NotifyError> {
        let mut report = PushReport::default();

        for token in tokens {
            let payload = json!({
                "token": token,
                "title": title,
                "body": body,
            });

            let status = match self.send_one(payload).await {
                Ok(message_id) => {
                    debug!(token_prefix = %truncate(token), "Notification accepted");
                    SendStatus::Sent { message_id }
                }
                Err(error) => SendStatus::Failed { error },
            };

            report.results.push(TokenSend {
                token: token.clone(),
                status,
            });
        }

        Ok(report)
    }

    async fn send_to_topic(
        &self,
        topic: &str,
        title: &str,
        body: &str,
    ) -> Result<String, NotifyError> {
        let payload = json!({
            "topic": topic,
            "title": title,
            "body": body,
        });

        self.send_one(payload)
            .await
            .map_err(NotifyError::Channel)
    }
}

/// Shorten a token for log lines.
fn truncate(token: &str) -> String {
    if token.len() <= 20 {
        token.to_string()
    } else {
        format!("{}...", &token[..20])
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_truncate_keeps_short_tokens() {
        assert_eq!(truncate("short"), "short");
    }

    #[test]
    fn test_truncate_shortens_long_tokens() {
        let token = "a".repeat(64);
        let shown = truncate(&token);
        assert_eq!(shown.len(), 23);
        assert!(shown.ends_with("..."));
    }

    #[test]
    fn test_send_response_parsing() {
        let parsed: SendResponse = serde_json::from_str(r#"{"message_id": "m-1"}"#).unwrap();
        assert_eq!(parsed.message_id, "m-1");
    }
}

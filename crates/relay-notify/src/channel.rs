//! Push channel contract.

use async_trait::async_trait;

use crate::error::NotifyError;

/// Outcome of sending to one token.
#[derive(Debug, Clone)]
pub enum SendStatus {
    /// Accepted by the channel.
    Sent { message_id: String },
    /// Rejected or failed for this token.
    Failed { error: String },
}

/// Per-token result within one send call.
#[derive(Debug, Clone)]
pub struct TokenSend {
    pub token: String,
    pub status: SendStatus,
}

impl TokenSend {
    /// Whether the channel reported this token's address as gone or
    /// malformed, meaning the responder should be flagged for cleanup.
    pub fn is_invalid_token(&self) -> bool {
        match &self.status {
            SendStatus::Sent { .. } => false,
            SendStatus::Failed { error } => {
                let error = error.to_lowercase();
                error.contains("not found") || error.contains("invalid")
            }
        }
    }
}

/// Aggregate result of one send call.
#[derive(Debug, Clone, Default)]
pub struct PushReport {
    pub results: Vec<TokenSend>,
}

impl PushReport {
    pub fn success_count(&self) -> usize {
        self.results
            .iter()
            .filter(|r| matches!(r.status, SendStatus::Sent { .. }))
            .count()
    }

    pub fn failure_count(&self) -> usize {
        self.results.len() - self.success_count()
    }
}

/// Narrow send capability over the message channel.
///
/// Integrations differ in transport; the pipeline only relies on this
/// "send to a list of tokens" contract.
#[async_trait]
pub trait PushChannel: Send + Sync {
    /// Send one message to each token, reporting per-token outcomes.
    ///
    /// Per-token failures live inside the report; an `Err` means the
    /// channel itself was unusable.
    async fn send_to_tokens(
        &self,
        tokens: &[String],
        title: &str,
        body: &str,
    ) -> Result<PushReport, NotifyError>;

    /// Topic-addressed variant.
    async fn send_to_topic(
        &self,
        topic: &str,
        title: &str,
        body: &str,
    ) -> Result<String, NotifyError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sent(token: &str) -> TokenSend {
        TokenSend {
            token: token.to_string(),
            status: SendStatus::Sent {
                message_id: "m1".to_string(),
            },
        }
    }

    fn failed(token: &str, error: &str) -> TokenSend {
        TokenSend {
            token: token.to_string(),
            status: SendStatus::Failed {
                error: error.to_string(),
            },
        }
    }

    #[test]
    fn test_report_counts() {
        let report = PushReport {
            results: vec![sent("a"), failed("b", "timeout"), sent("c")],
        };
        assert_eq!(report.success_count(), 2);
        assert_eq!(report.failure_count(), 1);
    }

    #[test]
    fn test_invalid_token_detection() {
        assert!(failed("t", "Requested entity was NOT FOUND").is_invalid_token());
        assert!(failed("t", "invalid registration token").is_invalid_token());
        assert!(!failed("t", "connection reset").is_invalid_token());
        assert!(!sent("t").is_invalid_token());
    }
}

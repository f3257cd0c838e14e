//! Commit-gated notification fanout.

use std::collections::HashSet;
use std::sync::Arc;

use tracing::{info, warn};

use relay_commit::Pacer;

use crate::channel::PushChannel;
use crate::error::NotifyError;
use crate::responder::ResponderDirectory;

/// Title on every batch alert.
const ALERT_TITLE: &str = "Security Alert";

/// Aggregate counts from one fanout.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FanoutReport {
    pub success_count: usize,
    pub failure_count: usize,
    pub total_tokens: usize,
}

/// Sends one alert per successfully committed batch to current online
/// responders, in capped sub-batches.
pub struct NotificationFanout {
    directory: Arc<dyn ResponderDirectory>,
    channel: Arc<dyn PushChannel>,
    pacer: Arc<dyn Pacer>,
    sub_batch_size: usize,
}

impl NotificationFanout {
    pub fn new(
        directory: Arc<dyn ResponderDirectory>,
        channel: Arc<dyn PushChannel>,
        pacer: Arc<dyn Pacer>,
        sub_batch_size: usize,
    ) -> Self {
        Self {
            directory,
            channel,
            pacer,
            sub_batch_size: sub_batch_size.max(1),
        }
    }

    /// Alert online responders about one committed batch.
    ///
    /// Triggered once per successful batch, not once per record. Zero
    /// available tokens is a zero-count result, not an error.
    pub async fn notify_batch(
        &self,
        committed: usize,
        batch_seq: Option<usize>,
    ) -> Result<FanoutReport, NotifyError> {
        let body = match batch_seq {
            Some(seq) => format!("{} new security events detected (batch {}).", committed, seq),
            None => format!("{} new security events detected.", committed),
        };
        self.notify(ALERT_TITLE, &body, &[]).await
    }

    /// Send an alert to online responders matching the extra filters.
    pub async fn notify(
        &self,
        title: &str,
        body: &str,
        filters: &[(String, String)],
    ) -> Result<FanoutReport, NotifyError> {
        let tokens = self.directory.online_tokens(filters).await?;
        let tokens = dedup_preserving_order(tokens);

        if tokens.is_empty() {
            warn!("No online responder tokens available");
            return Ok(FanoutReport::default());
        }

        let mut report = FanoutReport {
            total_tokens: tokens.len(),
            ..Default::default()
        };

        let chunk_count = tokens.len().div_ceil(self.sub_batch_size);
        for (index, chunk) in tokens.chunks(self.sub_batch_size).enumerate() {
            let push = self.channel.send_to_tokens(chunk, title, body).await?;

            report.success_count += push.success_count();
            report.failure_count += push.failure_count();

            for result in &push.results {
                if result.is_invalid_token() {
                    if let Err(e) = self.directory.flag_invalid(&result.token).await {
                        warn!(error = %e, "Failed to flag invalid token");
                    }
                }
            }

            if index + 1 < chunk_count {
                self.pacer.pause().await;
            }
        }

        info!(
            success = report.success_count,
            failure = report.failure_count,
            total = report.total_tokens,
            "Responder notification summary"
        );
        Ok(report)
    }

    /// Clear all responders previously flagged with invalid tokens.
    ///
    /// Separate maintenance operation, invoked explicitly.
    pub async fn cleanup_invalid_tokens(&self) -> Result<usize, NotifyError> {
        let cleaned = self.directory.cleanup_flagged().await?;
        info!(cleaned = cleaned, "Cleaned up invalid responder tokens");
        Ok(cleaned)
    }
}

fn dedup_preserving_order(tokens: Vec<String>) -> Vec<String> {
    let mut seen = HashSet::new();
    tokens
        .into_iter()
        .filter(|token| !token.trim().is_empty() && seen.insert(token.clone()))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::channel::{PushReport, SendStatus, TokenSend};
    use async_trait::async_trait;
    use relay_commit::NoopPacer;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex;

    struct FakeDirectory {
        tokens: Vec<String>,
        flagged: Mutex<Vec<String>>,
        cleanup_count: usize,
    }

    impl FakeDirectory {
        fn with_tokens(tokens: Vec<&str>) -> Self {
            Self {
                tokens: tokens.into_iter().map(String::from).collect(),
                flagged: Mutex::new(Vec::new()),
                cleanup_count: 0,
            }
        }
    }

    #[async_trait]
    impl ResponderDirectory for FakeDirectory {
        async fn online_tokens(
            &self,
            _filters: &[(String, String)],
        ) -> Result<Vec<String>, NotifyError> {
            Ok(self.tokens.clone())
        }

        async fn flag_invalid(&self, token: &str) -> Result<(), NotifyError> {
            self.flagged.lock().unwrap().push(token.to_string());
            Ok(())
        }

        async fn cleanup_flagged(&self) -> Result<usize, NotifyError> {
            Ok(self.cleanup_count)
        }
    }

    // Channel where tokens containing "bad" fail as invalid.
    #[derive(Default)]
    struct FakeChannel {
        calls: Mutex<Vec<usize>>,
    }

    #[async_trait]
    impl PushChannel for FakeChannel {
        async fn send_to_tokens(
            &self,
            tokens: &[String],
            _title: &str,
            _body: &str,
        ) -> Result<PushReport, NotifyError> {
            self.calls.lock().unwrap().push(tokens.len());
            let results = tokens
                .iter()
                .map(|token| TokenSend {
                    token: token.clone(),
                    status: if token.contains("bad") {
                        SendStatus::Failed {
                            error: "registration token not found".to_string(),
                        }
                    } else {
                        SendStatus::Sent {
                            message_id: format!("msg-{}", token),
                        }
                    },
                })
                .collect();
            Ok(PushReport { results })
        }

        async fn send_to_topic(
            &self,
            _topic: &str,
            _title: &str,
            _body: &str,
        ) -> Result<String, NotifyError> {
            Ok("topic-msg".to_string())
        }
    }

    struct CountingPacer(AtomicUsize);

    #[async_trait]
    impl Pacer for CountingPacer {
        async fn pause(&self) {
            self.0.fetch_add(1, Ordering::SeqCst);
        }
    }

    #[tokio::test]
    async fn test_zero_tokens_is_zero_count_not_error() {
        let fanout = NotificationFanout::new(
            Arc::new(FakeDirectory::with_tokens(vec![])),
            Arc::new(FakeChannel::default()),
            Arc::new(NoopPacer),
            500,
        );

        let report = fanout.notify_batch(10, Some(1)).await.unwrap();
        assert_eq!(report, FanoutReport::default());
    }

    #[tokio::test]
    async fn test_sub_batches_are_capped_and_paced() {
        let tokens: Vec<String> = (0..1200).map(|i| format!("tok-{}", i)).collect();
        let directory = FakeDirectory {
            tokens,
            flagged: Mutex::new(Vec::new()),
            cleanup_count: 0,
        };
        let channel = Arc::new(FakeChannel::default());
        let pacer = Arc::new(CountingPacer(AtomicUsize::new(0)));

        let fanout = NotificationFanout::new(
            Arc::new(directory),
            channel.clone(),
            pacer.clone(),
            500,
        );

        let report = fanout.notify_batch(5, None).await.unwrap();
        assert_eq!(report.success_count, 1200);
        assert_eq!(report.total_tokens, 1200);

        let calls = channel.calls.lock().unwrap();
        assert_eq!(calls.as_slice(), [500, 500, 200]);
        // Pause between sub-batches, not after the last one.
        assert_eq!(pacer.0.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_tokens_are_deduplicated() {
        let directory = FakeDirectory::with_tokens(vec!["a", "b", "a", "  ", "b", "c"]);
        let channel = Arc::new(FakeChannel::default());
        let fanout =
            NotificationFanout::new(Arc::new(directory), channel.clone(), Arc::new(NoopPacer), 500);

        let report = fanout.notify_batch(1, None).await.unwrap();
        assert_eq!(report.total_tokens, 3);
        assert_eq!(channel.calls.lock().unwrap().as_slice(), [3]);
    }

    #[tokio::test]
    async fn test_invalid_tokens_are_flagged() {
        let directory = Arc::new(FakeDirectory::with_tokens(vec!["good-1", "bad-1", "good-2"]));
        let fanout = NotificationFanout::new(
            directory.clone(),
            Arc::new(FakeChannel::default()),
            Arc::new(NoopPacer),
            500,
        );

        let report = fanout.notify_batch(3, Some(2)).await.unwrap();
        assert_eq!(report.success_count, 2);
        assert_eq!(report.failure_count, 1);
        assert_eq!(directory.flagged.lock().unwrap().as_slice(), ["bad-1"]);
    }

    #[tokio::test]
    async fn test_cleanup_is_explicit() {
        let directory = Arc::new(FakeDirectory {
            tokens: vec![],
            flagged: Mutex::new(Vec::new()),
            cleanup_count: 4,
        });
        let fanout = NotificationFanout::new(
            directory,
            Arc::new(FakeChannel::default()),
            Arc::new(NoopPacer),
            500,
        );

        assert_eq!(fanout.cleanup_invalid_tokens().await.unwrap(), 4);
    }

    #[tokio::test]
    async fn test_batch_seq_appears_in_body() {
        // Exercised through the channel: capture the body via a recording channel.
        struct BodyChannel(Mutex<Vec<String>>);

        #[async_trait]
        impl PushChannel for BodyChannel {
            async fn send_to_tokens(
                &self,
                tokens: &[String],
                _title: &str,
                body: &str,
            ) -> Result<PushReport, NotifyError> {
                self.0.lock().unwrap().push(body.to_string());
                Ok(PushReport {
                    results: tokens
                        .iter()
                        .map(|t| TokenSend {
                            token: t.clone(),
                            status: SendStatus::Sent {
                                message_id: "m".to_string(),
                            },
                        })
                        .collect(),
                })
            }

            async fn send_to_topic(
                &self,
                _topic: &str,
                _title: &str,
                _body: &str,
            ) -> Result<String, NotifyError> {
                Ok("m".to_string())
            }
        }

        let channel = Arc::new(BodyChannel(Mutex::new(Vec::new())));
        let fanout = NotificationFanout::new(
            Arc::new(FakeDirectory::with_tokens(vec!["t1"])),
            channel.clone(),
            Arc::new(NoopPacer),
            500,
        );

        fanout.notify_batch(50, Some(3)).await.unwrap();
        fanout.notify_batch(20, None).await.unwrap();

        let bodies = channel.0.lock().unwrap();
        assert_eq!(bodies[0], "50 new security events detected (batch 3).");
        assert_eq!(bodies[1], "20 new security events detected.");
    }
}

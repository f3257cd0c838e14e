//! Pacing between downstream calls.
//!
//! Pacing exists purely to avoid overwhelming downstream services. The
//! trait keeps wall-clock sleeps out of tests.

use std::time::Duration;

use async_trait::async_trait;
use tracing::trace;

/// A fixed pause applied between paced operations.
#[async_trait]
pub trait Pacer: Send + Sync {
    /// Wait out the configured pause.
    async fn pause(&self);
}

/// Production pacer backed by a real sleep.
pub struct IntervalPacer {
    delay: Duration,
}

impl IntervalPacer {
    pub fn new(delay: Duration) -> Self {
        Self { delay }
    }

    /// Pacer from a millisecond setting.
    pub fn from_millis(millis: u64) -> Self {
        Self::new(Duration::from_millis(millis))
    }
}

#[async_trait]
impl Pacer for IntervalPacer {
    async fn pause(&self) {
        if self.delay.is_zero() {
            return;
        }
        trace!(delay_ms = self.delay.as_millis(), "Pacing");
        tokio::time::sleep(self.delay).await;
    }
}

/// Pacer that never waits. Used in tests and single-shot tools.
pub struct NoopPacer;

#[async_trait]
impl Pacer for NoopPacer {
    async fn pause(&self) {}
}

//! Run statistics owned by a pipeline instance.

use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Counters for pipeline runs.
///
/// Owned exclusively by the running pipeline instance and reset only on
/// process restart. One "run" here is a full cycle, not a single record.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PipelineRunStats {
    /// Total cycles attempted.
    pub total_processed: u64,

    /// Cycles that committed at least one record.
    pub total_successful: u64,

    /// Cycles that failed or committed nothing.
    pub total_failed: u64,

    /// When the last cycle finished.
    pub last_run: Option<DateTime<Utc>>,

    /// Message from the most recent failure, cleared on success.
    pub last_error: Option<String>,

    /// Wall-clock duration of the last cycle.
    #[serde(skip)]
    pub last_cycle_duration: Option<Duration>,
}

impl PipelineRunStats {
    /// Create zeroed stats.
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a cycle that committed at least one record.
    pub fn record_success(&mut self, duration: Duration) {
        self.total_processed += 1;
        self.total_successful += 1;
        self.last_error = None;
        self.last_run = Some(Utc::now());
        self.last_cycle_duration = Some(duration);
    }

    /// Record a failed or empty cycle.
    pub fn record_failure(&mut self, error: impl Into<String>, duration: Duration) {
        self.total_processed += 1;
        self.total_failed += 1;
        self.last_error = Some(error.into());
        self.last_run = Some(Utc::now());
        self.last_cycle_duration = Some(duration);
    }

    /// Successful cycles as a percentage of attempted cycles.
    pub fn success_rate(&self) -> f64 {
        if self.total_processed == 0 {
            return 0.0;
        }
        self.total_successful as f64 / self.total_processed as f64 * 100.0
    }
}

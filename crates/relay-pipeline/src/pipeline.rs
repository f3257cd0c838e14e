//! Pipeline orchestration.
//!
//! Drives one cycle at a time: read, enrich each record in order, stage,
//! commit when a batch fills, and fan out notifications plus a statistics
//! refresh strictly after each nonzero commit. A continuous mode wraps
//! the cycle in a fixed-interval poll loop with cooperative cancellation
//! observed at cycle boundaries.

use std::sync::Arc;
use std::time::{Duration, Instant};

use serde_json::Value;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

use relay_commit::{BatchCommitter, CommitOutcome, DocumentSink, Pacer};
use relay_enrich::ImageEnricher;
use relay_notify::NotificationFanout;
use relay_source::SourceReader;
use relay_stats::StatisticsRefresher;
use relay_types::{EventRecord, PipelineRunStats};

use crate::error::PipelineError;

/// Where a pipeline instance currently is in its cycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CycleState {
    Idle,
    Reading,
    Enriching,
    Committing,
    Notifying,
    Stopped,
}

/// Orchestration knobs.
#[derive(Debug, Clone)]
pub struct PipelineConfig {
    /// Records per commit batch.
    pub batch_size: usize,

    /// Recent-window lookback for single-shot runs, in minutes.
    pub window_minutes: i64,

    /// Sleep between continuous-mode cycles.
    pub polling_interval: Duration,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            batch_size: 50,
            window_minutes: 5,
            polling_interval: Duration::from_secs(30),
        }
    }
}

impl PipelineConfig {
    /// Set the commit batch size.
    pub fn with_batch_size(mut self, batch_size: usize) -> Self {
        self.batch_size = batch_size;
        self
    }

    /// Set the recent-window lookback.
    pub fn with_window_minutes(mut self, minutes: i64) -> Self {
        self.window_minutes = minutes;
        self
    }

    /// Set the continuous-mode polling interval.
    pub fn with_polling_interval(mut self, interval: Duration) -> Self {
        self.polling_interval = interval;
        self
    }
}

/// Per-component health check result.
#[derive(Debug, Clone)]
pub struct HealthReport {
    pub source: bool,
    pub docstore: bool,
    pub running: bool,
}

impl HealthReport {
    /// Healthy when both stores are reachable.
    pub fn overall(&self) -> bool {
        self.source && self.docstore
    }
}

/// The enrichment-and-commit pipeline.
///
/// Single logical worker: record processing within a run is strictly
/// sequential, and every network call is an explicit suspension point.
pub struct RelayPipeline {
    reader: SourceReader,
    enricher: ImageEnricher,
    sink: Arc<dyn DocumentSink>,
    commit_pacer: Arc<dyn Pacer>,
    fanout: NotificationFanout,
    refresher: StatisticsRefresher,
    destination: String,
    config: PipelineConfig,
    stats: PipelineRunStats,
    state: CycleState,
    running: bool,
}

impl RelayPipeline {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        reader: SourceReader,
        enricher: ImageEnricher,
        sink: Arc<dyn DocumentSink>,
        commit_pacer: Arc<dyn Pacer>,
        fanout: NotificationFanout,
        refresher: StatisticsRefresher,
        destination: impl Into<String>,
        config: PipelineConfig,
    ) -> Self {
        Self {
            reader,
            enricher,
            sink,
            commit_pacer,
            fanout,
            refresher,
            destination: destination.into(),
            config,
            stats: PipelineRunStats::new(),
            state: CycleState::Idle,
            running: false,
        }
    }

    /// Current cycle state.
    pub fn state(&self) -> CycleState {
        self.state
    }

    /// Run statistics accumulated since construction.
    pub fn stats(&self) -> &PipelineRunStats {
        &self.stats
    }

    /// One recent-window pass.
    pub async fn run_single(
        &mut self,
        minutes_back: Option<i64>,
        limit: Option<usize>,
    ) -> Result<usize, PipelineError> {
        let minutes = minutes_back.unwrap_or(self.config.window_minutes);
        let started = Instant::now();

        self.state = CycleState::Reading;
        let result = match self.reader.read_recent(minutes, limit).await {
            Ok(records) => self.process_records(records).await,
            Err(e) => Err(e.into()),
        };
        self.finish_cycle(result, started)
    }

    /// Full scan of the source collection.
    pub async fn run_full_sync(&mut self, limit: Option<usize>) -> Result<usize, PipelineError> {
        let started = Instant::now();

        self.state = CycleState::Reading;
        let result = match self.reader.read_all(limit).await {
            Ok(records) => self.process_records(records).await,
            Err(e) => Err(e.into()),
        };
        self.finish_cycle(result, started)
    }

    /// One pass over records matching a caller-supplied filter.
    pub async fn run_query(
        &mut self,
        filter: Value,
        limit: Option<usize>,
    ) -> Result<usize, PipelineError> {
        let started = Instant::now();

        self.state = CycleState::Reading;
        let result = match self.reader.read_query(filter, limit).await {
            Ok(records) => self.process_records(records).await,
            Err(e) => Err(e.into()),
        };
        self.finish_cycle(result, started)
    }

    /// Poll loop: one full cycle, sleep, repeat.
    ///
    /// Cancellation is checked at the top of each cycle; an in-flight
    /// cycle runs to completion before a stop takes effect. Cycle errors
    /// are recorded and the loop continues with the next cycle.
    pub async fn run_continuous(&mut self, cancel: CancellationToken) {
        info!(
            interval_secs = self.config.polling_interval.as_secs(),
            "Starting continuous pipeline"
        );
        self.running = true;

        loop {
            if cancel.is_cancelled() {
                break;
            }

            // Look back slightly past one polling interval so cycles overlap
            // rather than leave gaps; overlapping reads are safe because
            // destination writes are idempotent upserts.
            let minutes_back = (self.config.polling_interval.as_secs() / 60 + 1) as i64;

            match self.run_single(Some(minutes_back), None).await {
                Ok(committed) => {
                    info!(
                        committed = committed,
                        duration_ms = self
                            .stats
                            .last_cycle_duration
                            .map(|d| d.as_millis())
                            .unwrap_or_default(),
                        "Pipeline cycle completed"
                    );
                }
                Err(e) => {
                    error!(error = %e, "Pipeline cycle failed");
                }
            }

            tokio::select! {
                _ = tokio::time::sleep(self.config.polling_interval) => {}
                _ = cancel.cancelled() => break,
            }
        }

        self.running = false;
        self.state = CycleState::Stopped;
        info!("Continuous pipeline stopped");
    }

    /// Reachability of the pipeline's collaborators.
    pub async fn health_check(&self) -> HealthReport {
        HealthReport {
            source: self.reader.health().await,
            docstore: self.sink.health().await,
            running: self.running,
        }
    }

    /// Enrich, stage, and commit a run's records in order.
    ///
    /// Returns `Ok(None)` when there was nothing to process so callers can
    /// leave run statistics untouched.
    async fn process_records(
        &mut self,
        records: Vec<EventRecord>,
    ) -> Result<Option<usize>, PipelineError> {
        if records.is_empty() {
            info!("No records found");
            return Ok(None);
        }

        info!(count = records.len(), "Processing records");

        // Fatal when this fails: without a token no image can be fetched
        // for the whole run.
        let token = self.enricher.begin_run().await?;

        let mut committer = BatchCommitter::new(
            self.sink.clone(),
            self.commit_pacer.clone(),
            self.destination.clone(),
            self.config.batch_size,
        );

        for mut record in records {
            if !record.has_identity() {
                warn!("Record without source identity, dropping");
                continue;
            }

            self.state = CycleState::Enriching;
            // Best effort: a degraded record still gets persisted.
            let _ = self.enricher.enrich(&token, &mut record).await;

            self.state = CycleState::Committing;
            if let Some(outcome) = committer.stage(record).await {
                self.after_commit(&outcome).await;
            }
        }

        self.state = CycleState::Committing;
        if let Some(outcome) = committer.finish().await {
            self.after_commit(&outcome).await;
        }

        Ok(Some(committer.total_committed()))
    }

    /// Commit-gated fanout: only after a batch reports a nonzero
    /// committed count, never before, never speculatively.
    async fn after_commit(&mut self, outcome: &CommitOutcome) {
        if !outcome.succeeded() {
            return;
        }

        self.state = CycleState::Notifying;

        if let Err(e) = self
            .fanout
            .notify_batch(outcome.committed, Some(outcome.batch_seq))
            .await
        {
            warn!(batch = outcome.batch_seq, error = %e, "Batch notification failed");
        }

        if let Err(e) = self.refresher.refresh(None).await {
            warn!(batch = outcome.batch_seq, error = %e, "Statistics refresh failed");
        }
    }

    fn finish_cycle(
        &mut self,
        result: Result<Option<usize>, PipelineError>,
        started: Instant,
    ) -> Result<usize, PipelineError> {
        let elapsed = started.elapsed();
        self.state = CycleState::Idle;

        match result {
            Ok(None) => Ok(0),
            Ok(Some(committed)) => {
                if committed > 0 {
                    self.stats.record_success(elapsed);
                } else {
                    self.stats.record_failure("no records committed", elapsed);
                }
                info!(committed = committed, "Cycle finished");
                Ok(committed)
            }
            Err(e) => {
                self.stats.record_failure(e.to_string(), elapsed);
                Err(e)
            }
        }
    }
}

//! Fixed-size atomic batch persistence with partial-failure continuation.

use std::sync::Arc;

use tracing::{error, info};

use relay_types::EventRecord;

use crate::document::map_record;
use crate::pacer::Pacer;
use crate::sink::DocumentSink;

/// Result of one attempted batch commit.
#[derive(Debug, Clone)]
pub struct CommitOutcome {
    /// 1-based sequence number of the batch within this run.
    pub batch_seq: usize,

    /// Records staged into the batch.
    pub staged: usize,

    /// Records the sink reported committed. Zero when the batch failed
    /// and was skipped.
    pub committed: usize,
}

impl CommitOutcome {
    /// Whether this commit should gate downstream fanout.
    pub fn succeeded(&self) -> bool {
        self.committed > 0
    }
}

/// Groups enriched records into fixed-size batches and persists each batch
/// atomically.
///
/// A failed batch is logged and skipped; its records are dropped for this
/// run and processing continues with the next batch. Pacing runs before
/// each batch that follows a successful commit.
pub struct BatchCommitter {
    sink: Arc<dyn DocumentSink>,
    pacer: Arc<dyn Pacer>,
    collection: String,
    batch_size: usize,
    staged: Vec<EventRecord>,
    batch_seq: usize,
    total_committed: usize,
    pause_before_next: bool,
}

impl BatchCommitter {
    pub fn new(
        sink: Arc<dyn DocumentSink>,
        pacer: Arc<dyn Pacer>,
        collection: impl Into<String>,
        batch_size: usize,
    ) -> Self {
        Self {
            sink,
            pacer,
            collection: collection.into(),
            batch_size: batch_size.max(1),
            staged: Vec::new(),
            batch_seq: 0,
            total_committed: 0,
            pause_before_next: false,
        }
    }

    /// Stage a record; commits the staged group when it reaches the
    /// configured batch size.
    ///
    /// Returns the commit outcome when a commit was attempted.
    pub async fn stage(&mut self, record: EventRecord) -> Option<CommitOutcome> {
        self.staged.push(record);
        if self.staged.len() >= self.batch_size {
            Some(self.commit_staged().await)
        } else {
            None
        }
    }

    /// Commit the leftover partial batch at end of run.
    pub async fn finish(&mut self) -> Option<CommitOutcome> {
        if self.staged.is_empty() {
            None
        } else {
            Some(self.commit_staged().await)
        }
    }

    /// Cumulative count of records committed this run.
    pub fn total_committed(&self) -> usize {
        self.total_committed
    }

    /// Records currently staged and not yet committed.
    pub fn staged_len(&self) -> usize {
        self.staged.len()
    }

    async fn commit_staged(&mut self) -> CommitOutcome {
        if self.pause_before_next {
            self.pacer.pause().await;
            self.pause_before_next = false;
        }

        let records = std::mem::take(&mut self.staged);
        let staged = records.len();
        self.batch_seq += 1;

        let writes = records.iter().map(map_record).collect();

        match self.sink.commit_batch(&self.collection, writes).await {
            Ok(committed) => {
                self.total_committed += committed;
                if committed > 0 {
                    self.pause_before_next = true;
                }
                info!(
                    batch = self.batch_seq,
                    staged = staged,
                    committed = committed,
                    "Committed batch"
                );
                CommitOutcome {
                    batch_seq: self.batch_seq,
                    staged,
                    committed,
                }
            }
            Err(e) => {
                // Batch-skip: the records are dropped for this run and may
                // be picked up idempotently by a later scheduled window.
                error!(
                    batch = self.batch_seq,
                    staged = staged,
                    error = %e,
                    "Batch persistence failed, skipping batch"
                );
                CommitOutcome {
                    batch_seq: self.batch_seq,
                    staged,
                    committed: 0,
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::document::DocumentWrite;
    use crate::error::CommitError;
    use crate::pacer::NoopPacer;
    use async_trait::async_trait;
    use std::sync::Mutex;

    // Sink that records batch sizes and fails selected batch numbers.
    #[derive(Default)]
    struct RecordingSink {
        batches: Mutex<Vec<Vec<String>>>,
        fail_batches: Vec<usize>,
    }

    #[async_trait]
    impl DocumentSink for RecordingSink {
        async fn commit_batch(
            &self,
            _collection: &str,
            writes: Vec<DocumentWrite>,
        ) -> Result<usize, CommitError> {
            let mut batches = self.batches.lock().unwrap();
            let batch_number = batches.len() + 1;
            if self.fail_batches.contains(&batch_number) {
                batches.push(Vec::new());
                return Err(CommitError::Sink("simulated failure".into()));
            }
            let keys: Vec<String> = writes.iter().map(|w| w.key.clone()).collect();
            let count = keys.len();
            batches.push(keys);
            Ok(count)
        }

        async fn health(&self) -> bool {
            true
        }
    }

    fn records(count: usize) -> Vec<EventRecord> {
        (0..count)
            .map(|i| EventRecord::new("events", format!("r{}", i)))
            .collect()
    }

    async fn drive(committer: &mut BatchCommitter, count: usize) -> Vec<CommitOutcome> {
        let mut outcomes = Vec::new();
        for record in records(count) {
            if let Some(outcome) = committer.stage(record).await {
                outcomes.push(outcome);
            }
        }
        if let Some(outcome) = committer.finish().await {
            outcomes.push(outcome);
        }
        outcomes
    }

    #[tokio::test]
    async fn test_120_records_batch_50_commits_50_50_20() {
        let sink = Arc::new(RecordingSink::default());
        let mut committer =
            BatchCommitter::new(sink.clone(), Arc::new(NoopPacer), "events", 50);

        let outcomes = drive(&mut committer, 120).await;

        assert_eq!(outcomes.len(), 3);
        assert_eq!(
            outcomes.iter().map(|o| o.staged).collect::<Vec<_>>(),
            vec![50, 50, 20]
        );
        assert!(outcomes.iter().all(CommitOutcome::succeeded));
        assert_eq!(committer.total_committed(), 120);

        let batches = sink.batches.lock().unwrap();
        assert_eq!(batches.len(), 3);
        assert_eq!(batches[2].len(), 20);
    }

    #[tokio::test]
    async fn test_failing_second_batch_is_skipped() {
        let sink = Arc::new(RecordingSink {
            fail_batches: vec![2],
            ..Default::default()
        });
        let mut committer =
            BatchCommitter::new(sink.clone(), Arc::new(NoopPacer), "events", 50);

        let outcomes = drive(&mut committer, 120).await;

        assert_eq!(outcomes.len(), 3);
        assert!(outcomes[0].succeeded());
        assert!(!outcomes[1].succeeded());
        assert!(outcomes[2].succeeded());
        // Batch 2's records are dropped for this run.
        assert_eq!(committer.total_committed(), 50 + 20);
    }

    #[tokio::test]
    async fn test_exact_multiple_leaves_no_partial_batch() {
        let sink = Arc::new(RecordingSink::default());
        let mut committer = BatchCommitter::new(sink, Arc::new(NoopPacer), "events", 10);

        let outcomes = drive(&mut committer, 30).await;
        assert_eq!(outcomes.len(), 3);
        assert_eq!(committer.staged_len(), 0);
    }

    #[tokio::test]
    async fn test_no_records_no_commits() {
        let sink = Arc::new(RecordingSink::default());
        let mut committer = BatchCommitter::new(sink.clone(), Arc::new(NoopPacer), "events", 10);

        assert!(committer.finish().await.is_none());
        assert_eq!(committer.total_committed(), 0);
        assert!(sink.batches.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_document_keys_are_deterministic() {
        let sink = Arc::new(RecordingSink::default());
        let mut committer = BatchCommitter::new(sink.clone(), Arc::new(NoopPacer), "events", 5);

        drive(&mut committer, 5).await;
        let first: Vec<Vec<String>> = sink.batches.lock().unwrap().clone();

        let mut committer2 = BatchCommitter::new(sink.clone(), Arc::new(NoopPacer), "events", 5);
        drive(&mut committer2, 5).await;

        let batches = sink.batches.lock().unwrap();
        // Re-running the same input addresses the same destination keys.
        assert_eq!(batches[1], first[0]);
        assert_eq!(batches[1][0], "events_r0");
    }
}

//! Full status recount and snapshot overwrite.

use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tracing::info;

use crate::error::StatsError;
use crate::snapshot::{DateFilter, StatusSnapshot};

/// Document id of the single current snapshot.
pub const CURRENT_SNAPSHOT_ID: &str = "current";

/// Narrow scan capability over persisted event records.
#[async_trait]
pub trait StatusSource: Send + Sync {
    /// The `status` field of every persisted event record, optionally
    /// limited to records created at or after the cutoff. Records without
    /// a status report an empty string.
    async fn fetch_statuses(
        &self,
        created_after: Option<DateTime<Utc>>,
    ) -> Result<Vec<String>, StatsError>;
}

/// Narrow persistence capability for snapshots.
#[async_trait]
pub trait SnapshotStore: Send + Sync {
    /// Overwrite the snapshot stored under `id`.
    async fn put_snapshot(&self, id: &str, snapshot: &StatusSnapshot) -> Result<(), StatsError>;

    /// Read a stored snapshot.
    async fn get_snapshot(&self, id: &str) -> Result<Option<StatusSnapshot>, StatsError>;
}

/// Recomputes the aggregate status snapshot from a full scan.
///
/// Cost scales with total record count, which is acceptable at batch
/// granularity.
pub struct StatisticsRefresher {
    source: Arc<dyn StatusSource>,
    store: Arc<dyn SnapshotStore>,
}

impl StatisticsRefresher {
    pub fn new(source: Arc<dyn StatusSource>, store: Arc<dyn SnapshotStore>) -> Self {
        Self { source, store }
    }

    /// Recount statuses and overwrite the current snapshot.
    pub async fn refresh(&self, filter: Option<DateFilter>) -> Result<StatusSnapshot, StatsError> {
        let cutoff = filter.map(|f| f.cutoff(Utc::now()));
        let statuses = self.source.fetch_statuses(cutoff).await?;
        let snapshot = StatusSnapshot::tally(statuses, filter);

        self.store
            .put_snapshot(CURRENT_SNAPSHOT_ID, &snapshot)
            .await?;

        info!(
            total = snapshot.total,
            pending = snapshot.pending,
            accepted = snapshot.accepted,
            rejected = snapshot.rejected,
            done = snapshot.done,
            filter = %snapshot.date_filter,
            "Refreshed event statistics"
        );
        Ok(snapshot)
    }

    /// Read the current snapshot without recomputing.
    pub async fn current(&self) -> Result<Option<StatusSnapshot>, StatsError> {
        self.store.get_snapshot(CURRENT_SNAPSHOT_ID).await
    }
}

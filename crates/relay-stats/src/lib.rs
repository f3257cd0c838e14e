//! Statistics refresh for the relay pipeline.
//!
//! [`StatisticsRefresher`] recomputes per-status counts from a full scan
//! of persisted event records and overwrites the single current snapshot.
//! Triggered after each successful batch commit.

mod error;
mod refresher;
mod snapshot;

pub use error::StatsError;
pub use refresher::{SnapshotStore, StatisticsRefresher, StatusSource, CURRENT_SNAPSHOT_ID};
pub use snapshot::{DateFilter, StatusSnapshot};

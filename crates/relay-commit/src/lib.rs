//! Batch persistence for the relay pipeline.
//!
//! [`BatchCommitter`] stages enriched records and commits fixed-size
//! groups atomically through a [`DocumentSink`], skipping failed batches
//! and pacing between successful ones.

mod committer;
mod document;
mod error;
mod pacer;
mod sink;

pub use committer::{BatchCommitter, CommitOutcome};
pub use document::{map_record, DocumentWrite};
pub use error::CommitError;
pub use pacer::{IntervalPacer, NoopPacer, Pacer};
pub use sink::DocumentSink;

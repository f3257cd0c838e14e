//! Shared types for the event-relay workspace.
//!
//! Home of the [`EventRecord`] flowing through the pipeline, the layered
//! [`Settings`] configuration, and the per-instance [`PipelineRunStats`].

mod config;
mod error;
mod record;
mod stats;

pub use config::{
    BlobSettings, DocStoreSettings, ImageSettings, PipelineSettings, PushSettings, Settings,
    SourceSettings,
};
pub use error::RelayError;
pub use record::{EventRecord, IMAGE_POSITION_FIELD, IMAGE_URL_FIELD};
pub use stats::PipelineRunStats;

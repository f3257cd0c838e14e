//! Source record retrieval for the relay pipeline.
//!
//! [`SourceReader`] drives two retrieval modes against a [`SourceSearch`]
//! implementation: a bounded recent window and a cursor-driven full scan.
//! Errors from the store are fatal to the run.

mod error;
mod http;
mod reader;
mod search;

pub use error::SourceError;
pub use http::HttpSourceClient;
pub use reader::SourceReader;
pub use search::{SearchPage, SearchRequest, SortOrder, SourceSearch};

//! Search contract for the source store.
//!
//! The trait is the seam the pipeline is tested through; the HTTP client
//! in this crate is its production implementation.

use async_trait::async_trait;
use serde_json::{json, Value};

use relay_types::EventRecord;

use crate::error::SourceError;

/// Sort direction for search results.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SortOrder {
    Ascending,
    Descending,
}

impl SortOrder {
    /// Wire representation of the order.
    pub fn as_str(&self) -> &'static str {
        match self {
            SortOrder::Ascending => "asc",
            SortOrder::Descending => "desc",
        }
    }
}

/// A single page request against the source store.
#[derive(Debug, Clone)]
pub struct SearchRequest {
    /// Collection (index) to search.
    pub collection: String,

    /// Opaque filter predicate in the store's query language.
    pub filter: Value,

    /// Maximum hits per page.
    pub page_size: usize,

    /// Optional sort field and direction.
    pub sort: Option<(String, SortOrder)>,

    /// Ask the store to open a scan cursor for continuation.
    pub open_cursor: bool,
}

impl SearchRequest {
    /// Match-everything request for the given collection.
    pub fn match_all(collection: impl Into<String>, page_size: usize) -> Self {
        Self {
            collection: collection.into(),
            filter: json!({"match_all": {}}),
            page_size,
            sort: None,
            open_cursor: false,
        }
    }

    /// Replace the filter predicate.
    pub fn with_filter(mut self, filter: Value) -> Self {
        self.filter = filter;
        self
    }

    /// Sort by a field.
    pub fn with_sort(mut self, field: impl Into<String>, order: SortOrder) -> Self {
        self.sort = Some((field.into(), order));
        self
    }

    /// Request a scan cursor with the first page.
    pub fn with_cursor(mut self) -> Self {
        self.open_cursor = true;
        self
    }
}

/// One page of results, with the cursor for the next one when scanning.
#[derive(Debug, Clone, Default)]
pub struct SearchPage {
    /// Records in store order.
    pub records: Vec<EventRecord>,

    /// Continuation cursor; `None` once the store has nothing further.
    pub cursor: Option<String>,
}

impl SearchPage {
    /// Whether the page carried no records.
    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}

/// Narrow query capability over the source search store.
#[async_trait]
pub trait SourceSearch: Send + Sync {
    /// Execute a single page request.
    async fn search(&self, request: SearchRequest) -> Result<SearchPage, SourceError>;

    /// Fetch the next page of an open scan cursor.
    async fn scan_next(&self, cursor: &str) -> Result<SearchPage, SourceError>;

    /// Whether the store is reachable and healthy.
    async fn health(&self) -> bool;
}

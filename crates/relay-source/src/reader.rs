//! Paginated record retrieval.

use std::sync::Arc;

use chrono::{Duration, Utc};
use serde_json::{json, Value};
use tracing::{debug, info};

use relay_types::EventRecord;

use crate::error::SourceError;
use crate::search::{SearchRequest, SortOrder, SourceSearch};

/// Timestamp field used for the recent-window query.
const TIMESTAMP_FIELD: &str = "@timestamp";

/// Reads ordered pages of records from the source store.
///
/// Two retrieval modes: a bounded recent window (newest first) and a full
/// scan driven by a continuation cursor. Store errors are fatal and
/// propagate to the caller.
pub struct SourceReader {
    search: Arc<dyn SourceSearch>,
    collection: String,
    page_size: usize,
}

impl SourceReader {
    /// Create a reader over the given collection.
    pub fn new(search: Arc<dyn SourceSearch>, collection: impl Into<String>, page_size: usize) -> Self {
        Self {
            search,
            collection: collection.into(),
            page_size: page_size.max(1),
        }
    }

    /// The collection this reader targets.
    pub fn collection(&self) -> &str {
        &self.collection
    }

    /// Records from the last `minutes_back` minutes, newest first.
    pub async fn read_recent(
        &self,
        minutes_back: i64,
        limit: Option<usize>,
    ) -> Result<Vec<EventRecord>, SourceError> {
        let cutoff = Utc::now() - Duration::minutes(minutes_back);
        let filter = json!({
            "range": {
                TIMESTAMP_FIELD: {
                    "gte": cutoff.format("%Y-%m-%dT%H:%M:%S").to_string(),
                    "format": "yyyy-MM-dd'T'HH:mm:ss"
                }
            }
        });

        let request = SearchRequest::match_all(&self.collection, self.page_size)
            .with_filter(filter)
            .with_sort(TIMESTAMP_FIELD, SortOrder::Descending);

        let page = self.search.search(request).await?;
        debug!(
            collection = %self.collection,
            minutes_back = minutes_back,
            count = page.records.len(),
            "Fetched recent window"
        );

        Ok(apply_limit(page.records, limit))
    }

    /// Every record in the collection, via cursor continuation.
    ///
    /// Continuation requests are reissued until the store returns an empty
    /// page. The optional cap truncates the concatenated result.
    pub async fn read_all(&self, limit: Option<usize>) -> Result<Vec<EventRecord>, SourceError> {
        let request = SearchRequest::match_all(&self.collection, self.page_size).with_cursor();
        let mut page = self.search.search(request).await?;

        let mut records = Vec::new();
        records.append(&mut page.records);

        while let Some(cursor) = page.cursor.take() {
            page = self.search.scan_next(&cursor).await?;
            if page.is_empty() {
                break;
            }
            records.append(&mut page.records);
        }

        info!(
            collection = %self.collection,
            count = records.len(),
            "Full scan complete"
        );

        Ok(apply_limit(records, limit))
    }

    /// One page matching a caller-supplied filter predicate.
    pub async fn read_query(
        &self,
        filter: Value,
        limit: Option<usize>,
    ) -> Result<Vec<EventRecord>, SourceError> {
        let request =
            SearchRequest::match_all(&self.collection, self.page_size).with_filter(filter);
        let page = self.search.search(request).await?;
        debug!(
            collection = %self.collection,
            count = page.records.len(),
            "Custom query complete"
        );
        Ok(apply_limit(page.records, limit))
    }

    /// Whether the store is reachable.
    pub async fn health(&self) -> bool {
        self.search.health().await
    }
}

fn apply_limit(mut records: Vec<EventRecord>, limit: Option<usize>) -> Vec<EventRecord> {
    if let Some(cap) = limit {
        if cap > 0 && records.len() > cap {
            records.truncate(cap);
        }
    }
    records
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::search::SearchPage;
    use async_trait::async_trait;
    use std::sync::Mutex;

    // Scripted search store: hands out pre-built pages and records requests.
    struct ScriptedSearch {
        pages: Mutex<Vec<SearchPage>>,
        requests: Mutex<Vec<SearchRequest>>,
        cursors: Mutex<Vec<String>>,
    }

    impl ScriptedSearch {
        fn new(pages: Vec<SearchPage>) -> Self {
            Self {
                pages: Mutex::new(pages),
                requests: Mutex::new(Vec::new()),
                cursors: Mutex::new(Vec::new()),
            }
        }

        fn next_page(&self) -> SearchPage {
            let mut pages = self.pages.lock().unwrap();
            if pages.is_empty() {
                SearchPage::default()
            } else {
                pages.remove(0)
            }
        }
    }

    #[async_trait]
    impl SourceSearch for ScriptedSearch {
        async fn search(&self, request: SearchRequest) -> Result<SearchPage, SourceError> {
            self.requests.lock().unwrap().push(request);
            Ok(self.next_page())
        }

        async fn scan_next(&self, cursor: &str) -> Result<SearchPage, SourceError> {
            self.cursors.lock().unwrap().push(cursor.to_string());
            Ok(self.next_page())
        }

        async fn health(&self) -> bool {
            true
        }
    }

    fn records(prefix: &str, count: usize) -> Vec<EventRecord> {
        (0..count)
            .map(|i| EventRecord::new("events", format!("{}-{}", prefix, i)))
            .collect()
    }

    #[tokio::test]
    async fn test_read_recent_builds_window_filter() {
        let search = Arc::new(ScriptedSearch::new(vec![SearchPage {
            records: records("r", 3),
            cursor: None,
        }]));
        let reader = SourceReader::new(search.clone(), "events", 100);

        let result = reader.read_recent(5, None).await.unwrap();
        assert_eq!(result.len(), 3);

        let requests = search.requests.lock().unwrap();
        assert_eq!(requests.len(), 1);
        let request = &requests[0];
        assert!(request.filter["range"][TIMESTAMP_FIELD]["gte"].is_string());
        assert_eq!(
            request.sort,
            Some((TIMESTAMP_FIELD.to_string(), SortOrder::Descending))
        );
        assert!(!request.open_cursor);
    }

    #[tokio::test]
    async fn test_read_all_follows_cursor_until_empty() {
        let search = Arc::new(ScriptedSearch::new(vec![
            SearchPage {
                records: records("a", 2),
                cursor: Some("c1".to_string()),
            },
            SearchPage {
                records: records("b", 2),
                cursor: Some("c2".to_string()),
            },
            SearchPage::default(),
        ]));
        let reader = SourceReader::new(search.clone(), "events", 2);

        let result = reader.read_all(None).await.unwrap();
        assert_eq!(result.len(), 4);
        assert_eq!(result[0].source_id, "a-0");
        assert_eq!(result[3].source_id, "b-1");

        let cursors = search.cursors.lock().unwrap();
        assert_eq!(cursors.as_slice(), ["c1", "c2"]);

        let requests = search.requests.lock().unwrap();
        assert!(requests[0].open_cursor);
    }

    #[tokio::test]
    async fn test_limit_truncates_post_fetch() {
        let search = Arc::new(ScriptedSearch::new(vec![SearchPage {
            records: records("r", 10),
            cursor: None,
        }]));
        let reader = SourceReader::new(search, "events", 100);

        let result = reader.read_recent(5, Some(4)).await.unwrap();
        assert_eq!(result.len(), 4);
        assert_eq!(result[3].source_id, "r-3");
    }

    #[tokio::test]
    async fn test_zero_limit_means_no_cap() {
        let search = Arc::new(ScriptedSearch::new(vec![SearchPage {
            records: records("r", 3),
            cursor: None,
        }]));
        let reader = SourceReader::new(search, "events", 100);

        let result = reader.read_recent(5, Some(0)).await.unwrap();
        assert_eq!(result.len(), 3);
    }

    #[tokio::test]
    async fn test_read_query_passes_filter_through() {
        let search = Arc::new(ScriptedSearch::new(vec![SearchPage::default()]));
        let reader = SourceReader::new(search.clone(), "events", 100);

        let filter = json!({"term": {"severity": "critical"}});
        let result = reader.read_query(filter.clone(), None).await.unwrap();
        assert!(result.is_empty());

        let requests = search.requests.lock().unwrap();
        assert_eq!(requests[0].filter, filter);
    }
}

//! Event record type for the relay pipeline.
//!
//! Records are read from the source search store, enriched in place,
//! and persisted to the destination document store under a key that is
//! a pure function of their source identity.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Field name carrying the bounding-box annotation string.
pub const IMAGE_POSITION_FIELD: &str = "image_position";

/// Field name written by enrichment with the annotated image URL.
pub const IMAGE_URL_FIELD: &str = "image_url";

/// A single event record in flight through the pipeline.
///
/// Identity is `(source_index, source_id)`, which is unique and stable in
/// the source store. The field map is opaque source-defined data; known
/// fields (`image_position`, `image_url`) are accessed through helpers so
/// unrecognized fields pass through untouched.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EventRecord {
    /// Source collection (index) this record was read from.
    pub source_index: String,

    /// Record id within the source collection.
    pub source_id: String,

    /// Relevance score reported by the search store.
    #[serde(default)]
    pub score: Option<f64>,

    /// Opaque source-defined fields.
    #[serde(default)]
    pub fields: HashMap<String, Value>,
}

impl EventRecord {
    /// Create a record with an empty field map.
    pub fn new(source_index: impl Into<String>, source_id: impl Into<String>) -> Self {
        Self {
            source_index: source_index.into(),
            source_id: source_id.into(),
            score: None,
            fields: HashMap::new(),
        }
    }

    /// Set the source fields.
    pub fn with_fields(mut self, fields: HashMap<String, Value>) -> Self {
        self.fields = fields;
        self
    }

    /// Set a single source field.
    pub fn with_field(mut self, key: impl Into<String>, value: Value) -> Self {
        self.fields.insert(key.into(), value);
        self
    }

    /// Whether both identity components are non-empty.
    ///
    /// Records without a resolvable identity are skipped by enrichment
    /// and cannot be persisted.
    pub fn has_identity(&self) -> bool {
        !self.source_index.is_empty() && !self.source_id.is_empty()
    }

    /// Destination document key: `<source_index>_<source_id>`.
    ///
    /// Deterministic, so re-processing the same source record always
    /// overwrites the same destination document.
    pub fn doc_key(&self) -> String {
        format!("{}_{}", self.source_index, self.source_id)
    }

    /// The bounding-box annotation string, if the source carries one.
    pub fn image_position(&self) -> Option<&str> {
        self.fields.get(IMAGE_POSITION_FIELD).and_then(Value::as_str)
    }

    /// The enriched image URL, if enrichment succeeded.
    pub fn image_url(&self) -> Option<&str> {
        self.fields.get(IMAGE_URL_FIELD).and_then(Value::as_str)
    }

    /// Attach the enriched image URL.
    pub fn set_image_url(&mut self, url: impl Into<String>) {
        self.fields
            .insert(IMAGE_URL_FIELD.to_string(), Value::String(url.into()));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_doc_key_is_index_underscore_id() {
        let record = EventRecord::new("security-events", "abc123");
        assert_eq!(record.doc_key(), "security-events_abc123");
    }

    #[test]
    fn test_doc_key_is_deterministic() {
        let a = EventRecord::new("logs", "42").with_field("x", json!(1));
        let b = EventRecord::new("logs", "42").with_field("y", json!(2));
        assert_eq!(a.doc_key(), b.doc_key());
    }

    #[test]
    fn test_has_identity() {
        assert!(EventRecord::new("idx", "id").has_identity());
        assert!(!EventRecord::new("", "id").has_identity());
        assert!(!EventRecord::new("idx", "").has_identity());
    }

    #[test]
    fn test_image_position_accessor() {
        let record = EventRecord::new("idx", "id")
            .with_field(IMAGE_POSITION_FIELD, json!("BBOX (1,2,3,4)"));
        assert_eq!(record.image_position(), Some("BBOX (1,2,3,4)"));

        let non_string = EventRecord::new("idx", "id").with_field(IMAGE_POSITION_FIELD, json!(42));
        assert_eq!(non_string.image_position(), None);
    }

    #[test]
    fn test_set_image_url() {
        let mut record = EventRecord::new("idx", "id");
        assert_eq!(record.image_url(), None);

        record.set_image_url("https://blob.example/x.jpg?token=t");
        assert_eq!(record.image_url(), Some("https://blob.example/x.jpg?token=t"));
    }

    #[test]
    fn test_serialization_roundtrip() {
        let record = EventRecord::new("idx", "id")
            .with_field("nested", json!({"a": [1, 2, 3]}))
            .with_field("flag", json!(true));

        let bytes = serde_json::to_vec(&record).unwrap();
        let decoded: EventRecord = serde_json::from_slice(&bytes).unwrap();

        assert_eq!(decoded.source_index, "idx");
        assert_eq!(decoded.fields.get("flag"), Some(&json!(true)));
        assert_eq!(decoded.fields.get("nested"), Some(&json!({"a": [1, 2, 3]})));
    }
}

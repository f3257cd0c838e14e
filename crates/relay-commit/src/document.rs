//! Record-to-document mapping.

use chrono::Utc;
use serde_json::{Map, Value};

use relay_types::EventRecord;

/// Status written onto documents that arrive without one. Later status
/// transitions belong to external actors, never to the pipeline.
const DEFAULT_STATUS: &str = "pending";

/// A keyed document ready for the destination store.
#[derive(Debug, Clone)]
pub struct DocumentWrite {
    /// Destination key, `<collection>_<id>` of the source record.
    pub key: String,

    /// Flattened document fields.
    pub fields: Map<String, Value>,
}

/// Map a record to its destination document.
///
/// Source fields are carried over with container values coerced to the
/// sink's constraints, then provenance (`source_index`, `source_id`) and
/// `created_at`/`updated_at` timestamps are added.
pub fn map_record(record: &EventRecord) -> DocumentWrite {
    let mut fields = Map::new();
    for (key, value) in &record.fields {
        fields.insert(key.clone(), coerce_value(value));
    }

    if !fields.contains_key("status") {
        fields.insert("status".to_string(), Value::String(DEFAULT_STATUS.to_string()));
    }

    let now = Utc::now().to_rfc3339();
    fields.insert("created_at".to_string(), Value::String(now.clone()));
    fields.insert("updated_at".to_string(), Value::String(now));
    fields.insert(
        "source_index".to_string(),
        Value::String(record.source_index.clone()),
    );
    fields.insert(
        "source_id".to_string(),
        Value::String(record.source_id.clone()),
    );

    DocumentWrite {
        key: record.doc_key(),
        fields,
    }
}

/// Coerce a field value to what the sink accepts.
///
/// The destination store takes primitives, maps of acceptable values, and
/// arrays of non-array acceptable values. Anything else is persisted as
/// its JSON string representation.
fn coerce_value(value: &Value) -> Value {
    if is_sink_compatible(value) {
        value.clone()
    } else {
        Value::String(value.to_string())
    }
}

fn is_sink_compatible(value: &Value) -> bool {
    match value {
        Value::Null | Value::Bool(_) | Value::Number(_) | Value::String(_) => true,
        Value::Object(map) => map.values().all(is_sink_compatible),
        Value::Array(items) => items
            .iter()
            .all(|item| !item.is_array() && is_sink_compatible(item)),
    }
}

//! Shared types used across the codebase

use chrono::{DateTime, SecondsFormat, Utc};
use serde_json::{Map, Value};

/// A stored record: a JSON object keyed by field name
pub type Document = Map<String, Value>;

/// Primary key field present on every document
pub const ID_FIELD: &str = "id";

/// Creation timestamp stamped on every new document
pub const CREATED_AT_FIELD: &str = "createdAt";

/// Internal revision counter, hidden from default projections
pub const VERSION_FIELD: &str = "__v";

/// Fixed-width RFC3339 (UTC, millisecond precision) so that stored timestamps
/// compare correctly as plain strings in every store.
pub fn timestamp(at: DateTime<Utc>) -> Value {
    Value::String(at.to_rfc3339_opts(SecondsFormat::Millis, true))
}

/// Read back a timestamp written by [`timestamp`]
pub fn parse_timestamp(value: &Value) -> Option<DateTime<Utc>> {
    value
        .as_str()
        .and_then(|s| DateTime::parse_from_rfc3339(s).ok())
        .map(|dt| dt.with_timezone(&Utc))
}

/// Id of a document as a string slice
pub fn document_id(doc: &Document) -> Option<&str> {
    doc.get(ID_FIELD).and_then(Value::as_str)
}

//! Common types used across auditchain modules.

use crate::core::error::{Error, Result};
use chrono::{SecondsFormat, Utc};
use serde_json::{Map, Value};

/// One security observation: an arbitrary JSON object.
pub type EventRecord = Map<String, Value>;

/// Field stamped onto every event at insertion time.
pub const TIMESTAMP_FIELD: &str = "timestamp";

/// Current UTC time as an ISO-8601 string with microsecond precision.
///
/// The fixed width and trailing `Z` keep these strings lexically ordered.
pub fn now_iso() -> String {
    Utc::now().to_rfc3339_opts(SecondsFormat::Micros, true)
}

/// Parse an event record from JSON text.
///
/// Anything other than a JSON object is rejected.
pub fn parse_event(json: &str) -> Result<EventRecord> {
    let value: Value = serde_json::from_str(json)
        .map_err(|e| Error::Validation(format!("event is not valid JSON: {e}")))?;
    event_from_value(value)
}

/// Convert a JSON value into an event record.
pub fn event_from_value(value: Value) -> Result<EventRecord> {
    match value {
        Value::Object(map) => Ok(map),
        other => Err(Error::Validation(format!(
            "event must be a JSON object, got {}",
            json_type_name(&other)
        ))),
    }
}

/// Stamp the insertion timestamp if the record has none.
///
/// Returns true when a timestamp was added. An existing value is never
/// overwritten, whatever its type.
pub fn stamp_timestamp(event: &mut EventRecord) -> bool {
    if event.contains_key(TIMESTAMP_FIELD) {
        return false;
    }
    event.insert(TIMESTAMP_FIELD.to_string(), Value::String(now_iso()));
    true
}

/// Human-readable name of a JSON value's type.
pub fn json_type_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

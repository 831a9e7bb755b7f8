//! Event queries over committed blocks.

use crate::bal::block::Block;
use crate::core::{parse_event, EventRecord, Result};
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Key/value equality predicate over events.
///
/// An event matches when every query key is present in it with an equal
/// value. An empty query matches every event.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct EventQuery(EventRecord);

impl EventQuery {
    /// Create an empty query.
    pub fn new() -> Self {
        Self::default()
    }

    /// Parse a query from a JSON object.
    pub fn from_json(json: &str) -> Result<Self> {
        Ok(Self(parse_event(json)?))
    }

    /// Require `key` to equal `value`.
    pub fn with(mut self, key: &str, value: impl Into<Value>) -> Self {
        self.0.insert(key.to_string(), value.into());
        self
    }

    /// Number of predicate keys.
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Whether the query has no keys.
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Check if an event matches this query.
    pub fn matches(&self, event: &EventRecord) -> bool {
        self.0.iter().all(|(key, expected)| {
            event
                .get(key)
                .map_or(false, |actual| values_equal(actual, expected))
        })
    }
}

impl From<EventRecord> for EventQuery {
    fn from(map: EventRecord) -> Self {
        Self(map)
    }
}

/// One event located in the chain.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct EventMatch {
    /// Index of the containing block
    pub block_index: u64,
    /// Hash of the containing block
    pub block_hash: String,
    /// Timestamp of the containing block
    pub block_timestamp: String,
    /// The event itself
    pub event: EventRecord,
}

impl EventMatch {
    /// Locate `event` inside `block`.
    pub fn new(block: &Block, event: &EventRecord) -> Self {
        Self {
            block_index: block.index,
            block_hash: block.hash.clone(),
            block_timestamp: block.timestamp.clone(),
            event: event.clone(),
        }
    }
}

/// JSON equality where numbers compare by value (`1 == 1.0`).
pub fn values_equal(a: &Value, b: &Value) -> bool {
    match (a, b) {
        (Value::Number(x), Value::Number(y)) => {
            if x == y {
                return true;
            }
            if x.is_f64() || y.is_f64() {
                return matches!((x.as_f64(), y.as_f64()), (Some(p), Some(q)) if p == q);
            }
            false
        }
        (Value::Array(xs), Value::Array(ys)) => {
            xs.len() == ys.len() && xs.iter().zip(ys).all(|(x, y)| values_equal(x, y))
        }
        (Value::Object(xs), Value::Object(ys)) => {
            xs.len() == ys.len()
                && xs
                    .iter()
                    .all(|(k, x)| ys.get(k).map_or(false, |y| values_equal(x, y)))
        }
        _ => a == b,
    }
}

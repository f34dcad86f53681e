//! Core types for the event store. Domain-agnostic.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::error::{EventError, Result};

/// Schema version stamped on every event this crate creates.
pub const EVENT_VERSION: u32 = 0;

pub const EVENT_NAME: &str = "event_name";
pub const TIMESTAMP: &str = "timestamp";
pub const VERSION: &str = "version";
pub const SEQ: &str = "seq";

/// Envelope keys that payload fields may not reuse.
pub const RESERVED_FIELDS: [&str; 4] = [EVENT_NAME, TIMESTAMP, VERSION, SEQ];

/// Flat map of payload fields. Values are JSON scalars.
pub type Fields = Map<String, Value>;

/// Push id of a stream, one per aggregate instance.
pub type StreamId = String;

/// Push id of an event within its stream.
pub type EventId = String;

/// An event to be appended. Build with [`crate::create_event`]; the database
/// assigns the timestamp.
#[derive(Debug, Clone, PartialEq)]
pub struct NewEvent {
    pub event_name: String,
    pub version: u32,
    pub fields: Fields,
}

impl NewEvent {
    pub fn field(&self, name: &str) -> Option<&Value> {
        self.fields.get(name)
    }

    /// The stored JSON shape: `{event_name, timestamp, version, [seq], ...fields}`.
    pub(crate) fn to_record(&self, timestamp: Value, seq: Option<u64>) -> Value {
        let mut record = Map::with_capacity(self.fields.len() + 4);
        record.insert(EVENT_NAME.to_string(), Value::from(self.event_name.clone()));
        record.insert(TIMESTAMP.to_string(), timestamp);
        record.insert(VERSION.to_string(), Value::from(self.version));
        if let Some(seq) = seq {
            record.insert(SEQ.to_string(), Value::from(seq));
        }
        for (k, v) in &self.fields {
            record.insert(k.clone(), v.clone());
        }
        Value::Object(record)
    }
}

/// An event as read back from a stream.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StoredEvent {
    pub event_id: EventId,
    pub event_name: String,
    pub timestamp: DateTime<Utc>,
    pub version: u32,
    pub seq: Option<u64>,
    pub fields: Fields,
}

impl StoredEvent {
    /// Decode the stored JSON record kept under `event_id`.
    pub fn from_record(event_id: &str, record: Value) -> Result<Self> {
        let malformed = |reason: &str| EventError::Malformed {
            event_id: event_id.to_string(),
            reason: reason.to_string(),
        };

        let Value::Object(mut map) = record else {
            return Err(malformed("record is not an object"));
        };

        let event_name = match map.remove(EVENT_NAME) {
            Some(Value::String(name)) => name,
            _ => return Err(malformed("missing event_name")),
        };
        let timestamp = map
            .remove(TIMESTAMP)
            .and_then(|v| v.as_i64())
            .and_then(DateTime::from_timestamp_millis)
            .ok_or_else(|| malformed("missing or non-integer timestamp"))?;
        let version = map
            .remove(VERSION)
            .and_then(|v| v.as_u64())
            .and_then(|v| u32::try_from(v).ok())
            .ok_or_else(|| malformed("missing or non-integer version"))?;
        let seq = match map.remove(SEQ) {
            None => None,
            Some(v) => Some(v.as_u64().ok_or_else(|| malformed("non-integer seq"))?),
        };

        Ok(Self {
            event_id: event_id.to_string(),
            event_name,
            timestamp,
            version,
            seq,
            fields: map,
        })
    }

    pub fn field(&self, name: &str) -> Option<&Value> {
        self.fields.get(name)
    }

    pub fn field_str(&self, name: &str) -> Option<&str> {
        self.fields.get(name).and_then(Value::as_str)
    }
}

/// Per-stream record guarded by ETag for `append_expected`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StreamHead {
    pub seq: u64,
    pub event_id: EventId,
}

/// Result of an optimistic append.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AppendResult {
    pub event_id: EventId,
    pub seq: u64,
}

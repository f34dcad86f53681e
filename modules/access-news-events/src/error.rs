use firebase_client::FirebaseError;
use thiserror::Error;

pub type Result<T> = std::result::Result<T, EventError>;

/// Failures of the storage backend underneath the event store.
#[derive(Debug, Error)]
pub enum DatabaseError {
    #[error(transparent)]
    Firebase(#[from] FirebaseError),

    #[error("Invalid path {path:?}: {reason}")]
    InvalidPath { path: String, reason: String },
}

#[derive(Debug, Error)]
pub enum EventError {
    #[error("Invalid {what} {key:?}: {reason}")]
    InvalidKey {
        what: &'static str,
        key: String,
        reason: String,
    },

    #[error("Field {field:?} must be a scalar, event fields are one-dimensional")]
    NestedField { field: String },

    #[error("Field {field:?} collides with an envelope field")]
    ReservedField { field: String },

    #[error(
        "Extraneous fields, expected: {}, got: {}",
        .expected.join(","),
        .got.join(",")
    )]
    ExtraneousFields {
        expected: Vec<String>,
        got: Vec<String>,
    },

    #[error(
        "{event_name} expects the fields: {}, no match for: {field}",
        .expected.join(",")
    )]
    UnexpectedField {
        event_name: String,
        expected: Vec<String>,
        field: String,
    },

    #[error("Malformed event {event_id}: {reason}")]
    Malformed { event_id: String, reason: String },

    #[error("Stream {stream_id} is at seq {actual}, expected {expected}")]
    Conflict {
        stream_id: String,
        expected: u64,
        actual: u64,
    },

    #[error(transparent)]
    Database(#[from] DatabaseError),
}

impl EventError {
    /// Re-label a key validation failure with what the key names.
    pub(crate) fn invalid_key(what: &'static str, err: FirebaseError) -> Self {
        match err {
            FirebaseError::InvalidKey { key, reason } => EventError::InvalidKey { what, key, reason },
            other => EventError::Database(DatabaseError::Firebase(other)),
        }
    }
}

//! Generic, domain-agnostic append-only event store on the hosted Realtime
//! Database.
//!
//! Each aggregate instance owns a stream keyed by a push id. Events are flat
//! `{event_name, timestamp, version, ...fields}` envelopes with no knowledge
//! of people, accounts, or any other domain concept.

pub mod backend;
pub mod error;
pub mod event;
pub mod memory;
pub mod store;
pub mod types;

pub use backend::Database;
pub use error::{DatabaseError, EventError, Result};
pub use event::{cast_event_payload, create_event};
pub use memory::MemoryDatabase;
pub use store::EventStore;
pub use types::{
    AppendResult, EventId, Fields, NewEvent, StoredEvent, StreamHead, StreamId, EVENT_VERSION,
};

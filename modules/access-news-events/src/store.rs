//! EventStore: append-only per-stream event logs on the hosted database.
//!
//! Layout:
//!
//! ```text
//! event_store/{stream_id}/{event_id} = {event_name, timestamp, version, [seq], ...fields}
//! event_store_heads/{stream_id}      = {seq, event_id}
//! ```
//!
//! `append` is an unconditional push: ordering is by push id, which is only
//! as good as the clock that generated it. `append_expected` adds an
//! optimistic-concurrency check on the stream head.

use std::collections::VecDeque;
use std::pin::Pin;
use std::time::Duration;

use firebase_client::{child_path, ConditionalWrite};
use futures::Stream;
use serde_json::json;
use tracing::{debug, info, warn};

use crate::backend::Database;
use crate::error::{EventError, Result};
use crate::types::{AppendResult, EventId, NewEvent, StoredEvent, StreamHead, StreamId};

pub const DEFAULT_ROOT: &str = "event_store";
pub const DEFAULT_HEADS: &str = "event_store_heads";

/// Page size used by `subscribe` when catching up.
const SUBSCRIBE_PAGE: usize = 100;

// ---------------------------------------------------------------------------
// EventStore
// ---------------------------------------------------------------------------

/// Append-only event store. The single source of truth.
#[derive(Clone)]
pub struct EventStore<D> {
    db: D,
    root: String,
    heads: String,
}

impl<D: Database> EventStore<D> {
    pub fn new(db: D) -> Self {
        Self::with_paths(db, DEFAULT_ROOT, DEFAULT_HEADS)
    }

    pub fn with_paths(db: D, root: impl Into<String>, heads: impl Into<String>) -> Self {
        Self {
            db,
            root: root.into(),
            heads: heads.into(),
        }
    }

    pub fn database(&self) -> &D {
        &self.db
    }

    /// Reserve an id for a new stream. Nothing is written until the first
    /// event is appended.
    pub fn create_stream(&self) -> StreamId {
        self.db.generate_key()
    }

    /// Append an event with no ordering check.
    pub async fn append(&self, stream_id: &str, event: &NewEvent) -> Result<EventId> {
        let path = self.stream_path(stream_id)?;
        let record = event.to_record(self.db.server_timestamp(), None);
        let event_id = self.db.push(&path, &record).await?;

        debug!(stream_id, event_id = %event_id, event_name = %event.event_name, "Appended event");
        Ok(event_id)
    }

    /// Append an event only if the stream is at `expected_seq`.
    ///
    /// `expected_seq == 0` means the stream must not have a head yet. The head
    /// is advanced with an ETag-guarded write before the event itself is
    /// written, so a concurrent writer loses with `Conflict` instead of
    /// interleaving.
    pub async fn append_expected(
        &self,
        stream_id: &str,
        event: &NewEvent,
        expected_seq: u64,
    ) -> Result<AppendResult> {
        let stream_path = self.stream_path(stream_id)?;
        let head_path = self.head_path(stream_id)?;

        let (current, etag) = self.db.get_with_etag(&head_path).await?;
        let actual = decode_head(&head_path, current)?.map_or(0, |h| h.seq);
        if actual != expected_seq {
            warn!(stream_id, expected_seq, actual, "Stream head moved, rejecting append");
            return Err(EventError::Conflict {
                stream_id: stream_id.to_string(),
                expected: expected_seq,
                actual,
            });
        }

        let event_id = self.db.generate_key();
        let seq = actual + 1;
        let head = json!({ "seq": seq, "event_id": event_id });

        if let ConditionalWrite::Stale { .. } = self.db.set_if_match(&head_path, &head, &etag).await? {
            let actual = self.stream_seq(stream_id).await?;
            warn!(stream_id, expected_seq, actual, "Lost race for stream head");
            return Err(EventError::Conflict {
                stream_id: stream_id.to_string(),
                expected: expected_seq,
                actual,
            });
        }

        let event_path = child_path(&stream_path, &event_id)
            .map_err(|e| EventError::invalid_key("event id", e))?;
        let record = event.to_record(self.db.server_timestamp(), Some(seq));
        self.db.set(&event_path, &record).await?;

        debug!(stream_id, event_id = %event_id, seq, "Appended event at expected seq");
        Ok(AppendResult { event_id, seq })
    }

    /// Create a stream and append its first event. Returns the stream id.
    pub async fn start_new_stream_with_event(&self, event: &NewEvent) -> Result<StreamId> {
        let stream_id = self.create_stream();
        self.append(&stream_id, event).await?;

        info!(stream_id = %stream_id, event_name = %event.event_name, "Started new stream");
        Ok(stream_id)
    }

    /// All events of a stream. Unknown streams are empty.
    ///
    /// Events written by `append_expected` come back in seq order. Events
    /// without a seq keep their push-id position.
    pub async fn read_stream(&self, stream_id: &str) -> Result<Vec<StoredEvent>> {
        let path = self.stream_path(stream_id)?;
        let rows = self.db.children_after(&path, None, None).await?;
        let mut events = decode_rows(rows)?;
        order_by_seq(&mut events);
        Ok(events)
    }

    /// Events strictly after `after` (or from the start), at most `limit`,
    /// in push-id order.
    pub async fn read_stream_after(
        &self,
        stream_id: &str,
        after: Option<&str>,
        limit: usize,
    ) -> Result<Vec<StoredEvent>> {
        let path = self.stream_path(stream_id)?;
        let rows = self.db.children_after(&path, after, Some(limit)).await?;
        decode_rows(rows)
    }

    /// The stream's head seq, or 0 if it has never had an expected append.
    pub async fn stream_seq(&self, stream_id: &str) -> Result<u64> {
        let head_path = self.head_path(stream_id)?;
        let current = self.db.get(&head_path).await?;
        Ok(decode_head(&head_path, current)?.map_or(0, |h| h.seq))
    }

    pub async fn list_streams(&self) -> Result<Vec<StreamId>> {
        Ok(self.db.shallow_keys(&self.root).await?)
    }

    fn stream_path(&self, stream_id: &str) -> Result<String> {
        child_path(&self.root, stream_id).map_err(|e| EventError::invalid_key("stream id", e))
    }

    fn head_path(&self, stream_id: &str) -> Result<String> {
        child_path(&self.heads, stream_id).map_err(|e| EventError::invalid_key("stream id", e))
    }
}

impl<D: Database + Clone + 'static> EventStore<D> {
    /// Follow a stream: yields existing events, then new ones as they appear.
    ///
    /// The hosted database's REST API has no push channel we rely on here,
    /// so new events are found by polling every `poll_interval` once the
    /// subscriber has caught up. The stream ends after the first error.
    pub fn subscribe(
        &self,
        stream_id: &str,
        poll_interval: Duration,
    ) -> Result<Pin<Box<dyn Stream<Item = Result<StoredEvent>> + Send>>> {
        self.stream_path(stream_id)?;

        let state = Subscription {
            store: self.clone(),
            stream_id: stream_id.to_string(),
            cursor: None,
            buffer: VecDeque::new(),
            caught_up: false,
            done: false,
        };

        let stream = futures::stream::unfold(state, move |mut sub| async move {
            loop {
                if let Some(event) = sub.buffer.pop_front() {
                    sub.cursor = Some(event.event_id.clone());
                    return Some((Ok(event), sub));
                }
                if sub.done {
                    return None;
                }
                if sub.caught_up {
                    tokio::time::sleep(poll_interval).await;
                }

                match sub
                    .store
                    .read_stream_after(&sub.stream_id, sub.cursor.as_deref(), SUBSCRIBE_PAGE)
                    .await
                {
                    Ok(events) => {
                        sub.caught_up = events.len() < SUBSCRIBE_PAGE;
                        sub.buffer.extend(events);
                    }
                    Err(e) => {
                        warn!(stream_id = %sub.stream_id, error = %e, "Subscription poll failed");
                        sub.done = true;
                        return Some((Err(e), sub));
                    }
                }
            }
        });

        Ok(Box::pin(stream))
    }
}

struct Subscription<D> {
    store: EventStore<D>,
    stream_id: String,
    cursor: Option<EventId>,
    buffer: VecDeque<StoredEvent>,
    caught_up: bool,
    done: bool,
}

// ---------------------------------------------------------------------------
// Decoding helpers
// ---------------------------------------------------------------------------

fn decode_rows(rows: Vec<(String, serde_json::Value)>) -> Result<Vec<StoredEvent>> {
    rows.into_iter()
        .map(|(event_id, record)| StoredEvent::from_record(&event_id, record))
        .collect()
}

/// Sort the seq'd events among the slots they already occupy.
fn order_by_seq(events: &mut [StoredEvent]) {
    let slots: Vec<usize> = events
        .iter()
        .enumerate()
        .filter(|(_, e)| e.seq.is_some())
        .map(|(i, _)| i)
        .collect();
    let mut sequenced: Vec<StoredEvent> = slots.iter().map(|&i| events[i].clone()).collect();
    sequenced.sort_by_key(|e| e.seq);
    for (slot, event) in slots.into_iter().zip(sequenced) {
        events[slot] = event;
    }
}

fn decode_head(path: &str, value: Option<serde_json::Value>) -> Result<Option<StreamHead>> {
    value
        .map(|v| {
            serde_json::from_value::<StreamHead>(v).map_err(|e| EventError::Malformed {
                event_id: path.to_string(),
                reason: e.to_string(),
            })
        })
        .transpose()
}

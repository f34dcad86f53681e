//! Command-side aggregates.
//!
//! An aggregate is rebuilt by replaying its stream (`apply`), then asked to
//! validate a command against that state (`execute`). `execute` is pure: it
//! returns the events to append and never touches the store.

use access_news_events::{Fields, NewEvent, StoredEvent};

use crate::error::CommandError;

pub trait Aggregate: Default + Send + Sync {
    /// Name used to address the aggregate from the admin surface.
    const KIND: &'static str;

    type Command: Send + Sync;

    /// Parse a named command and its flat payload.
    fn parse_command(name: &str, payload: &Fields) -> Result<Self::Command, CommandError>;

    /// Check business rules and produce the resulting events.
    fn execute(&self, command: &Self::Command) -> Result<Vec<NewEvent>, CommandError>;

    /// Fold one event into the state.
    fn apply(&mut self, event_name: &str, fields: &Fields);

    fn apply_new(&mut self, event: &NewEvent) {
        self.apply(&event.event_name, &event.fields);
    }

    fn replay<'a>(events: impl IntoIterator<Item = &'a StoredEvent>) -> Self {
        let mut state = Self::default();
        for event in events {
            state.apply(&event.event_name, &event.fields);
        }
        state
    }
}

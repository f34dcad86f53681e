//! Ergonomics and usage pattern tests.
//! These don't need a database. They cover the API surface and error messages.

use access_news_events::{cast_event_payload, create_event, EventError, Fields, StoredEvent};
use serde_json::{json, Value};

fn payload(value: Value) -> Fields {
    match value {
        Value::Object(map) => map,
        _ => panic!("expected an object"),
    }
}

// =========================================================================
// Command payload → event
// =========================================================================

#[test]
fn cast_then_create_is_the_command_path() {
    let fields = cast_event_payload(
        "person_added",
        &["first_name", "last_name"],
        &payload(json!({"first_name": "Bala", "last_name": "Bab"})),
    )
    .unwrap();

    let event = create_event("person_added", fields, 0).unwrap();
    assert_eq!(event.event_name, "person_added");
    assert_eq!(event.version, 0);
    assert_eq!(event.field("last_name"), Some(&json!("Bab")));
}

#[test]
fn payload_errors_are_readable() {
    let err = cast_event_payload(
        "person_added",
        &["first_name", "last_name"],
        &payload(json!({"first": "Bala", "last_name": "Bab"})),
    )
    .unwrap_err();

    let message = err.to_string();
    assert!(message.contains("person_added"));
    assert!(message.contains("first"));
}

#[test]
fn event_names_with_dots_are_rejected() {
    let err = create_event("person.added", Fields::new(), 0).unwrap_err();
    assert!(matches!(err, EventError::InvalidKey { .. }));
}

// =========================================================================
// StoredEvent
// =========================================================================

#[test]
fn stored_event_is_serializable() {
    // StoredEvent can be serialized for debugging, logging, admin output
    let stored = StoredEvent::from_record(
        "-Nabc",
        json!({
            "event_name": "person_email_added",
            "timestamp": 1_500_000_000_000i64,
            "version": 0,
            "seq": 2,
            "email": "ema@il.com",
        }),
    )
    .unwrap();

    let json = serde_json::to_string(&stored).unwrap();
    assert!(json.contains("person_email_added"));
    assert!(json.contains("ema@il.com"));

    // And deserializable
    let roundtripped: StoredEvent = serde_json::from_str(&json).unwrap();
    assert_eq!(roundtripped, stored);
    assert_eq!(roundtripped.seq, Some(2));
}

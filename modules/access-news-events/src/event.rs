//! Building events and validating command payloads.

use firebase_client::validate_key;
use serde_json::Value;

use crate::error::{EventError, Result};
use crate::types::{Fields, NewEvent, RESERVED_FIELDS};

/// Build an event envelope.
///
/// Event fields must be one-dimensional: nested objects and arrays are
/// rejected so that field checks stay simple.
pub fn create_event(event_name: &str, fields: Fields, version: u32) -> Result<NewEvent> {
    validate_key(event_name).map_err(|e| EventError::invalid_key("event name", e))?;

    for (name, value) in &fields {
        validate_key(name).map_err(|e| EventError::invalid_key("field name", e))?;
        if RESERVED_FIELDS.contains(&name.as_str()) {
            return Err(EventError::ReservedField { field: name.clone() });
        }
        if matches!(value, Value::Object(_) | Value::Array(_)) {
            return Err(EventError::NestedField { field: name.clone() });
        }
    }

    Ok(NewEvent {
        event_name: event_name.to_string(),
        version,
        fields,
    })
}

/// Check that `payload` carries exactly `required_fields`, no more, no less.
///
/// Errors name the event and both field lists so that an operator typing a
/// command by hand can see what went wrong.
pub fn cast_event_payload(
    event_name: &str,
    required_fields: &[&str],
    payload: &Fields,
) -> Result<Fields> {
    if payload.len() != required_fields.len() {
        return Err(EventError::ExtraneousFields {
            expected: to_strings(required_fields),
            got: payload.keys().cloned().collect(),
        });
    }

    let mut fields = Fields::new();
    for (name, value) in payload {
        if !required_fields.contains(&name.as_str()) {
            return Err(EventError::UnexpectedField {
                event_name: event_name.to_string(),
                expected: to_strings(required_fields),
                field: name.clone(),
            });
        }
        fields.insert(name.clone(), value.clone());
    }

    Ok(fields)
}

fn to_strings(names: &[&str]) -> Vec<String> {
    names.iter().map(|s| s.to_string()).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn fields(value: Value) -> Fields {
        match value {
            Value::Object(map) => map,
            _ => panic!("expected an object"),
        }
    }

    #[test]
    fn create_event_keeps_scalar_fields() {
        let event = create_event(
            "person_added",
            fields(json!({"first_name": "Bala", "age": 3, "active": true, "note": null})),
            0,
        )
        .unwrap();

        assert_eq!(event.event_name, "person_added");
        assert_eq!(event.version, 0);
        assert_eq!(event.field("first_name"), Some(&json!("Bala")));
        assert_eq!(event.fields.len(), 4);
    }

    #[test]
    fn create_event_rejects_nested_values() {
        let err = create_event(
            "person_added",
            fields(json!({"name": {"first": "Bala", "last": "Bab"}})),
            0,
        )
        .unwrap_err();
        assert!(matches!(err, EventError::NestedField { ref field } if field == "name"));

        let err = create_event("person_added", fields(json!({"tags": ["a"]})), 0).unwrap_err();
        assert!(matches!(err, EventError::NestedField { .. }));
    }

    #[test]
    fn create_event_rejects_envelope_collisions() {
        for reserved in RESERVED_FIELDS {
            let mut payload = Fields::new();
            payload.insert(reserved.to_string(), json!(1));
            let err = create_event("person_added", payload, 0).unwrap_err();
            assert!(matches!(err, EventError::ReservedField { .. }), "{reserved}");
        }
    }

    #[test]
    fn create_event_rejects_unstorable_names() {
        let err = create_event("person.added", Fields::new(), 0).unwrap_err();
        assert!(matches!(err, EventError::InvalidKey { what: "event name", .. }));

        let err = create_event("person_added", fields(json!({"a/b": 1})), 0).unwrap_err();
        assert!(matches!(err, EventError::InvalidKey { what: "field name", .. }));
    }

    #[test]
    fn cast_accepts_exact_field_set_in_any_order() {
        let payload = fields(json!({"last_name": "Bab", "first_name": "Bala"}));
        let cast = cast_event_payload("person_added", &["first_name", "last_name"], &payload)
            .unwrap();
        assert_eq!(cast, payload);
    }

    #[test]
    fn cast_rejects_missing_or_extra_fields_by_count() {
        let payload = fields(json!({"first_name": "Bala"}));
        let err = cast_event_payload("person_added", &["first_name", "last_name"], &payload)
            .unwrap_err();
        assert_eq!(
            err.to_string(),
            "Extraneous fields, expected: first_name,last_name, got: first_name"
        );

        let payload = fields(json!({"first_name": "Bala", "last_name": "Bab", "x": 1}));
        let err = cast_event_payload("person_added", &["first_name", "last_name"], &payload)
            .unwrap_err();
        assert!(matches!(err, EventError::ExtraneousFields { .. }));
    }

    #[test]
    fn cast_names_the_unmatched_field() {
        let payload = fields(json!({"first_name": "Bala", "surname": "Bab"}));
        let err = cast_event_payload("person_added", &["first_name", "last_name"], &payload)
            .unwrap_err();
        assert_eq!(
            err.to_string(),
            "person_added expects the fields: first_name,last_name, no match for: surname"
        );
    }
}

//! Database key rules.
//!
//! Realtime Database keys are UTF-8 strings of at most 768 bytes that may not
//! contain `.`, `$`, `#`, `[`, `]`, `/` or ASCII control characters.

use crate::error::{FirebaseError, Result};

pub const MAX_KEY_BYTES: usize = 768;

const FORBIDDEN: &[char] = &['.', '$', '#', '[', ']', '/'];

/// Check that `key` can be used as a single path segment.
pub fn validate_key(key: &str) -> Result<()> {
    if key.is_empty() {
        return Err(invalid(key, "key is empty"));
    }
    if key.len() > MAX_KEY_BYTES {
        return Err(invalid(
            key,
            &format!("key is {} bytes, limit is {MAX_KEY_BYTES}", key.len()),
        ));
    }
    if let Some(c) = key.chars().find(|c| FORBIDDEN.contains(c)) {
        return Err(invalid(key, &format!("contains forbidden character {c:?}")));
    }
    if key.chars().any(|c| c.is_ascii_control()) {
        return Err(invalid(key, "contains an ASCII control character"));
    }
    Ok(())
}

/// Join `parent` and a validated `key` into a slash-separated path.
pub fn child_path(parent: &str, key: &str) -> Result<String> {
    validate_key(key)?;
    let parent = parent.trim_matches('/');
    if parent.is_empty() {
        Ok(key.to_string())
    } else {
        Ok(format!("{parent}/{key}"))
    }
}

fn invalid(key: &str, reason: &str) -> FirebaseError {
    FirebaseError::InvalidKey {
        key: key.to_string(),
        reason: reason.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn accepts_push_ids_and_snake_case_names() {
        assert!(validate_key("-NxYz012345678abcdef").is_ok());
        assert!(validate_key("person_added").is_ok());
        assert!(validate_key("first name with spaces").is_ok());
        assert!(validate_key("ünïcödé").is_ok());
    }

    #[test]
    fn rejects_forbidden_characters() {
        for key in ["a.b", "$ref", "#tag", "a[0]", "b]", "nested/path"] {
            assert!(validate_key(key).is_err(), "{key} should be rejected");
        }
    }

    #[test]
    fn rejects_empty_and_control_characters() {
        assert!(validate_key("").is_err());
        assert!(validate_key("tab\there").is_err());
        assert!(validate_key("del\u{7f}").is_err());
    }

    #[test]
    fn enforces_byte_length_limit() {
        let at_limit = "a".repeat(MAX_KEY_BYTES);
        assert!(validate_key(&at_limit).is_ok());

        let over = "a".repeat(MAX_KEY_BYTES + 1);
        assert!(validate_key(&over).is_err());

        // 2-byte chars count double
        let wide = "é".repeat(MAX_KEY_BYTES / 2 + 1);
        assert!(validate_key(&wide).is_err());
    }

    #[test]
    fn child_path_normalises_slashes() {
        assert_eq!(child_path("event_store", "abc").unwrap(), "event_store/abc");
        assert_eq!(child_path("/event_store/", "abc").unwrap(), "event_store/abc");
        assert_eq!(child_path("", "abc").unwrap(), "abc");
        assert!(child_path("event_store", "a/b").is_err());
    }
}

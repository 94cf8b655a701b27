//! Redaction of params before they reach the audit log.

use serde_json::{Map, Value};

const REDACTED: &str = "[REDACTED]";

/// Substrings that mark a key as sensitive (matched case-insensitively).
const SENSITIVE_KEYS: &[&str] = &[
    "token",
    "secret",
    "password",
    "credential",
    "key",
    "auth",
    "signature",
];

/// Strings longer than this are replaced by their length.
const MAX_STRING_LENGTH: usize = 1024;

/// Copy of `params` with sensitive values redacted and long strings elided.
pub fn sanitize_params(params: &Value) -> Value {
    match params {
        Value::Object(map) => {
            let sanitized: Map<String, Value> = map
                .iter()
                .map(|(key, value)| {
                    let value = if is_sensitive(key) {
                        Value::String(REDACTED.to_string())
                    } else {
                        sanitize_params(value)
                    };
                    (key.clone(), value)
                })
                .collect();
            Value::Object(sanitized)
        }
        Value::Array(items) => Value::Array(items.iter().map(sanitize_params).collect()),
        Value::String(s) if s.len() > MAX_STRING_LENGTH => {
            Value::String(format!("[TRUNCATED - {} bytes]", s.len()))
        }
        _ => params.clone(),
    }
}

fn is_sensitive(key: &str) -> bool {
    let key = key.to_lowercase();
    SENSITIVE_KEYS.iter().any(|s| key.contains(s))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_token_redacted() {
        let sanitized = sanitize_params(&json!({"token": "abc", "scope": "all"}));
        assert_eq!(sanitized["token"], REDACTED);
        assert_eq!(sanitized["scope"], "all");
    }

    #[test]
    fn test_key_match_is_substring_and_case_insensitive() {
        let sanitized = sanitize_params(&json!({
            "Authorization": "Bearer xyz",
            "SESSION_TOKEN": "t",
            "signing_key": "k",
            "user_credentials": {"nested": "data"}
        }));
        assert_eq!(sanitized["Authorization"], REDACTED);
        assert_eq!(sanitized["SESSION_TOKEN"], REDACTED);
        assert_eq!(sanitized["signing_key"], REDACTED);
        assert_eq!(sanitized["user_credentials"], REDACTED);
    }

    #[test]
    fn test_nested_and_arrays() {
        let sanitized = sanitize_params(&json!({
            "items": [{"name": "a", "secret": "s1"}, {"name": "b", "secret": "s2"}]
        }));
        assert_eq!(sanitized["items"][0]["name"], "a");
        assert_eq!(sanitized["items"][0]["secret"], REDACTED);
        assert_eq!(sanitized["items"][1]["secret"], REDACTED);
    }

    #[test]
    fn test_long_strings_truncated() {
        let sanitized = sanitize_params(&json!({"note": "x".repeat(2000)}));
        assert_eq!(sanitized["note"], "[TRUNCATED - 2000 bytes]");
    }

    #[test]
    fn test_non_object_params() {
        assert_eq!(sanitize_params(&Value::Null), Value::Null);
        assert_eq!(sanitize_params(&json!(7)), json!(7));
    }
}

//! Shared utility functions for reading model output.
//!
//! ## JSON Extraction Helpers
//!
//! Provides ergonomic helpers for extracting values from `serde_json::Value`:
//! - `json_string`, `json_text` - Extract strings (strict / lenient)
//! - `json_string_array` - Extract string arrays
//! - `json_f64_opt` - Extract numbers, accepting numeric strings

use serde_json::Value;

// =============================================================================
// JSON Value Extraction Helpers
// =============================================================================

/// Extract string from JSON value by key.
#[inline]
pub fn json_string(value: &Value, key: &str) -> Option<String> {
    value.get(key)?.as_str().map(String::from)
}

/// Extract a scalar as text: strings as-is, numbers and booleans rendered.
///
/// Models often answer `"correct_answer": 22` instead of `"22"`.
pub fn json_text(value: &Value, key: &str) -> Option<String> {
    match value.get(key)? {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        Value::Bool(b) => Some(b.to_string()),
        _ => None,
    }
}

/// Extract string array from JSON value by key, rendering scalar items.
#[inline]
pub fn json_string_array(value: &Value, key: &str) -> Vec<String> {
    value
        .get(key)
        .and_then(|v| v.as_array())
        .map(|arr| arr.iter().filter_map(scalar_text).collect())
        .unwrap_or_default()
}

/// Extract f64, accepting numeric strings.
#[inline]
pub fn json_f64_opt(value: &Value, key: &str) -> Option<f64> {
    match value.get(key)? {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}

/// Render a scalar JSON value as text
pub fn scalar_text(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        Value::Bool(b) => Some(b.to_string()),
        _ => None,
    }
}

// =============================================================================
// String Utilities
// =============================================================================

/// Keep at most `max` characters, respecting char boundaries.
pub fn truncate_chars(s: &str, max: usize) -> &str {
    match s.char_indices().nth(max) {
        Some((idx, _)) => &s[..idx],
        None => s,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_json_text_renders_numbers() {
        let v = json!({"a": 22, "b": "x", "c": [1]});
        assert_eq!(json_text(&v, "a").as_deref(), Some("22"));
        assert_eq!(json_text(&v, "b").as_deref(), Some("x"));
        assert_eq!(json_text(&v, "c"), None);
    }

    #[test]
    fn test_json_string_array_mixed() {
        let v = json!({"hints": ["one", 2, null]});
        assert_eq!(json_string_array(&v, "hints"), vec!["one", "2"]);
    }

    #[test]
    fn test_json_f64_opt_string() {
        let v = json!({"difficulty": "3.5"});
        assert_eq!(json_f64_opt(&v, "difficulty"), Some(3.5));
    }

    #[test]
    fn test_truncate_chars_multibyte() {
        assert_eq!(truncate_chars("héllo", 2), "hé");
        assert_eq!(truncate_chars("abc", 10), "abc");
    }
}

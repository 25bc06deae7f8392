//! JSON Repair Mechanism
//!
//! Extracts a JSON object from model output that may be wrapped in prose,
//! commented, or cut off mid-stream.
//!
//! Repair chain, first success wins:
//! 1. Direct parse (after stripping code fences and BOM)
//! 2. Slice from the first `{` to the last `}`
//! 3. Strip `//` and `/* */` comments outside strings
//! 4. Balance repair: close a dangling string, give a trailing bare key an
//!    empty value, drop trailing commas, then close open `[`/`{` in nesting
//!    order

use serde_json::Value;
use tracing::debug;

use crate::types::{ForgeError, Result, truncate_chars};

// =============================================================================
// Convenience Functions
// =============================================================================

/// Extract a JSON object from a model response
pub fn extract_json_from_response(content: &str) -> Result<Value> {
    JsonRepairer::new()
        .parse_or_repair(content)
        .map(|(value, _)| value)
}

/// Extract a JSON object, returning whether repair was needed
pub fn extract_json_with_repair_status(content: &str) -> Result<(Value, bool)> {
    JsonRepairer::new().parse_or_repair(content)
}

// =============================================================================
// JsonRepairer
// =============================================================================

#[derive(Debug, Default, Clone, Copy)]
pub struct JsonRepairer;

impl JsonRepairer {
    pub fn new() -> Self {
        Self
    }

    /// Parse an object, repairing if needed
    ///
    /// Returns (Value, was_repaired)
    pub fn parse_or_repair(&self, raw: &str) -> Result<(Value, bool)> {
        let cleaned = self.preprocess(raw);

        if let Some(value) = parse_object(&cleaned) {
            return Ok((value, false));
        }

        let sliced = slice_braces(&cleaned);
        if let Some(value) = sliced.and_then(parse_object) {
            debug!("JSON object sliced from surrounding text");
            return Ok((value, true));
        }

        // Truncated output has no closing brace, so keep everything after `{`
        let body = sliced.or_else(|| cleaned.find('{').map(|start| &cleaned[start..]));
        let Some(body) = body else {
            return Err(self.failure(&cleaned, "no JSON object found"));
        };

        let uncommented = strip_comments(body);
        if let Some(value) = parse_object(&uncommented) {
            debug!("JSON parsed after stripping comments");
            return Ok((value, true));
        }

        let open_body = cleaned
            .find('{')
            .map(|start| strip_comments(&cleaned[start..]))
            .unwrap_or(uncommented);
        let balanced = balance(&open_body);
        if let Some(value) = parse_object(&balanced) {
            debug!(
                original_len = cleaned.len(),
                repaired_len = balanced.len(),
                "JSON balanced after truncation"
            );
            return Ok((value, true));
        }

        Err(self.failure(&cleaned, "repair did not produce a valid object"))
    }

    fn failure(&self, cleaned: &str, reason: &str) -> ForgeError {
        ForgeError::Parse(format!(
            "{}. Content preview: {}...",
            reason,
            truncate_chars(cleaned, 200)
        ))
    }

    /// Strip code fences and BOM
    fn preprocess(&self, raw: &str) -> String {
        let s = raw.trim().trim_start_matches('\u{feff}').trim();
        self.strip_code_fences(s).trim().to_string()
    }

    fn strip_code_fences<'a>(&self, s: &'a str) -> &'a str {
        let mut result = s;

        // ```json ... ``` or ``` ... ```
        if result.starts_with("```") {
            result = match result.find('\n') {
                Some(first_newline) => &result[first_newline + 1..],
                None => result.trim_start_matches('`'),
            };
        }

        if let Some(stripped) = result.trim_end().strip_suffix("```") {
            result = stripped;
        }

        result
    }
}

fn parse_object(text: &str) -> Option<Value> {
    serde_json::from_str::<Value>(text)
        .ok()
        .filter(Value::is_object)
}

/// First `{` through last `}`, if both exist in that order
fn slice_braces(s: &str) -> Option<&str> {
    let start = s.find('{')?;
    let end = s.rfind('}')?;
    (end > start).then(|| &s[start..=end])
}

/// Remove `//` line comments and `/* */` block comments outside strings
fn strip_comments(s: &str) -> String {
    let mut result = String::with_capacity(s.len());
    let mut chars = s.chars().peekable();
    let mut in_string = false;
    let mut escape = false;

    while let Some(ch) = chars.next() {
        if in_string {
            result.push(ch);
            if escape {
                escape = false;
            } else if ch == '\\' {
                escape = true;
            } else if ch == '"' {
                in_string = false;
            }
            continue;
        }

        match (ch, chars.peek()) {
            ('"', _) => {
                in_string = true;
                result.push(ch);
            }
            ('/', Some('/')) => {
                for skipped in chars.by_ref() {
                    if skipped == '\n' {
                        result.push('\n');
                        break;
                    }
                }
            }
            ('/', Some('*')) => {
                chars.next();
                let mut prev = '\0';
                for skipped in chars.by_ref() {
                    if prev == '*' && skipped == '/' {
                        break;
                    }
                    prev = skipped;
                }
            }
            _ => result.push(ch),
        }
    }

    result
}

/// Close whatever a truncated object left open
fn balance(s: &str) -> String {
    let mut result = s.trim_end().to_string();

    let mut stack: Vec<char> = Vec::new();
    let mut in_string = false;
    let mut escape = false;
    let mut last_string_is_key = false;
    let mut prev_significant: Option<char> = None;

    for ch in result.chars() {
        if in_string {
            if escape {
                escape = false;
            } else if ch == '\\' {
                escape = true;
            } else if ch == '"' {
                in_string = false;
                prev_significant = Some('"');
            }
            continue;
        }

        match ch {
            '"' => {
                in_string = true;
                last_string_is_key =
                    stack.last() == Some(&'{') && matches!(prev_significant, Some('{' | ','));
            }
            '{' | '[' => stack.push(ch),
            '}' | ']' => {
                stack.pop();
            }
            _ => {}
        }
        if !ch.is_whitespace() && ch != '"' {
            prev_significant = Some(ch);
        }
    }

    if in_string {
        if escape {
            result.pop();
        }
        result.push('"');
    }

    let trimmed_len = result.trim_end().len();
    result.truncate(trimmed_len);

    match result.chars().last() {
        Some(':') => result.push_str(" \"\""),
        Some('"') if last_string_is_key && stack.last() == Some(&'{') => {
            result.push_str(": \"\"")
        }
        Some(',') => {
            result.pop();
        }
        _ => {}
    }

    let mut result = drop_trailing_commas(&result);
    while let Some(open) = stack.pop() {
        result.push(if open == '{' { '}' } else { ']' });
    }
    result
}

/// Remove commas directly followed by a closer, outside strings
fn drop_trailing_commas(s: &str) -> String {
    let chars: Vec<char> = s.chars().collect();
    let mut result = String::with_capacity(s.len());
    let mut in_string = false;
    let mut escape = false;

    for (i, &ch) in chars.iter().enumerate() {
        if in_string {
            if escape {
                escape = false;
            } else if ch == '\\' {
                escape = true;
            } else if ch == '"' {
                in_string = false;
            }
            result.push(ch);
            continue;
        }

        if ch == ',' {
            let next = chars[i + 1..].iter().find(|c| !c.is_whitespace());
            if matches!(next, Some(']' | '}') | None) {
                continue;
            }
        }
        if ch == '"' {
            in_string = true;
        }
        result.push(ch);
    }

    result
}

#[cfg(test)]
mod tests {
    use super::*;

    fn repair(input: &str) -> (Value, bool) {
        JsonRepairer::new().parse_or_repair(input).unwrap()
    }

    #[test]
    fn test_parse_valid_json() {
        let (value, repaired) = repair(r#"{"title": "Grid"}"#);
        assert!(!repaired);
        assert_eq!(value["title"], "Grid");
    }

    #[test]
    fn test_strip_code_fences_and_bom() {
        let input = "\u{feff}```json\n{\"title\": \"Grid\"}\n```";
        let (value, repaired) = repair(input);
        assert!(!repaired);
        assert_eq!(value["title"], "Grid");
    }

    #[test]
    fn test_slice_from_prose() {
        let input = r#"Here is your puzzle:
{"title": "Grid", "hints": ["a", "b"]}
Enjoy!"#;
        let (value, repaired) = repair(input);
        assert!(repaired);
        assert_eq!(value["hints"][1], "b");
    }

    #[test]
    fn test_strip_comments_outside_strings() {
        let input = r#"{
            // generated
            "title": "a // not a comment", /* inline */
            "question": "q"
        }"#;
        let (value, repaired) = repair(input);
        assert!(repaired);
        assert_eq!(value["title"], "a // not a comment");
        assert_eq!(value["question"], "q");
    }

    #[test]
    fn test_truncated_inside_string() {
        let (value, repaired) = repair(r#"{"title": "Grid", "explanation": "Rows alt"#);
        assert!(repaired);
        assert_eq!(value["explanation"], "Rows alt");
    }

    #[test]
    fn test_truncated_after_key() {
        let (value, _) = repair(r#"{"title": "Grid", "explanation""#);
        assert_eq!(value["explanation"], "");

        let (value, _) = repair(r#"{"title": "Grid", "explanation":"#);
        assert_eq!(value["explanation"], "");

        let (value, _) = repair(r#"{"title": "Grid", "expla"#);
        assert_eq!(value["expla"], "");
    }

    #[test]
    fn test_truncated_nested() {
        let input = r#"{"title": "Grid", "family_data": {"grid": [["X", "O"], ["O","#;
        let (value, repaired) = repair(input);
        assert!(repaired);
        assert_eq!(value["family_data"]["grid"][1][0], "O");
    }

    #[test]
    fn test_trailing_comma() {
        let (value, repaired) = repair(r#"{"hints": ["a", "b",], "title": "t",}"#);
        assert!(repaired);
        assert_eq!(value["hints"].as_array().map(|a| a.len()), Some(2));
    }

    #[test]
    fn test_non_object_is_error() {
        let result = JsonRepairer::new().parse_or_repair("[1, 2, 3]");
        assert!(matches!(result, Err(ForgeError::Parse(_))));

        let result = JsonRepairer::new().parse_or_repair("no json at all");
        assert!(matches!(result, Err(ForgeError::Parse(_))));
    }

    #[test]
    fn test_balance_closes_in_nesting_order() {
        assert_eq!(balance(r#"{"a": [{"b": 1"#), r#"{"a": [{"b": 1}]}"#);
        assert_eq!(balance(r#"{"a": [1, 2,"#), r#"{"a": [1, 2]}"#);
    }
}

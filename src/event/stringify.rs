//! Length-capped, failure-tolerant serialization of logged values

use std::fmt::Debug;

use serde::Serialize;
use serde_json::{Map, Value};

/// Default cap, in characters, for any serialized value
pub const DEFAULT_MAX_LEN: usize = 500;

/// Appended to values cut at the cap
pub const TRUNCATION_MARKER: &str = "...";

static_assertions::const_assert!(DEFAULT_MAX_LEN > TRUNCATION_MARKER.len());

/// Serialize `value` as JSON, capped at `max_len` characters.
///
/// Falls back to the `Debug` rendering when serde cannot represent the
/// value. Never fails.
pub fn safe_stringify<T>(value: &T, max_len: usize) -> String
where
    T: Serialize + Debug + ?Sized,
{
    let rendered = serde_json::to_string(value).unwrap_or_else(|_| format!("{value:?}"));
    truncate(rendered, max_len)
}

/// Cut `text` to `max_len` characters, appending the marker if anything was cut
#[must_use]
pub fn truncate(mut text: String, max_len: usize) -> String {
    if let Some((cut, _)) = text.char_indices().nth(max_len) {
        text.truncate(cut);
        text.push_str(TRUNCATION_MARKER);
    }
    text
}

/// Stringify each argument and join with single spaces
#[must_use]
pub fn stringify_args(args: &[Value], max_len: usize) -> String {
    args.iter()
        .map(|arg| safe_stringify(arg, max_len))
        .collect::<Vec<_>>()
        .join(" ")
}

/// Header pairs as a JSON object; later duplicates win
#[must_use]
pub fn headers_object(headers: &[(String, String)]) -> Value {
    let map: Map<String, Value> = headers
        .iter()
        .map(|(name, value)| (name.clone(), Value::String(value.clone())))
        .collect();
    Value::Object(map)
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;
    use serde_json::json;
    use std::collections::HashMap;

    #[test]
    fn test_exact_cap_is_not_truncated() {
        // 498 chars plus the two JSON quotes
        let value = "a".repeat(498);
        let out = safe_stringify(&value, 500);
        assert_eq!(out.chars().count(), 500);
        assert!(!out.ends_with(TRUNCATION_MARKER));
    }

    #[test]
    fn test_one_over_cap_is_truncated() {
        let value = "a".repeat(499);
        let out = safe_stringify(&value, 500);
        assert_eq!(out.chars().count(), 500 + TRUNCATION_MARKER.len());
        assert!(out.ends_with(TRUNCATION_MARKER));
    }

    #[test]
    fn test_truncate_respects_char_boundaries() {
        let out = truncate("héllo wörld".to_string(), 4);
        assert_eq!(out, "héll...");
    }

    #[test]
    fn test_unserializable_falls_back_to_debug() {
        let mut map = HashMap::new();
        map.insert((1, 2), "tuple keys are not valid JSON object keys");

        let out = safe_stringify(&map, 500);
        assert!(out.contains("(1, 2)"));
    }

    #[test]
    fn test_stringify_args_joins_with_spaces() {
        let out = stringify_args(&[json!("hello"), json!(42), json!({"a": true})], 500);
        assert_eq!(out, "\"hello\" 42 {\"a\":true}");
    }

    #[test]
    fn test_headers_object_last_wins() {
        let headers = vec![
            ("Accept".to_string(), "text/html".to_string()),
            ("Accept".to_string(), "application/json".to_string()),
        ];
        assert_eq!(headers_object(&headers), json!({"Accept": "application/json"}));
    }

    proptest! {
        #[test]
        fn prop_truncation_boundary(len in 0usize..64, cap in 1usize..64) {
            let text = "x".repeat(len);
            let out = truncate(text.clone(), cap);
            if len <= cap {
                prop_assert_eq!(out, text);
            } else {
                prop_assert_eq!(out.len(), cap + TRUNCATION_MARKER.len());
                prop_assert!(out.ends_with(TRUNCATION_MARKER));
            }
        }
    }
}

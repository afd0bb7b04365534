//! Defensive field-path lookups over loosely shaped JSON.
//!
//! Upstream responses move fields around between versions, so callers probe a
//! short list of candidate paths in priority order. A missing or mistyped
//! segment yields `None`; nothing here panics.

use serde_json::Value;

/// Walk `path` through nested objects.
#[must_use]
pub fn deep_get<'a>(value: &'a Value, path: &[&str]) -> Option<&'a Value> {
    path.iter()
        .try_fold(value, |node, key| node.as_object()?.get(*key))
}

/// First candidate path holding a non-blank string, trimmed.
#[must_use]
pub fn first_string(value: &Value, paths: &[&[&str]]) -> Option<String> {
    paths.iter().find_map(|path| {
        deep_get(value, path)
            .and_then(Value::as_str)
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(str::to_string)
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_deep_get_nested() {
        let value = json!({"a": {"b": {"c": 3}}});
        assert_eq!(deep_get(&value, &["a", "b", "c"]), Some(&json!(3)));
        assert_eq!(deep_get(&value, &[]), Some(&value));
        assert_eq!(deep_get(&value, &["a", "x"]), None);
        assert_eq!(deep_get(&value, &["a", "b", "c", "d"]), None);
        assert_eq!(deep_get(&json!([1]), &["a"]), None);
    }

    #[test]
    fn test_first_string_skips_blank_and_non_strings() {
        let value = json!({"url": "  ", "wsUrl": 5, "nested": {"url": " wss://x "}});
        let found = first_string(&value, &[&["url"], &["wsUrl"], &["nested", "url"]]);
        assert_eq!(found.as_deref(), Some("wss://x"));
        assert_eq!(first_string(&value, &[&["missing"]]), None);
    }
}

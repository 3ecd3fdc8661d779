//! Claim lookup by dotted path.

use once_cell::sync::Lazy;
use regex::Regex;
use serde_json::Value;

static SEGMENT_PATTERN: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^([^\[\]]+)?((?:\[\d+\])*)$").expect("segment pattern must compile")
});
static INDEX_PATTERN: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\[(\d+)\]").expect("index pattern must compile"));

/// Returns the value at `path` in `payload`, or `None` when nothing matches.
///
/// Paths are dotted keys with optional `[n]` array indices and an optional
/// leading `$.`, e.g. `claims.email` or `$.roles[0]`.
pub fn get_claim_from_payload(payload: &Value, path: &str) -> Option<Value> {
    let pointer = json_pointer(path)?;
    payload.pointer(&pointer).cloned()
}

fn json_pointer(path: &str) -> Option<String> {
    let path = path.trim();
    let path = path
        .strip_prefix("$.")
        .or_else(|| path.strip_prefix('$'))
        .unwrap_or(path);
    if path.is_empty() {
        return Some(String::new());
    }

    let mut pointer = String::new();
    for segment in path.split('.') {
        let captures = SEGMENT_PATTERN.captures(segment)?;
        let key = captures.get(1).map(|m| m.as_str());
        let indices = captures.get(2).map_or("", |m| m.as_str());
        if key.is_none() && indices.is_empty() {
            return None;
        }
        if let Some(key) = key {
            pointer.push('/');
            pointer.push_str(&key.replace('~', "~0").replace('/', "~1"));
        }
        for index in INDEX_PATTERN.captures_iter(indices) {
            pointer.push('/');
            pointer.push_str(&index[1]);
        }
    }
    Some(pointer)
}

#[cfg(test)]
mod tests {
    use super::{get_claim_from_payload, json_pointer};
    use serde_json::json;

    #[test]
    fn nested_claim_is_found() {
        let payload = json!({ "claims": { "email": "foo@bar.com" } });
        assert_eq!(
            get_claim_from_payload(&payload, "claims.email"),
            Some(json!("foo@bar.com"))
        );
        assert_eq!(
            get_claim_from_payload(&payload, "$.claims.email"),
            Some(json!("foo@bar.com"))
        );
    }

    #[test]
    fn missing_claim_is_none() {
        assert_eq!(get_claim_from_payload(&json!({}), "claims.email"), None);
    }

    #[test]
    fn array_indices_are_supported() {
        let payload = json!({ "roles": ["reader", "writer"] });
        assert_eq!(
            get_claim_from_payload(&payload, "roles[1]"),
            Some(json!("writer"))
        );
    }

    #[test]
    fn malformed_paths_match_nothing() {
        assert_eq!(json_pointer("a..b"), None);
        assert_eq!(json_pointer("a[x]"), None);
        assert_eq!(json_pointer("a/b").as_deref(), Some("/a~1b"));
    }
}

//! Canonical-JSON hashing for content-addressed entities (specifications,
//! molecules). Grounded on `chem-gl-chemflow`'s `chem-core::hashing`
//! module: sort object keys, preserve array order, hash the resulting
//! string with BLAKE3.

use serde_json::Value;
use std::collections::BTreeMap;

/// Render a [`Value`] as a canonical string: object keys sorted
/// lexicographically, arrays left in their given order, numbers/strings
/// rendered through `serde_json`'s own formatting.
pub fn to_canonical_json(value: &Value) -> String {
    match value {
        Value::Null => "null".to_string(),
        Value::Bool(b) => b.to_string(),
        Value::Number(n) => n.to_string(),
        Value::String(s) => serde_json::to_string(s).unwrap_or_default(),
        Value::Array(items) => {
            let rendered: Vec<String> = items.iter().map(to_canonical_json).collect();
            format!("[{}]", rendered.join(","))
        }
        Value::Object(map) => {
            let mut sorted = BTreeMap::new();
            for (k, v) in map {
                sorted.insert(k, to_canonical_json(v));
            }
            let rendered: Vec<String> = sorted
                .into_iter()
                .map(|(k, v)| format!("{}:{}", serde_json::to_string(k).unwrap_or_default(), v))
                .collect();
            format!("{{{}}}", rendered.join(","))
        }
    }
}

/// BLAKE3 hex digest of an arbitrary string.
pub fn hash_str(input: &str) -> String {
    blake3::hash(input.as_bytes()).to_hex().to_string()
}

/// Canonicalise then hash a JSON value. This is the single hashing path
/// used for both specification and molecule content addressing so that
/// the dedup laws in §8 hold by construction: equal canonical content
/// always yields the same id.
pub fn content_hash(value: &Value) -> String {
    hash_str(&to_canonical_json(value))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn key_order_does_not_affect_hash() {
        let a = json!({"b": 1, "a": 2});
        let b = json!({"a": 2, "b": 1});
        assert_eq!(content_hash(&a), content_hash(&b));
    }

    #[test]
    fn array_order_does_affect_hash() {
        let a = json!({"x": [1, 2, 3]});
        let b = json!({"x": [3, 2, 1]});
        assert_ne!(content_hash(&a), content_hash(&b));
    }

    #[test]
    fn nested_objects_canonicalise_recursively() {
        let a = json!({"outer": {"z": 1, "y": 2}});
        let b = json!({"outer": {"y": 2, "z": 1}});
        assert_eq!(content_hash(&a), content_hash(&b));
    }
}

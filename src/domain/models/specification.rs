//! Specification: a canonicalised, content-addressed descriptor of how to
//! compute (§3). Equal canonical content hashes to the same id — this is
//! the "spec dedup law" of §8.

use serde::{Deserialize, Serialize};
use serde_json::{json, Map, Value};

use super::canonical::content_hash;

/// A content-addressed computation descriptor.
///
/// `id` is assigned by the repository on first insert; two
/// specifications whose [`Specification::canonical_hash`] match are the
/// same specification regardless of how they were typed in (casing,
/// elided defaults, `basis: null` vs `basis: ""`).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Specification {
    /// Assigned once persisted; `None` for a specification not yet
    /// inserted.
    pub id: Option<i64>,
    /// Compute program, e.g. `psi4`.
    pub program: String,
    /// Computational method, e.g. `b3lyp`.
    pub method: String,
    /// Basis set, e.g. `6-31g*`. `None` and `Some("")` canonicalise
    /// identically.
    pub basis: Option<String>,
    /// Arbitrary program keywords.
    pub keywords: Value,
    /// Workflow-level protocol knobs (e.g. `{"wavefunction": "none"}`).
    pub protocols: Value,
}

/// Default-valued sub-fields that are elided before hashing, matching
/// §3's "default-valued sub-fields elided before hashing" rule. Keyed by
/// JSON-pointer-ish dotted path within `keywords`/`protocols`.
const ELIDED_DEFAULTS: &[(&str, &Value)] = &[];

impl Specification {
    /// Build a new, not-yet-persisted specification.
    pub fn new(
        program: impl Into<String>,
        method: impl Into<String>,
        basis: Option<String>,
        keywords: Value,
        protocols: Value,
    ) -> Self {
        Self {
            id: None,
            program: program.into(),
            method: method.into(),
            basis,
            keywords,
            protocols,
        }
    }

    /// Canonicalise `basis`: `None` and `Some("")` are the same value.
    fn canonical_basis(&self) -> Option<String> {
        match &self.basis {
            None => None,
            Some(s) if s.is_empty() => None,
            Some(s) => Some(s.to_lowercase()),
        }
    }

    /// Elide sub-fields that equal their declared default, then lowercase
    /// case-insensitive chemistry fields. Produces the JSON value the
    /// content hash is taken over.
    fn canonical_value(&self) -> Value {
        let mut keywords = self.keywords.clone();
        elide_defaults(&mut keywords);
        let mut protocols = self.protocols.clone();
        elide_defaults(&mut protocols);

        json!({
            "program": self.program.to_lowercase(),
            "method": self.method.to_lowercase(),
            "basis": self.canonical_basis(),
            "keywords": keywords,
            "protocols": protocols,
        })
    }

    /// The content hash used as the dedup key (§3, §8 spec dedup law).
    pub fn canonical_hash(&self) -> String {
        content_hash(&self.canonical_value())
    }
}

/// Strip object entries whose value matches a known default, recursively.
/// With an empty default table this is a no-op pass-through; kept as its
/// own function so concrete per-deployment defaults can be registered
/// without touching the hashing call sites.
fn elide_defaults(value: &mut Value) {
    if let Value::Object(map) = value {
        let mut to_remove = Vec::new();
        for (k, v) in map.iter() {
            if ELIDED_DEFAULTS.iter().any(|(path, default)| path == k && *v == **default) {
                to_remove.push(k.clone());
            }
        }
        for k in to_remove {
            map.remove(&k);
        }
        for v in map.values_mut() {
            elide_defaults(v);
        }
    }
}

/// Build an empty keywords/protocols map — convenience for callers that
/// don't need either.
pub fn empty_map() -> Value {
    Value::Object(Map::new())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn case_insensitive_fields_dedup() {
        let a = Specification::new("prog1", "b3LYP", Some("6-31G*".to_string()), empty_map(), empty_map());
        let b = Specification::new("Prog1", "b3lyp", Some("6-31g*".to_string()), empty_map(), empty_map());
        assert_eq!(a.canonical_hash(), b.canonical_hash());
    }

    #[test]
    fn null_and_empty_basis_are_equal() {
        let a = Specification::new("prog1", "hf", None, empty_map(), empty_map());
        let b = Specification::new("prog1", "hf", Some(String::new()), empty_map(), empty_map());
        assert_eq!(a.canonical_hash(), b.canonical_hash());
    }

    #[test]
    fn different_basis_does_not_dedup() {
        let a = Specification::new("prog1", "hf", Some("sto-3g".to_string()), empty_map(), empty_map());
        let b = Specification::new("prog1", "hf", Some("6-31g*".to_string()), empty_map(), empty_map());
        assert_ne!(a.canonical_hash(), b.canonical_hash());
    }

    #[test]
    fn keyword_content_affects_hash() {
        let a = Specification::new("prog1", "hf", None, json!({"maxiter": 50}), empty_map());
        let b = Specification::new("prog1", "hf", None, json!({"maxiter": 100}), empty_map());
        assert_ne!(a.canonical_hash(), b.canonical_hash());
    }
}

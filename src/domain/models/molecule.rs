//! Molecule: content-addressed, deduplicated by canonical hash (§3).

use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

use super::canonical::content_hash;

/// A molecule geometry plus identity metadata. Deduplicated by
/// [`Molecule::canonical_hash`] — the "molecule dedup law" of §8.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Molecule {
    /// Assigned once persisted.
    pub id: Option<i64>,
    /// Atomic symbols, one per atom.
    pub symbols: Vec<String>,
    /// Flattened (x, y, z) geometry, length `3 * symbols.len()`.
    pub geometry: Vec<f64>,
    /// Net molecular charge.
    pub molecular_charge: i32,
    /// Spin multiplicity.
    pub molecular_multiplicity: i32,
    /// Free-form identifiers (name, comment) that do not affect identity.
    pub identifiers: Value,
}

impl Molecule {
    /// Build a new, not-yet-persisted molecule.
    pub fn new(
        symbols: Vec<String>,
        geometry: Vec<f64>,
        molecular_charge: i32,
        molecular_multiplicity: i32,
    ) -> Self {
        Self {
            id: None,
            symbols,
            geometry,
            molecular_charge,
            molecular_multiplicity,
            identifiers: Value::Null,
        }
    }

    /// The content hash used as the dedup key. Identifiers (name,
    /// comment) are deliberately excluded: two molecules with the same
    /// atoms/geometry/charge/multiplicity but different human-facing
    /// labels are the same molecule.
    pub fn canonical_hash(&self) -> String {
        content_hash(&json!({
            "symbols": self.symbols,
            "geometry": self.geometry,
            "molecular_charge": self.molecular_charge,
            "molecular_multiplicity": self.molecular_multiplicity,
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn water() -> Molecule {
        Molecule::new(
            vec!["O".to_string(), "H".to_string(), "H".to_string()],
            vec![0.0, 0.0, 0.0, 0.0, 0.0, 0.96, 0.93, 0.0, -0.24],
            0,
            1,
        )
    }

    #[test]
    fn identical_geometry_dedups() {
        let a = water();
        let mut b = water();
        b.identifiers = json!({"name": "H2O", "comment": "from a different entry"});
        assert_eq!(a.canonical_hash(), b.canonical_hash());
    }

    #[test]
    fn different_geometry_does_not_dedup() {
        let a = water();
        let mut b = water();
        b.geometry[2] = 0.1;
        assert_ne!(a.canonical_hash(), b.canonical_hash());
    }

    #[test]
    fn different_charge_does_not_dedup() {
        let a = water();
        let mut b = water();
        b.molecular_charge = 1;
        assert_ne!(a.canonical_hash(), b.canonical_hash());
    }
}

//! Dataset: a named, typed catalogue of (entry × specification) record
//! items (§3, §4.6).

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::record::RecordKind;

/// A named input fragment bound into a dataset (§3/GLOSSARY).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Entry {
    pub name: String,
    pub molecule_id: i64,
    pub metadata: Value,
}

/// A specification bound into a dataset under a given name. The same
/// global specification id may be bound under different names in
/// different datasets.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SpecificationBinding {
    pub name: String,
    pub specification_id: i64,
    pub description: Value,
}

/// One `(dataset, entry_name, spec_name) -> record` pointer (§3, §6: the
/// composite key is unique; invariant 3 of §8 ties the pointed record's
/// specification back to the one registered under `spec_name`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RecordItem {
    pub record_id: i64,
}

/// Identity: `(kind, lower(name))` unique (§3).
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct DatasetKey {
    pub kind: RecordKind,
    pub lowercase_name: String,
}

impl DatasetKey {
    pub fn new(kind: RecordKind, name: &str) -> Self {
        Self {
            kind,
            lowercase_name: name.to_lowercase(),
        }
    }
}

/// A dataset: the entry × specification matrix plus its record-item
/// table (§3, §4.6).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Dataset {
    pub id: i64,
    pub kind: RecordKind,
    pub name: String,
    pub default_tag: String,
    pub default_priority: i32,
    pub metadata: Value,
    pub entries: IndexMap<String, Entry>,
    pub specifications: IndexMap<String, SpecificationBinding>,
    /// Keyed by `(entry_name, spec_name)`.
    pub record_items: IndexMap<(String, String), RecordItem>,
}

/// A reverse-lookup hit from [`super::super::ports::DatasetRepository::find_record_items_by_record_ids`]:
/// which `(dataset, entry_name, spec_name)` slot points at a given record
/// (§8 scenario 1: `query-dataset-records`).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DatasetRecordItemRef {
    pub dataset_id: i64,
    pub entry_name: String,
    pub spec_name: String,
    pub record_id: i64,
}

impl Dataset {
    pub fn new(id: i64, kind: RecordKind, name: impl Into<String>) -> Self {
        Self {
            id,
            kind,
            name: name.into(),
            default_tag: "default".to_string(),
            default_priority: 0,
            metadata: Value::Null,
            entries: IndexMap::new(),
            specifications: IndexMap::new(),
            record_items: IndexMap::new(),
        }
    }

    pub fn key(&self) -> DatasetKey {
        DatasetKey::new(self.kind, &self.name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn dataset_key_lowercases_name() {
        let a = DatasetKey::new(RecordKind::Singlepoint, "H2O-Set");
        let b = DatasetKey::new(RecordKind::Singlepoint, "h2o-set");
        assert_eq!(a, b);
    }

    #[test]
    fn different_kind_is_a_different_key_even_with_same_name() {
        let a = DatasetKey::new(RecordKind::Singlepoint, "shared");
        let b = DatasetKey::new(RecordKind::Optimization, "shared");
        assert_ne!(a, b);
    }
}

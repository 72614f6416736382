//! Service: a C3 row. Owns an ordered dependency list and an opaque,
//! driver-owned `service_state` blob (§3, §4.4).

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// One child record a service is waiting on, plus the driver-chosen
/// `extras` used to reassemble results deterministically (§3). Modelled
/// as a junction row rather than an in-memory back-pointer (Design Note
/// 4): the service reads its dependencies by query.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Dependency {
    pub child_record_id: i64,
    /// Driver-chosen reassembly key, e.g. `{"position": 3}` or
    /// `{"key": "dihedral_180"}`.
    pub extras: Value,
}

impl Dependency {
    pub fn new(child_record_id: i64, extras: Value) -> Self {
        Self {
            child_record_id,
            extras,
        }
    }
}

/// A service record's C3-side state (§3, §4.4).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Service {
    pub record_id: i64,
    pub tag: String,
    pub priority: i32,
    /// Opaque, driver-owned JSON blob. Each driver defines and versions
    /// its own typed state (Design Note 3); the engine never interprets
    /// this beyond persisting it.
    pub service_state: Value,
    pub dependencies: Vec<Dependency>,
}

impl Service {
    /// A freshly-enqueued service has no dependencies yet (§4.3: "A
    /// service record in `waiting` has an empty dependency list").
    pub fn new(record_id: i64, tag: impl Into<String>, priority: i32) -> Self {
        Self {
            record_id,
            tag: tag.into(),
            priority,
            service_state: Value::Null,
            dependencies: Vec::new(),
        }
    }

    /// Replace the dependency list wholesale — the driver's previous
    /// list is cleared and new children are appended on `spawn` (§4.4).
    pub fn set_dependencies(&mut self, dependencies: Vec<Dependency>) {
        self.dependencies = dependencies;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn new_service_has_no_dependencies() {
        let service = Service::new(1, "default", 0);
        assert!(service.dependencies.is_empty());
    }

    #[test]
    fn set_dependencies_replaces_wholesale() {
        let mut service = Service::new(1, "default", 0);
        service.set_dependencies(vec![Dependency::new(2, json!({"position": 0}))]);
        assert_eq!(service.dependencies.len(), 1);
        service.set_dependencies(vec![
            Dependency::new(3, json!({"position": 0})),
            Dependency::new(4, json!({"position": 1})),
        ]);
        assert_eq!(service.dependencies.len(), 2);
        assert_eq!(service.dependencies[0].child_record_id, 3);
    }
}

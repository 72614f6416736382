//! C5: per-kind service drivers (Design Note 2 — dispatch by
//! [`RecordKind`] tag, never by a type hierarchy; Design Note 3 — each
//! driver owns a typed, versioned `service_state`, serialised to the
//! opaque JSON blob [`Service::service_state`] persists).

pub mod manybody;
pub mod neb;
pub mod reaction;
pub mod torsiondrive;

use std::collections::HashMap;

use serde_json::Value;

use crate::domain::error::CoreResult;
use crate::domain::models::record::RecordKind;
use crate::domain::models::service::Dependency;
use crate::domain::models::RecordStatus;

/// A child record a driver wants spawned, plus the `extras` tag the
/// resulting [`Dependency`] should carry for later reassembly.
#[derive(Debug, Clone)]
pub struct ChildSpec {
    pub kind: RecordKind,
    pub specification_id: i64,
    pub molecule_ids: Vec<i64>,
    pub tag: String,
    pub priority: i32,
    pub extras: Value,
}

/// What the service queue should do after calling into a driver (§4.4).
#[derive(Debug, Clone)]
pub enum DriverDecision {
    /// The service is done; store these properties and complete the
    /// record.
    Finished { properties: Value },
    /// Persist `state`, replace the dependency list with `children`, and
    /// leave the service in `running`/`waiting` for the next pass.
    Spawn { state: Value, children: Vec<ChildSpec> },
    /// Something about the computation itself is unrecoverable; raise a
    /// terminal error (distinct from `CoreError`, which is an engine
    /// fault rather than a chemistry fault).
    Raise { detail: String },
}

/// One child's outcome, as seen by the driver advancing its parent
/// service (§4.4).
#[derive(Debug, Clone)]
pub struct ChildOutcome {
    pub dependency: Dependency,
    pub status: RecordStatus,
    pub properties: Option<Value>,
}

/// Per-kind workflow logic (§4.4, §4.5). Implementations are pure:
/// given a parent record and the current state of its dependencies,
/// decide what happens next. All I/O happens in the service queue.
pub trait ServiceDriver: Send + Sync {
    fn kind(&self) -> RecordKind;

    /// Called the first time a service record is admitted (§4.3:
    /// service records start in `waiting` with no dependencies).
    /// `keywords` is the record's specification keywords blob, the
    /// per-service knobs a deployment tunes (e.g. NEB's
    /// `optimize_endpoints`/`optimize_ts`).
    fn start(&self, specification_id: i64, molecule_ids: &[i64], keywords: &Value) -> CoreResult<DriverDecision>;

    /// Called once every current dependency has reached a
    /// terminal-for-iteration status (§4.3's aggregate rule).
    fn advance(
        &self,
        specification_id: i64,
        molecule_ids: &[i64],
        state: &Value,
        children: &[ChildOutcome],
        keywords: &Value,
    ) -> CoreResult<DriverDecision>;
}

/// Looks drivers up by [`RecordKind`] (Design Note 2).
#[derive(Default)]
pub struct DriverRegistry {
    drivers: HashMap<RecordKind, Box<dyn ServiceDriver>>,
}

impl DriverRegistry {
    pub fn new() -> Self {
        Self { drivers: HashMap::new() }
    }

    pub fn register(&mut self, driver: Box<dyn ServiceDriver>) {
        self.drivers.insert(driver.kind(), driver);
    }

    pub fn get(&self, kind: RecordKind) -> Option<&dyn ServiceDriver> {
        self.drivers.get(&kind).map(std::convert::AsRef::as_ref)
    }

    /// A registry with every built-in driver registered.
    pub fn with_builtins() -> Self {
        let mut registry = Self::new();
        registry.register(Box::new(neb::NebDriver));
        registry.register(Box::new(torsiondrive::TorsionDriveDriver::new(RecordKind::Torsiondrive)));
        registry.register(Box::new(torsiondrive::TorsionDriveDriver::new(RecordKind::Gridoptimization)));
        registry.register(Box::new(manybody::ManybodyDriver));
        registry.register(Box::new(reaction::ReactionDriver));
        registry
    }
}

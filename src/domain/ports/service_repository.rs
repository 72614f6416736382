//! C3 port: service records and their dependency graph (§4.4, Design
//! Note 4: dependencies are a junction table, queried, not an
//! in-memory back-pointer).

use async_trait::async_trait;
use serde_json::Value;

use crate::domain::error::CoreResult;
use crate::domain::models::record::RecordStatus;
use crate::domain::models::service::Dependency;
use crate::domain::models::Service;

use super::session::Session;

#[async_trait]
pub trait ServiceRepository: Send + Sync {
    async fn create(&self, session: &mut dyn Session, service: Service) -> CoreResult<Service>;

    async fn get(&self, session: &mut dyn Session, record_id: i64) -> CoreResult<Service>;

    async fn save_state(
        &self,
        session: &mut dyn Session,
        record_id: i64,
        state: Value,
    ) -> CoreResult<()>;

    /// Replaces the dependency list wholesale (§4.4: a driver clears and
    /// re-spawns on each `Spawn` decision).
    async fn set_dependencies(
        &self,
        session: &mut dyn Session,
        record_id: i64,
        dependencies: Vec<Dependency>,
    ) -> CoreResult<()>;

    /// Up to `slots` `waiting` services, row-locked for admission into
    /// this iteration pass (§4.3, §5).
    async fn list_admissible(
        &self,
        session: &mut dyn Session,
        slots: usize,
    ) -> CoreResult<Vec<Service>>;

    /// Each dependency paired with its child record's current status, so
    /// a driver can decide whether to advance (§4.4).
    async fn list_dependency_statuses(
        &self,
        session: &mut dyn Session,
        record_id: i64,
    ) -> CoreResult<Vec<(Dependency, RecordStatus)>>;

    async fn delete(&self, session: &mut dyn Session, record_id: i64) -> CoreResult<()>;

    /// Number of services still listing `child_record_id` as a
    /// dependency, used to detect orphans before a hard-delete cascade
    /// recurses into a shared child (§4.7).
    async fn reference_count(&self, session: &mut dyn Session, child_record_id: i64) -> CoreResult<usize>;
}

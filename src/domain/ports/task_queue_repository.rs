//! C2 port: the claimable task queue (§4.2).

use async_trait::async_trait;

use crate::domain::error::CoreResult;
use crate::domain::models::task::ClaimRequest;
use crate::domain::models::Task;

use super::session::Session;

/// Persistence for task rows: creation, claim matching and claim
/// lifecycle (§4.2, §5).
#[async_trait]
pub trait TaskQueueRepository: Send + Sync {
    async fn create_for_record(&self, session: &mut dyn Session, task: Task) -> CoreResult<Task>;

    async fn get_by_record(
        &self,
        session: &mut dyn Session,
        record_id: i64,
    ) -> CoreResult<Option<Task>>;

    /// Matches up to `request.limit` `waiting` tasks whose
    /// `required_programs` are satisfied by `request.programs` and whose
    /// tag matches one of `request.tags`, claims them for
    /// `request.manager_id`, and returns the claimed tasks. Implemented
    /// with `SELECT ... FOR UPDATE SKIP LOCKED` so concurrent managers
    /// never double-claim the same row (§4.2, §5).
    async fn claim(&self, session: &mut dyn Session, request: ClaimRequest) -> CoreResult<Vec<Task>>;

    /// Records a liveness signal for every task currently claimed by
    /// `manager_id`.
    async fn heartbeat(&self, session: &mut dyn Session, manager_id: &str) -> CoreResult<()>;

    /// Releases every claim whose last heartbeat is older than
    /// `lost_after_seconds`, returning the affected record ids so the
    /// caller can re-queue them (§4.2).
    async fn release_lost_claims(
        &self,
        session: &mut dyn Session,
        lost_after_seconds: u64,
    ) -> CoreResult<Vec<i64>>;

    /// Releases a single task back to `waiting`, clearing its claim.
    async fn release(&self, session: &mut dyn Session, task_id: i64) -> CoreResult<()>;

    /// Deletes the task row for a record once it leaves the
    /// waiting/running pair (§3: "a task exists from the moment its
    /// record first enters waiting" — the converse on exit).
    async fn delete_for_record(&self, session: &mut dyn Session, record_id: i64) -> CoreResult<()>;
}

//! C2: the manager-facing claim/heartbeat/retry surface (§4.2). Wraps
//! [`TaskQueueRepository`] and drives record-status side effects through
//! the C1 store rather than writing record rows directly.

use std::sync::Arc;

use serde_json::Value;
use tracing::{info, instrument, warn};
use uuid::Uuid;

use crate::domain::error::{CoreError, CoreResult};
use crate::domain::models::task::ClaimRequest;
use crate::domain::models::{EngineConfig, RecordStatus, Task};
use crate::domain::ports::{Session, TaskQueueRepository};

use super::record_store::RecordStore;

pub struct TaskQueueService {
    tasks: Arc<dyn TaskQueueRepository>,
    records: Arc<RecordStore>,
    config: EngineConfig,
}

impl TaskQueueService {
    pub fn new(tasks: Arc<dyn TaskQueueRepository>, records: Arc<RecordStore>, config: EngineConfig) -> Self {
        Self { tasks, records, config }
    }

    /// Claims up to `request.limit` matching tasks and flips their
    /// owning records to `running` (§4.2, §4.3).
    #[instrument(skip(self, session, request))]
    pub async fn claim(&self, session: &mut dyn Session, request: ClaimRequest) -> CoreResult<Vec<Task>> {
        let manager_id = request.manager_id.clone();
        let claimed = self.tasks.claim(session, request).await?;
        for task in &claimed {
            self.records.transition(session, task.record_id, RecordStatus::Running).await?;
            self.records.open_attempt(session, task.record_id, &manager_id).await?;
        }
        Ok(claimed)
    }

    pub async fn heartbeat(&self, session: &mut dyn Session, manager_id: &str) -> CoreResult<()> {
        self.tasks.heartbeat(session, manager_id).await
    }

    /// Releases claims whose manager has gone quiet past the configured
    /// heartbeat policy, re-queuing their records to `waiting` (§4.2).
    #[instrument(skip(self, session))]
    pub async fn release_lost_claims(&self, session: &mut dyn Session) -> CoreResult<Vec<i64>> {
        let lost_after = self.config.heartbeat.lost_after_seconds();
        let record_ids = self.tasks.release_lost_claims(session, lost_after).await?;
        for &record_id in &record_ids {
            warn!(record_id, "manager lost, releasing claim");
            self.records
                .close_attempt(session, record_id, false, Some("manager lost".to_string()))
                .await?;
            self.records.transition(session, record_id, RecordStatus::Waiting).await?;
        }
        Ok(record_ids)
    }

    /// A worker reports success: stores the result and transitions the
    /// record to `complete` (§4.2, §6). Rejects a return presented with a
    /// claim token other than the one currently on the task row (§4.2,
    /// §7: the claim was lost and reclaimed out from under the worker).
    #[instrument(skip(self, session, properties))]
    pub async fn complete(&self, session: &mut dyn Session, record_id: i64, claim_token: Uuid, properties: Value) -> CoreResult<()> {
        self.verify_claim(session, record_id, claim_token).await?;
        self.records.set_properties(session, record_id, properties).await?;
        self.records.close_attempt(session, record_id, true, None).await?;
        self.records.transition(session, record_id, RecordStatus::Complete).await?;
        info!(record_id, "record complete");
        Ok(())
    }

    /// A worker reports failure: retries within budget (back to
    /// `waiting`), else surfaces a terminal `error` (§4.2, §7). Same
    /// stale-claim check as [`Self::complete`].
    #[instrument(skip(self, session, detail))]
    pub async fn fail(
        &self,
        session: &mut dyn Session,
        record_id: i64,
        claim_token: Uuid,
        kind_max_retries: u32,
        detail: impl Into<String>,
    ) -> CoreResult<()> {
        self.verify_claim(session, record_id, claim_token).await?;
        self.records.close_attempt(session, record_id, false, Some(detail.into())).await?;
        let within_budget = self.records.record_retry(session, record_id, kind_max_retries).await?;
        let target = if within_budget { RecordStatus::Waiting } else { RecordStatus::Error };
        self.records.transition(session, record_id, target).await?;

        if within_budget {
            if let Some(task) = self.tasks.get_by_record(session, record_id).await? {
                self.tasks.release(session, task.id).await?;
            }
        }
        Ok(())
    }

    /// Raises [`CoreError::StaleClaim`] when `claim_token` does not match
    /// the token currently recorded on the record's task row, and
    /// [`CoreError::MissingData`] when there is no task row at all (§4.2).
    async fn verify_claim(&self, session: &mut dyn Session, record_id: i64, claim_token: Uuid) -> CoreResult<()> {
        let task = self
            .tasks
            .get_by_record(session, record_id)
            .await?
            .ok_or_else(|| CoreError::MissingData(format!("task for record {record_id}")))?;
        if task.claim_token != Some(claim_token) {
            return Err(CoreError::StaleClaim { task_id: task.id, claim_token });
        }
        Ok(())
    }
}

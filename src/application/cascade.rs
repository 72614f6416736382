//! C7: cancel/reset/invalidate/delete propagation across the
//! parent/child dependency graph (§4.7). Every call threads a single
//! [`Session`] through the whole walk so a cascade over many records
//! commits atomically (Design Note 1).

use std::sync::Arc;

use tracing::instrument;

use crate::domain::error::{CoreError, CoreResult};
use crate::domain::models::RecordStatus;
use crate::domain::ports::{RecordRepository, ServiceRepository, Session};

use super::record_store::RecordStore;

pub struct CascadeEngine {
    records: Arc<dyn RecordRepository>,
    services: Arc<dyn ServiceRepository>,
    record_store: Arc<RecordStore>,
}

impl CascadeEngine {
    pub fn new(records: Arc<dyn RecordRepository>, services: Arc<dyn ServiceRepository>, record_store: Arc<RecordStore>) -> Self {
        Self { records, services, record_store }
    }

    /// Cancel `record_id` (§4.7: any non-terminal status). With children,
    /// recursively cancels descendants still `waiting`/`running`.
    #[instrument(skip(self, session))]
    pub async fn cancel(&self, session: &mut dyn Session, record_id: i64, with_children: bool) -> CoreResult<()> {
        self.apply_to_subtree(
            session,
            record_id,
            RecordStatus::Cancelled,
            &|status| !status.is_terminal_for_iteration(),
            with_children,
        )
        .await
    }

    /// Uncancel `record_id`: `cancelled -> waiting` (§4.3, §4.7). With
    /// children, un-cancels descendants currently `cancelled`.
    #[instrument(skip(self, session))]
    pub async fn uncancel(&self, session: &mut dyn Session, record_id: i64, with_children: bool) -> CoreResult<()> {
        self.apply_to_subtree(
            session,
            record_id,
            RecordStatus::Waiting,
            &|status| status == RecordStatus::Cancelled,
            with_children,
        )
        .await
    }

    /// Reset `record_id` back to `waiting` for a re-run (§4.3, §4.7:
    /// `error|running -> waiting`). With children, resets descendants
    /// not already `complete`.
    #[instrument(skip(self, session))]
    pub async fn reset(&self, session: &mut dyn Session, record_id: i64, with_children: bool) -> CoreResult<()> {
        self.apply_to_subtree(
            session,
            record_id,
            RecordStatus::Waiting,
            &|status| matches!(status, RecordStatus::Error | RecordStatus::Running),
            with_children,
        )
        .await
    }

    /// Mark a completed record invalid (§4.7), e.g. after discovering a
    /// methodology bug post-hoc. With children, follows the same rule
    /// down the subtree.
    #[instrument(skip(self, session))]
    pub async fn invalidate(&self, session: &mut dyn Session, record_id: i64, with_children: bool) -> CoreResult<()> {
        self.apply_to_subtree(
            session,
            record_id,
            RecordStatus::Invalid,
            &|status| status == RecordStatus::Complete,
            with_children,
        )
        .await
    }

    /// Uninvalidate `record_id`: `invalid -> complete`, permitted only
    /// when every child is already `{complete, invalid}` (§4.3, §4.7).
    /// Walks bottom-up so a child becomes eligible for its own parent
    /// only once it has itself been restored.
    #[instrument(skip(self, session))]
    pub async fn uninvalidate(&self, session: &mut dyn Session, record_id: i64, with_children: bool) -> CoreResult<()> {
        if with_children {
            for child_id in self.child_ids(session, record_id).await? {
                let child = self.records.get(session, child_id).await?;
                if child.status == RecordStatus::Invalid {
                    Box::pin(self.uninvalidate(session, child_id, true)).await?;
                }
            }
        }

        let record = self.records.get(session, record_id).await?;
        if record.status != RecordStatus::Invalid {
            return Ok(());
        }
        let children_ready = self
            .child_ids(session, record_id)
            .await?
            .into_iter()
            .map(|child_id| async move {
                let child = self.records.get(session, child_id).await?;
                CoreResult::Ok(matches!(child.status, RecordStatus::Complete | RecordStatus::Invalid))
            });
        for check in children_ready {
            if !check.await? {
                return Err(CoreError::InvalidTransition {
                    from: RecordStatus::Invalid.as_str().to_string(),
                    to: RecordStatus::Complete.as_str().to_string(),
                });
            }
        }
        self.record_store.transition(session, record_id, RecordStatus::Complete).await
    }

    /// Soft-delete `record_id`: saves the pre-delete status for
    /// [`Self::undelete`] (§4.3, §4.7). With children, propagates to
    /// descendants; their dependency rows are cleared first since
    /// `deleted` is never a legal dependency status.
    #[instrument(skip(self, session))]
    pub async fn delete(&self, session: &mut dyn Session, record_id: i64, with_children: bool) -> CoreResult<()> {
        if with_children {
            for child_id in self.child_ids(session, record_id).await? {
                Box::pin(self.delete(session, child_id, true)).await?;
            }
        }
        self.services.set_dependencies(session, record_id, Vec::new()).await.ok();
        self.records.soft_delete(session, record_id).await
    }

    /// Restore a soft-deleted record to its pre-delete status (§4.3,
    /// §4.7). With children, undeletes descendants that are currently
    /// `deleted`.
    #[instrument(skip(self, session))]
    pub async fn undelete(&self, session: &mut dyn Session, record_id: i64, with_children: bool) -> CoreResult<()> {
        if with_children {
            for child_id in self.child_ids(session, record_id).await? {
                let child = self.records.get(session, child_id).await?;
                if child.status == RecordStatus::Deleted {
                    Box::pin(self.undelete(session, child_id, true)).await?;
                }
            }
        }
        self.records.undelete(session, record_id).await
    }

    /// Removes `record_id`'s row outright, clearing its task/service
    /// rows. With children, recurses only into descendants with no
    /// other remaining parent (reference-counted orphan detection,
    /// §4.7) — a child still depended on elsewhere keeps its row.
    #[instrument(skip(self, session))]
    pub async fn hard_delete(&self, session: &mut dyn Session, record_id: i64, with_children: bool) -> CoreResult<()> {
        if with_children {
            for child_id in self.child_ids(session, record_id).await? {
                if self.services.reference_count(session, child_id).await? <= 1 {
                    Box::pin(self.hard_delete(session, child_id, true)).await?;
                }
            }
        }
        self.services.set_dependencies(session, record_id, Vec::new()).await.ok();
        self.services.delete(session, record_id).await.ok();
        self.record_store.hard_delete(session, record_id).await
    }

    /// Direct children of `record_id`, empty for atomic records (§4.4,
    /// §4.7 lookup-children).
    pub async fn lookup_children(&self, session: &mut dyn Session, record_id: i64) -> CoreResult<Vec<i64>> {
        self.child_ids(session, record_id).await
    }

    async fn child_ids(&self, session: &mut dyn Session, record_id: i64) -> CoreResult<Vec<i64>> {
        let record = self.records.get(session, record_id).await?;
        if record.kind.is_atomic() {
            return Ok(Vec::new());
        }
        let deps = self.services.list_dependency_statuses(session, record_id).await?;
        Ok(deps.into_iter().map(|(dep, _)| dep.child_record_id).collect())
    }

    fn apply_to_subtree<'a>(
        &'a self,
        session: &'a mut dyn Session,
        record_id: i64,
        to: RecordStatus,
        eligible: &'a dyn Fn(RecordStatus) -> bool,
        with_children: bool,
    ) -> std::pin::Pin<Box<dyn std::future::Future<Output = CoreResult<()>> + Send + 'a>> {
        Box::pin(async move {
            let record = self.records.get(session, record_id).await?;
            if eligible(record.status) {
                self.record_store.transition(session, record_id, to).await?;
            }
            if with_children {
                for child_id in self.child_ids(session, record_id).await? {
                    self.apply_to_subtree(session, child_id, to, eligible, with_children).await?;
                }
            }
            Ok(())
        })
    }
}

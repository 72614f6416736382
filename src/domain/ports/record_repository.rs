//! C1 port: the record ledger (§4.1, §4.3).

use async_trait::async_trait;
use serde_json::Value;

use crate::domain::error::CoreResult;
use crate::domain::models::compute_history::StreamKind;
use crate::domain::models::{Record, RecordKind, RecordStatus};

use super::session::Session;

/// Persistence for record rows: creation, dedup lookup, status
/// transitions and soft delete/undelete (§4.1, §4.3, §4.7).
#[async_trait]
pub trait RecordRepository: Send + Sync {
    async fn create(&self, session: &mut dyn Session, record: Record) -> CoreResult<Record>;

    async fn get(&self, session: &mut dyn Session, id: i64) -> CoreResult<Record>;

    /// Existing record matching `(kind, specification_id, molecule_ids)`,
    /// independent of molecule id order (§4.1 dedup rule).
    async fn find_by_dedup_key(
        &self,
        session: &mut dyn Session,
        kind: RecordKind,
        specification_id: i64,
        molecule_ids: &[i64],
    ) -> CoreResult<Option<Record>>;

    /// Checked transition, row-locked against concurrent writers.
    async fn update_status(
        &self,
        session: &mut dyn Session,
        id: i64,
        status: RecordStatus,
    ) -> CoreResult<()>;

    async fn set_properties(
        &self,
        session: &mut dyn Session,
        id: i64,
        properties: Value,
    ) -> CoreResult<()>;

    /// Increment and return the new retry count (§4.2, §7).
    async fn increment_retry(&self, session: &mut dyn Session, id: i64) -> CoreResult<u32>;

    /// Soft delete: saves `pre_delete_status` and flips to `deleted`.
    async fn soft_delete(&self, session: &mut dyn Session, id: i64) -> CoreResult<()>;

    /// Restores the saved `pre_delete_status` snapshot (§4.3).
    async fn undelete(&self, session: &mut dyn Session, id: i64) -> CoreResult<()>;

    /// Removes the record row outright (§4.1, §4.7). Callers are
    /// responsible for clearing task/service rows first.
    async fn hard_delete(&self, session: &mut dyn Session, id: i64) -> CoreResult<()>;

    /// Updates tag/priority/comment in place; `None` leaves the field
    /// untouched (§4.1 modify-metadata).
    async fn update_metadata(
        &self,
        session: &mut dyn Session,
        id: i64,
        tag: Option<String>,
        priority: Option<i32>,
        comment: Option<String>,
    ) -> CoreResult<()>;

    async fn list_by_status(
        &self,
        session: &mut dyn Session,
        status: RecordStatus,
        limit: i64,
    ) -> CoreResult<Vec<Record>>;

    /// Opens a new compute-history attempt for `manager_id` (§3, §4.2:
    /// the claim protocol opens one per claimed task).
    async fn open_attempt(&self, session: &mut dyn Session, id: i64, manager_id: &str) -> CoreResult<()>;

    /// Closes the record's most recently opened attempt. `error_message`,
    /// when given, is appended to that attempt's `error` stream before
    /// closing (§3, §4.2).
    async fn close_attempt(
        &self,
        session: &mut dyn Session,
        id: i64,
        succeeded: bool,
        error_message: Option<String>,
    ) -> CoreResult<()>;

    /// Appends a chunk to the given stream of the record's most recent
    /// attempt (§3).
    async fn append_stream(
        &self,
        session: &mut dyn Session,
        id: i64,
        stream: StreamKind,
        chunk: &str,
    ) -> CoreResult<()>;
}

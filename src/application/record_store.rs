//! C1: the record ledger's write path. Owns specification/molecule
//! dedup (§4.1, §4.5) and routes every status change through the C4
//! state machine (§4.3).

use std::sync::Arc;

use serde_json::Value;
use tracing::{info, instrument};

use crate::domain::error::CoreResult;
use crate::domain::models::compute_history::StreamKind;
use crate::domain::models::{Molecule, Record, RecordKind, RecordStatus, Specification, Task};
use crate::domain::ports::{
    MoleculeRepository, RecordRepository, ServiceRepository, Session, SpecificationRepository, TaskQueueRepository,
};

use super::state_machine;

/// The next free id a repository should use. Adapters own their own id
/// generation internally (a Postgres `BIGSERIAL`, an in-memory atomic
/// counter); the store itself never invents identities.
pub struct RecordStore {
    records: Arc<dyn RecordRepository>,
    specifications: Arc<dyn SpecificationRepository>,
    molecules: Arc<dyn MoleculeRepository>,
    tasks: Arc<dyn TaskQueueRepository>,
    services: Arc<dyn ServiceRepository>,
}

/// Outcome of submitting a record: either it already existed (dedup hit,
/// §4.1) or a fresh record (and, for atomic kinds, task) was created.
#[derive(Debug, Clone, PartialEq)]
pub enum SubmitOutcome {
    Existing(Record),
    Created(Record),
}

impl SubmitOutcome {
    pub fn record(&self) -> &Record {
        match self {
            Self::Existing(r) | Self::Created(r) => r,
        }
    }

    pub fn into_record(self) -> Record {
        match self {
            Self::Existing(r) | Self::Created(r) => r,
        }
    }
}

impl RecordStore {
    pub fn new(
        records: Arc<dyn RecordRepository>,
        specifications: Arc<dyn SpecificationRepository>,
        molecules: Arc<dyn MoleculeRepository>,
        tasks: Arc<dyn TaskQueueRepository>,
        services: Arc<dyn ServiceRepository>,
    ) -> Self {
        Self {
            records,
            specifications,
            molecules,
            tasks,
            services,
        }
    }

    /// Dedup-insert a specification by its canonical hash (§4.5).
    #[instrument(skip(self, session, specification))]
    pub async fn intern_specification(
        &self,
        session: &mut dyn Session,
        specification: Specification,
    ) -> CoreResult<Specification> {
        let hash = specification.canonical_hash();
        if let Some(existing) = self.specifications.find_by_hash(session, &hash).await? {
            return Ok(existing);
        }
        self.specifications.create(session, specification).await
    }

    /// Dedup-insert a molecule by its canonical hash, ignoring
    /// `identifiers` (§4.5).
    #[instrument(skip(self, session, molecule))]
    pub async fn intern_molecule(
        &self,
        session: &mut dyn Session,
        molecule: Molecule,
    ) -> CoreResult<Molecule> {
        let hash = molecule.canonical_hash();
        if let Some(existing) = self.molecules.find_by_hash(session, &hash).await? {
            return Ok(existing);
        }
        self.molecules.create(session, molecule).await
    }

    /// Submit an atomic record (§4.1, §4.2): dedup against
    /// `(kind, specification_id, molecule_ids)`, and on a fresh insert
    /// also create the matching C2 task.
    #[instrument(skip(self, session, owner, tag, required_programs, function, function_kwargs))]
    #[allow(clippy::too_many_arguments)]
    pub async fn submit_atomic(
        &self,
        session: &mut dyn Session,
        kind: RecordKind,
        specification_id: i64,
        molecule_ids: Vec<i64>,
        owner: impl Into<String>,
        priority: i32,
        tag: impl Into<String>,
        required_programs: Vec<String>,
        function: impl Into<String>,
        function_kwargs: Value,
    ) -> CoreResult<SubmitOutcome> {
        debug_assert!(kind.is_atomic(), "submit_atomic called with a service kind");

        if let Some(existing) = self
            .records
            .find_by_dedup_key(session, kind, specification_id, &molecule_ids)
            .await?
        {
            info!(record_id = existing.id, "dedup hit on atomic record submission");
            return Ok(SubmitOutcome::Existing(existing));
        }

        let tag = tag.into();
        let record = Record::new(0, kind, specification_id, molecule_ids, owner, priority, tag.clone());
        let created = self.records.create(session, record).await?;

        let task = Task::new(
            0,
            created.id,
            required_programs,
            tag,
            priority,
            function,
            function_kwargs,
        );
        self.tasks.create_for_record(session, task).await?;

        Ok(SubmitOutcome::Created(created))
    }

    /// Writes `status`, raising [`CoreError::InvalidTransition`] for
    /// anything the C4 table forbids.
    #[instrument(skip(self, session))]
    pub async fn transition(
        &self,
        session: &mut dyn Session,
        record_id: i64,
        to: RecordStatus,
    ) -> CoreResult<()> {
        let record = self.records.get(session, record_id).await?;
        state_machine::transition(record.status, to)?;
        self.records.update_status(session, record_id, to).await?;

        if to.is_terminal_for_iteration() || to == RecordStatus::Deleted {
            self.tasks.delete_for_record(session, record_id).await?;
        }
        Ok(())
    }

    pub async fn get(&self, session: &mut dyn Session, record_id: i64) -> CoreResult<Record> {
        self.records.get(session, record_id).await
    }

    pub async fn set_properties(
        &self,
        session: &mut dyn Session,
        record_id: i64,
        properties: Value,
    ) -> CoreResult<()> {
        self.records.set_properties(session, record_id, properties).await
    }

    /// Whether a further retry is within the record kind's budget
    /// (§4.2, §7). Increments the counter as a side effect.
    pub async fn record_retry(
        &self,
        session: &mut dyn Session,
        record_id: i64,
        max_retries: u32,
    ) -> CoreResult<bool> {
        let count = self.records.increment_retry(session, record_id).await?;
        Ok(count <= max_retries)
    }

    /// Opens a compute-history attempt (§3, §4.2 claim protocol).
    pub async fn open_attempt(&self, session: &mut dyn Session, record_id: i64, manager_id: &str) -> CoreResult<()> {
        self.records.open_attempt(session, record_id, manager_id).await
    }

    /// Closes the record's open attempt, recording an error stream entry
    /// when the attempt did not succeed (§3, §4.2 return protocol).
    pub async fn close_attempt(
        &self,
        session: &mut dyn Session,
        record_id: i64,
        succeeded: bool,
        error_message: Option<String>,
    ) -> CoreResult<()> {
        self.records.close_attempt(session, record_id, succeeded, error_message).await
    }

    pub async fn append_stream(&self, session: &mut dyn Session, record_id: i64, stream: StreamKind, chunk: &str) -> CoreResult<()> {
        self.records.append_stream(session, record_id, stream, chunk).await
    }

    /// Direct children of a service record, empty for atomic records
    /// (§4.4, §4.7 lookup-children).
    pub async fn lookup_children(&self, session: &mut dyn Session, record_id: i64) -> CoreResult<Vec<i64>> {
        let record = self.records.get(session, record_id).await?;
        if record.kind.is_atomic() {
            return Ok(Vec::new());
        }
        let deps = self.services.list_dependency_statuses(session, record_id).await?;
        Ok(deps.into_iter().map(|(dep, _)| dep.child_record_id).collect())
    }

    /// Modify-metadata (§4.1): updates tag/priority/comment in place,
    /// leaving unset fields untouched.
    pub async fn modify_metadata(
        &self,
        session: &mut dyn Session,
        record_id: i64,
        tag: Option<String>,
        priority: Option<i32>,
        comment: Option<String>,
    ) -> CoreResult<()> {
        self.records.update_metadata(session, record_id, tag, priority, comment).await
    }

    /// Removes the record row outright, bypassing the soft-delete
    /// snapshot. Callers are responsible for clearing task/service rows
    /// first (§4.1, §4.7).
    pub async fn hard_delete(&self, session: &mut dyn Session, record_id: i64) -> CoreResult<()> {
        self.tasks.delete_for_record(session, record_id).await?;
        self.records.hard_delete(session, record_id).await
    }
}

//! C3/C5: the service iteration loop. Admits `waiting` service records,
//! calls into the matching driver, and applies the decision (§4.3,
//! §4.4, §5).

use std::sync::Arc;

use serde_json::Value;
use tracing::{error, info, instrument, warn};

use crate::domain::error::CoreResult;
use crate::domain::models::service::Dependency;
use crate::domain::models::{EngineConfig, Record, RecordKind, RecordStatus, Service};
use crate::domain::ports::{RecordRepository, ServiceRepository, Session, SpecificationRepository};

use super::drivers::{ChildOutcome, ChildSpec, DriverDecision, DriverRegistry};
use super::record_store::RecordStore;

pub struct ServiceQueue {
    services: Arc<dyn ServiceRepository>,
    records: Arc<dyn RecordRepository>,
    record_store: Arc<RecordStore>,
    specifications: Arc<dyn SpecificationRepository>,
    drivers: DriverRegistry,
    config: EngineConfig,
}

impl ServiceQueue {
    pub fn new(
        services: Arc<dyn ServiceRepository>,
        records: Arc<dyn RecordRepository>,
        record_store: Arc<RecordStore>,
        specifications: Arc<dyn SpecificationRepository>,
        drivers: DriverRegistry,
        config: EngineConfig,
    ) -> Self {
        Self { services, records, record_store, specifications, drivers, config }
    }

    /// Enqueue a brand-new service record (§4.3: created in `waiting`
    /// with no dependencies, picked up by the next iteration pass).
    #[instrument(skip(self, session))]
    pub async fn submit_service(
        &self,
        session: &mut dyn Session,
        kind: RecordKind,
        specification_id: i64,
        molecule_ids: Vec<i64>,
        owner: impl Into<String>,
        priority: i32,
        tag: impl Into<String>,
    ) -> CoreResult<Record> {
        debug_assert!(kind.is_service());

        if let Some(existing) = self
            .records
            .find_by_dedup_key(session, kind, specification_id, &molecule_ids)
            .await?
        {
            return Ok(existing);
        }

        let tag = tag.into();
        let record = Record::new(0, kind, specification_id, molecule_ids, owner, priority, tag.clone());
        let created = self.records.create(session, record).await?;
        self.services.create(session, Service::new(created.id, tag, priority)).await?;
        Ok(created)
    }

    /// One iteration pass: admits up to `service_admission_slots`
    /// `waiting` services and drives each one step (§4.3, §5).
    #[instrument(skip(self, session))]
    pub async fn iterate(&self, session: &mut dyn Session) -> CoreResult<usize> {
        let admitted = self
            .services
            .list_admissible(session, self.config.service_admission_slots)
            .await?;

        let mut advanced = 0;
        for service in admitted {
            self.drive_one(session, service).await?;
            advanced += 1;
        }
        Ok(advanced)
    }

    async fn drive_one(&self, session: &mut dyn Session, service: Service) -> CoreResult<()> {
        let mut record = self.records.get(session, service.record_id).await?;
        if record.status == RecordStatus::Waiting {
            self.record_store.transition(session, record.id, RecordStatus::Running).await?;
            record.status = RecordStatus::Running;
        }

        let driver = match self.drivers.get(record.kind) {
            Some(d) => d,
            None => {
                error!(record_id = record.id, kind = record.kind.as_str(), "no driver registered for service kind");
                return Ok(());
            }
        };

        let specification = self.specifications.get(session, record.specification_id).await?;
        let keywords = &specification.keywords;

        let decision = if service.dependencies.is_empty() && service.service_state == Value::Null {
            driver.start(record.specification_id, &record.molecule_ids, keywords)?
        } else {
            let statuses = self.services.list_dependency_statuses(session, record.id).await?;
            if !statuses.iter().all(|(_, status)| status.is_terminal_for_iteration()) {
                return Ok(());
            }
            let outcomes = self.collect_outcomes(session, statuses).await?;
            driver.advance(record.specification_id, &record.molecule_ids, &service.service_state, &outcomes, keywords)?
        };

        self.apply_decision(session, &record, decision).await
    }

    async fn collect_outcomes(
        &self,
        session: &mut dyn Session,
        statuses: Vec<(Dependency, RecordStatus)>,
    ) -> CoreResult<Vec<ChildOutcome>> {
        let mut outcomes = Vec::with_capacity(statuses.len());
        for (dependency, status) in statuses {
            let child = self.records.get(session, dependency.child_record_id).await?;
            outcomes.push(ChildOutcome { dependency, status, properties: child.properties });
        }
        Ok(outcomes)
    }

    async fn apply_decision(&self, session: &mut dyn Session, record: &Record, decision: DriverDecision) -> CoreResult<()> {
        match decision {
            DriverDecision::Finished { properties } => {
                info!(record_id = record.id, "service finished");
                self.record_store.set_properties(session, record.id, properties).await?;
                self.record_store.transition(session, record.id, RecordStatus::Complete).await?;
                self.services.delete(session, record.id).await?;
            }
            DriverDecision::Spawn { state, children } => {
                self.services.save_state(session, record.id, state).await?;
                let dependencies = self.spawn_children(session, record, children).await?;
                self.services.set_dependencies(session, record.id, dependencies).await?;
            }
            DriverDecision::Raise { detail } => {
                warn!(record_id = record.id, detail, "service raised a terminal error");
                self.record_store
                    .set_properties(session, record.id, Value::String(detail))
                    .await?;
                self.record_store.transition(session, record.id, RecordStatus::Error).await?;
                // Unlike `Finished`, an errored service's row survives
                // with its dependency list and state intact: `reset`
                // (§4.7) walks that same dependency list to requeue the
                // still-errored children, then re-admits the service to
                // wait on them again.
            }
        }
        Ok(())
    }

    async fn spawn_children(
        &self,
        session: &mut dyn Session,
        parent: &Record,
        children: Vec<ChildSpec>,
    ) -> CoreResult<Vec<Dependency>> {
        let mut dependencies = Vec::with_capacity(children.len());
        for spec in children {
            let child_record_id = if spec.kind.is_atomic() {
                let outcome = self
                    .record_store
                    .submit_atomic(
                        session,
                        spec.kind,
                        spec.specification_id,
                        spec.molecule_ids,
                        parent.owner.clone(),
                        spec.priority,
                        spec.tag,
                        Vec::new(),
                        spec.kind.as_str(),
                        Value::Null,
                    )
                    .await?;
                outcome.into_record().id
            } else {
                self.submit_service(
                    session,
                    spec.kind,
                    spec.specification_id,
                    spec.molecule_ids,
                    parent.owner.clone(),
                    spec.priority,
                    spec.tag,
                )
                .await?
                .id
            };
            dependencies.push(Dependency::new(child_record_id, spec.extras));
        }
        Ok(dependencies)
    }
}

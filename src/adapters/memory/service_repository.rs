//! In-memory [`ServiceRepository`]. Holds a reference to the record
//! table so admission filtering and dependency-status lookups can be
//! answered directly, the way a real join would be in Postgres.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use serde_json::Value;

use crate::domain::error::{CoreError, CoreResult};
use crate::domain::models::record::RecordStatus;
use crate::domain::models::service::Dependency;
use crate::domain::models::Service;
use crate::domain::ports::{RecordRepository, Session};

pub struct MemoryServiceRepository {
    rows: Mutex<HashMap<i64, Service>>,
    records: Arc<dyn RecordRepository>,
}

impl MemoryServiceRepository {
    pub fn new(records: Arc<dyn RecordRepository>) -> Self {
        Self { rows: Mutex::new(HashMap::new()), records }
    }
}

#[async_trait]
impl crate::domain::ports::ServiceRepository for MemoryServiceRepository {
    async fn create(&self, _session: &mut dyn Session, service: Service) -> CoreResult<Service> {
        self.rows.lock().unwrap().insert(service.record_id, service.clone());
        Ok(service)
    }

    async fn get(&self, _session: &mut dyn Session, record_id: i64) -> CoreResult<Service> {
        self.rows
            .lock()
            .unwrap()
            .get(&record_id)
            .cloned()
            .ok_or_else(|| CoreError::MissingData(format!("service {record_id}")))
    }

    async fn save_state(&self, _session: &mut dyn Session, record_id: i64, state: Value) -> CoreResult<()> {
        let mut rows = self.rows.lock().unwrap();
        let service = rows.get_mut(&record_id).ok_or_else(|| CoreError::MissingData(format!("service {record_id}")))?;
        service.service_state = state;
        Ok(())
    }

    async fn set_dependencies(
        &self,
        _session: &mut dyn Session,
        record_id: i64,
        dependencies: Vec<Dependency>,
    ) -> CoreResult<()> {
        let mut rows = self.rows.lock().unwrap();
        let service = rows.get_mut(&record_id).ok_or_else(|| CoreError::MissingData(format!("service {record_id}")))?;
        service.set_dependencies(dependencies);
        Ok(())
    }

    async fn list_admissible(&self, session: &mut dyn Session, slots: usize) -> CoreResult<Vec<Service>> {
        let record_ids: Vec<i64> = self.rows.lock().unwrap().keys().copied().collect();
        let mut admissible = Vec::new();
        for record_id in record_ids {
            if admissible.len() >= slots {
                break;
            }
            let record = self.records.get(session, record_id).await?;
            if matches!(record.status, RecordStatus::Waiting | RecordStatus::Running) {
                if let Some(service) = self.rows.lock().unwrap().get(&record_id).cloned() {
                    admissible.push(service);
                }
            }
        }
        Ok(admissible)
    }

    async fn list_dependency_statuses(
        &self,
        session: &mut dyn Session,
        record_id: i64,
    ) -> CoreResult<Vec<(Dependency, RecordStatus)>> {
        let service = self.get(session, record_id).await?;
        let mut result = Vec::with_capacity(service.dependencies.len());
        for dependency in service.dependencies {
            let child = self.records.get(session, dependency.child_record_id).await?;
            result.push((dependency, child.status));
        }
        Ok(result)
    }

    async fn delete(&self, _session: &mut dyn Session, record_id: i64) -> CoreResult<()> {
        self.rows.lock().unwrap().remove(&record_id);
        Ok(())
    }

    async fn reference_count(&self, _session: &mut dyn Session, child_record_id: i64) -> CoreResult<usize> {
        Ok(self
            .rows
            .lock()
            .unwrap()
            .values()
            .filter(|service| service.dependencies.iter().any(|dep| dep.child_record_id == child_record_id))
            .count())
    }
}

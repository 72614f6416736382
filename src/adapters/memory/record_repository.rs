//! In-memory [`RecordRepository`], used by the engine's own test suite
//! (mirrors the teacher's mock-substrate pattern: an `Arc<Mutex<...>>`
//! table behind the port, no I/O).

use std::collections::HashMap;
use std::sync::atomic::{AtomicI64, Ordering};
use std::sync::Mutex;

use async_trait::async_trait;
use serde_json::Value;

use crate::domain::error::{CoreError, CoreResult};
use crate::domain::models::compute_history::{Attempt, StreamKind};
use crate::domain::models::{Record, RecordKind, RecordStatus};
use crate::domain::ports::{RecordRepository, Session};

#[derive(Default)]
pub struct MemoryRecordRepository {
    rows: Mutex<HashMap<i64, Record>>,
    next_id: AtomicI64,
}

impl MemoryRecordRepository {
    pub fn new() -> Self {
        Self { rows: Mutex::new(HashMap::new()), next_id: AtomicI64::new(1) }
    }
}

#[async_trait]
impl RecordRepository for MemoryRecordRepository {
    async fn create(&self, _session: &mut dyn Session, mut record: Record) -> CoreResult<Record> {
        let id = self.next_id.fetch_add(1, Ordering::SeqCst);
        record.id = id;
        self.rows.lock().unwrap().insert(id, record.clone());
        Ok(record)
    }

    async fn get(&self, _session: &mut dyn Session, id: i64) -> CoreResult<Record> {
        self.rows
            .lock()
            .unwrap()
            .get(&id)
            .cloned()
            .ok_or_else(|| CoreError::MissingData(format!("record {id}")))
    }

    async fn find_by_dedup_key(
        &self,
        _session: &mut dyn Session,
        kind: RecordKind,
        specification_id: i64,
        molecule_ids: &[i64],
    ) -> CoreResult<Option<Record>> {
        let mut wanted = molecule_ids.to_vec();
        wanted.sort_unstable();
        Ok(self
            .rows
            .lock()
            .unwrap()
            .values()
            .find(|r| r.kind == kind && r.specification_id == specification_id && {
                let mut ids = r.molecule_ids.clone();
                ids.sort_unstable();
                ids == wanted
            })
            .cloned())
    }

    async fn update_status(&self, _session: &mut dyn Session, id: i64, status: RecordStatus) -> CoreResult<()> {
        let mut rows = self.rows.lock().unwrap();
        let record = rows.get_mut(&id).ok_or_else(|| CoreError::MissingData(format!("record {id}")))?;
        record.status = status;
        record.modified_at = chrono::Utc::now();
        Ok(())
    }

    async fn set_properties(&self, _session: &mut dyn Session, id: i64, properties: Value) -> CoreResult<()> {
        let mut rows = self.rows.lock().unwrap();
        let record = rows.get_mut(&id).ok_or_else(|| CoreError::MissingData(format!("record {id}")))?;
        record.properties = Some(properties);
        Ok(())
    }

    async fn increment_retry(&self, _session: &mut dyn Session, id: i64) -> CoreResult<u32> {
        let mut rows = self.rows.lock().unwrap();
        let record = rows.get_mut(&id).ok_or_else(|| CoreError::MissingData(format!("record {id}")))?;
        record.retry_count += 1;
        Ok(record.retry_count)
    }

    async fn soft_delete(&self, _session: &mut dyn Session, id: i64) -> CoreResult<()> {
        let mut rows = self.rows.lock().unwrap();
        let record = rows.get_mut(&id).ok_or_else(|| CoreError::MissingData(format!("record {id}")))?;
        record.pre_delete_status = Some(record.status);
        record.status = RecordStatus::Deleted;
        Ok(())
    }

    async fn undelete(&self, _session: &mut dyn Session, id: i64) -> CoreResult<()> {
        let mut rows = self.rows.lock().unwrap();
        let record = rows.get_mut(&id).ok_or_else(|| CoreError::MissingData(format!("record {id}")))?;
        record.status = record.pre_delete_status.take().unwrap_or(RecordStatus::Waiting);
        Ok(())
    }

    async fn hard_delete(&self, _session: &mut dyn Session, id: i64) -> CoreResult<()> {
        self.rows.lock().unwrap().remove(&id);
        Ok(())
    }

    async fn update_metadata(
        &self,
        _session: &mut dyn Session,
        id: i64,
        tag: Option<String>,
        priority: Option<i32>,
        comment: Option<String>,
    ) -> CoreResult<()> {
        let mut rows = self.rows.lock().unwrap();
        let record = rows.get_mut(&id).ok_or_else(|| CoreError::MissingData(format!("record {id}")))?;
        if let Some(tag) = tag {
            record.tag = tag;
        }
        if let Some(priority) = priority {
            record.priority = priority;
        }
        if let Some(comment) = comment {
            record.comment = Some(comment);
        }
        record.modified_at = chrono::Utc::now();
        Ok(())
    }

    async fn list_by_status(&self, _session: &mut dyn Session, status: RecordStatus, limit: i64) -> CoreResult<Vec<Record>> {
        Ok(self
            .rows
            .lock()
            .unwrap()
            .values()
            .filter(|r| r.status == status)
            .take(limit.max(0) as usize)
            .cloned()
            .collect())
    }

    async fn open_attempt(&self, _session: &mut dyn Session, id: i64, manager_id: &str) -> CoreResult<()> {
        let mut rows = self.rows.lock().unwrap();
        let record = rows.get_mut(&id).ok_or_else(|| CoreError::MissingData(format!("record {id}")))?;
        record.compute_history.push(Attempt::open(manager_id));
        Ok(())
    }

    async fn close_attempt(
        &self,
        _session: &mut dyn Session,
        id: i64,
        succeeded: bool,
        error_message: Option<String>,
    ) -> CoreResult<()> {
        let mut rows = self.rows.lock().unwrap();
        let record = rows.get_mut(&id).ok_or_else(|| CoreError::MissingData(format!("record {id}")))?;
        if let Some(attempt) = record.compute_history.iter_mut().rev().find(|a| a.is_open()) {
            if let Some(message) = error_message {
                attempt.streams.append(StreamKind::Error, &message);
            }
            attempt.close(succeeded);
        }
        Ok(())
    }

    async fn append_stream(&self, _session: &mut dyn Session, id: i64, stream: StreamKind, chunk: &str) -> CoreResult<()> {
        let mut rows = self.rows.lock().unwrap();
        let record = rows.get_mut(&id).ok_or_else(|| CoreError::MissingData(format!("record {id}")))?;
        if let Some(attempt) = record.compute_history.last_mut() {
            attempt.streams.append(stream, chunk);
        }
        Ok(())
    }
}

//! In-memory [`TaskQueueRepository`].

use std::collections::HashMap;
use std::sync::atomic::{AtomicI64, Ordering};
use std::sync::Mutex;

use async_trait::async_trait;
use chrono::Utc;

use crate::domain::error::CoreResult;
use crate::domain::models::task::{ClaimRequest, ClaimState};
use crate::domain::models::Task;
use crate::domain::ports::{Session, TaskQueueRepository};

#[derive(Default)]
pub struct MemoryTaskQueueRepository {
    rows: Mutex<HashMap<i64, Task>>,
    next_id: AtomicI64,
}

impl MemoryTaskQueueRepository {
    pub fn new() -> Self {
        Self { rows: Mutex::new(HashMap::new()), next_id: AtomicI64::new(1) }
    }
}

#[async_trait]
impl TaskQueueRepository for MemoryTaskQueueRepository {
    async fn create_for_record(&self, _session: &mut dyn Session, mut task: Task) -> CoreResult<Task> {
        let id = self.next_id.fetch_add(1, Ordering::SeqCst);
        task.id = id;
        self.rows.lock().unwrap().insert(id, task.clone());
        Ok(task)
    }

    async fn get_by_record(&self, _session: &mut dyn Session, record_id: i64) -> CoreResult<Option<Task>> {
        Ok(self.rows.lock().unwrap().values().find(|t| t.record_id == record_id).cloned())
    }

    async fn claim(&self, _session: &mut dyn Session, request: ClaimRequest) -> CoreResult<Vec<Task>> {
        let mut rows = self.rows.lock().unwrap();
        let mut candidates: Vec<&mut Task> = rows
            .values_mut()
            .filter(|t| {
                t.claim_state == ClaimState::Waiting
                    && t.programs_satisfied_by(&request.programs)
                    && request.tags.iter().any(|tag| t.tag_matches(tag))
            })
            .collect();
        candidates.sort_by(|a, b| b.priority.cmp(&a.priority).then(a.created_at.cmp(&b.created_at)));

        let mut claimed = Vec::new();
        for task in candidates.into_iter().take(request.limit) {
            task.claim(request.manager_id.clone());
            claimed.push(task.clone());
        }
        Ok(claimed)
    }

    async fn heartbeat(&self, _session: &mut dyn Session, manager_id: &str) -> CoreResult<()> {
        let mut rows = self.rows.lock().unwrap();
        for task in rows.values_mut() {
            if task.claim_manager_id.as_deref() == Some(manager_id) {
                task.claim_timestamp = Some(Utc::now());
            }
        }
        Ok(())
    }

    async fn release_lost_claims(&self, _session: &mut dyn Session, lost_after_seconds: u64) -> CoreResult<Vec<i64>> {
        let mut rows = self.rows.lock().unwrap();
        let now = Utc::now();
        let mut released = Vec::new();
        for task in rows.values_mut() {
            if task.claim_state != ClaimState::Running {
                continue;
            }
            if let Some(ts) = task.claim_timestamp {
                let elapsed = (now - ts).num_seconds().max(0) as u64;
                if elapsed >= lost_after_seconds {
                    released.push(task.record_id);
                    task.release();
                }
            }
        }
        Ok(released)
    }

    async fn release(&self, _session: &mut dyn Session, task_id: i64) -> CoreResult<()> {
        if let Some(task) = self.rows.lock().unwrap().get_mut(&task_id) {
            task.release();
        }
        Ok(())
    }

    async fn delete_for_record(&self, _session: &mut dyn Session, record_id: i64) -> CoreResult<()> {
        self.rows.lock().unwrap().retain(|_, t| t.record_id != record_id);
        Ok(())
    }
}

//! Task: a C2 row. Exactly one exists per atomic record that is not
//! terminal (§3, §4.2).

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// A task's claim state. Distinct from [`super::record::RecordStatus`]
/// because a task only ever exists while its owning record is
/// `waiting`/`running` — see the invariant in §3.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ClaimState {
    Waiting,
    Running,
}

impl ClaimState {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Waiting => "waiting",
            Self::Running => "running",
        }
    }
}

/// The task envelope (§6): fields a worker sees when it claims a task.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Task {
    pub id: i64,
    pub record_id: i64,
    pub required_programs: Vec<String>,
    pub tag: String,
    pub priority: i32,
    pub function: String,
    pub function_kwargs: Value,
    pub created_at: DateTime<Utc>,
    pub claim_state: ClaimState,
    pub claim_manager_id: Option<String>,
    pub claim_token: Option<uuid::Uuid>,
    pub claim_timestamp: Option<DateTime<Utc>>,
}

impl Task {
    /// A brand-new task, always created in `waiting` claim state (§3:
    /// "A task exists from the moment its record first enters `waiting`").
    pub fn new(
        id: i64,
        record_id: i64,
        required_programs: Vec<String>,
        tag: impl Into<String>,
        priority: i32,
        function: impl Into<String>,
        function_kwargs: Value,
    ) -> Self {
        Self {
            id,
            record_id,
            required_programs,
            tag: tag.into(),
            priority,
            function: function.into(),
            function_kwargs,
            created_at: Utc::now(),
            claim_state: ClaimState::Waiting,
            claim_manager_id: None,
            claim_token: None,
            claim_timestamp: None,
        }
    }

    /// Whether `offered_programs` satisfies this task's program
    /// requirement (`required_programs ⊆ offered`, §4.2).
    pub fn programs_satisfied_by(&self, offered: &[String]) -> bool {
        self.required_programs.iter().all(|p| offered.contains(p))
    }

    /// Whether `pattern` matches this task's tag: exact match or the `*`
    /// wildcard (§4.2).
    pub fn tag_matches(&self, pattern: &str) -> bool {
        pattern == "*" || pattern == self.tag
    }

    /// Flip to `running`, recording the claiming manager and a fresh
    /// claim token.
    pub fn claim(&mut self, manager_id: impl Into<String>) -> uuid::Uuid {
        let token = uuid::Uuid::new_v4();
        self.claim_state = ClaimState::Running;
        self.claim_manager_id = Some(manager_id.into());
        self.claim_token = Some(token);
        self.claim_timestamp = Some(Utc::now());
        token
    }

    /// Flip back to `waiting`, clearing the claim (manager-lost re-queue
    /// or explicit reset, §4.2/§4.3).
    pub fn release(&mut self) {
        self.claim_state = ClaimState::Waiting;
        self.claim_manager_id = None;
        self.claim_token = None;
        self.claim_timestamp = None;
    }
}

/// Claim-matching criteria a manager offers when polling (§4.2).
#[derive(Debug, Clone)]
pub struct ClaimRequest {
    pub manager_id: String,
    pub programs: Vec<String>,
    pub tags: Vec<String>,
    pub limit: usize,
}

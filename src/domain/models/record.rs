//! Record: the identity and status shared by every computation kind
//! (§3, §4.3).

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::compute_history::Attempt;

/// Tag discriminating the kind of computation a record performs.
///
/// Dispatch for service drivers (C5) is by this tag, never by walking a
/// type hierarchy (Design Note 2).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RecordKind {
    /// Atomic: a single energy/gradient/hessian evaluation.
    Singlepoint,
    /// Service: geometry optimisation via repeated singlepoints.
    Optimization,
    /// Service: optimisation repeated over a scan grid.
    Gridoptimization,
    /// Service: optimisation repeated over a torsion angle scan.
    Torsiondrive,
    /// Service: combination of n-body subset singlepoints.
    Manybody,
    /// Service: stoichiometric combination of optimisations/singlepoints.
    Reaction,
    /// Service: nudged elastic band chain-of-states optimisation.
    Neb,
}

impl RecordKind {
    /// Stable lowercase string form, used as the DB column value and the
    /// driver registry lookup key.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Singlepoint => "singlepoint",
            Self::Optimization => "optimization",
            Self::Gridoptimization => "gridoptimization",
            Self::Torsiondrive => "torsiondrive",
            Self::Manybody => "manybody",
            Self::Reaction => "reaction",
            Self::Neb => "neb",
        }
    }

    #[allow(clippy::should_implement_trait)]
    pub fn from_str(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "singlepoint" => Some(Self::Singlepoint),
            "optimization" | "optimisation" => Some(Self::Optimization),
            "gridoptimization" | "gridoptimisation" => Some(Self::Gridoptimization),
            "torsiondrive" => Some(Self::Torsiondrive),
            "manybody" => Some(Self::Manybody),
            "reaction" => Some(Self::Reaction),
            "neb" => Some(Self::Neb),
            _ => None,
        }
    }

    /// A record is atomic (has a direct C2 task) or service (has a C3
    /// row and owns children) — §3. `Optimization` is atomic here: its
    /// geometry steps run inside a single manager-claimed task rather
    /// than fanning out into per-step child records, the way the other
    /// service kinds spawn `Optimization`/`Singlepoint` leaves (§4.5).
    pub fn is_atomic(&self) -> bool {
        matches!(self, Self::Singlepoint | Self::Optimization)
    }

    /// The complement of [`RecordKind::is_atomic`].
    pub fn is_service(&self) -> bool {
        !self.is_atomic()
    }
}

/// Record lifecycle status (§4.3).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RecordStatus {
    Waiting,
    Running,
    Complete,
    Error,
    Cancelled,
    Invalid,
    Deleted,
}

impl RecordStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Waiting => "waiting",
            Self::Running => "running",
            Self::Complete => "complete",
            Self::Error => "error",
            Self::Cancelled => "cancelled",
            Self::Invalid => "invalid",
            Self::Deleted => "deleted",
        }
    }

    #[allow(clippy::should_implement_trait)]
    pub fn from_str(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "waiting" => Some(Self::Waiting),
            "running" => Some(Self::Running),
            "complete" | "completed" => Some(Self::Complete),
            "error" => Some(Self::Error),
            "cancelled" | "canceled" => Some(Self::Cancelled),
            "invalid" => Some(Self::Invalid),
            "deleted" => Some(Self::Deleted),
            _ => None,
        }
    }

    /// `complete`, `error`, `cancelled` and `invalid` are
    /// "terminal-for-iteration" per §4.3's service aggregate rule: a
    /// service may advance once every dependency reaches one of these.
    /// Note this deliberately excludes `deleted`, which is never a legal
    /// dependency status (dependencies are cleared before a child may be
    /// hard-deleted — see the cascade engine, §4.7).
    pub fn is_terminal_for_iteration(&self) -> bool {
        matches!(self, Self::Complete | Self::Error | Self::Cancelled | Self::Invalid)
    }

    /// Whether this is a fully terminal record status (no further
    /// activity expected without an explicit user action).
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Complete | Self::Deleted)
    }

    /// Legal `to` statuses from `self`, ignoring the `deleted`/undelete
    /// pair (those are handled specially since undelete restores a
    /// snapshot rather than following a static table — §4.3).
    pub fn valid_transitions(&self) -> &'static [RecordStatus] {
        match self {
            Self::Waiting => &[Self::Running, Self::Cancelled, Self::Deleted],
            Self::Running => &[
                Self::Waiting,
                Self::Complete,
                Self::Error,
                Self::Cancelled,
                Self::Deleted,
            ],
            Self::Complete => &[Self::Invalid, Self::Deleted],
            Self::Error => &[Self::Waiting, Self::Cancelled, Self::Deleted],
            Self::Cancelled => &[Self::Waiting, Self::Deleted],
            Self::Invalid => &[Self::Complete, Self::Deleted],
            // `deleted -> previous-state` is not representable as a
            // static target since the target depends on the saved
            // snapshot; modelled by `any -> deleted` being symmetric and
            // undelete restoring the snapshot directly through the
            // repository, bypassing this table (§4.3, §4.7).
            Self::Deleted => &[],
        }
    }

    pub fn can_transition_to(&self, to: RecordStatus) -> bool {
        self.valid_transitions().contains(&to)
    }
}

/// A record: the identity and attributes shared by atomic and service
/// records alike (§3).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Record {
    pub id: i64,
    pub kind: RecordKind,
    pub status: RecordStatus,
    /// Status immediately before a soft delete, restored on undelete.
    pub pre_delete_status: Option<RecordStatus>,
    pub specification_id: i64,
    /// Molecule id(s) this record computes over. Singlepoint/optimisation
    /// records carry exactly one; reaction/manybody records carry the
    /// full stoichiometric set.
    pub molecule_ids: Vec<i64>,
    pub created_at: DateTime<Utc>,
    pub modified_at: DateTime<Utc>,
    pub owner: String,
    pub priority: i32,
    pub tag: String,
    /// Free-text annotation set via modify-metadata (§4.1); distinct
    /// from `provenance`, which the creating submission path fills in.
    pub comment: Option<String>,
    pub provenance: Value,
    /// Retry count against the per-kind retry budget (§4.2, §7).
    pub retry_count: u32,
    /// Kind-specific result payload once complete (energies, gradients,
    /// final molecule, ...). Opaque to the core beyond storage.
    pub properties: Option<Value>,
    /// Ordered, append-only list of worker attempts (§3).
    pub compute_history: Vec<Attempt>,
}

impl Record {
    /// Construct a brand-new record in `waiting` status.
    pub fn new(
        id: i64,
        kind: RecordKind,
        specification_id: i64,
        molecule_ids: Vec<i64>,
        owner: impl Into<String>,
        priority: i32,
        tag: impl Into<String>,
    ) -> Self {
        let now = Utc::now();
        Self {
            id,
            kind,
            status: RecordStatus::Waiting,
            pre_delete_status: None,
            specification_id,
            molecule_ids,
            created_at: now,
            modified_at: now,
            owner: owner.into(),
            priority,
            tag: tag.into(),
            comment: None,
            provenance: Value::Null,
            retry_count: 0,
            properties: None,
            compute_history: Vec::new(),
        }
    }

    /// The key dedup is computed over: `(kind, specification_id,
    /// molecule_ids)` must all match for two records to be considered
    /// the same (§4.1).
    pub fn dedup_key(&self) -> (RecordKind, i64, Vec<i64>) {
        let mut ids = self.molecule_ids.clone();
        ids.sort_unstable();
        (self.kind, self.specification_id, ids)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn waiting_to_running_is_legal() {
        assert!(RecordStatus::Waiting.can_transition_to(RecordStatus::Running));
    }

    #[test]
    fn complete_cannot_go_directly_to_error() {
        assert!(!RecordStatus::Complete.can_transition_to(RecordStatus::Error));
    }

    #[test]
    fn invalid_can_return_to_complete() {
        assert!(RecordStatus::Invalid.can_transition_to(RecordStatus::Complete));
    }

    #[test]
    fn terminal_for_iteration_excludes_waiting_and_running() {
        assert!(!RecordStatus::Waiting.is_terminal_for_iteration());
        assert!(!RecordStatus::Running.is_terminal_for_iteration());
        assert!(RecordStatus::Complete.is_terminal_for_iteration());
        assert!(RecordStatus::Error.is_terminal_for_iteration());
        assert!(RecordStatus::Cancelled.is_terminal_for_iteration());
        assert!(RecordStatus::Invalid.is_terminal_for_iteration());
    }

    #[test]
    fn dedup_key_ignores_molecule_id_order() {
        let a = Record::new(1, RecordKind::Reaction, 10, vec![3, 1, 2], "u", 0, "t");
        let b = Record::new(2, RecordKind::Reaction, 10, vec![1, 2, 3], "u", 0, "t");
        assert_eq!(a.dedup_key(), b.dedup_key());
    }

    #[test]
    fn record_kind_round_trips_through_str() {
        for kind in [
            RecordKind::Singlepoint,
            RecordKind::Optimization,
            RecordKind::Gridoptimization,
            RecordKind::Torsiondrive,
            RecordKind::Manybody,
            RecordKind::Reaction,
            RecordKind::Neb,
        ] {
            assert_eq!(RecordKind::from_str(kind.as_str()), Some(kind));
        }
    }
}

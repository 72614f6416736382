//! Core error taxonomy (§7).
//!
//! One variant per taxonomy entry. `InternalError` always carries a
//! stable id so an opaque message can be correlated with the event a
//! caller logged when the error was first raised.

use thiserror::Error;
use uuid::Uuid;

/// Errors raised by the record store, task queue, service queue, dataset
/// composer and cascade engine.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum CoreError {
    /// Name/identity collision: dataset, entry, specification, user.
    #[error("already exists: {0}")]
    AlreadyExists(String),

    /// Target row not found.
    #[error("missing data: {0}")]
    MissingData(String),

    /// C4 rejected a status write.
    #[error("invalid transition from {from} to {to}")]
    InvalidTransition {
        /// Status the record was in.
        from: String,
        /// Status the caller attempted to transition to.
        to: String,
    },

    /// A worker returned a result whose claim token is no longer current
    /// (the task was reclaimed after being declared lost, §4.2).
    #[error("stale claim token {claim_token} on task {task_id}")]
    StaleClaim {
        /// The task the stale token was presented for.
        task_id: i64,
        /// The token the caller presented.
        claim_token: Uuid,
    },

    /// Credentials invalid or expired. The core only carries the shape;
    /// enforcement belongs to the surrounding authentication collaborator.
    #[error("authentication failure: {0}")]
    AuthenticationFailure(String),

    /// Policy rejected the request. The core only carries the shape;
    /// enforcement belongs to the surrounding authorisation collaborator.
    #[error("authorisation denied: {0}")]
    AuthorisationDenied(String),

    /// Body/args failed validation.
    #[error("malformed request: {0}")]
    MalformedRequest(String),

    /// Anything else. Always persisted with a stable id and surfaced as
    /// opaque to the caller.
    #[error("internal error {id}: {detail}")]
    InternalError {
        /// Stable id a caller can use to correlate with logs.
        id: Uuid,
        /// Detail, logged but not necessarily shown to external callers.
        detail: String,
    },
}

impl CoreError {
    /// Build an [`CoreError::InternalError`], generating the correlation id
    /// and emitting the matching `tracing::error!` event.
    pub fn internal(detail: impl Into<String>) -> Self {
        let id = Uuid::new_v4();
        let detail = detail.into();
        tracing::error!(error_id = %id, detail = %detail, "internal error");
        Self::InternalError { id, detail }
    }

    /// Whether this error is the task layer's sole retryable fault
    /// (manager-lost / transport faults are surfaced as retries by the
    /// task queue itself; everything else is surfaced to the user without
    /// a retry per §7).
    pub const fn is_stale_claim(&self) -> bool {
        matches!(self, Self::StaleClaim { .. })
    }
}

impl From<serde_json::Error> for CoreError {
    fn from(err: serde_json::Error) -> Self {
        Self::MalformedRequest(err.to_string())
    }
}

impl From<sqlx::Error> for CoreError {
    fn from(err: sqlx::Error) -> Self {
        match err {
            sqlx::Error::RowNotFound => Self::MissingData("row not found".to_string()),
            other => Self::internal(other.to_string()),
        }
    }
}

/// Convenience alias used throughout the crate.
pub type CoreResult<T> = Result<T, CoreError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn already_exists_display() {
        let err = CoreError::AlreadyExists("dataset 'h2o-set'".to_string());
        assert_eq!(err.to_string(), "already exists: dataset 'h2o-set'");
    }

    #[test]
    fn invalid_transition_display() {
        let err = CoreError::InvalidTransition {
            from: "complete".to_string(),
            to: "running".to_string(),
        };
        assert_eq!(err.to_string(), "invalid transition from complete to running");
    }

    #[test]
    fn stale_claim_is_recognised() {
        let err = CoreError::StaleClaim {
            task_id: 1,
            claim_token: Uuid::new_v4(),
        };
        assert!(err.is_stale_claim());
        assert!(!CoreError::AlreadyExists("x".to_string()).is_stale_claim());
    }

    #[test]
    fn internal_error_carries_stable_id() {
        let err = CoreError::internal("boom");
        match err {
            CoreError::InternalError { id, detail } => {
                assert!(!id.is_nil());
                assert_eq!(detail, "boom");
            }
            _ => panic!("expected InternalError"),
        }
    }
}

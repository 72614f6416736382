//! Engine configuration knobs (§2, §5): heartbeat policy, per-kind retry
//! budgets and service admission limits. Loaded and validated by
//! `infrastructure::config` (the shape here is the pure-domain part that
//! the state machine and service queue read at runtime).

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use super::record::RecordKind;

/// How long a manager may go without a heartbeat before its claimed
/// tasks are considered lost and released back to `waiting` (§4.2).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct HeartbeatPolicy {
    pub interval_seconds: u64,
    pub max_missed: u32,
}

impl Default for HeartbeatPolicy {
    fn default() -> Self {
        Self {
            interval_seconds: 60,
            max_missed: 5,
        }
    }
}

impl HeartbeatPolicy {
    /// A manager is lost once this many seconds pass without a heartbeat.
    pub fn lost_after_seconds(&self) -> u64 {
        self.interval_seconds * u64::from(self.max_missed)
    }
}

/// Retry budget for a single record kind (§4.1: records that error are
/// retried up to a bounded number of times before the error becomes
/// terminal).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RetryBudget {
    pub max_retries: u32,
}

impl Default for RetryBudget {
    fn default() -> Self {
        Self { max_retries: 2 }
    }
}

/// Top-level engine configuration (§2).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    pub heartbeat: HeartbeatPolicy,
    /// Per-kind retry budget; kinds absent from the map fall back to
    /// `default_retry_budget`.
    pub retry_budgets: HashMap<String, RetryBudget>,
    pub default_retry_budget: RetryBudget,
    /// Maximum number of service records a single iteration pass admits
    /// to `running` concurrently (§4.3, §5).
    pub service_admission_slots: usize,
    pub default_tag: String,
    pub default_priority: i32,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            heartbeat: HeartbeatPolicy::default(),
            retry_budgets: HashMap::new(),
            default_retry_budget: RetryBudget::default(),
            service_admission_slots: 16,
            default_tag: "default".to_string(),
            default_priority: 0,
        }
    }
}

impl EngineConfig {
    /// The retry budget in effect for `kind`, falling back to the
    /// configured default when the kind has no override.
    pub fn retry_budget_for(&self, kind: RecordKind) -> RetryBudget {
        self.retry_budgets
            .get(kind.as_str())
            .copied()
            .unwrap_or(self.default_retry_budget)
    }
}

/// Postgres connection settings (not part of the spec's core domain, but
/// still configuration the engine needs at startup).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct DatabaseConfig {
    pub url: String,
    pub max_connections: u32,
    pub connect_timeout_seconds: u64,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            url: "postgres://localhost/recordflow".to_string(),
            max_connections: 10,
            connect_timeout_seconds: 10,
        }
    }
}

/// Structured logging settings, read by `infrastructure::logging`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    pub level: String,
    pub format: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self { level: "info".to_string(), format: "pretty".to_string() }
    }
}

/// The engine's full runtime configuration: the domain-level knobs in
/// [`EngineConfig`] plus the ambient concerns (database, logging) the
/// core itself is silent on (§2, §9).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub engine: EngineConfig,
    pub database: DatabaseConfig,
    pub logging: LoggingConfig,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self { engine: EngineConfig::default(), database: DatabaseConfig::default(), logging: LoggingConfig::default() }
    }
}

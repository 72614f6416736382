use anyhow::{Context, Result};
use figment::providers::{Env, Format, Serialized, Yaml};
use figment::Figment;
use thiserror::Error;

use crate::domain::models::AppConfig;

/// Configuration error types
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("invalid log level: {0}. must be one of: trace, debug, info, warn, error")]
    InvalidLogLevel(String),

    #[error("invalid log format: {0}. must be one of: json, pretty")]
    InvalidLogFormat(String),

    #[error("database url cannot be empty")]
    EmptyDatabaseUrl,

    #[error("invalid max_connections: {0}. must be at least 1")]
    InvalidMaxConnections(u32),

    #[error("invalid heartbeat interval_seconds: {0}. must be positive")]
    InvalidHeartbeatInterval(u64),

    #[error("invalid service_admission_slots: {0}. must be at least 1")]
    InvalidAdmissionSlots(usize),

    #[error("configuration validation failed: {0}")]
    ValidationFailed(String),
}

/// Configuration loader with hierarchical merging
pub struct ConfigLoader;

impl ConfigLoader {
    /// Load configuration with hierarchical merging
    ///
    /// Precedence (lowest to highest):
    /// 1. Programmatic defaults (Serialized)
    /// 2. `recordflow.yaml` (project config)
    /// 3. `recordflow.local.yaml` (local overrides, optional)
    /// 4. Environment variables (`RECORDFLOW_` prefix, highest priority)
    pub fn load() -> Result<AppConfig> {
        let config: AppConfig = Figment::new()
            .merge(Serialized::defaults(AppConfig::default()))
            .merge(Yaml::file("recordflow.yaml"))
            .merge(Yaml::file("recordflow.local.yaml"))
            .merge(Env::prefixed("RECORDFLOW_").split("__"))
            .extract()
            .context("failed to extract configuration from figment")?;

        Self::validate(&config)?;
        Ok(config)
    }

    /// Load configuration from a specific file, skipping the default
    /// project/local file lookup. Used by tests and by callers that pin
    /// an explicit config path.
    pub fn load_from_file(path: impl AsRef<std::path::Path>) -> Result<AppConfig> {
        let config: AppConfig = Figment::new()
            .merge(Serialized::defaults(AppConfig::default()))
            .merge(Yaml::file(path.as_ref()))
            .extract()
            .context(format!("failed to load config from {}", path.as_ref().display()))?;

        Self::validate(&config)?;
        Ok(config)
    }

    /// Validate configuration after loading
    pub fn validate(config: &AppConfig) -> Result<(), ConfigError> {
        let valid_log_levels = ["trace", "debug", "info", "warn", "error"];
        if !valid_log_levels.contains(&config.logging.level.as_str()) {
            return Err(ConfigError::InvalidLogLevel(config.logging.level.clone()));
        }

        let valid_log_formats = ["json", "pretty"];
        if !valid_log_formats.contains(&config.logging.format.as_str()) {
            return Err(ConfigError::InvalidLogFormat(config.logging.format.clone()));
        }

        if config.database.url.is_empty() {
            return Err(ConfigError::EmptyDatabaseUrl);
        }

        if config.database.max_connections == 0 {
            return Err(ConfigError::InvalidMaxConnections(config.database.max_connections));
        }

        if config.engine.heartbeat.interval_seconds == 0 {
            return Err(ConfigError::InvalidHeartbeatInterval(config.engine.heartbeat.interval_seconds));
        }

        if config.engine.service_admission_slots == 0 {
            return Err(ConfigError::InvalidAdmissionSlots(config.engine.service_admission_slots));
        }

        for (kind, budget) in &config.engine.retry_budgets {
            if budget.max_retries == 0 {
                return Err(ConfigError::ValidationFailed(format!(
                    "retry budget for kind '{kind}' must allow at least one retry"
                )));
            }
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_is_valid() {
        let config = AppConfig::default();
        ConfigLoader::validate(&config).expect("default config should be valid");
    }

    #[test]
    fn yaml_parsing_overrides_defaults() {
        let yaml = r"
engine:
  service_admission_slots: 4
  default_tag: batch
database:
  url: postgres://db/recordflow
  max_connections: 5
logging:
  level: debug
  format: json
";
        let config: AppConfig = serde_yaml::from_str(yaml).expect("yaml should parse");
        assert_eq!(config.engine.service_admission_slots, 4);
        assert_eq!(config.engine.default_tag, "batch");
        assert_eq!(config.database.max_connections, 5);
        assert_eq!(config.logging.level, "debug");
        ConfigLoader::validate(&config).expect("parsed config should be valid");
    }

    #[test]
    fn validate_rejects_unknown_log_level() {
        let mut config = AppConfig::default();
        config.logging.level = "verbose".to_string();
        let result = ConfigLoader::validate(&config);
        assert!(matches!(result, Err(ConfigError::InvalidLogLevel(level)) if level == "verbose"));
    }

    #[test]
    fn validate_rejects_unknown_log_format() {
        let mut config = AppConfig::default();
        config.logging.format = "xml".to_string();
        let result = ConfigLoader::validate(&config);
        assert!(matches!(result, Err(ConfigError::InvalidLogFormat(format)) if format == "xml"));
    }

    #[test]
    fn validate_rejects_empty_database_url() {
        let mut config = AppConfig::default();
        config.database.url = String::new();
        assert!(matches!(ConfigLoader::validate(&config), Err(ConfigError::EmptyDatabaseUrl)));
    }

    #[test]
    fn validate_rejects_zero_admission_slots() {
        let mut config = AppConfig::default();
        config.engine.service_admission_slots = 0;
        assert!(matches!(ConfigLoader::validate(&config), Err(ConfigError::InvalidAdmissionSlots(0))));
    }

    #[test]
    fn validate_rejects_zero_heartbeat_interval() {
        let mut config = AppConfig::default();
        config.engine.heartbeat.interval_seconds = 0;
        assert!(matches!(ConfigLoader::validate(&config), Err(ConfigError::InvalidHeartbeatInterval(0))));
    }

    #[test]
    fn env_override_uses_prefixed_double_underscore_path() {
        unsafe {
            std::env::set_var("RECORDFLOW_LOGGING__LEVEL", "debug");
            std::env::set_var("RECORDFLOW_ENGINE__SERVICE_ADMISSION_SLOTS", "7");
        }

        let config: AppConfig = Figment::new()
            .merge(Serialized::defaults(AppConfig::default()))
            .merge(Env::prefixed("RECORDFLOW_").split("__"))
            .extract()
            .expect("env-only figment extraction should succeed");

        assert_eq!(config.logging.level, "debug");
        assert_eq!(config.engine.service_admission_slots, 7);

        unsafe {
            std::env::remove_var("RECORDFLOW_LOGGING__LEVEL");
            std::env::remove_var("RECORDFLOW_ENGINE__SERVICE_ADMISSION_SLOTS");
        }
    }

    #[test]
    fn hierarchical_merging_lets_later_files_win() {
        use std::io::Write;
        use tempfile::NamedTempFile;

        let mut base_file = NamedTempFile::new().unwrap();
        writeln!(base_file, "logging:\n  level: info\n  format: json\nengine:\n  service_admission_slots: 5").unwrap();
        base_file.flush().unwrap();

        let mut override_file = NamedTempFile::new().unwrap();
        writeln!(override_file, "logging:\n  level: debug").unwrap();
        override_file.flush().unwrap();

        let config: AppConfig = Figment::new()
            .merge(Serialized::defaults(AppConfig::default()))
            .merge(Yaml::file(base_file.path()))
            .merge(Yaml::file(override_file.path()))
            .extract()
            .unwrap();

        assert_eq!(config.logging.level, "debug", "override should win");
        assert_eq!(config.logging.format, "json", "base value should persist when not overridden");
        assert_eq!(config.engine.service_admission_slots, 5);
    }
}

//! Logging infrastructure
//!
//! Structured logging using tracing and tracing-subscriber. The engine
//! itself carries no HTTP access log or audit trail (those are the
//! surrounding service's concern); this just wires a process-wide
//! subscriber so every `#[instrument]`'d application method gets
//! structured, leveled output.

use anyhow::{Context, Result};
use tracing_subscriber::EnvFilter;

use crate::domain::models::LoggingConfig;

/// Initialise the global tracing subscriber from `config`.
///
/// `RUST_LOG` still takes precedence over `config.level` for ad hoc
/// overrides, matching `EnvFilter`'s usual behaviour.
///
/// # Errors
/// Returns an error if a global subscriber is already installed, or if
/// `config.level` does not parse as a tracing directive.
pub fn init(config: &LoggingConfig) -> Result<()> {
    let env_filter = EnvFilter::builder()
        .with_default_directive(config.level.parse().context("invalid logging.level directive")?)
        .from_env_lossy();

    let builder = tracing_subscriber::fmt().with_env_filter(env_filter).with_target(true);

    let result = if config.format == "json" { builder.json().try_init() } else { builder.try_init() };
    result.map_err(|err| anyhow::anyhow!("a tracing subscriber is already installed: {err}"))
}

//! Infrastructure layer
//!
//! Cross-cutting ambient concerns the domain and application layers
//! never touch directly:
//! - [`config`] — hierarchical configuration loading and validation
//! - [`logging`] — process-wide tracing subscriber setup

pub mod config;
pub mod logging;

//! recordflow - a record-oriented orchestration engine for long-running,
//! multi-stage scientific computations.
//!
//! - [`domain`] — the data model and the ports other layers implement.
//! - [`application`] — the use cases: the record ledger, task queue,
//!   service iteration loop, dataset composer and cascade engine.
//! - [`adapters`] — concrete port implementations (Postgres, in-memory).
//! - [`infrastructure`] — configuration and logging.
//!
//! The engine itself has no opinion on transport, authentication or wire
//! formats; it is meant to sit behind a surrounding service that does.

pub mod adapters;
pub mod application;
pub mod domain;
pub mod infrastructure;

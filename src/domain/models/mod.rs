//! The data model (§3): records, specifications, molecules, tasks,
//! services, datasets and compute history.

pub mod canonical;
pub mod compute_history;
pub mod config;
pub mod dataset;
pub mod molecule;
pub mod record;
pub mod service;
pub mod specification;
pub mod task;

pub use compute_history::{Attempt, OutputStream, StreamKind};
pub use config::{AppConfig, DatabaseConfig, EngineConfig, LoggingConfig};
pub use dataset::{Dataset, DatasetKey, Entry, RecordItem, SpecificationBinding};
pub use molecule::Molecule;
pub use record::{Record, RecordKind, RecordStatus};
pub use service::{Dependency, Service};
pub use specification::Specification;
pub use task::{ClaimRequest, ClaimState, Task};

//! Postgres-backed adapters (§4, §9). Every repository takes its
//! transaction through a [`Session`](crate::domain::ports::Session)
//! rather than holding one itself (Design Note 1).

pub mod content_repository;
pub mod dataset_repository;
pub mod pool;
pub mod record_repository;
pub mod service_repository;
pub mod session;
pub mod task_queue_repository;

pub use content_repository::{PgMoleculeRepository, PgSpecificationRepository};
pub use dataset_repository::PgDatasetRepository;
pub use pool::{apply_schema, connect};
pub use record_repository::PgRecordRepository;
pub use service_repository::PgServiceRepository;
pub use session::{PgSession, PgSessionFactory};
pub use task_queue_repository::PgTaskQueueRepository;

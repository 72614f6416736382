//! In-memory adapter: implements every port with plain `Mutex`-guarded
//! tables. Used by the engine's own test suite so tests exercise real
//! application-layer logic without a database.

pub mod content_repository;
pub mod dataset_repository;
pub mod record_repository;
pub mod service_repository;
pub mod session;
pub mod task_queue_repository;

pub use content_repository::{MemoryMoleculeRepository, MemorySpecificationRepository};
pub use dataset_repository::MemoryDatasetRepository;
pub use record_repository::MemoryRecordRepository;
pub use service_repository::MemoryServiceRepository;
pub use session::{MemorySession, MemorySessionFactory};
pub use task_queue_repository::MemoryTaskQueueRepository;

//! Ports (§5/§6): the traits the application layer depends on and the
//! adapters layer implements. No concrete storage type is named here.

pub mod content_repository;
pub mod dataset_repository;
pub mod record_repository;
pub mod service_repository;
pub mod session;
pub mod task_queue_repository;

pub use content_repository::{MoleculeRepository, SpecificationRepository};
pub use dataset_repository::DatasetRepository;
pub use record_repository::RecordRepository;
pub use service_repository::ServiceRepository;
pub use session::{Session, SessionFactory};
pub use task_queue_repository::TaskQueueRepository;

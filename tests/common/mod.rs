//! Shared test harness: wires every port to the in-memory adapter so
//! scenario tests exercise the real application layer without a
//! database.

use std::sync::Arc;

use recordflow::adapters::memory::{
    MemoryDatasetRepository, MemoryMoleculeRepository, MemoryRecordRepository, MemorySession,
    MemoryServiceRepository, MemorySpecificationRepository, MemoryTaskQueueRepository,
};
use recordflow::application::drivers::DriverRegistry;
use recordflow::application::{CascadeEngine, DatasetComposer, RecordStore, ServiceQueue, TaskQueueService};
use recordflow::domain::models::EngineConfig;
use recordflow::domain::ports::{DatasetRepository, RecordRepository, ServiceRepository, Session};

#[allow(dead_code)]
pub struct Harness {
    pub records: Arc<dyn RecordRepository>,
    pub services: Arc<dyn ServiceRepository>,
    pub datasets: Arc<dyn DatasetRepository>,
    pub record_store: Arc<RecordStore>,
    pub task_queue: TaskQueueService,
    pub service_queue: Arc<ServiceQueue>,
    pub dataset_composer: DatasetComposer,
    pub cascade: CascadeEngine,
}

#[allow(dead_code)]
impl Harness {
    pub fn new() -> Self {
        Self::with_config(EngineConfig::default())
    }

    pub fn with_config(config: EngineConfig) -> Self {
        let records: Arc<dyn RecordRepository> = Arc::new(MemoryRecordRepository::new());
        let specifications = Arc::new(MemorySpecificationRepository::new());
        let molecules = Arc::new(MemoryMoleculeRepository::new());
        let tasks = Arc::new(MemoryTaskQueueRepository::new());
        let services: Arc<dyn ServiceRepository> = Arc::new(MemoryServiceRepository::new(records.clone()));
        let datasets: Arc<dyn DatasetRepository> = Arc::new(MemoryDatasetRepository::new());

        let record_store = Arc::new(RecordStore::new(records.clone(), specifications.clone(), molecules, tasks.clone(), services.clone()));
        let task_queue = TaskQueueService::new(tasks, record_store.clone(), config.clone());
        let service_queue = Arc::new(ServiceQueue::new(
            services.clone(),
            records.clone(),
            record_store.clone(),
            specifications,
            DriverRegistry::with_builtins(),
            config,
        ));
        let dataset_composer = DatasetComposer::new(datasets.clone(), record_store.clone(), service_queue.clone());
        let cascade = CascadeEngine::new(records.clone(), services.clone(), record_store.clone());

        Self { records, services, datasets, record_store, task_queue, service_queue, dataset_composer, cascade }
    }

    /// A no-op session: the in-memory adapter ignores transaction
    /// boundaries entirely, so every call site just needs a `&mut dyn
    /// Session` to satisfy the port signatures.
    pub fn session() -> MemorySession {
        MemorySession
    }

    pub fn session_mut(session: &mut MemorySession) -> &mut dyn Session {
        session
    }
}

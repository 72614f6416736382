//! Application layer: the use cases that sit between the ports
//! ([`crate::domain::ports`]) and the domain model, implementing the
//! engine's core operations (§4).
//!
//! - [`record_store`] — C1, the record ledger and specification/molecule
//!   dedup.
//! - [`task_queue`] — C2, the claimable task queue.
//! - [`service_queue`] — C3/C5, the service iteration loop and its
//!   per-kind drivers.
//! - [`state_machine`] — C4, the one place record status changes.
//! - [`dataset_composer`] — C6, dataset (entry × specification) fan-out.
//! - [`cascade`] — C7, cancel/reset/invalidate/delete propagation.

pub mod cascade;
pub mod dataset_composer;
pub mod drivers;
pub mod record_store;
pub mod service_queue;
pub mod state_machine;
pub mod task_queue;

pub use cascade::CascadeEngine;
pub use dataset_composer::DatasetComposer;
pub use record_store::{RecordStore, SubmitOutcome};
pub use service_queue::ServiceQueue;
pub use task_queue::TaskQueueService;

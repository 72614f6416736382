//! The nested-or-reuse transaction handle every repository method takes
//! explicitly (Design Note 1). Never carried via thread-local or
//! task-local state: a cascade that touches several repositories threads
//! the same session through each call so the whole cascade commits or
//! rolls back atomically.

use std::any::Any;

use async_trait::async_trait;

use crate::domain::error::CoreResult;

/// A unit of work against the backing store. Adapters hand out concrete
/// sessions (a Postgres transaction, a no-op marker for the in-memory
/// adapter) behind this handle so the application layer never names a
/// storage-specific transaction type.
#[async_trait]
pub trait Session: Send {
    /// Commit the work done through this session.
    async fn commit(self: Box<Self>) -> CoreResult<()>;

    /// Discard the work done through this session.
    async fn rollback(self: Box<Self>) -> CoreResult<()>;

    /// Lets an adapter's own repository impls downcast back to their
    /// concrete session type (e.g. the Postgres adapter recovers its
    /// `&mut PgConnection` out of a `Box<dyn Session>`).
    fn as_any_mut(&mut self) -> &mut dyn Any;
}

/// Opens sessions. Each adapter provides exactly one factory.
#[async_trait]
pub trait SessionFactory: Send + Sync {
    async fn begin(&self) -> CoreResult<Box<dyn Session>>;
}

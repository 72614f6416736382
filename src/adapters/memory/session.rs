//! No-op session for the in-memory adapter: every repository write is
//! already visible immediately, so commit/rollback are both no-ops.
//! Exists purely so application code never has to special-case which
//! adapter it's running against.

use std::any::Any;

use async_trait::async_trait;

use crate::domain::error::CoreResult;
use crate::domain::ports::session::{Session, SessionFactory};

pub struct MemorySession;

#[async_trait]
impl Session for MemorySession {
    async fn commit(self: Box<Self>) -> CoreResult<()> {
        Ok(())
    }

    async fn rollback(self: Box<Self>) -> CoreResult<()> {
        Ok(())
    }

    fn as_any_mut(&mut self) -> &mut dyn Any {
        self
    }
}

#[derive(Default)]
pub struct MemorySessionFactory;

#[async_trait]
impl SessionFactory for MemorySessionFactory {
    async fn begin(&self) -> CoreResult<Box<dyn Session>> {
        Ok(Box::new(MemorySession))
    }
}

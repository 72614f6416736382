//! The Postgres half of the nested-or-reuse session handle (Design
//! Note 1): a `Box<dyn Session>` that, underneath, owns a live
//! `sqlx::Transaction`. Repository methods downcast back to this type
//! to get an executor.

use std::any::Any;

use async_trait::async_trait;
use sqlx::{PgPool, Postgres, Transaction};

use crate::domain::error::CoreResult;
use crate::domain::ports::session::{Session, SessionFactory};

pub struct PgSession {
    pub tx: Transaction<'static, Postgres>,
}

#[async_trait]
impl Session for PgSession {
    async fn commit(self: Box<Self>) -> CoreResult<()> {
        self.tx.commit().await?;
        Ok(())
    }

    async fn rollback(self: Box<Self>) -> CoreResult<()> {
        self.tx.rollback().await?;
        Ok(())
    }

    fn as_any_mut(&mut self) -> &mut dyn Any {
        self
    }
}

impl PgSession {
    /// Downcasts a generic session handle back to its Postgres
    /// transaction. Panics if handed a session from a different
    /// adapter, which would be an application-layer bug (mixing
    /// adapters within one cascade is never legal).
    pub fn executor(session: &mut dyn Session) -> &mut Transaction<'static, Postgres> {
        &mut session
            .as_any_mut()
            .downcast_mut::<PgSession>()
            .expect("postgres repository handed a non-postgres session")
            .tx
    }
}

pub struct PgSessionFactory {
    pool: PgPool,
}

impl PgSessionFactory {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl SessionFactory for PgSessionFactory {
    async fn begin(&self) -> CoreResult<Box<dyn Session>> {
        let tx = self.pool.begin().await?;
        Ok(Box::new(PgSession { tx }))
    }
}

//! Content-addressed dedup ports for specifications and molecules
//! (§4.1, §4.5). Both are looked up by their canonical hash before
//! insert, the same way the record ledger looks up by dedup key.

use async_trait::async_trait;

use crate::domain::error::CoreResult;
use crate::domain::models::{Molecule, Specification};

use super::session::Session;

#[async_trait]
pub trait SpecificationRepository: Send + Sync {
    async fn find_by_hash(
        &self,
        session: &mut dyn Session,
        hash: &str,
    ) -> CoreResult<Option<Specification>>;

    async fn create(
        &self,
        session: &mut dyn Session,
        specification: Specification,
    ) -> CoreResult<Specification>;

    async fn get(&self, session: &mut dyn Session, id: i64) -> CoreResult<Specification>;
}

#[async_trait]
pub trait MoleculeRepository: Send + Sync {
    async fn find_by_hash(&self, session: &mut dyn Session, hash: &str) -> CoreResult<Option<Molecule>>;

    async fn create(&self, session: &mut dyn Session, molecule: Molecule) -> CoreResult<Molecule>;

    async fn get(&self, session: &mut dyn Session, id: i64) -> CoreResult<Molecule>;
}

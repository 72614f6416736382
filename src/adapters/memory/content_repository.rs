//! In-memory [`SpecificationRepository`]/[`MoleculeRepository`]: the
//! content-addressed dedup tables keyed by canonical hash (§4.5).

use std::collections::HashMap;
use std::sync::atomic::{AtomicI64, Ordering};
use std::sync::Mutex;

use async_trait::async_trait;

use crate::domain::error::{CoreError, CoreResult};
use crate::domain::models::{Molecule, Specification};
use crate::domain::ports::{MoleculeRepository, Session, SpecificationRepository};

#[derive(Default)]
pub struct MemorySpecificationRepository {
    rows: Mutex<HashMap<i64, Specification>>,
    by_hash: Mutex<HashMap<String, i64>>,
    next_id: AtomicI64,
}

impl MemorySpecificationRepository {
    pub fn new() -> Self {
        Self { rows: Mutex::new(HashMap::new()), by_hash: Mutex::new(HashMap::new()), next_id: AtomicI64::new(1) }
    }
}

#[async_trait]
impl SpecificationRepository for MemorySpecificationRepository {
    async fn find_by_hash(&self, _session: &mut dyn Session, hash: &str) -> CoreResult<Option<Specification>> {
        let id = self.by_hash.lock().unwrap().get(hash).copied();
        Ok(id.and_then(|id| self.rows.lock().unwrap().get(&id).cloned()))
    }

    async fn create(&self, _session: &mut dyn Session, mut specification: Specification) -> CoreResult<Specification> {
        let id = self.next_id.fetch_add(1, Ordering::SeqCst);
        specification.id = Some(id);
        self.by_hash.lock().unwrap().insert(specification.canonical_hash(), id);
        self.rows.lock().unwrap().insert(id, specification.clone());
        Ok(specification)
    }

    async fn get(&self, _session: &mut dyn Session, id: i64) -> CoreResult<Specification> {
        self.rows
            .lock()
            .unwrap()
            .get(&id)
            .cloned()
            .ok_or_else(|| CoreError::MissingData(format!("specification {id}")))
    }
}

#[derive(Default)]
pub struct MemoryMoleculeRepository {
    rows: Mutex<HashMap<i64, Molecule>>,
    by_hash: Mutex<HashMap<String, i64>>,
    next_id: AtomicI64,
}

impl MemoryMoleculeRepository {
    pub fn new() -> Self {
        Self { rows: Mutex::new(HashMap::new()), by_hash: Mutex::new(HashMap::new()), next_id: AtomicI64::new(1) }
    }
}

#[async_trait]
impl MoleculeRepository for MemoryMoleculeRepository {
    async fn find_by_hash(&self, _session: &mut dyn Session, hash: &str) -> CoreResult<Option<Molecule>> {
        let id = self.by_hash.lock().unwrap().get(hash).copied();
        Ok(id.and_then(|id| self.rows.lock().unwrap().get(&id).cloned()))
    }

    async fn create(&self, _session: &mut dyn Session, mut molecule: Molecule) -> CoreResult<Molecule> {
        let id = self.next_id.fetch_add(1, Ordering::SeqCst);
        molecule.id = Some(id);
        self.by_hash.lock().unwrap().insert(molecule.canonical_hash(), id);
        self.rows.lock().unwrap().insert(id, molecule.clone());
        Ok(molecule)
    }

    async fn get(&self, _session: &mut dyn Session, id: i64) -> CoreResult<Molecule> {
        self.rows
            .lock()
            .unwrap()
            .get(&id)
            .cloned()
            .ok_or_else(|| CoreError::MissingData(format!("molecule {id}")))
    }
}

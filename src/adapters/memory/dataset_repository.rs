//! In-memory [`DatasetRepository`].

use std::collections::HashMap;
use std::sync::atomic::{AtomicI64, Ordering};
use std::sync::Mutex;

use async_trait::async_trait;

use crate::domain::error::{CoreError, CoreResult};
use crate::domain::models::dataset::{DatasetKey, DatasetRecordItemRef, Entry, RecordItem, SpecificationBinding};
use crate::domain::models::Dataset;
use crate::domain::ports::{DatasetRepository, Session};

#[derive(Default)]
pub struct MemoryDatasetRepository {
    rows: Mutex<HashMap<i64, Dataset>>,
    next_id: AtomicI64,
}

impl MemoryDatasetRepository {
    pub fn new() -> Self {
        Self { rows: Mutex::new(HashMap::new()), next_id: AtomicI64::new(1) }
    }
}

#[async_trait]
impl DatasetRepository for MemoryDatasetRepository {
    async fn create(&self, _session: &mut dyn Session, mut dataset: Dataset) -> CoreResult<Dataset> {
        let mut rows = self.rows.lock().unwrap();
        let key = dataset.key();
        if rows.values().any(|d| d.key() == key) {
            return Err(CoreError::AlreadyExists(format!("dataset '{}' of kind {}", dataset.name, dataset.kind.as_str())));
        }
        let id = self.next_id.fetch_add(1, Ordering::SeqCst);
        dataset.id = id;
        rows.insert(id, dataset.clone());
        Ok(dataset)
    }

    async fn get(&self, _session: &mut dyn Session, id: i64) -> CoreResult<Dataset> {
        self.rows.lock().unwrap().get(&id).cloned().ok_or_else(|| CoreError::MissingData(format!("dataset {id}")))
    }

    async fn get_by_key(&self, _session: &mut dyn Session, key: DatasetKey) -> CoreResult<Option<Dataset>> {
        Ok(self.rows.lock().unwrap().values().find(|d| d.key() == key).cloned())
    }

    async fn add_entry(&self, _session: &mut dyn Session, dataset_id: i64, entry: Entry) -> CoreResult<()> {
        let mut rows = self.rows.lock().unwrap();
        let dataset = rows.get_mut(&dataset_id).ok_or_else(|| CoreError::MissingData(format!("dataset {dataset_id}")))?;
        if dataset.entries.contains_key(&entry.name) {
            return Err(CoreError::AlreadyExists(format!("entry '{}' in dataset {dataset_id}", entry.name)));
        }
        dataset.entries.insert(entry.name.clone(), entry);
        Ok(())
    }

    async fn add_specification(
        &self,
        _session: &mut dyn Session,
        dataset_id: i64,
        binding: SpecificationBinding,
    ) -> CoreResult<()> {
        let mut rows = self.rows.lock().unwrap();
        let dataset = rows.get_mut(&dataset_id).ok_or_else(|| CoreError::MissingData(format!("dataset {dataset_id}")))?;
        if dataset.specifications.contains_key(&binding.name) {
            return Err(CoreError::AlreadyExists(format!(
                "specification '{}' in dataset {dataset_id}",
                binding.name
            )));
        }
        dataset.specifications.insert(binding.name.clone(), binding);
        Ok(())
    }

    async fn get_record_item(
        &self,
        _session: &mut dyn Session,
        dataset_id: i64,
        entry_name: &str,
        spec_name: &str,
    ) -> CoreResult<Option<RecordItem>> {
        let rows = self.rows.lock().unwrap();
        let dataset = rows.get(&dataset_id).ok_or_else(|| CoreError::MissingData(format!("dataset {dataset_id}")))?;
        Ok(dataset.record_items.get(&(entry_name.to_string(), spec_name.to_string())).copied())
    }

    async fn put_record_item(
        &self,
        _session: &mut dyn Session,
        dataset_id: i64,
        entry_name: &str,
        spec_name: &str,
        item: RecordItem,
    ) -> CoreResult<()> {
        let mut rows = self.rows.lock().unwrap();
        let dataset = rows.get_mut(&dataset_id).ok_or_else(|| CoreError::MissingData(format!("dataset {dataset_id}")))?;
        dataset
            .record_items
            .entry((entry_name.to_string(), spec_name.to_string()))
            .or_insert(item);
        Ok(())
    }

    async fn list_record_items(
        &self,
        _session: &mut dyn Session,
        dataset_id: i64,
    ) -> CoreResult<Vec<((String, String), RecordItem)>> {
        let rows = self.rows.lock().unwrap();
        let dataset = rows.get(&dataset_id).ok_or_else(|| CoreError::MissingData(format!("dataset {dataset_id}")))?;
        Ok(dataset.record_items.iter().map(|(k, v)| (k.clone(), *v)).collect())
    }

    async fn remove_entry(&self, _session: &mut dyn Session, dataset_id: i64, name: &str) -> CoreResult<()> {
        let mut rows = self.rows.lock().unwrap();
        let dataset = rows.get_mut(&dataset_id).ok_or_else(|| CoreError::MissingData(format!("dataset {dataset_id}")))?;
        dataset.entries.shift_remove(name);
        Ok(())
    }

    async fn remove_specification(&self, _session: &mut dyn Session, dataset_id: i64, name: &str) -> CoreResult<()> {
        let mut rows = self.rows.lock().unwrap();
        let dataset = rows.get_mut(&dataset_id).ok_or_else(|| CoreError::MissingData(format!("dataset {dataset_id}")))?;
        dataset.specifications.shift_remove(name);
        Ok(())
    }

    async fn rename_entry(&self, _session: &mut dyn Session, dataset_id: i64, old_name: &str, new_name: &str) -> CoreResult<()> {
        let mut rows = self.rows.lock().unwrap();
        let dataset = rows.get_mut(&dataset_id).ok_or_else(|| CoreError::MissingData(format!("dataset {dataset_id}")))?;
        let mut entry = dataset
            .entries
            .shift_remove(old_name)
            .ok_or_else(|| CoreError::MissingData(format!("entry '{old_name}' in dataset {dataset_id}")))?;
        entry.name = new_name.to_string();
        dataset.entries.insert(new_name.to_string(), entry);
        Ok(())
    }

    async fn rename_specification(&self, _session: &mut dyn Session, dataset_id: i64, old_name: &str, new_name: &str) -> CoreResult<()> {
        let mut rows = self.rows.lock().unwrap();
        let dataset = rows.get_mut(&dataset_id).ok_or_else(|| CoreError::MissingData(format!("dataset {dataset_id}")))?;
        let mut binding = dataset
            .specifications
            .shift_remove(old_name)
            .ok_or_else(|| CoreError::MissingData(format!("specification '{old_name}' in dataset {dataset_id}")))?;
        binding.name = new_name.to_string();
        dataset.specifications.insert(new_name.to_string(), binding);
        Ok(())
    }

    async fn remove_record_item(&self, _session: &mut dyn Session, dataset_id: i64, entry_name: &str, spec_name: &str) -> CoreResult<()> {
        let mut rows = self.rows.lock().unwrap();
        let dataset = rows.get_mut(&dataset_id).ok_or_else(|| CoreError::MissingData(format!("dataset {dataset_id}")))?;
        dataset.record_items.shift_remove(&(entry_name.to_string(), spec_name.to_string()));
        Ok(())
    }

    async fn find_record_items_by_record_ids(
        &self,
        _session: &mut dyn Session,
        record_ids: &[i64],
    ) -> CoreResult<Vec<DatasetRecordItemRef>> {
        let rows = self.rows.lock().unwrap();
        let mut hits = Vec::new();
        for dataset in rows.values() {
            for ((entry_name, spec_name), item) in &dataset.record_items {
                if record_ids.contains(&item.record_id) {
                    hits.push(DatasetRecordItemRef {
                        dataset_id: dataset.id,
                        entry_name: entry_name.clone(),
                        spec_name: spec_name.clone(),
                        record_id: item.record_id,
                    });
                }
            }
        }
        Ok(hits)
    }
}

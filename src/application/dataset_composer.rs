//! C6: fans a dataset's entry × specification matrix out into records,
//! deduping against existing record items (§4.6).

use std::collections::HashMap;
use std::sync::Arc;

use serde_json::Value;
use tracing::{info, instrument};

use crate::domain::error::{CoreError, CoreResult};
use crate::domain::models::dataset::{DatasetRecordItemRef, Entry, RecordItem, SpecificationBinding};
use crate::domain::models::{Dataset, RecordKind, Specification};
use crate::domain::ports::{DatasetRepository, Session};

use super::record_store::RecordStore;
use super::service_queue::ServiceQueue;

pub struct DatasetComposer {
    datasets: Arc<dyn DatasetRepository>,
    record_store: Arc<RecordStore>,
    service_queue: Arc<ServiceQueue>,
}

/// How many new record items a submission pass actually created versus
/// how many already existed (§4.6 dedup rule).
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SubmitSummary {
    pub created: usize,
    pub existing: usize,
}

/// Per-call outcome for a bulk add of entries or specifications: how
/// many bound cleanly versus were skipped for an existing name (§4.6).
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct AddSummary {
    pub added: usize,
    pub skipped: usize,
}

/// Outcome of a bulk delete: record items always removed; underlying
/// records only when `delete_records` was requested (§4.6).
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DeleteSummary {
    pub record_items_removed: usize,
    pub records_hard_deleted: usize,
}

/// `spec-name -> status -> count`, per §4.6 `status`.
pub type DatasetStatus = HashMap<String, HashMap<String, usize>>;

impl DatasetComposer {
    pub fn new(datasets: Arc<dyn DatasetRepository>, record_store: Arc<RecordStore>, service_queue: Arc<ServiceQueue>) -> Self {
        Self { datasets, record_store, service_queue }
    }

    /// Create a new dataset, unique on `(kind, lower(name))` (§4.6).
    #[instrument(skip(self, session, metadata))]
    pub async fn add(&self, session: &mut dyn Session, kind: RecordKind, name: impl Into<String>, metadata: Value) -> CoreResult<Dataset> {
        let mut dataset = Dataset::new(0, kind, name.into());
        dataset.metadata = metadata;
        self.datasets.create(session, dataset).await
    }

    /// Binds `entries` onto `dataset_id`, skipping any whose name is
    /// already taken (§4.6).
    #[instrument(skip(self, session, entries))]
    pub async fn add_entries(&self, session: &mut dyn Session, dataset_id: i64, entries: Vec<Entry>) -> CoreResult<AddSummary> {
        let mut summary = AddSummary::default();
        for entry in entries {
            match self.datasets.add_entry(session, dataset_id, entry).await {
                Ok(()) => summary.added += 1,
                Err(err) if matches!(err, CoreError::AlreadyExists(_)) => summary.skipped += 1,
                Err(err) => return Err(err),
            }
        }
        Ok(summary)
    }

    /// Interns each `(name, specification)` pair's content against the
    /// global specification table, then binds it under `name`;
    /// `already-exists` on a name conflict within the dataset (§4.6).
    #[instrument(skip(self, session, specifications))]
    pub async fn add_specifications(
        &self,
        session: &mut dyn Session,
        dataset_id: i64,
        specifications: Vec<(String, Specification)>,
    ) -> CoreResult<AddSummary> {
        let mut summary = AddSummary::default();
        for (name, specification) in specifications {
            let interned = self.record_store.intern_specification(session, specification).await?;
            let binding = SpecificationBinding {
                name: name.clone(),
                specification_id: interned.id.ok_or_else(|| CoreError::internal("interned specification missing id"))?,
                description: Value::Null,
            };
            match self.datasets.add_specification(session, dataset_id, binding).await {
                Ok(()) => summary.added += 1,
                Err(err) if matches!(err, CoreError::AlreadyExists(_)) => summary.skipped += 1,
                Err(err) => return Err(err),
            }
        }
        Ok(summary)
    }

    /// Removes `names` from `dataset_id`'s entry catalogue, cascading to
    /// any record items keyed by that entry (§4.6).
    #[instrument(skip(self, session, names))]
    pub async fn delete_entries(&self, session: &mut dyn Session, dataset_id: i64, names: &[String], delete_records: bool) -> CoreResult<DeleteSummary> {
        let items = self.datasets.list_record_items(session, dataset_id).await?;
        let matching: Vec<(String, String)> = items
            .into_iter()
            .filter(|((entry_name, _), _)| names.contains(entry_name))
            .map(|(key, _)| key)
            .collect();
        let summary = self.delete_record_item_pairs(session, dataset_id, &matching, delete_records).await?;
        for name in names {
            self.datasets.remove_entry(session, dataset_id, name).await?;
        }
        Ok(summary)
    }

    /// Removes `names` from `dataset_id`'s specification catalogue,
    /// cascading to any record items keyed by that specification (§4.6).
    #[instrument(skip(self, session, names))]
    pub async fn delete_specifications(
        &self,
        session: &mut dyn Session,
        dataset_id: i64,
        names: &[String],
        delete_records: bool,
    ) -> CoreResult<DeleteSummary> {
        let items = self.datasets.list_record_items(session, dataset_id).await?;
        let matching: Vec<(String, String)> = items
            .into_iter()
            .filter(|((_, spec_name), _)| names.contains(spec_name))
            .map(|(key, _)| key)
            .collect();
        let summary = self.delete_record_item_pairs(session, dataset_id, &matching, delete_records).await?;
        for name in names {
            self.datasets.remove_specification(session, dataset_id, name).await?;
        }
        Ok(summary)
    }

    /// Removes exactly the given `(entry_name, spec_name)` record items;
    /// when `delete_records` is set, hard-deletes the orphaned record
    /// behind each removed item (§4.6).
    #[instrument(skip(self, session, pairs))]
    pub async fn delete_record_items(
        &self,
        session: &mut dyn Session,
        dataset_id: i64,
        pairs: &[(String, String)],
        delete_records: bool,
    ) -> CoreResult<DeleteSummary> {
        self.delete_record_item_pairs(session, dataset_id, pairs, delete_records).await
    }

    async fn delete_record_item_pairs(
        &self,
        session: &mut dyn Session,
        dataset_id: i64,
        pairs: &[(String, String)],
        delete_records: bool,
    ) -> CoreResult<DeleteSummary> {
        let mut summary = DeleteSummary::default();
        for (entry_name, spec_name) in pairs {
            let item = self.datasets.get_record_item(session, dataset_id, entry_name, spec_name).await?;
            self.datasets.remove_record_item(session, dataset_id, entry_name, spec_name).await?;
            summary.record_items_removed += 1;
            if delete_records {
                if let Some(item) = item {
                    self.record_store.hard_delete(session, item.record_id).await?;
                    summary.records_hard_deleted += 1;
                }
            }
        }
        Ok(summary)
    }

    /// Renames entries in place; rejects if any `new_name` is already
    /// taken (§4.6).
    #[instrument(skip(self, session, renames))]
    pub async fn rename_entries(&self, session: &mut dyn Session, dataset_id: i64, renames: &[(String, String)]) -> CoreResult<usize> {
        let dataset = self.datasets.get(session, dataset_id).await?;
        for (_, new_name) in renames {
            if dataset.entries.contains_key(new_name) {
                return Err(CoreError::AlreadyExists(format!("entry '{new_name}' in dataset {dataset_id}")));
            }
        }
        for (old_name, new_name) in renames {
            self.datasets.rename_entry(session, dataset_id, old_name, new_name).await?;
        }
        Ok(renames.len())
    }

    /// Renames specification bindings in place; rejects if any
    /// `new_name` is already taken (§4.6).
    #[instrument(skip(self, session, renames))]
    pub async fn rename_specifications(&self, session: &mut dyn Session, dataset_id: i64, renames: &[(String, String)]) -> CoreResult<usize> {
        let dataset = self.datasets.get(session, dataset_id).await?;
        for (_, new_name) in renames {
            if dataset.specifications.contains_key(new_name) {
                return Err(CoreError::AlreadyExists(format!("specification '{new_name}' in dataset {dataset_id}")));
            }
        }
        for (old_name, new_name) in renames {
            self.datasets.rename_specification(session, dataset_id, old_name, new_name).await?;
        }
        Ok(renames.len())
    }

    /// Record-status counts bucketed by specification name (§4.6).
    #[instrument(skip(self, session))]
    pub async fn status(&self, session: &mut dyn Session, dataset_id: i64) -> CoreResult<DatasetStatus> {
        let items = self.datasets.list_record_items(session, dataset_id).await?;
        let mut status: DatasetStatus = HashMap::new();
        for ((_, spec_name), item) in items {
            let record = self.record_store.get(session, item.record_id).await?;
            *status.entry(spec_name).or_default().entry(record.status.as_str().to_string()).or_insert(0) += 1;
        }
        Ok(status)
    }

    /// For each of `record_ids`, every `(dataset, entry_name, spec_name)`
    /// tuple pointing at it — a record may belong to many datasets due
    /// to dedup (§4.6, §8 scenario 1).
    #[instrument(skip(self, session, record_ids))]
    pub async fn query_dataset_records(&self, session: &mut dyn Session, record_ids: &[i64]) -> CoreResult<Vec<DatasetRecordItemRef>> {
        self.datasets.find_record_items_by_record_ids(session, record_ids).await
    }

    /// Submit the cartesian product of `entry_names × spec_names` for
    /// `dataset_id`: for each pair with no existing record item, create
    /// (or dedup-reuse) the matching record and file it under the pair
    /// (§4.6).
    #[instrument(skip(self, session, entry_names, spec_names))]
    pub async fn submit(
        &self,
        session: &mut dyn Session,
        dataset_id: i64,
        entry_names: &[String],
        spec_names: &[String],
        owner: impl Into<String>,
        tag: impl Into<String>,
        priority: i32,
    ) -> CoreResult<SubmitSummary> {
        let dataset = self.datasets.get(session, dataset_id).await?;
        let owner = owner.into();
        let tag = tag.into();
        let mut summary = SubmitSummary::default();

        for entry_name in entry_names {
            let entry = dataset
                .entries
                .get(entry_name)
                .ok_or_else(|| CoreError::MissingData(format!("dataset {dataset_id} has no entry '{entry_name}'")))?;

            for spec_name in spec_names {
                let binding = dataset.specifications.get(spec_name).ok_or_else(|| {
                    CoreError::MissingData(format!("dataset {dataset_id} has no specification '{spec_name}'"))
                })?;

                if self
                    .datasets
                    .get_record_item(session, dataset_id, entry_name, spec_name)
                    .await?
                    .is_some()
                {
                    summary.existing += 1;
                    continue;
                }

                let record_id = if dataset.kind.is_atomic() {
                    self.record_store
                        .submit_atomic(
                            session,
                            dataset.kind,
                            binding.specification_id,
                            vec![entry.molecule_id],
                            owner.clone(),
                            priority,
                            tag.clone(),
                            Vec::new(),
                            dataset.kind.as_str(),
                            Value::Null,
                        )
                        .await?
                        .into_record()
                        .id
                } else {
                    self.service_queue
                        .submit_service(
                            session,
                            dataset.kind,
                            binding.specification_id,
                            vec![entry.molecule_id],
                            owner.clone(),
                            priority,
                            tag.clone(),
                        )
                        .await?
                        .id
                };

                self.datasets
                    .put_record_item(session, dataset_id, entry_name, spec_name, RecordItem { record_id })
                    .await?;
                summary.created += 1;
            }
        }

        info!(dataset_id, created = summary.created, existing = summary.existing, "dataset submission complete");
        Ok(summary)
    }
}

//! C6 port: datasets, their entry/specification catalogues and the
//! record-item matrix (§4.6).

use async_trait::async_trait;

use crate::domain::error::CoreResult;
use crate::domain::models::dataset::{DatasetKey, DatasetRecordItemRef, Entry, RecordItem, SpecificationBinding};
use crate::domain::models::Dataset;

use super::session::Session;

#[async_trait]
pub trait DatasetRepository: Send + Sync {
    async fn create(&self, session: &mut dyn Session, dataset: Dataset) -> CoreResult<Dataset>;

    async fn get(&self, session: &mut dyn Session, id: i64) -> CoreResult<Dataset>;

    async fn get_by_key(
        &self,
        session: &mut dyn Session,
        key: DatasetKey,
    ) -> CoreResult<Option<Dataset>>;

    async fn add_entry(
        &self,
        session: &mut dyn Session,
        dataset_id: i64,
        entry: Entry,
    ) -> CoreResult<()>;

    async fn add_specification(
        &self,
        session: &mut dyn Session,
        dataset_id: i64,
        binding: SpecificationBinding,
    ) -> CoreResult<()>;

    /// Removes an entry by name; a no-op if it was never bound (§4.6
    /// delete-entries).
    async fn remove_entry(&self, session: &mut dyn Session, dataset_id: i64, name: &str) -> CoreResult<()>;

    /// Removes a specification binding by name (§4.6 delete-specifications).
    async fn remove_specification(&self, session: &mut dyn Session, dataset_id: i64, name: &str) -> CoreResult<()>;

    /// Renames an entry in place, leaving existing record items under
    /// the old name orphaned until re-keyed by the caller (§4.6
    /// rename-entries).
    async fn rename_entry(&self, session: &mut dyn Session, dataset_id: i64, old_name: &str, new_name: &str) -> CoreResult<()>;

    /// Renames a specification binding in place (§4.6 rename-specifications).
    async fn rename_specification(&self, session: &mut dyn Session, dataset_id: i64, old_name: &str, new_name: &str) -> CoreResult<()>;

    /// Removes a single `(entry_name, spec_name)` record-item mapping.
    /// Does not touch the pointed-to record; callers decide whether to
    /// also hard-delete it (§4.6 delete-record-items).
    async fn remove_record_item(&self, session: &mut dyn Session, dataset_id: i64, entry_name: &str, spec_name: &str) -> CoreResult<()>;

    /// Every `(dataset, entry_name, spec_name)` slot across all datasets
    /// that points at one of `record_ids` (§8 scenario 1:
    /// `query-dataset-records`).
    async fn find_record_items_by_record_ids(
        &self,
        session: &mut dyn Session,
        record_ids: &[i64],
    ) -> CoreResult<Vec<DatasetRecordItemRef>>;

    async fn get_record_item(
        &self,
        session: &mut dyn Session,
        dataset_id: i64,
        entry_name: &str,
        spec_name: &str,
    ) -> CoreResult<Option<RecordItem>>;

    /// Idempotent: re-submitting the same `(entry_name, spec_name)` pair
    /// is a no-op once a record item exists (§4.6 dedup rule).
    async fn put_record_item(
        &self,
        session: &mut dyn Session,
        dataset_id: i64,
        entry_name: &str,
        spec_name: &str,
        item: RecordItem,
    ) -> CoreResult<()>;

    async fn list_record_items(
        &self,
        session: &mut dyn Session,
        dataset_id: i64,
    ) -> CoreResult<Vec<((String, String), RecordItem)>>;
}

//! Postgres [`DatasetRepository`] (§4.6).

use async_trait::async_trait;
use sqlx::Row;

use crate::domain::error::{CoreError, CoreResult};
use crate::domain::models::dataset::{DatasetKey, DatasetRecordItemRef, Entry, RecordItem, SpecificationBinding};
use crate::domain::models::{Dataset, RecordKind};
use crate::domain::ports::{DatasetRepository, Session};

use super::session::PgSession;

pub struct PgDatasetRepository;

async fn load_dataset(tx: &mut sqlx::Transaction<'static, sqlx::Postgres>, id: i64) -> CoreResult<Dataset> {
    let row = sqlx::query("SELECT * FROM dataset WHERE id = $1").bind(id).fetch_one(&mut **tx).await?;
    let kind_str: String = row.try_get("kind")?;
    let kind = RecordKind::from_str(&kind_str)
        .ok_or_else(|| crate::domain::error::CoreError::internal(format!("unknown record kind '{kind_str}'")))?;

    let mut dataset = Dataset::new(row.try_get("id")?, kind, row.try_get::<String, _>("name")?);
    dataset.default_tag = row.try_get("default_tag")?;
    dataset.default_priority = row.try_get("default_priority")?;
    dataset.metadata = row.try_get("metadata")?;

    let entry_rows = sqlx::query("SELECT name, molecule_id, metadata FROM dataset_entry WHERE dataset_id = $1")
        .bind(id)
        .fetch_all(&mut **tx)
        .await?;
    for row in entry_rows {
        let name: String = row.try_get("name")?;
        dataset.entries.insert(
            name.clone(),
            Entry { name, molecule_id: row.try_get("molecule_id")?, metadata: row.try_get("metadata")? },
        );
    }

    let spec_rows = sqlx::query("SELECT name, specification_id, description FROM dataset_specification WHERE dataset_id = $1")
        .bind(id)
        .fetch_all(&mut **tx)
        .await?;
    for row in spec_rows {
        let name: String = row.try_get("name")?;
        dataset.specifications.insert(
            name.clone(),
            SpecificationBinding { name, specification_id: row.try_get("specification_id")?, description: row.try_get("description")? },
        );
    }

    let item_rows = sqlx::query("SELECT entry_name, spec_name, record_id FROM dataset_record_item WHERE dataset_id = $1")
        .bind(id)
        .fetch_all(&mut **tx)
        .await?;
    for row in item_rows {
        let entry_name: String = row.try_get("entry_name")?;
        let spec_name: String = row.try_get("spec_name")?;
        dataset
            .record_items
            .insert((entry_name, spec_name), RecordItem { record_id: row.try_get("record_id")? });
    }

    Ok(dataset)
}

#[async_trait]
impl DatasetRepository for PgDatasetRepository {
    async fn create(&self, session: &mut dyn Session, dataset: Dataset) -> CoreResult<Dataset> {
        let tx = PgSession::executor(session);
        let lowercase_name = dataset.name.to_lowercase();
        let existing = sqlx::query("SELECT 1 FROM dataset WHERE kind = $1 AND lowercase_name = $2")
            .bind(dataset.kind.as_str())
            .bind(&lowercase_name)
            .fetch_optional(&mut **tx)
            .await?;
        if existing.is_some() {
            return Err(CoreError::AlreadyExists(format!("dataset '{}' of kind {}", dataset.name, dataset.kind.as_str())));
        }

        let row = sqlx::query(
            "INSERT INTO dataset (kind, name, lowercase_name, default_tag, default_priority, metadata) \
             VALUES ($1, $2, $3, $4, $5, $6) RETURNING id",
        )
        .bind(dataset.kind.as_str())
        .bind(&dataset.name)
        .bind(&lowercase_name)
        .bind(&dataset.default_tag)
        .bind(dataset.default_priority)
        .bind(&dataset.metadata)
        .fetch_one(&mut **tx)
        .await?;
        Ok(Dataset { id: row.try_get("id")?, ..dataset })
    }

    async fn get(&self, session: &mut dyn Session, id: i64) -> CoreResult<Dataset> {
        let tx = PgSession::executor(session);
        load_dataset(tx, id).await
    }

    async fn get_by_key(&self, session: &mut dyn Session, key: DatasetKey) -> CoreResult<Option<Dataset>> {
        let tx = PgSession::executor(session);
        let row = sqlx::query("SELECT id FROM dataset WHERE kind = $1 AND lowercase_name = $2")
            .bind(key.kind.as_str())
            .bind(&key.lowercase_name)
            .fetch_optional(&mut **tx)
            .await?;
        match row {
            Some(row) => Ok(Some(load_dataset(tx, row.try_get("id")?).await?)),
            None => Ok(None),
        }
    }

    async fn add_entry(&self, session: &mut dyn Session, dataset_id: i64, entry: Entry) -> CoreResult<()> {
        let tx = PgSession::executor(session);
        sqlx::query("INSERT INTO dataset_entry (dataset_id, name, molecule_id, metadata) VALUES ($1, $2, $3, $4)")
            .bind(dataset_id)
            .bind(&entry.name)
            .bind(entry.molecule_id)
            .bind(&entry.metadata)
            .execute(&mut **tx)
            .await?;
        Ok(())
    }

    async fn add_specification(&self, session: &mut dyn Session, dataset_id: i64, binding: SpecificationBinding) -> CoreResult<()> {
        let tx = PgSession::executor(session);
        sqlx::query("INSERT INTO dataset_specification (dataset_id, name, specification_id, description) VALUES ($1, $2, $3, $4)")
            .bind(dataset_id)
            .bind(&binding.name)
            .bind(binding.specification_id)
            .bind(&binding.description)
            .execute(&mut **tx)
            .await?;
        Ok(())
    }

    async fn get_record_item(&self, session: &mut dyn Session, dataset_id: i64, entry_name: &str, spec_name: &str) -> CoreResult<Option<RecordItem>> {
        let tx = PgSession::executor(session);
        let row = sqlx::query("SELECT record_id FROM dataset_record_item WHERE dataset_id = $1 AND entry_name = $2 AND spec_name = $3")
            .bind(dataset_id)
            .bind(entry_name)
            .bind(spec_name)
            .fetch_optional(&mut **tx)
            .await?;
        row.map(|row| -> CoreResult<RecordItem> { Ok(RecordItem { record_id: row.try_get("record_id")? }) }).transpose()
    }

    async fn put_record_item(&self, session: &mut dyn Session, dataset_id: i64, entry_name: &str, spec_name: &str, item: RecordItem) -> CoreResult<()> {
        let tx = PgSession::executor(session);
        sqlx::query(
            "INSERT INTO dataset_record_item (dataset_id, entry_name, spec_name, record_id) VALUES ($1, $2, $3, $4) \
             ON CONFLICT (dataset_id, entry_name, spec_name) DO NOTHING",
        )
        .bind(dataset_id)
        .bind(entry_name)
        .bind(spec_name)
        .bind(item.record_id)
        .execute(&mut **tx)
        .await?;
        Ok(())
    }

    async fn list_record_items(&self, session: &mut dyn Session, dataset_id: i64) -> CoreResult<Vec<((String, String), RecordItem)>> {
        let tx = PgSession::executor(session);
        let rows = sqlx::query("SELECT entry_name, spec_name, record_id FROM dataset_record_item WHERE dataset_id = $1")
            .bind(dataset_id)
            .fetch_all(&mut **tx)
            .await?;
        rows.into_iter()
            .map(|row| -> CoreResult<((String, String), RecordItem)> {
                Ok(((row.try_get("entry_name")?, row.try_get("spec_name")?), RecordItem { record_id: row.try_get("record_id")? }))
            })
            .collect()
    }

    async fn remove_entry(&self, session: &mut dyn Session, dataset_id: i64, name: &str) -> CoreResult<()> {
        let tx = PgSession::executor(session);
        sqlx::query("DELETE FROM dataset_entry WHERE dataset_id = $1 AND name = $2")
            .bind(dataset_id)
            .bind(name)
            .execute(&mut **tx)
            .await?;
        Ok(())
    }

    async fn remove_specification(&self, session: &mut dyn Session, dataset_id: i64, name: &str) -> CoreResult<()> {
        let tx = PgSession::executor(session);
        sqlx::query("DELETE FROM dataset_specification WHERE dataset_id = $1 AND name = $2")
            .bind(dataset_id)
            .bind(name)
            .execute(&mut **tx)
            .await?;
        Ok(())
    }

    async fn rename_entry(&self, session: &mut dyn Session, dataset_id: i64, old_name: &str, new_name: &str) -> CoreResult<()> {
        let tx = PgSession::executor(session);
        sqlx::query("UPDATE dataset_entry SET name = $1 WHERE dataset_id = $2 AND name = $3")
            .bind(new_name)
            .bind(dataset_id)
            .bind(old_name)
            .execute(&mut **tx)
            .await?;
        Ok(())
    }

    async fn rename_specification(&self, session: &mut dyn Session, dataset_id: i64, old_name: &str, new_name: &str) -> CoreResult<()> {
        let tx = PgSession::executor(session);
        sqlx::query("UPDATE dataset_specification SET name = $1 WHERE dataset_id = $2 AND name = $3")
            .bind(new_name)
            .bind(dataset_id)
            .bind(old_name)
            .execute(&mut **tx)
            .await?;
        Ok(())
    }

    async fn remove_record_item(&self, session: &mut dyn Session, dataset_id: i64, entry_name: &str, spec_name: &str) -> CoreResult<()> {
        let tx = PgSession::executor(session);
        sqlx::query("DELETE FROM dataset_record_item WHERE dataset_id = $1 AND entry_name = $2 AND spec_name = $3")
            .bind(dataset_id)
            .bind(entry_name)
            .bind(spec_name)
            .execute(&mut **tx)
            .await?;
        Ok(())
    }

    async fn find_record_items_by_record_ids(&self, session: &mut dyn Session, record_ids: &[i64]) -> CoreResult<Vec<DatasetRecordItemRef>> {
        let tx = PgSession::executor(session);
        let rows = sqlx::query("SELECT dataset_id, entry_name, spec_name, record_id FROM dataset_record_item WHERE record_id = ANY($1)")
            .bind(record_ids)
            .fetch_all(&mut **tx)
            .await?;
        rows.into_iter()
            .map(|row| -> CoreResult<DatasetRecordItemRef> {
                Ok(DatasetRecordItemRef {
                    dataset_id: row.try_get("dataset_id")?,
                    entry_name: row.try_get("entry_name")?,
                    spec_name: row.try_get("spec_name")?,
                    record_id: row.try_get("record_id")?,
                })
            })
            .collect()
    }
}

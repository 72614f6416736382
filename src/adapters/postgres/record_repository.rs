//! Postgres [`RecordRepository`] (§4.1, §4.3).

use async_trait::async_trait;
use serde_json::Value;
use sqlx::Row;

use crate::domain::error::{CoreError, CoreResult};
use crate::domain::models::compute_history::{Attempt, StreamKind};
use crate::domain::models::{Record, RecordKind, RecordStatus};
use crate::domain::ports::{RecordRepository, Session};

use super::session::PgSession;

pub struct PgRecordRepository;

fn row_to_record(row: &sqlx::postgres::PgRow) -> CoreResult<Record> {
    let kind_str: String = row.try_get("kind")?;
    let status_str: String = row.try_get("status")?;
    let pre_delete_status_str: Option<String> = row.try_get("pre_delete_status")?;
    let molecule_ids: Value = row.try_get("molecule_ids")?;

    Ok(Record {
        id: row.try_get("id")?,
        kind: RecordKind::from_str(&kind_str).ok_or_else(|| CoreError::internal(format!("unknown record kind '{kind_str}'")))?,
        status: RecordStatus::from_str(&status_str)
            .ok_or_else(|| CoreError::internal(format!("unknown record status '{status_str}'")))?,
        pre_delete_status: pre_delete_status_str.and_then(|s| RecordStatus::from_str(&s)),
        specification_id: row.try_get("specification_id")?,
        molecule_ids: serde_json::from_value(molecule_ids)?,
        created_at: row.try_get("created_at")?,
        modified_at: row.try_get("modified_at")?,
        owner: row.try_get("owner")?,
        priority: row.try_get("priority")?,
        tag: row.try_get("tag")?,
        comment: row.try_get("comment")?,
        provenance: row.try_get("provenance")?,
        retry_count: {
            let count: i32 = row.try_get("retry_count")?;
            count as u32
        },
        properties: row.try_get("properties")?,
        compute_history: {
            let history: Value = row.try_get("compute_history")?;
            serde_json::from_value(history)?
        },
    })
}

#[async_trait]
impl RecordRepository for PgRecordRepository {
    async fn create(&self, session: &mut dyn Session, record: Record) -> CoreResult<Record> {
        let tx = PgSession::executor(session);
        let molecule_ids = serde_json::to_value(&record.molecule_ids)?;
        let compute_history = serde_json::to_value(&record.compute_history)?;
        let row = sqlx::query(
            "INSERT INTO record (kind, status, specification_id, molecule_ids, created_at, modified_at, owner, priority, tag, comment, provenance, retry_count, properties, compute_history) \
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14) RETURNING *",
        )
        .bind(record.kind.as_str())
        .bind(record.status.as_str())
        .bind(record.specification_id)
        .bind(molecule_ids)
        .bind(record.created_at)
        .bind(record.modified_at)
        .bind(&record.owner)
        .bind(record.priority)
        .bind(&record.tag)
        .bind(&record.comment)
        .bind(&record.provenance)
        .bind(record.retry_count as i32)
        .bind(&record.properties)
        .bind(compute_history)
        .fetch_one(&mut **tx)
        .await?;
        row_to_record(&row)
    }

    async fn get(&self, session: &mut dyn Session, id: i64) -> CoreResult<Record> {
        let tx = PgSession::executor(session);
        let row = sqlx::query("SELECT * FROM record WHERE id = $1").bind(id).fetch_one(&mut **tx).await?;
        row_to_record(&row)
    }

    async fn find_by_dedup_key(
        &self,
        session: &mut dyn Session,
        kind: RecordKind,
        specification_id: i64,
        molecule_ids: &[i64],
    ) -> CoreResult<Option<Record>> {
        let mut wanted = molecule_ids.to_vec();
        wanted.sort_unstable();
        let tx = PgSession::executor(session);
        // A candidate matches when its own molecule id set, sorted, is
        // identical to the requested one; compared as JSONB arrays built
        // in sorted order on both sides (§4.1).
        let rows = sqlx::query(
            "SELECT * FROM record WHERE kind = $1 AND specification_id = $2 AND status != 'deleted'",
        )
        .bind(kind.as_str())
        .bind(specification_id)
        .fetch_all(&mut **tx)
        .await?;

        for row in rows {
            let record = row_to_record(&row)?;
            let mut ids = record.molecule_ids.clone();
            ids.sort_unstable();
            if ids == wanted {
                return Ok(Some(record));
            }
        }
        Ok(None)
    }

    async fn update_status(&self, session: &mut dyn Session, id: i64, status: RecordStatus) -> CoreResult<()> {
        let tx = PgSession::executor(session);
        sqlx::query("UPDATE record SET status = $1, modified_at = now() WHERE id = $2")
            .bind(status.as_str())
            .bind(id)
            .execute(&mut **tx)
            .await?;
        Ok(())
    }

    async fn set_properties(&self, session: &mut dyn Session, id: i64, properties: Value) -> CoreResult<()> {
        let tx = PgSession::executor(session);
        sqlx::query("UPDATE record SET properties = $1 WHERE id = $2")
            .bind(properties)
            .bind(id)
            .execute(&mut **tx)
            .await?;
        Ok(())
    }

    async fn increment_retry(&self, session: &mut dyn Session, id: i64) -> CoreResult<u32> {
        let tx = PgSession::executor(session);
        let row = sqlx::query("UPDATE record SET retry_count = retry_count + 1 WHERE id = $1 RETURNING retry_count")
            .bind(id)
            .fetch_one(&mut **tx)
            .await?;
        let count: i32 = row.try_get("retry_count")?;
        Ok(count as u32)
    }

    async fn soft_delete(&self, session: &mut dyn Session, id: i64) -> CoreResult<()> {
        let tx = PgSession::executor(session);
        sqlx::query("UPDATE record SET pre_delete_status = status, status = 'deleted' WHERE id = $1")
            .bind(id)
            .execute(&mut **tx)
            .await?;
        Ok(())
    }

    async fn undelete(&self, session: &mut dyn Session, id: i64) -> CoreResult<()> {
        let tx = PgSession::executor(session);
        sqlx::query("UPDATE record SET status = COALESCE(pre_delete_status, 'waiting'), pre_delete_status = NULL WHERE id = $1")
            .bind(id)
            .execute(&mut **tx)
            .await?;
        Ok(())
    }

    async fn hard_delete(&self, session: &mut dyn Session, id: i64) -> CoreResult<()> {
        let tx = PgSession::executor(session);
        sqlx::query("DELETE FROM record WHERE id = $1").bind(id).execute(&mut **tx).await?;
        Ok(())
    }

    async fn update_metadata(
        &self,
        session: &mut dyn Session,
        id: i64,
        tag: Option<String>,
        priority: Option<i32>,
        comment: Option<String>,
    ) -> CoreResult<()> {
        let tx = PgSession::executor(session);
        sqlx::query(
            "UPDATE record SET tag = COALESCE($1, tag), priority = COALESCE($2, priority), \
             comment = COALESCE($3, comment), modified_at = now() WHERE id = $4",
        )
        .bind(tag)
        .bind(priority)
        .bind(comment)
        .bind(id)
        .execute(&mut **tx)
        .await?;
        Ok(())
    }

    async fn list_by_status(&self, session: &mut dyn Session, status: RecordStatus, limit: i64) -> CoreResult<Vec<Record>> {
        let tx = PgSession::executor(session);
        let rows = sqlx::query("SELECT * FROM record WHERE status = $1 ORDER BY priority DESC, created_at ASC LIMIT $2")
            .bind(status.as_str())
            .bind(limit)
            .fetch_all(&mut **tx)
            .await?;
        rows.iter().map(row_to_record).collect()
    }

    async fn open_attempt(&self, session: &mut dyn Session, id: i64, manager_id: &str) -> CoreResult<()> {
        let mut history = self.load_history(session, id).await?;
        history.push(Attempt::open(manager_id));
        self.save_history(session, id, &history).await
    }

    async fn close_attempt(
        &self,
        session: &mut dyn Session,
        id: i64,
        succeeded: bool,
        error_message: Option<String>,
    ) -> CoreResult<()> {
        let mut history = self.load_history(session, id).await?;
        if let Some(attempt) = history.iter_mut().rev().find(|a| a.is_open()) {
            if let Some(message) = error_message {
                attempt.streams.append(StreamKind::Error, &message);
            }
            attempt.close(succeeded);
        }
        self.save_history(session, id, &history).await
    }

    async fn append_stream(&self, session: &mut dyn Session, id: i64, stream: StreamKind, chunk: &str) -> CoreResult<()> {
        let mut history = self.load_history(session, id).await?;
        if let Some(attempt) = history.last_mut() {
            attempt.streams.append(stream, chunk);
        }
        self.save_history(session, id, &history).await
    }
}

impl PgRecordRepository {
    /// Compute history is stored as a single JSONB column rather than a
    /// normalised table (§4.1 Non-goals: no versioned migration chain,
    /// so the row-locking read-modify-write here mirrors the rest of
    /// this adapter's append paths).
    async fn load_history(&self, session: &mut dyn Session, id: i64) -> CoreResult<Vec<Attempt>> {
        let tx = PgSession::executor(session);
        let row = sqlx::query("SELECT compute_history FROM record WHERE id = $1 FOR UPDATE")
            .bind(id)
            .fetch_one(&mut **tx)
            .await?;
        let history: Value = row.try_get("compute_history")?;
        Ok(serde_json::from_value(history)?)
    }

    async fn save_history(&self, session: &mut dyn Session, id: i64, history: &[Attempt]) -> CoreResult<()> {
        let tx = PgSession::executor(session);
        sqlx::query("UPDATE record SET compute_history = $1 WHERE id = $2")
            .bind(serde_json::to_value(history)?)
            .bind(id)
            .execute(&mut **tx)
            .await?;
        Ok(())
    }
}

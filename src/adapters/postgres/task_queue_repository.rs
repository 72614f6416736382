//! Postgres [`TaskQueueRepository`] (§4.2, §5). Claim matching uses
//! `SELECT ... FOR UPDATE SKIP LOCKED` so concurrent managers never
//! contend on, or double-claim, the same row.

use async_trait::async_trait;
use serde_json::Value;
use sqlx::Row;

use crate::domain::error::CoreResult;
use crate::domain::models::task::{ClaimRequest, ClaimState};
use crate::domain::models::Task;
use crate::domain::ports::{Session, TaskQueueRepository};

use super::session::PgSession;

pub struct PgTaskQueueRepository;

fn row_to_task(row: &sqlx::postgres::PgRow) -> CoreResult<Task> {
    let required_programs: Value = row.try_get("required_programs")?;
    let claim_state_str: String = row.try_get("claim_state")?;
    Ok(Task {
        id: row.try_get("id")?,
        record_id: row.try_get("record_id")?,
        required_programs: serde_json::from_value(required_programs)?,
        tag: row.try_get("tag")?,
        priority: row.try_get("priority")?,
        function: row.try_get("function")?,
        function_kwargs: row.try_get("function_kwargs")?,
        created_at: row.try_get("created_at")?,
        claim_state: if claim_state_str == "running" { ClaimState::Running } else { ClaimState::Waiting },
        claim_manager_id: row.try_get("claim_manager_id")?,
        claim_token: row.try_get("claim_token")?,
        claim_timestamp: row.try_get("claim_timestamp")?,
    })
}

#[async_trait]
impl TaskQueueRepository for PgTaskQueueRepository {
    async fn create_for_record(&self, session: &mut dyn Session, task: Task) -> CoreResult<Task> {
        let tx = PgSession::executor(session);
        let required_programs = serde_json::to_value(&task.required_programs)?;
        let row = sqlx::query(
            "INSERT INTO task (record_id, required_programs, tag, priority, function, function_kwargs, created_at, claim_state) \
             VALUES ($1, $2, $3, $4, $5, $6, $7, 'waiting') RETURNING *",
        )
        .bind(task.record_id)
        .bind(required_programs)
        .bind(&task.tag)
        .bind(task.priority)
        .bind(&task.function)
        .bind(&task.function_kwargs)
        .bind(task.created_at)
        .fetch_one(&mut **tx)
        .await?;
        row_to_task(&row)
    }

    async fn get_by_record(&self, session: &mut dyn Session, record_id: i64) -> CoreResult<Option<Task>> {
        let tx = PgSession::executor(session);
        let row = sqlx::query("SELECT * FROM task WHERE record_id = $1").bind(record_id).fetch_optional(&mut **tx).await?;
        row.as_ref().map(row_to_task).transpose()
    }

    async fn claim(&self, session: &mut dyn Session, request: ClaimRequest) -> CoreResult<Vec<Task>> {
        let tx = PgSession::executor(session);
        let tags: Vec<String> = request.tags;
        let programs: Vec<String> = request.programs;

        let rows = sqlx::query(
            "SELECT * FROM task \
             WHERE claim_state = 'waiting' \
               AND (tag = ANY($1) OR $1 @> ARRAY['*']::text[] OR '*' = ANY($1)) \
               AND required_programs <@ to_jsonb($2::text[]) \
             ORDER BY priority DESC, created_at ASC \
             LIMIT $3 \
             FOR UPDATE SKIP LOCKED",
        )
        .bind(&tags)
        .bind(&programs)
        .bind(request.limit as i64)
        .fetch_all(&mut **tx)
        .await?;

        let mut claimed = Vec::with_capacity(rows.len());
        for row in &rows {
            let id: i64 = row.try_get("id")?;
            let claim_token = uuid::Uuid::new_v4();
            let updated = sqlx::query(
                "UPDATE task SET claim_state = 'running', claim_manager_id = $1, claim_token = $2, claim_timestamp = now() \
                 WHERE id = $3 RETURNING *",
            )
            .bind(&request.manager_id)
            .bind(claim_token)
            .bind(id)
            .fetch_one(&mut **tx)
            .await?;
            claimed.push(row_to_task(&updated)?);
        }
        Ok(claimed)
    }

    async fn heartbeat(&self, session: &mut dyn Session, manager_id: &str) -> CoreResult<()> {
        let tx = PgSession::executor(session);
        sqlx::query("UPDATE task SET claim_timestamp = now() WHERE claim_manager_id = $1 AND claim_state = 'running'")
            .bind(manager_id)
            .execute(&mut **tx)
            .await?;
        Ok(())
    }

    async fn release_lost_claims(&self, session: &mut dyn Session, lost_after_seconds: u64) -> CoreResult<Vec<i64>> {
        let tx = PgSession::executor(session);
        let rows = sqlx::query(
            "UPDATE task SET claim_state = 'waiting', claim_manager_id = NULL, claim_token = NULL, claim_timestamp = NULL \
             WHERE claim_state = 'running' AND claim_timestamp < now() - make_interval(secs => $1) \
             RETURNING record_id",
        )
        .bind(lost_after_seconds as f64)
        .fetch_all(&mut **tx)
        .await?;
        rows.iter().map(|r| r.try_get::<i64, _>("record_id").map_err(Into::into)).collect()
    }

    async fn release(&self, session: &mut dyn Session, task_id: i64) -> CoreResult<()> {
        let tx = PgSession::executor(session);
        sqlx::query("UPDATE task SET claim_state = 'waiting', claim_manager_id = NULL, claim_token = NULL, claim_timestamp = NULL WHERE id = $1")
            .bind(task_id)
            .execute(&mut **tx)
            .await?;
        Ok(())
    }

    async fn delete_for_record(&self, session: &mut dyn Session, record_id: i64) -> CoreResult<()> {
        let tx = PgSession::executor(session);
        sqlx::query("DELETE FROM task WHERE record_id = $1").bind(record_id).execute(&mut **tx).await?;
        Ok(())
    }
}

//! Postgres [`ServiceRepository`] (§4.4). Dependencies live in the
//! `service_dependency` junction table (Design Note 4), never as an
//! in-memory back-pointer.

use async_trait::async_trait;
use serde_json::Value;
use sqlx::Row;

use crate::domain::error::{CoreError, CoreResult};
use crate::domain::models::record::RecordStatus;
use crate::domain::models::service::Dependency;
use crate::domain::models::Service;
use crate::domain::ports::{Session, ServiceRepository};

use super::session::PgSession;

pub struct PgServiceRepository;

async fn load_dependencies(
    tx: &mut sqlx::Transaction<'static, sqlx::Postgres>,
    record_id: i64,
) -> CoreResult<Vec<Dependency>> {
    let rows = sqlx::query("SELECT child_record_id, extras FROM service_dependency WHERE service_record_id = $1")
        .bind(record_id)
        .fetch_all(&mut **tx)
        .await?;
    rows.into_iter()
        .map(|row| -> CoreResult<Dependency> {
            Ok(Dependency { child_record_id: row.try_get("child_record_id")?, extras: row.try_get("extras")? })
        })
        .collect()
}

#[async_trait]
impl ServiceRepository for PgServiceRepository {
    async fn create(&self, session: &mut dyn Session, service: Service) -> CoreResult<Service> {
        let tx = PgSession::executor(session);
        sqlx::query("INSERT INTO service (record_id, tag, priority, service_state) VALUES ($1, $2, $3, $4)")
            .bind(service.record_id)
            .bind(&service.tag)
            .bind(service.priority)
            .bind(&service.service_state)
            .execute(&mut **tx)
            .await?;
        Ok(service)
    }

    async fn get(&self, session: &mut dyn Session, record_id: i64) -> CoreResult<Service> {
        let tx = PgSession::executor(session);
        let row = sqlx::query("SELECT * FROM service WHERE record_id = $1").bind(record_id).fetch_one(&mut **tx).await?;
        let dependencies = load_dependencies(tx, record_id).await?;
        Ok(Service {
            record_id: row.try_get("record_id")?,
            tag: row.try_get("tag")?,
            priority: row.try_get("priority")?,
            service_state: row.try_get("service_state")?,
            dependencies,
        })
    }

    async fn save_state(&self, session: &mut dyn Session, record_id: i64, state: Value) -> CoreResult<()> {
        let tx = PgSession::executor(session);
        sqlx::query("UPDATE service SET service_state = $1 WHERE record_id = $2")
            .bind(state)
            .bind(record_id)
            .execute(&mut **tx)
            .await?;
        Ok(())
    }

    async fn set_dependencies(&self, session: &mut dyn Session, record_id: i64, dependencies: Vec<Dependency>) -> CoreResult<()> {
        let tx = PgSession::executor(session);
        sqlx::query("DELETE FROM service_dependency WHERE service_record_id = $1").bind(record_id).execute(&mut **tx).await?;
        for dep in dependencies {
            sqlx::query("INSERT INTO service_dependency (service_record_id, child_record_id, extras) VALUES ($1, $2, $3)")
                .bind(record_id)
                .bind(dep.child_record_id)
                .bind(dep.extras)
                .execute(&mut **tx)
                .await?;
        }
        Ok(())
    }

    async fn list_admissible(&self, session: &mut dyn Session, slots: usize) -> CoreResult<Vec<Service>> {
        let tx = PgSession::executor(session);
        let rows = sqlx::query(
            "SELECT s.* FROM service s JOIN record r ON r.id = s.record_id \
             WHERE r.status IN ('waiting', 'running') \
             ORDER BY s.priority DESC \
             LIMIT $1 FOR UPDATE SKIP LOCKED",
        )
        .bind(slots as i64)
        .fetch_all(&mut **tx)
        .await?;

        let mut services = Vec::with_capacity(rows.len());
        for row in rows {
            let record_id: i64 = row.try_get("record_id")?;
            let dependencies = load_dependencies(tx, record_id).await?;
            services.push(Service {
                record_id,
                tag: row.try_get("tag")?,
                priority: row.try_get("priority")?,
                service_state: row.try_get("service_state")?,
                dependencies,
            });
        }
        Ok(services)
    }

    async fn list_dependency_statuses(&self, session: &mut dyn Session, record_id: i64) -> CoreResult<Vec<(Dependency, RecordStatus)>> {
        let tx = PgSession::executor(session);
        let rows = sqlx::query(
            "SELECT d.child_record_id, d.extras, r.status FROM service_dependency d \
             JOIN record r ON r.id = d.child_record_id WHERE d.service_record_id = $1",
        )
        .bind(record_id)
        .fetch_all(&mut **tx)
        .await?;

        rows.into_iter()
            .map(|row| -> CoreResult<(Dependency, RecordStatus)> {
                let status_str: String = row.try_get("status")?;
                let status = RecordStatus::from_str(&status_str)
                    .ok_or_else(|| CoreError::internal(format!("unknown record status '{status_str}'")))?;
                Ok((Dependency { child_record_id: row.try_get("child_record_id")?, extras: row.try_get("extras")? }, status))
            })
            .collect()
    }

    async fn delete(&self, session: &mut dyn Session, record_id: i64) -> CoreResult<()> {
        let tx = PgSession::executor(session);
        sqlx::query("DELETE FROM service_dependency WHERE service_record_id = $1").bind(record_id).execute(&mut **tx).await?;
        sqlx::query("DELETE FROM service WHERE record_id = $1").bind(record_id).execute(&mut **tx).await?;
        Ok(())
    }

    async fn reference_count(&self, session: &mut dyn Session, child_record_id: i64) -> CoreResult<usize> {
        let tx = PgSession::executor(session);
        let row = sqlx::query("SELECT COUNT(*) AS count FROM service_dependency WHERE child_record_id = $1")
            .bind(child_record_id)
            .fetch_one(&mut **tx)
            .await?;
        let count: i64 = row.try_get("count")?;
        Ok(count as usize)
    }
}

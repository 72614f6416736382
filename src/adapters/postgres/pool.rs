//! Connection pool construction (§5, §6).

use sqlx::postgres::{PgPool, PgPoolOptions};

use crate::domain::error::CoreResult;

/// Opens a pool sized and timed out per `max_connections`/`connect_timeout_seconds`.
pub async fn connect(database_url: &str, max_connections: u32, connect_timeout_seconds: u64) -> CoreResult<PgPool> {
    let pool = PgPoolOptions::new()
        .max_connections(max_connections)
        .acquire_timeout(std::time::Duration::from_secs(connect_timeout_seconds))
        .connect(database_url)
        .await?;
    Ok(pool)
}

/// Applies the embedded schema. Full migration tooling (versioned
/// up/down migrations, a CLI) is a surrounding-collaborator concern the
/// core does not implement; this is the minimal bootstrap the adapter's
/// own integration tests need.
pub async fn apply_schema(pool: &PgPool) -> CoreResult<()> {
    for statement in include_str!("schema.sql").split(';') {
        let statement = statement.trim();
        if statement.is_empty() {
            continue;
        }
        sqlx::query(statement).execute(pool).await?;
    }
    Ok(())
}

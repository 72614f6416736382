//! recordflow daemon entry point.
//!
//! Loads configuration, connects to Postgres, and runs the engine's two
//! iteration loops (the task-claim heartbeat sweep and the service
//! iteration pass) on a fixed tick until interrupted. There is no admin
//! or CLI surface here; that belongs to a surrounding service.

use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use recordflow::adapters::postgres::{
    self, PgMoleculeRepository, PgRecordRepository, PgServiceRepository, PgSessionFactory,
    PgSpecificationRepository, PgTaskQueueRepository,
};
use recordflow::application::drivers::DriverRegistry;
use recordflow::application::{RecordStore, ServiceQueue, TaskQueueService};
use recordflow::domain::ports::SessionFactory;
use recordflow::infrastructure::{config::ConfigLoader, logging};
use tracing::{error, info, instrument};

#[tokio::main]
async fn main() -> Result<()> {
    let config = ConfigLoader::load().context("failed to load configuration")?;
    logging::init(&config.logging).context("failed to initialise logging")?;

    info!(database_url = %config.database.url, "starting recordflow engine");

    let pool = postgres::connect(&config.database.url, config.database.max_connections, config.database.connect_timeout_seconds)
        .await
        .context("failed to connect to database")?;
    postgres::apply_schema(&pool).await.context("failed to apply schema")?;

    let sessions: Arc<dyn SessionFactory> = Arc::new(PgSessionFactory::new(pool));

    let records = Arc::new(PgRecordRepository);
    let specifications = Arc::new(PgSpecificationRepository);
    let molecules = Arc::new(PgMoleculeRepository);
    let tasks = Arc::new(PgTaskQueueRepository);
    let services = Arc::new(PgServiceRepository);

    let record_store = Arc::new(RecordStore::new(records.clone(), specifications.clone(), molecules, tasks.clone(), services.clone()));
    let task_queue = TaskQueueService::new(tasks, record_store.clone(), config.engine.clone());
    let service_queue = ServiceQueue::new(services, records, record_store, specifications, DriverRegistry::with_builtins(), config.engine.clone());

    let mut ticks = tokio::time::interval(Duration::from_secs(config.engine.heartbeat.interval_seconds.max(1)));

    loop {
        tokio::select! {
            _ = ticks.tick() => {
                if let Err(err) = run_iteration(sessions.as_ref(), &task_queue, &service_queue).await {
                    error!(%err, "iteration pass failed");
                }
            }
            _ = tokio::signal::ctrl_c() => {
                info!("shutdown signal received");
                break;
            }
        }
    }

    Ok(())
}

#[instrument(skip_all)]
async fn run_iteration(
    sessions: &dyn SessionFactory,
    task_queue: &TaskQueueService,
    service_queue: &ServiceQueue,
) -> Result<()> {
    let mut session = sessions.begin().await.context("failed to begin session")?;
    let lost = task_queue
        .release_lost_claims(session.as_mut())
        .await
        .context("failed to release lost claims")?;
    if !lost.is_empty() {
        info!(count = lost.len(), "released lost claims");
    }

    let advanced = service_queue.iterate(session.as_mut()).await.context("failed to iterate services")?;
    if advanced > 0 {
        info!(advanced, "service iteration pass");
    }

    session.commit().await.context("failed to commit iteration session")?;
    Ok(())
}

//! FleetBatch Server - Main entry point

use anyhow::Result;
use std::sync::Arc;
use std::time::Duration;
use tracing::info;

use fleetbatch_common::logging::{init_logging, LogConfig};
use fleetbatch_server::{
    api::{self, AppState},
    cache::ArtifactCache,
    config::Config,
    db,
    jobs::JobQueue,
    notify::NotificationHub,
    worker::{self, WorkerContext},
};

#[tokio::main]
async fn main() -> Result<()> {
    // Logging defaults, overridable through LOG_* environment variables
    let log_config = LogConfig::builder()
        .log_file_prefix("fleetbatch-server".to_string())
        .filter_directives(
            "fleetbatch_server=debug,tower_http=debug,axum=info,sqlx=info".to_string(),
        )
        .build();
    let log_config = LogConfig::from_env().unwrap_or(log_config);
    init_logging(&log_config)?;

    info!("Starting FleetBatch Server");

    let config = Config::load()?;
    info!(
        "Configuration loaded - server will bind to {}:{}",
        config.server.host, config.server.port
    );

    let db_pool = db::create_pool(&config.database).await?;
    info!("Database connection pool established");

    sqlx::migrate!("../../migrations")
        .run(&db_pool)
        .await
        .map_err(|e| anyhow::anyhow!("Failed to run migrations: {}", e))?;
    info!("Database migrations completed");

    let queue = JobQueue::new(db_pool.clone());
    let cache = ArtifactCache::new();
    let hub = NotificationHub::new(config.batch.notify_capacity);

    // Sweep expired export artifacts at a fraction of their TTL.
    let sweep_interval = Duration::from_secs((config.batch.export_artifact_ttl_secs / 4).max(1));
    let _sweeper_handle = cache.spawn_sweeper(sweep_interval);

    let _worker_handles = worker::spawn_workers(WorkerContext {
        db: db_pool,
        queue: queue.clone(),
        cache: cache.clone(),
        hub: hub.clone(),
        batch: config.batch.clone(),
    });

    let state = AppState {
        queue,
        cache,
        hub,
        config: Arc::new(config),
    };

    api::serve(state).await
}

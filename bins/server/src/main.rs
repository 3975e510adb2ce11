//! Repgen worker
//!
//! Wires the report service to PostgreSQL, the configured storage backend
//! and the background processor, then runs until interrupted.

use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use repgen_core::processor::BackgroundProcessor;
use repgen_core::service::ReportService;
use repgen_core::storage::{StorageBuilder, StorageConfig};
use repgen_core::JsonReportGenerator;
use repgen_db::{PgReportRepository, connect_with_pool};
use repgen_shared::AppConfig;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load environment variables from .env file
    dotenvy::dotenv().ok();

    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "repgen=debug,repgen_core=debug,repgen_db=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    // Load configuration
    let config = AppConfig::load().context("failed to load configuration")?;

    // Connect to database
    let db = connect_with_pool(
        &config.database.url,
        config.database.max_connections,
        config.database.min_connections,
    )
    .await
    .context("failed to connect to database")?;
    info!("Connected to database");

    // Storage chain: logging -> retry -> validation -> backend
    let storage_config = StorageConfig::from_settings(&config.storage)?;
    info!(
        backend = storage_config.provider.name(),
        max_retries = storage_config.max_retries,
        "Storage configured"
    );
    let presign_ttl = storage_config.presign_ttl;
    let storage = StorageBuilder::new(storage_config).build()?;

    let processor = Arc::new(BackgroundProcessor::new(config.processor.queue_capacity));
    let service = ReportService::new(
        Arc::new(PgReportRepository::new(db)),
        Arc::new(JsonReportGenerator::new()),
        storage,
        Arc::clone(&processor),
    )
    .with_task_timeout(Duration::from_secs(config.processor.task_timeout_secs))
    .with_presign_ttl(presign_ttl);

    processor.start()?;
    info!(
        queue_capacity = config.processor.queue_capacity,
        task_timeout_secs = config.processor.task_timeout_secs,
        "Report worker ready"
    );

    tokio::signal::ctrl_c()
        .await
        .context("failed to listen for shutdown signal")?;
    info!("Shutdown signal received");

    processor.shutdown().await;
    drop(service);

    Ok(())
}

//! Mailqueue Daemon - Main Entry Point
//! Wires the SQLite store, spool sender and notification feed into the dispatcher.

mod config;
mod logging;

use anyhow::{Context, Result};
use std::sync::Arc;
use std::time::Duration;
use tracing::{error, info, warn};

use config::DaemonConfig;
use mailqueue_core::application::{
    shutdown_channel, Dispatcher, EmailQueue, MaintenanceScheduler, RecoveryService,
};
use mailqueue_core::port::id_provider::UuidV4Ids;
use mailqueue_core::port::time_provider::SystemClock;
use mailqueue_core::port::{IdProvider, JobStore, NotificationSink, TimeProvider};
use mailqueue_infra_sqlite::{create_pool, run_migrations, SqliteJobStore, SqliteNotificationSink};
use mailqueue_infra_system::{SpoolSender, TracingNotificationSink};

const VERSION: &str = env!("CARGO_PKG_VERSION");
const SHUTDOWN_GRACE: Duration = Duration::from_secs(10);

#[tokio::main]
async fn main() -> Result<()> {
    // 1. Configuration + logging
    let config = DaemonConfig::from_env();
    let _log_guard = logging::init(&config)?;

    info!("Mailqueue daemon v{} starting...", VERSION);
    for warning in &config.warnings {
        warn!("{}", warning);
    }

    // 2. Database
    if let Some(parent) = config.db_path.parent() {
        tokio::fs::create_dir_all(parent)
            .await
            .with_context(|| format!("Failed to create {}", parent.display()))?;
    }
    let db_url = config.db_path.to_string_lossy();
    info!(db_path = %db_url, "Initializing database...");

    let pool = create_pool(&db_url)
        .await
        .context("DB pool creation failed")?;
    run_migrations(&pool).await.context("Migration failed")?;

    // 3. Dependencies (DI wiring)
    let time_provider: Arc<dyn TimeProvider> = Arc::new(SystemClock);
    let id_provider: Arc<dyn IdProvider> = Arc::new(UuidV4Ids);
    let store: Arc<dyn JobStore> = Arc::new(SqliteJobStore::new(pool.clone()));
    let sink: Arc<dyn NotificationSink> = Arc::new(TracingNotificationSink::wrap(Arc::new(
        SqliteNotificationSink::new(pool.clone(), time_provider.clone()),
    )));
    let sender = Arc::new(
        SpoolSender::open(&config.spool_dir, id_provider.clone(), time_provider.clone())
            .await
            .with_context(|| format!("Failed to open spool {}", config.spool_dir.display()))?,
    );
    info!(spool_dir = %config.spool_dir.display(), "Spool ready");

    // 4. Startup recovery
    let recovery = Arc::new(RecoveryService::new(
        store.clone(),
        time_provider.clone(),
        config.queue.recovery_window_ms,
    ));
    match recovery.recover_stuck_jobs().await {
        Ok(count) => info!(recovered_jobs = count, "Startup recovery completed"),
        Err(e) => error!(error = ?e, "Startup recovery failed"),
    }

    // 5. Background loops
    let (shutdown_tx, shutdown_rx) = shutdown_channel();

    let dispatcher = Dispatcher::new(
        store.clone(),
        sender,
        sink,
        time_provider.clone(),
        &config.queue,
    );
    let dispatcher_handle = tokio::spawn(async move { dispatcher.run(shutdown_rx).await });

    let queue = Arc::new(EmailQueue::new(
        store,
        id_provider,
        time_provider,
        &config.queue,
    ));
    let maintenance = MaintenanceScheduler::new(
        queue,
        config.queue.retention_days,
        config.queue.maintenance_interval,
    )
    .with_recovery(recovery);
    let maintenance_handle = tokio::spawn(maintenance.run(shutdown_tx.token()));

    info!("System ready. Press Ctrl+C to shutdown");

    // 6. Graceful shutdown: loops stop between cycles, never mid-send
    tokio::signal::ctrl_c()
        .await
        .context("Failed to listen for Ctrl+C")?;
    info!("Shutdown signal received. Exiting gracefully...");

    shutdown_tx.shutdown();
    let drained = tokio::time::timeout(SHUTDOWN_GRACE, async {
        let _ = dispatcher_handle.await;
        let _ = maintenance_handle.await;
    })
    .await;
    if drained.is_err() {
        warn!(
            grace_secs = SHUTDOWN_GRACE.as_secs(),
            "Background tasks did not stop in time"
        );
    }

    pool.close().await;
    info!("Shutdown complete.");
    Ok(())
}

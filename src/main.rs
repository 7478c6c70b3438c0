//! ClaimGate fulfillment daemon.
//!
//! Hosts the asynchronous half of the engine: the queued-claim fulfillment
//! worker and the periodic counter reconciler. The synchronous issuance
//! services live in the library crates and are embedded by their callers.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::watch;
use tracing;
use tracing_subscriber::{EnvFilter, fmt};

use claimgate_broker::BrokerManager;
use claimgate_cache::{CacheManager, PendingClaimCache, ResourceSnapshotCache};
use claimgate_coordination::CounterManager;
use claimgate_core::config::AppConfig;
use claimgate_core::error::AppError;
use claimgate_core::traits::broker::IntentBroker;
use claimgate_database::stores::PgResourceStore;
use claimgate_database::{DatabasePool, ResourceStore};
use claimgate_worker::{CounterReconciler, CronScheduler, FulfillmentHandler, FulfillmentRunner};

#[tokio::main]
async fn main() {
    let config = match load_configuration() {
        Ok(c) => c,
        Err(e) => {
            eprintln!("Failed to load configuration: {}", e);
            std::process::exit(1);
        }
    };

    init_logging(&config);

    if let Err(e) = run(config).await {
        tracing::error!("Daemon error: {}", e);
        std::process::exit(1);
    }
}

/// Load configuration for the environment named by CLAIMGATE_ENV
fn load_configuration() -> Result<AppConfig, AppError> {
    let env = std::env::var("CLAIMGATE_ENV").unwrap_or_else(|_| "development".to_string());
    AppConfig::load(&env)
}

/// Initialize tracing/logging
fn init_logging(config: &AppConfig) {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&config.logging.level));

    match config.logging.format.as_str() {
        "json" => {
            fmt()
                .json()
                .with_env_filter(filter)
                .with_target(true)
                .with_thread_ids(true)
                .init();
        }
        _ => {
            fmt()
                .pretty()
                .with_env_filter(filter)
                .with_target(true)
                .init();
        }
    }
}

/// Main daemon run function
async fn run(config: AppConfig) -> Result<(), AppError> {
    tracing::info!("Starting ClaimGate daemon v{}", env!("CARGO_PKG_VERSION"));

    // ── Step 1: Database connection + migrations ─────────────────
    tracing::info!("Connecting to database...");
    let db = DatabasePool::connect(&config.database).await?;

    tracing::info!("Running database migrations...");
    claimgate_database::migration::run_migrations(db.pool()).await?;
    tracing::info!("Database migrations complete");

    // ── Step 2: Initialize cache ─────────────────────────────────
    tracing::info!(
        "Initializing cache (provider: {})...",
        config.cache.provider
    );
    let cache = CacheManager::new(&config.cache).await?;
    tracing::info!("Cache initialized");

    // ── Step 3: Initialize quantity counter ──────────────────────
    tracing::info!(
        "Initializing quantity counter (provider: {})...",
        config.coordination.provider
    );
    let counter = CounterManager::new(&config.coordination).await?;
    tracing::info!("Quantity counter initialized");

    // ── Step 4: Initialize intent broker ─────────────────────────
    tracing::info!(
        "Initializing intent broker (provider: {}, partitions: {})...",
        config.broker.provider,
        config.broker.partitions
    );
    let broker = BrokerManager::new(&config.broker).await?;

    // Intents that were in flight when the previous process died go back
    // to their partitions before any consumer starts.
    let recovered = broker.recover().await?;
    if recovered > 0 {
        tracing::warn!("Recovered {} in-flight intent(s) from a previous run", recovered);
    }
    tracing::info!("Intent broker initialized");

    // ── Step 5: Stores and caches ────────────────────────────────
    let resources: Arc<dyn ResourceStore> = Arc::new(PgResourceStore::new(db.pool().clone()));
    let snapshots = ResourceSnapshotCache::new(cache.clone(), config.cache.default_ttl_seconds);
    let pending = PendingClaimCache::new(cache.clone(), config.issuance.pending_ttl_seconds);

    // ── Step 6: Shutdown channel ─────────────────────────────────
    let (shutdown_tx, shutdown_rx) = watch::channel(false);

    // ── Step 7: Start fulfillment worker ─────────────────────────
    let worker_handle = if config.worker.enabled {
        tracing::info!("Starting fulfillment worker...");

        let handler = Arc::new(FulfillmentHandler::new(
            Arc::clone(&resources),
            pending.clone(),
            snapshots.clone(),
        ));
        let runner = FulfillmentRunner::new(broker.clone(), handler, config.worker.clone());

        let worker_cancel = shutdown_rx.clone();
        let handle = tokio::spawn(async move {
            runner.run(worker_cancel).await;
        });

        tracing::info!("Fulfillment worker started");
        Some(handle)
    } else {
        tracing::info!("Fulfillment worker disabled");
        None
    };

    // ── Step 8: Schedule counter reconciler ──────────────────────
    let mut scheduler = if config.reconciler.enabled {
        let reconciler = CounterReconciler::new(Arc::clone(&resources), counter.clone());

        let scheduler = CronScheduler::new().await?;
        scheduler
            .register_counter_reconcile(reconciler, &config.reconciler.schedule)
            .await?;
        scheduler.start().await?;

        Some(scheduler)
    } else {
        tracing::info!("Counter reconciler disabled");
        None
    };

    tracing::info!("ClaimGate daemon ready");

    // ── Step 9: Graceful shutdown ────────────────────────────────
    shutdown_signal().await;
    tracing::info!("Shutdown signal received, starting graceful shutdown...");
    let _ = shutdown_tx.send(true);

    if let Some(scheduler) = scheduler.as_mut() {
        if let Err(e) = scheduler.shutdown().await {
            tracing::warn!("Scheduler shutdown failed: {}", e);
        }
    }

    if let Some(handle) = worker_handle {
        // One second beyond the runner's own grace timer, so the runner
        // finishes its bounded wait and logs before the join gives up.
        let grace = Duration::from_secs(config.worker.shutdown_grace_seconds + 1);
        let _ = tokio::time::timeout(grace, handle).await;
    }

    tracing::info!("ClaimGate daemon shut down gracefully");
    Ok(())
}

/// Wait for shutdown signal (Ctrl+C or SIGTERM)
async fn shutdown_signal() {
    let ctrl_c = async {
        tokio::signal::ctrl_c()
            .await
            .expect("Failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
            .expect("Failed to install SIGTERM handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
}

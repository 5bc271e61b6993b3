//! Shopsync Service - webhook ingestion, reconciliation, baselines, gates.
//!
//! This is the main entry point for the shopsync service.

use std::sync::Arc;
use std::time::Duration;

use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use shopsync_service::scheduler::spawn_periodic_jobs;
use shopsync_service::{
    create_router, AppState, EventProcessor, QueueWorker, ServiceConfig,
};
use shopsync_store::RocksStore;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info,shopsync=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    tracing::info!("Starting Shopsync Service");

    // Load configuration from environment
    let config = ServiceConfig::from_env();

    tracing::info!(
        listen_addr = %config.listen_addr,
        data_dir = %config.data_dir,
        signature_verification = %config.webhook_secret.is_some(),
        metrics_configured = %config.metrics_api_url.is_some(),
        "Service configuration loaded"
    );

    // Initialize RocksDB store
    tracing::info!(path = %config.data_dir, "Opening RocksDB store");
    let store = Arc::new(RocksStore::open(&config.data_dir)?);

    // Build app state
    let state = AppState::new(store, config.clone())?;

    // Start the queue worker
    let worker = QueueWorker::new(
        Arc::clone(&state.store),
        EventProcessor::new(Arc::clone(&state.store)),
        state.queue.notify_handle(),
        Duration::from_millis(config.queue_poll_interval_ms),
    );
    tokio::spawn(worker.run());
    tracing::info!("Queue worker started");

    // Start periodic sweeps (reconciliation, baselines, gates)
    spawn_periodic_jobs(Arc::new(state.clone()));

    // Create the router
    let app = create_router(state);
    tracing::info!("Router configured with all API endpoints");

    // Start HTTP server
    tracing::info!(listen_addr = %config.listen_addr, "Starting HTTP server");
    let listener = tokio::net::TcpListener::bind(&config.listen_addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}

//! Application state.

use std::sync::Arc;

use shopsync_source::{CommerceClient, MetricsClient};
use shopsync_store::RocksStore;

use crate::config::ServiceConfig;
use crate::error::ApiError;
use crate::queue::EventQueue;

/// Application state shared across handlers and background jobs.
#[derive(Clone)]
pub struct AppState {
    /// The storage backend.
    pub store: Arc<RocksStore>,

    /// Service configuration.
    pub config: ServiceConfig,

    /// Source commerce platform client.
    pub commerce: Arc<CommerceClient>,

    /// Metrics provider client (optional; gate sweeps are disabled when
    /// not configured).
    pub metrics: Option<Arc<MetricsClient>>,

    /// The durable event queue front door.
    pub queue: Arc<EventQueue>,
}

impl AppState {
    /// Create a new application state.
    ///
    /// # Errors
    ///
    /// Returns an error if an HTTP client cannot be built.
    pub fn new(store: Arc<RocksStore>, config: ServiceConfig) -> Result<Self, ApiError> {
        let commerce = match &config.source_base_url {
            Some(base_url) => {
                tracing::info!(base_url = %base_url, "Source API base URL overridden");
                CommerceClient::with_base_url(base_url)
            }
            None => CommerceClient::new(),
        }
        .map(Arc::new)
        .map_err(|e| ApiError::Internal(e.to_string()))?;

        let metrics = config
            .metrics_api_url
            .as_ref()
            .zip(config.metrics_api_key.as_ref())
            .and_then(|(url, key)| match MetricsClient::new(url, key) {
                Ok(client) => {
                    tracing::info!(metrics_url = %url, "Metrics provider enabled");
                    Some(Arc::new(client))
                }
                Err(e) => {
                    tracing::error!(error = %e, "Failed to create metrics client");
                    None
                }
            });

        if metrics.is_none() {
            tracing::warn!("Metrics provider not configured - gate sweeps disabled");
        }

        let queue = Arc::new(EventQueue::new(Arc::clone(&store)));

        Ok(Self {
            store,
            config,
            commerce,
            metrics,
            queue,
        })
    }
}

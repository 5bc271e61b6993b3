//! Router configuration.
//!
//! This module sets up the Axum router with all routes and middleware.

use std::sync::Arc;
use std::time::Duration;

use axum::routing::{get, post};
use axum::Router;
use tower::limit::ConcurrencyLimitLayer;
use tower_http::cors::{Any, CorsLayer};
use tower_http::limit::RequestBodyLimitLayer;
use tower_http::timeout::TimeoutLayer;
use tower_http::trace::TraceLayer;

use crate::handlers::{baselines, deadletters, gates, health, merchants, reconcile, webhooks};
use crate::state::AppState;

/// Maximum concurrent requests for the webhook ingestion endpoint.
/// The source platform bursts deliveries; the edge only persists a job, so
/// the limit can sit well above the admin API's.
const WEBHOOK_MAX_CONCURRENT_REQUESTS: usize = 200;

/// Maximum concurrent requests for general API endpoints.
const API_MAX_CONCURRENT_REQUESTS: usize = 50;

/// Create the service router with all routes and middleware.
///
/// # Routes
///
/// ## Public
/// - `GET /health` - Health check
///
/// ## Webhooks (signature verification)
/// - `POST /webhooks/events` - Source platform event deliveries
///
/// ## Merchants
/// - `POST /v1/merchants` - Register a merchant (admin)
/// - `GET /v1/merchants/:id` - Fetch a merchant
///
/// ## Dead letters (admin)
/// - `GET /v1/dead-letters` - List by merchant, optional status filter
/// - `GET /v1/dead-letters/stats` - Counts by status
/// - `POST /v1/dead-letters/:id/retry` - Single-attempt replay
/// - `POST /v1/dead-letters/:id/resolve` - Mark handled
/// - `POST /v1/dead-letters/:id/ignore` - Mark ignored (terminal)
///
/// ## Reconciliation (admin)
/// - `POST /v1/reconciliation/:merchant_id` - Sweep one merchant now
///
/// ## Baselines
/// - `POST /v1/baselines/:merchant_id` - Recalculate now (admin)
/// - `GET /v1/baselines/:merchant_id` - Current baseline
///
/// ## Gates
/// - `POST /v1/gates/:merchant_id/deliverability` - Evaluate (admin)
/// - `POST /v1/gates/:merchant_id/funnel` - Evaluate (admin)
/// - `GET /v1/gates/:merchant_id` - Persisted gate states
/// - `GET /v1/gates/:merchant_id/blocked/:feature` - Feature check
/// - `POST /v1/gates/:merchant_id/override` - Audited override (admin)
/// - `GET /v1/gates/:merchant_id/overrides` - Override audit trail (admin)
pub fn create_router(state: AppState) -> Router {
    // Extract config values before moving state
    let cors_origins = state.config.cors_origins.clone();
    let max_body_bytes = state.config.max_body_bytes;
    let request_timeout_seconds = state.config.request_timeout_seconds;

    let cors = build_cors_layer(&cors_origins);

    let state = Arc::new(state);

    // The webhook edge gets its own concurrency budget so delivery bursts
    // cannot starve the admin API.
    let webhook_routes = Router::new()
        .route("/events", post(webhooks::receive_event))
        .layer(ConcurrencyLimitLayer::new(WEBHOOK_MAX_CONCURRENT_REQUESTS));

    let api_routes = Router::new()
        // Merchants
        .route("/merchants", post(merchants::create_merchant))
        .route("/merchants/:id", get(merchants::get_merchant))
        // Dead letters
        .route("/dead-letters", get(deadletters::list_dead_letters))
        .route("/dead-letters/stats", get(deadletters::dead_letter_stats))
        .route(
            "/dead-letters/:id/retry",
            post(deadletters::retry_dead_letter),
        )
        .route(
            "/dead-letters/:id/resolve",
            post(deadletters::resolve_dead_letter),
        )
        .route(
            "/dead-letters/:id/ignore",
            post(deadletters::ignore_dead_letter),
        )
        // Reconciliation
        .route(
            "/reconciliation/:merchant_id",
            post(reconcile::trigger_reconciliation),
        )
        // Baselines
        .route(
            "/baselines/:merchant_id",
            post(baselines::recalculate_baseline).get(baselines::get_baseline),
        )
        // Gates
        .route(
            "/gates/:merchant_id/deliverability",
            post(gates::evaluate_deliverability),
        )
        .route("/gates/:merchant_id/funnel", post(gates::evaluate_funnel))
        .route("/gates/:merchant_id", get(gates::list_gate_states))
        .route(
            "/gates/:merchant_id/blocked/:feature",
            get(gates::check_feature),
        )
        .route("/gates/:merchant_id/override", post(gates::record_override))
        .route("/gates/:merchant_id/overrides", get(gates::list_overrides))
        .layer(ConcurrencyLimitLayer::new(API_MAX_CONCURRENT_REQUESTS));

    Router::new()
        // Health (public, no rate limit)
        .route("/health", get(health::health_check))
        // API v1 routes
        .nest("/v1", api_routes)
        // Webhooks (volume controlled by the source platform)
        .nest("/webhooks", webhook_routes)
        // Global middleware
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .layer(RequestBodyLimitLayer::new(max_body_bytes))
        .layer(TimeoutLayer::new(Duration::from_secs(
            request_timeout_seconds,
        )))
        .with_state(state)
}

/// Build the CORS layer from configured origins.
fn build_cors_layer(origins: &[String]) -> CorsLayer {
    if origins.iter().any(|o| o == "*") {
        CorsLayer::new()
            .allow_origin(Any)
            .allow_methods(Any)
            .allow_headers(Any)
    } else {
        let origins: Vec<_> = origins.iter().filter_map(|o| o.parse().ok()).collect();

        CorsLayer::new()
            .allow_origin(origins)
            .allow_methods(Any)
            .allow_headers(Any)
    }
}

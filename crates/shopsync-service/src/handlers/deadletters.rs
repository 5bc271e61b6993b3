//! Dead-letter queue handlers.

use std::sync::Arc;

use axum::extract::{Path, Query, State};
use axum::Json;
use serde::Deserialize;

use shopsync_core::{DeadLetterEntry, DeadLetterId, DeadLetterStats, DeadLetterStatus, MerchantId};

use crate::auth::AdminAuth;
use crate::deadletter::DeadLetterManager;
use crate::error::ApiError;
use crate::processor::EventProcessor;
use crate::state::AppState;

fn manager(state: &AppState) -> DeadLetterManager {
    DeadLetterManager::new(
        Arc::clone(&state.store),
        EventProcessor::new(Arc::clone(&state.store)),
        state.config.dead_letter_alert_threshold,
    )
}

/// Query parameters for dead-letter listings.
#[derive(Debug, Deserialize)]
pub struct ListParams {
    /// The merchant whose dead letters to list.
    pub merchant_id: MerchantId,
    /// Optional status filter (`failed`, `retrying`, `resolved`, `ignored`).
    pub status: Option<String>,
}

/// Request body for operator dispositions.
#[derive(Debug, Deserialize)]
pub struct DispositionRequest {
    /// Operator notes (resolve) or reason (ignore).
    pub notes: String,
}

/// List a merchant's dead letters.
pub async fn list_dead_letters(
    State(state): State<Arc<AppState>>,
    _auth: AdminAuth,
    Query(params): Query<ListParams>,
) -> Result<Json<Vec<DeadLetterEntry>>, ApiError> {
    let status = params
        .status
        .as_deref()
        .map(DeadLetterStatus::parse)
        .transpose()?;
    let entries = manager(&state).list(&params.merchant_id, status)?;
    Ok(Json(entries))
}

/// Query parameters for dead-letter stats.
#[derive(Debug, Deserialize)]
pub struct StatsParams {
    /// The merchant to count for.
    pub merchant_id: MerchantId,
}

/// Count a merchant's dead letters by status.
pub async fn dead_letter_stats(
    State(state): State<Arc<AppState>>,
    _auth: AdminAuth,
    Query(params): Query<StatsParams>,
) -> Result<Json<DeadLetterStats>, ApiError> {
    let stats = manager(&state).stats(&params.merchant_id)?;
    Ok(Json(stats))
}

/// Manually retry a dead-lettered event once.
pub async fn retry_dead_letter(
    State(state): State<Arc<AppState>>,
    auth: AdminAuth,
    Path(id): Path<DeadLetterId>,
) -> Result<Json<DeadLetterEntry>, ApiError> {
    // Retry is attributable like any other disposition.
    let operator = auth.require_operator()?;
    tracing::info!(dead_letter_id = %id, operator_id = %operator, "Manual retry requested");
    let entry = manager(&state).retry(&id).await?;
    Ok(Json(entry))
}

/// Mark a dead letter resolved without replaying it.
pub async fn resolve_dead_letter(
    State(state): State<Arc<AppState>>,
    auth: AdminAuth,
    Path(id): Path<DeadLetterId>,
    Json(req): Json<DispositionRequest>,
) -> Result<Json<DeadLetterEntry>, ApiError> {
    let operator = auth.require_operator()?;
    let entry = manager(&state).resolve(&id, operator, req.notes)?;
    Ok(Json(entry))
}

/// Mark a dead letter ignored. Terminal.
pub async fn ignore_dead_letter(
    State(state): State<Arc<AppState>>,
    auth: AdminAuth,
    Path(id): Path<DeadLetterId>,
    Json(req): Json<DispositionRequest>,
) -> Result<Json<DeadLetterEntry>, ApiError> {
    let operator = auth.require_operator()?;
    let entry = manager(&state).ignore(&id, operator, req.notes)?;
    Ok(Json(entry))
}

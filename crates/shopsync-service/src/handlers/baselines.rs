//! Baseline handlers.

use std::sync::Arc;

use axum::extract::{Path, State};
use axum::Json;
use serde::Deserialize;

use shopsync_core::{Baseline, MerchantId};
use shopsync_store::Store;

use crate::auth::AdminAuth;
use crate::baseline::BaselineEngine;
use crate::error::ApiError;
use crate::state::AppState;

/// Request body for a manual recalculation.
#[derive(Debug, Deserialize, Default)]
pub struct RecalculateRequest {
    /// Lookback window override in days.
    pub lookback_days: Option<u32>,
    /// Whether to drop statistical outliers (default true).
    pub exclude_anomalies: Option<bool>,
}

/// Recalculate a merchant's baseline, now.
pub async fn recalculate_baseline(
    State(state): State<Arc<AppState>>,
    _auth: AdminAuth,
    Path(merchant_id): Path<MerchantId>,
    body: Option<Json<RecalculateRequest>>,
) -> Result<Json<Baseline>, ApiError> {
    let req = body.map(|Json(r)| r).unwrap_or_default();
    let lookback_days = req
        .lookback_days
        .unwrap_or(state.config.baseline_lookback_days);
    if lookback_days == 0 {
        return Err(ApiError::BadRequest("lookback_days must be positive".into()));
    }
    let exclude_anomalies = req.exclude_anomalies.unwrap_or(true);

    let engine = BaselineEngine::new(Arc::clone(&state.store));
    let baseline = engine.calculate(&merchant_id, lookback_days, exclude_anomalies)?;
    Ok(Json(baseline))
}

/// Fetch a merchant's current baseline.
pub async fn get_baseline(
    State(state): State<Arc<AppState>>,
    Path(merchant_id): Path<MerchantId>,
) -> Result<Json<Baseline>, ApiError> {
    let baseline = state
        .store
        .get_baseline(&merchant_id)?
        .ok_or_else(|| ApiError::NotFound(format!("no baseline for merchant: {merchant_id}")))?;
    Ok(Json(baseline))
}

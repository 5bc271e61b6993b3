//! Gate handlers: evaluation triggers, status, feature checks, overrides.

use std::sync::Arc;

use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::Json;
use serde::Deserialize;

use shopsync_core::{
    DeliverabilityMetrics, Feature, GateOverride, GateState, GateType, MerchantId,
};

use crate::auth::AdminAuth;
use crate::error::ApiError;
use crate::gates::{FeatureBlockStatus, GateEvaluationResult, GateService};
use crate::state::AppState;

fn service(state: &AppState) -> GateService {
    GateService::new(Arc::clone(&state.store))
}

/// Evaluate the deliverability gate with caller-supplied metrics.
pub async fn evaluate_deliverability(
    State(state): State<Arc<AppState>>,
    _auth: AdminAuth,
    Path(merchant_id): Path<MerchantId>,
    Json(metrics): Json<DeliverabilityMetrics>,
) -> Result<Json<GateEvaluationResult>, ApiError> {
    let result = service(&state).evaluate_deliverability(&merchant_id, &metrics)?;
    Ok(Json(result))
}

/// Request body for a funnel gate evaluation.
#[derive(Debug, Deserialize)]
pub struct FunnelMetricsRequest {
    /// Current-week conversion rate, as a fraction.
    pub current_cr: f64,
    /// Previous-week conversion rate, as a fraction.
    pub previous_cr: f64,
    /// Consecutive business days below the conversion floor.
    pub consecutive_low_days: u32,
}

/// Evaluate the funnel throughput gate with caller-supplied metrics.
pub async fn evaluate_funnel(
    State(state): State<Arc<AppState>>,
    _auth: AdminAuth,
    Path(merchant_id): Path<MerchantId>,
    Json(req): Json<FunnelMetricsRequest>,
) -> Result<Json<GateEvaluationResult>, ApiError> {
    let result = service(&state).evaluate_funnel(
        &merchant_id,
        req.current_cr,
        req.previous_cr,
        req.consecutive_low_days,
    )?;
    Ok(Json(result))
}

/// List a merchant's persisted gate states. An empty list means every gate
/// passes.
pub async fn list_gate_states(
    State(state): State<Arc<AppState>>,
    Path(merchant_id): Path<MerchantId>,
) -> Result<Json<Vec<GateState>>, ApiError> {
    let states = service(&state).list_states(&merchant_id)?;
    Ok(Json(states))
}

/// Check whether a feature is blocked for a merchant.
pub async fn check_feature(
    State(state): State<Arc<AppState>>,
    Path((merchant_id, feature)): Path<(MerchantId, String)>,
) -> Result<Json<FeatureBlockStatus>, ApiError> {
    let feature = Feature::parse(&feature)?;
    let status = service(&state).is_feature_blocked(&merchant_id, feature)?;
    Ok(Json(status))
}

/// Request body for recording a gate override.
#[derive(Debug, Deserialize)]
pub struct OverrideRequest {
    /// Which gate to bypass (`deliverability` or `funnel_throughput`).
    pub gate_type: String,
    /// Why the bypass is justified. Required.
    pub reason: String,
}

/// Record an audited override for a merchant's gate.
pub async fn record_override(
    State(state): State<Arc<AppState>>,
    auth: AdminAuth,
    Path(merchant_id): Path<MerchantId>,
    Json(req): Json<OverrideRequest>,
) -> Result<(StatusCode, Json<GateOverride>), ApiError> {
    let operator = auth.require_operator()?;
    let gate_type = GateType::parse(&req.gate_type)?;
    let entry = service(&state).override_gate(&merchant_id, gate_type, operator, req.reason)?;
    Ok((StatusCode::CREATED, Json(entry)))
}

/// List a merchant's gate overrides.
pub async fn list_overrides(
    State(state): State<Arc<AppState>>,
    _auth: AdminAuth,
    Path(merchant_id): Path<MerchantId>,
) -> Result<Json<Vec<GateOverride>>, ApiError> {
    let entries = service(&state).list_overrides(&merchant_id, None)?;
    Ok(Json(entries))
}

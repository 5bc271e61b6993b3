//! Reconciliation trigger handler.

use std::sync::Arc;

use axum::extract::{Path, State};
use axum::Json;

use shopsync_core::MerchantId;
use shopsync_store::Store;

use crate::auth::AdminAuth;
use crate::error::ApiError;
use crate::reconcile::{ReconciliationReport, Reconciler};
use crate::state::AppState;

/// Run a reconciliation sweep for one merchant, now.
pub async fn trigger_reconciliation(
    State(state): State<Arc<AppState>>,
    _auth: AdminAuth,
    Path(merchant_id): Path<MerchantId>,
) -> Result<Json<ReconciliationReport>, ApiError> {
    let merchant = state
        .store
        .get_merchant(&merchant_id)?
        .ok_or_else(|| ApiError::NotFound(format!("merchant not found: {merchant_id}")))?;

    let reconciler = Reconciler::new(
        Arc::clone(&state.store),
        Arc::clone(&state.commerce),
        chrono::Duration::hours(state.config.reconcile_lookback_hours),
    );
    let report = reconciler.run_for_merchant(&merchant).await?;
    Ok(Json(report))
}

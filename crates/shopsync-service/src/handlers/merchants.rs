//! Merchant registry handlers.

use std::sync::Arc;

use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::Json;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use shopsync_core::{Merchant, MerchantId};
use shopsync_store::Store;

use crate::auth::AdminAuth;
use crate::error::ApiError;
use crate::state::AppState;

/// Request body for registering a merchant.
#[derive(Debug, Deserialize)]
pub struct CreateMerchantRequest {
    /// The shop's domain on the source platform.
    pub shop_domain: String,
    /// API access token for the source platform.
    pub access_token: String,
    /// Fixed offset from UTC in minutes (default 0).
    #[serde(default)]
    pub utc_offset_minutes: i32,
}

/// Merchant response. The access token never leaves the service.
#[derive(Debug, Serialize)]
pub struct MerchantResponse {
    /// Merchant identifier.
    pub id: MerchantId,
    /// The shop's domain on the source platform.
    pub shop_domain: String,
    /// Fixed offset from UTC in minutes.
    pub utc_offset_minutes: i32,
    /// Whether background sweeps include this merchant.
    pub active: bool,
    /// When the merchant connected.
    pub created_at: DateTime<Utc>,
}

impl From<Merchant> for MerchantResponse {
    fn from(m: Merchant) -> Self {
        Self {
            id: m.id,
            shop_domain: m.shop_domain,
            utc_offset_minutes: m.utc_offset_minutes,
            active: m.active,
            created_at: m.created_at,
        }
    }
}

/// Register a new merchant.
pub async fn create_merchant(
    State(state): State<Arc<AppState>>,
    _auth: AdminAuth,
    Json(req): Json<CreateMerchantRequest>,
) -> Result<(StatusCode, Json<MerchantResponse>), ApiError> {
    if req.shop_domain.trim().is_empty() {
        return Err(ApiError::BadRequest("shop_domain is required".into()));
    }
    if req.access_token.trim().is_empty() {
        return Err(ApiError::BadRequest("access_token is required".into()));
    }

    let mut merchant = Merchant::new(req.shop_domain, req.access_token);
    merchant.utc_offset_minutes = req.utc_offset_minutes;
    state.store.put_merchant(&merchant)?;

    tracing::info!(
        merchant_id = %merchant.id,
        shop_domain = %merchant.shop_domain,
        "Merchant registered"
    );
    Ok((StatusCode::CREATED, Json(merchant.into())))
}

/// Fetch a merchant by ID.
pub async fn get_merchant(
    State(state): State<Arc<AppState>>,
    Path(merchant_id): Path<MerchantId>,
) -> Result<Json<MerchantResponse>, ApiError> {
    let merchant = state
        .store
        .get_merchant(&merchant_id)?
        .ok_or_else(|| ApiError::NotFound(format!("merchant not found: {merchant_id}")))?;
    Ok(Json(merchant.into()))
}

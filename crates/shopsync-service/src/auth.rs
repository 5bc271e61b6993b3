//! Authentication extractors.

use std::sync::Arc;

use axum::extract::FromRequestParts;
use axum::http::request::Parts;

use crate::error::ApiError;
use crate::state::AppState;

/// Admin authentication via API key.
///
/// Operator endpoints (dead-letter dispositions, gate overrides, manual
/// triggers) require the `X-Admin-Key` header to match the configured key.
/// The optional `X-Operator-Id` header identifies the human for audit
/// fields.
#[derive(Debug, Clone)]
pub struct AdminAuth {
    /// Operator identifier for audit logging, when provided.
    pub operator_id: Option<String>,
}

#[async_trait::async_trait]
impl FromRequestParts<Arc<AppState>> for AdminAuth {
    type Rejection = ApiError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &Arc<AppState>,
    ) -> Result<Self, Self::Rejection> {
        let admin_key = parts
            .headers
            .get("x-admin-key")
            .and_then(|v| v.to_str().ok())
            .ok_or(ApiError::Unauthorized)?;

        let expected_key = state
            .config
            .admin_api_key
            .as_ref()
            .ok_or(ApiError::Unauthorized)?;

        if !crate::crypto::constant_time_eq(admin_key, expected_key) {
            return Err(ApiError::Unauthorized);
        }

        let operator_id = parts
            .headers
            .get("x-operator-id")
            .and_then(|v| v.to_str().ok())
            .map(ToString::to_string);

        Ok(AdminAuth { operator_id })
    }
}

impl AdminAuth {
    /// Parse the operator from the `X-Operator-Id` header.
    ///
    /// # Errors
    ///
    /// Returns `ApiError::BadRequest` when the header is missing or not a
    /// UUID; disposition endpoints require an attributable operator.
    pub fn require_operator(&self) -> Result<shopsync_core::OperatorId, ApiError> {
        self.operator_id
            .as_deref()
            .ok_or_else(|| ApiError::BadRequest("X-Operator-Id header is required".into()))?
            .parse()
            .map_err(|_| ApiError::BadRequest("X-Operator-Id must be a UUID".into()))
    }
}

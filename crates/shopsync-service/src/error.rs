//! API error types and responses.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::Serialize;

use shopsync_core::SyncError;

/// API error type.
#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    /// Unauthorized - missing or invalid credentials.
    #[error("unauthorized")]
    Unauthorized,

    /// Resource not found.
    #[error("not found: {0}")]
    NotFound(String),

    /// Bad request - invalid input.
    #[error("bad request: {0}")]
    BadRequest(String),

    /// Conflict - invalid state transition.
    #[error("conflict: {0}")]
    Conflict(String),

    /// Internal server error.
    #[error("internal error: {0}")]
    Internal(String),

    /// External service error.
    #[error("external service error: {0}")]
    ExternalService(String),
}

/// JSON error response body.
#[derive(Debug, Serialize)]
struct ErrorResponse {
    error: ErrorBody,
}

#[derive(Debug, Serialize)]
struct ErrorBody {
    code: String,
    message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    details: Option<serde_json::Value>,
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, code, message) = match &self {
            Self::Unauthorized => (
                StatusCode::UNAUTHORIZED,
                "unauthorized",
                self.to_string(),
            ),
            Self::NotFound(msg) => (StatusCode::NOT_FOUND, "not_found", msg.clone()),
            Self::BadRequest(msg) => (StatusCode::BAD_REQUEST, "bad_request", msg.clone()),
            Self::Conflict(msg) => (StatusCode::CONFLICT, "conflict", msg.clone()),
            Self::Internal(msg) => {
                tracing::error!(error = %msg, "Internal server error");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "internal_error",
                    "An internal error occurred".to_string(),
                )
            }
            Self::ExternalService(msg) => (
                StatusCode::BAD_GATEWAY,
                "external_service_error",
                msg.clone(),
            ),
        };

        let body = ErrorResponse {
            error: ErrorBody {
                code: code.to_string(),
                message,
                details: None,
            },
        };

        (status, Json(body)).into_response()
    }
}

impl From<shopsync_store::StoreError> for ApiError {
    fn from(err: shopsync_store::StoreError) -> Self {
        match err {
            shopsync_store::StoreError::NotFound { entity, id } => {
                Self::NotFound(format!("{entity} not found: {id}"))
            }
            shopsync_store::StoreError::Database(msg)
            | shopsync_store::StoreError::Serialization(msg) => Self::Internal(msg),
        }
    }
}

impl From<SyncError> for ApiError {
    fn from(err: SyncError) -> Self {
        match err {
            SyncError::MerchantNotFound { merchant_id } => {
                Self::NotFound(format!("merchant not found: {merchant_id}"))
            }
            SyncError::DeadLetterNotFound { id } => {
                Self::NotFound(format!("dead letter not found: {id}"))
            }
            SyncError::InvalidDeadLetterTransition { from, to } => {
                Self::Conflict(format!("invalid dead letter transition: {from} -> {to}"))
            }
            SyncError::MissingOverrideReason => {
                Self::BadRequest("override reason is required".into())
            }
            SyncError::UnknownTopic { topic } => {
                Self::BadRequest(format!("unknown topic: {topic}"))
            }
            SyncError::MalformedPayload(msg) => Self::BadRequest(msg),
            SyncError::InvalidId(err) => Self::BadRequest(err.to_string()),
            SyncError::ExternalService { service, message } => {
                Self::ExternalService(format!("{service}: {message}"))
            }
            SyncError::Storage(msg) | SyncError::Serialization(msg) => Self::Internal(msg),
            SyncError::Configuration(msg) => Self::Internal(msg),
        }
    }
}

impl From<shopsync_source::SourceError> for ApiError {
    fn from(err: shopsync_source::SourceError) -> Self {
        Self::ExternalService(err.to_string())
    }
}

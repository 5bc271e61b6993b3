//! Webhook ingestion endpoint.
//!
//! The edge does the minimum before acknowledging: verify the signature,
//! parse the envelope, persist the job. Domain processing happens on the
//! worker after the 200 has gone out, so a slow handler never makes the
//! source platform redeliver.

use std::sync::Arc;

use axum::extract::State;
use axum::http::HeaderMap;
use axum::Json;
use serde::Deserialize;
use serde_json::{json, Value};

use shopsync_core::{EventTopic, InboundEvent, MerchantId};

use crate::crypto::verify_signature;
use crate::error::ApiError;
use crate::queue::EnqueueOutcome;
use crate::state::AppState;

/// The envelope the source platform posts.
#[derive(Debug, Deserialize)]
struct WebhookEnvelope {
    event_id: String,
    merchant_id: MerchantId,
    topic: String,
    payload: Value,
}

/// Handle an inbound webhook delivery.
///
/// Unknown topics are rejected at the edge with a 400; the source platform
/// drops deliveries after a rejection, which is what we want for topics we
/// will never handle. Everything else is acknowledged as soon as the job is
/// durable.
pub async fn receive_event(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    body: String,
) -> Result<Json<Value>, ApiError> {
    check_signature(&state, &headers, &body)?;

    let envelope: WebhookEnvelope = serde_json::from_str(&body)
        .map_err(|e| ApiError::BadRequest(format!("invalid webhook body: {e}")))?;
    let topic = EventTopic::parse(&envelope.topic)?;

    let event = InboundEvent::new(
        envelope.event_id,
        envelope.merchant_id,
        topic,
        envelope.payload,
    );

    let outcome = state
        .queue
        .enqueue(event)
        .map_err(|e| ApiError::Internal(e.to_string()))?;

    let status = match outcome {
        EnqueueOutcome::Accepted => "accepted",
        EnqueueOutcome::Duplicate => "duplicate",
    };
    Ok(Json(json!({ "status": status })))
}

fn check_signature(state: &AppState, headers: &HeaderMap, body: &str) -> Result<(), ApiError> {
    let Some(secret) = &state.config.webhook_secret else {
        tracing::warn!("Webhook secret not configured - skipping signature verification");
        return Ok(());
    };

    let signature = headers
        .get("x-webhook-signature")
        .and_then(|v| v.to_str().ok())
        .ok_or(ApiError::Unauthorized)?;

    if !verify_signature(secret, body, signature) {
        tracing::warn!("Webhook signature verification failed");
        return Err(ApiError::Unauthorized);
    }
    Ok(())
}

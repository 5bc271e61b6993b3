//! Gate evaluation, feature blocking, and override integration tests.

mod common;

use common::{TestHarness, ADMIN_KEY};
use serde_json::{json, Value};
use shopsync_core::{GateType, MerchantId, OperatorId};
use shopsync_store::Store;

async fn register_merchant(harness: &TestHarness) -> MerchantId {
    let response = harness
        .server
        .post("/v1/merchants")
        .add_header("x-admin-key", ADMIN_KEY)
        .json(&json!({
            "shop_domain": "shop.example.com",
            "access_token": "tok_test",
        }))
        .await;
    let body: Value = response.json();
    body["id"].as_str().unwrap().parse().unwrap()
}

fn failing_deliverability() -> Value {
    json!({
        "hard_bounce_rate": 0.01,
        "soft_bounce_rate": 0.0,
        "spam_complaint_rate": 0.0
    })
}

#[tokio::test]
async fn first_failure_opens_grace_without_blocking() {
    let harness = TestHarness::new();
    let merchant_id = register_merchant(&harness).await;

    let response = harness
        .server
        .post(&format!("/v1/gates/{merchant_id}/deliverability"))
        .add_header("x-admin-key", ADMIN_KEY)
        .json(&failing_deliverability())
        .await;
    response.assert_status_ok();
    let result: Value = response.json();
    assert_eq!(result["status"], "grace_period");
    assert!(result["grace_period_ends_at"].is_string());
    assert_eq!(result["blocked_features"].as_array().unwrap().len(), 0);

    let response = harness
        .server
        .get(&format!("/v1/gates/{merchant_id}/blocked/promotions"))
        .await;
    response.assert_status_ok();
    let check: Value = response.json();
    assert_eq!(check["blocked"], false);
}

#[tokio::test]
async fn failure_past_grace_deadline_blocks_features() {
    let harness = TestHarness::new();
    let merchant_id = register_merchant(&harness).await;

    harness
        .server
        .post(&format!("/v1/gates/{merchant_id}/deliverability"))
        .add_header("x-admin-key", ADMIN_KEY)
        .json(&failing_deliverability())
        .await
        .assert_status_ok();

    // Move the grace deadline into the past.
    let mut state = harness
        .store
        .get_gate_state(&merchant_id, GateType::Deliverability)
        .unwrap()
        .unwrap();
    state.grace_period_ends_at = Some(chrono::Utc::now() - chrono::Duration::hours(1));
    harness.store.put_gate_state(&state).unwrap();

    let response = harness
        .server
        .post(&format!("/v1/gates/{merchant_id}/deliverability"))
        .add_header("x-admin-key", ADMIN_KEY)
        .json(&failing_deliverability())
        .await;
    response.assert_status_ok();
    let result: Value = response.json();
    assert_eq!(result["status"], "fail");

    let response = harness
        .server
        .get(&format!("/v1/gates/{merchant_id}/blocked/promotions"))
        .await;
    let check: Value = response.json();
    assert_eq!(check["blocked"], true);
    assert_eq!(check["gate_type"], "deliverability");

    // The funnel-only feature is unaffected.
    let response = harness
        .server
        .get(&format!(
            "/v1/gates/{merchant_id}/blocked/paid_acquisition_scaling"
        ))
        .await;
    let check: Value = response.json();
    assert_eq!(check["blocked"], false);
}

#[tokio::test]
async fn clean_metrics_clear_the_gate() {
    let harness = TestHarness::new();
    let merchant_id = register_merchant(&harness).await;

    harness
        .server
        .post(&format!("/v1/gates/{merchant_id}/deliverability"))
        .add_header("x-admin-key", ADMIN_KEY)
        .json(&failing_deliverability())
        .await
        .assert_status_ok();

    let response = harness
        .server
        .post(&format!("/v1/gates/{merchant_id}/deliverability"))
        .add_header("x-admin-key", ADMIN_KEY)
        .json(&json!({
            "hard_bounce_rate": 0.0,
            "soft_bounce_rate": 0.0,
            "spam_complaint_rate": 0.0
        }))
        .await;
    response.assert_status_ok();
    let result: Value = response.json();
    assert_eq!(result["status"], "pass");

    // Nothing left persisted: empty list means implicit PASS.
    let response = harness.server.get(&format!("/v1/gates/{merchant_id}")).await;
    response.assert_status_ok();
    let states: Value = response.json();
    assert_eq!(states.as_array().unwrap().len(), 0);
}

#[tokio::test]
async fn funnel_variance_warns_without_blocking() {
    let harness = TestHarness::new();
    let merchant_id = register_merchant(&harness).await;

    let response = harness
        .server
        .post(&format!("/v1/gates/{merchant_id}/funnel"))
        .add_header("x-admin-key", ADMIN_KEY)
        .json(&json!({
            "current_cr": 0.03,
            "previous_cr": 0.025,
            "consecutive_low_days": 0
        }))
        .await;
    response.assert_status_ok();
    let result: Value = response.json();
    assert_eq!(result["status"], "warning");
    assert_eq!(result["blocked_features"].as_array().unwrap().len(), 0);
}

#[tokio::test]
async fn override_requires_reason_and_operator() {
    let harness = TestHarness::new();
    let merchant_id = register_merchant(&harness).await;
    let operator = OperatorId::generate().to_string();

    // Missing operator header.
    let response = harness
        .server
        .post(&format!("/v1/gates/{merchant_id}/override"))
        .add_header("x-admin-key", ADMIN_KEY)
        .json(&json!({"gate_type": "deliverability", "reason": "approved"}))
        .await;
    response.assert_status_bad_request();

    // Empty reason.
    let response = harness
        .server
        .post(&format!("/v1/gates/{merchant_id}/override"))
        .add_header("x-admin-key", ADMIN_KEY)
        .add_header("x-operator-id", operator.clone())
        .json(&json!({"gate_type": "deliverability", "reason": "   "}))
        .await;
    response.assert_status_bad_request();

    // Proper override.
    let response = harness
        .server
        .post(&format!("/v1/gates/{merchant_id}/override"))
        .add_header("x-admin-key", ADMIN_KEY)
        .add_header("x-operator-id", operator.clone())
        .json(&json!({
            "gate_type": "deliverability",
            "reason": "campaign approved by compliance"
        }))
        .await;
    response.assert_status(axum::http::StatusCode::CREATED);
    let entry: Value = response.json();
    assert_eq!(entry["operator_id"], operator);

    // It shows up in the audit trail.
    let response = harness
        .server
        .get(&format!("/v1/gates/{merchant_id}/overrides"))
        .add_header("x-admin-key", ADMIN_KEY)
        .await;
    response.assert_status_ok();
    let trail: Value = response.json();
    assert_eq!(trail.as_array().unwrap().len(), 1);
}

#[tokio::test]
async fn unknown_feature_is_rejected() {
    let harness = TestHarness::new();
    let merchant_id = register_merchant(&harness).await;

    let response = harness
        .server
        .get(&format!("/v1/gates/{merchant_id}/blocked/teleportation"))
        .await;
    response.assert_status_bad_request();
}

#[tokio::test]
async fn gate_endpoints_404_for_unknown_merchant() {
    let harness = TestHarness::new();

    let response = harness
        .server
        .post(&format!(
            "/v1/gates/{}/deliverability",
            MerchantId::generate()
        ))
        .add_header("x-admin-key", ADMIN_KEY)
        .json(&failing_deliverability())
        .await;
    response.assert_status_not_found();
}

//! Webhook ingestion and queue pipeline integration tests.

mod common;

use common::TestHarness;
use serde_json::{json, Value};
use shopsync_core::MerchantId;
use shopsync_store::Store;

fn order_envelope(event_id: &str, merchant_id: MerchantId, source_order_id: i64) -> String {
    json!({
        "event_id": event_id,
        "merchant_id": merchant_id.to_string(),
        "topic": "orders/create",
        "payload": {
            "id": source_order_id,
            "total_price": "42.50",
            "created_at": "2025-06-01T12:00:00Z",
            "customer": {"id": 7, "email": "buyer@example.com"}
        }
    })
    .to_string()
}

async fn post_signed(harness: &TestHarness, body: &str) -> axum_test::TestResponse {
    harness
        .server
        .post("/webhooks/events")
        .add_header("x-webhook-signature", TestHarness::sign(body))
        .text(body.to_string())
        .await
}

#[tokio::test]
async fn signed_event_is_accepted_and_processed() {
    let harness = TestHarness::new();
    let merchant_id = MerchantId::generate();
    let body = order_envelope("evt_1", merchant_id, 1001);

    let response = post_signed(&harness, &body).await;
    response.assert_status_ok();
    let ack: Value = response.json();
    assert_eq!(ack["status"], "accepted");

    harness.drain_queue().await;

    let order = harness
        .store
        .find_order_by_source_id(&merchant_id, 1001)
        .unwrap()
        .expect("order created");
    assert_eq!(order.revenue_cents, 4250);
    assert_eq!(order.source_customer_id, Some(7));

    let customer = harness.store.get_customer(&merchant_id, 7).unwrap().unwrap();
    assert_eq!(customer.email.as_deref(), Some("buyer@example.com"));

    assert!(harness.store.has_processed_event("evt_1").unwrap());
}

#[tokio::test]
async fn redelivered_event_id_is_acknowledged_once() {
    let harness = TestHarness::new();
    let merchant_id = MerchantId::generate();
    let body = order_envelope("evt_dup", merchant_id, 2002);

    post_signed(&harness, &body).await.assert_status_ok();
    harness.drain_queue().await;

    // The platform redelivers the same event_id.
    let response = post_signed(&harness, &body).await;
    response.assert_status_ok();
    let ack: Value = response.json();
    assert_eq!(ack["status"], "duplicate");

    harness.drain_queue().await;

    let orders = harness.store.list_dead_letters(&merchant_id, None).unwrap();
    assert!(orders.is_empty());
    assert!(harness
        .store
        .find_order_by_source_id(&merchant_id, 2002)
        .unwrap()
        .is_some());
}

#[tokio::test]
async fn distinct_events_for_same_order_create_it_once() {
    let harness = TestHarness::new();
    let merchant_id = MerchantId::generate();

    // Same source order delivered under two different event ids.
    post_signed(&harness, &order_envelope("evt_a", merchant_id, 3003))
        .await
        .assert_status_ok();
    post_signed(&harness, &order_envelope("evt_b", merchant_id, 3003))
        .await
        .assert_status_ok();

    harness.drain_queue().await;

    // Both events are ledgered, but the natural key held.
    assert!(harness.store.has_processed_event("evt_a").unwrap());
    assert!(harness.store.has_processed_event("evt_b").unwrap());
    assert!(harness
        .store
        .find_order_by_source_id(&merchant_id, 3003)
        .unwrap()
        .is_some());
    assert!(harness
        .store
        .list_dead_letters(&merchant_id, None)
        .unwrap()
        .is_empty());
}

#[tokio::test]
async fn tampered_signature_is_rejected() {
    let harness = TestHarness::new();
    let body = order_envelope("evt_bad_sig", MerchantId::generate(), 1);

    let response = harness
        .server
        .post("/webhooks/events")
        .add_header("x-webhook-signature", TestHarness::sign("other body"))
        .text(body)
        .await;
    response.assert_status_unauthorized();
}

#[tokio::test]
async fn missing_signature_is_rejected() {
    let harness = TestHarness::new();
    let body = order_envelope("evt_no_sig", MerchantId::generate(), 1);

    let response = harness.server.post("/webhooks/events").text(body).await;
    response.assert_status_unauthorized();
}

#[tokio::test]
async fn unknown_topic_is_rejected_at_the_edge() {
    let harness = TestHarness::new();
    let body = json!({
        "event_id": "evt_refund",
        "merchant_id": MerchantId::generate().to_string(),
        "topic": "refunds/create",
        "payload": {}
    })
    .to_string();

    let response = post_signed(&harness, &body).await;
    response.assert_status_bad_request();
    // Nothing was enqueued or ledgered.
    assert!(!harness.store.has_processed_event("evt_refund").unwrap());
}

#[tokio::test]
async fn malformed_payload_lands_in_dead_letters() {
    let harness = TestHarness::new();
    let merchant_id = MerchantId::generate();
    let body = json!({
        "event_id": "evt_broken",
        "merchant_id": merchant_id.to_string(),
        "topic": "orders/create",
        "payload": {"no_order_id": true}
    })
    .to_string();

    // Accepted at the edge; the payload only fails inside the processor.
    post_signed(&harness, &body).await.assert_status_ok();
    harness.drain_queue().await;

    let letters = harness.store.list_dead_letters(&merchant_id, None).unwrap();
    assert_eq!(letters.len(), 1);
    assert_eq!(letters[0].event_id, "evt_broken");
}

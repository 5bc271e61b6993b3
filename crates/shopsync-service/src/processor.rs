//! Event processor: topic dispatch to idempotent domain handlers.

use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde_json::Value;

use shopsync_core::{
    Customer, EventTopic, InboundEvent, Order, ProcessedEventRecord, SyncError,
};
use shopsync_source::parse_money_cents;
use shopsync_store::{InsertOutcome, RocksStore, Store};

/// The seam between the queue worker and the topic handlers.
#[async_trait]
pub trait ProcessEvent: Send + Sync {
    /// Process one event to completion.
    ///
    /// # Errors
    ///
    /// Permanent errors (`MalformedPayload`) mean the event can never
    /// succeed and must be dead-lettered without retry; everything else is
    /// transient and retryable.
    async fn process(&self, event: &InboundEvent) -> Result<(), SyncError>;
}

/// Processes inbound events against the local store.
///
/// Every handler is idempotent on its natural key, and the idempotency
/// ledger is checked before dispatch, so processing the same event twice is
/// always a no-op.
#[derive(Clone)]
pub struct EventProcessor {
    store: Arc<RocksStore>,
}

impl EventProcessor {
    /// Create a processor over the given store.
    #[must_use]
    pub fn new(store: Arc<RocksStore>) -> Self {
        Self { store }
    }
}

#[async_trait]
impl ProcessEvent for EventProcessor {
    async fn process(&self, event: &InboundEvent) -> Result<(), SyncError> {
        if self
            .store
            .has_processed_event(&event.event_id)
            .map_err(|e| SyncError::Storage(e.to_string()))?
        {
            tracing::debug!(event_id = %event.event_id, "Event already processed, skipping");
            return Ok(());
        }

        match event.topic {
            EventTopic::OrdersCreate | EventTopic::OrdersUpdate => self.handle_order(event),
            EventTopic::CustomersCreate | EventTopic::CustomersUpdate => {
                self.handle_customer(event)
            }
            // Checkout starts carry no durable domain state yet; the ledger
            // record alone makes redelivery a no-op.
            EventTopic::CheckoutsCreate => self
                .store
                .record_processed(&ProcessedEventRecord::for_event(event))
                .map_err(|e| SyncError::Storage(e.to_string())),
        }
    }
}

impl EventProcessor {
    fn handle_order(&self, event: &InboundEvent) -> Result<(), SyncError> {
        let payload = OrderPayload::parse(&event.payload, event.received_at)?;

        let customer = payload.customer_id.map(|source_customer_id| {
            Customer::new(event.merchant_id, source_customer_id, payload.email.clone())
        });
        let order = Order::new(
            event.merchant_id,
            payload.source_order_id,
            payload.customer_id,
            payload.revenue_cents,
            payload.created_at,
        );
        let record = ProcessedEventRecord::for_event(event);

        let outcome = self
            .store
            .apply_order_event(&order, customer.as_ref(), &record)
            .map_err(|e| SyncError::Storage(e.to_string()))?;

        match outcome {
            InsertOutcome::Inserted => tracing::info!(
                event_id = %event.event_id,
                merchant_id = %event.merchant_id,
                source_order_id = payload.source_order_id,
                revenue_cents = payload.revenue_cents,
                "Order recorded"
            ),
            InsertOutcome::Duplicate => tracing::debug!(
                event_id = %event.event_id,
                merchant_id = %event.merchant_id,
                source_order_id = payload.source_order_id,
                "Order already present, ledger recorded"
            ),
        }
        Ok(())
    }

    fn handle_customer(&self, event: &InboundEvent) -> Result<(), SyncError> {
        let source_customer_id = require_i64(&event.payload, "id")?;
        let email = event.payload["email"].as_str().map(ToString::to_string);

        let customer = Customer::new(event.merchant_id, source_customer_id, email);
        let record = ProcessedEventRecord::for_event(event);

        self.store
            .apply_customer_event(&customer, &record)
            .map_err(|e| SyncError::Storage(e.to_string()))?;

        tracing::debug!(
            event_id = %event.event_id,
            merchant_id = %event.merchant_id,
            source_customer_id,
            "Customer upserted"
        );
        Ok(())
    }
}

/// The fields an order event must carry.
struct OrderPayload {
    source_order_id: i64,
    customer_id: Option<i64>,
    email: Option<String>,
    revenue_cents: i64,
    created_at: DateTime<Utc>,
}

impl OrderPayload {
    fn parse(payload: &Value, fallback_time: DateTime<Utc>) -> Result<Self, SyncError> {
        let source_order_id = require_i64(payload, "id")?;

        let total_price = payload["total_price"]
            .as_str()
            .ok_or_else(|| SyncError::MalformedPayload("missing total_price".into()))?;
        let revenue_cents = parse_money_cents(total_price)
            .map_err(|e| SyncError::MalformedPayload(e.to_string()))?;

        let created_at = match payload["created_at"].as_str() {
            Some(s) => s
                .parse::<DateTime<Utc>>()
                .map_err(|_| SyncError::MalformedPayload(format!("bad created_at: {s}")))?,
            None => fallback_time,
        };

        let customer = &payload["customer"];
        let customer_id = customer["id"].as_i64();
        let email = customer["email"]
            .as_str()
            .or_else(|| payload["email"].as_str())
            .map(ToString::to_string);

        Ok(Self {
            source_order_id,
            customer_id,
            email,
            revenue_cents,
            created_at,
        })
    }
}

fn require_i64(payload: &Value, field: &str) -> Result<i64, SyncError> {
    payload[field]
        .as_i64()
        .ok_or_else(|| SyncError::MalformedPayload(format!("missing numeric field: {field}")))
}

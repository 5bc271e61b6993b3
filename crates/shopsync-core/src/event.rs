//! Inbound event types and the queue job envelope.
//!
//! The source platform delivers webhooks at-least-once. Every delivery
//! carries a source-assigned `event_id`; the idempotency ledger
//! ([`ProcessedEventRecord`]) is the sole gate that turns at-least-once
//! delivery into exactly-once effects.

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

use crate::error::SyncError;
use crate::ids::{JobId, MerchantId};

/// Maximum automatic processing attempts before dead-lettering.
pub const MAX_ATTEMPTS: u32 = 3;

/// Base delay for the exponential retry backoff.
pub const RETRY_BASE_SECS: i64 = 2;

/// Webhook topics the pipeline understands.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EventTopic {
    /// A new order was placed.
    OrdersCreate,
    /// An existing order changed.
    OrdersUpdate,
    /// A new customer registered.
    CustomersCreate,
    /// An existing customer changed.
    CustomersUpdate,
    /// A checkout was started.
    CheckoutsCreate,
}

impl EventTopic {
    /// Get the topic as the source platform's topic string.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::OrdersCreate => "orders/create",
            Self::OrdersUpdate => "orders/updated",
            Self::CustomersCreate => "customers/create",
            Self::CustomersUpdate => "customers/update",
            Self::CheckoutsCreate => "checkouts/create",
        }
    }

    /// Parse a source platform topic string.
    ///
    /// # Errors
    ///
    /// Returns `SyncError::UnknownTopic` for topics the pipeline does not
    /// handle; callers dead-letter these without retry.
    pub fn parse(topic: &str) -> Result<Self, SyncError> {
        match topic {
            "orders/create" => Ok(Self::OrdersCreate),
            "orders/updated" => Ok(Self::OrdersUpdate),
            "customers/create" => Ok(Self::CustomersCreate),
            "customers/update" => Ok(Self::CustomersUpdate),
            "checkouts/create" => Ok(Self::CheckoutsCreate),
            other => Err(SyncError::UnknownTopic {
                topic: other.to_string(),
            }),
        }
    }
}

impl std::fmt::Display for EventTopic {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// An inbound webhook event.
///
/// Immutable once received; identity is the source-assigned `event_id`.
/// The payload is an opaque JSON blob passed through to the topic handler.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InboundEvent {
    /// Source-assigned unique event ID.
    pub event_id: String,

    /// The merchant this event belongs to.
    pub merchant_id: MerchantId,

    /// What happened.
    pub topic: EventTopic,

    /// Opaque event payload.
    pub payload: serde_json::Value,

    /// When the event arrived at our edge.
    pub received_at: DateTime<Utc>,
}

impl InboundEvent {
    /// Create an event received now.
    #[must_use]
    pub fn new(
        event_id: String,
        merchant_id: MerchantId,
        topic: EventTopic,
        payload: serde_json::Value,
    ) -> Self {
        Self {
            event_id,
            merchant_id,
            topic,
            payload,
            received_at: Utc::now(),
        }
    }
}

/// Ledger record proving an event's domain mutation durably committed.
///
/// Written in the same storage batch as the mutation; existence of this
/// record for an `event_id` means re-processing that event must be a no-op.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProcessedEventRecord {
    /// The processed event's source-assigned ID.
    pub event_id: String,

    /// The merchant the event belonged to.
    pub merchant_id: MerchantId,

    /// The event's topic.
    pub topic: EventTopic,

    /// When processing committed.
    pub processed_at: DateTime<Utc>,
}

impl ProcessedEventRecord {
    /// Build a ledger record for an event processed now.
    #[must_use]
    pub fn for_event(event: &InboundEvent) -> Self {
        Self {
            event_id: event.event_id.clone(),
            merchant_id: event.merchant_id,
            topic: event.topic,
            processed_at: Utc::now(),
        }
    }
}

/// A durable queue job wrapping an inbound event.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QueueJob {
    /// Job identifier (ULID, time-ordered).
    pub job_id: JobId,

    /// The event to process.
    pub event: InboundEvent,

    /// Attempt counter, starting at 1.
    pub attempt: u32,

    /// Attempts allowed before dead-lettering.
    pub max_attempts: u32,

    /// Earliest time the worker may run this job.
    pub run_at: DateTime<Utc>,

    /// When the job was first enqueued.
    pub created_at: DateTime<Utc>,
}

impl QueueJob {
    /// Enqueue an event for immediate processing with the default retry
    /// budget.
    #[must_use]
    pub fn new(event: InboundEvent) -> Self {
        let now = Utc::now();
        Self {
            job_id: JobId::generate(),
            event,
            attempt: 1,
            max_attempts: MAX_ATTEMPTS,
            run_at: now,
            created_at: now,
        }
    }

    /// Enqueue an event for a single attempt (manual dead-letter retry).
    #[must_use]
    pub fn single_attempt(event: InboundEvent) -> Self {
        Self {
            max_attempts: 1,
            ..Self::new(event)
        }
    }

    /// Whether the retry budget is exhausted.
    #[must_use]
    pub fn exhausted(&self) -> bool {
        self.attempt >= self.max_attempts
    }

    /// Produce the next attempt of this job, delayed by the backoff
    /// schedule.
    #[must_use]
    pub fn next_attempt(mut self, now: DateTime<Utc>) -> Self {
        self.attempt += 1;
        self.run_at = now + retry_delay(self.attempt);
        self
    }
}

/// Exponential backoff delay before the given attempt.
///
/// Attempt 2 waits 2s, attempt 3 waits 4s, attempt 4 waits 8s; the first
/// attempt runs immediately. Capped at five minutes.
#[must_use]
pub fn retry_delay(attempt: u32) -> Duration {
    if attempt <= 1 {
        return Duration::zero();
    }
    let exp = attempt.saturating_sub(2).min(16);
    let secs = RETRY_BASE_SECS.saturating_mul(1_i64 << exp);
    Duration::seconds(secs.min(300))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn topic_roundtrip() {
        for topic in [
            EventTopic::OrdersCreate,
            EventTopic::OrdersUpdate,
            EventTopic::CustomersCreate,
            EventTopic::CustomersUpdate,
            EventTopic::CheckoutsCreate,
        ] {
            assert_eq!(EventTopic::parse(topic.as_str()).unwrap(), topic);
        }
    }

    #[test]
    fn unknown_topic_rejected() {
        let err = EventTopic::parse("refunds/create").unwrap_err();
        assert!(matches!(err, SyncError::UnknownTopic { .. }));
        assert!(err.is_permanent());
    }

    #[test]
    fn retry_delay_schedule() {
        assert_eq!(retry_delay(1), Duration::zero());
        assert_eq!(retry_delay(2), Duration::seconds(2));
        assert_eq!(retry_delay(3), Duration::seconds(4));
        assert_eq!(retry_delay(4), Duration::seconds(8));
    }

    #[test]
    fn retry_delay_caps() {
        assert_eq!(retry_delay(40), Duration::seconds(300));
    }

    #[test]
    fn job_attempt_progression() {
        let event = InboundEvent::new(
            "evt_1".into(),
            MerchantId::generate(),
            EventTopic::OrdersCreate,
            json!({"id": 1}),
        );
        let job = QueueJob::new(event);
        assert_eq!(job.attempt, 1);
        assert!(!job.exhausted());

        let now = Utc::now();
        let job = job.next_attempt(now);
        assert_eq!(job.attempt, 2);
        assert_eq!(job.run_at, now + Duration::seconds(2));

        let job = job.next_attempt(now);
        assert_eq!(job.attempt, 3);
        assert!(job.exhausted());
    }

    #[test]
    fn single_attempt_job_is_exhausted_immediately() {
        let event = InboundEvent::new(
            "evt_2".into(),
            MerchantId::generate(),
            EventTopic::OrdersCreate,
            json!({}),
        );
        let job = QueueJob::single_attempt(event);
        assert_eq!(job.max_attempts, 1);
        assert!(job.exhausted());
    }

    #[test]
    fn processed_record_copies_event_identity() {
        let merchant_id = MerchantId::generate();
        let event = InboundEvent::new(
            "evt_3".into(),
            merchant_id,
            EventTopic::CustomersCreate,
            json!({}),
        );
        let record = ProcessedEventRecord::for_event(&event);
        assert_eq!(record.event_id, "evt_3");
        assert_eq!(record.merchant_id, merchant_id);
        assert_eq!(record.topic, EventTopic::CustomersCreate);
    }
}

//! Dead-letter entries for events that exhausted automatic retries.
//!
//! Entries are append-only audit records: they are created on retry
//! exhaustion and transition through manual dispositions, but are never
//! deleted.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::SyncError;
use crate::event::{EventTopic, InboundEvent};
use crate::ids::{DeadLetterId, MerchantId, OperatorId};

/// Disposition of a dead-lettered event.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DeadLetterStatus {
    /// Automatic retries exhausted; awaiting manual disposition.
    Failed,
    /// A manual retry has been issued and is in flight.
    Retrying,
    /// The manual retry succeeded, or an operator marked it handled.
    /// Terminal.
    Resolved,
    /// An operator decided the event should not be replayed. Terminal.
    Ignored,
}

impl DeadLetterStatus {
    /// Get the status as a string.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Failed => "failed",
            Self::Retrying => "retrying",
            Self::Resolved => "resolved",
            Self::Ignored => "ignored",
        }
    }

    /// Parse a status string (used by list filters).
    ///
    /// # Errors
    ///
    /// Returns `SyncError::MalformedPayload` for unknown status strings.
    pub fn parse(s: &str) -> Result<Self, SyncError> {
        match s {
            "failed" => Ok(Self::Failed),
            "retrying" => Ok(Self::Retrying),
            "resolved" => Ok(Self::Resolved),
            "ignored" => Ok(Self::Ignored),
            other => Err(SyncError::MalformedPayload(format!(
                "unknown dead letter status: {other}"
            ))),
        }
    }
}

impl std::fmt::Display for DeadLetterStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// An event that could not be processed after exhausting automatic retries.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DeadLetterEntry {
    /// Entry identifier (ULID, time-ordered).
    pub id: DeadLetterId,

    /// The merchant the event belonged to.
    pub merchant_id: MerchantId,

    /// The source-assigned event ID.
    pub event_id: String,

    /// The event's topic.
    pub topic: EventTopic,

    /// The original payload, preserved for replay.
    pub payload: serde_json::Value,

    /// The final error message.
    pub error_message: String,

    /// The full error chain, for operator diagnosis.
    pub error_detail: String,

    /// Attempts charged against the event: the automatic attempts spent
    /// before capture, plus one per manual retry.
    pub retry_count: u32,

    /// When the last manual retry was issued.
    pub last_retry_at: Option<DateTime<Utc>>,

    /// Current disposition.
    pub status: DeadLetterStatus,

    /// Operator notes recorded at resolve/ignore time.
    pub resolution_notes: Option<String>,

    /// The operator who resolved or ignored the entry.
    pub resolved_by: Option<OperatorId>,

    /// When the entry was created.
    pub created_at: DateTime<Utc>,
}

impl DeadLetterEntry {
    /// Capture a failed event with its final error.
    ///
    /// `attempts` is the number of automatic attempts already spent; retry
    /// exhaustion passes its full budget, permanent failures that never
    /// retried pass 0.
    #[must_use]
    pub fn capture(
        event: &InboundEvent,
        error_message: String,
        error_detail: String,
        attempts: u32,
    ) -> Self {
        Self {
            id: DeadLetterId::generate(),
            merchant_id: event.merchant_id,
            event_id: event.event_id.clone(),
            topic: event.topic,
            payload: event.payload.clone(),
            error_message,
            error_detail,
            retry_count: attempts,
            last_retry_at: None,
            status: DeadLetterStatus::Failed,
            resolution_notes: None,
            resolved_by: None,
            created_at: Utc::now(),
        }
    }

    /// Rebuild the inbound event for replay through the queue.
    #[must_use]
    pub fn to_event(&self) -> InboundEvent {
        InboundEvent {
            event_id: self.event_id.clone(),
            merchant_id: self.merchant_id,
            topic: self.topic,
            payload: self.payload.clone(),
            received_at: self.created_at,
        }
    }

    /// Begin a manual retry.
    ///
    /// # Errors
    ///
    /// Rejects entries that are already `Resolved` or `Ignored`.
    pub fn begin_retry(&mut self) -> Result<(), SyncError> {
        match self.status {
            DeadLetterStatus::Failed | DeadLetterStatus::Retrying => {
                self.status = DeadLetterStatus::Retrying;
                self.retry_count += 1;
                self.last_retry_at = Some(Utc::now());
                Ok(())
            }
            status @ (DeadLetterStatus::Resolved | DeadLetterStatus::Ignored) => {
                Err(SyncError::InvalidDeadLetterTransition {
                    from: status.to_string(),
                    to: DeadLetterStatus::Retrying.to_string(),
                })
            }
        }
    }

    /// Record the outcome of a manual retry.
    ///
    /// Success resolves the entry; failure returns it to `Failed` with the
    /// new error recorded.
    pub fn finish_retry(&mut self, result: Result<(), &SyncError>) {
        match result {
            Ok(()) => {
                self.status = DeadLetterStatus::Resolved;
                self.resolution_notes = Some("resolved by manual retry".to_string());
            }
            Err(err) => {
                self.status = DeadLetterStatus::Failed;
                self.error_message = err.to_string();
            }
        }
    }

    /// Mark the entry resolved by operator decision.
    ///
    /// # Errors
    ///
    /// Rejects entries that are already `Ignored`.
    pub fn resolve(&mut self, operator: OperatorId, notes: String) -> Result<(), SyncError> {
        if self.status == DeadLetterStatus::Ignored {
            return Err(SyncError::InvalidDeadLetterTransition {
                from: self.status.to_string(),
                to: DeadLetterStatus::Resolved.to_string(),
            });
        }
        self.status = DeadLetterStatus::Resolved;
        self.resolved_by = Some(operator);
        self.resolution_notes = Some(notes);
        Ok(())
    }

    /// Mark the entry ignored by operator decision. Terminal.
    ///
    /// # Errors
    ///
    /// Rejects entries that are already `Resolved`.
    pub fn ignore(&mut self, operator: OperatorId, reason: String) -> Result<(), SyncError> {
        if self.status == DeadLetterStatus::Resolved {
            return Err(SyncError::InvalidDeadLetterTransition {
                from: self.status.to_string(),
                to: DeadLetterStatus::Ignored.to_string(),
            });
        }
        self.status = DeadLetterStatus::Ignored;
        self.resolved_by = Some(operator);
        self.resolution_notes = Some(reason);
        Ok(())
    }
}

/// Per-merchant dead-letter counts by status.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize)]
pub struct DeadLetterStats {
    /// Entries awaiting disposition.
    pub failed: u64,
    /// Entries with a manual retry in flight.
    pub retrying: u64,
    /// Resolved entries.
    pub resolved: u64,
    /// Ignored entries.
    pub ignored: u64,
}

impl DeadLetterStats {
    /// Add one entry to the matching counter.
    pub fn record(&mut self, status: DeadLetterStatus) {
        match status {
            DeadLetterStatus::Failed => self.failed += 1,
            DeadLetterStatus::Retrying => self.retrying += 1,
            DeadLetterStatus::Resolved => self.resolved += 1,
            DeadLetterStatus::Ignored => self.ignored += 1,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::event::EventTopic;
    use serde_json::json;

    fn sample_entry() -> DeadLetterEntry {
        let event = InboundEvent::new(
            "evt_dead".into(),
            MerchantId::generate(),
            EventTopic::OrdersCreate,
            json!({"id": 7}),
        );
        DeadLetterEntry::capture(&event, "boom".into(), "boom: storage error".into(), 0)
    }

    #[test]
    fn capture_starts_failed() {
        let entry = sample_entry();
        assert_eq!(entry.status, DeadLetterStatus::Failed);
        assert_eq!(entry.retry_count, 0);
        assert!(entry.last_retry_at.is_none());
    }

    #[test]
    fn capture_carries_exhausted_attempts() {
        let event = InboundEvent::new(
            "evt_spent".into(),
            MerchantId::generate(),
            EventTopic::OrdersCreate,
            json!({"id": 8}),
        );
        let mut entry =
            DeadLetterEntry::capture(&event, "boom".into(), "boom: storage error".into(), 3);
        assert_eq!(entry.retry_count, 3);

        // Manual retries count on top of the automatic ones.
        entry.begin_retry().unwrap();
        assert_eq!(entry.retry_count, 4);
    }

    #[test]
    fn retry_lifecycle_success() {
        let mut entry = sample_entry();
        entry.begin_retry().unwrap();
        assert_eq!(entry.status, DeadLetterStatus::Retrying);
        assert_eq!(entry.retry_count, 1);
        assert!(entry.last_retry_at.is_some());

        entry.finish_retry(Ok(()));
        assert_eq!(entry.status, DeadLetterStatus::Resolved);
    }

    #[test]
    fn retry_lifecycle_failure_returns_to_failed() {
        let mut entry = sample_entry();
        entry.begin_retry().unwrap();
        let err = SyncError::Storage("still broken".into());
        entry.finish_retry(Err(&err));
        assert_eq!(entry.status, DeadLetterStatus::Failed);
        assert_eq!(entry.error_message, "storage error: still broken");
    }

    #[test]
    fn retry_rejected_after_resolve() {
        let mut entry = sample_entry();
        entry
            .resolve(OperatorId::generate(), "handled manually".into())
            .unwrap();
        assert!(matches!(
            entry.begin_retry(),
            Err(SyncError::InvalidDeadLetterTransition { .. })
        ));
    }

    #[test]
    fn ignore_is_terminal() {
        let mut entry = sample_entry();
        entry
            .ignore(OperatorId::generate(), "test noise".into())
            .unwrap();
        assert_eq!(entry.status, DeadLetterStatus::Ignored);
        assert!(entry.resolved_by.is_some());
        assert!(matches!(
            entry.begin_retry(),
            Err(SyncError::InvalidDeadLetterTransition { .. })
        ));
    }

    #[test]
    fn replay_event_preserves_identity() {
        let entry = sample_entry();
        let event = entry.to_event();
        assert_eq!(event.event_id, entry.event_id);
        assert_eq!(event.payload, entry.payload);
    }

    #[test]
    fn stats_counts_by_status() {
        let mut stats = DeadLetterStats::default();
        stats.record(DeadLetterStatus::Failed);
        stats.record(DeadLetterStatus::Failed);
        stats.record(DeadLetterStatus::Resolved);
        assert_eq!(stats.failed, 2);
        assert_eq!(stats.resolved, 1);
        assert_eq!(stats.ignored, 0);
    }
}

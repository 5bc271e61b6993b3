//! Dead-letter manager: manual dispositions of failed events.

use std::sync::Arc;

use shopsync_core::{
    DeadLetterEntry, DeadLetterId, DeadLetterStats, DeadLetterStatus, MerchantId, OperatorId,
    QueueJob, SyncError,
};
use shopsync_store::{RocksStore, Store};

use crate::processor::{EventProcessor, ProcessEvent};

/// Operator-facing API over the dead-letter store.
pub struct DeadLetterManager {
    store: Arc<RocksStore>,
    processor: EventProcessor,
    alert_threshold: u64,
}

impl DeadLetterManager {
    /// Create a manager over the given store.
    #[must_use]
    pub fn new(store: Arc<RocksStore>, processor: EventProcessor, alert_threshold: u64) -> Self {
        Self {
            store,
            processor,
            alert_threshold,
        }
    }

    /// Manually retry a dead-lettered event once.
    ///
    /// The original payload is replayed through the same processor the
    /// queue uses, as a single attempt with no backoff. Success resolves
    /// the entry; failure records the new error and returns it to FAILED.
    ///
    /// # Errors
    ///
    /// Returns an error when the entry does not exist or is already in a
    /// terminal status. A failing replay is not an error; the updated
    /// entry reports it.
    pub async fn retry(&self, id: &DeadLetterId) -> Result<DeadLetterEntry, SyncError> {
        let mut entry = self.get(id)?;
        entry.begin_retry()?;
        self.store
            .update_dead_letter(&entry)
            .map_err(|e| SyncError::Storage(e.to_string()))?;

        let job = QueueJob::single_attempt(entry.to_event());
        let result = self.processor.process(&job.event).await;

        match &result {
            Ok(()) => tracing::info!(
                dead_letter_id = %entry.id,
                event_id = %entry.event_id,
                retry_count = entry.retry_count,
                "Manual retry succeeded"
            ),
            Err(err) => tracing::warn!(
                dead_letter_id = %entry.id,
                event_id = %entry.event_id,
                retry_count = entry.retry_count,
                error = %err,
                "Manual retry failed"
            ),
        }

        entry.finish_retry(result.as_ref().copied());
        self.store
            .update_dead_letter(&entry)
            .map_err(|e| SyncError::Storage(e.to_string()))?;
        Ok(entry)
    }

    /// Mark an entry resolved by operator decision.
    ///
    /// # Errors
    ///
    /// Returns an error when the entry does not exist or is `Ignored`.
    pub fn resolve(
        &self,
        id: &DeadLetterId,
        operator: OperatorId,
        notes: String,
    ) -> Result<DeadLetterEntry, SyncError> {
        let mut entry = self.get(id)?;
        entry.resolve(operator, notes)?;
        self.store
            .update_dead_letter(&entry)
            .map_err(|e| SyncError::Storage(e.to_string()))?;
        tracing::info!(
            dead_letter_id = %entry.id,
            operator_id = %operator,
            "Dead letter resolved by operator"
        );
        Ok(entry)
    }

    /// Mark an entry ignored by operator decision. Terminal.
    ///
    /// # Errors
    ///
    /// Returns an error when the entry does not exist or is `Resolved`.
    pub fn ignore(
        &self,
        id: &DeadLetterId,
        operator: OperatorId,
        reason: String,
    ) -> Result<DeadLetterEntry, SyncError> {
        let mut entry = self.get(id)?;
        entry.ignore(operator, reason)?;
        self.store
            .update_dead_letter(&entry)
            .map_err(|e| SyncError::Storage(e.to_string()))?;
        tracing::info!(
            dead_letter_id = %entry.id,
            operator_id = %operator,
            "Dead letter ignored by operator"
        );
        Ok(entry)
    }

    /// List a merchant's dead letters, optionally filtered by status.
    ///
    /// # Errors
    ///
    /// Returns an error if the listing fails.
    pub fn list(
        &self,
        merchant_id: &MerchantId,
        status: Option<DeadLetterStatus>,
    ) -> Result<Vec<DeadLetterEntry>, SyncError> {
        self.store
            .list_dead_letters(merchant_id, status)
            .map_err(|e| SyncError::Storage(e.to_string()))
    }

    /// Count a merchant's dead letters by status.
    ///
    /// Logs an alert warning when the FAILED count reaches the configured
    /// threshold.
    ///
    /// # Errors
    ///
    /// Returns an error if the count fails.
    pub fn stats(&self, merchant_id: &MerchantId) -> Result<DeadLetterStats, SyncError> {
        let stats = self
            .store
            .dead_letter_stats(merchant_id)
            .map_err(|e| SyncError::Storage(e.to_string()))?;

        if stats.failed >= self.alert_threshold {
            tracing::warn!(
                merchant_id = %merchant_id,
                failed = stats.failed,
                threshold = self.alert_threshold,
                "Dead letter backlog over alert threshold"
            );
        }
        Ok(stats)
    }

    fn get(&self, id: &DeadLetterId) -> Result<DeadLetterEntry, SyncError> {
        self.store
            .get_dead_letter(id)
            .map_err(|e| SyncError::Storage(e.to_string()))?
            .ok_or_else(|| SyncError::DeadLetterNotFound { id: id.to_string() })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use shopsync_core::{EventTopic, InboundEvent};
    use tempfile::TempDir;

    fn setup() -> (DeadLetterManager, Arc<RocksStore>, TempDir) {
        let dir = TempDir::new().unwrap();
        let store = Arc::new(RocksStore::open(dir.path()).unwrap());
        let manager = DeadLetterManager::new(
            Arc::clone(&store),
            EventProcessor::new(Arc::clone(&store)),
            10,
        );
        (manager, store, dir)
    }

    fn dead_letter_with_payload(
        store: &RocksStore,
        merchant_id: MerchantId,
        payload: serde_json::Value,
    ) -> DeadLetterEntry {
        let event = InboundEvent::new(
            "evt_dlq".into(),
            merchant_id,
            EventTopic::OrdersCreate,
            payload,
        );
        let entry = DeadLetterEntry::capture(&event, "timeout".into(), "timeout detail".into(), 3);
        store.put_dead_letter(&entry).unwrap();
        entry
    }

    #[tokio::test]
    async fn retry_with_valid_payload_resolves() {
        let (manager, store, _dir) = setup();
        let merchant_id = MerchantId::generate();
        // Captured during a transient outage; the payload itself is fine.
        let entry = dead_letter_with_payload(
            &store,
            merchant_id,
            json!({"id": 9, "total_price": "12.00"}),
        );

        let updated = manager.retry(&entry.id).await.unwrap();
        assert_eq!(updated.status, DeadLetterStatus::Resolved);
        // Three automatic attempts at capture, plus this manual one.
        assert_eq!(updated.retry_count, 4);
        assert!(updated.last_retry_at.is_some());
        assert!(store
            .find_order_by_source_id(&merchant_id, 9)
            .unwrap()
            .is_some());
    }

    #[tokio::test]
    async fn retry_with_broken_payload_returns_to_failed() {
        let (manager, store, _dir) = setup();
        let merchant_id = MerchantId::generate();
        let entry = dead_letter_with_payload(&store, merchant_id, json!({"wrong": true}));

        let updated = manager.retry(&entry.id).await.unwrap();
        assert_eq!(updated.status, DeadLetterStatus::Failed);
        // Three automatic attempts at capture, plus this manual one.
        assert_eq!(updated.retry_count, 4);
        assert!(updated.error_message.contains("malformed payload"));
    }

    #[tokio::test]
    async fn retry_of_resolved_entry_rejected() {
        let (manager, store, _dir) = setup();
        let merchant_id = MerchantId::generate();
        let entry = dead_letter_with_payload(
            &store,
            merchant_id,
            json!({"id": 1, "total_price": "1.00"}),
        );

        manager
            .resolve(&entry.id, OperatorId::generate(), "handled".into())
            .unwrap();

        let err = manager.retry(&entry.id).await.unwrap_err();
        assert!(matches!(err, SyncError::InvalidDeadLetterTransition { .. }));
    }

    #[tokio::test]
    async fn missing_entry_is_not_found() {
        let (manager, _store, _dir) = setup();
        let err = manager.retry(&DeadLetterId::generate()).await.unwrap_err();
        assert!(matches!(err, SyncError::DeadLetterNotFound { .. }));
    }
}

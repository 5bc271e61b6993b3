//! Durable event queue and its worker.
//!
//! The webhook edge acknowledges as soon as the job is persisted
//! (ack-then-process); the worker is the queue's single consumer, so
//! within the queue path natural-key writes never race each other.

use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use tokio::sync::Notify;

use shopsync_core::{DeadLetterEntry, InboundEvent, QueueJob, SyncError};
use shopsync_store::{RocksStore, Store, StoreError};

use crate::processor::{EventProcessor, ProcessEvent};

/// How many due jobs the worker pulls per drain pass.
const DRAIN_BATCH_SIZE: usize = 32;

/// What the edge tells the webhook caller.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EnqueueOutcome {
    /// The event was persisted for processing.
    Accepted,
    /// The event was already processed; nothing was enqueued.
    Duplicate,
}

/// Front door of the durable queue.
pub struct EventQueue {
    store: Arc<RocksStore>,
    notify: Arc<Notify>,
}

impl EventQueue {
    /// Create a queue over the given store.
    #[must_use]
    pub fn new(store: Arc<RocksStore>) -> Self {
        Self {
            store,
            notify: Arc::new(Notify::new()),
        }
    }

    /// Persist an event for processing and wake the worker.
    ///
    /// Checks the idempotency ledger first so redelivered events are
    /// acknowledged without re-enqueueing. Returns before any domain
    /// mutation happens.
    ///
    /// # Errors
    ///
    /// Returns an error if the ledger check or the enqueue write fails.
    pub fn enqueue(&self, event: InboundEvent) -> Result<EnqueueOutcome, StoreError> {
        if self.store.has_processed_event(&event.event_id)? {
            tracing::debug!(event_id = %event.event_id, "Duplicate event, not enqueued");
            return Ok(EnqueueOutcome::Duplicate);
        }

        let job = QueueJob::new(event);
        self.store.enqueue_job(&job)?;
        self.notify.notify_one();

        tracing::debug!(
            job_id = %job.job_id,
            event_id = %job.event.event_id,
            topic = %job.event.topic,
            "Event enqueued"
        );
        Ok(EnqueueOutcome::Accepted)
    }

    /// The worker's wakeup handle.
    #[must_use]
    pub fn notify_handle(&self) -> Arc<Notify> {
        Arc::clone(&self.notify)
    }
}

/// Single consumer of the durable queue.
pub struct QueueWorker<P: ProcessEvent = EventProcessor> {
    store: Arc<RocksStore>,
    processor: P,
    notify: Arc<Notify>,
    poll_interval: Duration,
}

impl<P: ProcessEvent> QueueWorker<P> {
    /// Create a worker draining the given queue.
    #[must_use]
    pub fn new(
        store: Arc<RocksStore>,
        processor: P,
        notify: Arc<Notify>,
        poll_interval: Duration,
    ) -> Self {
        Self {
            store,
            processor,
            notify,
            poll_interval,
        }
    }

    /// Run the worker loop forever.
    ///
    /// Woken by enqueues and by a poll ticker (retries become due without a
    /// new enqueue).
    pub async fn run(self) {
        let mut ticker = tokio::time::interval(self.poll_interval);
        loop {
            tokio::select! {
                () = self.notify.notified() => {}
                _ = ticker.tick() => {}
            }
            if let Err(e) = self.drain_due().await {
                tracing::error!(error = %e, "Queue drain failed");
            }
        }
    }

    /// Process every currently-due job.
    ///
    /// # Errors
    ///
    /// Returns an error only on storage failure; job-level failures are
    /// handled by the retry policy.
    pub async fn drain_due(&self) -> Result<(), StoreError> {
        loop {
            let due = self.store.due_jobs(Utc::now(), DRAIN_BATCH_SIZE)?;
            if due.is_empty() {
                return Ok(());
            }
            for job in due {
                self.handle_job(job).await?;
            }
        }
    }

    async fn handle_job(&self, job: QueueJob) -> Result<(), StoreError> {
        match self.processor.process(&job.event).await {
            Ok(()) => self.store.remove_job(&job),
            Err(err) if err.is_permanent() => {
                tracing::warn!(
                    job_id = %job.job_id,
                    event_id = %job.event.event_id,
                    error = %err,
                    "Permanent failure, dead-lettering without retry"
                );
                self.dead_letter(&job, &err, 0)?;
                self.store.remove_job(&job)
            }
            Err(err) if job.exhausted() => {
                tracing::warn!(
                    job_id = %job.job_id,
                    event_id = %job.event.event_id,
                    attempt = job.attempt,
                    error = %err,
                    "Retries exhausted, dead-lettering"
                );
                self.dead_letter(&job, &err, job.attempt)?;
                self.store.remove_job(&job)
            }
            Err(err) => {
                let next = job.clone().next_attempt(Utc::now());
                tracing::info!(
                    job_id = %job.job_id,
                    event_id = %job.event.event_id,
                    attempt = next.attempt,
                    run_at = %next.run_at,
                    error = %err,
                    "Transient failure, rescheduling"
                );
                self.store.reschedule_job(&job, &next)
            }
        }
    }

    /// Capture the job's event with the attempts spent on it. Exhaustion
    /// passes the full budget; permanent failures never retried pass 0.
    fn dead_letter(&self, job: &QueueJob, err: &SyncError, attempts: u32) -> Result<(), StoreError> {
        let entry =
            DeadLetterEntry::capture(&job.event, err.to_string(), format!("{err:?}"), attempts);
        tracing::error!(
            dead_letter_id = %entry.id,
            event_id = %entry.event_id,
            merchant_id = %entry.merchant_id,
            attempts,
            "Event dead-lettered"
        );
        self.store.put_dead_letter(&entry)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use shopsync_core::{DeadLetterStatus, EventTopic, MerchantId, ProcessedEventRecord};
    use std::sync::atomic::{AtomicU32, Ordering};
    use tempfile::TempDir;

    fn setup() -> (EventQueue, QueueWorker, Arc<RocksStore>, TempDir) {
        let dir = TempDir::new().unwrap();
        let store = Arc::new(RocksStore::open(dir.path()).unwrap());
        let queue = EventQueue::new(Arc::clone(&store));
        let worker = QueueWorker::new(
            Arc::clone(&store),
            EventProcessor::new(Arc::clone(&store)),
            queue.notify_handle(),
            Duration::from_millis(50),
        );
        (queue, worker, store, dir)
    }

    fn good_order_event(event_id: &str, merchant_id: MerchantId) -> InboundEvent {
        InboundEvent::new(
            event_id.into(),
            merchant_id,
            EventTopic::OrdersCreate,
            json!({"id": 1, "total_price": "10.00"}),
        )
    }

    #[tokio::test]
    async fn enqueue_then_drain_processes_event() {
        let (queue, worker, store, _dir) = setup();
        let merchant_id = MerchantId::generate();

        let outcome = queue
            .enqueue(good_order_event("evt_q1", merchant_id))
            .unwrap();
        assert_eq!(outcome, EnqueueOutcome::Accepted);

        worker.drain_due().await.unwrap();

        assert!(store.has_processed_event("evt_q1").unwrap());
        assert!(store.due_jobs(Utc::now(), 10).unwrap().is_empty());
    }

    #[tokio::test]
    async fn duplicate_event_not_enqueued() {
        let (queue, _worker, store, _dir) = setup();
        let merchant_id = MerchantId::generate();
        let event = good_order_event("evt_q2", merchant_id);

        store
            .record_processed(&ProcessedEventRecord::for_event(&event))
            .unwrap();

        let outcome = queue.enqueue(event).unwrap();
        assert_eq!(outcome, EnqueueOutcome::Duplicate);
        assert!(store.due_jobs(Utc::now(), 10).unwrap().is_empty());
    }

    #[tokio::test]
    async fn permanent_failure_dead_letters_without_retry() {
        let (queue, worker, store, _dir) = setup();
        let merchant_id = MerchantId::generate();
        let event = InboundEvent::new(
            "evt_q3".into(),
            merchant_id,
            EventTopic::OrdersCreate,
            json!({"wrong": "shape"}),
        );

        queue.enqueue(event).unwrap();
        worker.drain_due().await.unwrap();

        let letters = store.list_dead_letters(&merchant_id, None).unwrap();
        assert_eq!(letters.len(), 1);
        assert_eq!(letters[0].status, DeadLetterStatus::Failed);
        assert_eq!(letters[0].event_id, "evt_q3");
        // Never retried, so no attempts are charged.
        assert_eq!(letters[0].retry_count, 0);
        // The job is gone, not waiting on a backoff slot.
        assert!(store
            .due_jobs(Utc::now() + chrono::Duration::hours(1), 10)
            .unwrap()
            .is_empty());
    }

    /// Fails every attempt with a transient error.
    struct UpstreamDown {
        calls: AtomicU32,
    }

    #[async_trait::async_trait]
    impl ProcessEvent for UpstreamDown {
        async fn process(&self, _event: &InboundEvent) -> Result<(), SyncError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Err(SyncError::Storage("upstream down".into()))
        }
    }

    #[tokio::test]
    async fn transient_failures_exhaust_into_dead_letter() {
        let dir = TempDir::new().unwrap();
        let store = Arc::new(RocksStore::open(dir.path()).unwrap());
        let worker = QueueWorker::new(
            Arc::clone(&store),
            UpstreamDown {
                calls: AtomicU32::new(0),
            },
            Arc::new(Notify::new()),
            Duration::from_millis(50),
        );
        let merchant_id = MerchantId::generate();
        store
            .enqueue_job(&QueueJob::new(good_order_event("evt_down", merchant_id)))
            .unwrap();

        // Walk the job through its whole retry budget without waiting out
        // the backoff: each pass picks the rescheduled job up from wherever
        // it landed.
        let horizon = chrono::Duration::minutes(5);
        for expected_attempt in 1..=3 {
            let due = store.due_jobs(Utc::now() + horizon, 10).unwrap();
            assert_eq!(due.len(), 1);
            assert_eq!(due[0].attempt, expected_attempt);
            worker.handle_job(due[0].clone()).await.unwrap();
            if expected_attempt < 3 {
                // Rescheduled into a backoff slot, not immediately due.
                assert!(store.due_jobs(Utc::now(), 10).unwrap().is_empty());
            }
        }
        assert_eq!(worker.processor.calls.load(Ordering::SeqCst), 3);

        // Exhausted: the job is gone and the entry records every attempt.
        assert!(store.due_jobs(Utc::now() + horizon, 10).unwrap().is_empty());
        let letters = store.list_dead_letters(&merchant_id, None).unwrap();
        assert_eq!(letters.len(), 1);
        assert_eq!(letters[0].status, DeadLetterStatus::Failed);
        assert_eq!(letters[0].event_id, "evt_down");
        assert_eq!(letters[0].retry_count, 3);
        assert!(letters[0].error_message.contains("upstream down"));
    }
}

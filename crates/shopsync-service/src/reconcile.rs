//! Reconciliation sweep: detect and repair webhook deliveries we missed.
//!
//! The source platform is the system of record. The sweep re-fetches a
//! trailing order window and replays anything absent locally through the
//! same idempotent handler path the queue uses. It only repairs; existing
//! rows are never mutated.

use std::sync::Arc;

use chrono::{Duration, Utc};
use serde::Serialize;

use shopsync_core::{Customer, Merchant, Order, ProcessedEventRecord, SyncError};
use shopsync_source::{CommerceClient, SourceOrder};
use shopsync_store::{InsertOutcome, RocksStore, Store};

/// What one merchant sweep found and did.
#[derive(Debug, Clone, Default, Serialize)]
pub struct ReconciliationReport {
    /// Source orders inspected in the window.
    pub checked_orders: u64,
    /// Orders present upstream but absent locally.
    pub missed_orders: u64,
    /// Source ids of the orders this sweep created.
    pub created_orders: Vec<i64>,
    /// Per-order failures (logged, never fatal to the sweep).
    pub errors: Vec<String>,
}

/// Periodic repair sweep against the source platform.
pub struct Reconciler {
    store: Arc<RocksStore>,
    commerce: Arc<CommerceClient>,
    lookback: Duration,
}

impl Reconciler {
    /// Create a reconciler with the given trailing lookback window.
    #[must_use]
    pub fn new(store: Arc<RocksStore>, commerce: Arc<CommerceClient>, lookback: Duration) -> Self {
        Self {
            store,
            commerce,
            lookback,
        }
    }

    /// Sweep one merchant's trailing window.
    ///
    /// # Errors
    ///
    /// Returns an error only when the source listing or local storage
    /// infrastructure fails; individual bad orders land in the report.
    pub async fn run_for_merchant(
        &self,
        merchant: &Merchant,
    ) -> Result<ReconciliationReport, SyncError> {
        let to = Utc::now();
        let from = to - self.lookback;

        let source_orders = self
            .commerce
            .orders_in_window(&merchant.shop_domain, &merchant.access_token, from, to)
            .await
            .map_err(|e| SyncError::ExternalService {
                service: "commerce".into(),
                message: e.to_string(),
            })?;

        let mut report = ReconciliationReport::default();
        for source_order in source_orders {
            report.checked_orders += 1;
            match self.repair_if_missing(merchant, &source_order) {
                Ok(None) => {}
                Ok(Some(outcome)) => {
                    report.missed_orders += 1;
                    if outcome == InsertOutcome::Inserted {
                        report.created_orders.push(source_order.id);
                    }
                }
                Err(err) => {
                    tracing::warn!(
                        merchant_id = %merchant.id,
                        source_order_id = source_order.id,
                        error = %err,
                        "Reconciliation skipped order"
                    );
                    report
                        .errors
                        .push(format!("order {}: {err}", source_order.id));
                }
            }
        }

        tracing::info!(
            merchant_id = %merchant.id,
            checked = report.checked_orders,
            missed = report.missed_orders,
            created = report.created_orders.len(),
            errors = report.errors.len(),
            "Reconciliation sweep finished"
        );
        Ok(report)
    }

    /// Sweep every active merchant, continue-on-error.
    pub async fn sweep(&self) -> Vec<(Merchant, ReconciliationReport)> {
        let merchants = match self.store.list_active_merchants() {
            Ok(merchants) => merchants,
            Err(e) => {
                tracing::error!(error = %e, "Reconciliation sweep could not list merchants");
                return Vec::new();
            }
        };

        let mut results = Vec::new();
        for merchant in merchants {
            match self.run_for_merchant(&merchant).await {
                Ok(report) => results.push((merchant, report)),
                Err(err) => {
                    tracing::error!(
                        merchant_id = %merchant.id,
                        error = %err,
                        "Reconciliation failed for merchant"
                    );
                }
            }
        }
        results
    }

    /// Check one source order's natural key and replay it when absent.
    ///
    /// Returns `None` when the order was already present, otherwise the
    /// insert outcome (a concurrent queue write can still win the race and
    /// report `Duplicate`; that is convergence, not an error).
    fn repair_if_missing(
        &self,
        merchant: &Merchant,
        source_order: &SourceOrder,
    ) -> Result<Option<InsertOutcome>, SyncError> {
        let existing = self
            .store
            .find_order_by_source_id(&merchant.id, source_order.id)
            .map_err(|e| SyncError::Storage(e.to_string()))?;
        if existing.is_some() {
            return Ok(None);
        }

        let revenue_cents = source_order
            .revenue_cents()
            .map_err(|e| SyncError::MalformedPayload(e.to_string()))?;

        let customer = source_order.customer.as_ref().map(|c| {
            Customer::new(
                merchant.id,
                c.id,
                c.email.clone().or_else(|| source_order.email.clone()),
            )
        });
        let order = Order::new(
            merchant.id,
            source_order.id,
            source_order.customer.as_ref().map(|c| c.id),
            revenue_cents,
            source_order.created_at,
        );

        // Synthetic ledger identity: the webhook for this order (if it ever
        // arrives late) carries its own event_id and dedupes on the natural
        // key instead.
        let record = ProcessedEventRecord {
            event_id: format!("reconcile:{}:{}", merchant.id, source_order.id),
            merchant_id: merchant.id,
            topic: shopsync_core::EventTopic::OrdersCreate,
            processed_at: Utc::now(),
        };

        let outcome = self
            .store
            .apply_order_event(&order, customer.as_ref(), &record)
            .map_err(|e| SyncError::Storage(e.to_string()))?;

        if outcome == InsertOutcome::Inserted {
            tracing::info!(
                merchant_id = %merchant.id,
                source_order_id = source_order.id,
                revenue_cents,
                "Reconciliation repaired missed order"
            );
        }
        Ok(Some(outcome))
    }
}

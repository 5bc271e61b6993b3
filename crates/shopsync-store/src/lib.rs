//! `RocksDB` storage layer for shopsync.
//!
//! This crate provides persistent storage for the event-reliability
//! pipeline: the merchant registry, orders and customers, the idempotency
//! ledger, the durable work queue, dead letters, baselines, and gate state.
//!
//! # Architecture
//!
//! Values are CBOR-encoded; compound binary keys put the merchant first so
//! per-merchant data prefix-scans. Two invariants live here rather than in
//! application code:
//!
//! - `(merchant_id, source_order_id)` uniqueness is enforced by the
//!   `orders_by_source` index, checked and written under the store's write
//!   lock, so concurrent queue and reconciliation writers cannot both
//!   insert. The losing writer observes [`InsertOutcome::Duplicate`].
//! - A domain mutation and its [`ProcessedEventRecord`] ledger entry are
//!   written in one `WriteBatch`: either both commit or neither does.
//!
//! # Example
//!
//! ```no_run
//! use shopsync_store::{RocksStore, Store};
//! use shopsync_core::Merchant;
//!
//! let store = RocksStore::open("/tmp/shopsync-db").unwrap();
//! let merchant = Merchant::new("shop.example.com".into(), "tok".into());
//! store.put_merchant(&merchant).unwrap();
//! let active = store.list_active_merchants().unwrap();
//! ```

#![forbid(unsafe_code)]
#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]

pub mod error;
pub mod keys;
pub mod rocks;
pub mod schema;

pub use error::{Result, StoreError};
pub use rocks::RocksStore;

use chrono::{DateTime, Utc};

use shopsync_core::{
    Baseline, Customer, DeadLetterEntry, DeadLetterId, DeadLetterStats, DeadLetterStatus,
    GateOverride, GateState, GateType, Merchant, MerchantId, Order, ProcessedEventRecord,
    QueueJob,
};

/// Result of a natural-key guarded insert.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InsertOutcome {
    /// The row was inserted.
    Inserted,
    /// A row with the same natural key already exists; nothing was written
    /// to the domain tables. Callers treat this as success.
    Duplicate,
}

/// The storage trait defining all database operations.
///
/// This trait abstracts the storage layer, allowing for different
/// implementations (e.g., `RocksDB`, in-memory for testing).
pub trait Store: Send + Sync {
    // =========================================================================
    // Merchant Operations
    // =========================================================================

    /// Insert or update a merchant record.
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails.
    fn put_merchant(&self, merchant: &Merchant) -> Result<()>;

    /// Get a merchant by ID.
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails.
    fn get_merchant(&self, merchant_id: &MerchantId) -> Result<Option<Merchant>>;

    /// List all active merchants (background sweeps iterate this).
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails.
    fn list_active_merchants(&self) -> Result<Vec<Merchant>>;

    // =========================================================================
    // Order Operations
    // =========================================================================

    /// Insert an order, enforcing the `(merchant_id, source_order_id)`
    /// natural key.
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails. A natural-key
    /// collision is not an error; it reports [`InsertOutcome::Duplicate`].
    fn insert_order(&self, order: &Order) -> Result<InsertOutcome>;

    /// Look up an order by its natural key.
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails.
    fn find_order_by_source_id(
        &self,
        merchant_id: &MerchantId,
        source_order_id: i64,
    ) -> Result<Option<Order>>;

    /// List a merchant's orders with `created_at` in `[from, to]`, oldest
    /// first.
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails.
    fn list_orders_in_window(
        &self,
        merchant_id: &MerchantId,
        from: DateTime<Utc>,
        to: DateTime<Utc>,
    ) -> Result<Vec<Order>>;

    // =========================================================================
    // Customer Operations
    // =========================================================================

    /// Insert or update a customer on its `(merchant_id,
    /// source_customer_id)` natural key. The original `created_at` is
    /// preserved across upserts.
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails.
    fn upsert_customer(&self, customer: &Customer) -> Result<()>;

    /// Look up a customer by its natural key.
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails.
    fn get_customer(
        &self,
        merchant_id: &MerchantId,
        source_customer_id: i64,
    ) -> Result<Option<Customer>>;

    // =========================================================================
    // Idempotency Ledger
    // =========================================================================

    /// Check whether an event has already been processed.
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails.
    fn has_processed_event(&self, event_id: &str) -> Result<bool>;

    /// Get the ledger record for an event.
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails.
    fn get_processed_event(&self, event_id: &str) -> Result<Option<ProcessedEventRecord>>;

    /// Record an event as processed without a domain mutation (pass-through
    /// topics).
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails.
    fn record_processed(&self, record: &ProcessedEventRecord) -> Result<()>;

    // =========================================================================
    // Compound Operations
    // =========================================================================

    /// Apply an order event: insert the order (natural-key guarded),
    /// upsert its customer, and write the idempotency ledger record — all
    /// in one atomic batch.
    ///
    /// If the natural key already exists, only the ledger record is
    /// written and the call reports [`InsertOutcome::Duplicate`].
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails.
    fn apply_order_event(
        &self,
        order: &Order,
        customer: Option<&Customer>,
        record: &ProcessedEventRecord,
    ) -> Result<InsertOutcome>;

    /// Apply a customer event: upsert the customer and write the ledger
    /// record atomically.
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails.
    fn apply_customer_event(
        &self,
        customer: &Customer,
        record: &ProcessedEventRecord,
    ) -> Result<()>;

    // =========================================================================
    // Queue Operations
    // =========================================================================

    /// Persist a queue job.
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails.
    fn enqueue_job(&self, job: &QueueJob) -> Result<()>;

    /// Fetch up to `limit` jobs whose `run_at` is due, in due order.
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails.
    fn due_jobs(&self, now: DateTime<Utc>, limit: usize) -> Result<Vec<QueueJob>>;

    /// Remove a job (after success or dead-lettering).
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails.
    fn remove_job(&self, job: &QueueJob) -> Result<()>;

    /// Replace a job with its next attempt atomically.
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails.
    fn reschedule_job(&self, old: &QueueJob, new: &QueueJob) -> Result<()>;

    // =========================================================================
    // Dead Letter Operations
    // =========================================================================

    /// Insert a dead-letter entry and its merchant index.
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails.
    fn put_dead_letter(&self, entry: &DeadLetterEntry) -> Result<()>;

    /// Get a dead-letter entry by ID.
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails.
    fn get_dead_letter(&self, id: &DeadLetterId) -> Result<Option<DeadLetterEntry>>;

    /// Update a dead-letter entry in place.
    ///
    /// # Errors
    ///
    /// Returns `StoreError::NotFound` if the entry doesn't exist.
    fn update_dead_letter(&self, entry: &DeadLetterEntry) -> Result<()>;

    /// List a merchant's dead letters, oldest first, optionally filtered
    /// by status.
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails.
    fn list_dead_letters(
        &self,
        merchant_id: &MerchantId,
        status: Option<DeadLetterStatus>,
    ) -> Result<Vec<DeadLetterEntry>>;

    /// Count a merchant's dead letters by status.
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails.
    fn dead_letter_stats(&self, merchant_id: &MerchantId) -> Result<DeadLetterStats>;

    // =========================================================================
    // Baseline Operations
    // =========================================================================

    /// Replace a merchant's baseline.
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails.
    fn put_baseline(&self, baseline: &Baseline) -> Result<()>;

    /// Get a merchant's baseline.
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails.
    fn get_baseline(&self, merchant_id: &MerchantId) -> Result<Option<Baseline>>;

    // =========================================================================
    // Gate Operations
    // =========================================================================

    /// Persist a gate state (unconditional overwrite).
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails.
    fn put_gate_state(&self, state: &GateState) -> Result<()>;

    /// Get the gate state for a `(merchant, gate)` pair. Absence is
    /// implicit PASS.
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails.
    fn get_gate_state(
        &self,
        merchant_id: &MerchantId,
        gate_type: GateType,
    ) -> Result<Option<GateState>>;

    /// Delete the gate state (clear back to implicit PASS). Deleting a
    /// missing state is a no-op.
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails.
    fn delete_gate_state(&self, merchant_id: &MerchantId, gate_type: GateType) -> Result<()>;

    /// List all persisted gate states for a merchant.
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails.
    fn list_gate_states(&self, merchant_id: &MerchantId) -> Result<Vec<GateState>>;

    /// Append a gate override to the audit log. Never updated or deleted.
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails.
    fn append_gate_override(&self, entry: &GateOverride) -> Result<()>;

    /// List a merchant's overrides in insertion order, optionally filtered
    /// by gate type.
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails.
    fn list_gate_overrides(
        &self,
        merchant_id: &MerchantId,
        gate_type: Option<GateType>,
    ) -> Result<Vec<GateOverride>>;
}

//! Database schema definitions and column families.
//!
//! This module defines the column families used in `RocksDB` storage.

/// Column family names for the `RocksDB` database.
pub mod cf {
    /// Merchant registry, keyed by `merchant_id`.
    pub const MERCHANTS: &str = "merchants";

    /// Order records, keyed by `order_id` (ULID).
    pub const ORDERS: &str = "orders";

    /// Natural-key index, keyed by `merchant_id || source_order_id`.
    /// Value is the 16-byte `order_id`. This index is the uniqueness
    /// constraint on `(merchant_id, source_order_id)`.
    pub const ORDERS_BY_SOURCE: &str = "orders_by_source";

    /// Time index for window scans, keyed by
    /// `merchant_id || created_at_ms || order_id`. Value is empty.
    pub const ORDERS_BY_TIME: &str = "orders_by_time";

    /// Customer records, keyed by `merchant_id || source_customer_id`.
    pub const CUSTOMERS: &str = "customers";

    /// Idempotency ledger, keyed by `event_id`.
    pub const PROCESSED_EVENTS: &str = "processed_events";

    /// Durable queue jobs, keyed by `run_at_ms || job_id` so iteration
    /// order is due order.
    pub const QUEUE_JOBS: &str = "queue_jobs";

    /// Dead-letter entries, keyed by `dead_letter_id` (ULID).
    pub const DEAD_LETTERS: &str = "dead_letters";

    /// Index: dead letters by merchant, keyed by
    /// `merchant_id || dead_letter_id`. Value is empty (index only).
    pub const DEAD_LETTERS_BY_MERCHANT: &str = "dead_letters_by_merchant";

    /// Per-merchant baselines, keyed by `merchant_id`.
    pub const BASELINES: &str = "baselines";

    /// Gate states, keyed by `merchant_id || gate_type`.
    pub const GATE_STATES: &str = "gate_states";

    /// Gate override audit log, keyed by `merchant_id || override_id`.
    pub const GATE_OVERRIDES: &str = "gate_overrides";
}

/// Returns all column family names for database initialization.
#[must_use]
pub fn all_column_families() -> Vec<&'static str> {
    vec![
        cf::MERCHANTS,
        cf::ORDERS,
        cf::ORDERS_BY_SOURCE,
        cf::ORDERS_BY_TIME,
        cf::CUSTOMERS,
        cf::PROCESSED_EVENTS,
        cf::QUEUE_JOBS,
        cf::DEAD_LETTERS,
        cf::DEAD_LETTERS_BY_MERCHANT,
        cf::BASELINES,
        cf::GATE_STATES,
        cf::GATE_OVERRIDES,
    ]
}

//! Key encoding utilities for `RocksDB`.
//!
//! Compound keys always place the merchant first so per-merchant data is
//! contiguous and prefix-scannable. Timestamps are encoded big-endian so
//! byte order is chronological order.

use shopsync_core::{DeadLetterId, GateType, JobId, MerchantId, OrderId, OverrideId};

/// Create a merchant key from a merchant ID.
#[must_use]
pub fn merchant_key(merchant_id: &MerchantId) -> Vec<u8> {
    merchant_id.as_bytes().to_vec()
}

/// Create an order key from an order ID.
#[must_use]
pub fn order_key(order_id: &OrderId) -> Vec<u8> {
    order_id.to_bytes().to_vec()
}

/// Create the natural-key index key for an order.
///
/// Format: `merchant_id (16 bytes) || source_order_id (8 bytes, BE)`
#[must_use]
#[allow(clippy::cast_sign_loss)]
pub fn order_source_key(merchant_id: &MerchantId, source_order_id: i64) -> Vec<u8> {
    let mut key = Vec::with_capacity(24);
    key.extend_from_slice(merchant_id.as_bytes());
    key.extend_from_slice(&(source_order_id as u64).to_be_bytes());
    key
}

/// Create a time-index key for an order.
///
/// Format: `merchant_id (16) || created_at_ms (8, BE) || order_id (16)`
#[must_use]
#[allow(clippy::cast_sign_loss)]
pub fn order_time_key(merchant_id: &MerchantId, created_at_ms: i64, order_id: &OrderId) -> Vec<u8> {
    let mut key = Vec::with_capacity(40);
    key.extend_from_slice(merchant_id.as_bytes());
    key.extend_from_slice(&(created_at_ms as u64).to_be_bytes());
    key.extend_from_slice(&order_id.to_bytes());
    key
}

/// Create the lower bound of a merchant's order time index for a window
/// scan starting at `from_ms`.
#[must_use]
#[allow(clippy::cast_sign_loss)]
pub fn order_time_lower_bound(merchant_id: &MerchantId, from_ms: i64) -> Vec<u8> {
    let mut key = Vec::with_capacity(24);
    key.extend_from_slice(merchant_id.as_bytes());
    key.extend_from_slice(&(from_ms as u64).to_be_bytes());
    key
}

/// Extract the order ID from an order time-index key.
///
/// # Panics
///
/// Panics if the key is not 40 bytes.
#[must_use]
pub fn extract_order_id_from_time_key(key: &[u8]) -> OrderId {
    let mut bytes = [0u8; 16];
    bytes.copy_from_slice(&key[24..40]);
    OrderId::from_bytes(bytes).expect("valid ULID bytes")
}

/// Extract the millisecond timestamp from an order time-index key.
///
/// # Panics
///
/// Panics if the key is not at least 24 bytes.
#[must_use]
#[allow(clippy::cast_possible_wrap)]
pub fn extract_ts_from_time_key(key: &[u8]) -> i64 {
    let mut bytes = [0u8; 8];
    bytes.copy_from_slice(&key[16..24]);
    u64::from_be_bytes(bytes) as i64
}

/// Create a customer key.
///
/// Format: `merchant_id (16 bytes) || source_customer_id (8 bytes, BE)`
#[must_use]
#[allow(clippy::cast_sign_loss)]
pub fn customer_key(merchant_id: &MerchantId, source_customer_id: i64) -> Vec<u8> {
    let mut key = Vec::with_capacity(24);
    key.extend_from_slice(merchant_id.as_bytes());
    key.extend_from_slice(&(source_customer_id as u64).to_be_bytes());
    key
}

/// Create an idempotency ledger key from an event ID.
#[must_use]
pub fn processed_event_key(event_id: &str) -> Vec<u8> {
    event_id.as_bytes().to_vec()
}

/// Create a queue job key.
///
/// Format: `run_at_ms (8 bytes, BE) || job_id (16 bytes)` — iteration order
/// is due order.
#[must_use]
#[allow(clippy::cast_sign_loss)]
pub fn queue_job_key(run_at_ms: i64, job_id: &JobId) -> Vec<u8> {
    let mut key = Vec::with_capacity(24);
    key.extend_from_slice(&(run_at_ms as u64).to_be_bytes());
    key.extend_from_slice(&job_id.to_bytes());
    key
}

/// Create a dead-letter key from an entry ID.
#[must_use]
pub fn dead_letter_key(id: &DeadLetterId) -> Vec<u8> {
    id.to_bytes().to_vec()
}

/// Create a merchant dead-letter index key.
///
/// Format: `merchant_id (16 bytes) || dead_letter_id (16 bytes)`
#[must_use]
pub fn merchant_dead_letter_key(merchant_id: &MerchantId, id: &DeadLetterId) -> Vec<u8> {
    let mut key = Vec::with_capacity(32);
    key.extend_from_slice(merchant_id.as_bytes());
    key.extend_from_slice(&id.to_bytes());
    key
}

/// Extract the dead-letter ID from a merchant index key.
///
/// # Panics
///
/// Panics if the key is not at least 32 bytes.
#[must_use]
pub fn extract_dead_letter_id(key: &[u8]) -> DeadLetterId {
    let mut bytes = [0u8; 16];
    bytes.copy_from_slice(&key[16..32]);
    DeadLetterId::from_bytes(bytes).expect("valid ULID bytes")
}

/// Create a baseline key from a merchant ID.
#[must_use]
pub fn baseline_key(merchant_id: &MerchantId) -> Vec<u8> {
    merchant_id.as_bytes().to_vec()
}

/// Discriminant byte for a gate type, stable across releases.
#[must_use]
pub fn gate_type_byte(gate_type: GateType) -> u8 {
    match gate_type {
        GateType::Deliverability => 0,
        GateType::FunnelThroughput => 1,
    }
}

/// Create a gate state key.
///
/// Format: `merchant_id (16 bytes) || gate_type (1 byte)`
#[must_use]
pub fn gate_state_key(merchant_id: &MerchantId, gate_type: GateType) -> Vec<u8> {
    let mut key = Vec::with_capacity(17);
    key.extend_from_slice(merchant_id.as_bytes());
    key.push(gate_type_byte(gate_type));
    key
}

/// Create a gate override key.
///
/// Format: `merchant_id (16 bytes) || override_id (16 bytes)` — ULIDs keep
/// the audit log in insertion order.
#[must_use]
pub fn gate_override_key(merchant_id: &MerchantId, id: &OverrideId) -> Vec<u8> {
    let mut key = Vec::with_capacity(32);
    key.extend_from_slice(merchant_id.as_bytes());
    key.extend_from_slice(&id.to_bytes());
    key
}

/// Prefix for iterating all entries for a merchant in merchant-first
/// compound keys.
#[must_use]
pub fn merchant_prefix(merchant_id: &MerchantId) -> Vec<u8> {
    merchant_id.as_bytes().to_vec()
}

//! Merchant, order, and customer records.
//!
//! # Money
//!
//! Revenue is stored as `i64` integer cents to avoid floating point
//! precision issues. The source platform's decimal strings are converted at
//! the ingestion edge.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::ids::{MerchantId, OrderId};

/// A connected merchant.
///
/// The registry entry that reconciliation, baseline, and gate sweeps
/// iterate over.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Merchant {
    /// Merchant identifier.
    pub id: MerchantId,

    /// The shop's domain on the source platform.
    pub shop_domain: String,

    /// API access token for the source platform.
    pub access_token: String,

    /// Fixed offset from UTC, in minutes, used to bucket revenue into
    /// merchant-local calendar days.
    pub utc_offset_minutes: i32,

    /// Inactive merchants are skipped by all background sweeps.
    pub active: bool,

    /// When the merchant connected.
    pub created_at: DateTime<Utc>,
}

impl Merchant {
    /// Register a new active merchant.
    #[must_use]
    pub fn new(shop_domain: String, access_token: String) -> Self {
        Self {
            id: MerchantId::generate(),
            shop_domain,
            access_token,
            utc_offset_minutes: 0,
            active: true,
            created_at: Utc::now(),
        }
    }
}

/// A locally recorded order.
///
/// The natural key `(merchant_id, source_order_id)` is the idempotency
/// boundary shared by the queue path and the reconciliation path: both
/// check-then-insert on it, and the storage layer enforces uniqueness.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Order {
    /// Local primary key (ULID, time-ordered).
    pub id: OrderId,

    /// Owning merchant.
    pub merchant_id: MerchantId,

    /// The source platform's order ID. Unique per merchant.
    pub source_order_id: i64,

    /// The source platform's customer ID, if the order had one.
    pub source_customer_id: Option<i64>,

    /// Order revenue in integer cents.
    pub revenue_cents: i64,

    /// When the order was placed (source timestamp).
    pub created_at: DateTime<Utc>,
}

impl Order {
    /// Build an order record.
    #[must_use]
    pub fn new(
        merchant_id: MerchantId,
        source_order_id: i64,
        source_customer_id: Option<i64>,
        revenue_cents: i64,
        created_at: DateTime<Utc>,
    ) -> Self {
        Self {
            id: OrderId::generate(),
            merchant_id,
            source_order_id,
            source_customer_id,
            revenue_cents,
            created_at,
        }
    }
}

/// A locally recorded customer.
///
/// Natural key `(merchant_id, source_customer_id)`; upserts are idempotent.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Customer {
    /// Owning merchant.
    pub merchant_id: MerchantId,

    /// The source platform's customer ID. Unique per merchant.
    pub source_customer_id: i64,

    /// Customer email, if known.
    pub email: Option<String>,

    /// When the customer first appeared locally.
    pub created_at: DateTime<Utc>,

    /// Last upsert time.
    pub updated_at: DateTime<Utc>,
}

impl Customer {
    /// Build a customer record.
    #[must_use]
    pub fn new(merchant_id: MerchantId, source_customer_id: i64, email: Option<String>) -> Self {
        let now = Utc::now();
        Self {
            merchant_id,
            source_customer_id,
            email,
            created_at: now,
            updated_at: now,
        }
    }
}

//! Clients for the systems shopsync reads from.
//!
//! Two upstream APIs feed the pipeline: the source commerce platform's admin
//! API (orders and customers, used by webhooks reconciliation and baselines)
//! and the metrics provider (deliverability and funnel statistics, used by
//! gate evaluation).
//!
//! # Example
//!
//! ```no_run
//! use shopsync_source::{CommerceClient, OrderListParams};
//!
//! # async fn example() -> Result<(), shopsync_source::SourceError> {
//! let client = CommerceClient::new()?;
//! let orders = client
//!     .list_orders("shop.example.com", "tok_abc", &OrderListParams::default())
//!     .await?;
//! for order in orders {
//!     println!("order {}: {} cents", order.id, order.revenue_cents()?);
//! }
//! # Ok(())
//! # }
//! ```

#![forbid(unsafe_code)]
#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]

mod client;
mod error;
mod metrics;

pub use client::{
    parse_money_cents, CommerceClient, OrderListParams, SourceCustomer, SourceOrder,
    DEFAULT_PAGE_SIZE,
};
pub use error::SourceError;
pub use metrics::{DeliverabilityStats, FunnelStats, MetricsClient};

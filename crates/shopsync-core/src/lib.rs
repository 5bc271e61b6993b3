//! Core types and pure algorithms for shopsync.
//!
//! This crate provides the foundational types used throughout the shopsync
//! pipeline:
//!
//! - **Identifiers**: `MerchantId`, `OperatorId`, `OrderId`, `DeadLetterId`,
//!   `JobId`, `OverrideId`
//! - **Events**: `InboundEvent`, `EventTopic`, `ProcessedEventRecord`,
//!   `QueueJob`
//! - **Domain records**: `Merchant`, `Order`, `Customer`
//! - **Dead letters**: `DeadLetterEntry`, `DeadLetterStatus`,
//!   `DeadLetterStats`
//! - **Baselines**: `Baseline`, `DailyRevenue`, [`baseline::compute`]
//! - **Gates**: `GateType`, `GateState`, `GateOverride`, the evaluation
//!   functions, and the state [`gate::transition`]
//!
//! # Money
//!
//! Revenue is stored as `i64` integer cents to avoid floating point
//! precision issues; rounding happens only at baseline averaging.

#![forbid(unsafe_code)]
#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]

pub mod baseline;
pub mod deadletter;
pub mod error;
pub mod event;
pub mod gate;
pub mod ids;
pub mod order;

pub use baseline::{Baseline, BaselineComputation, DailyRevenue, MIN_DATA_POINTS};
pub use deadletter::{DeadLetterEntry, DeadLetterStats, DeadLetterStatus};
pub use error::{Result, SyncError};
pub use event::{
    EventTopic, InboundEvent, ProcessedEventRecord, QueueJob, retry_delay, MAX_ATTEMPTS,
};
pub use gate::{
    evaluate_deliverability, evaluate_funnel, transition, DeliverabilityMetrics, Feature,
    GateOverride, GateSignal, GateState, GateStatus, GateTransition, GateType,
    GRACE_PERIOD_HOURS,
};
pub use ids::{DeadLetterId, IdError, JobId, MerchantId, OperatorId, OrderId, OverrideId};
pub use order::{Customer, Merchant, Order};

//! Shopsync HTTP service and background pipeline.
//!
//! This crate wires the pipeline together:
//!
//! - Webhook ingestion with signature verification and fast acknowledgement
//! - A durable event queue with retry backoff and a dead-letter queue
//! - A reconciliation sweep against the source platform
//! - Revenue baseline recalculation
//! - Compliance gate evaluation, feature blocking, and audited overrides
//!
//! # Authentication
//!
//! Webhook deliveries are authenticated by HMAC signature; operator
//! endpoints require the admin API key (`X-Admin-Key`) and an attributable
//! operator (`X-Operator-Id`).

#![forbid(unsafe_code)]
#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
// Allow some pedantic lints that are noisy for Axum handler functions
#![allow(clippy::missing_errors_doc)] // Axum handlers all return Result
#![allow(clippy::unused_async)] // Handlers need async for consistency

pub mod auth;
pub mod baseline;
pub mod config;
pub mod crypto;
pub mod deadletter;
pub mod error;
pub mod gates;
pub mod handlers;
pub mod processor;
pub mod queue;
pub mod reconcile;
pub mod routes;
pub mod scheduler;
pub mod state;

pub use config::ServiceConfig;
pub use error::ApiError;
pub use processor::{EventProcessor, ProcessEvent};
pub use queue::{EventQueue, QueueWorker};
pub use routes::create_router;
pub use state::AppState;

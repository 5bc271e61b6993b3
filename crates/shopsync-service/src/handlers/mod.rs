//! HTTP request handlers.

pub mod baselines;
pub mod deadletters;
pub mod gates;
pub mod health;
pub mod merchants;
pub mod reconcile;
pub mod webhooks;

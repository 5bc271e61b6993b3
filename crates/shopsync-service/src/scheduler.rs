//! Periodic background jobs: reconciliation, baselines, gate evaluation.

use std::sync::Arc;
use std::time::Duration;

use shopsync_core::DeliverabilityMetrics;
use shopsync_source::MetricsClient;
use shopsync_store::Store;

use crate::baseline::BaselineEngine;
use crate::gates::GateService;
use crate::reconcile::Reconciler;
use crate::state::AppState;

/// Spawn every periodic job as its own task.
pub fn spawn_periodic_jobs(state: Arc<AppState>) {
    tokio::spawn(reconciliation_loop(Arc::clone(&state)));
    tokio::spawn(baseline_loop(Arc::clone(&state)));
    tokio::spawn(gate_loop(state));
}

async fn reconciliation_loop(state: Arc<AppState>) {
    let reconciler = Reconciler::new(
        Arc::clone(&state.store),
        Arc::clone(&state.commerce),
        chrono::Duration::hours(state.config.reconcile_lookback_hours),
    );
    let mut ticker =
        tokio::time::interval(Duration::from_secs(state.config.reconcile_interval_seconds));
    // The first tick fires immediately; skip it so startup is quiet.
    ticker.tick().await;
    loop {
        ticker.tick().await;
        tracing::info!(job = "reconciliation-sweep", "Periodic job starting");
        reconciler.sweep().await;
    }
}

async fn baseline_loop(state: Arc<AppState>) {
    let engine = BaselineEngine::new(Arc::clone(&state.store));
    let mut ticker =
        tokio::time::interval(Duration::from_secs(state.config.baseline_interval_seconds));
    ticker.tick().await;
    loop {
        ticker.tick().await;
        tracing::info!(job = "baseline-recalc", "Periodic job starting");
        engine.sweep(state.config.baseline_lookback_days);
    }
}

async fn gate_loop(state: Arc<AppState>) {
    let Some(metrics) = state.metrics.clone() else {
        tracing::warn!("Gate evaluation loop not started - metrics provider not configured");
        return;
    };
    let gates = GateService::new(Arc::clone(&state.store));
    let mut ticker = tokio::time::interval(Duration::from_secs(state.config.gate_interval_seconds));
    ticker.tick().await;
    loop {
        ticker.tick().await;
        tracing::info!(job = "gate-evaluation", "Periodic job starting");
        gate_sweep(&state, &metrics, &gates).await;
    }
}

/// Evaluate both gates for every active merchant, continue-on-error.
async fn gate_sweep(state: &AppState, metrics: &MetricsClient, gates: &GateService) {
    let merchants = match state.store.list_active_merchants() {
        Ok(merchants) => merchants,
        Err(e) => {
            tracing::error!(error = %e, "Gate sweep could not list merchants");
            return;
        }
    };

    for merchant in merchants {
        match metrics.deliverability_stats(&merchant.shop_domain).await {
            Ok(stats) => {
                let snapshot = DeliverabilityMetrics {
                    hard_bounce_rate: stats.hard_bounce_rate,
                    soft_bounce_rate: stats.soft_bounce_rate,
                    spam_complaint_rate: stats.spam_complaint_rate,
                };
                if let Err(err) = gates.evaluate_deliverability(&merchant.id, &snapshot) {
                    tracing::error!(
                        merchant_id = %merchant.id,
                        error = %err,
                        "Deliverability gate evaluation failed"
                    );
                }
            }
            Err(err) => tracing::warn!(
                merchant_id = %merchant.id,
                error = %err,
                "Could not fetch deliverability stats"
            ),
        }

        match metrics.funnel_stats(&merchant.shop_domain).await {
            Ok(stats) => {
                if let Err(err) = gates.evaluate_funnel(
                    &merchant.id,
                    stats.current_cr,
                    stats.previous_cr,
                    stats.consecutive_low_days,
                ) {
                    tracing::error!(
                        merchant_id = %merchant.id,
                        error = %err,
                        "Funnel gate evaluation failed"
                    );
                }
            }
            Err(err) => tracing::warn!(
                merchant_id = %merchant.id,
                error = %err,
                "Could not fetch funnel stats"
            ),
        }
    }
}

//! Gate service: evaluation, persistence, feature blocking, overrides.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::Serialize;
use serde_json::json;

use shopsync_core::{
    gate, DeliverabilityMetrics, Feature, GateOverride, GateSignal, GateState, GateStatus,
    GateTransition, GateType, MerchantId, OperatorId, SyncError,
};
use shopsync_store::{RocksStore, Store};

/// What an evaluation decided, after the state machine was applied.
#[derive(Debug, Clone, Serialize)]
pub struct GateEvaluationResult {
    /// Which gate was evaluated.
    pub gate_type: GateType,
    /// Status after the transition.
    pub status: GateStatus,
    /// Features blocked right now (only populated in `Fail`).
    pub blocked_features: Vec<Feature>,
    /// Threshold descriptions from the evaluation.
    pub reasons: Vec<String>,
    /// Remediation deadline, when a grace period is open.
    pub grace_period_ends_at: Option<DateTime<Utc>>,
}

/// Whether a feature is currently blocked for a merchant.
#[derive(Debug, Clone, Serialize)]
pub struct FeatureBlockStatus {
    /// True when a failed gate blocks the feature.
    pub blocked: bool,
    /// The blocking gate, when blocked.
    pub gate_type: Option<GateType>,
    /// The blocking gate's reasons, when blocked.
    pub reasons: Vec<String>,
}

/// Evaluates gates and persists their state machine.
pub struct GateService {
    store: Arc<RocksStore>,
}

impl GateService {
    /// Create a gate service over the given store.
    #[must_use]
    pub fn new(store: Arc<RocksStore>) -> Self {
        Self { store }
    }

    /// Evaluate the deliverability gate against fresh metrics.
    ///
    /// # Errors
    ///
    /// Returns an error only for unknown merchants or storage failure; a
    /// failing gate is a normal result.
    pub fn evaluate_deliverability(
        &self,
        merchant_id: &MerchantId,
        metrics: &DeliverabilityMetrics,
    ) -> Result<GateEvaluationResult, SyncError> {
        self.require_merchant(merchant_id)?;
        let signal = gate::evaluate_deliverability(metrics);
        let snapshot = json!({
            "hard_bounce_rate": metrics.hard_bounce_rate,
            "soft_bounce_rate": metrics.soft_bounce_rate,
            "spam_complaint_rate": metrics.spam_complaint_rate,
        });
        self.apply(merchant_id, GateType::Deliverability, &signal, snapshot)
    }

    /// Evaluate the funnel throughput gate against fresh metrics.
    ///
    /// # Errors
    ///
    /// Returns an error only for unknown merchants or storage failure.
    pub fn evaluate_funnel(
        &self,
        merchant_id: &MerchantId,
        current_cr: f64,
        previous_cr: f64,
        consecutive_low_days: u32,
    ) -> Result<GateEvaluationResult, SyncError> {
        self.require_merchant(merchant_id)?;
        let signal = gate::evaluate_funnel(current_cr, previous_cr, consecutive_low_days);
        let snapshot = json!({
            "current_cr": current_cr,
            "previous_cr": previous_cr,
            "consecutive_low_days": consecutive_low_days,
        });
        self.apply(merchant_id, GateType::FunnelThroughput, &signal, snapshot)
    }

    /// List a merchant's persisted gate states (absent = implicit PASS).
    ///
    /// # Errors
    ///
    /// Returns an error for unknown merchants or storage failure.
    pub fn list_states(&self, merchant_id: &MerchantId) -> Result<Vec<GateState>, SyncError> {
        self.require_merchant(merchant_id)?;
        self.store
            .list_gate_states(merchant_id)
            .map_err(|e| SyncError::Storage(e.to_string()))
    }

    /// Whether a feature is currently blocked. Only `Fail` states block;
    /// warnings and open grace periods do not.
    ///
    /// # Errors
    ///
    /// Returns an error for unknown merchants or storage failure.
    pub fn is_feature_blocked(
        &self,
        merchant_id: &MerchantId,
        feature: Feature,
    ) -> Result<FeatureBlockStatus, SyncError> {
        let states = self.list_states(merchant_id)?;
        let blocking = states.into_iter().find(|s| {
            s.status == GateStatus::Fail && s.blocked_features.contains(&feature)
        });

        Ok(match blocking {
            Some(state) => FeatureBlockStatus {
                blocked: true,
                gate_type: Some(state.gate_type),
                reasons: state.reasons,
            },
            None => FeatureBlockStatus {
                blocked: false,
                gate_type: None,
                reasons: Vec::new(),
            },
        })
    }

    /// Record an audited override for a failed gate.
    ///
    /// The override does not change the gate's state; it is an append-only
    /// audit record consulted by the action it authorizes.
    ///
    /// # Errors
    ///
    /// Returns an error for unknown merchants, an empty reason, or storage
    /// failure.
    pub fn override_gate(
        &self,
        merchant_id: &MerchantId,
        gate_type: GateType,
        operator_id: OperatorId,
        reason: String,
    ) -> Result<GateOverride, SyncError> {
        self.require_merchant(merchant_id)?;
        let entry = GateOverride::record(*merchant_id, gate_type, operator_id, reason)?;
        self.store
            .append_gate_override(&entry)
            .map_err(|e| SyncError::Storage(e.to_string()))?;

        tracing::warn!(
            merchant_id = %merchant_id,
            gate_type = %gate_type,
            operator_id = %operator_id,
            override_id = %entry.id,
            "Gate override recorded"
        );
        Ok(entry)
    }

    /// List a merchant's overrides, optionally filtered by gate.
    ///
    /// # Errors
    ///
    /// Returns an error for unknown merchants or storage failure.
    pub fn list_overrides(
        &self,
        merchant_id: &MerchantId,
        gate_type: Option<GateType>,
    ) -> Result<Vec<GateOverride>, SyncError> {
        self.require_merchant(merchant_id)?;
        self.store
            .list_gate_overrides(merchant_id, gate_type)
            .map_err(|e| SyncError::Storage(e.to_string()))
    }

    fn apply(
        &self,
        merchant_id: &MerchantId,
        gate_type: GateType,
        signal: &GateSignal,
        metrics: serde_json::Value,
    ) -> Result<GateEvaluationResult, SyncError> {
        let previous = self
            .store
            .get_gate_state(merchant_id, gate_type)
            .map_err(|e| SyncError::Storage(e.to_string()))?;

        let transition = gate::transition(
            previous.as_ref(),
            signal,
            *merchant_id,
            gate_type,
            metrics,
            Utc::now(),
        );

        match transition {
            GateTransition::Clear => {
                self.store
                    .delete_gate_state(merchant_id, gate_type)
                    .map_err(|e| SyncError::Storage(e.to_string()))?;
                if previous.is_some() {
                    tracing::info!(
                        merchant_id = %merchant_id,
                        gate_type = %gate_type,
                        "Gate cleared to PASS"
                    );
                }
                Ok(GateEvaluationResult {
                    gate_type,
                    status: GateStatus::Pass,
                    blocked_features: Vec::new(),
                    reasons: Vec::new(),
                    grace_period_ends_at: None,
                })
            }
            GateTransition::Update(state) => {
                self.store
                    .put_gate_state(&state)
                    .map_err(|e| SyncError::Storage(e.to_string()))?;
                if previous.map(|p| p.status) != Some(state.status) {
                    tracing::info!(
                        merchant_id = %merchant_id,
                        gate_type = %gate_type,
                        status = ?state.status,
                        blocked = state.blocked_features.len(),
                        "Gate status changed"
                    );
                }
                Ok(GateEvaluationResult {
                    gate_type,
                    status: state.status,
                    blocked_features: state.blocked_features,
                    reasons: state.reasons,
                    grace_period_ends_at: state.grace_period_ends_at,
                })
            }
        }
    }

    fn require_merchant(&self, merchant_id: &MerchantId) -> Result<(), SyncError> {
        let merchant = self
            .store
            .get_merchant(merchant_id)
            .map_err(|e| SyncError::Storage(e.to_string()))?;
        if merchant.is_none() {
            return Err(SyncError::MerchantNotFound {
                merchant_id: merchant_id.to_string(),
            });
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use shopsync_core::Merchant;
    use tempfile::TempDir;

    fn setup() -> (GateService, MerchantId, TempDir) {
        let dir = TempDir::new().unwrap();
        let store = Arc::new(RocksStore::open(dir.path()).unwrap());
        let merchant = Merchant::new("shop.example.com".into(), "tok".into());
        store.put_merchant(&merchant).unwrap();
        (GateService::new(store), merchant.id, dir)
    }

    fn failing_metrics() -> DeliverabilityMetrics {
        DeliverabilityMetrics {
            hard_bounce_rate: 0.01,
            soft_bounce_rate: 0.0,
            spam_complaint_rate: 0.0,
        }
    }

    fn clean_metrics() -> DeliverabilityMetrics {
        DeliverabilityMetrics {
            hard_bounce_rate: 0.0,
            soft_bounce_rate: 0.0,
            spam_complaint_rate: 0.0,
        }
    }

    #[test]
    fn first_fail_opens_grace_and_blocks_nothing() {
        let (service, merchant_id, _dir) = setup();

        let result = service
            .evaluate_deliverability(&merchant_id, &failing_metrics())
            .unwrap();
        assert_eq!(result.status, GateStatus::GracePeriod);
        assert!(result.blocked_features.is_empty());
        assert!(result.grace_period_ends_at.is_some());

        let blocked = service
            .is_feature_blocked(&merchant_id, Feature::Promotions)
            .unwrap();
        assert!(!blocked.blocked);
    }

    #[test]
    fn pass_clears_persisted_state() {
        let (service, merchant_id, _dir) = setup();

        service
            .evaluate_deliverability(&merchant_id, &failing_metrics())
            .unwrap();
        assert_eq!(service.list_states(&merchant_id).unwrap().len(), 1);

        let result = service
            .evaluate_deliverability(&merchant_id, &clean_metrics())
            .unwrap();
        assert_eq!(result.status, GateStatus::Pass);
        assert!(service.list_states(&merchant_id).unwrap().is_empty());
    }

    #[test]
    fn funnel_fail_blocks_paid_acquisition_after_grace() {
        let (service, merchant_id, _dir) = setup();

        let first = service
            .evaluate_funnel(&merchant_id, 0.01, 0.02, 3)
            .unwrap();
        assert_eq!(first.status, GateStatus::GracePeriod);

        // Force the grace deadline into the past, then re-evaluate.
        let mut state = service
            .store
            .get_gate_state(&merchant_id, GateType::FunnelThroughput)
            .unwrap()
            .unwrap();
        state.grace_period_ends_at = Some(Utc::now() - chrono::Duration::hours(1));
        service.store.put_gate_state(&state).unwrap();

        let second = service
            .evaluate_funnel(&merchant_id, 0.01, 0.02, 4)
            .unwrap();
        assert_eq!(second.status, GateStatus::Fail);
        assert_eq!(
            second.blocked_features,
            vec![Feature::PaidAcquisitionScaling]
        );

        let blocked = service
            .is_feature_blocked(&merchant_id, Feature::PaidAcquisitionScaling)
            .unwrap();
        assert!(blocked.blocked);
        assert_eq!(blocked.gate_type, Some(GateType::FunnelThroughput));

        // Deliverability features are untouched by the funnel gate.
        let promotions = service
            .is_feature_blocked(&merchant_id, Feature::Promotions)
            .unwrap();
        assert!(!promotions.blocked);
    }

    #[test]
    fn override_is_recorded_but_state_unchanged() {
        let (service, merchant_id, _dir) = setup();
        service
            .evaluate_deliverability(&merchant_id, &failing_metrics())
            .unwrap();

        service
            .override_gate(
                &merchant_id,
                GateType::Deliverability,
                OperatorId::generate(),
                "launch approved by compliance".into(),
            )
            .unwrap();

        let overrides = service.list_overrides(&merchant_id, None).unwrap();
        assert_eq!(overrides.len(), 1);

        // The gate itself still holds its state.
        let states = service.list_states(&merchant_id).unwrap();
        assert_eq!(states.len(), 1);
        assert_eq!(states[0].status, GateStatus::GracePeriod);
    }

    #[test]
    fn override_without_reason_rejected() {
        let (service, merchant_id, _dir) = setup();
        let err = service
            .override_gate(
                &merchant_id,
                GateType::Deliverability,
                OperatorId::generate(),
                "  ".into(),
            )
            .unwrap_err();
        assert!(matches!(err, SyncError::MissingOverrideReason));
    }

    #[test]
    fn unknown_merchant_rejected() {
        let (service, _merchant_id, _dir) = setup();
        let err = service
            .evaluate_deliverability(&MerchantId::generate(), &clean_metrics())
            .unwrap_err();
        assert!(matches!(err, SyncError::MerchantNotFound { .. }));
    }
}

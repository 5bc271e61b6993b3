//! Compliance gates and their state machine.
//!
//! A gate is a named compliance check whose status can block specific
//! marketing features. Evaluation is a pure function of the metrics passed
//! in: a failing gate is a normal result, never an error. State moves
//! `PASS -> WARNING -> GRACE_PERIOD -> FAIL`; a clean evaluation clears the
//! state back to implicit PASS, and `FAIL` never auto-expires.

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

use crate::error::SyncError;
use crate::ids::{MerchantId, OperatorId, OverrideId};

/// Hard bounce rate above this fails the deliverability gate.
pub const HARD_BOUNCE_FAIL: f64 = 0.005;

/// Soft bounce rate at or above this fails the deliverability gate.
pub const SOFT_BOUNCE_FAIL: f64 = 0.05;

/// Soft bounce rate at or above this warns (when not failing).
pub const SOFT_BOUNCE_WARN: f64 = 0.03;

/// Spam complaint rate above this fails the deliverability gate.
pub const SPAM_COMPLAINT_FAIL: f64 = 0.001;

/// Conversion rate below this is "low" for the funnel gate.
pub const FUNNEL_CR_FAIL: f64 = 0.02;

/// Consecutive low-CR business days at or above this fail the funnel gate.
pub const FUNNEL_LOW_DAYS_FAIL: u32 = 3;

/// Week-over-week CR variance above this warns.
pub const FUNNEL_VARIANCE_WARN: f64 = 0.10;

/// How long a first-failing gate stays in grace before blocking features.
pub const GRACE_PERIOD_HOURS: i64 = 24;

/// The compliance checks the pipeline evaluates.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GateType {
    /// Sender reputation: bounce and spam complaint rates.
    Deliverability,
    /// Store funnel health: conversion rate level and trend.
    FunnelThroughput,
}

impl GateType {
    /// Get the gate type as a string.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Deliverability => "deliverability",
            Self::FunnelThroughput => "funnel_throughput",
        }
    }

    /// Parse a gate type string.
    ///
    /// # Errors
    ///
    /// Returns `SyncError::MalformedPayload` for unknown gate types.
    pub fn parse(s: &str) -> Result<Self, SyncError> {
        match s {
            "deliverability" => Ok(Self::Deliverability),
            "funnel_throughput" => Ok(Self::FunnelThroughput),
            other => Err(SyncError::MalformedPayload(format!(
                "unknown gate type: {other}"
            ))),
        }
    }
}

impl std::fmt::Display for GateType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Gate status.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GateStatus {
    /// All thresholds clear.
    Pass,
    /// Warning thresholds crossed; nothing blocked.
    Warning,
    /// Fail thresholds crossed; remediation window open, nothing blocked
    /// yet.
    GracePeriod,
    /// Fail thresholds crossed past the grace deadline; features blocked.
    Fail,
}

/// Marketing features a failed gate can block.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Feature {
    /// Promotional sends.
    Promotions,
    /// Campaign launches.
    Campaigns,
    /// Scaling paid acquisition spend.
    PaidAcquisitionScaling,
}

impl Feature {
    /// Get the feature as a string.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Promotions => "promotions",
            Self::Campaigns => "campaigns",
            Self::PaidAcquisitionScaling => "paid_acquisition_scaling",
        }
    }

    /// Parse a feature string.
    ///
    /// # Errors
    ///
    /// Returns `SyncError::MalformedPayload` for unknown features.
    pub fn parse(s: &str) -> Result<Self, SyncError> {
        match s {
            "promotions" => Ok(Self::Promotions),
            "campaigns" => Ok(Self::Campaigns),
            "paid_acquisition_scaling" => Ok(Self::PaidAcquisitionScaling),
            other => Err(SyncError::MalformedPayload(format!(
                "unknown feature: {other}"
            ))),
        }
    }
}

impl std::fmt::Display for Feature {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Deliverability rates over a trailing window, as fractions (0.01 = 1%).
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct DeliverabilityMetrics {
    /// Hard bounce rate.
    pub hard_bounce_rate: f64,
    /// Soft bounce rate.
    pub soft_bounce_rate: f64,
    /// Spam complaint rate.
    pub spam_complaint_rate: f64,
}

/// What a single evaluation says about the metrics, before any state is
/// consulted.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GateSignal {
    /// All thresholds clear.
    Pass,
    /// Warning thresholds crossed.
    Warning {
        /// Human-readable threshold descriptions.
        reasons: Vec<String>,
    },
    /// Fail thresholds crossed.
    Fail {
        /// Human-readable threshold descriptions.
        reasons: Vec<String>,
        /// Features this gate blocks once the grace period lapses.
        blocked_features: Vec<Feature>,
    },
}

/// Evaluate deliverability metrics against the gate thresholds.
#[must_use]
pub fn evaluate_deliverability(metrics: &DeliverabilityMetrics) -> GateSignal {
    let mut reasons = Vec::new();
    if metrics.hard_bounce_rate > HARD_BOUNCE_FAIL {
        reasons.push(format!(
            "hard bounce rate {:.4} exceeds {HARD_BOUNCE_FAIL}",
            metrics.hard_bounce_rate
        ));
    }
    if metrics.soft_bounce_rate >= SOFT_BOUNCE_FAIL {
        reasons.push(format!(
            "soft bounce rate {:.4} at or above {SOFT_BOUNCE_FAIL}",
            metrics.soft_bounce_rate
        ));
    }
    if metrics.spam_complaint_rate > SPAM_COMPLAINT_FAIL {
        reasons.push(format!(
            "spam complaint rate {:.4} exceeds {SPAM_COMPLAINT_FAIL}",
            metrics.spam_complaint_rate
        ));
    }

    if !reasons.is_empty() {
        return GateSignal::Fail {
            reasons,
            blocked_features: vec![Feature::Promotions, Feature::Campaigns],
        };
    }

    if metrics.soft_bounce_rate >= SOFT_BOUNCE_WARN {
        return GateSignal::Warning {
            reasons: vec![format!(
                "soft bounce rate {:.4} at or above {SOFT_BOUNCE_WARN}",
                metrics.soft_bounce_rate
            )],
        };
    }

    GateSignal::Pass
}

/// Evaluate funnel throughput against the gate thresholds.
#[must_use]
pub fn evaluate_funnel(
    current_cr: f64,
    previous_cr: f64,
    consecutive_low_days: u32,
) -> GateSignal {
    if consecutive_low_days >= FUNNEL_LOW_DAYS_FAIL && current_cr < FUNNEL_CR_FAIL {
        return GateSignal::Fail {
            reasons: vec![format!(
                "conversion rate {current_cr:.4} below {FUNNEL_CR_FAIL} for {consecutive_low_days} consecutive days"
            )],
            blocked_features: vec![Feature::PaidAcquisitionScaling],
        };
    }

    if previous_cr > 0.0 {
        let variance = (current_cr - previous_cr).abs() / previous_cr;
        if variance > FUNNEL_VARIANCE_WARN {
            return GateSignal::Warning {
                reasons: vec![format!(
                    "week-over-week conversion variance {variance:.2} exceeds {FUNNEL_VARIANCE_WARN}"
                )],
            };
        }
    }

    GateSignal::Pass
}

/// Persisted gate state for one `(merchant, gate)` pair.
///
/// Absence of a record is implicit PASS.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GateState {
    /// The merchant being gated.
    pub merchant_id: MerchantId,

    /// Which gate.
    pub gate_type: GateType,

    /// Current status.
    pub status: GateStatus,

    /// When the gate first failed (grace period entry).
    pub failed_at: Option<DateTime<Utc>>,

    /// Remediation deadline; after this a failing evaluation blocks.
    pub grace_period_ends_at: Option<DateTime<Utc>>,

    /// The metrics snapshot from the latest evaluation.
    pub metrics: serde_json::Value,

    /// Threshold descriptions from the latest evaluation.
    pub reasons: Vec<String>,

    /// Features currently blocked (only populated in `Fail`).
    pub blocked_features: Vec<Feature>,

    /// When the state was last written.
    pub evaluated_at: DateTime<Utc>,
}

/// Outcome of applying an evaluation to the persisted state.
#[derive(Debug, Clone)]
pub enum GateTransition {
    /// Delete any persisted state; the gate is implicitly passing.
    Clear,
    /// Persist this state.
    Update(GateState),
}

/// Apply a fresh evaluation signal to the previous persisted state.
///
/// - A pass signal always clears, including from `Fail`.
/// - A warning signal never demotes `GracePeriod` or `Fail`; those stay
///   where they are with refreshed metrics.
/// - A fail signal enters `GracePeriod` from anywhere below it, and only
///   escalates to `Fail` once a failing evaluation lands after the grace
///   deadline.
#[must_use]
pub fn transition(
    previous: Option<&GateState>,
    signal: &GateSignal,
    merchant_id: MerchantId,
    gate_type: GateType,
    metrics: serde_json::Value,
    now: DateTime<Utc>,
) -> GateTransition {
    let base = |status, reasons: &[String], blocked: Vec<Feature>| GateState {
        merchant_id,
        gate_type,
        status,
        failed_at: previous.and_then(|p| p.failed_at),
        grace_period_ends_at: previous.and_then(|p| p.grace_period_ends_at),
        metrics: metrics.clone(),
        reasons: reasons.to_vec(),
        blocked_features: blocked,
        evaluated_at: now,
    };

    match signal {
        GateSignal::Pass => GateTransition::Clear,

        GateSignal::Warning { reasons } => match previous.map(|p| p.status) {
            // Warning does not clear an open grace period or a failure.
            Some(GateStatus::GracePeriod) => {
                GateTransition::Update(base(GateStatus::GracePeriod, reasons, Vec::new()))
            }
            Some(GateStatus::Fail) => {
                let blocked = previous.map(|p| p.blocked_features.clone()).unwrap_or_default();
                GateTransition::Update(base(GateStatus::Fail, reasons, blocked))
            }
            _ => GateTransition::Update(base(GateStatus::Warning, reasons, Vec::new())),
        },

        GateSignal::Fail {
            reasons,
            blocked_features,
        } => match previous.map(|p| p.status) {
            Some(GateStatus::GracePeriod) => {
                let deadline = previous.and_then(|p| p.grace_period_ends_at);
                if deadline.is_some_and(|d| now > d) {
                    GateTransition::Update(base(
                        GateStatus::Fail,
                        reasons,
                        blocked_features.clone(),
                    ))
                } else {
                    // Still inside the remediation window; deadline holds.
                    GateTransition::Update(base(GateStatus::GracePeriod, reasons, Vec::new()))
                }
            }
            Some(GateStatus::Fail) => {
                GateTransition::Update(base(GateStatus::Fail, reasons, blocked_features.clone()))
            }
            _ => {
                // First failing evaluation: open the grace period.
                let mut state = base(GateStatus::GracePeriod, reasons, Vec::new());
                state.failed_at = Some(now);
                state.grace_period_ends_at = Some(now + Duration::hours(GRACE_PERIOD_HOURS));
                GateTransition::Update(state)
            }
        },
    }
}

/// An audited gate override. Append-only; never mutated or deleted.
///
/// Recording an override does not change the gate's state: the gate stays
/// failed for future evaluations, and the override is consulted by the
/// specific action it authorizes.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GateOverride {
    /// Override identifier (ULID, time-ordered).
    pub id: OverrideId,

    /// The merchant whose gate is bypassed.
    pub merchant_id: MerchantId,

    /// Which gate is bypassed.
    pub gate_type: GateType,

    /// Who authorized the bypass.
    pub operator_id: OperatorId,

    /// Why. Required; an empty reason is rejected before this is built.
    pub reason: String,

    /// When the override was recorded.
    pub created_at: DateTime<Utc>,
}

impl GateOverride {
    /// Record an override.
    ///
    /// # Errors
    ///
    /// Returns `SyncError::MissingOverrideReason` when the reason is empty
    /// or whitespace.
    pub fn record(
        merchant_id: MerchantId,
        gate_type: GateType,
        operator_id: OperatorId,
        reason: String,
    ) -> Result<Self, SyncError> {
        if reason.trim().is_empty() {
            return Err(SyncError::MissingOverrideReason);
        }
        Ok(Self {
            id: OverrideId::generate(),
            merchant_id,
            gate_type,
            operator_id,
            reason,
            created_at: Utc::now(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn failing_deliverability() -> DeliverabilityMetrics {
        DeliverabilityMetrics {
            hard_bounce_rate: 0.002,
            soft_bounce_rate: 0.06,
            spam_complaint_rate: 0.0005,
        }
    }

    #[test]
    fn deliverability_fails_on_soft_bounce() {
        let signal = evaluate_deliverability(&failing_deliverability());
        let GateSignal::Fail {
            reasons,
            blocked_features,
        } = signal
        else {
            panic!("expected fail signal");
        };
        assert_eq!(reasons.len(), 1);
        assert!(reasons[0].contains("soft bounce"));
        assert_eq!(
            blocked_features,
            vec![Feature::Promotions, Feature::Campaigns]
        );
    }

    #[test]
    fn deliverability_warns_between_three_and_five_percent() {
        let signal = evaluate_deliverability(&DeliverabilityMetrics {
            hard_bounce_rate: 0.001,
            soft_bounce_rate: 0.04,
            spam_complaint_rate: 0.0,
        });
        assert!(matches!(signal, GateSignal::Warning { .. }));
    }

    #[test]
    fn deliverability_passes_clean_metrics() {
        let signal = evaluate_deliverability(&DeliverabilityMetrics {
            hard_bounce_rate: 0.001,
            soft_bounce_rate: 0.01,
            spam_complaint_rate: 0.0005,
        });
        assert_eq!(signal, GateSignal::Pass);
    }

    #[test]
    fn deliverability_fails_on_hard_bounce_alone() {
        let signal = evaluate_deliverability(&DeliverabilityMetrics {
            hard_bounce_rate: 0.006,
            soft_bounce_rate: 0.0,
            spam_complaint_rate: 0.0,
        });
        assert!(matches!(signal, GateSignal::Fail { .. }));
    }

    #[test]
    fn funnel_fails_on_sustained_low_cr() {
        let signal = evaluate_funnel(0.018, 0.02, 3);
        let GateSignal::Fail {
            blocked_features, ..
        } = signal
        else {
            panic!("expected fail signal");
        };
        assert_eq!(blocked_features, vec![Feature::PaidAcquisitionScaling]);
    }

    #[test]
    fn funnel_warns_on_variance() {
        // 20% week-over-week swing.
        let signal = evaluate_funnel(0.03, 0.025, 0);
        assert!(matches!(signal, GateSignal::Warning { .. }));
    }

    #[test]
    fn funnel_passes_stable_cr() {
        let signal = evaluate_funnel(0.025, 0.024, 0);
        assert_eq!(signal, GateSignal::Pass);
    }

    #[test]
    fn funnel_low_cr_without_streak_does_not_fail() {
        let signal = evaluate_funnel(0.018, 0.018, 2);
        assert_eq!(signal, GateSignal::Pass);
    }

    #[test]
    fn first_failure_opens_grace_period() {
        let now = Utc::now();
        let merchant = MerchantId::generate();
        let signal = evaluate_deliverability(&failing_deliverability());
        let GateTransition::Update(state) = transition(
            None,
            &signal,
            merchant,
            GateType::Deliverability,
            json!({}),
            now,
        ) else {
            panic!("expected update");
        };
        assert_eq!(state.status, GateStatus::GracePeriod);
        assert_eq!(state.failed_at, Some(now));
        assert_eq!(
            state.grace_period_ends_at,
            Some(now + Duration::hours(GRACE_PERIOD_HOURS))
        );
        assert!(state.blocked_features.is_empty());
    }

    #[test]
    fn failure_after_deadline_escalates_to_fail() {
        let merchant = MerchantId::generate();
        let first = Utc::now();
        let signal = evaluate_deliverability(&failing_deliverability());
        let GateTransition::Update(grace) = transition(
            None,
            &signal,
            merchant,
            GateType::Deliverability,
            json!({}),
            first,
        ) else {
            panic!("expected update");
        };

        let later = first + Duration::hours(25);
        let GateTransition::Update(failed) = transition(
            Some(&grace),
            &signal,
            merchant,
            GateType::Deliverability,
            json!({}),
            later,
        ) else {
            panic!("expected update");
        };
        assert_eq!(failed.status, GateStatus::Fail);
        assert_eq!(
            failed.blocked_features,
            vec![Feature::Promotions, Feature::Campaigns]
        );
    }

    #[test]
    fn failure_within_window_stays_in_grace() {
        let merchant = MerchantId::generate();
        let first = Utc::now();
        let signal = evaluate_deliverability(&failing_deliverability());
        let GateTransition::Update(grace) = transition(
            None,
            &signal,
            merchant,
            GateType::Deliverability,
            json!({}),
            first,
        ) else {
            panic!("expected update");
        };

        let soon = first + Duration::hours(2);
        let GateTransition::Update(still) = transition(
            Some(&grace),
            &signal,
            merchant,
            GateType::Deliverability,
            json!({}),
            soon,
        ) else {
            panic!("expected update");
        };
        assert_eq!(still.status, GateStatus::GracePeriod);
        // Deadline unchanged by repeated failures inside the window.
        assert_eq!(still.grace_period_ends_at, grace.grace_period_ends_at);
        assert!(still.blocked_features.is_empty());
    }

    #[test]
    fn pass_clears_even_from_fail() {
        let merchant = MerchantId::generate();
        let now = Utc::now();
        let failed = GateState {
            merchant_id: merchant,
            gate_type: GateType::Deliverability,
            status: GateStatus::Fail,
            failed_at: Some(now - Duration::hours(48)),
            grace_period_ends_at: Some(now - Duration::hours(24)),
            metrics: json!({}),
            reasons: vec!["soft bounce".into()],
            blocked_features: vec![Feature::Promotions, Feature::Campaigns],
            evaluated_at: now - Duration::hours(1),
        };
        let result = transition(
            Some(&failed),
            &GateSignal::Pass,
            merchant,
            GateType::Deliverability,
            json!({}),
            now,
        );
        assert!(matches!(result, GateTransition::Clear));
    }

    #[test]
    fn warning_does_not_demote_fail() {
        let merchant = MerchantId::generate();
        let now = Utc::now();
        let failed = GateState {
            merchant_id: merchant,
            gate_type: GateType::Deliverability,
            status: GateStatus::Fail,
            failed_at: Some(now - Duration::hours(48)),
            grace_period_ends_at: Some(now - Duration::hours(24)),
            metrics: json!({}),
            reasons: Vec::new(),
            blocked_features: vec![Feature::Promotions, Feature::Campaigns],
            evaluated_at: now,
        };
        let GateTransition::Update(state) = transition(
            Some(&failed),
            &GateSignal::Warning {
                reasons: vec!["soft bounce warn".into()],
            },
            merchant,
            GateType::Deliverability,
            json!({}),
            now,
        ) else {
            panic!("expected update");
        };
        assert_eq!(state.status, GateStatus::Fail);
        assert_eq!(
            state.blocked_features,
            vec![Feature::Promotions, Feature::Campaigns]
        );
    }

    #[test]
    fn override_requires_reason() {
        let err = GateOverride::record(
            MerchantId::generate(),
            GateType::Deliverability,
            OperatorId::generate(),
            "   ".into(),
        )
        .unwrap_err();
        assert!(matches!(err, SyncError::MissingOverrideReason));

        let ok = GateOverride::record(
            MerchantId::generate(),
            GateType::Deliverability,
            OperatorId::generate(),
            "campaign approved by compliance".into(),
        );
        assert!(ok.is_ok());
    }
}

//! Seasonally-adjusted revenue baselines.
//!
//! A baseline is the expected revenue per day-of-week for a merchant,
//! derived from trailing order history with statistical outliers removed.
//! The computation here is pure; the service layer feeds it daily revenue
//! series and persists the result.

use chrono::{DateTime, Datelike, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

use crate::ids::MerchantId;

/// Minimum filtered data points for a baseline to be considered settled.
pub const MIN_DATA_POINTS: usize = 30;

/// Minimum series length before the outlier pass is applied.
pub const MIN_POINTS_FOR_OUTLIER_FILTER: usize = 5;

/// How many standard deviations from the mean a day may sit before it is
/// excluded as an anomaly.
pub const OUTLIER_SIGMA: f64 = 2.0;

/// One merchant-local calendar day of revenue.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct DailyRevenue {
    /// The merchant-local calendar date.
    pub date: NaiveDate,

    /// Total revenue for the day, in integer cents.
    pub revenue_cents: i64,
}

impl DailyRevenue {
    /// Day-of-week bucket, 0 = Sunday .. 6 = Saturday.
    #[must_use]
    pub fn day_of_week(&self) -> usize {
        self.date.weekday().num_days_from_sunday() as usize
    }
}

/// A merchant's persisted revenue expectation.
///
/// Fully replaced on each recalculation, never incrementally merged.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Baseline {
    /// The merchant this baseline belongs to.
    pub merchant_id: MerchantId,

    /// Expected revenue in cents, indexed by day-of-week
    /// (0 = Sunday .. 6 = Saturday). Days with no samples are 0.
    pub by_day_of_week: [i64; 7],

    /// The lookback window length used, in days.
    pub lookback_days: u32,

    /// Daily data points that contributed after anomaly filtering.
    pub data_points_used: u32,

    /// True until at least [`MIN_DATA_POINTS`] filtered points contributed.
    pub is_provisional: bool,

    /// Daily data points excluded by the anomaly filter.
    pub anomalies_excluded: u32,

    /// When this baseline was computed.
    pub calculated_at: DateTime<Utc>,
}

/// Result of the pure baseline computation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BaselineComputation {
    /// Expected revenue in cents by day-of-week.
    pub by_day_of_week: [i64; 7],

    /// Filtered points that contributed.
    pub data_points_used: u32,

    /// Points excluded by the anomaly filter.
    pub anomalies_excluded: u32,

    /// Provisional until enough data has accumulated.
    pub is_provisional: bool,
}

impl BaselineComputation {
    /// Attach merchant identity and window metadata for persistence.
    #[must_use]
    pub fn into_baseline(self, merchant_id: MerchantId, lookback_days: u32) -> Baseline {
        Baseline {
            merchant_id,
            by_day_of_week: self.by_day_of_week,
            lookback_days,
            data_points_used: self.data_points_used,
            is_provisional: self.is_provisional,
            anomalies_excluded: self.anomalies_excluded,
            calculated_at: Utc::now(),
        }
    }
}

/// Compute a day-of-week revenue expectation from a daily revenue series.
///
/// When `exclude_anomalies` is set and the series has more than
/// [`MIN_POINTS_FOR_OUTLIER_FILTER`] points, days whose revenue falls
/// outside `mean ± OUTLIER_SIGMA * population-stddev` are dropped before
/// averaging. Revenue accumulates unrounded; rounding to whole cents
/// happens only at the per-bucket average.
///
/// An empty series yields an explicit all-zero provisional result.
#[must_use]
#[allow(clippy::cast_precision_loss, clippy::cast_possible_truncation)]
pub fn compute(daily: &[DailyRevenue], exclude_anomalies: bool) -> BaselineComputation {
    let filtered: Vec<DailyRevenue> =
        if exclude_anomalies && daily.len() > MIN_POINTS_FOR_OUTLIER_FILTER {
            let mean = daily.iter().map(|d| d.revenue_cents as f64).sum::<f64>()
                / daily.len() as f64;
            let variance = daily
                .iter()
                .map(|d| {
                    let diff = d.revenue_cents as f64 - mean;
                    diff * diff
                })
                .sum::<f64>()
                / daily.len() as f64;
            let sigma = variance.sqrt();
            let low = mean - OUTLIER_SIGMA * sigma;
            let high = mean + OUTLIER_SIGMA * sigma;

            daily
                .iter()
                .copied()
                .filter(|d| {
                    let v = d.revenue_cents as f64;
                    (low..=high).contains(&v)
                })
                .collect()
        } else {
            daily.to_vec()
        };

    let anomalies_excluded = (daily.len() - filtered.len()) as u32;

    let mut sums = [0i64; 7];
    let mut counts = [0u32; 7];
    for day in &filtered {
        let bucket = day.day_of_week();
        sums[bucket] += day.revenue_cents;
        counts[bucket] += 1;
    }

    let mut by_day_of_week = [0i64; 7];
    for bucket in 0..7 {
        if counts[bucket] > 0 {
            // Rounding to whole cents happens only here, at the average.
            by_day_of_week[bucket] =
                (sums[bucket] as f64 / f64::from(counts[bucket])).round() as i64;
        }
    }

    BaselineComputation {
        by_day_of_week,
        data_points_used: filtered.len() as u32,
        anomalies_excluded,
        is_provisional: filtered.len() < MIN_DATA_POINTS,
    }
}

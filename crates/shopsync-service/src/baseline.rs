//! Baseline engine runner: turns order history into a persisted baseline.

use std::sync::Arc;

use chrono::{Duration, NaiveDate, Utc};

use shopsync_core::{baseline, Baseline, DailyRevenue, MerchantId, SyncError};
use shopsync_store::{RocksStore, Store};

/// Computes and persists per-merchant revenue baselines.
pub struct BaselineEngine {
    store: Arc<RocksStore>,
}

impl BaselineEngine {
    /// Create an engine over the given store.
    #[must_use]
    pub fn new(store: Arc<RocksStore>) -> Self {
        Self { store }
    }

    /// Recalculate a merchant's baseline from its trailing order window and
    /// persist the full replacement.
    ///
    /// Revenue is bucketed into merchant-local calendar days using the
    /// merchant's fixed UTC offset. Zero orders still produce an explicit
    /// all-zero provisional baseline.
    ///
    /// # Errors
    ///
    /// Returns an error when the merchant is unknown or storage fails.
    pub fn calculate(
        &self,
        merchant_id: &MerchantId,
        lookback_days: u32,
        exclude_anomalies: bool,
    ) -> Result<Baseline, SyncError> {
        let merchant = self
            .store
            .get_merchant(merchant_id)
            .map_err(|e| SyncError::Storage(e.to_string()))?
            .ok_or_else(|| SyncError::MerchantNotFound {
                merchant_id: merchant_id.to_string(),
            })?;

        let to = Utc::now();
        let from = to - Duration::days(i64::from(lookback_days));
        let orders = self
            .store
            .list_orders_in_window(merchant_id, from, to)
            .map_err(|e| SyncError::Storage(e.to_string()))?;

        let daily = bucket_by_local_day(
            orders
                .iter()
                .map(|o| (o.created_at, o.revenue_cents)),
            merchant.utc_offset_minutes,
        );

        let computation = baseline::compute(&daily, exclude_anomalies);
        let result = computation.into_baseline(*merchant_id, lookback_days);

        self.store
            .put_baseline(&result)
            .map_err(|e| SyncError::Storage(e.to_string()))?;

        tracing::info!(
            merchant_id = %merchant_id,
            lookback_days,
            data_points = result.data_points_used,
            anomalies_excluded = result.anomalies_excluded,
            provisional = result.is_provisional,
            "Baseline recalculated"
        );
        Ok(result)
    }

    /// Recalculate every active merchant, continue-on-error.
    pub fn sweep(&self, lookback_days: u32) {
        let merchants = match self.store.list_active_merchants() {
            Ok(merchants) => merchants,
            Err(e) => {
                tracing::error!(error = %e, "Baseline sweep could not list merchants");
                return;
            }
        };

        for merchant in merchants {
            if let Err(err) = self.calculate(&merchant.id, lookback_days, true) {
                tracing::error!(
                    merchant_id = %merchant.id,
                    error = %err,
                    "Baseline recalculation failed for merchant"
                );
            }
        }
    }
}

/// Sum order revenue into merchant-local calendar days, oldest first.
fn bucket_by_local_day(
    orders: impl Iterator<Item = (chrono::DateTime<Utc>, i64)>,
    utc_offset_minutes: i32,
) -> Vec<DailyRevenue> {
    let offset = Duration::minutes(i64::from(utc_offset_minutes));

    let mut by_day: std::collections::BTreeMap<NaiveDate, i64> = std::collections::BTreeMap::new();
    for (created_at, revenue_cents) in orders {
        let local_date = (created_at + offset).date_naive();
        *by_day.entry(local_date).or_insert(0) += revenue_cents;
    }

    by_day
        .into_iter()
        .map(|(date, revenue_cents)| DailyRevenue {
            date,
            revenue_cents,
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::DateTime;

    fn ts(s: &str) -> DateTime<Utc> {
        s.parse().unwrap()
    }

    #[test]
    fn orders_sum_into_calendar_days() {
        let daily = bucket_by_local_day(
            [
                (ts("2025-06-02T10:00:00Z"), 1_000),
                (ts("2025-06-02T18:00:00Z"), 2_000),
                (ts("2025-06-03T09:00:00Z"), 500),
            ]
            .into_iter(),
            0,
        );

        assert_eq!(daily.len(), 2);
        assert_eq!(daily[0].date, "2025-06-02".parse().unwrap());
        assert_eq!(daily[0].revenue_cents, 3_000);
        assert_eq!(daily[1].revenue_cents, 500);
    }

    #[test]
    fn utc_offset_shifts_day_boundary() {
        // 23:30 UTC on the 2nd is already the 3rd at UTC+1.
        let daily = bucket_by_local_day(
            [(ts("2025-06-02T23:30:00Z"), 1_000)].into_iter(),
            60,
        );
        assert_eq!(daily[0].date, "2025-06-03".parse().unwrap());

        // And still the 2nd at UTC-5.
        let daily = bucket_by_local_day(
            [(ts("2025-06-02T23:30:00Z"), 1_000)].into_iter(),
            -300,
        );
        assert_eq!(daily[0].date, "2025-06-02".parse().unwrap());
    }
}

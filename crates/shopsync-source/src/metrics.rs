//! Metrics provider API client.
//!
//! The provider aggregates email deliverability and funnel statistics per
//! shop over trailing windows; gate evaluation consumes these numbers as-is.

use std::time::Duration;

use reqwest::Client;
use serde::Deserialize;

use crate::error::SourceError;

/// Deliverability rates over the provider's trailing window, as fractions.
#[derive(Debug, Clone, Copy, Deserialize)]
pub struct DeliverabilityStats {
    /// Hard bounce rate.
    pub hard_bounce_rate: f64,
    /// Soft bounce rate.
    pub soft_bounce_rate: f64,
    /// Spam complaint rate.
    pub spam_complaint_rate: f64,
}

/// Funnel statistics over the provider's trailing window.
#[derive(Debug, Clone, Copy, Deserialize)]
pub struct FunnelStats {
    /// Current-week conversion rate.
    pub current_cr: f64,
    /// Previous-week conversion rate.
    pub previous_cr: f64,
    /// Consecutive business days with conversion below the low threshold.
    pub consecutive_low_days: u32,
}

/// Client for the metrics provider API.
#[derive(Debug, Clone)]
pub struct MetricsClient {
    client: Client,
    base_url: String,
    api_key: String,
}

impl MetricsClient {
    /// Create a metrics provider client.
    ///
    /// # Errors
    ///
    /// Returns an error if the HTTP client cannot be built.
    pub fn new(
        base_url: impl Into<String>,
        api_key: impl Into<String>,
    ) -> Result<Self, SourceError> {
        let client = Client::builder().timeout(Duration::from_secs(30)).build()?;
        Ok(Self {
            client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            api_key: api_key.into(),
        })
    }

    /// Fetch a shop's deliverability rates.
    ///
    /// # Errors
    ///
    /// Returns an error if the request fails or the provider rejects it.
    pub async fn deliverability_stats(
        &self,
        shop_domain: &str,
    ) -> Result<DeliverabilityStats, SourceError> {
        self.get_stats("deliverability", shop_domain).await
    }

    /// Fetch a shop's funnel statistics.
    ///
    /// # Errors
    ///
    /// Returns an error if the request fails or the provider rejects it.
    pub async fn funnel_stats(&self, shop_domain: &str) -> Result<FunnelStats, SourceError> {
        self.get_stats("funnel", shop_domain).await
    }

    async fn get_stats<T: serde::de::DeserializeOwned>(
        &self,
        kind: &str,
        shop_domain: &str,
    ) -> Result<T, SourceError> {
        let url = format!("{}/v1/metrics/{kind}", self.base_url);

        let response = self
            .client
            .get(&url)
            .header("Authorization", format!("Bearer {}", self.api_key))
            .query(&[("shop", shop_domain)])
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let message = response
                .text()
                .await
                .unwrap_or_else(|_| format!("HTTP {status}"));
            return Err(SourceError::Api {
                status: status.as_u16(),
                message,
            });
        }

        let body = response.bytes().await?;
        serde_json::from_slice(&body).map_err(|e| SourceError::Decode(e.to_string()))
    }
}

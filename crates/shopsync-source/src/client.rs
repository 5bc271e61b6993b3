//! Source commerce platform API client.

use std::time::Duration;

use chrono::{DateTime, Utc};
use reqwest::Client;
use serde::Deserialize;

use crate::error::SourceError;

/// Default page size for order listings (the platform's maximum).
pub const DEFAULT_PAGE_SIZE: u32 = 250;

/// An order as the source platform reports it.
#[derive(Debug, Clone, Deserialize)]
pub struct SourceOrder {
    /// The platform's order ID.
    pub id: i64,

    /// Checkout email, if captured.
    pub email: Option<String>,

    /// Order total as a decimal string, e.g. `"42.50"`.
    pub total_price: String,

    /// When the order was placed.
    pub created_at: DateTime<Utc>,

    /// The customer, if the order has one.
    pub customer: Option<SourceCustomer>,
}

impl SourceOrder {
    /// The order total in integer cents.
    ///
    /// # Errors
    ///
    /// Returns `SourceError::InvalidMoney` when `total_price` is not a
    /// decimal money string.
    pub fn revenue_cents(&self) -> Result<i64, SourceError> {
        parse_money_cents(&self.total_price)
    }
}

/// A customer as the source platform reports it.
#[derive(Debug, Clone, Deserialize)]
pub struct SourceCustomer {
    /// The platform's customer ID.
    pub id: i64,

    /// Customer email, if known.
    pub email: Option<String>,

    /// When the customer registered, if reported.
    pub created_at: Option<DateTime<Utc>>,
}

/// Filters for an order listing request.
#[derive(Debug, Clone, Default)]
pub struct OrderListParams {
    /// Only orders created at or after this time.
    pub created_at_min: Option<DateTime<Utc>>,

    /// Only orders created at or before this time.
    pub created_at_max: Option<DateTime<Utc>>,

    /// Cursor: only orders with an ID greater than this.
    pub since_id: Option<i64>,

    /// Page size; the platform caps at 250.
    pub limit: Option<u32>,
}

#[derive(Debug, Deserialize)]
struct OrderListResponse {
    orders: Vec<SourceOrder>,
}

#[derive(Debug, Deserialize)]
struct OrderResponse {
    order: SourceOrder,
}

#[derive(Debug, Deserialize)]
struct CustomerListResponse {
    customers: Vec<SourceCustomer>,
}

#[derive(Debug, Deserialize)]
struct SourceErrorResponse {
    errors: serde_json::Value,
}

/// Client for the source commerce platform's admin API.
///
/// Credentials are per-merchant and passed per call; the client itself only
/// owns the connection pool.
#[derive(Debug, Clone)]
pub struct CommerceClient {
    client: Client,
    base_url_override: Option<String>,
}

impl CommerceClient {
    /// Create a client that talks to each merchant's shop domain over HTTPS.
    ///
    /// # Errors
    ///
    /// Returns an error if the HTTP client cannot be built.
    pub fn new() -> Result<Self, SourceError> {
        let client = Client::builder().timeout(Duration::from_secs(30)).build()?;
        Ok(Self {
            client,
            base_url_override: None,
        })
    }

    /// Create a client that sends every request to a fixed base URL instead
    /// of the merchant's shop domain. Used against stub servers.
    ///
    /// # Errors
    ///
    /// Returns an error if the HTTP client cannot be built.
    pub fn with_base_url(base_url: impl Into<String>) -> Result<Self, SourceError> {
        let client = Client::builder().timeout(Duration::from_secs(30)).build()?;
        Ok(Self {
            client,
            base_url_override: Some(base_url.into().trim_end_matches('/').to_string()),
        })
    }

    fn base_url(&self, shop_domain: &str) -> String {
        self.base_url_override
            .clone()
            .unwrap_or_else(|| format!("https://{shop_domain}"))
    }

    /// List one page of a merchant's orders.
    ///
    /// # Errors
    ///
    /// Returns an error if the request fails or the platform rejects it.
    pub async fn list_orders(
        &self,
        shop_domain: &str,
        access_token: &str,
        params: &OrderListParams,
    ) -> Result<Vec<SourceOrder>, SourceError> {
        let url = format!("{}/admin/api/orders.json", self.base_url(shop_domain));

        let mut query: Vec<(&str, String)> = vec![(
            "limit",
            params.limit.unwrap_or(DEFAULT_PAGE_SIZE).to_string(),
        )];
        if let Some(min) = params.created_at_min {
            query.push(("created_at_min", min.to_rfc3339()));
        }
        if let Some(max) = params.created_at_max {
            query.push(("created_at_max", max.to_rfc3339()));
        }
        if let Some(since_id) = params.since_id {
            query.push(("since_id", since_id.to_string()));
        }

        let response = self
            .client
            .get(&url)
            .header("X-Access-Token", access_token)
            .query(&query)
            .send()
            .await?;

        Self::handle_response::<OrderListResponse>(response)
            .await
            .map(|r| r.orders)
    }

    /// Fetch a single order by its platform ID.
    ///
    /// # Errors
    ///
    /// Returns an error if the request fails; a missing order is `Ok(None)`.
    pub async fn get_order(
        &self,
        shop_domain: &str,
        access_token: &str,
        order_id: i64,
    ) -> Result<Option<SourceOrder>, SourceError> {
        let url = format!(
            "{}/admin/api/orders/{order_id}.json",
            self.base_url(shop_domain)
        );

        let response = self
            .client
            .get(&url)
            .header("X-Access-Token", access_token)
            .send()
            .await?;

        if response.status() == reqwest::StatusCode::NOT_FOUND {
            return Ok(None);
        }

        Self::handle_response::<OrderResponse>(response)
            .await
            .map(|r| Some(r.order))
    }

    /// List one page of a merchant's customers.
    ///
    /// # Errors
    ///
    /// Returns an error if the request fails or the platform rejects it.
    pub async fn list_customers(
        &self,
        shop_domain: &str,
        access_token: &str,
        since_id: Option<i64>,
        limit: Option<u32>,
    ) -> Result<Vec<SourceCustomer>, SourceError> {
        let url = format!("{}/admin/api/customers.json", self.base_url(shop_domain));

        let mut query: Vec<(&str, String)> =
            vec![("limit", limit.unwrap_or(DEFAULT_PAGE_SIZE).to_string())];
        if let Some(since_id) = since_id {
            query.push(("since_id", since_id.to_string()));
        }

        let response = self
            .client
            .get(&url)
            .header("X-Access-Token", access_token)
            .query(&query)
            .send()
            .await?;

        Self::handle_response::<CustomerListResponse>(response)
            .await
            .map(|r| r.customers)
    }

    /// List every order in a `created_at` window, following the `since_id`
    /// cursor until a short page.
    ///
    /// # Errors
    ///
    /// Returns an error if any page request fails.
    pub async fn orders_in_window(
        &self,
        shop_domain: &str,
        access_token: &str,
        from: DateTime<Utc>,
        to: DateTime<Utc>,
    ) -> Result<Vec<SourceOrder>, SourceError> {
        let limit = DEFAULT_PAGE_SIZE;
        let mut params = OrderListParams {
            created_at_min: Some(from),
            created_at_max: Some(to),
            since_id: None,
            limit: Some(limit),
        };

        let mut all = Vec::new();
        loop {
            let page = self.list_orders(shop_domain, access_token, &params).await?;
            let page_len = page.len();
            params.since_id = page.iter().map(|o| o.id).max().or(params.since_id);
            all.extend(page);

            if page_len < limit as usize {
                break;
            }
        }

        tracing::debug!(
            shop_domain = %shop_domain,
            orders = all.len(),
            "fetched order window from source"
        );
        Ok(all)
    }

    /// Handle API response and convert errors.
    async fn handle_response<T: serde::de::DeserializeOwned>(
        response: reqwest::Response,
    ) -> Result<T, SourceError> {
        let status = response.status();

        if status.is_success() {
            let body = response.bytes().await?;
            return serde_json::from_slice(&body)
                .map_err(|e| SourceError::Decode(e.to_string()));
        }

        let error_body: Result<SourceErrorResponse, _> = response.json().await;
        match error_body {
            Ok(parsed) => Err(SourceError::Api {
                status: status.as_u16(),
                message: parsed.errors.to_string(),
            }),
            Err(_) => Err(SourceError::Api {
                status: status.as_u16(),
                message: format!("HTTP {status}"),
            }),
        }
    }
}

/// Parse a decimal money string into integer cents.
///
/// Accepts an optional sign, an integer part, and at most two fractional
/// digits (`"42"`, `"42.5"`, `"42.50"`, `"-3.99"`).
///
/// # Errors
///
/// Returns `SourceError::InvalidMoney` for anything else, including more
/// than two fractional digits.
pub fn parse_money_cents(value: &str) -> Result<i64, SourceError> {
    let invalid = || SourceError::InvalidMoney(value.to_string());

    let trimmed = value.trim();
    let (negative, digits) = match trimmed.strip_prefix('-') {
        Some(rest) => (true, rest),
        None => (false, trimmed),
    };

    let (whole, frac) = match digits.split_once('.') {
        Some((whole, frac)) => (whole, frac),
        None => (digits, ""),
    };
    if whole.is_empty() || whole.chars().any(|c| !c.is_ascii_digit()) {
        return Err(invalid());
    }
    if frac.len() > 2 || frac.chars().any(|c| !c.is_ascii_digit()) {
        return Err(invalid());
    }

    let whole: i64 = whole.parse().map_err(|_| invalid())?;
    let frac_cents: i64 = match frac.len() {
        0 => 0,
        1 => frac.parse::<i64>().map_err(|_| invalid())? * 10,
        _ => frac.parse().map_err(|_| invalid())?,
    };

    let cents = whole
        .checked_mul(100)
        .and_then(|c| c.checked_add(frac_cents))
        .ok_or_else(invalid)?;
    Ok(if negative { -cents } else { cents })
}

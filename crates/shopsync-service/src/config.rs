//! Service configuration.

/// Service configuration loaded from environment variables.
#[derive(Debug, Clone)]
pub struct ServiceConfig {
    /// Address to listen on (default: "0.0.0.0:8080").
    pub listen_addr: String,

    /// Path to `RocksDB` data directory (default: "/data/shopsync").
    pub data_dir: String,

    /// Shared secret for webhook HMAC verification. When absent, signature
    /// checks are skipped with a logged warning (development mode).
    pub webhook_secret: Option<String>,

    /// Admin API key for operator endpoints (dead-letter dispositions,
    /// gate overrides, manual triggers).
    pub admin_api_key: Option<String>,

    /// Base URL override for the source commerce API. Normally unset; the
    /// client targets each merchant's shop domain. Set for stub servers.
    pub source_base_url: Option<String>,

    /// Metrics provider API URL (optional; gate sweeps disabled without it).
    pub metrics_api_url: Option<String>,

    /// Metrics provider API key (optional).
    pub metrics_api_key: Option<String>,

    /// How often the queue worker polls for due jobs, in milliseconds.
    pub queue_poll_interval_ms: u64,

    /// Reconciliation sweep interval in seconds.
    pub reconcile_interval_seconds: u64,

    /// Reconciliation lookback window in hours. Overlaps the previous run
    /// to tolerate clock skew and late-arriving events.
    pub reconcile_lookback_hours: i64,

    /// Baseline recalculation interval in seconds.
    pub baseline_interval_seconds: u64,

    /// Baseline lookback window in days.
    pub baseline_lookback_days: u32,

    /// Gate evaluation interval in seconds.
    pub gate_interval_seconds: u64,

    /// FAILED dead-letter count at which stats calls log an alert warning.
    pub dead_letter_alert_threshold: u64,

    /// CORS allowed origins.
    pub cors_origins: Vec<String>,

    /// Maximum request body size in bytes.
    pub max_body_bytes: usize,

    /// Request timeout in seconds.
    pub request_timeout_seconds: u64,
}

impl ServiceConfig {
    /// Load configuration from environment variables.
    #[must_use]
    pub fn from_env() -> Self {
        Self {
            listen_addr: std::env::var("LISTEN_ADDR").unwrap_or_else(|_| "0.0.0.0:8080".into()),
            data_dir: std::env::var("DATA_DIR").unwrap_or_else(|_| "/data/shopsync".into()),
            webhook_secret: std::env::var("WEBHOOK_SECRET").ok(),
            admin_api_key: std::env::var("ADMIN_API_KEY").ok(),
            source_base_url: std::env::var("SOURCE_BASE_URL").ok(),
            metrics_api_url: std::env::var("METRICS_API_URL").ok(),
            metrics_api_key: std::env::var("METRICS_API_KEY").ok(),
            queue_poll_interval_ms: env_parsed("QUEUE_POLL_INTERVAL_MS", 500),
            reconcile_interval_seconds: env_parsed("RECONCILE_INTERVAL_SECONDS", 3600),
            reconcile_lookback_hours: env_parsed("RECONCILE_LOOKBACK_HOURS", 12),
            baseline_interval_seconds: env_parsed("BASELINE_INTERVAL_SECONDS", 86_400),
            baseline_lookback_days: env_parsed("BASELINE_LOOKBACK_DAYS", 30),
            gate_interval_seconds: env_parsed("GATE_INTERVAL_SECONDS", 900),
            dead_letter_alert_threshold: env_parsed("DEAD_LETTER_ALERT_THRESHOLD", 10),
            cors_origins: std::env::var("CORS_ORIGINS")
                .unwrap_or_else(|_| "*".into())
                .split(',')
                .map(|s| s.trim().to_string())
                .collect(),
            max_body_bytes: env_parsed("MAX_BODY_BYTES", 1024 * 1024),
            request_timeout_seconds: env_parsed("REQUEST_TIMEOUT_SECONDS", 30),
        }
    }
}

fn env_parsed<T: std::str::FromStr>(name: &str, default: T) -> T {
    std::env::var(name)
        .ok()
        .and_then(|s| s.parse().ok())
        .unwrap_or(default)
}

impl Default for ServiceConfig {
    fn default() -> Self {
        Self {
            listen_addr: "0.0.0.0:8080".into(),
            data_dir: "/data/shopsync".into(),
            webhook_secret: None,
            admin_api_key: None,
            source_base_url: None,
            metrics_api_url: None,
            metrics_api_key: None,
            queue_poll_interval_ms: 500,
            reconcile_interval_seconds: 3600,
            reconcile_lookback_hours: 12,
            baseline_interval_seconds: 86_400,
            baseline_lookback_days: 30,
            gate_interval_seconds: 900,
            dead_letter_alert_threshold: 10,
            cors_origins: vec!["*".into()],
            max_body_bytes: 1024 * 1024,
            request_timeout_seconds: 30,
        }
    }
}

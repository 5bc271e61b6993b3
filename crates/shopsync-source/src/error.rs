//! Client error types.

/// Errors that can occur when calling the source platform or the metrics
/// provider.
///
/// Timeouts and connection failures surface as [`SourceError::Http`] and are
/// transient from the pipeline's point of view; the caller retries them.
#[derive(Debug, thiserror::Error)]
pub enum SourceError {
    /// HTTP request failed (connect, timeout, TLS).
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// The API returned an error response.
    #[error("API error: {status} - {message}")]
    Api {
        /// HTTP status code.
        status: u16,
        /// Error message from the response body, or the status line.
        message: String,
    },

    /// A response body could not be decoded.
    #[error("decode error: {0}")]
    Decode(String),

    /// A money string could not be parsed into cents.
    #[error("invalid money value: {0}")]
    InvalidMoney(String),
}

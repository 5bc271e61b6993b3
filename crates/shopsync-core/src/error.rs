//! Error types for shopsync.

use crate::ids::IdError;

/// Result type for shopsync operations.
pub type Result<T> = std::result::Result<T, SyncError>;

/// Errors that can occur in shopsync operations.
///
/// Expected domain conditions (duplicate event, failing gate) are not
/// errors; they are represented as typed results by the components that
/// produce them.
#[derive(Debug, thiserror::Error)]
pub enum SyncError {
    /// Merchant not found.
    #[error("merchant not found: {merchant_id}")]
    MerchantNotFound {
        /// The merchant ID that was not found.
        merchant_id: String,
    },

    /// Unknown webhook topic. Permanent: never retried.
    #[error("unknown topic: {topic}")]
    UnknownTopic {
        /// The topic string that could not be parsed.
        topic: String,
    },

    /// Event payload is missing required fields or has the wrong shape.
    /// Permanent: never retried.
    #[error("malformed payload: {0}")]
    MalformedPayload(String),

    /// Dead-letter entry not found.
    #[error("dead letter not found: {id}")]
    DeadLetterNotFound {
        /// The entry ID that was not found.
        id: String,
    },

    /// Invalid dead-letter status transition.
    #[error("invalid dead letter transition from {from} to {to}")]
    InvalidDeadLetterTransition {
        /// The current status.
        from: String,
        /// The requested status.
        to: String,
    },

    /// Gate override submitted without a reason.
    #[error("gate override requires a non-empty reason")]
    MissingOverrideReason,

    /// External service error (commerce API, metrics provider).
    #[error("external service error: {service} - {message}")]
    ExternalService {
        /// The service that failed.
        service: String,
        /// Error message.
        message: String,
    },

    /// Storage error.
    #[error("storage error: {0}")]
    Storage(String),

    /// Serialization error.
    #[error("serialization error: {0}")]
    Serialization(String),

    /// Invalid identifier.
    #[error("invalid identifier: {0}")]
    InvalidId(#[from] IdError),

    /// Configuration error.
    #[error("configuration error: {0}")]
    Configuration(String),
}

impl SyncError {
    /// Whether the queue retry policy should retry this error.
    ///
    /// Malformed payloads and unknown topics are permanent and go straight
    /// to the dead-letter store; everything else is assumed transient.
    #[must_use]
    pub fn is_permanent(&self) -> bool {
        matches!(
            self,
            Self::UnknownTopic { .. }
                | Self::MalformedPayload(_)
                | Self::MerchantNotFound { .. }
        )
    }
}

//! Engine error types.

use thiserror::Error;

/// Result type for engine operations.
pub type HookResult<T> = Result<T, HookError>;

/// Error type for engine operations.
#[derive(Debug, Error)]
pub enum HookError {
    /// Presented signature does not match the payload.
    #[error("Invalid signature")]
    InvalidSignature,

    /// Declared timestamp is outside the anti-replay window.
    #[error("Stale timestamp")]
    StaleTimestamp,

    /// Body is not the expected JSON shape.
    #[error("Malformed payload: {0}")]
    MalformedPayload(String),

    /// Request did not declare a JSON content type.
    #[error("Unsupported media type: {0}")]
    UnsupportedMediaType(String),

    /// Subscriber was deactivated before the attempt was claimed.
    #[error("Subscriber is inactive")]
    SubscriberInactive,

    /// Delivery request exceeded the configured timeout.
    #[error("Delivery timed out")]
    DeliveryTimeout,

    /// Delivery got a non-2xx response.
    #[error("Delivery failed with HTTP {0}")]
    DeliveryHttpError(u16),

    /// Delivery could not reach the subscriber at all.
    #[error("Delivery network error: {0}")]
    DeliveryNetworkError(String),

    /// Subscriber failed validation on a registry write.
    #[error("Invalid subscriber: {0}")]
    InvalidSubscriber(String),

    /// Subscriber not found.
    #[error("Subscriber not found: {0}")]
    SubscriberNotFound(String),

    /// Writing or transitioning a delivery attempt failed.
    #[error("Persistence failure: {0}")]
    PersistenceFailure(String),

    /// Internal error.
    #[error("Internal error: {0}")]
    Internal(String),
}

impl HookError {
    /// HTTP status the hosting layer should answer with for inbound rejections.
    pub fn http_status(&self) -> u16 {
        match self {
            HookError::InvalidSignature => 401,
            HookError::StaleTimestamp | HookError::MalformedPayload(_) => 400,
            HookError::UnsupportedMediaType(_) => 415,
            _ => 500,
        }
    }

    /// Stable machine-readable code for inbound rejection bodies.
    pub fn error_code(&self) -> &'static str {
        match self {
            HookError::InvalidSignature => "invalid_signature",
            HookError::StaleTimestamp => "stale_timestamp",
            HookError::MalformedPayload(_) => "malformed_payload",
            HookError::UnsupportedMediaType(_) => "unsupported_media_type",
            _ => "internal_error",
        }
    }
}

impl From<serde_json::Error> for HookError {
    fn from(err: serde_json::Error) -> Self {
        HookError::MalformedPayload(err.to_string())
    }
}

//! HTTP transport seam for outbound delivery.

use async_trait::async_trait;
use thiserror::Error;

#[cfg(feature = "http-client")]
use crate::error::{HookError, HookResult};

/// Maximum response body length retained for audit.
pub const MAX_RESPONSE_BODY_CHARS: usize = 4096;

/// Response from a delivery target.
#[derive(Debug, Clone)]
pub struct TransportResponse {
    /// HTTP status code.
    pub status: u16,
    /// Response body, truncated to [`MAX_RESPONSE_BODY_CHARS`].
    pub body: String,
}

impl TransportResponse {
    /// Whether the status is in the 2xx range.
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }
}

/// Transport-level delivery failure.
#[derive(Debug, Clone, Error)]
pub enum TransportError {
    /// The request exceeded the configured timeout.
    #[error("request timed out")]
    Timeout,
    /// The target could not be reached.
    #[error("network error: {0}")]
    Network(String),
}

/// Trait for issuing signed delivery requests.
///
/// Workers only see this seam; tests substitute a scripted transport.
#[async_trait]
pub trait DeliveryTransport: Send + Sync {
    /// POSTs `body` to `url` with the given headers.
    async fn post(
        &self,
        url: &str,
        body: Vec<u8>,
        headers: &[(&'static str, String)],
    ) -> Result<TransportResponse, TransportError>;
}

/// Reqwest-backed transport with a bounded timeout and no redirects.
#[cfg(feature = "http-client")]
pub struct HttpTransport {
    client: reqwest::Client,
}

#[cfg(feature = "http-client")]
impl HttpTransport {
    /// Builds a transport with the given per-request timeout.
    pub fn new(timeout: std::time::Duration) -> HookResult<Self> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .user_agent(concat!(env!("CARGO_PKG_NAME"), "/", env!("CARGO_PKG_VERSION")))
            .redirect(reqwest::redirect::Policy::none())
            .build()
            .map_err(|e| HookError::Internal(format!("failed to build HTTP client: {e}")))?;
        Ok(Self { client })
    }
}

#[cfg(feature = "http-client")]
#[async_trait]
impl DeliveryTransport for HttpTransport {
    async fn post(
        &self,
        url: &str,
        body: Vec<u8>,
        headers: &[(&'static str, String)],
    ) -> Result<TransportResponse, TransportError> {
        let mut request = self.client.post(url);
        for (name, value) in headers {
            request = request.header(*name, value);
        }

        let response = request.body(body).send().await.map_err(|e| {
            if e.is_timeout() {
                TransportError::Timeout
            } else {
                TransportError::Network(e.to_string())
            }
        })?;

        let status = response.status().as_u16();
        let body = response
            .text()
            .await
            .unwrap_or_default()
            .chars()
            .take(MAX_RESPONSE_BODY_CHARS)
            .collect();

        Ok(TransportResponse { status, body })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_is_success_range() {
        assert!(TransportResponse { status: 200, body: String::new() }.is_success());
        assert!(TransportResponse { status: 204, body: String::new() }.is_success());
        assert!(!TransportResponse { status: 199, body: String::new() }.is_success());
        assert!(!TransportResponse { status: 300, body: String::new() }.is_success());
        assert!(!TransportResponse { status: 500, body: String::new() }.is_success());
    }
}

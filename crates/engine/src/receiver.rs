//! Inbound receiver: validation and normalization of external webhook calls.

use async_trait::async_trait;
use chrono::Utc;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::sync::Arc;

use crate::config::InboundConfig;
use crate::error::{HookError, HookResult};
use crate::signature;

/// Boundary to the agent processor consuming accepted events.
///
/// The handoff is fire-and-acknowledge: the receiver awaits the call but a
/// processor that wants asynchronous handling enqueues internally and
/// returns immediately.
#[async_trait]
pub trait EventProcessor: Send + Sync {
    /// Handles one accepted inbound event.
    async fn process(&self, event_type: &str, data: &Value, origin: &str) -> HookResult<()>;
}

/// Acknowledgement returned for an accepted inbound event.
#[derive(Debug, Clone, Serialize)]
pub struct InboundAck {
    /// Always `"received"`.
    pub status: &'static str,
}

/// Expected inbound body shape.
#[derive(Debug, Deserialize)]
struct InboundEnvelope {
    event: String,
    timestamp: i64,
    data: Value,
}

/// Validates raw inbound requests for one configured origin and forwards
/// accepted events to the processor.
pub struct InboundReceiver {
    origin: String,
    secret: String,
    config: InboundConfig,
    processor: Arc<dyn EventProcessor>,
}

impl InboundReceiver {
    /// Creates a receiver for one origin with its shared secret.
    pub fn new(
        origin: impl Into<String>,
        secret: impl Into<String>,
        config: InboundConfig,
        processor: Arc<dyn EventProcessor>,
    ) -> Self {
        Self {
            origin: origin.into(),
            secret: secret.into(),
            config,
            processor,
        }
    }

    /// Validates one request and hands the event off on success.
    ///
    /// Rejections carry their HTTP semantics via
    /// [`HookError::http_status`] and [`HookError::error_code`]; none of
    /// them are fatal to the receiving process.
    pub async fn handle(
        &self,
        content_type: &str,
        signature_header: Option<&str>,
        body: &[u8],
    ) -> HookResult<InboundAck> {
        if !declares_json(content_type) {
            return Err(HookError::UnsupportedMediaType(content_type.to_string()));
        }

        let envelope: InboundEnvelope = serde_json::from_slice(body)?;
        if !envelope.data.is_object() {
            return Err(HookError::MalformedPayload("data must be an object".to_string()));
        }

        if self.config.validate_signature {
            let presented = signature_header.ok_or(HookError::InvalidSignature)?;
            if !signature::verify(&self.secret, body, presented) {
                tracing::warn!(
                    target: "webhook_inbound",
                    origin = %self.origin,
                    event_type = %envelope.event,
                    "rejecting inbound event, signature mismatch"
                );
                return Err(HookError::InvalidSignature);
            }
        }

        let skew = (Utc::now().timestamp() - envelope.timestamp).abs();
        if skew > self.config.max_clock_skew_seconds {
            tracing::warn!(
                target: "webhook_inbound",
                origin = %self.origin,
                event_type = %envelope.event,
                skew_seconds = skew,
                "rejecting inbound event, timestamp outside replay window"
            );
            return Err(HookError::StaleTimestamp);
        }

        self.processor
            .process(&envelope.event, &envelope.data, &self.origin)
            .await?;

        tracing::debug!(
            target: "webhook_inbound",
            origin = %self.origin,
            event_type = %envelope.event,
            "inbound event accepted"
        );
        Ok(InboundAck { status: "received" })
    }
}

/// Whether a content type declares JSON (parameters ignored).
fn declares_json(content_type: &str) -> bool {
    content_type
        .split(';')
        .next()
        .map(str::trim)
        .is_some_and(|mime| mime.eq_ignore_ascii_case("application/json"))
}

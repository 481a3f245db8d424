//! Outbound event and wire envelope.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::HookResult;

/// An event emitted for delivery to subscribers.
///
/// Ephemeral: constructed per publish call and embedded into delivery
/// records rather than persisted on its own.
#[derive(Debug, Clone)]
pub struct Event {
    /// Event type string (e.g. "order.created").
    pub event_type: String,
    /// Originating tenant/client identity.
    pub client_id: String,
    /// Opaque structured payload, passed through untouched.
    pub data: Value,
    /// When the event was created.
    pub created_at: DateTime<Utc>,
}

impl Event {
    /// Creates a new event.
    pub fn new(
        event_type: impl Into<String>,
        client_id: impl Into<String>,
        data: impl Serialize,
    ) -> Self {
        Self {
            event_type: event_type.into(),
            client_id: client_id.into(),
            data: serde_json::to_value(data).unwrap_or(Value::Null),
            created_at: Utc::now(),
        }
    }
}

/// The wire body used in both directions: `{event, timestamp, data}`.
///
/// `data` stays a raw `Value` so payloads remain forward compatible
/// without deep typing in the engine.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Envelope {
    /// Event type string.
    pub event: String,
    /// Epoch seconds when this body was built.
    pub timestamp: i64,
    /// Opaque payload.
    pub data: Value,
}

impl Envelope {
    /// Builds an envelope for an event, stamped at the event's creation time.
    pub fn for_event(event: &Event) -> Self {
        Self {
            event: event.event_type.clone(),
            timestamp: event.created_at.timestamp(),
            data: event.data.clone(),
        }
    }

    /// Restamps the envelope with the current time.
    pub fn restamped(mut self) -> Self {
        self.timestamp = Utc::now().timestamp();
        self
    }

    /// Serializes to the exact bytes that go on the wire.
    pub fn to_bytes(&self) -> HookResult<Vec<u8>> {
        Ok(serde_json::to_vec(self)?)
    }

    /// Parses an envelope from a stored request body.
    pub fn from_json(body: &str) -> HookResult<Self> {
        Ok(serde_json::from_str(body)?)
    }
}

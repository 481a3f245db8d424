//! Subscriber model and validation.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;

use crate::error::{HookError, HookResult};

/// A registered outbound destination for one tenant/client.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Subscriber {
    /// Unique identifier.
    pub id: String,
    /// Owning tenant/client identity.
    pub client_id: String,
    /// Destination URL.
    pub url: String,
    /// Shared secret for signing payloads.
    pub secret: String,
    /// Subscribed event types.
    pub events: HashSet<String>,
    /// Whether this subscriber currently receives deliveries.
    pub active: bool,
    /// When the subscriber was created.
    pub created_at: DateTime<Utc>,
}

impl Subscriber {
    /// Creates a new active subscriber.
    pub fn new(
        client_id: impl Into<String>,
        url: impl Into<String>,
        secret: impl Into<String>,
    ) -> Self {
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            client_id: client_id.into(),
            url: url.into(),
            secret: secret.into(),
            events: HashSet::new(),
            active: true,
            created_at: Utc::now(),
        }
    }

    /// Subscribes to specific event types.
    pub fn events(mut self, events: impl IntoIterator<Item = impl Into<String>>) -> Self {
        self.events = events.into_iter().map(|e| e.into()).collect();
        self
    }

    /// Creates the subscriber in a deactivated state.
    pub fn deactivated(mut self) -> Self {
        self.active = false;
        self
    }

    /// Checks if this subscriber should receive an event type.
    pub fn should_receive(&self, event_type: &str) -> bool {
        self.active && self.events.contains(event_type)
    }

    /// Validates the subscriber for a registry write.
    ///
    /// The URL must be an absolute HTTP(S) URL with a host, the secret
    /// non-empty, and the event set non-empty.
    pub fn validate(&self) -> HookResult<()> {
        let parsed = url::Url::parse(&self.url)
            .map_err(|e| HookError::InvalidSubscriber(format!("invalid URL: {e}")))?;

        match parsed.scheme() {
            "http" | "https" => {}
            scheme => {
                return Err(HookError::InvalidSubscriber(format!(
                    "unsupported URL scheme: {scheme}"
                )));
            }
        }

        if parsed.host_str().is_none() {
            return Err(HookError::InvalidSubscriber("URL must have a host".to_string()));
        }

        if self.secret.is_empty() {
            return Err(HookError::InvalidSubscriber("secret must not be empty".to_string()));
        }

        if self.events.is_empty() {
            return Err(HookError::InvalidSubscriber(
                "event set must not be empty".to_string(),
            ));
        }

        Ok(())
    }
}

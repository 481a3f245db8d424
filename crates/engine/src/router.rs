//! Event router: fan-out of one event to matching subscribers.

use std::sync::Arc;

use crate::delivery::DeliveryAttempt;
use crate::error::{HookError, HookResult};
use crate::event::{Envelope, Event};
use crate::registry::SubscriberRegistry;
use crate::storage::DeliveryStore;

/// Resolves matching active subscribers for an event and durably creates
/// one delivery attempt per match. Never waits for any HTTP call.
pub struct EventRouter {
    registry: Arc<dyn SubscriberRegistry>,
    store: Arc<dyn DeliveryStore>,
}

impl EventRouter {
    /// Creates a new router.
    pub fn new(registry: Arc<dyn SubscriberRegistry>, store: Arc<dyn DeliveryStore>) -> Self {
        Self { registry, store }
    }

    /// Publishes an event, returning the number of delivery chains created.
    ///
    /// An empty subscriber match is a no-op success. Returns once every
    /// attempt row is durably created; execution happens in the worker pool.
    pub async fn publish(&self, event: &Event) -> HookResult<usize> {
        let subscribers = self
            .registry
            .list_active(&event.client_id, &event.event_type)
            .await?;

        if subscribers.is_empty() {
            tracing::debug!(
                target: "webhook_delivery",
                event_type = %event.event_type,
                client_id = %event.client_id,
                "no active subscribers match event type"
            );
            return Ok(0);
        }

        let body = serde_json::to_string(&Envelope::for_event(event))
            .map_err(|e| HookError::PersistenceFailure(format!("envelope serialization: {e}")))?;

        for subscriber in &subscribers {
            let attempt = DeliveryAttempt::first(subscriber, &event.event_type, body.clone());
            self.store.insert(&attempt).await?;
        }

        tracing::info!(
            target: "webhook_delivery",
            event_type = %event.event_type,
            client_id = %event.client_id,
            fan_out = subscribers.len(),
            "event fanned out to subscribers"
        );

        Ok(subscribers.len())
    }
}

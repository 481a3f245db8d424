//! Subscriber registry trait and in-memory implementation.

use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;

use crate::error::{HookError, HookResult};
use crate::subscriber::Subscriber;

/// Trait for subscriber registries.
///
/// The outbound hot path only calls [`list_active`](Self::list_active);
/// the write operations exist for the administrative collaborator.
#[async_trait]
pub trait SubscriberRegistry: Send + Sync {
    /// Creates or replaces a subscriber after validation.
    async fn save(&self, subscriber: &Subscriber) -> HookResult<()>;

    /// Gets a subscriber by ID.
    async fn get(&self, id: &str) -> HookResult<Option<Subscriber>>;

    /// Lists active subscribers of a client subscribed to an event type,
    /// in registration order.
    async fn list_active(&self, client_id: &str, event_type: &str) -> HookResult<Vec<Subscriber>>;

    /// Lists all subscribers of a client.
    async fn list_for_client(&self, client_id: &str) -> HookResult<Vec<Subscriber>>;

    /// Clears the active flag on a subscriber.
    async fn deactivate(&self, id: &str) -> HookResult<()>;
}

/// In-memory subscriber registry for testing and development.
pub struct InMemorySubscriberRegistry {
    inner: RwLock<RegistryInner>,
}

struct RegistryInner {
    by_id: HashMap<String, Subscriber>,
    order: Vec<String>,
}

impl InMemorySubscriberRegistry {
    /// Creates a new in-memory registry.
    pub fn new() -> Self {
        Self {
            inner: RwLock::new(RegistryInner {
                by_id: HashMap::new(),
                order: Vec::new(),
            }),
        }
    }

    /// Creates a shared in-memory registry.
    pub fn shared() -> Arc<Self> {
        Arc::new(Self::new())
    }
}

impl Default for InMemorySubscriberRegistry {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl SubscriberRegistry for InMemorySubscriberRegistry {
    async fn save(&self, subscriber: &Subscriber) -> HookResult<()> {
        subscriber.validate()?;

        let mut inner = self.inner.write().await;
        if !inner.by_id.contains_key(&subscriber.id) {
            inner.order.push(subscriber.id.clone());
        }
        inner.by_id.insert(subscriber.id.clone(), subscriber.clone());
        Ok(())
    }

    async fn get(&self, id: &str) -> HookResult<Option<Subscriber>> {
        let inner = self.inner.read().await;
        Ok(inner.by_id.get(id).cloned())
    }

    async fn list_active(&self, client_id: &str, event_type: &str) -> HookResult<Vec<Subscriber>> {
        let inner = self.inner.read().await;
        Ok(inner
            .order
            .iter()
            .filter_map(|id| inner.by_id.get(id))
            .filter(|s| s.client_id == client_id && s.should_receive(event_type))
            .cloned()
            .collect())
    }

    async fn list_for_client(&self, client_id: &str) -> HookResult<Vec<Subscriber>> {
        let inner = self.inner.read().await;
        Ok(inner
            .order
            .iter()
            .filter_map(|id| inner.by_id.get(id))
            .filter(|s| s.client_id == client_id)
            .cloned()
            .collect())
    }

    async fn deactivate(&self, id: &str) -> HookResult<()> {
        let mut inner = self.inner.write().await;
        match inner.by_id.get_mut(id) {
            Some(subscriber) => {
                subscriber.active = false;
                Ok(())
            }
            None => Err(HookError::SubscriberNotFound(id.to_string())),
        }
    }
}

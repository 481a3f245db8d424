//! Engine wiring: registry + store + router + worker pool.

use std::sync::Arc;
use tokio::sync::Mutex;

use crate::config::EngineConfig;
use crate::error::HookResult;
use crate::event::Event;
use crate::receiver::{EventProcessor, InboundReceiver};
use crate::registry::SubscriberRegistry;
use crate::router::EventRouter;
use crate::storage::DeliveryStore;
use crate::transport::DeliveryTransport;
use crate::worker::{WorkerHandle, WorkerPool};

/// The assembled webhook I/O engine.
///
/// The hosting application provides the stores and transport, mounts the
/// inbound receiver on its own HTTP server, and calls [`publish`](Self::publish)
/// whenever its business logic emits an event.
pub struct WebhookEngine {
    config: EngineConfig,
    registry: Arc<dyn SubscriberRegistry>,
    store: Arc<dyn DeliveryStore>,
    router: EventRouter,
    pool: Arc<WorkerPool>,
    handle: Mutex<Option<WorkerHandle>>,
}

impl WebhookEngine {
    /// Assembles an engine from its parts.
    pub fn new(
        config: EngineConfig,
        registry: Arc<dyn SubscriberRegistry>,
        store: Arc<dyn DeliveryStore>,
        transport: Arc<dyn DeliveryTransport>,
    ) -> Self {
        let router = EventRouter::new(registry.clone(), store.clone());
        let pool = Arc::new(WorkerPool::new(
            config.outbound.clone(),
            registry.clone(),
            store.clone(),
            transport,
        ));
        Self {
            config,
            registry,
            store,
            router,
            pool,
            handle: Mutex::new(None),
        }
    }

    /// Assembles an engine with the default reqwest transport.
    #[cfg(feature = "http-client")]
    pub fn with_http_transport(
        config: EngineConfig,
        registry: Arc<dyn SubscriberRegistry>,
        store: Arc<dyn DeliveryStore>,
    ) -> HookResult<Self> {
        let transport = Arc::new(crate::transport::HttpTransport::new(
            std::time::Duration::from_secs(config.outbound.timeout_seconds),
        )?);
        Ok(Self::new(config, registry, store, transport))
    }

    /// Recovers attempts stranded by a previous run, then spawns the
    /// worker pool. Returns the number of recovered attempts.
    pub async fn start(&self) -> HookResult<usize> {
        let recovered = self.pool.recover().await?;
        let mut handle = self.handle.lock().await;
        if handle.is_none() {
            *handle = Some(Arc::clone(&self.pool).spawn());
        }
        Ok(recovered)
    }

    /// Publishes an event; returns the number of delivery chains created.
    pub async fn publish(&self, event: &Event) -> HookResult<usize> {
        self.router.publish(event).await
    }

    /// Builds an inbound receiver for one origin, sharing the engine's
    /// inbound configuration.
    pub fn inbound_receiver(
        &self,
        origin: impl Into<String>,
        secret: impl Into<String>,
        processor: Arc<dyn EventProcessor>,
    ) -> InboundReceiver {
        InboundReceiver::new(origin, secret, self.config.inbound.clone(), processor)
    }

    /// Stops the worker pool, letting in-flight deliveries finish.
    pub async fn shutdown(&self) {
        if let Some(handle) = self.handle.lock().await.take() {
            handle.shutdown().await;
        }
    }

    /// Gets the configuration.
    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// Gets the subscriber registry.
    pub fn registry(&self) -> &Arc<dyn SubscriberRegistry> {
        &self.registry
    }

    /// Gets the delivery store.
    pub fn store(&self) -> &Arc<dyn DeliveryStore> {
        &self.store
    }

    /// Gets the worker pool (for host-driven polling instead of
    /// [`start`](Self::start)).
    pub fn pool(&self) -> &Arc<WorkerPool> {
        &self.pool
    }
}

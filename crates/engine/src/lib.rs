//! # Hookwire Engine
//!
//! Webhook I/O engine providing:
//! - Signed inbound event receipt with anti-replay protection
//! - Durable outbound fan-out to registered subscribers
//! - At-least-once delivery with a persisted retry state machine
//! - HMAC-SHA256 signing and verification
//!
//! ## Example
//!
//! ```rust,ignore
//! use hookwire_engine::{
//!     EngineConfig, Event, InMemoryDeliveryStore, InMemorySubscriberRegistry,
//!     Subscriber, WebhookEngine,
//! };
//!
//! let registry = InMemorySubscriberRegistry::shared();
//! let store = InMemoryDeliveryStore::shared();
//! registry.save(
//!     &Subscriber::new("acme", "https://example.com/hook", "secret123")
//!         .events(["order.created"]),
//! ).await?;
//!
//! let engine = WebhookEngine::with_http_transport(EngineConfig::default(), registry, store)?;
//! engine.start().await?;
//! engine.publish(&Event::new("order.created", "acme", payload)).await?;
//! ```

mod config;
mod delivery;
mod engine;
mod error;
mod event;
mod receiver;
mod registry;
mod retry;
mod router;
pub mod signature;
mod storage;
mod subscriber;
mod transport;
mod worker;

pub use config::{EngineConfig, InboundConfig, OutboundConfig};
pub use delivery::{DeliveryAttempt, DeliveryStatus};
pub use engine::WebhookEngine;
pub use error::{HookError, HookResult};
pub use event::{Envelope, Event};
pub use receiver::{EventProcessor, InboundAck, InboundReceiver};
pub use registry::{InMemorySubscriberRegistry, SubscriberRegistry};
pub use retry::BackoffSchedule;
pub use router::EventRouter;
pub use storage::{DeliveryStore, InMemoryDeliveryStore};
pub use subscriber::Subscriber;
pub use transport::{DeliveryTransport, TransportError, TransportResponse};
pub use worker::{WorkerHandle, WorkerPool};

#[cfg(feature = "http-client")]
pub use transport::HttpTransport;

//! Delivery worker pool and retry state machine.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use chrono::Utc;
use tokio::sync::Notify;
use tokio::task::JoinHandle;

use crate::config::OutboundConfig;
use crate::delivery::DeliveryAttempt;
use crate::error::{HookError, HookResult};
use crate::event::Envelope;
use crate::registry::SubscriberRegistry;
use crate::retry::BackoffSchedule;
use crate::signature;
use crate::storage::DeliveryStore;
use crate::subscriber::Subscriber;
use crate::transport::{DeliveryTransport, TransportError};

/// Bounded pool of workers draining due delivery attempts.
///
/// Each worker claims one attempt at a time (the claim is an atomic
/// Pending -> InFlight transition in the store), executes the HTTP call,
/// and persists the outcome. A chain's successor attempt is only created
/// when the current attempt completes, so chains run strictly
/// sequentially while distinct chains proceed in parallel.
pub struct WorkerPool {
    config: OutboundConfig,
    schedule: BackoffSchedule,
    registry: Arc<dyn SubscriberRegistry>,
    store: Arc<dyn DeliveryStore>,
    transport: Arc<dyn DeliveryTransport>,
}

impl WorkerPool {
    /// Creates a new pool.
    pub fn new(
        config: OutboundConfig,
        registry: Arc<dyn SubscriberRegistry>,
        store: Arc<dyn DeliveryStore>,
        transport: Arc<dyn DeliveryTransport>,
    ) -> Self {
        let schedule = BackoffSchedule::from_config(&config);
        Self {
            config,
            schedule,
            registry,
            store,
            transport,
        }
    }

    /// Resolves attempts left `InFlight` by a crash through the normal
    /// failure path (retry or terminal failure against the attempt budget).
    /// Returns the number of recovered rows.
    pub async fn recover(&self) -> HookResult<usize> {
        let stuck = self.store.recover_in_flight().await?;
        let count = stuck.len();

        for attempt in stuck {
            self.handle_failure(
                attempt,
                &HookError::DeliveryNetworkError(
                    "process restarted while delivery was in flight".to_string(),
                ),
                None,
                None,
            )
            .await?;
        }

        if count > 0 {
            tracing::info!(
                target: "webhook_delivery",
                recovered = count,
                "recovered in-flight attempts from previous run"
            );
        }
        Ok(count)
    }

    /// Claims and executes due attempts until none remain, returning how
    /// many were executed. Drives the same path the spawned workers use.
    pub async fn run_once(&self) -> HookResult<usize> {
        let mut executed = 0;
        loop {
            let claimed = self
                .store
                .claim_due(Utc::now(), self.config.concurrency.max(1))
                .await?;
            if claimed.is_empty() {
                return Ok(executed);
            }
            for attempt in claimed {
                self.execute(attempt).await?;
                executed += 1;
            }
        }
    }

    /// Spawns the configured number of polling workers.
    pub fn spawn(self: Arc<Self>) -> WorkerHandle {
        let stop = Arc::new(AtomicBool::new(false));
        let notify = Arc::new(Notify::new());
        let mut tasks = Vec::with_capacity(self.config.concurrency);

        for worker_id in 0..self.config.concurrency.max(1) {
            let pool = Arc::clone(&self);
            let stop = Arc::clone(&stop);
            let notify = Arc::clone(&notify);
            tasks.push(tokio::spawn(async move {
                pool.worker_loop(worker_id, stop, notify).await;
            }));
        }

        WorkerHandle { stop, notify, tasks }
    }

    async fn worker_loop(&self, worker_id: usize, stop: Arc<AtomicBool>, notify: Arc<Notify>) {
        let poll_interval = std::time::Duration::from_millis(self.config.poll_interval_ms.max(1));

        while !stop.load(Ordering::Relaxed) {
            let claimed = match self.store.claim_due(Utc::now(), 1).await {
                Ok(claimed) => claimed,
                Err(e) => {
                    tracing::error!(
                        target: "webhook_delivery",
                        worker_id,
                        error = %e,
                        "failed to claim due attempts"
                    );
                    Vec::new()
                }
            };

            match claimed.into_iter().next() {
                Some(attempt) => {
                    if let Err(e) = self.execute(attempt).await {
                        tracing::error!(
                            target: "webhook_delivery",
                            worker_id,
                            error = %e,
                            "delivery attempt processing failed"
                        );
                    }
                }
                None => {
                    tokio::select! {
                        _ = notify.notified() => {}
                        _ = tokio::time::sleep(poll_interval) => {}
                    }
                }
            }
        }
    }

    /// Executes one claimed attempt end to end.
    async fn execute(&self, mut attempt: DeliveryAttempt) -> HookResult<()> {
        // Re-check the subscriber at claim time: a deactivation between
        // fan-out and claim fails the attempt without any HTTP call.
        let subscriber = self.registry.get(&attempt.subscriber_id).await?;
        let Some(subscriber) = subscriber.filter(|s| s.active) else {
            tracing::info!(
                target: "webhook_delivery",
                delivery_id = %attempt.id,
                subscriber_id = %attempt.subscriber_id,
                "failing attempt, subscriber is inactive or gone"
            );
            attempt.mark_failed(HookError::SubscriberInactive.to_string(), None, None);
            return self.store.complete(&attempt, None).await;
        };

        self.deliver(attempt, &subscriber).await
    }

    async fn deliver(&self, mut attempt: DeliveryAttempt, subscriber: &Subscriber) -> HookResult<()> {
        // Rebuild the body with a fresh timestamp; the signature covers
        // exactly the bytes that go on the wire.
        let envelope = match Envelope::from_json(&attempt.request_body) {
            Ok(envelope) => envelope.restamped(),
            Err(e) => {
                attempt.mark_failed(format!("corrupt request body: {e}"), None, None);
                return self.store.complete(&attempt, None).await;
            }
        };
        let body = serde_json::to_string(&envelope)
            .map_err(|e| HookError::PersistenceFailure(format!("envelope serialization: {e}")))?;
        attempt.request_body = body.clone();
        let body = body.into_bytes();

        let headers = [
            ("Content-Type", "application/json".to_string()),
            ("X-Agent-Signature", signature::sign(&subscriber.secret, &body)),
            ("X-Agent-ID", self.config.agent_id.clone()),
        ];

        match self.transport.post(&subscriber.url, body, &headers).await {
            Ok(response) if response.is_success() => {
                tracing::info!(
                    target: "webhook_delivery",
                    delivery_id = %attempt.id,
                    subscriber_id = %subscriber.id,
                    event_type = %attempt.event_type,
                    attempt_number = attempt.attempt_number,
                    response_code = response.status,
                    "webhook delivered"
                );
                attempt.mark_delivered(response.status, Some(response.body));
                self.store.complete(&attempt, None).await
            }
            Ok(response) => {
                let reason = HookError::DeliveryHttpError(response.status);
                self.handle_failure(attempt, &reason, Some(response.status), Some(response.body))
                    .await
            }
            Err(TransportError::Timeout) => {
                self.handle_failure(attempt, &HookError::DeliveryTimeout, None, None)
                    .await
            }
            Err(TransportError::Network(msg)) => {
                self.handle_failure(attempt, &HookError::DeliveryNetworkError(msg), None, None)
                    .await
            }
        }
    }

    /// Applies the retry policy to a failed attempt: schedule the successor
    /// while budget remains, otherwise terminate the chain.
    async fn handle_failure(
        &self,
        mut attempt: DeliveryAttempt,
        reason: &HookError,
        response_code: Option<u16>,
        response_body: Option<String>,
    ) -> HookResult<()> {
        match self.schedule.next_retry_at(Utc::now(), attempt.attempt_number) {
            Some(next_retry_at) => {
                tracing::warn!(
                    target: "webhook_delivery",
                    delivery_id = %attempt.id,
                    subscriber_id = %attempt.subscriber_id,
                    event_type = %attempt.event_type,
                    attempt_number = attempt.attempt_number,
                    error = %reason,
                    next_retry_at = %next_retry_at,
                    "delivery attempt failed, retry scheduled"
                );
                attempt.mark_retrying(reason.to_string(), response_code, response_body, next_retry_at);
                let next = attempt.next_in_chain(next_retry_at);
                self.store.complete(&attempt, Some(next)).await
            }
            None => {
                tracing::warn!(
                    target: "webhook_delivery",
                    delivery_id = %attempt.id,
                    subscriber_id = %attempt.subscriber_id,
                    event_type = %attempt.event_type,
                    attempt_number = attempt.attempt_number,
                    error = %reason,
                    "delivery failed permanently, attempt budget exhausted"
                );
                attempt.mark_failed(reason.to_string(), response_code, response_body);
                self.store.complete(&attempt, None).await
            }
        }
    }
}

/// Handle for shutting down a spawned pool.
pub struct WorkerHandle {
    stop: Arc<AtomicBool>,
    notify: Arc<Notify>,
    tasks: Vec<JoinHandle<()>>,
}

impl WorkerHandle {
    /// Signals all workers to stop and waits for them to finish. In-flight
    /// attempts complete; nothing new is claimed.
    pub async fn shutdown(self) {
        self.stop.store(true, Ordering::Relaxed);
        self.notify.notify_waiters();
        for task in self.tasks {
            let _ = task.await;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::delivery::DeliveryStatus;
    use crate::registry::InMemorySubscriberRegistry;
    use crate::storage::InMemoryDeliveryStore;
    use crate::transport::TransportResponse;
    use async_trait::async_trait;
    use std::collections::VecDeque;
    use tokio::sync::Mutex;

    /// Transport that replays scripted responses and records every call.
    struct ScriptedTransport {
        responses: Mutex<VecDeque<Result<TransportResponse, TransportError>>>,
        calls: Mutex<Vec<(String, Vec<u8>, Vec<(String, String)>)>>,
    }

    impl ScriptedTransport {
        fn new(responses: Vec<Result<TransportResponse, TransportError>>) -> Arc<Self> {
            Arc::new(Self {
                responses: Mutex::new(responses.into()),
                calls: Mutex::new(Vec::new()),
            })
        }

        fn ok(status: u16) -> Result<TransportResponse, TransportError> {
            Ok(TransportResponse { status, body: String::new() })
        }

        async fn call_count(&self) -> usize {
            self.calls.lock().await.len()
        }
    }

    #[async_trait]
    impl DeliveryTransport for ScriptedTransport {
        async fn post(
            &self,
            url: &str,
            body: Vec<u8>,
            headers: &[(&'static str, String)],
        ) -> Result<TransportResponse, TransportError> {
            let recorded = headers
                .iter()
                .map(|(k, v)| (k.to_string(), v.clone()))
                .collect();
            self.calls.lock().await.push((url.to_string(), body.clone(), recorded));
            self.responses
                .lock()
                .await
                .pop_front()
                .unwrap_or_else(|| Self::ok(200))
        }
    }

    struct Fixture {
        registry: Arc<InMemorySubscriberRegistry>,
        store: Arc<InMemoryDeliveryStore>,
        transport: Arc<ScriptedTransport>,
        pool: WorkerPool,
        subscriber: Subscriber,
    }

    async fn fixture(
        config: OutboundConfig,
        responses: Vec<Result<TransportResponse, TransportError>>,
    ) -> Fixture {
        let registry = InMemorySubscriberRegistry::shared();
        let store = InMemoryDeliveryStore::shared();
        let transport = ScriptedTransport::new(responses);

        let subscriber = Subscriber::new("client-1", "https://example.com/hook", "secret")
            .events(["order.created"]);
        registry.save(&subscriber).await.unwrap();

        let pool = WorkerPool::new(
            config,
            registry.clone(),
            store.clone(),
            transport.clone(),
        );
        Fixture { registry, store, transport, pool, subscriber }
    }

    async fn seed_attempt(f: &Fixture) -> DeliveryAttempt {
        let envelope = serde_json::json!({
            "event": "order.created",
            "timestamp": 0,
            "data": {"id": 1}
        });
        let attempt =
            DeliveryAttempt::first(&f.subscriber, "order.created", envelope.to_string());
        f.store.insert(&attempt).await.unwrap();
        attempt
    }

    #[tokio::test]
    async fn test_success_marks_delivered() {
        let f = fixture(OutboundConfig::default(), vec![ScriptedTransport::ok(200)]).await;
        let attempt = seed_attempt(&f).await;

        assert_eq!(f.pool.run_once().await.unwrap(), 1);

        let row = f.store.get(&attempt.id).await.unwrap().unwrap();
        assert_eq!(row.status, DeliveryStatus::Delivered);
        assert_eq!(row.response_code, Some(200));
        assert_eq!(f.store.pending_count().await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_signature_covers_transmitted_bytes() {
        let f = fixture(OutboundConfig::default(), vec![ScriptedTransport::ok(200)]).await;
        let attempt = seed_attempt(&f).await;
        f.pool.run_once().await.unwrap();

        let calls = f.transport.calls.lock().await;
        let (url, body, headers) = &calls[0];
        assert_eq!(url, "https://example.com/hook");

        let presented = headers
            .iter()
            .find(|(k, _)| k == "X-Agent-Signature")
            .map(|(_, v)| v.as_str())
            .unwrap();
        assert!(signature::verify("secret", body, presented));
        assert!(headers.iter().any(|(k, v)| k == "X-Agent-ID" && v == "hookwire"));

        // The stored body is exactly what went on the wire
        let row = f.store.get(&attempt.id).await.unwrap().unwrap();
        assert_eq!(row.request_body.as_bytes(), body.as_slice());
    }

    #[tokio::test]
    async fn test_failure_schedules_future_retry() {
        let f = fixture(OutboundConfig::default(), vec![ScriptedTransport::ok(500)]).await;
        let attempt = seed_attempt(&f).await;
        f.pool.run_once().await.unwrap();

        let row = f.store.get(&attempt.id).await.unwrap().unwrap();
        assert_eq!(row.status, DeliveryStatus::Retrying);
        assert_eq!(row.response_code, Some(500));
        assert!(row.next_retry_at.unwrap() > Utc::now());

        // Successor exists but is not yet due: a second pass does nothing
        assert_eq!(f.store.pending_count().await.unwrap(), 1);
        assert_eq!(f.pool.run_once().await.unwrap(), 0);
        assert_eq!(f.transport.call_count().await, 1);
    }

    #[tokio::test]
    async fn test_inactive_subscriber_fails_without_http() {
        let f = fixture(OutboundConfig::default(), vec![]).await;
        let attempt = seed_attempt(&f).await;
        f.registry.deactivate(&f.subscriber.id).await.unwrap();

        f.pool.run_once().await.unwrap();

        let row = f.store.get(&attempt.id).await.unwrap().unwrap();
        assert_eq!(row.status, DeliveryStatus::Failed);
        assert_eq!(row.error.as_deref(), Some("Subscriber is inactive"));
        assert_eq!(f.transport.call_count().await, 0);
        assert_eq!(f.store.pending_count().await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_timeout_follows_retry_policy() {
        let f = fixture(
            OutboundConfig::default(),
            vec![Err(TransportError::Timeout)],
        )
        .await;
        let attempt = seed_attempt(&f).await;
        f.pool.run_once().await.unwrap();

        let row = f.store.get(&attempt.id).await.unwrap().unwrap();
        assert_eq!(row.status, DeliveryStatus::Retrying);
        assert_eq!(row.error.as_deref(), Some("Delivery timed out"));
        assert!(row.response_code.is_none());
    }

    #[tokio::test]
    async fn test_recover_requeues_stuck_attempts() {
        let f = fixture(OutboundConfig::default(), vec![]).await;
        let attempt = seed_attempt(&f).await;

        // Simulate a crash mid-delivery: claimed but never completed
        f.store.claim_due(Utc::now(), 1).await.unwrap();

        assert_eq!(f.pool.recover().await.unwrap(), 1);

        let row = f.store.get(&attempt.id).await.unwrap().unwrap();
        assert_eq!(row.status, DeliveryStatus::Retrying);
        // The chain continues with a scheduled successor
        assert_eq!(f.store.pending_count().await.unwrap(), 1);
    }

    #[tokio::test]
    async fn test_recover_exhausted_attempt_fails() {
        let config = OutboundConfig::default().max_attempts(1);
        let f = fixture(config, vec![]).await;
        let attempt = seed_attempt(&f).await;
        f.store.claim_due(Utc::now(), 1).await.unwrap();

        f.pool.recover().await.unwrap();

        let row = f.store.get(&attempt.id).await.unwrap().unwrap();
        assert_eq!(row.status, DeliveryStatus::Failed);
        assert_eq!(f.store.pending_count().await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_spawned_pool_drains_and_shuts_down() {
        let config = OutboundConfig::default().concurrency(2).poll_interval_ms(10);
        let f = fixture(config, vec![ScriptedTransport::ok(200)]).await;
        let attempt = seed_attempt(&f).await;

        let pool = Arc::new(f.pool);
        let handle = pool.spawn();

        // Give the workers a few poll cycles
        for _ in 0..50 {
            tokio::time::sleep(std::time::Duration::from_millis(10)).await;
            let row = f.store.get(&attempt.id).await.unwrap().unwrap();
            if row.status.is_terminal() {
                break;
            }
        }
        handle.shutdown().await;

        let row = f.store.get(&attempt.id).await.unwrap().unwrap();
        assert_eq!(row.status, DeliveryStatus::Delivered);
    }
}

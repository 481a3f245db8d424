//! Durable delivery store: append-mostly attempt rows with atomic claiming.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;

use crate::delivery::{DeliveryAttempt, DeliveryStatus};
use crate::error::{HookError, HookResult};

/// Trait for delivery attempt storage backends.
///
/// Claiming is a compare-and-set transition from `Pending` to `InFlight`,
/// so exactly one worker ever executes a given attempt. Completed rows are
/// immutable and retained as the audit trail.
#[async_trait]
pub trait DeliveryStore: Send + Sync {
    /// Inserts a new `Pending` attempt row.
    async fn insert(&self, attempt: &DeliveryAttempt) -> HookResult<()>;

    /// Atomically claims up to `limit` due attempts, transitioning each
    /// from `Pending` to `InFlight`.
    async fn claim_due(&self, now: DateTime<Utc>, limit: usize) -> HookResult<Vec<DeliveryAttempt>>;

    /// Writes the outcome of a claimed attempt and freezes the row, and, in
    /// the same operation, inserts its successor attempt if there is one.
    ///
    /// Fails with [`HookError::PersistenceFailure`] if the row is not
    /// currently `InFlight` or the outcome is not a completed status.
    async fn complete(
        &self,
        attempt: &DeliveryAttempt,
        next: Option<DeliveryAttempt>,
    ) -> HookResult<()>;

    /// Gets an attempt row by ID.
    async fn get(&self, id: &str) -> HookResult<Option<DeliveryAttempt>>;

    /// Lists attempt rows for a subscriber, oldest first.
    async fn attempts_for_subscriber(
        &self,
        subscriber_id: &str,
        limit: usize,
    ) -> HookResult<Vec<DeliveryAttempt>>;

    /// Number of rows still waiting to be claimed.
    async fn pending_count(&self) -> HookResult<usize>;

    /// Returns rows left `InFlight` by a crashed worker so they can be
    /// resolved through the normal failure path. No row stays claimed
    /// indefinitely.
    async fn recover_in_flight(&self) -> HookResult<Vec<DeliveryAttempt>>;
}

/// In-memory delivery store for testing and development.
pub struct InMemoryDeliveryStore {
    inner: RwLock<StoreInner>,
}

struct StoreInner {
    by_id: HashMap<String, DeliveryAttempt>,
    order: Vec<String>,
}

impl InMemoryDeliveryStore {
    /// Creates a new in-memory store.
    pub fn new() -> Self {
        Self {
            inner: RwLock::new(StoreInner {
                by_id: HashMap::new(),
                order: Vec::new(),
            }),
        }
    }

    /// Creates a shared in-memory store.
    pub fn shared() -> Arc<Self> {
        Arc::new(Self::new())
    }

    /// Returns every row, oldest first. Test/audit helper.
    pub async fn all_attempts(&self) -> Vec<DeliveryAttempt> {
        let inner = self.inner.read().await;
        inner
            .order
            .iter()
            .filter_map(|id| inner.by_id.get(id))
            .cloned()
            .collect()
    }
}

impl Default for InMemoryDeliveryStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl DeliveryStore for InMemoryDeliveryStore {
    async fn insert(&self, attempt: &DeliveryAttempt) -> HookResult<()> {
        let mut inner = self.inner.write().await;
        if inner.by_id.contains_key(&attempt.id) {
            return Err(HookError::PersistenceFailure(format!(
                "attempt {} already exists",
                attempt.id
            )));
        }
        inner.order.push(attempt.id.clone());
        inner.by_id.insert(attempt.id.clone(), attempt.clone());
        Ok(())
    }

    async fn claim_due(&self, now: DateTime<Utc>, limit: usize) -> HookResult<Vec<DeliveryAttempt>> {
        let mut inner = self.inner.write().await;

        let due_ids: Vec<String> = inner
            .order
            .iter()
            .filter(|id| inner.by_id.get(*id).is_some_and(|a| a.is_due(now)))
            .take(limit)
            .cloned()
            .collect();

        let mut claimed = Vec::with_capacity(due_ids.len());
        for id in due_ids {
            if let Some(attempt) = inner.by_id.get_mut(&id) {
                attempt.status = DeliveryStatus::InFlight;
                claimed.push(attempt.clone());
            }
        }
        Ok(claimed)
    }

    async fn complete(
        &self,
        attempt: &DeliveryAttempt,
        next: Option<DeliveryAttempt>,
    ) -> HookResult<()> {
        let mut inner = self.inner.write().await;

        let stored = inner.by_id.get(&attempt.id).ok_or_else(|| {
            HookError::PersistenceFailure(format!("attempt {} does not exist", attempt.id))
        })?;
        if stored.status != DeliveryStatus::InFlight {
            return Err(HookError::PersistenceFailure(format!(
                "attempt {} is not claimed (status {:?})",
                attempt.id, stored.status
            )));
        }
        if !matches!(
            attempt.status,
            DeliveryStatus::Delivered | DeliveryStatus::Retrying | DeliveryStatus::Failed
        ) {
            return Err(HookError::PersistenceFailure(format!(
                "attempt {} completed with non-completed status {:?}",
                attempt.id, attempt.status
            )));
        }

        inner.by_id.insert(attempt.id.clone(), attempt.clone());

        if let Some(next) = next {
            if inner.by_id.contains_key(&next.id) {
                return Err(HookError::PersistenceFailure(format!(
                    "successor attempt {} already exists",
                    next.id
                )));
            }
            inner.order.push(next.id.clone());
            inner.by_id.insert(next.id.clone(), next);
        }
        Ok(())
    }

    async fn get(&self, id: &str) -> HookResult<Option<DeliveryAttempt>> {
        let inner = self.inner.read().await;
        Ok(inner.by_id.get(id).cloned())
    }

    async fn attempts_for_subscriber(
        &self,
        subscriber_id: &str,
        limit: usize,
    ) -> HookResult<Vec<DeliveryAttempt>> {
        let inner = self.inner.read().await;
        Ok(inner
            .order
            .iter()
            .filter_map(|id| inner.by_id.get(id))
            .filter(|a| a.subscriber_id == subscriber_id)
            .take(limit)
            .cloned()
            .collect())
    }

    async fn pending_count(&self) -> HookResult<usize> {
        let inner = self.inner.read().await;
        Ok(inner
            .by_id
            .values()
            .filter(|a| a.status == DeliveryStatus::Pending)
            .count())
    }

    async fn recover_in_flight(&self) -> HookResult<Vec<DeliveryAttempt>> {
        let inner = self.inner.read().await;
        Ok(inner
            .order
            .iter()
            .filter_map(|id| inner.by_id.get(id))
            .filter(|a| a.status == DeliveryStatus::InFlight)
            .cloned()
            .collect())
    }
}

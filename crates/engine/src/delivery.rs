//! Delivery attempt records and the status machine.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::subscriber::Subscriber;

/// Status of a single delivery attempt.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum DeliveryStatus {
    /// Waiting to be claimed by a worker.
    Pending,
    /// Claimed by exactly one worker, HTTP call in progress.
    InFlight,
    /// Delivered: subscriber answered 2xx.
    Delivered,
    /// This attempt failed; the chain continues with a scheduled successor.
    Retrying,
    /// Terminal failure: attempt budget exhausted or subscriber inactive.
    Failed,
}

impl DeliveryStatus {
    /// Whether the status ends the logical delivery.
    pub fn is_terminal(&self) -> bool {
        matches!(self, DeliveryStatus::Delivered | DeliveryStatus::Failed)
    }
}

/// One concrete attempt to deliver one event to one subscriber.
///
/// Rows are written once on completion and never mutated afterwards;
/// a retry creates a new row with the next attempt number.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DeliveryAttempt {
    /// Unique identifier.
    pub id: String,
    /// Owning subscriber.
    pub subscriber_id: String,
    /// Event type being delivered.
    pub event_type: String,
    /// Serialized request body, updated to exactly what was sent.
    pub request_body: String,
    /// Response status code, if a response was received.
    pub response_code: Option<u16>,
    /// Response body (truncated), if a response was received.
    pub response_body: Option<String>,
    /// Failure description, if the attempt did not deliver.
    pub error: Option<String>,
    /// 1-based attempt number, strictly increasing along a chain.
    pub attempt_number: u32,
    /// Current status.
    pub status: DeliveryStatus,
    /// When this attempt becomes due (None = immediately).
    pub next_retry_at: Option<DateTime<Utc>>,
    /// When the row was created.
    pub created_at: DateTime<Utc>,
}

impl DeliveryAttempt {
    /// Creates the first attempt of a delivery chain, immediately due.
    pub fn first(subscriber: &Subscriber, event_type: &str, request_body: String) -> Self {
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            subscriber_id: subscriber.id.clone(),
            event_type: event_type.to_string(),
            request_body,
            response_code: None,
            response_body: None,
            error: None,
            attempt_number: 1,
            status: DeliveryStatus::Pending,
            next_retry_at: None,
            created_at: Utc::now(),
        }
    }

    /// Builds the successor attempt, scheduled at `scheduled_at`.
    pub fn next_in_chain(&self, scheduled_at: DateTime<Utc>) -> Self {
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            subscriber_id: self.subscriber_id.clone(),
            event_type: self.event_type.clone(),
            request_body: self.request_body.clone(),
            response_code: None,
            response_body: None,
            error: None,
            attempt_number: self.attempt_number + 1,
            status: DeliveryStatus::Pending,
            next_retry_at: Some(scheduled_at),
            created_at: Utc::now(),
        }
    }

    /// Whether a worker may claim this attempt at `now`.
    pub fn is_due(&self, now: DateTime<Utc>) -> bool {
        self.status == DeliveryStatus::Pending && self.next_retry_at.is_none_or(|at| at <= now)
    }

    /// Marks the attempt delivered with the subscriber's response.
    pub fn mark_delivered(&mut self, response_code: u16, response_body: Option<String>) {
        self.status = DeliveryStatus::Delivered;
        self.response_code = Some(response_code);
        self.response_body = response_body;
        self.error = None;
    }

    /// Marks the attempt as failed-but-retried, carrying the schedule of its
    /// successor.
    pub fn mark_retrying(
        &mut self,
        reason: impl Into<String>,
        response_code: Option<u16>,
        response_body: Option<String>,
        next_retry_at: DateTime<Utc>,
    ) {
        self.status = DeliveryStatus::Retrying;
        self.error = Some(reason.into());
        self.response_code = response_code;
        self.response_body = response_body;
        self.next_retry_at = Some(next_retry_at);
    }

    /// Marks the attempt terminally failed.
    pub fn mark_failed(
        &mut self,
        reason: impl Into<String>,
        response_code: Option<u16>,
        response_body: Option<String>,
    ) {
        self.status = DeliveryStatus::Failed;
        self.error = Some(reason.into());
        self.response_code = response_code;
        self.response_body = response_body;
        self.next_retry_at = None;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn attempt() -> DeliveryAttempt {
        let sub = Subscriber::new("client-1", "https://example.com/hook", "secret")
            .events(["order.created"]);
        DeliveryAttempt::first(&sub, "order.created", "{}".to_string())
    }

    #[test]
    fn test_first_attempt_is_immediately_due() {
        let attempt = attempt();
        assert_eq!(attempt.attempt_number, 1);
        assert_eq!(attempt.status, DeliveryStatus::Pending);
        assert!(attempt.is_due(Utc::now()));
    }

    #[test]
    fn test_next_in_chain_increments_and_schedules() {
        let first = attempt();
        let at = Utc::now() + chrono::Duration::seconds(30);
        let next = first.next_in_chain(at);

        assert_eq!(next.attempt_number, 2);
        assert_eq!(next.status, DeliveryStatus::Pending);
        assert_eq!(next.next_retry_at, Some(at));
        assert_eq!(next.subscriber_id, first.subscriber_id);
        assert!(!next.is_due(Utc::now()));
        assert!(next.is_due(at));
    }

    #[test]
    fn test_terminal_statuses() {
        assert!(DeliveryStatus::Delivered.is_terminal());
        assert!(DeliveryStatus::Failed.is_terminal());
        assert!(!DeliveryStatus::Pending.is_terminal());
        assert!(!DeliveryStatus::InFlight.is_terminal());
        assert!(!DeliveryStatus::Retrying.is_terminal());
    }

    #[test]
    fn test_mark_retrying_records_outcome() {
        let mut attempt = attempt();
        let at = Utc::now() + chrono::Duration::seconds(5);
        attempt.mark_retrying("HTTP 500", Some(500), Some("boom".to_string()), at);

        assert_eq!(attempt.status, DeliveryStatus::Retrying);
        assert_eq!(attempt.response_code, Some(500));
        assert_eq!(attempt.next_retry_at, Some(at));
        assert_eq!(attempt.error.as_deref(), Some("HTTP 500"));
    }
}

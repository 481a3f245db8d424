//! Retry backoff schedule.

use chrono::{DateTime, Utc};
use std::time::Duration;

use crate::config::OutboundConfig;

/// Fixed backoff schedule with a geometric tail.
///
/// Attempt N (1-based) that fails waits `steps[N-1]` seconds before attempt
/// N+1. Past the end of the schedule the last step keeps growing by 4x per
/// further attempt, capped at the ceiling.
#[derive(Debug, Clone)]
pub struct BackoffSchedule {
    steps: Vec<u64>,
    max_attempts: u32,
    ceiling: Duration,
}

impl BackoffSchedule {
    /// Creates a schedule. An empty step list falls back to the default.
    pub fn new(steps: Vec<u64>, max_attempts: u32, ceiling_seconds: u64) -> Self {
        let steps = if steps.is_empty() {
            OutboundConfig::default().backoff_schedule
        } else {
            steps
        };
        Self {
            steps,
            max_attempts: max_attempts.max(1),
            ceiling: Duration::from_secs(ceiling_seconds),
        }
    }

    /// Builds the schedule from outbound configuration.
    pub fn from_config(config: &OutboundConfig) -> Self {
        Self::new(
            config.backoff_schedule.clone(),
            config.max_attempts,
            config.backoff_ceiling_seconds,
        )
    }

    /// Maximum attempts per logical delivery.
    pub fn max_attempts(&self) -> u32 {
        self.max_attempts
    }

    /// Delay before the attempt following `attempt_number`, or `None` when
    /// the budget is exhausted.
    pub fn delay_for(&self, attempt_number: u32) -> Option<Duration> {
        if attempt_number >= self.max_attempts {
            return None;
        }

        let idx = attempt_number.saturating_sub(1) as usize;
        let delay = match self.steps.get(idx) {
            Some(&secs) => Duration::from_secs(secs),
            None => {
                // steps is never empty
                let last = Duration::from_secs(*self.steps.last().unwrap());
                let overflow = (idx - self.steps.len() + 1) as u32;
                last.saturating_mul(4u32.saturating_pow(overflow))
            }
        };
        Some(std::cmp::min(delay, self.ceiling))
    }

    /// Absolute schedule for the successor of `attempt_number`, always in
    /// the future relative to `now`.
    pub fn next_retry_at(&self, now: DateTime<Utc>, attempt_number: u32) -> Option<DateTime<Utc>> {
        let delay = self.delay_for(attempt_number)?;
        Some(now + chrono::Duration::from_std(delay).unwrap_or_default())
    }
}

impl Default for BackoffSchedule {
    fn default() -> Self {
        Self::from_config(&OutboundConfig::default())
    }
}

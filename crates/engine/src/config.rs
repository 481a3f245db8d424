//! Engine configuration.

use serde::Deserialize;

/// Inbound receiver configuration.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct InboundConfig {
    /// Whether the inbound endpoint should be mounted at all.
    pub enabled: bool,
    /// Path the hosting server mounts the receiver under.
    pub path: String,
    /// Whether to verify the presented signature header.
    pub validate_signature: bool,
    /// Maximum allowed clock skew for the anti-replay window, in seconds.
    pub max_clock_skew_seconds: i64,
}

impl Default for InboundConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            path: "/webhooks/inbound".to_string(),
            validate_signature: true,
            max_clock_skew_seconds: 120,
        }
    }
}

impl InboundConfig {
    /// Creates a new configuration with defaults.
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets whether the endpoint is enabled.
    pub fn enabled(mut self, enabled: bool) -> Self {
        self.enabled = enabled;
        self
    }

    /// Sets the mount path.
    pub fn path(mut self, path: impl Into<String>) -> Self {
        self.path = path.into();
        self
    }

    /// Sets whether signatures are verified.
    pub fn validate_signature(mut self, validate: bool) -> Self {
        self.validate_signature = validate;
        self
    }

    /// Sets the anti-replay window.
    pub fn max_clock_skew_seconds(mut self, secs: i64) -> Self {
        self.max_clock_skew_seconds = secs;
        self
    }
}

/// Outbound delivery configuration.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct OutboundConfig {
    /// Maximum attempts per logical delivery (first try included).
    pub max_attempts: u32,
    /// Per-request timeout in seconds.
    pub timeout_seconds: u64,
    /// Number of concurrent delivery workers.
    pub concurrency: usize,
    /// Retry delays in seconds, indexed by attempt number.
    pub backoff_schedule: Vec<u64>,
    /// Ceiling for backoff growth past the end of the schedule, in seconds.
    pub backoff_ceiling_seconds: u64,
    /// How often an idle worker polls for due attempts, in milliseconds.
    pub poll_interval_ms: u64,
    /// Value sent in the `X-Agent-ID` header.
    pub agent_id: String,
}

impl Default for OutboundConfig {
    fn default() -> Self {
        Self {
            max_attempts: 6,
            timeout_seconds: 5,
            concurrency: 10,
            backoff_schedule: vec![1, 5, 30, 120],
            backoff_ceiling_seconds: 3600,
            poll_interval_ms: 250,
            agent_id: "hookwire".to_string(),
        }
    }
}

impl OutboundConfig {
    /// Creates a new configuration with defaults.
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the attempt budget.
    pub fn max_attempts(mut self, max: u32) -> Self {
        self.max_attempts = max;
        self
    }

    /// Sets the per-request timeout.
    pub fn timeout_seconds(mut self, secs: u64) -> Self {
        self.timeout_seconds = secs;
        self
    }

    /// Sets the worker pool size.
    pub fn concurrency(mut self, workers: usize) -> Self {
        self.concurrency = workers;
        self
    }

    /// Sets the retry schedule.
    pub fn backoff_schedule(mut self, schedule: impl Into<Vec<u64>>) -> Self {
        self.backoff_schedule = schedule.into();
        self
    }

    /// Sets the backoff ceiling.
    pub fn backoff_ceiling_seconds(mut self, secs: u64) -> Self {
        self.backoff_ceiling_seconds = secs;
        self
    }

    /// Sets the idle poll interval.
    pub fn poll_interval_ms(mut self, ms: u64) -> Self {
        self.poll_interval_ms = ms;
        self
    }

    /// Sets the agent identifier.
    pub fn agent_id(mut self, id: impl Into<String>) -> Self {
        self.agent_id = id.into();
        self
    }
}

/// Full engine configuration.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Inbound receiver settings.
    pub inbound: InboundConfig,
    /// Outbound delivery settings.
    pub outbound: OutboundConfig,
}

impl EngineConfig {
    /// Creates a new configuration with defaults.
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the inbound section.
    pub fn inbound(mut self, inbound: InboundConfig) -> Self {
        self.inbound = inbound;
        self
    }

    /// Sets the outbound section.
    pub fn outbound(mut self, outbound: OutboundConfig) -> Self {
        self.outbound = outbound;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = EngineConfig::default();
        assert!(config.inbound.enabled);
        assert!(config.inbound.validate_signature);
        assert_eq!(config.inbound.max_clock_skew_seconds, 120);
        assert_eq!(config.outbound.max_attempts, 6);
        assert_eq!(config.outbound.timeout_seconds, 5);
        assert_eq!(config.outbound.concurrency, 10);
        assert_eq!(config.outbound.backoff_schedule, vec![1, 5, 30, 120]);
    }

    #[test]
    fn test_deserialize_partial() {
        let config: EngineConfig = serde_json::from_str(
            r#"{"outbound": {"max_attempts": 3, "backoff_schedule": [2, 10]}}"#,
        )
        .unwrap();
        assert_eq!(config.outbound.max_attempts, 3);
        assert_eq!(config.outbound.backoff_schedule, vec![2, 10]);
        // Untouched sections keep their defaults
        assert_eq!(config.outbound.concurrency, 10);
        assert_eq!(config.inbound.max_clock_skew_seconds, 120);
    }
}

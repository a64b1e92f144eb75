use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::time::Duration;
use thiserror::Error;

/// Circuit breaker state
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum CircuitState {
    /// Circuit is closed, calls pass through and failures are counted
    Closed,
    /// Circuit is open, calls are rejected without touching the backend
    Open,
    /// Circuit is half-open, a probe call is testing recovery
    HalfOpen,
}

impl std::fmt::Display for CircuitState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            CircuitState::Closed => write!(f, "Closed"),
            CircuitState::Open => write!(f, "Open"),
            CircuitState::HalfOpen => write!(f, "HalfOpen"),
        }
    }
}

/// Circuit breaker configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CircuitBreakerConfig {
    /// Number of consecutive failures before opening the circuit
    #[serde(default = "default_failure_threshold")]
    pub failure_threshold: u32,

    /// Duration to wait in open state before allowing a probe, in milliseconds
    #[serde(default = "default_reset_timeout_ms")]
    pub reset_timeout_ms: u64,

    /// Default time budget for a wrapped operation, in milliseconds
    #[serde(default = "default_request_timeout_ms")]
    pub request_timeout_ms: u64,

    /// Value served to callers instead of an error while the circuit is open.
    /// Applied by the request layer, which knows the caller's expected type.
    #[serde(default)]
    pub fallback: Option<Value>,
}

fn default_failure_threshold() -> u32 {
    3
}

fn default_reset_timeout_ms() -> u64 {
    30_000
}

fn default_request_timeout_ms() -> u64 {
    15_000
}

impl Default for CircuitBreakerConfig {
    fn default() -> Self {
        Self {
            failure_threshold: default_failure_threshold(),
            reset_timeout_ms: default_reset_timeout_ms(),
            request_timeout_ms: default_request_timeout_ms(),
            fallback: None,
        }
    }
}

impl CircuitBreakerConfig {
    pub fn reset_timeout(&self) -> Duration {
        Duration::from_millis(self.reset_timeout_ms)
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_millis(self.request_timeout_ms)
    }
}

/// Error returned by [`CircuitBreaker::execute`](super::CircuitBreaker::execute).
///
/// The breaker knows nothing about what it wraps; the operation's own error
/// type `E` travels through untouched in [`BreakerError::Inner`].
#[derive(Debug, Error)]
pub enum BreakerError<E> {
    /// The circuit is open and the cool-down has not elapsed
    #[error("circuit open, next attempt in {}ms", retry_after.as_millis())]
    Open { retry_after: Duration },

    /// The operation lost the race against its time budget
    #[error("operation timed out after {}ms", elapsed.as_millis())]
    Timeout { elapsed: Duration },

    /// The operation itself failed
    #[error("{0}")]
    Inner(E),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_circuit_state_display() {
        assert_eq!(CircuitState::Closed.to_string(), "Closed");
        assert_eq!(CircuitState::Open.to_string(), "Open");
        assert_eq!(CircuitState::HalfOpen.to_string(), "HalfOpen");
    }

    #[test]
    fn test_default_config() {
        let config = CircuitBreakerConfig::default();
        assert_eq!(config.failure_threshold, 3);
        assert_eq!(config.reset_timeout_ms, 30_000);
        assert_eq!(config.request_timeout_ms, 15_000);
        assert!(config.fallback.is_none());
    }

    #[test]
    fn test_duration_accessors() {
        let config = CircuitBreakerConfig {
            reset_timeout_ms: 500,
            request_timeout_ms: 250,
            ..Default::default()
        };
        assert_eq!(config.reset_timeout(), Duration::from_millis(500));
        assert_eq!(config.request_timeout(), Duration::from_millis(250));
    }

    #[test]
    fn test_config_deserializes_with_defaults() {
        let config: CircuitBreakerConfig = serde_json::from_str("{}").unwrap();
        assert_eq!(config.failure_threshold, 3);

        let config: CircuitBreakerConfig =
            serde_json::from_str(r#"{"failure_threshold": 5, "fallback": {"posts": []}}"#).unwrap();
        assert_eq!(config.failure_threshold, 5);
        assert!(config.fallback.is_some());
    }
}

use super::types::{BreakerError, CircuitBreakerConfig, CircuitState};
use serde_json::Value;
use std::future::Future;
use std::time::{Duration, Instant};
use tokio::sync::{watch, RwLock};
use tracing::{debug, info, warn};

/// Circuit breaker guarding a single backend target.
///
/// Wraps an arbitrary asynchronous operation: while closed, calls pass
/// through and consecutive failures are counted; after `failure_threshold`
/// failures the circuit opens and calls fail fast for `reset_timeout`; the
/// first call after the cool-down is dispatched as a probe, and its outcome
/// decides between closing again and restarting the cool-down.
///
/// Construct one per backend and share it behind an `Arc`. State resets to
/// closed on construction; nothing is persisted.
#[derive(Debug)]
pub struct CircuitBreaker {
    /// Configuration
    config: CircuitBreakerConfig,
    /// Current state
    state: RwLock<State>,
    /// State transition channel, in place of open/close callbacks
    transitions: watch::Sender<CircuitState>,
}

#[derive(Debug)]
struct State {
    /// Current circuit state
    circuit_state: CircuitState,
    /// Number of consecutive failures, reset on every success
    consecutive_failures: u32,
    /// Earliest time a probe is allowed, meaningful only while open
    next_attempt_at: Option<Instant>,
}

impl CircuitBreaker {
    /// Create a new circuit breaker
    pub fn new(config: CircuitBreakerConfig) -> Self {
        info!(
            failure_threshold = config.failure_threshold,
            reset_timeout_ms = config.reset_timeout_ms,
            request_timeout_ms = config.request_timeout_ms,
            "Creating circuit breaker"
        );

        let (transitions, _) = watch::channel(CircuitState::Closed);

        Self {
            config,
            state: RwLock::new(State {
                circuit_state: CircuitState::Closed,
                consecutive_failures: 0,
                next_attempt_at: None,
            }),
            transitions,
        }
    }

    /// Run `operation` through the breaker, racing it against a time budget.
    ///
    /// `timeout` overrides the configured `request_timeout` for this call. A
    /// timeout counts as a failure; the losing operation is dropped, not
    /// awaited further. Real failures are never swallowed: the operation's
    /// error comes back as [`BreakerError::Inner`], and only the *next*
    /// call's dispatch decision changes.
    pub async fn execute<T, E, F, Fut>(
        &self,
        operation: F,
        timeout: Option<Duration>,
    ) -> Result<T, BreakerError<E>>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<T, E>>,
    {
        self.before_dispatch().await?;

        let budget = timeout.unwrap_or_else(|| self.config.request_timeout());
        let started = Instant::now();

        match tokio::time::timeout(budget, operation()).await {
            Ok(Ok(value)) => {
                self.on_success().await;
                Ok(value)
            }
            Ok(Err(err)) => {
                self.on_failure().await;
                Err(BreakerError::Inner(err))
            }
            Err(_) => {
                self.on_failure().await;
                Err(BreakerError::Timeout {
                    elapsed: started.elapsed(),
                })
            }
        }
    }

    /// Current state. Read-only: never flips open to half-open by itself.
    pub async fn state(&self) -> CircuitState {
        self.state.read().await.circuit_state
    }

    /// Time remaining until a probe is allowed, zero unless open.
    pub async fn remaining_fail_fast(&self) -> Duration {
        let state = self.state.read().await;
        if state.circuit_state != CircuitState::Open {
            return Duration::ZERO;
        }
        state
            .next_attempt_at
            .map(|at| at.saturating_duration_since(Instant::now()))
            .unwrap_or(Duration::ZERO)
    }

    /// Force the circuit closed and zero the failure counter.
    pub async fn reset(&self) {
        let mut state = self.state.write().await;
        state.circuit_state = CircuitState::Closed;
        state.consecutive_failures = 0;
        state.next_attempt_at = None;
        self.transitions.send_replace(CircuitState::Closed);
    }

    /// Subscribe to state transitions.
    pub fn subscribe(&self) -> watch::Receiver<CircuitState> {
        self.transitions.subscribe()
    }

    /// Fallback value to serve while open, if configured.
    pub fn fallback(&self) -> Option<&Value> {
        self.config.fallback.as_ref()
    }

    /// Breaker configuration
    pub fn config(&self) -> &CircuitBreakerConfig {
        &self.config
    }

    /// Decide whether this call may go out. While open, either reject with
    /// the remaining cool-down or, once the cool-down has elapsed, move to
    /// half-open and let this call through as the probe. Half-open does not
    /// serialize: concurrent calls arriving after the cool-down may all be
    /// dispatched as probes.
    async fn before_dispatch<E>(&self) -> Result<(), BreakerError<E>> {
        let mut state = self.state.write().await;

        if state.circuit_state == CircuitState::Open {
            let now = Instant::now();
            match state.next_attempt_at {
                Some(at) if now < at => {
                    let retry_after = at - now;
                    debug!(
                        retry_after_ms = retry_after.as_millis() as u64,
                        "Circuit open, rejecting call"
                    );
                    return Err(BreakerError::Open { retry_after });
                }
                _ => {
                    info!("Circuit breaker transitioning to half-open");
                    state.circuit_state = CircuitState::HalfOpen;
                    self.transitions.send_replace(CircuitState::HalfOpen);
                }
            }
        }

        Ok(())
    }

    async fn on_success(&self) {
        let mut state = self.state.write().await;
        state.consecutive_failures = 0;

        if state.circuit_state != CircuitState::Closed {
            info!("Circuit breaker closing");
            state.circuit_state = CircuitState::Closed;
            state.next_attempt_at = None;
            self.transitions.send_replace(CircuitState::Closed);
        }
    }

    async fn on_failure(&self) {
        let mut state = self.state.write().await;
        state.consecutive_failures += 1;

        let should_open = state.circuit_state == CircuitState::HalfOpen
            || (state.circuit_state == CircuitState::Closed
                && state.consecutive_failures >= self.config.failure_threshold);

        if should_open {
            warn!(
                consecutive_failures = state.consecutive_failures,
                reset_timeout_ms = self.config.reset_timeout_ms,
                "Circuit breaker opening"
            );
            state.circuit_state = CircuitState::Open;
            state.next_attempt_at = Some(Instant::now() + self.config.reset_timeout());
            self.transitions.send_replace(CircuitState::Open);
        } else {
            debug!(
                consecutive_failures = state.consecutive_failures,
                threshold = self.config.failure_threshold,
                "Call failed, circuit still closed"
            );
        }
    }
}

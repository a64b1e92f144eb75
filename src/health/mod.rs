use crate::circuit_breaker::CircuitBreaker;
use crate::client::ApiClient;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::watch;
use tokio::time::interval;
use tracing::{debug, info, warn};

/// Health monitor configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HealthMonitorConfig {
    /// Enable periodic health polling
    #[serde(default = "default_enabled")]
    pub enabled: bool,
    /// Interval between health checks in milliseconds
    #[serde(default = "default_interval_ms")]
    pub interval_ms: u64,
    /// Whether to check immediately on start
    #[serde(default = "default_enabled")]
    pub initial_check: bool,
}

fn default_enabled() -> bool {
    true
}

fn default_interval_ms() -> u64 {
    60_000
}

impl Default for HealthMonitorConfig {
    fn default() -> Self {
        Self {
            enabled: default_enabled(),
            interval_ms: default_interval_ms(),
            initial_check: default_enabled(),
        }
    }
}

/// Snapshot of backend health, published after every check.
#[derive(Debug, Clone, PartialEq)]
pub struct HealthStatus {
    /// Whether the last health check succeeded
    pub healthy: bool,
    /// Remaining fail-fast window of the breaker, if it is open.
    /// Fallback screens render this as a retry countdown.
    pub retry_after: Option<Duration>,
    /// When the last check completed, `None` before the first one
    pub checked_at: Option<Instant>,
}

impl Default for HealthStatus {
    fn default() -> Self {
        // optimistic until the first check says otherwise
        Self {
            healthy: true,
            retry_after: None,
            checked_at: None,
        }
    }
}

/// Periodic backend health monitor.
///
/// Polls the request layer's health-check operation on an interval and
/// publishes [`HealthStatus`] over a watch channel. Owns no resilience
/// logic: it only consumes the breaker's read-only accessors, so a failing
/// poll never contributes to the breaker's failure accounting.
pub struct HealthMonitor {
    client: Arc<ApiClient>,
    breaker: Arc<CircuitBreaker>,
    config: HealthMonitorConfig,
    status: Arc<watch::Sender<HealthStatus>>,
}

impl std::fmt::Debug for HealthMonitor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HealthMonitor")
            .field("config", &self.config)
            .finish()
    }
}

impl HealthMonitor {
    /// Create a new health monitor
    pub fn new(
        client: Arc<ApiClient>,
        breaker: Arc<CircuitBreaker>,
        config: HealthMonitorConfig,
    ) -> Self {
        let (status, _) = watch::channel(HealthStatus::default());
        Self {
            client,
            breaker,
            config,
            status: Arc::new(status),
        }
    }

    /// Subscribe to health updates
    pub fn subscribe(&self) -> watch::Receiver<HealthStatus> {
        self.status.subscribe()
    }

    /// Last published status
    pub fn current(&self) -> HealthStatus {
        self.status.borrow().clone()
    }

    /// Run one health check now and publish the result. This is the manual
    /// "retry connection" path next to the periodic loop.
    pub async fn check_now(&self) -> HealthStatus {
        probe(&self.client, &self.breaker, &self.status).await
    }

    /// Start the periodic polling task. Returns `None` when polling is
    /// disabled by configuration.
    pub fn start(&self) -> Option<tokio::task::JoinHandle<()>> {
        if !self.config.enabled {
            info!("Health monitoring disabled");
            return None;
        }

        let client = self.client.clone();
        let breaker = self.breaker.clone();
        let config = self.config.clone();
        let status = self.status.clone();

        Some(tokio::spawn(async move {
            let mut tick = interval(Duration::from_millis(config.interval_ms));
            if !config.initial_check {
                // consume the interval's immediate first tick
                tick.tick().await;
            }

            info!(
                interval_ms = config.interval_ms,
                initial_check = config.initial_check,
                "Started health monitoring"
            );

            loop {
                tick.tick().await;
                probe(&client, &breaker, &status).await;
            }
        }))
    }
}

async fn probe(
    client: &ApiClient,
    breaker: &CircuitBreaker,
    status: &watch::Sender<HealthStatus>,
) -> HealthStatus {
    let healthy = client.check_health().await;
    let remaining = breaker.remaining_fail_fast().await;

    let snapshot = HealthStatus {
        healthy,
        retry_after: (!remaining.is_zero()).then_some(remaining),
        checked_at: Some(Instant::now()),
    };

    if healthy {
        debug!("Health check passed");
    } else {
        warn!(
            retry_after_ms = remaining.as_millis() as u64,
            "Health check failed"
        );
    }

    status.send_replace(snapshot.clone());
    snapshot
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::circuit_breaker::CircuitBreakerConfig;
    use crate::config::ClientConfig;

    fn monitor(base_url: &str, config: HealthMonitorConfig) -> HealthMonitor {
        let breaker = Arc::new(CircuitBreaker::new(CircuitBreakerConfig::default()));
        let client = Arc::new(ApiClient::new(
            ClientConfig {
                base_url: base_url.to_string(),
                ..Default::default()
            },
            breaker.clone(),
        ));
        HealthMonitor::new(client, breaker, config)
    }

    #[test]
    fn test_default_config() {
        let config = HealthMonitorConfig::default();
        assert!(config.enabled);
        assert_eq!(config.interval_ms, 60_000);
        assert!(config.initial_check);
    }

    #[test]
    fn test_status_starts_optimistic() {
        let monitor = monitor("http://localhost:1", HealthMonitorConfig::default());
        let status = monitor.current();
        assert!(status.healthy);
        assert!(status.checked_at.is_none());
    }

    #[tokio::test]
    async fn test_check_now_against_unreachable_host() {
        // nothing listens on port 1; the check resolves false, never errors
        let monitor = monitor("http://127.0.0.1:1/api", HealthMonitorConfig::default());
        let status = monitor.check_now().await;
        assert!(!status.healthy);
        assert!(status.checked_at.is_some());
        assert!(!monitor.current().healthy);
    }

    #[tokio::test]
    async fn test_start_disabled_returns_none() {
        let monitor = monitor(
            "http://127.0.0.1:1/api",
            HealthMonitorConfig {
                enabled: false,
                ..Default::default()
            },
        );
        assert!(monitor.start().is_none());
    }

    #[tokio::test]
    async fn test_subscriber_sees_published_status() {
        let monitor = monitor("http://127.0.0.1:1/api", HealthMonitorConfig::default());
        let mut rx = monitor.subscribe();

        monitor.check_now().await;
        rx.changed().await.unwrap();
        assert!(!rx.borrow().healthy);
    }
}

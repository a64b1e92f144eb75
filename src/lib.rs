pub mod casing;
pub mod circuit_breaker;
pub mod client;
pub mod config;
pub mod error;
pub mod health;

pub use circuit_breaker::{BreakerError, CircuitBreaker, CircuitBreakerConfig, CircuitState};
pub use client::{ApiClient, FormData, FormValue, Payload, RequestBody, RequestOptions};
pub use config::ClientConfig;
pub use error::{ApiError, Result};
pub use health::{HealthMonitor, HealthMonitorConfig, HealthStatus};

/// Initialize tracing/logging
pub fn init_tracing() {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "backstop=debug".into()),
        )
        .with_target(false)
        .compact()
        .init();
}

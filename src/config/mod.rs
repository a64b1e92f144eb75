use crate::error::{ApiError, Result};
use serde::{Deserialize, Serialize};
use std::time::Duration;
use url::Url;

/// Environment variable selecting the backend origin
pub const API_URL_ENV: &str = "BACKSTOP_API_URL";

/// Path of the backend health endpoint
pub const HEALTH_CHECK_PATH: &str = "/health/";

/// Health checks use a short fixed budget so a dead backend is detected
/// quickly and the check itself can never pile up behind slow requests.
pub const HEALTH_CHECK_TIMEOUT: Duration = Duration::from_millis(3_000);

/// Request layer configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClientConfig {
    /// Backend base URL, including the API prefix
    #[serde(default = "default_base_url")]
    pub base_url: String,
    /// Default time budget per request in milliseconds
    #[serde(default = "default_timeout_ms")]
    pub timeout_ms: u64,
}

fn default_base_url() -> String {
    "http://localhost:8000/api".to_string()
}

fn default_timeout_ms() -> u64 {
    10_000
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            base_url: default_base_url(),
            timeout_ms: default_timeout_ms(),
        }
    }
}

impl ClientConfig {
    /// Build the configuration from the environment. `BACKSTOP_API_URL`
    /// selects the backend origin (the `/api` prefix is appended); absence
    /// falls back to the local default.
    pub fn from_env() -> Self {
        let base_url = std::env::var(API_URL_ENV)
            .map(|origin| format!("{}/api", origin.trim_end_matches('/')))
            .unwrap_or_else(|_| default_base_url());

        Self {
            base_url,
            timeout_ms: default_timeout_ms(),
        }
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }

    /// Join a request path onto the base URL.
    pub fn endpoint(&self, path: &str) -> Result<Url> {
        let joined = format!(
            "{}/{}",
            self.base_url.trim_end_matches('/'),
            path.trim_start_matches('/')
        );
        Url::parse(&joined)
            .map_err(|e| ApiError::Transport(format!("invalid request URL '{}': {}", joined, e)))
    }
}

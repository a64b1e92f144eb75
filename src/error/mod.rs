use serde_json::Value;
use std::time::Duration;
use thiserror::Error;

/// Result type for backstop operations
pub type Result<T> = std::result::Result<T, ApiError>;

/// Normalized error raised by the request layer.
///
/// Every failed call produces exactly one of these, regardless of whether the
/// failure originated in the transport, a timer, the backend, or the circuit
/// breaker. Callers branch on the variant instead of on exception types.
#[derive(Error, Debug, Clone)]
pub enum ApiError {
    /// Network-level failure: DNS, connection refused, body decode
    #[error("transport error: {0}")]
    Transport(String),

    /// The operation exceeded its time budget
    #[error("request timed out after {}ms", elapsed.as_millis())]
    Timeout { elapsed: Duration },

    /// The backend responded outside the 2xx range. The parsed response body
    /// is preserved verbatim so field-level validation errors stay inspectable.
    #[error("backend returned {status} {status_text}")]
    Http {
        status: u16,
        status_text: String,
        body: Option<Value>,
    },

    /// The circuit breaker rejected the call without attempting it
    #[error("circuit open, retry in {}ms", retry_after.as_millis())]
    CircuitOpen { retry_after: Duration },
}

impl ApiError {
    /// HTTP status code, if the backend got far enough to produce one
    pub fn status(&self) -> Option<u16> {
        match self {
            ApiError::Http { status, .. } => Some(*status),
            _ => None,
        }
    }

    /// Remaining fail-fast window, if the circuit breaker rejected the call
    pub fn retry_after(&self) -> Option<Duration> {
        match self {
            ApiError::CircuitOpen { retry_after } => Some(*retry_after),
            _ => None,
        }
    }

    /// Parsed server error body, if one was readable
    pub fn body(&self) -> Option<&Value> {
        match self {
            ApiError::Http { body, .. } => body.as_ref(),
            _ => None,
        }
    }

    /// Build user-facing text for this error.
    ///
    /// HTTP error bodies come in two shapes: `{"message": ...}` or a map of
    /// `{field: [errors]}` from server-side validation. Both are flattened
    /// here; everything else falls back to a generic message per variant.
    pub fn user_message(&self) -> String {
        match self {
            ApiError::Transport(_) => {
                "Unable to reach the server. Please check your connection.".to_string()
            }
            ApiError::Timeout { .. } => {
                "The server took too long to respond. Please try again.".to_string()
            }
            ApiError::CircuitOpen { retry_after } => format!(
                "Service temporarily unavailable. Please retry in {} seconds.",
                retry_after.as_secs().max(1)
            ),
            ApiError::Http {
                status,
                status_text,
                body,
            } => body
                .as_ref()
                .and_then(flatten_error_body)
                .unwrap_or_else(|| format!("Request failed: {} {}", status, status_text)),
        }
    }
}

/// Flatten a backend error body into a single line of user-facing text.
fn flatten_error_body(body: &Value) -> Option<String> {
    let map = body.as_object()?;

    // {"message": ...} shape wins when present
    if let Some(message) = map.get("message") {
        return Some(match message {
            Value::String(text) => text.clone(),
            other => other.to_string(),
        });
    }

    // {field: [errors]} validation shape
    let mut lines = Vec::new();
    for (field, errors) in map {
        match errors {
            Value::Array(items) => {
                let joined = items
                    .iter()
                    .map(|item| match item {
                        Value::String(text) => text.clone(),
                        other => other.to_string(),
                    })
                    .collect::<Vec<_>>()
                    .join(", ");
                lines.push(format!("{}: {}", field, joined));
            }
            Value::String(text) => lines.push(format!("{}: {}", field, text)),
            _ => return None,
        }
    }

    if lines.is_empty() {
        None
    } else {
        Some(lines.join("; "))
    }
}

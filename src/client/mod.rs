pub mod types;

pub use types::{FormData, FormValue, Payload, RequestBody, RequestOptions};

use crate::casing;
use crate::circuit_breaker::{BreakerError, CircuitBreaker};
use crate::config::{ClientConfig, HEALTH_CHECK_PATH, HEALTH_CHECK_TIMEOUT};
use crate::error::{ApiError, Result};
use http::{header, HeaderMap, Method};
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value;
use std::sync::Arc;
use tracing::{debug, warn};
use url::Url;

/// Request executor for a single backend.
///
/// Composes the transport, the key-casing transform, and the circuit
/// breaker: every call goes out snake-cased with credentials attached, is
/// raced against a time budget inside the breaker, and comes back either as
/// a camelCased [`Payload`] or a normalized [`ApiError`].
pub struct ApiClient {
    config: ClientConfig,
    http: reqwest::Client,
    breaker: Arc<CircuitBreaker>,
}

impl std::fmt::Debug for ApiClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ApiClient")
            .field("config", &self.config)
            .field("breaker", &self.breaker)
            .finish()
    }
}

impl ApiClient {
    /// Create a new client sharing the given breaker.
    ///
    /// The cookie store keeps session credentials flowing on every call.
    /// No transport-level timeout is set: deadlines are enforced by the
    /// breaker's race, per call.
    pub fn new(config: ClientConfig, breaker: Arc<CircuitBreaker>) -> Self {
        let http = reqwest::Client::builder()
            .cookie_store(true)
            .build()
            .expect("Failed to create HTTP client");

        Self {
            config,
            http,
            breaker,
        }
    }

    pub async fn get<T: DeserializeOwned>(&self, path: &str, options: RequestOptions) -> Result<T> {
        self.request(Method::GET, path, None, options)
            .await?
            .into_json()
    }

    pub async fn post<T: DeserializeOwned, B: Serialize + ?Sized>(
        &self,
        path: &str,
        body: &B,
        options: RequestOptions,
    ) -> Result<T> {
        self.request(Method::POST, path, Some(encode_json(body)?), options)
            .await?
            .into_json()
    }

    pub async fn put<T: DeserializeOwned, B: Serialize + ?Sized>(
        &self,
        path: &str,
        body: &B,
        options: RequestOptions,
    ) -> Result<T> {
        self.request(Method::PUT, path, Some(encode_json(body)?), options)
            .await?
            .into_json()
    }

    pub async fn patch<T: DeserializeOwned, B: Serialize + ?Sized>(
        &self,
        path: &str,
        body: &B,
        options: RequestOptions,
    ) -> Result<T> {
        self.request(Method::PATCH, path, Some(encode_json(body)?), options)
            .await?
            .into_json()
    }

    pub async fn delete<T: DeserializeOwned>(
        &self,
        path: &str,
        options: RequestOptions,
    ) -> Result<T> {
        self.request(Method::DELETE, path, None, options)
            .await?
            .into_json()
    }

    pub async fn post_form<T: DeserializeOwned>(
        &self,
        path: &str,
        form: FormData,
        options: RequestOptions,
    ) -> Result<T> {
        self.request(Method::POST, path, Some(RequestBody::Form(form)), options)
            .await?
            .into_json()
    }

    pub async fn put_form<T: DeserializeOwned>(
        &self,
        path: &str,
        form: FormData,
        options: RequestOptions,
    ) -> Result<T> {
        self.request(Method::PUT, path, Some(RequestBody::Form(form)), options)
            .await?
            .into_json()
    }

    pub async fn patch_form<T: DeserializeOwned>(
        &self,
        path: &str,
        form: FormData,
        options: RequestOptions,
    ) -> Result<T> {
        self.request(Method::PATCH, path, Some(RequestBody::Form(form)), options)
            .await?
            .into_json()
    }

    /// Untyped core the verb methods delegate to. Public for callers that
    /// need text or binary responses instead of JSON.
    pub async fn request(
        &self,
        method: Method,
        path: &str,
        body: Option<RequestBody>,
        options: RequestOptions,
    ) -> Result<Payload> {
        let url = self.config.endpoint(path)?;
        let timeout = options.timeout.unwrap_or_else(|| self.config.timeout());

        debug!(method = %method, url = %url, "Dispatching request");

        let call_url = url.clone();
        let headers = options.headers;
        let outcome = self
            .breaker
            .execute(
                move || self.perform(method, call_url, body, headers),
                Some(timeout),
            )
            .await;

        match outcome {
            Ok(payload) => Ok(payload),
            Err(BreakerError::Open { retry_after }) => {
                if let Some(fallback) = self.breaker.fallback() {
                    debug!(url = %url, "Circuit open, serving configured fallback");
                    return Ok(Payload::Json(fallback.clone()));
                }
                warn!(
                    url = %url,
                    retry_after_ms = retry_after.as_millis() as u64,
                    "Circuit open, failing fast"
                );
                Err(ApiError::CircuitOpen { retry_after })
            }
            Err(BreakerError::Timeout { elapsed }) => {
                warn!(url = %url, elapsed_ms = elapsed.as_millis() as u64, "Request timed out");
                Err(ApiError::Timeout { elapsed })
            }
            Err(BreakerError::Inner(err)) => Err(err),
        }
    }

    /// Probe backend connectivity: `GET <base>/health/` with a short fixed
    /// budget, outside the circuit breaker so the probe never contributes to
    /// its failure accounting. Any 2xx is healthy; every failure, including
    /// an unparseable base URL, resolves to `false` instead of an error.
    pub async fn check_health(&self) -> bool {
        let url = match self.config.endpoint(HEALTH_CHECK_PATH) {
            Ok(url) => url,
            Err(_) => return false,
        };

        let result = self
            .http
            .get(url.clone())
            .timeout(HEALTH_CHECK_TIMEOUT)
            .send()
            .await;

        match result {
            Ok(response) => response.status().is_success(),
            Err(e) => {
                warn!(url = %url, error = %e, "Health check failed");
                false
            }
        }
    }

    /// The breaker this client dispatches through
    pub fn breaker(&self) -> &Arc<CircuitBreaker> {
        &self.breaker
    }

    pub fn config(&self) -> &ClientConfig {
        &self.config
    }

    /// Build and send one transport call. Runs inside the breaker's race, so
    /// any error returned here is a counted failure.
    async fn perform(
        &self,
        method: Method,
        url: Url,
        body: Option<RequestBody>,
        headers: HeaderMap,
    ) -> Result<Payload> {
        let mut request = self.http.request(method, url.clone());

        match body {
            Some(RequestBody::Json(value)) => {
                // .json() sets the application/json content type
                request = request.json(&casing::keys_to_snake_case(value));
            }
            Some(RequestBody::Form(form)) => {
                // the multipart boundary content type comes from reqwest
                request = request.multipart(to_multipart(casing::form_keys_to_snake_case(form))?);
            }
            None => {}
        }

        // caller headers win over defaults
        for (name, value) in headers.iter() {
            request = request.header(name, value);
        }

        let response = request.send().await.map_err(|e| {
            warn!(url = %url, error = %e, "Transport failure");
            ApiError::Transport(e.to_string())
        })?;

        let status = response.status();
        if !status.is_success() {
            let body = response.json::<Value>().await.ok();
            warn!(url = %url, status = %status, "Backend returned error status");
            return Err(ApiError::Http {
                status: status.as_u16(),
                status_text: status.canonical_reason().unwrap_or("").to_string(),
                body,
            });
        }

        decode_response(response).await
    }
}

/// Decode a 2xx response by content type: JSON is camelCased, text passes
/// through verbatim, everything else is an opaque binary handle.
async fn decode_response(response: reqwest::Response) -> Result<Payload> {
    let content_type = response
        .headers()
        .get(header::CONTENT_TYPE)
        .and_then(|value| value.to_str().ok())
        .unwrap_or("")
        .to_string();

    if content_type.contains("application/json") {
        let value = response.json::<Value>().await.map_err(|e| {
            ApiError::Transport(format!("failed to decode JSON response: {}", e))
        })?;
        Ok(Payload::Json(casing::keys_to_camel_case(value)))
    } else if content_type.starts_with("text/") {
        let text = response
            .text()
            .await
            .map_err(|e| ApiError::Transport(format!("failed to read text response: {}", e)))?;
        Ok(Payload::Text(text))
    } else {
        let bytes = response
            .bytes()
            .await
            .map_err(|e| ApiError::Transport(format!("failed to read response body: {}", e)))?;
        Ok(Payload::Bytes(bytes))
    }
}

fn encode_json<B: Serialize + ?Sized>(body: &B) -> Result<RequestBody> {
    serde_json::to_value(body)
        .map(RequestBody::Json)
        .map_err(|e| ApiError::Transport(format!("failed to encode request body: {}", e)))
}

fn to_multipart(form: FormData) -> Result<reqwest::multipart::Form> {
    let mut multipart = reqwest::multipart::Form::new();
    for (name, value) in form.into_fields() {
        multipart = match value {
            FormValue::Text(text) => multipart.text(name, text),
            FormValue::File {
                bytes,
                file_name,
                mime,
            } => {
                let part = reqwest::multipart::Part::bytes(bytes.to_vec())
                    .file_name(file_name)
                    .mime_str(&mime)
                    .map_err(|e| ApiError::Transport(format!("invalid mime type: {}", e)))?;
                multipart.part(name, part)
            }
        };
    }
    Ok(multipart)
}

use crate::error::{ApiError, Result};
use bytes::Bytes;
use http::{HeaderMap, HeaderName, HeaderValue};
use serde::de::DeserializeOwned;
use serde_json::Value;
use std::time::Duration;

/// Per-call request options
#[derive(Debug, Clone, Default)]
pub struct RequestOptions {
    /// Overrides the client's default time budget for this call
    pub timeout: Option<Duration>,
    /// Extra headers merged over the defaults
    pub headers: HeaderMap,
}

impl RequestOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    pub fn header(mut self, name: HeaderName, value: HeaderValue) -> Self {
        self.headers.insert(name, value);
        self
    }
}

/// Outgoing request body.
///
/// JSON bodies are written in the caller's camelCase convention; the client
/// snake-cases keys (or form field names) at dispatch time.
#[derive(Debug, Clone)]
pub enum RequestBody {
    Json(Value),
    Form(FormData),
}

/// Decoded response body, dispatched on the response content type.
#[derive(Debug, Clone)]
pub enum Payload {
    /// `application/json`, keys already converted to camelCase
    Json(Value),
    /// `text/*`, passed through verbatim
    Text(String),
    /// Anything else, an opaque binary handle
    Bytes(Bytes),
}

impl Payload {
    /// Deserialize a JSON payload into the caller's type.
    pub fn into_json<T: DeserializeOwned>(self) -> Result<T> {
        match self {
            Payload::Json(value) => serde_json::from_value(value)
                .map_err(|e| ApiError::Transport(format!("failed to decode response body: {}", e))),
            other => Err(ApiError::Transport(format!(
                "expected JSON response, got {}",
                other.kind()
            ))),
        }
    }

    pub fn into_text(self) -> Result<String> {
        match self {
            Payload::Text(text) => Ok(text),
            other => Err(ApiError::Transport(format!(
                "expected text response, got {}",
                other.kind()
            ))),
        }
    }

    pub fn into_bytes(self) -> Result<Bytes> {
        match self {
            Payload::Bytes(bytes) => Ok(bytes),
            other => Err(ApiError::Transport(format!(
                "expected binary response, got {}",
                other.kind()
            ))),
        }
    }

    pub fn kind(&self) -> &'static str {
        match self {
            Payload::Json(_) => "json",
            Payload::Text(_) => "text",
            Payload::Bytes(_) => "binary",
        }
    }
}

/// Multipart form payload: an ordered list of named fields, each either text
/// or a file part. Field names follow the in-process camelCase convention
/// until the client converts them at dispatch.
#[derive(Debug, Clone, Default)]
pub struct FormData {
    fields: Vec<(String, FormValue)>,
}

/// A single multipart form field value
#[derive(Debug, Clone)]
pub enum FormValue {
    Text(String),
    File {
        bytes: Bytes,
        file_name: String,
        mime: String,
    },
}

impl FormData {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn text(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.fields.push((name.into(), FormValue::Text(value.into())));
        self
    }

    pub fn file(
        mut self,
        name: impl Into<String>,
        bytes: Bytes,
        file_name: impl Into<String>,
        mime: impl Into<String>,
    ) -> Self {
        self.fields.push((
            name.into(),
            FormValue::File {
                bytes,
                file_name: file_name.into(),
                mime: mime.into(),
            },
        ));
        self
    }

    pub fn fields(&self) -> &[(String, FormValue)] {
        &self.fields
    }

    pub fn into_fields(self) -> Vec<(String, FormValue)> {
        self.fields
    }

    pub fn from_fields(fields: Vec<(String, FormValue)>) -> Self {
        Self { fields }
    }

    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }
}

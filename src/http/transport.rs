//! Transport layer
//!
//! Executes an [`ApiRequest`] against the backend and hands back the status
//! and body untouched. Interpreting the response is the client's job.

use super::error::{ClientError, ClientResult};
use super::request::ApiRequest;
use async_trait::async_trait;
use reqwest::header::{HeaderMap, HeaderValue, CONTENT_TYPE};
use reqwest::{Client, StatusCode};
use serde_json::Value;
use std::time::Duration;

/// Raw response as seen on the wire
#[derive(Debug, Clone)]
pub struct RawResponse {
    pub status: StatusCode,
    pub body: Value,
}

impl RawResponse {
    pub fn new(status: StatusCode, body: Value) -> Self {
        Self { status, body }
    }

    /// Parse a body: empty → `Null`, JSON → value, anything else → string
    pub fn parse_body(status: StatusCode, text: &str) -> Self {
        let body = if text.trim().is_empty() {
            Value::Null
        } else {
            serde_json::from_str(text).unwrap_or_else(|_| Value::String(text.to_string()))
        };
        Self { status, body }
    }

    /// `message` field of an object body, if present
    pub fn message(&self) -> Option<&str> {
        self.body
            .get("message")
            .and_then(Value::as_str)
            .filter(|m| !m.is_empty())
    }

    /// Human-readable failure description for non-success statuses
    pub fn error_message(&self) -> String {
        self.message()
            .map(str::to_string)
            .or_else(|| self.body.as_str().map(str::to_string))
            .unwrap_or_else(|| {
                self.status
                    .canonical_reason()
                    .unwrap_or("Request failed")
                    .to_string()
            })
    }
}

/// Anything that can execute an API request
#[async_trait]
pub trait Transport: Send + Sync {
    /// Send the request. Every HTTP status is returned as `Ok`; only
    /// failures to obtain a response are errors.
    async fn execute(&self, request: &ApiRequest) -> ClientResult<RawResponse>;
}

/// Configuration for the HTTP transport
#[derive(Debug, Clone)]
pub struct HttpTransportConfig {
    /// Base URL every request path is appended to (e.g. "http://localhost:3000/api")
    pub base_url: String,
    /// Request timeout in milliseconds
    pub timeout_ms: u64,
}

impl Default for HttpTransportConfig {
    fn default() -> Self {
        Self {
            base_url: "http://localhost:3000/api".to_string(),
            timeout_ms: 10_000,
        }
    }
}

/// reqwest-backed transport
pub struct HttpTransport {
    client: Client,
    config: HttpTransportConfig,
}

impl HttpTransport {
    /// Create a transport with JSON default headers and the configured timeout
    pub fn new(config: HttpTransportConfig) -> ClientResult<Self> {
        let mut headers = HeaderMap::new();
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));

        let client = Client::builder()
            .timeout(Duration::from_millis(config.timeout_ms))
            .default_headers(headers)
            .build()
            .map_err(ClientError::Transport)?;

        Ok(Self { client, config })
    }

    pub fn config(&self) -> &HttpTransportConfig {
        &self.config
    }

    /// Absolute URL for a request
    pub fn url_for(&self, request: &ApiRequest) -> String {
        format!(
            "{}{}",
            self.config.base_url.trim_end_matches('/'),
            request.path_and_query()
        )
    }
}

#[async_trait]
impl Transport for HttpTransport {
    async fn execute(&self, request: &ApiRequest) -> ClientResult<RawResponse> {
        let url = self.url_for(request);

        let mut builder = self
            .client
            .request(request.method().clone(), &url)
            .headers(request.headers().clone());

        if let Some(body) = request.body() {
            builder = builder.json(body);
        }

        tracing::debug!(
            request_id = %request.id(),
            method = %request.method(),
            url = %url,
            "Sending request"
        );

        let response = builder.send().await.map_err(ClientError::from_reqwest)?;
        let status = response.status();
        let text = response.text().await.map_err(ClientError::from_reqwest)?;

        tracing::debug!(request_id = %request.id(), status = status.as_u16(), "Received response");

        Ok(RawResponse::parse_body(status, &text))
    }
}

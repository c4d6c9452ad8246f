//! API Client
//!
//! Entry point for backend calls. Every request goes through the credential
//! pipeline, the transport and the envelope unwrapper; a 401 is handed to the
//! unauthorized policy.

use super::envelope::unwrap_envelope;
use super::error::{ClientError, ClientResult};
use super::observer::{ExpiryReason, LoginRedirect, SessionObserver};
use super::refresh::{RefreshCoordinator, RefreshStats, DEFAULT_REFRESH_PATH};
use super::request::{ApiRequest, RequestPipeline};
use super::transport::{HttpTransport, HttpTransportConfig, RawResponse, Transport};
use crate::config::{Config, CredentialBackend};
use crate::credentials::{
    AuthMode, CredentialStorage, FileStorage, MemoryStorage, TokenStore, TokenTtl,
};
use reqwest::StatusCode;
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value;
use std::path::PathBuf;
use std::sync::Arc;

/// What to do when the backend answers 401
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UnauthorizedPolicy {
    /// Refresh the access token once and replay the request
    Refresh,
    /// Clear credentials and end the session immediately
    Redirect,
}

impl From<AuthMode> for UnauthorizedPolicy {
    fn from(mode: AuthMode) -> Self {
        match mode {
            AuthMode::Live => UnauthorizedPolicy::Refresh,
            AuthMode::Mock => UnauthorizedPolicy::Redirect,
        }
    }
}

/// Authenticated client for the admin backend
pub struct ApiClient {
    transport: Arc<dyn Transport>,
    tokens: Arc<TokenStore>,
    pipeline: RequestPipeline,
    coordinator: RefreshCoordinator,
    observer: Arc<dyn SessionObserver>,
    policy: UnauthorizedPolicy,
    mode: AuthMode,
}

/// Builder for [`ApiClient`]
pub struct ApiClientBuilder {
    transport: Arc<dyn Transport>,
    tokens: Arc<TokenStore>,
    observer: Option<Arc<dyn SessionObserver>>,
    mode: AuthMode,
    policy: Option<UnauthorizedPolicy>,
    refresh_path: String,
}

impl ApiClientBuilder {
    pub fn mode(mut self, mode: AuthMode) -> Self {
        self.mode = mode;
        self
    }

    /// Override the policy derived from the mode
    pub fn policy(mut self, policy: UnauthorizedPolicy) -> Self {
        self.policy = Some(policy);
        self
    }

    pub fn observer(mut self, observer: Arc<dyn SessionObserver>) -> Self {
        self.observer = Some(observer);
        self
    }

    pub fn refresh_path(mut self, path: impl Into<String>) -> Self {
        self.refresh_path = path.into();
        self
    }

    pub fn build(self) -> ApiClient {
        let observer = self
            .observer
            .unwrap_or_else(|| Arc::new(LoginRedirect::default()));

        let coordinator = RefreshCoordinator::new(
            Arc::clone(&self.tokens),
            Arc::clone(&self.transport),
            Arc::clone(&observer),
        )
        .with_refresh_path(self.refresh_path);

        ApiClient {
            pipeline: RequestPipeline::new(Arc::clone(&self.tokens), self.mode),
            policy: self.policy.unwrap_or_else(|| self.mode.into()),
            transport: self.transport,
            tokens: self.tokens,
            coordinator,
            observer,
            mode: self.mode,
        }
    }
}

impl ApiClient {
    pub fn builder(transport: Arc<dyn Transport>, tokens: Arc<TokenStore>) -> ApiClientBuilder {
        ApiClientBuilder {
            transport,
            tokens,
            observer: None,
            mode: AuthMode::Live,
            policy: None,
            refresh_path: DEFAULT_REFRESH_PATH.to_string(),
        }
    }

    /// Wire up an HTTP client from configuration
    pub fn from_config(config: &Config, observer: Arc<dyn SessionObserver>) -> ClientResult<Self> {
        let transport = HttpTransport::new(HttpTransportConfig {
            base_url: config.api.url.clone(),
            timeout_ms: config.api.timeout_ms,
        })?;

        let storage: Arc<dyn CredentialStorage> = match config.credentials.backend {
            CredentialBackend::File => {
                Arc::new(FileStorage::new(PathBuf::from(&config.credentials.path)))
            }
            CredentialBackend::Memory => Arc::new(MemoryStorage::new()),
        };

        let tokens = Arc::new(TokenStore::with_ttl(
            storage,
            TokenTtl {
                access_days: config.credentials.access_token_ttl_days,
                refresh_days: config.credentials.refresh_token_ttl_days,
            },
        ));

        Ok(Self::builder(Arc::new(transport), tokens)
            .mode(config.api.mode)
            .refresh_path(config.api.refresh_path.clone())
            .observer(observer)
            .build())
    }

    pub fn tokens(&self) -> &Arc<TokenStore> {
        &self.tokens
    }

    pub fn mode(&self) -> AuthMode {
        self.mode
    }

    pub fn policy(&self) -> UnauthorizedPolicy {
        self.policy
    }

    pub fn refresh_stats(&self) -> RefreshStats {
        self.coordinator.stats()
    }

    /// Send a request and return the unwrapped payload
    pub async fn send(&self, mut request: ApiRequest) -> ClientResult<Value> {
        self.pipeline.prepare(&mut request);

        loop {
            let response = self.transport.execute(&request).await?;
            if response.status != StatusCode::UNAUTHORIZED {
                return Self::interpret(response);
            }
            self.recover(&mut request, &response).await?;
        }
    }

    /// Send a request and decode the payload
    pub async fn send_json<T: DeserializeOwned>(&self, request: ApiRequest) -> ClientResult<T> {
        let payload = self.send(request).await?;
        Ok(serde_json::from_value(payload)?)
    }

    pub async fn get<T: DeserializeOwned>(&self, path: &str) -> ClientResult<T> {
        self.send_json(ApiRequest::get(path)).await
    }

    pub async fn post<T, B>(&self, path: &str, body: &B) -> ClientResult<T>
    where
        T: DeserializeOwned,
        B: Serialize + ?Sized,
    {
        self.send_json(ApiRequest::post(path).json(body)?).await
    }

    pub async fn put<T, B>(&self, path: &str, body: &B) -> ClientResult<T>
    where
        T: DeserializeOwned,
        B: Serialize + ?Sized,
    {
        self.send_json(ApiRequest::put(path).json(body)?).await
    }

    pub async fn patch<T, B>(&self, path: &str, body: &B) -> ClientResult<T>
    where
        T: DeserializeOwned,
        B: Serialize + ?Sized,
    {
        self.send_json(ApiRequest::patch(path).json(body)?).await
    }

    pub async fn delete<T: DeserializeOwned>(&self, path: &str) -> ClientResult<T> {
        self.send_json(ApiRequest::delete(path)).await
    }

    fn interpret(response: RawResponse) -> ClientResult<Value> {
        if !response.status.is_success() {
            return Err(ClientError::Http {
                status: response.status.as_u16(),
                message: response.error_message(),
            });
        }
        unwrap_envelope(response.body)
    }

    /// Handle a 401: either prepare the request for one replay, or fail closed
    async fn recover(&self, request: &mut ApiRequest, response: &RawResponse) -> ClientResult<()> {
        let message = response.error_message();

        if self.policy == UnauthorizedPolicy::Redirect {
            self.end_session(ExpiryReason::Unauthorized);
            return Err(ClientError::Unauthorized { message });
        }

        if request.is_retried() {
            tracing::warn!(
                request_id = %request.id(),
                path = request.path(),
                "Request rejected again after token refresh"
            );
            self.end_session(ExpiryReason::RetryExhausted);
            return Err(ClientError::Unauthorized { message });
        }

        request.mark_retried();
        let token = self.coordinator.refresh().await?;
        request.set_bearer(&token)?;

        tracing::debug!(
            request_id = %request.id(),
            path = request.path(),
            "Replaying request with refreshed token"
        );
        Ok(())
    }

    fn end_session(&self, reason: ExpiryReason) {
        if let Err(e) = self.tokens.clear() {
            tracing::error!(error = %e, "Failed to clear credentials");
        }
        self.observer.session_expired(&reason);
    }
}

//! Auth Service
//!
//! Login, registration and current-user lookups. Live mode talks to the
//! backend through [`ApiClient`]; mock mode answers from [`MockDirectory`].

use super::adapters::{adapt_current_user_response, adapt_login_response};
use super::error::AuthResult;
use super::mock::MockDirectory;
use super::types::*;
use crate::credentials::{AuthMode, TokenKind, TokenStore};
use crate::http::{ApiClient, ApiRequest};
use serde_json::{json, Value};
use std::sync::Arc;
use std::time::Duration;

const ACCOUNTS_LATENCY: Duration = Duration::from_millis(200);

pub struct AuthService {
    client: Arc<ApiClient>,
    mock: Option<MockDirectory>,
    mock_latency: Duration,
}

impl AuthService {
    /// Create a service for the client's mode. Mock mode gets a fresh demo
    /// directory whose calls take `mock_latency`.
    pub fn new(client: Arc<ApiClient>, mock_latency: Duration) -> Self {
        let mock = match client.mode() {
            AuthMode::Mock => Some(MockDirectory::new(mock_latency)),
            AuthMode::Live => None,
        };

        Self {
            client,
            mock,
            mock_latency,
        }
    }

    pub fn client(&self) -> &Arc<ApiClient> {
        &self.client
    }

    pub fn mode(&self) -> AuthMode {
        self.client.mode()
    }

    pub fn tokens(&self) -> &Arc<TokenStore> {
        self.client.tokens()
    }

    pub async fn login(&self, email: &str, password: &str) -> AuthResult<LoginResponse> {
        let request = LoginRequest {
            email: email.to_string(),
            password: password.to_string(),
        };

        if let Some(mock) = &self.mock {
            let response = mock.login(&request).await?;
            self.tokens().set_mock(&response.token)?;
            tracing::info!(account = %response.user.user.id, "Logged in (mock)");
            return Ok(response);
        }

        let raw: BackendLoginResponse = self.client.post("/auth/login", &request).await?;
        self.accept_login(raw)
    }

    pub async fn register(&self, request: &RegisterRequest) -> AuthResult<LoginResponse> {
        if let Some(mock) = &self.mock {
            let response = mock.register(request).await?;
            self.tokens().set_mock(&response.token)?;
            tracing::info!(account = %response.user.user.id, "Registered (mock)");
            return Ok(response);
        }

        let body = json!({
            "email": request.email,
            "name": request.name,
            "password": request.password,
        });
        let raw: BackendLoginResponse = self.client.post("/auth/register", &body).await?;
        self.accept_login(raw)
    }

    fn accept_login(&self, raw: BackendLoginResponse) -> AuthResult<LoginResponse> {
        let response = adapt_login_response(&raw);
        self.tokens()
            .set(&response.token, response.refresh_token.as_deref())?;

        tracing::info!(
            user = %response.user.user.id,
            expires_in = response.expires_in,
            "Logged in"
        );
        Ok(response)
    }

    pub async fn forgot_password(&self, email: &str) -> AuthResult<()> {
        if self.mock.is_some() {
            self.simulate_latency(self.mock_latency).await;
            tracing::info!(email, "Password reset email requested (mock)");
            return Ok(());
        }

        let _: Value = self
            .client
            .post("/auth/forgot-password", &json!({ "email": email }))
            .await?;
        Ok(())
    }

    pub async fn reset_password(&self, token: &str, password: &str) -> AuthResult<()> {
        if self.mock.is_some() {
            self.simulate_latency(self.mock_latency).await;
            tracing::info!("Password reset (mock)");
            return Ok(());
        }

        let _: Value = self
            .client
            .post(
                "/auth/reset-password",
                &json!({ "token": token, "password": password }),
            )
            .await?;
        Ok(())
    }

    /// End the session. Local credentials are cleared even when the backend
    /// call fails; the backend error is still returned, and takes precedence
    /// over a failure to clear.
    pub async fn logout(&self) -> AuthResult<()> {
        let result = match &self.mock {
            Some(_) => Ok(()),
            None => self
                .client
                .send(ApiRequest::post("/auth/logout"))
                .await
                .map(|_| ()),
        };

        if let Err(e) = self.tokens().clear() {
            tracing::error!(error = %e, "Failed to clear credentials");
            result?;
            return Err(e.into());
        }
        tracing::info!("Logged out");
        Ok(result?)
    }

    /// The logged-in user, or `None` when there is no usable session
    pub async fn current_user(&self) -> Option<CurrentUserResponse> {
        if let Some(mock) = &self.mock {
            let token = self.tokens().get(TokenKind::Mock)?;
            let account = mock.find_by_token(&token).await?;
            return Some(CurrentUserResponse {
                user: account,
                accounts: mock.accounts().await,
            });
        }

        self.tokens().get(TokenKind::Access)?;

        match self.client.get::<BackendUser>("/auth/me").await {
            Ok(user) => Some(adapt_current_user_response(&user)),
            Err(e) => {
                tracing::error!(error = %e, "Failed to fetch current user");
                None
            }
        }
    }

    /// Accounts available for switching. Only mock mode has more than one.
    pub async fn accounts(&self) -> Vec<Account> {
        match &self.mock {
            Some(mock) => {
                self.simulate_latency(ACCOUNTS_LATENCY.min(self.mock_latency)).await;
                mock.accounts().await
            }
            None => Vec::new(),
        }
    }

    async fn simulate_latency(&self, latency: Duration) {
        if !latency.is_zero() {
            tokio::time::sleep(latency).await;
        }
    }
}

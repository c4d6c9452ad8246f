//! Session Store
//!
//! Client-side view of who is logged in. Wraps [`AuthService`] and keeps the
//! current user, the switchable accounts and the last error message.
//!
//! Only the non-secret part of the state is persisted ([`PersistedSession`]);
//! tokens stay in the credential storage.

use super::error::{AuthError, AuthResult};
use super::service::AuthService;
use super::types::{Account, LoginResponse, RegisterRequest};
use crate::credentials::{AuthMode, StorageResult};
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::sync::Arc;

/// In-memory session state
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Session {
    pub user: Option<Account>,
    pub token: String,
    pub accounts: Vec<Account>,
    pub active_account_id: Option<String>,
    pub error: String,
}

/// The part of the session that survives restarts
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PersistedSession {
    pub user: Option<Account>,
    #[serde(default)]
    pub accounts: Vec<Account>,
    pub active_account_id: Option<String>,
}

impl PersistedSession {
    /// Load from a JSON file; a missing file is an empty session
    pub fn load(path: &Path) -> StorageResult<Self> {
        match std::fs::read_to_string(path) {
            Ok(content) if content.trim().is_empty() => Ok(Self::default()),
            Ok(content) => Ok(serde_json::from_str(&content)?),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(Self::default()),
            Err(e) => Err(e.into()),
        }
    }

    pub fn save(&self, path: &Path) -> StorageResult<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let tmp = path.with_extension("tmp");
        std::fs::write(&tmp, serde_json::to_vec_pretty(self)?)?;
        std::fs::rename(&tmp, path)?;
        Ok(())
    }
}

pub struct SessionStore {
    service: Arc<AuthService>,
    state: Session,
}

impl SessionStore {
    pub fn new(service: Arc<AuthService>) -> Self {
        Self {
            service,
            state: Session::default(),
        }
    }

    pub fn service(&self) -> &Arc<AuthService> {
        &self.service
    }

    pub fn state(&self) -> &Session {
        &self.state
    }

    pub fn user(&self) -> Option<&Account> {
        self.state.user.as_ref()
    }

    pub fn accounts(&self) -> &[Account] {
        &self.state.accounts
    }

    pub fn active_account_id(&self) -> Option<&str> {
        self.state.active_account_id.as_deref()
    }

    /// Last error message, if any
    pub fn error(&self) -> Option<&str> {
        Some(self.state.error.as_str()).filter(|e| !e.is_empty())
    }

    pub async fn login(&mut self, email: &str, password: &str) -> AuthResult<Account> {
        self.state.error.clear();
        let result = self.service.login(email, password).await;
        self.adopt_login(result)
    }

    pub async fn register(&mut self, request: &RegisterRequest) -> AuthResult<Account> {
        self.state.error.clear();
        let result = self.service.register(request).await;
        self.adopt_login(result)
    }

    fn adopt_login(&mut self, result: AuthResult<LoginResponse>) -> AuthResult<Account> {
        match result {
            Ok(response) => {
                self.state.active_account_id = Some(response.user.user.id.clone());
                self.state.token = response.token;
                self.state.accounts = response.accounts;
                self.state.user = Some(response.user.clone());
                Ok(response.user)
            }
            Err(e) => Err(self.record(e)),
        }
    }

    /// Make another known account the active one (mock mode only)
    pub fn switch_account(&mut self, account_id: &str) -> AuthResult<()> {
        let found = self
            .state
            .accounts
            .iter()
            .find(|a| a.user.id == account_id)
            .cloned();
        let account = match found {
            Some(account) => account,
            None => return Err(self.record(AuthError::AccountNotFound(account_id.to_string()))),
        };

        if self.service.mode() != AuthMode::Mock {
            return Err(self.record(AuthError::SwitchUnsupported));
        }

        if let Err(e) = self.service.tokens().set_mock(&account.token) {
            return Err(self.record(e.into()));
        }

        tracing::info!(account = account_id, "Switched account");
        self.state.token = account.token.clone();
        self.state.active_account_id = Some(account.user.id.clone());
        self.state.user = Some(account);
        self.state.error.clear();
        Ok(())
    }

    /// Refresh the switchable accounts. The first one becomes active when no
    /// account is active yet.
    pub async fn load_accounts(&mut self) {
        let accounts = self.service.accounts().await;
        if accounts.is_empty() {
            return;
        }

        if self.state.active_account_id.is_none() {
            let first = accounts[0].clone();
            self.state.token = first.token.clone();
            self.state.active_account_id = Some(first.user.id.clone());
            self.state.user = Some(first);
        }
        self.state.accounts = accounts;
    }

    /// Reload the current user from the backend and resync the token
    pub async fn refresh_current_user(&mut self) -> Option<Account> {
        let response = self.service.current_user().await?;

        let stored = self.service.tokens().bearer(self.service.mode());
        self.state.token = match self.service.mode() {
            AuthMode::Mock => stored.unwrap_or_else(|| response.user.token.clone()),
            AuthMode::Live => stored.unwrap_or_default(),
        };

        self.state.active_account_id = Some(response.user.user.id.clone());
        self.state.accounts = response.accounts;
        self.state.user = Some(response.user.clone());
        Some(response.user)
    }

    /// Log out; local state is reset whatever the backend says
    pub async fn logout(&mut self) {
        if let Err(e) = self.service.logout().await {
            tracing::error!(error = %e, "Logout failed");
        }
        self.state = Session::default();
    }

    pub fn is_authenticated(&self) -> bool {
        !self.state.token.is_empty() || self.service.tokens().has_bearer(self.service.mode())
    }

    /// Up to two upper-cased initials of the user's name, `HL` when logged out
    pub fn initials(&self) -> String {
        match &self.state.user {
            Some(account) => account
                .user
                .name
                .split(' ')
                .filter_map(|word| word.chars().next())
                .take(2)
                .collect::<String>()
                .to_uppercase(),
            None => "HL".to_string(),
        }
    }

    pub fn clear_error(&mut self) {
        self.state.error.clear();
    }

    pub fn persisted(&self) -> PersistedSession {
        PersistedSession {
            user: self.state.user.clone(),
            accounts: self.state.accounts.clone(),
            active_account_id: self.state.active_account_id.clone(),
        }
    }

    /// Restore persisted state. The token is re-read from credential storage.
    pub fn restore(&mut self, persisted: PersistedSession) {
        self.state.user = persisted.user;
        self.state.accounts = persisted.accounts;
        self.state.active_account_id = persisted.active_account_id;
        self.state.token = self
            .service
            .tokens()
            .bearer(self.service.mode())
            .unwrap_or_default();
    }

    fn record(&mut self, error: AuthError) -> AuthError {
        self.state.error = error.to_string();
        error
    }
}

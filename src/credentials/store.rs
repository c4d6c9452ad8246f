//! Token Store
//!
//! Typed access to the credentials the request pipeline attaches to
//! outgoing calls.

use super::error::StorageResult;
use super::storage::CredentialStorage;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;

/// Which backend the client talks to
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AuthMode {
    /// Real backend with access/refresh tokens
    #[default]
    Live,
    /// Development mode with fixed demo accounts and a single mock token
    Mock,
}

impl fmt::Display for AuthMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AuthMode::Live => write!(f, "live"),
            AuthMode::Mock => write!(f, "mock"),
        }
    }
}

/// Kinds of stored credential
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TokenKind {
    Access,
    Refresh,
    Mock,
}

impl TokenKind {
    /// Storage key for this credential
    pub fn key(&self) -> &'static str {
        match self {
            TokenKind::Access => "accessToken",
            TokenKind::Refresh => "refreshToken",
            TokenKind::Mock => "token",
        }
    }

    /// The credential sent as the bearer token in the given mode
    pub fn bearer_for(mode: AuthMode) -> Self {
        match mode {
            AuthMode::Live => TokenKind::Access,
            AuthMode::Mock => TokenKind::Mock,
        }
    }
}

/// Lifetime of stored credentials, in days
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TokenTtl {
    pub access_days: u32,
    pub refresh_days: u32,
}

impl Default for TokenTtl {
    fn default() -> Self {
        Self {
            access_days: 7,
            refresh_days: 30,
        }
    }
}

/// Reads and writes access, refresh and mock tokens
pub struct TokenStore {
    storage: Arc<dyn CredentialStorage>,
    ttl: TokenTtl,
}

impl TokenStore {
    /// Create a token store on top of a credential storage
    pub fn new(storage: Arc<dyn CredentialStorage>) -> Self {
        Self::with_ttl(storage, TokenTtl::default())
    }

    /// Create a token store with custom credential lifetimes
    pub fn with_ttl(storage: Arc<dyn CredentialStorage>, ttl: TokenTtl) -> Self {
        Self { storage, ttl }
    }

    /// Current value of a credential, if any.
    ///
    /// Storage failures are logged and read as absent.
    pub fn get(&self, kind: TokenKind) -> Option<String> {
        match self.storage.get(kind.key()) {
            Ok(value) => value.filter(|v| !v.is_empty()),
            Err(e) => {
                tracing::warn!(key = kind.key(), error = %e, "Failed to read credential");
                None
            }
        }
    }

    /// Token the request pipeline should send in the given mode
    pub fn bearer(&self, mode: AuthMode) -> Option<String> {
        self.get(TokenKind::bearer_for(mode))
    }

    /// Whether a bearer token is stored for the given mode
    pub fn has_bearer(&self, mode: AuthMode) -> bool {
        self.bearer(mode).is_some()
    }

    /// Persist a new access token, and the refresh token when one is supplied.
    ///
    /// Refresh tokens are not rotated on every call, so `None` (or an empty
    /// string) leaves the stored refresh token untouched.
    pub fn set(&self, access: &str, refresh: Option<&str>) -> StorageResult<()> {
        self.storage
            .set(TokenKind::Access.key(), access, self.ttl.access_days)?;

        if let Some(refresh) = refresh.filter(|r| !r.is_empty()) {
            self.storage
                .set(TokenKind::Refresh.key(), refresh, self.ttl.refresh_days)?;
        }

        Ok(())
    }

    /// Persist the mock-mode token
    pub fn set_mock(&self, token: &str) -> StorageResult<()> {
        self.storage
            .set(TokenKind::Mock.key(), token, self.ttl.access_days)
    }

    /// Remove every stored credential
    pub fn clear(&self) -> StorageResult<()> {
        for kind in [TokenKind::Access, TokenKind::Refresh, TokenKind::Mock] {
            self.storage.remove(kind.key())?;
        }
        Ok(())
    }
}

impl fmt::Debug for TokenStore {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TokenStore")
            .field("has_access", &self.get(TokenKind::Access).is_some())
            .field("has_refresh", &self.get(TokenKind::Refresh).is_some())
            .field("ttl", &self.ttl)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::credentials::MemoryStorage;

    fn store() -> TokenStore {
        TokenStore::new(Arc::new(MemoryStorage::new()))
    }

    #[test]
    fn test_set_then_get_round_trip() {
        let tokens = store();
        tokens.set("access-1", Some("refresh-1")).unwrap();

        assert_eq!(tokens.get(TokenKind::Access).as_deref(), Some("access-1"));
        assert_eq!(tokens.get(TokenKind::Refresh).as_deref(), Some("refresh-1"));
    }

    #[test]
    fn test_clear_removes_everything() {
        let tokens = store();
        tokens.set("access-1", Some("refresh-1")).unwrap();
        tokens.set_mock("mock_token_acc-admin").unwrap();

        tokens.clear().unwrap();

        assert_eq!(tokens.get(TokenKind::Access), None);
        assert_eq!(tokens.get(TokenKind::Refresh), None);
        assert_eq!(tokens.get(TokenKind::Mock), None);
    }

    #[test]
    fn test_refresh_token_kept_when_not_rotated() {
        let tokens = store();
        tokens.set("access-1", Some("refresh-1")).unwrap();
        tokens.set("access-2", None).unwrap();
        tokens.set("access-3", Some("")).unwrap();

        assert_eq!(tokens.get(TokenKind::Access).as_deref(), Some("access-3"));
        assert_eq!(tokens.get(TokenKind::Refresh).as_deref(), Some("refresh-1"));
    }

    #[test]
    fn test_bearer_depends_on_mode() {
        let tokens = store();
        tokens.set("live", None).unwrap();
        tokens.set_mock("mock").unwrap();

        assert_eq!(tokens.bearer(AuthMode::Live).as_deref(), Some("live"));
        assert_eq!(tokens.bearer(AuthMode::Mock).as_deref(), Some("mock"));
    }

    #[test]
    fn test_debug_does_not_leak_tokens() {
        let tokens = store();
        tokens.set("secret-access", Some("secret-refresh")).unwrap();

        let debug = format!("{:?}", tokens);
        assert!(!debug.contains("secret"));
        assert!(debug.contains("has_access: true"));
    }
}

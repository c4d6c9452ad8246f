//! # HaloLight
//!
//! Client side of the HaloLight admin backend: an authenticated HTTP client
//! that refreshes expired access tokens once for any number of concurrent
//! requests, plus the account and session layer built on top of it.
//!
//! ## Modules
//!
//! - [`credentials`]: token storage (in memory or a JSON file)
//! - [`http`]: request pipeline, envelope unwrapping, coordinated refresh
//! - [`account`]: auth service (live or mock), session store, model adapters
//! - [`config`]: TOML configuration with environment overrides
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use halolight::{ApiClient, Config, LoginRedirect};
//! use std::sync::Arc;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let config = Config::load_default();
//!     let redirect = Arc::new(LoginRedirect::new(config.session.login_path.clone()));
//!     let client = ApiClient::from_config(&config, redirect)?;
//!
//!     // Expired tokens are refreshed transparently
//!     let users: serde_json::Value = client.get("/users").await?;
//!     println!("{}", users);
//!
//!     Ok(())
//! }
//! ```

pub mod account;
pub mod config;
pub mod credentials;
pub mod http;

pub use account::{
    Account, AuthError, AuthResult, AuthService, PersistedSession, Session, SessionStore, User,
};

pub use config::{generate_default_config, Config, ConfigError, CredentialBackend, LoggingConfig};

pub use credentials::{
    AuthMode, CredentialStorage, FileStorage, MemoryStorage, StorageError, TokenKind, TokenStore,
};

pub use http::{
    ApiClient, ApiRequest, ClientError, ClientResult, ExpiryReason, HttpTransport, LoginRedirect,
    RefreshError, SessionEvent, SessionObserver, Transport, UnauthorizedPolicy,
};

//! Accounts and Sessions
//!
//! Everything above the HTTP client that deals with who the user is.
//!
//! ## Components
//!
//! - **types**: frontend models and the backend shapes they come from
//! - **adapters**: backend → frontend conversion and permission checks
//! - **AuthService**: login, registration and password flows (live or mock)
//! - **SessionStore**: current user, switchable accounts, persisted state

pub mod adapters;
mod error;
mod mock;
mod service;
mod session;
pub mod types;

pub use adapters::{has_all_permissions, has_any_permission, has_permission};
pub use error::{AuthError, AuthResult};
pub use mock::{demo_roles, mock_token, MockDirectory, DEMO_PASSWORD};
pub use service::AuthService;
pub use session::{PersistedSession, Session, SessionStore};
pub use types::{Account, LoginResponse, Permission, RegisterRequest, Role, User, UserStatus};

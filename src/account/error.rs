//! Authentication error types

use crate::credentials::StorageError;
use crate::http::ClientError;
use thiserror::Error;

/// Errors raised by the auth service and session store
#[derive(Error, Debug)]
pub enum AuthError {
    #[error(transparent)]
    Client(#[from] ClientError),

    #[error("Invalid email or password")]
    InvalidCredentials,

    #[error("Passwords do not match")]
    PasswordMismatch,

    #[error("Account not found: {0}")]
    AccountNotFound(String),

    #[error("Account switching is only available in mock mode")]
    SwitchUnsupported,

    #[error("Credential storage error: {0}")]
    Storage(#[from] StorageError),
}

/// Result type for auth operations
pub type AuthResult<T> = Result<T, AuthError>;

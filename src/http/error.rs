//! HTTP client error types

use crate::credentials::StorageError;
use std::sync::Arc;
use thiserror::Error;

/// Errors returned to callers of the API client
#[derive(Error, Debug)]
pub enum ClientError {
    /// Network-level failure reaching the server
    #[error("Request failed: {0}")]
    Transport(#[from] reqwest::Error),

    /// The transport gave up waiting for a response
    #[error("Request timeout")]
    Timeout,

    /// Non-success HTTP status other than 401
    #[error("HTTP error {status}: {message}")]
    Http { status: u16, message: String },

    /// 401 that will not be recovered by a token refresh
    #[error("Unauthorized: {message}")]
    Unauthorized { message: String },

    /// The envelope reported a non-success application code
    #[error("{message}")]
    Business { code: i64, message: String },

    /// Obtaining a new access token failed
    #[error(transparent)]
    Refresh(#[from] RefreshError),

    /// Response body did not match the expected shape
    #[error("Decode error: {0}")]
    Decode(#[from] serde_json::Error),

    /// Credential storage failed
    #[error("Credential storage error: {0}")]
    Storage(#[from] StorageError),

    /// The request could not be built
    #[error("Invalid request: {0}")]
    InvalidRequest(String),
}

impl ClientError {
    /// Map a reqwest error the same way for every call site
    pub(crate) fn from_reqwest(e: reqwest::Error) -> Self {
        if e.is_timeout() {
            ClientError::Timeout
        } else {
            ClientError::Transport(e)
        }
    }

    /// Whether this error ends the session (caller should re-authenticate)
    pub fn is_session_expired(&self) -> bool {
        matches!(self, ClientError::Unauthorized { .. } | ClientError::Refresh(_))
    }
}

/// Why a token refresh did not produce a new access token
///
/// Cloned to every caller queued behind the same refresh, so all of them
/// observe the identical failure.
#[derive(Error, Debug, Clone)]
pub enum RefreshError {
    #[error("No refresh token available")]
    NoRefreshToken,

    #[error("Token refresh failed: {0}")]
    Failed(Arc<ClientError>),

    #[error("Token refresh was abandoned before completing")]
    Abandoned,
}

/// Result type for client operations
pub type ClientResult<T> = Result<T, ClientError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_business_error_displays_message() {
        let err = ClientError::Business {
            code: 404,
            message: "not found".to_string(),
        };
        assert_eq!(err.to_string(), "not found");
        assert!(!err.is_session_expired());
    }

    #[test]
    fn test_refresh_error_is_transparent() {
        let err: ClientError = RefreshError::NoRefreshToken.into();
        assert_eq!(err.to_string(), "No refresh token available");
        assert!(err.is_session_expired());
    }

    #[test]
    fn test_failed_refresh_shares_source() {
        let source = Arc::new(ClientError::Http {
            status: 500,
            message: "boom".to_string(),
        });
        let a = RefreshError::Failed(Arc::clone(&source));
        let b = a.clone();

        match (a, b) {
            (RefreshError::Failed(x), RefreshError::Failed(y)) => assert!(Arc::ptr_eq(&x, &y)),
            _ => panic!("expected failed refresh"),
        }
    }
}

//! Session expiry notifications
//!
//! The client never navigates anywhere itself. When a session can no longer
//! be recovered it tells a [`SessionObserver`], and the surrounding
//! application decides what "go to login" means.

use serde::Serialize;
use std::fmt;
use std::sync::atomic::{AtomicUsize, Ordering};
use tokio::sync::broadcast;

/// Why the session ended
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ExpiryReason {
    /// A refresh was needed but no refresh token was stored
    NoRefreshToken,
    /// The refresh endpoint failed
    RefreshFailed { error: String },
    /// A request was rejected again after being replayed with a new token
    RetryExhausted,
    /// 401 under the redirect-only policy
    Unauthorized,
}

impl fmt::Display for ExpiryReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ExpiryReason::NoRefreshToken => write!(f, "no refresh token"),
            ExpiryReason::RefreshFailed { error } => write!(f, "refresh failed: {}", error),
            ExpiryReason::RetryExhausted => write!(f, "rejected after retry"),
            ExpiryReason::Unauthorized => write!(f, "unauthorized"),
        }
    }
}

/// Receives "session expired" notifications
pub trait SessionObserver: Send + Sync {
    fn session_expired(&self, reason: &ExpiryReason);
}

impl<F> SessionObserver for F
where
    F: Fn(&ExpiryReason) + Send + Sync,
{
    fn session_expired(&self, reason: &ExpiryReason) {
        self(reason)
    }
}

/// Events published by [`LoginRedirect`]
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum SessionEvent {
    Expired {
        reason: ExpiryReason,
        redirect_to: String,
    },
}

/// Observer that turns session expiry into a redirect to the login entry point
pub struct LoginRedirect {
    login_path: String,
    events: broadcast::Sender<SessionEvent>,
    redirects: AtomicUsize,
}

impl LoginRedirect {
    pub fn new(login_path: impl Into<String>) -> Self {
        let (events, _) = broadcast::channel(16);
        Self {
            login_path: login_path.into(),
            events,
            redirects: AtomicUsize::new(0),
        }
    }

    pub fn login_path(&self) -> &str {
        &self.login_path
    }

    /// Subscribe to expiry events
    pub fn subscribe(&self) -> broadcast::Receiver<SessionEvent> {
        self.events.subscribe()
    }

    /// Number of redirects issued so far
    pub fn redirects(&self) -> usize {
        self.redirects.load(Ordering::SeqCst)
    }
}

impl Default for LoginRedirect {
    fn default() -> Self {
        Self::new("/login")
    }
}

impl SessionObserver for LoginRedirect {
    fn session_expired(&self, reason: &ExpiryReason) {
        self.redirects.fetch_add(1, Ordering::SeqCst);
        tracing::warn!(reason = %reason, redirect_to = %self.login_path, "Session expired");

        // No subscribers is fine
        let _ = self.events.send(SessionEvent::Expired {
            reason: reason.clone(),
            redirect_to: self.login_path.clone(),
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    #[tokio::test]
    async fn test_login_redirect_publishes_event() {
        let redirect = LoginRedirect::default();
        let mut rx = redirect.subscribe();

        redirect.session_expired(&ExpiryReason::NoRefreshToken);

        let event = rx.recv().await.unwrap();
        assert_eq!(
            event,
            SessionEvent::Expired {
                reason: ExpiryReason::NoRefreshToken,
                redirect_to: "/login".to_string(),
            }
        );
        assert_eq!(redirect.redirects(), 1);
    }

    #[test]
    fn test_closure_observer() {
        let hits = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&hits);
        let observer = move |_: &ExpiryReason| {
            counter.fetch_add(1, Ordering::SeqCst);
        };

        observer.session_expired(&ExpiryReason::RetryExhausted);
        assert_eq!(hits.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_event_serialization() {
        let event = SessionEvent::Expired {
            reason: ExpiryReason::RefreshFailed {
                error: "timeout".to_string(),
            },
            redirect_to: "/login".to_string(),
        };
        let json = serde_json::to_value(&event).unwrap();
        assert_eq!(json["event"], "expired");
        assert_eq!(json["reason"]["type"], "refresh_failed");
    }
}

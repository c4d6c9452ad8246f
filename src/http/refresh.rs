//! Refresh Coordinator
//!
//! Guarantees that at most one token refresh is outstanding. The first caller
//! that needs a new access token performs the refresh; everyone arriving while
//! it is in flight queues behind it and receives the same outcome, in arrival
//! order, once it settles.
//!
//! ## Failure handling
//!
//! A refresh that cannot succeed fails closed: every stored credential is
//! cleared, the session observer is notified once for the whole cycle, and
//! the leader plus every queued caller are rejected with the same error.

use super::envelope::unwrap_envelope;
use super::error::{ClientError, ClientResult, RefreshError};
use super::observer::{ExpiryReason, SessionObserver};
use super::request::ApiRequest;
use super::transport::Transport;
use crate::credentials::{TokenKind, TokenStore};
use reqwest::StatusCode;
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use tokio::sync::oneshot;

/// Default path of the refresh endpoint, relative to the API base URL
pub const DEFAULT_REFRESH_PATH: &str = "/auth/refresh";

type RefreshOutcome = Result<String, RefreshError>;
type Waiter = oneshot::Sender<RefreshOutcome>;

#[derive(Default)]
struct RefreshState {
    in_flight: bool,
    pending: VecDeque<Waiter>,
    cycles: u64,
    failures: u64,
}

/// Snapshot of coordinator activity
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RefreshStats {
    /// Refresh calls started
    pub cycles: u64,
    /// Refresh cycles that ended without a new token
    pub failures: u64,
    /// Callers currently queued behind an in-flight refresh
    pub pending: usize,
    pub in_flight: bool,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct RefreshRequest<'a> {
    refresh_token: &'a str,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct RefreshResponse {
    access_token: String,
    #[serde(default)]
    refresh_token: Option<String>,
}

/// Single-flight token refresh
pub struct RefreshCoordinator {
    tokens: Arc<TokenStore>,
    transport: Arc<dyn Transport>,
    observer: Arc<dyn SessionObserver>,
    refresh_path: String,
    state: Mutex<RefreshState>,
}

impl RefreshCoordinator {
    pub fn new(
        tokens: Arc<TokenStore>,
        transport: Arc<dyn Transport>,
        observer: Arc<dyn SessionObserver>,
    ) -> Self {
        Self {
            tokens,
            transport,
            observer,
            refresh_path: DEFAULT_REFRESH_PATH.to_string(),
            state: Mutex::new(RefreshState::default()),
        }
    }

    /// Use a different refresh endpoint path
    pub fn with_refresh_path(mut self, path: impl Into<String>) -> Self {
        self.refresh_path = path.into();
        self
    }

    pub fn refresh_path(&self) -> &str {
        &self.refresh_path
    }

    /// Number of callers waiting on the in-flight refresh
    pub fn pending(&self) -> usize {
        self.lock_state().pending.len()
    }

    pub fn stats(&self) -> RefreshStats {
        let state = self.lock_state();
        RefreshStats {
            cycles: state.cycles,
            failures: state.failures,
            pending: state.pending.len(),
            in_flight: state.in_flight,
        }
    }

    /// Obtain a new access token, joining the in-flight refresh if there is one
    pub async fn refresh(&self) -> Result<String, RefreshError> {
        let waiter = {
            let mut state = self.lock_state();
            if state.in_flight {
                let (tx, rx) = oneshot::channel();
                state.pending.push_back(tx);
                Some((rx, state.pending.len()))
            } else {
                state.in_flight = true;
                state.cycles += 1;
                None
            }
        };

        if let Some((rx, position)) = waiter {
            tracing::debug!(position, "Refresh already in flight, queued");
            return rx.await.unwrap_or(Err(RefreshError::Abandoned));
        }

        let mut in_flight = InFlight {
            coordinator: self,
            settled: false,
        };

        let outcome = self.request_new_tokens().await;
        if let Err(e) = &outcome {
            self.fail_closed(e);
        }

        in_flight.settle(&outcome);
        outcome
    }

    async fn request_new_tokens(&self) -> RefreshOutcome {
        let Some(refresh_token) = self.tokens.get(TokenKind::Refresh) else {
            tracing::warn!("Access token rejected and no refresh token stored");
            return Err(RefreshError::NoRefreshToken);
        };

        self.call_refresh_endpoint(&refresh_token)
            .await
            .map_err(|e| RefreshError::Failed(Arc::new(e)))
    }

    async fn call_refresh_endpoint(&self, refresh_token: &str) -> ClientResult<String> {
        let request = ApiRequest::post(self.refresh_path.as_str())
            .json(&RefreshRequest { refresh_token })?;

        let response = self.transport.execute(&request).await?;

        if response.status == StatusCode::UNAUTHORIZED {
            return Err(ClientError::Unauthorized {
                message: response.error_message(),
            });
        }
        if !response.status.is_success() {
            return Err(ClientError::Http {
                status: response.status.as_u16(),
                message: response.error_message(),
            });
        }

        let issued: RefreshResponse = serde_json::from_value(unwrap_envelope(response.body)?)?;
        self.tokens
            .set(&issued.access_token, issued.refresh_token.as_deref())?;

        tracing::info!(
            rotated = issued.refresh_token.is_some(),
            "Access token refreshed"
        );

        Ok(issued.access_token)
    }

    fn fail_closed(&self, error: &RefreshError) {
        if let Err(e) = self.tokens.clear() {
            tracing::error!(error = %e, "Failed to clear credentials after refresh failure");
        }

        let reason = match error {
            RefreshError::NoRefreshToken => ExpiryReason::NoRefreshToken,
            other => ExpiryReason::RefreshFailed {
                error: other.to_string(),
            },
        };
        tracing::warn!(error = %error, "Token refresh failed, credentials cleared");
        self.observer.session_expired(&reason);
    }

    /// Resolve every queued caller and reopen the gate, in one critical section
    fn drain(&self, outcome: &RefreshOutcome) {
        let mut state = self.lock_state();
        if outcome.is_err() {
            state.failures += 1;
        }

        let waiters = state.pending.len();
        for waiter in state.pending.drain(..) {
            // A waiter whose caller went away is not an error
            let _ = waiter.send(outcome.clone());
        }
        state.in_flight = false;

        if waiters > 0 {
            tracing::debug!(waiters, ok = outcome.is_ok(), "Released queued requests");
        }
    }

    fn lock_state(&self) -> MutexGuard<'_, RefreshState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

/// Releases the in-flight gate even if the leading future is dropped
struct InFlight<'a> {
    coordinator: &'a RefreshCoordinator,
    settled: bool,
}

impl InFlight<'_> {
    fn settle(&mut self, outcome: &RefreshOutcome) {
        self.settled = true;
        self.coordinator.drain(outcome);
    }
}

impl Drop for InFlight<'_> {
    fn drop(&mut self) {
        if !self.settled {
            tracing::warn!("Refresh dropped before settling, releasing queued requests");
            self.coordinator.drain(&Err(RefreshError::Abandoned));
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::credentials::MemoryStorage;
    use crate::http::testing::{FakeBackend, RefreshBehavior};
    use crate::http::LoginRedirect;
    use std::time::Duration;

    struct Fixture {
        coordinator: Arc<RefreshCoordinator>,
        tokens: Arc<TokenStore>,
        backend: Arc<FakeBackend>,
        redirect: Arc<LoginRedirect>,
    }

    fn fixture(backend: FakeBackend) -> Fixture {
        let tokens = Arc::new(TokenStore::new(Arc::new(MemoryStorage::new())));
        tokens.set("T1", Some("R1")).unwrap();
        let backend = Arc::new(backend);
        let redirect = Arc::new(LoginRedirect::default());
        let coordinator = Arc::new(RefreshCoordinator::new(
            Arc::clone(&tokens),
            backend.clone(),
            redirect.clone(),
        ));

        Fixture {
            coordinator,
            tokens,
            backend,
            redirect,
        }
    }

    async fn wait_for_pending(coordinator: &RefreshCoordinator, n: usize) {
        tokio::time::timeout(Duration::from_secs(5), async {
            while coordinator.pending() < n {
                tokio::task::yield_now().await;
            }
        })
        .await
        .expect("callers never queued");
    }

    #[tokio::test]
    async fn test_successful_refresh_stores_tokens() {
        let f = fixture(FakeBackend::new("T2").refresh_with(RefreshBehavior::issue("T2", Some("R2"))));

        let token = f.coordinator.refresh().await.unwrap();

        assert_eq!(token, "T2");
        assert_eq!(f.tokens.get(TokenKind::Access).as_deref(), Some("T2"));
        assert_eq!(f.tokens.get(TokenKind::Refresh).as_deref(), Some("R2"));
        assert_eq!(f.backend.refresh_calls(), 1);
        assert_eq!(f.redirect.redirects(), 0);

        let sent = f.backend.requests();
        assert_eq!(sent[0].body.as_ref().unwrap()["refreshToken"], "R1");
        assert_eq!(sent[0].bearer, None);
    }

    #[tokio::test]
    async fn test_refresh_without_rotation_keeps_refresh_token() {
        let f = fixture(FakeBackend::new("T2").refresh_with(RefreshBehavior::issue("T2", None)));

        f.coordinator.refresh().await.unwrap();

        assert_eq!(f.tokens.get(TokenKind::Refresh).as_deref(), Some("R1"));
    }

    #[tokio::test]
    async fn test_concurrent_callers_share_one_refresh() {
        let f = fixture(
            FakeBackend::new("T2")
                .refresh_with(RefreshBehavior::issue("T2", Some("R2")))
                .gated(),
        );

        let handles: Vec<_> = (0..3)
            .map(|_| {
                let coordinator = Arc::clone(&f.coordinator);
                tokio::spawn(async move { coordinator.refresh().await })
            })
            .collect();

        wait_for_pending(&f.coordinator, 2).await;
        assert!(f.coordinator.stats().in_flight);
        f.backend.open_gate();

        for handle in handles {
            assert_eq!(handle.await.unwrap().unwrap(), "T2");
        }

        assert_eq!(f.backend.refresh_calls(), 1);
        let stats = f.coordinator.stats();
        assert_eq!(stats.cycles, 1);
        assert_eq!(stats.pending, 0);
        assert!(!stats.in_flight);
    }

    #[tokio::test]
    async fn test_failed_refresh_rejects_everyone_and_redirects_once() {
        let f = fixture(
            FakeBackend::new("T2")
                .refresh_with(RefreshBehavior::TransportFailure)
                .gated(),
        );

        let handles: Vec<_> = (0..4)
            .map(|_| {
                let coordinator = Arc::clone(&f.coordinator);
                tokio::spawn(async move { coordinator.refresh().await })
            })
            .collect();

        wait_for_pending(&f.coordinator, 3).await;
        f.backend.open_gate();

        let mut sources = Vec::new();
        for handle in handles {
            match handle.await.unwrap() {
                Err(RefreshError::Failed(source)) => {
                    assert!(matches!(*source, ClientError::Timeout));
                    sources.push(source);
                }
                other => panic!("expected failed refresh, got {:?}", other),
            }
        }
        assert!(sources.windows(2).all(|w| Arc::ptr_eq(&w[0], &w[1])));

        assert_eq!(f.tokens.get(TokenKind::Access), None);
        assert_eq!(f.tokens.get(TokenKind::Refresh), None);
        assert_eq!(f.redirect.redirects(), 1);
        assert_eq!(f.coordinator.stats().failures, 1);
    }

    #[tokio::test]
    async fn test_unauthorized_refresh_endpoint_fails_closed() {
        let f = fixture(
            FakeBackend::new("T2").refresh_with(RefreshBehavior::Status(StatusCode::UNAUTHORIZED)),
        );

        let err = f.coordinator.refresh().await.unwrap_err();

        match err {
            RefreshError::Failed(source) => {
                assert!(matches!(*source, ClientError::Unauthorized { .. }))
            }
            other => panic!("unexpected error {:?}", other),
        }
        assert!(!f.tokens.has_bearer(crate::credentials::AuthMode::Live));
    }

    #[tokio::test]
    async fn test_missing_refresh_token() {
        let f = fixture(FakeBackend::new("T2"));
        f.tokens.clear().unwrap();
        f.tokens.set("T1", None).unwrap();
        let mut events = f.redirect.subscribe();

        let err = f.coordinator.refresh().await.unwrap_err();

        assert!(matches!(err, RefreshError::NoRefreshToken));
        assert_eq!(f.backend.refresh_calls(), 0);
        assert_eq!(f.tokens.get(TokenKind::Access), None);
        let crate::http::SessionEvent::Expired { reason, .. } = events.recv().await.unwrap();
        assert_eq!(reason, ExpiryReason::NoRefreshToken);
    }

    #[tokio::test]
    async fn test_malformed_refresh_body_fails_closed() {
        let f = fixture(FakeBackend::new("T2").refresh_with(RefreshBehavior::Body(
            serde_json::json!({"unexpected": true}),
        )));

        let err = f.coordinator.refresh().await.unwrap_err();

        match err {
            RefreshError::Failed(source) => assert!(matches!(*source, ClientError::Decode(_))),
            other => panic!("unexpected error {:?}", other),
        }
        assert_eq!(f.tokens.get(TokenKind::Access), None);
    }

    #[tokio::test]
    async fn test_enveloped_refresh_response_is_accepted() {
        let f = fixture(FakeBackend::new("T2").refresh_with(RefreshBehavior::Body(
            serde_json::json!({"code": 200, "message": "ok", "data": {"accessToken": "T2"}}),
        )));

        assert_eq!(f.coordinator.refresh().await.unwrap(), "T2");
    }

    #[tokio::test]
    async fn test_dropped_leader_releases_waiters() {
        let f = fixture(
            FakeBackend::new("T2")
                .refresh_with(RefreshBehavior::issue("T2", None))
                .gated(),
        );

        let leader = {
            let coordinator = Arc::clone(&f.coordinator);
            tokio::spawn(async move { coordinator.refresh().await })
        };
        tokio::time::timeout(Duration::from_secs(5), async {
            while !f.coordinator.stats().in_flight {
                tokio::task::yield_now().await;
            }
        })
        .await
        .unwrap();

        let follower = {
            let coordinator = Arc::clone(&f.coordinator);
            tokio::spawn(async move { coordinator.refresh().await })
        };
        wait_for_pending(&f.coordinator, 1).await;

        leader.abort();
        let _ = leader.await;

        assert!(matches!(
            follower.await.unwrap(),
            Err(RefreshError::Abandoned)
        ));
        assert!(!f.coordinator.stats().in_flight);
    }

    #[tokio::test]
    async fn test_new_cycle_after_settle() {
        let f = fixture(FakeBackend::new("T2").refresh_with(RefreshBehavior::issue("T2", None)));

        f.coordinator.refresh().await.unwrap();
        f.coordinator.refresh().await.unwrap();

        assert_eq!(f.backend.refresh_calls(), 2);
        assert_eq!(f.coordinator.stats().cycles, 2);
    }
}

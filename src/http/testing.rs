//! In-process backend used by the client tests

use super::error::{ClientError, ClientResult};
use super::request::ApiRequest;
use super::transport::{RawResponse, Transport};
use crate::credentials::{TokenKind, TokenStore};
use async_trait::async_trait;
use reqwest::StatusCode;
use serde_json::{json, Value};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use tokio::sync::Notify;

pub(crate) const REFRESH_PATH: &str = "/auth/refresh";

/// How the fake refresh endpoint answers
#[derive(Debug, Clone)]
pub(crate) enum RefreshBehavior {
    Issue {
        access: String,
        refresh: Option<String>,
    },
    Status(StatusCode),
    Body(Value),
    TransportFailure,
}

impl RefreshBehavior {
    pub(crate) fn issue(access: &str, refresh: Option<&str>) -> Self {
        RefreshBehavior::Issue {
            access: access.to_string(),
            refresh: refresh.map(str::to_string),
        }
    }
}

#[derive(Debug, Clone)]
pub(crate) struct Recorded {
    pub path: String,
    pub bearer: Option<String>,
    pub body: Option<Value>,
    pub retried: bool,
    /// Access token held by the watched store when the request arrived
    pub stored_access: Option<String>,
}

/// Backend that accepts exactly one access token.
///
/// - `/auth/refresh` answers according to [`RefreshBehavior`], optionally
///   waiting for [`FakeBackend::open_gate`] first. A successful refresh makes
///   the issued token the accepted one.
/// - `/missing` answers HTTP 200 with a `404` envelope.
/// - `/broken` answers HTTP 500.
/// - every other path answers a success envelope echoing path and bearer, or
///   401 when the bearer is not the accepted token.
pub(crate) struct FakeBackend {
    accepted: Mutex<String>,
    refresh: RefreshBehavior,
    gate: Option<Arc<Notify>>,
    reject_all: bool,
    tokens: Option<Arc<TokenStore>>,
    refresh_calls: AtomicUsize,
    requests: Mutex<Vec<Recorded>>,
}

impl FakeBackend {
    pub(crate) fn new(accepted: &str) -> Self {
        Self {
            accepted: Mutex::new(accepted.to_string()),
            refresh: RefreshBehavior::issue(accepted, None),
            gate: None,
            reject_all: false,
            tokens: None,
            refresh_calls: AtomicUsize::new(0),
            requests: Mutex::new(Vec::new()),
        }
    }

    pub(crate) fn refresh_with(mut self, behavior: RefreshBehavior) -> Self {
        self.refresh = behavior;
        self
    }

    /// Hold refresh responses until the gate is opened
    pub(crate) fn gated(mut self) -> Self {
        self.gate = Some(Arc::new(Notify::new()));
        self
    }

    /// Answer 401 to every non-refresh request
    pub(crate) fn rejecting_all(mut self) -> Self {
        self.reject_all = true;
        self
    }

    /// Record the store's access token alongside every request
    pub(crate) fn watching(mut self, tokens: Arc<TokenStore>) -> Self {
        self.tokens = Some(tokens);
        self
    }

    pub(crate) fn open_gate(&self) {
        if let Some(gate) = &self.gate {
            gate.notify_one();
        }
    }

    pub(crate) fn refresh_calls(&self) -> usize {
        self.refresh_calls.load(Ordering::SeqCst)
    }

    pub(crate) fn requests(&self) -> Vec<Recorded> {
        self.requests.lock().unwrap().clone()
    }

    pub(crate) fn requests_to(&self, path: &str) -> Vec<Recorded> {
        self.requests()
            .into_iter()
            .filter(|r| r.path == path)
            .collect()
    }

    async fn answer_refresh(&self) -> ClientResult<RawResponse> {
        self.refresh_calls.fetch_add(1, Ordering::SeqCst);
        if let Some(gate) = &self.gate {
            gate.notified().await;
        }

        match &self.refresh {
            RefreshBehavior::Issue { access, refresh } => {
                *self.accepted.lock().unwrap() = access.clone();
                let mut body = json!({ "accessToken": access });
                if let Some(refresh) = refresh {
                    body["refreshToken"] = json!(refresh);
                }
                Ok(RawResponse::new(StatusCode::OK, body))
            }
            RefreshBehavior::Status(status) => Ok(RawResponse::new(
                *status,
                json!({ "message": "refresh rejected" }),
            )),
            RefreshBehavior::Body(body) => Ok(RawResponse::new(StatusCode::OK, body.clone())),
            RefreshBehavior::TransportFailure => Err(ClientError::Timeout),
        }
    }
}

#[async_trait]
impl Transport for FakeBackend {
    async fn execute(&self, request: &ApiRequest) -> ClientResult<RawResponse> {
        self.requests.lock().unwrap().push(Recorded {
            path: request.path().to_string(),
            bearer: request.bearer().map(str::to_string),
            body: request.body().cloned(),
            retried: request.is_retried(),
            stored_access: self
                .tokens
                .as_ref()
                .and_then(|tokens| tokens.get(TokenKind::Access)),
        });

        match request.path() {
            REFRESH_PATH => return self.answer_refresh().await,
            "/missing" => {
                return Ok(RawResponse::new(
                    StatusCode::OK,
                    json!({ "code": 404, "message": "not found", "data": null }),
                ))
            }
            "/broken" => {
                return Ok(RawResponse::new(
                    StatusCode::INTERNAL_SERVER_ERROR,
                    json!({ "message": "database unavailable" }),
                ))
            }
            _ => {}
        }

        let accepted = self.accepted.lock().unwrap().clone();
        if self.reject_all || request.bearer() != Some(accepted.as_str()) {
            return Ok(RawResponse::new(
                StatusCode::UNAUTHORIZED,
                json!({ "message": "token expired" }),
            ));
        }

        Ok(RawResponse::new(
            StatusCode::OK,
            json!({
                "code": 200,
                "message": "ok",
                "data": { "path": request.path(), "bearer": accepted },
            }),
        ))
    }
}

/// Backend answering from a fixed route table; unknown paths get a 404
pub(crate) struct ScriptedBackend {
    routes: Mutex<Vec<(String, ClientResult<RawResponse>)>>,
    requests: Mutex<Vec<Recorded>>,
}

impl ScriptedBackend {
    pub(crate) fn new() -> Self {
        Self {
            routes: Mutex::new(Vec::new()),
            requests: Mutex::new(Vec::new()),
        }
    }

    /// Answer `path` with a success envelope around `data`
    pub(crate) fn ok(self, path: &str, data: Value) -> Self {
        let body = json!({ "code": 200, "message": "ok", "data": data });
        self.respond(path, Ok(RawResponse::new(StatusCode::OK, body)))
    }

    pub(crate) fn status(self, path: &str, status: StatusCode, message: &str) -> Self {
        let body = json!({ "message": message });
        self.respond(path, Ok(RawResponse::new(status, body)))
    }

    pub(crate) fn failing(self, path: &str) -> Self {
        self.respond(path, Err(ClientError::Timeout))
    }

    fn respond(self, path: &str, response: ClientResult<RawResponse>) -> Self {
        self.routes
            .lock()
            .unwrap()
            .push((path.to_string(), response));
        self
    }

    pub(crate) fn requests_to(&self, path: &str) -> Vec<Recorded> {
        self.requests
            .lock()
            .unwrap()
            .iter()
            .filter(|r| r.path == path)
            .cloned()
            .collect()
    }
}

#[async_trait]
impl Transport for ScriptedBackend {
    async fn execute(&self, request: &ApiRequest) -> ClientResult<RawResponse> {
        self.requests.lock().unwrap().push(Recorded {
            path: request.path().to_string(),
            bearer: request.bearer().map(str::to_string),
            body: request.body().cloned(),
            retried: request.is_retried(),
            stored_access: None,
        });

        let routes = self.routes.lock().unwrap();
        match routes.iter().find(|(path, _)| path == request.path()) {
            Some((_, Ok(response))) => Ok(response.clone()),
            Some((_, Err(_))) => Err(ClientError::Timeout),
            None => Ok(RawResponse::new(
                StatusCode::NOT_FOUND,
                json!({ "message": "no route" }),
            )),
        }
    }
}

//! Credential refresh: detecting an expired access token, obtaining a new one
//! and replaying the request that failed.

use std::sync::Arc;

use {
    async_trait::async_trait,
    edulift_config::ExpiryMarkerConfig,
    edulift_session::{Session, SessionStore, User},
    reqwest::StatusCode,
    secrecy::ExposeSecret,
    serde::Deserialize,
    tokio::sync::Mutex,
    tracing::{debug, info, warn},
};

use crate::{
    Error, Result,
    events::{SessionEvent, SessionEvents},
    middleware::{Middleware, Next},
    request::{ApiRequest, ApiResponse},
    transport::Transport,
};

// ── Expiry detection ────────────────────────────────────────────────────────

/// Recognizes the backend's "access token expired" answer: a 401 whose JSON
/// body carries `field == code`. Any other 401 means the credential is
/// invalid and cannot be refreshed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExpiryMarker {
    field: String,
    code: i64,
}

impl Default for ExpiryMarker {
    fn default() -> Self {
        Self::from_config(&ExpiryMarkerConfig::default())
    }
}

impl ExpiryMarker {
    pub fn new(field: impl Into<String>, code: i64) -> Self {
        Self {
            field: field.into(),
            code,
        }
    }

    pub fn from_config(config: &ExpiryMarkerConfig) -> Self {
        Self::new(config.field.clone(), config.code)
    }

    pub fn matches(&self, response: &ApiResponse) -> bool {
        response.status == StatusCode::UNAUTHORIZED
            && response
                .json_value()
                .and_then(|body| body.get(&self.field).and_then(serde_json::Value::as_i64))
                == Some(self.code)
    }
}

// ── Refresh call ────────────────────────────────────────────────────────────

/// Payload of a successful refresh. The backend may rotate the refresh token
/// and resend the user record; absent fields keep their stored values.
#[derive(Debug, Clone, Deserialize)]
pub struct RefreshedCredentials {
    pub access_token: String,
    #[serde(default)]
    pub refresh_token: Option<String>,
    #[serde(default)]
    pub user: Option<User>,
}

/// Exchanges a refresh token for new credentials.
#[async_trait]
pub trait TokenRefresher: Send + Sync {
    async fn refresh(&self, refresh_token: &str) -> Result<RefreshedCredentials>;
}

/// `POST {refresh_path}` with the refresh token as bearer.
///
/// Goes straight to the transport: a refresh must never itself be refreshed
/// or evict the session from inside the pipeline.
pub struct HttpRefresher {
    transport: Arc<dyn Transport>,
    path: String,
}

impl HttpRefresher {
    pub fn new(transport: Arc<dyn Transport>, path: impl Into<String>) -> Self {
        Self {
            transport,
            path: path.into(),
        }
    }
}

#[async_trait]
impl TokenRefresher for HttpRefresher {
    async fn refresh(&self, refresh_token: &str) -> Result<RefreshedCredentials> {
        let mut request = ApiRequest::post(self.path.as_str())
            .with_body(serde_json::json!({}))
            .anonymous();
        request.set_bearer(refresh_token)?;

        let response = self.transport.send(&request).await?;
        if !response.is_success() {
            return Err(Error::api(response.status, response.text()));
        }
        response.json::<RefreshedCredentials>()
    }
}

// ── Coordinator ─────────────────────────────────────────────────────────────

/// Serializes refreshes and evictions against the shared session store.
///
/// Concurrent requests that fail with the same expired token share one
/// refresh: whoever takes the gate second finds a different token in the
/// store and reuses it.
pub struct RefreshCoordinator {
    store: Arc<dyn SessionStore>,
    refresher: Arc<dyn TokenRefresher>,
    events: SessionEvents,
    gate: Mutex<()>,
}

impl RefreshCoordinator {
    pub fn new(
        store: Arc<dyn SessionStore>,
        refresher: Arc<dyn TokenRefresher>,
        events: SessionEvents,
    ) -> Self {
        Self {
            store,
            refresher,
            events,
            gate: Mutex::new(()),
        }
    }

    /// Obtain a fresh access token and store the new session wholesale.
    ///
    /// `stale` is the token the failed request carried. If the store already
    /// holds a different one, that token is returned without a network call.
    /// Pass `None` to force a refresh.
    pub async fn refresh(&self, stale: Option<&str>) -> Result<String> {
        let _guard = self.gate.lock().await;

        let Some(session) = self.store.load()? else {
            return Err(Error::unauthenticated("no session to refresh"));
        };

        if let Some(stale) = stale
            && !session.access_token_matches(stale)
        {
            debug!(user = %session.user.username, "access token already refreshed, reusing");
            return Ok(session.access_token.expose_secret().clone());
        }

        let credentials = self
            .refresher
            .refresh(session.refresh_token.expose_secret())
            .await?;

        let access_token = credentials.access_token;
        let refresh_token = credentials
            .refresh_token
            .unwrap_or_else(|| session.refresh_token.expose_secret().clone());
        let user = credentials.user.unwrap_or(session.user);
        let next = Session::new(access_token.clone(), refresh_token, user);
        self.store.save(&next)?;

        info!(user = %next.user.username, "access token refreshed");
        self.events.emit(SessionEvent::Refreshed);
        Ok(access_token)
    }

    /// Clear the session and return the error to hand back to the caller.
    ///
    /// `Expired` is published only when there was a session to clear, so a
    /// burst of failing requests produces a single event.
    pub async fn evict(&self, reason: impl Into<String>) -> Error {
        let reason = reason.into();
        let _guard = self.gate.lock().await;

        let had_session = match self.store.load() {
            Ok(session) => session.is_some(),
            Err(e) => {
                warn!(error = %e, "unreadable session during eviction");
                true
            },
        };
        if let Err(e) = self.store.clear() {
            warn!(error = %e, "failed to clear session");
        }

        if had_session {
            warn!(reason = %reason, "session expired, credentials cleared");
            self.events.emit(SessionEvent::Expired {
                reason: reason.clone(),
            });
        }
        Error::unauthenticated(reason)
    }
}

// ── Pipeline stage ──────────────────────────────────────────────────────────

/// Turns an expired-token 401 into one refresh and one replay; turns every
/// other 401 on an authenticated request into an eviction.
pub struct RefreshRetry {
    coordinator: Arc<RefreshCoordinator>,
    marker: ExpiryMarker,
}

impl RefreshRetry {
    pub fn new(coordinator: Arc<RefreshCoordinator>, marker: ExpiryMarker) -> Self {
        Self {
            coordinator,
            marker,
        }
    }
}

#[async_trait]
impl Middleware for RefreshRetry {
    async fn handle(&self, request: ApiRequest, next: Next<'_>) -> Result<ApiResponse> {
        if request.is_anonymous() {
            return next.run(request).await;
        }

        let mut replay = request.clone();
        let response = next.run(request).await?;
        if response.status != StatusCode::UNAUTHORIZED {
            return Ok(response);
        }

        if replay.is_retried() {
            return Err(self
                .coordinator
                .evict("request rejected after token refresh")
                .await);
        }
        if !self.marker.matches(&response) {
            return Err(self.coordinator.evict("access token rejected").await);
        }

        let stale = replay.bearer_token().map(str::to_string);
        let token = match self.coordinator.refresh(stale.as_deref()).await {
            Ok(token) => token,
            Err(e) => {
                warn!(path = %replay.path, error = %e, "token refresh failed");
                return Err(self
                    .coordinator
                    .evict(format!("token refresh failed: {e}"))
                    .await);
            },
        };

        replay.mark_retried();
        replay.set_bearer(&token)?;
        debug!(method = %replay.method, path = %replay.path, "replaying with refreshed token");

        let response = next.run(replay).await?;
        if response.status == StatusCode::UNAUTHORIZED {
            return Err(self
                .coordinator
                .evict("request rejected after token refresh")
                .await);
        }
        Ok(response)
    }
}

#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
mod tests {
    use std::{
        collections::VecDeque,
        sync::{
            Mutex as StdMutex,
            atomic::{AtomicUsize, Ordering},
        },
    };

    use edulift_session::{MemorySessionStore, Role};

    use {super::*, crate::bearer::BearerAuth};

    const EXPIRED: &str = r#"{"msg":"Token has expired","sub_status":42}"#;

    fn user() -> User {
        User {
            id: 5,
            username: "student@edulift.com".into(),
            email: "student@edulift.com".into(),
            first_name: "Nimal".into(),
            last_name: "Perera".into(),
            role: Role::Student,
            is_active: true,
            created_at: None,
            updated_at: None,
        }
    }

    /// Replays scripted responses and records the bearer of every request.
    #[derive(Default)]
    struct Scripted {
        responses: StdMutex<VecDeque<ApiResponse>>,
        bearers: StdMutex<Vec<Option<String>>>,
    }

    impl Scripted {
        fn new(responses: Vec<(u16, &str)>) -> Self {
            Self {
                responses: StdMutex::new(
                    responses
                        .into_iter()
                        .map(|(s, b)| {
                            ApiResponse::new(StatusCode::from_u16(s).unwrap(), b.as_bytes().to_vec())
                        })
                        .collect(),
                ),
                bearers: StdMutex::default(),
            }
        }

        fn bearers(&self) -> Vec<Option<String>> {
            self.bearers.lock().unwrap().clone()
        }
    }

    #[async_trait]
    impl Transport for Scripted {
        async fn send(&self, request: &ApiRequest) -> Result<ApiResponse> {
            self.bearers
                .lock()
                .unwrap()
                .push(request.bearer_token().map(str::to_string));
            Ok(self
                .responses
                .lock()
                .unwrap()
                .pop_front()
                .unwrap_or_else(|| ApiResponse::new(StatusCode::OK, b"{}".to_vec())))
        }
    }

    /// Refresher answering with a fixed outcome and counting calls.
    struct FixedRefresher {
        outcome: std::result::Result<&'static str, &'static str>,
        calls: AtomicUsize,
    }

    impl FixedRefresher {
        fn ok(token: &'static str) -> Arc<Self> {
            Arc::new(Self {
                outcome: Ok(token),
                calls: AtomicUsize::new(0),
            })
        }

        fn failing() -> Arc<Self> {
            Arc::new(Self {
                outcome: Err("refresh token revoked"),
                calls: AtomicUsize::new(0),
            })
        }
    }

    #[async_trait]
    impl TokenRefresher for FixedRefresher {
        async fn refresh(&self, _refresh_token: &str) -> Result<RefreshedCredentials> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            match self.outcome {
                Ok(token) => Ok(RefreshedCredentials {
                    access_token: token.into(),
                    refresh_token: None,
                    user: None,
                }),
                Err(msg) => Err(Error::message(msg)),
            }
        }
    }

    struct Harness {
        store: Arc<MemorySessionStore>,
        events: SessionEvents,
        stages: Vec<Arc<dyn Middleware>>,
    }

    fn harness(access: &str, refresher: Arc<dyn TokenRefresher>) -> Harness {
        let store = Arc::new(MemorySessionStore::with_session(&Session::new(access, "R1", user())).unwrap());
        let events = SessionEvents::new();
        let coordinator = Arc::new(RefreshCoordinator::new(
            store.clone(),
            refresher,
            events.clone(),
        ));
        let stages: Vec<Arc<dyn Middleware>> = vec![
            Arc::new(BearerAuth::new(store.clone())),
            Arc::new(RefreshRetry::new(coordinator, ExpiryMarker::default())),
        ];
        Harness {
            store,
            events,
            stages,
        }
    }

    #[test]
    fn marker_requires_401_and_code() {
        let marker = ExpiryMarker::default();
        assert!(marker.matches(&ApiResponse::new(StatusCode::UNAUTHORIZED, EXPIRED)));
        assert!(!marker.matches(&ApiResponse::new(StatusCode::FORBIDDEN, EXPIRED)));
        assert!(!marker.matches(&ApiResponse::new(
            StatusCode::UNAUTHORIZED,
            r#"{"sub_status":41}"#
        )));
        assert!(!marker.matches(&ApiResponse::new(StatusCode::UNAUTHORIZED, "nope")));

        let custom = ExpiryMarker::new("code", 7);
        assert!(custom.matches(&ApiResponse::new(StatusCode::UNAUTHORIZED, r#"{"code":7}"#)));
    }

    #[tokio::test]
    async fn expired_token_refreshes_and_replays_once() {
        let refresher = FixedRefresher::ok("A2");
        let h = harness("expired", refresher.clone());
        let transport = Scripted::new(vec![(401, EXPIRED), (200, r#"{"ok":true}"#)]);

        let resp = Next::new(&transport, &h.stages)
            .run(ApiRequest::get("/users/me"))
            .await
            .unwrap();

        assert!(resp.is_success());
        assert_eq!(transport.bearers(), vec![
            Some("expired".to_string()),
            Some("A2".to_string())
        ]);
        assert_eq!(refresher.calls.load(Ordering::SeqCst), 1);
        let stored = h.store.load().unwrap().unwrap();
        assert_eq!(stored.access_token.expose_secret(), "A2");
        assert_eq!(stored.refresh_token.expose_secret(), "R1");
    }

    #[tokio::test]
    async fn refresh_failure_evicts() {
        let h = harness("expired", FixedRefresher::failing());
        let mut rx = h.events.subscribe();
        let transport = Scripted::new(vec![(401, EXPIRED)]);

        let err = Next::new(&transport, &h.stages)
            .run(ApiRequest::get("/users/me"))
            .await
            .unwrap_err();

        assert!(err.is_unauthenticated());
        assert!(h.store.is_empty());
        assert!(matches!(rx.try_recv().unwrap(), SessionEvent::Expired { .. }));
        assert!(rx.try_recv().is_err());
        assert_eq!(transport.bearers().len(), 1);
    }

    #[tokio::test]
    async fn plain_401_evicts_without_refresh() {
        let refresher = FixedRefresher::ok("A2");
        let h = harness("A1", refresher.clone());
        let transport = Scripted::new(vec![(401, r#"{"msg":"Signature verification failed"}"#)]);

        let err = Next::new(&transport, &h.stages)
            .run(ApiRequest::get("/users/me"))
            .await
            .unwrap_err();

        assert!(err.is_unauthenticated());
        assert_eq!(refresher.calls.load(Ordering::SeqCst), 0);
        assert!(h.store.is_empty());
    }

    #[tokio::test]
    async fn replay_401_does_not_refresh_again() {
        let refresher = FixedRefresher::ok("A2");
        let h = harness("expired", refresher.clone());
        let transport = Scripted::new(vec![(401, EXPIRED), (401, EXPIRED)]);

        let err = Next::new(&transport, &h.stages)
            .run(ApiRequest::get("/users/me"))
            .await
            .unwrap_err();

        assert!(err.is_unauthenticated());
        assert_eq!(refresher.calls.load(Ordering::SeqCst), 1);
        assert_eq!(transport.bearers().len(), 2);
        assert!(h.store.is_empty());
    }

    #[tokio::test]
    async fn other_errors_pass_through() {
        let refresher = FixedRefresher::ok("A2");
        let h = harness("A1", refresher.clone());
        let transport = Scripted::new(vec![(500, r#"{"message":"boom"}"#)]);

        let resp = Next::new(&transport, &h.stages)
            .run(ApiRequest::get("/exams"))
            .await
            .unwrap();

        assert_eq!(resp.status, StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(refresher.calls.load(Ordering::SeqCst), 0);
        assert!(h.store.load().unwrap().is_some());
    }

    #[tokio::test]
    async fn anonymous_401_is_returned_as_is() {
        let h = harness("A1", FixedRefresher::ok("A2"));
        let transport = Scripted::new(vec![(401, r#"{"message":"Invalid username or password"}"#)]);

        let resp = Next::new(&transport, &h.stages)
            .run(ApiRequest::post("/auth/login").anonymous())
            .await
            .unwrap();

        assert_eq!(resp.status, StatusCode::UNAUTHORIZED);
        assert!(h.store.load().unwrap().is_some());
    }

    #[tokio::test]
    async fn coordinator_reuses_superseded_token() {
        let refresher = FixedRefresher::ok("A3");
        let store = Arc::new(MemorySessionStore::with_session(&Session::new("A2", "R1", user())).unwrap());
        let coordinator = RefreshCoordinator::new(store, refresher.clone(), SessionEvents::new());

        assert_eq!(coordinator.refresh(Some("expired")).await.unwrap(), "A2");
        assert_eq!(refresher.calls.load(Ordering::SeqCst), 0);

        assert_eq!(coordinator.refresh(None).await.unwrap(), "A3");
        assert_eq!(refresher.calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn eviction_without_session_is_silent() {
        let store = Arc::new(MemorySessionStore::new());
        let events = SessionEvents::new();
        let mut rx = events.subscribe();
        let coordinator = RefreshCoordinator::new(store, FixedRefresher::ok("A2"), events);

        let err = coordinator.evict("access token rejected").await;
        assert!(err.is_unauthenticated());
        assert!(rx.try_recv().is_err());
    }

    #[tokio::test]
    async fn http_refresher_sends_refresh_token_as_bearer() {
        let transport = Arc::new(Scripted::new(vec![(
            200,
            r#"{"access_token":"A2","refresh_token":"R2"}"#,
        )]));
        let refresher = HttpRefresher::new(transport.clone(), "/auth/refresh");

        let creds = refresher.refresh("R1").await.unwrap();
        assert_eq!(creds.access_token, "A2");
        assert_eq!(creds.refresh_token.as_deref(), Some("R2"));
        assert!(creds.user.is_none());
        assert_eq!(transport.bearers(), vec![Some("R1".to_string())]);
    }

    #[tokio::test]
    async fn http_refresher_rejects_non_success() {
        let transport = Arc::new(Scripted::new(vec![(401, r#"{"msg":"Token has been revoked"}"#)]));
        let refresher = HttpRefresher::new(transport, "/auth/refresh");
        let err = refresher.refresh("R1").await.unwrap_err();
        assert_eq!(err.status(), Some(StatusCode::UNAUTHORIZED));
    }
}

use std::sync::Arc;

use {
    edulift_config::{ApiConfig, EduliftConfig},
    edulift_session::{FileSessionStore, SessionStore},
    serde::{Serialize, de::DeserializeOwned},
    tokio::sync::broadcast,
    tracing::debug,
};

use crate::{
    Error, Result,
    auth::AuthApi,
    bearer::BearerAuth,
    endpoints::{
        exams::ExamsApi, guidance::CareerGuidanceApi, talent::TalentApi,
        test_management::TestManagementApi, tests::TestsApi, users::UsersApi,
    },
    events::{SessionEvent, SessionEvents},
    middleware::{Middleware, Next},
    refresh::{ExpiryMarker, HttpRefresher, RefreshCoordinator, RefreshRetry, TokenRefresher},
    request::{ApiRequest, ApiResponse},
    transport::{HttpTransport, Transport},
};

struct Inner {
    transport: Arc<dyn Transport>,
    stages: Vec<Arc<dyn Middleware>>,
    store: Arc<dyn SessionStore>,
    coordinator: Arc<RefreshCoordinator>,
    events: SessionEvents,
    login_path: String,
}

/// Authenticated client for the EduLift backend.
///
/// Every call runs through the same pipeline: bearer attachment, then the
/// refresh-retry stage, then any extra middleware, then the transport.
/// Cloning is cheap and clones share the session store, the refresh gate and
/// the event channel.
#[derive(Clone)]
pub struct ApiClient {
    inner: Arc<Inner>,
}

impl ApiClient {
    pub fn builder(store: Arc<dyn SessionStore>) -> ApiClientBuilder {
        ApiClientBuilder::new(store)
    }

    /// Client backed by the session file and API settings from `config`.
    pub fn from_config(config: &EduliftConfig) -> Result<Self> {
        let store: Arc<dyn SessionStore> =
            Arc::new(FileSessionStore::new(config.session.resolve_path()));
        Self::builder(store).api_config(config.api.clone()).build()
    }

    /// Run `request` through the pipeline and return whatever the backend
    /// answered, including non-2xx statuses other than an unrecoverable 401.
    pub async fn send(&self, request: ApiRequest) -> Result<ApiResponse> {
        Next::new(self.inner.transport.as_ref(), &self.inner.stages)
            .run(request)
            .await
    }

    /// Like [`send`](Self::send), but non-2xx responses become
    /// [`Error::Api`].
    pub async fn request(&self, request: ApiRequest) -> Result<ApiResponse> {
        let response = self.send(request).await?;
        if response.is_success() {
            Ok(response)
        } else {
            debug!(status = response.status.as_u16(), "backend returned an error");
            Err(Error::api(response.status, response.text()))
        }
    }

    pub async fn request_json<T: DeserializeOwned>(&self, request: ApiRequest) -> Result<T> {
        self.request(request).await?.json()
    }

    pub async fn get(&self, path: &str) -> Result<ApiResponse> {
        self.request(ApiRequest::get(path)).await
    }

    pub async fn post<B: Serialize + ?Sized>(&self, path: &str, body: &B) -> Result<ApiResponse> {
        self.request(ApiRequest::post(path).json(body)?).await
    }

    pub async fn put<B: Serialize + ?Sized>(&self, path: &str, body: &B) -> Result<ApiResponse> {
        self.request(ApiRequest::put(path).json(body)?).await
    }

    pub async fn patch<B: Serialize + ?Sized>(&self, path: &str, body: &B) -> Result<ApiResponse> {
        self.request(ApiRequest::patch(path).json(body)?).await
    }

    pub async fn delete(&self, path: &str) -> Result<ApiResponse> {
        self.request(ApiRequest::delete(path)).await
    }

    pub async fn get_json<T: DeserializeOwned>(&self, path: &str) -> Result<T> {
        self.get(path).await?.json()
    }

    pub async fn post_json<B, T>(&self, path: &str, body: &B) -> Result<T>
    where
        B: Serialize + ?Sized,
        T: DeserializeOwned,
    {
        self.post(path, body).await?.json()
    }

    pub async fn put_json<B, T>(&self, path: &str, body: &B) -> Result<T>
    where
        B: Serialize + ?Sized,
        T: DeserializeOwned,
    {
        self.put(path, body).await?.json()
    }

    pub async fn patch_json<B, T>(&self, path: &str, body: &B) -> Result<T>
    where
        B: Serialize + ?Sized,
        T: DeserializeOwned,
    {
        self.patch(path, body).await?.json()
    }

    pub async fn delete_json<T: DeserializeOwned>(&self, path: &str) -> Result<T> {
        self.delete(path).await?.json()
    }

    pub fn subscribe(&self) -> broadcast::Receiver<SessionEvent> {
        self.inner.events.subscribe()
    }

    pub fn session_store(&self) -> &Arc<dyn SessionStore> {
        &self.inner.store
    }

    pub(crate) fn events(&self) -> &SessionEvents {
        &self.inner.events
    }

    pub(crate) fn coordinator(&self) -> &RefreshCoordinator {
        &self.inner.coordinator
    }

    pub(crate) fn login_path(&self) -> &str {
        &self.inner.login_path
    }

    pub fn auth(&self) -> AuthApi<'_> {
        AuthApi::new(self)
    }

    pub fn users(&self) -> UsersApi<'_> {
        UsersApi::new(self)
    }

    pub fn tests(&self) -> TestsApi<'_> {
        TestsApi::new(self)
    }

    pub fn exams(&self) -> ExamsApi<'_> {
        ExamsApi::new(self)
    }

    pub fn career_guidance(&self) -> CareerGuidanceApi<'_> {
        CareerGuidanceApi::new(self)
    }

    pub fn talent(&self) -> TalentApi<'_> {
        TalentApi::new(self)
    }

    pub fn test_management(&self) -> TestManagementApi<'_> {
        TestManagementApi::new(self)
    }
}

/// Builder for [`ApiClient`]. Only the session store is required; everything
/// else defaults from [`ApiConfig::default`].
pub struct ApiClientBuilder {
    store: Arc<dyn SessionStore>,
    api: ApiConfig,
    transport: Option<Arc<dyn Transport>>,
    refresher: Option<Arc<dyn TokenRefresher>>,
    expiry_marker: Option<ExpiryMarker>,
    middleware: Vec<Arc<dyn Middleware>>,
}

impl ApiClientBuilder {
    pub fn new(store: Arc<dyn SessionStore>) -> Self {
        Self {
            store,
            api: ApiConfig::default(),
            transport: None,
            refresher: None,
            expiry_marker: None,
            middleware: Vec::new(),
        }
    }

    /// Base URL, timeout, paths and expiry marker in one go.
    #[must_use]
    pub fn api_config(mut self, api: ApiConfig) -> Self {
        self.api = api;
        self
    }

    #[must_use]
    pub fn base_url(mut self, base_url: impl Into<String>) -> Self {
        self.api.base_url = base_url.into();
        self
    }

    #[must_use]
    pub fn timeout_secs(mut self, secs: u64) -> Self {
        self.api.timeout_secs = secs;
        self
    }

    #[must_use]
    pub fn login_path(mut self, path: impl Into<String>) -> Self {
        self.api.login_path = path.into();
        self
    }

    #[must_use]
    pub fn refresh_path(mut self, path: impl Into<String>) -> Self {
        self.api.refresh_path = path.into();
        self
    }

    /// Replace the HTTP transport (tests use in-memory fakes).
    #[must_use]
    pub fn transport(mut self, transport: Arc<dyn Transport>) -> Self {
        self.transport = Some(transport);
        self
    }

    #[must_use]
    pub fn refresher(mut self, refresher: Arc<dyn TokenRefresher>) -> Self {
        self.refresher = Some(refresher);
        self
    }

    #[must_use]
    pub fn expiry_marker(mut self, marker: ExpiryMarker) -> Self {
        self.expiry_marker = Some(marker);
        self
    }

    /// Append a stage that runs after bearer attachment and refresh-retry,
    /// just before the transport. Replays pass through it too.
    #[must_use]
    pub fn with_middleware(mut self, stage: Arc<dyn Middleware>) -> Self {
        self.middleware.push(stage);
        self
    }

    pub fn build(self) -> Result<ApiClient> {
        let transport: Arc<dyn Transport> = match self.transport {
            Some(t) => t,
            None => Arc::new(HttpTransport::from_config(&self.api)?),
        };
        let refresher = self.refresher.unwrap_or_else(|| {
            Arc::new(HttpRefresher::new(
                Arc::clone(&transport),
                self.api.refresh_path.clone(),
            ))
        });
        let marker = self
            .expiry_marker
            .unwrap_or_else(|| ExpiryMarker::from_config(&self.api.expiry_marker));

        let events = SessionEvents::new();
        let coordinator = Arc::new(RefreshCoordinator::new(
            Arc::clone(&self.store),
            refresher,
            events.clone(),
        ));

        let mut stages: Vec<Arc<dyn Middleware>> = vec![
            Arc::new(BearerAuth::new(Arc::clone(&self.store))),
            Arc::new(RefreshRetry::new(Arc::clone(&coordinator), marker)),
        ];
        stages.extend(self.middleware);

        debug!(base_url = %self.api.base_url, stages = stages.len(), "api client ready");

        Ok(ApiClient {
            inner: Arc::new(Inner {
                transport,
                stages,
                store: self.store,
                coordinator,
                events,
                login_path: self.api.login_path,
            }),
        })
    }
}

#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
mod tests {
    use std::sync::Mutex;

    use {
        async_trait::async_trait,
        edulift_session::{MemorySessionStore, Role, Session, User},
        reqwest::StatusCode,
    };

    use super::*;

    struct Fixed(u16, &'static str);

    #[async_trait]
    impl Transport for Fixed {
        async fn send(&self, _request: &ApiRequest) -> Result<ApiResponse> {
            Ok(ApiResponse::new(
                StatusCode::from_u16(self.0).unwrap(),
                self.1.as_bytes().to_vec(),
            ))
        }
    }

    /// Extra stage that tags requests so the transport can see it ran.
    #[derive(Default)]
    struct Tagger {
        calls: Mutex<usize>,
    }

    #[async_trait]
    impl Middleware for Tagger {
        async fn handle(&self, request: ApiRequest, next: Next<'_>) -> Result<ApiResponse> {
            *self.calls.lock().unwrap() += 1;
            next.run(request.header("x-edulift-trace", "1")?).await
        }
    }

    fn store() -> Arc<MemorySessionStore> {
        Arc::new(
            MemorySessionStore::with_session(&Session::new("A1", "R1", User {
                id: 1,
                username: "admin@edulift.com".into(),
                email: "admin@edulift.com".into(),
                first_name: "Admin".into(),
                last_name: "User".into(),
                role: Role::Admin,
                is_active: true,
                created_at: None,
                updated_at: None,
            }))
            .unwrap(),
        )
    }

    #[tokio::test]
    async fn non_success_becomes_api_error() {
        let client = ApiClient::builder(store())
            .transport(Arc::new(Fixed(404, r#"{"message":"Exam not found"}"#)))
            .build()
            .unwrap();

        let err = client.get("/exams/99").await.unwrap_err();
        assert_eq!(err.status(), Some(StatusCode::NOT_FOUND));
        assert_eq!(err.api_message().as_deref(), Some("Exam not found"));

        // `send` hands back the raw response instead
        let resp = client.send(ApiRequest::get("/exams/99")).await.unwrap();
        assert_eq!(resp.status, StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn json_helpers_decode() {
        let client = ApiClient::builder(store())
            .transport(Arc::new(Fixed(200, r#"{"careers":["Engineer"]}"#)))
            .build()
            .unwrap();
        let value: serde_json::Value = client.get_json("/career-guidance/careers").await.unwrap();
        assert_eq!(value["careers"][0], "Engineer");
    }

    #[tokio::test]
    async fn extra_middleware_runs_last() {
        let tagger = Arc::new(Tagger::default());
        let client = ApiClient::builder(store())
            .transport(Arc::new(Fixed(200, "{}")))
            .with_middleware(tagger.clone())
            .build()
            .unwrap();

        client.get("/users/me").await.unwrap();
        client.clone().get("/users/me").await.unwrap();
        assert_eq!(*tagger.calls.lock().unwrap(), 2);
    }

    #[test]
    fn builder_rejects_bad_base_url() {
        let result = ApiClient::builder(store()).base_url("::nope::").build();
        assert!(result.is_err());
    }

    #[test]
    fn client_is_send_sync_clone() {
        fn assert_traits<T: Send + Sync + Clone>() {}
        assert_traits::<ApiClient>();
    }
}

use std::sync::Arc;

use {async_trait::async_trait, edulift_session::SessionStore, secrecy::ExposeSecret};

use crate::{
    Result,
    middleware::{Middleware, Next},
    request::{ApiRequest, ApiResponse},
};

/// Attaches `Authorization: Bearer <access token>` from the session store.
///
/// The store is read on every request so the header always reflects the
/// most recently stored credential. Anonymous requests and requests made
/// without a session pass through untouched.
pub struct BearerAuth {
    store: Arc<dyn SessionStore>,
}

impl BearerAuth {
    pub fn new(store: Arc<dyn SessionStore>) -> Self {
        Self { store }
    }
}

#[async_trait]
impl Middleware for BearerAuth {
    async fn handle(&self, mut request: ApiRequest, next: Next<'_>) -> Result<ApiResponse> {
        if !request.is_anonymous()
            && let Some(session) = self.store.load()?
        {
            request.set_bearer(session.access_token.expose_secret())?;
        }
        next.run(request).await
    }
}

#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
mod tests {
    use std::sync::Mutex;

    use {
        edulift_session::{MemorySessionStore, Role, Session, User},
        reqwest::StatusCode,
    };

    use {super::*, crate::transport::Transport};

    #[derive(Default)]
    struct Capture {
        bearer: Mutex<Option<Option<String>>>,
    }

    #[async_trait]
    impl Transport for Capture {
        async fn send(&self, request: &ApiRequest) -> Result<ApiResponse> {
            *self.bearer.lock().unwrap() = Some(request.bearer_token().map(str::to_string));
            Ok(ApiResponse::new(StatusCode::OK, Vec::new()))
        }
    }

    fn session(access: &str) -> Session {
        Session::new(access, "R1", User {
            id: 2,
            username: "teacher@edulift.com".into(),
            email: "teacher@edulift.com".into(),
            first_name: "Kamala".into(),
            last_name: "Silva".into(),
            role: Role::Teacher,
            is_active: true,
            created_at: None,
            updated_at: None,
        })
    }

    async fn run(store: Arc<dyn SessionStore>, request: ApiRequest) -> Option<String> {
        let transport = Capture::default();
        let stages: Vec<Arc<dyn Middleware>> = vec![Arc::new(BearerAuth::new(store))];
        Next::new(&transport, &stages).run(request).await.unwrap();
        transport.bearer.lock().unwrap().clone().unwrap()
    }

    #[tokio::test]
    async fn attaches_stored_token() {
        let store = Arc::new(MemorySessionStore::with_session(&session("A1")).unwrap());
        assert_eq!(
            run(store, ApiRequest::get("/users/me")).await.as_deref(),
            Some("A1")
        );
    }

    #[tokio::test]
    async fn picks_up_latest_token() {
        let store = Arc::new(MemorySessionStore::with_session(&session("A1")).unwrap());
        store.save(&session("A2")).unwrap();
        assert_eq!(
            run(store, ApiRequest::get("/users/me")).await.as_deref(),
            Some("A2")
        );
    }

    #[tokio::test]
    async fn no_session_no_header() {
        let store = Arc::new(MemorySessionStore::new());
        assert!(run(store, ApiRequest::get("/careers")).await.is_none());
    }

    #[tokio::test]
    async fn anonymous_requests_are_left_alone() {
        let store = Arc::new(MemorySessionStore::with_session(&session("A1")).unwrap());
        let request = ApiRequest::post("/auth/login").anonymous();
        assert!(run(store, request).await.is_none());
    }
}

use {
    edulift_session::{Role, Session, User},
    serde::{Deserialize, Serialize},
    tracing::info,
};

use crate::{
    ApiClient, Error, Result,
    events::SessionEvent,
    request::ApiRequest,
};

#[derive(Debug, Deserialize)]
struct LoginResponse {
    access_token: String,
    refresh_token: String,
    user: User,
}

/// Fields accepted by `POST /auth/register`.
#[derive(Debug, Clone, Serialize)]
pub struct Registration {
    pub username: String,
    pub email: String,
    pub password: String,
    pub first_name: String,
    pub last_name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub role: Option<Role>,
}

/// Session lifecycle: login, logout, explicit refresh, password flows.
pub struct AuthApi<'a> {
    client: &'a ApiClient,
}

impl<'a> AuthApi<'a> {
    pub(crate) fn new(client: &'a ApiClient) -> Self {
        Self { client }
    }

    /// Exchange credentials for a session and store it.
    ///
    /// Bad credentials (401) and inactive accounts (403) come back as
    /// [`Error::Api`]; the stored session is left as it was.
    pub async fn login(&self, username: &str, password: &str) -> Result<User> {
        let request = ApiRequest::post(self.client.login_path())
            .json(&serde_json::json!({ "username": username, "password": password }))?
            .anonymous();
        let login: LoginResponse = self.client.request_json(request).await?;

        let session = Session::new(login.access_token, login.refresh_token, login.user);
        self.client.session_store().save(&session)?;

        info!(user = %session.user.username, role = %session.user.role, "logged in");
        self.client.events().emit(SessionEvent::LoggedIn {
            username: session.user.username.clone(),
        });
        Ok(session.user)
    }

    /// Forget the stored session. The backend keeps no server-side session,
    /// so nothing is sent.
    pub fn logout(&self) -> Result<()> {
        self.client.session_store().clear()?;
        info!("logged out");
        self.client.events().emit(SessionEvent::LoggedOut);
        Ok(())
    }

    /// Cached user of the stored session, without a network call.
    pub fn current_user(&self) -> Result<Option<User>> {
        Ok(self.client.session_store().load()?.map(|s| s.user))
    }

    pub fn is_logged_in(&self) -> Result<bool> {
        Ok(self.client.session_store().load()?.is_some())
    }

    /// Force a refresh now. A failure is returned to the caller and does not
    /// clear the session.
    pub async fn refresh(&self) -> Result<()> {
        self.client.coordinator().refresh(None).await.map(|_| ())
    }

    pub async fn register(&self, registration: &Registration) -> Result<serde_json::Value> {
        let request = ApiRequest::post("/auth/register")
            .json(registration)?
            .anonymous();
        self.client.request_json(request).await
    }

    pub async fn forgot_password(&self, email: &str) -> Result<serde_json::Value> {
        let request = ApiRequest::post("/auth/forgot-password")
            .json(&serde_json::json!({ "email": email }))?
            .anonymous();
        self.client.request_json(request).await
    }

    /// Complete a reset with the token from the reset mail.
    pub async fn reset_password(&self, token: &str, password: &str) -> Result<serde_json::Value> {
        let request = ApiRequest::post("/auth/reset-password")
            .json(&serde_json::json!({ "token": token, "password": password }))?
            .anonymous();
        self.client.request_json(request).await
    }

    pub async fn change_password(
        &self,
        current_password: &str,
        new_password: &str,
    ) -> Result<serde_json::Value> {
        if new_password.is_empty() {
            return Err(Error::message("new password must not be empty"));
        }
        self.client
            .post_json(
                "/auth/change-password",
                &serde_json::json!({
                    "current_password": current_password,
                    "new_password": new_password,
                }),
            )
            .await
    }
}

use {
    edulift_session::{Role, User},
    serde::{Deserialize, Serialize},
};

use crate::{ApiClient, Result, request::ApiRequest};

/// The backend wraps records (`{"user": {...}}`, `{"users": [...]}`) on most
/// routes but not all; both shapes are accepted.
#[derive(Deserialize)]
#[serde(untagged)]
enum UserPayload {
    Wrapped { user: User },
    Bare(User),
}

impl From<UserPayload> for User {
    fn from(payload: UserPayload) -> Self {
        match payload {
            UserPayload::Wrapped { user } | UserPayload::Bare(user) => user,
        }
    }
}

#[derive(Deserialize)]
#[serde(untagged)]
enum UserListPayload {
    Wrapped { users: Vec<User> },
    Bare(Vec<User>),
}

/// Listing filters for `GET /users`.
#[derive(Debug, Clone, Default)]
pub struct UserQuery {
    pub role: Option<Role>,
    pub search: Option<String>,
    pub is_active: Option<bool>,
}

#[derive(Debug, Clone, Serialize)]
pub struct NewUser {
    pub username: String,
    pub email: String,
    pub password: String,
    pub first_name: String,
    pub last_name: String,
    pub role: Role,
}

/// Partial update; unset fields are left alone by the backend.
#[derive(Debug, Clone, Default, Serialize)]
pub struct UserUpdate {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub first_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub password: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub role: Option<Role>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub is_active: Option<bool>,
}

pub struct UsersApi<'a> {
    client: &'a ApiClient,
}

impl<'a> UsersApi<'a> {
    pub(crate) fn new(client: &'a ApiClient) -> Self {
        Self { client }
    }

    pub async fn me(&self) -> Result<User> {
        let payload: UserPayload = self.client.get_json("/users/me").await?;
        Ok(payload.into())
    }

    pub async fn update_profile(&self, update: &UserUpdate) -> Result<User> {
        let payload: UserPayload = self.client.put_json("/users/me", update).await?;
        Ok(payload.into())
    }

    /// Admin and teacher only.
    pub async fn list(&self, query: &UserQuery) -> Result<Vec<User>> {
        let mut request = ApiRequest::get("/users");
        if let Some(role) = query.role {
            request = request.query("role", role);
        }
        if let Some(search) = &query.search {
            request = request.query("search", search);
        }
        if let Some(active) = query.is_active {
            request = request.query("is_active", active);
        }
        Ok(match self.client.request_json(request).await? {
            UserListPayload::Wrapped { users } | UserListPayload::Bare(users) => users,
        })
    }

    pub async fn get(&self, id: i64) -> Result<User> {
        let payload: UserPayload = self.client.get_json(&format!("/users/{id}")).await?;
        Ok(payload.into())
    }

    pub async fn create(&self, user: &NewUser) -> Result<User> {
        let payload: UserPayload = self.client.post_json("/users", user).await?;
        Ok(payload.into())
    }

    pub async fn update(&self, id: i64, update: &UserUpdate) -> Result<User> {
        let payload: UserPayload = self
            .client
            .put_json(&format!("/users/{id}"), update)
            .await?;
        Ok(payload.into())
    }

    pub async fn delete(&self, id: i64) -> Result<()> {
        self.client.delete(&format!("/users/{id}")).await.map(|_| ())
    }

    pub async fn update_role(&self, id: i64, role: Role) -> Result<User> {
        let payload: UserPayload = self
            .client
            .put_json(
                &format!("/users/{id}/role"),
                &serde_json::json!({ "role": role }),
            )
            .await?;
        Ok(payload.into())
    }

    pub async fn set_active(&self, id: i64, is_active: bool) -> Result<User> {
        let payload: UserPayload = self
            .client
            .put_json(
                &format!("/users/{id}/status"),
                &serde_json::json!({ "is_active": is_active }),
            )
            .await?;
        Ok(payload.into())
    }
}

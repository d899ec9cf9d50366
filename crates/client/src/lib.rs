//! Authenticated HTTP client for the EduLift backend.
//!
//! Requests pass through a middleware pipeline that attaches the stored
//! access token, refreshes it once when the backend reports it expired, and
//! clears the session when no valid credential can be obtained.

pub mod auth;
pub mod bearer;
pub mod client;
pub mod endpoints;
pub mod error;
pub mod events;
pub mod middleware;
pub mod refresh;
pub mod request;
pub mod transport;

pub use {
    auth::{AuthApi, Registration},
    bearer::BearerAuth,
    client::{ApiClient, ApiClientBuilder},
    endpoints::{
        ListFilter,
        users::{NewUser, UserQuery, UserUpdate},
    },
    error::{Context, Error, Result},
    events::{SessionEvent, SessionEvents},
    middleware::{Middleware, Next},
    refresh::{
        ExpiryMarker, HttpRefresher, RefreshCoordinator, RefreshRetry, RefreshedCredentials,
        TokenRefresher,
    },
    request::{ApiRequest, ApiResponse},
    transport::{HttpTransport, Transport},
};

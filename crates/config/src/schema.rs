/// Config schema types (API endpoint, credential expiry marker, session storage).
use std::path::PathBuf;

use serde::{Deserialize, Serialize};

/// Root configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct EduliftConfig {
    pub api: ApiConfig,
    pub session: SessionConfig,
}

/// Backend API connection settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ApiConfig {
    /// Base URL every request path is joined onto. Defaults to
    /// `http://localhost:5000/api`.
    pub base_url: String,
    /// Per-request timeout in seconds, covering connect and body read.
    pub timeout_secs: u64,
    /// Optional `User-Agent` override.
    pub user_agent: Option<String>,
    pub login_path: String,
    pub refresh_path: String,
    pub expiry_marker: ExpiryMarkerConfig,
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            base_url: "http://localhost:5000/api".into(),
            timeout_secs: 30,
            user_agent: None,
            login_path: "/auth/login".into(),
            refresh_path: "/auth/refresh".into(),
            expiry_marker: ExpiryMarkerConfig::default(),
        }
    }
}

/// How the backend flags an expired (as opposed to invalid) access token.
///
/// A 401 response is treated as "expired" when its JSON body carries `field`
/// with the numeric value `code`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ExpiryMarkerConfig {
    pub field: String,
    pub code: i64,
}

impl Default for ExpiryMarkerConfig {
    fn default() -> Self {
        Self {
            field: "sub_status".into(),
            code: 42,
        }
    }
}

/// Where the session (tokens + cached user) is persisted.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct SessionConfig {
    /// Explicit session file. When unset, `<data_dir>/session.json` is used.
    pub path: Option<PathBuf>,
}

impl SessionConfig {
    /// Resolve the session file path, falling back to the data directory.
    pub fn resolve_path(&self) -> PathBuf {
        self.path
            .clone()
            .unwrap_or_else(|| crate::loader::data_dir().join("session.json"))
    }
}

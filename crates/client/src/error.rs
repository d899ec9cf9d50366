use std::error::Error as StdError;

use {edulift_common::FromMessage, reqwest::StatusCode};

/// Failures surfaced by [`crate::ApiClient`].
///
/// The client recovers locally only from an expired access token (one
/// refresh, one replay). Everything else reaches the caller through one of
/// these variants.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// Transport failure: no response was obtained.
    #[error("network error: {context}: {source}")]
    Network {
        context: String,
        #[source]
        source: Box<dyn StdError + Send + Sync>,
    },
    /// No valid session could be established, even after a refresh.
    #[error("not authenticated: {reason}")]
    Unauthenticated { reason: String },
    /// Any other non-2xx response, with the backend's status and payload.
    #[error("api error (HTTP {status}): {}", summarize_body(.body))]
    Api { status: StatusCode, body: String },
    #[error(transparent)]
    Session(#[from] edulift_session::Error),
    #[error(transparent)]
    SerdeJson(#[from] serde_json::Error),
    #[error(transparent)]
    UrlParse(#[from] url::ParseError),
    #[error("{message}")]
    Message { message: String },
}

impl Error {
    #[must_use]
    pub fn message(message: impl Into<String>) -> Self {
        Self::Message {
            message: message.into(),
        }
    }

    #[must_use]
    pub fn network<E>(context: impl Into<String>, source: E) -> Self
    where
        E: StdError + Send + Sync + 'static,
    {
        Self::Network {
            context: context.into(),
            source: Box::new(source),
        }
    }

    #[must_use]
    pub fn unauthenticated(reason: impl Into<String>) -> Self {
        Self::Unauthenticated {
            reason: reason.into(),
        }
    }

    #[must_use]
    pub fn api(status: StatusCode, body: impl Into<String>) -> Self {
        Self::Api {
            status,
            body: body.into(),
        }
    }

    pub fn is_unauthenticated(&self) -> bool {
        matches!(self, Self::Unauthenticated { .. })
    }

    pub fn is_network(&self) -> bool {
        matches!(self, Self::Network { .. })
    }

    /// HTTP status for backend-reported failures.
    pub fn status(&self) -> Option<StatusCode> {
        match self {
            Self::Api { status, .. } => Some(*status),
            _ => None,
        }
    }

    /// Human-readable message from the backend payload (`message`, `msg` or
    /// `error` field), when there is one.
    pub fn api_message(&self) -> Option<String> {
        match self {
            Self::Api { body, .. } => backend_message(body),
            _ => None,
        }
    }
}

impl FromMessage for Error {
    fn from_message(message: String) -> Self {
        Self::Message { message }
    }
}

pub type Result<T> = std::result::Result<T, Error>;

edulift_common::impl_context!();

fn backend_message(body: &str) -> Option<String> {
    let value: serde_json::Value = serde_json::from_str(body).ok()?;
    ["message", "msg", "error"]
        .iter()
        .find_map(|key| value.get(key).and_then(serde_json::Value::as_str))
        .map(ToString::to_string)
}

fn summarize_body(body: &str) -> String {
    if let Some(message) = backend_message(body) {
        return message;
    }
    let trimmed = body.trim();
    if trimmed.is_empty() {
        return "<empty body>".into();
    }
    trimmed.chars().take(200).collect()
}

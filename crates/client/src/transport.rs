use std::time::Duration;

use {
    async_trait::async_trait,
    edulift_config::ApiConfig,
    reqwest::header::{CONTENT_TYPE, HeaderMap, HeaderValue},
    tracing::debug,
    url::Url,
};

use crate::{
    Error, Result,
    request::{ApiRequest, ApiResponse},
};

/// The last stage of the pipeline: puts a request on the wire.
///
/// Non-2xx statuses are returned as responses, not errors; only failures to
/// obtain a response at all are errors.
#[async_trait]
pub trait Transport: Send + Sync {
    async fn send(&self, request: &ApiRequest) -> Result<ApiResponse>;
}

/// `reqwest`-backed transport rooted at a base URL.
#[derive(Debug, Clone)]
pub struct HttpTransport {
    client: reqwest::Client,
    base_url: String,
}

impl HttpTransport {
    pub fn new(base_url: &str, timeout: Duration) -> Result<Self> {
        Self::build(base_url, timeout, None)
    }

    pub fn from_config(config: &ApiConfig) -> Result<Self> {
        Self::build(
            &config.base_url,
            Duration::from_secs(config.timeout_secs),
            config.user_agent.as_deref(),
        )
    }

    fn build(base_url: &str, timeout: Duration, user_agent: Option<&str>) -> Result<Self> {
        // Validate once up front so per-request joins only fail on bad paths.
        Url::parse(base_url)?;

        let mut headers = HeaderMap::new();
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));

        let client = reqwest::Client::builder()
            .default_headers(headers)
            .user_agent(
                user_agent
                    .map(str::to_owned)
                    .unwrap_or_else(|| format!("edulift-client/{}", env!("CARGO_PKG_VERSION"))),
            )
            .timeout(timeout)
            .build()
            .map_err(|e| Error::network("building HTTP client", e))?;

        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Join a request path onto the base URL, keeping the base path prefix
    /// (`http://host/api` + `/users/me` -> `http://host/api/users/me`).
    /// Absolute URLs pass through untouched.
    pub fn url_for(&self, path: &str) -> Result<Url> {
        if path.starts_with("http://") || path.starts_with("https://") {
            return Ok(Url::parse(path)?);
        }
        let joined = format!("{}/{}", self.base_url, path.trim_start_matches('/'));
        Ok(Url::parse(&joined)?)
    }
}

#[async_trait]
impl Transport for HttpTransport {
    async fn send(&self, request: &ApiRequest) -> Result<ApiResponse> {
        let url = self.url_for(&request.path)?;
        let target = format!("{} {}", request.method, request.path);

        let mut builder = self
            .client
            .request(request.method.clone(), url)
            .headers(request.headers.clone());
        if !request.query.is_empty() {
            builder = builder.query(&request.query);
        }
        if let Some(body) = &request.body {
            builder = builder.json(body);
        }

        let response = builder
            .send()
            .await
            .map_err(|e| Error::network(target.clone(), e))?;

        let status = response.status();
        let headers = response.headers().clone();
        let body = response
            .bytes()
            .await
            .map_err(|e| Error::network(format!("{target}: reading body"), e))?
            .to_vec();

        debug!(
            method = %request.method,
            path = %request.path,
            status = status.as_u16(),
            retried = request.is_retried(),
            "request completed"
        );

        Ok(ApiResponse {
            status,
            headers,
            body,
        })
    }
}

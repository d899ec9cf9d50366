use std::path::{Path, PathBuf};

use {
    anyhow::{Context, Result},
    clap::Args,
    edulift_client::{ApiClient, ApiRequest},
    reqwest::Method,
};

#[derive(Args)]
pub struct RequestArgs {
    /// HTTP method (GET, POST, PUT, PATCH, DELETE).
    pub method: String,
    /// Path below the API base URL, e.g. `/users/me`.
    pub path: String,
    /// Inline JSON body.
    #[arg(long, conflicts_with = "body_file")]
    pub body: Option<String>,
    /// Read the JSON body from a file.
    #[arg(long)]
    pub body_file: Option<PathBuf>,
    /// Query parameter as `key=value`; repeatable.
    #[arg(long = "query", short = 'q')]
    pub query: Vec<String>,
}

pub async fn handle_request(client: &ApiClient, args: RequestArgs) -> Result<()> {
    let method = parse_method(&args.method)?;
    let mut request = ApiRequest::new(method, args.path);

    for pair in &args.query {
        let (key, value) = split_query(pair)?;
        request = request.query(key, value);
    }

    let body = match (args.body, args.body_file) {
        (Some(inline), _) => Some(parse_body(&inline)?),
        (None, Some(path)) => Some(read_body(&path)?),
        (None, None) => None,
    };
    if let Some(body) = body {
        request = request.with_body(body);
    }

    let response = client.request(request).await?;
    match response.json_value() {
        Some(value) => println!("{}", serde_json::to_string_pretty(&value)?),
        None => println!("{}", response.text()),
    }
    Ok(())
}

fn parse_method(raw: &str) -> Result<Method> {
    Method::from_bytes(raw.trim().to_ascii_uppercase().as_bytes())
        .with_context(|| format!("invalid HTTP method: {raw}"))
}

fn split_query(pair: &str) -> Result<(&str, &str)> {
    pair.split_once('=')
        .filter(|(key, _)| !key.is_empty())
        .with_context(|| format!("query parameter must be key=value, got {pair:?}"))
}

pub(crate) fn parse_body(raw: &str) -> Result<serde_json::Value> {
    serde_json::from_str(raw).context("body is not valid JSON")
}

pub(crate) fn read_body(path: &Path) -> Result<serde_json::Value> {
    let raw = std::fs::read_to_string(path)
        .with_context(|| format!("reading {}", path.display()))?;
    serde_json::from_str(&raw).with_context(|| format!("{} is not valid JSON", path.display()))
}

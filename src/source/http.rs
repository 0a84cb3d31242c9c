//! HTTP-backed remote source
//!
//! Turns a [`SourceDef`] into a [`RemoteSource`]: builds the request for a
//! stream, maps [`FetchOptions`] onto headers and query parameters, applies
//! bearer credentials, classifies the response status, and extracts the
//! records from the body.

use async_trait::async_trait;
use reqwest::{Client, Response, StatusCode};
use serde_json::Value;
use std::collections::HashMap;
use std::time::Duration;
use tracing::debug;

use super::rate_limit::{RateLimiter, RateLimiterConfig};
use super::types::{FetchOptions, RemoteSource};
use crate::auth::CredentialStore;
use crate::catalog::{ParamLocation, SourceDef};
use crate::error::{Error, Result};
use crate::types::{format_timestamp, Batch};

// ============================================================================
// Configuration
// ============================================================================

/// Configuration for the HTTP source
#[derive(Debug, Clone)]
pub struct HttpSourceConfig {
    /// Request timeout
    pub timeout: Duration,
    /// User agent string
    pub user_agent: String,
    /// Rate limiter configuration; `None` disables limiting
    pub rate_limit: Option<RateLimiterConfig>,
    /// Extra headers for all requests
    pub default_headers: HashMap<String, String>,
}

impl Default for HttpSourceConfig {
    fn default() -> Self {
        Self {
            timeout: Duration::from_secs(30),
            user_agent: format!("pullkit/{}", env!("CARGO_PKG_VERSION")),
            rate_limit: Some(RateLimiterConfig::default()),
            default_headers: HashMap::new(),
        }
    }
}

impl HttpSourceConfig {
    /// Create a new config builder
    pub fn builder() -> HttpSourceConfigBuilder {
        HttpSourceConfigBuilder::default()
    }
}

/// Builder for HTTP source config
#[derive(Default)]
pub struct HttpSourceConfigBuilder {
    config: HttpSourceConfig,
}

impl HttpSourceConfigBuilder {
    /// Set the request timeout
    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.config.timeout = timeout;
        self
    }

    /// Set the user agent
    pub fn user_agent(mut self, agent: impl Into<String>) -> Self {
        self.config.user_agent = agent.into();
        self
    }

    /// Set the rate limiter
    pub fn rate_limit(mut self, config: RateLimiterConfig) -> Self {
        self.config.rate_limit = Some(config);
        self
    }

    /// Disable rate limiting
    pub fn no_rate_limit(mut self) -> Self {
        self.config.rate_limit = None;
        self
    }

    /// Add a default header
    pub fn header(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.config.default_headers.insert(key.into(), value.into());
        self
    }

    /// Build the config
    pub fn build(self) -> HttpSourceConfig {
        self.config
    }
}

// ============================================================================
// HTTP Source
// ============================================================================

/// Remote source over HTTP.
pub struct HttpSource {
    source: SourceDef,
    credentials: CredentialStore,
    client: Client,
    config: HttpSourceConfig,
    rate_limiter: Option<RateLimiter>,
}

impl HttpSource {
    /// Create a source with default configuration
    pub fn new(source: SourceDef, credentials: CredentialStore) -> Self {
        Self::with_config(source, credentials, HttpSourceConfig::default())
    }

    /// Create a source with custom configuration
    pub fn with_config(
        source: SourceDef,
        credentials: CredentialStore,
        config: HttpSourceConfig,
    ) -> Self {
        let client = Client::builder()
            .timeout(config.timeout)
            .user_agent(&config.user_agent)
            .build()
            .expect("Failed to build HTTP client");

        let rate_limiter = config.rate_limit.as_ref().map(RateLimiter::new);

        Self {
            source,
            credentials,
            client,
            config,
            rate_limiter,
        }
    }

    /// The source definition
    pub fn source(&self) -> &SourceDef {
        &self.source
    }

    /// Check if rate limiting is enabled
    pub fn has_rate_limiter(&self) -> bool {
        self.rate_limiter.is_some()
    }

    /// Build full URL from a stream path
    fn build_url(&self, path: &str) -> String {
        if path.starts_with("http://") || path.starts_with("https://") {
            return path.to_string();
        }

        let base = self.source.base_url.trim_end_matches('/');
        let path = path.trim_start_matches('/');
        format!("{base}/{path}")
    }
}

#[async_trait]
impl RemoteSource for HttpSource {
    async fn fetch(&self, stream: &str, options: &FetchOptions) -> Result<Batch> {
        let spec = self.source.stream(stream).ok_or_else(|| Error::StreamNotFound {
            stream: stream.to_string(),
        })?;

        if let Some(ref limiter) = self.rate_limiter {
            limiter.wait().await;
        }

        let url = self.build_url(&spec.path);
        let mut req = self.client.get(&url);

        for (key, value) in &self.source.headers {
            req = req.header(key.as_str(), value.as_str());
        }
        for (key, value) in &self.config.default_headers {
            req = req.header(key.as_str(), value.as_str());
        }
        for (key, value) in &spec.headers {
            req = req.header(key.as_str(), value.as_str());
        }

        // Read per request so a credential refresh mid-run takes effect.
        if let Some(token) = self.credentials.access_token().await {
            req = req.bearer_auth(token);
        }

        let mut query: Vec<(String, String)> = Vec::new();
        if let Some(since) = options.since {
            let stamp = format_timestamp(since);
            match self.source.since.location {
                ParamLocation::Header => {
                    req = req.header(self.source.since.name.as_str(), stamp);
                }
                ParamLocation::Query => {
                    query.push((self.source.since.name.clone(), stamp));
                }
            }
        }
        if let Some(ref order) = options.order_by {
            query.push((self.source.order_param.clone(), order.clone()));
        }
        if let Some(page) = options.page {
            query.push((spec.page_param.clone(), page.to_string()));
        }
        if let Some(offset) = options.offset {
            query.push((spec.offset_param.clone(), offset.to_string()));
        }
        if !query.is_empty() {
            req = req.query(&query);
        }

        let response = req.send().await.map_err(Error::Http)?;
        let status = response.status();

        if status == StatusCode::UNAUTHORIZED {
            let body = response.text().await.unwrap_or_default();
            return Err(Error::unauthorized(body));
        }

        if status == StatusCode::TOO_MANY_REQUESTS || status == StatusCode::SERVICE_UNAVAILABLE {
            let retry_after = extract_retry_after(&response);
            return Err(Error::rate_limited(status.as_u16(), retry_after));
        }

        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(Error::http_status(status.as_u16(), body));
        }

        debug!(stream, url = %url, "fetch succeeded");
        let body = response.text().await.map_err(Error::Http)?;
        extract_records(&body, spec.record_path.as_deref())
    }
}

impl std::fmt::Debug for HttpSource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HttpSource")
            .field("source", &self.source.name)
            .field("config", &self.config)
            .field("has_rate_limiter", &self.rate_limiter.is_some())
            .finish_non_exhaustive()
    }
}

// ============================================================================
// Record Extraction
// ============================================================================

/// Extract the `Retry-After` header value in seconds, when present
fn extract_retry_after(response: &Response) -> Option<u64> {
    response
        .headers()
        .get("retry-after")
        .and_then(|v| v.to_str().ok())
        .and_then(|s| s.parse().ok())
}

/// Extract records from a response body.
///
/// `record_path` is a dot-separated key path, or a JSONPath expression when
/// it contains a wildcard. Without a path, an array body is the batch and
/// any other body is a one-record batch. A JSON `null` at the path is an
/// empty batch; an absent path is an error, because treating it as empty
/// would silently end a paged sweep on a malformed response.
fn extract_records(body: &str, record_path: Option<&str>) -> Result<Batch> {
    let value: Value = serde_json::from_str(body).map_err(|e| {
        Error::record_extraction(
            record_path.unwrap_or("$"),
            format!("Failed to parse JSON: {e}"),
        )
    })?;

    match record_path {
        Some(path) if path.contains('*') => extract_with_jsonpath(&value, path),
        Some(path) => match extract_simple_path(&value, path) {
            Some(Value::Array(arr)) => Ok(arr),
            Some(Value::Null) => Ok(vec![]),
            Some(other) => Ok(vec![other]),
            None => Err(Error::record_extraction(path, "path not found in response")),
        },
        None => match value {
            Value::Array(arr) => Ok(arr),
            Value::Null => Ok(vec![]),
            other => Ok(vec![other]),
        },
    }
}

/// Walk a dot-separated key path
fn extract_simple_path(value: &Value, path: &str) -> Option<Value> {
    let path = path.strip_prefix("$.").unwrap_or(path);

    let mut current = value;
    for part in path.split('.') {
        current = current.get(part)?;
    }

    Some(current.clone())
}

/// Extract records using jsonpath-rust
fn extract_with_jsonpath(value: &Value, path: &str) -> Result<Batch> {
    use jsonpath_rust::JsonPath;

    let jp = JsonPath::try_from(path)
        .map_err(|e| Error::record_extraction(path, format!("Invalid JSONPath: {e}")))?;

    match jp.find(value) {
        Value::Array(arr) => Ok(arr),
        Value::Null => Ok(vec![]),
        other => Ok(vec![other]),
    }
}

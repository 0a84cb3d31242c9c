//! Error types for pullkit
//!
//! This module defines the error hierarchy for the entire engine.
//! All public APIs return `Result<T, Error>` where Error is defined here.

use thiserror::Error;

/// The main error type for pullkit
#[derive(Error, Debug)]
pub enum Error {
    // ============================================================================
    // Configuration Errors
    // ============================================================================
    #[error("Configuration error: {message}")]
    Config { message: String },

    #[error("Missing required config field: {field}")]
    MissingConfigField { field: String },

    #[error("Invalid config value for '{field}': {message}")]
    InvalidConfigValue { field: String, message: String },

    #[error("Failed to parse YAML: {0}")]
    YamlParse(#[from] serde_yaml::Error),

    #[error("Failed to parse JSON: {0}")]
    JsonParse(#[from] serde_json::Error),

    // ============================================================================
    // Authentication Errors
    // ============================================================================
    #[error("Authentication failed: {message}")]
    Auth { message: String },

    #[error("Token refresh failed: {message}")]
    TokenRefresh { message: String },

    #[error("Unauthorized: {body}")]
    Unauthorized { body: String },

    // ============================================================================
    // HTTP Errors
    // ============================================================================
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("HTTP {status}: {body}")]
    HttpStatus { status: u16, body: String },

    #[error("Rate limited (HTTP {status})")]
    RateLimited {
        status: u16,
        retry_after_seconds: Option<u64>,
    },

    #[error("Invalid URL: {0}")]
    InvalidUrl(#[from] url::ParseError),

    // ============================================================================
    // Data Errors
    // ============================================================================
    #[error("Failed to extract records from path '{path}': {message}")]
    RecordExtraction { path: String, message: String },

    #[error("Invalid cursor value '{value}': {message}")]
    InvalidCursor { value: String, message: String },

    #[error("Stream '{stream}' record is missing field '{field}'")]
    MissingRecordField { stream: String, field: String },

    #[error("Stream '{stream}' exceeded {pages} pages in a single run")]
    RunawayPagination { stream: String, pages: u64 },

    // ============================================================================
    // State Errors
    // ============================================================================
    #[error("State error: {message}")]
    State { message: String },

    #[error("Stream '{stream}' not found in source definition")]
    StreamNotFound { stream: String },

    // ============================================================================
    // I/O Errors
    // ============================================================================
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    // ============================================================================
    // Generic Errors
    // ============================================================================
    #[error("{0}")]
    Other(String),

    #[error(transparent)]
    Anyhow(#[from] anyhow::Error),
}

/// How a failed fetch attempt should be handled.
///
/// Retry handling is driven by matching on this value rather than by
/// catching error types mid-flight, so the full decision table lives in
/// [`Error::retry_class`] and nowhere else.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RetryClass {
    /// Back off exponentially and try again, up to the attempt budget.
    RateLimited,
    /// Refresh credentials once and retry immediately; fatal thereafter.
    Unauthorized,
    /// Surface to the caller; the stream cannot make progress.
    Fatal,
}

impl Error {
    /// Create a config error
    pub fn config(message: impl Into<String>) -> Self {
        Self::Config {
            message: message.into(),
        }
    }

    /// Create a missing field error
    pub fn missing_field(field: impl Into<String>) -> Self {
        Self::MissingConfigField {
            field: field.into(),
        }
    }

    /// Create an invalid config value error
    pub fn invalid_value(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self::InvalidConfigValue {
            field: field.into(),
            message: message.into(),
        }
    }

    /// Create an auth error
    pub fn auth(message: impl Into<String>) -> Self {
        Self::Auth {
            message: message.into(),
        }
    }

    /// Create a token refresh error
    pub fn token_refresh(message: impl Into<String>) -> Self {
        Self::TokenRefresh {
            message: message.into(),
        }
    }

    /// Create an unauthorized error from a response body
    pub fn unauthorized(body: impl Into<String>) -> Self {
        Self::Unauthorized { body: body.into() }
    }

    /// Create an HTTP status error
    pub fn http_status(status: u16, body: impl Into<String>) -> Self {
        Self::HttpStatus {
            status,
            body: body.into(),
        }
    }

    /// Create a rate-limited error
    pub fn rate_limited(status: u16, retry_after_seconds: Option<u64>) -> Self {
        Self::RateLimited {
            status,
            retry_after_seconds,
        }
    }

    /// Create a record extraction error
    pub fn record_extraction(path: impl Into<String>, message: impl Into<String>) -> Self {
        Self::RecordExtraction {
            path: path.into(),
            message: message.into(),
        }
    }

    /// Create an invalid cursor error
    pub fn invalid_cursor(value: impl Into<String>, message: impl Into<String>) -> Self {
        Self::InvalidCursor {
            value: value.into(),
            message: message.into(),
        }
    }

    /// Create a missing record field error
    pub fn missing_record_field(stream: impl Into<String>, field: impl Into<String>) -> Self {
        Self::MissingRecordField {
            stream: stream.into(),
            field: field.into(),
        }
    }

    /// Create a state error
    pub fn state(message: impl Into<String>) -> Self {
        Self::State {
            message: message.into(),
        }
    }

    /// Classify this error for the retry loop.
    ///
    /// Only HTTP 429/503 responses are worth waiting out, and only a 401 is
    /// worth a credential refresh. Transport failures, other statuses
    /// (including 500/502/504), and every non-HTTP error are fatal.
    pub fn retry_class(&self) -> RetryClass {
        match self {
            Error::RateLimited { .. } => RetryClass::RateLimited,
            Error::Unauthorized { .. } => RetryClass::Unauthorized,
            _ => RetryClass::Fatal,
        }
    }

    /// The HTTP status code this error carries, if any.
    pub fn status_code(&self) -> Option<u16> {
        match self {
            Error::Unauthorized { .. } => Some(401),
            Error::HttpStatus { status, .. } | Error::RateLimited { status, .. } => Some(*status),
            Error::Http(err) => err.status().map(|s| s.as_u16()),
            _ => None,
        }
    }
}

/// Result type alias for pullkit
pub type Result<T> = std::result::Result<T, Error>;

/// Extension trait for adding context to errors
pub trait ResultExt<T> {
    /// Add context to an error
    fn context(self, message: impl Into<String>) -> Result<T>;

    /// Add context with a closure (lazy evaluation)
    fn with_context<F: FnOnce() -> String>(self, f: F) -> Result<T>;
}

impl<T, E: Into<Error>> ResultExt<T> for std::result::Result<T, E> {
    fn context(self, message: impl Into<String>) -> Result<T> {
        self.map_err(|e| {
            let inner = e.into();
            Error::Other(format!("{}: {}", message.into(), inner))
        })
    }

    fn with_context<F: FnOnce() -> String>(self, f: F) -> Result<T> {
        self.map_err(|e| {
            let inner = e.into();
            Error::Other(format!("{}: {}", f(), inner))
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use test_case::test_case;

    #[test]
    fn test_error_display() {
        let err = Error::config("test message");
        assert_eq!(err.to_string(), "Configuration error: test message");

        let err = Error::missing_field("start_date");
        assert_eq!(err.to_string(), "Missing required config field: start_date");

        let err = Error::http_status(404, "Not found");
        assert_eq!(err.to_string(), "HTTP 404: Not found");

        let err = Error::RunawayPagination {
            stream: "invoices".into(),
            pages: 1_000_000,
        };
        assert_eq!(
            err.to_string(),
            "Stream 'invoices' exceeded 1000000 pages in a single run"
        );
    }

    #[test_case(Error::rate_limited(429, None), RetryClass::RateLimited; "http 429")]
    #[test_case(Error::rate_limited(503, Some(30)), RetryClass::RateLimited; "http 503")]
    #[test_case(Error::unauthorized("token expired"), RetryClass::Unauthorized; "http 401")]
    #[test_case(Error::http_status(500, ""), RetryClass::Fatal; "http 500")]
    #[test_case(Error::http_status(502, ""), RetryClass::Fatal; "http 502")]
    #[test_case(Error::http_status(504, ""), RetryClass::Fatal; "http 504")]
    #[test_case(Error::http_status(400, "bad request"), RetryClass::Fatal; "http 400")]
    #[test_case(Error::http_status(404, ""), RetryClass::Fatal; "http 404")]
    #[test_case(Error::config("boom"), RetryClass::Fatal; "config error")]
    #[test_case(Error::state("corrupt"), RetryClass::Fatal; "state error")]
    fn test_retry_class(err: Error, expected: RetryClass) {
        assert_eq!(err.retry_class(), expected);
    }

    #[test]
    fn test_status_code() {
        assert_eq!(Error::unauthorized("").status_code(), Some(401));
        assert_eq!(Error::rate_limited(503, None).status_code(), Some(503));
        assert_eq!(Error::http_status(404, "").status_code(), Some(404));
        assert_eq!(Error::config("no status").status_code(), None);
        assert_eq!(Error::state("no status").status_code(), None);
    }

    #[test]
    fn test_result_context() {
        let result: Result<()> = Err(Error::config("inner"));
        let with_context = result.context("outer");
        assert!(with_context
            .unwrap_err()
            .to_string()
            .contains("outer: Configuration error: inner"));
    }
}

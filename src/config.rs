//! Run configuration
//!
//! Runtime settings loaded from JSON: where extraction starts, how requests
//! authenticate, and how hard to lean on the remote. Source and stream
//! definitions live in the catalog; this file is only the per-run knobs.

use std::collections::HashMap;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::auth::{CredentialStore, Credentials, NoRefresh, OAuth2Refresher, TokenRefresher};
use crate::error::{Error, Result};
use crate::retry::RetryPolicy;
use crate::source::{HttpSourceConfig, RateLimiterConfig};
use crate::types::parse_timestamp;

// ============================================================================
// Run Config
// ============================================================================

/// Complete run configuration loaded from JSON
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunConfig {
    /// Cursor seed for streams with no bookmark yet (ISO-8601)
    pub start_date: String,

    /// Authentication configuration
    #[serde(default)]
    pub auth: AuthConfig,

    /// HTTP client settings
    #[serde(default)]
    pub http: HttpSettings,

    /// Retry and backoff settings
    #[serde(default)]
    pub retry: RetrySettings,

    /// Extra headers sent with every request
    #[serde(default)]
    pub headers: HashMap<String, String>,
}

impl RunConfig {
    /// Load a run config from a JSON file
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let raw = std::fs::read_to_string(path.as_ref()).map_err(|e| {
            Error::config(format!(
                "Failed to read config file '{}': {e}",
                path.as_ref().display()
            ))
        })?;
        Self::from_json(&raw)
    }

    /// Parse and validate a run config from a JSON string
    pub fn from_json(raw: &str) -> Result<Self> {
        let config: Self = serde_json::from_str(raw)?;
        config.validate()?;
        Ok(config)
    }

    /// Validate field values beyond what deserialization enforces
    pub fn validate(&self) -> Result<()> {
        if self.start_date.trim().is_empty() {
            return Err(Error::missing_field("start_date"));
        }
        if parse_timestamp(&self.start_date).is_err() {
            return Err(Error::invalid_value(
                "start_date",
                format!("'{}' is not an ISO-8601 timestamp", self.start_date),
            ));
        }
        if self.retry.max_attempts == 0 {
            return Err(Error::invalid_value(
                "retry.max_attempts",
                "must be at least 1",
            ));
        }
        self.auth.validate()
    }

    /// The configured start date as a UTC instant
    pub fn start_datetime(&self) -> Result<DateTime<Utc>> {
        parse_timestamp(&self.start_date)
    }

    /// Retry policy built from the retry settings
    pub fn retry_policy(&self) -> RetryPolicy {
        RetryPolicy::new(
            self.retry.max_attempts,
            Duration::from_millis(self.retry.initial_backoff_ms),
            Duration::from_millis(self.retry.max_backoff_ms),
        )
    }

    /// HTTP source configuration derived from the settings and extra headers
    pub fn http_source_config(&self) -> HttpSourceConfig {
        let mut builder =
            HttpSourceConfig::builder().timeout(Duration::from_secs(self.http.timeout_secs));
        if let Some(agent) = &self.http.user_agent {
            builder = builder.user_agent(agent);
        }
        builder = match self.http.rate_limit_rps {
            None => builder,
            Some(0) => builder.no_rate_limit(),
            Some(rps) => builder.rate_limit(RateLimiterConfig::new(rps, rps)),
        };
        for (name, value) in &self.headers {
            builder = builder.header(name, value);
        }
        builder.build()
    }
}

// ============================================================================
// Auth Config
// ============================================================================

/// Authentication configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum AuthConfig {
    /// No authentication
    #[default]
    None,

    /// Static bearer token
    Bearer {
        /// The token value
        token: String,
    },

    /// OAuth2 refresh-token flow
    Oauth2Refresh {
        /// Token endpoint URL
        token_url: String,
        /// Client ID
        client_id: String,
        /// Client secret
        client_secret: String,
        /// Refresh token
        refresh_token: String,
        /// Access token to start with, when one is already known
        #[serde(default)]
        access_token: Option<String>,
    },
}

impl AuthConfig {
    fn validate(&self) -> Result<()> {
        match self {
            Self::None => Ok(()),
            Self::Bearer { token } => {
                if token.is_empty() {
                    return Err(Error::invalid_value("auth.token", "must not be empty"));
                }
                Ok(())
            }
            Self::Oauth2Refresh {
                token_url,
                client_id,
                refresh_token,
                ..
            } => {
                for (field, value) in [
                    ("auth.token_url", token_url),
                    ("auth.client_id", client_id),
                    ("auth.refresh_token", refresh_token),
                ] {
                    if value.is_empty() {
                        return Err(Error::invalid_value(field, "must not be empty"));
                    }
                }
                Ok(())
            }
        }
    }

    /// Build the credential store this config describes
    pub fn credential_store(&self) -> CredentialStore {
        match self {
            Self::None => CredentialStore::empty(),
            Self::Bearer { token } => CredentialStore::new(Credentials::bearer(token)),
            Self::Oauth2Refresh {
                refresh_token,
                access_token,
                ..
            } => CredentialStore::new(Credentials {
                access_token: access_token.clone(),
                refresh_token: Some(refresh_token.clone()),
            }),
        }
    }

    /// Build the token refresher this config describes
    ///
    /// Only the OAuth2 flow can actually rotate tokens; the other variants
    /// get a refresher whose refresh is a no-op, so an expired token fails
    /// on the retried request rather than in the refresh step.
    pub fn token_refresher(&self, store: &CredentialStore) -> Arc<dyn TokenRefresher> {
        match self {
            Self::Oauth2Refresh {
                token_url,
                client_id,
                client_secret,
                ..
            } => Arc::new(OAuth2Refresher::new(
                token_url,
                client_id,
                client_secret,
                store.clone(),
            )),
            _ => Arc::new(NoRefresh),
        }
    }
}

// ============================================================================
// HTTP Settings
// ============================================================================

/// HTTP client settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HttpSettings {
    /// Request timeout in seconds
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,

    /// Requests per second; absent keeps the source default, 0 disables
    /// client-side limiting
    #[serde(default)]
    pub rate_limit_rps: Option<u32>,

    /// User-Agent header override
    #[serde(default)]
    pub user_agent: Option<String>,
}

impl Default for HttpSettings {
    fn default() -> Self {
        Self {
            timeout_secs: default_timeout_secs(),
            rate_limit_rps: None,
            user_agent: None,
        }
    }
}

fn default_timeout_secs() -> u64 {
    30
}

// ============================================================================
// Retry Settings
// ============================================================================

/// Retry and backoff settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RetrySettings {
    /// Total attempts for rate-limited requests
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,

    /// First backoff delay in milliseconds
    #[serde(default = "default_initial_backoff_ms")]
    pub initial_backoff_ms: u64,

    /// Backoff ceiling in milliseconds
    #[serde(default = "default_max_backoff_ms")]
    pub max_backoff_ms: u64,
}

impl Default for RetrySettings {
    fn default() -> Self {
        Self {
            max_attempts: default_max_attempts(),
            initial_backoff_ms: default_initial_backoff_ms(),
            max_backoff_ms: default_max_backoff_ms(),
        }
    }
}

fn default_max_attempts() -> u32 {
    10
}

fn default_initial_backoff_ms() -> u64 {
    2000
}

fn default_max_backoff_ms() -> u64 {
    60000
}

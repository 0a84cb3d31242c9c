//! Credential storage and refresh
//!
//! Credentials live behind a shared store so that a refresh triggered by
//! one in-flight request is visible to every subsequent request. The
//! refresh itself sits behind [`TokenRefresher`], which is the seam the
//! retry layer calls when the remote answers 401.

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::debug;

use crate::error::{Error, Result};

/// Bearer credentials for the remote API.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct Credentials {
    /// Current access token, sent as `Authorization: Bearer ...`
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub access_token: Option<String>,
    /// Refresh token, when the provider rotates access tokens
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub refresh_token: Option<String>,
}

impl Credentials {
    /// Credentials with a fixed bearer token and no refresh capability
    pub fn bearer(token: impl Into<String>) -> Self {
        Self {
            access_token: Some(token.into()),
            refresh_token: None,
        }
    }
}

/// Shared handle to the current credentials.
#[derive(Debug, Clone, Default)]
pub struct CredentialStore {
    inner: Arc<RwLock<Credentials>>,
}

impl CredentialStore {
    /// Create a store holding the given credentials
    pub fn new(credentials: Credentials) -> Self {
        Self {
            inner: Arc::new(RwLock::new(credentials)),
        }
    }

    /// Create a store with no credentials (unauthenticated APIs)
    pub fn empty() -> Self {
        Self::default()
    }

    /// Current access token
    pub async fn access_token(&self) -> Option<String> {
        self.inner.read().await.access_token.clone()
    }

    /// Current refresh token
    pub async fn refresh_token(&self) -> Option<String> {
        self.inner.read().await.refresh_token.clone()
    }

    /// Install a new access token, and a new refresh token when the
    /// provider rotated it. A `None` refresh token keeps the existing one.
    pub async fn rotate(&self, access_token: String, refresh_token: Option<String>) {
        let mut guard = self.inner.write().await;
        guard.access_token = Some(access_token);
        if refresh_token.is_some() {
            guard.refresh_token = refresh_token;
        }
    }

    /// Clone of the current credentials
    pub async fn snapshot(&self) -> Credentials {
        self.inner.read().await.clone()
    }
}

/// External credential-refresh side effect.
///
/// Implementations must be idempotent: the retry layer calls this at most
/// once per guarded fetch, but nothing stops several streams from
/// refreshing back to back.
#[async_trait]
pub trait TokenRefresher: Send + Sync {
    /// Obtain fresh credentials and make them visible to the store.
    async fn refresh(&self) -> Result<()>;
}

/// Refresher for credentials that cannot be refreshed.
///
/// The no-op keeps the 401 contract uniform: the single retry runs with
/// unchanged credentials and a second 401 surfaces as fatal.
#[derive(Debug, Default)]
pub struct NoRefresh;

#[async_trait]
impl TokenRefresher for NoRefresh {
    async fn refresh(&self) -> Result<()> {
        Ok(())
    }
}

/// OAuth2 refresh-token flow against a token endpoint.
pub struct OAuth2Refresher {
    /// Token endpoint URL
    token_url: String,
    /// OAuth2 client id
    client_id: String,
    /// OAuth2 client secret
    client_secret: String,
    /// Store to read the refresh token from and write new tokens to
    store: CredentialStore,
    /// HTTP client for token requests
    http_client: Client,
}

impl OAuth2Refresher {
    /// Create a new refresher bound to a credential store
    pub fn new(
        token_url: impl Into<String>,
        client_id: impl Into<String>,
        client_secret: impl Into<String>,
        store: CredentialStore,
    ) -> Self {
        Self {
            token_url: token_url.into(),
            client_id: client_id.into(),
            client_secret: client_secret.into(),
            store,
            http_client: Client::new(),
        }
    }

    /// Create a refresher with a custom HTTP client
    pub fn with_client(
        token_url: impl Into<String>,
        client_id: impl Into<String>,
        client_secret: impl Into<String>,
        store: CredentialStore,
        http_client: Client,
    ) -> Self {
        Self {
            token_url: token_url.into(),
            client_id: client_id.into(),
            client_secret: client_secret.into(),
            store,
            http_client,
        }
    }
}

#[async_trait]
impl TokenRefresher for OAuth2Refresher {
    async fn refresh(&self) -> Result<()> {
        let refresh_token = self
            .store
            .refresh_token()
            .await
            .ok_or_else(|| Error::auth("No refresh token configured"))?;

        let form = [
            ("grant_type", "refresh_token"),
            ("client_id", &self.client_id),
            ("client_secret", &self.client_secret),
            ("refresh_token", &refresh_token),
        ];

        let response = self
            .http_client
            .post(&self.token_url)
            .form(&form)
            .send()
            .await
            .map_err(Error::Http)?;

        if !response.status().is_success() {
            let status = response.status().as_u16();
            let body = response.text().await.unwrap_or_default();
            return Err(Error::TokenRefresh {
                message: format!("Refresh token request failed with status {status}: {body}"),
            });
        }

        let token_response: TokenResponse = response.json().await.map_err(Error::Http)?;
        self.store
            .rotate(token_response.access_token, token_response.refresh_token)
            .await;
        debug!("access token refreshed");

        Ok(())
    }
}

/// OAuth2 token response
#[derive(Debug, Deserialize)]
struct TokenResponse {
    access_token: String,
    /// Present when the provider rotates refresh tokens
    #[serde(default)]
    refresh_token: Option<String>,
    #[serde(default)]
    #[allow(dead_code)]
    expires_in: Option<i64>,
    #[serde(default)]
    #[allow(dead_code)]
    token_type: Option<String>,
}

//! Retry orchestration for remote fetches
//!
//! Wraps a `RemoteSource` with the retry and credential-refresh policy:
//! - Rate-limit responses are retried with exponential backoff
//! - The first unauthorized response triggers a single credential refresh
//!   followed by an immediate retry; a second unauthorized response is fatal
//! - Every attempt is timed and reported to a `RequestObserver`
//! - Any other error is surfaced without retrying

use std::sync::Arc;
use std::time::{Duration, Instant};

use tracing::warn;

use crate::auth::TokenRefresher;
use crate::error::{Result, RetryClass};
use crate::metrics::{RequestObserver, RequestTiming};
use crate::source::{FetchOptions, RemoteSource};
use crate::types::Batch;

// ============================================================================
// Retry Policy
// ============================================================================

/// Backoff policy applied to rate-limited requests
#[derive(Debug, Clone)]
pub struct RetryPolicy {
    /// Total rate-limited attempts allowed, first try included
    pub max_attempts: u32,
    /// Delay before the first retry
    pub initial_delay: Duration,
    /// Maximum delay for any single retry
    pub max_delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 10,
            initial_delay: Duration::from_secs(2),
            max_delay: Duration::from_secs(60),
        }
    }
}

impl RetryPolicy {
    pub fn new(max_attempts: u32, initial_delay: Duration, max_delay: Duration) -> Self {
        Self {
            max_attempts,
            initial_delay,
            max_delay,
        }
    }

    /// Calculate the backoff delay for a given retry (zero-based)
    pub fn delay_for(&self, retry: u32) -> Duration {
        let factor = 2u32.saturating_pow(retry);
        std::cmp::min(self.initial_delay * factor, self.max_delay)
    }
}

// ============================================================================
// Fetcher
// ============================================================================

/// A `RemoteSource` guarded by the retry policy
///
/// All strategy code goes through `Fetcher::fetch` rather than calling the
/// source directly, so every request shares the same backoff, refresh, and
/// observability behavior.
#[derive(Clone)]
pub struct Fetcher {
    source: Arc<dyn RemoteSource>,
    refresher: Arc<dyn TokenRefresher>,
    policy: RetryPolicy,
    observer: Arc<dyn RequestObserver>,
}

impl Fetcher {
    pub fn new(
        source: Arc<dyn RemoteSource>,
        refresher: Arc<dyn TokenRefresher>,
        policy: RetryPolicy,
        observer: Arc<dyn RequestObserver>,
    ) -> Self {
        Self {
            source,
            refresher,
            policy,
            observer,
        }
    }

    pub fn policy(&self) -> &RetryPolicy {
        &self.policy
    }

    /// Fetch a batch from the source, applying the retry policy
    ///
    /// Rate-limited responses consume the attempt budget; the single
    /// post-refresh retry after an unauthorized response does not.
    pub async fn fetch(&self, stream: &str, options: &FetchOptions) -> Result<Batch> {
        let mut attempt: u32 = 0;
        let mut limited: u32 = 0;
        let mut refreshed = false;

        loop {
            let started = Instant::now();
            let outcome = self.source.fetch(stream, options).await;
            self.observer
                .record(&RequestTiming::of(stream, attempt, started.elapsed(), &outcome));
            attempt += 1;

            let err = match outcome {
                Ok(records) => return Ok(records),
                Err(err) => err,
            };

            match err.retry_class() {
                RetryClass::Unauthorized if !refreshed => {
                    warn!("Unauthorized response for '{}', refreshing credentials", stream);
                    self.refresher.refresh().await?;
                    refreshed = true;
                }
                RetryClass::RateLimited => {
                    limited += 1;
                    if limited >= self.policy.max_attempts {
                        return Err(err);
                    }
                    let delay = self.policy.delay_for(limited - 1);
                    warn!(
                        "Rate limited ({}) on '{}', attempt {}/{}, retrying in {:?}",
                        err.status_code().unwrap_or(429),
                        stream,
                        limited,
                        self.policy.max_attempts,
                        delay
                    );
                    tokio::time::sleep(delay).await;
                }
                _ => return Err(err),
            }
        }
    }
}

impl std::fmt::Debug for Fetcher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Fetcher")
            .field("policy", &self.policy)
            .finish_non_exhaustive()
    }
}

// ============================================================================
// Tests
// ============================================================================

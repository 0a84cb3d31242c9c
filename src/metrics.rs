//! Request observability
//!
//! Every fetch attempt, including failed ones, produces a [`RequestTiming`]
//! that is handed to a [`RequestObserver`]. The observer is plain data flow:
//! it is injected where fetching is constructed, so embedders wire their own
//! aggregation without any global registry.

use std::sync::Mutex;
use std::time::Duration;

use crate::error::{Error, Result};
use crate::types::Batch;

// ============================================================================
// Timing
// ============================================================================

/// Timing and outcome of a single fetch attempt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RequestTiming {
    /// Stream the request was issued for
    pub stream: String,
    /// Zero-based attempt index within one guarded fetch
    pub attempt: u32,
    /// Wall-clock duration of the attempt
    pub elapsed: Duration,
    /// HTTP status: 200 for a successful fetch, the failing status when the
    /// error carries one, `None` for transport-level failures
    pub status: Option<u16>,
    /// Error text for failed attempts
    pub error: Option<String>,
}

impl RequestTiming {
    /// Build a timing from the outcome of one attempt.
    pub fn of(stream: &str, attempt: u32, elapsed: Duration, outcome: &Result<Batch>) -> Self {
        match outcome {
            Ok(_) => Self {
                stream: stream.to_string(),
                attempt,
                elapsed,
                status: Some(200),
                error: None,
            },
            Err(err) => Self::failure(stream, attempt, elapsed, err),
        }
    }

    /// Build a timing for a failed attempt.
    pub fn failure(stream: &str, attempt: u32, elapsed: Duration, err: &Error) -> Self {
        Self {
            stream: stream.to_string(),
            attempt,
            elapsed,
            status: err.status_code(),
            error: Some(err.to_string()),
        }
    }

    /// Whether the attempt succeeded
    pub fn is_success(&self) -> bool {
        self.error.is_none()
    }
}

// ============================================================================
// Observer
// ============================================================================

/// Sink for per-attempt request timings.
pub trait RequestObserver: Send + Sync {
    /// Record one attempt. Called on every attempt, success or failure.
    fn record(&self, timing: &RequestTiming);
}

/// Default observer: emits timings as structured tracing events.
#[derive(Debug, Default)]
pub struct TracingObserver;

impl RequestObserver for TracingObserver {
    fn record(&self, timing: &RequestTiming) {
        if timing.is_success() {
            tracing::debug!(
                stream = %timing.stream,
                attempt = timing.attempt,
                elapsed_ms = timing.elapsed.as_millis() as u64,
                status = timing.status,
                "request completed"
            );
        } else {
            tracing::warn!(
                stream = %timing.stream,
                attempt = timing.attempt,
                elapsed_ms = timing.elapsed.as_millis() as u64,
                status = timing.status,
                error = timing.error.as_deref(),
                "request failed"
            );
        }
    }
}

/// Observer that drops everything.
#[derive(Debug, Default)]
pub struct NoopObserver;

impl RequestObserver for NoopObserver {
    fn record(&self, _timing: &RequestTiming) {}
}

/// Observer that keeps every timing in memory.
///
/// Useful in tests and for embedders that aggregate after a run.
#[derive(Debug, Default)]
pub struct CollectingObserver {
    timings: Mutex<Vec<RequestTiming>>,
}

impl CollectingObserver {
    /// Create an empty collector
    pub fn new() -> Self {
        Self::default()
    }

    /// All timings recorded so far
    pub fn timings(&self) -> Vec<RequestTiming> {
        self.timings
            .lock()
            .map(|guard| guard.clone())
            .unwrap_or_default()
    }

    /// Number of attempts recorded
    pub fn len(&self) -> usize {
        self.timings.lock().map(|guard| guard.len()).unwrap_or(0)
    }

    /// Whether nothing has been recorded
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl RequestObserver for CollectingObserver {
    fn record(&self, timing: &RequestTiming) {
        if let Ok(mut guard) = self.timings.lock() {
            guard.push(timing.clone());
        }
    }
}

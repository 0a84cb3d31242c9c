//! Fetch seam types
//!
//! `RemoteSource` is the single interface every pull strategy fetches
//! through; `FetchOptions` is the narrow request surface strategies are
//! allowed to vary. A fresh options value is built for every call, so no
//! request state ever leaks from one fetch into the next.

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use crate::error::Result;
use crate::types::Batch;

// ============================================================================
// Fetch Options
// ============================================================================

/// Options for a single fetch.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FetchOptions {
    /// Lower bound on record modification time
    pub since: Option<DateTime<Utc>>,
    /// Server-side ordering clause
    pub order_by: Option<String>,
    /// Page number
    pub page: Option<u64>,
    /// Server-native sequence offset
    pub offset: Option<i64>,
}

impl FetchOptions {
    /// Create empty options
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the modification-time lower bound
    #[must_use]
    pub fn since(mut self, instant: DateTime<Utc>) -> Self {
        self.since = Some(instant);
        self
    }

    /// Set the server-side ordering clause
    #[must_use]
    pub fn order_by(mut self, clause: impl Into<String>) -> Self {
        self.order_by = Some(clause.into());
        self
    }

    /// Set the page number
    #[must_use]
    pub fn page(mut self, page: u64) -> Self {
        self.page = Some(page);
        self
    }

    /// Set the sequence offset
    #[must_use]
    pub fn offset(mut self, offset: i64) -> Self {
        self.offset = Some(offset);
        self
    }

    /// Whether no option is set
    pub fn is_empty(&self) -> bool {
        self.since.is_none()
            && self.order_by.is_none()
            && self.page.is_none()
            && self.offset.is_none()
    }
}

// ============================================================================
// Remote Source
// ============================================================================

/// One fetch against the remote API.
///
/// Implementations return the decoded records of a single page and map
/// failures onto the error taxonomy (401 to `Unauthorized`, 429/503 to
/// `RateLimited`, other non-2xx to `HttpStatus`). Retrying is not their
/// job; that lives in the fetch guard above this seam.
#[async_trait]
pub trait RemoteSource: Send + Sync {
    /// Fetch one page of records for a stream.
    async fn fetch(&self, stream: &str, options: &FetchOptions) -> Result<Batch>;
}

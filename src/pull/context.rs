//! Shared bookmark operations for extraction strategies

use chrono::{DateTime, Utc};
use tracing::warn;

use crate::catalog::StreamSpec;
use crate::error::{Error, Result};
use crate::retry::Fetcher;
use crate::source::FetchOptions;
use crate::state::StateStore;
use crate::types::{parse_timestamp, string_field, Batch, Record};

/// Everything a strategy needs to pull one stream
///
/// Bundles the guarded fetcher, the bookmark store, the stream definition,
/// and the configured start date, and owns the bookmark operations every
/// strategy shares. The bookmark store is borrowed knowledge: the context
/// reads and writes only its own stream's entry and never replaces the
/// structure around it.
#[derive(Debug, Clone)]
pub struct PullContext {
    fetcher: Fetcher,
    state: StateStore,
    spec: StreamSpec,
    start_date: String,
}

impl PullContext {
    pub fn new(
        fetcher: Fetcher,
        state: StateStore,
        spec: StreamSpec,
        start_date: impl Into<String>,
    ) -> Self {
        Self {
            fetcher,
            state,
            spec,
            start_date: start_date.into(),
        }
    }

    pub fn spec(&self) -> &StreamSpec {
        &self.spec
    }

    /// Name of the stream this context pulls
    pub fn stream(&self) -> &str {
        &self.spec.name
    }

    /// Fetch one batch through the retry policy
    pub async fn fetch(&self, options: &FetchOptions) -> Result<Batch> {
        self.fetcher.fetch(&self.spec.name, options).await
    }

    /// Resolve the run's start cursor
    ///
    /// Reads the `updated_at` bookmark; when it is absent or does not parse,
    /// seeds the bookmark with the configured start date verbatim and uses
    /// that. Runs lazily on the first batch, not at construction.
    pub async fn start_cursor(&self) -> Result<DateTime<Utc>> {
        if let Some(bookmark) = self.state.updated_at(self.stream()).await {
            match parse_timestamp(&bookmark) {
                Ok(instant) => return Ok(instant),
                Err(_) => {
                    warn!(
                        "Unparseable '{}' bookmark {:?}, reseeding from the start date",
                        self.stream(),
                        bookmark
                    );
                }
            }
        }
        let instant = parse_timestamp(&self.start_date)?;
        self.state
            .set_updated_at(self.stream(), self.start_date.clone())
            .await;
        Ok(instant)
    }

    /// Advance the `updated_at` bookmark from the last record of a batch
    ///
    /// Batches arrive ascending by the bookmark property, so the last record
    /// carries the newest value. The value is stored verbatim, not
    /// re-serialized, to survive remote timestamp formats round-trip.
    pub async fn advance_cursor(&self, batch: &[Record]) -> Result<()> {
        let Some(last) = batch.last() else {
            return Ok(());
        };
        let property = &self.spec.bookmark_property;
        let value = string_field(last, property)
            .ok_or_else(|| Error::missing_record_field(self.stream(), property))?;
        self.state.set_updated_at(self.stream(), value).await;
        Ok(())
    }

    /// Page bookmark to resume an interrupted sweep from, if one is saved
    pub async fn resume_page(&self) -> Option<u64> {
        self.state.page(self.stream()).await
    }

    /// Save the page to resume from; `None` clears it after a complete sweep
    pub async fn checkpoint_page(&self, page: Option<u64>) {
        self.state.set_page(self.stream(), page).await;
    }

    /// Last-seen native sequence number, if one is saved
    pub async fn resume_sequence(&self) -> Option<i64> {
        self.state.journal_number(self.stream()).await
    }

    /// Save the last-seen native sequence number
    pub async fn checkpoint_sequence(&self, value: i64) {
        self.state.set_journal_number(self.stream(), value).await;
    }

    /// Server-side ordering clause for the bookmark property
    pub fn order_clause(&self) -> String {
        format!("{} ASC", self.spec.bookmark_property)
    }
}

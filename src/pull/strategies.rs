//! Extraction strategy implementations
//!
//! Each strategy handles one pagination pattern.

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use super::context::PullContext;
use crate::catalog::PullMode;
use crate::error::{Error, Result};
use crate::source::FetchOptions;
use crate::types::{integer_field, parse_timestamp, string_field, Batch};

/// Hard cap on pages pulled from one stream in a single run
pub const MAX_PAGES_PER_RUN: u64 = 1_000_000;

/// Core trait for extraction strategies
///
/// `next_batch` returns `Ok(Some(batch))` until the stream is exhausted for
/// this run, then `Ok(None)`. Bookmarks move forward before a batch is
/// yielded; dropping a strategy mid-run therefore leaves the bookmark store
/// consistent with everything already yielded.
#[async_trait]
pub trait PullStrategy: Send {
    /// Produce the next batch, or `None` when the run is complete
    async fn next_batch(&mut self) -> Result<Option<Batch>>;
}

/// Build the strategy for a stream's configured pull mode
pub fn strategy_for(cx: PullContext) -> Box<dyn PullStrategy> {
    match cx.spec().mode.clone() {
        PullMode::Incremental => Box::new(IncrementalPull::new(cx)),
        PullMode::Paged => Box::new(PagedPull::new(cx)),
        PullMode::Sequence { sequence_field } => Box::new(SequencePull::new(cx, sequence_field)),
        PullMode::FilteredSweep => Box::new(FilteredSweepPull::new(cx)),
        PullMode::FullRefresh => Box::new(FullRefreshPull::new(cx)),
    }
}

// ============================================================================
// Incremental Pull
// ============================================================================

/// Single filtered fetch (e.g., low-volume streams where one response covers
/// every change since the last run)
///
/// Sends only `since` = the start cursor. An empty response ends the run;
/// otherwise `updated_at` advances to the batch's last record and the one
/// batch is yielded.
#[derive(Debug)]
pub struct IncrementalPull {
    cx: PullContext,
    done: bool,
}

impl IncrementalPull {
    pub fn new(cx: PullContext) -> Self {
        Self { cx, done: false }
    }
}

#[async_trait]
impl PullStrategy for IncrementalPull {
    async fn next_batch(&mut self) -> Result<Option<Batch>> {
        if self.done {
            return Ok(None);
        }
        self.done = true;

        let start = self.cx.start_cursor().await?;
        let records = self.cx.fetch(&FetchOptions::new().since(start)).await?;
        if records.is_empty() {
            return Ok(None);
        }
        self.cx.advance_cursor(&records).await?;
        Ok(Some(records))
    }
}

// ============================================================================
// Paged Pull
// ============================================================================

/// Server-ordered paginated sweep
///
/// Fetches pages starting from the bookmarked page (or the stream's first
/// page), every request carrying `since` = the start cursor and an ascending
/// order clause on the bookmark property. Before each batch is yielded the
/// page bookmark moves to the next page and `updated_at` advances from the
/// batch's last record, so an interrupted sweep resumes mid-pagination. An
/// empty page clears the page bookmark: the next run sweeps from the first
/// page again, with the advanced `since` bounding the volume.
#[derive(Debug)]
pub struct PagedPull {
    cx: PullContext,
    start: Option<DateTime<Utc>>,
    page: u64,
    pages_pulled: u64,
    page_cap: u64,
    done: bool,
}

impl PagedPull {
    pub fn new(cx: PullContext) -> Self {
        Self {
            cx,
            start: None,
            page: 0,
            pages_pulled: 0,
            page_cap: MAX_PAGES_PER_RUN,
            done: false,
        }
    }

    /// Tighten the runaway-pagination cap
    #[must_use]
    pub fn with_page_cap(mut self, cap: u64) -> Self {
        self.page_cap = cap;
        self
    }
}

#[async_trait]
impl PullStrategy for PagedPull {
    async fn next_batch(&mut self) -> Result<Option<Batch>> {
        if self.done {
            return Ok(None);
        }

        let start = match self.start {
            Some(start) => start,
            None => {
                let start = self.cx.start_cursor().await?;
                self.page = self
                    .cx
                    .resume_page()
                    .await
                    .unwrap_or(self.cx.spec().first_page);
                self.start = Some(start);
                start
            }
        };

        let options = FetchOptions::new()
            .since(start)
            .order_by(self.cx.order_clause())
            .page(self.page);
        let records = self.cx.fetch(&options).await?;

        if records.is_empty() {
            self.done = true;
            self.cx.checkpoint_page(None).await;
            return Ok(None);
        }

        self.pages_pulled += 1;
        if self.pages_pulled > self.page_cap {
            return Err(Error::RunawayPagination {
                stream: self.cx.stream().to_string(),
                pages: self.pages_pulled,
            });
        }

        self.cx.checkpoint_page(Some(self.page + 1)).await;
        self.cx.advance_cursor(&records).await?;
        self.page += 1;
        Ok(Some(records))
    }
}

// ============================================================================
// Sequence Pull
// ============================================================================

/// Offset pull over a stream's own monotonic numbering (e.g., journal
/// endpoints that window by sequence number instead of pages)
///
/// Sends only `offset` = the bookmarked sequence number, 0 on the first run.
/// After each batch the bookmark is the last record's sequence field value
/// itself, never an incremented page count, and it is never reset: the
/// sequence only grows.
#[derive(Debug)]
pub struct SequencePull {
    cx: PullContext,
    sequence_field: String,
    done: bool,
}

impl SequencePull {
    pub fn new(cx: PullContext, sequence_field: impl Into<String>) -> Self {
        Self {
            cx,
            sequence_field: sequence_field.into(),
            done: false,
        }
    }
}

#[async_trait]
impl PullStrategy for SequencePull {
    async fn next_batch(&mut self) -> Result<Option<Batch>> {
        if self.done {
            return Ok(None);
        }

        let offset = self.cx.resume_sequence().await.unwrap_or(0);
        let records = self.cx.fetch(&FetchOptions::new().offset(offset)).await?;
        if records.is_empty() {
            self.done = true;
            return Ok(None);
        }

        let next = records
            .last()
            .and_then(|last| integer_field(last, &self.sequence_field))
            .ok_or_else(|| Error::missing_record_field(self.cx.stream(), &self.sequence_field))?;
        self.cx.checkpoint_sequence(next).await;
        Ok(Some(records))
    }
}

// ============================================================================
// Filtered Sweep Pull
// ============================================================================

/// Paginated sweep with a local timestamp filter (e.g., endpoints that
/// paginate but cannot filter by modification time server-side)
///
/// Walks every page from the bookmarked page, with no `since` and no order
/// clause, then drops records older than the run's start cursor before
/// yielding. The page and `updated_at` bookmarks advance against the
/// unfiltered page exactly as in [`PagedPull`], so a yielded batch may be
/// empty. Records without a parseable bookmark timestamp are fatal: the
/// filter cannot decide for them.
#[derive(Debug)]
pub struct FilteredSweepPull {
    cx: PullContext,
    start: Option<DateTime<Utc>>,
    page: u64,
    pages_pulled: u64,
    page_cap: u64,
    done: bool,
}

impl FilteredSweepPull {
    pub fn new(cx: PullContext) -> Self {
        Self {
            cx,
            start: None,
            page: 0,
            pages_pulled: 0,
            page_cap: MAX_PAGES_PER_RUN,
            done: false,
        }
    }

    /// Tighten the runaway-pagination cap
    #[must_use]
    pub fn with_page_cap(mut self, cap: u64) -> Self {
        self.page_cap = cap;
        self
    }

    /// Keep only records at or after the run's start cursor
    fn filter_since(&self, records: Batch, start: DateTime<Utc>) -> Result<Batch> {
        let property = &self.cx.spec().bookmark_property;
        let mut kept = Vec::with_capacity(records.len());
        for record in records {
            let value = string_field(&record, property)
                .ok_or_else(|| Error::missing_record_field(self.cx.stream(), property))?;
            if parse_timestamp(value)? >= start {
                kept.push(record);
            }
        }
        Ok(kept)
    }
}

#[async_trait]
impl PullStrategy for FilteredSweepPull {
    async fn next_batch(&mut self) -> Result<Option<Batch>> {
        if self.done {
            return Ok(None);
        }

        let start = match self.start {
            Some(start) => start,
            None => {
                let start = self.cx.start_cursor().await?;
                self.page = self
                    .cx
                    .resume_page()
                    .await
                    .unwrap_or(self.cx.spec().first_page);
                self.start = Some(start);
                start
            }
        };

        let records = self.cx.fetch(&FetchOptions::new().page(self.page)).await?;
        if records.is_empty() {
            self.done = true;
            self.cx.checkpoint_page(None).await;
            return Ok(None);
        }

        self.pages_pulled += 1;
        if self.pages_pulled > self.page_cap {
            return Err(Error::RunawayPagination {
                stream: self.cx.stream().to_string(),
                pages: self.pages_pulled,
            });
        }

        self.cx.checkpoint_page(Some(self.page + 1)).await;
        self.cx.advance_cursor(&records).await?;
        self.page += 1;

        let kept = self.filter_since(records, start)?;
        Ok(Some(kept))
    }
}

// ============================================================================
// Full Refresh Pull
// ============================================================================

/// Unpaginated full pull (e.g., small reference streams replaced wholesale
/// each run)
///
/// One fetch with no options and no bookmark writes. Yields exactly once,
/// even when the response is empty, so a downstream replacement still
/// observes the empty result.
#[derive(Debug)]
pub struct FullRefreshPull {
    cx: PullContext,
    done: bool,
}

impl FullRefreshPull {
    pub fn new(cx: PullContext) -> Self {
        Self { cx, done: false }
    }
}

#[async_trait]
impl PullStrategy for FullRefreshPull {
    async fn next_batch(&mut self) -> Result<Option<Batch>> {
        if self.done {
            return Ok(None);
        }
        self.done = true;

        let records = self.cx.fetch(&FetchOptions::new()).await?;
        Ok(Some(records))
    }
}

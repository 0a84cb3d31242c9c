//! Engine types
//!
//! Options, per-stream outcomes, and counters for sync runs.

use crate::error::Error;

/// Options for a sync run.
///
/// Built fresh per run; nothing here is shared or mutated between calls.
#[derive(Debug, Clone)]
pub struct SyncOptions {
    /// Abort the run on the first stream failure
    pub fail_fast: bool,
    /// Maximum batches to pull per stream (0 = unlimited)
    pub max_batches: usize,
}

impl Default for SyncOptions {
    fn default() -> Self {
        Self {
            fail_fast: true,
            max_batches: 0,
        }
    }
}

impl SyncOptions {
    /// Create sync options with defaults
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Set fail fast mode
    #[must_use]
    pub fn with_fail_fast(mut self, fail_fast: bool) -> Self {
        self.fail_fast = fail_fast;
        self
    }

    /// Set the per-stream batch limit
    #[must_use]
    pub fn with_max_batches(mut self, max: usize) -> Self {
        self.max_batches = max;
        self
    }
}

/// What happened to one stream during a run
#[derive(Debug, Clone)]
pub struct StreamOutcome {
    /// Stream name
    pub stream: String,
    /// Records handed to the sink
    pub records: usize,
    /// Batches handed to the sink
    pub batches: usize,
    /// Wall time for this stream in milliseconds
    pub duration_ms: u64,
    /// Failure message, if the stream failed
    pub error: Option<String>,
}

impl StreamOutcome {
    /// Outcome for a stream that completed
    pub fn success(
        stream: impl Into<String>,
        records: usize,
        batches: usize,
        duration_ms: u64,
    ) -> Self {
        Self {
            stream: stream.into(),
            records,
            batches,
            duration_ms,
            error: None,
        }
    }

    /// Outcome for a stream that failed
    pub fn failure(stream: impl Into<String>, duration_ms: u64, error: &Error) -> Self {
        Self {
            stream: stream.into(),
            records: 0,
            batches: 0,
            duration_ms,
            error: Some(error.to_string()),
        }
    }

    /// Whether the stream completed without error
    pub fn succeeded(&self) -> bool {
        self.error.is_none()
    }
}

/// Result of a whole sync run
#[derive(Debug, Clone, Default)]
pub struct SyncReport {
    /// Per-stream outcomes, in run order
    pub outcomes: Vec<StreamOutcome>,
    /// Accumulated counters
    pub stats: SyncStats,
}

impl SyncReport {
    /// Number of streams that completed
    pub fn successful_streams(&self) -> usize {
        self.outcomes.iter().filter(|o| o.succeeded()).count()
    }

    /// Number of streams that failed
    pub fn failed_streams(&self) -> usize {
        self.outcomes.iter().filter(|o| !o.succeeded()).count()
    }

    /// Whether every attempted stream completed
    pub fn is_success(&self) -> bool {
        self.outcomes.iter().all(StreamOutcome::succeeded)
    }
}

/// Statistics from a sync run
#[derive(Debug, Clone, Default)]
pub struct SyncStats {
    /// Total records handed to the sink
    pub records_synced: usize,
    /// Total batches handed to the sink
    pub batches_emitted: usize,
    /// Streams that completed
    pub streams_synced: usize,
    /// Errors encountered
    pub errors: usize,
    /// Duration in milliseconds
    pub duration_ms: u64,
}

impl SyncStats {
    /// Create new stats
    pub fn new() -> Self {
        Self::default()
    }

    /// Add records
    pub fn add_records(&mut self, count: usize) {
        self.records_synced += count;
    }

    /// Add a batch
    pub fn add_batch(&mut self) {
        self.batches_emitted += 1;
    }

    /// Add a completed stream
    pub fn add_stream(&mut self) {
        self.streams_synced += 1;
    }

    /// Add an error
    pub fn add_error(&mut self) {
        self.errors += 1;
    }

    /// Set duration
    pub fn set_duration(&mut self, ms: u64) {
        self.duration_ms = ms;
    }
}

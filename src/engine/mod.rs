//! Execution engine module
//!
//! Main pull loop and stream orchestration.
//!
//! # Overview
//!
//! The engine module provides:
//! - `SyncEngine` - Drives pull strategies, hands batches to a sink, persists state
//! - `SyncOptions` - Knobs for a sync run
//! - `SyncReport` / `StreamOutcome` / `SyncStats` - What a run did

mod types;

pub use types::{StreamOutcome, SyncOptions, SyncReport, SyncStats};

use crate::catalog::StreamSpec;
use crate::error::Result;
use crate::pull::{strategy_for, PullContext};
use crate::retry::Fetcher;
use crate::sink::BatchSink;
use crate::state::StateStore;
use std::time::Instant;
use tracing::{debug, error, info};

/// Sync engine for orchestrating data extraction.
///
/// Each batch is handed to the sink first and the bookmark store is
/// persisted right after, so an interrupted run re-delivers at most the
/// batch that was in flight.
pub struct SyncEngine {
    /// Guarded fetcher shared by all streams
    fetcher: Fetcher,
    /// Bookmark store
    state: StateStore,
    /// Start date for streams with no bookmark yet
    start_date: String,
    /// Run options
    options: SyncOptions,
    /// Statistics
    stats: SyncStats,
}

impl SyncEngine {
    /// Create a new sync engine
    pub fn new(fetcher: Fetcher, state: StateStore, start_date: impl Into<String>) -> Self {
        Self {
            fetcher,
            state,
            start_date: start_date.into(),
            options: SyncOptions::default(),
            stats: SyncStats::default(),
        }
    }

    /// Set run options
    #[must_use]
    pub fn with_options(mut self, options: SyncOptions) -> Self {
        self.options = options;
        self
    }

    /// Get the bookmark store
    pub fn state(&self) -> &StateStore {
        &self.state
    }

    /// Get statistics
    pub fn stats(&self) -> &SyncStats {
        &self.stats
    }

    /// Reset statistics
    pub fn reset_stats(&mut self) {
        self.stats = SyncStats::default();
    }

    /// Sync a single stream into the sink
    pub async fn sync_stream(
        &mut self,
        spec: &StreamSpec,
        sink: &mut dyn BatchSink,
    ) -> Result<StreamOutcome> {
        let start = Instant::now();
        info!(
            "Starting sync for stream '{}' ({} mode)",
            spec.name,
            spec.mode.label()
        );

        let result = self.pull_stream(spec, sink).await;
        #[allow(clippy::cast_possible_truncation)]
        let duration_ms = start.elapsed().as_millis() as u64;

        match result {
            Ok((records, batches)) => {
                self.stats.add_stream();
                info!(
                    "Completed sync for '{}': {records} records in {batches} batches",
                    spec.name
                );
                Ok(StreamOutcome::success(
                    &spec.name, records, batches, duration_ms,
                ))
            }
            Err(e) => {
                self.stats.add_error();
                Err(e)
            }
        }
    }

    // The pull loop. Strategies update bookmarks before yielding, so the
    // order here is: hand the batch over, persist, then emit the checkpoint.
    async fn pull_stream(
        &mut self,
        spec: &StreamSpec,
        sink: &mut dyn BatchSink,
    ) -> Result<(usize, usize)> {
        let context = PullContext::new(
            self.fetcher.clone(),
            self.state.clone(),
            spec.clone(),
            self.start_date.clone(),
        );
        let mut strategy = strategy_for(context);

        let mut records = 0usize;
        let mut batches = 0usize;
        while let Some(batch) = strategy.next_batch().await? {
            sink.write_batch(&spec.name, &batch)?;
            self.state.save().await?;
            sink.write_state(&self.state.snapshot().await)?;

            records += batch.len();
            batches += 1;
            self.stats.add_records(batch.len());
            self.stats.add_batch();
            debug!(
                "Batch {batches} for '{}': {} records",
                spec.name,
                batch.len()
            );

            if self.options.max_batches > 0 && batches >= self.options.max_batches {
                debug!("Reached batch limit for '{}', stopping early", spec.name);
                return Ok((records, batches));
            }
        }

        // The strategy's terminal bookmark changes (a completed sweep clears
        // its page) land after the last yielded batch; checkpoint them too.
        self.state.save().await?;
        sink.write_state(&self.state.snapshot().await)?;

        Ok((records, batches))
    }

    /// Sync a set of streams into the sink
    ///
    /// With `fail_fast` the first stream error aborts the run and is
    /// returned; otherwise failed streams are recorded in the report and the
    /// remaining streams still run.
    pub async fn sync(
        &mut self,
        streams: &[StreamSpec],
        sink: &mut dyn BatchSink,
    ) -> Result<SyncReport> {
        let run_start = Instant::now();
        let mut outcomes = Vec::with_capacity(streams.len());

        for spec in streams {
            let stream_start = Instant::now();
            match self.sync_stream(spec, sink).await {
                Ok(outcome) => outcomes.push(outcome),
                Err(e) => {
                    error!("Stream '{}' failed: {e}", spec.name);
                    if self.options.fail_fast {
                        return Err(e);
                    }
                    #[allow(clippy::cast_possible_truncation)]
                    let duration_ms = stream_start.elapsed().as_millis() as u64;
                    outcomes.push(StreamOutcome::failure(&spec.name, duration_ms, &e));
                }
            }
        }

        #[allow(clippy::cast_possible_truncation)]
        self.stats.set_duration(run_start.elapsed().as_millis() as u64);

        Ok(SyncReport {
            outcomes,
            stats: self.stats.clone(),
        })
    }
}

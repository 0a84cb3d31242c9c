//! Extraction strategies and bookmark-driven resume
//!
//! Supports: incremental fetch, ordered pagination, native-sequence offsets,
//! locally filtered sweeps, unpaginated full refresh
//!
//! # Overview
//!
//! The pull module turns a remote paginated source into a lazy sequence of
//! record batches. Each strategy reads its resume position from the bookmark
//! store and moves the bookmarks forward before yielding a batch, so a
//! consumer that stops iterating at any point loses at most the batch it was
//! never handed. The next run picks up from the persisted bookmarks.

mod context;
mod strategies;

pub use context::PullContext;
pub use strategies::{
    strategy_for, FilteredSweepPull, FullRefreshPull, IncrementalPull, PagedPull, PullStrategy,
    SequencePull, MAX_PAGES_PER_RUN,
};

#[cfg(test)]
mod tests;

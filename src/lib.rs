// Allow common clippy pedantic lints that aren't critical for this codebase
#![allow(clippy::cast_possible_truncation)]
#![allow(clippy::cast_sign_loss)]
#![allow(clippy::too_many_lines)]
#![allow(clippy::ref_option)]
#![allow(clippy::unused_self)]
#![allow(clippy::must_use_candidate)]
#![allow(clippy::items_after_statements)]
#![allow(clippy::match_same_arms)]
#![allow(clippy::needless_pass_by_value)]

//! # Pullkit
//!
//! A minimal, Rust-native engine for incremental extraction from paginated,
//! rate-limited HTTP APIs. Streams resume from persisted bookmarks, so a run
//! picks up where the previous one stopped.
//!
//! ## Features
//!
//! - **Resumable extraction**: Bookmarks are persisted after every delivered batch
//! - **Five pull strategies**: Incremental, paged, sequence, filtered sweep, full refresh
//! - **Backoff and refresh**: Exponential backoff on rate limits, one credential refresh on 401
//! - **YAML source definitions**: Streams, record paths, and wire parameters in one file
//! - **JSONL output**: RECORD/STATE message stream for downstream loaders
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use std::sync::Arc;
//!
//! use pullkit::catalog::load_source;
//! use pullkit::config::RunConfig;
//! use pullkit::engine::SyncEngine;
//! use pullkit::metrics::TracingObserver;
//! use pullkit::retry::Fetcher;
//! use pullkit::sink::JsonlSink;
//! use pullkit::source::HttpSource;
//! use pullkit::state::StateStore;
//!
//! #[tokio::main]
//! async fn main() -> pullkit::Result<()> {
//!     // Where records live and how each stream is pulled
//!     let source_def = load_source("sources/books.yaml")?;
//!     // Per-run knobs: start date, auth, retry budget
//!     let config = RunConfig::load("config.json")?;
//!     // Bookmarks from the previous run, if any
//!     let state = StateStore::from_file("state.json")?;
//!
//!     let credentials = config.auth.credential_store();
//!     let source = Arc::new(HttpSource::with_config(
//!         source_def.clone(),
//!         credentials.clone(),
//!         config.http_source_config(),
//!     ));
//!     let fetcher = Fetcher::new(
//!         source,
//!         config.auth.token_refresher(&credentials),
//!         config.retry_policy(),
//!         Arc::new(TracingObserver),
//!     );
//!
//!     let mut engine = SyncEngine::new(fetcher, state, config.start_date.clone());
//!     let mut sink = JsonlSink::new(std::io::stdout());
//!     let report = engine.sync(&source_def.streams, &mut sink).await?;
//!     println!("{} records", report.stats.records_synced);
//!     Ok(())
//! }
//! ```
//!
//! ## Architecture
//!
//! ```text
//! ┌────────────────────────────────────────────────────────────────┐
//! │                           SyncEngine                           │
//! │  sync_stream(spec, sink) → StreamOutcome                       │
//! │  sync(streams, sink) → SyncReport                              │
//! └────────────────────────────────────────────────────────────────┘
//!                                 │
//! ┌────────────┬───────────┬──────┴──────┬────────────┬────────────┐
//! │ Strategies │ Fetch     │ Source      │ State      │ Sink       │
//! ├────────────┼───────────┼─────────────┼────────────┼────────────┤
//! │ Incremental│ Backoff   │ HTTP + auth │ Bookmarks  │ JSONL      │
//! │ Paged      │ Refresh   │ Rate limit  │ Atomic save│ Messages   │
//! │ Sequence   │ Timings   │ Record path │ Snapshot   │ Collect    │
//! │ Sweep      │           │ Page guard  │            │            │
//! │ FullRefresh│           │             │            │            │
//! └────────────┴───────────┴─────────────┴────────────┴────────────┘
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]
#![allow(clippy::must_use_candidate)]
#![allow(clippy::missing_errors_doc)]
#![allow(clippy::missing_panics_doc)]
#![allow(clippy::doc_markdown)]
#![allow(missing_docs)] // TODO: Add docs before 1.0 release

// ============================================================================
// Module declarations
// ============================================================================

/// Error types
pub mod error;

/// Common types and type aliases
pub mod types;

/// Credential storage and token refresh
pub mod auth;

/// Remote source over HTTP
pub mod source;

/// Retry-guarded fetching
pub mod retry;

/// Request observability
pub mod metrics;

/// Bookmark state and persistence
pub mod state;

/// Pull strategies
pub mod pull;

/// Source catalog loaded from YAML
pub mod catalog;

/// Run configuration
pub mod config;

/// Batch emission
pub mod sink;

/// Sync engine
pub mod engine;

/// Command-line interface
pub mod cli;

#[cfg(test)]
mod testutil;

// ============================================================================
// Re-exports
// ============================================================================

pub use error::{Error, Result};
pub use types::*;

// Re-export commonly used types
pub use catalog::{load_source, load_source_from_str, SourceDef, StreamSpec};

/// Crate version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Crate name
pub const NAME: &str = env!("CARGO_PKG_NAME");

//! Shared test doubles for unit tests
//!
//! Compiled only for `cfg(test)`. Provides a scripted remote source, a
//! counting token refresher, and record constructors used across the
//! retry, pull, and engine tests.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Mutex;

use async_trait::async_trait;
use serde_json::json;

use crate::auth::TokenRefresher;
use crate::error::{Error, Result};
use crate::source::{FetchOptions, RemoteSource};
use crate::types::{Batch, Record};

// ============================================================================
// Scripted Source
// ============================================================================

/// Remote source that replays a scripted sequence of outcomes and records
/// every call it receives.
pub struct ScriptedSource {
    script: Mutex<VecDeque<Result<Batch>>>,
    calls: Mutex<Vec<(String, FetchOptions)>>,
}

impl ScriptedSource {
    pub fn new(script: Vec<Result<Batch>>) -> Self {
        Self {
            script: Mutex::new(script.into_iter().collect()),
            calls: Mutex::new(Vec::new()),
        }
    }

    /// All calls received so far, in order.
    pub fn calls(&self) -> Vec<(String, FetchOptions)> {
        self.calls.lock().unwrap().clone()
    }

    pub fn call_count(&self) -> usize {
        self.calls.lock().unwrap().len()
    }

    /// Options passed on the `index`-th call.
    pub fn options_at(&self, index: usize) -> FetchOptions {
        self.calls.lock().unwrap()[index].1.clone()
    }
}

#[async_trait]
impl RemoteSource for ScriptedSource {
    async fn fetch(&self, stream: &str, options: &FetchOptions) -> Result<Batch> {
        self.calls
            .lock()
            .unwrap()
            .push((stream.to_string(), options.clone()));
        self.script
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| Err(Error::Other("scripted source exhausted".to_string())))
    }
}

// ============================================================================
// Counting Refresher
// ============================================================================

/// Token refresher that counts invocations and can be configured to fail.
pub struct CountingRefresher {
    refreshes: AtomicU32,
    fail: bool,
}

impl CountingRefresher {
    pub fn new() -> Self {
        Self {
            refreshes: AtomicU32::new(0),
            fail: false,
        }
    }

    /// A refresher whose `refresh` always fails.
    pub fn failing() -> Self {
        Self {
            refreshes: AtomicU32::new(0),
            fail: true,
        }
    }

    pub fn count(&self) -> u32 {
        self.refreshes.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl TokenRefresher for CountingRefresher {
    async fn refresh(&self) -> Result<()> {
        self.refreshes.fetch_add(1, Ordering::SeqCst);
        if self.fail {
            Err(Error::token_refresh("scripted refresh failure"))
        } else {
            Ok(())
        }
    }
}

// ============================================================================
// Record Constructors
// ============================================================================

/// An invoice-shaped record with the default bookmark property.
pub fn record(id: &str, updated: &str) -> Record {
    json!({
        "InvoiceID": id,
        "UpdatedDateUTC": updated,
    })
}

/// A journal-shaped record carrying a native sequence number.
pub fn journal(number: i64, created: &str) -> Record {
    json!({
        "JournalID": format!("j-{number}"),
        "JournalNumber": number,
        "CreatedDateUTC": created,
    })
}

/// Shorthand for a batch of invoice-shaped records.
pub fn batch(entries: &[(&str, &str)]) -> Batch {
    entries.iter().map(|(id, ts)| record(id, ts)).collect()
}

//! Bookmark types for tracking extraction progress
//!
//! These types are serialized to JSON and persisted between runs.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Complete persisted state: one bookmark per stream.
///
/// Unknown streams and unknown fields inside a loaded document are ignored,
/// and a missing bookmark materializes empty on first access, so a state
/// file from an older or newer build never aborts a run.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct State {
    /// Per-stream bookmarks, keyed by stream id
    #[serde(default)]
    pub bookmarks: HashMap<String, StreamBookmark>,
}

impl State {
    /// Create a new empty state
    pub fn new() -> Self {
        Self::default()
    }

    /// Get the bookmark for a stream
    pub fn bookmark(&self, stream: &str) -> Option<&StreamBookmark> {
        self.bookmarks.get(stream)
    }

    /// Get a mutable bookmark for a stream, creating it if needed
    pub fn bookmark_mut(&mut self, stream: &str) -> &mut StreamBookmark {
        self.bookmarks.entry(stream.to_string()).or_default()
    }

    /// Get the `updated_at` cursor for a stream
    pub fn updated_at(&self, stream: &str) -> Option<&str> {
        self.bookmarks.get(stream)?.updated_at.as_deref()
    }

    /// Set the `updated_at` cursor for a stream
    pub fn set_updated_at(&mut self, stream: &str, value: impl Into<String>) {
        self.bookmark_mut(stream).updated_at = Some(value.into());
    }

    /// Get the next page number for a stream
    pub fn page(&self, stream: &str) -> Option<u64> {
        self.bookmarks.get(stream)?.page
    }

    /// Set or clear the next page number for a stream
    pub fn set_page(&mut self, stream: &str, page: Option<u64>) {
        self.bookmark_mut(stream).page = page;
    }

    /// Get the native sequence position for a stream
    pub fn journal_number(&self, stream: &str) -> Option<i64> {
        self.bookmarks.get(stream)?.journal_number
    }

    /// Set the native sequence position for a stream
    pub fn set_journal_number(&mut self, stream: &str, value: i64) {
        self.bookmark_mut(stream).journal_number = Some(value);
    }
}

/// Bookmark for a single stream.
///
/// Which fields a stream uses depends on its pull mode; the rest stay
/// absent. `None` fields are omitted from the serialized document.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct StreamBookmark {
    /// High-water timestamp, stored verbatim from the last record of the
    /// most recent batch. Monotonically non-decreasing across runs.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub updated_at: Option<String>,

    /// Next page to request. Cleared when a sweep completes, so the next
    /// run starts over from the first page anchored by `updated_at`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub page: Option<u64>,

    /// Position in a server-native sequence. Never reset.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub journal_number: Option<i64>,
}

impl StreamBookmark {
    /// Create a new empty bookmark
    pub fn new() -> Self {
        Self::default()
    }

    /// Whether nothing has been recorded yet
    pub fn is_empty(&self) -> bool {
        self.updated_at.is_none() && self.page.is_none() && self.journal_number.is_none()
    }
}

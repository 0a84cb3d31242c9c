//! State store implementation
//!
//! Provides file-based state persistence with atomic writes.

use super::types::State;
use crate::error::{Error, Result};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::sync::RwLock;

/// Shared, optionally file-backed bookmark store.
///
/// Cloning shares the underlying state, so the engine and an embedding
/// application observe the same bookmarks. Persistence is explicit: the
/// sync driver calls [`StateStore::save`] after each batch has been handed
/// to the sink, which is what makes delivery at-least-once rather than
/// best-effort.
#[derive(Debug)]
pub struct StateStore {
    /// Path to the state file, if file-backed
    path: Option<PathBuf>,
    /// Current state (shared)
    state: Arc<RwLock<State>>,
}

impl StateStore {
    /// Create a store bound to a file path without reading it
    pub fn new(path: impl AsRef<Path>) -> Self {
        Self {
            path: Some(path.as_ref().to_path_buf()),
            state: Arc::new(RwLock::new(State::new())),
        }
    }

    /// Create an in-memory store (no file persistence)
    pub fn in_memory() -> Self {
        Self {
            path: None,
            state: Arc::new(RwLock::new(State::new())),
        }
    }

    /// Create a store from a file, loading existing state if present.
    ///
    /// An absent file is a first run and starts empty; an unreadable or
    /// unparseable file is an error, not silent data loss.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref().to_path_buf();
        let state = if path.exists() {
            let contents = std::fs::read_to_string(&path).map_err(|e| Error::State {
                message: format!("Failed to read state file: {e}"),
            })?;
            serde_json::from_str(&contents).map_err(|e| Error::State {
                message: format!("Failed to parse state file: {e}"),
            })?
        } else {
            State::new()
        };

        Ok(Self {
            path: Some(path),
            state: Arc::new(RwLock::new(state)),
        })
    }

    /// Create an in-memory store from an inline JSON string
    pub fn from_json(json: &str) -> Result<Self> {
        let state: State = serde_json::from_str(json).map_err(|e| Error::State {
            message: format!("Failed to parse state JSON: {e}"),
        })?;

        Ok(Self {
            path: None,
            state: Arc::new(RwLock::new(state)),
        })
    }

    /// Save current state to the bound file. No-op for in-memory stores.
    pub async fn save(&self) -> Result<()> {
        match &self.path {
            Some(path) => self.write_atomic(path).await,
            None => Ok(()),
        }
    }

    /// Save current state to a specific file path
    pub async fn save_to(&self, path: impl AsRef<Path>) -> Result<()> {
        self.write_atomic(path.as_ref()).await
    }

    // Write to a temp file first, then rename for atomicity.
    async fn write_atomic(&self, path: &Path) -> Result<()> {
        let contents = self.to_json_pretty().await?;

        let temp_path = path.with_extension("tmp");
        tokio::fs::write(&temp_path, &contents)
            .await
            .map_err(|e| Error::State {
                message: format!("Failed to write state file: {e}"),
            })?;

        tokio::fs::rename(&temp_path, path)
            .await
            .map_err(|e| Error::State {
                message: format!("Failed to rename state file: {e}"),
            })?;

        Ok(())
    }

    /// Clone of the current state, for emission
    pub async fn snapshot(&self) -> State {
        self.state.read().await.clone()
    }

    /// Export state as JSON string
    pub async fn to_json(&self) -> Result<String> {
        let state = self.state.read().await;
        serde_json::to_string(&*state).map_err(|e| Error::State {
            message: format!("Failed to serialize state: {e}"),
        })
    }

    /// Export state as pretty-printed JSON string
    pub async fn to_json_pretty(&self) -> Result<String> {
        let state = self.state.read().await;
        serde_json::to_string_pretty(&*state).map_err(|e| Error::State {
            message: format!("Failed to serialize state: {e}"),
        })
    }

    /// Get the `updated_at` cursor for a stream
    pub async fn updated_at(&self, stream: &str) -> Option<String> {
        let state = self.state.read().await;
        state.updated_at(stream).map(ToString::to_string)
    }

    /// Set the `updated_at` cursor for a stream
    pub async fn set_updated_at(&self, stream: &str, value: impl Into<String>) {
        let mut state = self.state.write().await;
        state.set_updated_at(stream, value);
    }

    /// Get the next page number for a stream
    pub async fn page(&self, stream: &str) -> Option<u64> {
        let state = self.state.read().await;
        state.page(stream)
    }

    /// Set or clear the next page number for a stream
    pub async fn set_page(&self, stream: &str, page: Option<u64>) {
        let mut state = self.state.write().await;
        state.set_page(stream, page);
    }

    /// Get the native sequence position for a stream
    pub async fn journal_number(&self, stream: &str) -> Option<i64> {
        let state = self.state.read().await;
        state.journal_number(stream)
    }

    /// Set the native sequence position for a stream
    pub async fn set_journal_number(&self, stream: &str, value: i64) {
        let mut state = self.state.write().await;
        state.set_journal_number(stream, value);
    }

    /// Drop all bookmarks for a stream (forces a full re-extraction)
    pub async fn clear_stream(&self, stream: &str) {
        let mut state = self.state.write().await;
        state.bookmarks.remove(stream);
    }

    /// Get the state file path, if file-backed
    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    /// Check if using in-memory mode
    pub fn is_in_memory(&self) -> bool {
        self.path.is_none()
    }
}

impl Clone for StateStore {
    fn clone(&self) -> Self {
        Self {
            path: self.path.clone(),
            state: Arc::clone(&self.state),
        }
    }
}

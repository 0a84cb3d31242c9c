//! Bookmark state module
//!
//! Handles cursor tracking and resumability. Bookmarks are persisted
//! between runs so every pull continues where the previous one stopped.
//!
//! # Overview
//!
//! The state module provides:
//! - `State` / `StreamBookmark` - the persisted bookmark document
//! - `StateStore` - shared handle with atomic file persistence

mod store;
mod types;

pub use store::StateStore;
pub use types::{State, StreamBookmark};

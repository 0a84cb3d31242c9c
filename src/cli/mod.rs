//! CLI module
//!
//! Command-line interface for running extractions.
//!
//! # Commands
//!
//! - `check` - Test connection to the API
//! - `sync` - Pull records from the configured streams
//! - `streams` - List configured streams
//! - `validate` - Validate the source definition and run configuration

mod commands;
mod runner;

pub use commands::{Cli, Commands, OutputFormat};
pub use runner::Runner;

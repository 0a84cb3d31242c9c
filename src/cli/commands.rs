//! CLI commands and argument parsing

use clap::{Parser, Subcommand};
use std::path::PathBuf;

/// Incremental API extraction CLI
#[derive(Parser, Debug)]
#[command(name = "pullkit")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Source definition file (YAML)
    #[arg(short, long, global = true)]
    pub source: Option<PathBuf>,

    /// Run configuration file (JSON)
    #[arg(short = 'C', long, global = true)]
    pub config: Option<PathBuf>,

    /// Inline run configuration JSON
    #[arg(long, global = true)]
    pub config_json: Option<String>,

    /// State file (JSON)
    #[arg(long, global = true)]
    pub state: Option<PathBuf>,

    /// Inline state JSON
    #[arg(long, global = true)]
    pub state_json: Option<String>,

    /// Output format
    #[arg(short, long, global = true, default_value = "json")]
    pub format: OutputFormat,

    /// Verbose output
    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Commands,
}

/// CLI subcommands
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Test connection to the API
    Check,

    /// Pull records from the configured streams
    Sync {
        /// Streams to sync (comma-separated, empty = all)
        #[arg(long)]
        streams: Option<String>,

        /// Write RECORD/STATE lines to this file instead of stdout
        #[arg(short, long)]
        output: Option<PathBuf>,

        /// Maximum batches per stream
        #[arg(long)]
        max_batches: Option<usize>,

        /// Continue with remaining streams when one fails
        #[arg(long)]
        keep_going: bool,

        /// Discard saved bookmarks for the selected streams before syncing
        #[arg(long)]
        full_resync: bool,
    },

    /// List configured streams
    Streams,

    /// Validate the source definition and run configuration
    Validate,
}

/// Output format
#[derive(Debug, Clone, Copy, PartialEq, Eq, clap::ValueEnum)]
pub enum OutputFormat {
    /// JSON output (one message per line)
    Json,
    /// Human-readable output
    Pretty,
}

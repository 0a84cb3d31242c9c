//! CLI runner - executes commands

use std::fs::File;
use std::io::BufWriter;
use std::path::Path;
use std::sync::Arc;
use std::time::Instant;

use serde_json::{json, Value};

use crate::catalog::{load_source, SourceDef};
use crate::cli::commands::{Cli, Commands, OutputFormat};
use crate::config::RunConfig;
use crate::engine::{SyncEngine, SyncOptions};
use crate::error::{Error, Result};
use crate::metrics::TracingObserver;
use crate::retry::Fetcher;
use crate::sink::{BatchSink, JsonlSink};
use crate::source::{FetchOptions, HttpSource, RemoteSource};
use crate::state::{State, StateStore};
use crate::types::Record;

/// CLI runner
pub struct Runner {
    cli: Cli,
}

impl Runner {
    /// Create a new runner
    pub fn new(cli: Cli) -> Self {
        Self { cli }
    }

    /// Run the CLI command
    pub async fn run(&self) -> Result<()> {
        match &self.cli.command {
            Commands::Check => self.check().await,
            Commands::Sync {
                streams,
                output,
                max_batches,
                keep_going,
                full_resync,
            } => {
                self.sync(
                    streams.as_deref(),
                    output.as_deref(),
                    *max_batches,
                    *keep_going,
                    *full_resync,
                )
                .await
            }
            Commands::Streams => self.streams(),
            Commands::Validate => self.validate(),
        }
    }

    /// Load the source definition
    fn load_source(&self) -> Result<SourceDef> {
        let path = self
            .cli
            .source
            .as_ref()
            .ok_or_else(|| Error::config("Source definition not specified (use -s flag)"))?;
        load_source(path)
    }

    /// Load the run configuration
    fn load_config(&self) -> Result<RunConfig> {
        // Inline config takes precedence
        if let Some(raw) = &self.cli.config_json {
            return RunConfig::from_json(raw);
        }
        if let Some(path) = &self.cli.config {
            return RunConfig::load(path);
        }
        Err(Error::config(
            "Run config not specified (use -C or --config-json)",
        ))
    }

    /// Load the bookmark store
    fn load_state(&self) -> Result<StateStore> {
        // Inline state takes precedence
        if let Some(raw) = &self.cli.state_json {
            StateStore::from_json(raw)
        } else if let Some(path) = &self.cli.state {
            StateStore::from_file(path)
        } else {
            Ok(StateStore::in_memory())
        }
    }

    /// Wire the retry-guarded fetch pipeline
    fn build_fetcher(source_def: &SourceDef, config: &RunConfig) -> Fetcher {
        let credentials = config.auth.credential_store();
        let source: Arc<dyn RemoteSource> = Arc::new(HttpSource::with_config(
            source_def.clone(),
            credentials.clone(),
            config.http_source_config(),
        ));
        let refresher = config.auth.token_refresher(&credentials);
        Fetcher::new(
            source,
            refresher,
            config.retry_policy(),
            Arc::new(TracingObserver),
        )
    }

    /// Check connection
    async fn check(&self) -> Result<()> {
        let source_def = self.load_source()?;
        let config = self.load_config()?;

        self.output_message(&json!({
            "type": "LOG",
            "log": {
                "level": "INFO",
                "message": format!("Checking connection to {}", source_def.name)
            }
        }));

        let fetcher = Self::build_fetcher(&source_def, &config);

        // The first configured stream serves as the probe target.
        let probe = source_def
            .streams
            .first()
            .ok_or_else(|| Error::config("Source has no streams"))?;

        match fetcher.fetch(&probe.name, &FetchOptions::new()).await {
            Ok(_) => {
                self.output_message(&json!({
                    "type": "CONNECTION_STATUS",
                    "connectionStatus": {
                        "status": "SUCCEEDED",
                        "message": "Connection successful"
                    }
                }));
            }
            Err(e) => {
                self.output_message(&json!({
                    "type": "CONNECTION_STATUS",
                    "connectionStatus": {
                        "status": "FAILED",
                        "message": format!("Connection failed: {e}")
                    }
                }));
            }
        }

        Ok(())
    }

    /// Pull the selected streams
    async fn sync(
        &self,
        streams: Option<&str>,
        output: Option<&Path>,
        max_batches: Option<usize>,
        keep_going: bool,
        full_resync: bool,
    ) -> Result<()> {
        let sync_start = Instant::now();
        let source_def = self.load_source()?;
        let config = self.load_config()?;
        let state = self.load_state()?;

        let names: Vec<String> = streams
            .map(|list| list.split(',').map(|s| s.trim().to_string()).collect())
            .unwrap_or_default();
        let selected = source_def.select_streams(&names)?;

        if full_resync {
            for spec in &selected {
                state.clear_stream(&spec.name).await;
            }
        }

        let mut options = SyncOptions::new();
        if let Some(max) = max_batches {
            options = options.with_max_batches(max);
        }

        let mut engine = SyncEngine::new(
            Self::build_fetcher(&source_def, &config),
            state,
            config.start_date.clone(),
        )
        .with_options(options);

        let mut sink: Box<dyn BatchSink> = match output {
            Some(path) => {
                let file = File::create(path).map_err(|e| {
                    Error::config(format!(
                        "Failed to create output file '{}': {e}",
                        path.display()
                    ))
                })?;
                Box::new(JsonlSink::new(BufWriter::new(file)))
            }
            None => Box::new(MessageSink::new(self.cli.format)),
        };

        // Track per-stream statistics
        let mut stream_results: Vec<Value> = Vec::new();
        let mut total_records = 0usize;
        let mut aborted: Option<Error> = None;

        for spec in &selected {
            let stream_start = Instant::now();
            let records_before = engine.stats().records_synced;

            self.output_message(&json!({
                "type": "LOG",
                "log": {
                    "level": "INFO",
                    "message": format!("Starting sync for stream: {}", spec.name)
                }
            }));

            let sync_result = engine.sync_stream(spec, sink.as_mut()).await;

            #[allow(clippy::cast_possible_truncation)]
            let stream_duration_ms = stream_start.elapsed().as_millis() as u64;
            let stream_records = engine.stats().records_synced - records_before;

            match sync_result {
                Ok(_) => {
                    total_records += stream_records;

                    stream_results.push(json!({
                        "stream": spec.name,
                        "status": "SUCCESS",
                        "records_synced": stream_records,
                        "duration_ms": stream_duration_ms
                    }));
                }
                Err(e) => {
                    self.output_message(&json!({
                        "type": "LOG",
                        "log": {
                            "level": "ERROR",
                            "message": format!("Error syncing stream {}: {e}", spec.name)
                        }
                    }));

                    total_records += stream_records;

                    stream_results.push(json!({
                        "stream": spec.name,
                        "status": "FAILED",
                        "error": e.to_string(),
                        "records_synced": stream_records,
                        "duration_ms": stream_duration_ms
                    }));

                    if !keep_going {
                        aborted = Some(e);
                        break;
                    }
                }
            }
        }

        // Persist final bookmarks. --state names the destination even when
        // the store was seeded from inline JSON.
        let state_file_path: Option<String> = if let Some(path) = &self.cli.state {
            engine.state().save_to(path).await?;
            Some(path.to_string_lossy().to_string())
        } else {
            engine.state().save().await?;
            engine
                .state()
                .path()
                .map(|p| p.to_string_lossy().to_string())
        };

        // Always emit final state to stdout so the caller can capture it
        let final_state = engine.state().snapshot().await;
        self.output_message(&json!({
            "type": "STATE",
            "state": final_state
        }));

        // Emit sync summary for programmatic consumption
        #[allow(clippy::cast_possible_truncation)]
        let total_duration_ms = sync_start.elapsed().as_millis() as u64;
        let successful_streams = stream_results
            .iter()
            .filter(|r| r["status"] == "SUCCESS")
            .count();
        let failed_streams = stream_results
            .iter()
            .filter(|r| r["status"] == "FAILED")
            .count();

        self.output_message(&json!({
            "type": "SYNC_SUMMARY",
            "summary": {
                "status": if failed_streams == 0 { "SUCCEEDED" } else if successful_streams == 0 { "FAILED" } else { "PARTIAL" },
                "source": source_def.name,
                "total_records": total_records,
                "total_streams": stream_results.len(),
                "successful_streams": successful_streams,
                "failed_streams": failed_streams,
                "duration_ms": total_duration_ms,
                "output": {
                    "format": match self.cli.format {
                        OutputFormat::Json => "json",
                        OutputFormat::Pretty => "pretty",
                    },
                    "file": output.map(|p| p.to_string_lossy().to_string()),
                    "state_file": state_file_path
                },
                "streams": stream_results
            }
        }));

        match aborted {
            Some(e) => Err(e),
            None => Ok(()),
        }
    }

    /// List streams
    fn streams(&self) -> Result<()> {
        let source_def = self.load_source()?;

        let streams: Vec<Value> = source_def
            .streams
            .iter()
            .map(|spec| {
                json!({
                    "name": spec.name,
                    "path": spec.path,
                    "mode": spec.mode.label()
                })
            })
            .collect();

        self.output_message(&json!({
            "type": "STREAMS",
            "streams": streams,
            "source": source_def.name
        }));

        Ok(())
    }

    /// Validate definition and config
    fn validate(&self) -> Result<()> {
        let source_def = self.load_source()?;

        let mut message = format!(
            "Source '{}' is valid with {} streams",
            source_def.name,
            source_def.streams.len()
        );
        if self.cli.config.is_some() || self.cli.config_json.is_some() {
            self.load_config()?;
            message.push_str(", run config is valid");
        }

        self.output_message(&json!({
            "type": "LOG",
            "log": {
                "level": "INFO",
                "message": message
            }
        }));

        Ok(())
    }

    /// Output a message
    fn output_message(&self, msg: &Value) {
        match self.cli.format {
            OutputFormat::Json => {
                println!("{}", serde_json::to_string(msg).unwrap_or_default());
            }
            OutputFormat::Pretty => {
                println!("{}", serde_json::to_string_pretty(msg).unwrap_or_default());
            }
        }
    }
}

// ============================================================================
// Stdout Sink
// ============================================================================

/// Sink that renders batches as stdout messages in the selected format
struct MessageSink {
    format: OutputFormat,
}

impl MessageSink {
    fn new(format: OutputFormat) -> Self {
        Self { format }
    }

    fn print(&self, msg: &Value) {
        match self.format {
            OutputFormat::Json => {
                println!("{}", serde_json::to_string(msg).unwrap_or_default());
            }
            OutputFormat::Pretty => {
                println!("{}", serde_json::to_string_pretty(msg).unwrap_or_default());
            }
        }
    }
}

impl BatchSink for MessageSink {
    fn write_batch(&mut self, stream: &str, records: &[Record]) -> Result<()> {
        let emitted_at = chrono::Utc::now().timestamp_millis();
        for record in records {
            self.print(&json!({
                "type": "RECORD",
                "record": {
                    "stream": stream,
                    "data": record,
                    "emitted_at": emitted_at
                }
            }));
        }
        Ok(())
    }

    fn write_state(&mut self, state: &State) -> Result<()> {
        self.print(&json!({
            "type": "STATE",
            "state": state
        }));
        Ok(())
    }
}

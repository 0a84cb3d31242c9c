//! Batch emission boundary
//!
//! Sinks receive every yielded batch and every state checkpoint. The JSONL
//! sink frames them as message-per-line JSON for piping into a downstream
//! loader; the collect sink buffers everything in memory for tests and
//! embedders.

use std::io::Write;

use chrono::Utc;
use serde_json::json;

use crate::error::Result;
use crate::state::State;
use crate::types::Record;

// ============================================================================
// Batch Sink
// ============================================================================

/// Consumer side of the extraction engine
///
/// Batches are handed over before the bookmark store is persisted; a sink
/// that fails mid-batch therefore sees that batch again on the next run.
pub trait BatchSink: Send {
    /// Handle one yielded batch for a stream
    fn write_batch(&mut self, stream: &str, records: &[Record]) -> Result<()>;

    /// Handle a state checkpoint taken after a batch was handed over
    fn write_state(&mut self, state: &State) -> Result<()>;
}

// ============================================================================
// JSONL Sink
// ============================================================================

/// Message-per-line JSON over any writer
pub struct JsonlSink<W: Write> {
    writer: W,
}

impl<W: Write> JsonlSink<W> {
    pub fn new(writer: W) -> Self {
        Self { writer }
    }

    /// Consume the sink and hand back the writer
    pub fn into_inner(self) -> W {
        self.writer
    }

    fn write_line(&mut self, message: &serde_json::Value) -> Result<()> {
        serde_json::to_writer(&mut self.writer, message)?;
        self.writer.write_all(b"\n")?;
        Ok(())
    }
}

impl<W: Write + Send> BatchSink for JsonlSink<W> {
    fn write_batch(&mut self, stream: &str, records: &[Record]) -> Result<()> {
        let emitted_at = Utc::now().timestamp_millis();
        for record in records {
            self.write_line(&json!({
                "type": "RECORD",
                "record": {
                    "stream": stream,
                    "data": record,
                    "emitted_at": emitted_at
                }
            }))?;
        }
        Ok(())
    }

    fn write_state(&mut self, state: &State) -> Result<()> {
        self.write_line(&json!({
            "type": "STATE",
            "state": state
        }))?;
        // A state line is a resume point downstream; it must not sit in the buffer.
        self.writer.flush()?;
        Ok(())
    }
}

// ============================================================================
// Collect Sink
// ============================================================================

/// In-memory sink for tests and embedders
#[derive(Debug, Default)]
pub struct CollectSink {
    /// Batches in emission order
    pub batches: Vec<(String, Vec<Record>)>,
    /// State snapshots in emission order
    pub states: Vec<State>,
}

impl CollectSink {
    pub fn new() -> Self {
        Self::default()
    }

    /// All records emitted for one stream, across batches
    pub fn records_for(&self, stream: &str) -> Vec<Record> {
        self.batches
            .iter()
            .filter(|(name, _)| name == stream)
            .flat_map(|(_, records)| records.clone())
            .collect()
    }

    /// Number of batches emitted so far
    pub fn batch_count(&self) -> usize {
        self.batches.len()
    }
}

impl BatchSink for CollectSink {
    fn write_batch(&mut self, stream: &str, records: &[Record]) -> Result<()> {
        self.batches.push((stream.to_string(), records.to_vec()));
        Ok(())
    }

    fn write_state(&mut self, state: &State) -> Result<()> {
        self.states.push(state.clone());
        Ok(())
    }
}

//! Source catalog
//!
//! Declarative definition of the remote API and its streams, loaded from
//! YAML. The catalog says *where* records live and *how* each stream is
//! pulled; run-specific settings (credentials, start date) live in the run
//! configuration instead.

use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};
use std::path::Path;
use url::Url;

use crate::error::{Error, Result};

// ============================================================================
// Source Definition
// ============================================================================

/// Top-level source definition
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct SourceDef {
    /// Source name
    pub name: String,
    /// Base URL for all requests
    pub base_url: String,
    /// How the incremental `since` instant is sent to the remote
    #[serde(default)]
    pub since: SinceParam,
    /// Query parameter carrying the server-side ordering clause
    #[serde(default = "default_order_param")]
    pub order_param: String,
    /// Global headers
    #[serde(default)]
    pub headers: HashMap<String, String>,
    /// Stream definitions
    pub streams: Vec<StreamSpec>,
}

fn default_order_param() -> String {
    "order".to_string()
}

impl SourceDef {
    /// Look up a stream by name
    pub fn stream(&self, name: &str) -> Option<&StreamSpec> {
        self.streams.iter().find(|s| s.name == name)
    }

    /// All stream names, in definition order
    pub fn stream_names(&self) -> Vec<&str> {
        self.streams.iter().map(|s| s.name.as_str()).collect()
    }

    /// Resolve a stream selection against the definition.
    ///
    /// An empty selection means every stream, in definition order. Unknown
    /// names are an error rather than a silent skip.
    pub fn select_streams(&self, names: &[String]) -> Result<Vec<StreamSpec>> {
        if names.is_empty() {
            return Ok(self.streams.clone());
        }
        names
            .iter()
            .map(|name| {
                self.stream(name)
                    .cloned()
                    .ok_or_else(|| Error::config(format!("Unknown stream: {name}")))
            })
            .collect()
    }

    /// Validate the definition
    pub fn validate(&self) -> Result<()> {
        if self.name.is_empty() {
            return Err(Error::missing_field("name"));
        }

        Url::parse(&self.base_url)?;

        if self.streams.is_empty() {
            return Err(Error::config("Source must define at least one stream"));
        }

        let mut seen = HashSet::new();
        for stream in &self.streams {
            if stream.name.is_empty() {
                return Err(Error::missing_field("streams[].name"));
            }
            if !seen.insert(stream.name.as_str()) {
                return Err(Error::config(format!(
                    "Duplicate stream name: {}",
                    stream.name
                )));
            }
            stream.validate()?;
        }

        Ok(())
    }
}

// ============================================================================
// Since Parameter
// ============================================================================

/// Where and under which name the `since` instant goes on the wire
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub struct SinceParam {
    /// Header or query parameter
    #[serde(default)]
    pub location: ParamLocation,
    /// Parameter or header name
    #[serde(default = "default_since_name")]
    pub name: String,
}

impl Default for SinceParam {
    fn default() -> Self {
        Self {
            location: ParamLocation::default(),
            name: default_since_name(),
        }
    }
}

fn default_since_name() -> String {
    "since".to_string()
}

/// Location of a wire parameter
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "snake_case")]
pub enum ParamLocation {
    /// Request header
    Header,
    /// URL query parameter
    #[default]
    Query,
}

// ============================================================================
// Pull Mode
// ============================================================================

/// Extraction strategy for a stream.
///
/// A closed set: each variant maps to exactly one pull strategy, selected
/// at sync time. Strategy-specific knobs ride on the variant.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum PullMode {
    /// Single filtered fetch; cursor advances from the batch
    Incremental,
    /// Page-numbered sweep with server-side ordering
    #[default]
    Paged,
    /// Server-native sequence offsets
    Sequence {
        /// Record field holding the sequence number
        sequence_field: String,
    },
    /// Page-numbered sweep filtered locally by timestamp
    FilteredSweep,
    /// Everything in one unfiltered fetch
    FullRefresh,
}

impl PullMode {
    /// Short human-readable label
    pub fn label(&self) -> &'static str {
        match self {
            PullMode::Incremental => "incremental",
            PullMode::Paged => "paged",
            PullMode::Sequence { .. } => "sequence",
            PullMode::FilteredSweep => "filtered_sweep",
            PullMode::FullRefresh => "full_refresh",
        }
    }
}

// ============================================================================
// Stream Definition
// ============================================================================

/// Stream definition
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct StreamSpec {
    /// Stream name
    pub name: String,
    /// URL path relative to the base URL
    pub path: String,
    /// Path to the records inside the response body; `None` takes the
    /// whole body
    #[serde(default)]
    pub record_path: Option<String>,
    /// Record field the `updated_at` cursor is read from
    #[serde(default = "default_bookmark_property")]
    pub bookmark_property: String,
    /// Extraction strategy
    #[serde(default)]
    pub mode: PullMode,
    /// Query parameter carrying the page number
    #[serde(default = "default_page_param")]
    pub page_param: String,
    /// Query parameter carrying the sequence offset
    #[serde(default = "default_offset_param")]
    pub offset_param: String,
    /// First page number of a fresh sweep
    #[serde(default = "default_first_page")]
    pub first_page: u64,
    /// Primary key fields
    #[serde(default)]
    pub primary_key: Vec<String>,
    /// Stream-specific headers
    #[serde(default)]
    pub headers: HashMap<String, String>,
}

fn default_bookmark_property() -> String {
    "UpdatedDateUTC".to_string()
}

fn default_page_param() -> String {
    "page".to_string()
}

fn default_offset_param() -> String {
    "offset".to_string()
}

fn default_first_page() -> u64 {
    1
}

impl StreamSpec {
    /// Create a stream spec with default parameters
    pub fn new(name: impl Into<String>, path: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            path: path.into(),
            record_path: None,
            bookmark_property: default_bookmark_property(),
            mode: PullMode::default(),
            page_param: default_page_param(),
            offset_param: default_offset_param(),
            first_page: default_first_page(),
            primary_key: Vec::new(),
            headers: HashMap::new(),
        }
    }

    /// Set the pull mode
    #[must_use]
    pub fn with_mode(mut self, mode: PullMode) -> Self {
        self.mode = mode;
        self
    }

    /// Set the bookmark property
    #[must_use]
    pub fn with_bookmark_property(mut self, property: impl Into<String>) -> Self {
        self.bookmark_property = property.into();
        self
    }

    /// Set the record path
    #[must_use]
    pub fn with_record_path(mut self, path: impl Into<String>) -> Self {
        self.record_path = Some(path.into());
        self
    }

    /// Set the first page of a fresh sweep
    #[must_use]
    pub fn with_first_page(mut self, page: u64) -> Self {
        self.first_page = page;
        self
    }

    /// The sequence field, when this is a sequence stream
    pub fn sequence_field(&self) -> Option<&str> {
        match &self.mode {
            PullMode::Sequence { sequence_field } => Some(sequence_field),
            _ => None,
        }
    }

    fn validate(&self) -> Result<()> {
        if self.path.is_empty() {
            return Err(Error::invalid_value(
                format!("streams.{}.path", self.name),
                "must not be empty",
            ));
        }
        if self.bookmark_property.is_empty() {
            return Err(Error::invalid_value(
                format!("streams.{}.bookmark_property", self.name),
                "must not be empty",
            ));
        }
        if let PullMode::Sequence { sequence_field } = &self.mode {
            if sequence_field.is_empty() {
                return Err(Error::invalid_value(
                    format!("streams.{}.mode.sequence_field", self.name),
                    "must not be empty",
                ));
            }
        }
        Ok(())
    }
}

// ============================================================================
// Loading
// ============================================================================

/// Load and validate a source definition from a YAML file
pub fn load_source(path: impl AsRef<Path>) -> Result<SourceDef> {
    let contents = std::fs::read_to_string(path.as_ref())?;
    load_source_from_str(&contents)
}

/// Load and validate a source definition from a YAML string
pub fn load_source_from_str(yaml: &str) -> Result<SourceDef> {
    let source: SourceDef = serde_yaml::from_str(yaml)?;
    source.validate()?;
    Ok(source)
}

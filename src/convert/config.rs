//! Conversion configuration
//!
//! Loaded from an optional JSON file; every key has a default. Command-line
//! flags are applied on top before `validate` runs.

use std::fs;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::avro::{Codec, DEFAULT_BLOCK_SIZE};
use crate::errors::{WalkError, WalkResult};

/// What a run writes to its output
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OutputMode {
    /// Avro object container
    #[default]
    Avro,
    /// One JSON object per line
    Json,
    /// Schema document only
    Schema,
}

impl OutputMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            OutputMode::Avro => "avro",
            OutputMode::Json => "json",
            OutputMode::Schema => "schema",
        }
    }
}

/// Settings of one conversion run
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConvertConfig {
    #[serde(default)]
    pub mode: OutputMode,

    #[serde(default)]
    pub codec: Codec,

    /// Uncompressed bytes buffered before a container block is flushed
    #[serde(default = "default_block_size")]
    pub block_size: usize,

    /// Top-level record name (defaults to the tree name)
    #[serde(default)]
    pub name: Option<String>,

    #[serde(default)]
    pub namespace: String,

    /// First entry, inclusive
    #[serde(default)]
    pub start: Option<u64>,

    /// Last entry, exclusive
    #[serde(default)]
    pub end: Option<u64>,

    #[serde(default)]
    pub debug: bool,
}

fn default_block_size() -> usize {
    DEFAULT_BLOCK_SIZE
}

impl Default for ConvertConfig {
    fn default() -> Self {
        Self {
            mode: OutputMode::default(),
            codec: Codec::default(),
            block_size: default_block_size(),
            name: None,
            namespace: String::new(),
            start: None,
            end: None,
            debug: false,
        }
    }
}

impl ConvertConfig {
    /// Load and validate configuration from a JSON file
    pub fn load(path: &Path) -> WalkResult<Self> {
        let content = fs::read_to_string(path).map_err(|e| {
            WalkError::io(format!("Failed to read config {}", path.display()), e)
        })?;

        let config: ConvertConfig = serde_json::from_str(&content)
            .map_err(|e| WalkError::invalid_argument(format!("Invalid config JSON: {}", e)))?;

        config.validate()?;

        Ok(config)
    }

    pub fn validate(&self) -> WalkResult<()> {
        if let (Some(start), Some(end)) = (self.start, self.end) {
            if start >= end {
                return Err(WalkError::invalid_argument(format!(
                    "start ({}) must be less than end ({})",
                    start, end
                )));
            }
        }

        if self.block_size == 0 {
            return Err(WalkError::invalid_argument("block_size must be > 0"));
        }

        if let Some(name) = &self.name {
            if name.is_empty() {
                return Err(WalkError::invalid_argument("name must not be empty"));
            }
        }

        if self.namespace.split('.').any(str::is_empty) && !self.namespace.is_empty() {
            return Err(WalkError::invalid_argument(format!(
                "Invalid namespace: '{}'",
                self.namespace
            )));
        }

        Ok(())
    }

    /// Record name, falling back to `tree`.
    pub fn record_name<'a>(&'a self, tree: &'a str) -> &'a str {
        self.name.as_deref().unwrap_or(tree)
    }
}

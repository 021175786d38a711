//! CLI argument definitions using clap
//!
//! ```text
//! tree2avro [OPTIONS] <INPUT>... <TREE>
//! ```

use clap::{Parser, ValueEnum};
use std::path::PathBuf;

use crate::avro::Codec;
use crate::convert::OutputMode;

/// tree2avro - stream typed trees as Avro or JSON
#[derive(Parser, Debug, Clone)]
#[command(name = "tree2avro")]
#[command(version, about, long_about = None)]
pub struct Cli {
    /// Tree files to chain, followed by the tree name
    #[arg(required = true, num_args = 2.., value_name = "INPUT")]
    pub paths: Vec<String>,

    /// First entry to convert (inclusive)
    #[arg(long)]
    pub start: Option<u64>,

    /// Last entry to convert (exclusive)
    #[arg(long)]
    pub end: Option<u64>,

    /// Output mode
    #[arg(long, value_enum)]
    pub mode: Option<ModeArg>,

    /// Container block codec
    #[arg(long, value_enum)]
    pub codec: Option<CodecArg>,

    /// Top-level record name (defaults to the tree name)
    #[arg(long)]
    pub name: Option<String>,

    /// Schema namespace
    #[arg(long = "ns")]
    pub namespace: Option<String>,

    /// Uncompressed bytes per container block
    #[arg(long)]
    pub block_size: Option<usize>,

    /// JSON configuration file; flags override its values
    #[arg(long)]
    pub config: Option<PathBuf>,

    /// Print walker description and schema instead of records
    #[arg(short, long)]
    pub debug: bool,
}

#[derive(ValueEnum, Debug, Clone, Copy, PartialEq, Eq)]
pub enum ModeArg {
    Avro,
    Json,
    Schema,
}

impl From<ModeArg> for OutputMode {
    fn from(mode: ModeArg) -> Self {
        match mode {
            ModeArg::Avro => OutputMode::Avro,
            ModeArg::Json => OutputMode::Json,
            ModeArg::Schema => OutputMode::Schema,
        }
    }
}

#[derive(ValueEnum, Debug, Clone, Copy, PartialEq, Eq)]
pub enum CodecArg {
    Null,
    Deflate,
}

impl From<CodecArg> for Codec {
    fn from(codec: CodecArg) -> Self {
        match codec {
            CodecArg::Null => Codec::Null,
            CodecArg::Deflate => Codec::Deflate,
        }
    }
}

impl Cli {
    /// Parse command line arguments
    pub fn parse_args() -> Self {
        Cli::parse()
    }

    /// Input files (every positional but the last)
    pub fn inputs(&self) -> &[String] {
        match self.paths.split_last() {
            Some((_, inputs)) => inputs,
            None => &[],
        }
    }

    /// Tree name (the last positional)
    pub fn tree(&self) -> &str {
        self.paths.last().map(String::as_str).unwrap_or_default()
    }
}

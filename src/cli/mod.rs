//! Command-line interface
//!
//! `tree2avro [OPTIONS] <INPUT>... <TREE>` converts one tree, chained over
//! the input files, to stdout.

mod args;
mod commands;
mod errors;

pub use args::{Cli, CodecArg, ModeArg};
pub use commands::{load_config, run, run_with};
pub use errors::{CliError, CliErrorCode, CliResult};

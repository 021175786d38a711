//! CLI command implementation
//!
//! Order of work:
//! 1. Configuration (file, then flags) and validation
//! 2. Tree files opened and chained
//! 3. Conversion to stdout
//!
//! A bad configuration is reported before any input file is touched.

use std::io::{self, BufWriter, Write};
use std::path::Path;

use crate::convert::{ConversionStats, ConvertConfig, Converter};
use crate::entry::{EntrySource, FixtureSource, TreeFile};
use crate::observability::{log_event_with_fields, Event, Logger, Severity};

use super::args::Cli;
use super::errors::CliResult;

/// Main CLI entry point
///
/// Parses arguments and converts to stdout.
/// This is the only function that main.rs should call.
pub fn run() -> CliResult<()> {
    let cli = Cli::parse_args();
    let stdout = io::stdout();
    let mut out = BufWriter::new(stdout.lock());
    run_with(cli, &mut out)?;
    out.flush()?;
    Ok(())
}

/// Runs parsed arguments against any output.
pub fn run_with(cli: Cli, out: &mut dyn Write) -> CliResult<ConversionStats> {
    let config = load_config(&cli)?;
    if config.debug {
        Logger::set_min_severity(Severity::Trace);
    }
    log_event_with_fields(
        Event::ConfigLoaded,
        &[
            ("mode", config.mode.as_str()),
            ("codec", config.codec.name()),
            ("debug", if config.debug { "true" } else { "false" }),
        ],
    );

    let mut source = open_inputs(cli.inputs(), cli.tree())?;
    let dictionary = source.dictionary();

    let converter = Converter::new(config, cli.tree());
    let stats = converter.run(&mut source, dictionary, out)?;
    Ok(stats)
}

/// Config file values with command-line flags applied on top
pub fn load_config(cli: &Cli) -> CliResult<ConvertConfig> {
    let mut config = match &cli.config {
        Some(path) => ConvertConfig::load(path)?,
        None => ConvertConfig::default(),
    };

    if cli.start.is_some() {
        config.start = cli.start;
    }
    if cli.end.is_some() {
        config.end = cli.end;
    }
    if let Some(mode) = cli.mode {
        config.mode = mode.into();
    }
    if let Some(codec) = cli.codec {
        config.codec = codec.into();
    }
    if let Some(name) = &cli.name {
        config.name = Some(name.clone());
    }
    if let Some(namespace) = &cli.namespace {
        config.namespace = namespace.clone();
    }
    if let Some(block_size) = cli.block_size {
        config.block_size = block_size;
    }
    config.debug |= cli.debug;

    config.validate()?;
    Ok(config)
}

fn open_inputs(inputs: &[String], tree: &str) -> CliResult<FixtureSource> {
    let mut files = Vec::with_capacity(inputs.len());
    for input in inputs {
        files.push((input.clone(), TreeFile::load(Path::new(input))?));
    }
    let source = FixtureSource::from_files(files, tree)?;

    log_event_with_fields(
        Event::InputOpened,
        &[
            ("tree", tree),
            ("files", &inputs.len().to_string()),
            ("entries", &source.num_entries().to_string()),
        ],
    );
    Ok(source)
}

//! Conversion pipeline
//!
//! 1. Validate configuration
//! 2. Discover the walker tree from the declared fields
//! 3. Resolve nullable fields against records from `start` on
//! 4. Emit the schema, JSON lines, or an Avro container
//!
//! Each record is encoded into a scratch buffer and only written once it
//! has encoded completely.

mod config;

pub use config::{ConvertConfig, OutputMode};

use std::io::Write;
use std::rc::Rc;

use crate::avro::ContainerWriter;
use crate::dictionary::Dictionary;
use crate::entry::EntrySource;
use crate::errors::{WalkError, WalkResult};
use crate::observability::{log_event_with_fields, Event, ObservationScope};
use crate::walker::TreeWalker;

/// Counters of a finished run
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ConversionStats {
    pub records: u64,
    /// Container blocks, zero outside Avro mode
    pub blocks: u64,
}

/// Runs one configured conversion.
#[derive(Debug, Clone)]
pub struct Converter {
    config: ConvertConfig,
    tree: String,
}

impl Converter {
    pub fn new(config: ConvertConfig, tree: impl Into<String>) -> Self {
        Self {
            config,
            tree: tree.into(),
        }
    }

    pub fn config(&self) -> &ConvertConfig {
        &self.config
    }

    pub fn run(
        &self,
        source: &mut dyn EntrySource,
        dictionary: Rc<Dictionary>,
        output: &mut dyn Write,
    ) -> WalkResult<ConversionStats> {
        match self.convert(source, dictionary, output) {
            Ok(stats) => {
                log_event_with_fields(
                    Event::ConversionComplete,
                    &[
                        ("mode", self.mode_label()),
                        ("records", &stats.records.to_string()),
                        ("blocks", &stats.blocks.to_string()),
                    ],
                );
                Ok(stats)
            }
            Err(err) => {
                log_event_with_fields(
                    Event::ConversionFailed,
                    &[("code", err.code().code()), ("reason", err.message())],
                );
                Err(err)
            }
        }
    }

    fn mode_label(&self) -> &'static str {
        if self.config.debug {
            "debug"
        } else {
            self.config.mode.as_str()
        }
    }

    fn convert(
        &self,
        source: &mut dyn EntrySource,
        dictionary: Rc<Dictionary>,
        output: &mut dyn Write,
    ) -> WalkResult<ConversionStats> {
        self.config.validate()?;

        let total = source.num_entries();
        let start = self.config.start.unwrap_or(0);
        let end = self.config.end.unwrap_or(total).min(total);
        if start > total {
            return Err(WalkError::invalid_argument(format!(
                "start ({}) is past the last entry ({})",
                start, total
            )));
        }

        let scope = ObservationScope::with_fields("DISCOVERY", &[("tree", self.tree.as_str())]);
        let mut tree = match TreeWalker::discover(source, dictionary, &self.config.namespace) {
            Ok(tree) => tree,
            Err(err) => {
                scope.fail(err.message());
                return Err(err);
            }
        };
        scope.complete_with_fields(&[("roots", &tree.roots().len().to_string())]);

        self.resolve(&mut tree, source, start, end)?;

        let name = self.config.record_name(&self.tree);
        let namespace = self.config.namespace.as_str();
        tree.check_record_name(name, namespace)?;

        if self.config.debug {
            let report = serde_json::json!({
                "walkers": tree.describe(),
                "schema": tree.avro_schema(name, namespace),
            });
            write_pretty(output, &report)?;
            return Ok(ConversionStats::default());
        }

        match self.config.mode {
            OutputMode::Schema => {
                write_pretty(output, &tree.avro_schema(name, namespace))?;
                log_event_with_fields(Event::SchemaWritten, &[("name", name)]);
                Ok(ConversionStats::default())
            }
            OutputMode::Json => {
                source.seek(start)?;
                let mut scratch = String::new();
                let mut records = 0;
                for _ in start..end {
                    source.advance()?;
                    scratch.clear();
                    tree.write_json(source, &mut scratch)?;
                    scratch.push('\n');
                    output.write_all(scratch.as_bytes())?;
                    records += 1;
                }
                output.flush()?;
                Ok(ConversionStats { records, blocks: 0 })
            }
            OutputMode::Avro => {
                let schema = tree.avro_schema(name, namespace);
                let mut container = ContainerWriter::new(
                    output,
                    &schema,
                    self.config.codec,
                    self.config.block_size,
                )?;
                source.seek(start)?;
                let mut scratch = Vec::new();
                for _ in start..end {
                    source.advance()?;
                    scratch.clear();
                    tree.write_avro(source, &mut scratch)?;
                    container.append(&scratch)?;
                }
                container.close()?;
                Ok(ConversionStats {
                    records: container.records(),
                    blocks: container.blocks(),
                })
            }
        }
    }

    /// Feeds records from `start` until every field resolved or `end`.
    fn resolve(
        &self,
        tree: &mut TreeWalker,
        source: &mut dyn EntrySource,
        start: u64,
        end: u64,
    ) -> WalkResult<()> {
        let scope = ObservationScope::new("RESOLVE");
        source.seek(start)?;
        let mut sampled = 0u64;
        let mut entry = start;
        while !tree.is_resolved() && entry < end && source.has_next() {
            if let Err(err) = source.advance().and_then(|()| tree.resolve(&*source)) {
                scope.fail(err.message());
                return Err(err);
            }
            sampled += 1;
            entry += 1;
        }

        for field in tree.unresolved_fields() {
            let warning = WalkError::unresolved_field(field.as_str());
            log_event_with_fields(
                Event::UnresolvedField,
                &[
                    ("code", warning.code().code()),
                    ("field", &field),
                    ("reason", warning.message()),
                ],
            );
        }
        scope.complete_with_fields(&[("sampled", &sampled.to_string())]);
        Ok(())
    }
}

fn write_pretty(output: &mut dyn Write, value: &serde_json::Value) -> WalkResult<()> {
    let text = serde_json::to_string_pretty(value)
        .map_err(|e| WalkError::io_failure(format!("Cannot render JSON: {}", e)))?;
    output.write_all(text.as_bytes())?;
    output.write_all(b"\n")?;
    output.flush()?;
    Ok(())
}

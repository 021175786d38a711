//! CLI Tests
//!
//! Drives `cli::run_with` against temporary tree files:
//! - Argument validation happens before any input is opened
//! - Chained inputs, entry ranges and output modes

use std::io::Write;

use clap::Parser;
use serde_json::{json, Value};
use tempfile::NamedTempFile;
use tree2avro::avro::ContainerReader;
use tree2avro::cli::{run_with, Cli, CliErrorCode};

// =============================================================================
// Helper Functions
// =============================================================================

fn tree_file(entries: Value) -> NamedTempFile {
    let mut file = NamedTempFile::new().unwrap();
    let content = json!({
        "trees": {"events": {
            "branches": [
                {"name": "run", "type": "UInt_t"},
                {"name": "tag", "type": "TString"}
            ],
            "entries": entries
        }}
    });
    write!(file, "{}", content).unwrap();
    file
}

fn cli(args: &[&str]) -> Cli {
    let mut argv = vec!["tree2avro"];
    argv.extend_from_slice(args);
    Cli::try_parse_from(argv).unwrap()
}

fn path(file: &NamedTempFile) -> String {
    file.path().to_str().unwrap().to_string()
}

// =============================================================================
// Argument Validation Tests
// =============================================================================

/// start == end is rejected even though the input does not exist.
#[test]
fn test_empty_range_rejected_before_open() {
    let mut out = Vec::new();
    let err = run_with(
        cli(&["--start", "5", "--end", "5", "/does/not/exist.json", "events"]),
        &mut out,
    )
    .unwrap_err();
    assert_eq!(err.code(), CliErrorCode::ConfigError);
    assert!(out.is_empty());
}

#[test]
fn test_zero_block_size_rejected() {
    let file = tree_file(json!([]));
    let err = run_with(cli(&["--block-size", "0", &path(&file), "events"]), &mut Vec::new())
        .unwrap_err();
    assert_eq!(err.code(), CliErrorCode::ConfigError);
}

#[test]
fn test_unknown_tree_rejected() {
    let file = tree_file(json!([]));
    let err = run_with(cli(&[&path(&file), "missing"]), &mut Vec::new()).unwrap_err();
    assert!(err.message().contains("missing"));
}

// =============================================================================
// Output Mode Tests
// =============================================================================

/// Chained files concatenate; the range applies to the concatenation.
#[test]
fn test_json_over_chained_inputs() {
    let a = tree_file(json!([{"run": 1, "tag": "a"}, {"run": 2, "tag": "b"}]));
    let b = tree_file(json!([{"run": 3, "tag": "c"}]));

    let mut out = Vec::new();
    let stats = run_with(
        cli(&["--mode", "json", "--start", "1", &path(&a), &path(&b), "events"]),
        &mut out,
    )
    .unwrap();

    assert_eq!(stats.records, 2);
    assert_eq!(
        String::from_utf8(out).unwrap(),
        "{\"run\": 2, \"tag\": \"b\"}\n{\"run\": 3, \"tag\": \"c\"}\n"
    );
}

#[test]
fn test_schema_mode_prints_document() {
    let file = tree_file(json!([]));
    let mut out = Vec::new();
    run_with(
        cli(&["--mode", "schema", "--name", "Events", "--ns", "exp.daq", &path(&file), "events"]),
        &mut out,
    )
    .unwrap();

    let schema: Value = serde_json::from_slice(&out).unwrap();
    assert_eq!(
        schema,
        json!({
            "type": "record",
            "name": "Events",
            "namespace": "exp.daq",
            "fields": [
                {"name": "run", "type": "long"},
                {"name": "tag", "type": "string"}
            ]
        })
    );
}

#[test]
fn test_avro_mode_with_deflate() {
    let file = tree_file(json!([{"run": 7, "tag": "x"}, {"run": 8, "tag": "y"}]));
    let mut out = Vec::new();
    let stats = run_with(cli(&["--codec", "deflate", &path(&file), "events"]), &mut out).unwrap();
    assert_eq!(stats.records, 2);

    let reader = ContainerReader::parse(&out).unwrap();
    assert_eq!(reader.record_count(), 2);
    assert_eq!(reader.metadata("avro.codec"), Some(&b"deflate"[..]));
    assert_eq!(reader.schema().unwrap()["name"], json!("events"));
}

/// Debug mode prints walkers and schema but no records.
#[test]
fn test_debug_mode_describes_walkers() {
    let file = tree_file(json!([{"run": 1, "tag": "a"}]));
    let mut out = Vec::new();
    let stats = run_with(cli(&["-d", &path(&file), "events"]), &mut out).unwrap();
    assert_eq!(stats.records, 0);

    let report: Value = serde_json::from_slice(&out).unwrap();
    assert_eq!(report["walkers"]["roots"][0]["walker"], json!("leaf"));
    assert_eq!(report["walkers"]["roots"][1]["walker"], json!("string"));
    assert_eq!(report["schema"]["fields"][1]["type"], json!("string"));
}

/// Flags override values from the configuration file.
#[test]
fn test_config_file_with_flag_override() {
    let file = tree_file(json!([{"run": 1, "tag": "a"}]));
    let mut config = NamedTempFile::new().unwrap();
    write!(config, r#"{{"mode": "schema", "namespace": "from.file"}}"#).unwrap();

    let mut out = Vec::new();
    run_with(
        cli(&["--config", &path(&config), "--mode", "json", &path(&file), "events"]),
        &mut out,
    )
    .unwrap();
    assert_eq!(String::from_utf8(out).unwrap(), "{\"run\": 1, \"tag\": \"a\"}\n");
}

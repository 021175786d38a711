//! Conversion Tests
//!
//! End-to-end runs of the conversion pipeline over in-memory tree files:
//! - JSON lines text output
//! - Avro container output with both codecs
//! - Leaf dimensions and counters
//! - Degraded (never resolved) fields

use serde_json::{json, Value};
use tree2avro::avro::{Codec, ContainerReader, Decoder};
use tree2avro::convert::{ConversionStats, ConvertConfig, Converter, OutputMode};
use tree2avro::entry::{FixtureSource, TreeFile};
use tree2avro::errors::{WalkErrorCode, WalkResult};

// =============================================================================
// Helper Functions
// =============================================================================

fn source(tree: Value) -> FixtureSource {
    let file: TreeFile = serde_json::from_value(tree).unwrap();
    FixtureSource::from_files(vec![("test.json".to_string(), file)], "t").unwrap()
}

fn try_convert(tree: Value, config: ConvertConfig) -> WalkResult<(Vec<u8>, ConversionStats)> {
    let mut source = source(tree);
    let dictionary = source.dictionary();
    let mut out = Vec::new();
    let stats = Converter::new(config, "t").run(&mut source, dictionary, &mut out)?;
    Ok((out, stats))
}

fn convert(tree: Value, config: ConvertConfig) -> (Vec<u8>, ConversionStats) {
    try_convert(tree, config).unwrap()
}

fn json_lines(tree: Value) -> Vec<String> {
    let config = ConvertConfig {
        mode: OutputMode::Json,
        ..Default::default()
    };
    let (out, _) = convert(tree, config);
    String::from_utf8(out)
        .unwrap()
        .lines()
        .map(str::to_string)
        .collect()
}

fn counter_tree() -> Value {
    json!({
        "trees": {"t": {
            "branches": [
                {"name": "n", "type": "int"},
                {"name": "x", "type": "double", "dims": [{"counter": "n"}]},
                {"name": "label", "type": "string"}
            ],
            "entries": [
                {"n": 0, "x": [], "label": "empty"},
                {"n": 2, "x": [1.5, 2.5], "label": "two"},
                {"n": 1, "x": [-4.0], "label": "one"}
            ]
        }}
    })
}

// =============================================================================
// Text Output Tests
// =============================================================================

/// Scalar, string and vector roots render with ", " and ": " separators.
#[test]
fn test_json_line_exact_text() {
    let lines = json_lines(json!({
        "trees": {"t": {
            "branches": [
                {"name": "id", "type": "int"},
                {"name": "name", "type": "string"},
                {"name": "tags", "type": "vector<string>"}
            ],
            "entries": [{"id": 7, "name": "alice", "tags": ["a", "b"]}]
        }}
    }));
    assert_eq!(lines, vec![r#"{"id": 7, "name": "alice", "tags": ["a", "b"]}"#]);
}

/// uint32 max is widened to a 64-bit value, not wrapped.
#[test]
fn test_uint32_max_widened() {
    let tree = json!({
        "trees": {"t": {
            "branches": [{"name": "u", "type": "unsigned int"}],
            "entries": [{"u": 4294967295u64}]
        }}
    });
    assert_eq!(json_lines(tree.clone()), vec![r#"{"u": 4294967295}"#]);

    let (out, _) = convert(tree, ConvertConfig::default());
    let reader = ContainerReader::parse(&out).unwrap();
    assert_eq!(reader.schema().unwrap()["fields"][0]["type"], json!("long"));
    let mut dec = Decoder::new(&reader.blocks()[0].data);
    assert_eq!(dec.long().unwrap(), 4294967295);
}

/// A counter value of zero yields an empty sequence.
#[test]
fn test_zero_counter_is_empty_sequence() {
    let lines = json_lines(counter_tree());
    assert_eq!(
        lines,
        vec![
            r#"{"n": 0, "x": [], "label": "empty"}"#,
            r#"{"n": 2, "x": [1.5, 2.5], "label": "two"}"#,
            r#"{"n": 1, "x": [-4], "label": "one"}"#,
        ]
    );
}

/// Fixed dimensions nest around the flat values.
#[test]
fn test_fixed_dimensions_nest() {
    let lines = json_lines(json!({
        "trees": {"t": {
            "branches": [{"name": "m", "type": "short", "dims": [2, 3]}],
            "entries": [{"m": [[1, 2, 3], [4, 5, 6]]}]
        }}
    }));
    assert_eq!(lines, vec![r#"{"m": [[1, 2, 3], [4, 5, 6]]}"#]);
}

/// Entry range selects records; end is exclusive.
#[test]
fn test_entry_range() {
    let config = ConvertConfig {
        mode: OutputMode::Json,
        start: Some(1),
        end: Some(2),
        ..Default::default()
    };
    let (out, stats) = convert(counter_tree(), config);
    assert_eq!(stats.records, 1);
    assert_eq!(
        String::from_utf8(out).unwrap(),
        "{\"n\": 2, \"x\": [1.5, 2.5], \"label\": \"two\"}\n"
    );
}

// =============================================================================
// Container Output Tests
// =============================================================================

fn check_counter_container(codec: Codec) {
    let config = ConvertConfig {
        codec,
        namespace: "hep".to_string(),
        ..Default::default()
    };
    let (out, stats) = convert(counter_tree(), config);
    assert_eq!(stats.records, 3);
    assert_eq!(stats.blocks, 1);

    let reader = ContainerReader::parse(&out).unwrap();
    assert_eq!(reader.codec(), codec);
    assert_eq!(reader.record_count(), 3);
    assert_eq!(
        reader.schema().unwrap(),
        json!({
            "type": "record",
            "name": "t",
            "namespace": "hep",
            "fields": [
                {"name": "n", "type": "int"},
                {"name": "x", "type": {"type": "array", "items": "double"}},
                {"name": "label", "type": "string"}
            ]
        })
    );

    let mut dec = Decoder::new(&reader.blocks()[0].data);
    let expected: [(i32, &[f64], &str); 3] =
        [(0, &[], "empty"), (2, &[1.5, 2.5], "two"), (1, &[-4.0], "one")];
    for (n, xs, label) in expected {
        assert_eq!(dec.int().unwrap(), n);
        if !xs.is_empty() {
            assert_eq!(dec.long().unwrap(), xs.len() as i64);
            for x in xs {
                assert_eq!(dec.double().unwrap(), *x);
            }
        }
        assert_eq!(dec.long().unwrap(), 0);
        assert_eq!(dec.string().unwrap(), label);
    }
    assert!(dec.is_empty());
}

#[test]
fn test_container_round_trip_null_codec() {
    check_counter_container(Codec::Null);
}

#[test]
fn test_container_round_trip_deflate_codec() {
    check_counter_container(Codec::Deflate);
}

/// Small block size forces one block per record.
#[test]
fn test_block_size_splits_blocks() {
    let config = ConvertConfig {
        block_size: 1,
        ..Default::default()
    };
    let (out, stats) = convert(counter_tree(), config);
    assert_eq!(stats.blocks, 3);
    let reader = ContainerReader::parse(&out).unwrap();
    assert!(reader.blocks().iter().all(|b| b.count == 1));
}

/// Pointers encode as unions: index 0 for null, 1 then the value.
#[test]
fn test_pointer_union_encoding() {
    let tree = json!({
        "classes": [{"name": "Node", "size": 16, "members": [
            {"name": "value", "type": "int", "offset": 0},
            {"name": "next", "type": "Node*", "offset": 8}
        ]}],
        "trees": {"t": {
            "branches": [{"name": "head", "type": "Node"}],
            "entries": [{"head": {"value": 1, "next": {"value": 2, "next": null}}}]
        }}
    });
    let (out, _) = convert(tree, ConvertConfig::default());
    let reader = ContainerReader::parse(&out).unwrap();
    assert_eq!(reader.blocks()[0].data, vec![0x02, 0x02, 0x04, 0x00]);
}

// =============================================================================
// Degraded Output Tests
// =============================================================================

/// A pointer that is null in every entry degrades to the null placeholder.
#[test]
fn test_never_resolved_pointer_is_null() {
    let tree = json!({
        "classes": [{"name": "Hit", "size": 8, "members": [{"name": "e", "type": "double", "offset": 0}]}],
        "trees": {"t": {
            "branches": [{"name": "id", "type": "int"}, {"name": "best", "type": "Hit*"}],
            "entries": [{"id": 1, "best": null}, {"id": 2}]
        }}
    });
    assert_eq!(
        json_lines(tree.clone()),
        vec![r#"{"id": 1, "best": null}"#, r#"{"id": 2, "best": null}"#]
    );

    let (out, stats) = convert(tree, ConvertConfig::default());
    assert_eq!(stats.records, 2);
    let reader = ContainerReader::parse(&out).unwrap();
    assert_eq!(reader.schema().unwrap()["fields"][1]["type"], json!("null"));
    // null values take no bytes
    assert_eq!(reader.blocks()[0].data, vec![0x02, 0x04]);
}

/// A dynamic array element of another class than the first sample fails the run.
#[test]
fn test_element_type_mismatch_aborts() {
    let tree = json!({
        "classes": [
            {"name": "Hit", "size": 8, "members": [{"name": "e", "type": "double", "offset": 0}]},
            {"name": "Track", "size": 8, "members": [{"name": "pt", "type": "double", "offset": 0}]}
        ],
        "trees": {"t": {
            "branches": [{"name": "objs", "type": "TObjArray"}],
            "entries": [
                {"objs": [{"@type": "Hit", "e": 1.0}]},
                {"objs": [{"@type": "Track", "pt": 2.0}]}
            ]
        }}
    });
    let config = ConvertConfig {
        mode: OutputMode::Json,
        ..Default::default()
    };
    let err = try_convert(tree, config).unwrap_err();
    assert_eq!(err.code(), WalkErrorCode::ElementTypeMismatch);
}

/// Unknown class names are rejected at discovery, before any output.
#[test]
fn test_unknown_type_rejected_before_output() {
    let tree = json!({
        "trees": {"t": {"branches": [{"name": "m", "type": "Mystery"}], "entries": [{}]}}
    });
    let mut source = source(tree);
    let dictionary = source.dictionary();
    let mut out = Vec::new();
    let err = Converter::new(ConvertConfig::default(), "t")
        .run(&mut source, dictionary, &mut out)
        .unwrap_err();
    assert_eq!(err.code(), WalkErrorCode::UnsupportedType);
    assert!(out.is_empty());
}

/// A pointer pinned to one class rejects a later object of another class.
#[test]
fn test_pointer_subtype_change_aborts() {
    let tree = json!({
        "classes": [
            {"name": "Hit", "size": 8, "members": [{"name": "e", "type": "double", "offset": 0}]},
            {"name": "Muon", "size": 8, "members": [{"name": "pt", "type": "double", "offset": 0}]}
        ],
        "trees": {"t": {
            "branches": [{"name": "p", "type": "Hit*"}],
            "entries": [{"p": {"@type": "Muon", "pt": 1.0}}, {"p": {"e": 2.0}}]
        }}
    });
    for mode in [OutputMode::Json, OutputMode::Avro] {
        let config = ConvertConfig {
            mode,
            ..Default::default()
        };
        let err = try_convert(tree.clone(), config).unwrap_err();
        assert_eq!(err.code(), WalkErrorCode::ElementTypeMismatch);
    }
}

/// A back-reference pinned to one class rejects a target of another class.
#[test]
fn test_back_reference_subtype_change_aborts() {
    let tree = json!({
        "classes": [
            {"name": "Hit", "size": 8, "members": [{"name": "e", "type": "double", "offset": 0}]},
            {"name": "Muon", "size": 8, "members": [{"name": "pt", "type": "double", "offset": 0}]}
        ],
        "trees": {"t": {
            "branches": [
                {"name": "hits", "type": "TObjArray"},
                {"name": "muons", "type": "TObjArray"},
                {"name": "r", "type": "TRef"}
            ],
            "entries": [
                {"hits": [{"@type": "Hit", "@uid": 1, "e": 1.0}], "muons": [], "r": 1},
                {"hits": [], "muons": [{"@type": "Muon", "@uid": 2, "pt": 2.0}], "r": 2}
            ]
        }}
    });
    for mode in [OutputMode::Json, OutputMode::Avro] {
        let config = ConvertConfig {
            mode,
            ..Default::default()
        };
        let err = try_convert(tree.clone(), config).unwrap_err();
        assert_eq!(err.code(), WalkErrorCode::ElementTypeMismatch);
    }
}

/// The top-level record may not reuse the schema name of a class it contains.
#[test]
fn test_record_name_collision_rejected() {
    let tree = json!({
        "classes": [{"name": "Event", "size": 8, "members": [{"name": "id", "type": "int", "offset": 0}]}],
        "trees": {"t": {"branches": [{"name": "ev", "type": "Event"}], "entries": [{"ev": {"id": 1}}]}}
    });
    let config = ConvertConfig {
        mode: OutputMode::Schema,
        name: Some("Event".to_string()),
        ..Default::default()
    };
    let mut source = source(tree.clone());
    let dictionary = source.dictionary();
    let mut out = Vec::new();
    let err = Converter::new(config, "t")
        .run(&mut source, dictionary, &mut out)
        .unwrap_err();
    assert_eq!(err.code(), WalkErrorCode::InvalidArgument);
    assert!(out.is_empty());

    let config = ConvertConfig {
        mode: OutputMode::Schema,
        name: Some("Events".to_string()),
        ..Default::default()
    };
    let (out, _) = convert(tree, config);
    let schema: Value = serde_json::from_slice(&out).unwrap();
    assert_eq!(schema["name"], json!("Events"));
    assert_eq!(schema["fields"][0]["type"]["name"], json!("Event"));
}

//! Walker Schema Tests
//!
//! Tests for discovery, resolution and schema emission over a tree:
//! - Named records are defined once per document
//! - Resolution is monotonic
//! - The opcode stream reassembles into the nested document

use serde_json::{json, Value};
use tree2avro::entry::{EntrySource, FixtureSource, TreeFile};
use tree2avro::errors::WalkErrorCode;
use tree2avro::schema::{OpcodeRecorder, SchemaAssembler, SchemaElement};
use tree2avro::walker::TreeWalker;

// =============================================================================
// Helper Functions
// =============================================================================

fn source(tree: Value) -> FixtureSource {
    let file: TreeFile = serde_json::from_value(tree).unwrap();
    FixtureSource::from_files(vec![("test.json".to_string(), file)], "t").unwrap()
}

fn discover(source: &mut FixtureSource, namespace: &str) -> TreeWalker {
    let dictionary = source.dictionary();
    TreeWalker::discover(source, dictionary, namespace).unwrap()
}

/// Counts full record definitions with the given short name.
fn definitions(schema: &Value, name: &str) -> usize {
    match schema {
        Value::Object(map) => {
            let here = map.get("type") == Some(&json!("record"))
                && map.get("name") == Some(&json!(name));
            usize::from(here) + map.values().map(|v| definitions(v, name)).sum::<usize>()
        }
        Value::Array(items) => items.iter().map(|v| definitions(v, name)).sum(),
        _ => 0,
    }
}

/// Counts bare string references equal to `full_name`.
fn references(schema: &Value, full_name: &str) -> usize {
    match schema {
        Value::String(s) => usize::from(s == full_name),
        Value::Object(map) => map.values().map(|v| references(v, full_name)).sum(),
        Value::Array(items) => items.iter().map(|v| references(v, full_name)).sum(),
        _ => 0,
    }
}

fn linked_list() -> Value {
    json!({
        "classes": [{"name": "Node", "size": 16, "doc": "list node", "members": [
            {"name": "value", "type": "int", "offset": 0},
            {"name": "next", "type": "Node*", "offset": 8, "comment": "following node"}
        ]}],
        "trees": {"t": {
            "branches": [{"name": "head", "type": "Node*"}],
            "entries": [
                {"head": null},
                {"head": {"value": 1, "next": {"value": 2, "next": null}}},
                {"head": null}
            ]
        }}
    })
}

fn resolve_all(tree: &mut TreeWalker, source: &mut FixtureSource) {
    source.seek(0).unwrap();
    while source.has_next() && !tree.is_resolved() {
        source.advance().unwrap();
        tree.resolve(&*source).unwrap();
    }
}

// =============================================================================
// Schema Memoization Tests
// =============================================================================

/// A self-referential record is defined once; the recursion is a name reference.
#[test]
fn test_self_reference_defined_once() {
    let mut source = source(linked_list());
    let mut tree = discover(&mut source, "hep");
    resolve_all(&mut tree, &mut source);
    assert!(tree.is_resolved());

    let schema = tree.avro_schema("t", "hep");
    assert_eq!(definitions(&schema, "Node"), 1);
    let head = &schema["fields"][0]["type"];
    assert_eq!(head[0], json!("null"));
    assert_eq!(head[1]["doc"], json!("list node"));
    assert_eq!(
        head[1]["fields"][1],
        json!({"name": "next", "type": ["null", "hep.Node"], "doc": "following node"})
    );
}

/// Two records sharing a helper carry exactly one definition of it.
#[test]
fn test_shared_helper_defined_once() {
    let mut source = source(json!({
        "classes": [
            {"name": "geo::Point", "size": 16, "members": [
                {"name": "x", "type": "double", "offset": 0},
                {"name": "y", "type": "double", "offset": 8}
            ]},
            {"name": "Segment", "size": 32, "members": [
                {"name": "a", "type": "geo::Point", "offset": 0},
                {"name": "b", "type": "geo::Point", "offset": 16}
            ]},
            {"name": "Circle", "size": 24, "members": [
                {"name": "center", "type": "geo::Point", "offset": 0},
                {"name": "r", "type": "double", "offset": 16}
            ]}
        ],
        "trees": {"t": {
            "branches": [{"name": "seg", "type": "Segment"}, {"name": "circle", "type": "Circle"}],
            "entries": []
        }}
    }));
    let tree = discover(&mut source, "");
    let schema = tree.avro_schema("shapes", "");

    assert_eq!(definitions(&schema, "Point"), 1);
    assert_eq!(references(&schema, "geo.Point"), 2);
    assert_eq!(schema["fields"][0]["type"]["fields"][0]["type"]["namespace"], json!("geo"));
}

// =============================================================================
// Resolution Tests
// =============================================================================

/// Once resolved, later null samples change nothing.
#[test]
fn test_resolution_is_monotonic() {
    let mut source = source(linked_list());
    let mut tree = discover(&mut source, "");
    assert!(!tree.is_resolved());
    assert_eq!(tree.unresolved_fields(), vec!["head".to_string()]);

    // entry 0 is null: still unresolved
    source.advance().unwrap();
    tree.resolve(&source).unwrap();
    assert!(!tree.is_resolved());
    assert_eq!(tree.avro_schema("t", "")["fields"][0]["type"], json!("null"));

    source.advance().unwrap();
    tree.resolve(&source).unwrap();
    assert!(tree.is_resolved());
    let resolved = tree.avro_schema("t", "");

    source.advance().unwrap();
    tree.resolve(&source).unwrap();
    tree.resolve(&source).unwrap();
    assert!(tree.is_resolved());
    assert!(tree.unresolved_fields().is_empty());
    assert_eq!(tree.avro_schema("t", ""), resolved);

    let mut line = String::new();
    tree.write_json(&source, &mut line).unwrap();
    assert_eq!(line, r#"{"head": null}"#);
}

/// Resolved values render through the pinned runtime type.
#[test]
fn test_resolved_pointer_values() {
    let mut source = source(linked_list());
    let mut tree = discover(&mut source, "");
    resolve_all(&mut tree, &mut source);

    source.seek(1).unwrap();
    source.advance().unwrap();
    let mut line = String::new();
    tree.write_json(&source, &mut line).unwrap();
    assert_eq!(
        line,
        r#"{"head": {"value": 1, "next": {"value": 2, "next": null}}}"#
    );
}

/// A member first seen non-null three levels down is still pinned.
#[test]
fn test_deep_sample_resolves_shared_member() {
    let mut source = source(json!({
        "classes": [
            {"name": "Hit", "size": 8, "members": [{"name": "e", "type": "double", "offset": 0}]},
            {"name": "Node", "size": 24, "members": [
                {"name": "v", "type": "int", "offset": 0},
                {"name": "next", "type": "Node*", "offset": 8},
                {"name": "hit", "type": "Hit*", "offset": 16}
            ]}
        ],
        "trees": {"t": {
            "branches": [{"name": "head", "type": "Node"}],
            "entries": [{"head": {"v": 1, "next": {"v": 2, "next": {"v": 3, "hit": {"e": 9.5}}}}}]
        }}
    }));
    let mut tree = discover(&mut source, "");
    resolve_all(&mut tree, &mut source);
    assert!(tree.is_resolved());
    assert!(tree.unresolved_fields().is_empty());

    source.seek(0).unwrap();
    source.advance().unwrap();
    let mut line = String::new();
    tree.write_json(&source, &mut line).unwrap();
    assert_eq!(
        line,
        r#"{"head": {"v": 1, "next": {"v": 2, "next": {"v": 3, "next": null, "hit": {"e": 9.5}}, "hit": null}, "hit": null}}"#
    );
}

// =============================================================================
// Record Name Tests
// =============================================================================

/// A top-level name equal to a reachable class name is rejected.
#[test]
fn test_top_level_name_collision() {
    let mut source = source(json!({
        "classes": [{"name": "Event", "size": 8, "members": [{"name": "id", "type": "int", "offset": 0}]}],
        "trees": {"t": {"branches": [{"name": "ev", "type": "Event"}], "entries": []}}
    }));
    let tree = discover(&mut source, "");

    let err = tree.check_record_name("Event", "").unwrap_err();
    assert_eq!(err.code(), WalkErrorCode::InvalidArgument);
    assert!(tree.check_record_name("Event", "daq").is_ok());
    assert!(tree.check_record_name("Events", "").is_ok());

    // the document never defines a name twice
    let schema = tree.avro_schema("Event", "");
    assert_eq!(definitions(&schema, "Event"), 1);

    let mut assembler = SchemaAssembler::new();
    tree.build_schema("Event", "", &mut assembler);
    assert_eq!(assembler.finish().unwrap(), schema);
}

// =============================================================================
// Opcode Stream Tests
// =============================================================================

/// The flat stream rebuilds the same document as the nested emitter.
#[test]
fn test_opcode_stream_reassembles() {
    let mut source = source(json!({
        "classes": [
            {"name": "Node", "size": 16, "members": [
                {"name": "value", "type": "int", "offset": 0},
                {"name": "next", "type": "Node*", "offset": 8}
            ]},
            {"name": "Hit", "size": 8, "members": [{"name": "e", "type": "float", "offset": 0}]}
        ],
        "trees": {"t": {
            "branches": [
                {"name": "n", "type": "int"},
                {"name": "x", "type": "double", "dims": [3, {"counter": "n"}]},
                {"name": "head", "type": "Node"},
                {"name": "hits", "type": "vector<Hit>"},
                {"name": "flags", "type": "vector<bool>"},
                {"name": "objs", "type": "TObjArray"}
            ],
            "entries": [{
                "n": 1,
                "x": [[1.0], [2.0], [3.0]],
                "head": {"value": 1, "next": {"value": 2}},
                "hits": [{"e": 0.5}],
                "flags": [true],
                "objs": [{"@type": "Hit", "e": 1.0}]
            }]
        }}
    }));
    let mut tree = discover(&mut source, "org.example");
    resolve_all(&mut tree, &mut source);
    assert!(tree.is_resolved());

    let mut assembler = SchemaAssembler::new();
    tree.build_schema("t", "org.example", &mut assembler);
    assert_eq!(assembler.finish().unwrap(), tree.avro_schema("t", "org.example"));

    let mut recorder = OpcodeRecorder::new();
    tree.build_schema("t", "org.example", &mut recorder);
    let codes = recorder.codes();
    assert_eq!(codes.first(), Some(&SchemaElement::RecordName.code()));
    assert_eq!(codes.last(), Some(&SchemaElement::RecordEnd.code()));
    assert!(codes.iter().all(|c| *c <= 27));
    assert!(codes.contains(&SchemaElement::Reference.code()));
}

/// Debug description lists every root and record.
#[test]
fn test_describe_lists_roots_and_records() {
    let mut source = source(linked_list());
    let tree = discover(&mut source, "");
    let description = tree.describe();
    assert_eq!(description["roots"][0]["name"], json!("head"));
    assert_eq!(description["roots"][0]["walker"], json!("pointer"));
    assert_eq!(description["records"][0]["class"], json!("Node"));
}

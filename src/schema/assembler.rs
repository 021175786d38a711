//! Rebuilds a nested schema document from the flat instruction stream

use serde_json::{json, Map, Value};

use super::opcode::{SchemaBuilder, SchemaElement};
use crate::errors::{WalkError, WalkResult};

#[derive(Debug)]
enum Frame {
    Record {
        head: Map<String, Value>,
        fields: Vec<Value>,
        /// Field name and doc waiting for the field type
        pending: Option<(String, Option<String>)>,
    },
    Enum {
        head: Map<String, Value>,
        symbols: Vec<Value>,
    },
    Fixed {
        head: Map<String, Value>,
    },
    Array,
    Map,
    Union(Vec<Value>),
}

/// [`SchemaBuilder`] that reassembles the nested schema document.
#[derive(Debug, Default)]
pub struct SchemaAssembler {
    stack: Vec<Frame>,
    result: Option<Value>,
    error: Option<String>,
}

impl SchemaAssembler {
    pub fn new() -> Self {
        Self::default()
    }

    /// The assembled document, or the first structural error in the stream.
    pub fn finish(self) -> WalkResult<Value> {
        if let Some(error) = self.error {
            return Err(WalkError::invalid_argument(format!(
                "Malformed schema stream: {}",
                error
            )));
        }
        if !self.stack.is_empty() {
            return Err(WalkError::invalid_argument(format!(
                "Malformed schema stream: {} unclosed element(s)",
                self.stack.len()
            )));
        }
        self.result
            .ok_or_else(|| WalkError::invalid_argument("Malformed schema stream: empty"))
    }

    fn fail(&mut self, message: String) {
        if self.error.is_none() {
            self.error = Some(message);
        }
    }

    /// Hands a finished type to the innermost open element.
    fn deliver(&mut self, value: Value) {
        let mut value = value;
        loop {
            match self.stack.last_mut() {
                None => {
                    if self.result.is_some() {
                        self.fail("more than one top-level type".into());
                    }
                    self.result = Some(value);
                    return;
                }
                Some(Frame::Array) => {
                    self.stack.pop();
                    value = json!({"type": "array", "items": value});
                }
                Some(Frame::Map) => {
                    self.stack.pop();
                    value = json!({"type": "map", "values": value});
                }
                Some(Frame::Union(branches)) => {
                    branches.push(value);
                    return;
                }
                Some(Frame::Record {
                    fields, pending, ..
                }) => {
                    match pending.take() {
                        Some((name, doc)) => {
                            let mut field = Map::new();
                            field.insert("name".into(), Value::String(name));
                            field.insert("type".into(), value);
                            if let Some(doc) = doc {
                                field.insert("doc".into(), Value::String(doc));
                            }
                            fields.push(Value::Object(field));
                        }
                        None => self.fail("record member type without field name".into()),
                    }
                    return;
                }
                Some(Frame::Enum { .. }) | Some(Frame::Fixed { .. }) => {
                    self.fail("type nested inside enum or fixed".into());
                    return;
                }
            }
        }
    }

    fn named_head(kind: &str, name: &str) -> Map<String, Value> {
        let mut head = Map::new();
        head.insert("type".into(), Value::String(kind.to_string()));
        head.insert("name".into(), Value::String(name.to_string()));
        head
    }

    fn head_mut(&mut self) -> Option<&mut Map<String, Value>> {
        match self.stack.last_mut() {
            Some(Frame::Record { head, pending: None, .. })
            | Some(Frame::Enum { head, .. })
            | Some(Frame::Fixed { head }) => Some(head),
            _ => None,
        }
    }

    fn annotate(&mut self, key: &str, op: SchemaElement, word: &str) {
        match self.head_mut() {
            Some(head) => {
                head.insert(key.to_string(), Value::String(word.to_string()));
            }
            None => self.fail(format!("{} outside a named type", op)),
        }
    }
}

impl SchemaBuilder for SchemaAssembler {
    fn element(&mut self, op: SchemaElement, word: &str) {
        if let Some(name) = op.primitive_name() {
            self.deliver(Value::String(name.to_string()));
            return;
        }

        match op {
            SchemaElement::Array => self.stack.push(Frame::Array),
            SchemaElement::Map => self.stack.push(Frame::Map),
            SchemaElement::UnionStart => self.stack.push(Frame::Union(Vec::new())),
            SchemaElement::UnionEnd => match self.stack.pop() {
                Some(Frame::Union(branches)) => self.deliver(Value::Array(branches)),
                _ => self.fail("union end without union start".into()),
            },
            SchemaElement::Reference => self.deliver(Value::String(word.to_string())),

            SchemaElement::RecordName => self.stack.push(Frame::Record {
                head: Self::named_head("record", word),
                fields: Vec::new(),
                pending: None,
            }),
            SchemaElement::FieldName => match self.stack.last_mut() {
                Some(Frame::Record { pending, .. }) if pending.is_none() => {
                    *pending = Some((word.to_string(), None));
                }
                _ => self.fail(format!("field '{}' outside a record", word)),
            },
            SchemaElement::FieldDoc => match self.stack.last_mut() {
                Some(Frame::Record {
                    pending: Some((_, doc)),
                    ..
                }) => *doc = Some(word.to_string()),
                _ => self.fail("field doc without field".into()),
            },
            SchemaElement::RecordEnd => match self.stack.pop() {
                Some(Frame::Record {
                    mut head,
                    fields,
                    pending: None,
                }) => {
                    head.insert("fields".into(), Value::Array(fields));
                    self.deliver(Value::Object(head));
                }
                _ => self.fail("record end without complete record".into()),
            },

            SchemaElement::EnumName => self.stack.push(Frame::Enum {
                head: Self::named_head("enum", word),
                symbols: Vec::new(),
            }),
            SchemaElement::EnumSymbol => match self.stack.last_mut() {
                Some(Frame::Enum { symbols, .. }) => symbols.push(Value::String(word.to_string())),
                _ => self.fail("enum symbol outside an enum".into()),
            },
            SchemaElement::EnumEnd => match self.stack.pop() {
                Some(Frame::Enum { mut head, symbols }) => {
                    head.insert("symbols".into(), Value::Array(symbols));
                    self.deliver(Value::Object(head));
                }
                _ => self.fail("enum end without enum".into()),
            },

            SchemaElement::FixedName => self.stack.push(Frame::Fixed {
                head: Self::named_head("fixed", word),
            }),
            SchemaElement::FixedSize => match (self.stack.pop(), word.parse::<u64>()) {
                (Some(Frame::Fixed { mut head }), Ok(size)) => {
                    head.insert("size".into(), Value::from(size));
                    self.deliver(Value::Object(head));
                }
                _ => self.fail(format!("bad fixed size '{}'", word)),
            },

            SchemaElement::RecordNamespace
            | SchemaElement::EnumNamespace
            | SchemaElement::FixedNamespace => self.annotate("namespace", op, word),
            SchemaElement::RecordDoc | SchemaElement::EnumDoc | SchemaElement::FixedDoc => {
                self.annotate("doc", op, word)
            }

            _ => self.fail(format!("unexpected {}", op)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn assemble(elements: &[(SchemaElement, &str)]) -> WalkResult<Value> {
        let mut assembler = SchemaAssembler::new();
        for (op, word) in elements {
            assembler.element(*op, word);
        }
        assembler.finish()
    }

    #[test]
    fn test_record_with_union_and_array() {
        use SchemaElement::*;
        let value = assemble(&[
            (RecordName, "Track"),
            (RecordNamespace, "org.example"),
            (FieldName, "hits"),
            (FieldDoc, "all hits"),
            (Array, ""),
            (Double, ""),
            (FieldName, "next"),
            (UnionStart, ""),
            (Null, ""),
            (Reference, "org.example.Track"),
            (UnionEnd, ""),
            (RecordEnd, ""),
        ])
        .unwrap();

        assert_eq!(
            value,
            json!({
                "type": "record",
                "name": "Track",
                "namespace": "org.example",
                "fields": [
                    {"name": "hits", "type": {"type": "array", "items": "double"}, "doc": "all hits"},
                    {"name": "next", "type": ["null", "org.example.Track"]}
                ]
            })
        );
    }

    #[test]
    fn test_enum_and_fixed() {
        use SchemaElement::*;
        let value = assemble(&[
            (RecordName, "R"),
            (FieldName, "color"),
            (EnumName, "Color"),
            (EnumSymbol, "RED"),
            (EnumSymbol, "GREEN"),
            (EnumEnd, ""),
            (FieldName, "digest"),
            (FixedName, "Md5"),
            (FixedSize, "16"),
            (FieldName, "attrs"),
            (Map, ""),
            (Long, ""),
            (RecordEnd, ""),
        ])
        .unwrap();

        assert_eq!(value["fields"][0]["type"]["symbols"], json!(["RED", "GREEN"]));
        assert_eq!(value["fields"][1]["type"]["size"], json!(16));
        assert_eq!(value["fields"][2]["type"], json!({"type": "map", "values": "long"}));
    }

    #[test]
    fn test_unclosed_stream_rejected() {
        use SchemaElement::*;
        assert!(assemble(&[(RecordName, "R"), (FieldName, "x")]).is_err());
        assert!(assemble(&[(Array, "")]).is_err());
        assert!(assemble(&[]).is_err());
    }

    #[test]
    fn test_misplaced_elements_rejected() {
        use SchemaElement::*;
        assert!(assemble(&[(UnionEnd, "")]).is_err());
        assert!(assemble(&[(FieldName, "x"), (Int, "")]).is_err());
        assert!(assemble(&[(Int, ""), (Int, "")]).is_err());
    }
}

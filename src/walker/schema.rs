//! Schema emission
//!
//! Both surfaces share one memo per call: the first encounter of a named
//! record defines it, later encounters emit its full name.

use std::collections::HashSet;

use serde_json::{json, Map, Value};

use super::session::{DiscoverySession, RecordId};
use super::{FieldWalker, Resolution, WalkerKind};
use crate::schema::{SchemaBuilder, SchemaElement};

/// How a walker's schema is shaped at the top level
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SchemaShape {
    /// The `"null"` placeholder of a field that was never resolved
    Null,
    /// `["null", T]`
    Union,
    Other,
}

impl DiscoverySession {
    pub fn shape(&self, walker: &FieldWalker) -> SchemaShape {
        match &walker.kind {
            WalkerKind::Pointer(pointer) => match pointer.state {
                Resolution::Unresolved => SchemaShape::Null,
                Resolution::Resolved => match self.shape(&pointer.target) {
                    SchemaShape::Null => SchemaShape::Null,
                    _ => SchemaShape::Union,
                },
            },
            WalkerKind::BackRef { target: None } => SchemaShape::Null,
            WalkerKind::BackRef { target: Some(_) } => SchemaShape::Union,
            _ => SchemaShape::Other,
        }
    }

    /// Nested schema document for one walker.
    pub fn avro_schema(&self, walker: &FieldWalker) -> Value {
        SchemaDocument::new(self).field(walker)
    }

    /// Flat instruction stream for one walker.
    pub fn build_schema(&self, walker: &FieldWalker, builder: &mut dyn SchemaBuilder) {
        SchemaStream::new(self, builder).field(walker)
    }
}

/// Nested document emitter with its own memo
pub(crate) struct SchemaDocument<'a> {
    session: &'a DiscoverySession,
    defined: HashSet<String>,
}

impl<'a> SchemaDocument<'a> {
    pub(crate) fn new(session: &'a DiscoverySession) -> Self {
        Self {
            session,
            defined: HashSet::new(),
        }
    }

    /// Marks a name as defined outside the walker tree.
    pub(crate) fn reserve(&mut self, full_name: String) {
        self.defined.insert(full_name);
    }

    pub(crate) fn field(&mut self, walker: &FieldWalker) -> Value {
        match &walker.kind {
            WalkerKind::Primitive(kind) => json!(kind.avro_type()),
            WalkerKind::String(_) => json!("string"),
            WalkerKind::Record(id) => self.record(*id),
            WalkerKind::Pointer(pointer) => match pointer.state {
                Resolution::Unresolved => json!("null"),
                Resolution::Resolved => {
                    let shape = self.session.shape(&pointer.target);
                    let inner = self.field(&pointer.target);
                    nullable(shape, inner)
                }
            },
            WalkerKind::BackRef { target } => match target {
                None => json!("null"),
                Some(id) => nullable(SchemaShape::Other, self.record(*id)),
            },
            WalkerKind::Vector(inner) | WalkerKind::Array(inner, _) => {
                json!({"type": "array", "items": self.field(inner)})
            }
            WalkerKind::BitVector => json!({"type": "array", "items": "boolean"}),
            WalkerKind::Dynamic { form, target } => {
                let items = match target {
                    None => json!("null"),
                    Some(id) if form.nullable_items() => {
                        nullable(SchemaShape::Other, self.record(*id))
                    }
                    Some(id) => self.record(*id),
                };
                json!({"type": "array", "items": items})
            }
        }
    }

    fn record(&mut self, id: RecordId) -> Value {
        let session = self.session;
        let record = session.record(id);
        let full_name = record.full_name();
        if !self.defined.insert(full_name.clone()) {
            return Value::String(full_name);
        }

        let mut out = Map::new();
        out.insert("type".into(), json!("record"));
        out.insert("name".into(), json!(record.avro_name));
        if !record.avro_namespace.is_empty() {
            out.insert("namespace".into(), json!(record.avro_namespace));
        }
        if let Some(doc) = record.doc.as_deref().filter(|d| !d.is_empty()) {
            out.insert("doc".into(), json!(doc));
        }

        let mut fields = Vec::with_capacity(record.members.len());
        for member in &record.members {
            let mut field = Map::new();
            field.insert("name".into(), json!(member.walker.field_name));
            field.insert("type".into(), self.field(&member.walker));
            if let Some(doc) = member.comment.as_deref().filter(|d| !d.is_empty()) {
                field.insert("doc".into(), json!(doc));
            }
            fields.push(Value::Object(field));
        }
        out.insert("fields".into(), Value::Array(fields));
        Value::Object(out)
    }
}

fn nullable(shape: SchemaShape, inner: Value) -> Value {
    match shape {
        SchemaShape::Null | SchemaShape::Union => inner,
        SchemaShape::Other => json!(["null", inner]),
    }
}

/// Flat stream emitter with its own memo
pub(crate) struct SchemaStream<'a, 'b> {
    session: &'a DiscoverySession,
    builder: &'b mut dyn SchemaBuilder,
    defined: HashSet<String>,
}

impl<'a, 'b> SchemaStream<'a, 'b> {
    pub(crate) fn new(session: &'a DiscoverySession, builder: &'b mut dyn SchemaBuilder) -> Self {
        Self {
            session,
            builder,
            defined: HashSet::new(),
        }
    }

    pub(crate) fn reserve(&mut self, full_name: String) {
        self.defined.insert(full_name);
    }

    pub(crate) fn emit(&mut self, op: SchemaElement, word: &str) {
        self.builder.element(op, word);
    }

    pub(crate) fn field(&mut self, walker: &FieldWalker) {
        match &walker.kind {
            WalkerKind::Primitive(kind) => self.emit(kind.schema_element(), ""),
            WalkerKind::String(_) => self.emit(SchemaElement::String, ""),
            WalkerKind::Record(id) => self.record(*id),
            WalkerKind::Pointer(pointer) => match pointer.state {
                Resolution::Unresolved => self.emit(SchemaElement::Null, ""),
                Resolution::Resolved => {
                    let shape = self.session.shape(&pointer.target);
                    self.nullable(shape, |stream| stream.field(&pointer.target));
                }
            },
            WalkerKind::BackRef { target } => match target {
                None => self.emit(SchemaElement::Null, ""),
                Some(id) => self.nullable(SchemaShape::Other, |stream| stream.record(*id)),
            },
            WalkerKind::Vector(inner) | WalkerKind::Array(inner, _) => {
                self.emit(SchemaElement::Array, "");
                self.field(inner);
            }
            WalkerKind::BitVector => {
                self.emit(SchemaElement::Array, "");
                self.emit(SchemaElement::Boolean, "");
            }
            WalkerKind::Dynamic { form, target } => {
                self.emit(SchemaElement::Array, "");
                match target {
                    None => self.emit(SchemaElement::Null, ""),
                    Some(id) if form.nullable_items() => {
                        self.nullable(SchemaShape::Other, |stream| stream.record(*id))
                    }
                    Some(id) => self.record(*id),
                }
            }
        }
    }

    fn nullable(&mut self, shape: SchemaShape, inner: impl FnOnce(&mut Self)) {
        match shape {
            SchemaShape::Null | SchemaShape::Union => inner(self),
            SchemaShape::Other => {
                self.emit(SchemaElement::UnionStart, "");
                self.emit(SchemaElement::Null, "");
                inner(self);
                self.emit(SchemaElement::UnionEnd, "");
            }
        }
    }

    fn record(&mut self, id: RecordId) {
        let session = self.session;
        let record = session.record(id);
        let full_name = record.full_name();
        if !self.defined.insert(full_name.clone()) {
            self.emit(SchemaElement::Reference, &full_name);
            return;
        }

        self.emit(SchemaElement::RecordName, &record.avro_name);
        if !record.avro_namespace.is_empty() {
            self.emit(SchemaElement::RecordNamespace, &record.avro_namespace);
        }
        if let Some(doc) = record.doc.as_deref().filter(|d| !d.is_empty()) {
            self.emit(SchemaElement::RecordDoc, doc);
        }
        for member in &record.members {
            self.emit(SchemaElement::FieldName, &member.walker.field_name);
            if let Some(doc) = member.comment.as_deref().filter(|d| !d.is_empty()) {
                self.emit(SchemaElement::FieldDoc, doc);
            }
            self.field(&member.walker);
        }
        self.emit(SchemaElement::RecordEnd, "");
    }
}

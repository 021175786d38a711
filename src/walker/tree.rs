//! Tree walker: the root fields of one tree bound to a record source

use std::rc::Rc;

use serde_json::{json, Map, Value};

use super::binary::{encode_array_end, encode_array_start, encode_widened, BinaryEmitter};
use super::leaf::{walk_dimensions, LeafDimension, LeafStep};
use super::primitive::PrimitiveKind;
use super::schema::{SchemaDocument, SchemaStream};
use super::session::DiscoverySession;
use super::text::{write_string, write_widened, TextEmitter};
use super::typename::TypeExpr;
use super::FieldWalker;
use crate::dictionary::Dictionary;
use crate::entry::{DimensionDecl, EntrySource, FieldDecl, FieldHandle};
use crate::errors::{WalkError, WalkResult};
use crate::schema::{SchemaBuilder, SchemaElement};

/// What a root field extracts
#[derive(Debug, Clone)]
pub enum RootBody {
    /// Primitive stored flat with a dimension chain
    Leaf {
        primitive: PrimitiveKind,
        dims: Vec<LeafDimension>,
    },
    /// Any other type, walked through the walker tree
    Value(FieldWalker),
}

/// Top-level named field bound to the record source
#[derive(Debug, Clone)]
pub struct RootWalker {
    pub name: String,
    pub type_name: String,
    pub handle: FieldHandle,
    pub body: RootBody,
}

impl RootWalker {
    fn leaf_lengths(dims: &[LeafDimension], source: &dyn EntrySource) -> WalkResult<Vec<usize>> {
        dims.iter().map(|dim| dim.length(source)).collect()
    }
}

/// Keeps `[A-Za-z0-9_]`, replaces everything else, and never starts with a digit.
fn schema_identifier(raw: &str) -> String {
    let mut out: String = raw
        .chars()
        .map(|c| if c.is_ascii_alphanumeric() || c == '_' { c } else { '_' })
        .collect();
    if out.is_empty() || out.starts_with(|c: char| c.is_ascii_digit()) {
        out.insert(0, '_');
    }
    out
}

fn qualified(name: &str, namespace: &str) -> String {
    if namespace.is_empty() {
        name.to_string()
    } else {
        format!("{}.{}", namespace, name)
    }
}

/// Walker tree for every declared field of a tree
#[derive(Debug)]
pub struct TreeWalker {
    session: DiscoverySession,
    roots: Vec<RootWalker>,
}

impl TreeWalker {
    /// Builds root walkers for every field the source declares.
    pub fn discover(
        source: &mut dyn EntrySource,
        dictionary: Rc<Dictionary>,
        namespace: &str,
    ) -> WalkResult<Self> {
        let declarations = source.declarations().to_vec();
        let mut session = DiscoverySession::new(dictionary, namespace);
        let mut roots = Vec::with_capacity(declarations.len());

        for decl in &declarations {
            let handle = source.bind(&decl.name, &decl.type_name)?;
            let expr = TypeExpr::parse(&decl.type_name)?;

            let (type_name, body) = match expr {
                TypeExpr::Primitive(primitive) => {
                    let dims = Self::leaf_dimensions(source, decl, &declarations)?;
                    let mut type_name = primitive.type_name().to_string();
                    for dim in &dims {
                        type_name.push_str(&dim.to_string());
                    }
                    (type_name, RootBody::Leaf { primitive, dims })
                }
                _ if !decl.dims.is_empty() => {
                    return Err(WalkError::unsupported_type(decl.type_name.as_str())
                        .with_details(format!(
                            "field '{}': dimensions apply to primitive leaves only",
                            decl.name
                        )));
                }
                expr => {
                    let walker = session.build_expr(&decl.name, &expr)?;
                    (walker.type_name.clone(), RootBody::Value(walker))
                }
            };

            roots.push(RootWalker {
                name: decl.name.clone(),
                type_name,
                handle,
                body,
            });
        }

        Ok(Self { session, roots })
    }

    fn leaf_dimensions(
        source: &mut dyn EntrySource,
        decl: &FieldDecl,
        declarations: &[FieldDecl],
    ) -> WalkResult<Vec<LeafDimension>> {
        let mut dims = Vec::with_capacity(decl.dims.len());
        for dim in &decl.dims {
            match dim {
                DimensionDecl::Fixed(n) => dims.push(LeafDimension::Fixed(*n)),
                DimensionDecl::Counter { counter } => {
                    if dims.iter().any(LeafDimension::is_counter) {
                        return Err(WalkError::invalid_argument(format!(
                            "Field '{}' has more than one counter dimension",
                            decl.name
                        )));
                    }
                    let counter_decl = declarations
                        .iter()
                        .find(|d| d.name == *counter && d.dims.is_empty())
                        .ok_or_else(|| {
                            WalkError::invalid_argument(format!(
                                "Counter '{}' of field '{}' is not a scalar field",
                                counter, decl.name
                            ))
                        })?;
                    let kind = match TypeExpr::parse(&counter_decl.type_name)? {
                        TypeExpr::Primitive(kind) if kind.is_integer() => kind,
                        _ => {
                            return Err(WalkError::invalid_argument(format!(
                                "Counter '{}' has non-integer type '{}'",
                                counter, counter_decl.type_name
                            )))
                        }
                    };
                    let handle = source.bind(counter, &counter_decl.type_name)?;
                    dims.push(LeafDimension::Counter {
                        field: counter.clone(),
                        handle,
                        kind,
                    });
                }
            }
        }
        Ok(dims)
    }

    pub fn roots(&self) -> &[RootWalker] {
        &self.roots
    }

    pub fn session(&self) -> &DiscoverySession {
        &self.session
    }

    pub fn is_resolved(&self) -> bool {
        self.roots.iter().all(|root| match &root.body {
            RootBody::Leaf { .. } => true,
            RootBody::Value(walker) => self.session.is_resolved(walker),
        })
    }

    /// Resolves every still-unresolved root against the current entry.
    pub fn resolve(&mut self, source: &dyn EntrySource) -> WalkResult<()> {
        for root in &mut self.roots {
            if let RootBody::Value(walker) = &mut root.body {
                if self.session.is_resolved(walker) {
                    continue;
                }
                let addr = source.address(root.handle)?;
                self.session.resolve(walker, source.memory(), addr)?;
            }
        }
        Ok(())
    }

    /// Dotted paths of fields still waiting for a non-null sample
    pub fn unresolved_fields(&self) -> Vec<String> {
        let mut out = Vec::new();
        for root in &self.roots {
            if let RootBody::Value(walker) = &root.body {
                out.extend(self.session.unresolved_paths(walker, &root.name));
            }
        }
        out
    }

    /// Debug description of roots and records
    pub fn describe(&self) -> Value {
        let roots: Vec<Value> = self
            .roots
            .iter()
            .map(|root| match &root.body {
                RootBody::Leaf { primitive, dims } => json!({
                    "name": root.name,
                    "type": root.type_name,
                    "walker": "leaf",
                    "avro": primitive.avro_type(),
                    "dimensions": dims.iter().map(ToString::to_string).collect::<Vec<_>>(),
                }),
                RootBody::Value(walker) => self.session.describe(walker),
            })
            .collect();
        json!({
            "roots": roots,
            "records": self.session.describe_records(),
        })
    }

    /// Rejects a top-level record name that a reachable class also defines.
    pub fn check_record_name(&self, name: &str, namespace: &str) -> WalkResult<()> {
        let full_name = qualified(&schema_identifier(name), namespace);
        match self
            .session
            .records()
            .iter()
            .find(|record| record.full_name() == full_name)
        {
            Some(record) => Err(WalkError::invalid_argument(format!(
                "Record name '{}' is also the schema name of class '{}'",
                full_name, record.class_name
            ))),
            None => Ok(()),
        }
    }

    /// Nested schema document of the whole tree as one top-level record.
    pub fn avro_schema(&self, name: &str, namespace: &str) -> Value {
        let name = schema_identifier(name);
        let mut document = SchemaDocument::new(&self.session);
        document.reserve(qualified(&name, namespace));
        let fields: Vec<Value> = self
            .roots
            .iter()
            .map(|root| {
                let schema = match &root.body {
                    RootBody::Leaf { primitive, dims } => {
                        let mut schema = json!(primitive.avro_type());
                        for _ in dims {
                            schema = json!({"type": "array", "items": schema});
                        }
                        schema
                    }
                    RootBody::Value(walker) => document.field(walker),
                };
                json!({"name": root.name, "type": schema})
            })
            .collect();

        let mut out = Map::new();
        out.insert("type".into(), json!("record"));
        out.insert("name".into(), json!(name));
        if !namespace.is_empty() {
            out.insert("namespace".into(), json!(namespace));
        }
        out.insert("fields".into(), Value::Array(fields));
        Value::Object(out)
    }

    /// Flat instruction stream of the whole tree.
    pub fn build_schema(&self, name: &str, namespace: &str, builder: &mut dyn SchemaBuilder) {
        let name = schema_identifier(name);
        let mut stream = SchemaStream::new(&self.session, builder);
        stream.reserve(qualified(&name, namespace));
        stream.emit(SchemaElement::RecordName, &name);
        if !namespace.is_empty() {
            stream.emit(SchemaElement::RecordNamespace, namespace);
        }
        for root in &self.roots {
            stream.emit(SchemaElement::FieldName, &root.name);
            match &root.body {
                RootBody::Leaf { primitive, dims } => {
                    for _ in dims {
                        stream.emit(SchemaElement::Array, "");
                    }
                    stream.emit(primitive.schema_element(), "");
                }
                RootBody::Value(walker) => stream.field(walker),
            }
        }
        stream.emit(SchemaElement::RecordEnd, "");
    }

    /// Appends the current entry as one JSON object (no trailing newline).
    pub fn write_json(&self, source: &dyn EntrySource, out: &mut String) -> WalkResult<()> {
        let mem = source.memory();
        let emitter = TextEmitter::new(&self.session, mem);
        out.push('{');
        for (i, root) in self.roots.iter().enumerate() {
            if i > 0 {
                out.push_str(", ");
            }
            write_string(out, &root.name);
            out.push_str(": ");
            let base = source.address(root.handle)?;
            match &root.body {
                RootBody::Value(walker) => emitter.field(walker, base, out)?,
                RootBody::Leaf { primitive, dims } => {
                    let lengths = RootWalker::leaf_lengths(dims, source)?;
                    let mut separators: Vec<bool> = Vec::new();
                    walk_dimensions(&lengths, |step| {
                        if !matches!(step, LeafStep::Close) {
                            if let Some(pending) = separators.last_mut() {
                                if *pending {
                                    out.push_str(", ");
                                }
                                *pending = true;
                            }
                        }
                        match step {
                            LeafStep::Open(_) => {
                                out.push('[');
                                separators.push(false);
                            }
                            LeafStep::Item(index) => {
                                let at = base.offset(index * primitive.size());
                                write_widened(out, primitive.read(mem, at)?);
                            }
                            LeafStep::Close => {
                                out.push(']');
                                separators.pop();
                            }
                        }
                        Ok(())
                    })?;
                }
            }
        }
        out.push('}');
        Ok(())
    }

    /// Appends the current entry as one Avro-encoded record.
    pub fn write_avro(&self, source: &dyn EntrySource, out: &mut Vec<u8>) -> WalkResult<()> {
        let mem = source.memory();
        let emitter = BinaryEmitter::new(&self.session, mem);
        for root in &self.roots {
            let base = source.address(root.handle)?;
            match &root.body {
                RootBody::Value(walker) => emitter.field(walker, base, out)?,
                RootBody::Leaf { primitive, dims } => {
                    let lengths = RootWalker::leaf_lengths(dims, source)?;
                    walk_dimensions(&lengths, |step| {
                        match step {
                            LeafStep::Open(len) => encode_array_start(out, len),
                            LeafStep::Item(index) => {
                                let at = base.offset(index * primitive.size());
                                encode_widened(out, primitive.read(mem, at)?);
                            }
                            LeafStep::Close => encode_array_end(out),
                        }
                        Ok(())
                    })?;
                }
            }
        }
        Ok(())
    }
}

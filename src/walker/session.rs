//! Discovery session: builds walkers from type names
//!
//! Record walkers live in the session arena and are addressed by
//! [`RecordId`]. A named record type is built at most once: the shell is
//! cached before its members are populated, so a self-referential member
//! aliases the record being built.

use std::collections::{HashMap, HashSet};
use std::rc::Rc;

use super::typename::TypeExpr;
use super::{FieldWalker, PointerWalker, Resolution, WalkerKind};
use crate::dictionary::{normalize_type_name, Dictionary};
use crate::errors::{WalkError, WalkResult};

/// Index of a record walker in its session
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct RecordId(pub usize);

/// One member of a record
#[derive(Debug, Clone)]
pub struct MemberWalker {
    pub walker: FieldWalker,
    /// Byte offset from the record base address
    pub offset: usize,
    pub comment: Option<String>,
}

/// Walker for one named record type
#[derive(Debug, Clone)]
pub struct RecordWalker {
    pub class_name: String,
    /// Bare schema name
    pub avro_name: String,
    pub avro_namespace: String,
    pub size: usize,
    pub doc: Option<String>,
    pub members: Vec<MemberWalker>,
    declared_members: usize,
}

impl RecordWalker {
    /// Namespace-qualified schema name
    pub fn full_name(&self) -> String {
        if self.avro_namespace.is_empty() {
            self.avro_name.clone()
        } else {
            format!("{}.{}", self.avro_namespace, self.avro_name)
        }
    }

    /// True when the class declares no members
    pub fn is_empty(&self) -> bool {
        self.declared_members == 0
    }
}

/// Splits `geo::Point` under `org.example` into `Point` and `org.example.geo`.
fn schema_name(class_name: &str, namespace: &str) -> (String, String) {
    let mut parts: Vec<&str> = class_name.split("::").collect();
    let name = parts.pop().unwrap_or(class_name).to_string();
    let scope = parts.join(".");
    let ns = match (namespace.is_empty(), scope.is_empty()) {
        (_, true) => namespace.to_string(),
        (true, false) => scope,
        (false, false) => format!("{}.{}", namespace, scope),
    };
    (name, ns)
}

/// Cache and arena for one walker tree
#[derive(Debug)]
pub struct DiscoverySession {
    dictionary: Rc<Dictionary>,
    namespace: String,
    records: Vec<RecordWalker>,
    cache: HashMap<String, RecordId>,
    /// Walkers pinned so far; a resolve pass that leaves it unchanged is final.
    pub(crate) pinned: usize,
}

impl DiscoverySession {
    pub fn new(dictionary: Rc<Dictionary>, namespace: impl Into<String>) -> Self {
        Self {
            dictionary,
            namespace: namespace.into(),
            records: Vec::new(),
            cache: HashMap::new(),
            pinned: 0,
        }
    }

    pub fn namespace(&self) -> &str {
        &self.namespace
    }

    pub fn dictionary(&self) -> &Dictionary {
        &self.dictionary
    }

    pub fn record(&self, id: RecordId) -> &RecordWalker {
        &self.records[id.0]
    }

    pub(crate) fn record_mut(&mut self, id: RecordId) -> &mut RecordWalker {
        &mut self.records[id.0]
    }

    pub fn records(&self) -> &[RecordWalker] {
        &self.records
    }

    /// Cached record walker for a class name, if one was built
    pub fn cached(&self, class_name: &str) -> Option<RecordId> {
        self.cache.get(normalize_type_name(class_name)).copied()
    }

    /// Builds the walker for a field of the given declared type.
    pub fn build(&mut self, field_name: &str, type_name: &str) -> WalkResult<FieldWalker> {
        let expr = TypeExpr::parse(type_name)?;
        self.build_expr(field_name, &expr)
    }

    pub fn build_expr(&mut self, field_name: &str, expr: &TypeExpr) -> WalkResult<FieldWalker> {
        let kind = match expr {
            TypeExpr::Primitive(kind) => WalkerKind::Primitive(*kind),
            TypeExpr::String(kind) => WalkerKind::String(*kind),
            TypeExpr::Class(name) => WalkerKind::Record(self.record_for(name)?),
            TypeExpr::Pointer(inner) => WalkerKind::Pointer(Box::new(PointerWalker {
                target: self.build_expr(field_name, inner)?,
                state: Resolution::Unresolved,
            })),
            TypeExpr::BackRef => WalkerKind::BackRef { target: None },
            TypeExpr::Vector(inner) => {
                WalkerKind::Vector(Box::new(self.build_expr(field_name, inner)?))
            }
            TypeExpr::BitVector => WalkerKind::BitVector,
            TypeExpr::Array(inner, n) => {
                WalkerKind::Array(Box::new(self.build_expr(field_name, inner)?), *n)
            }
            TypeExpr::Dynamic(form) => WalkerKind::Dynamic {
                form: *form,
                target: None,
            },
        };
        Ok(FieldWalker::new(field_name, expr.to_string(), kind))
    }

    /// Returns the record walker for a class, building it on first use.
    pub fn record_for(&mut self, class_name: &str) -> WalkResult<RecordId> {
        let key = normalize_type_name(class_name);
        if let Some(id) = self.cache.get(key) {
            return Ok(*id);
        }

        let dictionary = Rc::clone(&self.dictionary);
        let class = dictionary
            .class(key)
            .ok_or_else(|| WalkError::unsupported_type(class_name))?;

        let (avro_name, avro_namespace) = schema_name(&class.name, &self.namespace);
        let id = RecordId(self.records.len());
        self.records.push(RecordWalker {
            class_name: key.to_string(),
            avro_name,
            avro_namespace,
            size: class.size,
            doc: class.doc.clone(),
            members: Vec::new(),
            declared_members: class.members.len(),
        });
        self.cache.insert(key.to_string(), id);

        let mut members = Vec::with_capacity(class.members.len());
        for member in &class.members {
            let walker = self.build(&member.name, &member.type_name)?;
            if walker.is_empty(self) {
                continue;
            }
            members.push(MemberWalker {
                walker,
                offset: member.offset,
                comment: member.comment.clone(),
            });
        }
        self.record_mut(id).members = members;
        Ok(id)
    }

    /// True when `walker` and everything reachable from it is resolved.
    pub fn is_resolved(&self, walker: &FieldWalker) -> bool {
        self.resolved_from(walker, &mut HashSet::new())
    }

    fn resolved_from(&self, walker: &FieldWalker, visiting: &mut HashSet<RecordId>) -> bool {
        match &walker.kind {
            WalkerKind::Primitive(_) | WalkerKind::String(_) | WalkerKind::BitVector => true,
            WalkerKind::Record(id) => self.record_resolved(*id, visiting),
            WalkerKind::Pointer(pointer) => {
                pointer.state == Resolution::Resolved
                    && self.resolved_from(&pointer.target, visiting)
            }
            WalkerKind::BackRef { target } | WalkerKind::Dynamic { target, .. } => {
                matches!(target, Some(id) if self.record_resolved(*id, visiting))
            }
            WalkerKind::Vector(inner) | WalkerKind::Array(inner, _) => {
                self.resolved_from(inner, visiting)
            }
        }
    }

    fn record_resolved(&self, id: RecordId, visiting: &mut HashSet<RecordId>) -> bool {
        if !visiting.insert(id) {
            return true;
        }
        self.record(id)
            .members
            .iter()
            .all(|member| self.resolved_from(&member.walker, visiting))
    }

    /// Dotted paths of every unresolved walker reachable from `walker`.
    pub fn unresolved_paths(&self, walker: &FieldWalker, path: &str) -> Vec<String> {
        let mut out = Vec::new();
        self.collect_unresolved(walker, path, &mut HashSet::new(), &mut out);
        out
    }

    fn collect_unresolved(
        &self,
        walker: &FieldWalker,
        path: &str,
        visiting: &mut HashSet<RecordId>,
        out: &mut Vec<String>,
    ) {
        let record = match &walker.kind {
            WalkerKind::Primitive(_) | WalkerKind::String(_) | WalkerKind::BitVector => None,
            WalkerKind::Record(id) => Some(*id),
            WalkerKind::Pointer(pointer) => {
                if pointer.state == Resolution::Unresolved {
                    out.push(path.to_string());
                    return;
                }
                self.collect_unresolved(&pointer.target, path, visiting, out);
                None
            }
            WalkerKind::BackRef { target } | WalkerKind::Dynamic { target, .. } => {
                if target.is_none() {
                    out.push(path.to_string());
                }
                *target
            }
            WalkerKind::Vector(inner) | WalkerKind::Array(inner, _) => {
                self.collect_unresolved(inner, path, visiting, out);
                None
            }
        };

        if let Some(id) = record {
            if !visiting.insert(id) {
                return;
            }
            for member in &self.record(id).members {
                let child = format!("{}.{}", path, member.walker.field_name);
                self.collect_unresolved(&member.walker, &child, visiting, out);
            }
        }
    }
}

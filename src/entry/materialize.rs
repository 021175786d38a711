//! Lays out one JSON entry in live memory
//!
//! Every declared field is written at its physical layout into a fresh
//! [`Arena`]. Heap objects (pointer targets, dynamic-array elements and root
//! objects) are tagged with their runtime class; objects carrying `@uid` are
//! registered as back-reference targets.

use serde_json::{Map, Value};

use super::{DimensionDecl, FieldDecl};
use crate::dictionary::Dictionary;
use crate::memory::{Address, Arena};
use crate::walker::{PrimitiveKind, StringKind, TypeExpr};

const TYPE_KEY: &str = "@type";
const UID_KEY: &str = "@uid";

/// Why a value could not be laid out
pub(crate) type Reason = String;

pub(crate) struct Materializer<'a> {
    dictionary: &'a Dictionary,
    arena: Arena,
}

impl<'a> Materializer<'a> {
    pub(crate) fn new(dictionary: &'a Dictionary) -> Self {
        Self {
            dictionary,
            arena: Arena::new(),
        }
    }

    pub(crate) fn into_arena(self) -> Arena {
        self.arena
    }

    /// Writes one declared branch and returns its address.
    pub(crate) fn branch(
        &mut self,
        decl: &FieldDecl,
        value: &Value,
        entry: &Map<String, Value>,
    ) -> Result<Address, Reason> {
        let expr = TypeExpr::parse(&decl.type_name).map_err(|e| e.to_string())?;
        if decl.dims.is_empty() {
            let size = expr.size(self.dictionary).map_err(|e| e.to_string())?;
            let addr = self.arena.alloc(size);
            match &expr {
                TypeExpr::Class(name) if !value.is_null() => self.class(name, addr, value, true)?,
                _ => self.value(&expr, addr, value)?,
            }
            return Ok(addr);
        }

        let TypeExpr::Primitive(kind) = expr else {
            return Err(format!("dimensions on non-primitive type '{}'", decl.type_name));
        };
        let mut flat = Vec::new();
        flatten(value, &mut flat);

        let expected = expected_count(decl, entry)?;
        if flat.len() != expected {
            return Err(format!("expected {} values, found {}", expected, flat.len()));
        }

        let addr = self.arena.alloc(kind.size() * flat.len());
        for (i, item) in flat.iter().enumerate() {
            self.primitive(kind, addr.offset(i * kind.size()), item)?;
        }
        Ok(addr)
    }

    fn value(&mut self, expr: &TypeExpr, addr: Address, value: &Value) -> Result<(), Reason> {
        if value.is_null() {
            // Zeroed memory is the null/default representation of every kind.
            return Ok(());
        }
        match expr {
            TypeExpr::Primitive(kind) => self.primitive(*kind, addr, value),
            TypeExpr::String(kind) => self.string(*kind, addr, value),
            TypeExpr::Class(name) => self.class(name, addr, value, false),
            TypeExpr::Pointer(inner) => {
                let target = match inner.as_ref() {
                    TypeExpr::Class(declared) => self.heap_object(declared, value)?,
                    TypeExpr::String(StringKind::CharBuffer { capacity: None }) => {
                        let text = as_str(value)?;
                        let target = self.arena.alloc(text.len() + 1);
                        self.write(target, text.as_bytes())?;
                        target
                    }
                    inner => {
                        let size = inner.size(self.dictionary).map_err(|e| e.to_string())?;
                        let target = self.arena.alloc(size);
                        self.value(inner, target, value)?;
                        target
                    }
                };
                self.write_address(addr, target)
            }
            TypeExpr::BackRef => {
                let uid = as_uid(value)?;
                self.write(addr, &uid.to_le_bytes())
            }
            TypeExpr::Vector(inner) => {
                let items = as_array(value)?;
                let stride = inner.size(self.dictionary).map_err(|e| e.to_string())?;
                let data = self.arena.alloc(stride * items.len());
                for (i, item) in items.iter().enumerate() {
                    self.value(inner, data.offset(i * stride), item)?;
                }
                self.sequence_header(addr, data, items.len())
            }
            TypeExpr::BitVector => {
                let items = as_array(value)?;
                let mut bits = vec![0u8; (items.len() + 7) / 8];
                for (i, item) in items.iter().enumerate() {
                    let set = item
                        .as_bool()
                        .ok_or_else(|| format!("expected boolean, found {}", item))?;
                    if set {
                        bits[i / 8] |= 1 << (i % 8);
                    }
                }
                let data = self.arena.alloc(bits.len());
                self.write(data, &bits)?;
                self.sequence_header(addr, data, items.len())
            }
            TypeExpr::Array(inner, n) => {
                let items = as_array(value)?;
                if items.len() > *n {
                    return Err(format!("{} items for array of {}", items.len(), n));
                }
                let stride = inner.size(self.dictionary).map_err(|e| e.to_string())?;
                for (i, item) in items.iter().enumerate() {
                    self.value(inner, addr.offset(i * stride), item)?;
                }
                Ok(())
            }
            TypeExpr::Dynamic(form) => {
                let items = as_array(value)?;
                let slot = form.slot_size();
                let data = self.arena.alloc(slot * items.len());
                for (i, item) in items.iter().enumerate() {
                    let at = data.offset(i * slot);
                    if item.is_null() {
                        continue;
                    }
                    if slot == 4 {
                        self.write(at, &as_uid(item)?.to_le_bytes())?;
                    } else {
                        let class = runtime_class(item)
                            .ok_or_else(|| format!("element {} has no \"{}\"", i, TYPE_KEY))?
                            .to_string();
                        let target = self.heap_object(&class, item)?;
                        self.write_address(at, target)?;
                    }
                }
                self.sequence_header(addr, data, items.len())
            }
        }
    }

    /// Allocates and tags an object of its runtime class (or `declared`).
    fn heap_object(&mut self, declared: &str, value: &Value) -> Result<Address, Reason> {
        let class = runtime_class(value).unwrap_or(declared).to_string();
        let size = self
            .dictionary
            .class(&class)
            .ok_or_else(|| format!("unknown class '{}'", class))?
            .size;
        let target = self.arena.alloc(size);
        self.class(&class, target, value, true)?;
        Ok(target)
    }

    fn class(&mut self, name: &str, addr: Address, value: &Value, tag: bool) -> Result<(), Reason> {
        let dictionary = self.dictionary;
        let class = dictionary
            .class(name)
            .ok_or_else(|| format!("unknown class '{}'", name))?;
        let object = value
            .as_object()
            .ok_or_else(|| format!("expected object for '{}', found {}", name, value))?;

        if tag {
            self.arena.set_runtime_type(addr, class.name.clone());
        }
        if let Some(uid) = object.get(UID_KEY) {
            self.arena.register_ref(as_uid(uid)?, addr);
        }

        for member in &class.members {
            let Some(member_value) = object.get(&member.name) else {
                continue;
            };
            let expr = TypeExpr::parse(&member.type_name).map_err(|e| e.to_string())?;
            self.value(&expr, addr.offset(member.offset), member_value)
                .map_err(|reason| format!("{}.{}: {}", name, member.name, reason))?;
        }
        Ok(())
    }

    fn primitive(&mut self, kind: PrimitiveKind, addr: Address, value: &Value) -> Result<(), Reason> {
        let bytes: Vec<u8> = match kind {
            PrimitiveKind::Bool => {
                let v = value
                    .as_bool()
                    .ok_or_else(|| format!("expected boolean, found {}", value))?;
                vec![u8::from(v)]
            }
            PrimitiveKind::Float32 => (as_f64(value)? as f32).to_le_bytes().to_vec(),
            PrimitiveKind::Float64 => as_f64(value)?.to_le_bytes().to_vec(),
            integer => {
                let raw = as_integer(value)?;
                raw.to_le_bytes()[..integer.size()].to_vec()
            }
        };
        self.write(addr, &bytes)
    }

    fn string(&mut self, kind: StringKind, addr: Address, value: &Value) -> Result<(), Reason> {
        let text = as_str(value)?;
        match kind {
            StringKind::CharBuffer { capacity } => {
                let limit = capacity.unwrap_or(text.len() + 1);
                let bytes = &text.as_bytes()[..text.len().min(limit)];
                self.write(addr, bytes)
            }
            StringKind::StdString => {
                let data = self.arena.alloc(text.len());
                self.write(data, text.as_bytes())?;
                self.write_address(addr, data)?;
                self.write(addr.offset(8), &(text.len() as u64).to_le_bytes())
            }
            StringKind::TString => {
                let data = self.arena.alloc(text.len());
                self.write(data, text.as_bytes())?;
                self.write(addr, &(text.len() as u32).to_le_bytes())?;
                self.write_address(addr.offset(8), data)
            }
        }
    }

    fn sequence_header(&mut self, addr: Address, data: Address, len: usize) -> Result<(), Reason> {
        self.write_address(addr, data)?;
        self.write(addr.offset(8), &(len as u64).to_le_bytes())?;
        self.write(addr.offset(16), &(len as u64).to_le_bytes())
    }

    fn write(&mut self, addr: Address, bytes: &[u8]) -> Result<(), Reason> {
        self.arena.write(addr, bytes).map_err(|e| e.to_string())
    }

    fn write_address(&mut self, addr: Address, target: Address) -> Result<(), Reason> {
        self.arena.write_address(addr, target).map_err(|e| e.to_string())
    }
}

/// Number of flat values a dimensioned leaf must hold in this entry
fn expected_count(decl: &FieldDecl, entry: &Map<String, Value>) -> Result<usize, Reason> {
    let mut count = 1usize;
    for dim in &decl.dims {
        let n = match dim {
            DimensionDecl::Fixed(n) => *n,
            DimensionDecl::Counter { counter } => entry
                .get(counter)
                .and_then(Value::as_u64)
                .map(|n| n as usize)
                .ok_or_else(|| format!("counter '{}' missing or negative", counter))?,
        };
        count = count.saturating_mul(n);
    }
    Ok(count)
}

fn flatten<'v>(value: &'v Value, out: &mut Vec<&'v Value>) {
    match value {
        Value::Array(items) => items.iter().for_each(|item| flatten(item, out)),
        Value::Null => {}
        other => out.push(other),
    }
}

fn runtime_class(value: &Value) -> Option<&str> {
    value.get(TYPE_KEY).and_then(Value::as_str)
}

fn as_array(value: &Value) -> Result<&Vec<Value>, Reason> {
    value
        .as_array()
        .ok_or_else(|| format!("expected list, found {}", value))
}

fn as_str(value: &Value) -> Result<&str, Reason> {
    value
        .as_str()
        .ok_or_else(|| format!("expected string, found {}", value))
}

fn as_f64(value: &Value) -> Result<f64, Reason> {
    value
        .as_f64()
        .ok_or_else(|| format!("expected number, found {}", value))
}

/// Two's-complement bits of an integer, from either signed or unsigned JSON.
fn as_integer(value: &Value) -> Result<u64, Reason> {
    value
        .as_i64()
        .map(|v| v as u64)
        .or_else(|| value.as_u64())
        .ok_or_else(|| format!("expected integer, found {}", value))
}

fn as_uid(value: &Value) -> Result<u32, Reason> {
    value
        .as_u64()
        .and_then(|v| u32::try_from(v).ok())
        .ok_or_else(|| format!("expected reference uid, found {}", value))
}

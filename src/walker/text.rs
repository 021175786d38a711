//! JSON text emission
//!
//! `", "` between items, `": "` after keys, fields in declaration order.
//! Non-finite floating point values are written as `null`.

use std::fmt::Write as _;

use super::primitive::Widened;
use super::resolve::{dynamic_element, resolve_uid};
use super::session::{DiscoverySession, RecordId};
use super::{FieldWalker, Resolution, WalkerKind};
use crate::dictionary::normalize_type_name;
use crate::errors::{WalkError, WalkResult};
use crate::memory::{Address, Memory};
use crate::observability::escape_json_string;

pub(crate) fn write_widened(out: &mut String, value: Widened) {
    // Writing into a String cannot fail.
    let _ = match value {
        Widened::Boolean(v) => write!(out, "{}", v),
        Widened::Int(v) => write!(out, "{}", v),
        Widened::Long(v) => write!(out, "{}", v),
        Widened::Float(v) if v.is_finite() => write!(out, "{}", v),
        Widened::Double(v) if v.is_finite() => write!(out, "{}", v),
        Widened::Float(_) | Widened::Double(_) => write!(out, "null"),
    };
}

pub(crate) fn write_string(out: &mut String, value: &str) {
    out.push('"');
    escape_json_string(out, value);
    out.push('"');
}

/// Checks a pointed-to object or dynamic-array element against the pinned class.
pub(crate) fn check_runtime_type(
    session: &DiscoverySession,
    mem: &dyn Memory,
    field_name: &str,
    id: RecordId,
    object: Address,
) -> WalkResult<()> {
    if session.runtime_matches(id, mem, object) {
        return Ok(());
    }
    let actual = mem.runtime_type(object).map(normalize_type_name).unwrap_or_default();
    Err(WalkError::element_type_mismatch(
        field_name,
        session.record(id).class_name.as_str(),
        actual,
    ))
}

/// Emits values of one record as JSON text
pub(crate) struct TextEmitter<'a> {
    session: &'a DiscoverySession,
    mem: &'a dyn Memory,
}

impl<'a> TextEmitter<'a> {
    pub(crate) fn new(session: &'a DiscoverySession, mem: &'a dyn Memory) -> Self {
        Self { session, mem }
    }

    pub(crate) fn field(&self, walker: &FieldWalker, addr: Address, out: &mut String) -> WalkResult<()> {
        let mem = self.mem;
        match &walker.kind {
            WalkerKind::Primitive(kind) => write_widened(out, kind.read(mem, addr)?),
            WalkerKind::String(kind) => write_string(out, &kind.read(mem, addr)?),
            WalkerKind::Record(id) => self.record(*id, addr, out)?,

            WalkerKind::Pointer(pointer) => {
                let target = mem.read_address(addr)?;
                if target.is_null() || pointer.state == Resolution::Unresolved {
                    out.push_str("null");
                } else {
                    if let WalkerKind::Record(id) = pointer.target.kind {
                        check_runtime_type(self.session, mem, &walker.field_name, id, target)?;
                    }
                    self.field(&pointer.target, target, out)?;
                }
            }

            WalkerKind::BackRef { target } => {
                let uid = mem.read_u32(addr)?;
                match (target, resolve_uid(mem, uid)) {
                    (Some(id), Some(object)) => {
                        check_runtime_type(self.session, mem, &walker.field_name, *id, object)?;
                        self.record(*id, object, out)?;
                    }
                    _ => out.push_str("null"),
                }
            }

            WalkerKind::Vector(inner) => {
                let data = mem.read_address(addr)?;
                let len = mem.read_u64(addr.offset(8))? as usize;
                self.sequence(inner, data, len, out)?;
            }
            WalkerKind::Array(inner, n) => self.sequence(inner, addr, *n, out)?,

            WalkerKind::BitVector => {
                let data = mem.read_address(addr)?;
                let len = mem.read_u64(addr.offset(8))? as usize;
                out.push('[');
                for i in 0..len {
                    if i > 0 {
                        out.push_str(", ");
                    }
                    let byte = mem.read_u8(data.offset(i / 8))?;
                    out.push_str(if byte & (1 << (i % 8)) != 0 { "true" } else { "false" });
                }
                out.push(']');
            }

            WalkerKind::Dynamic { form, target } => {
                let data = mem.read_address(addr)?;
                let len = mem.read_u64(addr.offset(8))? as usize;
                out.push('[');
                for i in 0..len {
                    if i > 0 {
                        out.push_str(", ");
                    }
                    let element = dynamic_element(mem, *form, data, i)?;
                    match (target, element) {
                        (Some(id), Some(element)) => {
                            check_runtime_type(self.session, mem, &walker.field_name, *id, element)?;
                            self.record(*id, element, out)?;
                        }
                        (Some(_), None) if !form.nullable_items() => {
                            return Err(WalkError::io_failure(format!(
                                "Empty slot {} in {} '{}'",
                                i,
                                form.type_name(),
                                walker.field_name
                            )));
                        }
                        _ => out.push_str("null"),
                    }
                }
                out.push(']');
            }
        }
        Ok(())
    }

    fn sequence(
        &self,
        inner: &FieldWalker,
        data: Address,
        len: usize,
        out: &mut String,
    ) -> WalkResult<()> {
        let stride = inner.size(self.session);
        out.push('[');
        for i in 0..len {
            if i > 0 {
                out.push_str(", ");
            }
            self.field(inner, data.offset(i * stride), out)?;
        }
        out.push(']');
        Ok(())
    }

    pub(crate) fn record(&self, id: RecordId, addr: Address, out: &mut String) -> WalkResult<()> {
        let record = self.session.record(id);
        out.push('{');
        for (i, member) in record.members.iter().enumerate() {
            if i > 0 {
                out.push_str(", ");
            }
            write_string(out, &member.walker.field_name);
            out.push_str(": ");
            self.field(&member.walker, addr.offset(member.offset), out)?;
        }
        out.push('}');
        Ok(())
    }
}

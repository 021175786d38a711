//! Avro binary emission
//!
//! Values follow the schema shape exactly: the `"null"` placeholder encodes
//! as zero bytes, nullable fields write a union branch index first.

use super::primitive::Widened;
use super::resolve::{dynamic_element, resolve_uid};
use super::schema::SchemaShape;
use super::session::{DiscoverySession, RecordId};
use super::text::check_runtime_type;
use super::{FieldWalker, Resolution, WalkerKind};
use crate::avro::encoding::{
    encode_boolean, encode_double, encode_float, encode_int, encode_long, encode_string,
};
use crate::errors::{WalkError, WalkResult};
use crate::memory::{Address, Memory};

pub(crate) fn encode_widened(out: &mut Vec<u8>, value: Widened) {
    match value {
        Widened::Boolean(v) => encode_boolean(out, v),
        Widened::Int(v) => encode_int(out, v),
        Widened::Long(v) => encode_long(out, v),
        Widened::Float(v) => encode_float(out, v),
        Widened::Double(v) => encode_double(out, v),
    }
}

/// Array framing: one counted block, then the terminator.
pub(crate) fn encode_array_start(out: &mut Vec<u8>, len: usize) {
    if len > 0 {
        encode_long(out, len as i64);
    }
}

pub(crate) fn encode_array_end(out: &mut Vec<u8>) {
    encode_long(out, 0);
}

const NULL_BRANCH: i64 = 0;
const VALUE_BRANCH: i64 = 1;

/// Emits values of one record as Avro binary
pub(crate) struct BinaryEmitter<'a> {
    session: &'a DiscoverySession,
    mem: &'a dyn Memory,
}

impl<'a> BinaryEmitter<'a> {
    pub(crate) fn new(session: &'a DiscoverySession, mem: &'a dyn Memory) -> Self {
        Self { session, mem }
    }

    pub(crate) fn field(&self, walker: &FieldWalker, addr: Address, out: &mut Vec<u8>) -> WalkResult<()> {
        let mem = self.mem;
        match &walker.kind {
            WalkerKind::Primitive(kind) => encode_widened(out, kind.read(mem, addr)?),
            WalkerKind::String(kind) => encode_string(out, &kind.read(mem, addr)?),
            WalkerKind::Record(id) => self.record(*id, addr, out)?,

            WalkerKind::Pointer(pointer) => {
                if self.session.shape(walker) == SchemaShape::Null {
                    return Ok(());
                }
                let target = mem.read_address(addr)?;
                if target.is_null() {
                    encode_long(out, NULL_BRANCH);
                    return Ok(());
                }
                if let WalkerKind::Record(id) = pointer.target.kind {
                    check_runtime_type(self.session, mem, &walker.field_name, id, target)?;
                }
                if pointer.state == Resolution::Resolved
                    && self.session.shape(&pointer.target) == SchemaShape::Union
                {
                    // The inner union already carries the null branch.
                    self.field(&pointer.target, target, out)?;
                } else {
                    encode_long(out, VALUE_BRANCH);
                    self.field(&pointer.target, target, out)?;
                }
            }

            WalkerKind::BackRef { target } => {
                let Some(id) = target else {
                    return Ok(());
                };
                match resolve_uid(mem, mem.read_u32(addr)?) {
                    Some(object) => {
                        check_runtime_type(self.session, mem, &walker.field_name, *id, object)?;
                        encode_long(out, VALUE_BRANCH);
                        self.record(*id, object, out)?;
                    }
                    None => encode_long(out, NULL_BRANCH),
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
                encode_array_start(out, len);
                for i in 0..len {
                    let byte = mem.read_u8(data.offset(i / 8))?;
                    encode_boolean(out, byte & (1 << (i % 8)) != 0);
                }
                encode_array_end(out);
            }

            WalkerKind::Dynamic { form, target } => {
                let data = mem.read_address(addr)?;
                let len = mem.read_u64(addr.offset(8))? as usize;
                encode_array_start(out, len);
                for i in 0..len {
                    let Some(id) = target else {
                        // Items of an unresolved array are the null placeholder.
                        continue;
                    };
                    match dynamic_element(mem, *form, data, i)? {
                        Some(element) => {
                            check_runtime_type(self.session, mem, &walker.field_name, *id, element)?;
                            if form.nullable_items() {
                                encode_long(out, VALUE_BRANCH);
                            }
                            self.record(*id, element, out)?;
                        }
                        None if form.nullable_items() => encode_long(out, NULL_BRANCH),
                        None => {
                            return Err(WalkError::io_failure(format!(
                                "Empty slot {} in {} '{}'",
                                i,
                                form.type_name(),
                                walker.field_name
                            )));
                        }
                    }
                }
                encode_array_end(out);
            }
        }
        Ok(())
    }

    fn sequence(
        &self,
        inner: &FieldWalker,
        data: Address,
        len: usize,
        out: &mut Vec<u8>,
    ) -> WalkResult<()> {
        let stride = inner.size(self.session);
        encode_array_start(out, len);
        for i in 0..len {
            self.field(inner, data.offset(i * stride), out)?;
        }
        encode_array_end(out);
        Ok(())
    }

    pub(crate) fn record(&self, id: RecordId, addr: Address, out: &mut Vec<u8>) -> WalkResult<()> {
        for member in &self.session.record(id).members {
            self.field(&member.walker, addr.offset(member.offset), out)?;
        }
        Ok(())
    }
}

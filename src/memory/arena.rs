//! Bump-allocated byte heap backing one materialized record

use std::collections::HashMap;

use super::{Address, Memory};
use crate::errors::{WalkError, WalkResult};

/// First address handed out; everything below it reads as unmapped.
const BASE: u64 = 0x1000;
const ALIGN: usize = 8;

/// In-memory heap with a runtime-type table and a back-reference registry.
#[derive(Debug, Default)]
pub struct Arena {
    heap: Vec<u8>,
    types: HashMap<Address, String>,
    refs: HashMap<u32, Address>,
}

impl Arena {
    pub fn new() -> Self {
        Self::default()
    }

    /// Reserves `size` zeroed bytes and returns their address.
    pub fn alloc(&mut self, size: usize) -> Address {
        let padded = (self.heap.len() + ALIGN - 1) / ALIGN * ALIGN;
        self.heap.resize(padded + size.max(1), 0);
        Address(BASE + padded as u64)
    }

    /// Copies `data` to `addr`. The range must already be allocated.
    pub fn write(&mut self, addr: Address, data: &[u8]) -> WalkResult<()> {
        let start = self.index(addr, data.len())?;
        self.heap[start..start + data.len()].copy_from_slice(data);
        Ok(())
    }

    pub fn write_u32(&mut self, addr: Address, value: u32) -> WalkResult<()> {
        self.write(addr, &value.to_le_bytes())
    }

    pub fn write_u64(&mut self, addr: Address, value: u64) -> WalkResult<()> {
        self.write(addr, &value.to_le_bytes())
    }

    pub fn write_address(&mut self, addr: Address, target: Address) -> WalkResult<()> {
        self.write_u64(addr, target.0)
    }

    /// Tags the object at `addr` with its runtime class.
    pub fn set_runtime_type(&mut self, addr: Address, class_name: impl Into<String>) {
        self.types.insert(addr, class_name.into());
    }

    /// Registers `addr` as the target of back-reference `uid`.
    pub fn register_ref(&mut self, uid: u32, addr: Address) {
        self.refs.insert(uid, addr);
    }

    /// Bytes allocated so far
    pub fn len(&self) -> usize {
        self.heap.len()
    }

    pub fn is_empty(&self) -> bool {
        self.heap.is_empty()
    }

    fn index(&self, addr: Address, len: usize) -> WalkResult<usize> {
        let out_of_bounds = || {
            WalkError::io_failure(format!("Read of {} bytes outside live memory", len))
                .with_details(format!("address: {}", addr))
        };
        if addr.0 < BASE {
            return Err(out_of_bounds());
        }
        let start = (addr.0 - BASE) as usize;
        match start.checked_add(len) {
            Some(end) if end <= self.heap.len() => Ok(start),
            _ => Err(out_of_bounds()),
        }
    }
}

impl Memory for Arena {
    fn bytes(&self, addr: Address, len: usize) -> WalkResult<&[u8]> {
        let start = self.index(addr, len)?;
        Ok(&self.heap[start..start + len])
    }

    fn runtime_type(&self, addr: Address) -> Option<&str> {
        self.types.get(&addr).map(String::as_str)
    }

    fn ref_target(&self, uid: u32) -> Option<Address> {
        self.refs.get(&uid).copied()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::errors::WalkErrorCode;

    #[test]
    fn test_alloc_is_aligned_and_never_null() {
        let mut arena = Arena::new();
        let a = arena.alloc(3);
        let b = arena.alloc(5);
        assert!(!a.is_null());
        assert_eq!(a.0 % 8, 0);
        assert_eq!(b.0 % 8, 0);
        assert!(b.0 >= a.0 + 3);
    }

    #[test]
    fn test_null_read_is_io_failure() {
        let arena = Arena::new();
        let err = arena.read_u32(Address::NULL).unwrap_err();
        assert_eq!(err.code(), WalkErrorCode::IoFailure);
    }

    #[test]
    fn test_read_past_end_is_io_failure() {
        let mut arena = Arena::new();
        let at = arena.alloc(4);
        assert!(arena.read_u32(at).is_ok());
        assert!(arena.read_u64(at.offset(4)).is_err());
    }

    #[test]
    fn test_runtime_types_and_refs() {
        let mut arena = Arena::new();
        let at = arena.alloc(16);
        arena.set_runtime_type(at, "Track");
        arena.register_ref(7, at);
        assert_eq!(arena.runtime_type(at), Some("Track"));
        assert_eq!(arena.ref_target(7), Some(at));
        assert_eq!(arena.ref_target(8), None);
    }
}

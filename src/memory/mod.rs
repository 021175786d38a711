//! Live memory model for the current record
//!
//! Walkers never own data. They read it through [`Memory`], which exposes:
//! - raw bytes at an address
//! - the runtime class of the object at an address
//! - the back-reference registry (uid -> object address)
//!
//! All scalars are little-endian. Address 0 is null.

mod arena;

pub use arena::Arena;

use std::fmt;

use crate::errors::WalkResult;

/// Size of a pointer slot
pub const POINTER_SIZE: usize = 8;
/// `std::string`: data address u64, length u64
pub const STD_STRING_SIZE: usize = 16;
/// `TString`: length u32, 4 pad bytes, data address u64
pub const TSTRING_SIZE: usize = 16;
/// `vector<T>` and collections: data address, length, capacity
pub const VECTOR_SIZE: usize = 24;
/// `TRef`: uid u32, 4 pad bytes
pub const TREF_SIZE: usize = 8;

/// Byte address into live memory
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Address(pub u64);

impl Address {
    /// The null address
    pub const NULL: Address = Address(0);

    /// Returns true for the null address
    pub fn is_null(self) -> bool {
        self.0 == 0
    }

    /// Address `bytes` past this one
    pub fn offset(self, bytes: usize) -> Address {
        Address(self.0 + bytes as u64)
    }
}

impl fmt::Display for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "0x{:x}", self.0)
    }
}

fn fixed<const N: usize>(bytes: &[u8]) -> [u8; N] {
    let mut out = [0u8; N];
    out.copy_from_slice(&bytes[..N]);
    out
}

/// Read access to the live data of the current record.
///
/// `bytes` must return exactly `len` bytes or an error.
pub trait Memory {
    /// Raw bytes at `addr`
    fn bytes(&self, addr: Address, len: usize) -> WalkResult<&[u8]>;

    /// Runtime class name of the object that starts at `addr`
    fn runtime_type(&self, addr: Address) -> Option<&str>;

    /// Address of the object registered under a back-reference uid
    fn ref_target(&self, uid: u32) -> Option<Address>;

    fn read_u8(&self, addr: Address) -> WalkResult<u8> {
        Ok(self.bytes(addr, 1)?[0])
    }

    fn read_u16(&self, addr: Address) -> WalkResult<u16> {
        Ok(u16::from_le_bytes(fixed(self.bytes(addr, 2)?)))
    }

    fn read_u32(&self, addr: Address) -> WalkResult<u32> {
        Ok(u32::from_le_bytes(fixed(self.bytes(addr, 4)?)))
    }

    fn read_u64(&self, addr: Address) -> WalkResult<u64> {
        Ok(u64::from_le_bytes(fixed(self.bytes(addr, 8)?)))
    }

    fn read_f32(&self, addr: Address) -> WalkResult<f32> {
        Ok(f32::from_le_bytes(fixed(self.bytes(addr, 4)?)))
    }

    fn read_f64(&self, addr: Address) -> WalkResult<f64> {
        Ok(f64::from_le_bytes(fixed(self.bytes(addr, 8)?)))
    }

    /// Pointer slot at `addr`
    fn read_address(&self, addr: Address) -> WalkResult<Address> {
        Ok(Address(self.read_u64(addr)?))
    }

    /// NUL-terminated character buffer, at most `limit` bytes when given
    fn read_cstr(&self, addr: Address, limit: Option<usize>) -> WalkResult<String> {
        let mut out = Vec::new();
        let mut at = addr;
        while limit.map_or(true, |n| out.len() < n) {
            let byte = self.read_u8(at)?;
            if byte == 0 {
                break;
            }
            out.push(byte);
            at = at.offset(1);
        }
        Ok(String::from_utf8_lossy(&out).into_owned())
    }

    /// `len` bytes of character data decoded lossily
    fn read_utf8(&self, addr: Address, len: usize) -> WalkResult<String> {
        if len == 0 {
            return Ok(String::new());
        }
        Ok(String::from_utf8_lossy(self.bytes(addr, len)?).into_owned())
    }
}

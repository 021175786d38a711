//! Avro binary encoding of primitive values
//!
//! `int` and `long` are zig-zag varints, `float`/`double` are little-endian
//! IEEE-754, `boolean` is one byte, `string`/`bytes` are length-prefixed.

use crate::errors::{WalkError, WalkResult};

pub fn encode_long(out: &mut Vec<u8>, value: i64) {
    let mut n = ((value << 1) ^ (value >> 63)) as u64;
    while n >= 0x80 {
        out.push((n as u8) | 0x80);
        n >>= 7;
    }
    out.push(n as u8);
}

pub fn encode_int(out: &mut Vec<u8>, value: i32) {
    encode_long(out, i64::from(value));
}

pub fn encode_boolean(out: &mut Vec<u8>, value: bool) {
    out.push(u8::from(value));
}

pub fn encode_float(out: &mut Vec<u8>, value: f32) {
    out.extend_from_slice(&value.to_le_bytes());
}

pub fn encode_double(out: &mut Vec<u8>, value: f64) {
    out.extend_from_slice(&value.to_le_bytes());
}

pub fn encode_bytes(out: &mut Vec<u8>, value: &[u8]) {
    encode_long(out, value.len() as i64);
    out.extend_from_slice(value);
}

pub fn encode_string(out: &mut Vec<u8>, value: &str) {
    encode_bytes(out, value.as_bytes());
}

/// Cursor over an encoded buffer
#[derive(Debug)]
pub struct Decoder<'a> {
    data: &'a [u8],
    pos: usize,
}

impl<'a> Decoder<'a> {
    pub fn new(data: &'a [u8]) -> Self {
        Self { data, pos: 0 }
    }

    pub fn position(&self) -> usize {
        self.pos
    }

    pub fn is_empty(&self) -> bool {
        self.pos >= self.data.len()
    }

    pub fn take(&mut self, len: usize) -> WalkResult<&'a [u8]> {
        let end = self
            .pos
            .checked_add(len)
            .filter(|end| *end <= self.data.len())
            .ok_or_else(|| {
                WalkError::io_failure(format!(
                    "Truncated input: need {} bytes at offset {}",
                    len, self.pos
                ))
            })?;
        let out = &self.data[self.pos..end];
        self.pos = end;
        Ok(out)
    }

    pub fn long(&mut self) -> WalkResult<i64> {
        let mut n: u64 = 0;
        let mut shift = 0;
        loop {
            if shift > 63 {
                return Err(WalkError::io_failure("Varint longer than 10 bytes"));
            }
            let byte = self.take(1)?[0];
            n |= u64::from(byte & 0x7f) << shift;
            if byte & 0x80 == 0 {
                break;
            }
            shift += 7;
        }
        Ok(((n >> 1) as i64) ^ -((n & 1) as i64))
    }

    pub fn int(&mut self) -> WalkResult<i32> {
        let value = self.long()?;
        i32::try_from(value)
            .map_err(|_| WalkError::io_failure(format!("Value {} out of int range", value)))
    }

    pub fn boolean(&mut self) -> WalkResult<bool> {
        Ok(self.take(1)?[0] != 0)
    }

    pub fn float(&mut self) -> WalkResult<f32> {
        let mut raw = [0u8; 4];
        raw.copy_from_slice(self.take(4)?);
        Ok(f32::from_le_bytes(raw))
    }

    pub fn double(&mut self) -> WalkResult<f64> {
        let mut raw = [0u8; 8];
        raw.copy_from_slice(self.take(8)?);
        Ok(f64::from_le_bytes(raw))
    }

    pub fn bytes(&mut self) -> WalkResult<&'a [u8]> {
        let len = self.long()?;
        let len = usize::try_from(len)
            .map_err(|_| WalkError::io_failure(format!("Negative length {}", len)))?;
        self.take(len)
    }

    pub fn string(&mut self) -> WalkResult<String> {
        let raw = self.bytes()?;
        String::from_utf8(raw.to_vec())
            .map_err(|_| WalkError::io_failure("String is not valid UTF-8"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn long_bytes(value: i64) -> Vec<u8> {
        let mut out = Vec::new();
        encode_long(&mut out, value);
        out
    }

    #[test]
    fn test_zigzag_varints() {
        assert_eq!(long_bytes(0), vec![0x00]);
        assert_eq!(long_bytes(-1), vec![0x01]);
        assert_eq!(long_bytes(1), vec![0x02]);
        assert_eq!(long_bytes(-64), vec![0x7f]);
        assert_eq!(long_bytes(64), vec![0x80, 0x01]);
        assert_eq!(long_bytes(4294967295), vec![0xfe, 0xff, 0xff, 0xff, 0x1f]);
    }

    #[test]
    fn test_decoder_reads_back_mixed_values() {
        let mut out = Vec::new();
        encode_long(&mut out, i64::MIN);
        encode_int(&mut out, -7);
        encode_boolean(&mut out, true);
        encode_float(&mut out, 1.5);
        encode_double(&mut out, -2.25);
        encode_string(&mut out, "hé");

        let mut dec = Decoder::new(&out);
        assert_eq!(dec.long().unwrap(), i64::MIN);
        assert_eq!(dec.int().unwrap(), -7);
        assert!(dec.boolean().unwrap());
        assert_eq!(dec.float().unwrap(), 1.5);
        assert_eq!(dec.double().unwrap(), -2.25);
        assert_eq!(dec.string().unwrap(), "hé");
        assert!(dec.is_empty());
    }

    #[test]
    fn test_truncated_input_is_error() {
        let mut dec = Decoder::new(&[0x80]);
        assert!(dec.long().is_err());
        let mut dec = Decoder::new(&[0x06, b'a']);
        assert!(dec.string().is_err());
    }
}

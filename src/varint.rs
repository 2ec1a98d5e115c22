//! LEB128 variable-length integers.
//!
//! Unsigned values are split into 7-bit groups, least significant group first. Every byte but
//! the last has its high bit set. Signed values are zig-zag mapped first, so small negative
//! numbers stay as short as small positive ones.

use byteorder::ReadBytesExt;

use crate::error::{Error, Result};

pub(crate) fn write_unsigned(buf: &mut Vec<u8>, mut v: u64) {
    loop {
        let group = (v & 0x7F) as u8;
        v >>= 7;
        if v == 0 {
            buf.push(group);
            return;
        }
        buf.push(group | 0x80);
    }
}

pub(crate) fn read_unsigned(buf: &mut &[u8]) -> Result<u64> {
    let mut result = 0u64;
    let mut shift = 0u32;
    loop {
        let byte = buf.read_u8().map_err(|_| Error::ShortRead {
            step: "decode varint",
            actual: 0,
            expected: 1,
        })?;
        let payload = (byte & 0x7F) as u64;
        if shift > 63 || (shift == 63 && payload > 1) {
            return Err(Error::Format(String::from("varint larger than a u64")));
        }
        result |= payload << shift;
        if byte & 0x80 == 0 {
            return Ok(result);
        }
        shift += 7;
    }
}

pub(crate) fn zigzag_encode(v: i64) -> u64 {
    ((v << 1) ^ (v >> 63)) as u64
}

pub(crate) fn zigzag_decode(v: u64) -> i64 {
    ((v >> 1) as i64) ^ -((v & 1) as i64)
}

pub(crate) fn write_signed(buf: &mut Vec<u8>, v: i64) {
    write_unsigned(buf, zigzag_encode(v))
}

pub(crate) fn read_signed(buf: &mut &[u8]) -> Result<i64> {
    read_unsigned(buf).map(zigzag_decode)
}

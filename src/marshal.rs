//! Primitive encoding and decoding.
//!
//! [`Marshaller`] builds a tag body in memory. [`Unmarshaller`] walks a fully loaded tag body and
//! carries the [`DecodeContext`] of the stream it came from, so every decode path can ask which
//! minor version wrote the bytes. [`Lenient`] wraps an `Unmarshaller` for best-effort reads,
//! where running out of bytes means "not present" instead of "corrupt".
//!
//! Fixed-width integers are big-endian. Floats travel as their IEEE-754 bit pattern.

use byteorder::{BigEndian, ReadBytesExt};
use tracing::warn;

use crate::context::DecodeContext;
use crate::error::{Error, Result};
use crate::migrate::{Layout, Migration, VersionedField};
use crate::tag::CANARY;
use crate::varint;
use crate::version::Minor;
use crate::MAX_STRING_LEN;

/// A map position. Two 2-byte signed components on the wire.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Coord {
    pub x: i16,
    pub y: i16,
}

impl Coord {
    pub fn new(x: i16, y: i16) -> Self {
        Self { x, y }
    }
}

fn read_narrow_coord(r: &mut Unmarshaller<'_>) -> Result<Coord> {
    let x = r.read_i8()? as i16;
    let y = r.read_i8()? as i16;
    Ok(Coord { x, y })
}

fn read_wide_coord(r: &mut Unmarshaller<'_>) -> Result<Coord> {
    let x = r.read_i16()?;
    let y = r.read_i16()?;
    Ok(Coord { x, y })
}

static COORD: VersionedField<Coord> = VersionedField {
    name: "coord",
    current: read_wide_coord,
    history: &[Migration {
        before: Minor::WideCoords,
        layout: Layout::Legacy(read_narrow_coord),
    }],
};

/// Accumulates an encoded tag body.
#[derive(Clone, Debug, Default)]
pub struct Marshaller {
    buf: Vec<u8>,
}

impl Marshaller {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.buf.len()
    }

    pub fn is_empty(&self) -> bool {
        self.buf.is_empty()
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.buf
    }

    pub fn into_inner(self) -> Vec<u8> {
        self.buf
    }

    pub fn write_u8(&mut self, v: u8) {
        self.buf.push(v);
    }

    pub fn write_i8(&mut self, v: i8) {
        self.buf.push(v as u8);
    }

    pub fn write_u16(&mut self, v: u16) {
        self.buf.extend_from_slice(&v.to_be_bytes());
    }

    pub fn write_i16(&mut self, v: i16) {
        self.buf.extend_from_slice(&v.to_be_bytes());
    }

    pub fn write_u32(&mut self, v: u32) {
        self.buf.extend_from_slice(&v.to_be_bytes());
    }

    pub fn write_i32(&mut self, v: i32) {
        self.buf.extend_from_slice(&v.to_be_bytes());
    }

    pub fn write_unsigned(&mut self, v: u64) {
        varint::write_unsigned(&mut self.buf, v);
    }

    pub fn write_signed(&mut self, v: i64) {
        varint::write_signed(&mut self.buf, v);
    }

    pub fn write_f32(&mut self, v: f32) {
        self.write_u32(v.to_bits());
    }

    pub fn write_bool(&mut self, v: bool) {
        self.buf.push(v as u8);
    }

    /// Write a string with a 2-byte length prefix. Strings longer than [`MAX_STRING_LEN`] bytes
    /// are cut at the last character boundary that fits.
    pub fn write_string(&mut self, v: &str) {
        let mut len = v.len();
        if len > MAX_STRING_LEN {
            len = MAX_STRING_LEN;
            while !v.is_char_boundary(len) {
                len -= 1;
            }
            warn!(
                original = v.len(),
                truncated = len,
                "Truncating over-long string"
            );
        }
        self.write_u16(len as u16);
        self.buf.extend_from_slice(&v.as_bytes()[..len]);
    }

    /// Raw bytes with no length prefix.
    pub fn write_bytes(&mut self, v: &[u8]) {
        self.buf.extend_from_slice(v);
    }

    pub fn write_coord(&mut self, c: Coord) {
        self.write_i16(c.x);
        self.write_i16(c.y);
    }

    /// Mark the end of a subsection.
    pub fn canary(&mut self) {
        self.buf.push(CANARY);
    }
}

/// Decodes values from a fully loaded tag body. The `read_*` methods either succeed or fail
/// without consuming anything. Values built from several reads, like containers and state
/// sections, may fail part way through.
#[derive(Clone, Debug)]
pub struct Unmarshaller<'a> {
    data: &'a [u8],
    ctx: DecodeContext,
}

impl<'a> Unmarshaller<'a> {
    pub fn new(data: &'a [u8], ctx: DecodeContext) -> Self {
        Self { data, ctx }
    }

    pub fn context(&self) -> &DecodeContext {
        &self.ctx
    }

    /// The minor version of the stream being read.
    pub fn minor(&self) -> u8 {
        self.ctx.minor
    }

    pub fn since(&self, threshold: Minor) -> bool {
        self.ctx.since(threshold)
    }

    pub fn before(&self, threshold: Minor) -> bool {
        self.ctx.before(threshold)
    }

    pub fn remaining(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    fn take(&mut self, step: &'static str, n: usize) -> Result<&'a [u8]> {
        if n > self.data.len() {
            return Err(Error::ShortRead {
                step,
                actual: self.data.len(),
                expected: n,
            });
        }
        let (head, rest) = self.data.split_at(n);
        self.data = rest;
        Ok(head)
    }

    pub fn read_u8(&mut self) -> Result<u8> {
        Ok(self.take("decode u8", 1)?[0])
    }

    pub fn read_i8(&mut self) -> Result<i8> {
        Ok(self.take("decode i8", 1)?[0] as i8)
    }

    pub fn read_u16(&mut self) -> Result<u16> {
        let mut b = self.take("decode u16", 2)?;
        Ok(b.read_u16::<BigEndian>()?)
    }

    pub fn read_i16(&mut self) -> Result<i16> {
        let mut b = self.take("decode i16", 2)?;
        Ok(b.read_i16::<BigEndian>()?)
    }

    pub fn read_u32(&mut self) -> Result<u32> {
        let mut b = self.take("decode u32", 4)?;
        Ok(b.read_u32::<BigEndian>()?)
    }

    pub fn read_i32(&mut self) -> Result<i32> {
        let mut b = self.take("decode i32", 4)?;
        Ok(b.read_i32::<BigEndian>()?)
    }

    pub fn read_unsigned(&mut self) -> Result<u64> {
        let mut data = self.data;
        let v = varint::read_unsigned(&mut data)?;
        self.data = data;
        Ok(v)
    }

    pub fn read_signed(&mut self) -> Result<i64> {
        let mut data = self.data;
        let v = varint::read_signed(&mut data)?;
        self.data = data;
        Ok(v)
    }

    pub fn read_f32(&mut self) -> Result<f32> {
        self.read_u32().map(f32::from_bits)
    }

    /// Any nonzero byte is true.
    pub fn read_bool(&mut self) -> Result<bool> {
        Ok(self.read_u8()? != 0)
    }

    pub fn read_string(&mut self) -> Result<String> {
        let mut data = self.data;
        let len = data.read_u16::<BigEndian>().map_err(|_| Error::ShortRead {
            step: "decode string length",
            actual: self.data.len(),
            expected: 2,
        })? as usize;
        // Limits loaded from config may ask for more than the format allows
        let max = self.ctx.limits.max_string_len.min(MAX_STRING_LEN);
        if len > max {
            return Err(Error::Format(format!(
                "string length {} is over the limit of {}",
                len, max
            )));
        }
        if len > data.len() {
            return Err(Error::Format(format!(
                "string length {} runs past the end of the tag ({} bytes left)",
                len,
                data.len()
            )));
        }
        let (raw, rest) = data.split_at(len);
        let s = std::str::from_utf8(raw)
            .map_err(|e| Error::Format(format!("string is not valid UTF-8: {}", e)))?;
        self.data = rest;
        Ok(s.to_string())
    }

    pub fn read_bytes(&mut self, n: usize) -> Result<&'a [u8]> {
        self.take("decode raw bytes", n)
    }

    pub fn read_coord(&mut self) -> Result<Coord> {
        let start = self.data;
        COORD.read(self).map_err(|e| {
            self.data = start;
            e
        })
    }

    /// Skip `n` bytes that have no meaning any more.
    pub fn advance(&mut self, n: usize) -> Result<()> {
        self.take("skip bytes", n).map(|_| ())
    }

    /// Check the canary that ends the subsection before `section`.
    pub fn expect_canary(&mut self, section: &'static str) -> Result<()> {
        let actual = self.take("decode canary", 1)?[0];
        if actual != CANARY {
            warn!(
                section,
                actual,
                remaining = self.data.len(),
                "Canary mismatch"
            );
            return Err(Error::CanaryMismatch {
                section,
                expected: CANARY,
                actual,
            });
        }
        Ok(())
    }

    /// Fail if anything is left over once a tag has been fully parsed.
    pub fn expect_end(&self, name: &str) -> Result<()> {
        if self.data.is_empty() {
            Ok(())
        } else {
            Err(Error::Format(format!(
                "{} unread bytes at the end of tag [{}]",
                self.data.len(),
                name
            )))
        }
    }
}

/// A best-effort reader. A value that runs off the end of the data is reported as absent rather
/// than as an error, and once one value is absent every later one is too. Any other failure is
/// still an error.
#[derive(Clone, Debug)]
pub struct Lenient<'a> {
    inner: Unmarshaller<'a>,
    exhausted: bool,
}

impl<'a> Lenient<'a> {
    pub fn new(inner: Unmarshaller<'a>) -> Self {
        Self {
            inner,
            exhausted: false,
        }
    }

    /// True once a read has run out of data.
    pub fn is_exhausted(&self) -> bool {
        self.exhausted
    }

    /// A value that must be present.
    pub fn required<T, F>(&mut self, f: F) -> Result<T>
    where
        F: FnOnce(&mut Unmarshaller<'a>) -> Result<T>,
    {
        f(&mut self.inner)
    }

    /// A value that may be missing from the end of the data. On a short read the position is
    /// restored and `None` comes back.
    pub fn optional<T, F>(&mut self, f: F) -> Result<Option<T>>
    where
        F: FnOnce(&mut Unmarshaller<'a>) -> Result<T>,
    {
        if self.exhausted {
            return Ok(None);
        }
        let saved = self.inner.data;
        match f(&mut self.inner) {
            Ok(v) => Ok(Some(v)),
            Err(e) if e.is_short_read() => {
                self.inner.data = saved;
                self.exhausted = true;
                Ok(None)
            }
            Err(e) => Err(e),
        }
    }

    pub fn into_inner(self) -> Unmarshaller<'a> {
        self.inner
    }
}

//! Length-framed tags.
//!
//! A tag body is built in memory first, then written as a 4-byte big-endian length followed by
//! the body. Reading pulls exactly that many bytes into memory before parsing anything, and the
//! parser must consume all of them. Inside a body, subsections are separated by [`CANARY`] bytes
//! so a reader that drifts out of step with the writer fails at the next boundary instead of
//! quietly misreading everything after it.

use byteorder::{BigEndian, ReadBytesExt};
use tracing::debug;

use crate::context::DecodeContext;
use crate::error::{Error, Result};
use crate::marshal::{Lenient, Marshaller, Unmarshaller};
use crate::stream::ByteStream;
use crate::MAX_TAG_SIZE;

/// The byte written between subsections of a tag body.
pub const CANARY: u8 = 0xA5;

/// The tags a save can hold.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum TagKind {
    /// Character summary for save browsers.
    Chr,
    /// The player and everything carried between levels.
    You,
    /// The current level.
    Level,
    /// Ghosts left on a level by dead characters.
    Ghost,
}

impl TagKind {
    pub const ALL: [TagKind; 4] = [TagKind::Chr, TagKind::You, TagKind::Level, TagKind::Ghost];

    /// Name of the package chunk holding this tag.
    pub fn chunk_name(&self) -> &'static str {
        match self {
            TagKind::Chr => "chr",
            TagKind::You => "you",
            TagKind::Level => "lvl",
            TagKind::Ghost => "ghost",
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            TagKind::Chr => "CHR",
            TagKind::You => "YOU",
            TagKind::Level => "LEVEL",
            TagKind::Ghost => "GHOST",
        }
    }
}

/// A type that is saved as the body of one tag.
pub trait TagBody: Sized {
    const KIND: TagKind;

    fn marshal(&self, m: &mut Marshaller);

    fn unmarshal(r: &mut Unmarshaller<'_>) -> Result<Self>;

    /// The value to use when a save has no tag of this kind. Saves older than the tag itself get
    /// a value here; anything else is a missing chunk.
    fn missing(_ctx: &DecodeContext) -> Option<Self> {
        None
    }
}

/// Encode a tag body and write it, framed, to the stream.
pub fn write_tag<S, T>(stream: &mut S, body: &T) -> Result<()>
where
    S: ByteStream + ?Sized,
    T: TagBody,
{
    write_tag_with(stream, T::KIND.name(), |m| body.marshal(m))
}

pub fn write_tag_with<S, F>(stream: &mut S, name: &str, f: F) -> Result<()>
where
    S: ByteStream + ?Sized,
    F: FnOnce(&mut Marshaller),
{
    let mut m = Marshaller::new();
    f(&mut m);
    let body = m.into_inner();
    if body.len() > MAX_TAG_SIZE {
        return Err(Error::LengthTooLong {
            max: MAX_TAG_SIZE,
            actual: body.len(),
        });
    }
    stream.write(&(body.len() as u32).to_be_bytes());
    stream.write(&body);
    debug!(tag = name, len = body.len(), "Sealed tag");
    Ok(())
}

fn load_body<S>(stream: &mut S, name: &str, ctx: &DecodeContext) -> Result<Vec<u8>>
where
    S: ByteStream + ?Sized,
{
    let len_bytes = stream.read_exact(4)?;
    let len = (&len_bytes[..]).read_u32::<BigEndian>()? as usize;
    let max = ctx.limits.max_tag_size;
    if len > max {
        return Err(Error::LengthTooLong { max, actual: len });
    }
    let body = stream.read_exact(len)?;
    debug!(tag = name, len, "Loaded tag");
    Ok(body)
}

/// Read a framed tag and decode it. The whole body must be consumed.
pub fn read_tag<S, T>(stream: &mut S, ctx: DecodeContext) -> Result<T>
where
    S: ByteStream + ?Sized,
    T: TagBody,
{
    read_tag_with(stream, T::KIND.name(), ctx, T::unmarshal)
}

pub fn read_tag_with<S, T, F>(stream: &mut S, name: &str, ctx: DecodeContext, f: F) -> Result<T>
where
    S: ByteStream + ?Sized,
    F: for<'a> FnOnce(&mut Unmarshaller<'a>) -> Result<T>,
{
    let body = load_body(stream, name, &ctx)?;
    let mut r = Unmarshaller::new(&body, ctx);
    let value = f(&mut r)?;
    r.expect_end(name)?;
    Ok(value)
}

/// Read a framed tag with a best-effort decoder. Values missing from the end of the body come
/// back absent, and bytes the decoder doesn't know about are ignored.
pub fn peek_tag_with<S, T, F>(stream: &mut S, name: &str, ctx: DecodeContext, f: F) -> Result<T>
where
    S: ByteStream + ?Sized,
    F: for<'a> FnOnce(&mut Lenient<'a>) -> Result<T>,
{
    let body = load_body(stream, name, &ctx)?;
    let mut l = Lenient::new(Unmarshaller::new(&body, ctx));
    f(&mut l)
}

//! Whole saves: one package per save, one chunk per tag, each chunk stamped with the version
//! that wrote it.

use std::path::Path;

use tracing::{debug, info};

use crate::context::{DecodeContext, Limits};
use crate::error::{Error, Result};
use crate::package::Package;
use crate::stream::ByteStream;
use crate::summary::{self, CharSummary};
use crate::tag::{read_tag, write_tag, TagBody, TagKind};
use crate::version::SaveVersion;

/// What a save file holds, and so which tags it must have.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum SaveKind {
    /// A character in progress.
    Player,
    /// A level the player has left.
    Level,
    /// Ghosts waiting for a level to be generated.
    Ghost,
}

impl SaveKind {
    pub fn expected_tags(&self) -> &'static [TagKind] {
        match self {
            SaveKind::Player => &[TagKind::Chr, TagKind::You, TagKind::Level, TagKind::Ghost],
            SaveKind::Level => &[TagKind::Level],
            SaveKind::Ghost => &[TagKind::Ghost],
        }
    }

    /// The tag whose version stamp speaks for the whole save.
    pub fn primary(&self) -> TagKind {
        match self {
            SaveKind::Player => TagKind::You,
            SaveKind::Level => TagKind::Level,
            SaveKind::Ghost => TagKind::Ghost,
        }
    }
}

/// Write the current version stamp, then the framed tag.
pub fn write_versioned_tag<S, T>(stream: &mut S, body: &T) -> Result<()>
where
    S: ByteStream + ?Sized,
    T: TagBody,
{
    SaveVersion::CURRENT.write_to(stream);
    write_tag(stream, body)
}

/// Read a version stamp, refuse it if this build can't read that version, then read the framed
/// tag with the stamp's minor version.
pub fn read_versioned_tag<S, T>(stream: &mut S, limits: Limits) -> Result<T>
where
    S: ByteStream + ?Sized,
    T: TagBody,
{
    let version = SaveVersion::read_from(stream)?;
    version.check()?;
    let ctx = DecodeContext::new(version.minor).with_limits(limits);
    read_tag(stream, ctx)
}

/// An open save package.
#[derive(Debug)]
pub struct SaveFile {
    package: Package,
    kind: SaveKind,
    limits: Limits,
}

impl SaveFile {
    /// Start a new save. Nothing reaches the disk until [`commit`][SaveFile::commit].
    pub fn create(path: impl AsRef<Path>, kind: SaveKind) -> Result<SaveFile> {
        Ok(SaveFile {
            package: Package::create(path)?,
            kind,
            limits: Limits::default(),
        })
    }

    /// Open a save for loading.
    pub fn open(path: impl AsRef<Path>, kind: SaveKind) -> Result<SaveFile> {
        Ok(SaveFile {
            package: Package::open(path)?,
            kind,
            limits: Limits::default(),
        })
    }

    /// Open a save to update some of its tags.
    pub fn open_rw(path: impl AsRef<Path>, kind: SaveKind) -> Result<SaveFile> {
        Ok(SaveFile {
            package: Package::open_rw(path)?,
            kind,
            limits: Limits::default(),
        })
    }

    pub fn with_limits(mut self, limits: Limits) -> Self {
        self.limits = limits;
        self
    }

    pub fn kind(&self) -> SaveKind {
        self.kind
    }

    pub fn package(&self) -> &Package {
        &self.package
    }

    pub fn write_tag<T: TagBody>(&mut self, body: &T) -> Result<()> {
        let mut w = self.package.writer(T::KIND.chunk_name())?;
        write_versioned_tag(&mut w, body)?;
        w.finish()
    }

    /// Load one tag. A tag with no chunk is filled in by [`TagBody::missing`], judged by the
    /// version of the save's primary tag; if that has nothing to offer, the chunk is reported
    /// missing.
    pub fn read_tag<T: TagBody>(&self) -> Result<T> {
        let name = T::KIND.chunk_name();
        if !self.package.has_chunk(name) {
            let ctx = self.primary_context()?;
            return match T::missing(&ctx) {
                Some(v) => {
                    debug!(tag = T::KIND.name(), minor = ctx.minor, "Tag absent from older save, using default");
                    Ok(v)
                }
                None => Err(Error::MissingChunk(name.to_string())),
            };
        }
        let mut r = self.package.reader(name)?;
        let value = read_versioned_tag(&mut r, self.limits)?;
        if !r.at_eof() {
            return Err(Error::Format(format!(
                "{} unread bytes after tag in chunk [{}]",
                r.remaining(),
                name
            )));
        }
        Ok(value)
    }

    fn primary_context(&self) -> Result<DecodeContext> {
        let mut r = self.package.reader(self.kind.primary().chunk_name())?;
        let version = SaveVersion::read_from(&mut r)?;
        version.check()?;
        Ok(DecodeContext::new(version.minor).with_limits(self.limits))
    }

    /// Expected tags with no chunk in the package.
    pub fn missing_tags(&self) -> Vec<TagKind> {
        self.kind
            .expected_tags()
            .iter()
            .copied()
            .filter(|k| !self.package.has_chunk(k.chunk_name()))
            .collect()
    }

    /// Make every tag written so far durable.
    pub fn commit(&mut self) -> Result<()> {
        let missing = self.missing_tags();
        if !missing.is_empty() {
            info!(?missing, "Committing save with tags still missing");
        }
        self.package.commit()
    }

    pub fn abort(self) {
        self.package.abort()
    }

    /// Read the character summary of the save at `path` without loading anything else.
    pub fn peek_char_summary(path: impl AsRef<Path>) -> Result<CharSummary> {
        let package = Package::open(path)?;
        let mut r = package.reader(TagKind::Chr.chunk_name())?;
        summary::peek_char_summary(&mut r)
    }
}

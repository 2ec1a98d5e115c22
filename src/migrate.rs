//! Reading fields whose layout changed over the life of a major version.
//!
//! A [`VersionedField`] is a decode table: the current layout plus a list of historical layouts,
//! each tagged with the minor version that retired it. One lookup on the stream's minor picks the
//! decoder, which either reads an old layout and converts it, or supplies a default for a field
//! that didn't exist yet. Chains of changes to one field are written as one composed legacy
//! decoder, so a value from any minor goes straight to the current type.
//!
//! Writers always use the current layout. Nothing in here runs on write.

use tracing::trace;

use crate::error::Result;
use crate::marshal::Unmarshaller;
use crate::version::Minor;

pub type DecodeFn<T> = for<'r, 'a> fn(&'r mut Unmarshaller<'a>) -> Result<T>;

/// How a field was stored in some range of older minor versions.
pub enum Layout<T: 'static> {
    /// Not stored at all. The field takes this value.
    Absent(fn() -> T),
    /// Stored differently. The decoder reads the old bytes and converts.
    Legacy(DecodeFn<T>),
}

/// A layout that was in use for every minor version below `before`.
pub struct Migration<T: 'static> {
    pub before: Minor,
    pub layout: Layout<T>,
}

pub struct VersionedField<T: 'static> {
    pub name: &'static str,
    pub current: DecodeFn<T>,
    /// Sorted by `before`, oldest first.
    pub history: &'static [Migration<T>],
}

impl<T: 'static> VersionedField<T> {
    /// The historical layout for a stream of the given minor version, or `None` for the current
    /// layout.
    pub fn select(&self, minor: u8) -> Option<&'static Layout<T>> {
        self.history
            .iter()
            .find(|m| minor < m.before as u8)
            .map(|m| &m.layout)
    }

    pub fn read(&self, r: &mut Unmarshaller<'_>) -> Result<T> {
        match self.select(r.minor()) {
            None => (self.current)(r),
            Some(Layout::Absent(default)) => {
                trace!(field = self.name, minor = r.minor(), "Field absent, using default");
                Ok(default())
            }
            Some(Layout::Legacy(decode)) => {
                trace!(field = self.name, minor = r.minor(), "Reading legacy layout");
                decode(r)
            }
        }
    }
}

/// A field that was saved for a while and then dropped. Streams in `since..until` still carry
/// its bytes, which are read and thrown away.
pub struct Obsolete {
    pub name: &'static str,
    pub since: Minor,
    pub until: Minor,
    pub skip: for<'r, 'a> fn(&'r mut Unmarshaller<'a>) -> Result<()>,
}

impl Obsolete {
    pub fn skip_if_present(&self, r: &mut Unmarshaller<'_>) -> Result<()> {
        if r.since(self.since) && r.before(self.until) {
            trace!(field = self.name, minor = r.minor(), "Skipping obsolete field");
            (self.skip)(r)?;
        }
        Ok(())
    }
}

//! The (major, minor) version stamp and the minor versions the reader knows about.
//!
//! A major version change is a deliberate layout break: saves from any other major are refused.
//! Minor versions are the unit of backward-compatible evolution. Each [`Minor`] names the first
//! minor version that writes a new layout; readers compare the stream's minor against these
//! thresholds to pick a decode path, always as "since" or "before", never as an exact match.

use std::convert::TryFrom;

use tracing::warn;

use crate::error::{Error, Result};
use crate::stream::ByteStream;
use crate::MAJOR_VERSION;

/// Minor version thresholds, oldest first.
#[repr(u8)]
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Minor {
    /// The first layout of this major version.
    Original = 0,
    /// Hit points widened from one byte to a 2-byte signed integer.
    HpShort = 1,
    /// Player status flags are saved as a bit vector.
    PlayerFlags = 2,
    /// Coordinates widened from 1-byte to 2-byte components.
    WideCoords = 3,
    /// God ids reordered.
    GodRenumber = 4,
    /// The running score field was dropped from the player record.
    DropScore = 5,
    /// Hit points are saved as a signed varint.
    HpVarint = 6,
    /// Monster speed is saved in tenths, as a 2-byte value.
    SpeedTenths = 7,
    /// The companions subsection was added to the player tag.
    Companions = 8,
    /// Two retired gods are folded into their successors.
    RetiredGods = 9,
    /// Ghost records carry a resistance bit vector.
    GhostResists = 10,
    /// Player saves carry the ghosts of the current level in their own tag.
    GhostTag = 11,
    /// Clouds carry a density.
    CloudDensity = 12,
}

impl Minor {
    /// The minor version this build writes.
    pub const CURRENT: Minor = Minor::CloudDensity;

    pub fn from_u8(v: u8) -> Option<Minor> {
        use self::Minor::*;
        Some(match v {
            0 => Original,
            1 => HpShort,
            2 => PlayerFlags,
            3 => WideCoords,
            4 => GodRenumber,
            5 => DropScore,
            6 => HpVarint,
            7 => SpeedTenths,
            8 => Companions,
            9 => RetiredGods,
            10 => GhostResists,
            11 => GhostTag,
            12 => CloudDensity,
            _ => return None,
        })
    }
}

impl From<Minor> for u8 {
    fn from(val: Minor) -> u8 {
        val as u8
    }
}

impl TryFrom<u8> for Minor {
    type Error = u8;
    fn try_from(val: u8) -> Result<Minor, u8> {
        Minor::from_u8(val).ok_or(val)
    }
}

/// The version stamp at the start of every saved chunk.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct SaveVersion {
    pub major: u8,
    pub minor: u8,
}

impl SaveVersion {
    /// The version this build writes.
    pub const CURRENT: SaveVersion = SaveVersion {
        major: MAJOR_VERSION,
        minor: Minor::CURRENT as u8,
    };

    pub fn new(major: u8, minor: u8) -> Self {
        Self { major, minor }
    }

    pub fn write_to<S: ByteStream + ?Sized>(&self, stream: &mut S) {
        stream.write(&[self.major, self.minor]);
    }

    pub fn read_from<S: ByteStream + ?Sized>(stream: &mut S) -> Result<SaveVersion> {
        let major = stream.read_byte()?;
        let minor = stream.read_byte()?;
        Ok(SaveVersion { major, minor })
    }

    /// Refuse versions this build can't read: any other major, or a minor from the future.
    pub fn check(&self) -> Result<()> {
        if self.major < MAJOR_VERSION {
            warn!(major = self.major, minor = self.minor, "Refusing save from an older major version");
            return Err(Error::OldVersion {
                major: self.major,
                minor: self.minor,
            });
        }
        if self.major > MAJOR_VERSION || self.minor > Minor::CURRENT as u8 {
            warn!(major = self.major, minor = self.minor, "Refusing save from a newer build");
            return Err(Error::NewerVersion {
                major: self.major,
                minor: self.minor,
            });
        }
        Ok(())
    }
}

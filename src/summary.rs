//! The character summary tag, read by save browsers without loading the game.
//!
//! The summary carries its own format byte, separate from the save's minor version. Fields are
//! only ever appended, so a browser can read what it knows from a newer summary and fall back to
//! defaults for what an older one lacks.

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::context::DecodeContext;
use crate::error::Result;
use crate::marshal::{Lenient, Marshaller, Unmarshaller};
use crate::stream::ByteStream;
use crate::tag::{peek_tag_with, TagBody, TagKind};
use crate::version::SaveVersion;

/// Format 1: name, species, job, level. Format 2 adds place and god. Format 3 adds the wizard
/// flag and the turn count.
pub const SUMMARY_FORMAT_VERSION: u8 = 3;

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CharSummary {
    pub name: String,
    pub species: String,
    pub job: String,
    pub xl: u8,
    pub place: String,
    pub god: String,
    pub wizard: bool,
    pub turns: u64,
}

impl CharSummary {
    fn read_later_fields(&mut self, format: u8, l: &mut Lenient<'_>) -> Result<()> {
        if format >= 2 {
            if let Some(place) = l.optional(|r| r.read_string())? {
                self.place = place;
            }
            if let Some(god) = l.optional(|r| r.read_string())? {
                self.god = god;
            }
        }
        if format >= 3 {
            if let Some(wizard) = l.optional(|r| r.read_bool())? {
                self.wizard = wizard;
            }
            if let Some(turns) = l.optional(|r| r.read_unsigned())? {
                self.turns = turns;
            }
        }
        Ok(())
    }

    /// Best-effort decode: only the format-1 fields are required.
    pub fn peek(l: &mut Lenient<'_>) -> Result<CharSummary> {
        let format = l.required(|r| r.read_u8())?;
        let mut s = CharSummary {
            name: l.required(|r| r.read_string())?,
            species: l.required(|r| r.read_string())?,
            job: l.required(|r| r.read_string())?,
            xl: l.required(|r| r.read_u8())?,
            ..CharSummary::default()
        };
        s.read_later_fields(format, l)?;
        Ok(s)
    }
}

impl TagBody for CharSummary {
    const KIND: TagKind = TagKind::Chr;

    fn marshal(&self, m: &mut Marshaller) {
        m.write_u8(SUMMARY_FORMAT_VERSION);
        m.write_string(&self.name);
        m.write_string(&self.species);
        m.write_string(&self.job);
        m.write_u8(self.xl);
        m.write_string(&self.place);
        m.write_string(&self.god);
        m.write_bool(self.wizard);
        m.write_unsigned(self.turns);
    }

    fn unmarshal(r: &mut Unmarshaller<'_>) -> Result<Self> {
        let format = r.read_u8()?;
        let mut s = CharSummary {
            name: r.read_string()?,
            species: r.read_string()?,
            job: r.read_string()?,
            xl: r.read_u8()?,
            ..CharSummary::default()
        };
        if format >= 2 {
            s.place = r.read_string()?;
            s.god = r.read_string()?;
        }
        if format >= 3 {
            s.wizard = r.read_bool()?;
            s.turns = r.read_unsigned()?;
        }
        if format > SUMMARY_FORMAT_VERSION {
            debug!(format, "Skipping fields from a newer summary format");
            let rest = r.remaining();
            r.advance(rest)?;
        }
        Ok(s)
    }
}

/// Read the summary from a stream positioned at the start of a `chr` chunk. Any version stamp
/// is accepted, so a browser can still list saves it can't load.
pub fn peek_char_summary<S: ByteStream + ?Sized>(stream: &mut S) -> Result<CharSummary> {
    let version = SaveVersion::read_from(stream)?;
    let ctx = DecodeContext::new(version.minor);
    peek_tag_with(stream, TagKind::Chr.name(), ctx, CharSummary::peek)
}

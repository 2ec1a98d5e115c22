//! Ghosts of dead characters, kept with the level they haunt.

use crate::bitvec::FixedBitVec;
use crate::container::{marshal_sequence, unmarshal_sequence};
use crate::context::DecodeContext;
use crate::error::Result;
use crate::marshal::{Marshaller, Unmarshaller};
use crate::migrate::{Layout, Migration, VersionedField};
use crate::state::common::{read_i32_varint, God};
use crate::tag::{TagBody, TagKind};
use crate::version::Minor;

pub const RESIST_COUNT: usize = 8;

pub const RESIST_FIRE: usize = 0;
pub const RESIST_COLD: usize = 1;
pub const RESIST_POISON: usize = 2;
pub const RESIST_ELEC: usize = 3;

#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Ghost {
    pub name: String,
    pub species: u8,
    pub xl: u8,
    pub hp: i32,
    pub god: God,
    pub resists: FixedBitVec<RESIST_COUNT>,
}

static RESISTS: VersionedField<FixedBitVec<RESIST_COUNT>> = VersionedField {
    name: "ghost resists",
    current: FixedBitVec::<RESIST_COUNT>::unmarshal,
    history: &[Migration {
        before: Minor::GhostResists,
        layout: Layout::Absent(FixedBitVec::<RESIST_COUNT>::new),
    }],
};

impl Ghost {
    fn marshal(&self, m: &mut Marshaller) {
        m.write_string(&self.name);
        m.write_u8(self.species);
        m.write_u8(self.xl);
        m.write_signed(self.hp as i64);
        self.god.marshal(m);
        self.resists.marshal(m);
    }

    fn unmarshal(r: &mut Unmarshaller<'_>) -> Result<Self> {
        Ok(Ghost {
            name: r.read_string()?,
            species: r.read_u8()?,
            xl: r.read_u8()?,
            hp: read_i32_varint(r, "ghost hp")?,
            god: God::unmarshal(r)?,
            resists: RESISTS.read(r)?,
        })
    }
}

#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct GhostState {
    pub ghosts: Vec<Ghost>,
}

impl TagBody for GhostState {
    const KIND: TagKind = TagKind::Ghost;

    fn marshal(&self, m: &mut Marshaller) {
        marshal_sequence(m, &self.ghosts, |m, g| g.marshal(m));
    }

    fn unmarshal(r: &mut Unmarshaller<'_>) -> Result<Self> {
        Ok(GhostState {
            ghosts: unmarshal_sequence(r, Ghost::unmarshal)?,
        })
    }

    /// Saves from before the ghost tag simply had no ghosts.
    fn missing(ctx: &DecodeContext) -> Option<Self> {
        if ctx.before(Minor::GhostTag) {
            Some(GhostState::default())
        } else {
            None
        }
    }
}

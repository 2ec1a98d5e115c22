//! The level tag: the map and everything on it.
//!
//! ```text
//! header (level id, turns spent here)
//! FEATURES | COLOURS | MONSTERS | ITEMS | CLOUDS
//! ```
//!
//! Both grids are run-length encoded and must have the same dimensions.

use crate::container::{marshal_sequence, unmarshal_sequence};
use crate::error::{Error, Result};
use crate::grid::{marshal_rle, unmarshal_rle, Grid};
use crate::marshal::{Coord, Marshaller, Unmarshaller};
use crate::migrate::{Layout, Migration, VersionedField};
use crate::state::common::{
    marshal_items, marshal_monsters, unmarshal_items, unmarshal_monsters, Item, LevelId, Monster,
};
use crate::tag::{TagBody, TagKind};
use crate::version::Minor;

pub const FEAT_ROCK_WALL: u8 = 1;
pub const FEAT_FLOOR: u8 = 2;
pub const FEAT_STAIRS_DOWN: u8 = 3;

#[derive(Clone, Debug, Default, PartialEq)]
pub struct Cloud {
    pub pos: Coord,
    pub kind: u8,
    pub decay: u16,
    /// 1.0 is a full cloud.
    pub density: f32,
}

fn read_density(r: &mut Unmarshaller<'_>) -> Result<f32> {
    r.read_f32()
}

fn full_density() -> f32 {
    1.0
}

static DENSITY: VersionedField<f32> = VersionedField {
    name: "cloud density",
    current: read_density,
    history: &[Migration {
        before: Minor::CloudDensity,
        layout: Layout::Absent(full_density),
    }],
};

impl Cloud {
    fn marshal(&self, m: &mut Marshaller) {
        m.write_coord(self.pos);
        m.write_u8(self.kind);
        m.write_u16(self.decay);
        m.write_f32(self.density);
    }

    fn unmarshal(r: &mut Unmarshaller<'_>) -> Result<Self> {
        Ok(Cloud {
            pos: r.read_coord()?,
            kind: r.read_u8()?,
            decay: r.read_u16()?,
            density: DENSITY.read(r)?,
        })
    }
}

#[derive(Clone, Debug, Default, PartialEq)]
pub struct LevelState {
    pub id: LevelId,
    pub turns_here: u64,
    pub features: Grid<u8>,
    pub colours: Grid<u8>,
    pub monsters: Vec<Monster>,
    pub items: Vec<Item>,
    pub clouds: Vec<Cloud>,
}

impl LevelState {
    /// A level of the given size, solid rock, with nothing on it.
    pub fn new(id: LevelId, width: u16, height: u16) -> Self {
        Self {
            id,
            turns_here: 0,
            features: Grid::new(width, height, FEAT_ROCK_WALL),
            colours: Grid::new(width, height, 0),
            monsters: Vec::new(),
            items: Vec::new(),
            clouds: Vec::new(),
        }
    }
}

impl TagBody for LevelState {
    const KIND: TagKind = TagKind::Level;

    fn marshal(&self, m: &mut Marshaller) {
        self.id.marshal(m);
        m.write_unsigned(self.turns_here);
        m.canary();
        marshal_rle(m, &self.features, |m, f| m.write_u8(*f));
        m.canary();
        marshal_rle(m, &self.colours, |m, c| m.write_u8(*c));
        m.canary();
        marshal_monsters(m, &self.monsters);
        m.canary();
        marshal_items(m, &self.items);
        m.canary();
        marshal_sequence(m, &self.clouds, |m, c| c.marshal(m));
    }

    fn unmarshal(r: &mut Unmarshaller<'_>) -> Result<Self> {
        let id = LevelId::unmarshal(r)?;
        let turns_here = r.read_unsigned()?;

        r.expect_canary("FEATURES")?;
        let features = unmarshal_rle(r, |r| r.read_u8())?;

        r.expect_canary("COLOURS")?;
        let colours = unmarshal_rle(r, |r| r.read_u8())?;
        if (colours.width(), colours.height()) != (features.width(), features.height()) {
            return Err(Error::Format(format!(
                "colour grid is {}x{} but the map is {}x{}",
                colours.width(),
                colours.height(),
                features.width(),
                features.height()
            )));
        }

        r.expect_canary("MONSTERS")?;
        let monsters = unmarshal_monsters(r)?;

        r.expect_canary("ITEMS")?;
        let items = unmarshal_items(r)?;

        r.expect_canary("CLOUDS")?;
        let clouds = unmarshal_sequence(r, Cloud::unmarshal)?;

        Ok(LevelState {
            id,
            turns_here,
            features,
            colours,
            monsters,
            items,
            clouds,
        })
    }
}

//! Records shared by more than one tag.

use crate::bitvec::FixedBitVec;
use crate::container::{marshal_sequence, unmarshal_sequence};
use crate::error::{Error, Result};
use crate::marshal::{Coord, Marshaller, Unmarshaller};
use crate::migrate::{Layout, Migration, VersionedField};
use crate::version::Minor;

#[repr(u8)]
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Branch {
    Dungeon = 0,
    Temple = 1,
    Orc = 2,
    Elf = 3,
    Lair = 4,
    Swamp = 5,
    Vaults = 6,
    Crypt = 7,
    Depths = 8,
    Zot = 9,
    Abyss = 10,
    Pandemonium = 11,
}

impl Branch {
    pub fn from_u8(v: u8) -> Option<Branch> {
        use self::Branch::*;
        Some(match v {
            0 => Dungeon,
            1 => Temple,
            2 => Orc,
            3 => Elf,
            4 => Lair,
            5 => Swamp,
            6 => Vaults,
            7 => Crypt,
            8 => Depths,
            9 => Zot,
            10 => Abyss,
            11 => Pandemonium,
            _ => return None,
        })
    }

    pub fn marshal(&self, m: &mut Marshaller) {
        m.write_u8(*self as u8);
    }

    pub fn unmarshal(r: &mut Unmarshaller<'_>) -> Result<Branch> {
        let v = r.read_u8()?;
        Branch::from_u8(v).ok_or_else(|| Error::Format(format!("unknown branch {}", v)))
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct LevelId {
    pub branch: Branch,
    pub depth: i32,
}

impl LevelId {
    pub fn new(branch: Branch, depth: i32) -> Self {
        Self { branch, depth }
    }

    pub fn marshal(&self, m: &mut Marshaller) {
        self.branch.marshal(m);
        m.write_signed(self.depth as i64);
    }

    pub fn unmarshal(r: &mut Unmarshaller<'_>) -> Result<LevelId> {
        let branch = Branch::unmarshal(r)?;
        let depth = read_i32_varint(r, "level depth")?;
        Ok(LevelId { branch, depth })
    }
}

impl Default for LevelId {
    fn default() -> Self {
        Self::new(Branch::Dungeon, 1)
    }
}

pub(crate) fn read_i32_varint(r: &mut Unmarshaller<'_>, what: &str) -> Result<i32> {
    let v = r.read_signed()?;
    i32::try_from(v).map_err(|_| Error::Format(format!("{} {} out of range", what, v)))
}

pub(crate) fn read_u32_varint(r: &mut Unmarshaller<'_>, what: &str) -> Result<u32> {
    let v = r.read_unsigned()?;
    u32::try_from(v).map_err(|_| Error::Format(format!("{} {} out of range", what, v)))
}

#[repr(u8)]
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum God {
    #[default]
    NoGod = 0,
    Zin = 1,
    ShiningOne = 2,
    Kikubaaqudgha = 3,
    Yredelemnul = 4,
    Xom = 5,
    Vehumet = 6,
    Okawaru = 7,
    Makhleb = 8,
    SifMuna = 9,
    Trog = 10,
    Nemelex = 11,
    Elyvilon = 12,
    Lugonu = 13,
}

/// Old god ids, indexed by the id saved before the renumbering. Zin and Xom traded places.
const GOD_RENUMBER: [u8; 16] = [0, 5, 2, 3, 4, 1, 6, 7, 8, 9, 10, 11, 12, 13, 14, 15];

/// Ids 14 and 15 belonged to two gods that were later retired. Followers of the first become
/// faithless; the second was folded into Trog.
fn retire_god(id: u8) -> u8 {
    match id {
        14 => God::NoGod as u8,
        15 => God::Trog as u8,
        other => other,
    }
}

impl God {
    pub fn from_u8(v: u8) -> Option<God> {
        use self::God::*;
        Some(match v {
            0 => NoGod,
            1 => Zin,
            2 => ShiningOne,
            3 => Kikubaaqudgha,
            4 => Yredelemnul,
            5 => Xom,
            6 => Vehumet,
            7 => Okawaru,
            8 => Makhleb,
            9 => SifMuna,
            10 => Trog,
            11 => Nemelex,
            12 => Elyvilon,
            13 => Lugonu,
            _ => return None,
        })
    }

    fn from_id(v: u8) -> Result<God> {
        God::from_u8(v).ok_or_else(|| Error::Format(format!("unknown god {}", v)))
    }

    pub fn marshal(&self, m: &mut Marshaller) {
        m.write_u8(*self as u8);
    }

    pub fn unmarshal(r: &mut Unmarshaller<'_>) -> Result<God> {
        GOD.read(r)
    }
}

fn read_god(r: &mut Unmarshaller<'_>) -> Result<God> {
    God::from_id(r.read_u8()?)
}

fn read_god_with_retired(r: &mut Unmarshaller<'_>) -> Result<God> {
    God::from_id(retire_god(r.read_u8()?))
}

fn read_god_original(r: &mut Unmarshaller<'_>) -> Result<God> {
    let raw = r.read_u8()?;
    let renumbered = *GOD_RENUMBER
        .get(raw as usize)
        .ok_or_else(|| Error::Format(format!("unknown god {} in old numbering", raw)))?;
    God::from_id(retire_god(renumbered))
}

static GOD: VersionedField<God> = VersionedField {
    name: "god",
    current: read_god,
    history: &[
        Migration {
            before: Minor::GodRenumber,
            layout: Layout::Legacy(read_god_original),
        },
        Migration {
            before: Minor::RetiredGods,
            layout: Layout::Legacy(read_god_with_retired),
        },
    ],
};

#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Item {
    pub base_type: u8,
    pub sub_type: u8,
    pub plus: i8,
    pub quantity: i32,
    pub pos: Coord,
    pub inscription: String,
}

impl Item {
    pub fn marshal(&self, m: &mut Marshaller) {
        m.write_u8(self.base_type);
        m.write_u8(self.sub_type);
        m.write_i8(self.plus);
        m.write_signed(self.quantity as i64);
        m.write_coord(self.pos);
        m.write_string(&self.inscription);
    }

    pub fn unmarshal(r: &mut Unmarshaller<'_>) -> Result<Item> {
        Ok(Item {
            base_type: r.read_u8()?,
            sub_type: r.read_u8()?,
            plus: r.read_i8()?,
            quantity: read_i32_varint(r, "item quantity")?,
            pos: r.read_coord()?,
            inscription: r.read_string()?,
        })
    }
}

pub fn marshal_items(m: &mut Marshaller, items: &[Item]) {
    marshal_sequence(m, items, |m, item| item.marshal(m));
}

pub fn unmarshal_items(r: &mut Unmarshaller<'_>) -> Result<Vec<Item>> {
    unmarshal_sequence(r, Item::unmarshal)
}

pub const MONSTER_FLAG_COUNT: usize = 10;

#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Monster {
    pub kind: u16,
    pub pos: Coord,
    pub hp: i32,
    pub hp_max: i32,
    /// Movement speed in tenths of a normal move.
    pub speed_tenths: u16,
    pub flags: FixedBitVec<MONSTER_FLAG_COUNT>,
}

fn read_speed_tenths(r: &mut Unmarshaller<'_>) -> Result<u16> {
    r.read_u16()
}

fn read_speed_whole(r: &mut Unmarshaller<'_>) -> Result<u16> {
    Ok(r.read_u8()? as u16 * 10)
}

static MONSTER_SPEED: VersionedField<u16> = VersionedField {
    name: "monster speed",
    current: read_speed_tenths,
    history: &[Migration {
        before: Minor::SpeedTenths,
        layout: Layout::Legacy(read_speed_whole),
    }],
};

impl Monster {
    pub fn marshal(&self, m: &mut Marshaller) {
        m.write_u16(self.kind);
        m.write_coord(self.pos);
        m.write_signed(self.hp as i64);
        m.write_signed(self.hp_max as i64);
        m.write_u16(self.speed_tenths);
        self.flags.marshal(m);
    }

    pub fn unmarshal(r: &mut Unmarshaller<'_>) -> Result<Monster> {
        Ok(Monster {
            kind: r.read_u16()?,
            pos: r.read_coord()?,
            hp: read_i32_varint(r, "monster hp")?,
            hp_max: read_i32_varint(r, "monster max hp")?,
            speed_tenths: MONSTER_SPEED.read(r)?,
            flags: FixedBitVec::unmarshal(r)?,
        })
    }
}

pub fn marshal_monsters(m: &mut Marshaller, monsters: &[Monster]) {
    marshal_sequence(m, monsters, |m, mon| mon.marshal(m));
}

pub fn unmarshal_monsters(r: &mut Unmarshaller<'_>) -> Result<Vec<Monster>> {
    unmarshal_sequence(r, Monster::unmarshal)
}

//! The player tag: the character, everything carried, and what the game remembers about levels
//! the player isn't on.
//!
//! Body layout, with a canary before every subsection after the first:
//!
//! ```text
//! header (name, species, job)
//! YOU | ITEMS | DUNGEON-STATE | LOST-MONSTERS | LOST-ITEMS | COMPANIONS
//! ```
//!
//! The COMPANIONS subsection and its canary are absent before [`Minor::Companions`].

use std::collections::{BTreeMap, BTreeSet};

use crate::bitvec::FixedBitVec;
use crate::container::{marshal_map, marshal_set, unmarshal_map, unmarshal_set};
use crate::error::Result;
use crate::marshal::{Coord, Marshaller, Unmarshaller};
use crate::migrate::{Layout, Migration, Obsolete, VersionedField};
use crate::state::common::{
    marshal_items, marshal_monsters, read_i32_varint, read_u32_varint, unmarshal_items,
    unmarshal_monsters, Branch, God, Item, LevelId, Monster,
};
use crate::tag::{TagBody, TagKind};
use crate::version::Minor;

pub const PLAYER_FLAG_COUNT: usize = 16;

pub const FLAG_BERSERK: usize = 0;
pub const FLAG_HASTED: usize = 1;
pub const FLAG_LEVITATING: usize = 2;
pub const FLAG_INVISIBLE: usize = 3;

#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct You {
    pub name: String,
    pub species: u8,
    pub job: u8,
    pub xl: u8,
    pub hp: i32,
    pub hp_max: i32,
    pub pos: Coord,
    pub god: God,
    pub piety: u8,
    pub flags: FixedBitVec<PLAYER_FLAG_COUNT>,
    pub gold: i32,
    pub turns: u64,
}

fn read_hp_byte(r: &mut Unmarshaller<'_>) -> Result<i32> {
    Ok(r.read_u8()? as i32)
}

fn read_hp_short(r: &mut Unmarshaller<'_>) -> Result<i32> {
    Ok(r.read_i16()? as i32)
}

fn read_hp(r: &mut Unmarshaller<'_>) -> Result<i32> {
    read_i32_varint(r, "hp")
}

static HP: VersionedField<i32> = VersionedField {
    name: "hp",
    current: read_hp,
    history: &[
        Migration {
            before: Minor::HpShort,
            layout: Layout::Legacy(read_hp_byte),
        },
        Migration {
            before: Minor::HpVarint,
            layout: Layout::Legacy(read_hp_short),
        },
    ],
};

static PLAYER_FLAGS: VersionedField<FixedBitVec<PLAYER_FLAG_COUNT>> = VersionedField {
    name: "player flags",
    current: FixedBitVec::<PLAYER_FLAG_COUNT>::unmarshal,
    history: &[Migration {
        before: Minor::PlayerFlags,
        layout: Layout::Absent(FixedBitVec::<PLAYER_FLAG_COUNT>::new),
    }],
};

static SCORE: Obsolete = Obsolete {
    name: "score",
    since: Minor::Original,
    until: Minor::DropScore,
    skip: |r| r.advance(4),
};

impl You {
    fn marshal_header(&self, m: &mut Marshaller) {
        m.write_string(&self.name);
        m.write_u8(self.species);
        m.write_u8(self.job);
    }

    fn marshal_body(&self, m: &mut Marshaller) {
        m.write_u8(self.xl);
        m.write_signed(self.hp as i64);
        m.write_signed(self.hp_max as i64);
        m.write_coord(self.pos);
        self.god.marshal(m);
        m.write_u8(self.piety);
        self.flags.marshal(m);
        m.write_signed(self.gold as i64);
        m.write_unsigned(self.turns);
    }

    fn unmarshal_body(&mut self, r: &mut Unmarshaller<'_>) -> Result<()> {
        self.xl = r.read_u8()?;
        self.hp = HP.read(r)?;
        self.hp_max = HP.read(r)?;
        self.pos = r.read_coord()?;
        self.god = God::unmarshal(r)?;
        self.piety = r.read_u8()?;
        SCORE.skip_if_present(r)?;
        self.flags = PLAYER_FLAGS.read(r)?;
        self.gold = read_i32_varint(r, "gold")?;
        self.turns = r.read_unsigned()?;
        Ok(())
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct DungeonState {
    pub level: LevelId,
    pub visited: BTreeSet<LevelId>,
    /// Deepest level reached in each branch.
    pub max_depth: BTreeMap<Branch, i32>,
}

impl Default for DungeonState {
    fn default() -> Self {
        let level = LevelId::default();
        let mut visited = BTreeSet::new();
        visited.insert(level);
        let mut max_depth = BTreeMap::new();
        max_depth.insert(level.branch, level.depth);
        Self {
            level,
            visited,
            max_depth,
        }
    }
}

impl DungeonState {
    fn marshal(&self, m: &mut Marshaller) {
        self.level.marshal(m);
        marshal_set(m, &self.visited, |m, id| id.marshal(m));
        marshal_map(
            m,
            &self.max_depth,
            |m, b| b.marshal(m),
            |m, d| m.write_signed(*d as i64),
        );
    }

    fn unmarshal(r: &mut Unmarshaller<'_>) -> Result<Self> {
        Ok(DungeonState {
            level: LevelId::unmarshal(r)?,
            visited: unmarshal_set(r, LevelId::unmarshal)?,
            max_depth: unmarshal_map(r, Branch::unmarshal, |r| read_i32_varint(r, "depth"))?,
        })
    }
}

/// A monster that followed the player off a level.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Companion {
    pub monster: Monster,
    pub level: LevelId,
    pub since_turn: u64,
}

impl Companion {
    fn marshal(&self, m: &mut Marshaller) {
        self.monster.marshal(m);
        self.level.marshal(m);
        m.write_unsigned(self.since_turn);
    }

    fn unmarshal(r: &mut Unmarshaller<'_>) -> Result<Self> {
        Ok(Companion {
            monster: Monster::unmarshal(r)?,
            level: LevelId::unmarshal(r)?,
            since_turn: r.read_unsigned()?,
        })
    }
}

#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct PlayerState {
    pub you: You,
    pub inventory: Vec<Item>,
    pub dungeon: DungeonState,
    /// Monsters left behind on levels the player isn't on, waiting to be placed on arrival.
    pub lost_monsters: BTreeMap<LevelId, Vec<Monster>>,
    pub lost_items: BTreeMap<LevelId, Vec<Item>>,
    /// Keyed by monster id.
    pub companions: BTreeMap<u32, Companion>,
}

impl TagBody for PlayerState {
    const KIND: TagKind = TagKind::You;

    fn marshal(&self, m: &mut Marshaller) {
        self.you.marshal_header(m);
        self.you.marshal_body(m);
        m.canary();
        marshal_items(m, &self.inventory);
        m.canary();
        self.dungeon.marshal(m);
        m.canary();
        marshal_lost_monsters(m, &self.lost_monsters);
        m.canary();
        marshal_lost_items(m, &self.lost_items);
        m.canary();
        marshal_companions(m, &self.companions);
    }

    fn unmarshal(r: &mut Unmarshaller<'_>) -> Result<Self> {
        let mut you = You {
            name: r.read_string()?,
            species: r.read_u8()?,
            job: r.read_u8()?,
            ..You::default()
        };
        you.unmarshal_body(r)?;

        r.expect_canary("ITEMS")?;
        let inventory = unmarshal_items(r)?;

        r.expect_canary("DUNGEON-STATE")?;
        let dungeon = DungeonState::unmarshal(r)?;

        r.expect_canary("LOST-MONSTERS")?;
        let lost_monsters = unmarshal_map(r, LevelId::unmarshal, unmarshal_monsters)?;

        r.expect_canary("LOST-ITEMS")?;
        let lost_items = unmarshal_map(r, LevelId::unmarshal, unmarshal_items)?;

        let companions = if r.since(Minor::Companions) {
            r.expect_canary("COMPANIONS")?;
            unmarshal_map(r, |r| read_u32_varint(r, "monster id"), Companion::unmarshal)?
        } else {
            BTreeMap::new()
        };

        Ok(PlayerState {
            you,
            inventory,
            dungeon,
            lost_monsters,
            lost_items,
            companions,
        })
    }
}

fn marshal_lost_monsters(m: &mut Marshaller, lost: &BTreeMap<LevelId, Vec<Monster>>) {
    marshal_map(m, lost, |m, id| id.marshal(m), |m, mons| marshal_monsters(m, mons));
}

fn marshal_lost_items(m: &mut Marshaller, lost: &BTreeMap<LevelId, Vec<Item>>) {
    marshal_map(m, lost, |m, id| id.marshal(m), |m, items| marshal_items(m, items));
}

fn marshal_companions(m: &mut Marshaller, companions: &BTreeMap<u32, Companion>) {
    marshal_map(
        m,
        companions,
        |m, mid| m.write_unsigned(*mid as u64),
        |m, c| c.marshal(m),
    );
}

#[cfg(test)]
pub(crate) mod test {
    use super::*;
    use crate::context::DecodeContext;
    use crate::error::Error;
    use crate::stream::MemoryStream;
    use crate::tag::CANARY;
    use crate::tag::{read_tag, write_tag};

    pub(crate) fn sample_player() -> PlayerState {
        let mut flags = FixedBitVec::new();
        flags.set(FLAG_HASTED, true);
        flags.set(FLAG_INVISIBLE, true);
        let you = You {
            name: "Foo".into(),
            species: 4,
            job: 9,
            xl: 12,
            hp: 420,
            hp_max: 512,
            pos: Coord::new(33, 18),
            god: God::Trog,
            piety: 120,
            flags,
            gold: 1234,
            turns: 56_789,
        };
        let sword = Item {
            base_type: 0,
            sub_type: 12,
            plus: 3,
            quantity: 1,
            pos: Coord::new(-1, -1),
            inscription: "@w1".into(),
        };
        let potions = Item {
            base_type: 8,
            sub_type: 2,
            plus: 0,
            quantity: 5,
            pos: Coord::new(-1, -1),
            inscription: String::new(),
        };
        let orc = Monster {
            kind: 55,
            pos: Coord::new(10, 10),
            hp: 30,
            hp_max: 30,
            speed_tenths: 10,
            flags: FixedBitVec::new(),
        };

        let lair = LevelId::new(Branch::Lair, 3);
        let d5 = LevelId::new(Branch::Dungeon, 5);
        let mut dungeon = DungeonState {
            level: lair,
            ..DungeonState::default()
        };
        dungeon.visited.insert(d5);
        dungeon.visited.insert(lair);
        dungeon.max_depth.insert(Branch::Dungeon, 8);
        dungeon.max_depth.insert(Branch::Lair, 3);

        let mut lost_monsters = BTreeMap::new();
        lost_monsters.insert(d5, vec![orc.clone()]);
        let mut lost_items = BTreeMap::new();
        lost_items.insert(d5, vec![potions.clone()]);
        let mut companions = BTreeMap::new();
        companions.insert(
            77,
            Companion {
                monster: orc,
                level: d5,
                since_turn: 50_000,
            },
        );

        PlayerState {
            you,
            inventory: vec![sword, potions],
            dungeon,
            lost_monsters,
            lost_items,
            companions,
        }
    }

    fn encode(player: &PlayerState) -> Vec<u8> {
        let mut stream = MemoryStream::new();
        write_tag(&mut stream, player).unwrap();
        stream.into_inner()
    }

    fn decode(bytes: Vec<u8>, minor: u8) -> Result<PlayerState> {
        let mut stream = MemoryStream::from_bytes(bytes);
        read_tag(&mut stream, DecodeContext::new(minor))
    }

    #[test]
    fn roundtrip() {
        let player = sample_player();
        assert_eq!(decode(encode(&player), Minor::CURRENT as u8).unwrap(), player);
        let empty = PlayerState::default();
        assert_eq!(decode(encode(&empty), Minor::CURRENT as u8).unwrap(), empty);
    }

    const SECTIONS: [&str; 6] = [
        "YOU",
        "ITEMS",
        "DUNGEON-STATE",
        "LOST-MONSTERS",
        "LOST-ITEMS",
        "COMPANIONS",
    ];

    fn sections(player: &PlayerState) -> Vec<Vec<u8>> {
        let mut out = Vec::new();
        let mut section = |f: &dyn Fn(&mut Marshaller)| {
            let mut m = Marshaller::new();
            f(&mut m);
            out.push(m.into_inner());
        };
        section(&|m: &mut Marshaller| {
            player.you.marshal_header(m);
            player.you.marshal_body(m);
        });
        section(&|m: &mut Marshaller| marshal_items(m, &player.inventory));
        section(&|m: &mut Marshaller| player.dungeon.marshal(m));
        section(&|m: &mut Marshaller| marshal_lost_monsters(m, &player.lost_monsters));
        section(&|m: &mut Marshaller| marshal_lost_items(m, &player.lost_items));
        section(&|m: &mut Marshaller| marshal_companions(m, &player.companions));
        out
    }

    fn frame(body: &[u8]) -> Vec<u8> {
        let mut bytes = (body.len() as u32).to_be_bytes().to_vec();
        bytes.extend_from_slice(body);
        bytes
    }

    #[test]
    fn sections_are_canary_delimited() {
        let player = sample_player();
        let joined = sections(&player).join(&CANARY);
        assert_eq!(frame(&joined), encode(&player));
    }

    #[test]
    fn canary_sensitivity() {
        let player = sample_player();
        let parts = sections(&player);
        for i in 0..parts.len() - 1 {
            // One byte too many at the end of a subsection
            let mut longer = parts.clone();
            longer[i].push(0);
            let res = decode(frame(&longer.join(&CANARY)), Minor::CURRENT as u8);
            match res {
                Err(Error::CanaryMismatch { section, actual, .. }) => {
                    assert_eq!(section, SECTIONS[i + 1]);
                    assert_eq!(actual, 0);
                }
                other => panic!("extra byte in {} gave {:?}", SECTIONS[i], other),
            }

            // One byte too few
            let mut shorter = parts.clone();
            shorter[i].pop();
            let res = decode(frame(&shorter.join(&CANARY)), Minor::CURRENT as u8);
            assert!(res.is_err(), "missing byte in {} decoded", SECTIONS[i]);
        }
    }

    #[test]
    fn desync_reports_canary() {
        let player = sample_player();
        let mut m = Marshaller::new();
        player.you.marshal_header(&mut m);
        player.you.marshal_body(&mut m);
        // One stray byte at the end of YOU
        m.write_u8(0);
        m.canary();
        marshal_items(&mut m, &player.inventory);
        let mut r = Unmarshaller::new(m.as_bytes(), DecodeContext::current());
        assert!(matches!(
            PlayerState::unmarshal(&mut r),
            Err(Error::CanaryMismatch {
                section: "ITEMS",
                actual: 0,
                ..
            })
        ));
    }

    #[test]
    fn truncation_never_succeeds() {
        let full = encode(&sample_player());
        let body = &full[4..];
        for cut in 0..body.len() {
            let mut bytes = (cut as u32).to_be_bytes().to_vec();
            bytes.extend_from_slice(&body[..cut]);
            match decode(bytes, Minor::CURRENT as u8) {
                Err(Error::ShortRead { .. }) | Err(Error::Format(_)) => (),
                other => panic!("cut at {} gave {:?}", cut, other),
            }
        }
    }

    mod old_layouts {
        use super::*;

        fn header(m: &mut Marshaller) {
            m.write_string("Foo");
            m.write_u8(4);
            m.write_u8(9);
        }

        // Everything after YOU, in the layout shared by all old minors
        fn rest(m: &mut Marshaller) {
            m.canary();
            m.write_u32(0); // no items
            m.canary();
            m.write_u8(Branch::Dungeon as u8);
            m.write_signed(1);
            m.write_u32(0); // visited
            m.write_u32(0); // max depth
            m.canary();
            m.write_u32(0); // lost monsters
            m.canary();
            m.write_u32(0); // lost items
        }

        fn expected() -> PlayerState {
            let mut player = PlayerState::default();
            player.dungeon.visited.clear();
            player.dungeon.max_depth.clear();
            player.you = You {
                name: "Foo".into(),
                species: 4,
                job: 9,
                xl: 3,
                hp: 42,
                hp_max: 50,
                pos: Coord::new(-3, 7),
                god: God::Zin,
                piety: 10,
                gold: 7,
                turns: 900,
                ..You::default()
            };
            player
        }

        #[test]
        fn original() {
            let mut m = Marshaller::new();
            header(&mut m);
            m.write_u8(3);
            m.write_u8(42); // hp, one byte
            m.write_u8(50);
            m.write_i8(-3); // narrow coord
            m.write_i8(7);
            m.write_u8(5); // Zin, before the renumbering
            m.write_u8(10);
            m.write_u32(99_999); // score
            m.write_signed(7);
            m.write_unsigned(900);
            rest(&mut m);
            let mut r = Unmarshaller::new(m.as_bytes(), DecodeContext::new(Minor::Original as u8));
            assert_eq!(PlayerState::unmarshal(&mut r).unwrap(), expected());
            r.expect_end("YOU").unwrap();
        }

        #[test]
        fn short_hp_with_flags() {
            let mut m = Marshaller::new();
            header(&mut m);
            m.write_u8(3);
            m.write_i16(42);
            m.write_i16(50);
            m.write_i16(-3);
            m.write_i16(7);
            m.write_u8(1); // Zin, renumbered
            m.write_u8(10);
            m.write_u32(99_999); // score, still present
            m.write_u8(0x80 | 1 << FLAG_HASTED);
            m.write_signed(7);
            m.write_unsigned(900);
            rest(&mut m);
            let mut r =
                Unmarshaller::new(m.as_bytes(), DecodeContext::new(Minor::GodRenumber as u8));
            let mut want = expected();
            want.you.flags.set(FLAG_HASTED, true);
            assert_eq!(PlayerState::unmarshal(&mut r).unwrap(), want);
            r.expect_end("YOU").unwrap();
        }

        #[test]
        fn before_companions() {
            let player = PlayerState {
                companions: BTreeMap::new(),
                ..sample_player()
            };
            let mut m = Marshaller::new();
            player.marshal(&mut m);
            let mut bytes = m.into_inner();
            // Drop the trailing canary and the empty companion map
            bytes.truncate(bytes.len() - 5);
            let mut r = Unmarshaller::new(&bytes, DecodeContext::new(Minor::Companions as u8 - 1));
            // Monster speeds and coordinates were already current at this minor
            assert_eq!(PlayerState::unmarshal(&mut r).unwrap(), player);
            r.expect_end("YOU").unwrap();
        }

        #[test]
        fn same_bytes_read_as_current_fail() {
            let mut m = Marshaller::new();
            header(&mut m);
            m.write_u8(3);
            m.write_u8(42);
            m.write_u8(50);
            m.write_i8(-3);
            m.write_i8(7);
            m.write_u8(5);
            m.write_u8(10);
            // Read as current, the score's first byte lands on the god id: 14 is retired
            m.write_u32(0x0E00_0001);
            m.write_signed(7);
            m.write_unsigned(900);
            rest(&mut m);
            let mut r = Unmarshaller::new(m.as_bytes(), DecodeContext::current());
            assert!(matches!(PlayerState::unmarshal(&mut r), Err(Error::Format(_))));

            // Under the original minor the same layout reads fine
            let mut r = Unmarshaller::new(m.as_bytes(), DecodeContext::new(Minor::Original as u8));
            assert!(PlayerState::unmarshal(&mut r).is_ok());
        }
    }
}

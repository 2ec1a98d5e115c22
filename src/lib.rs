//! tagsave is a versioned binary save format for games whose state outlives any one build of the
//! program. A save written by an old build must still load in a new one, told nothing but the
//! version stamp at the front of each chunk.
//!
//! The pieces, from the bottom up:
//!
//! - Byte streams over memory, plain files, or named chunks of a [`Package`].
//! - A primitive codec: big-endian fixed-width integers, LEB128 varints (zig-zag for signed),
//!     floats by bit pattern, bit vectors, length-prefixed strings, and coordinates.
//! - Container codecs for sequences, sets, and maps, plus run-length encoding for map grids.
//! - Tags: each one a length-prefixed body, split into subsections by canary bytes so a reader
//!     that falls out of step with the writer fails loudly at the next boundary.
//! - A version layer. Every chunk starts with a (major, minor) stamp; the minor travels down
//!     the decode in a [`DecodeContext`], and fields whose layout changed are read through a
//!     [`VersionedField`] table that picks the right historical decoder.
//!
//! Writers always emit the current layout. Readers accept every older minor of the current major.
//!
//! ```no_run
//! use tagsave::{SaveFile, SaveKind, PlayerState};
//!
//! # fn main() -> tagsave::Result<()> {
//! let mut save = SaveFile::create("Foo.tsav", SaveKind::Player)?;
//! save.write_tag(&PlayerState::default())?;
//! save.commit()?;
//!
//! let save = SaveFile::open("Foo.tsav", SaveKind::Player)?;
//! let player: PlayerState = save.read_tag()?;
//! # Ok(())
//! # }
//! ```

mod bitvec;
mod container;
mod context;
mod error;
mod grid;
mod marshal;
mod migrate;
mod package;
mod save;
mod stream;
mod summary;
mod tag;
mod varint;
mod version;

pub mod state;

pub use self::bitvec::FixedBitVec;
pub use self::container::{
    marshal_map, marshal_sequence, marshal_set, read_count, unmarshal_map, unmarshal_sequence,
    unmarshal_set,
};
pub use self::context::{DecodeContext, Limits};
pub use self::error::{Error, Result};
pub use self::grid::{marshal_rle, unmarshal_rle, Grid, MAX_RUN};
pub use self::marshal::{Coord, Lenient, Marshaller, Unmarshaller};
pub use self::migrate::{DecodeFn, Layout, Migration, Obsolete, VersionedField};
pub use self::package::{ChunkReader, ChunkWriter, Package, MAX_CHUNK_NAME};
pub use self::save::{read_versioned_tag, write_versioned_tag, SaveFile, SaveKind};
pub use self::state::{GhostState, LevelState, PlayerState};
pub use self::stream::{ByteStream, FileStream, MemoryStream};
pub use self::summary::{peek_char_summary, CharSummary, SUMMARY_FORMAT_VERSION};
pub use self::tag::{
    peek_tag_with, read_tag, read_tag_with, write_tag, write_tag_with, TagBody, TagKind, CANARY,
};
pub use self::version::{Minor, SaveVersion};

/// The major version this build reads and writes. Saves from any other major are refused.
pub const MAJOR_VERSION: u8 = 34;

/// The largest tag body accepted, 16 MiB. Checked before the body is read into memory.
pub const MAX_TAG_SIZE: usize = 1usize << 24;

/// The longest string that can be saved. The length prefix is 2 bytes, and the top bit is
/// reserved.
pub const MAX_STRING_LEN: usize = 32767;

/// The most elements a sequence, set, or map may claim.
pub const MAX_COUNT: usize = 1usize << 20;

/// The most cells a run-length encoded grid may claim.
pub const MAX_GRID_CELLS: usize = 1usize << 20;

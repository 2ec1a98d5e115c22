//! The game state carried by each tag.

mod common;
mod ghost;
mod level;
mod player;

pub use self::common::*;
pub use self::ghost::*;
pub use self::level::*;
pub use self::player::*;

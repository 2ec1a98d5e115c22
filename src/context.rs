use educe::Educe;
use serde::{Deserialize, Serialize};

use crate::version::Minor;
use crate::{MAX_COUNT, MAX_GRID_CELLS, MAX_STRING_LEN, MAX_TAG_SIZE};

/// Upper bounds checked while decoding, before anything is allocated.
///
/// The defaults are the crate-wide constants. A caller can tighten them, for example a save
/// browser that only ever wants to look at small summary tags.
#[derive(Educe, Clone, Copy, Debug, Serialize, Deserialize)]
#[educe(PartialEq, Default)]
#[serde(deny_unknown_fields, default)]
pub struct Limits {
    /// Largest tag body, in bytes.
    #[educe(Default = MAX_TAG_SIZE)]
    pub max_tag_size: usize,
    /// Longest string, in bytes. Can't be raised past [`MAX_STRING_LEN`].
    #[educe(Default = MAX_STRING_LEN)]
    pub max_string_len: usize,
    /// Largest element count for a sequence, set, or map.
    #[educe(Default = MAX_COUNT)]
    pub max_count: usize,
    /// Largest number of cells in a run-length encoded grid.
    #[educe(Default = MAX_GRID_CELLS)]
    pub max_grid_cells: usize,
}

impl Limits {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn max_tag_size(mut self, max: usize) -> Self {
        self.max_tag_size = max;
        self
    }

    pub fn max_string_len(mut self, max: usize) -> Self {
        self.max_string_len = max.min(MAX_STRING_LEN);
        self
    }

    pub fn max_count(mut self, max: usize) -> Self {
        self.max_count = max;
        self
    }

    pub fn max_grid_cells(mut self, max: usize) -> Self {
        self.max_grid_cells = max;
        self
    }
}

/// Everything a decode call needs to know about the stream it is reading: the minor version the
/// stream was written with, and the limits to enforce. Read once per load and passed down by
/// value; nothing here is global.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct DecodeContext {
    pub minor: u8,
    pub limits: Limits,
}

impl DecodeContext {
    pub fn new(minor: u8) -> Self {
        Self {
            minor,
            limits: Limits::default(),
        }
    }

    /// Context for data this build wrote itself.
    pub fn current() -> Self {
        Self::new(Minor::CURRENT as u8)
    }

    pub fn with_limits(mut self, limits: Limits) -> Self {
        self.limits = limits;
        self
    }

    /// True if the stream was written at or after `threshold`.
    pub fn since(&self, threshold: Minor) -> bool {
        self.minor >= threshold as u8
    }

    /// True if the stream predates `threshold`.
    pub fn before(&self, threshold: Minor) -> bool {
        self.minor < threshold as u8
    }
}

impl Default for DecodeContext {
    fn default() -> Self {
        Self::current()
    }
}

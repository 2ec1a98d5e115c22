//! Two-dimensional grids and their run-length encoding.
//!
//! Cells are visited in row-major order and stored as runs: a length byte from 1 to 255, then
//! the cell value once. Level maps are mostly long stretches of rock and floor, so this stays
//! small without a general-purpose compressor.

use crate::error::{Error, Result};
use crate::marshal::{Coord, Marshaller, Unmarshaller};

pub const MAX_RUN: usize = 255;

#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Grid<T> {
    width: u16,
    height: u16,
    cells: Vec<T>,
}

impl<T: Clone> Grid<T> {
    /// A grid with every cell set to `fill`.
    pub fn new(width: u16, height: u16, fill: T) -> Self {
        Self {
            width,
            height,
            cells: vec![fill; width as usize * height as usize],
        }
    }
}

impl<T> Grid<T> {
    pub fn width(&self) -> u16 {
        self.width
    }

    pub fn height(&self) -> u16 {
        self.height
    }

    fn index(&self, c: Coord) -> Option<usize> {
        if c.x < 0 || c.y < 0 || c.x as u16 >= self.width || c.y as u16 >= self.height {
            None
        } else {
            Some(c.y as usize * self.width as usize + c.x as usize)
        }
    }

    pub fn get(&self, c: Coord) -> Option<&T> {
        self.index(c).map(|i| &self.cells[i])
    }

    pub fn get_mut(&mut self, c: Coord) -> Option<&mut T> {
        match self.index(c) {
            Some(i) => Some(&mut self.cells[i]),
            None => None,
        }
    }

    /// Cells in row-major order.
    pub fn cells(&self) -> &[T] {
        &self.cells
    }
}

/// Write the grid dimensions, then the cells as runs.
pub fn marshal_rle<T, F>(m: &mut Marshaller, grid: &Grid<T>, mut value: F)
where
    T: PartialEq,
    F: FnMut(&mut Marshaller, &T),
{
    m.write_u16(grid.width);
    m.write_u16(grid.height);
    let mut cells = grid.cells.iter().peekable();
    while let Some(first) = cells.next() {
        let mut run = 1;
        while run < MAX_RUN && cells.peek() == Some(&first) {
            cells.next();
            run += 1;
        }
        m.write_u8(run as u8);
        value(m, first);
    }
}

pub fn unmarshal_rle<'a, T, F>(r: &mut Unmarshaller<'a>, mut value: F) -> Result<Grid<T>>
where
    T: Clone,
    F: FnMut(&mut Unmarshaller<'a>) -> Result<T>,
{
    let width = r.read_u16()?;
    let height = r.read_u16()?;
    let total = width as usize * height as usize;
    let max = r.context().limits.max_grid_cells;
    if total > max {
        return Err(Error::LengthTooLong { max, actual: total });
    }
    // Every run takes at least two bytes, so a grid can't claim more cells than that allows
    if total > (r.remaining() / 2).saturating_mul(MAX_RUN) {
        return Err(Error::Format(format!(
            "{}x{} grid can't fit in {} bytes",
            width,
            height,
            r.remaining()
        )));
    }

    let mut cells = Vec::with_capacity(total);
    while cells.len() < total {
        let run = r.read_u8()? as usize;
        if run == 0 {
            return Err(Error::Format(String::from("zero-length run in grid")));
        }
        if cells.len() + run > total {
            return Err(Error::Format(format!(
                "run of {} overshoots the grid by {} cells",
                run,
                cells.len() + run - total
            )));
        }
        let v = value(r)?;
        cells.resize(cells.len() + run, v);
    }
    Ok(Grid {
        width,
        height,
        cells,
    })
}

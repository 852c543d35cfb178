/// Cell grid: positions, cells, and bounds-checked access.
///
/// Coordinates are signed, `y` grows northward. Every query on a
/// coordinate outside the grid returns `GridError::OutOfBounds`; there is
/// no silent clamping here, callers check `contains` first when a
/// position might fall off the map.

use std::ops::{Add, Mul, Sub};

use thiserror::Error;

use super::tile::{ItemKind, Terrain};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum GridError {
    #[error("cell ({x}, {y}) is outside the grid")]
    OutOfBounds { x: i32, y: i32 },
}

#[derive(Clone, Copy, PartialEq, Eq, Hash, Debug, Default, PartialOrd, Ord)]
pub struct Pos {
    pub x: i32,
    pub y: i32,
}

impl Pos {
    pub const NORTH: Pos = Pos { x: 0, y: 1 };
    pub const EAST: Pos = Pos { x: 1, y: 0 };
    pub const SOUTH: Pos = Pos { x: 0, y: -1 };
    pub const WEST: Pos = Pos { x: -1, y: 0 };

    /// Fixed direction priority used wherever a tie needs breaking.
    pub const CARDINALS: [Pos; 4] = [Pos::NORTH, Pos::EAST, Pos::SOUTH, Pos::WEST];

    pub const fn new(x: i32, y: i32) -> Self {
        Pos { x, y }
    }

    pub fn length_squared(self) -> i32 {
        self.x * self.x + self.y * self.y
    }

    pub fn distance_squared(self, other: Pos) -> i32 {
        (other - self).length_squared()
    }

    pub fn manhattan(self, other: Pos) -> i32 {
        (other.x - self.x).abs() + (other.y - self.y).abs()
    }

    pub fn chebyshev(self, other: Pos) -> i32 {
        (other.x - self.x).abs().max((other.y - self.y).abs())
    }

    pub fn dot(self, other: Pos) -> i32 {
        self.x * other.x + self.y * other.y
    }

    /// Unit cardinal direction pointing roughly from `self` toward `other`.
    /// The larger axis wins; equal axes favour horizontal.
    pub fn facing_toward(self, other: Pos) -> Option<Pos> {
        let d = other - self;
        if d == Pos::default() {
            return None;
        }
        if d.x.abs() >= d.y.abs() {
            Some(Pos::new(d.x.signum(), 0))
        } else {
            Some(Pos::new(0, d.y.signum()))
        }
    }
}

impl Add for Pos {
    type Output = Pos;
    fn add(self, rhs: Pos) -> Pos {
        Pos::new(self.x + rhs.x, self.y + rhs.y)
    }
}

impl Sub for Pos {
    type Output = Pos;
    fn sub(self, rhs: Pos) -> Pos {
        Pos::new(self.x - rhs.x, self.y - rhs.y)
    }
}

impl Mul<i32> for Pos {
    type Output = Pos;
    fn mul(self, rhs: i32) -> Pos {
        Pos::new(self.x * rhs, self.y * rhs)
    }
}

/// One grid tile.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct Cell {
    pub terrain: Terrain,
    /// Recomputed every turn from light sources.
    pub lit: bool,
    /// Ever observed by the player.
    pub seen: bool,
    /// In the player's view this turn.
    pub in_view: bool,
    /// Creaky floor that has revealed itself.
    pub identified: bool,
}

impl Cell {
    pub fn new(terrain: Terrain) -> Self {
        Cell { terrain, ..Cell::default() }
    }
}

/// An item lying on the map.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Item {
    pub pos: Pos,
    pub kind: ItemKind,
}

/// Fixed-size 2D array of cells, row-major with `y = 0` at the south edge.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct CellGrid {
    width: usize,
    height: usize,
    cells: Vec<Cell>,
}

impl CellGrid {
    pub fn new(width: usize, height: usize, terrain: Terrain) -> Self {
        CellGrid { width, height, cells: vec![Cell::new(terrain); width * height] }
    }

    pub fn width(&self) -> usize {
        self.width
    }

    pub fn height(&self) -> usize {
        self.height
    }

    #[inline]
    pub fn contains(&self, pos: Pos) -> bool {
        pos.x >= 0 && pos.y >= 0 && (pos.x as usize) < self.width && (pos.y as usize) < self.height
    }

    #[inline]
    fn index(&self, pos: Pos) -> Result<usize, GridError> {
        if self.contains(pos) {
            Ok(pos.y as usize * self.width + pos.x as usize)
        } else {
            Err(GridError::OutOfBounds { x: pos.x, y: pos.y })
        }
    }

    pub fn cell(&self, pos: Pos) -> Result<&Cell, GridError> {
        let i = self.index(pos)?;
        Ok(&self.cells[i])
    }

    pub fn cell_mut(&mut self, pos: Pos) -> Result<&mut Cell, GridError> {
        let i = self.index(pos)?;
        Ok(&mut self.cells[i])
    }

    pub fn terrain(&self, pos: Pos) -> Result<Terrain, GridError> {
        Ok(self.cell(pos)?.terrain)
    }

    pub fn set_terrain(&mut self, pos: Pos, terrain: Terrain) -> Result<(), GridError> {
        self.cell_mut(pos)?.terrain = terrain;
        Ok(())
    }

    pub fn blocks_sight(&self, pos: Pos) -> Result<bool, GridError> {
        Ok(self.terrain(pos)?.blocks_sight())
    }

    /// Every position in the grid, row by row from the south edge.
    pub fn positions(&self) -> impl Iterator<Item = Pos> + '_ {
        let w = self.width as i32;
        (0..self.height as i32).flat_map(move |y| (0..w).map(move |x| Pos::new(x, y)))
    }

    pub fn cells_mut(&mut self) -> impl Iterator<Item = &mut Cell> {
        self.cells.iter_mut()
    }
}

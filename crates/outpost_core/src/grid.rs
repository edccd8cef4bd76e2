//! Grid index: world/cell conversion and cell occupancy.
//!
//! The occupancy table is sparse, so an unbounded grid costs nothing for
//! cells nobody has built on. Bounds are optional and only consulted when the
//! placement rules ask for them.

use std::collections::HashMap;
use std::fmt;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::math::{Fixed, Vec2Fixed};
use crate::registry::InstanceId;

// ============================================================================
// Cells, Rotation, Footprint
// ============================================================================

/// Integer grid cell coordinate.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default, Serialize, Deserialize,
)]
pub struct CellCoord {
    /// Column.
    pub x: i32,
    /// Row.
    pub y: i32,
}

impl CellCoord {
    /// Create a new cell coordinate.
    #[must_use]
    pub const fn new(x: i32, y: i32) -> Self {
        Self { x, y }
    }

    /// Cell displaced by `(dx, dy)`.
    #[must_use]
    pub const fn offset(self, dx: i32, dy: i32) -> Self {
        Self {
            x: self.x.saturating_add(dx),
            y: self.y.saturating_add(dy),
        }
    }
}

impl fmt::Display for CellCoord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "({}, {})", self.x, self.y)
    }
}

/// Quarter-turn rotation of a building.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum Rotation {
    /// Unrotated.
    #[default]
    Deg0,
    /// One quarter turn clockwise.
    Deg90,
    /// Half turn.
    Deg180,
    /// Three quarter turns clockwise.
    Deg270,
}

impl Rotation {
    /// Next rotation, one quarter turn clockwise.
    #[must_use]
    pub const fn next(self) -> Self {
        match self {
            Self::Deg0 => Self::Deg90,
            Self::Deg90 => Self::Deg180,
            Self::Deg180 => Self::Deg270,
            Self::Deg270 => Self::Deg0,
        }
    }

    /// Rotation angle in degrees.
    #[must_use]
    pub const fn degrees(self) -> u32 {
        match self {
            Self::Deg0 => 0,
            Self::Deg90 => 90,
            Self::Deg180 => 180,
            Self::Deg270 => 270,
        }
    }

    /// Whether this rotation exchanges width and height.
    #[must_use]
    pub const fn swaps_axes(self) -> bool {
        matches!(self, Self::Deg90 | Self::Deg270)
    }
}

/// Size of a building in grid cells.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Footprint {
    /// Width in cells.
    pub width: u32,
    /// Height in cells.
    pub height: u32,
}

impl Footprint {
    /// Create a new footprint.
    #[must_use]
    pub const fn new(width: u32, height: u32) -> Self {
        Self { width, height }
    }

    /// Create a square footprint.
    #[must_use]
    pub const fn square(size: u32) -> Self {
        Self {
            width: size,
            height: size,
        }
    }

    /// Total number of cells covered.
    #[must_use]
    pub const fn cell_count(&self) -> u32 {
        self.width * self.height
    }

    /// Effective footprint under a rotation.
    #[must_use]
    pub const fn rotated(self, rotation: Rotation) -> Self {
        if rotation.swaps_axes() {
            Self {
                width: self.height,
                height: self.width,
            }
        } else {
            self
        }
    }

    /// Cells covered when anchored (bottom-left) at `anchor`, row by row.
    pub fn cells(self, anchor: CellCoord) -> impl Iterator<Item = CellCoord> {
        let width = i32::try_from(self.width).unwrap_or(i32::MAX);
        let height = i32::try_from(self.height).unwrap_or(i32::MAX);
        (0..height).flat_map(move |dy| (0..width).map(move |dx| anchor.offset(dx, dy)))
    }
}

impl Default for Footprint {
    fn default() -> Self {
        Self::new(1, 1)
    }
}

/// Rectangular grid extent, cells `[0, width) × [0, height)`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct GridBounds {
    /// Width in cells.
    pub width: u32,
    /// Height in cells.
    pub height: u32,
}

impl GridBounds {
    /// Create new bounds.
    #[must_use]
    pub const fn new(width: u32, height: u32) -> Self {
        Self { width, height }
    }

    /// Whether a cell lies inside the bounds.
    #[must_use]
    pub fn contains(&self, cell: CellCoord) -> bool {
        cell.x >= 0
            && cell.y >= 0
            && i64::from(cell.x) < i64::from(self.width)
            && i64::from(cell.y) < i64::from(self.height)
    }
}

// ============================================================================
// Errors
// ============================================================================

/// Occupancy invariant violations reported by the checked grid operations.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum GridError {
    /// Tried to occupy a cell that already has an occupant.
    #[error("cell {cell} is already occupied by {occupant}")]
    AlreadyOccupied {
        /// The contested cell.
        cell: CellCoord,
        /// Its current occupant.
        occupant: InstanceId,
    },
    /// Tried to occupy a cell outside the grid bounds.
    #[error("cell {cell} is outside the grid")]
    OutOfBounds {
        /// The offending cell.
        cell: CellCoord,
    },
    /// Tried to free a cell that is already empty.
    #[error("cell {cell} is not occupied")]
    NotOccupied {
        /// The empty cell.
        cell: CellCoord,
    },
    /// Tried to free a cell that belongs to a different instance.
    #[error("cell {cell} belongs to {found}, not {expected}")]
    OccupantMismatch {
        /// The contested cell.
        cell: CellCoord,
        /// Instance the caller meant to free.
        expected: InstanceId,
        /// Instance actually occupying the cell.
        found: InstanceId,
    },
}

// ============================================================================
// Grid Index
// ============================================================================

/// Maps world positions to cells and tracks which instance owns each cell.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GridIndex {
    /// Size of each cell in world units.
    #[serde(with = "crate::math::fixed_serde")]
    cell_size: Fixed,
    /// World position of the corner of cell (0, 0).
    origin: Vec2Fixed,
    /// Optional extent of the grid.
    bounds: Option<GridBounds>,
    /// Occupied cells only.
    occupancy: HashMap<CellCoord, InstanceId>,
}

impl GridIndex {
    /// Create an empty grid.
    ///
    /// # Panics
    ///
    /// Panics if `cell_size` is not positive.
    #[must_use]
    pub fn new(cell_size: Fixed, origin: Vec2Fixed, bounds: Option<GridBounds>) -> Self {
        assert!(cell_size > Fixed::ZERO, "GridIndex cell_size must be positive");
        Self {
            cell_size,
            origin,
            bounds,
            occupancy: HashMap::new(),
        }
    }

    /// Create a bounded grid anchored at the world origin.
    #[must_use]
    pub fn bounded(width: u32, height: u32, cell_size: Fixed) -> Self {
        Self::new(cell_size, Vec2Fixed::ZERO, Some(GridBounds::new(width, height)))
    }

    /// Cell size in world units.
    #[must_use]
    pub const fn cell_size(&self) -> Fixed {
        self.cell_size
    }

    /// World position of the corner of cell (0, 0).
    #[must_use]
    pub const fn origin(&self) -> Vec2Fixed {
        self.origin
    }

    /// Grid extent, if bounded.
    #[must_use]
    pub const fn bounds(&self) -> Option<GridBounds> {
        self.bounds
    }

    /// Convert a world position to the cell containing it.
    ///
    /// Positions beyond the addressable range clamp to the outermost cell.
    #[must_use]
    pub fn world_to_cell(&self, pos: Vec2Fixed) -> CellCoord {
        let local = pos.saturating_sub(self.origin);
        CellCoord::new(self.axis_to_cell(local.x), self.axis_to_cell(local.y))
    }

    fn axis_to_cell(&self, local: Fixed) -> i32 {
        local
            .saturating_div(self.cell_size)
            .floor()
            .saturating_to_num::<i32>()
    }

    fn cells_to_world(&self, cells: i64) -> Fixed {
        Fixed::saturating_from_num(cells).saturating_mul(self.cell_size)
    }

    /// World position of the corner of a cell.
    #[must_use]
    pub fn cell_corner(&self, cell: CellCoord) -> Vec2Fixed {
        self.origin.saturating_add(Vec2Fixed::new(
            self.cells_to_world(i64::from(cell.x)),
            self.cells_to_world(i64::from(cell.y)),
        ))
    }

    /// World position of the centre of a cell.
    #[must_use]
    pub fn cell_to_world(&self, cell: CellCoord) -> Vec2Fixed {
        let half = self.cell_size / Fixed::from_num(2);
        self.cell_corner(cell).saturating_add(Vec2Fixed::new(half, half))
    }

    /// Snap a world position to the corner of its cell.
    #[must_use]
    pub fn snap(&self, pos: Vec2Fixed) -> Vec2Fixed {
        self.cell_corner(self.world_to_cell(pos))
    }

    /// World position of the centre of a footprint anchored at `anchor`.
    #[must_use]
    pub fn footprint_centre(&self, anchor: CellCoord, footprint: Footprint) -> Vec2Fixed {
        let half_extent = |cells: u32| self.cells_to_world(i64::from(cells)) / Fixed::from_num(2);
        self.cell_corner(anchor).saturating_add(Vec2Fixed::new(
            half_extent(footprint.width),
            half_extent(footprint.height),
        ))
    }

    /// Whether a cell lies inside the grid. Always true for unbounded grids.
    #[must_use]
    pub fn contains(&self, cell: CellCoord) -> bool {
        self.bounds.map_or(true, |b| b.contains(cell))
    }

    /// Whether every cell of a footprint lies inside the grid.
    #[must_use]
    pub fn contains_footprint(&self, anchor: CellCoord, footprint: Footprint) -> bool {
        footprint.cells(anchor).all(|cell| self.contains(cell))
    }

    /// Instance occupying a cell, if any.
    #[must_use]
    pub fn occupant(&self, cell: CellCoord) -> Option<InstanceId> {
        self.occupancy.get(&cell).copied()
    }

    /// Whether a cell is occupied.
    #[must_use]
    pub fn is_occupied(&self, cell: CellCoord) -> bool {
        self.occupancy.contains_key(&cell)
    }

    /// Whether any cell of the footprint is occupied.
    #[must_use]
    pub fn are_occupied(&self, anchor: CellCoord, footprint: Footprint) -> bool {
        footprint.cells(anchor).any(|cell| self.is_occupied(cell))
    }

    /// Occupied cells within a footprint.
    #[must_use]
    pub fn blocking_cells(&self, anchor: CellCoord, footprint: Footprint) -> Vec<CellCoord> {
        footprint
            .cells(anchor)
            .filter(|cell| self.is_occupied(*cell))
            .collect()
    }

    /// Mark every cell of the footprint as owned by `id`, failing without
    /// modification if any cell is taken or out of bounds.
    pub fn try_occupy(
        &mut self,
        anchor: CellCoord,
        footprint: Footprint,
        id: InstanceId,
    ) -> Result<(), GridError> {
        for cell in footprint.cells(anchor) {
            if !self.contains(cell) {
                return Err(GridError::OutOfBounds { cell });
            }
            if let Some(occupant) = self.occupant(cell) {
                return Err(GridError::AlreadyOccupied { cell, occupant });
            }
        }
        for cell in footprint.cells(anchor) {
            self.occupancy.insert(cell, id);
        }
        Ok(())
    }

    /// Mark every cell of the footprint as owned by `id`.
    ///
    /// Callers validate first. Occupying a taken cell is a bug: it panics in
    /// debug builds and overwrites the old occupant in release builds.
    pub fn occupy(&mut self, anchor: CellCoord, footprint: Footprint, id: InstanceId) {
        if let Err(err) = self.try_occupy(anchor, footprint, id) {
            tracing::error!(%anchor, %id, error = %err, "occupy violated grid invariant");
            if cfg!(debug_assertions) {
                panic!("GridIndex::occupy: {err}");
            }
            for cell in footprint.cells(anchor) {
                self.occupancy.insert(cell, id);
            }
        }
    }

    /// Clear every cell of the footprint, provided each is owned by
    /// `expected`. Nothing is modified on failure.
    ///
    /// Returns the number of cells freed.
    pub fn try_free(
        &mut self,
        anchor: CellCoord,
        footprint: Footprint,
        expected: InstanceId,
    ) -> Result<u32, GridError> {
        for cell in footprint.cells(anchor) {
            match self.occupant(cell) {
                None => return Err(GridError::NotOccupied { cell }),
                Some(found) if found != expected => {
                    return Err(GridError::OccupantMismatch {
                        cell,
                        expected,
                        found,
                    })
                }
                Some(_) => {}
            }
        }
        let mut freed = 0;
        for cell in footprint.cells(anchor) {
            self.occupancy.remove(&cell);
            freed += 1;
        }
        Ok(freed)
    }

    /// Clear the footprint of `expected`.
    ///
    /// Must be called exactly once per successful occupy. Freeing an empty
    /// cell or another instance's cell panics in debug builds; release builds
    /// log the violation and free only the cells `expected` still owns.
    pub fn free(&mut self, anchor: CellCoord, footprint: Footprint, expected: InstanceId) {
        if let Err(err) = self.try_free(anchor, footprint, expected) {
            tracing::error!(%anchor, id = %expected, error = %err, "free violated grid invariant");
            if cfg!(debug_assertions) {
                panic!("GridIndex::free: {err}");
            }
            for cell in footprint.cells(anchor) {
                if self.occupant(cell) == Some(expected) {
                    self.occupancy.remove(&cell);
                }
            }
        }
    }

    /// All cells owned by an instance, sorted.
    #[must_use]
    pub fn cells_of(&self, id: InstanceId) -> Vec<CellCoord> {
        let mut cells: Vec<CellCoord> = self
            .occupancy
            .iter()
            .filter(|(_, owner)| **owner == id)
            .map(|(cell, _)| *cell)
            .collect();
        cells.sort_unstable();
        cells
    }

    /// Number of occupied cells.
    #[must_use]
    pub fn occupied_count(&self) -> usize {
        self.occupancy.len()
    }

    /// Iterate over all `(cell, occupant)` pairs in arbitrary order.
    pub fn occupied(&self) -> impl Iterator<Item = (CellCoord, InstanceId)> + '_ {
        self.occupancy.iter().map(|(cell, id)| (*cell, *id))
    }
}

// ============================================================================
// Tests
// ============================================================================

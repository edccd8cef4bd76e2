//! Terrain queries used by the terrain placement rule.
//!
//! The engine never owns terrain data. Hosts implement [`TerrainQuery`] over
//! whatever heightfield or tile map they have; [`FlatTerrain`] and
//! [`TerrainMap`] cover the simple cases.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use crate::grid::CellCoord;
use crate::math::{fixed_serde, Fixed, Vec2Fixed};

/// Surface tag that marks terrain as buildable by default.
pub const BUILDABLE_SURFACE: &str = "buildable";

/// What the terrain looks like at one point.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TerrainSample {
    /// Surface tag, e.g. `"buildable"` or `"water"`.
    pub surface: String,
    /// Slope angle in degrees.
    #[serde(with = "fixed_serde")]
    pub slope: Fixed,
}

impl TerrainSample {
    /// Create a sample.
    #[must_use]
    pub fn new(surface: impl Into<String>, slope: Fixed) -> Self {
        Self {
            surface: surface.into(),
            slope,
        }
    }

    /// Level buildable ground.
    #[must_use]
    pub fn buildable() -> Self {
        Self::new(BUILDABLE_SURFACE, Fixed::ZERO)
    }
}

/// Source of terrain samples at world positions.
///
/// `None` means there is no ground at that point; the terrain rule treats it
/// as unbuildable.
pub trait TerrainQuery {
    /// Sample the terrain at a world position.
    fn sample(&self, world: Vec2Fixed) -> Option<TerrainSample>;
}

/// Terrain that is level and buildable everywhere.
#[derive(Debug, Clone, Copy, Default)]
pub struct FlatTerrain;

impl TerrainQuery for FlatTerrain {
    fn sample(&self, _world: Vec2Fixed) -> Option<TerrainSample> {
        Some(TerrainSample::buildable())
    }
}

/// Per-cell terrain samples with an optional fallback.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TerrainMap {
    #[serde(with = "fixed_serde")]
    cell_size: Fixed,
    origin: Vec2Fixed,
    #[serde(default)]
    default: Option<TerrainSample>,
    #[serde(default)]
    cells: HashMap<CellCoord, TerrainSample>,
}

impl TerrainMap {
    /// Create a map whose cells line up with a grid of the same cell size
    /// and origin.
    ///
    /// # Panics
    ///
    /// Panics if `cell_size` is not positive.
    #[must_use]
    pub fn new(cell_size: Fixed, origin: Vec2Fixed, default: Option<TerrainSample>) -> Self {
        assert!(cell_size > Fixed::ZERO, "TerrainMap cell_size must be positive");
        Self {
            cell_size,
            origin,
            default,
            cells: HashMap::new(),
        }
    }

    /// Override the sample for a single cell.
    pub fn set(&mut self, cell: CellCoord, sample: TerrainSample) {
        self.cells.insert(cell, sample);
    }

    /// Builder form of [`set`](Self::set).
    #[must_use]
    pub fn with(mut self, cell: CellCoord, sample: TerrainSample) -> Self {
        self.set(cell, sample);
        self
    }

    /// Sample stored for a cell, or the fallback.
    #[must_use]
    pub fn sample_cell(&self, cell: CellCoord) -> Option<&TerrainSample> {
        self.cells.get(&cell).or(self.default.as_ref())
    }

    fn cell_at(&self, world: Vec2Fixed) -> CellCoord {
        let local = world - self.origin;
        CellCoord::new(
            (local.x / self.cell_size).floor().saturating_to_num::<i32>(),
            (local.y / self.cell_size).floor().saturating_to_num::<i32>(),
        )
    }
}

impl TerrainQuery for TerrainMap {
    fn sample(&self, world: Vec2Fixed) -> Option<TerrainSample> {
        self.sample_cell(self.cell_at(world)).cloned()
    }
}

impl<T: TerrainQuery + ?Sized> TerrainQuery for Box<T> {
    fn sample(&self, world: Vec2Fixed) -> Option<TerrainSample> {
        (**self).sample(world)
    }
}

/// Thresholds the terrain rule checks each footprint cell against.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct TerrainRules {
    /// Steepest slope, in degrees, that may be built on.
    #[serde(with = "fixed_serde")]
    pub max_slope: Fixed,
    /// Surface tag required on every cell.
    pub buildable_surface: String,
}

impl Default for TerrainRules {
    fn default() -> Self {
        Self {
            max_slope: Fixed::from_num(15),
            buildable_surface: BUILDABLE_SURFACE.to_string(),
        }
    }
}

impl TerrainRules {
    /// Why a sample is unbuildable, or `None` if it is fine.
    #[must_use]
    pub fn reject_reason(&self, sample: Option<&TerrainSample>) -> Option<String> {
        match sample {
            None => Some("no terrain".to_string()),
            Some(s) if s.surface != self.buildable_surface => {
                Some(format!("surface '{}' is not buildable", s.surface))
            }
            Some(s) if s.slope > self.max_slope => Some(format!(
                "slope {} exceeds maximum {}",
                s.slope, self.max_slope
            )),
            Some(_) => None,
        }
    }
}

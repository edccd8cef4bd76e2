//! Engine configuration.
//!
//! Every section has defaults, so a config file only names what it changes:
//!
//! ```ron
//! (
//!     grid: (cell_size: 2.0, bounds: Some((width: 64, height: 64))),
//!     placement: (terrain: Some((max_slope: 20.0))),
//!     refunds: (completed_percent: 75),
//! )
//! ```

use serde::{Deserialize, Serialize};

use crate::error::{EngineError, Result};
use crate::grid::{GridBounds, GridIndex};
use crate::ledger::ResourceCost;
use crate::math::{fixed_serde, Fixed, Vec2Fixed};
use crate::registry::LifecycleState;
use crate::terrain::TerrainRules;

/// Grid geometry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct GridConfig {
    /// Cell size in world units.
    #[serde(with = "fixed_serde")]
    pub cell_size: Fixed,
    /// World position of the corner of cell (0, 0).
    pub origin: Vec2Fixed,
    /// Grid extent; `None` for an unbounded grid.
    pub bounds: Option<GridBounds>,
}

impl Default for GridConfig {
    fn default() -> Self {
        Self {
            cell_size: Fixed::ONE,
            origin: Vec2Fixed::ZERO,
            bounds: Some(GridBounds::new(100, 100)),
        }
    }
}

impl GridConfig {
    /// Build an empty grid with this geometry.
    #[must_use]
    pub fn build(&self) -> GridIndex {
        GridIndex::new(self.cell_size, self.origin, self.bounds)
    }
}

/// Which built-in placement rules run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PlacementRules {
    /// Reject footprints that leave the grid bounds.
    pub enforce_bounds: bool,
    /// Terrain thresholds; `None` disables the terrain rule.
    pub terrain: Option<TerrainRules>,
}

impl Default for PlacementRules {
    fn default() -> Self {
        Self {
            enforce_bounds: true,
            terrain: None,
        }
    }
}

/// Object pool sizing.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PoolConfig {
    /// Most objects kept per definition pool.
    pub max_pool_size: usize,
}

impl Default for PoolConfig {
    fn default() -> Self {
        Self { max_pool_size: 16 }
    }
}

/// Share of the cost returned on demolition, by lifecycle state.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RefundPolicy {
    /// Percent refunded for a completed building.
    pub completed_percent: u32,
    /// Percent refunded for a building still under construction.
    pub under_construction_percent: u32,
    /// Percent refunded for a damaged building.
    pub damaged_percent: u32,
}

impl Default for RefundPolicy {
    fn default() -> Self {
        Self {
            completed_percent: 50,
            under_construction_percent: 0,
            damaged_percent: 25,
        }
    }
}

impl RefundPolicy {
    /// Percent refunded for a building in `state`.
    #[must_use]
    pub const fn percent_for(&self, state: LifecycleState) -> u32 {
        match state {
            LifecycleState::Completed => self.completed_percent,
            LifecycleState::UnderConstruction => self.under_construction_percent,
            LifecycleState::Damaged => self.damaged_percent,
            LifecycleState::Destroyed => 0,
        }
    }

    /// Resources refunded when demolishing a building of `cost` in `state`.
    #[must_use]
    pub fn refund_for(&self, state: LifecycleState, cost: &ResourceCost) -> ResourceCost {
        cost.scaled_percent(self.percent_for(state))
    }
}

/// Complete engine configuration.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Grid geometry.
    pub grid: GridConfig,
    /// Placement rule switches.
    pub placement: PlacementRules,
    /// Pool sizing.
    pub pools: PoolConfig,
    /// Demolition refunds.
    pub refunds: RefundPolicy,
}

impl EngineConfig {
    /// Parse and check a config from RON text.
    pub fn from_ron_str(text: &str) -> Result<Self> {
        let config: Self = ron::from_str(text).map_err(EngineError::ConfigParse)?;
        config.validate()?;
        Ok(config)
    }

    /// Reject values the engine cannot run with.
    pub fn validate(&self) -> Result<()> {
        if self.grid.cell_size <= Fixed::ZERO {
            return Err(EngineError::InvalidConfig(format!(
                "grid.cell_size must be positive, got {}",
                self.grid.cell_size
            )));
        }
        if let Some(bounds) = self.grid.bounds {
            if bounds.width == 0 || bounds.height == 0 {
                return Err(EngineError::InvalidConfig(
                    "grid.bounds must be at least 1x1".to_string(),
                ));
            }
        }
        let refunds = &self.refunds;
        for (name, percent) in [
            ("completed_percent", refunds.completed_percent),
            ("under_construction_percent", refunds.under_construction_percent),
            ("damaged_percent", refunds.damaged_percent),
        ] {
            if percent > 100 {
                return Err(EngineError::InvalidConfig(format!(
                    "refunds.{name} must be at most 100, got {percent}"
                )));
            }
        }
        Ok(())
    }
}

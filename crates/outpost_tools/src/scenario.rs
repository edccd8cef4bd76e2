//! Scenario loading.
//!
//! A scenario is a catalog, an engine config, a starting stockpile and a
//! script of player actions, all in one RON file:
//!
//! ```ron
//! (
//!     name: "Two huts",
//!     config: (grid: (bounds: Some((width: 16, height: 16)))),
//!     definitions: [(id: "hut", name: "Hut", build_time: 3.0, cost: { "wood": 10 })],
//!     resources: { "wood": 25 },
//!     steps: [
//!         Place(definition: "hut", x: 2, y: 2),
//!         Place(definition: "hut", x: 4, y: 2),
//!         Wait(3.0),
//!     ],
//! )
//! ```

use std::collections::BTreeMap;
use std::path::Path;

use serde::{Deserialize, Serialize};

use outpost_core::catalog::{BuildingCatalog, BuildingDefinition, DefinitionId};
use outpost_core::config::EngineConfig;
use outpost_core::error::EngineError;
use outpost_core::math::{fixed_serde, Fixed};

use crate::error::{Result, ToolError};

/// One scripted player action.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum Step {
    /// Start placing, rotate `rotations` quarter turns, and confirm at a cell.
    Place {
        /// Definition to place.
        definition: DefinitionId,
        /// Anchor column.
        x: i32,
        /// Anchor row.
        y: i32,
        /// Quarter turns before confirming.
        #[serde(default)]
        rotations: u8,
    },
    /// Advance the session clock by this many seconds, one frame per second.
    Wait(#[serde(with = "fixed_serde")] Fixed),
    /// Demolish whatever occupies a cell.
    Demolish {
        /// Column.
        x: i32,
        /// Row.
        y: i32,
    },
    /// Mark whatever occupies a cell as damaged.
    Damage {
        /// Column.
        x: i32,
        /// Row.
        y: i32,
    },
    /// Repair whatever occupies a cell.
    Repair {
        /// Column.
        x: i32,
        /// Row.
        y: i32,
    },
}

/// A complete scripted session.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Scenario {
    /// Scenario name.
    pub name: String,
    /// Human-readable description.
    #[serde(default)]
    pub description: String,
    /// Engine configuration.
    #[serde(default)]
    pub config: EngineConfig,
    /// Building definitions available in the session.
    pub definitions: Vec<BuildingDefinition>,
    /// Starting stockpile.
    #[serde(default)]
    pub resources: BTreeMap<String, u64>,
    /// Player level.
    #[serde(default)]
    pub level: u32,
    /// Completed quests.
    #[serde(default)]
    pub quests: Vec<String>,
    /// Actions to replay, in order.
    pub steps: Vec<Step>,
}

impl Scenario {
    /// Load a scenario from a RON file.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        if !path.exists() {
            return Err(ToolError::FileNotFound(path.display().to_string()));
        }
        let contents = std::fs::read_to_string(path)?;
        Self::from_ron_str(&contents)
    }

    /// Load from a RON string.
    pub fn from_ron_str(ron: &str) -> Result<Self> {
        let scenario: Self = ron::from_str(ron)?;
        scenario.config.validate()?;
        Ok(scenario)
    }

    /// Build the scenario's catalog, rejecting duplicates and dangling
    /// prerequisites.
    pub fn catalog(&self) -> Result<BuildingCatalog> {
        let mut catalog = BuildingCatalog::new();
        for definition in &self.definitions {
            catalog.insert(definition.clone())?;
        }
        let problems = catalog.problems();
        if !problems.is_empty() {
            return Err(EngineError::InvalidCatalog(problems).into());
        }
        Ok(catalog)
    }
}

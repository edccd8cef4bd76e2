//! # Outpost Core
//!
//! Grid-based building placement and construction engine.
//!
//! This crate contains **only** engine logic:
//! - No rendering
//! - No IO
//! - No resource storage of its own (balances live behind [`ledger::ResourceLedger`])
//! - No floating-point math (uses fixed-point)
//!
//! Presentation listens on the [`events::EventBus`]; the host drives the
//! [`controller::BuildingSystemController`] once per frame.
//!
//! ## Crate Structure
//!
//! - [`grid`] - World/cell conversion and occupancy
//! - [`catalog`] - Building definitions loaded from RON
//! - [`validation`] - Placement rule chain
//! - [`factory`] - Pooled ghost and building objects
//! - [`registry`] - Placed instances and their lifecycle
//! - [`construction`] - Timed construction
//! - [`events`] - Typed publish/subscribe
//! - [`controller`] - The state machine tying it together
//!
//! ## Example
//!
//! ```
//! use std::rc::Rc;
//! use outpost_core::prelude::*;
//!
//! let catalog = BuildingCatalog::new().with(
//!     BuildingDefinition::new("hut", "Hut", Footprint::square(2), Fixed::from_num(5))
//!         .with_cost(ResourceCost::new().with("wood", 20)),
//! );
//! let ledger = Stockpile::new().with("wood", 50);
//! let mut controller =
//!     BuildingSystemController::new(&EngineConfig::default(), catalog, ledger, Rc::new(EventBus::new()))
//!         .unwrap();
//!
//! controller.start_placement(&"hut".into()).unwrap();
//! controller.update(Fixed::ZERO, Some(Vec2Fixed::from_ints(3, 3)), InputCommands::confirm());
//! assert_eq!(controller.registry().len(), 1);
//!
//! controller.update(Fixed::from_num(5), None, InputCommands::NONE);
//! assert_eq!(controller.registry().count_in_state(LifecycleState::Completed), 1);
//! ```

#![forbid(unsafe_code)]
#![warn(missing_docs)]
#![warn(clippy::all, clippy::pedantic)]

pub mod behavior;
pub mod catalog;
pub mod config;
pub mod construction;
pub mod controller;
pub mod error;
pub mod events;
pub mod factory;
pub mod grid;
pub mod ledger;
pub mod math;
pub mod registry;
pub mod requirements;
pub mod terrain;
pub mod validation;

/// Re-export commonly used types
pub mod prelude {
    pub use crate::behavior::BuildingBehavior;
    pub use crate::catalog::{
        BuildingCatalog, BuildingCategory, BuildingDefinition, DefinitionId, Prerequisites,
    };
    pub use crate::config::{EngineConfig, GridConfig, PlacementRules, PoolConfig, RefundPolicy};
    pub use crate::construction::{ConstructionScheduler, TickOutcome};
    pub use crate::controller::{
        BuildingSystemController, ControllerStateKind, DemolitionOutcome, InputCommands,
    };
    pub use crate::error::{EngineError, Result};
    pub use crate::events::*;
    pub use crate::factory::{BuildingFactory, BuildingHandle, GhostHandle, PresentationState};
    pub use crate::grid::{CellCoord, Footprint, GridBounds, GridError, GridIndex, Rotation};
    pub use crate::ledger::{ResourceCost, ResourceId, ResourceLedger, Stockpile};
    pub use crate::math::{Fixed, Vec2Fixed};
    pub use crate::registry::{BuildingInstance, BuildingRegistry, InstanceId, LifecycleState};
    pub use crate::requirements::{PlayerProgress, RequirementSource, Unrestricted};
    pub use crate::terrain::{FlatTerrain, TerrainMap, TerrainQuery, TerrainRules, TerrainSample};
    pub use crate::validation::{
        PlacementError, PlacementErrorKind, PlacementRule, PlacementValidationResult,
        PlacementValidator,
    };
}

//! Test fixtures and helpers.
//!
//! A small, fixed catalog and pre-configured controllers for consistent
//! testing.

use std::rc::Rc;

use fixed::types::I32F32;
use outpost_core::prelude::*;

/// Create a fixed-point number from an integer.
#[must_use]
pub fn fixed(n: i32) -> I32F32 {
    I32F32::from_num(n)
}

/// Create a fixed-point number from a float (for tests only).
///
/// Note: engine code never uses floats.
/// This is only for convenient test setup.
#[must_use]
pub fn fixed_f(n: f64) -> I32F32 {
    I32F32::from_num(n)
}

/// World position of the centre of cell `(x, y)` on a unit grid at the
/// origin, as a pointer position.
#[must_use]
pub fn pointer_at(x: i32, y: i32) -> Option<Vec2Fixed> {
    Some(Vec2Fixed::new(
        fixed(x) + fixed_f(0.5),
        fixed(y) + fixed_f(0.5),
    ))
}

/// Shorthand for a cell coordinate.
#[must_use]
pub const fn cell(x: i32, y: i32) -> CellCoord {
    CellCoord::new(x, y)
}

/// Definitions used across the test suites.
///
/// | id        | footprint | cost               | time | notes                    |
/// |-----------|-----------|--------------------|------|--------------------------|
/// | `farm`    | 2x2       | 100 wood           | 10s  |                          |
/// | `hut`     | 1x1       | 10 wood            | 3s   |                          |
/// | `wall`    | 3x1       | 5 stone            | 2s   |                          |
/// | `sawmill` | 2x3       | 100 wood, 20 stone | 10s  | produces 5 planks / 4s   |
/// | `depot`   | 2x2       | 50 wood            | 5s   | storage 200              |
/// | `keep`    | 1x1       | nothing            | 0s   | indestructible           |
/// | `obelisk` | 1x1       | nothing            | 1s   | no rotation              |
/// | `tower`   | 1x1       | 20 stone           | 8s   | level 3, needs a `farm`  |
#[must_use]
pub fn sample_catalog() -> BuildingCatalog {
    BuildingCatalog::new()
        .with(
            BuildingDefinition::new("farm", "Farm", Footprint::square(2), fixed(10))
                .with_cost(ResourceCost::new().with("wood", 100)),
        )
        .with(
            BuildingDefinition::new("hut", "Hut", Footprint::square(1), fixed(3))
                .with_cost(ResourceCost::new().with("wood", 10))
                .with_category(BuildingCategory::Housing),
        )
        .with(
            BuildingDefinition::new("wall", "Wall", Footprint::new(3, 1), fixed(2))
                .with_cost(ResourceCost::new().with("stone", 5))
                .with_category(BuildingCategory::Defense),
        )
        .with(
            BuildingDefinition::new("sawmill", "Sawmill", Footprint::new(2, 3), fixed(10))
                .with_cost(ResourceCost::new().with("wood", 100).with("stone", 20))
                .with_production("planks", 5, fixed(4)),
        )
        .with(
            BuildingDefinition::new("depot", "Depot", Footprint::square(2), fixed(5))
                .with_cost(ResourceCost::new().with("wood", 50))
                .with_storage(200),
        )
        .with(
            BuildingDefinition::new("keep", "Keep", Footprint::square(1), fixed(0))
                .indestructible(),
        )
        .with(
            BuildingDefinition::new("obelisk", "Obelisk", Footprint::square(1), fixed(1))
                .without_rotation(),
        )
        .with(
            BuildingDefinition::new("tower", "Tower", Footprint::square(1), fixed(8))
                .with_cost(ResourceCost::new().with("stone", 20))
                .with_category(BuildingCategory::Defense)
                .with_prerequisites(Prerequisites {
                    level: 3,
                    quests: Vec::new(),
                    buildings: vec!["farm".into()],
                }),
        )
}

/// Default config with a bounded `width` x `height` unit grid.
#[must_use]
pub fn bounded_config(width: u32, height: u32) -> EngineConfig {
    let mut config = EngineConfig::default();
    config.grid.bounds = Some(GridBounds::new(width, height));
    config
}

/// A generous stockpile: 1000 wood and 1000 stone.
#[must_use]
pub fn rich_stockpile() -> Stockpile {
    Stockpile::new().with("wood", 1_000).with("stone", 1_000)
}

/// Controller over a 10x10 grid, the sample catalog and `ledger`.
///
/// # Panics
///
/// Panics if the fixture config is rejected, which would be a bug in the
/// fixture.
#[must_use]
pub fn controller_with<L: ResourceLedger>(ledger: L) -> BuildingSystemController<L> {
    BuildingSystemController::new(
        &bounded_config(10, 10),
        sample_catalog(),
        ledger,
        Rc::new(EventBus::new()),
    )
    .expect("fixture config is valid")
}

/// Controller over a 10x10 grid with a [`rich_stockpile`].
#[must_use]
pub fn rich_controller() -> BuildingSystemController<Stockpile> {
    controller_with(rich_stockpile())
}

/// Start placing `definition`, confirm at cell `(x, y)` and return the new
/// instance, or `None` if the placement was rejected (the controller is
/// left in Placing in that case).
///
/// # Panics
///
/// Panics if `definition` is not in the controller's catalog.
pub fn place_at<L: ResourceLedger>(
    controller: &mut BuildingSystemController<L>,
    definition: &str,
    x: i32,
    y: i32,
) -> Option<InstanceId> {
    controller
        .start_placement(&definition.into())
        .expect("definition exists in catalog");
    let before = controller.registry().ids().last();
    controller.update(Fixed::ZERO, pointer_at(x, y), InputCommands::confirm());
    let after = controller.registry().ids().last();
    (after != before).then_some(after).flatten()
}

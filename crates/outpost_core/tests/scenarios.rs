//! End-to-end placement scenarios.
//!
//! Each test drives a full controller through one acceptance scenario using
//! the shared fixture catalog (see `outpost_test_utils::fixtures`).

use outpost_core::prelude::*;
use outpost_test_utils::fixtures::{cell, controller_with, fixed, place_at, pointer_at, rich_controller};
use outpost_test_utils::invariants::assert_invariants;
use outpost_test_utils::recording::{EventLog, LedgerCall, RecordedEvent, RecordingLedger};

// =============================================================================
// Validation
// =============================================================================

mod validation {
    use super::*;

    /// A 2x2 farm well inside a 10x10 grid with everything available
    #[test]
    fn test_scenario_a_valid_placement() {
        let controller = rich_controller();
        let result = controller
            .validate(&"farm".into(), cell(2, 2), Rotation::Deg0)
            .unwrap();
        assert_eq!(result, PlacementValidationResult::Valid);
    }

    /// The same farm anchored at (9, 9) spills over the edge
    #[test]
    fn test_scenario_b_out_of_bounds() {
        let controller = rich_controller();
        let result = controller
            .validate(&"farm".into(), cell(9, 9), Rotation::Deg0)
            .unwrap();
        assert_eq!(result.kind(), Some(PlacementErrorKind::OutOfBounds));
    }

    /// A second 1x1 at an occupied cell
    #[test]
    fn test_scenario_c_occupied() {
        let mut controller = rich_controller();
        place_at(&mut controller, "hut", 4, 4).unwrap();

        let result = controller
            .validate(&"hut".into(), cell(4, 4), Rotation::Deg0)
            .unwrap();
        assert_eq!(result.kind(), Some(PlacementErrorKind::Occupied));
        assert!(result.error().unwrap().message.contains("(4, 4)"));
    }

    #[test]
    fn test_rotation_changes_fit() {
        let controller = rich_controller();
        // 3x1 wall at column 8 only fits upright
        let flat = controller.validate(&"wall".into(), cell(8, 0), Rotation::Deg0).unwrap();
        let upright = controller.validate(&"wall".into(), cell(8, 0), Rotation::Deg90).unwrap();
        assert_eq!(flat.kind(), Some(PlacementErrorKind::OutOfBounds));
        assert!(upright.is_valid());
    }

    #[test]
    fn test_requirements() {
        let mut controller = rich_controller().with_requirements(PlayerProgress::at_level(3));

        let early = controller.validate(&"tower".into(), cell(0, 0), Rotation::Deg0).unwrap();
        assert_eq!(early.kind(), Some(PlacementErrorKind::RequirementsNotMet));

        // A farm under construction does not count
        place_at(&mut controller, "farm", 5, 5).unwrap();
        let building = controller.validate(&"tower".into(), cell(0, 0), Rotation::Deg0).unwrap();
        assert_eq!(building.kind(), Some(PlacementErrorKind::RequirementsNotMet));

        controller.update(fixed(10), None, InputCommands::NONE);
        let ready = controller.validate(&"tower".into(), cell(0, 0), Rotation::Deg0).unwrap();
        assert!(ready.is_valid());
    }

    #[test]
    fn test_low_level_blocks_tower() {
        let mut controller = rich_controller().with_requirements(PlayerProgress::at_level(2));
        place_at(&mut controller, "farm", 5, 5).unwrap();
        controller.update(fixed(10), None, InputCommands::NONE);

        let result = controller.validate(&"tower".into(), cell(0, 0), Rotation::Deg0).unwrap();
        assert_eq!(result.kind(), Some(PlacementErrorKind::RequirementsNotMet));
    }

    #[test]
    fn test_terrain() {
        let mut config = outpost_test_utils::fixtures::bounded_config(10, 10);
        config.placement.terrain = Some(TerrainRules::default());
        let terrain = TerrainMap::new(Fixed::ONE, Vec2Fixed::ZERO, Some(TerrainSample::buildable()))
            .with(cell(3, 3), TerrainSample::new("water", Fixed::ZERO))
            .with(cell(6, 6), TerrainSample::new("buildable", fixed(40)));
        let controller = BuildingSystemController::new(
            &config,
            outpost_test_utils::fixtures::sample_catalog(),
            Stockpile::new().with("wood", 1_000),
            std::rc::Rc::new(EventBus::new()),
        )
        .unwrap()
        .with_terrain(terrain);

        let wet = controller.validate(&"farm".into(), cell(2, 2), Rotation::Deg0).unwrap();
        assert_eq!(wet.kind(), Some(PlacementErrorKind::InvalidTerrain));
        let steep = controller.validate(&"farm".into(), cell(5, 5), Rotation::Deg0).unwrap();
        assert_eq!(steep.kind(), Some(PlacementErrorKind::InvalidTerrain));
        assert!(controller.validate(&"farm".into(), cell(0, 0), Rotation::Deg0).unwrap().is_valid());
    }
}

// =============================================================================
// Construction
// =============================================================================

mod construction {
    use super::*;

    /// 10s build: half way after 5s, complete after 10s, one completion event
    #[test]
    fn test_scenario_d_progress_and_completion() {
        let mut controller = rich_controller();
        let log = EventLog::attach(controller.bus());
        let id = place_at(&mut controller, "farm", 2, 2).unwrap();

        controller.update(fixed(5), None, InputCommands::NONE);
        let farm = controller.registry().get(id).unwrap();
        assert_eq!(farm.progress, Fixed::from_num(0.5));
        assert_eq!(farm.state, LifecycleState::UnderConstruction);

        controller.update(fixed(5), None, InputCommands::NONE);
        let farm = controller.registry().get(id).unwrap();
        assert_eq!(farm.progress, Fixed::ONE);
        assert_eq!(farm.state, LifecycleState::Completed);

        controller.update(fixed(5), None, InputCommands::NONE);
        assert_eq!(log.count("ConstructionCompleted"), 1);
        assert_invariants(&controller);
    }

    #[test]
    fn test_production_starts_after_completion() {
        let mut controller = rich_controller();
        let id = place_at(&mut controller, "sawmill", 0, 0).unwrap();
        let planks = ResourceId::from("planks");

        controller.update(fixed(9), None, InputCommands::NONE);
        assert_eq!(controller.ledger().amount(&planks), 0);

        // Completes at 10s, then one 4s cycle
        controller.update(fixed(1), None, InputCommands::NONE);
        controller.update(fixed(4), None, InputCommands::NONE);
        assert_eq!(controller.ledger().amount(&planks), 5);

        // No output while damaged
        assert!(controller.report_damage(id).unwrap());
        controller.update(fixed(8), None, InputCommands::NONE);
        assert_eq!(controller.ledger().amount(&planks), 5);

        assert!(controller.repair(id).unwrap());
        controller.update(fixed(8), None, InputCommands::NONE);
        assert_eq!(controller.ledger().amount(&planks), 15);
    }

    #[test]
    fn test_storage_behavior_attached() {
        let mut controller = rich_controller();
        let id = place_at(&mut controller, "depot", 0, 0).unwrap();
        assert!(controller.registry().get(id).unwrap().behavior.is_none());

        controller.update(fixed(5), None, InputCommands::NONE);
        let behavior = controller.registry().get(id).unwrap().behavior.clone().unwrap();
        assert_eq!(behavior.storage_capacity(), 200);
    }
}

// =============================================================================
// Demolition
// =============================================================================

mod demolition {
    use super::*;

    /// Completed farm costing 100 wood refunds 50 at the default 50%
    #[test]
    fn test_scenario_e_refund() {
        let mut controller = controller_with(RecordingLedger::new(Stockpile::new().with("wood", 100)));
        let id = place_at(&mut controller, "farm", 2, 2).unwrap();
        controller.update(fixed(10), None, InputCommands::NONE);
        controller.ledger().clear();

        let outcome = controller.demolish(id).unwrap();

        let expected = ResourceCost::new().with("wood", 50);
        assert_eq!(outcome, DemolitionOutcome::Demolished { refund: expected.clone() });
        assert_eq!(controller.ledger().refunds(), vec![expected]);
        assert_eq!(controller.ledger().amount(&"wood".into()), 50);
        assert!(controller.registry().is_empty());
        assert_eq!(controller.grid().occupied_count(), 0);
        assert_invariants(&controller);
    }

    #[test]
    fn test_under_construction_refunds_nothing() {
        let mut controller = controller_with(RecordingLedger::new(Stockpile::new().with("wood", 100)));
        let id = place_at(&mut controller, "farm", 2, 2).unwrap();
        controller.ledger().clear();

        controller.demolish(id).unwrap();

        assert!(controller.ledger().refunds().is_empty());
        assert!(!controller.scheduler().is_tracked(id));
        // Nothing left to complete
        controller.update(fixed(20), None, InputCommands::NONE);
        assert!(controller.registry().is_empty());
    }

    #[test]
    fn test_indestructible_refused() {
        let mut controller = rich_controller();
        let log = EventLog::attach(controller.bus());
        let id = place_at(&mut controller, "keep", 1, 1).unwrap();
        controller.update(Fixed::ONE, None, InputCommands::NONE);

        assert_eq!(controller.demolish(id).unwrap(), DemolitionOutcome::Refused);
        assert!(controller.registry().contains(id));
        assert_eq!(controller.grid().occupant(cell(1, 1)), Some(id));
        assert_eq!(log.count("DemolitionRefused"), 1);
        assert_eq!(log.count("Destroyed"), 0);
    }

    #[test]
    fn test_demolish_unknown_instance() {
        let mut controller = rich_controller();
        assert!(matches!(
            controller.demolish(InstanceId::new(99)),
            Err(EngineError::UnknownInstance(_))
        ));
    }

    #[test]
    fn test_destroyed_event_order() {
        let mut controller = rich_controller();
        let id = place_at(&mut controller, "hut", 3, 3).unwrap();
        controller.update(fixed(3), None, InputCommands::NONE);
        let log = EventLog::attach(controller.bus());

        controller.demolish(id).unwrap();

        let events = log.events();
        assert_eq!(log.names(), vec!["LifecycleChanged", "Destroyed"]);
        assert!(matches!(
            &events[0],
            RecordedEvent::LifecycleChanged(LifecycleChanged {
                from: LifecycleState::Completed,
                to: LifecycleState::Destroyed,
                ..
            })
        ));
        assert!(controller.registry().get(id).is_none());
        assert!(!controller.grid().is_occupied(cell(3, 3)));
        assert!(matches!(
            &events[1],
            RecordedEvent::Destroyed(Destroyed { anchor, .. }) if *anchor == cell(3, 3)
        ));
    }
}

// =============================================================================
// Rejected commits
// =============================================================================

mod rejected {
    use super::*;

    /// An unaffordable confirm never debits, registers or occupies
    #[test]
    fn test_scenario_f_insufficient_resources() {
        let mut controller = controller_with(RecordingLedger::new(Stockpile::new().with("wood", 50)));
        let log = EventLog::attach(controller.bus());

        controller.start_placement(&"farm".into()).unwrap();
        controller.update(Fixed::ZERO, pointer_at(2, 2), InputCommands::confirm());

        assert!(controller.is_placing_building());
        assert!(controller
            .ledger()
            .calls()
            .iter()
            .all(|call| matches!(call, LedgerCall::Has(_))));
        assert!(controller.registry().is_empty());
        assert_eq!(controller.grid().occupied_count(), 0);
        assert_eq!(controller.factory().live_buildings(), 0);
        assert_eq!(log.count("ValidationFailed"), 1);
        assert_eq!(log.count("Placed"), 0);

        // Register was never reached, so the first real instance is #1
        controller.ledger_mut().refund_resources(&ResourceCost::new().with("wood", 50));
        controller.update(Fixed::ZERO, pointer_at(2, 2), InputCommands::confirm());
        assert_eq!(controller.registry().ids().collect::<Vec<_>>(), vec![InstanceId::new(1)]);
    }

    /// A ledger that refuses the debit after approving the check leaves no trace
    #[test]
    fn test_refused_consume_rolls_back() {
        let ledger = RecordingLedger::new(Stockpile::new().with("wood", 500)).refusing_consume();
        let mut controller = controller_with(ledger);
        let log = EventLog::attach(controller.bus());

        controller.start_placement(&"farm".into()).unwrap();
        controller.update(Fixed::ZERO, pointer_at(2, 2), InputCommands::confirm());

        assert!(controller.is_placing_building());
        assert!(controller.registry().is_empty());
        assert_eq!(controller.grid().occupied_count(), 0);
        assert_eq!(controller.factory().live_buildings(), 0);
        assert_eq!(controller.scheduler().tracked_count(), 0);
        assert!(controller.ledger().mutations().is_empty());
        let failures: Vec<_> = log
            .events()
            .into_iter()
            .filter_map(|e| match e {
                RecordedEvent::ValidationFailed(f) => Some(f.error.kind),
                _ => None,
            })
            .collect();
        assert_eq!(failures, vec![PlacementErrorKind::InsufficientResources]);
        assert_invariants(&controller);
    }
}

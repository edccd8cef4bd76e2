//! State machine flow tests for the building controller.

use std::rc::Rc;

use outpost_core::prelude::*;
use outpost_test_utils::fixtures::{
    bounded_config, cell, fixed, place_at, pointer_at, rich_controller, rich_stockpile,
    sample_catalog,
};
use outpost_test_utils::invariants::assert_invariants;
use outpost_test_utils::recording::{EventLog, RecordedEvent};

// =============================================================================
// Placement sessions
// =============================================================================

mod placing {
    use super::*;

    #[test]
    fn test_full_placement_event_sequence() {
        let mut controller = rich_controller();
        let log = EventLog::attach(controller.bus());

        controller.start_placement(&"hut".into()).unwrap();
        controller.update(Fixed::ZERO, pointer_at(1, 1), InputCommands::NONE);
        controller.update(Fixed::ZERO, pointer_at(1, 1), InputCommands::confirm());
        controller.update(fixed(3), None, InputCommands::NONE);

        assert_eq!(
            log.names(),
            vec![
                "PlacementStarted",
                "ConstructionStarted",
                "Placed",
                "LifecycleChanged",
                "ConstructionCompleted",
            ]
        );
        assert_eq!(log.count("PreviewUpdated"), 1);
        assert_eq!(controller.current_state(), ControllerStateKind::Idle);
        assert_invariants(&controller);
    }

    #[test]
    fn test_cancel_returns_ghost_to_pool() {
        let mut controller = rich_controller();
        let log = EventLog::attach(controller.bus());

        controller.start_placement(&"farm".into()).unwrap();
        controller.update(Fixed::ZERO, pointer_at(3, 3), InputCommands::cancel());

        assert_eq!(controller.current_state(), ControllerStateKind::Idle);
        assert_eq!(controller.factory().live_ghosts(), 0);
        assert_eq!(controller.factory().pooled_ghosts(&"farm".into()), 1);
        assert_eq!(log.names(), vec!["PlacementStarted", "PlacementCancelled"]);
        assert!(controller.registry().is_empty());
    }

    #[test]
    fn test_switching_definition_cancels_previous() {
        let mut controller = rich_controller();
        let log = EventLog::attach(controller.bus());

        controller.start_placement(&"farm".into()).unwrap();
        controller.start_placement(&"hut".into()).unwrap();

        assert_eq!(
            log.names(),
            vec!["PlacementStarted", "PlacementCancelled", "PlacementStarted"]
        );
        let session = controller.placement_session().unwrap();
        assert_eq!(session.definition().id, DefinitionId::from("hut"));
        assert_eq!(controller.factory().live_ghosts(), 1);
    }

    #[test]
    fn test_unknown_definition_keeps_session() {
        let mut controller = rich_controller();
        controller.start_placement(&"farm".into()).unwrap();

        assert!(matches!(
            controller.start_placement(&"castle".into()),
            Err(EngineError::UnknownDefinition(_))
        ));
        assert!(controller.is_placing_building());
        assert_eq!(
            controller.placement_session().unwrap().definition().id,
            DefinitionId::from("farm")
        );
    }

    #[test]
    fn test_rotation_disallowed() {
        let mut controller = rich_controller();
        controller.start_placement(&"obelisk".into()).unwrap();
        controller.update(Fixed::ZERO, pointer_at(2, 2), InputCommands::rotate());
        assert_eq!(controller.placement_session().unwrap().rotation(), Rotation::Deg0);

        controller.start_placement(&"wall".into()).unwrap();
        controller.update(Fixed::ZERO, pointer_at(2, 2), InputCommands::rotate());
        assert_eq!(controller.placement_session().unwrap().rotation(), Rotation::Deg90);
    }

    #[test]
    fn test_rotated_commit_occupies_rotated_footprint() {
        let mut controller = rich_controller();
        controller.start_placement(&"wall".into()).unwrap();
        controller.update(
            Fixed::ZERO,
            pointer_at(0, 0),
            InputCommands::rotate().with_confirm(),
        );

        let id = controller.grid().occupant(cell(0, 0)).unwrap();
        let mut cells = controller.grid().cells_of(id);
        cells.sort();
        assert_eq!(cells, vec![cell(0, 0), cell(0, 1), cell(0, 2)]);
        assert!(!controller.grid().is_occupied(cell(1, 0)));
        assert_invariants(&controller);
    }

    #[test]
    fn test_pointer_off_grid_keeps_last_cell() {
        let mut controller = rich_controller();
        controller.start_placement(&"hut".into()).unwrap();
        controller.update(Fixed::ZERO, pointer_at(4, 4), InputCommands::NONE);
        controller.update(Fixed::ZERO, None, InputCommands::confirm());

        assert!(controller.grid().is_occupied(cell(4, 4)));
    }

    #[test]
    fn test_confirm_without_pointer_does_nothing() {
        let mut controller = rich_controller();
        controller.start_placement(&"hut".into()).unwrap();
        controller.update(Fixed::ZERO, None, InputCommands::confirm());

        assert!(controller.is_placing_building());
        assert!(controller.registry().is_empty());
    }

    #[test]
    fn test_preview_reports_failure_reason() {
        let mut controller = rich_controller();
        place_at(&mut controller, "farm", 0, 0).unwrap();
        let log = EventLog::attach(controller.bus());

        controller.start_placement(&"hut".into()).unwrap();
        controller.update(Fixed::ZERO, pointer_at(1, 1), InputCommands::NONE);

        let previews: Vec<_> = log
            .events()
            .into_iter()
            .filter_map(|e| match e {
                RecordedEvent::PreviewUpdated(p) => Some(p),
                _ => None,
            })
            .collect();
        assert_eq!(previews.len(), 1);
        assert_eq!(previews[0].result.kind(), Some(PlacementErrorKind::Occupied));
        let ghost = controller.placement_session().unwrap().ghost();
        assert!(!controller.factory().ghost(ghost).unwrap().valid);
    }

    #[test]
    fn test_far_pointer_previews_out_of_bounds() {
        let mut config = bounded_config(10, 10);
        config.grid.cell_size = Fixed::from_num(0.5);
        let mut controller = BuildingSystemController::new(
            &config,
            sample_catalog(),
            rich_stockpile(),
            Rc::new(EventBus::new()),
        )
        .unwrap();
        let log = EventLog::attach(controller.bus());

        controller.start_placement(&"hut".into()).unwrap();
        let far = Vec2Fixed::new(Fixed::from_num(1_500_000_000), Fixed::ZERO);
        controller.update(Fixed::ZERO, Some(far), InputCommands::NONE);
        controller.update(Fixed::ZERO, Some(far), InputCommands::confirm());

        let kinds: Vec<_> = log
            .events()
            .into_iter()
            .filter_map(|e| match e {
                RecordedEvent::PreviewUpdated(p) => Some((p.cell, p.result.kind())),
                _ => None,
            })
            .collect();
        assert_eq!(
            kinds[0],
            (cell(i32::MAX, 0), Some(PlacementErrorKind::OutOfBounds))
        );
        assert!(controller.registry().is_empty());
        assert_eq!(controller.current_state(), ControllerStateKind::Placing);
        assert_invariants(&controller);
    }
}

// =============================================================================
// Modal states
// =============================================================================

mod modal {
    use super::*;

    #[test]
    fn test_construction_view_blocks_placement_and_demolition() {
        let mut controller = rich_controller();
        controller.open_construction_view();

        assert!(matches!(
            controller.start_placement(&"hut".into()),
            Err(EngineError::ControllerBusy { state: ControllerStateKind::Constructing, .. })
        ));
        assert!(matches!(
            controller.start_demolition(),
            Err(EngineError::ControllerBusy { .. })
        ));
        assert_eq!(controller.current_state(), ControllerStateKind::Constructing);

        controller.update(Fixed::ZERO, None, InputCommands::cancel());
        assert_eq!(controller.current_state(), ControllerStateKind::Idle);
    }

    #[test]
    fn test_construction_view_cancels_placement() {
        let mut controller = rich_controller();
        controller.start_placement(&"hut".into()).unwrap();
        controller.open_construction_view();

        assert_eq!(controller.current_state(), ControllerStateKind::Constructing);
        assert_eq!(controller.factory().live_ghosts(), 0);
    }

    #[test]
    fn test_construction_continues_in_every_state() {
        let mut controller = rich_controller();
        let id = place_at(&mut controller, "hut", 0, 0).unwrap();
        controller.open_construction_view();
        controller.update(fixed(3), None, InputCommands::NONE);

        assert_eq!(
            controller.registry().get(id).unwrap().state,
            LifecycleState::Completed
        );
    }

    #[test]
    fn test_demolition_by_pointer() {
        let mut controller = rich_controller();
        let id = place_at(&mut controller, "farm", 2, 2).unwrap();
        controller.update(fixed(10), None, InputCommands::NONE);
        let wood_before = controller.ledger().amount(&"wood".into());

        controller.start_demolition().unwrap();
        // Empty cell: ignored
        controller.update(Fixed::ZERO, pointer_at(8, 8), InputCommands::confirm());
        assert_eq!(controller.current_state(), ControllerStateKind::Demolishing);

        controller.update(Fixed::ZERO, pointer_at(3, 3), InputCommands::confirm());
        assert_eq!(controller.current_state(), ControllerStateKind::Idle);
        assert!(!controller.registry().contains(id));
        assert_eq!(controller.ledger().amount(&"wood".into()), wood_before + 50);
        assert_invariants(&controller);
    }

    #[test]
    fn test_refused_demolition_stays_demolishing() {
        let mut controller = rich_controller();
        place_at(&mut controller, "keep", 5, 5).unwrap();
        controller.start_demolition().unwrap();
        controller.update(Fixed::ONE, pointer_at(5, 5), InputCommands::confirm());

        assert_eq!(controller.current_state(), ControllerStateKind::Demolishing);
        assert_eq!(controller.registry().len(), 1);

        controller.update(Fixed::ZERO, None, InputCommands::cancel());
        assert_eq!(controller.current_state(), ControllerStateKind::Idle);
    }

    #[test]
    fn test_demolition_cancels_placement() {
        let mut controller = rich_controller();
        let log = EventLog::attach(controller.bus());
        controller.start_placement(&"hut".into()).unwrap();
        controller.start_demolition().unwrap();

        assert_eq!(controller.current_state(), ControllerStateKind::Demolishing);
        assert_eq!(log.count("PlacementCancelled"), 1);
    }

    #[test]
    fn test_idle_click_selects() {
        let mut controller = rich_controller();
        let id = place_at(&mut controller, "hut", 6, 2).unwrap();
        let log = EventLog::attach(controller.bus());

        controller.update(Fixed::ZERO, pointer_at(6, 2), InputCommands::confirm());
        controller.update(Fixed::ZERO, pointer_at(7, 7), InputCommands::confirm());

        assert_eq!(
            log.events(),
            vec![RecordedEvent::Selected(Selected {
                instance: id,
                definition: "hut".into(),
            })]
        );
    }
}

// =============================================================================
// Damage and repair
// =============================================================================

mod condition {
    use super::*;

    #[test]
    fn test_damage_only_when_completed() {
        let mut controller = rich_controller();
        let id = place_at(&mut controller, "hut", 0, 0).unwrap();

        assert!(!controller.report_damage(id).unwrap());
        controller.update(fixed(3), None, InputCommands::NONE);
        assert!(controller.report_damage(id).unwrap());
        assert!(!controller.report_damage(id).unwrap());

        let instance = controller.registry().get(id).unwrap();
        assert_eq!(instance.state, LifecycleState::Damaged);
        assert_eq!(
            controller.factory().building(instance.handle).unwrap().presentation,
            PresentationState::Damaged
        );

        assert!(controller.repair(id).unwrap());
        assert!(!controller.repair(id).unwrap());
    }

    #[test]
    fn test_damaged_refund_rate() {
        let mut controller = rich_controller();
        let id = place_at(&mut controller, "farm", 0, 0).unwrap();
        controller.update(fixed(10), None, InputCommands::NONE);
        controller.report_damage(id).unwrap();

        let outcome = controller.demolish(id).unwrap();
        assert_eq!(
            outcome,
            DemolitionOutcome::Demolished {
                refund: ResourceCost::new().with("wood", 25)
            }
        );
    }

    #[test]
    fn test_damaged_building_still_satisfies_prerequisite() {
        let mut controller = rich_controller().with_requirements(PlayerProgress::at_level(5));
        let farm = place_at(&mut controller, "farm", 0, 0).unwrap();
        controller.update(fixed(10), None, InputCommands::NONE);
        controller.report_damage(farm).unwrap();

        let result = controller.validate(&"tower".into(), cell(5, 5), Rotation::Deg0).unwrap();
        assert!(result.is_valid());
    }
}

// =============================================================================
// Clock
// =============================================================================

mod clock {
    use super::*;

    #[test]
    fn test_negative_dt_is_ignored() {
        let mut controller = rich_controller();
        let id = place_at(&mut controller, "farm", 0, 0).unwrap();
        controller.update(fixed(4), None, InputCommands::NONE);
        controller.update(fixed(-10), None, InputCommands::NONE);

        assert_eq!(controller.clock(), fixed(4));
        assert_eq!(
            controller.registry().get(id).unwrap().progress,
            fixed(4) / fixed(10)
        );
    }

    #[test]
    fn test_construction_uses_placement_time() {
        let mut controller = rich_controller();
        controller.update(fixed(100), None, InputCommands::NONE);
        let id = place_at(&mut controller, "hut", 0, 0).unwrap();

        assert_eq!(controller.scheduler().job(id).unwrap().started_at, fixed(100));
        controller.update(fixed(2), None, InputCommands::NONE);
        assert_eq!(
            controller.registry().get(id).unwrap().state,
            LifecycleState::UnderConstruction
        );
    }
}

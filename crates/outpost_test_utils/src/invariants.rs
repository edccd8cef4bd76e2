//! Whole-controller invariant checks.

use outpost_core::prelude::*;

/// Every broken invariant of `controller`, as readable strings.
///
/// Checks:
/// - grid occupancy matches every instance's anchor plus rotated footprint
/// - only instances under construction have construction jobs
/// - every registered instance has a live building object
/// - at most one ghost is live, and only while placing
pub fn violations<L: ResourceLedger>(controller: &BuildingSystemController<L>) -> Vec<String> {
    let mut found = controller.footprint_violations();

    for (id, _) in controller.scheduler().jobs() {
        match controller.registry().get(id) {
            Some(instance) if instance.state == LifecycleState::UnderConstruction => {}
            Some(instance) => found.push(format!(
                "{id} has a construction job but is {:?}",
                instance.state
            )),
            None => found.push(format!("{id} has a construction job but is not registered")),
        }
    }

    for instance in controller.registry().all_instances() {
        if instance.state == LifecycleState::UnderConstruction
            && !controller.scheduler().is_tracked(instance.id)
        {
            found.push(format!("{} is under construction without a job", instance.id));
        }
        if controller.factory().building(instance.handle).is_none() {
            found.push(format!("{} has no live building object", instance.id));
        }
    }

    let live_buildings = controller.factory().live_buildings();
    if live_buildings != controller.registry().len() {
        found.push(format!(
            "{live_buildings} live building objects for {} instances",
            controller.registry().len()
        ));
    }

    let ghosts = controller.factory().live_ghosts();
    let expected_ghosts = usize::from(controller.is_placing_building());
    if ghosts != expected_ghosts {
        found.push(format!(
            "{ghosts} live ghosts in state {:?}",
            controller.current_state()
        ));
    }

    found
}

/// Assert [`violations`] is empty.
///
/// # Panics
///
/// Panics listing every violation.
pub fn assert_invariants<L: ResourceLedger>(controller: &BuildingSystemController<L>) {
    let found = violations(controller);
    assert!(found.is_empty(), "controller invariants broken:\n  {}", found.join("\n  "));
}

/// Assert only the grid/registry footprint invariant.
///
/// # Panics
///
/// Panics listing every disagreement.
pub fn assert_footprint_invariant<L: ResourceLedger>(controller: &BuildingSystemController<L>) {
    let found = controller.footprint_violations();
    assert!(found.is_empty(), "footprint invariant broken:\n  {}", found.join("\n  "));
}

//! Scripted headless sessions.
//!
//! Replays a [`Scenario`] against a real controller and reports the final
//! world, the stockpile and a readable event trail.

use std::cell::RefCell;
use std::collections::BTreeMap;
use std::fmt;
use std::rc::Rc;

use serde::Serialize;

use outpost_core::prelude::*;

use crate::error::Result;
use crate::scenario::{Scenario, Step};

/// One building at the end of a session.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BuildingSummary {
    /// Instance id.
    pub id: InstanceId,
    /// Definition.
    pub definition: DefinitionId,
    /// Anchor cell.
    pub anchor: CellCoord,
    /// Rotation in degrees.
    pub rotation: u32,
    /// Lifecycle state.
    pub state: LifecycleState,
    /// Construction progress in `[0, 1]`.
    pub progress: f64,
}

/// Outcome of a scripted session.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SimulationReport {
    /// Scenario name.
    pub name: String,
    /// Steps replayed.
    pub steps: usize,
    /// Final session clock in seconds.
    pub clock: f64,
    /// Steps that did not take effect, with the reason.
    pub rejected: Vec<String>,
    /// Buildings standing at the end.
    pub buildings: Vec<BuildingSummary>,
    /// Final stockpile.
    pub resources: BTreeMap<String, u64>,
    /// Readable event trail.
    pub events: Vec<String>,
}

impl SimulationReport {
    /// Render as pretty JSON.
    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }
}

impl fmt::Display for SimulationReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "=== {} ===", self.name)?;
        writeln!(f, "steps: {}  clock: {:.2}s", self.steps, self.clock)?;
        writeln!(f, "buildings:")?;
        for b in &self.buildings {
            writeln!(
                f,
                "  {} {} at {} rot {} {:?} {:.0}%",
                b.id,
                b.definition,
                b.anchor,
                b.rotation,
                b.state,
                b.progress * 100.0
            )?;
        }
        writeln!(f, "resources:")?;
        for (name, amount) in &self.resources {
            writeln!(f, "  {name}: {amount}")?;
        }
        if !self.rejected.is_empty() {
            writeln!(f, "rejected:")?;
            for reason in &self.rejected {
                writeln!(f, "  {reason}")?;
            }
        }
        writeln!(f, "events:")?;
        for event in &self.events {
            writeln!(f, "  {event}")?;
        }
        Ok(())
    }
}

type Trail = Rc<RefCell<Vec<String>>>;

fn record_events(bus: &EventBus) -> Trail {
    let trail: Trail = Rc::default();

    let sink = Rc::clone(&trail);
    bus.subscribe(move |e: &Placed| {
        sink.borrow_mut()
            .push(format!("placed {} {} at {} for {}", e.definition, e.instance, e.anchor, e.cost));
    });
    let sink = Rc::clone(&trail);
    bus.subscribe(move |e: &ValidationFailed| {
        sink.borrow_mut()
            .push(format!("rejected {} at {}: {}", e.definition, e.cell, e.error));
    });
    let sink = Rc::clone(&trail);
    bus.subscribe(move |e: &ConstructionCompleted| {
        sink.borrow_mut()
            .push(format!("completed {} {}", e.definition, e.instance));
    });
    let sink = Rc::clone(&trail);
    bus.subscribe(move |e: &Destroyed| {
        sink.borrow_mut()
            .push(format!("demolished {} {} refunding {}", e.definition, e.instance, e.refund));
    });
    let sink = Rc::clone(&trail);
    bus.subscribe(move |e: &DemolitionRefused| {
        sink.borrow_mut()
            .push(format!("refused to demolish {} {}", e.definition, e.instance));
    });
    let sink = Rc::clone(&trail);
    bus.subscribe(move |e: &ResourcesProduced| {
        sink.borrow_mut()
            .push(format!("{} produced {}", e.instance, e.produced));
    });

    trail
}

/// Replay `scenario` and report the result.
///
/// # Errors
///
/// Returns an error if the scenario's catalog or config is unusable. Steps
/// that fail in play are reported, not returned.
pub fn run_scenario(scenario: &Scenario) -> Result<SimulationReport> {
    let catalog = scenario.catalog()?;
    let mut stockpile = Stockpile::new();
    for (resource, amount) in &scenario.resources {
        stockpile.set(resource.as_str(), *amount);
    }
    let progress = scenario
        .quests
        .iter()
        .fold(PlayerProgress::at_level(scenario.level), |p, quest| {
            p.with_quest(quest.as_str())
        });

    let bus = Rc::new(EventBus::new());
    let trail = record_events(&bus);
    let mut controller =
        BuildingSystemController::new(&scenario.config, catalog, stockpile, Rc::clone(&bus))?
            .with_requirements(progress);

    tracing::info!(name = %scenario.name, steps = scenario.steps.len(), "Running scenario");
    let mut rejected = Vec::new();
    for (index, step) in scenario.steps.iter().enumerate() {
        if let Err(reason) = run_step(&mut controller, step) {
            tracing::debug!(step = index, %reason, "Step rejected");
            rejected.push(format!("step {index}: {reason}"));
        }
    }

    let buildings = controller
        .registry()
        .all_instances()
        .map(|instance| BuildingSummary {
            id: instance.id,
            definition: instance.definition.clone(),
            anchor: instance.anchor,
            rotation: instance.rotation.degrees(),
            state: instance.state,
            progress: instance.progress.to_num(),
        })
        .collect();
    let resources = controller
        .ledger()
        .balances()
        .map(|(id, amount)| (id.to_string(), amount))
        .collect();
    let events = trail.borrow().clone();

    Ok(SimulationReport {
        name: scenario.name.clone(),
        steps: scenario.steps.len(),
        clock: controller.clock().to_num(),
        rejected,
        buildings,
        resources,
        events,
    })
}

fn run_step(
    controller: &mut BuildingSystemController<Stockpile>,
    step: &Step,
) -> std::result::Result<(), String> {
    match step {
        Step::Place {
            definition,
            x,
            y,
            rotations,
        } => {
            controller
                .start_placement(definition)
                .map_err(|e| e.to_string())?;
            let pointer = Some(controller.grid().cell_to_world(CellCoord::new(*x, *y)));
            for _ in 0..*rotations {
                controller.update(Fixed::ZERO, pointer, InputCommands::rotate());
            }
            controller.update(Fixed::ZERO, pointer, InputCommands::confirm());
            if controller.is_placing_building() {
                let reason = controller
                    .placement_session()
                    .and_then(|s| s.last_result())
                    .and_then(PlacementValidationResult::error)
                    .map_or_else(|| "placement rejected".to_string(), ToString::to_string);
                controller.cancel_current_action();
                return Err(reason);
            }
            Ok(())
        }
        Step::Wait(seconds) => {
            let mut remaining = (*seconds).max(Fixed::ZERO);
            while remaining > Fixed::ZERO {
                let dt = remaining.min(Fixed::ONE);
                controller.update(dt, None, InputCommands::NONE);
                remaining -= dt;
            }
            Ok(())
        }
        Step::Demolish { x, y } => {
            let id = occupant(controller, *x, *y)?;
            match controller.demolish(id).map_err(|e| e.to_string())? {
                DemolitionOutcome::Demolished { .. } => Ok(()),
                DemolitionOutcome::Refused => Err(format!("{id} cannot be demolished")),
            }
        }
        Step::Damage { x, y } => {
            let id = occupant(controller, *x, *y)?;
            changed(controller.report_damage(id), id)
        }
        Step::Repair { x, y } => {
            let id = occupant(controller, *x, *y)?;
            changed(controller.repair(id), id)
        }
    }
}

fn occupant(
    controller: &BuildingSystemController<Stockpile>,
    x: i32,
    y: i32,
) -> std::result::Result<InstanceId, String> {
    let cell = CellCoord::new(x, y);
    controller
        .grid()
        .occupant(cell)
        .ok_or_else(|| format!("nothing at {cell}"))
}

fn changed(result: outpost_core::error::Result<bool>, id: InstanceId) -> std::result::Result<(), String> {
    match result {
        Ok(true) => Ok(()),
        Ok(false) => Err(format!("{id} is not in a state that allows this")),
        Err(e) => Err(e.to_string()),
    }
}

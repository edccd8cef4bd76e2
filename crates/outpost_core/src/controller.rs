//! The building system state machine.
//!
//! [`BuildingSystemController`] owns every engine component and is the only
//! public entry point for mutating the world. The host calls
//! [`update`](BuildingSystemController::update) once per frame with the frame
//! delta, the pointer's world position and the input flags for that frame.
//!
//! ```text
//!            start_placement              confirm (valid) / cancel
//!   Idle ─────────────────────▶ Placing ──────────────────────────▶ Idle
//!    │  start_demolition                 confirm (demolished) / cancel
//!    ├────────────────────────▶ Demolishing ──────────────────────▶ Idle
//!    │  open_construction_view                          cancel
//!    └────────────────────────▶ Constructing ─────────────────────▶ Idle
//! ```
//!
//! There is no terminal state. Construction is swept on every update in
//! every state.

use std::fmt;
use std::mem;
use std::rc::Rc;

use serde::{Deserialize, Serialize};

use crate::behavior::BuildingBehavior;
use crate::catalog::{BuildingCatalog, BuildingDefinition, DefinitionId};
use crate::config::EngineConfig;
use crate::construction::ConstructionScheduler;
use crate::error::{EngineError, Result};
use crate::events::{
    DemolitionRefused, Destroyed, EventBus, LifecycleChanged, Placed, PlacementCancelled,
    PlacementStarted, PreviewUpdated, ResourcesProduced, Selected, ValidationFailed,
};
use crate::factory::{BuildingFactory, GhostHandle, PresentationState};
use crate::grid::{CellCoord, GridIndex, Rotation};
use crate::ledger::{ResourceCost, ResourceLedger};
use crate::math::{Fixed, Vec2Fixed};
use crate::registry::{BuildingRegistry, InstanceId, LifecycleState};
use crate::requirements::{RequirementSource, Unrestricted};
use crate::terrain::TerrainQuery;
use crate::validation::{
    PlacementContext, PlacementError, PlacementErrorKind, PlacementRule,
    PlacementValidationResult, PlacementValidator,
};

// ============================================================================
// Public Types
// ============================================================================

/// Which state the controller is in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ControllerStateKind {
    /// Nothing in progress.
    Idle,
    /// Previewing a building under the pointer.
    Placing,
    /// Modal construction overview; placement and demolition are blocked.
    Constructing,
    /// Waiting for the player to pick a building to demolish.
    Demolishing,
}

/// Input flags for one frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct InputCommands {
    /// Primary click.
    pub confirm: bool,
    /// Back out of the current action.
    pub cancel: bool,
    /// Rotate the preview a quarter turn.
    pub rotate: bool,
}

impl InputCommands {
    /// No input this frame.
    pub const NONE: Self = Self {
        confirm: false,
        cancel: false,
        rotate: false,
    };

    /// Only a confirm click.
    #[must_use]
    pub const fn confirm() -> Self {
        Self {
            confirm: true,
            ..Self::NONE
        }
    }

    /// Only a cancel.
    #[must_use]
    pub const fn cancel() -> Self {
        Self {
            cancel: true,
            ..Self::NONE
        }
    }

    /// Only a rotate.
    #[must_use]
    pub const fn rotate() -> Self {
        Self {
            rotate: true,
            ..Self::NONE
        }
    }

    /// Add a confirm click.
    #[must_use]
    pub const fn with_confirm(mut self) -> Self {
        self.confirm = true;
        self
    }

    /// Add a rotate.
    #[must_use]
    pub const fn with_rotate(mut self) -> Self {
        self.rotate = true;
        self
    }
}

/// An active placement preview.
#[derive(Debug, Clone)]
pub struct PlacementSession {
    definition: BuildingDefinition,
    ghost: GhostHandle,
    rotation: Rotation,
    cell: Option<CellCoord>,
    last_result: Option<PlacementValidationResult>,
}

impl PlacementSession {
    /// Definition being placed.
    #[must_use]
    pub fn definition(&self) -> &BuildingDefinition {
        &self.definition
    }

    /// Preview ghost.
    #[must_use]
    pub const fn ghost(&self) -> GhostHandle {
        self.ghost
    }

    /// Current rotation.
    #[must_use]
    pub const fn rotation(&self) -> Rotation {
        self.rotation
    }

    /// Anchor cell under the pointer, once the pointer has been seen.
    #[must_use]
    pub const fn cell(&self) -> Option<CellCoord> {
        self.cell
    }

    /// Most recent validation of the preview.
    #[must_use]
    pub const fn last_result(&self) -> Option<&PlacementValidationResult> {
        self.last_result.as_ref()
    }
}

/// What a demolition attempt did.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DemolitionOutcome {
    /// The building was removed and `refund` credited.
    Demolished {
        /// Resources credited back.
        refund: ResourceCost,
    },
    /// The building is indestructible.
    Refused,
}

#[derive(Debug)]
enum ControllerState {
    Idle,
    Placing(PlacementSession),
    Constructing,
    Demolishing,
}

impl ControllerState {
    const fn kind(&self) -> ControllerStateKind {
        match self {
            Self::Idle => ControllerStateKind::Idle,
            Self::Placing(_) => ControllerStateKind::Placing,
            Self::Constructing => ControllerStateKind::Constructing,
            Self::Demolishing => ControllerStateKind::Demolishing,
        }
    }
}

// ============================================================================
// Controller
// ============================================================================

/// Orchestrates placement, construction and demolition.
pub struct BuildingSystemController<L: ResourceLedger> {
    config: EngineConfig,
    catalog: BuildingCatalog,
    grid: GridIndex,
    registry: BuildingRegistry,
    factory: BuildingFactory,
    scheduler: ConstructionScheduler,
    validator: PlacementValidator,
    bus: Rc<EventBus>,
    ledger: L,
    terrain: Option<Box<dyn TerrainQuery>>,
    requirements: Box<dyn RequirementSource>,
    state: ControllerState,
    clock: Fixed,
}

impl<L: ResourceLedger> fmt::Debug for BuildingSystemController<L> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BuildingSystemController")
            .field("state", &self.state.kind())
            .field("clock", &self.clock)
            .field("instances", &self.registry.len())
            .field("under_construction", &self.scheduler.tracked_count())
            .field("validator", &self.validator)
            .finish_non_exhaustive()
    }
}

impl<L: ResourceLedger> BuildingSystemController<L> {
    /// Build a controller with an empty world.
    ///
    /// Terrain is not checked and every requirement is met until
    /// [`with_terrain`](Self::with_terrain) and
    /// [`with_requirements`](Self::with_requirements) say otherwise.
    pub fn new(
        config: &EngineConfig,
        catalog: BuildingCatalog,
        ledger: L,
        bus: Rc<EventBus>,
    ) -> Result<Self> {
        config.validate()?;
        tracing::info!(
            definitions = catalog.len(),
            bounds = ?config.grid.bounds,
            "Building system ready"
        );
        Ok(Self {
            grid: config.grid.build(),
            registry: BuildingRegistry::new(),
            factory: BuildingFactory::new(&config.pools),
            scheduler: ConstructionScheduler::new(),
            validator: PlacementValidator::new(&config.placement),
            config: config.clone(),
            catalog,
            bus,
            ledger,
            terrain: None,
            requirements: Box::new(Unrestricted),
            state: ControllerState::Idle,
            clock: Fixed::ZERO,
        })
    }

    /// Sample terrain from `terrain` for the terrain rule.
    #[must_use]
    pub fn with_terrain(mut self, terrain: impl TerrainQuery + 'static) -> Self {
        self.terrain = Some(Box::new(terrain));
        self
    }

    /// Answer level and quest checks from `requirements`.
    #[must_use]
    pub fn with_requirements(mut self, requirements: impl RequirementSource + 'static) -> Self {
        self.requirements = Box::new(requirements);
        self
    }

    /// Append a custom placement rule.
    #[must_use]
    pub fn with_rule(mut self, rule: impl PlacementRule + 'static) -> Self {
        self.validator.push_rule(Box::new(rule));
        self
    }

    // ------------------------------------------------------------------------
    // Accessors
    // ------------------------------------------------------------------------

    /// Current state.
    #[must_use]
    pub const fn current_state(&self) -> ControllerStateKind {
        self.state.kind()
    }

    /// Whether a placement preview is active.
    #[must_use]
    pub const fn is_placing_building(&self) -> bool {
        matches!(self.state, ControllerState::Placing(_))
    }

    /// Active placement preview.
    #[must_use]
    pub const fn placement_session(&self) -> Option<&PlacementSession> {
        match &self.state {
            ControllerState::Placing(session) => Some(session),
            _ => None,
        }
    }

    /// Session time in seconds.
    #[must_use]
    pub const fn clock(&self) -> Fixed {
        self.clock
    }

    /// Configuration in use.
    #[must_use]
    pub const fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// Building definitions.
    #[must_use]
    pub const fn catalog(&self) -> &BuildingCatalog {
        &self.catalog
    }

    /// Occupancy grid.
    #[must_use]
    pub const fn grid(&self) -> &GridIndex {
        &self.grid
    }

    /// Placed instances.
    #[must_use]
    pub const fn registry(&self) -> &BuildingRegistry {
        &self.registry
    }

    /// Ghost and building objects.
    #[must_use]
    pub const fn factory(&self) -> &BuildingFactory {
        &self.factory
    }

    /// Construction jobs.
    #[must_use]
    pub const fn scheduler(&self) -> &ConstructionScheduler {
        &self.scheduler
    }

    /// Resource ledger.
    #[must_use]
    pub const fn ledger(&self) -> &L {
        &self.ledger
    }

    /// Mutable resource ledger, for hosts crediting income.
    pub fn ledger_mut(&mut self) -> &mut L {
        &mut self.ledger
    }

    /// Event bus.
    #[must_use]
    pub fn bus(&self) -> &Rc<EventBus> {
        &self.bus
    }

    /// Validate a placement against the current world without starting a
    /// session.
    pub fn validate(
        &self,
        definition: &DefinitionId,
        anchor: CellCoord,
        rotation: Rotation,
    ) -> Result<PlacementValidationResult> {
        let def = self
            .catalog
            .get(definition)
            .ok_or_else(|| EngineError::UnknownDefinition(definition.clone()))?;
        Ok(self.validate_definition(def, anchor, rotation))
    }

    fn validate_definition(
        &self,
        definition: &BuildingDefinition,
        anchor: CellCoord,
        rotation: Rotation,
    ) -> PlacementValidationResult {
        let ctx = PlacementContext {
            grid: &self.grid,
            registry: &self.registry,
            ledger: &self.ledger,
            terrain: self.terrain.as_ref().map(|t| &**t as &dyn TerrainQuery),
            requirements: &*self.requirements,
        };
        self.validator.validate(&ctx, anchor, definition, rotation)
    }

    // ------------------------------------------------------------------------
    // Actions
    // ------------------------------------------------------------------------

    /// Begin previewing `definition` under the pointer.
    ///
    /// Refused while the construction view is open. An active placement or
    /// demolition is cancelled first.
    pub fn start_placement(&mut self, definition: &DefinitionId) -> Result<()> {
        if matches!(self.state, ControllerState::Constructing) {
            return Err(EngineError::ControllerBusy {
                state: ControllerStateKind::Constructing,
                action: "start placement",
            });
        }
        let def = self
            .catalog
            .get(definition)
            .cloned()
            .ok_or_else(|| EngineError::UnknownDefinition(definition.clone()))?;
        self.cancel_current_action();

        let ghost = self.factory.create_ghost(&def);
        tracing::debug!(definition = %def.id, "Placement started");
        self.state = ControllerState::Placing(PlacementSession {
            definition: def,
            ghost,
            rotation: Rotation::Deg0,
            cell: None,
            last_result: None,
        });
        self.bus.publish(PlacementStarted {
            definition: definition.clone(),
            ghost,
        });
        Ok(())
    }

    /// Wait for the player to pick a building to demolish.
    ///
    /// Refused while the construction view is open. An active placement is
    /// cancelled first.
    pub fn start_demolition(&mut self) -> Result<()> {
        match self.state {
            ControllerState::Constructing => Err(EngineError::ControllerBusy {
                state: ControllerStateKind::Constructing,
                action: "start demolition",
            }),
            ControllerState::Demolishing => Ok(()),
            ControllerState::Idle | ControllerState::Placing(_) => {
                self.cancel_current_action();
                tracing::debug!("Demolition started");
                self.state = ControllerState::Demolishing;
                Ok(())
            }
        }
    }

    /// Open the modal construction overview.
    pub fn open_construction_view(&mut self) {
        self.cancel_current_action();
        self.state = ControllerState::Constructing;
    }

    /// Back out of whatever is in progress and return to Idle.
    pub fn cancel_current_action(&mut self) {
        match mem::replace(&mut self.state, ControllerState::Idle) {
            ControllerState::Placing(session) => self.end_placement(session, true),
            ControllerState::Demolishing => tracing::debug!("Demolition cancelled"),
            ControllerState::Constructing | ControllerState::Idle => {}
        }
    }

    fn end_placement(&mut self, session: PlacementSession, cancelled: bool) {
        self.factory.recycle_ghost(session.ghost);
        if cancelled {
            tracing::debug!(definition = %session.definition.id, "Placement cancelled");
            self.bus.publish(PlacementCancelled {
                definition: session.definition.id,
            });
        }
    }

    /// Demolish `id` directly, bypassing pointer selection.
    ///
    /// Order: cancel construction, free cells, refund, mark destroyed,
    /// unregister, recycle, then publish the lifecycle change and `Destroyed`.
    pub fn demolish(&mut self, id: InstanceId) -> Result<DemolitionOutcome> {
        let instance = self
            .registry
            .get(id)
            .cloned()
            .ok_or(EngineError::UnknownInstance(id))?;
        let def = self
            .catalog
            .get(&instance.definition)
            .ok_or_else(|| EngineError::UnknownDefinition(instance.definition.clone()))?;

        if !def.destructible {
            tracing::debug!(%id, definition = %instance.definition, "Demolition refused");
            self.bus.publish(DemolitionRefused {
                instance: id,
                definition: instance.definition,
            });
            return Ok(DemolitionOutcome::Refused);
        }
        let refund = self.config.refunds.refund_for(instance.state, &def.cost);

        self.scheduler.cancel(id);
        self.grid.free(instance.anchor, instance.footprint, id);
        if !refund.is_empty() {
            self.ledger.refund_resources(&refund);
        }
        let previous = self.registry.set_state(id, LifecycleState::Destroyed);
        self.registry.unregister(id);
        self.factory.recycle_building(instance.handle);

        tracing::info!(%id, definition = %instance.definition, %refund, "Building demolished");
        if let Some(from) = previous {
            self.bus.publish(LifecycleChanged {
                instance: id,
                from,
                to: LifecycleState::Destroyed,
            });
        }
        self.bus.publish(Destroyed {
            instance: id,
            definition: instance.definition,
            anchor: instance.anchor,
            refund: refund.clone(),
        });
        Ok(DemolitionOutcome::Demolished { refund })
    }

    /// Mark a completed building as damaged. Returns `false` if it was not
    /// Completed.
    pub fn report_damage(&mut self, id: InstanceId) -> Result<bool> {
        self.change_condition(id, LifecycleState::Completed, LifecycleState::Damaged)
    }

    /// Repair a damaged building. Returns `false` if it was not Damaged.
    pub fn repair(&mut self, id: InstanceId) -> Result<bool> {
        self.change_condition(id, LifecycleState::Damaged, LifecycleState::Completed)
    }

    fn change_condition(
        &mut self,
        id: InstanceId,
        from: LifecycleState,
        to: LifecycleState,
    ) -> Result<bool> {
        let instance = self.registry.get(id).ok_or(EngineError::UnknownInstance(id))?;
        if instance.state != from {
            return Ok(false);
        }
        let handle = instance.handle;
        self.registry.set_state(id, to);
        let presentation = if to == LifecycleState::Damaged {
            PresentationState::Damaged
        } else {
            PresentationState::Active
        };
        self.factory.set_presentation(handle, presentation);
        tracing::debug!(%id, ?from, ?to, "Building condition changed");
        self.bus.publish(LifecycleChanged {
            instance: id,
            from,
            to,
        });
        Ok(true)
    }

    // ------------------------------------------------------------------------
    // Per-frame update
    // ------------------------------------------------------------------------

    /// Advance one frame.
    ///
    /// 1. Advance the session clock by `dt` (negative deltas count as zero)
    /// 2. Sweep construction and activate finished buildings
    /// 3. Tick building behaviors
    /// 4. Handle pointer and input for the current state
    pub fn update(&mut self, dt: Fixed, pointer: Option<Vec2Fixed>, input: InputCommands) {
        let dt = dt.max(Fixed::ZERO);
        self.clock = self.clock.saturating_add(dt);

        self.run_construction_sweep();
        self.run_behavior_system(dt);

        match self.state.kind() {
            ControllerStateKind::Idle => self.update_idle(pointer, input),
            ControllerStateKind::Placing => self.update_placing(pointer, input),
            ControllerStateKind::Demolishing => self.update_demolishing(pointer, input),
            ControllerStateKind::Constructing => {
                if input.cancel {
                    self.cancel_current_action();
                }
            }
        }

        #[cfg(feature = "debug-validation")]
        self.check_footprint_invariant();
    }

    fn run_construction_sweep(&mut self) {
        let completed = self
            .scheduler
            .sweep(self.clock, &mut self.registry, &self.bus);
        for id in completed {
            let Some(instance) = self.registry.get(id) else {
                continue;
            };
            let handle = instance.handle;
            let behavior = self
                .catalog
                .get(&instance.definition)
                .map_or(BuildingBehavior::Passive, BuildingBehavior::for_definition);
            self.registry.attach_behavior(id, behavior);
            self.factory.set_presentation(handle, PresentationState::Active);
        }
    }

    fn run_behavior_system(&mut self, dt: Fixed) {
        if dt <= Fixed::ZERO {
            return;
        }
        let produced: Vec<(InstanceId, ResourceCost)> = self
            .registry
            .behaviors_mut()
            .filter(|(_, state, _)| *state == LifecycleState::Completed)
            .filter_map(|(id, _, behavior)| behavior.tick(dt).map(|p| (id, p)))
            .collect();
        for (id, amounts) in produced {
            self.ledger.deposit_resources(&amounts);
            tracing::debug!(%id, produced = %amounts, "Resources produced");
            self.bus.publish(ResourcesProduced {
                instance: id,
                produced: amounts,
            });
        }
    }

    fn update_idle(&mut self, pointer: Option<Vec2Fixed>, input: InputCommands) {
        if !input.confirm {
            return;
        }
        let Some(id) = pointer.and_then(|p| self.grid.occupant(self.grid.world_to_cell(p))) else {
            return;
        };
        if let Some(instance) = self.registry.get(id) {
            self.bus.publish(Selected {
                instance: id,
                definition: instance.definition.clone(),
            });
        }
    }

    fn update_placing(&mut self, pointer: Option<Vec2Fixed>, input: InputCommands) {
        let ControllerState::Placing(mut session) =
            mem::replace(&mut self.state, ControllerState::Idle)
        else {
            return;
        };
        if input.cancel {
            self.end_placement(session, true);
            return;
        }

        let mut changed = session.last_result.is_none();
        if input.rotate && session.definition.rotation_allowed {
            session.rotation = session.rotation.next();
            changed = true;
        }
        if let Some(cell) = pointer.map(|p| self.grid.world_to_cell(p)) {
            changed |= session.cell != Some(cell);
            session.cell = Some(cell);
        }
        let Some(cell) = session.cell else {
            self.state = ControllerState::Placing(session);
            return;
        };

        if changed {
            let result = self.validate_definition(&session.definition, cell, session.rotation);
            self.refresh_preview(&mut session, cell, result);
        }

        if input.confirm {
            match self.commit_placement(&session, cell) {
                Ok(_) => {
                    self.end_placement(session, false);
                    return;
                }
                Err(error) => {
                    tracing::debug!(definition = %session.definition.id, %cell, %error, "Placement confirm rejected");
                    self.bus.publish(ValidationFailed {
                        definition: session.definition.id.clone(),
                        cell,
                        error: error.clone(),
                    });
                    self.refresh_preview(&mut session, cell, PlacementValidationResult::Invalid(error));
                }
            }
        }
        self.state = ControllerState::Placing(session);
    }

    fn refresh_preview(
        &mut self,
        session: &mut PlacementSession,
        cell: CellCoord,
        result: PlacementValidationResult,
    ) {
        if session.last_result.as_ref() == Some(&result) && !self.ghost_needs_move(session, cell) {
            return;
        }
        let footprint = session.definition.footprint.rotated(session.rotation);
        self.factory.update_ghost(
            session.ghost,
            self.grid.cell_corner(cell),
            session.rotation,
            footprint,
            result.is_valid(),
        );
        self.bus.publish(PreviewUpdated {
            definition: session.definition.id.clone(),
            cell,
            rotation: session.rotation,
            result: result.clone(),
        });
        session.last_result = Some(result);
    }

    fn ghost_needs_move(&self, session: &PlacementSession, cell: CellCoord) -> bool {
        self.factory.ghost(session.ghost).map_or(true, |ghost| {
            ghost.position != self.grid.cell_corner(cell) || ghost.rotation != session.rotation
        })
    }

    /// Register, occupy, debit, start construction and publish, in that
    /// order. Nothing is left behind on failure.
    fn commit_placement(
        &mut self,
        session: &PlacementSession,
        cell: CellCoord,
    ) -> std::result::Result<InstanceId, PlacementError> {
        let def = &session.definition;
        let rotation = session.rotation;
        if let PlacementValidationResult::Invalid(error) =
            self.validate_definition(def, cell, rotation)
        {
            return Err(error);
        }

        let footprint = def.footprint.rotated(rotation);
        let position = self.grid.footprint_centre(cell, footprint);
        let handle = self.factory.create_building(def, cell, position, rotation);
        let id = self.registry.register(handle, def, cell, rotation);

        if let Err(err) = self.grid.try_occupy(cell, footprint, id) {
            tracing::error!(%id, error = %err, "Occupy failed after validation");
            self.registry.unregister(id);
            self.factory.recycle_building(handle);
            return Err(PlacementError::new(PlacementErrorKind::Occupied, err.to_string()));
        }
        if !self.ledger.consume_resources(&def.cost) {
            tracing::warn!(%id, cost = %def.cost, "Ledger refused a validated cost, rolling back");
            self.grid.free(cell, footprint, id);
            self.registry.unregister(id);
            self.factory.recycle_building(handle);
            return Err(PlacementError::new(
                PlacementErrorKind::InsufficientResources,
                format!("not enough resources for {}: needs {}", def.name, def.cost),
            ));
        }
        self.scheduler
            .start_construction(id, def.build_time, self.clock, &self.bus);

        tracing::info!(%id, definition = %def.id, anchor = %cell, ?rotation, "Building placed");
        self.bus.publish(Placed {
            instance: id,
            definition: def.id.clone(),
            anchor: cell,
            rotation,
            cost: def.cost.clone(),
        });
        Ok(id)
    }

    fn update_demolishing(&mut self, pointer: Option<Vec2Fixed>, input: InputCommands) {
        if input.cancel {
            self.cancel_current_action();
            return;
        }
        if !input.confirm {
            return;
        }
        let Some(id) = pointer.and_then(|p| self.grid.occupant(self.grid.world_to_cell(p))) else {
            return;
        };
        match self.demolish(id) {
            Ok(DemolitionOutcome::Demolished { .. }) => self.state = ControllerState::Idle,
            Ok(DemolitionOutcome::Refused) => {}
            Err(err) => tracing::warn!(%id, error = %err, "Demolition failed"),
        }
    }

    // ------------------------------------------------------------------------
    // Invariants
    // ------------------------------------------------------------------------

    /// Disagreements between the registry and the grid.
    ///
    /// Empty when every instance occupies exactly its anchor plus rotated
    /// footprint and every occupied cell belongs to a registered instance.
    #[must_use]
    pub fn footprint_violations(&self) -> Vec<String> {
        let mut violations = Vec::new();
        for instance in self.registry.all_instances() {
            for cell in instance.cells() {
                match self.grid.occupant(cell) {
                    Some(owner) if owner == instance.id => {}
                    Some(owner) => violations.push(format!(
                        "{cell} should belong to {} but belongs to {owner}",
                        instance.id
                    )),
                    None => violations.push(format!(
                        "{cell} should belong to {} but is empty",
                        instance.id
                    )),
                }
            }
        }
        let mut stray: Vec<(CellCoord, InstanceId)> = self
            .grid
            .occupied()
            .filter(|(cell, owner)| {
                self.registry
                    .get(*owner)
                    .map_or(true, |i| !i.cells().any(|c| c == *cell))
            })
            .collect();
        stray.sort_unstable();
        for (cell, owner) in stray {
            violations.push(format!("{cell} is held by {owner} outside its footprint"));
        }
        violations
    }

    #[cfg(feature = "debug-validation")]
    fn check_footprint_invariant(&self) {
        let violations = self.footprint_violations();
        if violations.is_empty() {
            return;
        }
        for violation in &violations {
            tracing::error!(%violation, "Footprint invariant violated");
        }
        if cfg!(debug_assertions) {
            panic!("footprint invariant violated: {}", violations.join("; "));
        }
    }
}

// ============================================================================
// Tests
// ============================================================================

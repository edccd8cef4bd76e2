//! Placement validation.
//!
//! A [`PlacementValidator`] runs an ordered chain of [`PlacementRule`]s and
//! stops at the first failure. The standard chain is:
//!
//! 1. Bounds (when enforced)
//! 2. Occupancy
//! 3. Terrain (when terrain rules are configured)
//! 4. Resources
//! 5. Requirements
//!
//! Custom rules are appended after the built-ins. Validation never mutates
//! anything and produces a fresh result on every call.

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::catalog::BuildingDefinition;
use crate::config::PlacementRules;
use crate::grid::{CellCoord, Footprint, GridIndex, Rotation};
use crate::ledger::ResourceLedger;
use crate::registry::BuildingRegistry;
use crate::requirements::RequirementSource;
use crate::terrain::{TerrainQuery, TerrainRules};

// ============================================================================
// Results
// ============================================================================

/// Why a placement was rejected.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum PlacementErrorKind {
    /// Part of the footprint lies outside the grid.
    OutOfBounds,
    /// Part of the footprint is already built on.
    Occupied,
    /// Part of the footprint is on unbuildable terrain.
    InvalidTerrain,
    /// The ledger cannot cover the cost.
    InsufficientResources,
    /// Level, quest or prerequisite building missing.
    RequirementsNotMet,
}

/// A rejected placement with a human-readable explanation.
#[derive(Debug, Clone, PartialEq, Eq, Error, Serialize, Deserialize)]
#[error("{message}")]
pub struct PlacementError {
    /// Failure category.
    pub kind: PlacementErrorKind,
    /// Explanation for the player.
    pub message: String,
}

impl PlacementError {
    /// Create an error.
    #[must_use]
    pub fn new(kind: PlacementErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
        }
    }
}

/// Outcome of validating one placement.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum PlacementValidationResult {
    /// The placement may be committed.
    Valid,
    /// The placement is rejected.
    Invalid(PlacementError),
}

impl PlacementValidationResult {
    /// Whether the placement is allowed.
    #[must_use]
    pub const fn is_valid(&self) -> bool {
        matches!(self, Self::Valid)
    }

    /// The rejection, if any.
    #[must_use]
    pub const fn error(&self) -> Option<&PlacementError> {
        match self {
            Self::Valid => None,
            Self::Invalid(err) => Some(err),
        }
    }

    /// The rejection kind, if any.
    #[must_use]
    pub fn kind(&self) -> Option<PlacementErrorKind> {
        self.error().map(|e| e.kind)
    }
}

impl From<Result<(), PlacementError>> for PlacementValidationResult {
    fn from(result: Result<(), PlacementError>) -> Self {
        match result {
            Ok(()) => Self::Valid,
            Err(err) => Self::Invalid(err),
        }
    }
}

// ============================================================================
// Rules
// ============================================================================

/// Read-only view of everything a rule may consult.
#[derive(Clone, Copy)]
pub struct PlacementContext<'a> {
    /// Occupancy and bounds.
    pub grid: &'a GridIndex,
    /// Placed instances, for prerequisite buildings.
    pub registry: &'a BuildingRegistry,
    /// Resource balances.
    pub ledger: &'a dyn ResourceLedger,
    /// Terrain, when the host provides it.
    pub terrain: Option<&'a dyn TerrainQuery>,
    /// Player progression.
    pub requirements: &'a dyn RequirementSource,
}

/// One candidate placement.
#[derive(Debug, Clone, Copy)]
pub struct PlacementRequest<'a> {
    /// Bottom-left cell.
    pub anchor: CellCoord,
    /// Definition being placed.
    pub definition: &'a BuildingDefinition,
    /// Requested rotation.
    pub rotation: Rotation,
    /// Footprint after rotation.
    pub footprint: Footprint,
}

impl<'a> PlacementRequest<'a> {
    /// Build a request, computing the rotated footprint.
    #[must_use]
    pub fn new(anchor: CellCoord, definition: &'a BuildingDefinition, rotation: Rotation) -> Self {
        Self {
            anchor,
            definition,
            rotation,
            footprint: definition.footprint.rotated(rotation),
        }
    }

    /// Cells the placement would cover.
    pub fn cells(&self) -> impl Iterator<Item = CellCoord> {
        self.footprint.cells(self.anchor)
    }
}

/// A single placement check.
pub trait PlacementRule {
    /// Short name for logs and diagnostics.
    fn name(&self) -> &'static str;

    /// Accept or reject a placement.
    fn check(
        &self,
        ctx: &PlacementContext<'_>,
        request: &PlacementRequest<'_>,
    ) -> Result<(), PlacementError>;
}

/// Every footprint cell must lie inside the grid.
#[derive(Debug, Clone, Copy, Default)]
pub struct BoundsRule;

impl PlacementRule for BoundsRule {
    fn name(&self) -> &'static str {
        "bounds"
    }

    fn check(
        &self,
        ctx: &PlacementContext<'_>,
        request: &PlacementRequest<'_>,
    ) -> Result<(), PlacementError> {
        match request.cells().find(|cell| !ctx.grid.contains(*cell)) {
            None => Ok(()),
            Some(cell) => Err(PlacementError::new(
                PlacementErrorKind::OutOfBounds,
                format!(
                    "{} at {} does not fit on the grid: {cell} is out of bounds",
                    request.definition.name, request.anchor
                ),
            )),
        }
    }
}

/// No footprint cell may already be occupied.
#[derive(Debug, Clone, Copy, Default)]
pub struct OccupancyRule;

impl PlacementRule for OccupancyRule {
    fn name(&self) -> &'static str {
        "occupancy"
    }

    fn check(
        &self,
        ctx: &PlacementContext<'_>,
        request: &PlacementRequest<'_>,
    ) -> Result<(), PlacementError> {
        for cell in request.cells() {
            if let Some(occupant) = ctx.grid.occupant(cell) {
                return Err(PlacementError::new(
                    PlacementErrorKind::Occupied,
                    format!("{cell} is occupied by building {occupant}"),
                ));
            }
        }
        Ok(())
    }
}

/// Every footprint cell must be buildable and not too steep.
///
/// Passes when the host supplies no terrain.
#[derive(Debug, Clone, Default)]
pub struct TerrainRule {
    rules: TerrainRules,
}

impl TerrainRule {
    /// Create the rule with the given thresholds.
    #[must_use]
    pub fn new(rules: TerrainRules) -> Self {
        Self { rules }
    }
}

impl PlacementRule for TerrainRule {
    fn name(&self) -> &'static str {
        "terrain"
    }

    fn check(
        &self,
        ctx: &PlacementContext<'_>,
        request: &PlacementRequest<'_>,
    ) -> Result<(), PlacementError> {
        let Some(terrain) = ctx.terrain else {
            return Ok(());
        };
        for cell in request.cells() {
            let sample = terrain.sample(ctx.grid.cell_to_world(cell));
            if let Some(reason) = self.rules.reject_reason(sample.as_ref()) {
                return Err(PlacementError::new(
                    PlacementErrorKind::InvalidTerrain,
                    format!("cannot build at {cell}: {reason}"),
                ));
            }
        }
        Ok(())
    }
}

/// The ledger must cover the full cost.
#[derive(Debug, Clone, Copy, Default)]
pub struct ResourceRule;

impl PlacementRule for ResourceRule {
    fn name(&self) -> &'static str {
        "resources"
    }

    fn check(
        &self,
        ctx: &PlacementContext<'_>,
        request: &PlacementRequest<'_>,
    ) -> Result<(), PlacementError> {
        let cost = &request.definition.cost;
        if ctx.ledger.has_resources(cost) {
            return Ok(());
        }
        let shortfall: Vec<String> = cost
            .iter()
            .filter_map(|(id, needed)| {
                let have = ctx.ledger.amount(id);
                (have < u64::from(needed)).then(|| format!("{needed} {id} (have {have})"))
            })
            .collect();
        let detail = if shortfall.is_empty() {
            cost.to_string()
        } else {
            shortfall.join(", ")
        };
        Err(PlacementError::new(
            PlacementErrorKind::InsufficientResources,
            format!("not enough resources for {}: needs {detail}", request.definition.name),
        ))
    }
}

/// Level, prerequisite buildings and quests, checked in that order.
#[derive(Debug, Clone, Copy, Default)]
pub struct RequirementRule;

impl PlacementRule for RequirementRule {
    fn name(&self) -> &'static str {
        "requirements"
    }

    fn check(
        &self,
        ctx: &PlacementContext<'_>,
        request: &PlacementRequest<'_>,
    ) -> Result<(), PlacementError> {
        let prereq = &request.definition.prerequisites;
        let fail = |message: String| {
            Err(PlacementError::new(PlacementErrorKind::RequirementsNotMet, message))
        };

        let level = ctx.requirements.player_level();
        if level < prereq.level {
            return fail(format!(
                "{} requires level {} (current level {level})",
                request.definition.name, prereq.level
            ));
        }
        if let Some(missing) = prereq
            .buildings
            .iter()
            .find(|b| !ctx.registry.has_operational(b))
        {
            return fail(format!(
                "{} requires a completed {missing}",
                request.definition.name
            ));
        }
        if let Some(quest) = prereq
            .quests
            .iter()
            .find(|q| !ctx.requirements.is_quest_complete(q))
        {
            return fail(format!(
                "{} requires quest '{quest}'",
                request.definition.name
            ));
        }
        Ok(())
    }
}

// ============================================================================
// Validator
// ============================================================================

/// Ordered rule chain.
pub struct PlacementValidator {
    rules: Vec<Box<dyn PlacementRule>>,
}

impl std::fmt::Debug for PlacementValidator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PlacementValidator")
            .field("rules", &self.rule_names())
            .finish()
    }
}

impl Default for PlacementValidator {
    fn default() -> Self {
        Self::new(&PlacementRules::default())
    }
}

impl PlacementValidator {
    /// Build the standard chain for the given rule settings.
    #[must_use]
    pub fn new(settings: &PlacementRules) -> Self {
        let mut rules: Vec<Box<dyn PlacementRule>> = Vec::with_capacity(5);
        if settings.enforce_bounds {
            rules.push(Box::new(BoundsRule));
        }
        rules.push(Box::new(OccupancyRule));
        if let Some(terrain) = &settings.terrain {
            rules.push(Box::new(TerrainRule::new(terrain.clone())));
        }
        rules.push(Box::new(ResourceRule));
        rules.push(Box::new(RequirementRule));
        Self { rules }
    }

    /// Append a custom rule after the built-ins.
    #[must_use]
    pub fn with_rule(mut self, rule: impl PlacementRule + 'static) -> Self {
        self.push_rule(Box::new(rule));
        self
    }

    /// Append a boxed custom rule.
    pub fn push_rule(&mut self, rule: Box<dyn PlacementRule>) {
        self.rules.push(rule);
    }

    /// Names of the rules in evaluation order.
    #[must_use]
    pub fn rule_names(&self) -> Vec<&'static str> {
        self.rules.iter().map(|r| r.name()).collect()
    }

    /// Check a placement, stopping at the first failing rule.
    #[must_use]
    pub fn validate(
        &self,
        ctx: &PlacementContext<'_>,
        anchor: CellCoord,
        definition: &BuildingDefinition,
        rotation: Rotation,
    ) -> PlacementValidationResult {
        let request = PlacementRequest::new(anchor, definition, rotation);
        for rule in &self.rules {
            if let Err(err) = rule.check(ctx, &request) {
                tracing::trace!(
                    rule = rule.name(),
                    definition = %definition.id,
                    %anchor,
                    reason = %err,
                    "Placement rejected"
                );
                return PlacementValidationResult::Invalid(err);
            }
        }
        PlacementValidationResult::Valid
    }
}

// ============================================================================
// Tests
// ============================================================================

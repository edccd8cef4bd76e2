//! Replay determinism harness.
//!
//! The controller is driven entirely by its inputs: the same catalog, config,
//! ledger and action script must always produce the same world and the same
//! event stream. This module replays scripts and compares digests.
//!
//! Sources of non-determinism we guard against:
//!
//! - **Floating-point math**: all positions and times are
//!   [`outpost_core::math::Fixed`].
//! - **HashMap iteration order**: digests sort everything they hash, and the
//!   registry and scheduler iterate in instance id order.
//! - **Hidden clocks**: construction progress is derived from the session
//!   clock, which only advances through `update`.

use std::collections::hash_map::DefaultHasher;
use std::hash::{Hash, Hasher};

use outpost_core::prelude::*;

use crate::fixtures::pointer_at;
use crate::recording::EventLog;

// ============================================================================
// Actions
// ============================================================================

/// One scripted call into the controller.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Action {
    /// `start_placement`
    StartPlacement(DefinitionId),
    /// `start_demolition`
    StartDemolition,
    /// `open_construction_view`
    OpenConstructionView,
    /// `cancel_current_action`
    Cancel,
    /// `update` with the pointer over a cell (or off the grid).
    Update {
        /// Frame time.
        dt: Fixed,
        /// Cell under the pointer.
        pointer: Option<CellCoord>,
        /// Frame input.
        input: InputCommands,
    },
    /// `demolish` the n-th live instance (modulo the live count).
    Demolish(usize),
    /// `report_damage` on the n-th live instance.
    Damage(usize),
    /// `repair` the n-th live instance.
    Repair(usize),
}

impl Action {
    /// Frame with no input.
    #[must_use]
    pub fn wait(dt: Fixed) -> Self {
        Self::Update {
            dt,
            pointer: None,
            input: InputCommands::NONE,
        }
    }

    /// Zero-time frame confirming at cell `(x, y)`.
    #[must_use]
    pub fn click(x: i32, y: i32) -> Self {
        Self::Update {
            dt: Fixed::ZERO,
            pointer: Some(CellCoord::new(x, y)),
            input: InputCommands::confirm(),
        }
    }
}

fn nth_instance<L: ResourceLedger>(
    controller: &BuildingSystemController<L>,
    n: usize,
) -> Option<InstanceId> {
    let ids: Vec<InstanceId> = controller.registry().ids().collect();
    if ids.is_empty() {
        None
    } else {
        Some(ids[n % ids.len()])
    }
}

/// Apply one action. Errors from busy states and unknown targets are part of
/// normal play and are ignored.
pub fn apply<L: ResourceLedger>(controller: &mut BuildingSystemController<L>, action: &Action) {
    match action {
        Action::StartPlacement(definition) => {
            let _ = controller.start_placement(definition);
        }
        Action::StartDemolition => {
            let _ = controller.start_demolition();
        }
        Action::OpenConstructionView => controller.open_construction_view(),
        Action::Cancel => controller.cancel_current_action(),
        Action::Update { dt, pointer, input } => {
            let pointer = pointer.and_then(|cell| pointer_at(cell.x, cell.y));
            controller.update(*dt, pointer, *input);
        }
        Action::Demolish(n) => {
            if let Some(id) = nth_instance(controller, *n) {
                let _ = controller.demolish(id);
            }
        }
        Action::Damage(n) => {
            if let Some(id) = nth_instance(controller, *n) {
                let _ = controller.report_damage(id);
            }
        }
        Action::Repair(n) => {
            if let Some(id) = nth_instance(controller, *n) {
                let _ = controller.repair(id);
            }
        }
    }
}

/// Apply every action in order.
pub fn run_script<L: ResourceLedger>(controller: &mut BuildingSystemController<L>, script: &[Action]) {
    for action in script {
        apply(controller, action);
    }
}

// ============================================================================
// Digests
// ============================================================================

/// Compute a simple hash for any hashable value.
pub fn compute_hash<T: Hash>(value: &T) -> u64 {
    let mut hasher = DefaultHasher::new();
    value.hash(&mut hasher);
    hasher.finish()
}

/// Hash of everything the controller owns apart from the ledger: state,
/// clock, instances, occupancy and construction jobs.
pub fn world_digest<L: ResourceLedger>(controller: &BuildingSystemController<L>) -> u64 {
    let instances: Vec<_> = controller
        .registry()
        .all_instances()
        .map(|instance| {
            (
                instance.id,
                instance.definition.clone(),
                instance.anchor,
                instance.rotation,
                instance.state,
                instance.progress,
            )
        })
        .collect();
    let mut occupied: Vec<(CellCoord, InstanceId)> = controller.grid().occupied().collect();
    occupied.sort_unstable();
    let jobs: Vec<_> = controller
        .scheduler()
        .jobs()
        .map(|(id, job)| (id, job.started_at, job.duration, job.progress))
        .collect();
    compute_hash(&(
        controller.current_state(),
        controller.clock(),
        instances,
        occupied,
        jobs,
    ))
}

/// Hash of a stockpile's balances.
pub fn stockpile_digest(stockpile: &Stockpile) -> u64 {
    let balances: Vec<(ResourceId, u64)> = stockpile
        .balances()
        .map(|(id, amount)| (id.clone(), amount))
        .collect();
    compute_hash(&balances)
}

// ============================================================================
// Harness
// ============================================================================

/// Result of a determinism test.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeterminismResult {
    /// Whether all runs produced identical results.
    pub is_deterministic: bool,
    /// Hashes from each run.
    pub hashes: Vec<u64>,
    /// Number of actions replayed.
    pub steps: usize,
}

impl DeterminismResult {
    /// Get all unique hashes (should be 1 for a deterministic replay).
    #[must_use]
    pub fn unique_hashes(&self) -> Vec<u64> {
        let mut unique: Vec<u64> = self.hashes.clone();
        unique.sort_unstable();
        unique.dedup();
        unique
    }

    /// Assert that the replay was deterministic, with a detailed error message.
    ///
    /// # Panics
    ///
    /// Panics if runs produced different hashes.
    pub fn assert_deterministic(&self) {
        if !self.is_deterministic {
            let unique = self.unique_hashes();
            panic!(
                "Replay is non-deterministic!\n\
                 Runs: {}\n\
                 Steps: {}\n\
                 Unique hashes: {} (expected 1)\n\
                 All hashes: {:?}",
                self.hashes.len(),
                self.steps,
                unique.len(),
                self.hashes
            );
        }
    }
}

/// Replay `script` on `runs` fresh controllers and compare the final world,
/// the stockpile, and the full event stream of each run.
///
/// # Example
///
/// ```
/// use outpost_test_utils::determinism::{verify_replay, Action};
/// use outpost_test_utils::fixtures::{fixed, rich_controller};
///
/// let script = vec![
///     Action::StartPlacement("farm".into()),
///     Action::click(2, 2),
///     Action::wait(fixed(10)),
/// ];
/// verify_replay(3, &script, rich_controller).assert_deterministic();
/// ```
pub fn verify_replay<Setup>(runs: usize, script: &[Action], setup: Setup) -> DeterminismResult
where
    Setup: Fn() -> BuildingSystemController<Stockpile>,
{
    let hashes: Vec<u64> = (0..runs)
        .map(|_| {
            let mut controller = setup();
            let log = EventLog::attach(controller.bus());
            run_script(&mut controller, script);
            compute_hash(&(
                world_digest(&controller),
                stockpile_digest(controller.ledger()),
                format!("{:?}", log.events()),
            ))
        })
        .collect();

    DeterminismResult {
        is_deterministic: hashes.windows(2).all(|w| w[0] == w[1]),
        hashes,
        steps: script.len(),
    }
}

/// Replay `script` on two controllers side by side, finding the first
/// action after which their worlds differ.
///
/// Returns `None` if they never diverge.
pub fn find_first_divergence<Setup>(setup: Setup, script: &[Action]) -> Option<usize>
where
    Setup: Fn() -> BuildingSystemController<Stockpile>,
{
    let mut first = setup();
    let mut second = setup();
    if world_digest(&first) != world_digest(&second) {
        return Some(0);
    }
    for (step, action) in script.iter().enumerate() {
        apply(&mut first, action);
        apply(&mut second, action);
        if world_digest(&first) != world_digest(&second) {
            return Some(step + 1);
        }
    }
    None
}

/// Proptest strategies for controller scripts.
pub mod strategies {
    use outpost_core::prelude::*;
    use proptest::prelude::*;

    use super::Action;

    /// A cell on the 10x10 fixture grid, or just outside it.
    pub fn arb_cell() -> impl Strategy<Value = CellCoord> {
        (-1i32..11, -1i32..11).prop_map(|(x, y)| CellCoord::new(x, y))
    }

    /// Footprints from 1x1 to 4x4.
    pub fn arb_footprint() -> impl Strategy<Value = Footprint> {
        (1u32..=4, 1u32..=4).prop_map(|(w, h)| Footprint::new(w, h))
    }

    /// Any rotation.
    pub fn arb_rotation() -> impl Strategy<Value = Rotation> {
        prop_oneof![
            Just(Rotation::Deg0),
            Just(Rotation::Deg90),
            Just(Rotation::Deg180),
            Just(Rotation::Deg270),
        ]
    }

    /// A definition from the fixture catalog.
    pub fn arb_definition() -> impl Strategy<Value = DefinitionId> {
        prop_oneof![
            Just("farm"),
            Just("hut"),
            Just("wall"),
            Just("sawmill"),
            Just("depot"),
            Just("keep"),
            Just("obelisk"),
            Just("tower"),
        ]
        .prop_map(DefinitionId::from)
    }

    /// Frame input flags.
    pub fn arb_input() -> impl Strategy<Value = InputCommands> {
        (any::<bool>(), any::<bool>(), any::<bool>()).prop_map(|(confirm, cancel, rotate)| {
            InputCommands {
                confirm,
                cancel,
                rotate,
            }
        })
    }

    /// Any controller action against the fixture catalog.
    pub fn arb_action() -> impl Strategy<Value = Action> {
        prop_oneof![
            3 => arb_definition().prop_map(Action::StartPlacement),
            1 => Just(Action::StartDemolition),
            1 => Just(Action::OpenConstructionView),
            1 => Just(Action::Cancel),
            6 => (0i32..=8, proptest::option::weighted(0.9, arb_cell()), arb_input()).prop_map(
                |(dt, pointer, input)| Action::Update {
                    dt: Fixed::from_num(dt),
                    pointer,
                    input,
                }
            ),
            1 => any::<usize>().prop_map(Action::Demolish),
            1 => any::<usize>().prop_map(Action::Damage),
            1 => any::<usize>().prop_map(Action::Repair),
        ]
    }

    /// Scripts of up to `max_len` actions.
    pub fn arb_script(max_len: usize) -> impl Strategy<Value = Vec<Action>> {
        prop::collection::vec(arb_action(), 0..max_len)
    }
}

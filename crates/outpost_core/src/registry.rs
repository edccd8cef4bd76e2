//! Authoritative table of placed building instances.
//!
//! The registry is the only writer of instance state. Lifecycle and progress
//! setters are crate-private: the construction scheduler and the controller's
//! demolition and damage paths are their only callers.

use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};

use crate::behavior::BuildingBehavior;
use crate::catalog::{BuildingDefinition, DefinitionId};
use crate::factory::BuildingHandle;
use crate::grid::{CellCoord, Footprint, Rotation};
use crate::math::Fixed;

/// Unique identifier of a placed building. Never reused within a session.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize,
)]
#[serde(transparent)]
pub struct InstanceId(u64);

impl InstanceId {
    /// Wrap a raw id.
    #[must_use]
    pub const fn new(raw: u64) -> Self {
        Self(raw)
    }

    /// Raw id value.
    #[must_use]
    pub const fn raw(self) -> u64 {
        self.0
    }
}

impl fmt::Display for InstanceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Lifecycle of a placed building.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum LifecycleState {
    /// Placed, construction in progress.
    UnderConstruction,
    /// Finished and functioning.
    Completed,
    /// Finished but damaged; still functioning.
    Damaged,
    /// Removed from the world. Terminal.
    Destroyed,
}

impl LifecycleState {
    /// Whether moving from `self` to `next` is a legal transition.
    #[must_use]
    pub const fn can_transition_to(self, next: Self) -> bool {
        use LifecycleState::*;
        matches!(
            (self, next),
            (UnderConstruction, Completed)
                | (Completed, Damaged)
                | (Damaged, Completed)
                | (UnderConstruction | Completed | Damaged, Destroyed)
        )
    }

    /// Whether the building counts as standing and working.
    #[must_use]
    pub const fn is_operational(self) -> bool {
        matches!(self, Self::Completed | Self::Damaged)
    }
}

/// One placed building.
#[derive(Debug, Clone, PartialEq)]
pub struct BuildingInstance {
    /// Unique id.
    pub id: InstanceId,
    /// Definition this instance was built from.
    pub definition: DefinitionId,
    /// Factory object representing it.
    pub handle: BuildingHandle,
    /// Bottom-left cell of the footprint.
    pub anchor: CellCoord,
    /// Placement rotation.
    pub rotation: Rotation,
    /// Effective footprint after rotation.
    pub footprint: Footprint,
    /// Lifecycle state.
    pub state: LifecycleState,
    /// Construction progress in `[0, 1]`.
    pub progress: Fixed,
    /// Capability attached on completion.
    pub behavior: Option<BuildingBehavior>,
}

impl BuildingInstance {
    /// Cells covered by this instance.
    pub fn cells(&self) -> impl Iterator<Item = CellCoord> {
        self.footprint.cells(self.anchor)
    }
}

/// Owns every [`BuildingInstance`], keyed and iterated in id order.
#[derive(Debug, Clone)]
pub struct BuildingRegistry {
    instances: BTreeMap<InstanceId, BuildingInstance>,
    next_id: u64,
}

impl Default for BuildingRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl BuildingRegistry {
    /// Create an empty registry. Ids start at 1.
    #[must_use]
    pub fn new() -> Self {
        Self {
            instances: BTreeMap::new(),
            next_id: 1,
        }
    }

    /// Record a freshly placed building, under construction with zero
    /// progress.
    pub fn register(
        &mut self,
        handle: BuildingHandle,
        definition: &BuildingDefinition,
        anchor: CellCoord,
        rotation: Rotation,
    ) -> InstanceId {
        let id = InstanceId::new(self.next_id);
        self.next_id += 1;
        self.instances.insert(
            id,
            BuildingInstance {
                id,
                definition: definition.id.clone(),
                handle,
                anchor,
                rotation,
                footprint: definition.footprint.rotated(rotation),
                state: LifecycleState::UnderConstruction,
                progress: Fixed::ZERO,
                behavior: None,
            },
        );
        tracing::debug!(%id, definition = %definition.id, %anchor, "Registered building");
        id
    }

    /// Remove a record. Grid cells are left untouched.
    pub fn unregister(&mut self, id: InstanceId) -> Option<BuildingInstance> {
        let removed = self.instances.remove(&id);
        if removed.is_none() {
            tracing::warn!(%id, "Unregister of unknown instance");
        }
        removed
    }

    /// Look up an instance.
    #[must_use]
    pub fn get(&self, id: InstanceId) -> Option<&BuildingInstance> {
        self.instances.get(&id)
    }

    /// Whether an instance is registered.
    #[must_use]
    pub fn contains(&self, id: InstanceId) -> bool {
        self.instances.contains_key(&id)
    }

    /// Number of registered instances.
    #[must_use]
    pub fn len(&self) -> usize {
        self.instances.len()
    }

    /// Whether the registry is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.instances.is_empty()
    }

    /// Every instance in id order. Call again to restart.
    pub fn all_instances(&self) -> impl Iterator<Item = &BuildingInstance> {
        self.instances.values()
    }

    /// Every id in ascending order.
    pub fn ids(&self) -> impl Iterator<Item = InstanceId> + '_ {
        self.instances.keys().copied()
    }

    /// Whether an operational instance of `definition` exists.
    #[must_use]
    pub fn has_operational(&self, definition: &DefinitionId) -> bool {
        self.instances
            .values()
            .any(|i| &i.definition == definition && i.state.is_operational())
    }

    /// Number of instances in a state.
    #[must_use]
    pub fn count_in_state(&self, state: LifecycleState) -> usize {
        self.instances.values().filter(|i| i.state == state).count()
    }

    /// Move an instance to a new lifecycle state.
    ///
    /// Returns the previous state, or `None` if the instance is unknown or
    /// the transition is illegal. Illegal transitions assert in debug builds.
    pub(crate) fn set_state(
        &mut self,
        id: InstanceId,
        next: LifecycleState,
    ) -> Option<LifecycleState> {
        let instance = self.instances.get_mut(&id)?;
        let previous = instance.state;
        if !previous.can_transition_to(next) {
            tracing::error!(%id, ?previous, ?next, "Illegal lifecycle transition");
            if cfg!(debug_assertions) {
                panic!("illegal lifecycle transition {previous:?} -> {next:?} for {id}");
            }
            return None;
        }
        instance.state = next;
        if next == LifecycleState::Completed && previous == LifecycleState::UnderConstruction {
            instance.progress = Fixed::ONE;
        }
        Some(previous)
    }

    /// Record construction progress, clamped to `[0, 1]`.
    pub(crate) fn set_progress(&mut self, id: InstanceId, progress: Fixed) -> bool {
        match self.instances.get_mut(&id) {
            Some(instance) => {
                instance.progress = progress.clamp(Fixed::ZERO, Fixed::ONE);
                true
            }
            None => false,
        }
    }

    /// Attach a behavior to an instance.
    pub(crate) fn attach_behavior(&mut self, id: InstanceId, behavior: BuildingBehavior) {
        if let Some(instance) = self.instances.get_mut(&id) {
            instance.behavior = Some(behavior);
        }
    }

    /// Mutable access to every instance's behavior, in id order.
    pub(crate) fn behaviors_mut(
        &mut self,
    ) -> impl Iterator<Item = (InstanceId, LifecycleState, &mut BuildingBehavior)> {
        self.instances
            .values_mut()
            .filter_map(|i| i.behavior.as_mut().map(|b| (i.id, i.state, b)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn hut() -> BuildingDefinition {
        BuildingDefinition::new("hut", "Hut", Footprint::new(2, 1), Fixed::from_num(5))
    }

    fn register_hut(registry: &mut BuildingRegistry, x: i32) -> InstanceId {
        registry.register(BuildingHandle::new(0), &hut(), CellCoord::new(x, 0), Rotation::Deg0)
    }

    #[test]
    fn test_register_starts_under_construction() {
        let mut registry = BuildingRegistry::new();
        let id = register_hut(&mut registry, 0);

        let info = registry.get(id).unwrap();
        assert_eq!(info.state, LifecycleState::UnderConstruction);
        assert_eq!(info.progress, Fixed::ZERO);
        assert_eq!(info.definition, DefinitionId::from("hut"));
        assert!(info.behavior.is_none());
    }

    #[test]
    fn test_register_stores_rotated_footprint() {
        let mut registry = BuildingRegistry::new();
        let id = registry.register(BuildingHandle::new(0), &hut(), CellCoord::new(0, 0), Rotation::Deg90);
        assert_eq!(registry.get(id).unwrap().footprint, Footprint::new(1, 2));
    }

    #[test]
    fn test_ids_are_unique_and_ordered() {
        let mut registry = BuildingRegistry::new();
        let a = register_hut(&mut registry, 0);
        let b = register_hut(&mut registry, 3);
        registry.unregister(a);
        let c = register_hut(&mut registry, 6);

        assert!(a < b && b < c);
        assert_eq!(registry.ids().collect::<Vec<_>>(), vec![b, c]);
    }

    #[test]
    fn test_all_instances_is_restartable() {
        let mut registry = BuildingRegistry::new();
        register_hut(&mut registry, 0);
        register_hut(&mut registry, 3);

        assert_eq!(registry.all_instances().count(), 2);
        assert_eq!(registry.all_instances().count(), 2);
    }

    #[test]
    fn test_unknown_instance_is_none() {
        let mut registry = BuildingRegistry::new();
        assert!(registry.get(InstanceId::new(42)).is_none());
        assert!(registry.unregister(InstanceId::new(42)).is_none());
    }

    #[test]
    fn test_lifecycle_transitions() {
        use LifecycleState::*;
        assert!(UnderConstruction.can_transition_to(Completed));
        assert!(Completed.can_transition_to(Damaged));
        assert!(Damaged.can_transition_to(Completed));
        assert!(UnderConstruction.can_transition_to(Destroyed));
        assert!(!UnderConstruction.can_transition_to(Damaged));
        assert!(!Completed.can_transition_to(UnderConstruction));
        assert!(!Destroyed.can_transition_to(Completed));
        assert!(!Destroyed.can_transition_to(Destroyed));
    }

    #[test]
    fn test_set_state_completes_progress() {
        let mut registry = BuildingRegistry::new();
        let id = register_hut(&mut registry, 0);

        assert_eq!(
            registry.set_state(id, LifecycleState::Completed),
            Some(LifecycleState::UnderConstruction)
        );
        assert_eq!(registry.get(id).unwrap().progress, Fixed::ONE);
        assert!(registry.has_operational(&"hut".into()));
    }

    #[test]
    #[cfg(debug_assertions)]
    #[should_panic(expected = "illegal lifecycle transition")]
    fn test_illegal_transition_panics_in_debug() {
        let mut registry = BuildingRegistry::new();
        let id = register_hut(&mut registry, 0);
        registry.set_state(id, LifecycleState::Damaged);
    }

    #[test]
    fn test_set_progress_clamps() {
        let mut registry = BuildingRegistry::new();
        let id = register_hut(&mut registry, 0);

        registry.set_progress(id, Fixed::from_num(3));
        assert_eq!(registry.get(id).unwrap().progress, Fixed::ONE);
        registry.set_progress(id, Fixed::from_num(-1));
        assert_eq!(registry.get(id).unwrap().progress, Fixed::ZERO);
        assert!(!registry.set_progress(InstanceId::new(99), Fixed::ONE));
    }

    #[test]
    fn test_count_in_state_and_operational() {
        let mut registry = BuildingRegistry::new();
        let a = register_hut(&mut registry, 0);
        register_hut(&mut registry, 3);

        assert!(!registry.has_operational(&"hut".into()));
        registry.set_state(a, LifecycleState::Completed);
        registry.set_state(a, LifecycleState::Damaged);

        assert!(registry.has_operational(&"hut".into()));
        assert_eq!(registry.count_in_state(LifecycleState::Damaged), 1);
        assert_eq!(registry.count_in_state(LifecycleState::UnderConstruction), 1);
    }
}

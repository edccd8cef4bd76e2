//! Pooled creation of preview ghosts and building objects.
//!
//! The factory owns the engine-side objects presentation mirrors: where a
//! building or ghost sits, whether its preview is valid, and which visual
//! state it is in. Recycled objects go back to a per-definition pool and are
//! handed out again on the next create. Pools are bounded; objects recycled
//! into a full pool are dropped.

use std::collections::{BTreeMap, HashMap};

use serde::{Deserialize, Serialize};

use crate::catalog::{BuildingDefinition, DefinitionId};
use crate::config::PoolConfig;
use crate::grid::{CellCoord, Footprint, Rotation};
use crate::math::Vec2Fixed;

/// Handle to a live preview ghost.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct GhostHandle(u64);

/// Handle to a live building object.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct BuildingHandle(u64);

impl BuildingHandle {
    /// Wrap a raw handle value.
    #[must_use]
    pub const fn new(raw: u64) -> Self {
        Self(raw)
    }
}

/// Visual state presentation should show for a building.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum PresentationState {
    /// Scaffolding.
    UnderConstruction,
    /// Normal.
    Active,
    /// Visibly damaged.
    Damaged,
}

/// Placement preview. Never collides.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GhostObject {
    /// Definition being previewed.
    pub definition: DefinitionId,
    /// Effective footprint under the current rotation.
    pub footprint: Footprint,
    /// World position of the footprint anchor corner.
    pub position: Vec2Fixed,
    /// Current rotation.
    pub rotation: Rotation,
    /// Whether the last validation passed.
    pub valid: bool,
}

impl GhostObject {
    /// Ghosts are purely visual.
    #[must_use]
    pub const fn collision_enabled(&self) -> bool {
        false
    }
}

/// Engine-side object for a placed building.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BuildingObject {
    /// Definition it represents.
    pub definition: DefinitionId,
    /// Anchor cell.
    pub anchor: CellCoord,
    /// World position of the footprint centre.
    pub position: Vec2Fixed,
    /// Rotation.
    pub rotation: Rotation,
    /// Visual state.
    pub presentation: PresentationState,
    /// Whether the object blocks other objects.
    pub collision_enabled: bool,
    /// Times this object has been handed out.
    pub uses: u32,
}

/// Allocation counters.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct FactoryStats {
    /// Objects created from scratch.
    pub allocated: u64,
    /// Objects taken from a pool.
    pub reused: u64,
    /// Objects returned to a pool.
    pub recycled: u64,
    /// Objects dropped because their pool was full.
    pub discarded: u64,
}

/// Creates and recycles ghosts and building objects.
#[derive(Debug, Clone)]
pub struct BuildingFactory {
    max_pool_size: usize,
    next_handle: u64,
    ghosts: BTreeMap<GhostHandle, GhostObject>,
    buildings: BTreeMap<BuildingHandle, BuildingObject>,
    ghost_pools: HashMap<DefinitionId, Vec<GhostObject>>,
    building_pools: HashMap<DefinitionId, Vec<BuildingObject>>,
    stats: FactoryStats,
}

impl Default for BuildingFactory {
    fn default() -> Self {
        Self::new(&PoolConfig::default())
    }
}

impl BuildingFactory {
    /// Create a factory with empty pools.
    #[must_use]
    pub fn new(config: &PoolConfig) -> Self {
        Self {
            max_pool_size: config.max_pool_size,
            next_handle: 0,
            ghosts: BTreeMap::new(),
            buildings: BTreeMap::new(),
            ghost_pools: HashMap::new(),
            building_pools: HashMap::new(),
            stats: FactoryStats::default(),
        }
    }

    /// Next handle value not held by a live ghost or building.
    fn next_raw(&mut self) -> u64 {
        loop {
            let raw = self.next_handle;
            self.next_handle = self.next_handle.wrapping_add(1);
            if !self.ghosts.contains_key(&GhostHandle(raw))
                && !self.buildings.contains_key(&BuildingHandle(raw))
            {
                return raw;
            }
        }
    }

    /// Take a preview ghost for `definition`, drawing from its ghost pool.
    pub fn create_ghost(&mut self, definition: &BuildingDefinition) -> GhostHandle {
        let ghost = match self.ghost_pools.get_mut(&definition.id).and_then(Vec::pop) {
            Some(mut pooled) => {
                self.stats.reused += 1;
                pooled.footprint = definition.footprint;
                pooled.position = Vec2Fixed::ZERO;
                pooled.rotation = Rotation::Deg0;
                pooled.valid = false;
                pooled
            }
            None => {
                self.stats.allocated += 1;
                GhostObject {
                    definition: definition.id.clone(),
                    footprint: definition.footprint,
                    position: Vec2Fixed::ZERO,
                    rotation: Rotation::Deg0,
                    valid: false,
                }
            }
        };
        let handle = GhostHandle(self.next_raw());
        self.ghosts.insert(handle, ghost);
        handle
    }

    /// Take a building object for `definition`, positioned and under
    /// construction with collision enabled.
    pub fn create_building(
        &mut self,
        definition: &BuildingDefinition,
        anchor: CellCoord,
        position: Vec2Fixed,
        rotation: Rotation,
    ) -> BuildingHandle {
        let mut object = match self.building_pools.get_mut(&definition.id).and_then(Vec::pop) {
            Some(pooled) => {
                self.stats.reused += 1;
                pooled
            }
            None => {
                self.stats.allocated += 1;
                Self::blank_building(definition)
            }
        };
        object.anchor = anchor;
        object.position = position;
        object.rotation = rotation;
        object.presentation = PresentationState::UnderConstruction;
        object.collision_enabled = true;
        object.uses += 1;

        let handle = BuildingHandle(self.next_raw());
        self.buildings.insert(handle, object);
        handle
    }

    fn blank_building(definition: &BuildingDefinition) -> BuildingObject {
        BuildingObject {
            definition: definition.id.clone(),
            anchor: CellCoord::default(),
            position: Vec2Fixed::ZERO,
            rotation: Rotation::Deg0,
            presentation: PresentationState::UnderConstruction,
            collision_enabled: false,
            uses: 0,
        }
    }

    /// Return a ghost to its pool. Returns `false` for unknown handles.
    pub fn recycle_ghost(&mut self, handle: GhostHandle) -> bool {
        let Some(ghost) = self.ghosts.remove(&handle) else {
            tracing::warn!(?handle, "Recycle of unknown ghost");
            return false;
        };
        let pool = self.ghost_pools.entry(ghost.definition.clone()).or_default();
        if pool.len() < self.max_pool_size {
            pool.push(ghost);
            self.stats.recycled += 1;
        } else {
            self.stats.discarded += 1;
        }
        true
    }

    /// Return a building object to its pool. Returns `false` for unknown
    /// handles.
    pub fn recycle_building(&mut self, handle: BuildingHandle) -> bool {
        let Some(mut object) = self.buildings.remove(&handle) else {
            tracing::warn!(?handle, "Recycle of unknown building object");
            return false;
        };
        object.collision_enabled = false;
        let pool = self.building_pools.entry(object.definition.clone()).or_default();
        if pool.len() < self.max_pool_size {
            pool.push(object);
            self.stats.recycled += 1;
        } else {
            self.stats.discarded += 1;
        }
        true
    }

    /// Fill the building pool for `definition` up to `count` objects, capped
    /// at the maximum pool size. Returns how many were allocated.
    pub fn prewarm(&mut self, definition: &BuildingDefinition, count: usize) -> usize {
        let target = count.min(self.max_pool_size);
        let pool = self.building_pools.entry(definition.id.clone()).or_default();
        let missing = target.saturating_sub(pool.len());
        for _ in 0..missing {
            pool.push(Self::blank_building(definition));
        }
        self.stats.allocated += missing as u64;
        missing
    }

    /// Move a ghost and record its validity.
    pub fn update_ghost(
        &mut self,
        handle: GhostHandle,
        position: Vec2Fixed,
        rotation: Rotation,
        footprint: Footprint,
        valid: bool,
    ) -> bool {
        match self.ghosts.get_mut(&handle) {
            Some(ghost) => {
                ghost.position = position;
                ghost.rotation = rotation;
                ghost.footprint = footprint;
                ghost.valid = valid;
                true
            }
            None => false,
        }
    }

    /// Change a building's visual state.
    pub fn set_presentation(&mut self, handle: BuildingHandle, state: PresentationState) -> bool {
        match self.buildings.get_mut(&handle) {
            Some(object) => {
                object.presentation = state;
                true
            }
            None => false,
        }
    }

    /// Live ghost.
    #[must_use]
    pub fn ghost(&self, handle: GhostHandle) -> Option<&GhostObject> {
        self.ghosts.get(&handle)
    }

    /// Live building object.
    #[must_use]
    pub fn building(&self, handle: BuildingHandle) -> Option<&BuildingObject> {
        self.buildings.get(&handle)
    }

    /// Number of live ghosts.
    #[must_use]
    pub fn live_ghosts(&self) -> usize {
        self.ghosts.len()
    }

    /// Number of live building objects.
    #[must_use]
    pub fn live_buildings(&self) -> usize {
        self.buildings.len()
    }

    /// Ghosts waiting in the pool for `definition`.
    #[must_use]
    pub fn pooled_ghosts(&self, definition: &DefinitionId) -> usize {
        self.ghost_pools.get(definition).map_or(0, Vec::len)
    }

    /// Building objects waiting in the pool for `definition`.
    #[must_use]
    pub fn pooled_buildings(&self, definition: &DefinitionId) -> usize {
        self.building_pools.get(definition).map_or(0, Vec::len)
    }

    /// Allocation counters.
    #[must_use]
    pub const fn stats(&self) -> FactoryStats {
        self.stats
    }
}

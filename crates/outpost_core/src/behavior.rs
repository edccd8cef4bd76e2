//! Capabilities attached to finished buildings.
//!
//! The behavior is picked from the definition's category when construction
//! completes. Only production buildings do anything over time; storage and
//! passive buildings just carry their data.

use serde::{Deserialize, Serialize};

use crate::catalog::{BuildingCategory, BuildingDefinition, ProductionOutput};
use crate::ledger::ResourceCost;
use crate::math::{fixed_serde, Fixed};

/// Periodic resource output.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProductionBehavior {
    output: ProductionOutput,
    #[serde(with = "fixed_serde")]
    elapsed: Fixed,
    cycles: u64,
}

impl ProductionBehavior {
    /// Start a fresh production timer.
    #[must_use]
    pub fn new(output: ProductionOutput) -> Self {
        Self {
            output,
            elapsed: Fixed::ZERO,
            cycles: 0,
        }
    }

    /// What is produced each cycle.
    #[must_use]
    pub const fn output(&self) -> &ProductionOutput {
        &self.output
    }

    /// Completed cycles so far.
    #[must_use]
    pub const fn cycles(&self) -> u64 {
        self.cycles
    }

    /// Advance the timer. Several cycles may complete in one long tick.
    pub fn tick(&mut self, dt: Fixed) -> Option<ResourceCost> {
        let interval = self.output.interval;
        if interval <= Fixed::ZERO || dt <= Fixed::ZERO {
            return None;
        }
        self.elapsed = self.elapsed.saturating_add(dt);
        let done = self.elapsed.saturating_div(interval).floor();
        if done < Fixed::ONE {
            return None;
        }
        // Cycles past the representable count are dropped with the backlog.
        self.elapsed %= interval;
        let done = done.saturating_to_num::<u32>();
        self.cycles += u64::from(done);
        let amount = self.output.amount.saturating_mul(done);
        let produced = ResourceCost::new().with(self.output.resource.clone(), amount);
        (!produced.is_empty()).then_some(produced)
    }
}

/// Extra storage capacity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct StorageBehavior {
    /// Units of storage provided.
    pub capacity: u32,
}

/// Capability of a finished building.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum BuildingBehavior {
    /// Produces resources over time.
    Production(ProductionBehavior),
    /// Provides storage.
    Storage(StorageBehavior),
    /// Does nothing over time.
    Passive,
}

impl BuildingBehavior {
    /// Pick the behavior for a definition's category.
    #[must_use]
    pub fn for_definition(definition: &BuildingDefinition) -> Self {
        match (definition.category, &definition.production) {
            (BuildingCategory::Production, Some(output)) => {
                Self::Production(ProductionBehavior::new(output.clone()))
            }
            (BuildingCategory::Storage, _) => Self::Storage(StorageBehavior {
                capacity: definition.storage_capacity.unwrap_or(0),
            }),
            _ => Self::Passive,
        }
    }

    /// Advance by `dt` seconds, returning anything produced.
    pub fn tick(&mut self, dt: Fixed) -> Option<ResourceCost> {
        match self {
            Self::Production(production) => production.tick(dt),
            Self::Storage(_) | Self::Passive => None,
        }
    }

    /// Storage capacity provided, zero for non-storage buildings.
    #[must_use]
    pub const fn storage_capacity(&self) -> u32 {
        match self {
            Self::Storage(storage) => storage.capacity,
            _ => 0,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::grid::Footprint;

    fn fixed(n: i32) -> Fixed {
        Fixed::from_num(n)
    }

    fn sawmill() -> BuildingDefinition {
        BuildingDefinition::new("sawmill", "Sawmill", Footprint::square(2), fixed(10))
            .with_production("planks", 5, fixed(4))
    }

    #[test]
    fn test_behavior_by_category() {
        assert!(matches!(
            BuildingBehavior::for_definition(&sawmill()),
            BuildingBehavior::Production(_)
        ));

        let depot = BuildingDefinition::new("depot", "Depot", Footprint::square(2), fixed(5))
            .with_storage(300);
        assert_eq!(BuildingBehavior::for_definition(&depot).storage_capacity(), 300);

        let statue = BuildingDefinition::new("statue", "Statue", Footprint::square(1), fixed(1));
        assert_eq!(BuildingBehavior::for_definition(&statue), BuildingBehavior::Passive);
    }

    #[test]
    fn test_production_without_output_is_passive() {
        let def = BuildingDefinition::new("mill", "Mill", Footprint::square(1), fixed(1))
            .with_category(BuildingCategory::Production);
        assert_eq!(BuildingBehavior::for_definition(&def), BuildingBehavior::Passive);
    }

    #[test]
    fn test_production_cycles() {
        let mut behavior = BuildingBehavior::for_definition(&sawmill());

        assert_eq!(behavior.tick(fixed(3)), None);
        let produced = behavior.tick(fixed(1)).unwrap();
        assert_eq!(produced.get(&"planks".into()), 5);
        assert_eq!(behavior.tick(fixed(2)), None);
    }

    #[test]
    fn test_long_tick_completes_several_cycles() {
        let mut behavior = BuildingBehavior::for_definition(&sawmill());

        let produced = behavior.tick(fixed(9)).unwrap();
        assert_eq!(produced.get(&"planks".into()), 10);

        // One second carried over from the long tick
        assert!(behavior.tick(fixed(3)).is_some());
        if let BuildingBehavior::Production(p) = &behavior {
            assert_eq!(p.cycles(), 3);
        }
    }

    #[test]
    fn test_tiny_interval_saturates_instead_of_overflowing() {
        let def = BuildingDefinition::new("press", "Press", Footprint::square(1), fixed(1))
            .with_production("planks", 1, Fixed::from_bits(1));
        assert!(def.problems().is_empty());
        let mut behavior = BuildingBehavior::for_definition(&def);

        let produced = behavior.tick(Fixed::ONE).unwrap();
        assert_eq!(produced.get(&"planks".into()), 2_147_483_647);
        assert!(behavior.tick(Fixed::MAX).is_some());
        if let BuildingBehavior::Production(p) = &behavior {
            assert_eq!(p.cycles(), 2 * 2_147_483_647);
        }
    }

    #[test]
    fn test_passive_never_produces() {
        let mut behavior = BuildingBehavior::Passive;
        assert_eq!(behavior.tick(fixed(1_000)), None);
    }
}

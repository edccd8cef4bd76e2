//! Building definitions and the content catalog.
//!
//! Definitions are immutable once loaded. The catalog parses RON text but
//! performs no IO; reading files is left to the host.
//!
//! # Example RON
//!
//! ```ron
//! (
//!     definitions: [
//!         (
//!             id: "sawmill",
//!             name: "Sawmill",
//!             footprint: (width: 2, height: 3),
//!             cost: { "wood": 100, "stone": 20 },
//!             build_time: 10.0,
//!             category: Production,
//!             production: Some((resource: "planks", amount: 5, interval: 4.0)),
//!         ),
//!     ],
//! )
//! ```

use std::collections::{BTreeSet, HashMap};
use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::{EngineError, Result};
use crate::grid::Footprint;
use crate::ledger::{ResourceCost, ResourceId};
use crate::math::{fixed_serde, Fixed};

/// Stable identifier of a building definition.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct DefinitionId(String);

impl DefinitionId {
    /// Create a definition id.
    #[must_use]
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// The id as text.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<&str> for DefinitionId {
    fn from(id: &str) -> Self {
        Self::new(id)
    }
}

impl fmt::Display for DefinitionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Broad role of a building, used to pick its behavior on completion.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum BuildingCategory {
    /// Periodically produces a resource.
    Production,
    /// Adds storage capacity.
    Storage,
    /// Purely cosmetic.
    #[default]
    Decoration,
    /// Walls, towers and the like.
    Defense,
    /// Houses population.
    Housing,
    /// Anything else.
    Utility,
}

/// Conditions that must hold before a definition may be placed.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Prerequisites {
    /// Minimum player level.
    #[serde(default)]
    pub level: u32,
    /// Quests that must be complete.
    #[serde(default)]
    pub quests: Vec<String>,
    /// Definitions of which at least one operational instance must exist.
    #[serde(default)]
    pub buildings: Vec<DefinitionId>,
}

impl Prerequisites {
    /// Whether there is nothing to check.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.level == 0 && self.quests.is_empty() && self.buildings.is_empty()
    }
}

/// Periodic output of a production building.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProductionOutput {
    /// Resource produced.
    pub resource: ResourceId,
    /// Amount produced per cycle.
    pub amount: u32,
    /// Cycle length in seconds.
    #[serde(with = "fixed_serde")]
    pub interval: Fixed,
}

/// Immutable description of a building type.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BuildingDefinition {
    /// Unique id.
    pub id: DefinitionId,
    /// Display name.
    pub name: String,
    /// Unrotated size in cells.
    #[serde(default)]
    pub footprint: Footprint,
    /// Resources debited on placement.
    #[serde(default)]
    pub cost: ResourceCost,
    /// Construction duration in seconds.
    #[serde(with = "fixed_serde")]
    pub build_time: Fixed,
    /// Role of the building.
    #[serde(default)]
    pub category: BuildingCategory,
    /// Whether demolition is allowed.
    #[serde(default = "default_true")]
    pub destructible: bool,
    /// Whether the footprint may be rotated during placement.
    #[serde(default = "default_true")]
    pub rotation_allowed: bool,
    /// Placement prerequisites.
    #[serde(default)]
    pub prerequisites: Prerequisites,
    /// Output for production buildings.
    #[serde(default)]
    pub production: Option<ProductionOutput>,
    /// Capacity for storage buildings.
    #[serde(default)]
    pub storage_capacity: Option<u32>,
}

const fn default_true() -> bool {
    true
}

impl BuildingDefinition {
    /// Create a definition with no cost and no prerequisites.
    #[must_use]
    pub fn new(
        id: impl Into<String>,
        name: impl Into<String>,
        footprint: Footprint,
        build_time: Fixed,
    ) -> Self {
        Self {
            id: DefinitionId::new(id),
            name: name.into(),
            footprint,
            cost: ResourceCost::new(),
            build_time,
            category: BuildingCategory::default(),
            destructible: true,
            rotation_allowed: true,
            prerequisites: Prerequisites::default(),
            production: None,
            storage_capacity: None,
        }
    }

    /// Set the placement cost.
    #[must_use]
    pub fn with_cost(mut self, cost: ResourceCost) -> Self {
        self.cost = cost;
        self
    }

    /// Set the category.
    #[must_use]
    pub fn with_category(mut self, category: BuildingCategory) -> Self {
        self.category = category;
        self
    }

    /// Set the prerequisites.
    #[must_use]
    pub fn with_prerequisites(mut self, prerequisites: Prerequisites) -> Self {
        self.prerequisites = prerequisites;
        self
    }

    /// Make this a production building.
    #[must_use]
    pub fn with_production(mut self, resource: impl Into<ResourceId>, amount: u32, interval: Fixed) -> Self {
        self.category = BuildingCategory::Production;
        self.production = Some(ProductionOutput {
            resource: resource.into(),
            amount,
            interval,
        });
        self
    }

    /// Make this a storage building.
    #[must_use]
    pub fn with_storage(mut self, capacity: u32) -> Self {
        self.category = BuildingCategory::Storage;
        self.storage_capacity = Some(capacity);
        self
    }

    /// Forbid demolition.
    #[must_use]
    pub fn indestructible(mut self) -> Self {
        self.destructible = false;
        self
    }

    /// Forbid rotation.
    #[must_use]
    pub fn without_rotation(mut self) -> Self {
        self.rotation_allowed = false;
        self
    }

    /// Content problems with this definition in isolation.
    #[must_use]
    pub fn problems(&self) -> Vec<String> {
        let mut problems = Vec::new();
        if self.id.as_str().is_empty() {
            problems.push("definition has an empty id".to_string());
        }
        if self.footprint.width == 0 || self.footprint.height == 0 {
            problems.push(format!("{}: footprint must be at least 1x1", self.id));
        }
        if self.build_time < Fixed::ZERO {
            problems.push(format!("{}: build_time must not be negative", self.id));
        }
        if let Some(production) = &self.production {
            if production.interval <= Fixed::ZERO {
                problems.push(format!("{}: production interval must be positive", self.id));
            }
        }
        if self.prerequisites.buildings.contains(&self.id) {
            problems.push(format!("{}: requires itself", self.id));
        }
        problems
    }
}

/// On-disk shape of a catalog.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
struct CatalogFile {
    definitions: Vec<BuildingDefinition>,
}

/// All building definitions known to a session.
#[derive(Debug, Clone, Default)]
pub struct BuildingCatalog {
    definitions: HashMap<DefinitionId, BuildingDefinition>,
}

impl BuildingCatalog {
    /// Create an empty catalog.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Parse and validate a catalog from RON text.
    pub fn from_ron_str(text: &str) -> Result<Self> {
        let file: CatalogFile = ron::from_str(text)?;
        let mut catalog = Self::new();
        for definition in file.definitions {
            catalog.insert(definition)?;
        }
        let problems = catalog.problems();
        if !problems.is_empty() {
            return Err(EngineError::InvalidCatalog(problems));
        }
        tracing::debug!(definitions = catalog.len(), "Loaded building catalog");
        Ok(catalog)
    }

    /// Serialize the catalog back to RON, definitions sorted by id.
    pub fn to_ron_string(&self) -> std::result::Result<String, ron::Error> {
        let file = CatalogFile {
            definitions: self.iter().cloned().collect(),
        };
        ron::ser::to_string_pretty(&file, ron::ser::PrettyConfig::default())
    }

    /// Add a definition. Ids must be unique.
    pub fn insert(&mut self, definition: BuildingDefinition) -> Result<()> {
        if self.definitions.contains_key(&definition.id) {
            return Err(EngineError::DuplicateDefinition(definition.id));
        }
        self.definitions.insert(definition.id.clone(), definition);
        Ok(())
    }

    /// Builder-style insert for tests and fixtures; later duplicates replace
    /// earlier ones.
    #[must_use]
    pub fn with(mut self, definition: BuildingDefinition) -> Self {
        self.definitions.insert(definition.id.clone(), definition);
        self
    }

    /// Look up a definition.
    #[must_use]
    pub fn get(&self, id: &DefinitionId) -> Option<&BuildingDefinition> {
        self.definitions.get(id)
    }

    /// Whether a definition exists.
    #[must_use]
    pub fn contains(&self, id: &DefinitionId) -> bool {
        self.definitions.contains_key(id)
    }

    /// Number of definitions.
    #[must_use]
    pub fn len(&self) -> usize {
        self.definitions.len()
    }

    /// Whether the catalog is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.definitions.is_empty()
    }

    /// Definitions sorted by id.
    pub fn iter(&self) -> impl Iterator<Item = &BuildingDefinition> {
        let mut defs: Vec<&BuildingDefinition> = self.definitions.values().collect();
        defs.sort_by(|a, b| a.id.cmp(&b.id));
        defs.into_iter()
    }

    /// Content problems across the whole catalog, sorted.
    #[must_use]
    pub fn problems(&self) -> Vec<String> {
        let mut problems: BTreeSet<String> = BTreeSet::new();
        for definition in self.definitions.values() {
            problems.extend(definition.problems());
            for required in &definition.prerequisites.buildings {
                if !self.contains(required) {
                    problems.insert(format!(
                        "{}: requires unknown building {required}",
                        definition.id
                    ));
                }
            }
        }
        problems.into_iter().collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE: &str = r#"
        (
            definitions: [
                (
                    id: "sawmill",
                    name: "Sawmill",
                    footprint: (width: 2, height: 3),
                    cost: { "wood": 100, "stone": 20 },
                    build_time: 10.0,
                    category: Production,
                    production: Some((resource: "planks", amount: 5, interval: 4.0)),
                ),
                (
                    id: "statue",
                    name: "Statue",
                    build_time: 2.5,
                    rotation_allowed: false,
                    prerequisites: (level: 3, buildings: ["sawmill"]),
                ),
            ],
        )
    "#;

    #[test]
    fn test_parse_catalog() {
        let catalog = BuildingCatalog::from_ron_str(SAMPLE).unwrap();
        assert_eq!(catalog.len(), 2);

        let sawmill = catalog.get(&"sawmill".into()).unwrap();
        assert_eq!(sawmill.footprint, Footprint::new(2, 3));
        assert_eq!(sawmill.cost.get(&"wood".into()), 100);
        assert_eq!(sawmill.build_time, Fixed::from_num(10));
        assert_eq!(sawmill.category, BuildingCategory::Production);
        assert!(sawmill.destructible);
        assert!(sawmill.rotation_allowed);
        assert_eq!(sawmill.production.as_ref().unwrap().amount, 5);
    }

    #[test]
    fn test_parse_defaults() {
        let catalog = BuildingCatalog::from_ron_str(SAMPLE).unwrap();
        let statue = catalog.get(&"statue".into()).unwrap();

        assert_eq!(statue.footprint, Footprint::new(1, 1));
        assert!(statue.cost.is_empty());
        assert_eq!(statue.build_time, Fixed::from_num(2.5));
        assert_eq!(statue.category, BuildingCategory::Decoration);
        assert!(!statue.rotation_allowed);
        assert_eq!(statue.prerequisites.level, 3);
        assert_eq!(statue.prerequisites.buildings, vec![DefinitionId::from("sawmill")]);
    }

    #[test]
    fn test_duplicate_id_rejected() {
        let text = r#"(definitions: [
            (id: "hut", name: "Hut", build_time: 1.0),
            (id: "hut", name: "Hut again", build_time: 1.0),
        ])"#;
        let result = BuildingCatalog::from_ron_str(text);
        assert!(matches!(result, Err(EngineError::DuplicateDefinition(id)) if id.as_str() == "hut"));
    }

    #[test]
    fn test_unknown_prerequisite_rejected() {
        let text = r#"(definitions: [
            (id: "hut", name: "Hut", build_time: 1.0, prerequisites: (buildings: ["castle"])),
        ])"#;
        match BuildingCatalog::from_ron_str(text) {
            Err(EngineError::InvalidCatalog(problems)) => {
                assert_eq!(problems, vec!["hut: requires unknown building castle".to_string()]);
            }
            other => panic!("expected InvalidCatalog, got {other:?}"),
        }
    }

    #[test]
    fn test_definition_problems() {
        let bad = BuildingDefinition::new("wall", "Wall", Footprint::new(0, 1), Fixed::from_num(-1));
        let problems = bad.problems();
        assert_eq!(problems.len(), 2);
        assert!(problems.iter().any(|p| p.contains("footprint")));
        assert!(problems.iter().any(|p| p.contains("build_time")));
    }

    #[test]
    fn test_malformed_ron() {
        let result = BuildingCatalog::from_ron_str("(definitions: [ (id: ");
        assert!(matches!(result, Err(EngineError::CatalogParse(_))));
    }

    #[test]
    fn test_catalog_round_trip_through_ron() {
        let catalog = BuildingCatalog::from_ron_str(SAMPLE).unwrap();
        let text = catalog.to_ron_string().unwrap();
        let again = BuildingCatalog::from_ron_str(&text).unwrap();
        assert_eq!(
            again.get(&"sawmill".into()),
            catalog.get(&"sawmill".into())
        );
    }

    #[test]
    fn test_builder_helpers() {
        let def = BuildingDefinition::new("depot", "Depot", Footprint::square(2), Fixed::from_num(5))
            .with_storage(200)
            .indestructible()
            .without_rotation();
        assert_eq!(def.category, BuildingCategory::Storage);
        assert_eq!(def.storage_capacity, Some(200));
        assert!(!def.destructible);
        assert!(!def.rotation_allowed);
        assert!(def.problems().is_empty());
    }
}

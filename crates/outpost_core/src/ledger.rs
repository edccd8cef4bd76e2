//! Resource ledger interface.
//!
//! The engine never owns resource balances. It asks a [`ResourceLedger`]
//! whether a cost is affordable, debits it on placement, and credits refunds
//! and production output back. [`Stockpile`] is a plain in-memory ledger for
//! hosts without an inventory of their own, and for tests.

use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};

/// Name of a resource, e.g. `"wood"`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ResourceId(String);

impl ResourceId {
    /// Create a resource id.
    #[must_use]
    pub fn new(name: impl Into<String>) -> Self {
        Self(name.into())
    }

    /// The resource name.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<&str> for ResourceId {
    fn from(name: &str) -> Self {
        Self::new(name)
    }
}

impl fmt::Display for ResourceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// A bundle of resource amounts, kept in resource-name order.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ResourceCost(BTreeMap<ResourceId, u32>);

impl ResourceCost {
    /// Empty cost.
    #[must_use]
    pub fn new() -> Self {
        Self(BTreeMap::new())
    }

    /// Add `amount` of `resource` to this bundle.
    #[must_use]
    pub fn with(mut self, resource: impl Into<ResourceId>, amount: u32) -> Self {
        self.add(resource.into(), amount);
        self
    }

    /// Add `amount` of `resource` in place.
    pub fn add(&mut self, resource: ResourceId, amount: u32) {
        if amount == 0 {
            return;
        }
        let entry = self.0.entry(resource).or_insert(0);
        *entry = entry.saturating_add(amount);
    }

    /// Amount of a single resource, zero if absent.
    #[must_use]
    pub fn get(&self, resource: &ResourceId) -> u32 {
        self.0.get(resource).copied().unwrap_or(0)
    }

    /// Whether the bundle holds nothing.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Iterate `(resource, amount)` pairs in resource-name order.
    pub fn iter(&self) -> impl Iterator<Item = (&ResourceId, u32)> {
        self.0.iter().map(|(id, amount)| (id, *amount))
    }

    /// A percentage of this bundle, rounded down per resource.
    ///
    /// Resources that round to zero are dropped.
    #[must_use]
    pub fn scaled_percent(&self, percent: u32) -> Self {
        let mut scaled = Self::new();
        for (id, amount) in self.iter() {
            let part = u64::from(amount) * u64::from(percent) / 100;
            scaled.add(id.clone(), u32::try_from(part).unwrap_or(u32::MAX));
        }
        scaled
    }
}

impl fmt::Display for ResourceCost {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_empty() {
            return f.write_str("nothing");
        }
        let mut first = true;
        for (id, amount) in self.iter() {
            if !first {
                f.write_str(", ")?;
            }
            write!(f, "{amount} {id}")?;
            first = false;
        }
        Ok(())
    }
}

impl<R: Into<ResourceId>> FromIterator<(R, u32)> for ResourceCost {
    fn from_iter<T: IntoIterator<Item = (R, u32)>>(iter: T) -> Self {
        let mut cost = Self::new();
        for (id, amount) in iter {
            cost.add(id.into(), amount);
        }
        cost
    }
}

/// External store of resource balances.
///
/// The engine is the only caller during a tick; implementations do not need
/// to be thread-safe.
pub trait ResourceLedger {
    /// Whether every amount in `cost` is available.
    fn has_resources(&self, cost: &ResourceCost) -> bool;

    /// Debit `cost` in full. Returns `false`, leaving balances untouched, if
    /// any amount is unavailable.
    fn consume_resources(&mut self, cost: &ResourceCost) -> bool;

    /// Credit back resources previously consumed.
    fn refund_resources(&mut self, amounts: &ResourceCost);

    /// Current balance of one resource.
    fn amount(&self, resource: &ResourceId) -> u64;

    /// Credit newly produced resources. Defaults to a refund.
    fn deposit_resources(&mut self, amounts: &ResourceCost) {
        self.refund_resources(amounts);
    }
}

/// Simple in-memory ledger.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Stockpile {
    balances: BTreeMap<ResourceId, u64>,
}

impl Stockpile {
    /// Empty stockpile.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Stockpile with an initial balance of `resource`.
    #[must_use]
    pub fn with(mut self, resource: impl Into<ResourceId>, amount: u64) -> Self {
        self.balances.insert(resource.into(), amount);
        self
    }

    /// Set a balance directly.
    pub fn set(&mut self, resource: impl Into<ResourceId>, amount: u64) {
        self.balances.insert(resource.into(), amount);
    }

    /// All balances in resource-name order.
    pub fn balances(&self) -> impl Iterator<Item = (&ResourceId, u64)> {
        self.balances.iter().map(|(id, amount)| (id, *amount))
    }
}

impl ResourceLedger for Stockpile {
    fn has_resources(&self, cost: &ResourceCost) -> bool {
        cost.iter()
            .all(|(id, amount)| self.amount(id) >= u64::from(amount))
    }

    fn consume_resources(&mut self, cost: &ResourceCost) -> bool {
        if !self.has_resources(cost) {
            return false;
        }
        for (id, amount) in cost.iter() {
            if let Some(balance) = self.balances.get_mut(id) {
                *balance -= u64::from(amount);
            }
        }
        true
    }

    fn refund_resources(&mut self, amounts: &ResourceCost) {
        for (id, amount) in amounts.iter() {
            let balance = self.balances.entry(id.clone()).or_insert(0);
            *balance = balance.saturating_add(u64::from(amount));
        }
    }

    fn amount(&self, resource: &ResourceId) -> u64 {
        self.balances.get(resource).copied().unwrap_or(0)
    }
}

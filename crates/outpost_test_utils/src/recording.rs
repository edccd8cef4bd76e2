//! Recording collaborators.
//!
//! [`RecordingLedger`] logs every ledger call so tests can assert on what
//! the engine debited and credited. [`EventLog`] captures every engine event
//! published on a bus, in order.

use std::cell::RefCell;
use std::rc::Rc;

use outpost_core::events::Event;
use outpost_core::prelude::*;

// ============================================================================
// Ledger
// ============================================================================

/// One call the engine made on a [`RecordingLedger`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LedgerCall {
    /// `has_resources`
    Has(ResourceCost),
    /// `consume_resources`, with its answer.
    Consume(ResourceCost, bool),
    /// `refund_resources`
    Refund(ResourceCost),
    /// `deposit_resources`
    Deposit(ResourceCost),
}

/// A [`Stockpile`] that records every call made on it.
#[derive(Debug, Default)]
pub struct RecordingLedger {
    inner: Stockpile,
    calls: RefCell<Vec<LedgerCall>>,
    refuse_consume: bool,
}

impl RecordingLedger {
    /// Wrap a stockpile.
    #[must_use]
    pub fn new(inner: Stockpile) -> Self {
        Self {
            inner,
            calls: RefCell::new(Vec::new()),
            refuse_consume: false,
        }
    }

    /// Answer `has_resources` truthfully but refuse every debit, as a ledger
    /// drained by someone else between check and commit would.
    #[must_use]
    pub fn refusing_consume(mut self) -> Self {
        self.refuse_consume = true;
        self
    }

    /// Every call so far, oldest first.
    #[must_use]
    pub fn calls(&self) -> Vec<LedgerCall> {
        self.calls.borrow().clone()
    }

    /// Only the calls that changed balances (successful consumes, refunds,
    /// deposits).
    #[must_use]
    pub fn mutations(&self) -> Vec<LedgerCall> {
        self.calls
            .borrow()
            .iter()
            .filter(|call| !matches!(call, LedgerCall::Has(_) | LedgerCall::Consume(_, false)))
            .cloned()
            .collect()
    }

    /// Refunds in call order.
    #[must_use]
    pub fn refunds(&self) -> Vec<ResourceCost> {
        self.calls
            .borrow()
            .iter()
            .filter_map(|call| match call {
                LedgerCall::Refund(amounts) => Some(amounts.clone()),
                _ => None,
            })
            .collect()
    }

    /// Forget recorded calls.
    pub fn clear(&self) {
        self.calls.borrow_mut().clear();
    }

    /// Wrapped stockpile.
    #[must_use]
    pub const fn stockpile(&self) -> &Stockpile {
        &self.inner
    }

    fn record(&self, call: LedgerCall) {
        self.calls.borrow_mut().push(call);
    }
}

impl ResourceLedger for RecordingLedger {
    fn has_resources(&self, cost: &ResourceCost) -> bool {
        self.record(LedgerCall::Has(cost.clone()));
        self.inner.has_resources(cost)
    }

    fn consume_resources(&mut self, cost: &ResourceCost) -> bool {
        let ok = !self.refuse_consume && self.inner.consume_resources(cost);
        self.record(LedgerCall::Consume(cost.clone(), ok));
        ok
    }

    fn refund_resources(&mut self, amounts: &ResourceCost) {
        self.record(LedgerCall::Refund(amounts.clone()));
        self.inner.refund_resources(amounts);
    }

    fn amount(&self, resource: &ResourceId) -> u64 {
        self.inner.amount(resource)
    }

    fn deposit_resources(&mut self, amounts: &ResourceCost) {
        self.record(LedgerCall::Deposit(amounts.clone()));
        self.inner.deposit_resources(amounts);
    }
}

// ============================================================================
// Events
// ============================================================================

/// Any engine event, as captured by an [`EventLog`].
#[derive(Debug, Clone, PartialEq)]
#[allow(missing_docs)]
pub enum RecordedEvent {
    PlacementStarted(PlacementStarted),
    PreviewUpdated(PreviewUpdated),
    Placed(Placed),
    PlacementCancelled(PlacementCancelled),
    ConstructionStarted(ConstructionStarted),
    ConstructionCompleted(ConstructionCompleted),
    Destroyed(Destroyed),
    Selected(Selected),
    ValidationFailed(ValidationFailed),
    DemolitionRefused(DemolitionRefused),
    ResourcesProduced(ResourcesProduced),
    LifecycleChanged(LifecycleChanged),
}

impl RecordedEvent {
    /// Short event name, for compact assertions.
    #[must_use]
    pub const fn name(&self) -> &'static str {
        match self {
            Self::PlacementStarted(_) => "PlacementStarted",
            Self::PreviewUpdated(_) => "PreviewUpdated",
            Self::Placed(_) => "Placed",
            Self::PlacementCancelled(_) => "PlacementCancelled",
            Self::ConstructionStarted(_) => "ConstructionStarted",
            Self::ConstructionCompleted(_) => "ConstructionCompleted",
            Self::Destroyed(_) => "Destroyed",
            Self::Selected(_) => "Selected",
            Self::ValidationFailed(_) => "ValidationFailed",
            Self::DemolitionRefused(_) => "DemolitionRefused",
            Self::ResourcesProduced(_) => "ResourcesProduced",
            Self::LifecycleChanged(_) => "LifecycleChanged",
        }
    }
}

/// Ordered capture of everything published on a bus.
#[derive(Debug, Clone, Default)]
pub struct EventLog {
    events: Rc<RefCell<Vec<RecordedEvent>>>,
}

impl EventLog {
    /// Subscribe to every engine event on `bus`.
    #[must_use]
    pub fn attach(bus: &EventBus) -> Self {
        let log = Self::default();
        log.record(bus, RecordedEvent::PlacementStarted);
        log.record(bus, RecordedEvent::PreviewUpdated);
        log.record(bus, RecordedEvent::Placed);
        log.record(bus, RecordedEvent::PlacementCancelled);
        log.record(bus, RecordedEvent::ConstructionStarted);
        log.record(bus, RecordedEvent::ConstructionCompleted);
        log.record(bus, RecordedEvent::Destroyed);
        log.record(bus, RecordedEvent::Selected);
        log.record(bus, RecordedEvent::ValidationFailed);
        log.record(bus, RecordedEvent::DemolitionRefused);
        log.record(bus, RecordedEvent::ResourcesProduced);
        log.record(bus, RecordedEvent::LifecycleChanged);
        log
    }

    fn record<E: Event + Clone>(&self, bus: &EventBus, wrap: fn(E) -> RecordedEvent) {
        let sink = Rc::clone(&self.events);
        bus.subscribe(move |event: &E| sink.borrow_mut().push(wrap(event.clone())));
    }

    /// Everything captured so far.
    #[must_use]
    pub fn events(&self) -> Vec<RecordedEvent> {
        self.events.borrow().clone()
    }

    /// Event names in publish order, preview updates excluded.
    #[must_use]
    pub fn names(&self) -> Vec<&'static str> {
        self.events
            .borrow()
            .iter()
            .filter(|event| !matches!(event, RecordedEvent::PreviewUpdated(_)))
            .map(RecordedEvent::name)
            .collect()
    }

    /// How many events named `name` were captured.
    #[must_use]
    pub fn count(&self, name: &str) -> usize {
        self.events
            .borrow()
            .iter()
            .filter(|event| event.name() == name)
            .count()
    }

    /// Number of captured events.
    #[must_use]
    pub fn len(&self) -> usize {
        self.events.borrow().len()
    }

    /// Whether nothing was captured.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.events.borrow().is_empty()
    }

    /// Forget captured events.
    pub fn clear(&self) {
        self.events.borrow_mut().clear();
    }
}

//! Typed, synchronous publish/subscribe.
//!
//! Every engine component talks to presentation through an injected
//! [`EventBus`]. Delivery happens on the calling thread, in subscription
//! order, before `publish` returns. There is no history: a late subscriber
//! never sees earlier events.
//!
//! `publish` iterates over a snapshot of the subscriber list, so handlers may
//! subscribe or publish re-entrantly. An unsubscribe made during delivery
//! takes effect from the next publish.

use std::any::{Any, TypeId};
use std::cell::{Cell, RefCell};
use std::collections::HashMap;
use std::fmt;
use std::rc::Rc;

use crate::catalog::DefinitionId;
use crate::factory::GhostHandle;
use crate::grid::{CellCoord, Rotation};
use crate::ledger::ResourceCost;
use crate::math::Fixed;
use crate::registry::{InstanceId, LifecycleState};
use crate::validation::{PlacementError, PlacementValidationResult};

/// Marker for types that travel over the bus.
pub trait Event: fmt::Debug + 'static {}

/// Token returned by [`EventBus::subscribe`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SubscriptionId(u64);

type Handler<E> = Rc<dyn Fn(&E)>;

/// Per-type subscriber lists.
#[derive(Default)]
pub struct EventBus {
    subscribers: RefCell<HashMap<TypeId, Vec<(SubscriptionId, Box<dyn Any>)>>>,
    next_id: Cell<u64>,
}

impl fmt::Debug for EventBus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let subscribers = self.subscribers.borrow();
        f.debug_struct("EventBus")
            .field("event_types", &subscribers.len())
            .field("subscriptions", &subscribers.values().map(Vec::len).sum::<usize>())
            .finish()
    }
}

impl EventBus {
    /// Create a bus with no subscribers.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a handler for events of type `E`.
    pub fn subscribe<E: Event>(&self, handler: impl Fn(&E) + 'static) -> SubscriptionId {
        let id = SubscriptionId(self.next_id.get());
        self.next_id.set(id.0 + 1);
        let handler: Handler<E> = Rc::new(handler);
        self.subscribers
            .borrow_mut()
            .entry(TypeId::of::<E>())
            .or_default()
            .push((id, Box::new(handler)));
        id
    }

    /// Remove a handler. Returns `false` if it was not subscribed to `E`.
    pub fn unsubscribe<E: Event>(&self, id: SubscriptionId) -> bool {
        let mut subscribers = self.subscribers.borrow_mut();
        let Some(list) = subscribers.get_mut(&TypeId::of::<E>()) else {
            return false;
        };
        let before = list.len();
        list.retain(|(sub, _)| *sub != id);
        before != list.len()
    }

    /// Deliver `event` to every current subscriber of `E`.
    ///
    /// Returns the number of handlers invoked.
    pub fn publish<E: Event>(&self, event: E) -> usize {
        let handlers: Vec<Handler<E>> = {
            let subscribers = self.subscribers.borrow();
            subscribers
                .get(&TypeId::of::<E>())
                .map(|list| {
                    list.iter()
                        .filter_map(|(_, boxed)| boxed.downcast_ref::<Handler<E>>().cloned())
                        .collect()
                })
                .unwrap_or_default()
        };
        tracing::trace!(?event, handlers = handlers.len(), "Publishing event");
        for handler in &handlers {
            handler(&event);
        }
        handlers.len()
    }

    /// Number of handlers subscribed to `E`.
    #[must_use]
    pub fn subscriber_count<E: Event>(&self) -> usize {
        self.subscribers
            .borrow()
            .get(&TypeId::of::<E>())
            .map_or(0, Vec::len)
    }
}

// ============================================================================
// Engine Events
// ============================================================================

/// A placement session began.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlacementStarted {
    /// Definition being placed.
    pub definition: DefinitionId,
    /// Preview object.
    pub ghost: GhostHandle,
}

/// The preview moved, rotated, or changed validity.
#[derive(Debug, Clone, PartialEq)]
pub struct PreviewUpdated {
    /// Definition being placed.
    pub definition: DefinitionId,
    /// Anchor cell under the pointer.
    pub cell: CellCoord,
    /// Current rotation.
    pub rotation: Rotation,
    /// Validation outcome at this cell.
    pub result: PlacementValidationResult,
}

/// A building was committed to the grid.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Placed {
    /// New instance.
    pub instance: InstanceId,
    /// Its definition.
    pub definition: DefinitionId,
    /// Anchor cell.
    pub anchor: CellCoord,
    /// Rotation.
    pub rotation: Rotation,
    /// Resources debited.
    pub cost: ResourceCost,
}

/// A placement session ended without placing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlacementCancelled {
    /// Definition that was being placed.
    pub definition: DefinitionId,
}

/// Construction of an instance began.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConstructionStarted {
    /// Instance under construction.
    pub instance: InstanceId,
    /// Duration in seconds.
    pub duration: Fixed,
}

/// Construction of an instance finished. Published once per instance.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConstructionCompleted {
    /// Finished instance.
    pub instance: InstanceId,
    /// Its definition.
    pub definition: DefinitionId,
}

/// An instance was demolished and removed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Destroyed {
    /// Removed instance.
    pub instance: InstanceId,
    /// Its definition.
    pub definition: DefinitionId,
    /// Anchor cell it occupied.
    pub anchor: CellCoord,
    /// Resources credited back.
    pub refund: ResourceCost,
}

/// The user clicked an existing building.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Selected {
    /// Clicked instance.
    pub instance: InstanceId,
    /// Its definition.
    pub definition: DefinitionId,
}

/// A placement confirm was rejected.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidationFailed {
    /// Definition being placed.
    pub definition: DefinitionId,
    /// Anchor cell of the attempt.
    pub cell: CellCoord,
    /// Why it failed.
    pub error: PlacementError,
}

/// Demolition targeted an indestructible building.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DemolitionRefused {
    /// Targeted instance.
    pub instance: InstanceId,
    /// Its definition.
    pub definition: DefinitionId,
}

/// A production building delivered output to the ledger.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResourcesProduced {
    /// Producing instance.
    pub instance: InstanceId,
    /// Amounts deposited.
    pub produced: ResourceCost,
}

/// An instance moved between lifecycle states.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LifecycleChanged {
    /// Affected instance.
    pub instance: InstanceId,
    /// Previous state.
    pub from: LifecycleState,
    /// New state.
    pub to: LifecycleState,
}

impl Event for PlacementStarted {}
impl Event for PreviewUpdated {}
impl Event for Placed {}
impl Event for PlacementCancelled {}
impl Event for ConstructionStarted {}
impl Event for ConstructionCompleted {}
impl Event for Destroyed {}
impl Event for Selected {}
impl Event for ValidationFailed {}
impl Event for DemolitionRefused {}
impl Event for ResourcesProduced {}
impl Event for LifecycleChanged {}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Debug, Clone, PartialEq)]
    struct Ping(u32);
    impl Event for Ping {}

    #[derive(Debug)]
    struct Pong;
    impl Event for Pong {}

    fn recorder<E: Event + Clone>(bus: &EventBus) -> (SubscriptionId, Rc<RefCell<Vec<E>>>) {
        let seen = Rc::new(RefCell::new(Vec::new()));
        let sink = Rc::clone(&seen);
        let id = bus.subscribe(move |e: &E| sink.borrow_mut().push(e.clone()));
        (id, seen)
    }

    #[test]
    fn test_publish_reaches_subscribers_in_order() {
        let bus = EventBus::new();
        let order = Rc::new(RefCell::new(Vec::new()));
        for tag in ["first", "second"] {
            let order = Rc::clone(&order);
            bus.subscribe(move |_: &Ping| order.borrow_mut().push(tag));
        }

        assert_eq!(bus.publish(Ping(1)), 2);
        assert_eq!(*order.borrow(), vec!["first", "second"]);
    }

    #[test]
    fn test_events_are_routed_by_type() {
        let bus = EventBus::new();
        let (_, pings) = recorder::<Ping>(&bus);

        assert_eq!(bus.publish(Pong), 0);
        bus.publish(Ping(7));

        assert_eq!(*pings.borrow(), vec![Ping(7)]);
    }

    #[test]
    fn test_late_subscriber_misses_history() {
        let bus = EventBus::new();
        bus.publish(Ping(1));
        let (_, pings) = recorder::<Ping>(&bus);
        bus.publish(Ping(2));
        assert_eq!(*pings.borrow(), vec![Ping(2)]);
    }

    #[test]
    fn test_unsubscribe() {
        let bus = EventBus::new();
        let (id, pings) = recorder::<Ping>(&bus);

        assert!(bus.unsubscribe::<Ping>(id));
        assert!(!bus.unsubscribe::<Ping>(id));
        assert!(!bus.unsubscribe::<Pong>(id));
        bus.publish(Ping(3));

        assert!(pings.borrow().is_empty());
        assert_eq!(bus.subscriber_count::<Ping>(), 0);
    }

    #[test]
    fn test_reentrant_publish_from_handler() {
        let bus = Rc::new(EventBus::new());
        let (_, pings) = recorder::<Ping>(&bus);
        let inner = Rc::clone(&bus);
        bus.subscribe(move |_: &Pong| {
            inner.publish(Ping(99));
        });

        bus.publish(Pong);

        assert_eq!(*pings.borrow(), vec![Ping(99)]);
    }

    #[test]
    fn test_unsubscribe_during_delivery_applies_next_publish() {
        let bus = Rc::new(EventBus::new());
        let victim: Rc<Cell<Option<SubscriptionId>>> = Rc::new(Cell::new(None));
        let inner = Rc::clone(&bus);
        let target = Rc::clone(&victim);
        // Runs before the recorder and removes it
        bus.subscribe(move |_: &Ping| {
            if let Some(id) = target.get() {
                inner.unsubscribe::<Ping>(id);
            }
        });
        let (recorder_id, seen) = recorder::<Ping>(&bus);
        victim.set(Some(recorder_id));

        bus.publish(Ping(1));
        bus.publish(Ping(2));

        // The snapshot taken for the first publish still included the recorder
        assert_eq!(*seen.borrow(), vec![Ping(1)]);
        assert_eq!(bus.subscriber_count::<Ping>(), 1);
    }

    #[test]
    fn test_subscribe_during_delivery_applies_next_publish() {
        let bus = Rc::new(EventBus::new());
        let late = Rc::new(RefCell::new(0));
        let inner = Rc::clone(&bus);
        let counter = Rc::clone(&late);
        bus.subscribe(move |_: &Pong| {
            let counter = Rc::clone(&counter);
            inner.subscribe(move |_: &Pong| *counter.borrow_mut() += 1);
        });

        bus.publish(Pong);
        assert_eq!(*late.borrow(), 0);
        bus.publish(Pong);
        assert_eq!(*late.borrow(), 1);
    }
}

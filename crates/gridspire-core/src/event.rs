//! Typed event system with synchronous dispatch.
//!
//! Every ledger mutation publishes an [`Event`]; subscribers run immediately,
//! in subscription order, within the publishing call. There is no queue.
//!
//! # Subscriber Types
//!
//! - **Passive listeners**: read-only, used for UI updates, cache
//!   invalidation, analytics.
//! - **Reactive handlers**: return [`Reaction`]s that the state applies
//!   immediately after dispatch. This is how unlock rules cascade without
//!   re-entrant borrows of the bus.
//!
//! # Isolation
//!
//! A subscriber that panics is caught and logged; the remaining subscribers
//! still run. One bad observer cannot break a production tick.
//!
//! # Re-entrancy
//!
//! Reactions applied by the state may publish further events from within the
//! original publish call. Depth is bounded only by the call stack; handlers
//! should not construct unbounded event chains.

use crate::fixed::{Fixed64, Millis};
use crate::id::{CardId, GridPos, ResourceId};
use crate::unlock::{UnlockKind, UnlockTrigger};
use std::panic::AssertUnwindSafe;

// ---------------------------------------------------------------------------
// Event types
// ---------------------------------------------------------------------------

/// A simulation event.
#[derive(Debug, Clone, PartialEq)]
pub enum Event {
    // -- Resources --
    ResourceChanged {
        resource: ResourceId,
        /// Signed change in the settled amount.
        delta: i64,
        new_total: u64,
        /// Remaining sub-unit carry after the change.
        carry: Fixed64,
    },
    ResourceDiscovered {
        resource: ResourceId,
    },

    // -- Production --
    CardProduced {
        card: CardId,
        resource: ResourceId,
        amount: u64,
        total_produced: u64,
    },
    /// The cumulative production counter moved (manual path).
    CardProduction {
        card: CardId,
        production: u64,
    },

    // -- Manual actions --
    CardClicked {
        card: CardId,
        consumed: Vec<(ResourceId, u64)>,
        produced: Vec<(ResourceId, u64)>,
        timestamp: Millis,
    },
    ClickRateLimited {
        card: CardId,
        timestamp: Millis,
    },

    // -- Card state --
    CardPlaced {
        card: CardId,
        pos: GridPos,
    },
    CardRemoved {
        card: CardId,
    },
    CardUpgraded {
        card: CardId,
        new_tier: u32,
        automated: bool,
    },
    CardUnlocked {
        card: CardId,
        kind: UnlockKind,
        trigger: UnlockTrigger,
    },
    EfficiencyChanged {
        card: CardId,
        efficiency: Fixed64,
        bottleneck: Option<ResourceId>,
    },

    // -- Lifecycle --
    StateRestored,
    StateReset,
}

/// Discriminant tag for event types, used for subscription routing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EventKind {
    ResourceChanged,
    ResourceDiscovered,
    CardProduced,
    CardProduction,
    CardClicked,
    ClickRateLimited,
    CardPlaced,
    CardRemoved,
    CardUpgraded,
    CardUnlocked,
    EfficiencyChanged,
    StateRestored,
    StateReset,
}

/// Total number of event kinds.
const EVENT_KIND_COUNT: usize = 13;

impl Event {
    /// Get the discriminant kind for this event.
    pub fn kind(&self) -> EventKind {
        match self {
            Event::ResourceChanged { .. } => EventKind::ResourceChanged,
            Event::ResourceDiscovered { .. } => EventKind::ResourceDiscovered,
            Event::CardProduced { .. } => EventKind::CardProduced,
            Event::CardProduction { .. } => EventKind::CardProduction,
            Event::CardClicked { .. } => EventKind::CardClicked,
            Event::ClickRateLimited { .. } => EventKind::ClickRateLimited,
            Event::CardPlaced { .. } => EventKind::CardPlaced,
            Event::CardRemoved { .. } => EventKind::CardRemoved,
            Event::CardUpgraded { .. } => EventKind::CardUpgraded,
            Event::CardUnlocked { .. } => EventKind::CardUnlocked,
            Event::EfficiencyChanged { .. } => EventKind::EfficiencyChanged,
            Event::StateRestored => EventKind::StateRestored,
            Event::StateReset => EventKind::StateReset,
        }
    }
}

impl EventKind {
    /// Convert to usize index for array lookups.
    fn index(self) -> usize {
        self as usize
    }
}

// ---------------------------------------------------------------------------
// Reactions (returned by reactive handlers)
// ---------------------------------------------------------------------------

/// A follow-up mutation a reactive handler wants applied. Collected during
/// dispatch and applied by the state immediately after, within the same
/// publishing call.
#[derive(Debug, Clone, PartialEq)]
pub enum Reaction {
    /// Flip a card's unlocked flag. Idempotent at apply time: an
    /// already-unlocked target is never re-unlocked or re-notified.
    UnlockCard {
        card: CardId,
        kind: UnlockKind,
        trigger: UnlockTrigger,
    },
}

// ---------------------------------------------------------------------------
// Handlers
// ---------------------------------------------------------------------------

/// A passive listener receives events read-only.
pub type PassiveListener = Box<dyn FnMut(&Event)>;

/// A reactive handler receives an event and returns zero or more reactions.
pub type ReactiveHandler = Box<dyn FnMut(&Event) -> Vec<Reaction>>;

/// Subscriber that can be either passive or reactive.
enum Subscriber {
    Passive(PassiveListener),
    Reactive(ReactiveHandler),
}

impl std::fmt::Debug for Subscriber {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Subscriber::Passive(_) => write!(f, "Passive(<fn>)"),
            Subscriber::Reactive(_) => write!(f, "Reactive(<fn>)"),
        }
    }
}

/// Handle returned by `subscribe`; pass back to `unsubscribe`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SubscriberId(u64);

#[derive(Debug)]
struct SubscriberEntry {
    id: SubscriberId,
    subscriber: Subscriber,
}

// ---------------------------------------------------------------------------
// EventBus
// ---------------------------------------------------------------------------

/// The central event bus: subscriber lists per event kind, synchronous
/// in-order dispatch, and a pending-reaction list drained by the state.
pub struct EventBus {
    /// Subscribers indexed by event kind, in subscription order.
    subscribers: [Vec<SubscriberEntry>; EVENT_KIND_COUNT],

    /// Reactions collected from reactive handlers during dispatch.
    pending_reactions: Vec<Reaction>,

    /// Monotonically increasing id source.
    next_subscriber_id: u64,
}

impl std::fmt::Debug for EventBus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EventBus")
            .field("pending_reactions", &self.pending_reactions)
            .field("next_subscriber_id", &self.next_subscriber_id)
            .finish_non_exhaustive()
    }
}

const fn empty_subscriber_array() -> [Vec<SubscriberEntry>; EVENT_KIND_COUNT] {
    // Cannot use Default in const context, so we build it manually.
    [
        Vec::new(),
        Vec::new(),
        Vec::new(),
        Vec::new(),
        Vec::new(),
        Vec::new(),
        Vec::new(),
        Vec::new(),
        Vec::new(),
        Vec::new(),
        Vec::new(),
        Vec::new(),
        Vec::new(),
    ]
}

impl EventBus {
    pub fn new() -> Self {
        Self {
            subscribers: empty_subscriber_array(),
            pending_reactions: Vec::new(),
            next_subscriber_id: 0,
        }
    }

    fn next_id(&mut self) -> SubscriberId {
        let id = SubscriberId(self.next_subscriber_id);
        self.next_subscriber_id += 1;
        id
    }

    /// Register a passive listener for an event kind. Listeners are called
    /// in registration order during publish.
    pub fn subscribe(&mut self, kind: EventKind, listener: PassiveListener) -> SubscriberId {
        let id = self.next_id();
        self.subscribers[kind.index()].push(SubscriberEntry {
            id,
            subscriber: Subscriber::Passive(listener),
        });
        id
    }

    /// Register a reactive handler for an event kind.
    pub fn subscribe_reactive(
        &mut self,
        kind: EventKind,
        handler: ReactiveHandler,
    ) -> SubscriberId {
        let id = self.next_id();
        self.subscribers[kind.index()].push(SubscriberEntry {
            id,
            subscriber: Subscriber::Reactive(handler),
        });
        id
    }

    /// Remove a subscriber. Unsubscribing an id that is not present (or was
    /// already removed) is a no-op.
    pub fn unsubscribe(&mut self, kind: EventKind, id: SubscriberId) {
        self.subscribers[kind.index()].retain(|entry| entry.id != id);
    }

    /// Dispatch an event to all current subscribers for its kind, in
    /// subscription order. A panicking subscriber is caught and logged and
    /// does not prevent the remaining subscribers from running.
    ///
    /// Reactions from reactive handlers accumulate in the pending list;
    /// the state drains and applies them after publishing.
    pub fn publish(&mut self, event: &Event) {
        let idx = event.kind().index();
        for entry in &mut self.subscribers[idx] {
            let outcome = std::panic::catch_unwind(AssertUnwindSafe(
                || match &mut entry.subscriber {
                    Subscriber::Passive(listener) => {
                        listener(event);
                        Vec::new()
                    }
                    Subscriber::Reactive(handler) => handler(event),
                },
            ));
            match outcome {
                Ok(reactions) => self.pending_reactions.extend(reactions),
                Err(_) => {
                    tracing::error!(kind = ?event.kind(), "event subscriber panicked; continuing");
                }
            }
        }
    }

    /// Drain reactions collected from reactive handlers.
    pub fn drain_reactions(&mut self) -> Vec<Reaction> {
        std::mem::take(&mut self.pending_reactions)
    }

    /// Number of subscribers registered for a kind.
    pub fn subscriber_count(&self, kind: EventKind) -> usize {
        self.subscribers[kind.index()].len()
    }

    /// Number of reactions awaiting application.
    pub fn pending_reaction_count(&self) -> usize {
        self.pending_reactions.len()
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new()
    }
}

// ===========================================================================
// Tests
// ===========================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::RefCell;
    use std::rc::Rc;

    fn ore() -> ResourceId {
        ResourceId(0)
    }

    fn changed(total: u64) -> Event {
        Event::ResourceChanged {
            resource: ore(),
            delta: 1,
            new_total: total,
            carry: Fixed64::ZERO,
        }
    }

    // -----------------------------------------------------------------------
    // Test 1: Listeners run in subscription order
    // -----------------------------------------------------------------------
    #[test]
    fn listeners_run_in_subscription_order() {
        let mut bus = EventBus::new();
        let order = Rc::new(RefCell::new(Vec::new()));

        for label in ['A', 'B', 'C'] {
            let o = order.clone();
            bus.subscribe(
                EventKind::ResourceChanged,
                Box::new(move |_| o.borrow_mut().push(label)),
            );
        }

        bus.publish(&changed(1));
        assert_eq!(*order.borrow(), vec!['A', 'B', 'C']);
    }

    // -----------------------------------------------------------------------
    // Test 2: Dispatch is synchronous -- listener has run before publish returns
    // -----------------------------------------------------------------------
    #[test]
    fn dispatch_is_synchronous() {
        let mut bus = EventBus::new();
        let seen = Rc::new(RefCell::new(None));
        let s = seen.clone();
        bus.subscribe(
            EventKind::ResourceChanged,
            Box::new(move |event| {
                if let Event::ResourceChanged { new_total, .. } = event {
                    *s.borrow_mut() = Some(*new_total);
                }
            }),
        );

        bus.publish(&changed(7));
        assert_eq!(*seen.borrow(), Some(7));
    }

    // -----------------------------------------------------------------------
    // Test 3: Unsubscribe removes the listener; repeated unsubscribe is a no-op
    // -----------------------------------------------------------------------
    #[test]
    fn unsubscribe_is_idempotent() {
        let mut bus = EventBus::new();
        let count = Rc::new(RefCell::new(0u32));
        let c = count.clone();
        let id = bus.subscribe(
            EventKind::ResourceChanged,
            Box::new(move |_| *c.borrow_mut() += 1),
        );

        bus.publish(&changed(1));
        assert_eq!(*count.borrow(), 1);

        bus.unsubscribe(EventKind::ResourceChanged, id);
        bus.unsubscribe(EventKind::ResourceChanged, id);
        bus.publish(&changed(2));
        assert_eq!(*count.borrow(), 1);
        assert_eq!(bus.subscriber_count(EventKind::ResourceChanged), 0);
    }

    // -----------------------------------------------------------------------
    // Test 4: A panicking subscriber does not stop the remaining ones
    // -----------------------------------------------------------------------
    #[test]
    fn panicking_subscriber_is_isolated() {
        let mut bus = EventBus::new();
        let count = Rc::new(RefCell::new(0u32));

        bus.subscribe(
            EventKind::ResourceChanged,
            Box::new(|_| panic!("bad observer")),
        );
        let c = count.clone();
        bus.subscribe(
            EventKind::ResourceChanged,
            Box::new(move |_| *c.borrow_mut() += 1),
        );

        bus.publish(&changed(1));
        assert_eq!(*count.borrow(), 1);
    }

    // -----------------------------------------------------------------------
    // Test 5: Reactive handlers collect reactions; drain clears the list
    // -----------------------------------------------------------------------
    #[test]
    fn reactive_handlers_collect_reactions() {
        let mut bus = EventBus::new();
        bus.subscribe_reactive(
            EventKind::ResourceChanged,
            Box::new(|_| {
                vec![Reaction::UnlockCard {
                    card: CardId(3),
                    kind: UnlockKind::Milestone,
                    trigger: UnlockTrigger::ResourceThreshold {
                        resource: ResourceId(0),
                        threshold: 100,
                    },
                }]
            }),
        );

        bus.publish(&changed(100));
        assert_eq!(bus.pending_reaction_count(), 1);

        let reactions = bus.drain_reactions();
        assert_eq!(reactions.len(), 1);
        assert!(bus.drain_reactions().is_empty());
    }

    // -----------------------------------------------------------------------
    // Test 6: Events route only to their own kind
    // -----------------------------------------------------------------------
    #[test]
    fn events_route_by_kind() {
        let mut bus = EventBus::new();
        let count = Rc::new(RefCell::new(0u32));
        let c = count.clone();
        bus.subscribe(
            EventKind::CardRemoved,
            Box::new(move |_| *c.borrow_mut() += 1),
        );

        bus.publish(&changed(1));
        assert_eq!(*count.borrow(), 0);

        bus.publish(&Event::CardRemoved { card: CardId(0) });
        assert_eq!(*count.borrow(), 1);
    }

    // -----------------------------------------------------------------------
    // Test 7: EventKind discriminant covers all variants
    // -----------------------------------------------------------------------
    #[test]
    fn event_kind_discriminant() {
        let events = vec![
            changed(1),
            Event::ResourceDiscovered { resource: ore() },
            Event::CardProduced {
                card: CardId(0),
                resource: ore(),
                amount: 1,
                total_produced: 1,
            },
            Event::CardProduction {
                card: CardId(0),
                production: 1,
            },
            Event::CardClicked {
                card: CardId(0),
                consumed: vec![],
                produced: vec![(ore(), 1)],
                timestamp: 0,
            },
            Event::ClickRateLimited {
                card: CardId(0),
                timestamp: 0,
            },
            Event::CardPlaced {
                card: CardId(0),
                pos: GridPos { row: 0, col: 0 },
            },
            Event::CardRemoved { card: CardId(0) },
            Event::CardUpgraded {
                card: CardId(0),
                new_tier: 1,
                automated: true,
            },
            Event::CardUnlocked {
                card: CardId(1),
                kind: UnlockKind::Sequential,
                trigger: UnlockTrigger::TierReached {
                    card: CardId(0),
                    tier: 1,
                },
            },
            Event::EfficiencyChanged {
                card: CardId(0),
                efficiency: Fixed64::ONE,
                bottleneck: None,
            },
            Event::StateRestored,
            Event::StateReset,
        ];

        let kinds: Vec<EventKind> = events.iter().map(|e| e.kind()).collect();
        assert_eq!(
            kinds,
            vec![
                EventKind::ResourceChanged,
                EventKind::ResourceDiscovered,
                EventKind::CardProduced,
                EventKind::CardProduction,
                EventKind::CardClicked,
                EventKind::ClickRateLimited,
                EventKind::CardPlaced,
                EventKind::CardRemoved,
                EventKind::CardUpgraded,
                EventKind::CardUnlocked,
                EventKind::EfficiencyChanged,
                EventKind::StateRestored,
                EventKind::StateReset,
            ]
        );
    }

    // -----------------------------------------------------------------------
    // Test 8: Mixed passive and reactive subscribers on one kind
    // -----------------------------------------------------------------------
    #[test]
    fn mixed_passive_and_reactive() {
        let mut bus = EventBus::new();
        let passive_count = Rc::new(RefCell::new(0u32));

        let pc = passive_count.clone();
        bus.subscribe(
            EventKind::CardUpgraded,
            Box::new(move |_| *pc.borrow_mut() += 1),
        );
        bus.subscribe_reactive(
            EventKind::CardUpgraded,
            Box::new(|_| {
                vec![Reaction::UnlockCard {
                    card: CardId(2),
                    kind: UnlockKind::Sequential,
                    trigger: UnlockTrigger::TierReached {
                        card: CardId(0),
                        tier: 1,
                    },
                }]
            }),
        );

        bus.publish(&Event::CardUpgraded {
            card: CardId(0),
            new_tier: 1,
            automated: true,
        });

        assert_eq!(*passive_count.borrow(), 1);
        assert_eq!(bus.drain_reactions().len(), 1);
    }
}

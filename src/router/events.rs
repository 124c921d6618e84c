//! Navigation events and their bus
//!
//! Every navigation emits a `Start` event before the page is touched and, if it
//! completes, an `End` event after the content swap. Listeners registered with
//! [`EventBus::subscribe`] run synchronously inside `emit`, so a `Start` listener
//! observes the page exactly as it was before the navigation. Async consumers
//! can take a [`broadcast`] stream instead.

use crate::route::RouteKey;
use serde::Serialize;
use std::cell::{Cell, RefCell};
use std::rc::Rc;
use tokio::sync::broadcast;

/// Phase of a navigation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum NavigationPhase {
    Start,
    End,
}

/// What caused a navigation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum NavigationTrigger {
    /// An intercepted click on an in-app link
    Click,
    /// Back/forward through session history
    History,
    /// A call to `Router::go`
    Programmatic,
}

/// A `start`/`end` signal emitted around an in-app navigation
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct NavigationEvent {
    pub phase: NavigationPhase,
    pub from: Option<RouteKey>,
    pub to: RouteKey,
    pub trigger: NavigationTrigger,
}

impl NavigationEvent {
    pub fn start(from: Option<RouteKey>, to: RouteKey, trigger: NavigationTrigger) -> Self {
        Self {
            phase: NavigationPhase::Start,
            from,
            to,
            trigger,
        }
    }

    /// The matching `End` event for this navigation
    pub fn end(&self) -> Self {
        Self {
            phase: NavigationPhase::End,
            ..self.clone()
        }
    }

    pub fn is_start(&self) -> bool {
        self.phase == NavigationPhase::Start
    }

    pub fn is_end(&self) -> bool {
        self.phase == NavigationPhase::End
    }
}

/// Identifies a listener registered on an [`EventBus`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SubscriptionId(u64);

type Listener = Rc<dyn Fn(&NavigationEvent)>;

/// Publish/subscribe hub for navigation events
pub struct EventBus {
    listeners: RefCell<Vec<(SubscriptionId, Listener)>>,
    next_id: Cell<u64>,
    broadcast_tx: broadcast::Sender<NavigationEvent>,
}

impl EventBus {
    /// Create a bus whose broadcast stream buffers `capacity` events
    pub fn new(capacity: usize) -> Self {
        let (broadcast_tx, _) = broadcast::channel(capacity.max(1));
        Self {
            listeners: RefCell::new(Vec::new()),
            next_id: Cell::new(0),
            broadcast_tx,
        }
    }

    /// Register a synchronous listener
    pub fn subscribe(&self, listener: impl Fn(&NavigationEvent) + 'static) -> SubscriptionId {
        let id = SubscriptionId(self.next_id.get());
        self.next_id.set(id.0 + 1);
        self.listeners.borrow_mut().push((id, Rc::new(listener)));
        id
    }

    /// Remove a listener; returns whether it was registered
    pub fn unsubscribe(&self, id: SubscriptionId) -> bool {
        let mut listeners = self.listeners.borrow_mut();
        let before = listeners.len();
        listeners.retain(|(existing, _)| *existing != id);
        listeners.len() != before
    }

    /// Stream of events for async consumers. Slow receivers lag rather than
    /// block the bus.
    pub fn stream(&self) -> broadcast::Receiver<NavigationEvent> {
        self.broadcast_tx.subscribe()
    }

    /// Deliver an event to every listener, in registration order, then to
    /// stream receivers.
    pub fn emit(&self, event: &NavigationEvent) {
        // Snapshot so listeners may subscribe or unsubscribe while being called.
        let listeners: Vec<Listener> = self
            .listeners
            .borrow()
            .iter()
            .map(|(_, listener)| Rc::clone(listener))
            .collect();

        for listener in listeners {
            listener(event);
        }

        // No receivers is not an error.
        let _ = self.broadcast_tx.send(event.clone());
    }

    pub fn listener_count(&self) -> usize {
        self.listeners.borrow().len()
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new(64)
    }
}

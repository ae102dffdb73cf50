//! Entity lifecycle events
//!
//! Key principles:
//! - Registration system (only notify handlers interested in the event kind)
//! - Delivery in registration order, synchronously on the emitting call
//! - Isolation: a failing or panicking handler is logged and skipped, later
//!   handlers and the emitter are unaffected

use std::collections::HashMap;
use std::panic::{catch_unwind, AssertUnwindSafe};

use crate::entity::EntityId;

/// Error type handlers may return
pub type HandlerError = Box<dyn std::error::Error>;

/// Event type identification
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EventKind {
    /// An entity was added
    EntityAdded,
    /// An entity was removed
    EntityRemoved,
    /// An entity was updated in place
    EntityUpdated,
    /// A `render` call completed
    Rendered,
    /// The renderer was destroyed
    Disposed,
}

/// Event payload
#[derive(Debug, Clone, PartialEq)]
pub enum EntityEvent {
    /// An entity was added
    Added(EntityId),
    /// An entity was removed
    Removed(EntityId),
    /// An entity was updated in place
    Updated(EntityId),
    /// A `render` call completed
    Rendered {
        /// Entities successfully added
        count: usize,
        /// Wall-clock duration
        render_time_ms: f64,
    },
    /// The renderer was destroyed
    Disposed,
}

impl EntityEvent {
    /// Kind used for handler lookup
    pub const fn kind(&self) -> EventKind {
        match self {
            Self::Added(_) => EventKind::EntityAdded,
            Self::Removed(_) => EventKind::EntityRemoved,
            Self::Updated(_) => EventKind::EntityUpdated,
            Self::Rendered { .. } => EventKind::Rendered,
            Self::Disposed => EventKind::Disposed,
        }
    }
}

/// Event handler trait
pub trait EventHandler {
    /// Handle an event
    fn on_event(&mut self, event: &EntityEvent) -> Result<(), HandlerError>;
}

impl<F> EventHandler for F
where
    F: FnMut(&EntityEvent) -> Result<(), HandlerError>,
{
    fn on_event(&mut self, event: &EntityEvent) -> Result<(), HandlerError> {
        self(event)
    }
}

/// Token returned by [`EventBus::subscribe`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SubscriptionId(u64);

/// Observer lists, one per event kind
#[derive(Default)]
pub struct EventBus {
    handlers: HashMap<EventKind, Vec<(SubscriptionId, Box<dyn EventHandler>)>>,
    next_id: u64,
    failures: u64,
}

impl EventBus {
    /// Create a new empty bus
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a closure for one event kind
    pub fn subscribe<F>(&mut self, kind: EventKind, handler: F) -> SubscriptionId
    where
        F: FnMut(&EntityEvent) -> Result<(), HandlerError> + 'static,
    {
        self.subscribe_handler(kind, handler)
    }

    /// Register a handler object for one event kind
    pub fn subscribe_handler(&mut self, kind: EventKind, handler: impl EventHandler + 'static) -> SubscriptionId {
        let id = SubscriptionId(self.next_id);
        self.next_id += 1;
        self.handlers.entry(kind).or_default().push((id, Box::new(handler)));
        id
    }

    /// Remove a handler; returns whether it was registered
    pub fn unsubscribe(&mut self, id: SubscriptionId) -> bool {
        for list in self.handlers.values_mut() {
            if let Some(index) = list.iter().position(|(sub, _)| *sub == id) {
                list.remove(index);
                return true;
            }
        }
        false
    }

    /// Deliver an event to every handler of its kind
    pub fn emit(&mut self, event: &EntityEvent) {
        let Some(list) = self.handlers.get_mut(&event.kind()) else {
            return;
        };
        for (id, handler) in list.iter_mut() {
            match catch_unwind(AssertUnwindSafe(|| handler.on_event(event))) {
                Ok(Ok(())) => {}
                Ok(Err(e)) => {
                    self.failures += 1;
                    log::error!("Event handler {:?} failed on {:?}: {}", id, event.kind(), e);
                }
                Err(_) => {
                    self.failures += 1;
                    log::error!("Event handler {:?} panicked on {:?}", id, event.kind());
                }
            }
        }
    }

    /// Number of handlers registered for a kind
    pub fn handler_count(&self, kind: EventKind) -> usize {
        self.handlers.get(&kind).map_or(0, Vec::len)
    }

    /// Handler failures observed so far
    pub const fn failure_count(&self) -> u64 {
        self.failures
    }

    /// Drop every handler
    pub fn clear(&mut self) {
        self.handlers.clear();
    }
}

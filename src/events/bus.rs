//! # Broadcast bus for lifecycle events.
//!
//! [`Bus`] wraps [`tokio::sync::broadcast`] so the controller can publish
//! [`Event`]s to any number of independent subscribers.
//!
//! ## Key characteristics
//! - **Broadcast semantics**: every active subscriber receives a clone of
//!   each event.
//! - **Non-persistent**: events published with no active subscribers are
//!   dropped silently; the overseer works fine unobserved.
//! - **Bounded**: a subscriber lagging behind more than the configured
//!   capacity skips the oldest events (`Lagged`).

use tokio::sync::broadcast;

use super::event::Event;

/// Broadcast channel for controller events.
#[derive(Clone)]
pub struct Bus {
    tx: broadcast::Sender<Event>,
}

impl Bus {
    /// Creates a bus whose ring buffer holds `capacity` events.
    pub fn new(capacity: usize) -> Self {
        let (tx, _rx) = broadcast::channel(capacity.max(1));
        Self { tx }
    }

    /// Publishes an event to all current subscribers.
    ///
    /// Dropping the event when nobody listens is intentional; event
    /// delivery is observability, not control flow.
    pub fn publish(&self, event: Event) {
        let _ = self.tx.send(event);
    }

    /// Creates a receiver that observes all events published from now on.
    pub fn subscribe(&self) -> broadcast::Receiver<Event> {
        self.tx.subscribe()
    }
}

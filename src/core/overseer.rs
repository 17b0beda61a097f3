//! # Overseer: public facade over the controller.
//!
//! [`Overseer`] owns the controller's mailbox. API calls travel as messages
//! with oneshot reply channels; infrastructure notifications (`node_up`,
//! `node_down`, `exit`, `telemetry`) are fire-and-forget enqueues, which is
//! exactly the delivery guarantee the underlying transports give.
//!
//! Construction goes through [`OverseerBuilder`] (or the [`Overseer::start`]
//! shorthand), which validates the config, wires the bus and subscriber
//! fan-out, and spawns the controller task. Dropping the facade requests an
//! orderly shutdown; [`Overseer::shutdown`] does the same but waits for it
//! to complete.

use std::sync::Arc;

use serde_json::Value;
use tokio::sync::{broadcast, mpsc, oneshot};

use crate::adapters::Adapter;
use crate::config::Config;
use crate::error::OverseerError;
use crate::events::{Bus, Event};
use crate::handler::Handler;
use crate::labor::{Labor, PairPid};
use crate::release::Release;
use crate::strategy::Strategy;
use crate::subscribers::{Subscribe, SubscriberSet};
use crate::telemetry::Telemetry;

use super::controller::{Controller, Msg};

/// Debug snapshot of the full overseer state.
#[derive(Clone, Debug)]
pub struct Snapshot {
    /// This overseer's identity.
    pub overseer_id: String,
    /// Configured strategy.
    pub strategy: Strategy,
    /// Configured population cap.
    pub max_nodes: usize,
    /// All registered labors, sorted by name.
    pub labors: Vec<Labor>,
}

/// Builder wiring config, subscribers, and collaborators together.
pub struct OverseerBuilder {
    cfg: Config,
    subscribers: Vec<Arc<dyn Subscribe>>,
}

impl OverseerBuilder {
    /// Creates a builder with the given configuration.
    pub fn new(cfg: Config) -> Self {
        Self {
            cfg,
            subscribers: Vec::new(),
        }
    }

    /// Sets event subscribers for observability.
    ///
    /// Subscribers receive lifecycle events through dedicated workers with
    /// bounded queues; a slow subscriber never blocks the controller.
    pub fn with_subscribers(mut self, subscribers: Vec<Arc<dyn Subscribe>>) -> Self {
        self.subscribers = subscribers;
        self
    }

    /// Validates the config, spawns the controller, and returns the facade.
    ///
    /// Must be called within a tokio runtime. Fails with
    /// [`OverseerError::BadStartSpec`] for a non-startable strategy and
    /// [`OverseerError::InvalidMaxNodes`] for an empty pool bound.
    pub fn start(
        self,
        handler: impl Handler,
        adapter: Arc<dyn Adapter>,
        release: Release,
    ) -> Result<Overseer, OverseerError> {
        self.cfg.validate()?;

        let bus = Bus::new(self.cfg.bus_capacity_clamped());
        let subscriber_set = Arc::new(SubscriberSet::new(self.subscribers));
        if !subscriber_set.is_empty() {
            spawn_fanout(bus.subscribe(), Arc::clone(&subscriber_set));
        }

        let (tx, rx) = mpsc::unbounded_channel();
        let controller = Controller::new(
            self.cfg,
            adapter,
            Arc::new(release),
            Box::new(handler),
            bus.clone(),
            tx.clone(),
            rx,
        );
        tokio::spawn(controller.run());

        Ok(Overseer { tx, bus })
    }
}

/// Forwards bus events into the subscriber set until the bus closes.
fn spawn_fanout(mut rx: broadcast::Receiver<Event>, set: Arc<SubscriberSet>) {
    tokio::spawn(async move {
        loop {
            match rx.recv().await {
                Ok(event) => set.emit_arc(Arc::new(event)),
                Err(broadcast::error::RecvError::Closed) => break,
                Err(broadcast::error::RecvError::Lagged(_)) => continue,
            }
        }
    });
}

/// Handle to a running overseer instance.
///
/// Not clonable: the handle's drop is the signal that nobody can reach the
/// instance anymore, at which point the controller shuts itself down.
pub struct Overseer {
    tx: mpsc::UnboundedSender<Msg>,
    bus: Bus,
}

impl Overseer {
    /// Starts an overseer without extra subscribers.
    ///
    /// Shorthand for [`OverseerBuilder::new(cfg).start(...)`](OverseerBuilder::start).
    pub fn start(
        handler: impl Handler,
        adapter: Arc<dyn Adapter>,
        release: Release,
        cfg: Config,
    ) -> Result<Self, OverseerError> {
        OverseerBuilder::new(cfg).start(handler, adapter, release)
    }

    /// Asks the adapter for one more worker.
    ///
    /// Replies with the new labor, or `None` when the pool is at
    /// `max_nodes` or the spawn failed.
    pub async fn start_child(&self) -> Result<Option<Labor>, OverseerError> {
        let (reply, rx) = oneshot::channel();
        self.send(Msg::StartChild { reply })?;
        rx.await.map_err(|_| OverseerError::Stopped)
    }

    /// Terminates the named worker via the adapter.
    ///
    /// The labor stays registered in its terminated phase (excluded from
    /// the active count) until its final `node_down` arrives.
    pub async fn terminate_child(&self, name: &str) -> Result<Labor, OverseerError> {
        let (reply, rx) = oneshot::channel();
        self.send(Msg::TerminateChild {
            name: name.to_string(),
            reply,
        })?;
        rx.await.map_err(|_| OverseerError::Stopped)?
    }

    /// Number of labors whose phase is not terminated.
    pub async fn count_children(&self) -> Result<usize, OverseerError> {
        let (reply, rx) = oneshot::channel();
        self.send(Msg::CountChildren { reply })?;
        rx.await.map_err(|_| OverseerError::Stopped)
    }

    /// Registers a worker's control endpoint (called by the worker).
    ///
    /// Completes the handshake: the labor moves to its active phase and
    /// the endpoint's death will arrive as an [`exit`](Overseer::exit).
    pub async fn pair(&self, name: &str, pid: PairPid) -> Result<(), OverseerError> {
        let (reply, rx) = oneshot::channel();
        self.send(Msg::Pair {
            name: name.to_string(),
            pid,
            reply,
        })?;
        rx.await.map_err(|_| OverseerError::Stopped)?
    }

    /// Notifies the overseer that a worker's node came up.
    pub fn node_up(&self, name: &str) {
        let _ = self.tx.send(Msg::NodeUp {
            name: name.to_string(),
        });
    }

    /// Notifies the overseer that a worker's node went down.
    pub fn node_down(&self, name: &str) {
        let _ = self.tx.send(Msg::NodeDown {
            name: name.to_string(),
        });
    }

    /// Notifies the overseer that a paired control endpoint died.
    pub fn exit(&self, pid: PairPid, reason: impl Into<String>) {
        let _ = self.tx.send(Msg::EndpointExit {
            pid,
            reason: reason.into(),
        });
    }

    /// Delivers a telemetry record (fire-and-forget).
    pub fn telemetry(&self, telemetry: Telemetry) {
        let _ = self.tx.send(Msg::Telemetry(telemetry));
    }

    /// Request/response pass-through to the handler's `handle_call`.
    pub async fn call(&self, request: Value) -> Result<Value, OverseerError> {
        let (reply, rx) = oneshot::channel();
        self.send(Msg::Call { request, reply })?;
        rx.await.map_err(|_| OverseerError::Stopped)
    }

    /// Fire-and-forget pass-through to the handler's `handle_cast`.
    pub fn cast(&self, message: Value) {
        let _ = self.tx.send(Msg::Cast { message });
    }

    /// Out-of-band pass-through to the handler's `handle_info`.
    pub fn info(&self, message: Value) {
        let _ = self.tx.send(Msg::Info { message });
    }

    /// Full debug state snapshot.
    pub async fn snapshot(&self) -> Result<Snapshot, OverseerError> {
        let (reply, rx) = oneshot::channel();
        self.send(Msg::Snapshot { reply })?;
        rx.await.map_err(|_| OverseerError::Stopped)
    }

    /// Observes the lifecycle event stream.
    pub fn subscribe(&self) -> broadcast::Receiver<Event> {
        self.bus.subscribe()
    }

    /// Shuts the overseer down and waits for completion.
    ///
    /// Cancels all timers, terminates all live labors via the adapter
    /// (best effort), then runs the handler's `terminate`.
    pub async fn shutdown(&self) -> Result<(), OverseerError> {
        let (reply, rx) = oneshot::channel();
        self.send(Msg::Shutdown { reply: Some(reply) })?;
        rx.await.map_err(|_| OverseerError::Stopped)
    }

    fn send(&self, msg: Msg) -> Result<(), OverseerError> {
        self.tx.send(msg).map_err(|_| OverseerError::Stopped)
    }
}

impl Drop for Overseer {
    /// Requests an orderly shutdown; the controller finishes in the
    /// background.
    fn drop(&mut self) {
        let _ = self.tx.send(Msg::Shutdown { reply: None });
    }
}

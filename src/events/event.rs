//! # Lifecycle events emitted by the controller.
//!
//! The [`EventKind`] enum classifies events across the labor lifecycle:
//! provisioning, node transitions, release delivery, pairing, timeouts,
//! and overseer shutdown. The [`Event`] struct carries metadata such as
//! the labor name, phase, error text, retry attempt, and backoff delay.
//!
//! ## Ordering guarantees
//! Each event has a globally unique sequence number (`seq`) that increases
//! monotonically, so consumers can order events correctly even when they
//! observe them through independent async channels.
//!
//! ## Typical flows
//!
//! ### Happy path
//! ```text
//! LaborSpawned → NodeUp → ReleaseLoading → ReleaseLoaded → Paired
//! ```
//!
//! ### Disconnect and reconnect
//! ```text
//! NodeDown → NodeUp → ReleaseLoading → ReleaseLoaded → Paired
//! ```
//!
//! ### Permanent loss
//! ```text
//! NodeDown → ConnTimeout → LaborDropped
//! ```

use std::sync::atomic::{AtomicU64, Ordering as AtomicOrdering};
use std::time::{Duration, SystemTime};

use crate::labor::Phase;

/// Global sequence counter for event ordering.
static EVENT_SEQ: AtomicU64 = AtomicU64::new(0);

/// Classification of controller events.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EventKind {
    // === Provisioning ===
    /// The adapter produced a new labor.
    LaborSpawned,
    /// The adapter failed to produce a labor; `start_child` replied `None`.
    SpawnFailed,
    /// `start_child` was refused because the pool is at `max_nodes`.
    CapReached,

    // === Node transitions ===
    /// A known worker's node came up.
    NodeUp,
    /// A known worker's node went down; its reconnect window opened.
    NodeDown,
    /// A node or telemetry event referenced a name not in the registry.
    UnknownNode,

    // === Release delivery & pairing ===
    /// The load task for a worker started (connect, fetch, push, start).
    ReleaseLoading,
    /// The release is running on the worker; awaiting its pair callback.
    ReleaseLoaded,
    /// Release delivery failed; a retry may follow.
    LoadFailed,
    /// Another delivery attempt was scheduled after a backoff delay.
    RetryScheduled,
    /// The worker registered its control endpoint; labor is active.
    Paired,
    /// The paired control endpoint died; the sequence is re-driven.
    EndpointExit,

    // === Timeouts ===
    /// The connect/reconnect deadline expired.
    ConnTimeout,
    /// The pairing deadline expired.
    PairTimeout,

    // === Departures ===
    /// `terminate_child` completed; the labor awaits its final node_down.
    LaborTerminated,
    /// The labor was removed from the registry.
    LaborDropped,

    // === Telemetry ===
    /// A telemetry record arrived from a known worker.
    TelemetryReceived,

    // === Overseer lifecycle ===
    /// Shutdown began: timers cancelled, labors being terminated.
    ShutdownRequested,
    /// The controller loop exited.
    OverseerStopped,
}

impl EventKind {
    /// Returns a short stable label.
    pub fn as_label(&self) -> &'static str {
        match self {
            EventKind::LaborSpawned => "labor_spawned",
            EventKind::SpawnFailed => "spawn_failed",
            EventKind::CapReached => "cap_reached",
            EventKind::NodeUp => "node_up",
            EventKind::NodeDown => "node_down",
            EventKind::UnknownNode => "unknown_node",
            EventKind::ReleaseLoading => "release_loading",
            EventKind::ReleaseLoaded => "release_loaded",
            EventKind::LoadFailed => "load_failed",
            EventKind::RetryScheduled => "retry_scheduled",
            EventKind::Paired => "paired",
            EventKind::EndpointExit => "endpoint_exit",
            EventKind::ConnTimeout => "conn_timeout",
            EventKind::PairTimeout => "pair_timeout",
            EventKind::LaborTerminated => "labor_terminated",
            EventKind::LaborDropped => "labor_dropped",
            EventKind::TelemetryReceived => "telemetry_received",
            EventKind::ShutdownRequested => "shutdown_requested",
            EventKind::OverseerStopped => "overseer_stopped",
        }
    }
}

/// Controller event with optional metadata.
#[derive(Clone, Debug)]
pub struct Event {
    /// Globally unique, monotonically increasing sequence number.
    pub seq: u64,
    /// Wall-clock timestamp (may go backwards, use for logging only).
    pub at: SystemTime,
    /// The kind of event.
    pub kind: EventKind,
    /// Labor name, if applicable.
    pub labor: Option<String>,
    /// Labor phase after the transition, if applicable.
    pub phase: Option<Phase>,
    /// Error message, if the event represents a failure.
    pub error: Option<String>,
    /// Load attempt count (starting from 1), if relevant.
    pub attempt: Option<u32>,
    /// Backoff delay before the next load attempt, if relevant.
    pub delay: Option<Duration>,
}

impl Event {
    /// Creates a new event of the given kind with the current timestamp
    /// and next sequence number.
    pub fn now(kind: EventKind) -> Self {
        Self {
            seq: EVENT_SEQ.fetch_add(1, AtomicOrdering::Relaxed),
            at: SystemTime::now(),
            kind,
            labor: None,
            phase: None,
            error: None,
            attempt: None,
            delay: None,
        }
    }

    /// Attaches a labor name.
    pub fn with_labor(mut self, name: impl Into<String>) -> Self {
        self.labor = Some(name.into());
        self
    }

    /// Attaches the labor's phase after the transition.
    pub fn with_phase(mut self, phase: Phase) -> Self {
        self.phase = Some(phase);
        self
    }

    /// Attaches an error message.
    pub fn with_error(mut self, msg: impl Into<String>) -> Self {
        self.error = Some(msg.into());
        self
    }

    /// Attaches a load attempt count.
    pub fn with_attempt(mut self, n: u32) -> Self {
        self.attempt = Some(n);
        self
    }

    /// Attaches a backoff delay.
    pub fn with_delay(mut self, d: Duration) -> Self {
        self.delay = Some(d);
        self
    }
}

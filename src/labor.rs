//! # Per-worker record: identity, lifecycle phase, pairing endpoint.
//!
//! A [`Labor`] is the overseer's record for one managed worker. Labors are
//! immutable values from the registry's point of view: every transition
//! produces an updated value that is swapped into the registry by the
//! controller, which is the sole mutator.
//!
//! ## Phase graph
//! ```text
//! Spawning ──► Connecting ──► Loading ──► Pairing ──► Active
//!                  ▲             ▲  ▲                   │
//!                  │ (timeout    │  └── re-drive on ────┤
//!                  │  drops)     │      endpoint exit   │
//!                  │             │                      ▼
//!                  └──────── Disconnected ◄──────── node_down
//!
//! Terminated: entered via terminate_child; the labor stays registered
//! (excluded from the active count) until its node_down arrives.
//! ```

use std::fmt;
use std::time::SystemTime;

/// Lifecycle phase of a labor.
///
/// The phase at the moment an event is delivered is authoritative: stale
/// events whose phase precondition no longer holds are dropped.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Phase {
    /// The adapter is provisioning a host / starting the worker process.
    Spawning,
    /// Worker identity is known; waiting for its node to come up.
    Connecting,
    /// Node is up; the release is being fetched and pushed.
    Loading,
    /// Release started on the worker; waiting for its pair callback.
    Pairing,
    /// Paired and serving; the control endpoint is linked.
    Active,
    /// Node went down; a reconnect window is open.
    Disconnected,
    /// Terminated via the adapter; awaiting final node_down for removal.
    Terminated,
}

impl Phase {
    /// Returns a short stable label.
    pub fn as_label(&self) -> &'static str {
        match self {
            Phase::Spawning => "spawning",
            Phase::Connecting => "connecting",
            Phase::Loading => "loading",
            Phase::Pairing => "pairing",
            Phase::Active => "active",
            Phase::Disconnected => "disconnected",
            Phase::Terminated => "terminated",
        }
    }

    /// True for every phase except [`Phase::Terminated`].
    ///
    /// Labors in any such phase count against `max_nodes`.
    pub fn is_live(&self) -> bool {
        !matches!(self, Phase::Terminated)
    }
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_label())
    }
}

/// Identifier of a worker-side control endpoint.
///
/// `node` is the worker name the endpoint runs on; `id` distinguishes
/// successive endpoints on the same worker, so an exit notification from an
/// endpoint that has since been replaced is recognised as stale.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct PairPid {
    /// Worker name hosting the endpoint.
    pub node: String,
    /// Endpoint instance id on that worker.
    pub id: u64,
}

impl PairPid {
    /// Creates a new endpoint identifier.
    pub fn new(node: impl Into<String>, id: u64) -> Self {
        Self {
            node: node.into(),
            id,
        }
    }
}

impl fmt::Display for PairPid {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.node, self.id)
    }
}

/// Record for one attempted worker.
#[derive(Clone, Debug)]
pub struct Labor {
    /// Unique worker identifier, typically `prefix-<random>@host`.
    pub name: String,
    /// Adapter-specific opaque handle (OS pid, instance id, ...).
    pub handle: String,
    /// Current lifecycle phase.
    pub phase: Phase,
    /// Control endpoint registered by the worker's pair call, if any.
    pub pair_pid: Option<PairPid>,
    /// When the adapter produced this labor.
    pub created_at: SystemTime,
    /// When the phase last changed.
    pub last_transition_at: SystemTime,
}

impl Labor {
    /// Creates a fresh labor in [`Phase::Spawning`].
    ///
    /// Adapters call this from `spawn` once the worker identity is known.
    pub fn new(name: impl Into<String>, handle: impl Into<String>) -> Self {
        let now = SystemTime::now();
        Self {
            name: name.into(),
            handle: handle.into(),
            phase: Phase::Spawning,
            pair_pid: None,
            created_at: now,
            last_transition_at: now,
        }
    }

    /// Moves the labor to `phase`, stamping the transition time.
    pub fn transition(&mut self, phase: Phase) {
        self.phase = phase;
        self.last_transition_at = SystemTime::now();
    }

    /// Returns a copy of this labor in the given phase.
    pub fn into_phase(mut self, phase: Phase) -> Self {
        self.transition(phase);
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn live_phases_exclude_terminated() {
        assert!(Phase::Spawning.is_live());
        assert!(Phase::Disconnected.is_live());
        assert!(!Phase::Terminated.is_live());
    }

    #[test]
    fn transition_advances_timestamp() {
        let mut labor = Labor::new("w-1@host", "pid-1");
        let before = labor.last_transition_at;
        labor.transition(Phase::Connecting);
        assert_eq!(labor.phase, Phase::Connecting);
        assert!(labor.last_transition_at >= before);
    }
}

//! # Immutable runtime configuration.
//!
//! [`Config`] carries everything the controller needs to drive a labor
//! pool: strategy, population cap, the two per-labor deadlines, the retry
//! budget for release delivery, and the overseer's own identity.
//!
//! The config is fixed at init; there is no reconfiguration of a running
//! overseer.
//!
//! ## Field semantics
//! - `conn_timeout`: deadline from spawn for node-up, and from disconnect
//!   for reconnect. `Duration::ZERO` means a labor that does not connect
//!   synchronously is dropped on the next controller step.
//! - `pair_timeout`: deadline from node-up for the load + pair handshake.
//! - `load_retries`: how many times a failed load (or expired pair window)
//!   is re-driven before the labor is given up and terminated.

use std::time::Duration;

use crate::error::OverseerError;
use crate::policies::BackoffPolicy;
use crate::strategy::Strategy;

/// Configuration for one overseer instance.
#[derive(Clone, Debug)]
pub struct Config {
    /// Pool strategy. Only [`Strategy::SimpleOneForOne`] is startable.
    pub strategy: Strategy,

    /// Upper bound on labors whose phase is not [`Phase::Terminated`](crate::Phase::Terminated).
    ///
    /// `start_child` replies `None` without touching the adapter once the
    /// bound is reached.
    pub max_nodes: usize,

    /// Deadline for a spawned worker to come up, and for a disconnected
    /// worker to come back.
    pub conn_timeout: Duration,

    /// Deadline from node-up for release delivery and the pair callback.
    pub pair_timeout: Duration,

    /// Stable identity of this overseer, handed to workers for their
    /// reverse connection.
    pub overseer_id: String,

    /// Capacity of the observability bus ring buffer. Slow subscribers
    /// lagging behind more than this many events skip the older ones.
    pub bus_capacity: usize,

    /// Retry budget for the load/pair sequence.
    pub load_retries: u32,

    /// Delay policy between load/pair retries.
    pub load_backoff: BackoffPolicy,
}

impl Config {
    /// Checks that this config can actually be started.
    ///
    /// Refuses `max_nodes == 0` and any strategy other than the dynamic
    /// pool, mirroring the reference behaviour that hard-codes
    /// `simple_one_for_one` at init.
    pub(crate) fn validate(&self) -> Result<(), OverseerError> {
        if self.max_nodes == 0 {
            return Err(OverseerError::InvalidMaxNodes);
        }
        match self.strategy {
            Strategy::SimpleOneForOne => Ok(()),
            other => Err(OverseerError::BadStartSpec { strategy: other }),
        }
    }

    /// Returns a bus capacity clamped to a minimum of 1.
    #[inline]
    pub fn bus_capacity_clamped(&self) -> usize {
        self.bus_capacity.max(1)
    }
}

impl Default for Config {
    /// Default configuration:
    ///
    /// - `strategy = SimpleOneForOne`
    /// - `max_nodes = 8`
    /// - `conn_timeout = 120s` (cloud hosts take a while to boot)
    /// - `pair_timeout = 60s`
    /// - `overseer_id = "overseer-<pid>"`
    /// - `bus_capacity = 1024`
    /// - `load_retries = 3`, exponential backoff with equal jitter
    fn default() -> Self {
        Self {
            strategy: Strategy::default(),
            max_nodes: 8,
            conn_timeout: Duration::from_secs(120),
            pair_timeout: Duration::from_secs(60),
            overseer_id: format!("overseer-{}", std::process::id()),
            bus_capacity: 1024,
            load_retries: 3,
            load_backoff: BackoffPolicy::default(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_is_startable() {
        assert!(Config::default().validate().is_ok());
    }

    #[test]
    fn one_for_one_is_refused() {
        let cfg = Config {
            strategy: Strategy::OneForOne,
            ..Config::default()
        };
        assert!(matches!(
            cfg.validate(),
            Err(OverseerError::BadStartSpec { .. })
        ));
    }

    #[test]
    fn zero_max_nodes_is_refused() {
        let cfg = Config {
            max_nodes: 0,
            ..Config::default()
        };
        assert!(matches!(cfg.validate(), Err(OverseerError::InvalidMaxNodes)));
    }
}

//! # Supervision strategies for the labor pool.
//!
//! [`Strategy`] controls what a worker slot means:
//!
//! - [`Strategy::SimpleOneForOne`] workers are anonymous pool slots. New
//!   slots appear only through explicit `start_child`; a slot whose worker
//!   is permanently lost is removed from the pool.
//! - [`Strategy::OneForOne`] workers occupy named slots that would be
//!   respawned in place. The reference behaviour this crate follows always
//!   initialises as the dynamic pool, so init refuses this mode.

/// Policy controlling whether failed workers occupy named slots or an
/// anonymous pool.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Strategy {
    /// Named slots with in-place respawn. Modelled but not startable; see
    /// [`OverseerError::BadStartSpec`](crate::OverseerError::BadStartSpec).
    OneForOne,
    /// Dynamic anonymous pool (default). Slots are created on demand and
    /// dropped when their worker is permanently lost.
    SimpleOneForOne,
}

impl Default for Strategy {
    /// Returns [`Strategy::SimpleOneForOne`].
    fn default() -> Self {
        Strategy::SimpleOneForOne
    }
}

impl Strategy {
    /// Returns a short stable label.
    pub fn as_label(&self) -> &'static str {
        match self {
            Strategy::OneForOne => "one_for_one",
            Strategy::SimpleOneForOne => "simple_one_for_one",
        }
    }
}

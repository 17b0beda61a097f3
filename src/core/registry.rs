//! # Labor registry: the controller's authoritative worker map.
//!
//! Maps worker names to their [`Labor`] plus per-labor bookkeeping (the
//! two timer slots and the load retry counter). The registry is owned by
//! the controller task and mutated only inside its event-handling steps,
//! so it is a plain `HashMap` with no interior locking.
//!
//! ## Rules
//! - Keys are unique worker names produced by the adapter within this
//!   overseer's lifetime.
//! - The active count (`phase != Terminated`) never exceeds `max_nodes`;
//!   the controller checks before every insert.
//! - Each entry holds at most one armed timer per kind.

use std::collections::HashMap;
use std::time::Duration;

use crate::labor::{Labor, Phase};
use crate::timer::TimerSlot;

/// Per-labor bookkeeping around the labor value itself.
pub(crate) struct Entry {
    /// The labor record.
    pub labor: Labor,
    /// Connect/reconnect deadline slot.
    pub conn: TimerSlot,
    /// Pairing deadline slot.
    pub pair: TimerSlot,
    /// Load attempts consumed since the labor last paired.
    pub load_attempts: u32,
    /// Previous backoff delay, input for the next one.
    pub prev_delay: Option<Duration>,
}

impl Entry {
    fn new(labor: Labor) -> Self {
        Self {
            labor,
            conn: TimerSlot::default(),
            pair: TimerSlot::default(),
            load_attempts: 0,
            prev_delay: None,
        }
    }

    /// Cancels both timers.
    pub fn cancel_timers(&mut self) {
        self.conn.cancel();
        self.pair.cancel();
    }

    /// Resets the retry bookkeeping after a successful pair.
    pub fn reset_retries(&mut self) {
        self.load_attempts = 0;
        self.prev_delay = None;
    }
}

/// Name-keyed registry of labors.
#[derive(Default)]
pub(crate) struct Registry {
    entries: HashMap<String, Entry>,
}

impl Registry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Inserts a fresh labor, returning its entry.
    pub fn insert(&mut self, labor: Labor) -> &mut Entry {
        let name = labor.name.clone();
        self.entries.entry(name).or_insert_with(|| Entry::new(labor))
    }

    pub fn get(&self, name: &str) -> Option<&Entry> {
        self.entries.get(name)
    }

    pub fn get_mut(&mut self, name: &str) -> Option<&mut Entry> {
        self.entries.get_mut(name)
    }

    /// Removes an entry, cancelling its timers.
    pub fn remove(&mut self, name: &str) -> Option<Entry> {
        let mut entry = self.entries.remove(name)?;
        entry.cancel_timers();
        Some(entry)
    }

    /// Number of labors counting against `max_nodes`.
    pub fn count_active(&self) -> usize {
        self.entries
            .values()
            .filter(|e| e.labor.phase.is_live())
            .count()
    }

    /// Sorted snapshot of all labors, terminated stragglers included.
    pub fn labors(&self) -> Vec<Labor> {
        let mut labors: Vec<Labor> = self.entries.values().map(|e| e.labor.clone()).collect();
        labors.sort_unstable_by(|a, b| a.name.cmp(&b.name));
        labors
    }

    /// Drains every entry for shutdown, timers already cancelled.
    pub fn drain(&mut self) -> Vec<Entry> {
        self.entries
            .drain()
            .map(|(_, mut entry)| {
                entry.cancel_timers();
                entry
            })
            .collect()
    }

    /// Releases spare capacity (the hibernate hint).
    pub fn shrink(&mut self) {
        self.entries.shrink_to_fit();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn active_count_excludes_terminated() {
        let mut registry = Registry::new();
        registry.insert(Labor::new("w-a@h", "1"));
        registry.insert(Labor::new("w-b@h", "2"));
        registry
            .get_mut("w-b@h")
            .unwrap()
            .labor
            .transition(Phase::Terminated);

        assert_eq!(registry.count_active(), 1);
        assert_eq!(registry.labors().len(), 2);
    }

    #[test]
    fn remove_is_final() {
        let mut registry = Registry::new();
        registry.insert(Labor::new("w-a@h", "1"));
        assert!(registry.remove("w-a@h").is_some());
        assert!(registry.remove("w-a@h").is_none());
        assert_eq!(registry.count_active(), 0);
    }
}

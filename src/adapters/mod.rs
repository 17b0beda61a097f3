//! # Provisioning adapters: the spawn/terminate/connect plugin contract.
//!
//! An [`Adapter`] owns everything host-shaped about a worker: provisioning,
//! teardown, the low-level control channel, and the transport that ships a
//! release archive onto the worker. The controller never touches hosts
//! directly; it only calls this contract and reacts to the errors.
//!
//! Two reference adapters ship with the crate:
//! - [`LocalAdapter`] workers as local child processes, for development
//!   and tests.
//! - `Ec2Adapter` (feature `ec2`) workers on freshly provisioned EC2
//!   instances, with an SSH control channel.
//!
//! ## Contract notes
//! - `spawn` must return promptly once the worker identity is known; slow
//!   provisioning continues in the background on the adapter's side. The
//!   controller processes one event at a time, so a spawn that blocks for
//!   minutes would stall the whole pool.
//! - `terminate` is idempotent: terminating an already-gone worker is
//!   success.
//! - `connect` may block (it runs on a background load task) and is called
//!   before every delivery attempt, so it must also re-establish channels
//!   that have gone stale.
//! - Integrity checking of pushed archives is the adapter's concern.

use std::path::Path;

use async_trait::async_trait;
use rand::distr::Alphanumeric;
use rand::Rng;

use crate::error::AdapterError;
use crate::labor::Labor;
use crate::release::EntryPoint;

mod local;
pub use local::{LocalAdapter, LocalOptions};

#[cfg(feature = "ec2")]
mod ec2;
#[cfg(feature = "ec2")]
pub use ec2::{Ec2Adapter, Ec2Options};

/// Provisioning backend contract.
#[async_trait]
pub trait Adapter: Send + Sync + 'static {
    /// Provisions a host and starts a worker process on it.
    ///
    /// Returns a [`Labor`] in [`Phase::Spawning`](crate::Phase::Spawning)
    /// carrying the worker name and the adapter-specific handle.
    /// `overseer_id` is handed to the worker for its reverse connection.
    async fn spawn(&self, overseer_id: &str) -> Result<Labor, AdapterError>;

    /// Releases the worker's underlying resources.
    ///
    /// Idempotent; returns the labor in
    /// [`Phase::Terminated`](crate::Phase::Terminated).
    async fn terminate(&self, labor: &Labor) -> Result<Labor, AdapterError>;

    /// Establishes or re-establishes the low-level control channel.
    ///
    /// Called at the start of every delivery attempt, before the release
    /// is pushed.
    async fn connect(&self, labor: &Labor) -> Result<(), AdapterError>;

    /// Ships the release archive to the worker's filesystem.
    async fn push_release(&self, labor: &Labor, archive: &Path) -> Result<(), AdapterError>;

    /// Invokes the worker's "load and start" entry point.
    async fn start_release(
        &self,
        labor: &Labor,
        entry: Option<&EntryPoint>,
    ) -> Result<(), AdapterError>;
}

/// Builds a worker name of the form `prefix-<random>@host`.
pub(crate) fn worker_name(prefix: &str, host: &str) -> String {
    let suffix: String = rand::rng()
        .sample_iter(Alphanumeric)
        .take(8)
        .map(char::from)
        .collect();
    format!("{prefix}-{}@{host}", suffix.to_lowercase())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn worker_names_carry_prefix_and_host() {
        let name = worker_name("w", "box1");
        assert!(name.starts_with("w-"));
        assert!(name.ends_with("@box1"));
        assert_ne!(worker_name("w", "box1"), worker_name("w", "box1"));
    }
}

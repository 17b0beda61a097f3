//! # Error types used by the overseer runtime, adapters, and release loading.
//!
//! This module defines three error enums:
//!
//! - [`OverseerError`] errors raised by the supervision runtime itself.
//! - [`AdapterError`] errors raised by provisioning adapters.
//! - [`LoadError`] errors raised while fetching or delivering a release.
//!
//! All types provide `as_label` helpers returning short stable snake_case
//! labels for logs and events.

use thiserror::Error;

use crate::strategy::Strategy;

/// # Errors produced by the overseer runtime.
///
/// These represent failures of the supervision layer, not of individual
/// workers: worker-level failures are handled internally by recycling and
/// only surface through callbacks.
#[non_exhaustive]
#[derive(Error, Debug)]
pub enum OverseerError {
    /// Init was given a strategy this runtime cannot drive.
    ///
    /// Only [`Strategy::SimpleOneForOne`] can be started; see DESIGN notes
    /// on the `one_for_one` ambiguity.
    #[error("unsupported strategy '{}': only simple_one_for_one can be started", strategy.as_label())]
    BadStartSpec {
        /// The rejected strategy.
        strategy: Strategy,
    },

    /// `max_nodes` must be at least 1.
    #[error("max_nodes must be at least 1")]
    InvalidMaxNodes,

    /// The named labor is not present in the registry.
    #[error("labor '{name}' not found in registry")]
    UnknownLabor {
        /// The missing labor name.
        name: String,
    },

    /// The controller mailbox is closed; the overseer has stopped.
    #[error("overseer is not running")]
    Stopped,

    /// A provisioning adapter call failed.
    #[error(transparent)]
    Adapter(#[from] AdapterError),
}

impl OverseerError {
    /// Returns a short stable label (snake_case) for use in logs/events.
    pub fn as_label(&self) -> &'static str {
        match self {
            OverseerError::BadStartSpec { .. } => "bad_start_spec",
            OverseerError::InvalidMaxNodes => "invalid_max_nodes",
            OverseerError::UnknownLabor { .. } => "unknown_labor",
            OverseerError::Stopped => "overseer_stopped",
            OverseerError::Adapter(_) => "adapter_error",
        }
    }
}

/// # Errors produced by provisioning adapters.
///
/// Surfaced to the controller as events; the controller decides whether to
/// retry, respawn, or drop the labor.
#[non_exhaustive]
#[derive(Error, Debug)]
pub enum AdapterError {
    /// Host provisioning or worker process start failed.
    #[error("spawn failed: {reason}")]
    SpawnFailed { reason: String },

    /// Releasing the underlying resources failed.
    #[error("terminate failed for '{name}': {reason}")]
    TerminateFailed { name: String, reason: String },

    /// The low-level control channel could not be (re-)established.
    #[error("connect failed for '{name}': {reason}")]
    ConnectFailed { name: String, reason: String },

    /// Shipping the release archive to the worker failed.
    #[error("release push failed for '{name}': {reason}")]
    PushFailed { name: String, reason: String },

    /// The worker-side "load and start" entry point failed.
    #[error("release start failed for '{name}': {reason}")]
    StartFailed { name: String, reason: String },

    /// Local filesystem or process I/O error.
    #[error("i/o error: {0}")]
    Io(#[from] std::io::Error),
}

impl AdapterError {
    /// Returns a short stable label.
    pub fn as_label(&self) -> &'static str {
        match self {
            AdapterError::SpawnFailed { .. } => "spawn_failed",
            AdapterError::TerminateFailed { .. } => "terminate_failed",
            AdapterError::ConnectFailed { .. } => "connect_failed",
            AdapterError::PushFailed { .. } => "push_failed",
            AdapterError::StartFailed { .. } => "start_failed",
            AdapterError::Io(_) => "adapter_io",
        }
    }
}

/// # Errors raised while loading a release onto a worker.
///
/// Covers the whole delivery sequence: parsing the release reference,
/// fetching the artifact, and handing it to the adapter. Load errors are
/// retryable: the controller re-drives the pairing sequence with backoff
/// until its retry budget is exhausted.
#[non_exhaustive]
#[derive(Error, Debug)]
pub enum LoadError {
    /// The release URL could not be parsed into a known source.
    #[error("invalid release url '{url}': {reason}")]
    InvalidUrl { url: String, reason: String },

    /// The URL scheme is recognised but not compiled into this build.
    #[error("release scheme '{scheme}' not supported in this build")]
    UnsupportedScheme { scheme: String },

    /// Fetching the artifact from its source failed.
    #[error("release fetch failed: {reason}")]
    Fetch { reason: String },

    /// The adapter failed while connecting, pushing, or starting.
    #[error(transparent)]
    Adapter(#[from] AdapterError),

    /// Local staging I/O error.
    #[error("i/o error: {0}")]
    Io(#[from] std::io::Error),
}

impl LoadError {
    /// Returns a short stable label.
    pub fn as_label(&self) -> &'static str {
        match self {
            LoadError::InvalidUrl { .. } => "invalid_release_url",
            LoadError::UnsupportedScheme { .. } => "unsupported_scheme",
            LoadError::Fetch { .. } => "fetch_failed",
            LoadError::Adapter(e) => e.as_label(),
            LoadError::Io(_) => "load_io",
        }
    }
}

//! # Telemetry: unsolicited status messages from workers.
//!
//! After pairing, a worker sends [`Telemetry`] records to its overseer.
//! Delivery is fire-and-forget: the overseer surfaces each record through
//! the user's `handle_telemetry` callback and keeps no history.

use std::time::SystemTime;

use serde::{Deserialize, Serialize};

/// One telemetry record emitted by a worker.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Telemetry {
    /// Name of the emitting worker.
    pub name: String,
    /// Opaque user payload; the overseer does not interpret it.
    pub payload: serde_json::Value,
    /// When the worker produced the record.
    pub timestamp: SystemTime,
}

impl Telemetry {
    /// Creates a record stamped with the current time.
    pub fn new(name: impl Into<String>, payload: serde_json::Value) -> Self {
        Self {
            name: name.into(),
            payload,
            timestamp: SystemTime::now(),
        }
    }
}

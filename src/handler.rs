//! # User callback contract.
//!
//! [`Handler`] is the behaviour an embedding module implements to react to
//! worker events. The controller owns the handler exclusively and invokes
//! it inline from its event loop, so `&mut self` access to user state is
//! safe without locks: this is how user state is threaded through the loop.
//!
//! Every callback returns a [`Flow`] telling the controller how to proceed;
//! `handle_call` returns a [`CallFlow`] carrying the reply value. There is
//! no malformed-return failure mode: the enums are closed, so the
//! `bad_return_value` class of errors is unrepresentable.
//!
//! Required callbacks: [`handle_connected`](Handler::handle_connected),
//! [`handle_disconnected`](Handler::handle_disconnected),
//! [`handle_telemetry`](Handler::handle_telemetry),
//! [`handle_terminated`](Handler::handle_terminated), and
//! [`handle_event`](Handler::handle_event) (the generic hook that sees every
//! published [`Event`]). `handle_call`, `handle_cast`, `handle_info`, and
//! `terminate` default to no-ops.
//!
//! ## Example
//! ```rust
//! use async_trait::async_trait;
//! use overseer::{Event, Flow, Handler, Telemetry};
//!
//! struct FleetTracker {
//!     active: usize,
//! }
//!
//! #[async_trait]
//! impl Handler for FleetTracker {
//!     async fn handle_connected(&mut self, name: &str) -> Flow {
//!         println!("worker {name} up");
//!         self.active += 1;
//!         Flow::Noreply
//!     }
//!
//!     async fn handle_disconnected(&mut self, _name: &str) -> Flow {
//!         self.active -= 1;
//!         Flow::Noreply
//!     }
//!
//!     async fn handle_telemetry(&mut self, t: &Telemetry) -> Flow {
//!         println!("{}: {}", t.name, t.payload);
//!         Flow::Noreply
//!     }
//!
//!     async fn handle_terminated(&mut self, _name: &str) -> Flow {
//!         Flow::Noreply
//!     }
//!
//!     async fn handle_event(&mut self, _event: &Event) -> Flow {
//!         Flow::Noreply
//!     }
//! }
//! ```

use async_trait::async_trait;
use serde_json::Value;

use crate::events::Event;
use crate::telemetry::Telemetry;

/// What the controller does after a callback.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Flow {
    /// Continue with the next event.
    Noreply,
    /// Continue, and take the hint to release spare memory until the next
    /// event arrives.
    NoreplyHibernate,
    /// Shut the overseer down: all timers cancelled, all live labors
    /// terminated best-effort, then [`Handler::terminate`] with `reason`.
    Stop {
        /// Reason passed through to [`Handler::terminate`].
        reason: String,
    },
}

impl Flow {
    /// Convenience constructor for [`Flow::Stop`].
    pub fn stop(reason: impl Into<String>) -> Self {
        Flow::Stop {
            reason: reason.into(),
        }
    }
}

/// What the controller does after a `handle_call`.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum CallFlow {
    /// Send `value` back to the caller and continue.
    Reply(Value),
    /// Shut the overseer down; the caller observes a closed channel.
    Stop {
        /// Reason passed through to [`Handler::terminate`].
        reason: String,
    },
}

/// Behaviour contract for embedding code.
#[async_trait]
pub trait Handler: Send + 'static {
    /// A worker's node came up: invoked before the release load is
    /// scheduled, both on first connect and on reconnect.
    async fn handle_connected(&mut self, name: &str) -> Flow;

    /// A worker's node went down and its reconnect window opened.
    ///
    /// Not invoked for workers that never connected.
    async fn handle_disconnected(&mut self, name: &str) -> Flow;

    /// A telemetry record arrived from a known worker.
    async fn handle_telemetry(&mut self, telemetry: &Telemetry) -> Flow;

    /// A labor left the pool for good: its terminate completed (final
    /// node_down), its reconnect window expired, or its load retries were
    /// exhausted.
    async fn handle_terminated(&mut self, name: &str) -> Flow;

    /// Generic hook invoked for every [`Event`] the controller publishes,
    /// including those that also have a dedicated callback above.
    async fn handle_event(&mut self, event: &Event) -> Flow;

    /// Request/response pass-through from [`Overseer::call`](crate::Overseer::call).
    async fn handle_call(&mut self, request: Value) -> CallFlow {
        let _ = request;
        CallFlow::Reply(Value::Null)
    }

    /// Fire-and-forget pass-through from [`Overseer::cast`](crate::Overseer::cast).
    async fn handle_cast(&mut self, message: Value) -> Flow {
        let _ = message;
        Flow::Noreply
    }

    /// Out-of-band message pass-through from [`Overseer::info`](crate::Overseer::info).
    async fn handle_info(&mut self, message: Value) -> Flow {
        let _ = message;
        Flow::Noreply
    }

    /// Invoked once during shutdown, after all labors have been terminated.
    async fn terminate(&mut self, reason: &str) {
        let _ = reason;
    }
}

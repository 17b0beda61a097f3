//! Runtime events: types and broadcast bus.
//!
//! This module groups the event **data model** and the **bus** used to
//! publish/subscribe to lifecycle events emitted by the controller.
//!
//! ## Contents
//! - [`EventKind`], [`Event`] event classification and payload metadata
//! - [`Bus`] thin wrapper over `tokio::sync::broadcast`
//!
//! ## Quick reference
//! - **Publisher**: the controller (every registry transition, timeout,
//!   and drop).
//! - **Consumers**: the subscriber fan-out worker (delivers to
//!   [`Subscribe`](crate::Subscribe) implementors) and any receiver
//!   obtained from [`Overseer::subscribe`](crate::Overseer::subscribe).
//!
//! See `core/mod.rs` for the system-level wiring diagram.

mod bus;
mod event;

pub use bus::Bus;
pub use event::{Event, EventKind};

//! # Event subscribers: observability fan-out.
//!
//! Subscribers receive the controller's [`Event`](crate::Event) stream
//! without ever blocking it: each subscriber gets a dedicated worker
//! task fed by a bounded queue, and a panicking subscriber is isolated from
//! the runtime and from its peers.
//!
//! ```text
//! Controller ── publish(Event) ──► Bus ──► fan-out listener
//!                                             │ (Arc-clone per subscriber)
//!                                             ├──► [queue S1] ─► worker S1 ─► on_event()
//!                                             ├──► [queue S2] ─► worker S2 ─► on_event()
//!                                             └──► [queue SN] ─► worker SN ─► on_event()
//! ```
//!
//! The built-in [`LogWriter`] (feature `logging`) renders events through
//! `tracing` for development and demos; production embedders implement
//! [`Subscribe`] for their own metrics or audit sinks.

#[cfg(feature = "logging")]
mod log;
mod set;
mod subscribe;

#[cfg(feature = "logging")]
pub use log::LogWriter;
pub use set::SubscriberSet;
pub use subscribe::Subscribe;

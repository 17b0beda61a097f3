//! Runtime core: the controller loop and its public facade.
//!
//! The public API re-exported from here is [`Overseer`], [`OverseerBuilder`],
//! and [`Snapshot`]. Everything else is an internal building block the
//! facade wires together.
//!
//! ## Files & responsibilities
//! - **overseer.rs**: public facade; validates config, wires Bus and
//!   SubscriberSet, spawns the controller task; translates API calls into
//!   mailbox messages with oneshot replies.
//! - **controller.rs**: the event loop; sole mutator of the registry and
//!   the user handler; drives timers, release delivery, and shutdown.
//! - **registry.rs**: name-keyed labor map plus per-labor timer slots and
//!   retry bookkeeping.
//!
//! ## Event data-plane (who sends what)
//!
//! Into the mailbox:
//! - **Overseer (API)** → `StartChild`, `TerminateChild`, `CountChildren`,
//!   `Pair`, `Snapshot`, `Call`, `Cast`, `Info`, `Shutdown`
//! - **Transport integration** → `NodeUp`, `NodeDown`, `EndpointExit`,
//!   `Telemetry`
//! - **Timer sleepers** → `TimerFired{kind, epoch}`
//! - **Controller (self)** → `LoadRelease`
//! - **Load tasks** → `Loaded{result}`
//!
//! Out of the controller:
//! - lifecycle `Event`s on the broadcast bus (fan-out to subscribers and
//!   `Overseer::subscribe` receivers)
//! - user callbacks, invoked inline, one per step
//!
//! ## Wiring
//! ```text
//! Embedding code
//!   └─ builds Config/Release/Adapter, implements Handler,
//!      calls OverseerBuilder::start()
//!
//! OverseerBuilder::start()
//!   ├─ Config::validate()            (bad_start_spec, invalid_max_nodes)
//!   ├─ Bus + SubscriberSet + fan-out listener
//!   └─ spawn Controller::run()
//!
//! Controller::run()  (one message per step, FIFO)
//!   ├─ start_child      → cap check → adapter.spawn → arm conn timer
//!   ├─ node_up          → cancel conn → Loading → handle_connected → LoadRelease
//!   ├─ LoadRelease      → arm pair timer → spawn load task (connect/fetch/push/start)
//!   ├─ Loaded(Ok)       → Pairing
//!   ├─ Loaded(Err)      → retry with backoff, give up after load_retries
//!   ├─ pair             → cancel pair timer → Active
//!   ├─ exit             → Loading → LoadRelease (re-drive delivery)
//!   ├─ node_down        → Disconnected + fresh conn timer → handle_disconnected
//!   │                     (Terminated labors: handle_terminated + removal)
//!   ├─ conn timeout     → drop labor (handle_terminated only after a node_down)
//!   ├─ pair timeout     → retry like a failed load
//!   └─ shutdown         → cancel timers, terminate labors, handler.terminate
//! ```

mod controller;
mod overseer;
mod registry;

pub use overseer::{Overseer, OverseerBuilder, Snapshot};

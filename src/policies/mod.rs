//! Retry policies for re-driving the load/pair sequence:
//!  - [`BackoffPolicy`] for the delay between retries;
//!  - [`JitterPolicy`] for randomising those delays.
//!
//! When release delivery fails or a pairing window expires, the controller
//! schedules another attempt after `backoff.next(prev)`. Jitter spreads the
//! retries of many labors apart so a shared cause (a flaky artifact host,
//! a mass disconnect) does not produce synchronised retry storms.

mod backoff;
mod jitter;

pub use backoff::BackoffPolicy;
pub use jitter::JitterPolicy;

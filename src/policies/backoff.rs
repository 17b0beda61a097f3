//! # Backoff policy for load/pair retries.
//!
//! [`BackoffPolicy`] controls how the delay before the next load attempt
//! grows after repeated failures:
//! - [`BackoffPolicy::first`] the initial delay;
//! - [`BackoffPolicy::factor`] the multiplicative growth factor;
//! - [`BackoffPolicy::max`] the delay cap;
//! - [`BackoffPolicy::jitter`] optional randomisation.
//!
//! # Example
//! ```rust
//! use std::time::Duration;
//! use overseer::{BackoffPolicy, JitterPolicy};
//!
//! let backoff = BackoffPolicy {
//!     first: Duration::from_secs(1),
//!     max: Duration::from_secs(8),
//!     factor: 2.0,
//!     jitter: JitterPolicy::None,
//! };
//!
//! assert_eq!(backoff.next(None), Duration::from_secs(1));
//! assert_eq!(backoff.next(Some(Duration::from_secs(2))), Duration::from_secs(4));
//! // 6s * 2.0 = 12s, capped at max
//! assert_eq!(backoff.next(Some(Duration::from_secs(6))), Duration::from_secs(8));
//! ```

use std::time::Duration;

use crate::policies::jitter::JitterPolicy;

/// Delay policy for retrying release delivery and pairing.
#[derive(Clone, Copy, Debug)]
pub struct BackoffPolicy {
    /// Delay before the first retry.
    pub first: Duration,
    /// Cap applied to every computed delay.
    pub max: Duration,
    /// Multiplicative growth factor (`>= 1.0` recommended).
    pub factor: f64,
    /// Randomisation applied to the computed delay.
    pub jitter: JitterPolicy,
}

impl Default for BackoffPolicy {
    /// Returns a policy with `first = 1s`, `max = 30s`, `factor = 2.0`, and
    /// equal jitter.
    fn default() -> Self {
        Self {
            first: Duration::from_secs(1),
            max: Duration::from_secs(30),
            factor: 2.0,
            jitter: JitterPolicy::Equal,
        }
    }
}

impl BackoffPolicy {
    /// Computes the next delay from the previous one.
    ///
    /// With `prev = None` the result is `first` clamped to `max`; otherwise
    /// the previous delay is multiplied by `factor` and clamped to `max`.
    /// Jitter is applied last.
    pub fn next(&self, prev: Option<Duration>) -> Duration {
        let grown = match prev {
            None => self.first,
            Some(d) => {
                let scaled = d.as_secs_f64() * self.factor;
                if scaled.is_finite() {
                    d.mul_f64(self.factor)
                } else {
                    self.max
                }
            }
        };
        self.jitter.apply(grown.min(self.max))
    }
}

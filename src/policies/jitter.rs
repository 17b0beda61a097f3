//! # Jitter policy for retry delays.
//!
//! [`JitterPolicy`] randomises backoff delays so that labors whose loads
//! failed for a shared reason do not all retry in the same instant.
//!
//! - [`JitterPolicy::None`] exact delays, predictable timing
//! - [`JitterPolicy::Full`] random delay in `[0, d]`
//! - [`JitterPolicy::Equal`] `d/2 + random[0, d/2]` (balanced default)

use std::time::Duration;

use rand::Rng;

/// Randomisation applied to a computed backoff delay.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum JitterPolicy {
    /// Use the exact computed delay. Predictable; fine for tests and for
    /// pools with a single labor.
    None,
    /// Random delay in `[0, d]`. Maximum spreading, may retry much sooner
    /// than the computed delay.
    Full,
    /// `d/2` plus a random amount up to `d/2`. Keeps at least half of the
    /// computed delay while still de-correlating retries.
    Equal,
}

impl Default for JitterPolicy {
    /// Returns [`JitterPolicy::None`].
    fn default() -> Self {
        JitterPolicy::None
    }
}

impl JitterPolicy {
    /// Applies this policy to `delay`.
    pub fn apply(&self, delay: Duration) -> Duration {
        let ms = (delay.as_millis().min(u128::from(u64::MAX))) as u64;
        match self {
            JitterPolicy::None => delay,
            JitterPolicy::Full => {
                if ms == 0 {
                    Duration::ZERO
                } else {
                    Duration::from_millis(rand::rng().random_range(0..=ms))
                }
            }
            JitterPolicy::Equal => {
                let half = ms / 2;
                if half == 0 {
                    delay
                } else {
                    Duration::from_millis(half + rand::rng().random_range(0..=half))
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn equal_jitter_keeps_at_least_half() {
        let d = Duration::from_millis(1000);
        for _ in 0..50 {
            let j = JitterPolicy::Equal.apply(d);
            assert!(j >= Duration::from_millis(500));
            assert!(j <= d);
        }
    }

    #[test]
    fn full_jitter_never_exceeds_delay() {
        let d = Duration::from_millis(1000);
        for _ in 0..50 {
            assert!(JitterPolicy::Full.apply(d) <= d);
        }
    }
}

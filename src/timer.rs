//! # Named one-shot timers delivering events back to the controller.
//!
//! Each labor holds at most one timer of each [`TimerKind`]. Arming a slot
//! cancels whatever was armed before and bumps the slot's epoch; the fire
//! callback receives that epoch and the controller drops any fire whose
//! epoch no longer matches. Together with the phase precondition this makes
//! a cancelled timer's already-enqueued event a guaranteed no-op.
//!
//! Delivery is best-effort by design: the sleeper task races its
//! [`CancellationToken`] against the deadline and simply exits when
//! cancelled first.

use std::future::Future;
use std::time::Duration;

use tokio_util::sync::CancellationToken;

/// The two per-labor deadlines.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum TimerKind {
    /// Time-to-connect from spawn, time-to-reconnect from disconnect.
    Conn,
    /// Time from node-up for release delivery and the pair callback.
    Pair,
}

/// One timer slot: holds at most one armed timer of its kind.
#[derive(Default)]
pub(crate) struct TimerSlot {
    epoch: u64,
    token: Option<CancellationToken>,
}

impl TimerSlot {
    /// Arms the slot: cancels the previous timer, bumps the epoch, and
    /// spawns a sleeper that invokes `fire(epoch)` after `after` unless
    /// cancelled first.
    pub(crate) fn arm<F, Fut>(&mut self, after: Duration, fire: F)
    where
        F: FnOnce(u64) -> Fut + Send + 'static,
        Fut: Future<Output = ()> + Send + 'static,
    {
        self.cancel();
        self.epoch += 1;
        let epoch = self.epoch;
        let token = CancellationToken::new();
        let sleeper_token = token.clone();

        tokio::spawn(async move {
            tokio::select! {
                _ = sleeper_token.cancelled() => {}
                _ = tokio::time::sleep(after) => fire(epoch).await,
            }
        });

        self.token = Some(token);
    }

    /// Cancels the armed timer, if any.
    pub(crate) fn cancel(&mut self) {
        if let Some(token) = self.token.take() {
            token.cancel();
        }
    }

    /// True if a fire carrying `epoch` belongs to the currently armed timer.
    pub(crate) fn accepts(&self, epoch: u64) -> bool {
        self.token.is_some() && self.epoch == epoch
    }

    /// Marks the armed timer as consumed after an accepted fire.
    pub(crate) fn disarm(&mut self) {
        self.token = None;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;
    use tokio::sync::mpsc;

    #[tokio::test]
    async fn cancelled_timer_never_fires() {
        let (tx, mut rx) = mpsc::unbounded_channel();
        let mut slot = TimerSlot::default();
        slot.arm(Duration::from_millis(20), move |epoch| {
            let tx = tx.clone();
            async move {
                let _ = tx.send(epoch);
            }
        });
        slot.cancel();

        tokio::time::sleep(Duration::from_millis(60)).await;
        assert!(rx.try_recv().is_err());
    }

    #[tokio::test]
    async fn rearming_invalidates_the_previous_epoch() {
        let (tx, mut rx) = mpsc::unbounded_channel();
        let mut slot = TimerSlot::default();

        let tx1 = tx.clone();
        slot.arm(Duration::from_millis(500), move |epoch| {
            let tx = tx1.clone();
            async move {
                let _ = tx.send(epoch);
            }
        });
        let stale = 1;
        slot.arm(Duration::from_millis(10), move |epoch| {
            let tx = tx.clone();
            async move {
                let _ = tx.send(epoch);
            }
        });

        let fired = rx.recv().await.expect("second timer fires");
        assert_eq!(fired, 2);
        assert!(!slot.accepts(stale));
        assert!(slot.accepts(fired));
    }

    #[tokio::test]
    async fn zero_duration_fires_immediately() {
        let (tx, mut rx) = mpsc::unbounded_channel();
        let mut slot = TimerSlot::default();
        slot.arm(Duration::ZERO, move |epoch| {
            let tx = tx.clone();
            async move {
                let _ = tx.send(epoch);
            }
        });
        assert_eq!(rx.recv().await, Some(1));
    }
}

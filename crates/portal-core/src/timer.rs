// ── Workflow timers ──
//
// Timers never touch module state directly. When a deadline passes, a
// `TimerFired` message is queued for the session, which hands it back to
// the owning module on its own loop. Each slot holds at most one pending
// deadline; arming replaces it, and a generation counter makes sure a
// deadline that was replaced or cancelled can never be acted on.

use std::time::Duration;

use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::trace;

/// Delivered to the session when a deadline passes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TimerFired {
    /// Name of the module that armed the timer.
    pub owner: &'static str,
    pub generation: u64,
}

// ── TimerService ─────────────────────────────────────────────────────

/// Schedules deadlines onto the session's timer queue.
#[derive(Debug, Clone)]
pub struct TimerService {
    fired_tx: mpsc::UnboundedSender<TimerFired>,
}

impl TimerService {
    pub(crate) fn new(fired_tx: mpsc::UnboundedSender<TimerFired>) -> Self {
        Self { fired_tx }
    }

    fn schedule(&self, owner: &'static str, generation: u64, delay: Duration) -> JoinHandle<()> {
        let tx = self.fired_tx.clone();
        tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            trace!(owner, generation, "timer fired");
            // Session gone means nobody is waiting on this deadline.
            let _ = tx.send(TimerFired { owner, generation });
        })
    }
}

// ── TimerSlot ────────────────────────────────────────────────────────

/// A single cancellable deadline carrying a tag of type `T`.
#[derive(Debug)]
pub struct TimerSlot<T> {
    owner: &'static str,
    service: TimerService,
    generation: u64,
    pending: Option<(T, JoinHandle<()>)>,
}

impl<T> TimerSlot<T> {
    pub fn new(owner: &'static str, service: TimerService) -> Self {
        Self {
            owner,
            service,
            generation: 0,
            pending: None,
        }
    }

    /// Arm the slot, replacing any pending deadline.
    pub fn arm(&mut self, delay: Duration, tag: T) {
        self.cancel();
        self.generation += 1;
        let handle = self.service.schedule(self.owner, self.generation, delay);
        self.pending = Some((tag, handle));
    }

    /// Cancel the pending deadline. Safe to call when nothing is armed.
    pub fn cancel(&mut self) -> bool {
        match self.pending.take() {
            Some((_, handle)) => {
                handle.abort();
                true
            }
            None => false,
        }
    }

    pub fn is_armed(&self) -> bool {
        self.pending.is_some()
    }

    /// Claim a fired deadline.
    ///
    /// Returns the tag only if `fired` belongs to this slot and is the
    /// deadline currently armed. Anything else is stale.
    pub fn claim(&mut self, fired: TimerFired) -> Option<T> {
        if fired.owner != self.owner || fired.generation != self.generation {
            return None;
        }
        self.pending.take().map(|(tag, _)| tag)
    }
}

impl<T> Drop for TimerSlot<T> {
    fn drop(&mut self) {
        self.cancel();
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn slot() -> (TimerSlot<&'static str>, mpsc::UnboundedReceiver<TimerFired>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (TimerSlot::new("wifi", TimerService::new(tx)), rx)
    }

    #[tokio::test(start_paused = true)]
    async fn armed_deadline_fires_and_is_claimed_once() {
        let (mut slot, mut rx) = slot();
        slot.arm(Duration::from_secs(10), "scan");
        assert!(slot.is_armed());

        let fired = rx.recv().await.unwrap();
        assert_eq!(fired.owner, "wifi");
        assert_eq!(slot.claim(fired), Some("scan"));
        assert_eq!(slot.claim(fired), None);
        assert!(!slot.is_armed());
    }

    #[tokio::test(start_paused = true)]
    async fn rearming_invalidates_the_previous_deadline() {
        let (mut slot, mut rx) = slot();
        slot.arm(Duration::from_secs(1), "first");
        let stale = TimerFired {
            owner: "wifi",
            generation: 1,
        };
        slot.arm(Duration::from_secs(5), "second");

        assert_eq!(slot.claim(stale), None);

        let fired = rx.recv().await.unwrap();
        assert_eq!(fired.generation, 2);
        assert_eq!(slot.claim(fired), Some("second"));
    }

    #[tokio::test(start_paused = true)]
    async fn cancel_is_idempotent_and_silences_the_deadline() {
        let (mut slot, mut rx) = slot();
        slot.arm(Duration::from_secs(2), "connect");
        assert!(slot.cancel());
        assert!(!slot.cancel());

        tokio::time::sleep(Duration::from_secs(5)).await;
        assert!(rx.try_recv().is_err());
    }

    #[tokio::test(start_paused = true)]
    async fn foreign_owner_is_ignored() {
        let (mut slot, _rx) = slot();
        slot.arm(Duration::from_secs(1), "scan");
        let fired = TimerFired {
            owner: "mqtt",
            generation: 1,
        };
        assert_eq!(slot.claim(fired), None);
        assert!(slot.is_armed());
    }
}

//! Cancellable countdown and one-shot alarms used to drive a session.
//!
//! Both run as detached Tokio tasks that post messages back to the engine and
//! are aborted when their handle is dropped. Aborting cannot retract a message
//! already queued, so every message carries a [`Stamp`] the engine compares to
//! its own before acting.

use std::time::Duration;

use tokio::{
    sync::mpsc,
    task::JoinHandle,
    time::{Instant, MissedTickBehavior, interval_at, sleep},
};
use uuid::Uuid;

/// Identity of the session step a scheduled callback belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Stamp {
    /// Session instance; changes on "play again".
    pub session: Uuid,
    /// Bumped on every transition of that session.
    pub generation: u64,
}

/// Progress reported by a [`CountdownTimer`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Countdown {
    /// Seconds left after another tick; always at least 1.
    Tick(u32),
    /// Reached zero. Sent exactly once, as the last message.
    Expired,
}

/// Countdown from a fixed number of seconds, one decrement per interval.
#[derive(Debug)]
pub struct CountdownTimer {
    handle: JoinHandle<()>,
}

impl CountdownTimer {
    /// Start counting down from `limit_secs`, mapping each step through `message`.
    ///
    /// A limit of zero expires after the first interval.
    pub fn start<T, F>(limit_secs: u32, period: Duration, tx: mpsc::Sender<T>, message: F) -> Self
    where
        T: Send + 'static,
        F: Fn(Countdown) -> T + Send + 'static,
    {
        let handle = tokio::spawn(async move {
            let mut ticker = interval_at(Instant::now() + period, period);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

            let mut remaining = limit_secs;
            loop {
                ticker.tick().await;
                remaining = remaining.saturating_sub(1);

                let step = if remaining == 0 {
                    Countdown::Expired
                } else {
                    Countdown::Tick(remaining)
                };
                if tx.send(message(step)).await.is_err() || step == Countdown::Expired {
                    return;
                }
            }
        });

        Self { handle }
    }

    /// Stop the countdown; no further messages are sent.
    pub fn cancel(self) {
        drop(self);
    }
}

impl Drop for CountdownTimer {
    fn drop(&mut self) {
        self.handle.abort();
    }
}

/// One-shot delayed message.
#[derive(Debug)]
pub struct Alarm {
    handle: JoinHandle<()>,
}

impl Alarm {
    /// Deliver `message` on `tx` after `delay`, unless dropped first.
    pub fn schedule<T>(delay: Duration, tx: mpsc::Sender<T>, message: T) -> Self
    where
        T: Send + 'static,
    {
        let handle = tokio::spawn(async move {
            sleep(delay).await;
            let _ = tx.send(message).await;
        });

        Self { handle }
    }
}

impl Drop for Alarm {
    fn drop(&mut self) {
        self.handle.abort();
    }
}

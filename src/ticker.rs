//! Cancellable periodic trigger
//!
//! A single background task drives a tokio interval and hands each pulse to
//! the owner over a channel. The task is cancelled when the `Ticker` is
//! stopped or dropped, so nothing fires after the owner is gone.

use std::time::Duration;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio::time::{self, MissedTickBehavior};
use tokio_util::sync::CancellationToken;

/// Cadence of the countdown loop
pub const TICK_PERIOD: Duration = Duration::from_secs(1);

pub struct Ticker {
    ticks: mpsc::Receiver<()>,
    cancel: CancellationToken,
    task: JoinHandle<()>,
}

impl Ticker {
    /// Start ticking; the first tick is delivered immediately
    pub fn start(period: Duration) -> Self {
        let (tx, ticks) = mpsc::channel(1);
        let cancel = CancellationToken::new();
        let token = cancel.clone();

        let task = tokio::spawn(async move {
            let mut interval = time::interval(period);
            interval.set_missed_tick_behavior(MissedTickBehavior::Skip);

            loop {
                tokio::select! {
                    _ = token.cancelled() => break,
                    _ = interval.tick() => {}
                }

                tokio::select! {
                    _ = token.cancelled() => break,
                    sent = tx.send(()) => {
                        if sent.is_err() {
                            break;
                        }
                    }
                }
            }

            log::debug!("Ticker stopped");
        });

        Self {
            ticks,
            cancel,
            task,
        }
    }

    /// Wait for the next pulse; `None` once the ticker has stopped
    pub async fn tick(&mut self) -> Option<()> {
        self.ticks.recv().await
    }

    pub fn stop(&self) {
        self.cancel.cancel();
    }
}

impl Drop for Ticker {
    fn drop(&mut self) {
        self.cancel.cancel();
        self.task.abort();
    }
}

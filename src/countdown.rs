//! Countdown state machine
//!
//! The controller is driven by `tick` and never looks at the clock itself.
//! It moves from `Running` to `Ended` once per target and fires the
//! completion notifier on that edge only.

use crate::delta::{self, RemainingDuration};
use crate::instant::{Instant, TargetSpec};
use serde::{Deserialize, Serialize};

/// What the presentation layer renders
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "state", content = "remaining", rename_all = "lowercase")]
pub enum CountdownState {
    Running(RemainingDuration),
    Ended,
}

impl CountdownState {
    pub fn is_ended(&self) -> bool {
        matches!(self, CountdownState::Ended)
    }
}

impl Default for CountdownState {
    fn default() -> Self {
        CountdownState::Running(RemainingDuration::default())
    }
}

/// Fire-and-forget side effect run when a countdown ends
pub trait CompletionNotifier {
    fn notify(&self) -> anyhow::Result<()>;

    /// Block until anything started by `notify` has finished
    fn wait(&self) {}
}

pub struct CountdownController<N> {
    target: TargetSpec,
    state: CountdownState,
    notifier: N,
}

impl<N: CompletionNotifier> CountdownController<N> {
    pub fn new(target: TargetSpec, notifier: N) -> Self {
        warn_if_invalid(&target);
        Self {
            target,
            state: CountdownState::default(),
            notifier,
        }
    }

    /// Replace the target and re-arm, even if the previous one had ended
    ///
    /// A target naming the instant already armed keeps the current state, so
    /// an ended countdown stays ended and does not notify again.
    pub fn set_target(&mut self, target: TargetSpec) {
        if target.instant() == self.target.instant() {
            log::debug!("Countdown target unchanged at {}", target.instant());
            self.target = target;
            return;
        }

        warn_if_invalid(&target);
        log::info!("Countdown target set to {}", target.instant());
        self.target = target;
        self.state = CountdownState::default();
    }

    /// Evaluate the countdown at `now` and publish the result
    pub fn tick(&mut self, now: &Instant) -> &CountdownState {
        if self.state.is_ended() {
            return &self.state;
        }

        let target = self.target.instant();
        if now >= target {
            self.state = CountdownState::Ended;
            log::info!("Countdown to {} ended", target);
            if let Err(e) = self.notifier.notify() {
                log::warn!("Completion notification failed: {:#}", e);
            }
            return &self.state;
        }

        if !target.is_valid() {
            return &self.state;
        }

        match delta::compute(target, now) {
            Ok(remaining) => self.state = CountdownState::Running(remaining),
            Err(e) => log::warn!("Could not compute remaining time: {}", e),
        }

        &self.state
    }

    pub fn state(&self) -> &CountdownState {
        &self.state
    }

    pub fn target(&self) -> &TargetSpec {
        &self.target
    }

    pub fn has_ended(&self) -> bool {
        self.state.is_ended()
    }

    pub fn notifier(&self) -> &N {
        &self.notifier
    }
}

fn warn_if_invalid(target: &TargetSpec) {
    if !target.is_valid() {
        log::warn!(
            "Target {:?} is not a valid date, the countdown will not end",
            target.text()
        );
    }
}

#[cfg(test)]
pub(crate) mod testing {
    use super::CompletionNotifier;
    use std::cell::Cell;
    use std::rc::Rc;

    /// Counts notifications; clones share the count
    #[derive(Clone, Default)]
    pub struct CountingNotifier {
        count: Rc<Cell<u32>>,
        fail: bool,
    }

    impl CountingNotifier {
        pub fn failing() -> Self {
            Self {
                fail: true,
                ..Self::default()
            }
        }

        pub fn count(&self) -> u32 {
            self.count.get()
        }
    }

    impl CompletionNotifier for CountingNotifier {
        fn notify(&self) -> anyhow::Result<()> {
            self.count.set(self.count.get() + 1);
            if self.fail {
                anyhow::bail!("playback blocked");
            }
            Ok(())
        }
    }
}

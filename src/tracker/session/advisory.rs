use std::{sync::Arc, time::Duration};

/// Non-blocking notifications. They never change the session state.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Advisory {
    /// The user has been active for a while with nothing being tracked.
    MaybeWorking,
    /// A task has been running for another full reminder interval.
    StillWorking { task: Arc<str> },
}

/// Counts consecutive active ticks while nothing is tracked.
pub struct ActivityEvaluator {
    active_threshold: Duration,
    sustain_ticks: u32,
    active_ticks: u32,
}

impl ActivityEvaluator {
    pub fn new(active_threshold: Duration, sustain_ticks: u32) -> Self {
        Self {
            active_threshold,
            sustain_ticks: sustain_ticks.max(1),
            active_ticks: 0,
        }
    }

    /// Feeds one idle sample. Returns true once per sustained window of activity.
    pub fn observe(&mut self, idle: Duration) -> bool {
        if idle >= self.active_threshold {
            self.active_ticks = 0;
            return false;
        }
        self.active_ticks += 1;
        if self.active_ticks >= self.sustain_ticks {
            self.active_ticks = 0;
            return true;
        }
        false
    }

    pub fn reset(&mut self) {
        self.active_ticks = 0;
    }
}

/// Decides when to ask whether the user is still on the same task. Only one reminder may be
/// outstanding; the next one is held back until [StillWorkingReminder::dismiss] is called.
pub struct StillWorkingReminder {
    interval: chrono::Duration,
    announced_periods: i64,
    armed: bool,
}

impl StillWorkingReminder {
    pub fn new(interval: chrono::Duration) -> Self {
        Self {
            interval,
            announced_periods: 0,
            armed: true,
        }
    }

    /// Feeds the tracked duration of the running task. Crossing into a new whole interval fires
    /// the reminder, even if the tick at the exact boundary was skipped.
    pub fn observe(&mut self, tracked: chrono::Duration) -> bool {
        let interval = self.interval.num_seconds().max(1);
        let periods = tracked.num_seconds() / interval;
        if periods <= self.announced_periods {
            return false;
        }
        self.announced_periods = periods;
        if !self.armed {
            return false;
        }
        self.armed = false;
        true
    }

    pub fn dismiss(&mut self) {
        self.armed = true;
    }

    /// Called whenever a new working period starts.
    pub fn restart(&mut self) {
        self.announced_periods = 0;
    }
}

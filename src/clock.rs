use std::time::{Duration, Instant};

/// A monotonic time source.
///
/// Components never read wall time themselves; a driver samples the clock
/// and passes `now` into tick/pump calls, which keeps every timing decision
/// replayable in tests.
pub trait Clock {
    /// Time elapsed since the clock's own epoch.
    fn now(&self) -> Duration;
}

/// Wall-clock time since construction.
pub struct MonotonicClock {
    epoch: Instant,
}

impl MonotonicClock {
    pub fn new() -> Self {
        Self {
            epoch: Instant::now(),
        }
    }
}

impl Default for MonotonicClock {
    fn default() -> Self {
        Self::new()
    }
}

impl Clock for MonotonicClock {
    fn now(&self) -> Duration {
        self.epoch.elapsed()
    }
}

/// Manually advanced clock for offline export and deterministic tests.
pub struct StepClock {
    now: std::cell::Cell<Duration>,
}

impl StepClock {
    pub fn new() -> Self {
        Self {
            now: std::cell::Cell::new(Duration::ZERO),
        }
    }

    pub fn advance(&self, by: Duration) {
        self.now.set(self.now.get() + by);
    }

    pub fn set(&self, to: Duration) {
        self.now.set(to);
    }
}

impl Default for StepClock {
    fn default() -> Self {
        Self::new()
    }
}

impl Clock for StepClock {
    fn now(&self) -> Duration {
        self.now.get()
    }
}

use std::sync::Mutex;
use std::time::{Duration, Instant};

/// Monotonic time provider shared by the decoder's poller and the key inputs.
pub trait Clock: Send + Sync {
    fn now(&self) -> Instant;
}

pub struct MonotonicClock {}

impl MonotonicClock {
    pub fn new() -> Self {
        Self {}
    }
}

impl Clock for MonotonicClock {
    fn now(&self) -> Instant {
        Instant::now()
    }
}

/// A clock that only moves when told to. Lets keying sequences be replayed with exact timing.
pub struct ManualClock {
    now: Mutex<Instant>,
}

impl ManualClock {
    pub fn new() -> Self {
        Self { now: Mutex::new(Instant::now()) }
    }

    pub fn starting_at(start: Instant) -> Self {
        Self { now: Mutex::new(start) }
    }

    pub fn advance(&self, by: Duration) -> Instant {
        let mut now = self.now.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
        *now += by;
        *now
    }

    pub fn advance_ms(&self, ms: u64) -> Instant {
        self.advance(Duration::from_millis(ms))
    }
}

impl Clock for ManualClock {
    fn now(&self) -> Instant {
        *self.now.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

/// Milliseconds between two instants, as used by the timing thresholds. Computed from whole
/// microseconds so that exact millisecond durations compare exactly against the thresholds.
/// An `earlier` that is actually later gives zero.
pub fn elapsed_ms(earlier: Instant, later: Instant) -> f64 {
    later.saturating_duration_since(earlier).as_micros() as f64 / 1000.0
}

#[cfg(test)]
#[path = "./clock_spec.rs"]
mod clock_spec;

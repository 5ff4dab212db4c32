use std::sync::Mutex;
use std::time::{Duration, Instant};

/// Monotonic time source used by the execution loop's yield policy.
pub trait Clock: Send + Sync {
    fn now(&self) -> Duration;

    fn pause(&self, duration: Duration) {
        if duration.is_zero() {
            std::thread::yield_now();
        } else {
            std::thread::sleep(duration);
        }
    }
}

/// Wall clock measured from the moment it was created.
#[derive(Debug)]
pub struct SystemClock {
    origin: Instant,
}

impl SystemClock {
    pub fn new() -> Self {
        Self {
            origin: Instant::now(),
        }
    }
}

impl Default for SystemClock {
    fn default() -> Self {
        Self::new()
    }
}

impl Clock for SystemClock {
    fn now(&self) -> Duration {
        self.origin.elapsed()
    }
}

/// Clock that advances by a fixed tick every time it is read and never sleeps.
#[derive(Debug)]
pub struct ManualClock {
    tick: Duration,
    state: Mutex<ManualClockState>,
}

#[derive(Debug, Default)]
struct ManualClockState {
    now: Duration,
    paused: Vec<Duration>,
}

impl ManualClock {
    pub fn new(tick: Duration) -> Self {
        Self {
            tick,
            state: Mutex::new(ManualClockState::default()),
        }
    }

    /// Pauses requested so far, in order.
    pub fn pauses(&self) -> Vec<Duration> {
        self.state
            .lock()
            .map(|state| state.paused.clone())
            .unwrap_or_default()
    }
}

impl Clock for ManualClock {
    fn now(&self) -> Duration {
        match self.state.lock() {
            Ok(mut state) => {
                let now = state.now;
                state.now += self.tick;
                now
            }
            Err(poisoned) => poisoned.into_inner().now,
        }
    }

    fn pause(&self, duration: Duration) {
        if let Ok(mut state) = self.state.lock() {
            state.paused.push(duration);
        }
    }
}

pub(crate) fn millis(duration: Duration) -> u64 {
    duration.as_millis().min(u64::MAX as u128) as u64
}

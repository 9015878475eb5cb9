use std::time::{Duration, Instant};

use esc_motor::TimeSource;
use spin_sleep::SpinSleeper;

/// Wall-clock time source for the host.
///
/// Ramp steps and reversal dwells are a few milliseconds to a few hundred, where
/// `thread::sleep` overshoots noticeably; `SpinSleeper` sleeps coarse and spins the rest.
#[derive(Debug, Clone)]
pub struct SpinClock {
    origin: Instant,
    sleeper: SpinSleeper,
}

impl SpinClock {
    pub fn new() -> Self {
        Self {
            origin: Instant::now(),
            sleeper: SpinSleeper::new(100_000),
        }
    }
}

impl Default for SpinClock {
    fn default() -> Self {
        Self::new()
    }
}

impl TimeSource for SpinClock {
    fn now(&self) -> Duration {
        self.origin.elapsed()
    }

    fn sleep(&mut self, duration: Duration) {
        self.sleeper.sleep(duration);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_now_is_monotonic() {
        let clock = SpinClock::new();
        let a = clock.now();
        let b = clock.now();
        assert!(b >= a);
    }

    #[test]
    fn test_sleep_waits_at_least_duration() {
        let mut clock = SpinClock::new();
        let start = clock.now();
        clock.sleep(Duration::from_millis(5));
        assert!(clock.now() - start >= Duration::from_millis(5));
    }
}

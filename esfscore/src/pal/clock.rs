//! Clock platform capability (Secure Core, C1).

use std::time::{Duration, Instant, SystemTime, UNIX_EPOCH};

/// Earliest wall-clock time ESFS will accept as "now" — a device whose
/// clock has not yet been set by the network cannot have a meaningful
/// file timestamp. Chosen as 2016-01-01T00:00:00Z, a provisioning-era
/// floor comfortably before any device of this class shipped.
pub const PAL_MIN_SEC_FROM_EPOCH: u64 = 1_451_606_400;

pub trait Clock {
    fn monotonic_micros(&self) -> u64;
    fn wall_clock_secs(&self) -> u64;
    fn sleep(&self, duration: Duration);
}

pub struct SystemClock {
    start: Instant,
}

impl Default for SystemClock {
    fn default() -> Self {
        Self {
            start: Instant::now(),
        }
    }
}

impl Clock for SystemClock {
    fn monotonic_micros(&self) -> u64 {
        self.start.elapsed().as_micros() as u64
    }

    fn wall_clock_secs(&self) -> u64 {
        SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_secs())
            .unwrap_or(0)
            .max(PAL_MIN_SEC_FROM_EPOCH)
    }

    fn sleep(&self, duration: Duration) {
        std::thread::sleep(duration);
    }
}

/// A clock that never actually sleeps, so the factory-reset init retry
/// loop (up to 100 iterations of 50ms) can be exercised in
/// unit tests without adding five seconds to the test suite.
#[derive(Default)]
pub struct InstantClock {
    micros: std::cell::Cell<u64>,
}

impl Clock for InstantClock {
    fn monotonic_micros(&self) -> u64 {
        self.micros.get()
    }

    fn wall_clock_secs(&self) -> u64 {
        PAL_MIN_SEC_FROM_EPOCH
    }

    fn sleep(&self, duration: Duration) {
        self.micros.set(self.micros.get() + duration.as_micros() as u64);
    }
}

//! Time sources for the receiver pipeline.
//!
//! Receipt times are wall-clock epoch seconds; rate windows and replay pacing
//! use a monotonic instant.

use std::time::{Duration, Instant};

use parking_lot::Mutex;

/// Source of wall-clock and monotonic time.
pub trait Clock: Send + Sync {
    /// Current wall-clock time as epoch seconds.
    fn wall_time(&self) -> f64;

    /// Current monotonic instant.
    fn monotonic(&self) -> Instant;
}

/// Clock backed by the operating system.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn wall_time(&self) -> f64 {
        chrono::Utc::now().timestamp_micros() as f64 / 1_000_000.0
    }

    fn monotonic(&self) -> Instant {
        Instant::now()
    }
}

/// Manually advanced clock for reproducible tests.
///
/// Wall and monotonic time move together and only forward.
#[derive(Debug)]
pub struct ManualClock {
    start_wall: f64,
    start_instant: Instant,
    elapsed: Mutex<Duration>,
}

impl ManualClock {
    /// Creates a clock reading `start_wall` epoch seconds.
    pub fn new(start_wall: f64) -> Self {
        Self {
            start_wall,
            start_instant: Instant::now(),
            elapsed: Mutex::new(Duration::ZERO),
        }
    }

    pub fn advance(&self, duration: Duration) {
        *self.elapsed.lock() += duration;
    }

    /// Time advanced since creation.
    pub fn elapsed(&self) -> Duration {
        *self.elapsed.lock()
    }
}

impl Clock for ManualClock {
    fn wall_time(&self) -> f64 {
        self.start_wall + self.elapsed().as_secs_f64()
    }

    fn monotonic(&self) -> Instant {
        self.start_instant + self.elapsed()
    }
}

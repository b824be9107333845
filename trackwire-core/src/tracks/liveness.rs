//! Staleness classification for tracks.

use std::time::Duration;

use super::store::Track;

/// Seconds without a message after which a track is stale.
pub const DEFAULT_STALE_THRESHOLD_SECS: f64 = 2.0;

/// Returns true if the track never received a message or has been silent
/// for longer than `threshold_secs`.
pub fn is_stale(track: &Track, now: f64, threshold_secs: f64) -> bool {
    let last = track.last_rx_time();
    last <= 0.0 || now - last > threshold_secs
}

/// Holds the configured staleness threshold.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LivenessMonitor {
    threshold_secs: f64,
}

impl Default for LivenessMonitor {
    fn default() -> Self {
        Self {
            threshold_secs: DEFAULT_STALE_THRESHOLD_SECS,
        }
    }
}

impl LivenessMonitor {
    pub fn new(threshold: Duration) -> Self {
        Self {
            threshold_secs: threshold.as_secs_f64(),
        }
    }

    pub fn threshold_secs(&self) -> f64 {
        self.threshold_secs
    }

    pub fn is_stale(&self, track: &Track, now: f64) -> bool {
        is_stale(track, now, self.threshold_secs)
    }
}

//! Sequence-gap accounting and message rate estimation.
//!
//! The transport is lossy and unordered, so sequence numbers at or below the
//! highest one seen are tolerated silently. Only forward jumps larger than one
//! contribute to the drop estimate.

use std::time::{Duration, Instant};

/// Minimum window length before a new rate estimate is published.
pub const RATE_WINDOW: Duration = Duration::from_secs(1);

/// How an accepted sequence number related to the ones before it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SeqObservation {
    /// First sequence number ever seen.
    First,
    /// Moved forward; `missing` numbers were skipped.
    Advanced { missing: u64 },
    /// Equal to or below the highest seen (same tick, reorder, or replay).
    NotNewer,
}

/// Accounting over the stream of accepted messages.
#[derive(Debug, Clone, Default)]
pub struct SequenceTracker {
    max_seq_seen: Option<i64>,
    estimated_drops: u64,
    window_start: Option<Instant>,
    window_count: u64,
    rate: f64,
}

impl SequenceTracker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Records one accepted message carrying `seq`.
    pub fn observe(&mut self, seq: i64) -> SeqObservation {
        self.window_count += 1;

        let Some(max_seen) = self.max_seq_seen else {
            self.max_seq_seen = Some(seq);
            return SeqObservation::First;
        };

        if seq <= max_seen {
            return SeqObservation::NotNewer;
        }

        let missing = seq.abs_diff(max_seen) - 1;
        if missing > 0 {
            self.estimated_drops += missing;
            tracing::debug!(seq, max_seen, missing, "Sequence gap detected");
        }
        self.max_seq_seen = Some(seq);
        SeqObservation::Advanced { missing }
    }

    /// Publishes a new rate once at least [`RATE_WINDOW`] has elapsed.
    ///
    /// The first call only opens the window; messages observed before it are
    /// not counted. Returns the new estimate when one was computed.
    pub fn update_rate(&mut self, now: Instant) -> Option<f64> {
        let Some(start) = self.window_start else {
            self.window_start = Some(now);
            self.window_count = 0;
            return None;
        };

        let elapsed = now.saturating_duration_since(start);
        if elapsed < RATE_WINDOW {
            return None;
        }

        self.rate = self.window_count as f64 / elapsed.as_secs_f64();
        self.window_count = 0;
        self.window_start = Some(now);
        Some(self.rate)
    }

    pub fn max_seq_seen(&self) -> Option<i64> {
        self.max_seq_seen
    }

    pub fn estimated_drops(&self) -> u64 {
        self.estimated_drops
    }

    /// Most recent rate estimate in messages per second.
    pub fn rate(&self) -> f64 {
        self.rate
    }

    /// Forgets all history, e.g. when switching to replay.
    pub fn reset(&mut self) {
        *self = Self::default();
    }
}

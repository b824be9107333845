//! Per-entity track state derived from accepted telemetry.
//!
//! Tracks are created on first sight and never removed individually.
//! Staleness is derived on query by the liveness monitor.

pub mod liveness;
pub mod store;

pub use liveness::{DEFAULT_STALE_THRESHOLD_SECS, LivenessMonitor, is_stale};
pub use store::{DEFAULT_HISTORY_CAPACITY, Position, Track, TrackReport, TrackStore};

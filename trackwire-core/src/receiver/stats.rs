//! Receiver counters and status reporting.

use std::fmt;

use serde::Serialize;

/// Per-outcome counters for everything the receiver handled.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct IngestStats {
    /// EntityState messages applied to the track store
    pub accepted: u64,
    /// Payloads that were not a UTF-8 JSON object
    pub decode_errors: u64,
    /// Objects rejected for missing or non-numeric fields
    pub validation_errors: u64,
    /// Well-formed messages of other kinds
    pub ignored: u64,
    /// Live datagrams drained and dropped while replay was active
    pub discarded_during_replay: u64,
    /// Accepted messages that could not be written to the capture file
    pub capture_failures: u64,
}

/// Whether the receiver is fed by the transport or by a replay.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum ReceiverMode {
    Live,
    Replay,
}

impl fmt::Display for ReceiverMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Live => write!(f, "LIVE"),
            Self::Replay => write!(f, "REPLAY"),
        }
    }
}

/// Point-in-time summary of a receiver, for status lines and overlays.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ReceiverStatus {
    pub mode: ReceiverMode,
    pub recording: bool,
    pub tracks: usize,
    pub stale_tracks: usize,
    pub rate: f64,
    pub max_seq_seen: Option<i64>,
    pub estimated_drops: u64,
    pub ingest: IngestStats,
}

/// Items handled during one receiver tick.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TickSummary {
    /// Datagrams read from the transport (including discarded ones)
    pub received: usize,
    /// Items released by the replay scheduler
    pub replayed: usize,
    /// Messages applied to the track store
    pub accepted: usize,
    /// Decode or validation failures
    pub rejected: usize,
}

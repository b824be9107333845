//! Capture and replay of the accepted message stream.
//!
//! Captures are JSON Lines files: one accepted message object per line with
//! its receipt time injected as `_rx_time` (epoch seconds).

pub mod recorder;
pub mod replay;

use std::path::PathBuf;

pub use recorder::CaptureRecorder;
pub use replay::{ReplayItem, ReplayLoadSummary, ReplayScheduler};

/// Field holding the receipt wall-clock time in capture records.
pub const RX_TIME_FIELD: &str = "_rx_time";

/// Errors raised while writing a capture.
#[derive(Debug, thiserror::Error)]
pub enum CaptureError {
    #[error("Cannot open capture file {path}: {source}")]
    Open {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to write capture record: {0}")]
    Write(#[from] std::io::Error),

    #[error("Failed to serialize capture record: {0}")]
    Serialize(#[from] serde_json::Error),
}

/// Errors raised while loading a capture for replay.
#[derive(Debug, thiserror::Error)]
pub enum ReplayLoadError {
    #[error("Cannot read capture file {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Capture file {path} contains no valid records")]
    NoData { path: PathBuf },
}

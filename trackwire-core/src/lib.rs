//! Trackwire Core - entity telemetry ingestion, tracks, capture and replay
//!
//! This crate holds everything the receiver side of a Trackwire link needs:
//! the `EntityState` wire model and codec, the track store with staleness
//! detection, sequence-gap and rate accounting, the JSON Lines capture
//! recorder, the timing-preserving replay scheduler, and the datagram
//! transport seams shared with the simulated sender.

pub mod capture;
pub mod clock;
pub mod config;
pub mod protocol;
pub mod receiver;
pub mod sequence;
pub mod tracing_setup;
pub mod tracks;
pub mod transport;

// Re-export main types for convenient access
pub use capture::{CaptureError, CaptureRecorder, ReplayLoadError, ReplayScheduler};
pub use clock::{Clock, ManualClock, SystemClock};
pub use config::{ReceiverConfig, SenderConfig, TrackwireConfig};
pub use protocol::{CodecError, DecodeError, EntityId, EntityState, ValidationError};
pub use receiver::{Ingested, Receiver, ReceiverMode, ReceiverStatus};
pub use sequence::SequenceTracker;
pub use tracks::{LivenessMonitor, Track, TrackReport, TrackStore};
pub use transport::{DatagramSink, DatagramSource, TransportError};

/// Errors that can bubble up from any Trackwire subsystem.
#[derive(Debug, thiserror::Error)]
pub enum TrackwireError {
    #[error("Codec error: {0}")]
    Codec(#[from] CodecError),

    #[error("Capture error: {0}")]
    Capture(#[from] CaptureError),

    #[error("Replay error: {0}")]
    Replay(#[from] ReplayLoadError),

    #[error("Transport error: {0}")]
    Transport(#[from] TransportError),

    #[error("Configuration error: {reason}")]
    Configuration { reason: String },

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl TrackwireError {
    /// Returns a user-friendly error message suitable for display.
    pub fn user_message(&self) -> String {
        match self {
            TrackwireError::Codec(_) => "Received a malformed telemetry message".to_string(),
            TrackwireError::Capture(CaptureError::Open { path, .. }) => {
                format!("Could not open capture file {}", path.display())
            }
            TrackwireError::Capture(_) => "Capture recording failed".to_string(),
            TrackwireError::Replay(ReplayLoadError::NoData { path }) => {
                format!("No replayable records in {}", path.display())
            }
            TrackwireError::Replay(ReplayLoadError::Read { path, .. }) => {
                format!("Could not read capture file {}", path.display())
            }
            TrackwireError::Transport(TransportError::Bind { addr, .. }) => {
                format!("Could not bind UDP socket on {addr}")
            }
            TrackwireError::Transport(_) => "Network send failed".to_string(),
            TrackwireError::Configuration { reason } => format!("Invalid configuration: {reason}"),
            TrackwireError::Io(_) => "File system error occurred".to_string(),
        }
    }

    /// Checks if this error stems from user-supplied input.
    pub fn is_user_error(&self) -> bool {
        matches!(
            self,
            TrackwireError::Configuration { .. }
                | TrackwireError::Replay(_)
                | TrackwireError::Capture(CaptureError::Open { .. })
        )
    }
}

pub type Result<T> = std::result::Result<T, TrackwireError>;

#[cfg(test)]
mod tests {
    use std::path::PathBuf;

    use super::*;

    #[test]
    fn test_user_messages_name_the_resource() {
        let error = TrackwireError::from(ReplayLoadError::NoData {
            path: PathBuf::from("run.jsonl"),
        });
        assert_eq!(error.user_message(), "No replayable records in run.jsonl");
        assert!(error.is_user_error());

        let bind = TrackwireError::from(TransportError::Bind {
            addr: "127.0.0.1:30001".parse().unwrap(),
            source: std::io::Error::from(std::io::ErrorKind::AddrInUse),
        });
        assert_eq!(bind.user_message(), "Could not bind UDP socket on 127.0.0.1:30001");
        assert!(!bind.is_user_error());
    }
}

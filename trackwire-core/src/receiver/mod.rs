//! Receiver ingestion pipeline.
//!
//! Each tick drains a bounded number of datagrams (or releases a bounded
//! number of replay items) and feeds them synchronously through
//! codec → sequence tracker → track store → capture recorder, then updates the
//! rate window. Nothing here blocks and nothing is retried: a bad payload is
//! counted, logged and dropped.

mod stats;

use std::path::Path;
use std::sync::Arc;

use serde_json::{Map, Value};

pub use stats::{IngestStats, ReceiverMode, ReceiverStatus, TickSummary};

use crate::capture::{
    CaptureError, CaptureRecorder, ReplayLoadError, ReplayLoadSummary, ReplayScheduler,
};
use crate::clock::{Clock, SystemClock};
use crate::config::ReceiverConfig;
use crate::protocol::codec::{interpret_object, parse_object};
use crate::protocol::{CodecError, Decoded, EntityId, InboundMessage, ValidationError};
use crate::sequence::SequenceTracker;
use crate::tracks::{LivenessMonitor, Track, TrackReport, TrackStore};
use crate::transport::{DatagramSource, MAX_DATAGRAM_SIZE};

/// What happened to a single ingested message.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Ingested {
    Accepted {
        entity_id: EntityId,
        seq: i64,
        new_track: bool,
    },
    Ignored,
}

/// Owns all receiver-side state for one telemetry stream.
pub struct Receiver {
    config: ReceiverConfig,
    clock: Arc<dyn Clock>,
    tracks: TrackStore,
    liveness: LivenessMonitor,
    sequence: SequenceTracker,
    recorder: CaptureRecorder,
    replay: Option<ReplayScheduler>,
    stats: IngestStats,
}

impl Receiver {
    /// Creates a receiver using the system clock.
    pub fn new(config: ReceiverConfig) -> Self {
        Self::with_clock(config, Arc::new(SystemClock))
    }

    pub fn with_clock(config: ReceiverConfig, clock: Arc<dyn Clock>) -> Self {
        Self {
            tracks: TrackStore::new(config.history_capacity),
            liveness: LivenessMonitor::new(config.stale_threshold),
            sequence: SequenceTracker::new(),
            recorder: CaptureRecorder::new(),
            replay: None,
            stats: IngestStats::default(),
            clock,
            config,
        }
    }

    /// Decodes and applies one raw datagram.
    ///
    /// Failures are already counted and logged; the error is returned only so
    /// callers can surface it if they care.
    ///
    /// # Errors
    ///
    /// - `CodecError::Decode` - If the payload is not a UTF-8 JSON object
    /// - `CodecError::Validation` - If required fields are missing or not numeric
    pub fn ingest_datagram(&mut self, payload: &[u8]) -> Result<Ingested, CodecError> {
        let object = parse_object(payload).inspect_err(|error| {
            self.stats.decode_errors += 1;
            tracing::debug!(%error, len = payload.len(), "Dropping undecodable datagram");
        })?;
        Ok(self.ingest_object(object)?)
    }

    /// Validates and applies one decoded JSON object.
    ///
    /// # Errors
    ///
    /// - `ValidationError` - If required fields are missing or not numeric
    pub fn ingest_object(&mut self, object: Map<String, Value>) -> Result<Ingested, ValidationError> {
        match interpret_object(object) {
            Ok(Decoded::Entity(message)) => Ok(self.accept(message)),
            Ok(Decoded::Ignored { msg_type }) => {
                self.stats.ignored += 1;
                tracing::trace!(?msg_type, "Ignoring non-EntityState message");
                Ok(Ingested::Ignored)
            }
            Err(error) => {
                self.stats.validation_errors += 1;
                tracing::debug!(%error, "Rejecting invalid EntityState");
                Err(error)
            }
        }
    }

    fn accept(&mut self, message: InboundMessage) -> Ingested {
        let rx_time = self.clock.wall_time();
        let InboundMessage { state, raw } = message;

        self.sequence.observe(state.seq);
        let new_track = self.tracks.upsert(&state, rx_time);
        if new_track {
            tracing::info!(entity_id = %state.entity_id, "New track");
        }

        if let Err(error) = self.recorder.write(&raw, rx_time) {
            self.stats.capture_failures += 1;
            tracing::warn!(%error, "Capture write failed, stopping recording");
            self.recorder.stop();
        }

        self.stats.accepted += 1;
        Ingested::Accepted {
            entity_id: state.entity_id,
            seq: state.seq,
            new_track,
        }
    }

    /// Runs one cooperative loop iteration.
    ///
    /// In live mode up to `max_messages_per_poll` pending datagrams are applied;
    /// the rest stay queued in the transport. In replay mode pending datagrams
    /// are drained and discarded and due replay items are applied instead.
    pub fn tick<S: DatagramSource + ?Sized>(&mut self, source: &mut S) -> TickSummary {
        let max = self.config.max_messages_per_poll.max(1);
        let replaying = self.replay.is_some();
        let mut summary = TickSummary::default();
        let mut buf = [0u8; MAX_DATAGRAM_SIZE];

        while summary.received < max {
            let len = match source.recv_pending(&mut buf) {
                Ok(Some(len)) => len,
                Ok(None) => break,
                Err(error) => {
                    tracing::warn!(%error, "Datagram receive failed");
                    break;
                }
            };
            summary.received += 1;

            if replaying {
                self.stats.discarded_during_replay += 1;
                continue;
            }
            match self.ingest_datagram(&buf[..len]) {
                Ok(Ingested::Accepted { .. }) => summary.accepted += 1,
                Ok(Ingested::Ignored) => {}
                Err(_) => summary.rejected += 1,
            }
        }

        if replaying {
            self.release_replay(&mut summary, max);
        }

        if let Some(rate) = self.sequence.update_rate(self.clock.monotonic()) {
            tracing::trace!(rate, "Rate window closed");
        }
        summary
    }

    fn release_replay(&mut self, summary: &mut TickSummary, max: usize) {
        let now = self.clock.monotonic();
        let Some(replay) = self.replay.as_mut() else {
            return;
        };
        let bodies = replay.poll(now, max);
        let finished = !replay.is_active();

        for body in bodies {
            summary.replayed += 1;
            match self.ingest_object(body) {
                Ok(Ingested::Accepted { .. }) => summary.accepted += 1,
                Ok(Ingested::Ignored) => {}
                Err(_) => summary.rejected += 1,
            }
        }

        if finished {
            self.replay = None;
        }
    }

    /// Starts writing accepted messages to `path`.
    ///
    /// # Errors
    ///
    /// - `CaptureError::Open` - If the capture file cannot be opened
    pub fn start_recording(&mut self, path: impl AsRef<Path>) -> Result<(), CaptureError> {
        self.recorder.start(path)
    }

    pub fn stop_recording(&mut self) {
        self.recorder.stop();
    }

    /// Loads a capture and switches to replay mode.
    ///
    /// The capture is loaded before anything is touched, so a failed load
    /// leaves tracks, counters and mode exactly as they were. On success the
    /// track store and sequence accounting are cleared.
    ///
    /// # Errors
    ///
    /// - `ReplayLoadError::Read` - If the capture file cannot be read
    /// - `ReplayLoadError::NoData` - If the capture holds no valid records
    pub fn start_replay(
        &mut self,
        path: impl AsRef<Path>,
    ) -> Result<ReplayLoadSummary, ReplayLoadError> {
        let mut scheduler = ReplayScheduler::new();
        let summary = scheduler.load(path)?;

        self.tracks.clear();
        self.sequence.reset();
        scheduler.start(self.clock.monotonic());
        self.replay = Some(scheduler);

        tracing::info!(
            items = summary.loaded,
            duration_secs = summary.duration_secs,
            "Replay started"
        );
        Ok(summary)
    }

    /// Leaves replay mode. Tracks built from the replay are kept.
    pub fn stop_replay(&mut self) {
        if let Some(mut replay) = self.replay.take() {
            replay.stop();
            tracing::info!(released = replay.released(), "Replay stopped");
        }
    }

    /// Stops replay and releases the capture file.
    pub fn shutdown(&mut self) {
        self.stop_replay();
        self.recorder.stop();
        tracing::info!(
            accepted = self.stats.accepted,
            decode_errors = self.stats.decode_errors,
            validation_errors = self.stats.validation_errors,
            estimated_drops = self.sequence.estimated_drops(),
            "Receiver shut down"
        );
    }

    pub fn mode(&self) -> ReceiverMode {
        if self.replay.is_some() {
            ReceiverMode::Replay
        } else {
            ReceiverMode::Live
        }
    }

    pub fn is_recording(&self) -> bool {
        self.recorder.is_enabled()
    }

    pub fn tracks(&self) -> &TrackStore {
        &self.tracks
    }

    pub fn sequence(&self) -> &SequenceTracker {
        &self.sequence
    }

    pub fn stats(&self) -> &IngestStats {
        &self.stats
    }

    pub fn config(&self) -> &ReceiverConfig {
        &self.config
    }

    pub fn liveness(&self) -> &LivenessMonitor {
        &self.liveness
    }

    /// Sorted ids of every known track.
    pub fn track_ids(&self) -> Vec<EntityId> {
        self.tracks.all_ids()
    }

    pub fn snapshot(&self, entity_id: EntityId) -> Option<Track> {
        self.tracks.snapshot(entity_id)
    }

    /// One track with its staleness at the current time.
    pub fn report(&self, entity_id: EntityId) -> Option<TrackReport> {
        self.tracks.report(entity_id, &self.liveness, self.clock.wall_time())
    }

    /// Every track with its staleness at the current time, sorted by id.
    pub fn track_reports(&self) -> Vec<TrackReport> {
        self.tracks.reports(&self.liveness, self.clock.wall_time())
    }

    pub fn status(&self) -> ReceiverStatus {
        let now = self.clock.wall_time();
        ReceiverStatus {
            mode: self.mode(),
            recording: self.recorder.is_enabled(),
            tracks: self.tracks.len(),
            stale_tracks: self.tracks.stale_count(&self.liveness, now),
            rate: self.sequence.rate(),
            max_seq_seen: self.sequence.max_seq_seen(),
            estimated_drops: self.sequence.estimated_drops(),
            ingest: self.stats,
        }
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use serde_json::json;

    use super::*;
    use crate::clock::ManualClock;
    use crate::transport::MemoryDatagrams;

    fn receiver_with_clock() -> (Receiver, Arc<ManualClock>) {
        let clock = Arc::new(ManualClock::new(1_700_000_000.0));
        let receiver = Receiver::with_clock(ReceiverConfig::default(), clock.clone());
        (receiver, clock)
    }

    fn datagram(id: u64, seq: i64) -> Vec<u8> {
        serde_json::to_vec(&json!({
            "msg_type": "EntityState",
            "entity_id": id,
            "x": 10, "y": 10, "heading_deg": 0, "speed": 0,
            "status": "OK",
            "seq": seq
        }))
        .unwrap()
    }

    #[test]
    fn test_single_message_creates_live_track() {
        let (mut receiver, _clock) = receiver_with_clock();

        let outcome = receiver.ingest_datagram(&datagram(42, 1)).unwrap();
        assert_eq!(
            outcome,
            Ingested::Accepted {
                entity_id: EntityId::new(42),
                seq: 1,
                new_track: true
            }
        );

        assert_eq!(receiver.track_ids(), vec![EntityId::new(42)]);
        let track = receiver.snapshot(EntityId::new(42)).unwrap();
        assert_eq!(track.history_len(), 1);

        let reports = receiver.track_reports();
        assert_eq!(reports.len(), 1);
        assert!(!reports[0].stale);
    }

    #[test]
    fn test_failures_are_counted_and_dropped() {
        let (mut receiver, _clock) = receiver_with_clock();
        let mut source = MemoryDatagrams::new();
        source.push(b"\xff\xfe".to_vec());
        source.push(b"{\"msg_type\":".to_vec());
        source.push(br#"{"msg_type":"EntityState","entity_id":1,"x":"?","y":0,"heading_deg":0,"speed":0,"seq":1}"#.to_vec());
        source.push(br#"{"msg_type":"Heartbeat"}"#.to_vec());
        source.push(datagram(7, 3));

        let summary = receiver.tick(&mut source);

        assert_eq!(summary.received, 5);
        assert_eq!(summary.accepted, 1);
        assert_eq!(summary.rejected, 3);

        let stats = receiver.stats();
        assert_eq!(stats.decode_errors, 2);
        assert_eq!(stats.validation_errors, 1);
        assert_eq!(stats.ignored, 1);
        assert_eq!(stats.accepted, 1);
        assert_eq!(receiver.tracks().len(), 1);
    }

    #[test]
    fn test_drain_is_bounded_per_tick() {
        let clock = Arc::new(ManualClock::new(1.0e9));
        let config = ReceiverConfig {
            max_messages_per_poll: 3,
            ..ReceiverConfig::default()
        };
        let mut receiver = Receiver::with_clock(config, clock);
        let mut source = MemoryDatagrams::new();
        for id in 0..5 {
            source.push(datagram(id, 1));
        }

        assert_eq!(receiver.tick(&mut source).accepted, 3);
        assert_eq!(source.len(), 2);
        assert_eq!(receiver.tick(&mut source).accepted, 2);
        assert!(source.is_empty());
    }

    #[test]
    fn test_sequence_accounting_through_pipeline() {
        let (mut receiver, _clock) = receiver_with_clock();
        for seq in [1, 1, 2, 2, 5, 5] {
            receiver.ingest_datagram(&datagram(seq as u64 % 2, seq)).unwrap();
        }

        let status = receiver.status();
        assert_eq!(status.max_seq_seen, Some(5));
        assert_eq!(status.estimated_drops, 2);
    }

    #[test]
    fn test_tracks_go_stale_without_traffic() {
        let (mut receiver, clock) = receiver_with_clock();
        receiver.ingest_datagram(&datagram(1, 1)).unwrap();

        clock.advance(Duration::from_millis(1999));
        assert_eq!(receiver.status().stale_tracks, 0);

        assert_eq!(receiver.report(EntityId::new(1)).map(|r| r.stale), Some(false));

        clock.advance(Duration::from_millis(2));
        assert_eq!(receiver.status().stale_tracks, 1);
        let report = receiver.report(EntityId::new(1)).unwrap();
        assert!(report.stale);
        assert_eq!(report.track.seq(), 1);
        assert!(receiver.report(EntityId::new(2)).is_none());
        assert_eq!(receiver.tracks().len(), 1);
    }

    #[test]
    fn test_rate_estimate_after_one_second() {
        let (mut receiver, clock) = receiver_with_clock();
        let mut source = MemoryDatagrams::new();

        receiver.tick(&mut source);
        for seq in 1..=10 {
            source.push(datagram(1, seq));
        }
        receiver.tick(&mut source);
        clock.advance(Duration::from_secs(1));
        receiver.tick(&mut source);

        assert!((receiver.status().rate - 10.0).abs() < 1e-9);
    }

    #[test]
    fn test_failed_replay_leaves_state_untouched() {
        let (mut receiver, _clock) = receiver_with_clock();
        receiver.ingest_datagram(&datagram(5, 9)).unwrap();

        let dir = tempfile::tempdir().unwrap();
        let empty = dir.path().join("empty.jsonl");
        std::fs::write(&empty, "").unwrap();

        assert!(receiver.start_replay(dir.path().join("missing.jsonl")).is_err());
        assert!(receiver.start_replay(&empty).is_err());

        assert_eq!(receiver.mode(), ReceiverMode::Live);
        assert_eq!(receiver.track_ids(), vec![EntityId::new(5)]);
        assert_eq!(receiver.sequence().max_seq_seen(), Some(9));
    }

    #[test]
    fn test_recording_failure_does_not_stop_ingest() {
        let (mut receiver, _clock) = receiver_with_clock();
        let dir = tempfile::tempdir().unwrap();

        let result = receiver.start_recording(dir.path().join("no-such-dir").join("c.jsonl"));
        assert!(result.is_err());
        assert!(!receiver.is_recording());

        receiver.ingest_datagram(&datagram(1, 1)).unwrap();
        assert_eq!(receiver.stats().accepted, 1);
    }
}

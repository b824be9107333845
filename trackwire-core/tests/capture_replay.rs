//! End-to-end capture and replay through the receiver pipeline.

use std::sync::Arc;
use std::time::Duration;

use serde_json::{Map, Value, json};
use trackwire_core::capture::ReplayScheduler;
use trackwire_core::transport::MemoryDatagrams;
use trackwire_core::{Clock, EntityId, ManualClock, Receiver, ReceiverConfig, ReceiverMode};

const START_WALL: f64 = 1_700_000_000.0;

fn entity_state(id: u64, x: f64, heading: f64, seq: i64) -> Map<String, Value> {
    json!({
        "msg_type": "EntityState",
        "entity_id": id,
        "entity_type": "CONTACT",
        "x": x,
        "y": 300.0,
        "heading_deg": heading,
        "speed": 1.5,
        "status": "OK",
        "seq": seq,
        "timestamp_utc": "2024-05-01T12:00:00+00:00",
        "extra": {"source": "unit-test"}
    })
    .as_object()
    .cloned()
    .unwrap()
}

/// Messages with the delay (ms) to wait before each one is received.
fn scripted_stream() -> Vec<(u64, Map<String, Value>)> {
    vec![
        (0, entity_state(1001, 400.0, 0.0, 1)),
        (0, entity_state(1002, 100.0, 90.0, 1)),
        (50, entity_state(1001, 401.5, 0.0, 2)),
        (0, entity_state(1002, 101.5, 90.0, 2)),
        (250, entity_state(1001, 403.0, 10.0, 4)),
        (1000, entity_state(1002, 104.5, 180.0, 6)),
    ]
}

fn record_stream(path: &std::path::Path) -> Receiver {
    let clock = Arc::new(ManualClock::new(START_WALL));
    let mut receiver = Receiver::with_clock(ReceiverConfig::default(), clock.clone());
    receiver.start_recording(path).unwrap();

    for (delay_ms, message) in scripted_stream() {
        clock.advance(Duration::from_millis(delay_ms));
        let bytes = serde_json::to_vec(&message).unwrap();
        receiver.ingest_datagram(&bytes).unwrap();
    }

    // Rejected and ignored input never reaches the capture.
    receiver.ingest_datagram(b"garbage").unwrap_err();
    receiver
        .ingest_datagram(br#"{"msg_type":"Heartbeat"}"#)
        .unwrap();

    receiver.stop_recording();
    receiver
}

#[test]
fn test_capture_round_trip_preserves_bodies_and_spacing() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("session.jsonl");
    record_stream(&path);

    let mut replay = ReplayScheduler::new();
    let summary = replay.load(&path).unwrap();
    assert_eq!(summary.loaded, 6);
    assert_eq!(summary.skipped, 0);

    let expected = scripted_stream();
    let mut expected_offset = 0.0;
    for (item, (delay_ms, body)) in replay.items().iter().zip(&expected) {
        expected_offset += *delay_ms as f64 / 1000.0;
        assert_eq!(&item.body, body);
        assert!(
            (item.offset_secs - expected_offset).abs() < 1e-4,
            "offset {} != {}",
            item.offset_secs,
            expected_offset
        );
    }
}

#[test]
fn test_replay_through_receiver_rebuilds_tracks() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("session.jsonl");
    let original = record_stream(&path);

    let clock = Arc::new(ManualClock::new(START_WALL + 3_600.0));
    let mut replayer = Receiver::with_clock(ReceiverConfig::default(), clock.clone());
    let mut live = MemoryDatagrams::new();

    replayer.start_replay(&path).unwrap();
    let mut released = replayer.tick(&mut live).replayed;
    assert_eq!(released, 2);

    while replayer.mode() == ReceiverMode::Replay {
        clock.advance(Duration::from_millis(20));
        released += replayer.tick(&mut live).replayed;
    }
    assert_eq!(released, 6);
    assert!(clock.elapsed() >= Duration::from_millis(1300));
    assert!(clock.elapsed() < Duration::from_millis(1340));

    assert_eq!(replayer.track_ids(), original.track_ids());
    for id in original.track_ids() {
        let before = original.snapshot(id).unwrap();
        let after = replayer.snapshot(id).unwrap();
        assert_eq!(before.position(), after.position());
        assert_eq!(before.heading_deg(), after.heading_deg());
        assert_eq!(before.status(), after.status());
        assert_eq!(
            before.history().collect::<Vec<_>>(),
            after.history().collect::<Vec<_>>()
        );
    }

    let status = replayer.status();
    assert_eq!(status.max_seq_seen, Some(6));
    assert_eq!(status.estimated_drops, 2);
    assert_eq!(status.stale_tracks, 0);
}

#[test]
fn test_scenario_single_entity_state() {
    let clock = Arc::new(ManualClock::new(START_WALL));
    let mut receiver = Receiver::with_clock(ReceiverConfig::default(), clock.clone());
    let mut source = MemoryDatagrams::new();
    source.push(
        br#"{"msg_type":"EntityState","entity_id":42,"x":10,"y":10,"heading_deg":0,"speed":0,"status":"OK","seq":1}"#
            .to_vec(),
    );

    receiver.tick(&mut source);

    assert_eq!(receiver.track_ids(), vec![EntityId::new(42)]);
    let track = receiver.snapshot(EntityId::new(42)).unwrap();
    assert_eq!(track.history_len(), 1);
    assert!(!receiver.liveness().is_stale(&track, clock.wall_time()));
}

#[test]
fn test_live_input_discarded_during_replay() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("capture.jsonl");
    std::fs::write(
        &path,
        concat!(
            r#"{"msg_type":"EntityState","entity_id":1,"x":0,"y":0,"heading_deg":0,"speed":1,"seq":1,"_rx_time":100.0}"#,
            "\n",
            r#"{"msg_type":"EntityState","entity_id":1,"x":1,"y":0,"heading_deg":0,"speed":1,"seq":2,"_rx_time":100.5}"#,
            "\n"
        ),
    )
    .unwrap();

    let clock = Arc::new(ManualClock::new(START_WALL));
    let mut receiver = Receiver::with_clock(ReceiverConfig::default(), clock.clone());
    let live = |seq: i64| serde_json::to_vec(&entity_state(99, 10.0, 0.0, seq)).unwrap();

    receiver.ingest_datagram(&live(50)).unwrap();
    receiver.start_replay(&path).unwrap();
    assert_eq!(receiver.mode(), ReceiverMode::Replay);
    assert!(receiver.tracks().is_empty());

    let mut source = MemoryDatagrams::new();
    source.push(live(51));
    let summary = receiver.tick(&mut source);

    assert_eq!(summary.replayed, 1);
    assert_eq!(receiver.stats().discarded_during_replay, 1);
    assert_eq!(receiver.track_ids(), vec![EntityId::new(1)]);

    clock.advance(Duration::from_millis(500));
    let summary = receiver.tick(&mut source);
    assert_eq!(summary.replayed, 1);
    assert_eq!(receiver.mode(), ReceiverMode::Live);
    assert_eq!(receiver.snapshot(EntityId::new(1)).unwrap().history_len(), 2);
}

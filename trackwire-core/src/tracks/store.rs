//! Owned mapping from entity identifier to track state.

use std::collections::{BTreeMap, VecDeque};

use serde::Serialize;

use super::liveness::LivenessMonitor;
use crate::protocol::{EntityId, EntityState};

/// Default number of trail positions retained per track.
pub const DEFAULT_HISTORY_CAPACITY: usize = 30;

/// World-space position sample used for trail queries.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Position {
    pub x: f64,
    pub y: f64,
}

/// Accumulated state for one entity.
///
/// Values returned by [`TrackStore::snapshot`] are detached copies; mutating
/// the store afterwards does not affect them.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Track {
    entity_id: EntityId,
    entity_type: Option<String>,
    x: f64,
    y: f64,
    heading_deg: f64,
    speed: f64,
    status: Option<String>,
    seq: i64,
    timestamp_utc: Option<String>,
    last_rx_time: f64,
    history: VecDeque<Position>,
}

impl Track {
    fn from_state(state: &EntityState, rx_time: f64, capacity: usize) -> Self {
        let mut track = Self {
            entity_id: state.entity_id,
            entity_type: None,
            x: state.x,
            y: state.y,
            heading_deg: state.heading_deg,
            speed: state.speed,
            status: None,
            seq: state.seq,
            timestamp_utc: None,
            last_rx_time: rx_time,
            history: VecDeque::with_capacity(capacity),
        };
        track.merge(state, rx_time, capacity);
        track
    }

    /// Applies present fields; absent optional fields keep their previous value.
    fn merge(&mut self, state: &EntityState, rx_time: f64, capacity: usize) {
        self.x = state.x;
        self.y = state.y;
        self.heading_deg = state.heading_deg;
        self.speed = state.speed;
        self.seq = state.seq;
        if let Some(entity_type) = &state.entity_type {
            self.entity_type = Some(entity_type.clone());
        }
        if let Some(status) = &state.status {
            self.status = Some(status.clone());
        }
        if let Some(timestamp) = &state.timestamp_utc {
            self.timestamp_utc = Some(timestamp.clone());
        }
        self.last_rx_time = self.last_rx_time.max(rx_time);

        while self.history.len() >= capacity {
            self.history.pop_front();
        }
        self.history.push_back(Position {
            x: state.x,
            y: state.y,
        });
    }

    pub fn entity_id(&self) -> EntityId {
        self.entity_id
    }

    pub fn entity_type(&self) -> Option<&str> {
        self.entity_type.as_deref()
    }

    pub fn position(&self) -> Position {
        Position {
            x: self.x,
            y: self.y,
        }
    }

    pub fn heading_deg(&self) -> f64 {
        self.heading_deg
    }

    pub fn speed(&self) -> f64 {
        self.speed
    }

    pub fn status(&self) -> Option<&str> {
        self.status.as_deref()
    }

    pub fn seq(&self) -> i64 {
        self.seq
    }

    pub fn timestamp_utc(&self) -> Option<&str> {
        self.timestamp_utc.as_deref()
    }

    /// Wall-clock receipt time of the latest accepted message, epoch seconds.
    pub fn last_rx_time(&self) -> f64 {
        self.last_rx_time
    }

    /// Recent positions, oldest first.
    pub fn history(&self) -> impl ExactSizeIterator<Item = &Position> {
        self.history.iter()
    }

    pub fn history_len(&self) -> usize {
        self.history.len()
    }
}

/// Track plus derived staleness, as handed to rendering collaborators.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TrackReport {
    pub track: Track,
    pub stale: bool,
}

/// Owns every track observed by a receiver.
///
/// Iteration order is sorted by entity id so external consumers get a stable
/// ordering between frames.
#[derive(Debug, Clone)]
pub struct TrackStore {
    tracks: BTreeMap<EntityId, Track>,
    history_capacity: usize,
}

impl Default for TrackStore {
    fn default() -> Self {
        Self::new(DEFAULT_HISTORY_CAPACITY)
    }
}

impl TrackStore {
    /// Creates an empty store; capacity below one is raised to one.
    pub fn new(history_capacity: usize) -> Self {
        Self {
            tracks: BTreeMap::new(),
            history_capacity: history_capacity.max(1),
        }
    }

    /// Creates the track on first sight, otherwise merges the message into it.
    ///
    /// Returns `true` when a new track was created.
    pub fn upsert(&mut self, state: &EntityState, rx_time: f64) -> bool {
        let capacity = self.history_capacity;
        match self.tracks.get_mut(&state.entity_id) {
            Some(track) => {
                track.merge(state, rx_time, capacity);
                false
            }
            None => {
                self.tracks
                    .insert(state.entity_id, Track::from_state(state, rx_time, capacity));
                true
            }
        }
    }

    /// Returns a detached copy of the track for `entity_id`.
    pub fn snapshot(&self, entity_id: EntityId) -> Option<Track> {
        self.tracks.get(&entity_id).cloned()
    }

    /// Returns all known entity ids in ascending order.
    pub fn all_ids(&self) -> Vec<EntityId> {
        self.tracks.keys().copied().collect()
    }

    /// Drops every track.
    pub fn clear(&mut self) {
        self.tracks.clear();
    }

    pub fn len(&self) -> usize {
        self.tracks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tracks.is_empty()
    }

    pub fn history_capacity(&self) -> usize {
        self.history_capacity
    }

    /// Counts tracks the monitor classifies as stale at `now`.
    pub fn stale_count(&self, monitor: &LivenessMonitor, now: f64) -> usize {
        self.tracks
            .values()
            .filter(|track| monitor.is_stale(track, now))
            .count()
    }

    /// Snapshot of one track with its staleness at `now`.
    pub fn report(
        &self,
        entity_id: EntityId,
        monitor: &LivenessMonitor,
        now: f64,
    ) -> Option<TrackReport> {
        self.tracks.get(&entity_id).map(|track| TrackReport {
            track: track.clone(),
            stale: monitor.is_stale(track, now),
        })
    }

    /// Snapshots every track with its staleness at `now`, sorted by id.
    pub fn reports(&self, monitor: &LivenessMonitor, now: f64) -> Vec<TrackReport> {
        self.tracks
            .values()
            .map(|track| TrackReport {
                track: track.clone(),
                stale: monitor.is_stale(track, now),
            })
            .collect()
    }
}

//! Timing-preserving replay of a capture file.
//!
//! Records are kept in file order and released once the wall-clock time since
//! [`ReplayScheduler::start`] reaches their offset from the first record.
//! Pacing is only as precise as the caller's polling cadence.

use std::path::Path;
use std::time::Instant;

use serde_json::{Map, Value};

use super::{RX_TIME_FIELD, ReplayLoadError};

/// One captured message with its receipt time relative to the first record.
#[derive(Debug, Clone, PartialEq)]
pub struct ReplayItem {
    /// Seconds after the first record; negative if the file was out of order.
    pub offset_secs: f64,
    /// Message body with `_rx_time` removed.
    pub body: Map<String, Value>,
}

/// Result of a successful [`ReplayScheduler::load`].
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ReplayLoadSummary {
    pub loaded: usize,
    pub skipped: usize,
    pub duration_secs: f64,
}

/// Releases captured messages at their original relative spacing.
#[derive(Debug, Clone, Default)]
pub struct ReplayScheduler {
    items: Vec<ReplayItem>,
    cursor: usize,
    started_at: Option<Instant>,
    active: bool,
}

impl ReplayScheduler {
    pub fn new() -> Self {
        Self::default()
    }

    /// Reads a capture file, skipping lines that do not parse.
    ///
    /// On failure the previously loaded items are left untouched.
    ///
    /// # Errors
    ///
    /// - `ReplayLoadError::Read` - If the file cannot be read
    /// - `ReplayLoadError::NoData` - If no line holds a valid record
    pub fn load(&mut self, path: impl AsRef<Path>) -> Result<ReplayLoadSummary, ReplayLoadError> {
        let path = path.as_ref();
        let bytes = std::fs::read(path).map_err(|source| ReplayLoadError::Read {
            path: path.to_path_buf(),
            source,
        })?;

        let (items, skipped) = parse_capture(&bytes);
        if items.is_empty() {
            return Err(ReplayLoadError::NoData {
                path: path.to_path_buf(),
            });
        }

        let summary = ReplayLoadSummary {
            loaded: items.len(),
            skipped,
            duration_secs: items.last().map_or(0.0, |item| item.offset_secs),
        };

        self.items = items;
        self.cursor = 0;
        self.started_at = None;
        self.active = false;

        tracing::info!(
            path = %path.display(),
            loaded = summary.loaded,
            skipped = summary.skipped,
            duration_secs = summary.duration_secs,
            "Replay capture loaded"
        );
        Ok(summary)
    }

    /// Begins replay from the first item. Returns false if nothing is loaded.
    pub fn start(&mut self, now: Instant) -> bool {
        if self.items.is_empty() {
            return false;
        }
        self.cursor = 0;
        self.started_at = Some(now);
        self.active = true;
        true
    }

    /// Releases due items in order, at most `max_per_cycle` of them.
    ///
    /// The scheduler disables itself once the last item is released.
    pub fn poll(&mut self, now: Instant, max_per_cycle: usize) -> Vec<Map<String, Value>> {
        let Some(started_at) = self.started_at.filter(|_| self.active) else {
            return Vec::new();
        };

        let elapsed = now.saturating_duration_since(started_at).as_secs_f64();
        let mut released = Vec::new();

        while released.len() < max_per_cycle {
            let Some(item) = self.items.get(self.cursor) else {
                break;
            };
            if item.offset_secs > elapsed {
                break;
            }
            released.push(item.body.clone());
            self.cursor += 1;
        }

        if self.cursor >= self.items.len() {
            self.active = false;
            tracing::info!(items = self.items.len(), "Replay finished");
        }

        released
    }

    /// Halts replay; the next `start` begins from the first item again.
    pub fn stop(&mut self) {
        self.active = false;
    }

    pub fn is_active(&self) -> bool {
        self.active
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    /// Items released since the last `start`.
    pub fn released(&self) -> usize {
        self.cursor
    }

    pub fn items(&self) -> &[ReplayItem] {
        &self.items
    }
}

/// Parses capture bytes into replay items plus a count of skipped lines.
///
/// A valid record is a JSON object with a numeric `_rx_time`. Blank lines are
/// neither items nor skipped.
fn parse_capture(bytes: &[u8]) -> (Vec<ReplayItem>, usize) {
    let mut records = Vec::new();
    let mut skipped = 0;

    for line in bytes.split(|byte| *byte == b'\n') {
        if line.trim_ascii().is_empty() {
            continue;
        }
        match parse_record(line) {
            Some(record) => records.push(record),
            None => skipped += 1,
        }
    }

    let Some(&(first_rx_time, _)) = records.first() else {
        return (Vec::new(), skipped);
    };

    let items = records
        .into_iter()
        .map(|(rx_time, body)| ReplayItem {
            offset_secs: rx_time - first_rx_time,
            body,
        })
        .collect();
    (items, skipped)
}

fn parse_record(line: &[u8]) -> Option<(f64, Map<String, Value>)> {
    let Ok(Value::Object(mut body)) = serde_json::from_slice::<Value>(line) else {
        return None;
    };
    let rx_time = body.remove(RX_TIME_FIELD)?.as_f64()?;
    rx_time.is_finite().then_some((rx_time, body))
}

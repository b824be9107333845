//! Wire model for entity telemetry.
//!
//! One UTF-8 JSON object per datagram. Only `EntityState` messages are
//! consumed; anything else is ignored by the codec.

pub mod codec;

use std::fmt;

use serde::{Deserialize, Serialize};

pub use codec::{CodecError, Decoded, DecodeError, InboundMessage, ValidationError};

/// Discriminator value for the only message kind the receiver consumes.
pub const ENTITY_STATE_MSG_TYPE: &str = "EntityState";

/// Stable identifier of a simulated entity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct EntityId(pub u64);

impl EntityId {
    /// Creates EntityId from its numeric value.
    pub fn new(id: u64) -> Self {
        Self(id)
    }

    /// Returns the underlying numeric identifier.
    pub fn as_u64(self) -> u64 {
        self.0
    }
}

impl fmt::Display for EntityId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Instantaneous kinematic state of one entity, as sent on the wire.
///
/// `seq` is shared by every message emitted in the same sender tick.
/// `timestamp_utc` is informational only.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EntityState {
    pub msg_type: String,
    pub entity_id: EntityId,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub entity_type: Option<String>,
    pub x: f64,
    pub y: f64,
    pub heading_deg: f64,
    pub speed: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status: Option<String>,
    pub seq: i64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timestamp_utc: Option<String>,
}

impl EntityState {
    /// Creates an `EntityState` message with the heading normalized to [0, 360).
    pub fn new(entity_id: EntityId, x: f64, y: f64, heading_deg: f64, speed: f64, seq: i64) -> Self {
        Self {
            msg_type: ENTITY_STATE_MSG_TYPE.to_string(),
            entity_id,
            entity_type: None,
            x,
            y,
            heading_deg: normalize_heading(heading_deg),
            speed,
            status: None,
            seq,
            timestamp_utc: None,
        }
    }
}

/// Normalizes a compass angle into [0, 360).
///
/// Non-finite input yields 0.0.
pub fn normalize_heading(deg: f64) -> f64 {
    if !deg.is_finite() {
        return 0.0;
    }
    let wrapped = deg.rem_euclid(360.0);
    // rem_euclid rounds tiny negative inputs up to exactly 360.0
    if wrapped >= 360.0 { 0.0 } else { wrapped }
}

//! Simulated entity motion inside a bounded world.
//!
//! Convention: 0° points up (north) and 90° right (east). Screen y grows
//! downward, so moving north decreases y.

use trackwire_core::protocol::normalize_heading;
use trackwire_core::{EntityId, EntityState};

use crate::rng::SimRng;

/// First identifier handed out by [`spawn_entities`].
pub const FIRST_ENTITY_ID: u64 = 1001;
/// Entity type reported by every simulated entity.
pub const ENTITY_TYPE: &str = "CONTACT";
/// Status reported by every simulated entity.
pub const ENTITY_STATUS: &str = "OK";

/// Rectangular world with an inner margin the entities bounce off.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct World {
    pub width: f64,
    pub height: f64,
    pub margin: f64,
}

impl Default for World {
    fn default() -> Self {
        Self {
            width: 800.0,
            height: 600.0,
            margin: 50.0,
        }
    }
}

impl World {
    pub fn left(&self) -> f64 {
        self.margin
    }

    pub fn right(&self) -> f64 {
        self.width - self.margin
    }

    pub fn top(&self) -> f64 {
        self.margin
    }

    pub fn bottom(&self) -> f64 {
        self.height - self.margin
    }

    pub fn centre(&self) -> (f64, f64) {
        (self.width / 2.0, self.height / 2.0)
    }

    /// True if the point lies strictly inside the margin box.
    pub fn contains(&self, x: f64, y: f64) -> bool {
        x > self.left() && x < self.right() && y > self.top() && y < self.bottom()
    }
}

/// True kinematic state of one simulated entity.
///
/// Faults never touch this; they only alter outgoing copies.
#[derive(Debug, Clone, PartialEq)]
pub struct Entity {
    pub id: EntityId,
    pub x: f64,
    pub y: f64,
    pub heading_deg: f64,
    /// Units moved per step
    pub speed: f64,
}

impl Entity {
    pub fn new(id: EntityId, x: f64, y: f64, heading_deg: f64, speed: f64) -> Self {
        Self {
            id,
            x,
            y,
            heading_deg: normalize_heading(heading_deg),
            speed,
        }
    }

    /// Advances one step and reflects off the margin box.
    pub fn step(&mut self, world: &World) {
        let rad = self.heading_deg.to_radians();
        self.x += rad.sin() * self.speed;
        self.y -= rad.cos() * self.speed;

        if self.y <= world.top() || self.y >= world.bottom() {
            self.heading_deg = normalize_heading(180.0 - self.heading_deg);
            self.y = if self.y <= world.top() {
                world.top() + 1.0
            } else {
                world.bottom() - 1.0
            };
        }

        if self.x <= world.left() || self.x >= world.right() {
            self.heading_deg = normalize_heading(360.0 - self.heading_deg);
            self.x = if self.x <= world.left() {
                world.left() + 1.0
            } else {
                world.right() - 1.0
            };
        }

        self.heading_deg = normalize_heading(self.heading_deg);
    }

    /// Builds the wire message for this entity's current state.
    pub fn to_state(&self, seq: i64, timestamp_utc: Option<String>) -> EntityState {
        let mut state = EntityState::new(self.id, self.x, self.y, self.heading_deg, self.speed, seq);
        state.entity_type = Some(ENTITY_TYPE.to_string());
        state.status = Some(ENTITY_STATUS.to_string());
        state.timestamp_utc = timestamp_utc;
        state
    }
}

/// Creates `count` entities with consecutive ids starting at 1001.
///
/// The first sits at the world centre heading north at 1.5 units per step;
/// the rest are placed at random inside the margin box.
pub fn spawn_entities(count: usize, world: &World, rng: &mut SimRng) -> Vec<Entity> {
    (0..count)
        .map(|index| {
            let id = EntityId::new(FIRST_ENTITY_ID + index as u64);
            if index == 0 {
                let (x, y) = world.centre();
                Entity::new(id, x, y, 0.0, 1.5)
            } else {
                let x = rng.uniform(world.left() + 1.0, world.right() - 1.0);
                let y = rng.uniform(world.top() + 1.0, world.bottom() - 1.0);
                let heading = rng.uniform(0.0, 360.0);
                let speed = rng.uniform(1.0, 3.0);
                Entity::new(id, x, y, heading, speed)
            }
        })
        .collect()
}

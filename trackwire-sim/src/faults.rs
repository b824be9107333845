//! Sender-side fault injection: jamming, burst loss and heading noise.
//!
//! Faults act on outgoing copies only. An entity's true kinematic state is
//! never modified here.

use std::collections::BTreeMap;
use std::fmt;
use std::time::Duration;

use serde::Serialize;
use tracing::{debug, info};
use trackwire_core::protocol::normalize_heading;
use trackwire_core::{EntityId, EntityState, SenderConfig};

use crate::rng::SimRng;

/// Jam window length range in seconds.
pub const JAM_SECS: (f64, f64) = (2.0, 6.0);
/// Burst size range in suppressed sends, inclusive.
pub const DROP_BURST_SENDS: (u32, u32) = (5, 20);
/// Heading noise window length range in seconds.
pub const NOISE_SECS: (f64, f64) = (3.0, 8.0);
/// Heading noise amplitudes in degrees.
pub const NOISE_AMPLITUDES_DEG: [f64; 3] = [5.0, 8.0, 12.0];

/// The three fault kinds, drawn uniformly on each trigger.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum FaultKind {
    Jam,
    DropBurst,
    HeadingNoise,
}

impl FaultKind {
    pub const ALL: [FaultKind; 3] = [FaultKind::Jam, FaultKind::DropBurst, FaultKind::HeadingNoise];
}

impl fmt::Display for FaultKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Jam => write!(f, "jam"),
            Self::DropBurst => write!(f, "drop_burst"),
            Self::HeadingNoise => write!(f, "heading_noise"),
        }
    }
}

/// Per-entity fault windows. Times are sender seconds.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct FaultState {
    pub jam_until: f64,
    pub drop_burst_remaining: u32,
    pub heading_noise_until: f64,
    pub heading_noise_deg: f64,
}

impl FaultState {
    pub fn is_jammed(&self, now: f64) -> bool {
        now < self.jam_until
    }

    pub fn is_noisy(&self, now: f64) -> bool {
        now < self.heading_noise_until
    }

    /// True while any of the three windows is open.
    pub fn is_active(&self, now: f64) -> bool {
        self.is_jammed(now) || self.drop_burst_remaining > 0 || self.is_noisy(now)
    }
}

/// What happened to one outgoing message.
#[derive(Debug, Clone, PartialEq)]
pub enum FaultOutcome {
    /// Send this message. `noised` is set when the heading was perturbed.
    Deliver { state: EntityState, noised: bool },
    /// Suppressed by an open jam window
    Jammed,
    /// Suppressed by a drop burst
    Dropped,
}

/// Fault counters over the injector's lifetime.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct FaultStats {
    pub checks: u64,
    pub triggered: u64,
    pub skipped_active: u64,
    pub jammed: u64,
    pub dropped: u64,
    pub noised: u64,
}

/// Decides when faults start and how each outgoing message is perturbed.
#[derive(Debug)]
pub struct FaultInjector {
    trigger_prob: f64,
    check_interval_secs: f64,
    debug_print: bool,
    last_check: Option<f64>,
    states: BTreeMap<EntityId, FaultState>,
    stats: FaultStats,
}

impl FaultInjector {
    /// Creates an injector. Probability is clamped to [0, 1].
    pub fn new(trigger_prob: f64, check_interval: Duration, debug_print: bool) -> Self {
        Self {
            trigger_prob: if trigger_prob.is_finite() {
                trigger_prob.clamp(0.0, 1.0)
            } else {
                0.0
            },
            check_interval_secs: check_interval.as_secs_f64(),
            debug_print,
            last_check: None,
            states: BTreeMap::new(),
            stats: FaultStats::default(),
        }
    }

    pub fn from_config(config: &SenderConfig) -> Self {
        Self::new(
            config.fault_trigger_prob,
            config.fault_check_interval,
            config.fault_debug,
        )
    }

    /// Runs a throttled trigger check.
    ///
    /// The first call only records the check time. Afterwards at most one
    /// check happens per interval; a successful draw picks one entity
    /// uniformly and starts a random fault unless that entity already has an
    /// open window.
    pub fn maybe_trigger(
        &mut self,
        now: f64,
        entities: &[EntityId],
        rng: &mut SimRng,
    ) -> Option<(EntityId, FaultKind)> {
        let Some(last) = self.last_check else {
            self.last_check = Some(now);
            return None;
        };
        if now - last < self.check_interval_secs {
            return None;
        }
        self.last_check = Some(now);
        self.stats.checks += 1;

        if !rng.chance(self.trigger_prob) {
            return None;
        }
        let entity = *rng.choose(entities)?;
        let kind = *rng.choose(&FaultKind::ALL)?;
        self.trigger(entity, kind, now, rng).then_some((entity, kind))
    }

    /// Starts `kind` on `entity` unless it already has an open fault window.
    ///
    /// Returns whether the fault was started.
    pub fn trigger(&mut self, entity: EntityId, kind: FaultKind, now: f64, rng: &mut SimRng) -> bool {
        let state = self.states.entry(entity).or_default();
        if state.is_active(now) {
            self.stats.skipped_active += 1;
            debug!(entity = %entity, fault = %kind, "Fault trigger skipped, entity already faulted");
            return false;
        }

        let detail = match kind {
            FaultKind::Jam => {
                let secs = rng.uniform(JAM_SECS.0, JAM_SECS.1);
                state.jam_until = now + secs;
                format!("{secs:.1}s")
            }
            FaultKind::DropBurst => {
                let sends = rng.uniform_inclusive(DROP_BURST_SENDS.0, DROP_BURST_SENDS.1);
                state.drop_burst_remaining += sends;
                format!("{sends} sends")
            }
            FaultKind::HeadingNoise => {
                let secs = rng.uniform(NOISE_SECS.0, NOISE_SECS.1);
                let amplitude = rng
                    .choose(&NOISE_AMPLITUDES_DEG)
                    .copied()
                    .unwrap_or(NOISE_AMPLITUDES_DEG[0]);
                state.heading_noise_until = now + secs;
                state.heading_noise_deg = amplitude;
                format!("{secs:.1}s at +/-{amplitude} deg")
            }
        };

        self.stats.triggered += 1;
        if self.debug_print {
            info!(entity = %entity, fault = %kind, %detail, "Fault triggered");
        } else {
            debug!(entity = %entity, fault = %kind, %detail, "Fault triggered");
        }
        true
    }

    /// Applies the entity's open windows to one outgoing message.
    ///
    /// Jam takes precedence over a drop burst, which takes precedence over
    /// heading noise.
    pub fn apply(&mut self, mut message: EntityState, now: f64, rng: &mut SimRng) -> FaultOutcome {
        let Some(state) = self.states.get_mut(&message.entity_id) else {
            return FaultOutcome::Deliver {
                state: message,
                noised: false,
            };
        };

        if state.is_jammed(now) {
            self.stats.jammed += 1;
            return FaultOutcome::Jammed;
        }
        if state.drop_burst_remaining > 0 {
            state.drop_burst_remaining -= 1;
            self.stats.dropped += 1;
            return FaultOutcome::Dropped;
        }
        if state.is_noisy(now) {
            let amplitude = state.heading_noise_deg;
            let offset = rng.uniform(-amplitude, amplitude);
            message.heading_deg = normalize_heading(message.heading_deg + offset);
            self.stats.noised += 1;
            return FaultOutcome::Deliver {
                state: message,
                noised: true,
            };
        }
        FaultOutcome::Deliver {
            state: message,
            noised: false,
        }
    }

    /// Fault windows for `entity`, if it was ever targeted.
    pub fn state(&self, entity: EntityId) -> Option<&FaultState> {
        self.states.get(&entity)
    }

    pub fn stats(&self) -> FaultStats {
        self.stats
    }
}

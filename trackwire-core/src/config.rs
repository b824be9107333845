//! Centralized configuration for Trackwire.
//!
//! All tunable parameters for the receiver and the simulated sender live here
//! so that binaries and tests build them the same way.

use std::net::{Ipv4Addr, SocketAddr};
use std::time::Duration;

use crate::tracks::DEFAULT_HISTORY_CAPACITY;

/// Default UDP port shared by sender and receiver.
pub const DEFAULT_PORT: u16 = 30001;

/// Central configuration for both ends of the telemetry link.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TrackwireConfig {
    pub receiver: ReceiverConfig,
    pub sender: SenderConfig,
}

/// Receiver loop and track store configuration.
#[derive(Debug, Clone, PartialEq)]
pub struct ReceiverConfig {
    /// Local address the receiver socket binds to
    pub bind_addr: SocketAddr,
    /// Upper bound on datagrams (or replay items) handled per tick
    pub max_messages_per_poll: usize,
    /// Silence after which a track is reported stale
    pub stale_threshold: Duration,
    /// Trail positions retained per track
    pub history_capacity: usize,
    /// Cooperative loop period
    pub tick_interval: Duration,
    /// How often the receiver logs a status line
    pub status_interval: Duration,
}

impl Default for ReceiverConfig {
    fn default() -> Self {
        Self {
            bind_addr: SocketAddr::from((Ipv4Addr::UNSPECIFIED, DEFAULT_PORT)),
            max_messages_per_poll: 200,
            stale_threshold: Duration::from_secs(2),
            history_capacity: DEFAULT_HISTORY_CAPACITY,
            tick_interval: Duration::from_millis(16), // ~60 Hz
            status_interval: Duration::from_secs(1),
        }
    }
}

/// Simulated sender configuration.
///
/// Read once at startup. Use [`SenderConfig::validated`] before handing it to
/// a sender so out-of-range values are clamped.
#[derive(Debug, Clone, PartialEq)]
pub struct SenderConfig {
    /// Receiver address datagrams are sent to
    pub dest_addr: SocketAddr,
    /// Sender ticks per second
    pub rate_hz: u32,
    /// Number of simulated entities
    pub entity_count: usize,
    /// Seed for the sender RNG (None = random seed, logged at startup)
    pub seed: Option<u64>,
    /// Enable jam, burst-drop and heading-noise faults
    pub faults_enabled: bool,
    /// Probability that a fault check starts a new fault
    pub fault_trigger_prob: f64,
    /// Minimum time between fault checks
    pub fault_check_interval: Duration,
    /// Log fault triggers at info level instead of debug
    pub fault_debug: bool,
}

impl Default for SenderConfig {
    fn default() -> Self {
        Self {
            dest_addr: SocketAddr::from((Ipv4Addr::LOCALHOST, DEFAULT_PORT)),
            rate_hz: 20,
            entity_count: 1,
            seed: None,
            faults_enabled: false,
            fault_trigger_prob: 0.10,
            fault_check_interval: Duration::from_secs(1),
            fault_debug: false,
        }
    }
}

impl SenderConfig {
    /// Clamps rate and entity count to at least one and the trigger
    /// probability to [0, 1]. A zero check interval falls back to the default.
    pub fn validated(mut self) -> Self {
        let defaults = Self::default();

        self.rate_hz = self.rate_hz.max(1);
        self.entity_count = self.entity_count.max(1);
        self.fault_trigger_prob = if self.fault_trigger_prob.is_finite() {
            self.fault_trigger_prob.clamp(0.0, 1.0)
        } else {
            defaults.fault_trigger_prob
        };
        if self.fault_check_interval.is_zero() {
            self.fault_check_interval = defaults.fault_check_interval;
        }
        self
    }

    /// Time between sender ticks.
    ///
    /// Never zero, even for rates above one billion per second.
    pub fn tick_interval(&self) -> Duration {
        (Duration::from_secs(1) / self.rate_hz.max(1)).max(Duration::from_nanos(1))
    }

    /// Configuration for deterministic tests: fixed seed, no faults.
    pub fn deterministic_testing() -> Self {
        Self {
            seed: Some(42),
            faults_enabled: false,
            ..Self::default()
        }
    }
}

impl TrackwireConfig {
    /// Creates configuration with `TRACKWIRE_*` environment overrides.
    ///
    /// Unparseable values are ignored and the default is kept.
    pub fn from_env() -> Self {
        let mut config = Self::default();

        if let Some(addr) = env_parse::<SocketAddr>("TRACKWIRE_BIND_ADDR") {
            config.receiver.bind_addr = addr;
        }
        if let Some(max) = env_parse::<usize>("TRACKWIRE_MAX_PER_POLL") {
            config.receiver.max_messages_per_poll = max.max(1);
        }
        if let Some(secs) = env_parse::<f64>("TRACKWIRE_STALE_SECS")
            && let Ok(threshold) = Duration::try_from_secs_f64(secs)
        {
            config.receiver.stale_threshold = threshold;
        }

        if let Some(addr) = env_parse::<SocketAddr>("TRACKWIRE_DEST_ADDR") {
            config.sender.dest_addr = addr;
        }
        if let Some(rate) = env_parse::<u32>("TRACKWIRE_RATE_HZ") {
            config.sender.rate_hz = rate;
        }
        if let Some(count) = env_parse::<usize>("TRACKWIRE_ENTITY_COUNT") {
            config.sender.entity_count = count;
        }
        if let Some(seed) = env_parse::<u64>("TRACKWIRE_SEED") {
            config.sender.seed = Some(seed);
        }
        if let Some(enabled) = env_parse::<bool>("TRACKWIRE_FAULTS") {
            config.sender.faults_enabled = enabled;
        }
        if let Some(prob) = env_parse::<f64>("TRACKWIRE_FAULT_PROB") {
            config.sender.fault_trigger_prob = prob;
        }

        config.sender = config.sender.validated();
        config
    }

    /// Creates a configuration for tests.
    pub fn for_testing() -> Self {
        Self {
            sender: SenderConfig::deterministic_testing(),
            ..Default::default()
        }
    }
}

fn env_parse<T: std::str::FromStr>(key: &str) -> Option<T> {
    std::env::var(key).ok()?.trim().parse().ok()
}

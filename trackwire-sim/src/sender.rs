//! Fixed-rate simulated sender.

use std::future::Future;

use chrono::Utc;
use serde::Serialize;
use tokio::time::{Instant, MissedTickBehavior};
use tracing::{debug, info, warn};
use trackwire_core::{DatagramSink, EntityId, EntityState, SenderConfig};

use crate::SenderError;
use crate::faults::{FaultInjector, FaultOutcome, FaultStats};
use crate::kinematics::{Entity, World, spawn_entities};
use crate::rng::SimRng;

/// Sender counters, logged on shutdown.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct SenderStats {
    pub ticks: u64,
    pub sent: u64,
    pub send_errors: u64,
    pub faults: FaultStats,
}

/// Moves the simulated entities and emits one `EntityState` per entity per tick.
#[derive(Debug)]
pub struct Sender {
    config: SenderConfig,
    world: World,
    entities: Vec<Entity>,
    ids: Vec<EntityId>,
    rng: SimRng,
    faults: Option<FaultInjector>,
    seq: i64,
    ticks: u64,
    sent: u64,
    send_errors: u64,
}

impl Sender {
    /// Creates a sender in the default 800 x 600 world.
    pub fn new(config: SenderConfig) -> Self {
        Self::with_world(config, World::default())
    }

    pub fn with_world(config: SenderConfig, world: World) -> Self {
        let config = config.validated();
        let mut rng = SimRng::from_optional_seed(config.seed);
        let entities = spawn_entities(config.entity_count, &world, &mut rng);
        let ids = entities.iter().map(|entity| entity.id).collect();
        let faults = config
            .faults_enabled
            .then(|| FaultInjector::from_config(&config));

        Self {
            config,
            world,
            entities,
            ids,
            rng,
            faults,
            seq: 0,
            ticks: 0,
            sent: 0,
            send_errors: 0,
        }
    }

    /// Advances every entity one step and returns the messages that survive
    /// fault injection.
    ///
    /// `now` is sender time in seconds and drives the fault windows.
    pub fn tick(&mut self, now: f64) -> Vec<EntityState> {
        for entity in &mut self.entities {
            entity.step(&self.world);
        }
        self.seq += 1;
        self.ticks += 1;

        if let Some(faults) = self.faults.as_mut() {
            faults.maybe_trigger(now, &self.ids, &mut self.rng);
        }

        let timestamp = Utc::now().to_rfc3339();
        let mut outgoing = Vec::with_capacity(self.entities.len());
        for entity in &self.entities {
            let message = entity.to_state(self.seq, Some(timestamp.clone()));
            let Some(faults) = self.faults.as_mut() else {
                outgoing.push(message);
                continue;
            };
            match faults.apply(message, now, &mut self.rng) {
                FaultOutcome::Deliver { state, .. } => outgoing.push(state),
                FaultOutcome::Jammed | FaultOutcome::Dropped => {}
            }
        }
        outgoing
    }

    /// Runs one tick and sends the surviving messages.
    ///
    /// Send failures are logged and counted; the remaining messages are still
    /// sent. Returns how many datagrams went out.
    pub async fn send_tick<S>(&mut self, sink: &S, now: f64) -> usize
    where
        S: DatagramSink + ?Sized,
    {
        let mut delivered = 0;
        for message in self.tick(now) {
            match deliver(sink, &message).await {
                Ok(()) => delivered += 1,
                Err(e) => {
                    self.send_errors += 1;
                    warn!(entity = %message.entity_id, seq = message.seq, error = %e, "Send failed");
                }
            }
        }
        self.sent += delivered as u64;
        debug!(seq = self.seq, delivered, "Tick sent");
        delivered
    }

    /// Sends at the configured rate until `shutdown` completes.
    pub async fn run<S, F>(&mut self, sink: &S, shutdown: F) -> SenderStats
    where
        S: DatagramSink + ?Sized,
        F: Future<Output = ()>,
    {
        let mut interval = tokio::time::interval(self.config.tick_interval());
        interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
        let started = Instant::now();
        tokio::pin!(shutdown);

        info!(
            dest = %self.config.dest_addr,
            rate_hz = self.config.rate_hz,
            entities = self.entities.len(),
            seed = self.rng.seed(),
            faults = self.faults.is_some(),
            "Sender started"
        );

        loop {
            tokio::select! {
                () = &mut shutdown => break,
                _ = interval.tick() => {
                    let now = started.elapsed().as_secs_f64();
                    self.send_tick(sink, now).await;
                }
            }
        }

        let stats = self.stats();
        info!(
            ticks = stats.ticks,
            sent = stats.sent,
            send_errors = stats.send_errors,
            jammed = stats.faults.jammed,
            dropped = stats.faults.dropped,
            noised = stats.faults.noised,
            triggered = stats.faults.triggered,
            "Sender stopped"
        );
        stats
    }

    pub fn stats(&self) -> SenderStats {
        SenderStats {
            ticks: self.ticks,
            sent: self.sent,
            send_errors: self.send_errors,
            faults: self
                .faults
                .as_ref()
                .map(FaultInjector::stats)
                .unwrap_or_default(),
        }
    }

    pub fn entities(&self) -> &[Entity] {
        &self.entities
    }

    pub fn seq(&self) -> i64 {
        self.seq
    }

    pub fn seed(&self) -> u64 {
        self.rng.seed()
    }

    pub fn config(&self) -> &SenderConfig {
        &self.config
    }

    pub fn faults(&self) -> Option<&FaultInjector> {
        self.faults.as_ref()
    }
}

async fn deliver<S>(sink: &S, message: &EntityState) -> Result<(), SenderError>
where
    S: DatagramSink + ?Sized,
{
    let payload = serde_json::to_vec(message)?;
    sink.send(&payload).await?;
    Ok(())
}

//! Trackwire Sim - simulated entity sender with fault injection
//!
//! This crate drives the sending side of a Trackwire link: a handful of
//! entities bouncing around a bounded world, emitted as `EntityState`
//! datagrams at a fixed rate. Optional faults jam an entity, drop a burst of
//! its messages, or add noise to its transmitted heading.
//!
//! All randomness flows through one seeded [`SimRng`], so a fixed seed
//! reproduces the same entity layout and fault timeline.
//!
//! # Example
//!
//! ```rust,no_run
//! use trackwire_core::SenderConfig;
//! use trackwire_core::transport::UdpSink;
//! use trackwire_sim::Sender;
//!
//! # async fn run() -> Result<(), Box<dyn std::error::Error>> {
//! let config = SenderConfig {
//!     entity_count: 3,
//!     faults_enabled: true,
//!     ..SenderConfig::default()
//! };
//! let sink = UdpSink::open(config.dest_addr).await?;
//! let mut sender = Sender::new(config);
//!
//! let stats = sender
//!     .run(&sink, async {
//!         let _ = tokio::signal::ctrl_c().await;
//!     })
//!     .await;
//! println!("sent {} messages", stats.sent);
//! # Ok(())
//! # }
//! ```

pub mod faults;
pub mod kinematics;
pub mod rng;
pub mod sender;

pub use faults::{FaultInjector, FaultKind, FaultOutcome, FaultState, FaultStats};
pub use kinematics::{Entity, World, spawn_entities};
pub use rng::SimRng;
pub use sender::{Sender, SenderStats};

/// Errors raised while emitting a single message.
#[derive(Debug, thiserror::Error)]
pub enum SenderError {
    #[error("Failed to encode message: {0}")]
    Encode(#[from] serde_json::Error),

    #[error(transparent)]
    Transport(#[from] trackwire_core::TransportError),
}

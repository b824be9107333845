//! CLI command implementations

use std::net::SocketAddr;
use std::path::PathBuf;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::{Args, Subcommand};
use tokio::time::MissedTickBehavior;
use tracing::{info, warn};
use trackwire_core::transport::{UdpSink, bind_receiver};
use trackwire_core::{
    Receiver, ReceiverConfig, ReceiverStatus, SenderConfig, TrackwireConfig, TrackwireError,
};
use trackwire_sim::Sender;

/// Available CLI commands
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Listen for EntityState datagrams and maintain tracks
    Receive(ReceiveArgs),
    /// Run the simulated sender
    Send(SendArgs),
}

#[derive(Args, Debug, Default)]
pub struct ReceiveArgs {
    /// Address to listen on
    #[arg(long)]
    pub bind: Option<SocketAddr>,
    /// Record accepted messages to a JSON Lines capture
    #[arg(long, value_name = "FILE")]
    pub record: Option<PathBuf>,
    /// Replay a capture before returning to live input
    #[arg(long, value_name = "FILE")]
    pub replay: Option<PathBuf>,
    /// Seconds without a message before a track is stale
    #[arg(long)]
    pub stale_secs: Option<f64>,
    /// Maximum datagrams processed per tick
    #[arg(long)]
    pub max_per_poll: Option<usize>,
}

#[derive(Args, Debug, Default)]
pub struct SendArgs {
    /// Destination address
    #[arg(long)]
    pub dest: Option<SocketAddr>,
    /// Messages per second per entity
    #[arg(long)]
    pub rate: Option<u32>,
    /// Number of simulated entities
    #[arg(long)]
    pub entities: Option<usize>,
    /// RNG seed (random when omitted)
    #[arg(long)]
    pub seed: Option<u64>,
    /// Enable jam, burst-drop and heading-noise faults
    #[arg(long)]
    pub faults: bool,
    /// Probability that a fault check starts a fault
    #[arg(long)]
    pub fault_prob: Option<f64>,
    /// Seconds between fault checks
    #[arg(long)]
    pub fault_check_secs: Option<f64>,
    /// Log fault triggers at info level
    #[arg(long)]
    pub fault_debug: bool,
}

/// Handle the CLI command
///
/// # Errors
/// Returns appropriate error based on the command that fails
pub async fn handle_command(command: Commands) -> Result<()> {
    let config = TrackwireConfig::from_env();
    match command {
        Commands::Receive(args) => run_receiver(receiver_config(config.receiver, &args)?, args).await,
        Commands::Send(args) => run_sender(sender_config(config.sender, &args)?).await,
    }
}

/// Applies command-line overrides on top of the environment configuration.
///
/// # Errors
/// - `TrackwireError::Configuration` - Stale threshold is negative or not a number
pub fn receiver_config(mut config: ReceiverConfig, args: &ReceiveArgs) -> Result<ReceiverConfig> {
    if let Some(bind) = args.bind {
        config.bind_addr = bind;
    }
    if let Some(secs) = args.stale_secs {
        config.stale_threshold =
            Duration::try_from_secs_f64(secs).map_err(|e| TrackwireError::Configuration {
                reason: format!("stale threshold {secs}: {e}"),
            })?;
    }
    if let Some(max) = args.max_per_poll {
        config.max_messages_per_poll = max.max(1);
    }
    Ok(config)
}

/// Applies command-line overrides on top of the environment configuration.
///
/// # Errors
/// - `TrackwireError::Configuration` - Fault check interval is negative or not a number
pub fn sender_config(mut config: SenderConfig, args: &SendArgs) -> Result<SenderConfig> {
    if let Some(dest) = args.dest {
        config.dest_addr = dest;
    }
    if let Some(rate) = args.rate {
        config.rate_hz = rate;
    }
    if let Some(count) = args.entities {
        config.entity_count = count;
    }
    if args.seed.is_some() {
        config.seed = args.seed;
    }
    config.faults_enabled |= args.faults;
    config.fault_debug |= args.fault_debug;
    if let Some(prob) = args.fault_prob {
        config.fault_trigger_prob = prob;
    }
    if let Some(secs) = args.fault_check_secs {
        config.fault_check_interval =
            Duration::try_from_secs_f64(secs).map_err(|e| TrackwireError::Configuration {
                reason: format!("fault check interval {secs}: {e}"),
            })?;
    }
    Ok(config.validated())
}

/// Runs the receive loop until Ctrl+C.
///
/// # Errors
/// - `TrackwireError::Transport` - The listen socket could not be bound
async fn run_receiver(config: ReceiverConfig, args: ReceiveArgs) -> Result<()> {
    let mut socket = bind_receiver(config.bind_addr)
        .await
        .map_err(TrackwireError::from)
        .with_context(|| format!("cannot listen on {}", config.bind_addr))?;
    info!(addr = %config.bind_addr, "Listening for EntityState datagrams");

    let mut receiver = Receiver::new(config.clone());

    if let Some(path) = &args.record
        && let Err(e) = receiver.start_recording(path)
    {
        let error = TrackwireError::from(e);
        warn!(error = %error, "{}", error.user_message());
    }
    if let Some(path) = &args.replay
        && let Err(e) = receiver.start_replay(path)
    {
        let error = TrackwireError::from(e);
        warn!(error = %error, "{}, staying live", error.user_message());
    }

    let mut ticker = tokio::time::interval(config.tick_interval);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
    let mut status_ticker = tokio::time::interval(config.status_interval);
    status_ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

    let shutdown = tokio::signal::ctrl_c();
    tokio::pin!(shutdown);

    loop {
        tokio::select! {
            result = &mut shutdown => {
                if let Err(e) = result {
                    warn!(error = %e, "Failed to wait for Ctrl+C");
                }
                break;
            }
            _ = ticker.tick() => {
                receiver.tick(&mut socket);
            }
            _ = status_ticker.tick() => {
                log_status(&receiver.status());
            }
        }
    }

    for report in receiver.track_reports() {
        let position = report.track.position();
        info!(
            entity = %report.track.entity_id(),
            x = position.x,
            y = position.y,
            heading = report.track.heading_deg(),
            stale = report.stale,
            "Final track"
        );
    }
    receiver.shutdown();
    Ok(())
}

fn log_status(status: &ReceiverStatus) {
    info!(
        mode = %status.mode,
        recording = status.recording,
        tracks = status.tracks,
        stale = status.stale_tracks,
        rate = %format!("{:.1}", status.rate),
        max_seq = ?status.max_seq_seen,
        drops = status.estimated_drops,
        rejected = status.ingest.decode_errors + status.ingest.validation_errors,
        "Receiver status"
    );
}

/// Runs the simulated sender until Ctrl+C.
///
/// # Errors
/// - `TrackwireError::Transport` - No local socket could be bound
async fn run_sender(config: SenderConfig) -> Result<()> {
    let sink = UdpSink::open(config.dest_addr)
        .await
        .map_err(TrackwireError::from)
        .context("cannot open sender socket")?;

    let mut sender = Sender::new(config);
    sender
        .run(&sink, async {
            if let Err(e) = tokio::signal::ctrl_c().await {
                warn!(error = %e, "Failed to wait for Ctrl+C");
            }
        })
        .await;
    Ok(())
}

//! Trackwire CLI - Command-line interface
//!
//! Runs either side of a Trackwire link: the track-keeping receiver or the
//! simulated sender.

mod commands;

use std::path::PathBuf;

use clap::Parser;
use trackwire_core::tracing_setup::{CliLogLevel, init_tracing};

#[derive(Parser, Debug)]
#[command(name = "trackwire")]
#[command(about = "Entity telemetry over UDP with capture and replay")]
#[command(version)]
struct Cli {
    /// Console log level (overridden by RUST_LOG)
    #[arg(long, value_enum, default_value_t = CliLogLevel::Info, global = true)]
    log_level: CliLogLevel,

    /// Directory for the full trace log
    #[arg(long, global = true, value_name = "DIR")]
    logs_dir: Option<PathBuf>,

    #[command(subcommand)]
    command: commands::Commands,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.log_level.as_tracing_level(), cli.logs_dir.as_deref())?;

    commands::handle_command(cli.command).await
}

#[cfg(test)]
mod tests {
    use clap::CommandFactory;

    use super::*;
    use crate::commands::Commands;

    #[test]
    fn test_cli_definition_is_consistent() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_parse_receive_with_capture() {
        let cli = Cli::try_parse_from([
            "trackwire",
            "receive",
            "--bind",
            "127.0.0.1:30001",
            "--record",
            "session.jsonl",
            "--log-level",
            "debug",
        ])
        .unwrap();

        assert_eq!(cli.log_level, CliLogLevel::Debug);
        let Commands::Receive(args) = cli.command else {
            panic!("expected receive");
        };
        assert_eq!(args.record, Some(PathBuf::from("session.jsonl")));
        assert!(args.replay.is_none());
    }

    #[test]
    fn test_parse_send_with_faults() {
        let cli = Cli::try_parse_from([
            "trackwire",
            "send",
            "--entities",
            "3",
            "--seed",
            "42",
            "--faults",
            "--fault-prob",
            "0.25",
        ])
        .unwrap();

        let Commands::Send(args) = cli.command else {
            panic!("expected send");
        };
        assert_eq!(args.entities, Some(3));
        assert_eq!(args.seed, Some(42));
        assert!(args.faults);
        assert_eq!(args.fault_prob, Some(0.25));
    }

    #[test]
    fn test_unknown_subcommand_rejected() {
        assert!(Cli::try_parse_from(["trackwire", "broadcast"]).is_err());
    }
}

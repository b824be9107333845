//! Tracing setup for Trackwire binaries.
//!
//! Console output follows the level chosen on the command line (or `RUST_LOG`);
//! a trace-level copy of every run is written to `logs/trackwire-last-run.log`.

use std::fs::{File, create_dir_all};
use std::path::Path;

use tracing::Level;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{EnvFilter, Layer, fmt};

/// Log file name inside the logs directory, overwritten on every run.
pub const LOG_FILE_NAME: &str = "trackwire-last-run.log";

/// Initialize tracing with console output plus a full trace log on disk.
///
/// # Arguments
/// * `console_level` - Level for console output when `RUST_LOG` is unset
/// * `logs_dir` - Directory for the run log (defaults to "./logs")
///
/// # Errors
///
/// - `std::io::Error` - If the logs directory or log file cannot be created
pub fn init_tracing(console_level: Level, logs_dir: Option<&Path>) -> std::io::Result<()> {
    let logs_path = logs_dir.unwrap_or_else(|| Path::new("logs"));
    create_dir_all(logs_path)?;

    let log_file_path = logs_path.join(LOG_FILE_NAME);
    let log_file = File::create(&log_file_path)?;

    let console_filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(console_level.to_string()));

    let console_layer = fmt::layer()
        .with_target(true)
        .with_thread_ids(false)
        .with_file(false)
        .with_line_number(false)
        .with_filter(console_filter);

    let file_layer = fmt::layer()
        .with_target(true)
        .with_thread_ids(true)
        .with_file(true)
        .with_line_number(true)
        .with_ansi(false)
        .with_writer(log_file)
        .with_filter(EnvFilter::new("trace"));

    tracing_subscriber::registry()
        .with(console_layer)
        .with(file_layer)
        .init();

    tracing::info!(
        console = %console_level,
        debug_file = %log_file_path.display(),
        "Tracing initialized"
    );
    Ok(())
}

/// CLI log levels for user control
#[derive(Debug, Clone, Copy, PartialEq, Eq, clap::ValueEnum)]
pub enum CliLogLevel {
    /// Only error messages
    Error,
    /// Warning and error messages
    Warn,
    /// Informational, warning, and error messages
    Info,
    /// Debug and above
    Debug,
    /// Everything, including per-datagram tracing
    Trace,
}

impl CliLogLevel {
    /// Converts CLI log level to the tracing `Level`.
    ///
    /// # Examples
    /// ```
    /// use trackwire_core::tracing_setup::CliLogLevel;
    ///
    /// assert_eq!(CliLogLevel::Info.as_tracing_level(), tracing::Level::INFO);
    /// ```
    pub fn as_tracing_level(self) -> Level {
        match self {
            CliLogLevel::Error => Level::ERROR,
            CliLogLevel::Warn => Level::WARN,
            CliLogLevel::Info => Level::INFO,
            CliLogLevel::Debug => Level::DEBUG,
            CliLogLevel::Trace => Level::TRACE,
        }
    }
}

impl std::fmt::Display for CliLogLevel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_tracing_level())
    }
}

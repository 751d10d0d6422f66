//! # WSPR Telemetry
//!
//! Decode WSPR tracker telemetry from a report feed.
//!
//! Polls a report source, merges new reports into the known set and writes
//! the decoded spots as JSON Lines whenever new reports arrived.

use anyhow::{Context, Result};
use tokio::time::{interval, Duration, MissedTickBehavior};
use tracing::{info, warn};
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use wspr_telemetry::config::{Config, LoggingConfig};
use wspr_telemetry::geo::sun::AlmanacSun;
use wspr_telemetry::output::write_spots;
use wspr_telemetry::pipeline::Tracker;
use wspr_telemetry::source::{poll, FileReportSource, QueryWindow};

/// Configuration file used when none is given on the command line
const DEFAULT_CONFIG_PATH: &str = "config/default.toml";

/// Prefix of daily log file names
const LOG_FILE_PREFIX: &str = "wspr-telemetry.log";

/// Initialize logging to stdout and, when configured, a daily log file
///
/// # Returns
///
/// * `Option<WorkerGuard>` - Guard flushing the file writer; keep it alive
///   for the lifetime of the program
fn init_logging(config: &LoggingConfig) -> Option<WorkerGuard> {
    let filter = EnvFilter::from_default_env().add_directive(tracing::Level::INFO.into());
    let stdout_layer = fmt::layer();

    if config.dir.is_empty() {
        tracing_subscriber::registry()
            .with(filter)
            .with(stdout_layer)
            .init();
        return None;
    }

    let file_appender = tracing_appender::rolling::daily(&config.dir, LOG_FILE_PREFIX);
    let (file_writer, guard) = tracing_appender::non_blocking(file_appender);
    tracing_subscriber::registry()
        .with(filter)
        .with(stdout_layer)
        .with(fmt::layer().with_writer(file_writer).with_ansi(false))
        .init();
    Some(guard)
}

/// Poll once and rewrite the output when new reports arrived
async fn refresh(
    source: &mut FileReportSource,
    window: &QueryWindow,
    tracker: &mut Tracker,
    config: &Config,
) -> Result<()> {
    let new_count = poll(source, window, tracker).await?;
    if new_count == 0 {
        return Ok(());
    }

    let spots = tracker.spots(&AlmanacSun);
    write_spots(&config.output.path, &spots, tracker.et_spec())
        .await
        .with_context(|| format!("Failed to write {}", config.output.path))?;
    info!("Wrote {} spots to {}", spots.len(), config.output.path);
    Ok(())
}

/// Main entry point for WSPR Telemetry
///
/// # Control Flow
///
/// 1. **Initialization**
///    - Load configuration (first argument, or `config/default.toml`)
///    - Set up logging with tracing subscriber
///    - Resolve the channel code and compile the telemetry program
///
/// 2. **Main Loop**
///    - Fetch reports from the input file at the poll interval
///    - Reprocess and rewrite the output when new reports arrived
///    - Handle Ctrl+C for graceful shutdown
///
/// With `poll_interval_s = 0` a single pass is made and the program exits.
///
/// # Errors
///
/// Returns error if the configuration is invalid, or if the first fetch in
/// single-pass mode fails
///
/// # Examples
///
/// ```bash
/// cargo run --release -- config/default.toml
/// ```
#[tokio::main]
async fn main() -> Result<()> {
    let config_path = std::env::args()
        .nth(1)
        .unwrap_or_else(|| DEFAULT_CONFIG_PATH.to_string());
    let config = Config::load(&config_path)
        .with_context(|| format!("Failed to load configuration from {}", config_path))?;

    let _log_guard = init_logging(&config.logging);
    info!("WSPR Telemetry v{} starting...", env!("CARGO_PKG_VERSION"));

    let params = config.tracker_params()?;
    let et = config.et_spec()?;
    info!(
        "Tracking {:?} channel {} ({} extended telemetry channels)",
        params.channel.tracker,
        params.channel.channel,
        et.channel_count()
    );

    let mut tracker = Tracker::new(params, et);
    let mut source = FileReportSource::new(&config.input.path);

    if config.input.poll_interval_s == 0 {
        let window = config.query_window(chrono::Utc::now())?;
        refresh(&mut source, &window, &mut tracker, &config).await?;
        return Ok(());
    }

    let mut poll_interval = interval(Duration::from_secs(config.input.poll_interval_s));
    poll_interval.set_missed_tick_behavior(MissedTickBehavior::Delay);

    info!(
        "Polling {} every {}s",
        source.path().display(),
        config.input.poll_interval_s
    );
    info!("Press Ctrl+C to exit");

    // Main polling loop
    loop {
        tokio::select! {
            _ = poll_interval.tick() => {
                let window = match config.query_window(chrono::Utc::now()) {
                    Ok(window) => window,
                    Err(e) => {
                        warn!("Query window no longer valid: {}", e);
                        break;
                    }
                };

                if let Err(e) = refresh(&mut source, &window, &mut tracker, &config).await {
                    warn!("Poll failed: {:#}", e);
                }
            }

            // Handle Ctrl+C for graceful shutdown
            _ = tokio::signal::ctrl_c() => {
                info!("Received Ctrl+C, shutting down...");
                break;
            }
        }
    }

    info!("Total reports known: {}", tracker.reports().len());
    Ok(())
}

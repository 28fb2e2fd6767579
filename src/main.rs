//! Log Forwarder - ships structured log events to an event-ingestion endpoint
//!
//! Reads newline-delimited JSON log events from stdin, batches them and
//! forwards them to the configured endpoint.
//!
//! ## Input
//!
//! One JSON object per line:
//!
//! ```text
//! {"timestamp":"2024-05-01T12:00:00Z","level":"info","message_template":"User {UserId} logged in","properties":{"UserId":42}}
//! ```
//!
//! Malformed lines are skipped with a warning.
//!
//! ## Configuration
//!
//! See `log_forwarder::config::Config` for the `LOG_FORWARDER_*` variables.
//! `RUST_LOG` sets the logging level filter (default: info).

use std::sync::Arc;
use std::time::Duration;

use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::sync::mpsc;
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

use log_forwarder::config::Config;
use log_forwarder::event::LogEvent;
use log_forwarder::forwarder::{self, ForwarderOptions};
use log_forwarder::scheduler::run_batching;

/// Channel capacity between the stdin reader and the batching loop
const CHANNEL_CAPACITY: usize = 1000;

/// Upper bound on the final flush during shutdown
const SHUTDOWN_TIMEOUT: Duration = Duration::from_secs(10);

#[tokio::main]
async fn main() {
    // Initialize tracing subscriber with environment filter
    init_tracing();

    info!("Starting log forwarder...");

    let config = match Config::from_env() {
        Ok(config) => {
            info!(
                events_url = %config.events_url,
                application_name = ?config.application_name,
                batch_size = config.batch_size,
                flush_interval_secs = config.flush_interval.as_secs(),
                max_message_bytes = config.max_message_bytes,
                transport_profile = %config.transport_profile,
                "Configuration loaded"
            );
            config
        }
        Err(e) => {
            error!(error = %e, "Failed to load configuration");
            std::process::exit(1);
        }
    };

    let dispatcher = match forwarder::build(&config, ForwarderOptions::default()) {
        Ok(dispatcher) => Arc::new(dispatcher),
        Err(e) => {
            error!(error = %e, "Failed to create transport");
            std::process::exit(1);
        }
    };

    let (tx, rx) = mpsc::channel(CHANNEL_CAPACITY);

    let batching_handle = tokio::spawn(run_batching(
        rx,
        config.batch_size,
        config.flush_interval,
        dispatcher,
    ));

    let mut reader_handle = tokio::spawn(read_events(tx));

    tokio::select! {
        result = &mut reader_handle => {
            match result {
                Ok(lines) => info!(lines = lines, "Input closed"),
                Err(e) => warn!(error = %e, "Reader task failed"),
            }
        }
        signal = tokio::signal::ctrl_c() => {
            match signal {
                Ok(()) => info!("Shutdown signal received, stopping..."),
                Err(e) => error!(error = %e, "Failed to listen for shutdown signal"),
            }
            // Dropping the reader's sender closes the channel
            reader_handle.abort();
        }
    }

    match tokio::time::timeout(SHUTDOWN_TIMEOUT, batching_handle).await {
        Ok(Ok(stats)) => {
            info!(
                events = stats.events_received,
                batches = stats.batches_dispatched,
                degraded = stats.degraded_batches,
                encode_failures = stats.encode_failures,
                unsent = stats.events_unsent,
                "Batching loop shut down gracefully"
            );
        }
        Ok(Err(e)) => {
            warn!(error = %e, "Batching loop panicked during shutdown");
        }
        Err(_) => {
            warn!("Final flush timed out after {:?}", SHUTDOWN_TIMEOUT);
        }
    }

    info!("Log forwarder stopped");
}

/// Initialize the tracing subscriber with environment-based filtering.
fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(true)
        .with_thread_ids(false)
        .with_file(false)
        .with_line_number(false)
        .compact()
        .init();
}

/// Read JSON-lines events from stdin until EOF or until the channel closes.
///
/// Returns the number of lines read.
async fn read_events(tx: mpsc::Sender<LogEvent>) -> u64 {
    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    let mut count: u64 = 0;

    loop {
        let line = match lines.next_line().await {
            Ok(Some(line)) => line,
            Ok(None) => break,
            Err(e) => {
                error!(error = %e, "Failed to read from stdin");
                break;
            }
        };
        count += 1;

        if line.trim().is_empty() {
            continue;
        }

        match parse_line(&line) {
            Ok(event) => {
                if tx.send(event).await.is_err() {
                    info!("Channel closed, reader stopping");
                    break;
                }
            }
            Err(e) => {
                warn!(line = count, error = %e, "Skipping malformed log event");
            }
        }
    }

    count
}

fn parse_line(line: &str) -> Result<LogEvent, serde_json::Error> {
    serde_json::from_str(line)
}

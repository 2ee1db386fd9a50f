//! Command-line entry point for afolink
//!
//! ```bash
//! afolink check --config config.yaml
//! afolink listen --config config.yaml --record data_log.csv
//! afolink listen --simulate
//! afolink send --set assistance_level=2 --set motor_enable=1
//! ```
//!
//! Logging is controlled with `RUST_LOG` (default `info`).

use afolink::config::RecorderConfig;
use afolink::{Config, CsvRecorder, OutboundCommand, PacketSchema, TelemetryListener, send_datagram};
use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "afolink")]
#[command(about = "UDP telemetry link for the orthosis test rig", long_about = None)]
struct Cli {
    /// Configuration file
    #[arg(long, short, global = true, default_value = "config.yaml")]
    config: PathBuf,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Validate the configuration and print the packet layouts
    Check,

    /// Receive telemetry and log the latest frame until interrupted
    Listen {
        /// Record frames to this CSV file
        #[arg(long)]
        record: Option<PathBuf>,

        /// Use synthetic telemetry instead of the rig
        #[arg(long)]
        simulate: bool,
    },

    /// Send one control datagram
    Send {
        /// Signal assignment, repeatable
        #[arg(long = "set", value_name = "NAME=VALUE", required = true)]
        assignments: Vec<String>,

        /// Destination, defaults to send_host:send_port
        #[arg(long)]
        to: Option<String>,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let cli = Cli::parse();
    let config = Config::load(&cli.config)
        .with_context(|| format!("loading {}", cli.config.display()))?;

    match cli.command {
        Commands::Check => check(&config),
        Commands::Listen { record, simulate } => listen(&config, record, simulate).await,
        Commands::Send { assignments, to } => send(&config, &assignments, to).await,
    }
}

fn check(config: &Config) -> Result<()> {
    let packet = config.packet_schema()?;
    println!("listen  {}", config.udp.listen_address());
    println!("send    {}", config.udp.send_address());
    print_layout("packet", &packet);

    if config.control.is_some() {
        print_layout("control", &config.control_schema()?);
    }
    Ok(())
}

fn print_layout(label: &str, schema: &PacketSchema) {
    println!(
        "{label:<7} {} ({} elements, {} bytes, default {})",
        schema.format(),
        schema.element_count(),
        schema.byte_length(),
        schema.default_value()
    );
    for (name, index) in schema.signals_by_index() {
        println!("  [{index:>3}] {name}");
    }
}

async fn listen(config: &Config, record: Option<PathBuf>, simulate: bool) -> Result<()> {
    let listener = TelemetryListener::from_config(config, simulate)
        .await
        .context("starting listener")?;

    let recorder_config = match record {
        Some(path) => {
            let mut recorder = config.recorder.clone().unwrap_or_else(|| RecorderConfig::new(&path));
            recorder.path = path;
            Some(recorder)
        }
        None => config.recorder.clone(),
    };

    let cancel = CancellationToken::new();
    let recorder = match recorder_config {
        Some(settings) => {
            let recorder = CsvRecorder::from_config(&settings, listener.schema())?;
            Some(recorder.spawn(listener.watch(), settings.flush_interval(), cancel.clone()))
        }
        None => None,
    };

    let mut poll = tokio::time::interval(config.ingest.poll_interval());
    let mut last_sequence = 0;
    loop {
        tokio::select! {
            _ = tokio::signal::ctrl_c() => {
                info!("Interrupted");
                break;
            }
            _ = poll.tick() => {
                if let Some(frame) = listener.latest() {
                    if frame.sequence != last_sequence {
                        last_sequence = frame.sequence;
                        let mut values: Vec<_> = frame.values().iter().collect();
                        values.sort_by(|a, b| a.0.cmp(b.0));
                        info!(sequence = frame.sequence, values = ?values, "Latest frame");
                    }
                }
            }
        }
    }

    cancel.cancel();
    listener.stop().await;
    if let Some(task) = recorder {
        match task.await {
            Ok(result) => result.context("flushing recorder")?,
            Err(e) => warn!("Recorder task failed: {}", e),
        }
    }

    let stats = listener.stats().snapshot();
    info!(
        received = stats.received,
        published = stats.published,
        dropped = stats.dropped,
        errors = stats.errors,
        "Done"
    );
    Ok(())
}

async fn send(config: &Config, assignments: &[String], to: Option<String>) -> Result<()> {
    let schema = config.control_schema()?;
    let command = OutboundCommand::parse_assignments(assignments.iter().map(String::as_str))?;
    let destination = to.unwrap_or_else(|| config.udp.send_address());

    send_datagram(&schema, destination.as_str(), &command)
        .await
        .with_context(|| format!("sending to {destination}"))?;

    info!(destination = %destination, bytes = schema.byte_length(), "Control datagram sent");
    Ok(())
}

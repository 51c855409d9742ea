//! Session correlator replay tool.
//!
//! # Architecture Overview
//!
//! ```text
//!   event script (JSON)
//!        │
//!        ▼
//!   ┌──────────┐  per-handle   ┌──────────────────┐      ┌──────────────┐
//!   │  replay  │──────────────▶│ EventCorrelator  │─────▶│ SessionStore │
//!   │  driver  │    tasks      │                  │      │  (DashMap)   │
//!   └────┬─────┘               └────────┬─────────┘      └──────────────┘
//!        │ remove(handle)               │ added / changed
//!        ▼                              ▼
//!   ┌──────────────┐  dispatcher  ┌──────────────┐
//!   │ SessionList  │◀─────────────│ observer mpsc│
//!   └──────────────┘     task     └──────────────┘
//! ```
//!
//! Prints the observer's final view as JSON snapshots.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use clap::{Parser, Subcommand};

use session_correlator::config::{load_config, CorrelatorConfig};
use session_correlator::lifecycle::{shutdown_on_ctrl_c, Shutdown};
use session_correlator::observability::{logging, metrics};
use session_correlator::observer::{ObserverDispatcher, ObserverSender, SessionList};
use session_correlator::replay::{load_script, Replay};
use session_correlator::session::SessionStore;
use session_correlator::EventCorrelator;

#[derive(Parser)]
#[command(name = "session-replay")]
#[command(about = "Replay recorded proxy events through the session correlator", long_about = None)]
struct Cli {
    /// Configuration file (TOML). Defaults apply when omitted.
    #[arg(short, long)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run an event script and print the resulting sessions
    Replay {
        /// Event script (JSON)
        script: PathBuf,
    },
    /// Validate the configuration and print the effective settings
    CheckConfig,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    let config = match &cli.config {
        Some(path) => load_config(path)?,
        None => CorrelatorConfig::default(),
    };

    match cli.command {
        Commands::CheckConfig => {
            println!("{}", toml::to_string_pretty(&config)?);
            Ok(())
        }
        Commands::Replay { script } => replay(config, script).await,
    }
}

async fn replay(
    config: CorrelatorConfig,
    script: PathBuf,
) -> Result<(), Box<dyn std::error::Error>> {
    logging::init_tracing(&config.observability);
    tracing::info!(
        request_bodies = config.capture.request_bodies,
        response_bodies = config.capture.response_bodies,
        body_fetch_timeout_ms = config.capture.body_fetch_timeout_ms,
        "Configuration loaded"
    );

    if config.observability.metrics_enabled {
        metrics::init_metrics(config.observability.metrics_address.parse()?);
    }

    let script = load_script(&script)?;

    let shutdown = Shutdown::new();
    let (notifier, rx) = ObserverSender::channel();
    let store = SessionStore::new(notifier);
    let list = Arc::new(SessionList::new(store.clone()));
    let dispatcher =
        tokio::spawn(ObserverDispatcher::new(rx, list.clone()).run(shutdown.subscribe()));

    let correlator = EventCorrelator::new(store, config.capture.clone());
    let flush = correlator.spawn_counter_flush(
        Duration::from_millis(config.observer.counter_flush_interval_ms),
        shutdown.subscribe(),
    );

    let replay = Replay::new(correlator, list.clone());
    tokio::select! {
        _ = replay.run(script) => {}
        _ = shutdown_on_ctrl_c(shutdown.clone()) => {
            tracing::warn!("Replay interrupted");
        }
    }

    shutdown.trigger();
    flush.await?;
    dispatcher.await?;

    let snapshots = list.snapshots(config.capture.preview_bytes);
    println!("{}", serde_json::to_string_pretty(&snapshots)?);
    Ok(())
}

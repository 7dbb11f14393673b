//! Ingest binary for the Playground.
//!
//! One process of the ingest fleet. Every process is identical: it serves
//! WebSocket clients, relays broadcasts to and from its peers over the
//! shared store, and takes over global work whenever it is the oldest live
//! ingest.
//!
//! # Startup Sequence
//!
//! 1. Parse flags and load settings (`config/base.yaml`, profile, env)
//! 2. Initialize structured logging (tracing)
//! 3. Read secrets and build the outbound collaborators
//! 4. Connect to `Dragonfly` under a fresh ingest id (optionally resetting)
//! 5. Spawn the hub, the bus listener and the leader ticker
//! 6. Serve HTTP until a task stops

mod error;

use std::path::PathBuf;
use std::sync::Arc;

use clap::Parser;
use playground_core::{Context, Hub, Secrets, Services, Settings, Ticker, bus, world};
use playground_db::{DragonflyPool, Store};
use playground_server::{AppState, start_server};
use playground_types::IngestId;
use tokio::task::JoinError;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

use crate::error::IngestError;

/// Command line flags.
#[derive(Debug, Parser)]
#[command(name = "playground-ingest", about = "Playground real-time ingest")]
struct Cli {
    /// Settings profile layered over `base.yaml`.
    #[arg(long = "env", env = "PLAYGROUND_ENV", default_value = "dev")]
    profile: String,

    /// Listen port, overriding the settings.
    #[arg(long, env = "PORT")]
    port: Option<u16>,

    /// Directory holding the YAML settings files.
    #[arg(long, default_value = "config")]
    config_dir: PathBuf,

    /// Flush the store and seed rooms, sponsors and the NPC before serving.
    #[arg(long)]
    reset: bool,

    /// Emit logs as JSON lines.
    #[arg(long)]
    json_logs: bool,
}

/// Application entry point.
///
/// # Errors
///
/// Returns an error if startup fails or if the hub, the bus listener or the
/// HTTP server stops. A failed position write stops the hub, so the process
/// exits non-zero.
#[tokio::main]
async fn main() -> Result<(), IngestError> {
    let cli = Cli::parse();

    let mut settings = Settings::load(&cli.config_dir, &cli.profile)?;
    if let Some(port) = cli.port {
        settings.server.port = port;
    }

    init_logging(&settings.logging.level, cli.json_logs);
    info!(profile = cli.profile, "playground-ingest starting");

    let secrets = Secrets::from_env()?;
    let services = Services::from_settings(&settings, &secrets)?;

    let ingest = IngestId::generate();
    let pool = DragonflyPool::connect(&settings.store.url, Some(ingest.as_str())).await?;
    let store: Arc<dyn Store> = Arc::new(pool);
    info!(%ingest, url = settings.store.url, "Store connected");

    if cli.reset {
        world::reset(store.as_ref(), &settings).await?;
        info!(
            rooms = settings.rooms.seed.len(),
            sponsors = settings.sponsors.len(),
            "Store reset and seeded"
        );
    }

    let ctx = Context::new(store, ingest, settings, secrets, services);
    let (hub, handle) = Hub::new(ctx.clone());
    let ticker = Ticker::new(ctx.clone(), handle.broadcaster(&ctx));
    let state = Arc::new(AppState::new(ctx.clone(), handle.clone()));

    let hub_task = tokio::spawn(hub.run());
    let bus_task = tokio::spawn(bus::listen(ctx.store.clone(), ctx.ingest.clone(), handle.relay()));
    let ticker_task = tokio::spawn(ticker.run());
    let server_config = ctx.settings.server.clone();
    let server_task = tokio::spawn(async move { start_server(&server_config, state).await });

    let result = tokio::select! {
        joined = hub_task => flatten(joined, "hub").and_then(|r| r.map_err(IngestError::from)),
        joined = bus_task => flatten(joined, "bus").and_then(|r| r.map_err(IngestError::from)),
        joined = server_task => flatten(joined, "server").and_then(|r| r.map_err(IngestError::from)),
    };
    ticker_task.abort();

    match result {
        Ok(()) => {
            info!("playground-ingest stopped");
            Ok(())
        }
        Err(e) => {
            error!(error = %e, "playground-ingest stopping on failure");
            Err(e)
        }
    }
}

/// Install the global subscriber. `RUST_LOG` wins over the configured level.
fn init_logging(level: &str, json: bool) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));
    if json {
        tracing_subscriber::fmt()
            .json()
            .with_env_filter(filter)
            .with_target(true)
            .init();
    } else {
        tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_target(true)
            .init();
    }
}

fn flatten<T>(joined: Result<T, JoinError>, task: &str) -> Result<T, IngestError> {
    joined.map_err(|e| IngestError::Task {
        message: format!("{task} task failed: {e}"),
    })
}

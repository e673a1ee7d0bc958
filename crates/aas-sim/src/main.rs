//! AAS factory simulation - backend server entry point.

use std::sync::Arc;

use aas_engine::{RunManager, SimulationState};
use aas_persistence::JsonStateStore;
use aas_sim::{AppConfig, DEFAULT_CONFIG_PATH};
use anyhow::Result;
use clap::Parser;
use tracing::{error, info};

/// AAS simulation backend (engraver + AGV with usage billing)
#[derive(Parser, Debug)]
#[command(version, about, long_about = None)]
struct Args {
    /// Configuration file path (can also be set via AAS_CONFIG env var)
    #[arg(short, long)]
    config: Option<String>,

    /// State file path, overrides the configured one
    #[arg(long)]
    state_file: Option<String>,

    /// Port to listen on, overrides the configured one
    #[arg(short, long)]
    port: Option<u16>,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    // Config path: CLI arg > AAS_CONFIG env var > default
    let explicit_path = args.config.or_else(|| std::env::var("AAS_CONFIG").ok());
    let mut config = match &explicit_path {
        Some(path) => AppConfig::from_file(path)?,
        None => AppConfig::from_file_or_default(DEFAULT_CONFIG_PATH)?,
    }
    .with_env_overrides()?;

    if let Some(state_file) = args.state_file {
        config.state_file = state_file;
    }
    if let Some(port) = args.port {
        config.api.port = port;
    }

    aas_telemetry::init_logging(&config.log_filter)?;

    info!("Starting AAS simulation v{}", env!("CARGO_PKG_VERSION"));
    info!(
        config_path = explicit_path.as_deref().unwrap_or(DEFAULT_CONFIG_PATH),
        state_file = %config.state_file,
        bind = %config.api.bind_addr(),
        "Configuration loaded"
    );

    let store = JsonStateStore::new(&config.state_file);
    let state = Arc::new(SimulationState::new(
        config.simulation.clone(),
        config.coords.clone(),
        Some(store),
    ));
    let runs = RunManager::new(state);

    aas_api::run_server(runs, config.api.clone(), shutdown_signal()).await?;

    info!("Shutdown complete");
    Ok(())
}

async fn shutdown_signal() {
    match tokio::signal::ctrl_c().await {
        Ok(()) => info!("Shutdown signal received"),
        Err(e) => {
            error!(error = %e, "Failed to listen for shutdown signal");
            std::future::pending::<()>().await;
        }
    }
}

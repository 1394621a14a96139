//! Pulse Daemon - persona chat generation gateway

use std::path::PathBuf;
use std::sync::Arc;

use clap::{Parser, Subcommand};
use tracing_subscriber::{EnvFilter, layer::SubscriberExt, util::SubscriberInitExt};

use pulse::config::Config;
use pulse::error::Result;
use pulse::gateway::Gateway;
use pulse::server::PulseServer;

/// Pulse - answers persona chat turns from whichever LLM backend is usable
#[derive(Parser)]
#[command(name = "pulse")]
#[command(about = "Generation gateway that answers persona chat turns with automatic backend fallback")]
#[command(version)]
pub struct Cli {
    /// Path to config file
    #[arg(long, short = 'c', global = true)]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Option<Command>,
}

#[derive(Subcommand)]
pub enum Command {
    /// Start the HTTP server (default command)
    #[command(name = "serve")]
    Serve,
}

#[tokio::main]
async fn main() {
    if let Err(e) = run().await {
        eprintln!("Error: {e}");
        std::process::exit(1);
    }
}

async fn run() -> Result<()> {
    init_logging();

    let cli = Cli::parse();

    match cli.command {
        None | Some(Command::Serve) => serve(cli.config).await,
    }
}

fn init_logging() {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info,pulse=debug"));

    tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer())
        .init();
}

async fn serve(config_path: Option<PathBuf>) -> Result<()> {
    tracing::info!("Starting Pulse daemon");

    let config = Config::load(config_path.as_deref())?;
    tracing::debug!(
        "Config loaded: listen_addr={}, probe_timeout_ms={}",
        config.server.listen_addr,
        config.gateway.probe_timeout_ms
    );

    let gateway = Gateway::from_config(&config.backends, &config.gateway)?;

    let server = PulseServer::new(config.server, Arc::new(gateway));
    server.serve().await
}

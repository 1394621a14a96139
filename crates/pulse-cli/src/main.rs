use std::path::PathBuf;

use clap::{Parser, Subcommand};
use pulse::config::Config;
use pulse_cli::client::PulseClient;
use pulse_cli::commands::{ChatCommand, ConfigCommand, StatusCommand};
use pulse_cli::error::CliResult;
use pulse_cli::output::OutputFormat;

#[derive(Parser)]
#[command(name = "pulse-cli")]
#[command(about = "Pulse CLI - Client for the pulse persona chat daemon")]
#[command(version)]
pub struct Cli {
    #[clap(long, short, global = true, help = "Output in JSON format")]
    pub json: bool,

    #[clap(
        long,
        short,
        global = true,
        help = "Daemon base URL (defaults to the configured listen address)"
    )]
    pub url: Option<String>,

    #[clap(long, short = 'c', global = true, help = "Path to config file")]
    pub config: Option<PathBuf>,

    #[clap(subcommand)]
    pub command: Command,
}

#[derive(Subcommand)]
pub enum Command {
    #[clap(about = "Show the backend the daemon would currently use")]
    Status(StatusCommand),

    #[clap(about = "Send one message to a persona")]
    Chat(ChatCommand),

    #[clap(about = "Configuration commands")]
    Config(ConfigCommand),
}

#[tokio::main]
async fn main() {
    if let Err(e) = run().await {
        eprintln!("Error: {e}");
        std::process::exit(1);
    }
}

async fn run() -> CliResult<()> {
    let cli = Cli::parse();

    let format = if cli.json {
        OutputFormat::Json
    } else {
        OutputFormat::Table
    };

    match &cli.command {
        Command::Config(cmd) => cmd.execute(cli.config.as_deref(), format).await,
        Command::Status(cmd) => cmd.execute(&client_for(&cli)?, format).await,
        Command::Chat(cmd) => cmd.execute(&client_for(&cli)?, format).await,
    }
}

fn client_for(cli: &Cli) -> CliResult<PulseClient> {
    let base_url = match cli.url {
        Some(ref url) => url.clone(),
        None => {
            let config = Config::load(cli.config.as_deref())?;
            format!("http://{}", config.server.listen_addr)
        }
    };
    Ok(PulseClient::new(&base_url))
}

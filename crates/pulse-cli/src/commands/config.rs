use std::path::Path;

use clap::Parser;
use comfy_table::{ContentArrangement, Table, presets::UTF8_FULL_CONDENSED};
use pulse::config::Config;

use crate::error::CliResult;
use crate::output::{OutputFormat, redact};

#[derive(Parser)]
pub struct ConfigCommand {
    #[clap(subcommand)]
    pub command: ConfigSubcommand,
}

#[derive(Parser)]
pub enum ConfigSubcommand {
    #[clap(about = "Show current configuration")]
    Show,
}

impl ConfigCommand {
    pub async fn execute(
        &self,
        config_path: Option<&Path>,
        format: OutputFormat,
    ) -> CliResult<()> {
        match &self.command {
            ConfigSubcommand::Show => Self::show(config_path, format),
        }
    }

    fn show(config_path: Option<&Path>, format: OutputFormat) -> CliResult<()> {
        let config = Config::load(config_path)?;
        let backends = &config.backends;

        match format {
            OutputFormat::Json => {
                let output = serde_json::json!({
                    "server": {
                        "listen_addr": config.server.listen_addr,
                    },
                    "gateway": {
                        "probe_timeout_ms": config.gateway.probe_timeout_ms,
                    },
                    "backends": {
                        "gemini": {
                            "enabled": backends.gemini.enabled,
                            "priority": backends.gemini.priority,
                            "api_url": backends.gemini.api_url,
                            "model": backends.gemini.model,
                            "api_key": redact(backends.gemini.resolve_api_key().as_deref()),
                            "api_key_env": backends.gemini.api_key_env,
                            "timeout_secs": backends.gemini.timeout_secs,
                        },
                        "openai": {
                            "enabled": backends.openai.enabled,
                            "priority": backends.openai.priority,
                            "api_url": backends.openai.api_url,
                            "model": backends.openai.model,
                            "api_key": redact(backends.openai.resolve_api_key().as_deref()),
                            "api_key_env": backends.openai.api_key_env,
                            "timeout_secs": backends.openai.timeout_secs,
                        },
                        "ollama": {
                            "enabled": backends.ollama.enabled,
                            "priority": backends.ollama.priority,
                            "url": backends.ollama.url,
                            "model": backends.ollama.model,
                            "timeout_secs": backends.ollama.timeout_secs,
                        }
                    }
                });
                println!("{}", serde_json::to_string_pretty(&output)?);
            }
            OutputFormat::Table => {
                match config_path {
                    Some(path) => println!("Configuration from: {}", path.display()),
                    None => println!("Configuration: (default search paths)"),
                }
                println!("==============================\n");

                let mut server_table = settings_table();
                server_table.add_row(["listen_addr", config.server.listen_addr.as_str()]);
                server_table.add_row([
                    "probe_timeout_ms",
                    &config.gateway.probe_timeout_ms.to_string(),
                ]);
                println!("[Server]");
                println!("{server_table}\n");

                let mut backend_table = Table::new();
                backend_table
                    .load_preset(UTF8_FULL_CONDENSED)
                    .set_content_arrangement(ContentArrangement::Dynamic)
                    .set_header(["Backend", "Enabled", "Priority", "Endpoint", "Model", "API Key"]);

                backend_table.add_row([
                    "gemini",
                    &backends.gemini.enabled.to_string(),
                    &backends.gemini.priority.to_string(),
                    &backends.gemini.api_url,
                    &backends.gemini.model,
                    &redact(backends.gemini.resolve_api_key().as_deref()),
                ]);
                backend_table.add_row([
                    "openai",
                    &backends.openai.enabled.to_string(),
                    &backends.openai.priority.to_string(),
                    &backends.openai.api_url,
                    &backends.openai.model,
                    &redact(backends.openai.resolve_api_key().as_deref()),
                ]);
                backend_table.add_row([
                    "ollama",
                    &backends.ollama.enabled.to_string(),
                    &backends.ollama.priority.to_string(),
                    &backends.ollama.url,
                    &backends.ollama.model,
                    "-",
                ]);
                println!("[Backends]");
                println!("{backend_table}");
            }
        }

        Ok(())
    }
}

fn settings_table() -> Table {
    let mut table = Table::new();
    table
        .load_preset(UTF8_FULL_CONDENSED)
        .set_content_arrangement(ContentArrangement::Dynamic)
        .set_header(["Setting", "Value"]);
    table
}

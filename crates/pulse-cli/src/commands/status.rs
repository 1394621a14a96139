use clap::Parser;
use comfy_table::{ContentArrangement, Table, presets::UTF8_FULL_CONDENSED};

use crate::client::PulseClient;
use crate::error::CliResult;
use crate::output::OutputFormat;

#[derive(Parser)]
pub struct StatusCommand {}

impl StatusCommand {
    pub async fn execute(&self, client: &PulseClient, format: OutputFormat) -> CliResult<()> {
        let active = client.provider().await?;

        match format {
            OutputFormat::Json => {
                println!("{}", serde_json::to_string_pretty(&active)?);
            }
            OutputFormat::Table => {
                let mut table = Table::new();
                table
                    .load_preset(UTF8_FULL_CONDENSED)
                    .set_content_arrangement(ContentArrangement::Dynamic)
                    .set_header(["Backend", "Label", "Status"]);

                let status = serde_json::to_value(active.status)?
                    .as_str()
                    .unwrap_or_default()
                    .to_string();
                table.add_row([active.name.as_str(), active.label.as_str(), status.as_str()]);

                println!("{table}");
            }
        }

        Ok(())
    }
}

use std::io::Write;

use clap::Parser;
use pulse::server::ChatRequest;

use crate::client::PulseClient;
use crate::error::CliResult;
use crate::output::OutputFormat;

#[derive(Parser)]
pub struct ChatCommand {
    #[clap(long, short, help = "System instruction describing the persona")]
    pub system: String,

    #[clap(long, short, help = "Persona name used in the conversation window")]
    pub persona: Option<String>,

    #[clap(long, help = "Wait for the complete reply instead of streaming tokens")]
    pub no_stream: bool,

    #[clap(help = "Message to send")]
    pub message: String,
}

impl ChatCommand {
    pub async fn execute(&self, client: &PulseClient, format: OutputFormat) -> CliResult<()> {
        let request = ChatRequest {
            message: self.message.clone(),
            system_instruction: self.system.clone(),
            persona_name: self.persona.clone(),
            history: Vec::new(),
            stream: !self.no_stream,
        };

        // JSON output needs the whole reply, so it never streams to the terminal.
        if self.no_stream || matches!(format, OutputFormat::Json) {
            let reply = client.chat(&request).await?;
            match format {
                OutputFormat::Json => println!("{}", serde_json::to_string_pretty(&reply)?),
                OutputFormat::Table => {
                    println!("{}", reply.response);
                    println!("\n[{}]", reply.provider);
                }
            }
            return Ok(());
        }

        let mut stdout = std::io::stdout();
        let reply = client
            .chat_stream(&request, |token| {
                write!(stdout, "{token}")?;
                stdout.flush()
            })
            .await?;

        println!();
        if reply.completed {
            println!("\n[{}]", reply.provider);
        } else {
            println!("\n[{}, interrupted]", reply.provider);
        }

        Ok(())
    }
}

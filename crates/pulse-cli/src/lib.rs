pub mod client;
pub mod commands;
pub mod error;
pub mod output;

pub use client::PulseClient;
pub use commands::{ChatCommand, ConfigCommand, StatusCommand};
pub use error::{CliError, CliResult};
pub use output::{OutputFormat, redact};

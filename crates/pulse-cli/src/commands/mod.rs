pub mod chat;
pub mod config;
pub mod status;

pub use chat::ChatCommand;
pub use config::ConfigCommand;
pub use status::StatusCommand;

//! Pulse - generation gateway for persona chat
//!
//! This crate answers persona chat turns from whichever text-generation
//! backend is currently usable, falling back across backends in priority
//! order and ending at an offline responder that always answers. Prior
//! dialogue is compacted into a bounded window before it is sent upstream.

pub mod config;
pub mod conversation;
pub mod error;
pub mod gateway;
pub mod server;
pub mod testing;

pub use error::PulseError;

//! tabpulse agent library.
//!
//! This crate provides the CLI, configuration and the long-running agent:
//! an actor that owns all tracking state, fed by the host's stdin, a
//! connectivity monitor and its own timers.

pub mod agent;
mod cli;
pub mod commands;
mod config;
pub mod connectivity;
pub mod host;
pub mod lock;

pub use agent::{Agent, AgentSettings, FlushTrigger, Message};
pub use cli::{Cli, Commands};
pub use config::Config;

//! Command-line argument definitions.

use std::path::PathBuf;

use clap::{Parser, Subcommand};

/// Browser activity tracking agent.
///
/// Reads tab and window callbacks from the browser host on stdin, turns them
/// into domain activity events, and delivers them to a collector in batches.
#[derive(Debug, Parser)]
#[command(name = "tabpulse", version, about, long_about = None)]
pub struct Cli {
    /// Enable verbose output.
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Path to config file.
    #[arg(short, long, global = true)]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Option<Commands>,
}

/// Available subcommands.
#[derive(Debug, Subcommand)]
pub enum Commands {
    /// Run the agent against the host on stdin/stdout (default).
    Run,

    /// Show persisted tracking state.
    Status,

    /// Validate configuration, storage and collector reachability.
    Check,
}

use std::io;
use std::path::Path;

use anyhow::{Context, Result};
use clap::Parser;
use tracing_subscriber::EnvFilter;

use tp_agent::commands::{check, run, status};
use tp_agent::{Cli, Commands, Config};

/// Load config and ensure the database directory exists.
fn load_config(config_path: Option<&Path>) -> Result<Config> {
    let config = Config::load_from(config_path).context("failed to load configuration")?;
    tracing::debug!(?config, "loaded configuration");

    if let Some(parent) = config.database_path.parent() {
        std::fs::create_dir_all(parent).context("failed to create database directory")?;
    }
    Ok(config)
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    let filter = if cli.verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::from_default_env()
    };
    // Stdout carries status replies to the host, so logs go to stderr.
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(io::stderr)
        .try_init();

    let config = load_config(cli.config.as_deref())?;
    match cli.command {
        None | Some(Commands::Run) => run::run(&config)?,
        Some(Commands::Status) => status::run(&mut io::stdout().lock(), &config)?,
        Some(Commands::Check) => check::run(&mut io::stdout().lock(), &config)?,
    }

    Ok(())
}

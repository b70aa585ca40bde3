//! Run command: the long-lived agent process.

use std::sync::Arc;

use anyhow::{Context, Result};
use tokio::io::BufReader;
use tokio::sync::mpsc;
use tp_client::CollectorClient;
use tp_core::Identity;
use tp_store::Store;

use crate::Config;
use crate::agent::{Agent, AgentSettings, Message};
use crate::connectivity::{ConnectivityMonitor, HostReachability};
use crate::host::serve_host;
use crate::lock::AgentLock;

/// Capacity of the agent's message channel.
const CHANNEL_CAPACITY: usize = 1024;

pub fn run(config: &Config) -> Result<()> {
    let settings = config.agent_settings().context("invalid configuration")?;
    let _lock = AgentLock::acquire(&config.lock_path())?;

    let mut store = Store::open(&config.database_path)
        .with_context(|| format!("failed to open {}", config.database_path.display()))?;
    let identity = tp_store::load_or_create_identity(&mut store)
        .context("failed to load installation identity")?;
    let client = CollectorClient::new(&config.endpoint, config.request_timeout())
        .context("invalid collector endpoint")?;
    tracing::info!(endpoint = client.endpoint(), %identity, "starting agent");

    let runtime = tokio::runtime::Runtime::new().context("failed to initialize tokio runtime")?;
    let result = runtime.block_on(serve(settings, store, client, identity));
    // Stdin reads park a blocking thread that never returns on its own.
    runtime.shutdown_background();
    result
}

async fn serve(
    settings: AgentSettings,
    store: Store,
    client: CollectorClient,
    identity: Identity,
) -> Result<()> {
    let (tx, rx) = mpsc::channel(CHANNEL_CAPACITY);
    let agent = Agent::new(settings, store, Arc::new(client), identity, tx.clone())
        .context("failed to restore agent state")?;

    let reachability = HostReachability::default();
    let monitor = ConnectivityMonitor::new(reachability.clone(), settings.connectivity_poll);
    tokio::spawn(monitor.run(tx.clone()));

    let signal_tx = tx.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            tracing::info!("interrupted, shutting down");
            let _ = signal_tx.send(Message::Shutdown).await;
        }
    });

    let host = tokio::spawn(async move {
        let stdin = BufReader::new(tokio::io::stdin());
        let mut stdout = tokio::io::stdout();
        serve_host(stdin, &mut stdout, tx, reachability).await
    });

    agent.run(rx).await;

    if host.is_finished() {
        host.await.context("host reader panicked")??;
    }
    Ok(())
}

//! Connectivity monitoring.
//!
//! The host reports reachability whenever it likes; the monitor samples the
//! latest report on a fixed period and forwards only the edges to the agent.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use tokio::sync::mpsc;
use tokio::time::MissedTickBehavior;
use tp_core::EdgeDetector;

use crate::agent::Message;

/// Source of the current reachability flag.
pub trait Reachability: Send + Sync + 'static {
    fn is_online(&self) -> bool;
}

/// Reachability as last reported by the host. Starts online.
#[derive(Debug, Clone)]
pub struct HostReachability {
    online: Arc<AtomicBool>,
}

impl Default for HostReachability {
    fn default() -> Self {
        Self {
            online: Arc::new(AtomicBool::new(true)),
        }
    }
}

impl HostReachability {
    pub fn set(&self, online: bool) {
        self.online.store(online, Ordering::Relaxed);
    }
}

impl Reachability for HostReachability {
    fn is_online(&self) -> bool {
        self.online.load(Ordering::Relaxed)
    }
}

/// Polls a [`Reachability`] and sends [`Message::Connectivity`] on each change.
#[derive(Debug)]
pub struct ConnectivityMonitor<R> {
    reachability: R,
    period: Duration,
    detector: EdgeDetector,
}

impl<R: Reachability> ConnectivityMonitor<R> {
    pub const fn new(reachability: R, period: Duration) -> Self {
        Self {
            reachability,
            period,
            detector: EdgeDetector::new(),
        }
    }

    /// Samples until the agent's channel closes.
    pub async fn run(mut self, tx: mpsc::Sender<Message>) {
        let mut ticker = tokio::time::interval(self.period);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
        loop {
            ticker.tick().await;
            if tx.is_closed() {
                break;
            }
            let Some(transition) = self.detector.observe(self.reachability.is_online()) else {
                continue;
            };
            tracing::debug!(?transition, "reachability changed");
            if tx.send(Message::Connectivity(transition)).await.is_err() {
                break;
            }
        }
    }
}

//! The agent actor.
//!
//! [`Agent`] owns every piece of mutable tracking state: the tab tracker,
//! the event queue, the in-flight batch, the flush cycle, the statistics and
//! the store. Everything that can change that state arrives as a
//! [`Message`] on one channel and is applied in order, so queue mutations
//! never interleave. HTTP sends run in spawned tasks and report back with
//! [`Message::FlushFinished`]; retry timers report back with
//! [`Message::RetryDue`].
//!
//! The durable copy of the queue is always `in_flight ++ queue`: a batch
//! only leaves storage once the collector acknowledged it.

use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use tokio::sync::{mpsc, oneshot};
use tokio::time::MissedTickBehavior;
use tp_client::{DeliveryError, Transport};
use tp_core::{
    ActiveTabTracker, ActivityStats, DeliveryCycle, Event, EventQueue, HostEvent, Identity,
    QueueLimits, RetryPolicy, StatusSnapshot, TabInfo, Transition,
};
use tp_store::{PersistedState, Store, StoreError};

/// Validated runtime settings derived from [`Config`](crate::Config).
#[derive(Debug, Clone, Copy)]
pub struct AgentSettings {
    pub batch_size: usize,
    pub batch_interval: Duration,
    pub retry_delay: Duration,
    pub connectivity_poll: Duration,
    pub limits: QueueLimits,
    pub policy: RetryPolicy,
}

/// Why a flush was attempted.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FlushTrigger {
    /// The queue reached the batch size.
    BatchFull,
    /// The batch timer fired.
    Timer,
    /// Reachability went from offline to online.
    CameOnline,
    /// The host asked for it.
    Requested,
    /// A successful flush left at least a full batch behind.
    Drain,
}

/// Input to the agent actor.
#[derive(Debug)]
pub enum Message {
    /// A tab or window callback.
    Host(HostEvent),
    /// The host's currently focused tab, sent once after connecting.
    Snapshot(Option<TabInfo>),
    /// A reachability edge from the connectivity monitor.
    Connectivity(Transition),
    /// The user's tracking toggle.
    SetTracking(bool),
    Flush(FlushTrigger),
    /// A retry backoff elapsed.
    RetryDue,
    /// A spawned send completed.
    FlushFinished(Result<(), DeliveryError>),
    Status(oneshot::Sender<StatusSnapshot>),
    Shutdown,
}

/// The single owner of tracking and delivery state.
pub struct Agent<T: Transport> {
    settings: AgentSettings,
    transport: Arc<T>,
    identity: Identity,
    store: Store,
    tracker: ActiveTabTracker,
    queue: EventQueue,
    in_flight: Option<Vec<Event>>,
    cycle: DeliveryCycle,
    stats: ActivityStats,
    online: bool,
    tracking_enabled: bool,
    tx: mpsc::Sender<Message>,
}

impl<T: Transport> Agent<T> {
    /// Creates an agent, restoring the queue, statistics and tracking toggle
    /// from the store.
    ///
    /// `tx` must feed the receiver later passed to [`Agent::run`]; the agent
    /// uses it to deliver send results and retry timers to itself.
    pub fn new(
        settings: AgentSettings,
        store: Store,
        transport: Arc<T>,
        identity: Identity,
        tx: mpsc::Sender<Message>,
    ) -> Result<Self, StoreError> {
        let PersistedState {
            queue,
            stats,
            tracking_enabled,
        } = store.load_state()?;
        let queue = EventQueue::restore(settings.limits, queue);
        let mut tracker = ActiveTabTracker::new();
        if !tracking_enabled {
            tracker = tracker.silenced();
        }
        tracing::info!(
            queued = queue.len(),
            events_tracked = stats.events_tracked,
            tracking_enabled,
            "agent state restored"
        );
        Ok(Self {
            settings,
            transport,
            identity,
            store,
            tracker,
            queue,
            in_flight: None,
            cycle: DeliveryCycle::new(settings.policy),
            stats,
            online: true,
            tracking_enabled,
            tx,
        })
    }

    /// Processes messages until [`Message::Shutdown`] arrives or every
    /// sender is gone, firing the batch timer in between.
    pub async fn run(mut self, mut rx: mpsc::Receiver<Message>) {
        let mut ticker = tokio::time::interval(self.settings.batch_interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
        // The first tick completes immediately.
        ticker.tick().await;

        loop {
            tokio::select! {
                message = rx.recv() => {
                    let Some(message) = message else { break };
                    if !self.handle(message) {
                        break;
                    }
                }
                _ = ticker.tick() => self.flush(FlushTrigger::Timer),
            }
        }
        self.persist();
        tracing::info!(pending = self.pending_len(), "agent stopped");
    }

    /// Applies one message. Returns `false` once the agent should stop.
    pub fn handle(&mut self, message: Message) -> bool {
        match message {
            Message::Host(event) => {
                let emitted = self.tracker.handle(&event, Utc::now());
                self.record(emitted);
            }
            Message::Snapshot(focused) => {
                let tracker = ActiveTabTracker::restore(focused.as_ref());
                self.tracker = if self.tracker.is_emitting() {
                    tracker
                } else {
                    tracker.silenced()
                };
            }
            Message::Connectivity(transition) => self.on_connectivity(transition),
            Message::SetTracking(enabled) => self.set_tracking(enabled),
            Message::Flush(trigger) => self.flush(trigger),
            Message::RetryDue => self.on_retry_due(),
            Message::FlushFinished(result) => self.on_flush_finished(result),
            Message::Status(reply) => {
                let _ = reply.send(self.status());
            }
            Message::Shutdown => return false,
        }
        true
    }

    /// Current read-only view for the host UI.
    pub fn status(&self) -> StatusSnapshot {
        StatusSnapshot {
            online: self.online,
            tracking_enabled: self.tracking_enabled,
            suspended: self.cycle.is_suspended(),
            events_tracked: self.stats.events_tracked,
            distinct_domains: self.stats.distinct_domains(),
            queue_length: self.pending_len(),
            consecutive_failures: self.cycle.consecutive_failures(),
        }
    }

    fn pending_len(&self) -> usize {
        self.in_flight.as_ref().map_or(0, Vec::len) + self.queue.len()
    }

    fn record(&mut self, events: Vec<Event>) {
        if events.is_empty() {
            return;
        }
        for event in events {
            tracing::debug!(kind = %event.kind, domain = %event.domain, "event emitted");
            self.stats.record(&event);
            let evicted = self.queue.enqueue(event);
            if evicted > 0 {
                tracing::warn!(
                    evicted,
                    capacity = self.queue.limits().capacity(),
                    "queue full, dropped oldest events"
                );
            }
        }
        self.persist_with_stats();
        if self.queue.len() >= self.settings.batch_size {
            self.flush(FlushTrigger::BatchFull);
        }
    }

    /// Writes `in_flight ++ queue`. Statistics only change when events are
    /// recorded, so they are left alone here.
    fn persist(&mut self) {
        let Self {
            store,
            in_flight,
            queue,
            ..
        } = self;
        let pending = in_flight.iter().flatten().chain(queue.iter());
        if let Err(err) = store.save_queue(pending) {
            tracing::error!(error = %err, "failed to persist queue");
        }
    }

    fn persist_with_stats(&mut self) {
        let Self {
            store,
            in_flight,
            queue,
            stats,
            ..
        } = self;
        let pending = in_flight.iter().flatten().chain(queue.iter());
        if let Err(err) = store.save_queue_and_stats(pending, stats) {
            tracing::error!(error = %err, "failed to persist queue");
        }
    }

    fn flush(&mut self, trigger: FlushTrigger) {
        if !self.cycle.is_idle() {
            tracing::debug!(?trigger, phase = ?self.cycle.phase(), "flush already in progress");
            return;
        }
        if self.queue.is_empty() {
            return;
        }
        if !self.online {
            tracing::debug!(?trigger, "offline, flush deferred");
            return;
        }
        if let Some(attempt) = self.cycle.start() {
            tracing::debug!(?trigger, attempt, queued = self.queue.len(), "flush started");
            self.dispatch(attempt);
        }
    }

    fn dispatch(&mut self, attempt: u32) {
        let batch = self.queue.dequeue_batch(self.settings.batch_size);
        let transport = Arc::clone(&self.transport);
        let identity = self.identity;
        let tx = self.tx.clone();
        let to_send = batch.clone();
        self.in_flight = Some(batch);
        tokio::spawn(async move {
            let result = transport.send_batch(identity, &to_send).await;
            if tx.send(Message::FlushFinished(result)).await.is_err() {
                tracing::debug!(attempt, "agent gone before send finished");
            }
        });
    }

    fn on_flush_finished(&mut self, result: Result<(), DeliveryError>) {
        let Some(batch) = self.in_flight.take() else {
            tracing::warn!("send finished with no batch in flight");
            return;
        };
        match result {
            Ok(()) => {
                let lifted = self.cycle.succeed();
                tracing::info!(events = batch.len(), "batch delivered");
                self.persist();
                if lifted {
                    tracing::info!("delivery recovered, tracking resumed");
                    self.update_gate();
                }
                if self.queue.len() >= self.settings.batch_size {
                    self.flush(FlushTrigger::Drain);
                }
            }
            Err(err) => {
                let phase = self.cycle.phase();
                let evicted = self.queue.reinsert_front(batch);
                if evicted > 0 {
                    tracing::warn!(evicted, "queue full after failed send, dropped oldest events");
                }
                self.persist();
                let outcome = self.cycle.fail();
                tracing::warn!(
                    error = %err,
                    ?phase,
                    consecutive_failures = self.cycle.consecutive_failures(),
                    "batch delivery failed"
                );
                if outcome.suspend {
                    tracing::warn!(
                        threshold = self.settings.policy.failure_threshold(),
                        "too many delivery failures, tracking suspended"
                    );
                    self.update_gate();
                }
                if outcome.retry {
                    self.schedule_retry();
                }
            }
        }
    }

    fn schedule_retry(&self) {
        let delay = self.settings.retry_delay;
        let tx = self.tx.clone();
        tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            let _ = tx.send(Message::RetryDue).await;
        });
    }

    fn on_retry_due(&mut self) {
        if !self.online || self.queue.is_empty() {
            self.cycle.abandon();
            return;
        }
        if let Some(attempt) = self.cycle.retry() {
            tracing::debug!(attempt, "retrying batch");
            self.dispatch(attempt);
        }
    }

    fn on_connectivity(&mut self, transition: Transition) {
        match transition {
            Transition::WentOffline => {
                tracing::info!("collector unreachable, holding events");
                self.online = false;
            }
            Transition::CameOnline => {
                tracing::info!("connectivity restored");
                self.online = true;
                self.flush(FlushTrigger::CameOnline);
            }
        }
    }

    fn set_tracking(&mut self, enabled: bool) {
        self.tracking_enabled = enabled;
        if let Err(err) = self.store.save_tracking_enabled(enabled) {
            tracing::error!(error = %err, "failed to persist tracking toggle");
        }
        if enabled && self.cycle.clear_suspension() {
            tracing::info!("suspension cleared by user");
        }
        tracing::info!(enabled, "tracking toggled");
        self.update_gate();
    }

    /// Opens or closes the tracker's emission gate to match the toggle and
    /// the suspension state.
    fn update_gate(&mut self) {
        let open = self.tracking_enabled && !self.cycle.is_suspended();
        if let Some(event) = self.tracker.set_emitting(open, Utc::now()) {
            self.record(vec![event]);
        }
    }
}

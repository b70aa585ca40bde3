//! Bounded FIFO of events awaiting delivery.
//!
//! The queue holds at most `capacity` events at rest. When an append pushes
//! it over, the oldest `floor(capacity × eviction_fraction)` events (at
//! least one) are dropped in a single step, so a full queue does not evict
//! on every subsequent append.
//!
//! Persistence is the caller's job: the queue is plain memory and exposes
//! [`EventQueue::iter`] and [`EventQueue::restore`] for the durable copy.

use std::collections::VecDeque;

use crate::event::Event;
use crate::types::ValidationError;

/// Default share of the capacity dropped on overflow.
pub const DEFAULT_EVICTION_FRACTION: f64 = 0.1;

/// Size limits of an [`EventQueue`].
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct QueueLimits {
    capacity: usize,
    eviction_fraction: f64,
}

impl QueueLimits {
    pub fn new(capacity: usize, eviction_fraction: f64) -> Result<Self, ValidationError> {
        if capacity == 0 {
            return Err(ValidationError::Zero {
                field: "queue capacity",
            });
        }
        if eviction_fraction.is_nan() || eviction_fraction <= 0.0 || eviction_fraction > 1.0 {
            return Err(ValidationError::EvictionFractionOutOfRange {
                value: eviction_fraction,
            });
        }
        Ok(Self {
            capacity,
            eviction_fraction,
        })
    }

    pub const fn capacity(&self) -> usize {
        self.capacity
    }

    pub const fn eviction_fraction(&self) -> f64 {
        self.eviction_fraction
    }

    /// Number of events dropped when the queue overflows.
    #[expect(
        clippy::cast_precision_loss,
        clippy::cast_possible_truncation,
        clippy::cast_sign_loss,
        reason = "capacity is far below 2^52 and the product is non-negative"
    )]
    pub fn eviction_count(&self) -> usize {
        let count = (self.capacity as f64 * self.eviction_fraction).floor() as usize;
        count.clamp(1, self.capacity)
    }
}

/// Ordered, bounded sequence of pending events.
#[derive(Debug, Clone)]
pub struct EventQueue {
    events: VecDeque<Event>,
    limits: QueueLimits,
}

impl EventQueue {
    pub fn new(limits: QueueLimits) -> Self {
        Self {
            events: VecDeque::new(),
            limits,
        }
    }

    /// Rebuilds a queue from its persisted contents.
    ///
    /// If the limits shrank since the events were saved, the oldest events
    /// are evicted until the queue fits again.
    pub fn restore(limits: QueueLimits, events: Vec<Event>) -> Self {
        let mut queue = Self {
            events: events.into(),
            limits,
        };
        let evicted = queue.enforce_capacity();
        if evicted > 0 {
            tracing::warn!(evicted, "restored queue exceeded capacity");
        }
        queue
    }

    pub const fn limits(&self) -> QueueLimits {
        self.limits
    }

    pub fn len(&self) -> usize {
        self.events.len()
    }

    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Event> {
        self.events.iter()
    }

    /// Appends an event, evicting the oldest ones on overflow.
    ///
    /// Returns the number of evicted events.
    pub fn enqueue(&mut self, event: Event) -> usize {
        self.events.push_back(event);
        self.enforce_capacity()
    }

    /// Removes and returns up to `max` of the oldest events, in order.
    pub fn dequeue_batch(&mut self, max: usize) -> Vec<Event> {
        let take = max.min(self.events.len());
        self.events.drain(..take).collect()
    }

    /// Puts a previously dequeued batch back at the head, in its original
    /// order.
    ///
    /// Returns the number of evicted events if newer appends filled the
    /// queue while the batch was out.
    pub fn reinsert_front(&mut self, batch: Vec<Event>) -> usize {
        for event in batch.into_iter().rev() {
            self.events.push_front(event);
        }
        self.enforce_capacity()
    }

    fn enforce_capacity(&mut self) -> usize {
        let capacity = self.limits.capacity;
        if self.events.len() <= capacity {
            return 0;
        }
        let overflow = self.events.len() - capacity;
        let evict = self.limits.eviction_count().max(overflow);
        self.events.drain(..evict);
        evict
    }
}

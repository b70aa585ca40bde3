//! Core domain logic for tabpulse.
//!
//! This crate contains the I/O-free parts of the tracker:
//! - Domain extraction: normalizing URLs to trackable domains
//! - Tracking: the active-tab state machine fed by host callbacks
//! - Queueing: the bounded event queue and its eviction rule
//! - Delivery: the flush-cycle state machine and failure suspension

pub mod connectivity;
pub mod delivery;
mod domain;
pub mod event;
pub mod host;
pub mod queue;
pub mod stats;
pub mod tracker;
mod types;

pub use connectivity::{EdgeDetector, Transition};
pub use delivery::{CyclePhase, DeliveryCycle, FailureOutcome, RetryPolicy};
pub use domain::extract_domain;
pub use event::{Event, EventKind};
pub use host::{HostEvent, TabId, TabInfo, WindowId};
pub use queue::{DEFAULT_EVICTION_FRACTION, EventQueue, QueueLimits};
pub use stats::{ActivityStats, StatusSnapshot};
pub use tracker::{ActiveTabTracker, TrackerState};
pub use types::{Domain, Identity, ValidationError};

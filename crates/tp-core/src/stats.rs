//! Activity statistics and the read-only status snapshot.

use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};

use crate::event::Event;
use crate::types::Domain;

/// Running totals over every event the tracker emitted.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ActivityStats {
    #[serde(default)]
    pub events_tracked: u64,
    #[serde(default)]
    pub domains: BTreeSet<Domain>,
}

impl ActivityStats {
    pub fn record(&mut self, event: &Event) {
        self.events_tracked = self.events_tracked.saturating_add(1);
        if !self.domains.contains(&event.domain) {
            self.domains.insert(event.domain.clone());
        }
    }

    pub fn distinct_domains(&self) -> usize {
        self.domains.len()
    }
}

/// Point-in-time view of the agent for the settings and diagnostics UI.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StatusSnapshot {
    pub online: bool,
    /// The user's toggle.
    pub tracking_enabled: bool,
    /// Tracking paused after too many consecutive delivery failures.
    pub suspended: bool,
    pub events_tracked: u64,
    pub distinct_domains: usize,
    pub queue_length: usize,
    pub consecutive_failures: u32,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_record_counts_events_and_distinct_domains() {
        let now = chrono::Utc::now();
        let a = Domain::new("a.com").unwrap();
        let b = Domain::new("b.com").unwrap();
        let mut stats = ActivityStats::default();
        stats.record(&Event::active(a.clone(), now));
        stats.record(&Event::inactive(a, now));
        stats.record(&Event::active(b, now));
        assert_eq!(stats.events_tracked, 3);
        assert_eq!(stats.distinct_domains(), 2);
    }

    #[test]
    fn test_stats_tolerate_missing_fields() {
        let stats: ActivityStats = serde_json::from_str("{}").unwrap();
        assert_eq!(stats, ActivityStats::default());
    }
}

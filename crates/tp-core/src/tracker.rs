//! Active-tab state machine.
//!
//! [`ActiveTabTracker`] turns the host's tab and window callbacks into
//! `active`/`inactive` [`Event`]s. It is a plain synchronous function of
//! `(state, callback) -> (state, events)` and never touches I/O, so the
//! agent can own it and feed it from a channel.
//!
//! # Unresolvable tabs
//!
//! Focusing a tab whose URL does not resolve to a domain (new-tab page,
//! extension page, `about:blank`) emits nothing and leaves the active domain
//! untouched, but the last-focused tab reference still advances. Transitions
//! are decided on domain identity only, so the next resolvable focus still
//! closes the right domain with `Inactive`.

use chrono::{DateTime, Utc};

use crate::domain::extract_domain;
use crate::event::Event;
use crate::host::{HostEvent, TabId, TabInfo, WindowId};
use crate::types::Domain;

/// Where the user's attention currently is.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum TrackerState {
    #[default]
    NoActiveTab,
    ActiveDomain(Domain),
}

/// What the tracker knows about browser window focus.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum WindowFocus {
    /// No focus callback seen yet.
    Unknown,
    /// No browser window has focus.
    Blurred,
    Focused(WindowId),
}

impl WindowFocus {
    /// Whether a navigation in `window` happens in the window the user sees.
    fn admits(self, window: WindowId) -> bool {
        match self {
            Self::Unknown => true,
            Self::Blurred => false,
            Self::Focused(focused) => focused == window,
        }
    }
}

/// The tab-activity state machine.
#[derive(Debug, Clone)]
pub struct ActiveTabTracker {
    state: TrackerState,
    last_tab: Option<TabId>,
    focus: WindowFocus,
    emitting: bool,
}

impl Default for ActiveTabTracker {
    fn default() -> Self {
        Self::new()
    }
}

impl ActiveTabTracker {
    /// Creates a tracker with no active tab and emission enabled.
    pub const fn new() -> Self {
        Self {
            state: TrackerState::NoActiveTab,
            last_tab: None,
            focus: WindowFocus::Unknown,
            emitting: true,
        }
    }

    /// Creates a tracker from the host's currently focused tab.
    ///
    /// No event is emitted: nothing has transitioned yet.
    pub fn restore(focused: Option<&TabInfo>) -> Self {
        let mut tracker = Self::new();
        if let Some(tab) = focused {
            tracker.last_tab = Some(tab.id);
            tracker.focus = WindowFocus::Focused(tab.window_id);
            if let Some(domain) = tab.url.as_deref().and_then(extract_domain) {
                tracing::debug!(%domain, "restored active domain");
                tracker.state = TrackerState::ActiveDomain(domain);
            }
        }
        tracker
    }

    /// Closes the emission gate without emitting anything.
    #[must_use]
    pub const fn silenced(mut self) -> Self {
        self.emitting = false;
        self
    }

    pub const fn state(&self) -> &TrackerState {
        &self.state
    }

    pub const fn active_domain(&self) -> Option<&Domain> {
        match &self.state {
            TrackerState::ActiveDomain(domain) => Some(domain),
            TrackerState::NoActiveTab => None,
        }
    }

    pub const fn last_tab(&self) -> Option<TabId> {
        self.last_tab
    }

    pub const fn is_emitting(&self) -> bool {
        self.emitting
    }

    /// Applies one host callback and returns the events it produced.
    pub fn handle(&mut self, event: &HostEvent, now: DateTime<Utc>) -> Vec<Event> {
        let emitted = match event {
            HostEvent::TabActivated { tab } => {
                self.focus = WindowFocus::Focused(tab.window_id);
                self.focus_tab(tab, now)
            }
            HostEvent::TabUpdated {
                tab,
                complete,
                active,
            } => {
                if *complete && *active && self.focus.admits(tab.window_id) {
                    self.focus = WindowFocus::Focused(tab.window_id);
                    self.focus_tab(tab, now)
                } else {
                    Vec::new()
                }
            }
            HostEvent::TabRemoved {
                tab_id,
                window_closing,
                ..
            } => {
                if *window_closing && self.last_tab == Some(*tab_id) {
                    self.last_tab = None;
                    self.deactivate(now)
                } else {
                    Vec::new()
                }
            }
            HostEvent::WindowFocusChanged {
                window_id: None, ..
            } => {
                self.focus = WindowFocus::Blurred;
                self.deactivate(now)
            }
            HostEvent::WindowFocusChanged {
                window_id: Some(window_id),
                active_tab,
            } => {
                self.focus = WindowFocus::Focused(*window_id);
                match active_tab {
                    Some(tab) => self.focus_tab(tab, now),
                    None => Vec::new(),
                }
            }
        };
        self.gate(emitted)
    }

    /// Opens or closes the emission gate.
    ///
    /// Closing emits `Inactive` for the current domain, reopening emits
    /// `Active` for it, so the collector never sees an interval left open
    /// across a pause. State keeps following the host while closed.
    pub fn set_emitting(&mut self, emitting: bool, now: DateTime<Utc>) -> Option<Event> {
        if self.emitting == emitting {
            return None;
        }
        self.emitting = emitting;
        let domain = self.active_domain()?.clone();
        if emitting {
            Some(Event::active(domain, now))
        } else {
            Some(Event::inactive(domain, now))
        }
    }

    fn focus_tab(&mut self, tab: &TabInfo, now: DateTime<Utc>) -> Vec<Event> {
        self.last_tab = Some(tab.id);
        let Some(domain) = tab.url.as_deref().and_then(extract_domain) else {
            tracing::debug!(tab = tab.id.0, "focused tab has no trackable domain");
            return Vec::new();
        };
        self.activate(domain, now)
    }

    fn activate(&mut self, domain: Domain, now: DateTime<Utc>) -> Vec<Event> {
        let mut emitted = Vec::with_capacity(2);
        match &self.state {
            TrackerState::ActiveDomain(current) if *current == domain => return emitted,
            TrackerState::ActiveDomain(current) => {
                emitted.push(Event::inactive(current.clone(), now));
            }
            TrackerState::NoActiveTab => {}
        }
        emitted.push(Event::active(domain.clone(), now));
        self.state = TrackerState::ActiveDomain(domain);
        emitted
    }

    fn deactivate(&mut self, now: DateTime<Utc>) -> Vec<Event> {
        match std::mem::take(&mut self.state) {
            TrackerState::ActiveDomain(domain) => vec![Event::inactive(domain, now)],
            TrackerState::NoActiveTab => Vec::new(),
        }
    }

    fn gate(&self, emitted: Vec<Event>) -> Vec<Event> {
        if self.emitting { emitted } else { Vec::new() }
    }
}

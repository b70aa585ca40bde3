//! Edge detection over sampled reachability.

/// A change in host-reported reachability.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Transition {
    WentOffline,
    CameOnline,
}

/// Turns periodic reachability samples into transitions.
///
/// Reachability is assumed online until a sample says otherwise, so the
/// first `true` sample never produces a spurious [`Transition::CameOnline`].
#[derive(Debug, Clone, Copy)]
pub struct EdgeDetector {
    online: bool,
}

impl Default for EdgeDetector {
    fn default() -> Self {
        Self::new()
    }
}

impl EdgeDetector {
    pub const fn new() -> Self {
        Self { online: true }
    }

    pub const fn is_online(&self) -> bool {
        self.online
    }

    /// Records a sample and reports the transition it caused, if any.
    pub const fn observe(&mut self, online: bool) -> Option<Transition> {
        let previous = self.online;
        self.online = online;
        match (previous, online) {
            (false, true) => Some(Transition::CameOnline),
            (true, false) => Some(Transition::WentOffline),
            _ => None,
        }
    }
}

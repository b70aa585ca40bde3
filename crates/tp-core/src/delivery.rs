//! Flush-cycle state machine.
//!
//! One cycle delivers one batch:
//!
//! ```text
//! Idle -> Sending(1) -> Idle                               (success)
//!         Sending(n) -> BackoffWait(n) -> Sending(n + 1)   (failure, n <= max_retries)
//!         Sending(max_retries + 1) -> Idle                 (failure, retries exhausted)
//! ```
//!
//! Every failed attempt bumps the consecutive-failure counter; reaching the
//! threshold suspends tracking. A successful flush resets the counter and
//! lifts the suspension. The machine only decides; the agent does the I/O.

use crate::types::ValidationError;

/// Retry and suspension limits.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    max_retries: u32,
    failure_threshold: u32,
}

impl RetryPolicy {
    pub const fn new(max_retries: u32, failure_threshold: u32) -> Result<Self, ValidationError> {
        if failure_threshold == 0 {
            return Err(ValidationError::Zero {
                field: "failure threshold",
            });
        }
        Ok(Self {
            max_retries,
            failure_threshold,
        })
    }

    pub const fn max_retries(&self) -> u32 {
        self.max_retries
    }

    pub const fn failure_threshold(&self) -> u32 {
        self.failure_threshold
    }
}

/// Where the current flush cycle stands.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum CyclePhase {
    #[default]
    Idle,
    /// A batch is on the wire. Attempts are numbered from 1.
    Sending { attempt: u32 },
    /// The last attempt failed and a retry timer is pending.
    BackoffWait { attempt: u32 },
}

/// What the agent should do after a failed attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FailureOutcome {
    /// Schedule a retry after the backoff delay.
    pub retry: bool,
    /// This failure crossed the threshold and tracking must be suspended.
    pub suspend: bool,
}

/// Bookkeeping for flush cycles and the failure-suspension rule.
#[derive(Debug, Clone)]
pub struct DeliveryCycle {
    policy: RetryPolicy,
    phase: CyclePhase,
    consecutive_failures: u32,
    suspended: bool,
}

impl DeliveryCycle {
    pub const fn new(policy: RetryPolicy) -> Self {
        Self {
            policy,
            phase: CyclePhase::Idle,
            consecutive_failures: 0,
            suspended: false,
        }
    }

    pub const fn phase(&self) -> CyclePhase {
        self.phase
    }

    pub const fn is_idle(&self) -> bool {
        matches!(self.phase, CyclePhase::Idle)
    }

    pub const fn consecutive_failures(&self) -> u32 {
        self.consecutive_failures
    }

    pub const fn is_suspended(&self) -> bool {
        self.suspended
    }

    /// Starts a new cycle. Returns `None` if one is already running.
    pub const fn start(&mut self) -> Option<u32> {
        if !self.is_idle() {
            return None;
        }
        self.phase = CyclePhase::Sending { attempt: 1 };
        Some(1)
    }

    /// Moves a waiting cycle to its next attempt. Returns `None` if no retry
    /// is pending.
    pub const fn retry(&mut self) -> Option<u32> {
        let CyclePhase::BackoffWait { attempt } = self.phase else {
            return None;
        };
        let next = attempt + 1;
        self.phase = CyclePhase::Sending { attempt: next };
        Some(next)
    }

    /// Ends a waiting cycle without another attempt.
    pub const fn abandon(&mut self) {
        if matches!(self.phase, CyclePhase::BackoffWait { .. }) {
            self.phase = CyclePhase::Idle;
        }
    }

    /// Records a delivered batch. Returns `true` if this lifted a suspension.
    pub const fn succeed(&mut self) -> bool {
        self.phase = CyclePhase::Idle;
        self.consecutive_failures = 0;
        let lifted = self.suspended;
        self.suspended = false;
        lifted
    }

    /// Records a failed attempt.
    pub const fn fail(&mut self) -> FailureOutcome {
        let attempt = match self.phase {
            CyclePhase::Sending { attempt } => attempt,
            CyclePhase::Idle | CyclePhase::BackoffWait { .. } => 1,
        };
        self.consecutive_failures = self.consecutive_failures.saturating_add(1);

        let suspend =
            !self.suspended && self.consecutive_failures >= self.policy.failure_threshold;
        if suspend {
            self.suspended = true;
        }

        let retry = attempt <= self.policy.max_retries;
        self.phase = if retry {
            CyclePhase::BackoffWait { attempt }
        } else {
            CyclePhase::Idle
        };
        FailureOutcome { retry, suspend }
    }

    /// Lifts a suspension on explicit user request and forgets past failures.
    ///
    /// Returns `true` if tracking was suspended.
    pub const fn clear_suspension(&mut self) -> bool {
        let was = self.suspended;
        self.suspended = false;
        self.consecutive_failures = 0;
        was
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn cycle(max_retries: u32, threshold: u32) -> DeliveryCycle {
        DeliveryCycle::new(RetryPolicy::new(max_retries, threshold).unwrap())
    }

    #[test]
    fn test_policy_rejects_zero_threshold() {
        assert!(RetryPolicy::new(3, 0).is_err());
    }

    #[test]
    fn test_start_is_single_flight() {
        let mut c = cycle(3, 10);
        assert_eq!(c.start(), Some(1));
        assert_eq!(c.start(), None);
        assert_eq!(c.phase(), CyclePhase::Sending { attempt: 1 });
    }

    #[test]
    fn test_success_returns_to_idle_and_resets_failures() {
        let mut c = cycle(3, 10);
        c.start();
        c.fail();
        c.retry();
        assert_eq!(c.consecutive_failures(), 1);
        assert!(!c.succeed());
        assert!(c.is_idle());
        assert_eq!(c.consecutive_failures(), 0);
    }

    #[test]
    fn test_failures_retry_until_exhausted() {
        let mut c = cycle(2, 10);
        c.start();
        assert!(c.fail().retry);
        assert_eq!(c.phase(), CyclePhase::BackoffWait { attempt: 1 });
        assert_eq!(c.start(), None);
        assert_eq!(c.retry(), Some(2));
        assert!(c.fail().retry);
        assert_eq!(c.retry(), Some(3));
        let outcome = c.fail();
        assert!(!outcome.retry);
        assert!(c.is_idle());
        assert_eq!(c.consecutive_failures(), 3);
    }

    #[test]
    fn test_zero_retries_gives_up_immediately() {
        let mut c = cycle(0, 10);
        c.start();
        assert!(!c.fail().retry);
        assert!(c.is_idle());
    }

    #[test]
    fn test_threshold_suspends_once() {
        let mut c = cycle(0, 2);
        c.start();
        assert!(!c.fail().suspend);
        c.start();
        assert!(c.fail().suspend);
        assert!(c.is_suspended());
        c.start();
        assert!(!c.fail().suspend);
        assert!(c.is_suspended());
    }

    #[test]
    fn test_failures_accumulate_across_cycles() {
        let mut c = cycle(1, 4);
        c.start();
        c.fail();
        c.retry();
        c.fail();
        assert!(c.is_idle());
        c.start();
        c.fail();
        c.retry();
        let outcome = c.fail();
        assert!(outcome.suspend);
        assert!(!outcome.retry);
    }

    #[test]
    fn test_success_lifts_suspension() {
        let mut c = cycle(0, 1);
        c.start();
        assert!(c.fail().suspend);
        c.start();
        assert!(c.succeed());
        assert!(!c.is_suspended());
    }

    #[test]
    fn test_abandon_ends_waiting_cycle() {
        let mut c = cycle(3, 10);
        c.start();
        c.fail();
        c.abandon();
        assert!(c.is_idle());
        assert_eq!(c.retry(), None);
    }

    #[test]
    fn test_clear_suspension_resets_counter() {
        let mut c = cycle(0, 1);
        c.start();
        c.fail();
        assert!(c.clear_suspension());
        assert_eq!(c.consecutive_failures(), 0);
        assert!(!c.clear_suspension());
    }
}

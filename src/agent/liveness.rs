//! Agent liveness state machine
//!
//! Tracks consecutive probe failures and derives the link state. Degraded and
//! Offline are reached only through consecutive-failure counting, never from
//! a single glitch; one successful probe returns any state to Connected.

use std::time::{Duration, Instant};

use crate::policy;

/// Link liveness state for one agent
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LinkState {
    /// Registered, no successful contact yet
    Discovering,
    /// Last liveness probe succeeded
    Connected,
    /// 1-3 consecutive probe failures
    Degraded,
    /// 4+ consecutive probe failures
    Offline,
}

impl std::fmt::Display for LinkState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            LinkState::Discovering => write!(f, "discovering"),
            LinkState::Connected => write!(f, "connected"),
            LinkState::Degraded => write!(f, "degraded"),
            LinkState::Offline => write!(f, "offline"),
        }
    }
}

/// Result of feeding one probe outcome into the tracker
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Transition {
    pub from: LinkState,
    pub to: LinkState,
}

impl Transition {
    /// Whether the probe outcome actually moved the state
    pub fn changed(&self) -> bool {
        self.from != self.to
    }
}

/// Per-agent liveness tracker, written only by the connection watchdog
#[derive(Debug)]
pub struct LivenessTracker {
    state: LinkState,
    consecutive_failures: u32,
    offline_since: Option<Instant>,
}

impl LivenessTracker {
    pub fn new() -> Self {
        Self {
            state: LinkState::Discovering,
            consecutive_failures: 0,
            offline_since: None,
        }
    }

    pub fn state(&self) -> LinkState {
        self.state
    }

    pub fn consecutive_failures(&self) -> u32 {
        self.consecutive_failures
    }

    /// How long the agent has been Offline, if it is
    pub fn offline_for(&self) -> Option<Duration> {
        self.offline_since.map(|since| since.elapsed())
    }

    /// Record a successful probe
    pub fn record_success(&mut self) -> Transition {
        let from = self.state;
        self.consecutive_failures = 0;
        self.offline_since = None;
        self.state = LinkState::Connected;
        Transition { from, to: self.state }
    }

    /// Record a failed probe
    pub fn record_failure(&mut self) -> Transition {
        let from = self.state;
        self.consecutive_failures = self.consecutive_failures.saturating_add(1);

        if self.consecutive_failures >= policy::OFFLINE_AFTER_FAILURES {
            self.state = LinkState::Offline;
            if self.offline_since.is_none() {
                self.offline_since = Some(Instant::now());
            }
        } else if self.consecutive_failures >= policy::DEGRADED_AFTER_FAILURES {
            self.state = LinkState::Degraded;
        }

        Transition { from, to: self.state }
    }
}

impl Default for LivenessTracker {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_initial_state() {
        let tracker = LivenessTracker::new();
        assert_eq!(tracker.state(), LinkState::Discovering);
        assert_eq!(tracker.consecutive_failures(), 0);
        assert!(tracker.offline_for().is_none());
    }

    #[test]
    fn test_success_connects_from_discovering() {
        let mut tracker = LivenessTracker::new();
        let t = tracker.record_success();
        assert_eq!(t.from, LinkState::Discovering);
        assert_eq!(t.to, LinkState::Connected);
        assert!(t.changed());
    }

    #[test]
    fn test_four_failures_reach_offline() {
        let mut tracker = LivenessTracker::new();
        tracker.record_success();

        // Connected -> Degraded -> Degraded -> Degraded -> Offline
        assert_eq!(tracker.record_failure().to, LinkState::Degraded);
        assert_eq!(tracker.record_failure().to, LinkState::Degraded);
        assert_eq!(tracker.record_failure().to, LinkState::Degraded);
        let t = tracker.record_failure();
        assert_eq!(t.from, LinkState::Degraded);
        assert_eq!(t.to, LinkState::Offline);
        assert_eq!(tracker.consecutive_failures(), 4);
        assert!(tracker.offline_for().is_some());
    }

    #[test]
    fn test_single_success_recovers_from_offline() {
        let mut tracker = LivenessTracker::new();
        for _ in 0..6 {
            tracker.record_failure();
        }
        assert_eq!(tracker.state(), LinkState::Offline);

        let t = tracker.record_success();
        assert_eq!(t.from, LinkState::Offline);
        assert_eq!(t.to, LinkState::Connected);
        assert_eq!(tracker.consecutive_failures(), 0);
        assert!(tracker.offline_for().is_none());
    }

    #[test]
    fn test_repeated_failure_in_same_state_is_not_a_transition() {
        let mut tracker = LivenessTracker::new();
        tracker.record_success();
        tracker.record_failure();

        let t = tracker.record_failure();
        assert_eq!(t.from, LinkState::Degraded);
        assert_eq!(t.to, LinkState::Degraded);
        assert!(!t.changed());
    }
}

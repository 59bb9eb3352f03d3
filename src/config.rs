//! Configuration for the fleet registry and its per-agent tasks

use std::time::Duration;

use crate::policy;

/// Policy applied when `register` is called with an id that already exists
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum DuplicatePolicy {
    /// Reject the new registration with `DuplicateId`
    #[default]
    Reject,
    /// Tear down the existing record and register a clean slate
    Replace,
}

/// Tunables for the registry and its background tasks
#[derive(Debug, Clone)]
pub struct FleetConfig {
    /// Liveness probe cadence; also the collector's feed reopen delay
    pub probe_interval: Duration,
    /// Poll cadence while verifying an in-flight command's effect
    pub verify_poll_interval: Duration,
    /// Default deadline for confirming a command's effect
    pub command_timeout: Duration,
    /// Evict agents Offline longer than this; `None` disables eviction
    pub offline_retention: Option<Duration>,
    /// Duplicate registration handling
    pub duplicate_policy: DuplicatePolicy,
}

impl Default for FleetConfig {
    fn default() -> Self {
        Self {
            probe_interval: Duration::from_millis(policy::PROBE_INTERVAL_MS),
            verify_poll_interval: Duration::from_millis(policy::VERIFY_POLL_INTERVAL_MS),
            command_timeout: Duration::from_millis(policy::COMMAND_TIMEOUT_MS),
            offline_retention: Some(Duration::from_millis(policy::OFFLINE_RETENTION_MS)),
            duplicate_policy: DuplicatePolicy::default(),
        }
    }
}

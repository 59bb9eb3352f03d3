//! Skyfleet Orchestration Core
//!
//! Commands and monitors a fleet of autonomous vehicles over unreliable
//! per-vehicle links, from a single process. Every registered vehicle gets
//! its own connection watchdog, telemetry collector, and serialized command
//! slot; the fleet registry coordinates targeted and broadcast operations
//! with per-agent failure isolation.

pub mod agent;
pub mod collector;
pub mod command;
pub mod config;
pub mod error;
pub mod events;
pub mod link;
pub mod registry;
pub mod telemetry;
pub mod watchdog;

use std::time::{SystemTime, UNIX_EPOCH};

pub use agent::{AgentId, AgentSnapshot, LinkState};
pub use command::{CommandAck, CommandExecutor, VehicleCommand};
pub use config::{DuplicatePolicy, FleetConfig};
pub use error::{FleetError, LinkError};
pub use events::{EventSeverity, FleetEvent};
pub use link::{SimulatedVehicleLink, TelemetryStream, VehicleLink};
pub use registry::FleetRegistry;
pub use telemetry::TelemetrySnapshot;

/// Get current timestamp in milliseconds since Unix epoch
pub fn now_ms() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_millis() as u64
}

/// Fleet-wide timing and liveness parameters
pub mod policy {
    /// Liveness probe interval in milliseconds
    pub const PROBE_INTERVAL_MS: u64 = 1000;

    /// Poll interval for command effect verification
    pub const VERIFY_POLL_INTERVAL_MS: u64 = 200;

    /// Consecutive probe failures before an agent is marked Degraded
    pub const DEGRADED_AFTER_FAILURES: u32 = 1;

    /// Consecutive probe failures before an agent is marked Offline
    pub const OFFLINE_AFTER_FAILURES: u32 = 4;

    /// Default deadline for confirming a command's effect
    pub const COMMAND_TIMEOUT_MS: u64 = 10_000;

    /// How long an agent may stay Offline before the retention sweep evicts it
    pub const OFFLINE_RETENTION_MS: u64 = 300_000;
}

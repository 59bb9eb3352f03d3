//! Observable fleet events
//!
//! State transitions and command outcomes are surfaced to the embedding
//! process over an unbounded channel. The core prescribes no sink format;
//! each event exposes the agent id, a severity, a message, and a timestamp
//! for whatever sink consumes it.

use crate::agent::{AgentId, LinkState};
use crate::command::VehicleCommand;

/// Severity attached to an emitted event
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EventSeverity {
    Info,
    Warning,
    Error,
}

/// Events emitted by the watchdogs, the executor, and the retention sweep
#[derive(Debug, Clone)]
pub enum FleetEvent {
    /// An agent's liveness state changed
    StateChanged {
        agent: AgentId,
        from: LinkState,
        to: LinkState,
        timestamp_ms: u64,
    },
    /// A command's effect was confirmed
    CommandCompleted {
        agent: AgentId,
        command: VehicleCommand,
        elapsed_ms: u64,
        timestamp_ms: u64,
    },
    /// A command failed, timed out, or was rejected
    CommandFailed {
        agent: AgentId,
        command: VehicleCommand,
        reason: String,
        timestamp_ms: u64,
    },
    /// An agent was evicted after exceeding the offline retention window
    AgentEvicted { agent: AgentId, timestamp_ms: u64 },
}

impl FleetEvent {
    /// The agent this event concerns
    pub fn agent(&self) -> &AgentId {
        match self {
            FleetEvent::StateChanged { agent, .. }
            | FleetEvent::CommandCompleted { agent, .. }
            | FleetEvent::CommandFailed { agent, .. }
            | FleetEvent::AgentEvicted { agent, .. } => agent,
        }
    }

    pub fn timestamp_ms(&self) -> u64 {
        match self {
            FleetEvent::StateChanged { timestamp_ms, .. }
            | FleetEvent::CommandCompleted { timestamp_ms, .. }
            | FleetEvent::CommandFailed { timestamp_ms, .. }
            | FleetEvent::AgentEvicted { timestamp_ms, .. } => *timestamp_ms,
        }
    }

    /// Severity for routing into the embedding observability sink
    pub fn severity(&self) -> EventSeverity {
        match self {
            FleetEvent::StateChanged {
                to: LinkState::Offline,
                ..
            } => EventSeverity::Error,
            FleetEvent::StateChanged {
                to: LinkState::Degraded,
                ..
            } => EventSeverity::Warning,
            FleetEvent::StateChanged { .. } => EventSeverity::Info,
            FleetEvent::CommandCompleted { .. } => EventSeverity::Info,
            FleetEvent::CommandFailed { .. } => EventSeverity::Warning,
            FleetEvent::AgentEvicted { .. } => EventSeverity::Warning,
        }
    }

    /// Human-readable message for the sink
    pub fn message(&self) -> String {
        match self {
            FleetEvent::StateChanged { from, to, .. } => {
                format!("link state {} -> {}", from, to)
            }
            FleetEvent::CommandCompleted {
                command,
                elapsed_ms,
                ..
            } => format!("{} confirmed in {}ms", command, elapsed_ms),
            FleetEvent::CommandFailed {
                command, reason, ..
            } => format!("{} failed: {}", command, reason),
            FleetEvent::AgentEvicted { .. } => "evicted after offline retention window".into(),
        }
    }
}

//! Error types for registry and command operations

use thiserror::Error;

use crate::agent::AgentId;

/// Errors surfaced by registry and command operations.
///
/// Per-agent failures (`CommandTimeout`, `CommandRejected`, `LinkUnavailable`)
/// never cross agents: `broadcast` records them in its per-agent result map
/// instead of raising. The remaining kinds are synchronous rejections of the
/// specific call that triggered them. Nothing here is fatal to the process.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum FleetError {
    #[error("Unknown agent: {0}")]
    UnknownAgent(AgentId),

    #[error("Agent id already registered: {0}")]
    DuplicateId(AgentId),

    #[error("Agent {0} already has a command in flight")]
    AgentBusy(AgentId),

    #[error("Command accepted but unconfirmed after {timeout_ms}ms")]
    CommandTimeout { timeout_ms: u64 },

    #[error("Link rejected command: {0}")]
    CommandRejected(String),

    #[error("Link unavailable: {0}")]
    LinkUnavailable(String),
}

/// Errors at the vehicle-link boundary
#[derive(Error, Debug, Clone, PartialEq)]
pub enum LinkError {
    #[error("Endpoint unreachable: {0}")]
    Unreachable(String),

    #[error("Command rejected by vehicle: {0}")]
    Rejected(String),
}

impl From<LinkError> for FleetError {
    fn from(err: LinkError) -> Self {
        match err {
            LinkError::Unreachable(msg) => FleetError::LinkUnavailable(msg),
            LinkError::Rejected(msg) => FleetError::CommandRejected(msg),
        }
    }
}

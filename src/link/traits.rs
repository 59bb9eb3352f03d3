//! Vehicle link capability trait for pluggable protocol backends

use async_trait::async_trait;
use futures::stream::BoxStream;

use crate::command::VehicleCommand;
use crate::error::LinkError;
use crate::telemetry::TelemetrySnapshot;

/// Lazy, possibly-infinite telemetry feed for one endpoint
pub type TelemetryStream = BoxStream<'static, TelemetrySnapshot>;

/// Capability interface over the underlying vehicle protocol.
///
/// The orchestration core issues all vehicle traffic through this trait and
/// assumes nothing about the wire protocol behind it.
#[async_trait]
pub trait VehicleLink: Send + Sync + 'static {
    /// Lightweight connectivity check, distinct from a command
    async fn probe(&self, endpoint: &str) -> bool;

    /// Open the telemetry feed for an endpoint
    async fn telemetry_stream(&self, endpoint: &str) -> Result<TelemetryStream, LinkError>;

    /// Send a command and await the link-level acknowledgement
    async fn send_command(&self, endpoint: &str, command: &VehicleCommand)
        -> Result<(), LinkError>;
}

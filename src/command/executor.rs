//! Command executor with per-agent serialization and effect verification
//!
//! Executes exactly one command against one agent at a time. The agent's
//! command slot rejects a second command while one is in flight; callers do
//! not queue. The executor issues no automatic retries: retry policy, where
//! wanted, belongs to the caller.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::mpsc::UnboundedSender;
use tokio::time::{sleep, Instant};
use tracing::{debug, info, warn};

use crate::agent::AgentHandle;
use crate::command::{CommandAck, VehicleCommand};
use crate::error::FleetError;
use crate::events::FleetEvent;
use crate::link::VehicleLink;
use crate::now_ms;
use crate::telemetry::TelemetrySnapshot;

pub struct CommandExecutor {
    link: Arc<dyn VehicleLink>,
    events: UnboundedSender<FleetEvent>,
    poll_interval: Duration,
}

impl CommandExecutor {
    pub fn new(
        link: Arc<dyn VehicleLink>,
        events: UnboundedSender<FleetEvent>,
        poll_interval: Duration,
    ) -> Self {
        Self {
            link,
            events,
            poll_interval,
        }
    }

    /// Issue `command` to `agent` and poll `verify` against the agent's
    /// cached telemetry until it confirms the effect or `timeout` elapses.
    ///
    /// A command accepted by the link whose effect is never confirmed is
    /// reported as `CommandTimeout`, distinct from `CommandRejected` (the
    /// link refused it) and `LinkUnavailable` (the endpoint was unreachable).
    pub async fn execute<F>(
        &self,
        agent: &AgentHandle,
        command: VehicleCommand,
        verify: F,
        timeout: Duration,
    ) -> Result<CommandAck, FleetError>
    where
        F: Fn(&TelemetrySnapshot) -> bool + Send,
    {
        // Held for the rest of this call; dropping it on any exit path frees
        // the agent for the next command.
        let _slot = agent
            .try_occupy_slot()
            .ok_or_else(|| FleetError::AgentBusy(agent.id().clone()))?;

        debug!(agent = %agent.id(), %command, "Issuing command");
        let issued_at = Instant::now();

        if let Err(e) = self.link.send_command(agent.endpoint(), &command).await {
            let err = FleetError::from(e);
            warn!(agent = %agent.id(), %command, error = %err, "Command send failed");
            self.emit_failure(agent, &command, &err);
            return Err(err);
        }

        let deadline = issued_at + timeout;
        loop {
            if let Some(telemetry) = agent.telemetry().await {
                if verify(&telemetry) {
                    let elapsed_ms = issued_at.elapsed().as_millis() as u64;
                    info!(agent = %agent.id(), %command, elapsed_ms, "Command confirmed");
                    let _ = self.events.send(FleetEvent::CommandCompleted {
                        agent: agent.id().clone(),
                        command: command.clone(),
                        elapsed_ms,
                        timestamp_ms: now_ms(),
                    });
                    return Ok(CommandAck {
                        command,
                        elapsed_ms,
                    });
                }
            }

            if Instant::now() >= deadline {
                let err = FleetError::CommandTimeout {
                    timeout_ms: timeout.as_millis() as u64,
                };
                warn!(agent = %agent.id(), %command, "Command unconfirmed within deadline");
                self.emit_failure(agent, &command, &err);
                return Err(err);
            }

            sleep(self.poll_interval).await;
        }
    }

    fn emit_failure(&self, agent: &AgentHandle, command: &VehicleCommand, err: &FleetError) {
        let _ = self.events.send(FleetEvent::CommandFailed {
            agent: agent.id().clone(),
            command: command.clone(),
            reason: err.to_string(),
            timestamp_ms: now_ms(),
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::link::SimulatedVehicleLink;
    use tokio::sync::mpsc;

    fn executor(link: Arc<SimulatedVehicleLink>) -> CommandExecutor {
        let (events_tx, _events_rx) = mpsc::unbounded_channel();
        CommandExecutor::new(link, events_tx, Duration::from_millis(10))
    }

    async fn fed_agent(link: &Arc<SimulatedVehicleLink>, endpoint: &str) -> Arc<AgentHandle> {
        link.add_vehicle(endpoint).await;
        let agent = AgentHandle::new("vehicle-001".into(), endpoint.into());

        // Stand in for the collector: pump feed samples into the cache so
        // verification has fresh telemetry to look at.
        let feed_link = Arc::clone(link);
        let feed_agent = Arc::clone(&agent);
        let feed_endpoint = endpoint.to_string();
        tokio::spawn(async move {
            use futures::StreamExt;
            let mut feed = match feed_link.telemetry_stream(&feed_endpoint).await {
                Ok(feed) => feed,
                Err(_) => return,
            };
            while let Some(sample) = feed.next().await {
                feed_agent.telemetry_cache().apply(sample).await;
            }
        });
        agent
    }

    #[tokio::test]
    async fn test_execute_confirms_against_telemetry() {
        let link = Arc::new(SimulatedVehicleLink::with_telemetry_period(
            Duration::from_millis(10),
        ));
        let agent = fed_agent(&link, "sim://alpha").await;
        let executor = executor(Arc::clone(&link));

        let ack = executor
            .execute(
                &agent,
                VehicleCommand::Arm,
                |t| t.armed,
                Duration::from_millis(500),
            )
            .await
            .unwrap();
        assert_eq!(ack.command, VehicleCommand::Arm);
        assert!(!agent.command_in_flight());
    }

    #[tokio::test]
    async fn test_busy_slot_rejects_second_command() {
        let link = Arc::new(SimulatedVehicleLink::new());
        link.add_vehicle("sim://alpha").await;
        let agent = AgentHandle::new("vehicle-001".into(), "sim://alpha".into());
        let executor = executor(Arc::clone(&link));

        let _slot = agent.try_occupy_slot().unwrap();
        let err = executor
            .execute(
                &agent,
                VehicleCommand::Arm,
                |t| t.armed,
                Duration::from_millis(100),
            )
            .await
            .unwrap_err();
        assert_eq!(err, FleetError::AgentBusy("vehicle-001".into()));
    }

    #[tokio::test]
    async fn test_unconfirmed_command_times_out_and_frees_slot() {
        let link = Arc::new(SimulatedVehicleLink::with_telemetry_period(
            Duration::from_millis(10),
        ));
        let agent = fed_agent(&link, "sim://alpha").await;
        link.set_ignore_commands("sim://alpha", true).await;
        let executor = executor(Arc::clone(&link));

        let err = executor
            .execute(
                &agent,
                VehicleCommand::Arm,
                |t| t.armed,
                Duration::from_millis(80),
            )
            .await
            .unwrap_err();
        assert_eq!(err, FleetError::CommandTimeout { timeout_ms: 80 });
        assert!(!agent.command_in_flight());
    }

    #[tokio::test]
    async fn test_rejected_and_unreachable_are_distinct() {
        let link = Arc::new(SimulatedVehicleLink::new());
        link.add_vehicle("sim://alpha").await;
        let agent = AgentHandle::new("vehicle-001".into(), "sim://alpha".into());
        let executor = executor(Arc::clone(&link));

        link.set_reject_commands("sim://alpha", true).await;
        let err = executor
            .execute(
                &agent,
                VehicleCommand::Arm,
                |t| t.armed,
                Duration::from_millis(100),
            )
            .await
            .unwrap_err();
        assert!(matches!(err, FleetError::CommandRejected(_)));

        link.set_reject_commands("sim://alpha", false).await;
        link.set_reachable("sim://alpha", false).await;
        let err = executor
            .execute(
                &agent,
                VehicleCommand::Arm,
                |t| t.armed,
                Duration::from_millis(100),
            )
            .await
            .unwrap_err();
        assert!(matches!(err, FleetError::LinkUnavailable(_)));
        assert!(!agent.command_in_flight());
    }
}

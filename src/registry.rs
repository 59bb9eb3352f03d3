//! Fleet registry
//!
//! Owns the agent id -> handle mapping and is its sole mutator. Registration
//! spawns the agent's watchdog and collector; deregistration signals both and
//! awaits their shutdown before returning. Dispatch routes commands to one
//! agent, broadcast fans out to every agent concurrently and reports each
//! outcome independently.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use futures::future::join_all;
use tokio::sync::{mpsc, watch, RwLock};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::agent::{AgentHandle, AgentId, AgentSnapshot};
use crate::collector;
use crate::command::{CommandAck, CommandExecutor, VehicleCommand};
use crate::config::{DuplicatePolicy, FleetConfig};
use crate::error::FleetError;
use crate::events::FleetEvent;
use crate::link::VehicleLink;
use crate::now_ms;
use crate::telemetry::TelemetrySnapshot;
use crate::watchdog;

/// Background tasks owned by one registry entry
struct AgentTasks {
    shutdown: watch::Sender<bool>,
    watchdog: JoinHandle<()>,
    collector: JoinHandle<()>,
}

impl AgentTasks {
    /// Signal shutdown and wait for both tasks to confirm it
    async fn stop(self) {
        let _ = self.shutdown.send(true);
        let _ = self.watchdog.await;
        let _ = self.collector.await;
    }
}

struct AgentEntry {
    handle: Arc<AgentHandle>,
    tasks: AgentTasks,
}

#[derive(Default)]
struct RegistryInner {
    agents: HashMap<AgentId, AgentEntry>,
    /// Registration order, kept in lockstep with `agents`
    order: Vec<AgentId>,
    next_auto_id: u32,
}

/// Registry of all commanded vehicles
pub struct FleetRegistry {
    link: Arc<dyn VehicleLink>,
    config: FleetConfig,
    inner: RwLock<RegistryInner>,
    executor: CommandExecutor,
    events: mpsc::UnboundedSender<FleetEvent>,
}

impl FleetRegistry {
    /// Create a registry over `link`. The returned receiver carries every
    /// state-transition and command-outcome event the fleet emits.
    pub fn new(
        link: Arc<dyn VehicleLink>,
        config: FleetConfig,
    ) -> (Self, mpsc::UnboundedReceiver<FleetEvent>) {
        let (events_tx, events_rx) = mpsc::unbounded_channel();
        let executor = CommandExecutor::new(
            Arc::clone(&link),
            events_tx.clone(),
            config.verify_poll_interval,
        );
        let registry = Self {
            link,
            config,
            inner: RwLock::new(RegistryInner::default()),
            executor,
            events: events_tx,
        };
        (registry, events_rx)
    }

    /// Register a vehicle and spawn its watchdog and collector.
    ///
    /// Without a requested id one is assigned from a `vehicle-NNN` counter.
    /// A requested id that already exists is rejected with `DuplicateId` or,
    /// under the `Replace` policy, tears the old record down first and starts
    /// a clean slate.
    pub async fn register(
        &self,
        endpoint: &str,
        requested_id: Option<AgentId>,
    ) -> Result<AgentId, FleetError> {
        if let Some(id) = &requested_id {
            let exists = self.inner.read().await.agents.contains_key(id);
            if exists {
                match self.config.duplicate_policy {
                    DuplicatePolicy::Reject => return Err(FleetError::DuplicateId(id.clone())),
                    DuplicatePolicy::Replace => {
                        info!(agent = %id, "Replacing existing registration");
                        self.deregister(id).await;
                    }
                }
            }
        }

        let mut inner = self.inner.write().await;
        let id = match requested_id {
            Some(id) => {
                // A racing registration may have re-created the id while the
                // old record was being torn down.
                if inner.agents.contains_key(&id) {
                    return Err(FleetError::DuplicateId(id));
                }
                id
            }
            None => loop {
                inner.next_auto_id += 1;
                let candidate = format!("vehicle-{:03}", inner.next_auto_id);
                if !inner.agents.contains_key(&candidate) {
                    break candidate;
                }
            },
        };

        let handle = AgentHandle::new(id.clone(), endpoint.to_string());
        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        let tasks = AgentTasks {
            shutdown: shutdown_tx,
            watchdog: watchdog::spawn(
                Arc::clone(&handle),
                Arc::clone(&self.link),
                self.events.clone(),
                self.config.probe_interval,
                shutdown_rx.clone(),
            ),
            collector: collector::spawn(
                Arc::clone(&handle),
                Arc::clone(&self.link),
                self.config.probe_interval,
                shutdown_rx,
            ),
        };

        inner.order.push(id.clone());
        inner.agents.insert(id.clone(), AgentEntry { handle, tasks });
        info!(agent = %id, endpoint, "Registered");
        Ok(id)
    }

    /// Deregister a vehicle: cancel and await its tasks, drop the record.
    ///
    /// Returns false if the id was not registered; deregistering an absent
    /// id is a no-op, not an error, so concurrent teardown races stay quiet.
    pub async fn deregister(&self, id: &AgentId) -> bool {
        let entry = {
            let mut inner = self.inner.write().await;
            match inner.agents.remove(id) {
                Some(entry) => {
                    inner.order.retain(|existing| existing != id);
                    entry
                }
                None => {
                    debug!(agent = %id, "Deregister of unknown agent ignored");
                    return false;
                }
            }
        };

        entry.tasks.stop().await;
        info!(agent = %id, "Deregistered");
        true
    }

    /// Read-only snapshot of one agent's cached data; never routes through
    /// the command path
    pub async fn get(&self, id: &AgentId) -> Result<AgentSnapshot, FleetError> {
        let handle = {
            let inner = self.inner.read().await;
            inner
                .agents
                .get(id)
                .map(|entry| Arc::clone(&entry.handle))
                .ok_or_else(|| FleetError::UnknownAgent(id.clone()))?
        };
        Ok(handle.snapshot().await)
    }

    /// All registered ids in registration order
    pub async fn list(&self) -> Vec<AgentId> {
        self.inner.read().await.order.clone()
    }

    /// Number of registered agents
    pub async fn count(&self) -> usize {
        self.inner.read().await.agents.len()
    }

    /// Route a command to one agent using its default confirmation predicate
    /// and the configured command timeout
    pub async fn dispatch(
        &self,
        id: &AgentId,
        command: VehicleCommand,
    ) -> Result<CommandAck, FleetError> {
        let confirm = command.clone();
        self.dispatch_with(
            id,
            command,
            move |t| confirm.confirmed_by(t),
            self.config.command_timeout,
        )
        .await
    }

    /// Route a command to one agent with a caller-supplied verification
    /// predicate and deadline
    pub async fn dispatch_with<F>(
        &self,
        id: &AgentId,
        command: VehicleCommand,
        verify: F,
        timeout: Duration,
    ) -> Result<CommandAck, FleetError>
    where
        F: Fn(&TelemetrySnapshot) -> bool + Send,
    {
        let handle = {
            let inner = self.inner.read().await;
            inner
                .agents
                .get(id)
                .map(|entry| Arc::clone(&entry.handle))
                .ok_or_else(|| FleetError::UnknownAgent(id.clone()))?
        };
        self.executor.execute(&handle, command, verify, timeout).await
    }

    /// Issue a command to every registered agent concurrently.
    ///
    /// Never fails as a whole: the returned map has one entry per agent that
    /// was registered when the call started, each carrying that agent's own
    /// outcome. One slow or failing agent cannot block or hide the others.
    pub async fn broadcast(
        &self,
        command: VehicleCommand,
    ) -> HashMap<AgentId, Result<CommandAck, FleetError>> {
        let targets: Vec<(AgentId, Arc<AgentHandle>)> = {
            let inner = self.inner.read().await;
            inner
                .order
                .iter()
                .filter_map(|id| {
                    inner
                        .agents
                        .get(id)
                        .map(|entry| (id.clone(), Arc::clone(&entry.handle)))
                })
                .collect()
        };

        debug!(%command, targets = targets.len(), "Broadcasting");
        let executor = &self.executor;
        let timeout = self.config.command_timeout;

        let dispatches = targets.into_iter().map(|(id, handle)| {
            let command = command.clone();
            async move {
                let confirm = command.clone();
                let result = executor
                    .execute(&handle, command, move |t| confirm.confirmed_by(t), timeout)
                    .await;
                (id, result)
            }
        });

        join_all(dispatches).await.into_iter().collect()
    }

    /// Periodically evict agents that have been Offline longer than the
    /// configured retention window. Run as a long-lived task by the
    /// embedder; returns immediately if retention is disabled.
    pub async fn run_retention_sweep(&self) {
        let Some(retention) = self.config.offline_retention else {
            debug!("Offline retention disabled");
            return;
        };

        let mut ticker = tokio::time::interval(self.config.probe_interval);
        loop {
            ticker.tick().await;
            self.sweep_offline(retention).await;
        }
    }

    /// One eviction pass; returns the ids that were evicted
    pub(crate) async fn sweep_offline(&self, retention: Duration) -> Vec<AgentId> {
        let expired: Vec<AgentId> = {
            let inner = self.inner.read().await;
            let mut out = Vec::new();
            for (id, entry) in inner.agents.iter() {
                let offline_for = entry.handle.liveness().read().await.offline_for();
                if matches!(offline_for, Some(elapsed) if elapsed > retention) {
                    out.push(id.clone());
                }
            }
            out
        };

        for id in &expired {
            warn!(agent = %id, "Evicting agent offline past retention window");
            self.deregister(id).await;
            let _ = self.events.send(FleetEvent::AgentEvicted {
                agent: id.clone(),
                timestamp_ms: now_ms(),
            });
        }
        expired
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::agent::LinkState;
    use crate::link::SimulatedVehicleLink;

    fn fast_config() -> FleetConfig {
        FleetConfig {
            probe_interval: Duration::from_millis(10),
            verify_poll_interval: Duration::from_millis(10),
            command_timeout: Duration::from_millis(300),
            offline_retention: None,
            duplicate_policy: DuplicatePolicy::Reject,
        }
    }

    async fn sim_fleet() -> (Arc<SimulatedVehicleLink>, FleetRegistry) {
        let link = Arc::new(SimulatedVehicleLink::with_telemetry_period(
            Duration::from_millis(10),
        ));
        let (registry, _events) = FleetRegistry::new(
            Arc::clone(&link) as Arc<dyn VehicleLink>,
            fast_config(),
        );
        (link, registry)
    }

    #[tokio::test]
    async fn test_auto_ids_follow_registration_order() {
        let (link, registry) = sim_fleet().await;
        link.add_vehicle("sim://alpha").await;
        link.add_vehicle("sim://bravo").await;

        let first = registry.register("sim://alpha", None).await.unwrap();
        let second = registry.register("sim://bravo", None).await.unwrap();

        assert_eq!(first, "vehicle-001");
        assert_eq!(second, "vehicle-002");
        assert_eq!(registry.list().await, vec![first, second]);
    }

    #[tokio::test]
    async fn test_duplicate_id_rejected_by_default() {
        let (link, registry) = sim_fleet().await;
        link.add_vehicle("sim://alpha").await;

        registry
            .register("sim://alpha", Some("falcon-1".into()))
            .await
            .unwrap();
        let err = registry
            .register("sim://alpha", Some("falcon-1".into()))
            .await
            .unwrap_err();

        assert_eq!(err, FleetError::DuplicateId("falcon-1".into()));
        assert_eq!(registry.count().await, 1);
    }

    #[tokio::test]
    async fn test_replace_policy_starts_a_clean_slate() {
        let link = Arc::new(SimulatedVehicleLink::with_telemetry_period(
            Duration::from_millis(10),
        ));
        link.add_vehicle("sim://alpha").await;
        link.add_vehicle("sim://bravo").await;
        let config = FleetConfig {
            duplicate_policy: DuplicatePolicy::Replace,
            probe_interval: Duration::from_millis(200),
            ..fast_config()
        };
        let (registry, _events) =
            FleetRegistry::new(Arc::clone(&link) as Arc<dyn VehicleLink>, config);

        let id: AgentId = "falcon-1".into();
        registry.register("sim://alpha", Some(id.clone())).await.unwrap();
        tokio::time::sleep(Duration::from_millis(100)).await;
        assert!(registry.get(&id).await.unwrap().telemetry.is_some());

        registry.register("sim://bravo", Some(id.clone())).await.unwrap();
        let snapshot = registry.get(&id).await.unwrap();

        assert_eq!(snapshot.endpoint, "sim://bravo");
        assert_eq!(snapshot.state, LinkState::Discovering);
        assert!(snapshot.telemetry.is_none());
        assert_eq!(registry.count().await, 1);
    }

    #[tokio::test]
    async fn test_get_unknown_agent() {
        let (_link, registry) = sim_fleet().await;
        let err = registry.get(&"ghost".to_string()).await.unwrap_err();
        assert_eq!(err, FleetError::UnknownAgent("ghost".into()));
    }

    #[tokio::test]
    async fn test_deregister_is_idempotent() {
        let (link, registry) = sim_fleet().await;
        link.add_vehicle("sim://alpha").await;

        let id = registry.register("sim://alpha", None).await.unwrap();
        assert!(registry.deregister(&id).await);
        assert!(!registry.deregister(&id).await);
        assert!(registry.list().await.is_empty());
    }

    #[tokio::test]
    async fn test_sweep_evicts_agents_offline_past_retention() {
        let (link, registry) = sim_fleet().await;
        link.add_vehicle("sim://alpha").await;

        let kept = registry.register("sim://alpha", Some("falcon-1".into())).await.unwrap();
        // No vehicle behind this endpoint, so every probe fails
        let doomed = registry.register("sim://ghost", Some("falcon-2".into())).await.unwrap();

        tokio::time::sleep(Duration::from_millis(400)).await;
        assert_eq!(registry.get(&doomed).await.unwrap().state, LinkState::Offline);

        let evicted = registry.sweep_offline(Duration::from_millis(50)).await;
        assert_eq!(evicted, vec![doomed.clone()]);
        assert_eq!(registry.list().await, vec![kept]);
        assert!(matches!(
            registry.get(&doomed).await,
            Err(FleetError::UnknownAgent(_))
        ));
    }
}

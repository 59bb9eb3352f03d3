//! Per-vehicle agent handle and snapshot types

pub mod liveness;

pub use liveness::{LinkState, LivenessTracker, Transition};

use std::sync::Arc;
use std::time::Instant;

use tokio::sync::{Mutex, OwnedMutexGuard, RwLock};

use crate::telemetry::{TelemetryCache, TelemetrySnapshot};

/// Opaque per-agent routing key, chosen at registration time
pub type AgentId = String;

/// Per-vehicle record shared between the registry and the agent's tasks.
///
/// The three mutable cells have different writers and different update
/// cadences, so each is synchronized on its own: liveness belongs to the
/// watchdog, the telemetry cache to the collector, and the command slot to
/// the executor. A slow command never stalls a telemetry read.
pub struct AgentHandle {
    id: AgentId,
    endpoint: String,
    liveness: RwLock<LivenessTracker>,
    telemetry: TelemetryCache,
    command_slot: Arc<Mutex<()>>,
    registered_at: Instant,
}

impl AgentHandle {
    pub(crate) fn new(id: AgentId, endpoint: String) -> Arc<Self> {
        Arc::new(Self {
            id,
            endpoint,
            liveness: RwLock::new(LivenessTracker::new()),
            telemetry: TelemetryCache::new(),
            command_slot: Arc::new(Mutex::new(())),
            registered_at: Instant::now(),
        })
    }

    pub fn id(&self) -> &AgentId {
        &self.id
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    /// Current liveness state
    pub async fn state(&self) -> LinkState {
        self.liveness.read().await.state()
    }

    /// Latest cached telemetry, if any has been received
    pub async fn telemetry(&self) -> Option<TelemetrySnapshot> {
        self.telemetry.latest().await
    }

    /// Whether a command is currently in flight for this agent
    pub fn command_in_flight(&self) -> bool {
        self.command_slot.try_lock().is_err()
    }

    /// Try to occupy the command slot; `None` if a command is already in
    /// flight. The returned guard releases the slot when dropped.
    pub(crate) fn try_occupy_slot(&self) -> Option<OwnedMutexGuard<()>> {
        Arc::clone(&self.command_slot).try_lock_owned().ok()
    }

    pub(crate) fn liveness(&self) -> &RwLock<LivenessTracker> {
        &self.liveness
    }

    pub(crate) fn telemetry_cache(&self) -> &TelemetryCache {
        &self.telemetry
    }

    /// Read-only snapshot of everything cached for this agent
    pub async fn snapshot(&self) -> AgentSnapshot {
        let (state, consecutive_failures) = {
            let liveness = self.liveness.read().await;
            (liveness.state(), liveness.consecutive_failures())
        };
        AgentSnapshot {
            id: self.id.clone(),
            endpoint: self.endpoint.clone(),
            state,
            consecutive_failures,
            telemetry: self.telemetry.latest().await,
            command_in_flight: self.command_in_flight(),
            registered_at: self.registered_at,
        }
    }
}

/// Point-in-time view of one agent, as returned by `FleetRegistry::get`
#[derive(Debug, Clone)]
pub struct AgentSnapshot {
    pub id: AgentId,
    pub endpoint: String,
    pub state: LinkState,
    pub consecutive_failures: u32,
    pub telemetry: Option<TelemetrySnapshot>,
    pub command_in_flight: bool,
    pub registered_at: Instant,
}

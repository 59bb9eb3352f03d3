//! Telemetry snapshot cache
//!
//! One cache cell per agent, written by that agent's collector and read by
//! everyone else. Updates are ordered by sample timestamp, not arrival order.

use std::sync::Arc;

use tokio::sync::RwLock;

/// Latest known vehicle telemetry
#[derive(Debug, Clone, PartialEq)]
pub struct TelemetrySnapshot {
    pub latitude: f64,
    pub longitude: f64,
    pub altitude_m: f32,
    pub battery_percent: u32,
    pub armed: bool,
    pub mode: String,
    pub heading_deg: f32,
    pub ground_speed_mps: f32,
    /// Sample time in milliseconds since Unix epoch
    pub timestamp_ms: u64,
}

/// Cache cell holding the latest snapshot for one agent.
///
/// An update with an older timestamp than the cached one is discarded, so the
/// cache never regresses when the feed delivers samples out of order. Readers
/// never wait on the feed: `latest` returns whatever was last written.
#[derive(Debug, Clone, Default)]
pub struct TelemetryCache {
    latest: Arc<RwLock<Option<TelemetrySnapshot>>>,
}

impl TelemetryCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Apply an update; returns false if it was older than the cached snapshot
    pub async fn apply(&self, snapshot: TelemetrySnapshot) -> bool {
        let mut latest = self.latest.write().await;
        if let Some(current) = latest.as_ref() {
            if snapshot.timestamp_ms < current.timestamp_ms {
                return false;
            }
        }
        *latest = Some(snapshot);
        true
    }

    /// Latest snapshot, if any telemetry has been received
    pub async fn latest(&self) -> Option<TelemetrySnapshot> {
        self.latest.read().await.clone()
    }
}

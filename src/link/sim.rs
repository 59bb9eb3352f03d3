//! Simulated vehicle link for development and tests
//!
//! Stands in for the real protocol client: each endpoint keeps a small
//! vehicle model that commands mutate and telemetry samples observe.
//! Reachability and failure modes are scriptable per endpoint.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use futures::stream::{self, StreamExt};
use tokio::sync::RwLock;

use crate::command::VehicleCommand;
use crate::error::LinkError;
use crate::link::traits::{TelemetryStream, VehicleLink};
use crate::now_ms;
use crate::telemetry::TelemetrySnapshot;

#[derive(Debug, Clone)]
struct SimVehicle {
    reachable: bool,
    reject_commands: bool,
    /// Accept commands at the link level but never apply their effect
    ignore_commands: bool,
    armed: bool,
    mode: String,
    latitude: f64,
    longitude: f64,
    altitude_m: f32,
    battery_percent: u32,
    heading_deg: f32,
    ground_speed_mps: f32,
}

impl SimVehicle {
    fn new() -> Self {
        Self {
            reachable: true,
            reject_commands: false,
            ignore_commands: false,
            armed: false,
            mode: "STABILIZE".into(),
            latitude: 63.4305,
            longitude: 10.3951,
            altitude_m: 0.0,
            battery_percent: 100,
            heading_deg: 0.0,
            ground_speed_mps: 0.0,
        }
    }

    fn sample(&self) -> TelemetrySnapshot {
        TelemetrySnapshot {
            latitude: self.latitude,
            longitude: self.longitude,
            altitude_m: self.altitude_m,
            battery_percent: self.battery_percent,
            armed: self.armed,
            mode: self.mode.clone(),
            heading_deg: self.heading_deg,
            ground_speed_mps: self.ground_speed_mps,
            timestamp_ms: now_ms(),
        }
    }

    fn apply(&mut self, command: &VehicleCommand) {
        match command {
            VehicleCommand::Arm => self.armed = true,
            VehicleCommand::Disarm => {
                self.armed = false;
                self.ground_speed_mps = 0.0;
            }
            VehicleCommand::Takeoff { altitude_m } => {
                self.mode = "GUIDED".into();
                self.altitude_m = *altitude_m;
            }
            VehicleCommand::Goto {
                latitude,
                longitude,
                altitude_m,
            } => {
                self.mode = "GUIDED".into();
                self.latitude = *latitude;
                self.longitude = *longitude;
                self.altitude_m = *altitude_m;
            }
            VehicleCommand::SetMode { mode } => self.mode = mode.clone(),
            VehicleCommand::ReturnToHome => self.mode = "RTL".into(),
            VehicleCommand::Land => {
                self.mode = "LAND".into();
                self.altitude_m = 0.0;
                self.ground_speed_mps = 0.0;
            }
        }
    }
}

/// Simulated multi-vehicle link with scriptable reachability and failures
pub struct SimulatedVehicleLink {
    vehicles: Arc<RwLock<HashMap<String, SimVehicle>>>,
    telemetry_period: Duration,
}

impl SimulatedVehicleLink {
    pub fn new() -> Self {
        Self::with_telemetry_period(Duration::from_millis(200))
    }

    /// Create a link whose telemetry feeds emit at the given period
    pub fn with_telemetry_period(telemetry_period: Duration) -> Self {
        Self {
            vehicles: Arc::new(RwLock::new(HashMap::new())),
            telemetry_period,
        }
    }

    /// Make a vehicle reachable at `endpoint`
    pub async fn add_vehicle(&self, endpoint: &str) {
        self.vehicles
            .write()
            .await
            .insert(endpoint.to_string(), SimVehicle::new());
    }

    /// Remove the vehicle at `endpoint`; its feed ends, probes fail
    pub async fn remove_vehicle(&self, endpoint: &str) {
        self.vehicles.write().await.remove(endpoint);
    }

    /// Script link availability: unreachable vehicles fail probes and
    /// commands, and their telemetry feed stalls
    pub async fn set_reachable(&self, endpoint: &str, reachable: bool) {
        if let Some(vehicle) = self.vehicles.write().await.get_mut(endpoint) {
            vehicle.reachable = reachable;
        }
    }

    /// Script the vehicle to reject every command at the link level
    pub async fn set_reject_commands(&self, endpoint: &str, reject: bool) {
        if let Some(vehicle) = self.vehicles.write().await.get_mut(endpoint) {
            vehicle.reject_commands = reject;
        }
    }

    /// Script the vehicle to accept commands but never apply their effect,
    /// so verification can only time out
    pub async fn set_ignore_commands(&self, endpoint: &str, ignore: bool) {
        if let Some(vehicle) = self.vehicles.write().await.get_mut(endpoint) {
            vehicle.ignore_commands = ignore;
        }
    }

    /// Script the reported battery level
    pub async fn set_battery(&self, endpoint: &str, percent: u32) {
        if let Some(vehicle) = self.vehicles.write().await.get_mut(endpoint) {
            vehicle.battery_percent = percent;
        }
    }
}

impl Default for SimulatedVehicleLink {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl VehicleLink for SimulatedVehicleLink {
    async fn probe(&self, endpoint: &str) -> bool {
        self.vehicles
            .read()
            .await
            .get(endpoint)
            .map(|v| v.reachable)
            .unwrap_or(false)
    }

    async fn telemetry_stream(&self, endpoint: &str) -> Result<TelemetryStream, LinkError> {
        {
            let vehicles = self.vehicles.read().await;
            let vehicle = vehicles
                .get(endpoint)
                .ok_or_else(|| LinkError::Unreachable(format!("no vehicle at {}", endpoint)))?;
            if !vehicle.reachable {
                return Err(LinkError::Unreachable(endpoint.to_string()));
            }
        }

        let vehicles = Arc::clone(&self.vehicles);
        let endpoint = endpoint.to_string();
        let period = self.telemetry_period;

        let feed = stream::unfold((), move |_| {
            let vehicles = Arc::clone(&vehicles);
            let endpoint = endpoint.clone();
            async move {
                loop {
                    tokio::time::sleep(period).await;
                    let sample = {
                        let vehicles = vehicles.read().await;
                        match vehicles.get(&endpoint) {
                            // Unreachable: the feed stalls rather than ends
                            Some(v) if v.reachable => Some(v.sample()),
                            Some(_) => None,
                            // Vehicle removed: the feed ends
                            None => return None,
                        }
                    };
                    if let Some(sample) = sample {
                        return Some((sample, ()));
                    }
                }
            }
        });

        Ok(feed.boxed())
    }

    async fn send_command(
        &self,
        endpoint: &str,
        command: &VehicleCommand,
    ) -> Result<(), LinkError> {
        let mut vehicles = self.vehicles.write().await;
        let vehicle = vehicles
            .get_mut(endpoint)
            .ok_or_else(|| LinkError::Unreachable(format!("no vehicle at {}", endpoint)))?;

        if !vehicle.reachable {
            return Err(LinkError::Unreachable(endpoint.to_string()));
        }
        if vehicle.reject_commands {
            return Err(LinkError::Rejected(format!("{} refused by vehicle", command)));
        }
        if !vehicle.ignore_commands {
            vehicle.apply(command);
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_probe_unknown_endpoint_fails() {
        let link = SimulatedVehicleLink::new();
        assert!(!link.probe("sim://ghost").await);

        link.add_vehicle("sim://alpha").await;
        assert!(link.probe("sim://alpha").await);
    }

    #[tokio::test]
    async fn test_commands_mutate_vehicle_state() {
        let link = SimulatedVehicleLink::with_telemetry_period(Duration::from_millis(10));
        link.add_vehicle("sim://alpha").await;

        link.send_command("sim://alpha", &VehicleCommand::Arm)
            .await
            .unwrap();

        let mut feed = link.telemetry_stream("sim://alpha").await.unwrap();
        let sample = feed.next().await.unwrap();
        assert!(sample.armed);
        assert_eq!(sample.mode, "STABILIZE");
    }

    #[tokio::test]
    async fn test_unreachable_vehicle_rejects_traffic() {
        let link = SimulatedVehicleLink::new();
        link.add_vehicle("sim://alpha").await;
        link.set_reachable("sim://alpha", false).await;

        assert!(!link.probe("sim://alpha").await);
        let err = link
            .send_command("sim://alpha", &VehicleCommand::Arm)
            .await
            .unwrap_err();
        assert!(matches!(err, LinkError::Unreachable(_)));
    }

    #[tokio::test]
    async fn test_ignored_commands_have_no_effect() {
        let link = SimulatedVehicleLink::with_telemetry_period(Duration::from_millis(10));
        link.add_vehicle("sim://alpha").await;
        link.set_ignore_commands("sim://alpha", true).await;

        link.send_command("sim://alpha", &VehicleCommand::Arm)
            .await
            .unwrap();

        let mut feed = link.telemetry_stream("sim://alpha").await.unwrap();
        assert!(!feed.next().await.unwrap().armed);
    }
}

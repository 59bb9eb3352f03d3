//! Fleet daemon demo
//!
//! Runs the orchestration core against the simulated vehicle link: registers
//! a small fleet, streams events into the log, and flies a short mission.

use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use tracing::{error, info, warn};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use skyfleet::{
    EventSeverity, FleetConfig, FleetRegistry, SimulatedVehicleLink, VehicleCommand, VehicleLink,
};

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::registry()
        .with(fmt::layer())
        .with(EnvFilter::from_default_env().add_directive(tracing::Level::INFO.into()))
        .init();

    let link = Arc::new(SimulatedVehicleLink::new());
    for endpoint in ["sim://alpha", "sim://bravo", "sim://charlie"] {
        link.add_vehicle(endpoint).await;
    }

    let config = FleetConfig {
        command_timeout: Duration::from_secs(5),
        ..Default::default()
    };
    let (registry, mut events) = FleetRegistry::new(
        Arc::clone(&link) as Arc<dyn VehicleLink>,
        config,
    );
    let registry = Arc::new(registry);

    // Initial fleet, as the configuration source would supply it
    for (id, endpoint) in [
        ("falcon-1", "sim://alpha"),
        ("falcon-2", "sim://bravo"),
        ("falcon-3", "sim://charlie"),
    ] {
        registry.register(endpoint, Some(id.to_string())).await?;
    }
    info!("Fleet registered: {:?}", registry.list().await);

    let sweeper = Arc::clone(&registry);
    tokio::spawn(async move { sweeper.run_retention_sweep().await });

    // Route fleet events into the log
    tokio::spawn(async move {
        while let Some(event) = events.recv().await {
            match event.severity() {
                EventSeverity::Info => info!(agent = %event.agent(), "{}", event.message()),
                EventSeverity::Warning => warn!(agent = %event.agent(), "{}", event.message()),
                EventSeverity::Error => error!(agent = %event.agent(), "{}", event.message()),
            }
        }
    });

    // Let every watchdog and collector complete a first cycle
    tokio::time::sleep(Duration::from_secs(2)).await;

    let armed = registry.broadcast(VehicleCommand::Arm).await;
    for (agent, result) in &armed {
        match result {
            Ok(ack) => info!(agent = %agent, elapsed_ms = ack.elapsed_ms, "Armed"),
            Err(e) => warn!(agent = %agent, error = %e, "Arm failed"),
        }
    }

    let lead: String = "falcon-1".into();
    registry
        .dispatch(&lead, VehicleCommand::Takeoff { altitude_m: 30.0 })
        .await?;
    registry
        .dispatch(
            &lead,
            VehicleCommand::Goto {
                latitude: 63.4421,
                longitude: 10.4012,
                altitude_m: 30.0,
            },
        )
        .await?;

    // Periodic fleet status
    let mut ticker = tokio::time::interval(Duration::from_secs(5));
    loop {
        ticker.tick().await;
        for id in registry.list().await {
            if let Ok(snapshot) = registry.get(&id).await {
                info!(
                    agent = %id,
                    state = %snapshot.state,
                    battery = ?snapshot.telemetry.as_ref().map(|t| t.battery_percent),
                    "Fleet status"
                );
            }
        }
    }
}

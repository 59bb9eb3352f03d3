//! Vehicle command vocabulary and acknowledgements

pub mod executor;

pub use executor::CommandExecutor;

use crate::telemetry::TelemetrySnapshot;

/// Discrete commands the fleet can issue to a vehicle
#[derive(Debug, Clone, PartialEq)]
pub enum VehicleCommand {
    /// Arm motors
    Arm,
    /// Disarm motors
    Disarm,
    /// Climb to the given altitude
    Takeoff { altitude_m: f32 },
    /// Fly to a position under guided control
    Goto {
        latitude: f64,
        longitude: f64,
        altitude_m: f32,
    },
    /// Switch flight mode
    SetMode { mode: String },
    /// Return to the launch point
    ReturnToHome,
    /// Land at the current position
    Land,
}

impl VehicleCommand {
    /// Default confirmation predicate: does this telemetry show the command
    /// has taken effect?
    ///
    /// Used by `dispatch`/`broadcast`; callers with stricter requirements
    /// supply their own predicate through `CommandExecutor::execute`.
    pub fn confirmed_by(&self, telemetry: &TelemetrySnapshot) -> bool {
        match self {
            VehicleCommand::Arm => telemetry.armed,
            VehicleCommand::Disarm => !telemetry.armed,
            VehicleCommand::Takeoff { altitude_m } => telemetry.altitude_m >= altitude_m * 0.95,
            VehicleCommand::Goto {
                latitude,
                longitude,
                ..
            } => {
                // Roughly within ~11m of the target at mid latitudes
                (telemetry.latitude - latitude).abs() < 1e-4
                    && (telemetry.longitude - longitude).abs() < 1e-4
            }
            VehicleCommand::SetMode { mode } => telemetry.mode == *mode,
            VehicleCommand::ReturnToHome => telemetry.mode == "RTL",
            VehicleCommand::Land => telemetry.mode == "LAND",
        }
    }
}

impl std::fmt::Display for VehicleCommand {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            VehicleCommand::Arm => write!(f, "ARM"),
            VehicleCommand::Disarm => write!(f, "DISARM"),
            VehicleCommand::Takeoff { altitude_m } => write!(f, "TAKEOFF({}m)", altitude_m),
            VehicleCommand::Goto {
                latitude,
                longitude,
                altitude_m,
            } => write!(f, "GOTO({:.5},{:.5},{}m)", latitude, longitude, altitude_m),
            VehicleCommand::SetMode { mode } => write!(f, "SET_MODE({})", mode),
            VehicleCommand::ReturnToHome => write!(f, "RTH"),
            VehicleCommand::Land => write!(f, "LAND"),
        }
    }
}

/// Acknowledgement for a command whose effect was confirmed
#[derive(Debug, Clone, PartialEq)]
pub struct CommandAck {
    pub command: VehicleCommand,
    /// Time from issue to confirmed effect
    pub elapsed_ms: u64,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn telemetry() -> TelemetrySnapshot {
        TelemetrySnapshot {
            latitude: 63.43,
            longitude: 10.39,
            altitude_m: 0.0,
            battery_percent: 100,
            armed: false,
            mode: "STABILIZE".into(),
            heading_deg: 0.0,
            ground_speed_mps: 0.0,
            timestamp_ms: 1,
        }
    }

    #[test]
    fn test_arm_confirmation() {
        let mut t = telemetry();
        assert!(!VehicleCommand::Arm.confirmed_by(&t));
        t.armed = true;
        assert!(VehicleCommand::Arm.confirmed_by(&t));
        assert!(!VehicleCommand::Disarm.confirmed_by(&t));
    }

    #[test]
    fn test_takeoff_confirmation_accepts_near_target() {
        let cmd = VehicleCommand::Takeoff { altitude_m: 30.0 };
        let mut t = telemetry();

        t.altitude_m = 20.0;
        assert!(!cmd.confirmed_by(&t));
        t.altitude_m = 29.0;
        assert!(cmd.confirmed_by(&t));
    }

    #[test]
    fn test_mode_commands_confirm_on_mode() {
        let mut t = telemetry();
        t.mode = "RTL".into();
        assert!(VehicleCommand::ReturnToHome.confirmed_by(&t));
        assert!(!VehicleCommand::Land.confirmed_by(&t));
        assert!(VehicleCommand::SetMode { mode: "RTL".into() }.confirmed_by(&t));
    }
}

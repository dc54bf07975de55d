//! Runtime configuration types for the compiler and the dispatcher.
//!
//! These are the structs the core operates on. They are separate from the
//! TOML-deserialized config in `presso_config`; see `conversions`.

use presso_traits::QoS;
use std::time::Duration;

/// Lowest pressure the actuator may be asked to hold (bar).
pub const PRESSURE_MIN_BAR: f64 = 3.0;
/// Highest pressure the actuator may be asked to hold (bar).
pub const PRESSURE_MAX_BAR: f64 = 9.5;

/// Mechanical constants of the pressure actuator, fixed at startup.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ActuatorConstants {
    /// Motor microstepping resolution.
    pub steps_per_revolution: u32,
    /// Pressure change per full revolution of the screw (bar).
    pub bar_per_revolution: f64,
}

impl ActuatorConstants {
    pub fn new(steps_per_revolution: u32, bar_per_revolution: f64) -> Self {
        Self {
            steps_per_revolution,
            bar_per_revolution,
        }
    }

    /// Whole steps per bar, for display and sanity checks only. The compiler
    /// works in rotations per bar delta.
    pub fn steps_per_bar(&self) -> u32 {
        if !(self.bar_per_revolution.is_finite() && self.bar_per_revolution > 0.0) {
            return 0;
        }
        (f64::from(self.steps_per_revolution) / self.bar_per_revolution) as u32
    }
}

impl Default for ActuatorConstants {
    fn default() -> Self {
        Self {
            steps_per_revolution: 4096,
            bar_per_revolution: 2.0,
        }
    }
}

/// Dispatch policy parameters.
#[derive(Debug, Clone)]
pub struct DispatchCfg {
    pub host: String,
    pub port: u16,
    /// Topic the command sequence is published on.
    pub command_topic: String,
    /// Topic the device acknowledges on.
    pub ack_topic: String,
    pub qos: QoS,
    /// Wait after connect before publishing.
    pub settle: Duration,
    /// Bounded wait for the acknowledgment.
    pub ack_timeout: Duration,
    /// Largest payload we publish; the channel's own limit applies too.
    pub max_payload_bytes: usize,
}

impl Default for DispatchCfg {
    fn default() -> Self {
        Self {
            host: "localhost".to_string(),
            port: 8883,
            command_topic: "pressure_profile".to_string(),
            ack_topic: "espresso_machine".to_string(),
            qos: QoS::AtLeastOnce,
            settle: Duration::from_millis(500),
            ack_timeout: Duration::from_secs(5),
            max_payload_bytes: 500,
        }
    }
}

//! `From` implementations bridging `presso_config` types to `presso_core` types.

use std::time::Duration;

use crate::config::{ActuatorConstants, DispatchCfg};
use crate::profile::ProfilePoint;
use presso_traits::QoS;

// ── ActuatorConstants ────────────────────────────────────────────────────────

impl From<&presso_config::ActuatorCfg> for ActuatorConstants {
    fn from(c: &presso_config::ActuatorCfg) -> Self {
        Self {
            steps_per_revolution: c.steps_per_revolution,
            bar_per_revolution: c.bar_per_revolution,
        }
    }
}

// ── DispatchCfg ──────────────────────────────────────────────────────────────

impl From<&presso_config::Config> for DispatchCfg {
    fn from(c: &presso_config::Config) -> Self {
        Self {
            host: c.broker.host.clone(),
            port: c.broker.port,
            command_topic: c.topics.command.clone(),
            ack_topic: c.topics.ack.clone(),
            qos: QoS::AtLeastOnce,
            settle: Duration::from_millis(c.dispatch.settle_ms),
            ack_timeout: Duration::from_millis(c.dispatch.ack_timeout_ms),
            max_payload_bytes: c.dispatch.max_payload_bytes,
        }
    }
}

// ── Profile rows ─────────────────────────────────────────────────────────────

impl From<presso_config::ProfileRow> for ProfilePoint {
    fn from(r: presso_config::ProfileRow) -> Self {
        Self {
            time: r.time,
            pressure: r.pressure,
        }
    }
}

impl From<&ProfilePoint> for presso_config::ProfileRow {
    fn from(p: &ProfilePoint) -> Self {
        Self {
            time: p.time,
            pressure: p.pressure,
        }
    }
}

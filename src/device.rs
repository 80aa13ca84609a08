//! The device collaborator: capability set, connection kinds and the settle
//! delay. The concrete gateway client lives in [`gateway`].

use std::{fmt, thread, time::Duration};

use serde_json::{Map, Value};

use crate::{prelude::*, setter::PowerLimits, window::TimeWindow};

pub mod gateway;
#[cfg(test)]
pub mod mock;

/// A JSON object returned by the device for one query category.
pub type Payload = Map<String, Value>;

/// How long a local gateway needs before a fresh query reflects a setting
/// that was just applied.
const SETTLE_DELAY: Duration = Duration::from_millis(500);

/// Capability set of the device communication library.
///
/// Read calls return `Ok(None)` when the device reports the subsystem as not
/// installed (for example, no wallbox). Setter calls return the device's raw
/// integer result code.
pub trait InverterApi {
    fn poll(&mut self) -> Result<Option<Payload>>;
    fn get_system_info(&mut self) -> Result<Option<Payload>>;
    fn get_system_status(&mut self) -> Result<Option<Payload>>;
    fn get_power_settings(&mut self) -> Result<Option<Payload>>;
    fn get_powermeter_data(&mut self) -> Result<Option<Payload>>;
    fn get_battery_data(&mut self) -> Result<Option<Payload>>;
    fn get_inverter_data(&mut self) -> Result<Option<Payload>>;
    fn get_wallbox_data(&mut self) -> Result<Option<Payload>>;

    /// Historical database query over the given time window.
    fn get_history(&mut self, window: TimeWindow) -> Result<Option<Payload>>;

    fn set_power_limits(&mut self, limits: &PowerLimits) -> Result<i64>;
    fn set_powersave(&mut self, enable: bool) -> Result<i64>;
    fn set_weather_regulated_charge(&mut self, enable: bool) -> Result<i64>;

    fn disconnect(&mut self) -> Result;
}

#[derive(Copy, Clone, Debug, Eq, PartialEq, clap::ValueEnum, serde::Deserialize)]
#[value(rename_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum ConnectionKind {
    /// LAN gateway connection (recommended).
    Local,

    /// Connection relayed through the vendor portal.
    Web,
}

impl fmt::Display for ConnectionKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Local => f.write_str("local"),
            Self::Web => f.write_str("web"),
        }
    }
}

/// Block until a just-applied setting is visible to queries.
///
/// A local gateway answers faster than it propagates settings, so a query
/// issued right after a setter may still see the old state. The web relay is
/// slow enough on its own.
pub fn wait_until_applied(kind: ConnectionKind) {
    if kind == ConnectionKind::Local {
        debug!(delay_ms = SETTLE_DELAY.as_millis() as u64, "waiting for the device to settle");
        thread::sleep(SETTLE_DELAY);
    }
}

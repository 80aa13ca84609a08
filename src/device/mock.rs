//! Scripted in-memory device used by the unit and pipeline tests.

use serde_json::Value;

use crate::{
    device::{InverterApi, Payload},
    prelude::*,
    setter::PowerLimits,
    window::TimeWindow,
};

/// Stand-in for a connected device: canned payloads per category, a constant
/// setter result code, and a log of every call in order. History queries
/// echo the submitted window, like the real database endpoint does.
#[derive(Default)]
pub struct MockApi {
    pub live: Option<Payload>,
    pub system_info: Option<Payload>,
    pub system_status: Option<Payload>,
    pub power_settings: Option<Payload>,
    pub powermeter: Option<Payload>,
    pub battery: Option<Payload>,
    pub inverter: Option<Payload>,
    pub wallbox: Option<Payload>,
    pub result_code: i64,
    pub calls: Vec<String>,
    pub disconnected: bool,
}

impl MockApi {
    fn record(&mut self, call: impl Into<String>) {
        self.calls.push(call.into());
    }
}

impl InverterApi for MockApi {
    fn poll(&mut self) -> Result<Option<Payload>> {
        self.record("poll");
        Ok(self.live.clone())
    }

    fn get_system_info(&mut self) -> Result<Option<Payload>> {
        self.record("get_system_info");
        Ok(self.system_info.clone())
    }

    fn get_system_status(&mut self) -> Result<Option<Payload>> {
        self.record("get_system_status");
        Ok(self.system_status.clone())
    }

    fn get_power_settings(&mut self) -> Result<Option<Payload>> {
        self.record("get_power_settings");
        Ok(self.power_settings.clone())
    }

    fn get_powermeter_data(&mut self) -> Result<Option<Payload>> {
        self.record("get_powermeter_data");
        Ok(self.powermeter.clone())
    }

    fn get_battery_data(&mut self) -> Result<Option<Payload>> {
        self.record("get_battery_data");
        Ok(self.battery.clone())
    }

    fn get_inverter_data(&mut self) -> Result<Option<Payload>> {
        self.record("get_inverter_data");
        Ok(self.inverter.clone())
    }

    fn get_wallbox_data(&mut self) -> Result<Option<Payload>> {
        self.record("get_wallbox_data");
        Ok(self.wallbox.clone())
    }

    fn get_history(&mut self, window: TimeWindow) -> Result<Option<Payload>> {
        self.record(format!(
            "get_history({}, {})",
            window.start_timestamp, window.duration_seconds,
        ));
        let mut payload = Payload::new();
        payload.insert("startTimestamp".to_owned(), window.start_timestamp.into());
        payload.insert("timespanSeconds".to_owned(), window.duration_seconds.into());
        Ok(Some(payload))
    }

    fn set_power_limits(&mut self, _limits: &PowerLimits) -> Result<i64> {
        self.record("set_power_limits");
        Ok(self.result_code)
    }

    fn set_powersave(&mut self, enable: bool) -> Result<i64> {
        self.record(format!("set_powersave({enable})"));
        // Propagate to the power settings, like the device does.
        self.power_settings
            .get_or_insert_with(Payload::new)
            .insert("powerSaveEnabled".to_owned(), Value::Bool(enable));
        Ok(self.result_code)
    }

    fn set_weather_regulated_charge(&mut self, enable: bool) -> Result<i64> {
        self.record(format!("set_weather_regulated_charge({enable})"));
        Ok(self.result_code)
    }

    fn disconnect(&mut self) -> Result {
        self.record("disconnect");
        self.disconnected = true;
        Ok(())
    }
}

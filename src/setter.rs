//! Setter orchestration: apply requested configuration changes and report a
//! uniform result per change.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value, json};

use crate::{
    device::{InverterApi, Payload},
    prelude::*,
};

/// Manual SmartPower limits. Power values are watts.
#[derive(Copy, Clone, Debug, Default, Serialize, Deserialize)]
pub struct PowerLimits {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub enable: Option<bool>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_charge: Option<i64>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_discharge: Option<i64>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub discharge_start: Option<i64>,
}

impl PowerLimits {
    /// Customizing any power value implies manual mode: force `enable` on
    /// when it was left unset but a limit was given.
    pub fn link_enable(&mut self) {
        if self.enable.is_none()
            && (self.max_charge.is_some()
                || self.max_discharge.is_some()
                || self.discharge_start.is_some())
        {
            self.enable = Some(true);
        }
    }

    /// The limits are submitted to the device only when `enable` has a
    /// value, either explicit or inferred by [`Self::link_enable`].
    pub const fn is_requested(&self) -> bool {
        self.enable.is_some()
    }

    /// Snapshot of the fields that were actually given.
    fn submitted_fields(&self) -> Payload {
        let mut fields = Payload::new();
        if let Some(enable) = self.enable {
            fields.insert("enable".to_owned(), enable.into());
        }
        if let Some(max_charge) = self.max_charge {
            fields.insert("max_charge".to_owned(), max_charge.into());
        }
        if let Some(max_discharge) = self.max_discharge {
            fields.insert("max_discharge".to_owned(), max_discharge.into());
        }
        if let Some(discharge_start) = self.discharge_start {
            fields.insert("discharge_start".to_owned(), discharge_start.into());
        }
        fields
    }
}

/// All settings an invocation may apply. Only settings with a value are
/// executed.
#[derive(Clone, Debug, Default)]
pub struct SetCommands {
    pub power_limits: PowerLimits,
    pub powersave: Option<bool>,
    pub weather_regulated_charge: Option<bool>,
}

/// Apply every requested setting. Returns the per-setting results, or `None`
/// when no setting was requested at all; the caller uses that to decide
/// whether a settle delay is needed before querying.
pub fn run_setters<A: InverterApi + ?Sized>(
    api: &mut A,
    commands: &SetCommands,
) -> Result<Option<Map<String, Value>>> {
    let mut collected = Map::new();

    if commands.power_limits.is_requested() {
        info!("setting power limits");
        let result_code = api.set_power_limits(&commands.power_limits)?;
        collected.insert(
            "power_limits".to_owned(),
            setter_result(commands.power_limits.submitted_fields(), result_code),
        );
    }
    if let Some(enable) = commands.powersave {
        info!(enable, "setting powersave");
        let result_code = api.set_powersave(enable)?;
        collected.insert(
            "powersave".to_owned(),
            setter_result(enable_field(enable), result_code),
        );
    }
    if let Some(enable) = commands.weather_regulated_charge {
        info!(enable, "setting weather-regulated charge");
        let result_code = api.set_weather_regulated_charge(enable)?;
        collected.insert(
            "weather_regulated_charge".to_owned(),
            setter_result(enable_field(enable), result_code),
        );
    }

    Ok((!collected.is_empty()).then_some(collected))
}

fn enable_field(enable: bool) -> Payload {
    let mut fields = Payload::new();
    fields.insert("enable".to_owned(), enable.into());
    fields
}

/// Wrap the submitted parameters and the device's result code into the
/// uniform per-setting result.
fn setter_result(input_parameters: Payload, result_code: i64) -> Value {
    json!({
        "input_parameters": input_parameters,
        "result": describe_result_code(result_code),
        "result_code": result_code,
    })
}

const fn describe_result_code(result_code: i64) -> &'static str {
    match result_code {
        0 => "success",
        1 => "one value is nonoptimal",
        -1 => "fail",
        _ => "unknown",
    }
}

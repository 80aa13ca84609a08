//! Command-line surface, JSON config-file layering and validation.

use std::{fs, path::PathBuf};

use clap::Parser;
use serde::Deserialize;

use crate::{
    device::ConnectionKind,
    prelude::*,
    query::QueryKind,
    setter::{PowerLimits, SetCommands},
};

/// Fallback config file, picked up when present and `--config` is not given.
const DEFAULT_CONFIG_FILE: &str = "config.json";

const DEFAULT_PORTAL_URL: &str = "https://portal.helios-cloud.net/api/v1";

#[derive(Parser)]
#[command(author, version, about = "Query and configure Helios solar inverter systems")]
pub struct Args {
    /// Path to a JSON configuration file.
    ///
    /// Every option can also come from the file; command-line values win.
    /// The JSON hierarchy follows the option names: `{"connection": {"type":
    /// "local", ...}, "query": [...], "set": {...}, "output": "..."}`.
    #[clap(short = 'c', long, env = "HELIOSCTL_CONFIG")]
    pub config: Option<PathBuf>,

    /// Path of the JSON output file. Without it the output goes to stdout.
    #[clap(short = 'o', long)]
    pub output: Option<PathBuf>,

    #[clap(flatten)]
    pub connection: ConnectionArgs,

    /// Status or history queries to perform, in order.
    #[clap(short = 'q', long = "query", value_enum, value_delimiter = ',', num_args = 1..)]
    pub query: Vec<QueryKind>,

    #[clap(flatten)]
    pub set: SetArgs,
}

#[derive(Clone, Debug, Default, clap::Args)]
pub struct ConnectionArgs {
    /// Connection used to reach the system: the LAN gateway (recommended) or
    /// the vendor portal relay.
    #[clap(long = "connection-type", value_enum, env = "HELIOSCTL_CONNECTION_TYPE")]
    pub kind: Option<ConnectionKind>,

    /// IP or DNS address of the system. Connection type `local` only.
    #[clap(long = "connection-address", env = "HELIOSCTL_CONNECTION_ADDRESS")]
    pub address: Option<String>,

    /// Username, same as for the vendor portal.
    #[clap(long = "connection-user", env = "HELIOSCTL_USER")]
    pub user: Option<String>,

    /// Password, same as for the vendor portal.
    #[clap(long = "connection-password", env = "HELIOSCTL_PASSWORD")]
    pub password: Option<String>,

    /// Gateway access key, as personalized on the device. Connection type
    /// `local` only.
    #[clap(long = "connection-access-key", env = "HELIOSCTL_ACCESS_KEY")]
    pub access_key: Option<String>,

    /// Serial number of the system. Connection type `web` only.
    #[clap(long = "connection-serial-number", env = "HELIOSCTL_SERIAL_NUMBER")]
    pub serial_number: Option<String>,

    /// Vendor portal base URL. Connection type `web` only.
    #[clap(long = "connection-portal-url", env = "HELIOSCTL_PORTAL_URL")]
    pub portal_url: Option<String>,
}

impl ConnectionArgs {
    pub fn kind(&self) -> ConnectionKind {
        self.kind.unwrap_or(ConnectionKind::Local)
    }

    pub fn portal_url(&self) -> &str {
        self.portal_url.as_deref().unwrap_or(DEFAULT_PORTAL_URL)
    }
}

#[derive(Clone, Debug, Default, clap::Args)]
pub struct SetArgs {
    /// `true`: enable manual SmartPower limits, `false`: automatic mode.
    /// Inferred as `true` when unset and any manual limit is given.
    #[clap(long = "set-power-limits-enable", value_name = "BOOL")]
    pub power_limits_enable: Option<bool>,

    /// SmartPower maximum charging power, watts.
    #[clap(long = "set-power-limits-max-charge", value_name = "WATTS")]
    pub power_limits_max_charge: Option<i64>,

    /// SmartPower maximum discharging power, watts.
    #[clap(long = "set-power-limits-max-discharge", value_name = "WATTS")]
    pub power_limits_max_discharge: Option<i64>,

    /// SmartPower lower charge/discharge threshold, watts.
    #[clap(long = "set-power-limits-discharge-start", value_name = "WATTS")]
    pub power_limits_discharge_start: Option<i64>,

    /// Enable or disable powersave (inverter standby when idle).
    #[clap(long = "set-powersave", value_name = "BOOL")]
    pub powersave: Option<bool>,

    /// Enable or disable charging optimized by the weather forecast.
    #[clap(long = "set-weather-regulated-charge", value_name = "BOOL")]
    pub weather_regulated_charge: Option<bool>,
}

impl Args {
    /// Parse the command line, layer in the config file and validate.
    pub fn load() -> Result<Self> {
        let mut args = Self::parse();
        args.merge_config_file()?;
        args.validate()?;
        Ok(args)
    }

    /// Fill every option that was not given on the command line from the
    /// JSON config file, when there is one.
    pub fn merge_config_file(&mut self) -> Result {
        let path = match &self.config {
            Some(path) => path.clone(),
            None => {
                let fallback = PathBuf::from(DEFAULT_CONFIG_FILE);
                if !fallback.is_file() {
                    return Ok(());
                }
                fallback
            }
        };
        debug!(path = %path.display(), "merging the config file");
        let contents = fs::read_to_string(&path)
            .with_context(|| format!("failed to read the config file `{}`", path.display()))?;
        let file: ConfigFile = serde_json::from_str(&contents)
            .with_context(|| format!("failed to parse the config file `{}`", path.display()))?;
        self.merge(file);
        Ok(())
    }

    fn merge(&mut self, file: ConfigFile) {
        let connection = &mut self.connection;
        connection.kind = connection.kind.or(file.connection.kind);
        merge_option(&mut connection.address, file.connection.address);
        merge_option(&mut connection.user, file.connection.user);
        merge_option(&mut connection.password, file.connection.password);
        merge_option(&mut connection.access_key, file.connection.access_key);
        merge_option(&mut connection.serial_number, file.connection.serial_number);
        merge_option(&mut connection.portal_url, file.connection.portal_url);

        let set = &mut self.set;
        set.power_limits_enable = set.power_limits_enable.or(file.set.power_limits.enable);
        set.power_limits_max_charge =
            set.power_limits_max_charge.or(file.set.power_limits.max_charge);
        set.power_limits_max_discharge =
            set.power_limits_max_discharge.or(file.set.power_limits.max_discharge);
        set.power_limits_discharge_start =
            set.power_limits_discharge_start.or(file.set.power_limits.discharge_start);
        set.powersave = set.powersave.or(file.set.powersave);
        set.weather_regulated_charge =
            set.weather_regulated_charge.or(file.set.weather_regulated_charge);

        if self.query.is_empty() {
            self.query = file.query.unwrap_or_default();
        }
        merge_option(&mut self.output, file.output);
    }

    /// Settings to apply, with the power-limits enable inference done.
    pub fn set_commands(&self) -> SetCommands {
        let mut power_limits = PowerLimits {
            enable: self.set.power_limits_enable,
            max_charge: self.set.power_limits_max_charge,
            max_discharge: self.set.power_limits_max_discharge,
            discharge_start: self.set.power_limits_discharge_start,
        };
        power_limits.link_enable();
        SetCommands {
            power_limits,
            powersave: self.set.powersave,
            weather_regulated_charge: self.set.weather_regulated_charge,
        }
    }

    /// Check that the selected connection kind has everything it needs,
    /// reporting all issues at once.
    pub fn validate(&self) -> Result {
        let mut issues = Vec::new();
        if self.connection.user.is_none() {
            issues.push("connection user is missing");
        }
        if self.connection.password.is_none() {
            issues.push("connection password is missing");
        }
        match self.connection.kind() {
            ConnectionKind::Local => {
                if self.connection.address.is_none() {
                    issues.push("connection address is missing, required for connection type `local`");
                }
                if self.connection.access_key.is_none() {
                    issues.push("connection access key is missing, required for connection type `local`");
                }
            }
            ConnectionKind::Web => {
                if self.connection.serial_number.is_none() {
                    issues.push("connection serial number is missing, required for connection type `web`");
                }
            }
        }
        ensure!(issues.is_empty(), "invalid configuration:\n- {}", issues.join("\n- "));
        Ok(())
    }
}

fn merge_option<T>(target: &mut Option<T>, fallback: Option<T>) {
    if target.is_none() {
        *target = fallback;
    }
}

/// On-disk shape of the JSON config file.
#[derive(Default, Deserialize)]
struct ConfigFile {
    #[serde(default)]
    connection: ConnectionSection,

    query: Option<Vec<QueryKind>>,

    #[serde(default)]
    set: SetSection,

    output: Option<PathBuf>,
}

#[derive(Default, Deserialize)]
struct ConnectionSection {
    #[serde(rename = "type")]
    kind: Option<ConnectionKind>,
    address: Option<String>,
    user: Option<String>,
    password: Option<String>,
    access_key: Option<String>,
    serial_number: Option<String>,
    portal_url: Option<String>,
}

#[derive(Default, Deserialize)]
struct SetSection {
    #[serde(default)]
    power_limits: PowerLimits,
    powersave: Option<bool>,
    weather_regulated_charge: Option<bool>,
}

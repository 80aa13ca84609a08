//! Query identifiers and their dispatch onto the device API.

use std::fmt;

use chrono::{DateTime, TimeZone};
use serde_json::{Map, Value};

use crate::{
    device::{InverterApi, Payload},
    prelude::*,
    window,
};

/// `powerSaveEnabled` is reported by both the system status and the power
/// settings, but only the power-settings value reflects the user-facing
/// setting in the vendor UI.
const POWER_SAVE_ENABLED: &str = "powerSaveEnabled";

/// All supported query identifiers. The set is closed: anything else is
/// rejected during argument parsing, before the device is contacted.
#[derive(Copy, Clone, Debug, Eq, PartialEq, clap::ValueEnum, serde::Deserialize)]
#[value(rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum QueryKind {
    /// Static system metadata (model, software version, peak power, …).
    StaticSystem,

    /// Condensed instantaneous status (consumption, production, SoC, …).
    Live,

    /// General system status merged with the power settings.
    LiveSystem,

    LivePowermeter,
    LiveBattery,
    LiveInverter,
    LiveWallbox,

    HistoryToday,
    HistoryYesterday,
    HistoryWeek,
    HistoryPreviousWeek,
    HistoryMonth,
    HistoryPreviousMonth,
    HistoryYear,
    HistoryPreviousYear,

    /// Accumulated history since the epoch.
    HistoryTotal,
}

impl QueryKind {
    /// Identifier name as used on the command line and as the output key.
    pub const fn name(self) -> &'static str {
        match self {
            Self::StaticSystem => "static_system",
            Self::Live => "live",
            Self::LiveSystem => "live_system",
            Self::LivePowermeter => "live_powermeter",
            Self::LiveBattery => "live_battery",
            Self::LiveInverter => "live_inverter",
            Self::LiveWallbox => "live_wallbox",
            Self::HistoryToday => "history_today",
            Self::HistoryYesterday => "history_yesterday",
            Self::HistoryWeek => "history_week",
            Self::HistoryPreviousWeek => "history_previous_week",
            Self::HistoryMonth => "history_month",
            Self::HistoryPreviousMonth => "history_previous_month",
            Self::HistoryYear => "history_year",
            Self::HistoryPreviousYear => "history_previous_year",
            Self::HistoryTotal => "history_total",
        }
    }
}

impl fmt::Display for QueryKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Run every requested query and collect the results keyed by identifier
/// name. A query that yields nothing is dropped rather than recorded as
/// null. Any failure aborts the whole batch.
pub fn run_queries<A: InverterApi + ?Sized, Tz: TimeZone>(
    api: &mut A,
    kinds: &[QueryKind],
    now: &DateTime<Tz>,
) -> Result<Map<String, Value>> {
    let mut collected = Map::new();
    for kind in kinds {
        debug!(query = kind.name(), "querying");
        if let Some(payload) = run_query(api, *kind, now)? {
            collected.insert(kind.name().to_owned(), Value::Object(payload));
        }
    }
    Ok(collected)
}

/// Run a single query: either one direct device call, a merged pair of calls
/// for `live_system`, or a time-window-backed history call.
pub fn run_query<A: InverterApi + ?Sized, Tz: TimeZone>(
    api: &mut A,
    kind: QueryKind,
    now: &DateTime<Tz>,
) -> Result<Option<Payload>> {
    match kind {
        QueryKind::StaticSystem => api.get_system_info(),
        QueryKind::Live => api.poll(),
        QueryKind::LiveSystem => {
            let mut status = api.get_system_status()?.unwrap_or_default();
            status.remove(POWER_SAVE_ENABLED);
            let settings = api.get_power_settings()?.unwrap_or_default();
            merge_payloads([status, settings]).map(Some)
        }
        QueryKind::LivePowermeter => api.get_powermeter_data(),
        QueryKind::LiveBattery => api.get_battery_data(),
        QueryKind::LiveInverter => api.get_inverter_data(),
        QueryKind::LiveWallbox => api.get_wallbox_data(),
        QueryKind::HistoryToday => api.get_history(window::day(now, 0)),
        QueryKind::HistoryYesterday => api.get_history(window::day(now, 1)),
        QueryKind::HistoryWeek => api.get_history(window::week(now, 0)),
        QueryKind::HistoryPreviousWeek => api.get_history(window::week(now, 1)),
        QueryKind::HistoryMonth => api.get_history(window::month(now, 0)),
        QueryKind::HistoryPreviousMonth => api.get_history(window::month(now, 1)),
        QueryKind::HistoryYear => api.get_history(window::year(now, 0)),
        QueryKind::HistoryPreviousYear => api.get_history(window::year(now, 1)),
        QueryKind::HistoryTotal => api.get_history(window::all_time(now)),
    }
}

/// Merge payloads into one. A key present in several sources must carry the
/// same value everywhere: a mismatch means the device reported inconsistent
/// state and the invocation must fail rather than silently pick one side.
pub fn merge_payloads(sources: impl IntoIterator<Item = Payload>) -> Result<Payload> {
    let mut merged = Payload::new();
    for source in sources {
        for (key, value) in source {
            if let Some(existing) = merged.get(&key) {
                ensure!(
                    *existing == value,
                    "duplicate key `{key}` with different values: {value} <-> {existing}",
                );
            }
            merged.insert(key, value);
        }
    }
    Ok(merged)
}

//! Time windows for the device's historical database queries.
//!
//! All functions are pure: they take "now" in an explicit local timezone and
//! return the `(start_timestamp, duration_seconds)` pair the gateway's
//! history endpoint expects. The calendar arithmetic happens on naive local
//! wall-clock fields first and the result is localized afterwards, so
//! subtracting days or weeks never drifts across a DST change.

use chrono::{
    DateTime, Datelike, LocalResult, Months, NaiveDate, NaiveDateTime, NaiveTime, Offset,
    TimeDelta, TimeZone,
};

pub const SECONDS_PER_HOUR: u64 = 3_600;
pub const HOURS_PER_DAY: u64 = 24;
pub const DAYS_PER_WEEK: u64 = 7;

/// Fixed day count the device assumes for a year of history, leap years
/// included. Matches the device's reporting buckets, so it must stay 365.
pub const DAYS_PER_YEAR: u64 = 365;

/// Time range submitted to the historical database endpoint.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub struct TimeWindow {
    /// Seconds since the epoch, encoded with the device's offset quirk.
    pub start_timestamp: i64,

    pub duration_seconds: u64,
}

/// Window covering one whole local day, `past_days_from_now` days back.
///
/// The start is shifted 15 minutes before midnight: the device accumulates
/// daily history in 15-minute slots and reports the day starting at 23:45 of
/// the previous day.
pub fn day<Tz: TimeZone>(now: &DateTime<Tz>, past_days_from_now: u32) -> TimeWindow {
    let midnight = now.date_naive().and_time(NaiveTime::MIN);
    let start = midnight
        - TimeDelta::days(i64::from(past_days_from_now))
        - TimeDelta::minutes(15);
    TimeWindow {
        start_timestamp: start_timestamp(&now.timezone(), start),
        duration_seconds: HOURS_PER_DAY * SECONDS_PER_HOUR,
    }
}

/// Window covering one whole local week starting Monday,
/// `past_weeks_from_now` weeks back.
///
/// Weekly history accumulates in 1-hour slots, reported one slot early, so
/// the start is shifted 1 hour before Monday midnight.
pub fn week<Tz: TimeZone>(now: &DateTime<Tz>, past_weeks_from_now: u32) -> TimeWindow {
    let midnight = now.date_naive().and_time(NaiveTime::MIN);
    let start = midnight
        - TimeDelta::days(i64::from(now.date_naive().weekday().num_days_from_monday()))
        - TimeDelta::weeks(i64::from(past_weeks_from_now))
        - TimeDelta::hours(1);
    TimeWindow {
        start_timestamp: start_timestamp(&now.timezone(), start),
        duration_seconds: DAYS_PER_WEEK * HOURS_PER_DAY * SECONDS_PER_HOUR,
    }
}

/// Window covering one whole calendar month, `past_months_from_now` calendar
/// months back. The duration follows the actual month length. No reporting
/// shift has been observed for monthly history.
pub fn month<Tz: TimeZone>(now: &DateTime<Tz>, past_months_from_now: u32) -> TimeWindow {
    let current_first = first_of_month(now.date_naive());
    let target_first = current_first
        .checked_sub_months(Months::new(past_months_from_now))
        .unwrap_or(NaiveDate::MIN);
    let start = target_first.and_time(NaiveTime::MIN);
    TimeWindow {
        start_timestamp: start_timestamp(&now.timezone(), start),
        duration_seconds: days_in_month(target_first) * HOURS_PER_DAY * SECONDS_PER_HOUR,
    }
}

/// Window covering one calendar year starting January 1st,
/// `past_years_from_now` years back. The duration is always 365 days, also
/// in leap years; the device sizes its yearly buckets that way.
pub fn year<Tz: TimeZone>(now: &DateTime<Tz>, past_years_from_now: u32) -> TimeWindow {
    let target_year = i64::from(now.year()) - i64::from(past_years_from_now);
    let jan_first = i32::try_from(target_year)
        .ok()
        .and_then(|year| NaiveDate::from_ymd_opt(year, 1, 1))
        .unwrap_or(NaiveDate::MIN);
    let start = jan_first.and_time(NaiveTime::MIN);
    TimeWindow {
        start_timestamp: start_timestamp(&now.timezone(), start),
        duration_seconds: DAYS_PER_YEAR * HOURS_PER_DAY * SECONDS_PER_HOUR,
    }
}

/// Window from the fixed all-time anchor up to now.
///
/// The anchor is local 1970-01-02T00:00:01, one day and one second past the
/// epoch, keeping clear of timezone edge cases around epoch zero.
pub fn all_time<Tz: TimeZone>(now: &DateTime<Tz>) -> TimeWindow {
    let anchor_naive = NaiveDate::from_ymd_opt(1970, 1, 2)
        .and_then(|date| date.and_hms_opt(0, 0, 1))
        .unwrap_or(NaiveDateTime::MIN);
    let anchor = localize(&now.timezone(), anchor_naive);
    let elapsed_seconds = now.clone().signed_duration_since(&anchor).num_seconds();
    TimeWindow {
        start_timestamp: encode(&anchor),
        duration_seconds: u64::try_from(elapsed_seconds).unwrap_or(0),
    }
}

/// Encode a local wall-clock moment as the device's start timestamp.
fn start_timestamp<Tz: TimeZone>(timezone: &Tz, local: NaiveDateTime) -> i64 {
    encode(&localize(timezone, local))
}

/// The device does not interpret start timestamps as plain UTC: the POSIX
/// timestamp must additionally be shifted by the UTC offset of the local
/// moment (equivalent to reading the local calendar fields as if they were
/// UTC). Required quirk, not to be corrected.
fn encode<Tz: TimeZone>(moment: &DateTime<Tz>) -> i64 {
    moment.timestamp() + i64::from(moment.offset().fix().local_minus_utc())
}

/// Attach the timezone to a naive local moment. An ambiguous time (DST
/// fall-back) takes the earlier mapping; a nonexistent time (spring-forward
/// gap) retries one hour later.
fn localize<Tz: TimeZone>(timezone: &Tz, local: NaiveDateTime) -> DateTime<Tz> {
    match timezone.from_local_datetime(&local) {
        LocalResult::Single(moment) | LocalResult::Ambiguous(moment, _) => moment,
        LocalResult::None => match timezone.from_local_datetime(&(local + TimeDelta::hours(1))) {
            LocalResult::Single(moment) | LocalResult::Ambiguous(moment, _) => moment,
            LocalResult::None => timezone.from_utc_datetime(&local),
        },
    }
}

fn first_of_month(date: NaiveDate) -> NaiveDate {
    NaiveDate::from_ymd_opt(date.year(), date.month(), 1).unwrap_or(NaiveDate::MIN)
}

fn days_in_month(first: NaiveDate) -> u64 {
    let next_first = first
        .checked_add_months(Months::new(1))
        .unwrap_or(NaiveDate::MAX);
    u64::try_from(next_first.signed_duration_since(first).num_days()).unwrap_or(0)
}

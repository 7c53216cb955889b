//! Time utilities for clockwork
//!
//! Punch timestamps are stored in UTC by the HR database; reports bucket them
//! into calendar days of a fixed UTC offset. This module owns the conversions
//! between the two, plus the process clock.
//!
//! # Mock Time for Development
//!
//! In debug builds, the `CLOCKWORK_MOCK_TIME` environment variable overrides
//! the system time for presence snapshots and range presets.
//!
//! Format: `YYYY-MM-DD HH:MM:SS` (e.g., `2024-03-15 09:30:00`)

use chrono::{
    DateTime, Duration, FixedOffset, Local, NaiveDate, NaiveDateTime, NaiveTime, Offset,
    TimeZone, Utc,
};
use std::sync::OnceLock;

/// Environment variable name for mock time (debug builds only)
pub const MOCK_TIME_ENV_VAR: &str = "CLOCKWORK_MOCK_TIME";

/// Offset between mock time and real time at process start.
static MOCK_TIME_OFFSET: OnceLock<Option<Duration>> = OnceLock::new();

#[allow(clippy::disallowed_methods)] // wraps Local::now()
fn get_mock_time_offset() -> Option<Duration> {
    *MOCK_TIME_OFFSET.get_or_init(|| {
        #[cfg(debug_assertions)]
        {
            let raw = std::env::var(MOCK_TIME_ENV_VAR).ok()?;
            let Ok(naive) = NaiveDateTime::parse_from_str(&raw, "%Y-%m-%d %H:%M:%S") else {
                tracing::warn!(
                    mock_time = %raw,
                    expected_format = "%Y-%m-%d %H:%M:%S",
                    "Invalid mock time format"
                );
                return None;
            };
            let Some(mock) = Local.from_local_datetime(&naive).single() else {
                tracing::warn!(mock_time = %raw, "Mock time is ambiguous in the local timezone");
                return None;
            };
            let offset = mock.signed_duration_since(Local::now());
            tracing::info!(mock_time = %raw, offset_secs = offset.num_seconds(), "Mock time enabled");
            Some(offset)
        }
        #[cfg(not(debug_assertions))]
        {
            None
        }
    })
}

/// Returns whether mock time is currently active.
pub fn is_mock_time_active() -> bool {
    get_mock_time_offset().is_some()
}

/// Current local time, respecting `CLOCKWORK_MOCK_TIME` in debug builds.
#[allow(clippy::disallowed_methods)]
pub fn now() -> DateTime<Local> {
    let real_now = Local::now();
    match get_mock_time_offset() {
        Some(offset) => real_now + offset,
        None => real_now,
    }
}

/// The UTC offset of the host at this instant.
pub fn system_utc_offset() -> FixedOffset {
    now().offset().fix()
}

/// Parse a UTC offset written as `+HH:MM`, `-HH:MM`, `+HHMM`, `Z` or `UTC`.
pub fn parse_utc_offset(s: &str) -> Result<FixedOffset, String> {
    let s = s.trim();
    if s.eq_ignore_ascii_case("z") || s.eq_ignore_ascii_case("utc") {
        return Ok(Utc.fix());
    }

    let (sign, rest) = match s.as_bytes().first() {
        Some(b'+') => (1, &s[1..]),
        Some(b'-') => (-1, &s[1..]),
        _ => return Err(format!("offset '{}' must start with '+' or '-'", s)),
    };

    let digits: String = rest.chars().filter(|c| *c != ':').collect();
    if digits.len() != 4 || !digits.chars().all(|c| c.is_ascii_digit()) {
        return Err(format!("offset '{}' must look like +HH:MM", s));
    }

    let hours: i32 = digits[..2].parse().map_err(|_| "invalid hours".to_string())?;
    let minutes: i32 = digits[2..].parse().map_err(|_| "invalid minutes".to_string())?;
    if hours > 14 || minutes >= 60 {
        return Err(format!("offset '{}' is out of range", s));
    }

    FixedOffset::east_opt(sign * (hours * 3600 + minutes * 60))
        .ok_or_else(|| format!("offset '{}' is out of range", s))
}

/// Format an offset as `+HH:MM`.
pub fn format_utc_offset(offset: &FixedOffset) -> String {
    let secs = offset.local_minus_utc();
    let sign = if secs < 0 { '-' } else { '+' };
    let secs = secs.abs();
    format!("{}{:02}:{:02}", sign, secs / 3600, (secs % 3600) / 60)
}

/// UTC instants bounding the calendar days `[from, to]` in `zone`.
///
/// The upper bound is exclusive: the first instant of the day after `to`.
pub fn utc_bounds_for_days(
    from: NaiveDate,
    to: NaiveDate,
    zone: &FixedOffset,
) -> (DateTime<Utc>, DateTime<Utc>) {
    let start = start_of_day_utc(from, zone);
    let end = match to.succ_opt() {
        Some(next) => start_of_day_utc(next, zone),
        None => DateTime::<Utc>::MAX_UTC,
    };
    (start, end)
}

/// First UTC instant of `day` in `zone`.
pub fn start_of_day_utc(day: NaiveDate, zone: &FixedOffset) -> DateTime<Utc> {
    let local_midnight = day.and_time(NaiveTime::MIN);
    // A fixed offset never produces gaps or folds.
    Utc.from_utc_datetime(&(local_midnight - Duration::seconds(zone.local_minus_utc() as i64)))
}

/// Calendar day of a UTC instant as observed in `zone`.
pub fn local_day(ts: &DateTime<Utc>, zone: &FixedOffset) -> NaiveDate {
    ts.with_timezone(zone).date_naive()
}

/// Round a number of hours to two decimal places.
pub fn round_hours(hours: f64) -> f64 {
    (hours * 100.0).round() / 100.0
}

/// Helper to format decimal hours as `HH:MM`
pub fn format_hours(hours: f64) -> String {
    let total_minutes = (hours.max(0.0) * 60.0).round() as i64;
    format!("{:02}:{:02}", total_minutes / 60, total_minutes % 60)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ymd(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    #[test]
    fn test_parse_utc_offset() {
        assert_eq!(parse_utc_offset("+03:30").unwrap().local_minus_utc(), 12_600);
        assert_eq!(parse_utc_offset("-0500").unwrap().local_minus_utc(), -18_000);
        assert_eq!(parse_utc_offset("UTC").unwrap().local_minus_utc(), 0);
        assert_eq!(parse_utc_offset("Z").unwrap().local_minus_utc(), 0);

        assert!(parse_utc_offset("03:30").is_err());
        assert!(parse_utc_offset("+3:30").is_err());
        assert!(parse_utc_offset("+15:00").is_err());
        assert!(parse_utc_offset("+01:75").is_err());
    }

    #[test]
    fn test_format_utc_offset() {
        let tehran = FixedOffset::east_opt(12_600).unwrap();
        assert_eq!(format_utc_offset(&tehran), "+03:30");
        let ny = FixedOffset::west_opt(18_000).unwrap();
        assert_eq!(format_utc_offset(&ny), "-05:00");
    }

    #[test]
    fn test_utc_bounds_for_days() {
        let tehran = parse_utc_offset("+03:30").unwrap();
        let (start, end) = utc_bounds_for_days(ymd(2024, 3, 1), ymd(2024, 3, 2), &tehran);
        assert_eq!(start.to_rfc3339(), "2024-02-29T20:30:00+00:00");
        assert_eq!(end.to_rfc3339(), "2024-03-02T20:30:00+00:00");
    }

    #[test]
    fn test_local_day_crosses_midnight() {
        let tehran = parse_utc_offset("+03:30").unwrap();
        let ts = Utc.with_ymd_and_hms(2024, 3, 1, 21, 0, 0).unwrap();
        assert_eq!(local_day(&ts, &tehran), ymd(2024, 3, 2));
        assert_eq!(local_day(&ts, &Utc.fix()), ymd(2024, 3, 1));
    }

    #[test]
    fn test_round_and_format_hours() {
        assert_eq!(round_hours(8.0 + 1.0 / 3.0), 8.33);
        assert_eq!(format_hours(8.5), "08:30");
        assert_eq!(format_hours(0.0), "00:00");
        assert_eq!(format_hours(-1.0), "00:00");
    }

    #[test]
    fn test_mock_time_env_var_name() {
        assert_eq!(MOCK_TIME_ENV_VAR, "CLOCKWORK_MOCK_TIME");
    }

    #[test]
    fn test_now_returns_time() {
        let a = now();
        let b = now();
        assert!(b >= a);
    }
}

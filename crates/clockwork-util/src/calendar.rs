//! Solar (Jalali) calendar capability
//!
//! Clockwork keeps every date as a Gregorian `NaiveDate`. The solar form is a
//! display/input transform only, produced through the [`SolarCalendar`]
//! trait so the policy layer never depends on a concrete algorithm.

use chrono::{Datelike, NaiveDate};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::{ClockworkError, ClockworkResult};

/// A calendar day in the solar calendar
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct SolarDate {
    pub year: i32,
    pub month: u32,
    pub day: u32,
}

impl SolarDate {
    pub fn new(year: i32, month: u32, day: u32) -> Self {
        Self { year, month, day }
    }
}

impl fmt::Display for SolarDate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:04}-{:02}-{:02}", self.year, self.month, self.day)
    }
}

impl FromStr for SolarDate {
    type Err = ClockworkError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let parts: Vec<&str> = s.trim().split(['-', '/']).collect();
        if parts.len() != 3 {
            return Err(ClockworkError::calendar(format!(
                "expected YYYY-MM-DD, got '{}'",
                s
            )));
        }
        let bad = |what: &str| ClockworkError::calendar(format!("invalid {} in '{}'", what, s));
        let year = parts[0].parse().map_err(|_| bad("year"))?;
        let month = parts[1].parse().map_err(|_| bad("month"))?;
        let day = parts[2].parse().map_err(|_| bad("day"))?;
        Ok(Self { year, month, day })
    }
}

/// Conversion between Gregorian calendar days and a solar calendar
pub trait SolarCalendar: Send + Sync {
    /// Convert a Gregorian day to its solar representation
    fn to_solar(&self, date: NaiveDate) -> ClockworkResult<SolarDate>;

    /// Convert a solar day back to the Gregorian calendar
    fn from_solar(&self, date: SolarDate) -> ClockworkResult<NaiveDate>;

    /// Whether the solar year has a 30-day final month
    fn is_leap_year(&self, year: i32) -> ClockworkResult<bool>;

    /// Number of days in a solar month
    fn month_length(&self, year: i32, month: u32) -> ClockworkResult<u32> {
        match month {
            1..=6 => Ok(31),
            7..=11 => Ok(30),
            12 => Ok(if self.is_leap_year(year)? { 30 } else { 29 }),
            _ => Err(ClockworkError::calendar(format!("month {} out of range", month))),
        }
    }
}

/// Jalali (Persian) calendar using the 33-year break table.
///
/// Valid for solar years -61 through 3177.
#[derive(Debug, Clone, Copy, Default)]
pub struct Jalali;

/// Years at which the leap cycle pattern changes.
const BREAKS: [i32; 20] = [
    -61, 9, 38, 199, 426, 686, 756, 818, 1111, 1181, 1210, 1635, 2060, 2097, 2192, 2262, 2324,
    2394, 2456, 3178,
];

struct YearInfo {
    /// 0 means leap; 1..=4 is the position after the last leap year
    leap: i32,
    gregorian_year: i32,
    /// Day of March on which the solar year starts
    march_day: u32,
}

impl Jalali {
    fn year_info(year: i32) -> ClockworkResult<YearInfo> {
        let last = BREAKS[BREAKS.len() - 1];
        if year < BREAKS[0] || year >= last {
            return Err(ClockworkError::calendar(format!(
                "solar year {} outside supported era {}..{}",
                year, BREAKS[0], last
            )));
        }

        let gregorian_year = year + 621;
        let mut leap_j = -14;
        let mut jp = BREAKS[0];
        let mut jump = 0;
        for &jm in &BREAKS[1..] {
            jump = jm - jp;
            if year < jm {
                break;
            }
            leap_j += jump / 33 * 8 + (jump % 33) / 4;
            jp = jm;
        }

        let mut n = year - jp;
        leap_j += n / 33 * 8 + ((n % 33) + 3) / 4;
        if jump % 33 == 4 && jump - n == 4 {
            leap_j += 1;
        }

        let leap_g = gregorian_year / 4 - ((gregorian_year / 100) + 1) * 3 / 4 - 150;
        let march_day = (20 + leap_j - leap_g) as u32;

        if jump - n < 6 {
            n = n - jump + (jump + 4) / 33 * 33;
        }
        let mut leap = (((n + 1) % 33) - 1) % 4;
        if leap == -1 {
            leap = 4;
        }

        Ok(YearInfo {
            leap,
            gregorian_year,
            march_day,
        })
    }

    fn first_day(info: &YearInfo) -> ClockworkResult<NaiveDate> {
        NaiveDate::from_ymd_opt(info.gregorian_year, 3, info.march_day).ok_or_else(|| {
            ClockworkError::calendar(format!(
                "no Gregorian day {}-03-{}",
                info.gregorian_year, info.march_day
            ))
        })
    }
}

impl SolarCalendar for Jalali {
    fn to_solar(&self, date: NaiveDate) -> ClockworkResult<SolarDate> {
        let mut year = date.year() - 621;
        let info = Self::year_info(year)?;
        let mut k = (date - Self::first_day(&info)?).num_days() as i32;

        if k >= 0 {
            if k <= 185 {
                return Ok(SolarDate::new(year, 1 + (k / 31) as u32, (k % 31) as u32 + 1));
            }
            k -= 186;
        } else {
            year -= 1;
            k += 179;
            if info.leap == 1 {
                k += 1;
            }
        }

        Ok(SolarDate::new(year, 7 + (k / 30) as u32, (k % 30) as u32 + 1))
    }

    fn from_solar(&self, date: SolarDate) -> ClockworkResult<NaiveDate> {
        let length = self.month_length(date.year, date.month)?;
        if date.day == 0 || date.day > length {
            return Err(ClockworkError::calendar(format!(
                "day {} out of range for solar month {}-{:02}",
                date.day, date.year, date.month
            )));
        }

        let info = Self::year_info(date.year)?;
        let month = date.month as i64;
        let offset = (month - 1) * 31 - (month / 7) * (month - 7) + date.day as i64 - 1;
        Self::first_day(&info)?
            .checked_add_signed(chrono::Duration::days(offset))
            .ok_or_else(|| ClockworkError::calendar(format!("{} overflows", date)))
    }

    fn is_leap_year(&self, year: i32) -> ClockworkResult<bool> {
        Ok(Self::year_info(year)?.leap == 0)
    }
}

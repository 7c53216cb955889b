//! Date-range policy
//!
//! Resolves range presets into inclusive Gregorian day bounds. Solar dates
//! are accepted only as input and converted at this boundary.

use chrono::{Datelike, NaiveDate};
use clockwork_api::{CalendarKind, DateRange, DateRangeInput, RangePreset};
use clockwork_util::{ClockworkError, ClockworkResult, Jalali, SolarCalendar, SolarDate};
use std::sync::Arc;

/// Range resolution rules for one deployment
#[derive(Clone)]
pub struct CalendarPolicy {
    payroll_start_day: u32,
    solar: Arc<dyn SolarCalendar>,
}

impl CalendarPolicy {
    /// Policy with the given payroll cycle start day and the Jalali calendar.
    /// The start day is kept within 2..=28 so every month contains it.
    pub fn new(payroll_start_day: u32) -> Self {
        Self {
            payroll_start_day: payroll_start_day.clamp(2, 28),
            solar: Arc::new(Jalali),
        }
    }

    pub fn with_calendar(mut self, solar: Arc<dyn SolarCalendar>) -> Self {
        self.solar = solar;
        self
    }

    pub fn payroll_start_day(&self) -> u32 {
        self.payroll_start_day
    }

    /// Resolve a client range request against `reference` (today, usually)
    pub fn resolve_range(&self, input: &DateRangeInput, reference: NaiveDate) -> ClockworkResult<DateRange> {
        let custom = match input.preset {
            RangePreset::Custom => {
                let from = self.parse_bound("from", input.from.as_deref(), input.calendar)?;
                let to = self.parse_bound("to", input.to.as_deref(), input.calendar)?;
                Some((from, to))
            }
            _ => None,
        };
        self.resolve_preset(input.preset, custom, reference)
    }

    /// Resolve a preset with already-parsed Gregorian custom bounds
    pub fn resolve_preset(
        &self,
        preset: RangePreset,
        custom: Option<(NaiveDate, NaiveDate)>,
        reference: NaiveDate,
    ) -> ClockworkResult<DateRange> {
        match preset {
            RangePreset::Current => DateRange::new(month_day(reference, 0, 1)?, reference),
            RangePreset::Last => {
                let first = month_day(reference, -1, 1)?;
                let last = month_day(reference, 0, 1)?
                    .pred_opt()
                    .ok_or_else(|| ClockworkError::invalid_range("date out of range"))?;
                DateRange::new(first, last)
            }
            RangePreset::PayrollCycle => self.payroll_cycle(reference),
            RangePreset::Custom => {
                let (from, to) = custom.ok_or_else(|| {
                    ClockworkError::validation("custom range requires from and to")
                })?;
                DateRange::new(from, to)
            }
        }
    }

    /// The most recent completed payroll cycle as of `reference`.
    ///
    /// A cycle runs from the start day of one month through the day before
    /// the start day of the next. Once `reference` reaches the start day the
    /// cycle that just ended is returned; before it, the one ending last month.
    pub fn payroll_cycle(&self, reference: NaiveDate) -> ClockworkResult<DateRange> {
        let start = self.payroll_start_day;
        let end_offset = if reference.day() >= start { 0 } else { -1 };
        let from = month_day(reference, end_offset - 1, start)?;
        let to = month_day(reference, end_offset, start - 1)?;
        DateRange::new(from, to)
    }

    pub fn to_solar(&self, date: NaiveDate) -> ClockworkResult<SolarDate> {
        self.solar.to_solar(date)
    }

    pub fn from_solar(&self, date: SolarDate) -> ClockworkResult<NaiveDate> {
        self.solar.from_solar(date)
    }

    fn parse_bound(&self, name: &str, value: Option<&str>, calendar: CalendarKind) -> ClockworkResult<NaiveDate> {
        let value = value
            .map(str::trim)
            .filter(|v| !v.is_empty())
            .ok_or_else(|| ClockworkError::validation(format!("custom range requires '{}'", name)))?;

        match calendar {
            CalendarKind::Gregorian => NaiveDate::parse_from_str(value, "%Y-%m-%d").map_err(|e| {
                ClockworkError::validation(format!("'{}' is not a YYYY-MM-DD date: {}", value, e))
            }),
            CalendarKind::Solar => {
                let solar: SolarDate = value.parse()?;
                self.from_solar(solar)
            }
        }
    }
}

impl Default for CalendarPolicy {
    fn default() -> Self {
        Self::new(26)
    }
}

/// Day `day` of the month `months` away from the month of `reference`
fn month_day(reference: NaiveDate, months: i32, day: u32) -> ClockworkResult<NaiveDate> {
    let index = reference.year() * 12 + reference.month0() as i32 + months;
    let year = index.div_euclid(12);
    let month = index.rem_euclid(12) as u32 + 1;
    NaiveDate::from_ymd_opt(year, month, day)
        .ok_or_else(|| ClockworkError::invalid_range(format!("no day {} in {}-{:02}", day, year, month)))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ymd(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    fn range(from: NaiveDate, to: NaiveDate) -> DateRange {
        DateRange::new(from, to).unwrap()
    }

    #[test]
    fn current_is_month_to_date() {
        let policy = CalendarPolicy::default();
        let r = policy
            .resolve_range(&DateRangeInput::preset(RangePreset::Current), ymd(2024, 3, 15))
            .unwrap();
        assert_eq!(r, range(ymd(2024, 3, 1), ymd(2024, 3, 15)));
    }

    #[test]
    fn last_month_handles_leap_year() {
        let policy = CalendarPolicy::default();
        let r = policy
            .resolve_range(&DateRangeInput::preset(RangePreset::Last), ymd(2024, 3, 15))
            .unwrap();
        assert_eq!(r, range(ymd(2024, 2, 1), ymd(2024, 2, 29)));

        let r = policy
            .resolve_range(&DateRangeInput::preset(RangePreset::Last), ymd(2024, 1, 3))
            .unwrap();
        assert_eq!(r, range(ymd(2023, 12, 1), ymd(2023, 12, 31)));
    }

    #[test]
    fn payroll_cycle_before_start_day() {
        let policy = CalendarPolicy::default();
        let r = policy
            .resolve_range(&DateRangeInput::preset(RangePreset::PayrollCycle), ymd(2024, 3, 10))
            .unwrap();
        assert_eq!(r, range(ymd(2024, 1, 26), ymd(2024, 2, 25)));
    }

    #[test]
    fn payroll_cycle_on_and_after_start_day() {
        let policy = CalendarPolicy::default();
        assert_eq!(
            policy.payroll_cycle(ymd(2024, 3, 26)).unwrap(),
            range(ymd(2024, 2, 26), ymd(2024, 3, 25))
        );
        assert_eq!(
            policy.payroll_cycle(ymd(2024, 3, 31)).unwrap(),
            range(ymd(2024, 2, 26), ymd(2024, 3, 25))
        );
        assert_eq!(
            policy.payroll_cycle(ymd(2024, 1, 5)).unwrap(),
            range(ymd(2023, 11, 26), ymd(2023, 12, 25))
        );
    }

    #[test]
    fn payroll_cycle_configurable_start() {
        let policy = CalendarPolicy::new(21);
        assert_eq!(
            policy.payroll_cycle(ymd(2024, 3, 10)).unwrap(),
            range(ymd(2024, 1, 21), ymd(2024, 2, 20))
        );
        assert_eq!(CalendarPolicy::new(31).payroll_start_day(), 28);
    }

    #[test]
    fn custom_range_rejects_inverted_bounds() {
        let policy = CalendarPolicy::default();
        let result = policy.resolve_range(&DateRangeInput::custom("2024-03-10", "2024-03-05"), ymd(2024, 3, 15));
        assert!(matches!(result, Err(ClockworkError::InvalidRange(_))));
    }

    #[test]
    fn custom_range_passes_through() {
        let policy = CalendarPolicy::default();
        let r = policy
            .resolve_range(&DateRangeInput::custom("2024-03-05", "2024-03-10"), ymd(2020, 1, 1))
            .unwrap();
        assert_eq!(r, range(ymd(2024, 3, 5), ymd(2024, 3, 10)));
    }

    #[test]
    fn custom_range_requires_bounds() {
        let policy = CalendarPolicy::default();
        let input = DateRangeInput {
            to: None,
            ..DateRangeInput::custom("2024-03-05", "x")
        };
        assert!(matches!(
            policy.resolve_range(&input, ymd(2024, 3, 15)),
            Err(ClockworkError::Validation(_))
        ));
        assert!(matches!(
            policy.resolve_range(&DateRangeInput::custom("03/05/2024", "2024-03-10"), ymd(2024, 3, 15)),
            Err(ClockworkError::Validation(_))
        ));
    }

    #[test]
    fn solar_custom_range() {
        let policy = CalendarPolicy::default();
        let input = DateRangeInput::custom("1402-12-01", "1402-12-29").in_calendar(CalendarKind::Solar);
        let r = policy.resolve_range(&input, ymd(2024, 3, 15)).unwrap();
        assert_eq!(r, range(ymd(2024, 2, 20), ymd(2024, 3, 19)));

        let bad = DateRangeInput::custom("1402-12-30", "1402-12-30").in_calendar(CalendarKind::Solar);
        assert!(matches!(
            policy.resolve_range(&bad, ymd(2024, 3, 15)),
            Err(ClockworkError::Calendar(_))
        ));
    }

    #[test]
    fn solar_round_trip_across_leap_years() {
        let policy = CalendarPolicy::default();
        // 2020-02-29 (Gregorian leap day) through 2025-03-21 (after solar leap year 1403)
        let mut day = ymd(2020, 2, 1);
        while day <= ymd(2025, 4, 1) {
            let solar = policy.to_solar(day).unwrap();
            assert_eq!(policy.from_solar(solar).unwrap(), day, "{} -> {}", day, solar);
            day = day.succ_opt().unwrap();
        }
        assert_eq!(policy.to_solar(ymd(2025, 3, 20)).unwrap(), SolarDate::new(1403, 12, 30));
    }
}

//! Report engine
//!
//! Turns raw punches into one row per matched (or unmatched) in/out pair.
//! Pure and synchronous: the caller fetches the punches and the directory.

use chrono::{DateTime, FixedOffset, NaiveDate, NaiveTime, Utc};
use clockwork_api::{
    DateRange, PunchDirection, PunchRecord, ReportPayload, ReportRow, ReportTotals, UserSummary,
};
use clockwork_util::{local_day, round_hours, UserId};
use std::collections::{BTreeMap, HashMap, HashSet};

/// Build the normalized report for `range`.
///
/// Punches outside `range` (by local day in `zone`) are ignored. Users
/// without punches get no rows.
pub fn build_report(
    punches: &[PunchRecord],
    directory: &[UserSummary],
    range: DateRange,
    zone: &FixedOffset,
) -> ReportPayload {
    let names: HashMap<UserId, &UserSummary> = directory.iter().map(|u| (u.user_id, u)).collect();

    let mut groups: BTreeMap<(UserId, NaiveDate), Vec<&PunchRecord>> = BTreeMap::new();
    for punch in punches {
        let day = local_day(&punch.timestamp_utc, zone);
        if range.contains(day) {
            groups.entry((punch.user_id, day)).or_default().push(punch);
        }
    }

    let mut rows = Vec::new();
    for ((user_id, date), mut group) in groups {
        // In sorts before Out on equal instants
        group.sort_by_key(|p| (p.timestamp_utc, p.direction));

        let (username, full_name) = match names.get(&user_id) {
            Some(user) => (user.username.clone(), user.full_name.clone()),
            None => (group[0].username.clone(), group[0].full_name.clone()),
        };
        let row = |check_in: Option<DateTime<Utc>>, check_out: Option<DateTime<Utc>>| ReportRow {
            user_id,
            username: username.clone(),
            full_name: full_name.clone(),
            date,
            check_in: check_in.map(|t| local_time(&t, zone)),
            check_out: check_out.map(|t| local_time(&t, zone)),
            hours: match (check_in, check_out) {
                (Some(start), Some(end)) => pair_hours(start, end),
                _ => 0.0,
            },
        };

        let mut open: Option<DateTime<Utc>> = None;
        for punch in group {
            match punch.direction {
                PunchDirection::In => {
                    if let Some(dangling) = open.replace(punch.timestamp_utc) {
                        rows.push(row(Some(dangling), None));
                    }
                }
                PunchDirection::Out => {
                    rows.push(row(open.take(), Some(punch.timestamp_utc)));
                }
            }
        }
        if let Some(dangling) = open {
            rows.push(row(Some(dangling), None));
        }
    }

    rows.sort_by(|a, b| {
        a.date
            .cmp(&b.date)
            .then_with(|| a.username.cmp(&b.username))
            .then_with(|| a.check_in.or(a.check_out).cmp(&b.check_in.or(b.check_out)))
            .then_with(|| a.user_id.cmp(&b.user_id))
    });

    let totals = totals_of(&rows);
    ReportPayload {
        rows,
        totals,
        date_range: range,
    }
}

/// Totals derived from the rows alone
pub fn totals_of(rows: &[ReportRow]) -> ReportTotals {
    ReportTotals {
        hours: round_hours(rows.iter().map(|r| r.hours).sum()),
        records: rows.len(),
        users: rows.iter().map(|r| r.user_id).collect::<HashSet<_>>().len(),
    }
}

/// Decimal hours between two instants, never negative
fn pair_hours(start: DateTime<Utc>, end: DateTime<Utc>) -> f64 {
    let millis = (end - start).num_milliseconds().max(0);
    round_hours(millis as f64 / 3_600_000.0)
}

fn local_time(ts: &DateTime<Utc>, zone: &FixedOffset) -> NaiveTime {
    ts.with_timezone(zone).time()
}

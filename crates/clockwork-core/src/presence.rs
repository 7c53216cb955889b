//! Presence engine

use chrono::{DateTime, FixedOffset, NaiveDate, Utc};
use clockwork_api::{PresenceEntry, PunchDirection, PunchRecord};
use clockwork_util::{local_day, start_of_day_utc, ClockworkError, ClockworkResult, UserId};
use std::collections::HashMap;

/// Users whose latest punch before `as_of` is a check-in.
///
/// `latest` may hold more than one punch per user (ties on the latest
/// instant); an `out` at the same instant wins. Longest-present first.
pub fn current_presence(latest: &[PunchRecord], as_of: DateTime<Utc>) -> Vec<PresenceEntry> {
    let mut last: HashMap<UserId, &PunchRecord> = HashMap::new();
    for punch in latest.iter().filter(|p| p.timestamp_utc < as_of) {
        last.entry(punch.user_id)
            .and_modify(|current| {
                if (punch.timestamp_utc, punch.direction) > (current.timestamp_utc, current.direction) {
                    *current = punch;
                }
            })
            .or_insert(punch);
    }

    let mut entries: Vec<PresenceEntry> = last
        .into_values()
        .filter(|p| p.direction == PunchDirection::In)
        .map(|p| PresenceEntry {
            user_id: p.user_id,
            username: p.username.clone(),
            full_name: p.full_name.clone(),
            check_in_timestamp: p.timestamp_utc,
        })
        .collect();
    entries.sort_by(|a, b| {
        a.check_in_timestamp
            .cmp(&b.check_in_timestamp)
            .then_with(|| a.user_id.cmp(&b.user_id))
    });
    entries
}

/// The instant presence is evaluated at for a requested local day.
///
/// No date or today means `now`; a past day means the end of that day.
pub fn presence_as_of(
    date: Option<NaiveDate>,
    now: DateTime<Utc>,
    zone: &FixedOffset,
) -> ClockworkResult<DateTime<Utc>> {
    let Some(date) = date else {
        return Ok(now);
    };
    let today = local_day(&now, zone);
    if date > today {
        return Err(ClockworkError::invalid_range(format!(
            "presence date {} is in the future",
            date
        )));
    }
    if date == today {
        return Ok(now);
    }
    let next = date
        .succ_opt()
        .ok_or_else(|| ClockworkError::invalid_range(format!("date {} out of range", date)))?;
    Ok(start_of_day_utc(next, zone))
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use PunchDirection::{In, Out};

    fn at(h: u32, m: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 3, 4, h, m, 0).unwrap()
    }

    fn punch(user: i64, ts: DateTime<Utc>, direction: PunchDirection) -> PunchRecord {
        PunchRecord {
            user_id: UserId::new(user),
            username: format!("user{}", user),
            full_name: format!("User {}", user),
            timestamp_utc: ts,
            direction,
        }
    }

    #[test]
    fn present_users_ordered_longest_first() {
        let latest = vec![
            punch(1, at(9, 0), In),
            punch(2, at(8, 0), In),
            punch(3, at(10, 0), Out),
        ];
        let entries = current_presence(&latest, at(12, 0));

        let ids: Vec<_> = entries.iter().map(|e| e.user_id.get()).collect();
        assert_eq!(ids, vec![2, 1]);
        assert_eq!(entries[0].check_in_timestamp, at(8, 0));
    }

    #[test]
    fn later_check_out_clears_presence() {
        let latest = vec![punch(1, at(8, 0), In), punch(1, at(12, 0), Out)];
        assert!(current_presence(&latest, at(13, 0)).is_empty());

        // The check-out has not happened yet at 11:00
        let entries = current_presence(&latest, at(11, 0));
        assert_eq!(entries.len(), 1);
    }

    #[test]
    fn ties_resolve_to_out() {
        let latest = vec![punch(1, at(9, 0), In), punch(1, at(9, 0), Out)];
        assert!(current_presence(&latest, at(10, 0)).is_empty());

        let reversed = vec![punch(1, at(9, 0), Out), punch(1, at(9, 0), In)];
        assert!(current_presence(&reversed, at(10, 0)).is_empty());
    }

    #[test]
    fn punch_at_as_of_is_excluded() {
        let latest = vec![punch(1, at(9, 0), In)];
        assert!(current_presence(&latest, at(9, 0)).is_empty());
    }

    #[test]
    fn as_of_for_dates() {
        let zone = FixedOffset::east_opt(3 * 3600 + 1800).unwrap();
        let now = at(10, 0);

        assert_eq!(presence_as_of(None, now, &zone).unwrap(), now);

        let today = NaiveDate::from_ymd_opt(2024, 3, 4).unwrap();
        assert_eq!(presence_as_of(Some(today), now, &zone).unwrap(), now);

        // End of March 1st at +03:30 is 20:30 UTC that day
        let past = NaiveDate::from_ymd_opt(2024, 3, 1).unwrap();
        assert_eq!(
            presence_as_of(Some(past), now, &zone).unwrap(),
            Utc.with_ymd_and_hms(2024, 3, 1, 20, 30, 0).unwrap()
        );

        let future = NaiveDate::from_ymd_opt(2024, 3, 5).unwrap();
        assert!(matches!(
            presence_as_of(Some(future), now, &zone),
            Err(ClockworkError::InvalidRange(_))
        ));
    }
}

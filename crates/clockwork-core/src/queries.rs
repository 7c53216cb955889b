//! Engine-agnostic attendance queries

use chrono::{DateTime, FixedOffset, NaiveDate, Utc};
use clockwork_api::{DateRange, PunchRecord, Settings, UserSummary};
use clockwork_engine::QuerySpec;
use clockwork_util::{local_day, utc_bounds_for_days, ClockworkError, ClockworkResult, UserId};
use std::collections::BTreeSet;
use std::sync::Arc;
use std::time::Duration;
use tracing::debug;

use crate::ConnectionManager;

/// Per-request parameters taken from the current settings
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct QueryContext {
    /// Offset whose calendar days define report days
    pub zone: FixedOffset,
    pub timeout: Duration,
}

impl QueryContext {
    pub fn from_settings(settings: &Settings) -> ClockworkResult<Self> {
        Ok(Self {
            zone: settings.zone()?,
            timeout: settings.query_timeout(),
        })
    }
}

pub struct AttendanceQueries {
    manager: Arc<ConnectionManager>,
}

impl AttendanceQueries {
    pub fn new(manager: Arc<ConnectionManager>) -> Self {
        Self { manager }
    }

    pub fn manager(&self) -> &Arc<ConnectionManager> {
        &self.manager
    }

    /// Punches of `user_ids` whose local calendar day lies in `[from, to]`.
    ///
    /// Fails with `EmptySelection` or `InvalidRange` before any I/O.
    pub async fn fetch_punches(
        &self,
        user_ids: &[UserId],
        from: NaiveDate,
        to: NaiveDate,
        ctx: &QueryContext,
    ) -> ClockworkResult<Vec<PunchRecord>> {
        if user_ids.is_empty() {
            return Err(ClockworkError::EmptySelection);
        }
        let range = DateRange::new(from, to)?;

        let wanted: BTreeSet<UserId> = user_ids.iter().copied().collect();
        let (start_utc, end_utc) = utc_bounds_for_days(range.from, range.to, &ctx.zone);
        let spec = QuerySpec::Punches {
            user_ids: wanted.iter().copied().collect(),
            start_utc,
            end_utc,
        };

        let rows = self.manager.query(&spec, ctx.timeout).await?.into_punches()?;
        let fetched = rows.len();

        // The engine filtered on instants; re-check on local days and ids
        let punches: Vec<PunchRecord> = rows
            .into_iter()
            .filter(|p| wanted.contains(&p.user_id))
            .filter(|p| range.contains(local_day(&p.timestamp_utc, &ctx.zone)))
            .collect();

        debug!(
            users = wanted.len(),
            from = %range.from,
            to = %range.to,
            fetched,
            kept = punches.len(),
            "Fetched punches"
        );
        Ok(punches)
    }

    /// Each user's most recent punch strictly before `as_of`
    pub async fn latest_punches(
        &self,
        as_of: DateTime<Utc>,
        ctx: &QueryContext,
    ) -> ClockworkResult<Vec<PunchRecord>> {
        let spec = QuerySpec::LatestPunches { before_utc: as_of };
        let rows = self.manager.query(&spec, ctx.timeout).await?.into_punches()?;
        Ok(rows.into_iter().filter(|p| p.timestamp_utc < as_of).collect())
    }

    /// Directory search on username or full name, ordered by username
    pub async fn list_users(
        &self,
        search: Option<&str>,
        limit: u32,
        offset: u32,
        ctx: &QueryContext,
    ) -> ClockworkResult<Vec<UserSummary>> {
        let spec = QuerySpec::Users {
            search: search.map(str::to_string),
            limit,
            offset,
        };
        Ok(self.manager.query(&spec, ctx.timeout).await?.into_users()?)
    }

    /// Directory entries for exactly these users
    pub async fn users_by_id(
        &self,
        user_ids: &[UserId],
        ctx: &QueryContext,
    ) -> ClockworkResult<Vec<UserSummary>> {
        let wanted: BTreeSet<UserId> = user_ids.iter().copied().collect();
        let mut found = Vec::new();
        let mut offset = 0;
        const PAGE: u32 = 500;

        loop {
            let page = self.list_users(None, PAGE, offset, ctx).await?;
            let done = page.len() < PAGE as usize;
            found.extend(page.into_iter().filter(|u| wanted.contains(&u.user_id)));
            if done || found.len() == wanted.len() {
                break;
            }
            offset += PAGE;
        }
        Ok(found)
    }
}

//! Canonical query shapes shared by every engine

use chrono::{DateTime, NaiveDateTime, Utc};
use clockwork_api::{PunchDirection, PunchRecord, UserSummary};
use clockwork_util::UserId;

use crate::{EngineError, EngineResult};

/// An engine-independent description of what to read
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum QuerySpec {
    /// Punches of the given users with `start_utc <= t < end_utc`
    Punches {
        user_ids: Vec<UserId>,
        start_utc: DateTime<Utc>,
        end_utc: DateTime<Utc>,
    },

    /// Each user's latest punch strictly before `before_utc`; ties on the
    /// same instant return every tied row
    LatestPunches { before_utc: DateTime<Utc> },

    /// Directory page, ordered by username
    Users {
        search: Option<String>,
        limit: u32,
        offset: u32,
    },
}

impl QuerySpec {
    pub(crate) fn shape(&self) -> RowShape {
        match self {
            Self::Punches { .. } | Self::LatestPunches { .. } => RowShape::Punch,
            Self::Users { .. } => RowShape::User,
        }
    }
}

/// Column layout of a rendered query's result set
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum RowShape {
    /// user_id, username, full_name, punched_at, direction
    Punch,
    /// user_id, username, full_name
    User,
}

/// Rows returned by [`QuerySpec`], shaped by its variant
#[derive(Debug, Clone, PartialEq)]
pub enum QueryRows {
    Punches(Vec<PunchRecord>),
    Users(Vec<UserSummary>),
}

impl QueryRows {
    pub fn len(&self) -> usize {
        match self {
            Self::Punches(rows) => rows.len(),
            Self::Users(rows) => rows.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn into_punches(self) -> EngineResult<Vec<PunchRecord>> {
        match self {
            Self::Punches(rows) => Ok(rows),
            Self::Users(_) => Err(EngineError::Query("expected punch rows".into())),
        }
    }

    pub fn into_users(self) -> EngineResult<Vec<UserSummary>> {
        match self {
            Self::Users(rows) => Ok(rows),
            Self::Punches(_) => Err(EngineError::Query("expected user rows".into())),
        }
    }
}

/// A bind parameter
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SqlParam {
    Int(i64),
    Text(String),
    /// UTC wall time, compared against naive UTC columns
    Timestamp(NaiveDateTime),
}

/// A punch row as read from any engine, before direction decoding
#[derive(Debug, Clone)]
pub(crate) struct RawPunch {
    pub user_id: i64,
    pub username: Option<String>,
    pub full_name: Option<String>,
    pub punched_at: NaiveDateTime,
    pub direction: String,
}

impl RawPunch {
    pub(crate) fn into_record(self) -> EngineResult<PunchRecord> {
        let direction = PunchDirection::from_label(&self.direction).ok_or_else(|| {
            EngineError::Query(format!(
                "unknown punch direction '{}' for user {}",
                self.direction, self.user_id
            ))
        })?;

        Ok(PunchRecord {
            user_id: UserId::new(self.user_id),
            username: self.username.unwrap_or_default(),
            full_name: self.full_name.unwrap_or_default(),
            timestamp_utc: self.punched_at.and_utc(),
            direction,
        })
    }
}

/// Decode every raw row, failing the whole batch on the first bad one
pub(crate) fn decode_punches(rows: Vec<RawPunch>) -> EngineResult<Vec<PunchRecord>> {
    rows.into_iter().map(RawPunch::into_record).collect()
}

pub(crate) fn user_summary(id: i64, username: Option<String>, full_name: Option<String>) -> UserSummary {
    UserSummary {
        user_id: UserId::new(id),
        username: username.unwrap_or_default(),
        full_name: full_name.unwrap_or_default(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    fn raw(direction: &str) -> RawPunch {
        RawPunch {
            user_id: 4,
            username: Some("sara".into()),
            full_name: None,
            punched_at: NaiveDate::from_ymd_opt(2024, 3, 1)
                .unwrap()
                .and_hms_opt(5, 30, 0)
                .unwrap(),
            direction: direction.into(),
        }
    }

    #[test]
    fn decodes_known_directions() {
        let rows = decode_punches(vec![raw("IN"), raw("out")]).unwrap();
        assert_eq!(rows[0].direction, PunchDirection::In);
        assert_eq!(rows[1].direction, PunchDirection::Out);
        assert_eq!(rows[0].full_name, "");
        assert_eq!(rows[0].timestamp_utc.to_rfc3339(), "2024-03-01T05:30:00+00:00");
    }

    #[test]
    fn unknown_direction_fails_batch() {
        let result = decode_punches(vec![raw("in"), raw("break")]);
        assert!(matches!(result, Err(EngineError::Query(msg)) if msg.contains("break")));
    }
}

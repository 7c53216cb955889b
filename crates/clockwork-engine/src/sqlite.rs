//! SQLite driver (rusqlite on the blocking pool)

use chrono::{DateTime, NaiveDateTime, Timelike};
use rusqlite::types::{Value, ValueRef};
use rusqlite::{params_from_iter, Connection, InterruptHandle, OpenFlags, Row};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;
use tracing::debug;

use crate::query::{decode_punches, user_summary, RawPunch, RowShape};
use crate::{EngineError, EngineResult, QueryRows, RenderedQuery, SqlParam};

const BUSY_TIMEOUT: Duration = Duration::from_secs(5);

/// Read-only handle on an SQLite attendance database
pub struct SqliteDriver {
    path: PathBuf,
    conn: Arc<Mutex<Option<Connection>>>,
    interrupt: InterruptHandle,
}

impl SqliteDriver {
    /// Open an existing database file. Blocking.
    pub fn open(path: &Path) -> EngineResult<Self> {
        if !path.is_file() {
            return Err(EngineError::Connection(format!(
                "sqlite file not found: {}",
                path.display()
            )));
        }

        let flags = OpenFlags::SQLITE_OPEN_READ_ONLY
            | OpenFlags::SQLITE_OPEN_URI
            | OpenFlags::SQLITE_OPEN_NO_MUTEX;
        let conn = Connection::open_with_flags(path, flags)
            .map_err(|e| EngineError::Connection(e.to_string()))?;
        conn.busy_timeout(BUSY_TIMEOUT)
            .map_err(|e| EngineError::Connection(e.to_string()))?;

        // Opening is lazy; touch the header so non-database files fail here
        conn.query_row("SELECT COUNT(*) FROM sqlite_master", [], |row| row.get::<_, i64>(0))
            .map_err(|e| EngineError::Connection(format!("{}: {}", path.display(), e)))?;

        let interrupt = conn.get_interrupt_handle();
        debug!(path = %path.display(), "SQLite database opened");

        Ok(Self {
            path: path.to_path_buf(),
            conn: Arc::new(Mutex::new(Some(conn))),
            interrupt,
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub async fn ping(&self, timeout: Duration) -> EngineResult<()> {
        self.with_conn(timeout, |conn| {
            conn.query_row("SELECT 1", [], |row| row.get::<_, i64>(0))
                .map_err(|e| EngineError::Connection(e.to_string()))?;
            Ok(())
        })
        .await
    }

    pub(crate) async fn query(
        &self,
        rendered: RenderedQuery,
        shape: RowShape,
        timeout: Duration,
    ) -> EngineResult<QueryRows> {
        self.with_conn(timeout, move |conn| {
            let params: Vec<Value> = rendered.params.iter().map(to_value).collect();
            let mut stmt = conn.prepare(&rendered.sql)?;
            let mut rows = stmt.query(params_from_iter(params))?;

            match shape {
                RowShape::Punch => {
                    let mut raw = Vec::new();
                    while let Some(row) = rows.next()? {
                        raw.push(raw_punch(row)?);
                    }
                    Ok(QueryRows::Punches(decode_punches(raw)?))
                }
                RowShape::User => {
                    let mut users = Vec::new();
                    while let Some(row) = rows.next()? {
                        users.push(user_summary(row.get(0)?, row.get(1)?, row.get(2)?));
                    }
                    Ok(QueryRows::Users(users))
                }
            }
        })
        .await
    }

    /// Drop the connection. Safe to call more than once.
    pub async fn close(&self) {
        self.interrupt.interrupt();
        let conn = Arc::clone(&self.conn);
        let closed = tokio::task::spawn_blocking(move || {
            if let Ok(mut guard) = conn.lock() {
                guard.take();
            }
        })
        .await;

        if closed.is_err() {
            debug!(path = %self.path.display(), "SQLite close task did not complete");
        }
    }

    /// Run `f` on the blocking pool with the connection locked.
    ///
    /// On timeout a call still waiting for the lock is abandoned and never
    /// runs. Only a call that holds the lock is interrupted, so the abort
    /// cannot land on another request's statement.
    async fn with_conn<T, F>(&self, timeout: Duration, f: F) -> EngineResult<T>
    where
        T: Send + 'static,
        F: FnOnce(&Connection) -> EngineResult<T> + Send + 'static,
    {
        let conn = Arc::clone(&self.conn);
        let state = Arc::new(Mutex::new(CallState::Queued));
        let worker_state = Arc::clone(&state);

        let task = tokio::task::spawn_blocking(move || {
            let guard = conn
                .lock()
                .map_err(|_| EngineError::Query("sqlite handle lock poisoned".into()))?;
            if !CallState::advance(&worker_state, CallState::Queued, CallState::Running) {
                return Err(EngineError::Timeout(timeout));
            }
            let result = match guard.as_ref() {
                Some(conn) => f(conn),
                None => Err(EngineError::Closed),
            };
            // Still holding the connection: an interrupt decided before
            // this point can only hit our own statement
            CallState::advance(&worker_state, CallState::Running, CallState::Finished);
            result
        });

        match tokio::time::timeout(timeout, task).await {
            Ok(joined) => {
                joined.map_err(|e| EngineError::Query(format!("sqlite worker failed: {}", e)))?
            }
            Err(_) => {
                let mut current = CallState::lock(&state);
                match *current {
                    CallState::Queued => *current = CallState::Abandoned,
                    CallState::Running => {
                        self.interrupt.interrupt();
                        debug!(path = %self.path.display(), ?timeout, "Interrupted timed-out statement");
                    }
                    CallState::Finished | CallState::Abandoned => {}
                }
                Err(EngineError::Timeout(timeout))
            }
        }
    }
}

/// Where one call stands relative to the connection lock
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum CallState {
    Queued,
    Running,
    Finished,
    Abandoned,
}

impl CallState {
    fn lock(state: &Mutex<CallState>) -> MutexGuard<'_, CallState> {
        state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Move `from` to `to`; false if the call was somewhere else
    fn advance(state: &Mutex<CallState>, from: CallState, to: CallState) -> bool {
        let mut current = Self::lock(state);
        if *current == from {
            *current = to;
            true
        } else {
            false
        }
    }
}

fn to_value(param: &SqlParam) -> Value {
    match param {
        SqlParam::Int(v) => Value::Integer(*v),
        SqlParam::Text(s) => Value::Text(s.clone()),
        SqlParam::Timestamp(t) => Value::Text(bind_timestamp(t)),
    }
}

/// Bound timestamps are compared through `julianday`, which reads three
/// fractional digits. Sub-millisecond bounds are rounded up so a punch
/// stored at the same millisecond still sorts before them.
fn bind_timestamp(t: &NaiveDateTime) -> String {
    let sub_ms = t.nanosecond() % 1_000_000;
    let t = if sub_ms == 0 {
        *t
    } else {
        *t + chrono::Duration::nanoseconds(i64::from(1_000_000 - sub_ms))
    };
    t.format("%Y-%m-%d %H:%M:%S%.3f").to_string()
}

fn raw_punch(row: &Row<'_>) -> EngineResult<RawPunch> {
    let punched_at = match row.get_ref(3)? {
        ValueRef::Text(bytes) => {
            let text = String::from_utf8_lossy(bytes);
            parse_timestamp(&text)
                .ok_or_else(|| EngineError::Query(format!("unrecognized timestamp '{}'", text)))?
        }
        other => {
            return Err(EngineError::Query(format!(
                "expected a text timestamp, found {:?}",
                other.data_type()
            )));
        }
    };

    Ok(RawPunch {
        user_id: row.get(0)?,
        username: row.get(1)?,
        full_name: row.get(2)?,
        punched_at,
        direction: row.get::<_, Option<String>>(4)?.unwrap_or_default(),
    })
}

/// Parse a stored timestamp as naive UTC. Offsets, when present, are
/// folded into UTC.
pub(crate) fn parse_timestamp(s: &str) -> Option<NaiveDateTime> {
    let s = s.trim();
    if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
        return Some(dt.naive_utc());
    }
    if let Ok(dt) = DateTime::parse_from_str(s, "%Y-%m-%d %H:%M:%S%.f%:z") {
        return Some(dt.naive_utc());
    }
    ["%Y-%m-%d %H:%M:%S%.f", "%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%d %H:%M"]
        .iter()
        .find_map(|fmt| NaiveDateTime::parse_from_str(s, fmt).ok())
}

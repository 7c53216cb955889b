//! Engine dispatch
//!
//! One tagged variant per engine, each exposing the same
//! connect/ping/query/close capability set. The handle adds the pieces
//! shared by every engine: the dialect, the source schema, timeouts and the
//! closed flag.

use clockwork_api::{Connection, EngineKind, SourceSchema};
use std::future::Future;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::{Duration, Instant};
use tracing::{debug, info, warn};

use crate::mysql::MySqlDriver;
use crate::postgres::PostgresDriver;
use crate::sqlite::SqliteDriver;
use crate::{Dialect, EngineError, EngineResult, QueryRows, QuerySpec};

pub enum EngineDriver {
    /// MySQL and MariaDB share a wire protocol
    MySql(MySqlDriver),
    Postgres(PostgresDriver),
    Sqlite(SqliteDriver),
}

/// A live connection to one HR database
pub struct EngineHandle {
    kind: EngineKind,
    dialect: Dialect,
    schema: SourceSchema,
    driver: EngineDriver,
    closed: AtomicBool,
    target: String,
}

impl EngineHandle {
    /// Open a connection for an already-validated `kind`
    pub async fn connect(
        kind: EngineKind,
        conn: &Connection,
        schema: SourceSchema,
        timeout: Duration,
    ) -> EngineResult<Self> {
        let target = conn.describe();
        debug!(engine = %kind, target = %target, "Connecting");

        let driver = match kind {
            EngineKind::Mysql | EngineKind::Mariadb => {
                let port = conn.effective_port(kind).unwrap_or(3306);
                EngineDriver::MySql(
                    with_timeout(timeout, MySqlDriver::connect(conn, port, timeout)).await?,
                )
            }
            EngineKind::Postgres => {
                let port = conn.effective_port(kind).unwrap_or(5432);
                EngineDriver::Postgres(
                    with_timeout(timeout, PostgresDriver::connect(conn, port, timeout)).await?,
                )
            }
            EngineKind::Sqlite => {
                let path = conn
                    .sqlite_path
                    .clone()
                    .ok_or_else(|| EngineError::Connection("sqlite requires sqlite_path".into()))?;
                let open = async {
                    tokio::task::spawn_blocking(move || SqliteDriver::open(&path))
                        .await
                        .map_err(|e| EngineError::Connection(format!("sqlite open task failed: {}", e)))?
                };
                EngineDriver::Sqlite(with_timeout(timeout, open).await?)
            }
        };

        info!(engine = %kind, target = %target, "Connected");

        Ok(Self {
            kind,
            dialect: Dialect::for_engine(kind),
            schema,
            driver,
            closed: AtomicBool::new(false),
            target,
        })
    }

    pub fn kind(&self) -> EngineKind {
        self.kind
    }

    pub fn target(&self) -> &str {
        &self.target
    }

    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::SeqCst)
    }

    /// Round-trip a trivial statement and report its latency
    pub async fn ping(&self, timeout: Duration) -> EngineResult<Duration> {
        self.ensure_open()?;
        let started = Instant::now();

        let result = match &self.driver {
            EngineDriver::MySql(d) => with_timeout(timeout, d.ping()).await,
            EngineDriver::Postgres(d) => with_timeout(timeout, d.ping()).await,
            EngineDriver::Sqlite(d) => d.ping(timeout).await,
        };

        // A close that raced the ping wins
        self.ensure_open()?;
        result.map_err(|e| match e {
            EngineError::Query(msg) => EngineError::Connection(msg),
            other => other,
        })?;

        Ok(started.elapsed())
    }

    /// Render and run a canonical query
    pub async fn query(&self, spec: &QuerySpec, timeout: Duration) -> EngineResult<QueryRows> {
        self.ensure_open()?;

        if let QuerySpec::Punches { user_ids, .. } = spec
            && user_ids.is_empty()
        {
            return Ok(QueryRows::Punches(Vec::new()));
        }

        let rendered = self.dialect.render(spec, &self.schema);
        let shape = spec.shape();
        debug!(engine = %self.kind, sql = %rendered.sql, params = rendered.params.len(), "Running query");

        let started = Instant::now();
        let result = match &self.driver {
            EngineDriver::MySql(d) => with_timeout(timeout, d.query(rendered, shape)).await,
            EngineDriver::Postgres(d) => with_timeout(timeout, d.query(rendered, shape)).await,
            EngineDriver::Sqlite(d) => d.query(rendered, shape, timeout).await,
        };

        self.ensure_open()?;
        match &result {
            Ok(rows) => debug!(
                engine = %self.kind,
                rows = rows.len(),
                elapsed_ms = started.elapsed().as_millis() as u64,
                "Query complete"
            ),
            Err(e) => warn!(engine = %self.kind, error = %e, "Query failed"),
        }
        result
    }

    /// Release the connection. Idempotent.
    pub async fn close(&self) {
        if self.closed.swap(true, Ordering::SeqCst) {
            return;
        }

        match &self.driver {
            EngineDriver::MySql(d) => d.close().await,
            EngineDriver::Postgres(d) => d.close().await,
            EngineDriver::Sqlite(d) => d.close().await,
        }
        info!(engine = %self.kind, target = %self.target, "Connection closed");
    }

    fn ensure_open(&self) -> EngineResult<()> {
        if self.is_closed() {
            Err(EngineError::Closed)
        } else {
            Ok(())
        }
    }
}

async fn with_timeout<T, F>(timeout: Duration, fut: F) -> EngineResult<T>
where
    F: Future<Output = EngineResult<T>>,
{
    tokio::time::timeout(timeout, fut)
        .await
        .map_err(|_| EngineError::Timeout(timeout))?
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};
    use clockwork_util::UserId;
    use tempfile::TempDir;

    fn seed(dir: &TempDir) -> Connection {
        let path = dir.path().join("hr.db");
        let conn = rusqlite::Connection::open(&path).unwrap();
        conn.execute_batch(
            r#"
            CREATE TABLE employees (id INTEGER PRIMARY KEY, username TEXT, full_name TEXT);
            CREATE TABLE attendance_punches (user_id INTEGER, punched_at_utc TEXT, direction TEXT);
            INSERT INTO employees VALUES (1, 'ali', 'Ali Rezaei'), (2, 'sara', 'Sara Ahmadi'), (3, 'reza', 'Reza Karimi');
            INSERT INTO attendance_punches VALUES
                (1, '2024-03-01 05:00:00', 'in'),
                (1, '2024-03-01 13:00:00', 'out'),
                (2, '2024-03-01 06:00:00', 'in'),
                (3, '2024-03-01 07:00:00', 'in'),
                (3, '2024-03-01 07:00:00', 'out');
            "#,
        )
        .unwrap();
        Connection::sqlite(path)
    }

    async fn open(conn: &Connection) -> EngineHandle {
        EngineHandle::connect(EngineKind::Sqlite, conn, SourceSchema::default(), Duration::from_secs(5))
            .await
            .unwrap()
    }

    #[tokio::test]
    async fn ping_reports_latency() {
        let dir = TempDir::new().unwrap();
        let handle = open(&seed(&dir)).await;
        let latency = handle.ping(Duration::from_secs(5)).await.unwrap();
        assert!(latency < Duration::from_secs(5));
        assert_eq!(handle.kind(), EngineKind::Sqlite);
    }

    #[tokio::test]
    async fn latest_punches_returns_ties() {
        let dir = TempDir::new().unwrap();
        let handle = open(&seed(&dir)).await;

        let spec = QuerySpec::LatestPunches {
            before_utc: Utc.with_ymd_and_hms(2024, 3, 1, 12, 0, 0).unwrap(),
        };
        let rows = handle
            .query(&spec, Duration::from_secs(5))
            .await
            .unwrap()
            .into_punches()
            .unwrap();

        // user 1: the 05:00 in (13:00 out is after the cutoff); user 2: in; user 3: both tied rows
        assert_eq!(rows.len(), 4);
        assert_eq!(rows.iter().filter(|r| r.user_id == UserId::new(3)).count(), 2);
    }

    #[tokio::test]
    async fn users_directory() {
        let dir = TempDir::new().unwrap();
        let handle = open(&seed(&dir)).await;

        let spec = QuerySpec::Users {
            search: Some("AHMAD".into()),
            limit: 10,
            offset: 0,
        };
        let users = handle
            .query(&spec, Duration::from_secs(5))
            .await
            .unwrap()
            .into_users()
            .unwrap();
        assert_eq!(users.len(), 1);
        assert_eq!(users[0].username, "sara");

        let page = QuerySpec::Users {
            search: None,
            limit: 2,
            offset: 1,
        };
        let users = handle
            .query(&page, Duration::from_secs(5))
            .await
            .unwrap()
            .into_users()
            .unwrap();
        let names: Vec<_> = users.iter().map(|u| u.username.as_str()).collect();
        assert_eq!(names, vec!["reza", "sara"]);
    }

    #[tokio::test]
    async fn unknown_table_is_query_error() {
        let dir = TempDir::new().unwrap();
        let conn = seed(&dir);
        let schema = SourceSchema {
            punches_table: "missing_table".into(),
            ..SourceSchema::default()
        };
        let handle = EngineHandle::connect(EngineKind::Sqlite, &conn, schema, Duration::from_secs(5))
            .await
            .unwrap();

        let spec = QuerySpec::LatestPunches {
            before_utc: Utc.with_ymd_and_hms(2024, 3, 1, 12, 0, 0).unwrap(),
        };
        let result = handle.query(&spec, Duration::from_secs(5)).await;
        assert!(matches!(result, Err(EngineError::Query(msg)) if msg.contains("missing_table")));
    }

    #[tokio::test]
    async fn closed_handle_rejects_work() {
        let dir = TempDir::new().unwrap();
        let handle = open(&seed(&dir)).await;

        handle.close().await;
        handle.close().await;
        assert!(handle.is_closed());
        assert!(matches!(
            handle.ping(Duration::from_secs(1)).await,
            Err(EngineError::Closed)
        ));
    }

    #[tokio::test]
    async fn stalled_call_reports_timeout() {
        let result = with_timeout(Duration::from_millis(20), std::future::pending::<EngineResult<()>>()).await;
        assert!(matches!(result, Err(EngineError::Timeout(after)) if after == Duration::from_millis(20)));

        let err: clockwork_util::ClockworkError = result.unwrap_err().into();
        assert!(matches!(err, clockwork_util::ClockworkError::Timeout(_)));
        assert!(err.is_retryable());
    }

    #[tokio::test]
    async fn unreachable_server_fails_fast() {
        let conn = Connection::server(EngineKind::Postgres, "127.0.0.1", "hr").with_port(1);
        let result = EngineHandle::connect(
            EngineKind::Postgres,
            &conn,
            SourceSchema::default(),
            Duration::from_secs(2),
        )
        .await;
        assert!(matches!(
            result,
            Err(EngineError::Connection(_)) | Err(EngineError::Timeout(_))
        ));
    }
}

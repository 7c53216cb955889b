//! Connection manager
//!
//! Owns the single active [`EngineHandle`]. Queries and pings share a read
//! lock on the slot for their whole duration; replacing or closing the
//! connection takes the write lock, so it waits for in-flight work on the
//! old handle to finish and no caller ever reads from a handle after its
//! close has completed.

use clockwork_api::{Connection, ConnectionPhase, EngineKind, SourceSchema};
use clockwork_engine::{EngineHandle, QueryRows, QuerySpec};
use clockwork_util::{ClockworkError, ClockworkResult};
use std::sync::Mutex;
use std::time::Duration;
use tokio::sync::RwLock;
use tracing::{info, warn};

/// Point-in-time view of the manager
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConnectionStatus {
    pub phase: ConnectionPhase,
    pub engine: Option<EngineKind>,
    /// Bumped every time a handle is installed
    pub generation: u64,
    pub last_error: Option<String>,
}

pub struct ConnectionManager {
    schema: SourceSchema,
    slot: RwLock<Option<EngineHandle>>,
    status: Mutex<ConnectionStatus>,
}

impl ConnectionManager {
    pub fn new(schema: SourceSchema) -> Self {
        Self {
            schema,
            slot: RwLock::new(None),
            status: Mutex::new(ConnectionStatus {
                phase: ConnectionPhase::Unconfigured,
                engine: None,
                generation: 0,
                last_error: None,
            }),
        }
    }

    pub fn status(&self) -> ConnectionStatus {
        match self.status.lock() {
            Ok(status) => status.clone(),
            Err(poisoned) => poisoned.into_inner().clone(),
        }
    }

    pub fn phase(&self) -> ConnectionPhase {
        self.status().phase
    }

    /// Replace the active connection.
    ///
    /// The request is validated before anything is touched; an invalid or
    /// unsupported request leaves the current connection in place. Otherwise
    /// the old handle is closed first, then the new one is opened. A failed
    /// open leaves the manager `Unconfigured`.
    pub async fn set_connection(&self, conn: &Connection, timeout: Duration) -> ClockworkResult<EngineKind> {
        let kind = conn.validate()?;

        let mut slot = self.slot.write().await;
        if let Some(old) = slot.take() {
            old.close().await;
        }

        self.update(|s| {
            s.phase = ConnectionPhase::Connecting;
            s.engine = Some(kind);
        });
        info!(engine = %kind, target = %conn.describe(), "Opening connection");

        match EngineHandle::connect(kind, conn, self.schema.clone(), timeout).await {
            Ok(handle) => {
                *slot = Some(handle);
                self.update(|s| {
                    s.phase = ConnectionPhase::Connected;
                    s.generation += 1;
                    s.last_error = None;
                });
                Ok(kind)
            }
            Err(e) => {
                warn!(engine = %kind, error = %e, "Connection failed");
                let message = e.to_string();
                self.update(|s| {
                    s.phase = ConnectionPhase::Unconfigured;
                    s.engine = None;
                    s.last_error = Some(message);
                });
                Err(e.into())
            }
        }
    }

    /// Round-trip latency of the active connection
    pub async fn ping(&self, timeout: Duration) -> ClockworkResult<Duration> {
        let slot = self.slot.read().await;
        let handle = slot.as_ref().ok_or(ClockworkError::NotConnected)?;
        Ok(handle.ping(timeout).await?)
    }

    /// Run a canonical query on the active connection
    pub async fn query(&self, spec: &QuerySpec, timeout: Duration) -> ClockworkResult<QueryRows> {
        let slot = self.slot.read().await;
        let handle = slot.as_ref().ok_or(ClockworkError::NotConnected)?;
        Ok(handle.query(spec, timeout).await?)
    }

    /// Close the active connection, if any. Safe in every phase.
    pub async fn close(&self) {
        let mut slot = self.slot.write().await;
        if let Some(handle) = slot.take() {
            handle.close().await;
        }
        self.update(|s| s.phase = ConnectionPhase::Closed);
    }

    fn update(&self, f: impl FnOnce(&mut ConnectionStatus)) {
        match self.status.lock() {
            Ok(mut status) => f(&mut status),
            Err(poisoned) => f(&mut poisoned.into_inner()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;
    use std::sync::Arc;
    use tempfile::TempDir;

    const TIMEOUT: Duration = Duration::from_secs(5);

    fn seed(dir: &TempDir, name: &str, users: &[(i64, &str)]) -> PathBuf {
        let path = dir.path().join(name);
        let conn = rusqlite::Connection::open(&path).unwrap();
        conn.execute_batch(
            "CREATE TABLE employees (id INTEGER PRIMARY KEY, username TEXT, full_name TEXT);
             CREATE TABLE attendance_punches (user_id INTEGER, punched_at_utc TEXT, direction TEXT);",
        )
        .unwrap();
        for (id, name) in users {
            conn.execute(
                "INSERT INTO employees VALUES (?1, ?2, ?2)",
                rusqlite::params![id, name],
            )
            .unwrap();
        }
        path
    }

    fn users_spec() -> QuerySpec {
        QuerySpec::Users {
            search: None,
            limit: 50,
            offset: 0,
        }
    }

    #[tokio::test]
    async fn starts_unconfigured() {
        let manager = ConnectionManager::new(SourceSchema::default());
        assert_eq!(manager.phase(), ConnectionPhase::Unconfigured);
        assert!(matches!(
            manager.ping(TIMEOUT).await,
            Err(ClockworkError::NotConnected)
        ));
        assert!(matches!(
            manager.query(&users_spec(), TIMEOUT).await,
            Err(ClockworkError::NotConnected)
        ));

        // Closing from Unconfigured is allowed
        manager.close().await;
        assert_eq!(manager.phase(), ConnectionPhase::Closed);
    }

    #[tokio::test]
    async fn connect_ping_close() {
        let dir = TempDir::new().unwrap();
        let path = seed(&dir, "hr.db", &[(1, "ali")]);
        let manager = ConnectionManager::new(SourceSchema::default());

        let kind = manager.set_connection(&Connection::sqlite(&path), TIMEOUT).await.unwrap();
        assert_eq!(kind, EngineKind::Sqlite);

        let status = manager.status();
        assert_eq!(status.phase, ConnectionPhase::Connected);
        assert_eq!(status.engine, Some(EngineKind::Sqlite));
        assert_eq!(status.generation, 1);
        manager.ping(TIMEOUT).await.unwrap();

        manager.close().await;
        assert_eq!(manager.phase(), ConnectionPhase::Closed);
        assert!(matches!(manager.ping(TIMEOUT).await, Err(ClockworkError::NotConnected)));
    }

    #[tokio::test]
    async fn unsupported_engine_keeps_current_connection() {
        let dir = TempDir::new().unwrap();
        let path = seed(&dir, "hr.db", &[(1, "ali")]);
        let manager = ConnectionManager::new(SourceSchema::default());
        manager.set_connection(&Connection::sqlite(&path), TIMEOUT).await.unwrap();

        let oracle = Connection {
            engine: "oracle".into(),
            host: Some("db".into()),
            db_name: Some("hr".into()),
            ..Default::default()
        };
        let result = manager.set_connection(&oracle, TIMEOUT).await;
        assert!(matches!(result, Err(ClockworkError::UnsupportedEngine(_))));
        assert_eq!(manager.phase(), ConnectionPhase::Connected);
        manager.ping(TIMEOUT).await.unwrap();
    }

    #[tokio::test]
    async fn failed_connect_returns_to_unconfigured() {
        let dir = TempDir::new().unwrap();
        let path = seed(&dir, "hr.db", &[(1, "ali")]);
        let manager = ConnectionManager::new(SourceSchema::default());
        manager.set_connection(&Connection::sqlite(&path), TIMEOUT).await.unwrap();

        let missing = Connection::sqlite(dir.path().join("missing.db"));
        let result = manager.set_connection(&missing, TIMEOUT).await;
        assert!(matches!(result, Err(ClockworkError::Connection(_))));

        let status = manager.status();
        assert_eq!(status.phase, ConnectionPhase::Unconfigured);
        assert_eq!(status.engine, None);
        assert!(status.last_error.is_some());
        assert!(matches!(manager.ping(TIMEOUT).await, Err(ClockworkError::NotConnected)));
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn replacing_connection_never_serves_stale_reads() {
        let dir = TempDir::new().unwrap();
        let old_path = seed(&dir, "old.db", &[(1, "old-user")]);
        let new_path = seed(&dir, "new.db", &[(2, "new-user")]);

        let manager = Arc::new(ConnectionManager::new(SourceSchema::default()));
        manager.set_connection(&Connection::sqlite(&old_path), TIMEOUT).await.unwrap();

        let mut readers = Vec::new();
        for _ in 0..8 {
            let manager = Arc::clone(&manager);
            readers.push(tokio::spawn(async move {
                let mut seen = Vec::new();
                for _ in 0..20 {
                    let before = manager.status().generation;
                    let _ = manager.ping(TIMEOUT).await;
                    if let Ok(rows) = manager.query(&users_spec(), TIMEOUT).await {
                        let users = rows.into_users().unwrap();
                        let after = manager.status().generation;
                        seen.push((before, users[0].username.clone(), after));
                    }
                    tokio::task::yield_now().await;
                }
                seen
            }));
        }

        manager.set_connection(&Connection::sqlite(&new_path), TIMEOUT).await.unwrap();
        let switched = manager.status().generation;
        assert_eq!(switched, 2);

        for reader in readers {
            for (before, username, after) in reader.await.unwrap() {
                if before >= switched {
                    assert_eq!(username, "new-user");
                }
                if after < switched {
                    assert_eq!(username, "old-user");
                }
            }
        }

        let rows = manager.query(&users_spec(), TIMEOUT).await.unwrap().into_users().unwrap();
        assert_eq!(rows[0].username, "new-user");
    }
}

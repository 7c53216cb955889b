//! SQLite-based history store

use chrono::{DateTime, Local, NaiveDate};
use clockwork_api::{ExportFormat, ExportHistoryItem, NewExportItem};
use clockwork_util::ExportId;
use rusqlite::{params, params_from_iter, Connection, Row};
use std::path::{Path, PathBuf};
use std::sync::{Mutex, MutexGuard};
use tracing::{debug, info, warn};

use crate::{ExportHistoryStore, StoreError, StoreResult};

const SELECT_ITEMS: &str = "SELECT id, format, title, date_from, date_to, row_count, total_hours, file_path, created_at \
     FROM export_history ORDER BY seq DESC";

/// SQLite-based history store
pub struct SqliteHistoryStore {
    conn: Mutex<Connection>,
}

impl SqliteHistoryStore {
    /// Open or create a store at the given path
    pub fn open(path: impl AsRef<Path>) -> StoreResult<Self> {
        let path = path.as_ref();
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let conn = Connection::open(path)?;
        let store = Self {
            conn: Mutex::new(conn),
        };
        store.init_schema()?;
        info!(path = %path.display(), "Export history opened");
        Ok(store)
    }

    /// Create an in-memory store (for testing)
    pub fn in_memory() -> StoreResult<Self> {
        let conn = Connection::open_in_memory()?;
        let store = Self {
            conn: Mutex::new(conn),
        };
        store.init_schema()?;
        Ok(store)
    }

    fn init_schema(&self) -> StoreResult<()> {
        let conn = self.lock()?;

        conn.execute_batch(
            r#"
            -- One row per written artifact; seq gives creation order
            CREATE TABLE IF NOT EXISTS export_history (
                seq INTEGER PRIMARY KEY AUTOINCREMENT,
                id TEXT NOT NULL UNIQUE,
                format TEXT NOT NULL,
                title TEXT NOT NULL,
                date_from TEXT NOT NULL,
                date_to TEXT NOT NULL,
                row_count INTEGER NOT NULL,
                total_hours REAL NOT NULL,
                file_path TEXT NOT NULL,
                created_at TEXT NOT NULL
            );
            "#,
        )?;

        debug!("History schema initialized");
        Ok(())
    }

    fn lock(&self) -> StoreResult<MutexGuard<'_, Connection>> {
        self.conn
            .lock()
            .map_err(|_| StoreError::Database("history lock poisoned".into()))
    }
}

fn read_all(conn: &Connection) -> StoreResult<Vec<ExportHistoryItem>> {
    let mut stmt = conn.prepare(SELECT_ITEMS)?;
    let rows = stmt.query_map([], RawItem::from_row)?;

    let mut items = Vec::new();
    for row in rows {
        items.push(row?.into_item()?);
    }
    Ok(items)
}

struct RawItem {
    id: String,
    format: String,
    title: String,
    from: String,
    to: String,
    rows: i64,
    total_hours: f64,
    file_path: String,
    created_at: String,
}

impl RawItem {
    fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
        Ok(Self {
            id: row.get(0)?,
            format: row.get(1)?,
            title: row.get(2)?,
            from: row.get(3)?,
            to: row.get(4)?,
            rows: row.get(5)?,
            total_hours: row.get(6)?,
            file_path: row.get(7)?,
            created_at: row.get(8)?,
        })
    }

    fn into_item(self) -> StoreResult<ExportHistoryItem> {
        let corrupt = |message: String| StoreError::Corrupt {
            id: self.id.clone(),
            message,
        };

        let id = ExportId::from(self.id.as_str());
        let format = ExportFormat::parse(&self.format)
            .ok_or_else(|| corrupt(format!("format '{}'", self.format)))?;
        let from = parse_day(&self.from).map_err(|e| corrupt(format!("from: {}", e)))?;
        let to = parse_day(&self.to).map_err(|e| corrupt(format!("to: {}", e)))?;
        let created_at = DateTime::parse_from_rfc3339(&self.created_at)
            .map(|dt| dt.with_timezone(&Local))
            .map_err(|e| corrupt(format!("created_at: {}", e)))?;

        Ok(ExportHistoryItem {
            id,
            format,
            title: self.title,
            from,
            to,
            rows: usize::try_from(self.rows).unwrap_or_default(),
            total_hours: self.total_hours,
            file_path: PathBuf::from(self.file_path),
            created_at,
        })
    }
}

fn parse_day(s: &str) -> Result<NaiveDate, chrono::ParseError> {
    NaiveDate::parse_from_str(s, "%Y-%m-%d")
}

impl ExportHistoryStore for SqliteHistoryStore {
    fn record(&self, item: NewExportItem) -> StoreResult<ExportHistoryItem> {
        let conn = self.lock()?;
        let stored = ExportHistoryItem {
            id: ExportId::new(),
            format: item.format,
            title: item.title,
            from: item.from,
            to: item.to,
            rows: item.rows,
            total_hours: item.total_hours,
            file_path: item.file_path,
            created_at: clockwork_util::now(),
        };

        // Plain INSERT: a colliding id fails instead of replacing a row
        conn.execute(
            r#"
            INSERT INTO export_history
                (id, format, title, date_from, date_to, row_count, total_hours, file_path, created_at)
            VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?)
            "#,
            params![
                stored.id.to_string(),
                stored.format.as_str(),
                stored.title,
                stored.from.format("%Y-%m-%d").to_string(),
                stored.to.format("%Y-%m-%d").to_string(),
                i64::try_from(stored.rows).unwrap_or(i64::MAX),
                stored.total_hours,
                stored.file_path.to_string_lossy().into_owned(),
                stored.created_at.to_rfc3339(),
            ],
        )?;

        debug!(id = %stored.id, format = %stored.format, path = %stored.file_path.display(), "Export recorded");
        Ok(stored)
    }

    fn list(&self) -> StoreResult<Vec<ExportHistoryItem>> {
        let conn = self.lock()?;
        read_all(&conn)
    }

    fn delete_many(&self, ids: &[ExportId]) -> StoreResult<Vec<ExportHistoryItem>> {
        let mut conn = self.lock()?;
        let tx = conn.transaction()?;

        let deleted = if ids.is_empty() {
            0
        } else {
            let placeholders = vec!["?"; ids.len()].join(", ");
            tx.execute(
                &format!("DELETE FROM export_history WHERE id IN ({})", placeholders),
                params_from_iter(ids.iter().map(ExportId::as_str)),
            )?
        };

        let remaining = read_all(&tx)?;
        tx.commit()?;

        debug!(requested = ids.len(), deleted, remaining = remaining.len(), "History entries deleted");
        Ok(remaining)
    }

    fn clear(&self) -> StoreResult<Vec<ExportHistoryItem>> {
        let conn = self.lock()?;
        let deleted = conn.execute("DELETE FROM export_history", [])?;
        debug!(deleted, "History cleared");
        Ok(Vec::new())
    }

    fn is_healthy(&self) -> bool {
        match self.conn.lock() {
            Ok(conn) => conn.query_row("SELECT 1", [], |_| Ok(())).is_ok(),
            Err(_) => {
                warn!("History lock poisoned");
                false
            }
        }
    }
}

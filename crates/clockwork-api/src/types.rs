//! Shared types for the clockwork API

use chrono::{DateTime, FixedOffset, Local, NaiveDate, NaiveTime, Utc};
use clockwork_util::{parse_utc_offset, ClockworkError, ClockworkResult, ExportId, UserId};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;
use std::time::Duration;

/// Supported SQL engines
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EngineKind {
    Mysql,
    Mariadb,
    Postgres,
    Sqlite,
}

impl EngineKind {
    /// Parse an engine tag as written in configuration or a connect request
    pub fn parse(tag: &str) -> ClockworkResult<Self> {
        match tag.trim().to_ascii_lowercase().as_str() {
            "mysql" => Ok(Self::Mysql),
            "mariadb" => Ok(Self::Mariadb),
            "postgres" | "postgresql" | "pg" => Ok(Self::Postgres),
            "sqlite" | "sqlite3" => Ok(Self::Sqlite),
            other => Err(ClockworkError::UnsupportedEngine(other.to_string())),
        }
    }

    /// Port used when a connection omits one. SQLite has none.
    pub fn default_port(&self) -> Option<u16> {
        match self {
            Self::Mysql | Self::Mariadb => Some(3306),
            Self::Postgres => Some(5432),
            Self::Sqlite => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Mysql => "mysql",
            Self::Mariadb => "mariadb",
            Self::Postgres => "postgres",
            Self::Sqlite => "sqlite",
        }
    }
}

impl fmt::Display for EngineKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Parameters of a database connection
///
/// `engine` stays a free-form tag so that unknown engines surface as
/// `UnsupportedEngine` at connect time rather than as a decode failure.
#[derive(Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Connection {
    pub engine: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub host: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub port: Option<u16>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub password: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub db_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sqlite_path: Option<PathBuf>,
}

impl Connection {
    /// A SQLite connection to the given file
    pub fn sqlite(path: impl Into<PathBuf>) -> Self {
        Self {
            engine: EngineKind::Sqlite.as_str().to_string(),
            sqlite_path: Some(path.into()),
            ..Default::default()
        }
    }

    /// A network connection for a server engine
    pub fn server(
        engine: EngineKind,
        host: impl Into<String>,
        db_name: impl Into<String>,
    ) -> Self {
        Self {
            engine: engine.as_str().to_string(),
            host: Some(host.into()),
            db_name: Some(db_name.into()),
            ..Default::default()
        }
    }

    pub fn with_credentials(mut self, user: impl Into<String>, password: impl Into<String>) -> Self {
        self.user = Some(user.into());
        self.password = Some(password.into());
        self
    }

    pub fn with_port(mut self, port: u16) -> Self {
        self.port = Some(port);
        self
    }

    /// Resolve the engine tag and check the engine-specific field rules.
    ///
    /// SQLite requires `sqlite_path` and forbids network fields; every other
    /// engine requires `host` and `db_name`.
    pub fn validate(&self) -> ClockworkResult<EngineKind> {
        let kind = EngineKind::parse(&self.engine)?;
        let present = |v: &Option<String>| v.as_deref().is_some_and(|s| !s.trim().is_empty());

        match kind {
            EngineKind::Sqlite => {
                if self.sqlite_path.as_ref().is_none_or(|p| p.as_os_str().is_empty()) {
                    return Err(ClockworkError::connection("sqlite requires sqlite_path"));
                }
                let mut forbidden = Vec::new();
                if self.host.is_some() {
                    forbidden.push("host");
                }
                if self.port.is_some() {
                    forbidden.push("port");
                }
                if self.user.is_some() {
                    forbidden.push("user");
                }
                if self.password.is_some() {
                    forbidden.push("password");
                }
                if !forbidden.is_empty() {
                    return Err(ClockworkError::connection(format!(
                        "sqlite does not accept {}",
                        forbidden.join(", ")
                    )));
                }
            }
            _ => {
                if !present(&self.host) {
                    return Err(ClockworkError::connection(format!("{} requires host", kind)));
                }
                if !present(&self.db_name) {
                    return Err(ClockworkError::connection(format!("{} requires db_name", kind)));
                }
                if self.sqlite_path.is_some() {
                    return Err(ClockworkError::connection(format!(
                        "{} does not accept sqlite_path",
                        kind
                    )));
                }
            }
        }

        Ok(kind)
    }

    /// Explicit port, or the engine default
    pub fn effective_port(&self, kind: EngineKind) -> Option<u16> {
        self.port.or_else(|| kind.default_port())
    }

    /// Human-readable target without credentials, for logs
    pub fn describe(&self) -> String {
        match &self.sqlite_path {
            Some(path) => format!("{}:{}", self.engine, path.display()),
            None => format!(
                "{}://{}@{}:{}/{}",
                self.engine,
                self.user.as_deref().unwrap_or("-"),
                self.host.as_deref().unwrap_or("-"),
                self.port.map(|p| p.to_string()).unwrap_or_else(|| "default".into()),
                self.db_name.as_deref().unwrap_or("-"),
            ),
        }
    }
}

impl fmt::Debug for Connection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Connection")
            .field("engine", &self.engine)
            .field("host", &self.host)
            .field("port", &self.port)
            .field("user", &self.user)
            .field("password", &self.password.as_ref().map(|_| "<redacted>"))
            .field("db_name", &self.db_name)
            .field("sqlite_path", &self.sqlite_path)
            .finish()
    }
}

/// Direction of a punch event
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PunchDirection {
    In,
    Out,
}

impl PunchDirection {
    /// Decode a direction label as stored in the HR database
    pub fn from_label(label: &str) -> Option<Self> {
        match label.trim().to_ascii_lowercase().as_str() {
            "in" | "punch in" | "punch_in" | "check-in" | "checkin" | "i" | "1" => Some(Self::In),
            "out" | "punch out" | "punch_out" | "check-out" | "checkout" | "o" | "0" => {
                Some(Self::Out)
            }
            _ => None,
        }
    }
}

/// A raw check-in or check-out event
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PunchRecord {
    pub user_id: UserId,
    pub username: String,
    pub full_name: String,
    pub timestamp_utc: DateTime<Utc>,
    pub direction: PunchDirection,
}

/// A user as listed by the user directory
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserSummary {
    pub user_id: UserId,
    pub username: String,
    pub full_name: String,
}

/// Inclusive range of Gregorian calendar days
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct DateRange {
    pub from: NaiveDate,
    pub to: NaiveDate,
}

impl DateRange {
    /// Build a range, failing with `InvalidRange` when `from > to`
    pub fn new(from: NaiveDate, to: NaiveDate) -> ClockworkResult<Self> {
        if from > to {
            return Err(ClockworkError::invalid_range(format!(
                "from {} is after to {}",
                from, to
            )));
        }
        Ok(Self { from, to })
    }

    pub fn contains(&self, day: NaiveDate) -> bool {
        self.from <= day && day <= self.to
    }

    /// Number of calendar days covered
    pub fn days(&self) -> i64 {
        (self.to - self.from).num_days() + 1
    }
}

/// One matched (or unmatched) punch pair on a calendar day
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReportRow {
    pub user_id: UserId,
    pub username: String,
    pub full_name: String,
    pub date: NaiveDate,
    pub check_in: Option<NaiveTime>,
    pub check_out: Option<NaiveTime>,
    pub hours: f64,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ReportTotals {
    pub hours: f64,
    pub records: usize,
    pub users: usize,
}

/// Normalized attendance report
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReportPayload {
    pub rows: Vec<ReportRow>,
    pub totals: ReportTotals,
    pub date_range: DateRange,
}

/// A user with an open check-in
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PresenceEntry {
    pub user_id: UserId,
    pub username: String,
    pub full_name: String,
    pub check_in_timestamp: DateTime<Utc>,
}

/// Export artifact format
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ExportFormat {
    Pdf,
    Csv,
}

impl ExportFormat {
    pub fn parse(tag: &str) -> Option<Self> {
        match tag.trim().to_ascii_lowercase().as_str() {
            "pdf" => Some(Self::Pdf),
            "csv" => Some(Self::Csv),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pdf => "pdf",
            Self::Csv => "csv",
        }
    }

    pub fn extension(&self) -> &'static str {
        self.as_str()
    }
}

impl fmt::Display for ExportFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Presentation metadata handed to a formatter
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExportMeta {
    pub title: String,
    pub from: NaiveDate,
    pub to: NaiveDate,
}

/// An export about to be recorded (no id yet)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewExportItem {
    pub format: ExportFormat,
    pub title: String,
    pub from: NaiveDate,
    pub to: NaiveDate,
    pub rows: usize,
    pub total_hours: f64,
    pub file_path: PathBuf,
}

/// A recorded export artifact
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExportHistoryItem {
    pub id: ExportId,
    pub format: ExportFormat,
    pub title: String,
    pub from: NaiveDate,
    pub to: NaiveDate,
    pub rows: usize,
    pub total_hours: f64,
    pub file_path: PathBuf,
    pub created_at: DateTime<Local>,
}

/// Result of a successful export
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExportOutcome {
    pub item: ExportHistoryItem,
    pub bytes: u64,
}

/// Date-range presets
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum RangePreset {
    /// Month to date
    Current,
    /// Previous full calendar month
    Last,
    /// Explicit bounds
    Custom,
    /// Most recent completed payroll cycle
    PayrollCycle,
}

/// Calendar in which custom bounds are written
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CalendarKind {
    #[default]
    Gregorian,
    Solar,
}

/// A date range request as sent by a client
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DateRangeInput {
    pub preset: RangePreset,
    #[serde(default)]
    pub from: Option<String>,
    #[serde(default)]
    pub to: Option<String>,
    #[serde(default)]
    pub calendar: CalendarKind,
}

impl DateRangeInput {
    pub fn preset(preset: RangePreset) -> Self {
        Self {
            preset,
            from: None,
            to: None,
            calendar: CalendarKind::Gregorian,
        }
    }

    pub fn custom(from: impl Into<String>, to: impl Into<String>) -> Self {
        Self {
            preset: RangePreset::Custom,
            from: Some(from.into()),
            to: Some(to.into()),
            calendar: CalendarKind::Gregorian,
        }
    }

    pub fn in_calendar(mut self, calendar: CalendarKind) -> Self {
        self.calendar = calendar;
        self
    }
}

/// Lifecycle of the active connection
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConnectionPhase {
    Unconfigured,
    Connecting,
    Connected,
    Closed,
}

/// Runtime-tunable report settings
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Settings {
    /// Offset defining report calendar days, e.g. "+03:30"
    pub utc_offset: String,
    pub payroll_cycle_start_day: u32,
    pub query_timeout_secs: u64,
    pub default_user_limit: u32,
    pub max_user_limit: u32,
}

impl Settings {
    /// Fixed offset that defines report calendar days
    pub fn zone(&self) -> ClockworkResult<FixedOffset> {
        parse_utc_offset(&self.utc_offset)
            .map_err(|e| ClockworkError::validation(format!("utc_offset: {}", e)))
    }

    pub fn query_timeout(&self) -> Duration {
        Duration::from_secs(self.query_timeout_secs)
    }

    /// Requested page size, defaulted and capped by the configured limits
    pub fn page_size(&self, requested: Option<u32>) -> u32 {
        requested
            .unwrap_or(self.default_user_limit)
            .clamp(1, self.max_user_limit.max(1))
    }
}

/// Where punch data lives in the HR database
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SourceSchema {
    pub users_table: String,
    pub user_id_column: String,
    pub username_column: String,
    pub full_name_column: String,
    pub punches_table: String,
    pub punch_user_column: String,
    pub punch_time_column: String,
    pub punch_direction_column: String,
}

impl Default for SourceSchema {
    fn default() -> Self {
        Self {
            users_table: "employees".into(),
            user_id_column: "id".into(),
            username_column: "username".into(),
            full_name_column: "full_name".into(),
            punches_table: "attendance_punches".into(),
            punch_user_column: "user_id".into(),
            punch_time_column: "punched_at_utc".into(),
            punch_direction_column: "direction".into(),
        }
    }
}

impl SourceSchema {
    /// Every configured identifier, paired with its field name
    pub fn identifiers(&self) -> [(&'static str, &str); 8] {
        [
            ("users_table", &self.users_table),
            ("user_id_column", &self.user_id_column),
            ("username_column", &self.username_column),
            ("full_name_column", &self.full_name_column),
            ("punches_table", &self.punches_table),
            ("punch_user_column", &self.punch_user_column),
            ("punch_time_column", &self.punch_time_column),
            ("punch_direction_column", &self.punch_direction_column),
        ]
    }
}

/// Health status
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HealthStatus {
    pub live: bool,
    pub phase: ConnectionPhase,
    pub engine: Option<EngineKind>,
    pub latency_ms: Option<u64>,
    pub store_ok: bool,
    pub last_error: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn engine_tags() {
        assert_eq!(EngineKind::parse("MariaDB").unwrap(), EngineKind::Mariadb);
        assert_eq!(EngineKind::parse("postgresql").unwrap(), EngineKind::Postgres);
        assert_eq!(EngineKind::parse(" sqlite ").unwrap(), EngineKind::Sqlite);
        assert!(matches!(
            EngineKind::parse("oracle"),
            Err(ClockworkError::UnsupportedEngine(tag)) if tag == "oracle"
        ));
        assert_eq!(EngineKind::Mysql.default_port(), Some(3306));
        assert_eq!(EngineKind::Postgres.default_port(), Some(5432));
        assert_eq!(EngineKind::Sqlite.default_port(), None);
    }

    #[test]
    fn sqlite_connection_rules() {
        let ok = Connection::sqlite("/tmp/hr.db");
        assert_eq!(ok.validate().unwrap(), EngineKind::Sqlite);

        let missing = Connection {
            engine: "sqlite".into(),
            ..Default::default()
        };
        assert!(matches!(missing.validate(), Err(ClockworkError::Connection(_))));

        let mut with_host = Connection::sqlite("/tmp/hr.db");
        with_host.host = Some("db.local".into());
        with_host.password = Some("secret".into());
        let err = with_host.validate().unwrap_err().to_string();
        assert!(err.contains("host") && err.contains("password"));
    }

    #[test]
    fn server_connection_rules() {
        let ok = Connection::server(EngineKind::Postgres, "db.local", "hr");
        assert_eq!(ok.validate().unwrap(), EngineKind::Postgres);
        assert_eq!(ok.effective_port(EngineKind::Postgres), Some(5432));
        assert_eq!(ok.clone().with_port(6543).effective_port(EngineKind::Postgres), Some(6543));

        let no_db = Connection {
            engine: "mysql".into(),
            host: Some("db.local".into()),
            ..Default::default()
        };
        assert!(matches!(no_db.validate(), Err(ClockworkError::Connection(_))));

        let unknown = Connection {
            engine: "mssql".into(),
            ..Default::default()
        };
        assert!(matches!(unknown.validate(), Err(ClockworkError::UnsupportedEngine(_))));
    }

    #[test]
    fn connection_debug_redacts_password() {
        let conn = Connection::server(EngineKind::Mysql, "db", "hr").with_credentials("hr", "hunter2");
        let debug = format!("{:?}", conn);
        assert!(!debug.contains("hunter2"));
        assert!(!conn.describe().contains("hunter2"));
    }

    #[test]
    fn direction_labels() {
        assert_eq!(PunchDirection::from_label("IN"), Some(PunchDirection::In));
        assert_eq!(PunchDirection::from_label("Punch Out"), Some(PunchDirection::Out));
        assert_eq!(PunchDirection::from_label("checkin"), Some(PunchDirection::In));
        assert_eq!(PunchDirection::from_label("lunch"), None);
    }

    #[test]
    fn date_range_validation() {
        let a = NaiveDate::from_ymd_opt(2024, 3, 10).unwrap();
        let b = NaiveDate::from_ymd_opt(2024, 3, 5).unwrap();
        assert!(matches!(DateRange::new(a, b), Err(ClockworkError::InvalidRange(_))));

        let range = DateRange::new(b, a).unwrap();
        assert_eq!(range.days(), 6);
        assert!(range.contains(a));
        assert!(!range.contains(a.succ_opt().unwrap()));
    }

    #[test]
    fn settings_helpers() {
        let settings = Settings {
            utc_offset: "+03:30".into(),
            payroll_cycle_start_day: 26,
            query_timeout_secs: 15,
            default_user_limit: 50,
            max_user_limit: 500,
        };
        assert_eq!(settings.zone().unwrap().local_minus_utc(), 3 * 3600 + 1800);
        assert_eq!(settings.query_timeout(), Duration::from_secs(15));
        assert_eq!(settings.page_size(None), 50);
        assert_eq!(settings.page_size(Some(10_000)), 500);
        assert_eq!(settings.page_size(Some(0)), 1);

        let broken = Settings {
            utc_offset: "Tehran".into(),
            ..settings
        };
        assert!(matches!(broken.zone(), Err(ClockworkError::Validation(_))));
    }

    #[test]
    fn range_input_serialization() {
        let input = DateRangeInput::preset(RangePreset::PayrollCycle);
        let json = serde_json::to_string(&input).unwrap();
        assert!(json.contains("\"payroll-cycle\""));

        let parsed: DateRangeInput =
            serde_json::from_str(r#"{"preset":"custom","from":"1402-12-01","to":"1402-12-29","calendar":"solar"}"#)
                .unwrap();
        assert_eq!(parsed.calendar, CalendarKind::Solar);
        assert_eq!(parsed.from.as_deref(), Some("1402-12-01"));
    }
}

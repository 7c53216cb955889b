//! Command types for the clockwork protocol

use chrono::{DateTime, Local, NaiveDate};
use clockwork_util::{ClientId, ClockworkError, ExportId, UserId};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

use crate::{
    Connection, DateRangeInput, EngineKind, ExportFormat, ExportHistoryItem, ExportMeta,
    ExportOutcome, HealthStatus, PresenceEntry, ReportPayload, Settings, UserSummary, API_VERSION,
};

/// Request wrapper with metadata
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Request {
    /// Request ID for correlation
    pub request_id: u64,
    /// API version
    pub api_version: u32,
    /// The command
    pub command: Command,
}

impl Request {
    pub fn new(request_id: u64, command: Command) -> Self {
        Self {
            request_id,
            api_version: API_VERSION,
            command,
        }
    }
}

/// Response wrapper
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Response {
    pub request_id: u64,
    pub api_version: u32,
    pub result: ResponseResult,
}

impl Response {
    pub fn success(request_id: u64, payload: ResponsePayload) -> Self {
        Self {
            request_id,
            api_version: API_VERSION,
            result: ResponseResult::Ok(payload),
        }
    }

    pub fn error(request_id: u64, error: ErrorInfo) -> Self {
        Self {
            request_id,
            api_version: API_VERSION,
            result: ResponseResult::Err(error),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ResponseResult {
    Ok(ResponsePayload),
    Err(ErrorInfo),
}

/// Error information
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorInfo {
    pub code: ErrorCode,
    pub message: String,
    /// Whether the same request may succeed if sent again
    #[serde(default)]
    pub retryable: bool,
}

impl ErrorInfo {
    pub fn new(code: ErrorCode, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
            retryable: false,
        }
    }
}

impl From<&ClockworkError> for ErrorInfo {
    fn from(err: &ClockworkError) -> Self {
        let code = match err {
            ClockworkError::Connection(_) => ErrorCode::ConnectionError,
            ClockworkError::UnsupportedEngine(_) => ErrorCode::UnsupportedEngine,
            ClockworkError::NotConnected => ErrorCode::NotConnected,
            ClockworkError::ConnectionClosed => ErrorCode::ConnectionClosed,
            ClockworkError::Query(_) => ErrorCode::QueryError,
            ClockworkError::Timeout(_) => ErrorCode::Timeout,
            ClockworkError::EmptySelection => ErrorCode::EmptySelection,
            ClockworkError::InvalidRange(_) => ErrorCode::InvalidRange,
            ClockworkError::Validation(_) | ClockworkError::Calendar(_) => {
                ErrorCode::ValidationError
            }
            ClockworkError::Store(_) => ErrorCode::StoreError,
            ClockworkError::Config(_) => ErrorCode::ConfigError,
            ClockworkError::Io(_) | ClockworkError::Internal(_) => ErrorCode::InternalError,
        };

        Self {
            code,
            message: err.to_string(),
            retryable: err.is_retryable(),
        }
    }
}

/// Error codes for the protocol
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorCode {
    InvalidRequest,
    ConnectionError,
    UnsupportedEngine,
    NotConnected,
    ConnectionClosed,
    QueryError,
    Timeout,
    EmptySelection,
    InvalidRange,
    ValidationError,
    StoreError,
    ConfigError,
    InternalError,
}

/// All possible commands from clients
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Command {
    /// Service and connection health
    GetHealth,

    /// Replace the active database connection
    Connect { connection: Connection },

    /// Close the active database connection
    Disconnect,

    /// Read runtime report settings
    GetSettings,

    /// Replace runtime report settings
    UpdateSettings { settings: Settings },

    /// Search the user directory
    ListUsers {
        #[serde(default)]
        query: Option<String>,
        #[serde(default)]
        limit: Option<u32>,
        #[serde(default)]
        offset: Option<u32>,
    },

    /// Build an attendance report
    BuildReport {
        user_ids: Vec<UserId>,
        date_range: DateRangeInput,
    },

    /// Who is checked in; `date` defaults to now
    GetPresence {
        #[serde(default)]
        date: Option<NaiveDate>,
    },

    /// Render a report and record it in the export history
    Export {
        format: ExportFormat,
        payload: ReportPayload,
        meta: ExportMeta,
        save_path: PathBuf,
    },

    /// List export history, newest first
    ListExports,

    /// Delete export history entries; unknown ids are ignored
    DeleteExports { ids: Vec<ExportId> },

    /// Remove every export history entry
    ClearExports,

    /// Subscribe to events (returns immediately, events stream separately)
    SubscribeEvents,

    UnsubscribeEvents,

    /// Ping for keepalive
    Ping,
}

/// Response payloads
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ResponsePayload {
    Health(HealthStatus),
    /// The new connection is installed. `ping_error` is set when the
    /// follow-up ping failed; the handle stays in place either way.
    Connected {
        engine: EngineKind,
        latency_ms: Option<u64>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        ping_error: Option<String>,
    },
    Disconnected,
    Settings(Settings),
    Users {
        users: Vec<UserSummary>,
    },
    Report(ReportPayload),
    Presence {
        as_of: DateTime<Local>,
        entries: Vec<PresenceEntry>,
    },
    Exported(ExportOutcome),
    Exports {
        items: Vec<ExportHistoryItem>,
    },
    Subscribed {
        client_id: ClientId,
    },
    Unsubscribed,
    Pong,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::RangePreset;
    use std::time::Duration;

    #[test]
    fn request_serialization() {
        let req = Request::new(
            7,
            Command::BuildReport {
                user_ids: vec![UserId::new(1), UserId::new(2)],
                date_range: DateRangeInput::preset(RangePreset::Last),
            },
        );
        let json = serde_json::to_string(&req).unwrap();
        assert!(json.contains("\"type\":\"build_report\""));

        let parsed: Request = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed.request_id, 7);
        assert!(matches!(parsed.command, Command::BuildReport { ref user_ids, .. } if user_ids.len() == 2));
    }

    #[test]
    fn list_users_defaults() {
        let parsed: Command = serde_json::from_str(r#"{"type":"list_users"}"#).unwrap();
        assert!(matches!(
            parsed,
            Command::ListUsers { query: None, limit: None, offset: None }
        ));
    }

    #[test]
    fn error_info_from_taxonomy() {
        let timeout = ErrorInfo::from(&ClockworkError::Timeout(Duration::from_secs(15)));
        assert_eq!(timeout.code, ErrorCode::Timeout);
        assert!(timeout.retryable);

        let auth = ErrorInfo::from(&ClockworkError::connection("access denied"));
        assert_eq!(auth.code, ErrorCode::ConnectionError);
        assert!(!auth.retryable);

        let empty = ErrorInfo::from(&ClockworkError::EmptySelection);
        assert_eq!(empty.code, ErrorCode::EmptySelection);
    }

    #[test]
    fn response_serialization() {
        let resp = Response::success(3, ResponsePayload::Pong);
        let json = serde_json::to_string(&resp).unwrap();
        let parsed: Response = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed.request_id, 3);
        assert!(matches!(parsed.result, ResponseResult::Ok(ResponsePayload::Pong)));
    }

    #[test]
    fn delete_exports_accepts_opaque_ids() {
        let json = r#"{"request_id":1,"api_version":1,"command":{"type":"delete_exports","ids":["nonexistent-id"]}}"#;
        let req: Request = serde_json::from_str(json).unwrap();
        match req.command {
            Command::DeleteExports { ids } => assert_eq!(ids, vec![ExportId::from("nonexistent-id")]),
            other => panic!("unexpected command: {:?}", other),
        }
    }
}

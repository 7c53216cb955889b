//! Raw configuration schema (as parsed from TOML)

use clockwork_api::Connection;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Raw configuration as parsed from TOML
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct RawConfig {
    /// Config schema version
    pub config_version: u32,

    /// Socket and directory locations
    #[serde(default)]
    pub service: RawServiceConfig,

    /// Report computation settings
    #[serde(default)]
    pub report: RawReportConfig,

    /// Table and column names of the punch data
    #[serde(default)]
    pub source: RawSourceConfig,

    /// Connection opened at startup; takes precedence over the environment
    #[serde(default)]
    pub connection: Option<Connection>,
}

#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct RawServiceConfig {
    /// IPC socket path (default: $XDG_RUNTIME_DIR/clockwork/clockworkd.sock)
    pub socket_path: Option<PathBuf>,

    /// Data directory for the export history
    pub data_dir: Option<PathBuf>,

    pub log_dir: Option<PathBuf>,
}

#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct RawReportConfig {
    /// Offset defining calendar days, e.g. "+03:30" (default: host offset)
    pub utc_offset: Option<String>,

    /// First day of the payroll cycle (default 26)
    pub payroll_cycle_start_day: Option<u32>,

    pub query_timeout_secs: Option<u64>,

    pub default_user_limit: Option<u32>,

    pub max_user_limit: Option<u32>,
}

#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct RawSourceConfig {
    pub users_table: Option<String>,
    pub user_id_column: Option<String>,
    pub username_column: Option<String>,
    pub full_name_column: Option<String>,
    pub punches_table: Option<String>,
    pub punch_user_column: Option<String>,
    pub punch_time_column: Option<String>,
    pub punch_direction_column: Option<String>,
}

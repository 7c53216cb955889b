//! Validated configuration structures

use crate::schema::{RawConfig, RawReportConfig, RawServiceConfig, RawSourceConfig};
use clockwork_api::{Connection, Settings, SourceSchema};
use clockwork_util::{
    default_data_dir, default_log_dir, default_socket_path, format_utc_offset, system_utc_offset,
};
use std::path::PathBuf;

pub const DEFAULT_PAYROLL_START_DAY: u32 = 26;
pub const DEFAULT_QUERY_TIMEOUT_SECS: u64 = 15;
pub const DEFAULT_USER_LIMIT: u32 = 50;
pub const DEFAULT_MAX_USER_LIMIT: u32 = 500;

/// Validated configuration ready for use by the service
#[derive(Debug, Clone)]
pub struct AppConfig {
    pub service: ServiceConfig,

    /// Runtime-tunable report settings (initial values)
    pub settings: Settings,

    pub source: SourceSchema,

    /// Explicit startup connection, if configured
    pub connection: Option<Connection>,
}

impl AppConfig {
    /// Convert from raw config (after validation)
    pub fn from_raw(raw: RawConfig) -> Self {
        Self {
            settings: settings_from_raw(&raw.report),
            source: source_from_raw(&raw.source),
            service: ServiceConfig::from_raw(raw.service),
            connection: raw.connection,
        }
    }
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            service: ServiceConfig::from_raw(RawServiceConfig::default()),
            settings: default_settings(),
            source: SourceSchema::default(),
            connection: None,
        }
    }
}

/// Service locations
#[derive(Debug, Clone)]
pub struct ServiceConfig {
    pub socket_path: PathBuf,
    pub data_dir: PathBuf,
    pub log_dir: PathBuf,
}

impl ServiceConfig {
    fn from_raw(raw: RawServiceConfig) -> Self {
        Self {
            socket_path: raw.socket_path.unwrap_or_else(default_socket_path),
            data_dir: raw.data_dir.unwrap_or_else(default_data_dir),
            log_dir: raw.log_dir.unwrap_or_else(default_log_dir),
        }
    }
}

/// Settings used when the config file says nothing
pub fn default_settings() -> Settings {
    settings_from_raw(&RawReportConfig::default())
}

pub(crate) fn settings_from_raw(raw: &RawReportConfig) -> Settings {
    Settings {
        utc_offset: raw
            .utc_offset
            .clone()
            .unwrap_or_else(|| format_utc_offset(&system_utc_offset())),
        payroll_cycle_start_day: raw.payroll_cycle_start_day.unwrap_or(DEFAULT_PAYROLL_START_DAY),
        query_timeout_secs: raw.query_timeout_secs.unwrap_or(DEFAULT_QUERY_TIMEOUT_SECS),
        default_user_limit: raw.default_user_limit.unwrap_or(DEFAULT_USER_LIMIT),
        max_user_limit: raw.max_user_limit.unwrap_or(DEFAULT_MAX_USER_LIMIT),
    }
}

pub(crate) fn source_from_raw(raw: &RawSourceConfig) -> SourceSchema {
    let defaults = SourceSchema::default();
    let pick = |value: &Option<String>, default: String| value.clone().unwrap_or(default);

    SourceSchema {
        users_table: pick(&raw.users_table, defaults.users_table),
        user_id_column: pick(&raw.user_id_column, defaults.user_id_column),
        username_column: pick(&raw.username_column, defaults.username_column),
        full_name_column: pick(&raw.full_name_column, defaults.full_name_column),
        punches_table: pick(&raw.punches_table, defaults.punches_table),
        punch_user_column: pick(&raw.punch_user_column, defaults.punch_user_column),
        punch_time_column: pick(&raw.punch_time_column, defaults.punch_time_column),
        punch_direction_column: pick(&raw.punch_direction_column, defaults.punch_direction_column),
    }
}

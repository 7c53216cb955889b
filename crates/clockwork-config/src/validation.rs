//! Configuration validation

use crate::schema::RawConfig;
use crate::settings::{settings_from_raw, source_from_raw};
use clockwork_api::{Settings, SourceSchema};
use clockwork_util::parse_utc_offset;
use thiserror::Error;

/// Smallest accepted payroll cycle start day. The cycle ends the day before.
pub const MIN_PAYROLL_START_DAY: u32 = 2;

/// Largest start day that exists in every month
pub const MAX_PAYROLL_START_DAY: u32 = 28;

pub const MAX_QUERY_TIMEOUT_SECS: u64 = 300;

/// Validation error
#[derive(Debug, Clone, Error)]
pub enum ValidationError {
    #[error("Invalid UTC offset '{value}': {message}")]
    InvalidUtcOffset { value: String, message: String },

    #[error("Report setting '{field}': {message}")]
    ReportError { field: &'static str, message: String },

    #[error("Source '{field}' = '{value}' is not a valid SQL identifier")]
    InvalidIdentifier { field: &'static str, value: String },

    #[error("Connection: {0}")]
    ConnectionError(String),
}

/// Validate a raw configuration
pub fn validate_config(config: &RawConfig) -> Vec<ValidationError> {
    let mut errors = validate_settings(&settings_from_raw(&config.report));

    errors.extend(validate_source(&source_from_raw(&config.source)));

    if let Some(conn) = &config.connection
        && let Err(e) = conn.validate()
    {
        errors.push(ValidationError::ConnectionError(e.to_string()));
    }

    errors
}

/// Validate runtime settings, whether loaded from file or sent by a client
pub fn validate_settings(settings: &Settings) -> Vec<ValidationError> {
    let mut errors = Vec::new();

    if let Err(message) = parse_utc_offset(&settings.utc_offset) {
        errors.push(ValidationError::InvalidUtcOffset {
            value: settings.utc_offset.clone(),
            message,
        });
    }

    if !(MIN_PAYROLL_START_DAY..=MAX_PAYROLL_START_DAY).contains(&settings.payroll_cycle_start_day) {
        errors.push(ValidationError::ReportError {
            field: "payroll_cycle_start_day",
            message: format!(
                "{} is outside {}..={}",
                settings.payroll_cycle_start_day, MIN_PAYROLL_START_DAY, MAX_PAYROLL_START_DAY
            ),
        });
    }

    if !(1..=MAX_QUERY_TIMEOUT_SECS).contains(&settings.query_timeout_secs) {
        errors.push(ValidationError::ReportError {
            field: "query_timeout_secs",
            message: format!("must be between 1 and {}", MAX_QUERY_TIMEOUT_SECS),
        });
    }

    if settings.max_user_limit == 0 {
        errors.push(ValidationError::ReportError {
            field: "max_user_limit",
            message: "must be at least 1".into(),
        });
    }

    if settings.default_user_limit == 0 || settings.default_user_limit > settings.max_user_limit {
        errors.push(ValidationError::ReportError {
            field: "default_user_limit",
            message: format!("must be between 1 and max_user_limit ({})", settings.max_user_limit),
        });
    }

    errors
}

fn validate_source(source: &SourceSchema) -> Vec<ValidationError> {
    source
        .identifiers()
        .into_iter()
        .filter(|(_, value)| !is_sql_identifier(value))
        .map(|(field, value)| ValidationError::InvalidIdentifier {
            field,
            value: value.to_string(),
        })
        .collect()
}

/// A plain (`punches`) or dotted (`hr.punches`) identifier made of ASCII
/// letters, digits and underscores, never starting with a digit.
pub fn is_sql_identifier(s: &str) -> bool {
    !s.is_empty()
        && s.split('.').all(|part| {
            let mut chars = part.chars();
            matches!(chars.next(), Some(c) if c.is_ascii_alphabetic() || c == '_')
                && chars.all(|c| c.is_ascii_alphanumeric() || c == '_')
        })
}

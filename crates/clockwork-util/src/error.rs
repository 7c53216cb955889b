//! Error types for clockwork

use std::time::Duration;
use thiserror::Error;

/// Core error type for clockwork operations
///
/// Validation errors (`EmptySelection`, `InvalidRange`, `Validation`) are
/// raised before any I/O is attempted. Only `Timeout` is worth retrying.
#[derive(Debug, Error)]
pub enum ClockworkError {
    #[error("Connection error: {0}")]
    Connection(String),

    #[error("Unsupported engine: {0}")]
    UnsupportedEngine(String),

    #[error("Not connected")]
    NotConnected,

    #[error("Connection closed")]
    ConnectionClosed,

    #[error("Query error: {0}")]
    Query(String),

    #[error("Timed out after {0:?}")]
    Timeout(Duration),

    #[error("No users selected")]
    EmptySelection,

    #[error("Invalid range: {0}")]
    InvalidRange(String),

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Calendar error: {0}")]
    Calendar(String),

    #[error("Store error: {0}")]
    Store(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl ClockworkError {
    pub fn connection(msg: impl Into<String>) -> Self {
        Self::Connection(msg.into())
    }

    pub fn query(msg: impl Into<String>) -> Self {
        Self::Query(msg.into())
    }

    pub fn invalid_range(msg: impl Into<String>) -> Self {
        Self::InvalidRange(msg.into())
    }

    pub fn validation(msg: impl Into<String>) -> Self {
        Self::Validation(msg.into())
    }

    pub fn calendar(msg: impl Into<String>) -> Self {
        Self::Calendar(msg.into())
    }

    pub fn store(msg: impl Into<String>) -> Self {
        Self::Store(msg.into())
    }

    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config(msg.into())
    }

    pub fn internal(msg: impl Into<String>) -> Self {
        Self::Internal(msg.into())
    }

    /// Whether a caller may retry the failed operation as-is
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Timeout(_))
    }
}

pub type ClockworkResult<T> = Result<T, ClockworkError>;

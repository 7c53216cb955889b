//! Engine error types

use clockwork_util::ClockworkError;
use std::time::Duration;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum EngineError {
    #[error("Connection failed: {0}")]
    Connection(String),

    #[error("Query failed: {0}")]
    Query(String),

    #[error("Timed out after {0:?}")]
    Timeout(Duration),

    #[error("Handle is closed")]
    Closed,
}

pub type EngineResult<T> = Result<T, EngineError>;

impl From<EngineError> for ClockworkError {
    fn from(err: EngineError) -> Self {
        match err {
            EngineError::Connection(msg) => ClockworkError::Connection(msg),
            EngineError::Query(msg) => ClockworkError::Query(msg),
            EngineError::Timeout(after) => ClockworkError::Timeout(after),
            EngineError::Closed => ClockworkError::ConnectionClosed,
        }
    }
}

impl From<rusqlite::Error> for EngineError {
    fn from(e: rusqlite::Error) -> Self {
        EngineError::Query(e.to_string())
    }
}

/// Classify a sqlx error raised while opening a pool
pub(crate) fn connect_error(e: sqlx::Error) -> EngineError {
    EngineError::Connection(e.to_string())
}

/// Classify a sqlx error raised by a ping or query
pub(crate) fn query_error(e: sqlx::Error) -> EngineError {
    match e {
        sqlx::Error::PoolClosed => EngineError::Closed,
        sqlx::Error::Io(_) | sqlx::Error::Tls(_) | sqlx::Error::PoolTimedOut => {
            EngineError::Connection(e.to_string())
        }
        other => EngineError::Query(other.to_string()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn converts_into_taxonomy() {
        let err: ClockworkError = EngineError::Timeout(Duration::from_secs(2)).into();
        assert!(err.is_retryable());

        let err: ClockworkError = EngineError::Closed.into();
        assert!(matches!(err, ClockworkError::ConnectionClosed));

        let err: ClockworkError = EngineError::Query("no such table: punches".into()).into();
        assert!(matches!(err, ClockworkError::Query(msg) if msg.contains("punches")));
    }

    #[test]
    fn sqlx_classification() {
        assert!(matches!(query_error(sqlx::Error::PoolClosed), EngineError::Closed));
        assert!(matches!(query_error(sqlx::Error::RowNotFound), EngineError::Query(_)));
        assert!(matches!(
            query_error(sqlx::Error::PoolTimedOut),
            EngineError::Connection(_)
        ));
    }
}

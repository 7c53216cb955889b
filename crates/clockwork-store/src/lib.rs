//! Export history ledger for clockworkd
//!
//! Every successfully written export artifact is recorded once, listed
//! newest first, and removed only by explicit delete or clear.

mod sqlite;
mod traits;

pub use sqlite::*;
pub use traits::*;

use clockwork_util::ClockworkError;
use thiserror::Error;

/// Store errors
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("Database error: {0}")]
    Database(String),

    #[error("Corrupt history row {id}: {message}")]
    Corrupt { id: String, message: String },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl From<rusqlite::Error> for StoreError {
    fn from(e: rusqlite::Error) -> Self {
        StoreError::Database(e.to_string())
    }
}

impl From<StoreError> for ClockworkError {
    fn from(e: StoreError) -> Self {
        ClockworkError::Store(e.to_string())
    }
}

pub type StoreResult<T> = Result<T, StoreError>;

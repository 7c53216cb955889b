//! Unix socket transport between clockworkd and its clients
//!
//! Each line on the socket is one JSON document: requests from clients,
//! responses and events from the service. Clients that subscribe receive
//! events on the same connection.

mod client;
mod server;

pub use client::*;
pub use server::*;

use clockwork_api::ErrorCode;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum IpcError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Connection closed")]
    ConnectionClosed,

    #[error("Server error: {0}")]
    ServerError(String),

    /// The service answered with an error response
    #[error("Request rejected ({code:?}): {message}")]
    Rejected { code: ErrorCode, message: String },
}

pub type IpcResult<T> = Result<T, IpcError>;

//! Protocol types for clockwork
//!
//! This crate defines the data model shared by every layer and the stable
//! API between clockworkd and its clients:
//! - Connection, punch, report, presence and export-history types
//! - Commands (requests from clients) and responses
//! - Events (service -> clients)
//! - Versioning

mod commands;
mod events;
mod types;

pub use commands::*;
pub use events::*;
pub use types::*;

/// Current API version
pub const API_VERSION: u32 = 1;

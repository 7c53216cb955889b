//! Shared utilities for clockwork
//!
//! This crate provides:
//! - ID types (UserId, ExportId, ClientId)
//! - The error taxonomy shared by every layer
//! - Wall-clock helpers with mock time support
//! - The solar (Jalali) calendar capability
//! - Default paths for socket, data, and log directories

mod calendar;
mod error;
mod ids;
mod paths;
mod time;

pub use calendar::*;
pub use error::*;
pub use ids::*;
pub use paths::*;
pub use time::*;

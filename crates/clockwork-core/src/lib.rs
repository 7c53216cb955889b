//! Attendance core for clockworkd
//!
//! This crate holds everything between the wire protocol and the drivers:
//! - Date range resolution (presets, payroll cycle, solar input)
//! - The single active database connection and its lifecycle
//! - Engine-agnostic attendance queries
//! - Report pairing and totals
//! - Presence as of an instant
//! - Export rendering and history recording

mod calendar;
mod connection;
mod export;
mod presence;
mod queries;
mod report;

pub use calendar::*;
pub use connection::*;
pub use export::*;
pub use presence::*;
pub use queries::*;
pub use report::*;

//! clockworkd service wiring
//!
//! The binary in `main.rs` parses arguments, loads configuration and hands
//! a [`Service`] to the IPC loop. Keeping the service in a library lets the
//! integration tests drive it directly.

mod service;

pub use service::*;

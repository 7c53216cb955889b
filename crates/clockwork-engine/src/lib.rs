//! SQL engine drivers for clockwork
//!
//! This crate provides:
//! - A canonical query description ([`QuerySpec`]) and its rows
//! - Per-engine SQL rendering ([`Dialect`])
//! - Drivers for MySQL/MariaDB and PostgreSQL (sqlx) and SQLite (rusqlite)
//! - [`EngineHandle`], the uniform connect/ping/query/close contract

mod dialect;
mod driver;
mod error;
mod mysql;
mod postgres;
mod query;
mod sqlite;

pub use dialect::*;
pub use driver::*;
pub use error::*;
pub use mysql::MySqlDriver;
pub use postgres::PostgresDriver;
pub use query::{QueryRows, QuerySpec, SqlParam};
pub use sqlite::SqliteDriver;

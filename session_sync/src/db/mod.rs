//! Database module for session_sync
//!
//! This module holds the driver boundary, the value model shared by sessions and the
//! schema engine, and the sqlx-backed SQLite driver.

pub mod driver;
pub mod params;
pub mod sqlite;
pub mod value;

// Re-export key types
pub use driver::{Connection, ConnectionFactory, IsolationLevel, SchemaCollection};
pub use sqlite::SqliteFactory;
pub use value::{row_value, Param, ResultSet, Row, Value};

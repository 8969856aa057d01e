//! Driver boundary
//!
//! The session and schema engine never construct provider objects themselves. They
//! open connections through a [`ConnectionFactory`] and talk to them through the
//! [`Connection`] trait.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;

use crate::db::value::{Param, ResultSet};
use crate::error::Result;
use crate::schema::dialect::Dialect;

/// Transaction isolation level requested on `begin`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum IsolationLevel {
    ReadUncommitted,
    #[default]
    ReadCommitted,
    RepeatableRead,
    Serializable,
}

impl fmt::Display for IsolationLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            IsolationLevel::ReadUncommitted => "read uncommitted",
            IsolationLevel::ReadCommitted => "read committed",
            IsolationLevel::RepeatableRead => "repeatable read",
            IsolationLevel::Serializable => "serializable",
        };
        f.write_str(name)
    }
}

/// Provider-neutral schema metadata collections
///
/// Each collection is returned as a [`ResultSet`] with upper-case column names:
///
/// - `Tables`: `TABLE_NAME`, `TABLE_TYPE`
/// - `Columns`: `TABLE_NAME`, `COLUMN_NAME`, `ORDINAL_POSITION`, `DATA_TYPE`,
///   `IS_NULLABLE`, `COLUMN_DEFAULT`, `PRIMARY_KEY`, `AUTOINCREMENT`
/// - `IndexColumns`: `TABLE_NAME`, `INDEX_NAME`, `COLUMN_NAME`, `ORDINAL_POSITION`,
///   `UNIQUE`, `PRIMARY_KEY`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SchemaCollection {
    Tables,
    Columns,
    IndexColumns,
}

impl SchemaCollection {
    pub fn name(&self) -> &'static str {
        match self {
            SchemaCollection::Tables => "Tables",
            SchemaCollection::Columns => "Columns",
            SchemaCollection::IndexColumns => "IndexColumns",
        }
    }
}

/// An open physical connection
///
/// Statement text uses `@name` placeholders; parameters are matched by name.
#[async_trait]
pub trait Connection: Send {
    /// Start a physical transaction
    async fn begin(&mut self, isolation: IsolationLevel) -> Result<()>;

    /// Commit the open transaction
    async fn commit(&mut self) -> Result<()>;

    /// Roll back the open transaction
    async fn rollback(&mut self) -> Result<()>;

    /// Run a non-query statement, returning the affected-row count
    async fn execute(&mut self, sql: &str, params: &[Param]) -> Result<u64>;

    /// Run a query and materialize every row
    async fn query(&mut self, sql: &str, params: &[Param]) -> Result<ResultSet>;

    /// Read a schema collection, optionally restricted to one table
    async fn schema(&mut self, collection: SchemaCollection, table: Option<&str>)
        -> Result<ResultSet>;

    /// Release the connection
    async fn close(self: Box<Self>) -> Result<()>;
}

/// Opens connections for one database
#[async_trait]
pub trait ConnectionFactory: Send + Sync {
    /// SQL dialect spoken by connections from this factory
    fn dialect(&self) -> Arc<dyn Dialect>;

    /// Open (or check out) a physical connection
    async fn open(&self) -> Result<Box<dyn Connection>>;
}

//! SQL dialects
//!
//! A dialect knows the database-specific pieces of SQL text: identifier quoting,
//! type names, auto-increment syntax, pagination, transaction start, and how to read
//! back a generated identity value.

use crate::db::driver::IsolationLevel;
use crate::error::Result;
use crate::schema::type_map::TypeMap;
use crate::schema::types::ColumnModel;

/// Trait for database-specific SQL text
pub trait Dialect: Send + Sync {
    /// Returns the dialect name
    fn name(&self) -> &'static str;

    /// Logical → physical type table
    fn type_map(&self) -> &TypeMap;

    /// Keyword placed after `PRIMARY KEY` on identity columns
    fn auto_increment_keyword(&self) -> &'static str;

    /// Query returning the identity generated by the last insert on this connection
    fn last_insert_id_sql(&self) -> &'static str;

    /// Statement that opens a transaction at the given isolation level
    fn begin_sql(&self, isolation: IsolationLevel) -> String;

    /// Name prefixes of tables owned by the database engine itself
    fn system_table_prefixes(&self) -> &'static [&'static str];

    /// Type forced onto identity primary keys, when the engine requires one
    fn identity_type(&self) -> Option<&'static str> {
        None
    }

    /// Quote an identifier (table name, column name, etc.)
    fn quote_identifier(&self, name: &str) -> String {
        format!("\"{}\"", name.replace('"', "\"\""))
    }

    /// Placeholder text for a named parameter
    fn placeholder(&self, name: &str) -> String {
        format!("@{}", name)
    }

    /// SQL type text for a column
    fn column_type(&self, column: &ColumnModel) -> Result<String> {
        match self.identity_type() {
            Some(forced) if column.identity && column.primary_key => Ok(forced.to_string()),
            _ => self.type_map().sql_type(column),
        }
    }

    /// Append `LIMIT … OFFSET …` to a query
    fn paginate(&self, sql: &str, offset: u64, limit: u64) -> String {
        format!("{} LIMIT {} OFFSET {}", sql.trim_end().trim_end_matches(';'), limit, offset)
    }

    fn is_system_table(&self, name: &str) -> bool {
        let lower = name.to_lowercase();
        self.system_table_prefixes()
            .iter()
            .any(|prefix| lower.starts_with(prefix))
    }
}

/// SQLite dialect
#[derive(Debug, Clone, Default)]
pub struct SqliteDialect {
    type_map: TypeMap,
}

impl SqliteDialect {
    pub fn new() -> Self {
        Self {
            type_map: TypeMap::standard(),
        }
    }

    pub fn with_type_map(type_map: TypeMap) -> Self {
        Self { type_map }
    }
}

impl Dialect for SqliteDialect {
    fn name(&self) -> &'static str {
        "sqlite"
    }

    fn type_map(&self) -> &TypeMap {
        &self.type_map
    }

    fn auto_increment_keyword(&self) -> &'static str {
        "AUTOINCREMENT"
    }

    fn last_insert_id_sql(&self) -> &'static str {
        "SELECT last_insert_rowid()"
    }

    // SQLite has no isolation levels; stronger levels take the write lock earlier.
    fn begin_sql(&self, isolation: IsolationLevel) -> String {
        match isolation {
            IsolationLevel::ReadUncommitted | IsolationLevel::ReadCommitted => "BEGIN DEFERRED",
            IsolationLevel::RepeatableRead => "BEGIN IMMEDIATE",
            IsolationLevel::Serializable => "BEGIN EXCLUSIVE",
        }
        .to_string()
    }

    fn system_table_prefixes(&self) -> &'static [&'static str] {
        &["sqlite_"]
    }

    // AUTOINCREMENT is only accepted on an `INTEGER PRIMARY KEY`.
    fn identity_type(&self) -> Option<&'static str> {
        Some("INTEGER")
    }
}

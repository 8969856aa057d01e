//! Database schema analyzer
//!
//! This module reads existing tables back into [`TableModel`]s through the
//! provider-neutral schema collections of the driver boundary.

use std::sync::Arc;
use tracing::{debug, warn};

use crate::db::driver::{Connection, ConnectionFactory, SchemaCollection};
use crate::db::value::{ResultSet, Value};
use crate::error::{Error, Result};
use crate::schema::dialect::Dialect;
use crate::schema::types::{ColumnModel, IndexModel, TableModel};
use crate::utils::naming::contains_ignore_case;

/// Schema analyzer for database schema introspection
pub struct SchemaAnalyzer {
    factory: Arc<dyn ConnectionFactory>,
}

impl SchemaAnalyzer {
    /// Create a new schema analyzer
    pub fn new(factory: Arc<dyn ConnectionFactory>) -> Self {
        Self { factory }
    }

    /// Read existing user tables, optionally only the named ones (ignoring case)
    ///
    /// A table whose columns or indexes cannot be read is logged and skipped.
    pub async fn get_tables(&self, names: Option<&[&str]>) -> Result<Vec<TableModel>> {
        let dialect = self.factory.dialect();
        let mut conn = self.factory.open().await?;

        let result = read_tables(conn.as_mut(), dialect.as_ref(), names).await;

        if let Err(e) = conn.close().await {
            warn!(error = %e, "Failed to close introspection connection");
        }
        result
    }
}

async fn read_tables(
    conn: &mut dyn Connection,
    dialect: &dyn Dialect,
    names: Option<&[&str]>,
) -> Result<Vec<TableModel>> {
    let listing = conn.schema(SchemaCollection::Tables, None).await?;
    let mut tables = Vec::new();

    for row in 0..listing.len() {
        let Some(name) = listing.get(row, "TABLE_NAME").and_then(Value::as_str) else {
            continue;
        };

        if dialect.is_system_table(name) {
            continue;
        }
        if let Some(wanted) = names {
            if !contains_ignore_case(wanted, name) {
                continue;
            }
        }

        match read_table(conn, dialect, name).await {
            Ok(table) => {
                debug!(
                    table = %table.name,
                    columns = table.columns.len(),
                    indexes = table.indexes.len(),
                    "Analyzed table"
                );
                tables.push(table);
            }
            Err(e) => warn!(table = name, error = %e, "Skipping table whose schema could not be read"),
        }
    }

    Ok(tables)
}

async fn read_table(
    conn: &mut dyn Connection,
    dialect: &dyn Dialect,
    name: &str,
) -> Result<TableModel> {
    let mut table = TableModel::new(name);

    let columns = conn.schema(SchemaCollection::Columns, Some(name)).await?;
    for row in 0..columns.len() {
        table.add_column(read_column(&columns, row, dialect)?);
    }

    if table.columns.is_empty() {
        return Err(Error::SchemaAnalysisError(format!(
            "Table '{}' reported no columns",
            name
        )));
    }

    let index_columns = conn.schema(SchemaCollection::IndexColumns, Some(name)).await?;
    table.indexes = read_indexes(&index_columns)?;

    Ok(table)
}

fn read_column(columns: &ResultSet, row: usize, dialect: &dyn Dialect) -> Result<ColumnModel> {
    let name = required_text(columns, row, "COLUMN_NAME")?;
    let declared = columns
        .get(row, "DATA_TYPE")
        .and_then(Value::as_str)
        .unwrap_or_default();
    let parsed = dialect.type_map().parse(declared);

    let mut column = ColumnModel::new(name, parsed.db_type);
    column.length = parsed.length;
    column.precision = parsed.precision;
    column.scale = parsed.scale;
    column.nullable = flag(columns.get(row, "IS_NULLABLE"));
    column.primary_key = flag(columns.get(row, "PRIMARY_KEY"));
    column.identity = flag(columns.get(row, "AUTOINCREMENT"));
    column.default = columns
        .get(row, "COLUMN_DEFAULT")
        .and_then(Value::as_str)
        .map(str::to_string);

    Ok(column)
}

// Rows arrive ordered by index then position. Primary-key indexes are not part of
// the model; the key lives on the columns.
fn read_indexes(rows: &ResultSet) -> Result<Vec<IndexModel>> {
    let mut indexes: Vec<IndexModel> = Vec::new();

    for row in 0..rows.len() {
        if flag(rows.get(row, "PRIMARY_KEY")) {
            continue;
        }

        let index_name = required_text(rows, row, "INDEX_NAME")?;
        let column = required_text(rows, row, "COLUMN_NAME")?;

        match indexes
            .iter_mut()
            .find(|i| i.name.as_deref() == Some(index_name))
        {
            Some(index) => index.columns.push(column.to_string()),
            None => {
                let mut index = IndexModel::new(&[column]).named(index_name);
                index.unique = flag(rows.get(row, "UNIQUE"));
                indexes.push(index);
            }
        }
    }

    Ok(indexes)
}

fn required_text<'r>(rows: &'r ResultSet, row: usize, column: &str) -> Result<&'r str> {
    rows.get(row, column)
        .and_then(Value::as_str)
        .ok_or_else(|| Error::SchemaAnalysisError(format!("Missing {} in schema row", column)))
}

// Providers report flags as booleans, integers or YES/NO text.
fn flag(value: Option<&Value>) -> bool {
    match value {
        Some(Value::Text(s)) => matches!(s.to_ascii_uppercase().as_str(), "YES" | "TRUE" | "1"),
        Some(v) => v.as_bool().unwrap_or(false),
        None => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::dialect::SqliteDialect;
    use crate::schema::types::DbType;
    use pretty_assertions::assert_eq;

    fn result_set(columns: &[&str], rows: Vec<Vec<Value>>) -> ResultSet {
        let mut rs = ResultSet::new(columns.iter().map(|c| c.to_string()).collect());
        rs.rows = rows;
        rs
    }

    #[test]
    fn test_read_column() {
        let rs = result_set(
            &["COLUMN_NAME", "DATA_TYPE", "IS_NULLABLE", "COLUMN_DEFAULT", "PRIMARY_KEY", "AUTOINCREMENT"],
            vec![vec![
                Value::from("name"),
                Value::from("VARCHAR(50)"),
                Value::from("YES"),
                Value::Null,
                Value::Int(0),
                Value::Int(0),
            ]],
        );

        let column = read_column(&rs, 0, &SqliteDialect::new()).unwrap();
        assert_eq!(column.name, "name");
        assert_eq!(column.db_type, DbType::String);
        assert_eq!(column.length, Some(50));
        assert!(column.nullable);
        assert!(!column.primary_key);
        assert_eq!(column.default, None);
    }

    #[test]
    fn test_read_indexes_groups_columns_and_skips_primary_key() {
        let rs = result_set(
            &["INDEX_NAME", "COLUMN_NAME", "UNIQUE", "PRIMARY_KEY"],
            vec![
                vec![Value::from("IX_T_a_b"), Value::from("a"), Value::Int(1), Value::Int(0)],
                vec![Value::from("IX_T_a_b"), Value::from("b"), Value::Int(1), Value::Int(0)],
                vec![Value::from("sqlite_autoindex_T_1"), Value::from("id"), Value::Int(1), Value::Int(1)],
            ],
        );

        let indexes = read_indexes(&rs).unwrap();
        assert_eq!(indexes.len(), 1);
        assert_eq!(indexes[0].name.as_deref(), Some("IX_T_a_b"));
        assert_eq!(indexes[0].columns, vec!["a".to_string(), "b".to_string()]);
        assert!(indexes[0].unique);
    }

    #[test]
    fn test_flag_values() {
        assert!(flag(Some(&Value::Bool(true))));
        assert!(flag(Some(&Value::Int(1))));
        assert!(flag(Some(&Value::from("yes"))));
        assert!(!flag(Some(&Value::from("NO"))));
        assert!(!flag(Some(&Value::Null)));
        assert!(!flag(None));
    }
}

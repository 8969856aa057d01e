//! DDL generator
//!
//! Pure string assembly of CREATE TABLE, ALTER TABLE … ADD, CREATE INDEX and the
//! DROP … IF EXISTS statements. Nothing here touches a connection.

use crate::error::Result;
use crate::schema::dialect::Dialect;
use crate::schema::types::{ColumnModel, IndexModel, TableModel};
use crate::utils::naming::{get_index_name, INDEX_NAME_PATTERN};

/// DDL statement generator for one dialect
pub struct DdlGenerator<'a> {
    dialect: &'a dyn Dialect,
}

impl<'a> DdlGenerator<'a> {
    /// Create a new DDL generator
    pub fn new(dialect: &'a dyn Dialect) -> Self {
        Self { dialect }
    }

    /// Column clause: name, type, PRIMARY KEY, auto-increment, NOT NULL, DEFAULT
    ///
    /// The primary key is declared inline only when it is the table's single key
    /// column; composite keys become a table constraint.
    pub fn column_definition(&self, table: &TableModel, column: &ColumnModel) -> Result<String> {
        let mut parts = vec![
            self.dialect.quote_identifier(column.physical_name()),
            self.dialect.column_type(column)?,
        ];

        let inline_pk = column.primary_key && table.primary_keys().len() == 1;
        if inline_pk {
            parts.push("PRIMARY KEY".to_string());
            if column.identity {
                parts.push(self.dialect.auto_increment_keyword().to_string());
            }
        }

        if !column.nullable {
            parts.push("NOT NULL".to_string());
        }

        if let Some(default) = &column.default {
            parts.push(format!("DEFAULT {}", default));
        }

        Ok(parts.join(" "))
    }

    /// Generate SQL to create a table (indexes are separate statements)
    pub fn create_table_sql(&self, table: &TableModel) -> Result<String> {
        let mut definitions = table
            .columns
            .iter()
            .map(|column| {
                self.column_definition(table, column)
                    .map(|def| format!("  {}", def))
            })
            .collect::<Result<Vec<_>>>()?;

        let primary_keys = table.primary_keys();
        if primary_keys.len() > 1 {
            let pk_columns: Vec<String> = primary_keys
                .iter()
                .map(|c| self.dialect.quote_identifier(c.physical_name()))
                .collect();
            definitions.push(format!("  PRIMARY KEY ({})", pk_columns.join(", ")));
        }

        Ok(format!(
            "CREATE TABLE {} (\n{}\n)",
            self.dialect.quote_identifier(&table.name),
            definitions.join(",\n")
        ))
    }

    /// Generate SQL to add one column to an existing table
    pub fn add_column_sql(&self, table: &TableModel, column: &ColumnModel) -> Result<String> {
        Ok(format!(
            "ALTER TABLE {} ADD {}",
            self.dialect.quote_identifier(&table.name),
            self.column_definition(table, column)?
        ))
    }

    /// Name of an index, generated as `IX_<table>_<columns>` when not supplied
    pub fn index_name(&self, table: &TableModel, index: &IndexModel) -> String {
        match &index.name {
            Some(name) => name.clone(),
            None => get_index_name(
                INDEX_NAME_PATTERN,
                &table.name,
                &self.index_columns(table, index),
            ),
        }
    }

    /// Generate SQL to create an index
    pub fn create_index_sql(&self, table: &TableModel, index: &IndexModel) -> String {
        let unique = if index.unique { "UNIQUE " } else { "" };
        let columns: Vec<String> = self
            .index_columns(table, index)
            .iter()
            .map(|c| self.dialect.quote_identifier(c))
            .collect();

        format!(
            "CREATE {}INDEX {} ON {} ({})",
            unique,
            self.dialect.quote_identifier(&self.index_name(table, index)),
            self.dialect.quote_identifier(&table.name),
            columns.join(", ")
        )
    }

    /// Generate SQL to drop a table
    pub fn drop_table_sql(&self, table_name: &str) -> String {
        format!(
            "DROP TABLE IF EXISTS {}",
            self.dialect.quote_identifier(table_name)
        )
    }

    /// Generate SQL to drop an index
    pub fn drop_index_sql(&self, index_name: &str) -> String {
        format!(
            "DROP INDEX IF EXISTS {}",
            self.dialect.quote_identifier(index_name)
        )
    }

    // Index columns may be given by logical name; DDL needs the physical one.
    fn index_columns(&self, table: &TableModel, index: &IndexModel) -> Vec<String> {
        index
            .columns
            .iter()
            .map(|name| {
                table
                    .column(name)
                    .map(|c| c.physical_name().to_string())
                    .unwrap_or_else(|| name.clone())
            })
            .collect()
    }
}

//! Schema difference calculator
//!
//! This module compares the introspected tables with the desired table models and
//! calculates the additive changes allowed by a [`MigrationMode`]. Nothing is ever
//! dropped or altered in place.

use crate::error::Result;
use crate::schema::generator::DdlGenerator;
use crate::schema::migrator::MigrationMode;
use crate::schema::types::{ColumnModel, IndexModel, TableModel};

/// Changes needed on a table that already exists
#[derive(Debug, Clone)]
pub struct TableAlteration {
    /// The desired model of the table
    pub table: TableModel,
    pub columns_to_add: Vec<ColumnModel>,
    pub indices_to_create: Vec<IndexModel>,
}

/// Represents changes needed to bring the database up to the desired models
#[derive(Debug, Clone, Default)]
pub struct SchemaDiff {
    pub tables_to_create: Vec<TableModel>,
    pub tables_to_alter: Vec<TableAlteration>,
}

impl SchemaDiff {
    /// Generate a schema diff between the current tables and the desired ones
    pub fn generate(
        current: &[TableModel],
        target: &[TableModel],
        mode: MigrationMode,
        generator: &DdlGenerator<'_>,
    ) -> Self {
        let mut diff = Self::default();

        if mode < MigrationMode::CreateOnly {
            return diff;
        }

        for desired in target {
            let existing = current
                .iter()
                .find(|t| t.name.eq_ignore_ascii_case(&desired.name));

            let Some(existing) = existing else {
                diff.tables_to_create.push(desired.clone());
                continue;
            };

            if mode < MigrationMode::Full {
                continue;
            }

            let columns_to_add: Vec<ColumnModel> = desired
                .columns
                .iter()
                .filter(|c| !existing.has_column(c.physical_name()))
                .cloned()
                .collect();

            let indices_to_create: Vec<IndexModel> = desired
                .indexes
                .iter()
                .filter(|index| {
                    let name = generator.index_name(desired, index);
                    !existing
                        .indexes
                        .iter()
                        .any(|i| i.name.as_deref().map_or(false, |n| n.eq_ignore_ascii_case(&name)))
                })
                .cloned()
                .collect();

            if !columns_to_add.is_empty() || !indices_to_create.is_empty() {
                diff.tables_to_alter.push(TableAlteration {
                    table: desired.clone(),
                    columns_to_add,
                    indices_to_create,
                });
            }
        }

        diff
    }

    /// DDL statements in execution order
    ///
    /// Each created table is followed by its indexes; added columns precede the
    /// indexes that may reference them.
    pub fn statements(&self, generator: &DdlGenerator<'_>) -> Result<Vec<String>> {
        let mut statements = Vec::new();

        for table in &self.tables_to_create {
            statements.push(generator.create_table_sql(table)?);
            for index in &table.indexes {
                statements.push(generator.create_index_sql(table, index));
            }
        }

        for alteration in &self.tables_to_alter {
            for column in &alteration.columns_to_add {
                statements.push(generator.add_column_sql(&alteration.table, column)?);
            }
            for index in &alteration.indices_to_create {
                statements.push(generator.create_index_sql(&alteration.table, index));
            }
        }

        Ok(statements)
    }

    /// Check if the diff is empty (no changes needed)
    pub fn is_empty(&self) -> bool {
        self.tables_to_create.is_empty() && self.tables_to_alter.is_empty()
    }
}

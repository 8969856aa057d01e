//! Batch insert, update and upsert
//!
//! Each operation builds one parameterized statement per table and column set and
//! runs it once per row on a single leased connection. Batches are not implicitly
//! transactional; wrap them in a transaction to get all-or-nothing behavior.

use tracing::debug;

use crate::db::driver::Connection;
use crate::db::value::{row_value, Param, Row, Value};
use crate::error::{Error, Result};
use crate::schema::dialect::Dialect;
use crate::schema::types::{ColumnModel, TableModel};
use crate::session::manager::Session;

const KEY_PARAM: &str = "pk";

/// A statement plus the columns feeding its parameters
#[derive(Debug, Clone, PartialEq)]
pub struct StatementTemplate {
    pub sql: String,
    bindings: Vec<(String, ColumnModel)>,
}

impl StatementTemplate {
    /// Parameter values for one row; absent columns bind as NULL
    pub fn params_for(&self, row: &Row) -> Vec<Param> {
        self.bindings
            .iter()
            .map(|(param, column)| (param.clone(), column_value(row, column)))
            .collect()
    }
}

fn column_value(row: &Row, column: &ColumnModel) -> Value {
    row_value(row, &column.name)
        .or_else(|| row_value(row, column.physical_name()))
        .cloned()
        .unwrap_or(Value::Null)
}

fn key_column(table: &TableModel) -> Result<&ColumnModel> {
    table.primary_keys().into_iter().next().ok_or_else(|| {
        Error::InvalidModel(format!("Table '{}' has no primary key", table.name))
    })
}

/// `INSERT INTO "t" ("a", "b") VALUES (@p0, @p1)`, skipping identity columns
pub fn insert_template(dialect: &dyn Dialect, table: &TableModel) -> StatementTemplate {
    let columns: Vec<&ColumnModel> = table.columns.iter().filter(|c| !c.identity).collect();
    let quoted_table = dialect.quote_identifier(&table.name);

    if columns.is_empty() {
        return StatementTemplate {
            sql: format!("INSERT INTO {} DEFAULT VALUES", quoted_table),
            bindings: Vec::new(),
        };
    }

    let bindings: Vec<(String, ColumnModel)> = columns
        .iter()
        .enumerate()
        .map(|(i, c)| (format!("p{}", i), (*c).clone()))
        .collect();

    let names: Vec<String> = columns
        .iter()
        .map(|c| dialect.quote_identifier(c.physical_name()))
        .collect();
    let values: Vec<String> = bindings.iter().map(|(p, _)| dialect.placeholder(p)).collect();

    StatementTemplate {
        sql: format!(
            "INSERT INTO {} ({}) VALUES ({})",
            quoted_table,
            names.join(", "),
            values.join(", ")
        ),
        bindings,
    }
}

/// `UPDATE "t" SET "a" = @p0 WHERE "id" = @pk`
///
/// SET covers the non-key columns, or only those named in `only`. The first primary
/// key column is the predicate.
pub fn update_template(
    dialect: &dyn Dialect,
    table: &TableModel,
    only: Option<&[&str]>,
) -> Result<StatementTemplate> {
    let key = key_column(table)?;

    let columns: Vec<&ColumnModel> = table
        .columns
        .iter()
        .filter(|c| !c.primary_key)
        .filter(|c| only.map_or(true, |names| names.iter().any(|n| c.matches(n))))
        .collect();

    if columns.is_empty() {
        return Err(Error::InvalidModel(format!(
            "No columns to update in table '{}'",
            table.name
        )));
    }

    let mut bindings: Vec<(String, ColumnModel)> = columns
        .iter()
        .enumerate()
        .map(|(i, c)| (format!("p{}", i), (*c).clone()))
        .collect();

    let assignments: Vec<String> = bindings
        .iter()
        .map(|(p, c)| {
            format!(
                "{} = {}",
                dialect.quote_identifier(c.physical_name()),
                dialect.placeholder(p)
            )
        })
        .collect();

    let sql = format!(
        "UPDATE {} SET {} WHERE {} = {}",
        dialect.quote_identifier(&table.name),
        assignments.join(", "),
        dialect.quote_identifier(key.physical_name()),
        dialect.placeholder(KEY_PARAM)
    );
    bindings.push((KEY_PARAM.to_string(), key.clone()));

    Ok(StatementTemplate { sql, bindings })
}

/// `SELECT 1 FROM "t" WHERE "id" = @pk`, limited to one row
pub fn exists_template(dialect: &dyn Dialect, table: &TableModel) -> Result<StatementTemplate> {
    let key = key_column(table)?;
    let sql = format!(
        "SELECT 1 FROM {} WHERE {} = {}",
        dialect.quote_identifier(&table.name),
        dialect.quote_identifier(key.physical_name()),
        dialect.placeholder(KEY_PARAM)
    );

    Ok(StatementTemplate {
        sql: dialect.paginate(&sql, 0, 1),
        bindings: vec![(KEY_PARAM.to_string(), key.clone())],
    })
}

async fn run_template(
    conn: &mut dyn Connection,
    template: &StatementTemplate,
    rows: &[Row],
) -> Result<u64> {
    let mut affected = 0;
    for row in rows {
        affected += conn.execute(&template.sql, &template.params_for(row)).await?;
    }
    Ok(affected)
}

struct UpsertPlan<'t> {
    key: &'t ColumnModel,
    insert: StatementTemplate,
    // None when every column is part of the key; an existing row is then left as is.
    update: Option<StatementTemplate>,
    exists: StatementTemplate,
}

async fn run_upsert(conn: &mut dyn Connection, plan: &UpsertPlan<'_>, rows: &[Row]) -> Result<u64> {
    let mut affected = 0;

    for row in rows {
        let key = column_value(row, plan.key);
        let exists = if key.is_default() {
            false
        } else {
            let found = conn.query(&plan.exists.sql, &plan.exists.params_for(row)).await?;
            !found.is_empty()
        };

        affected += match (&plan.update, exists) {
            (Some(update), true) => conn.execute(&update.sql, &update.params_for(row)).await?,
            (None, true) => 0,
            (_, false) => conn.execute(&plan.insert.sql, &plan.insert.params_for(row)).await?,
        };
    }

    Ok(affected)
}

impl Session {
    /// Insert rows, returning the total affected-row count
    ///
    /// Identity columns are never written; the database generates them.
    pub async fn insert(&mut self, table: &TableModel, rows: &[Row]) -> Result<u64> {
        if rows.is_empty() {
            return Ok(0);
        }

        let template = insert_template(self.dialect(), table);
        debug!(table = %table.name, rows = rows.len(), sql = %template.sql, "Batch insert");

        let mut lease = self.lease().await?;
        let result = run_template(lease.conn(), &template, rows).await;
        lease.release(result).await
    }

    /// Update rows by their first primary-key column
    ///
    /// With `only`, SET is restricted to those columns (primary keys are dropped from
    /// the list).
    pub async fn update(
        &mut self,
        table: &TableModel,
        rows: &[Row],
        only: Option<&[&str]>,
    ) -> Result<u64> {
        if rows.is_empty() {
            return Ok(0);
        }

        let template = update_template(self.dialect(), table, only)?;
        debug!(table = %table.name, rows = rows.len(), sql = %template.sql, "Batch update");

        let mut lease = self.lease().await?;
        let result = run_template(lease.conn(), &template, rows).await;
        lease.release(result).await
    }

    /// Update rows that exist and insert the rest
    ///
    /// A row whose key is unset (NULL or the type's zero value) is always inserted, as
    /// is every row of a table without a primary key.
    pub async fn upsert(&mut self, table: &TableModel, rows: &[Row]) -> Result<u64> {
        if rows.is_empty() {
            return Ok(0);
        }

        let dialect = self.dialect.clone();
        let insert = insert_template(dialect.as_ref(), table);

        let Some(key) = table.primary_keys().into_iter().next() else {
            debug!(table = %table.name, rows = rows.len(), "Upsert without primary key, inserting");
            let mut lease = self.lease().await?;
            let result = run_template(lease.conn(), &insert, rows).await;
            return lease.release(result).await;
        };

        let has_values = table.columns.iter().any(|c| !c.primary_key);
        let plan = UpsertPlan {
            key,
            insert,
            update: if has_values {
                Some(update_template(dialect.as_ref(), table, None)?)
            } else {
                None
            },
            exists: exists_template(dialect.as_ref(), table)?,
        };
        debug!(table = %table.name, rows = rows.len(), "Batch upsert");

        let mut lease = self.lease().await?;
        let result = run_upsert(lease.conn(), &plan, rows).await;
        lease.release(result).await
    }
}

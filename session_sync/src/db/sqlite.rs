//! SQLite driver built on sqlx
//!
//! Connections are checked out of a `SqlitePool`. Schema collections are synthesized
//! from `sqlite_master` and the pragma table-valued functions.

use async_trait::async_trait;
use sqlx::pool::PoolConnection;
use sqlx::query::Query;
use sqlx::sqlite::{
    Sqlite, SqliteArguments, SqliteConnectOptions, SqlitePool, SqlitePoolOptions, SqliteRow,
};
use sqlx::{Column, Executor, Row, Statement, TypeInfo, ValueRef};
use std::str::FromStr;
use std::sync::Arc;
use std::time::Duration;

use crate::config::DatabaseConfig;
use crate::db::driver::{Connection, ConnectionFactory, IsolationLevel, SchemaCollection};
use crate::db::params::number_placeholders;
use crate::db::value::{Param, ResultSet, Value};
use crate::error::{Error, Result};
use crate::schema::dialect::{Dialect, SqliteDialect};

const TABLES_SQL: &str = r#"
    SELECT name AS TABLE_NAME, type AS TABLE_TYPE
    FROM sqlite_master
    WHERE type = 'table'
    ORDER BY name
"#;

const TABLE_SQL: &str = r#"
    SELECT name AS TABLE_NAME, type AS TABLE_TYPE
    FROM sqlite_master
    WHERE type = 'table' AND name = @table COLLATE NOCASE
"#;

const COLUMNS_SQL: &str = r#"
    SELECT
        @table AS TABLE_NAME,
        c.name AS COLUMN_NAME,
        c.cid + 1 AS ORDINAL_POSITION,
        c.type AS DATA_TYPE,
        CASE WHEN c."notnull" = 0 THEN 1 ELSE 0 END AS IS_NULLABLE,
        c.dflt_value AS COLUMN_DEFAULT,
        CASE WHEN c.pk > 0 THEN 1 ELSE 0 END AS PRIMARY_KEY,
        CASE
            WHEN c.pk = 1
                AND upper(c.type) = 'INTEGER'
                AND (SELECT COUNT(*) FROM pragma_table_info(@table) WHERE pk > 0) = 1
                AND (SELECT upper(sql) FROM sqlite_master
                     WHERE type = 'table' AND name = @table COLLATE NOCASE) LIKE '%AUTOINCREMENT%'
            THEN 1 ELSE 0
        END AS "AUTOINCREMENT"
    FROM pragma_table_info(@table) AS c
    ORDER BY c.cid
"#;

const INDEX_COLUMNS_SQL: &str = r#"
    SELECT
        @table AS TABLE_NAME,
        il.name AS INDEX_NAME,
        ii.name AS COLUMN_NAME,
        ii.seqno + 1 AS ORDINAL_POSITION,
        il."unique" AS "UNIQUE",
        CASE WHEN il.origin = 'pk' THEN 1 ELSE 0 END AS PRIMARY_KEY
    FROM pragma_index_list(@table) AS il, pragma_index_info(il.name) AS ii
    ORDER BY il.name, ii.seqno
"#;

/// Connection factory over a sqlx SQLite pool
#[derive(Clone)]
pub struct SqliteFactory {
    pool: SqlitePool,
    dialect: Arc<dyn Dialect>,
}

impl SqliteFactory {
    /// Create a pool from configuration
    pub async fn connect(config: &DatabaseConfig) -> Result<Self> {
        if config.driver != "sqlite" {
            return Err(Error::ConfigError(format!(
                "Unsupported database driver: {}",
                config.driver
            )));
        }

        let pool_size = config.pool_size.unwrap_or(10);
        let timeout_seconds = config.timeout_seconds.unwrap_or(30);

        let options = SqliteConnectOptions::from_str(&config.url)?.create_if_missing(true);
        let pool = SqlitePoolOptions::new()
            .max_connections(pool_size)
            .acquire_timeout(Duration::from_secs(timeout_seconds))
            .connect_with(options)
            .await?;

        Ok(Self::from_pool(pool))
    }

    /// Wrap an existing pool
    pub fn from_pool(pool: SqlitePool) -> Self {
        Self {
            pool,
            dialect: Arc::new(SqliteDialect::new()),
        }
    }

    /// Replace the dialect, e.g. one carrying configured type overrides
    pub fn with_dialect(mut self, dialect: Arc<dyn Dialect>) -> Self {
        self.dialect = dialect;
        self
    }

}

#[async_trait]
impl ConnectionFactory for SqliteFactory {
    fn dialect(&self) -> Arc<dyn Dialect> {
        self.dialect.clone()
    }

    async fn open(&self) -> Result<Box<dyn Connection>> {
        let conn = self.pool.acquire().await?;
        Ok(Box::new(PooledSqliteConnection {
            conn: Some(conn),
            dialect: self.dialect.clone(),
            in_transaction: false,
        }))
    }
}

/// A pooled SQLite connection
///
/// A connection dropped or closed while its transaction is still open is detached
/// from the pool so the uncommitted work dies with it.
pub struct PooledSqliteConnection {
    conn: Option<PoolConnection<Sqlite>>,
    dialect: Arc<dyn Dialect>,
    in_transaction: bool,
}

impl PooledSqliteConnection {
    fn inner(&mut self) -> Result<&mut PoolConnection<Sqlite>> {
        self.conn
            .as_mut()
            .ok_or_else(|| Error::DatabaseError("Connection already released".to_string()))
    }

    async fn run(&mut self, sql: &str) -> Result<()> {
        let conn = self.inner()?;
        sqlx::query(sql).execute(&mut **conn).await?;
        Ok(())
    }

    async fn columns_for(&mut self, table: &str) -> Result<ResultSet> {
        let params = vec![("table".to_string(), Value::from(table))];
        self.query(COLUMNS_SQL, &params).await
    }

    async fn table_names(&mut self) -> Result<Vec<String>> {
        let tables = self.query(TABLES_SQL, &[]).await?;
        Ok(tables
            .rows
            .iter()
            .filter_map(|r| r.first().and_then(Value::as_str).map(str::to_string))
            .collect())
    }

    async fn per_table(&mut self, sql: &str, table: Option<&str>) -> Result<ResultSet> {
        let tables = match table {
            Some(t) => vec![t.to_string()],
            None => self.table_names().await?,
        };

        let mut combined: Option<ResultSet> = None;
        for table in tables {
            let params = vec![("table".to_string(), Value::from(table.as_str()))];
            let rs = self.query(sql, &params).await?;
            match combined.as_mut() {
                Some(all) => all.rows.extend(rs.rows),
                None => combined = Some(rs),
            }
        }

        Ok(combined.unwrap_or_default())
    }
}

fn bind_value<'q>(
    query: Query<'q, Sqlite, SqliteArguments<'q>>,
    value: &Value,
) -> Query<'q, Sqlite, SqliteArguments<'q>> {
    match value {
        Value::Null => query.bind(None::<String>),
        Value::Bool(b) => query.bind(*b),
        Value::Int(i) => query.bind(*i),
        Value::Float(f) => query.bind(*f),
        Value::Text(s) => query.bind(s.clone()),
        Value::Blob(b) => query.bind(b.clone()),
        Value::DateTime(dt) => query.bind(*dt),
        Value::Guid(g) => query.bind(g.to_string()),
    }
}

fn decode_cell(row: &SqliteRow, index: usize) -> Result<Value> {
    let raw = row.try_get_raw(index)?;
    if raw.is_null() {
        return Ok(Value::Null);
    }

    let storage = raw.type_info().name().to_string();
    let value = match storage.as_str() {
        "INTEGER" => Value::Int(row.try_get_unchecked::<i64, _>(index)?),
        "REAL" => Value::Float(row.try_get_unchecked::<f64, _>(index)?),
        "BLOB" => Value::Blob(row.try_get_unchecked::<Vec<u8>, _>(index)?),
        _ => Value::Text(row.try_get_unchecked::<String, _>(index)?),
    };

    Ok(value)
}

#[async_trait]
impl Connection for PooledSqliteConnection {
    async fn begin(&mut self, isolation: IsolationLevel) -> Result<()> {
        let sql = self.dialect.begin_sql(isolation);
        self.run(&sql).await?;
        self.in_transaction = true;
        Ok(())
    }

    async fn commit(&mut self) -> Result<()> {
        self.run("COMMIT").await?;
        self.in_transaction = false;
        Ok(())
    }

    async fn rollback(&mut self) -> Result<()> {
        self.run("ROLLBACK").await?;
        self.in_transaction = false;
        Ok(())
    }

    async fn execute(&mut self, sql: &str, params: &[Param]) -> Result<u64> {
        let sql = number_placeholders(sql, params)?;
        let conn = self.inner()?;

        let query = params
            .iter()
            .fold(sqlx::query(&sql), |q, (_, value)| bind_value(q, value));
        let result = query.execute(&mut **conn).await?;

        Ok(result.rows_affected())
    }

    async fn query(&mut self, sql: &str, params: &[Param]) -> Result<ResultSet> {
        let sql = number_placeholders(sql, params)?;
        let conn = self.inner()?;

        let query = params
            .iter()
            .fold(sqlx::query(&sql), |q, (_, value)| bind_value(q, value));
        let rows = query.fetch_all(&mut **conn).await?;

        let columns = match rows.first() {
            Some(first) => first
                .columns()
                .iter()
                .map(|c| c.name().to_string())
                .collect(),
            // Prepare only; describing a query over pragma functions fails.
            None => {
                let prepared = (&mut **conn).prepare(sql.as_str()).await?;
                prepared
                    .columns()
                    .iter()
                    .map(|c| c.name().to_string())
                    .collect()
            }
        };

        let mut result = ResultSet::new(columns);
        for row in &rows {
            let values = (0..row.len())
                .map(|i| decode_cell(row, i))
                .collect::<Result<Vec<_>>>()?;
            result.rows.push(values);
        }

        Ok(result)
    }

    async fn schema(
        &mut self,
        collection: SchemaCollection,
        table: Option<&str>,
    ) -> Result<ResultSet> {
        tracing::debug!(collection = collection.name(), table, "Reading schema collection");
        match collection {
            SchemaCollection::Tables => match table {
                Some(t) => {
                    let params = vec![("table".to_string(), Value::from(t))];
                    self.query(TABLE_SQL, &params).await
                }
                None => self.query(TABLES_SQL, &[]).await,
            },
            SchemaCollection::Columns => match table {
                Some(t) => self.columns_for(t).await,
                None => self.per_table(COLUMNS_SQL, None).await,
            },
            SchemaCollection::IndexColumns => self.per_table(INDEX_COLUMNS_SQL, table).await,
        }
    }

    async fn close(self: Box<Self>) -> Result<()> {
        let mut this = self;
        if let Some(conn) = this.conn.take() {
            if this.in_transaction {
                drop(conn.detach());
            }
        }
        Ok(())
    }
}

impl Drop for PooledSqliteConnection {
    fn drop(&mut self) {
        if self.in_transaction {
            if let Some(conn) = self.conn.take() {
                tracing::warn!("Discarding SQLite connection with an open transaction");
                drop(conn.detach());
            }
        }
    }
}

//! Shared test helpers: a recording driver and file-backed SQLite databases

#![allow(dead_code)]

use async_trait::async_trait;
use std::sync::{Arc, Mutex};
use tempfile::TempDir;

use session_sync::config::{Config, DatabaseConfig};
use session_sync::db::{Connection, ConnectionFactory, IsolationLevel, SchemaCollection};
use session_sync::schema::{Dialect, SqliteDialect};
use session_sync::{Database, Error, Param, ResultSet, Result, Value};

/// Everything the recording driver saw
#[derive(Debug, Default, Clone)]
pub struct Log {
    pub opened: usize,
    pub closed: usize,
    pub begins: Vec<IsolationLevel>,
    pub commits: usize,
    pub rollbacks: usize,
    pub executed: Vec<String>,
    pub queried: Vec<String>,
}

impl Log {
    /// Connection-level calls of any kind
    pub fn io(&self) -> usize {
        self.opened
            + self.begins.len()
            + self.commits
            + self.rollbacks
            + self.executed.len()
            + self.queried.len()
    }
}

/// A driver that records calls instead of talking to a database
#[derive(Clone, Default)]
pub struct RecordingFactory {
    pub log: Arc<Mutex<Log>>,
    /// Whether existence checks find a row
    pub rows_exist: bool,
    pub fail_rollback: bool,
    pub fail_execute: bool,
    /// Tables reported by the `Tables` collection
    pub tables: Vec<String>,
    /// A table whose `Columns` collection cannot be read
    pub unreadable_table: Option<String>,
}

impl RecordingFactory {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn log(&self) -> Log {
        self.log.lock().unwrap().clone()
    }
}

#[async_trait]
impl ConnectionFactory for RecordingFactory {
    fn dialect(&self) -> Arc<dyn Dialect> {
        Arc::new(SqliteDialect::new())
    }

    async fn open(&self) -> Result<Box<dyn Connection>> {
        self.log.lock().unwrap().opened += 1;
        Ok(Box::new(RecordingConnection {
            factory: self.clone(),
        }))
    }
}

pub struct RecordingConnection {
    factory: RecordingFactory,
}

#[async_trait]
impl Connection for RecordingConnection {
    async fn begin(&mut self, isolation: IsolationLevel) -> Result<()> {
        self.factory.log.lock().unwrap().begins.push(isolation);
        Ok(())
    }

    async fn commit(&mut self) -> Result<()> {
        self.factory.log.lock().unwrap().commits += 1;
        Ok(())
    }

    async fn rollback(&mut self) -> Result<()> {
        self.factory.log.lock().unwrap().rollbacks += 1;
        if self.factory.fail_rollback {
            return Err(Error::DatabaseError("rollback refused".to_string()));
        }
        Ok(())
    }

    async fn execute(&mut self, sql: &str, _params: &[Param]) -> Result<u64> {
        self.factory.log.lock().unwrap().executed.push(sql.to_string());
        if self.factory.fail_execute {
            return Err(Error::DatabaseError("statement refused".to_string()));
        }
        Ok(1)
    }

    async fn query(&mut self, sql: &str, _params: &[Param]) -> Result<ResultSet> {
        self.factory.log.lock().unwrap().queried.push(sql.to_string());
        let mut rs = ResultSet::new(vec!["value".to_string()]);
        if self.factory.rows_exist {
            rs.rows.push(vec![Value::Int(1)]);
        }
        Ok(rs)
    }

    async fn schema(
        &mut self,
        collection: SchemaCollection,
        table: Option<&str>,
    ) -> Result<ResultSet> {
        fn columns(names: &[&str]) -> Vec<String> {
            names.iter().map(|n| n.to_string()).collect()
        }

        match collection {
            SchemaCollection::Tables => {
                let mut rs = ResultSet::new(columns(&["TABLE_NAME", "TABLE_TYPE"]));
                for name in &self.factory.tables {
                    rs.rows.push(vec![Value::from(name.as_str()), Value::from("table")]);
                }
                Ok(rs)
            }
            SchemaCollection::Columns => {
                let table = table.unwrap_or_default();
                if self.factory.unreadable_table.as_deref() == Some(table) {
                    return Err(Error::DatabaseError(format!("cannot read {}", table)));
                }
                let mut rs = ResultSet::new(columns(&[
                    "TABLE_NAME",
                    "COLUMN_NAME",
                    "DATA_TYPE",
                    "IS_NULLABLE",
                    "PRIMARY_KEY",
                    "AUTOINCREMENT",
                    "COLUMN_DEFAULT",
                ]));
                rs.rows.push(vec![
                    Value::from(table),
                    Value::from("id"),
                    Value::from("INTEGER"),
                    Value::Int(0),
                    Value::Int(1),
                    Value::Int(0),
                    Value::Null,
                ]);
                Ok(rs)
            }
            SchemaCollection::IndexColumns => Ok(ResultSet::new(columns(&[
                "TABLE_NAME",
                "INDEX_NAME",
                "COLUMN_NAME",
                "ORDINAL_POSITION",
                "UNIQUE",
                "PRIMARY_KEY",
            ]))),
        }
    }

    async fn close(self: Box<Self>) -> Result<()> {
        self.factory.log.lock().unwrap().closed += 1;
        Ok(())
    }
}

/// Configuration for a SQLite file inside `dir`
pub fn sqlite_config(dir: &TempDir) -> Config {
    let path = dir.path().join("test.db");
    Config {
        database: DatabaseConfig {
            driver: "sqlite".to_string(),
            url: format!("sqlite://{}?mode=rwc", path.display()),
            pool_size: Some(4),
            timeout_seconds: Some(5),
        },
        migrations: Default::default(),
        session: Default::default(),
        type_mapping: Default::default(),
        logging: None,
    }
}

/// A fresh file-backed SQLite database
pub async fn sqlite_database(dir: &TempDir) -> Database {
    Database::connect(&sqlite_config(dir))
        .await
        .expect("failed to open test database")
}

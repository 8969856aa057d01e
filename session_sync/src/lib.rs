//! session_sync: transactional SQL sessions and additive schema synchronization
//!
//! A [`Session`] runs raw SQL and batch CRUD statements over one logical connection,
//! with nested transactions counted by depth. A [`SchemaEngine`] reads the live schema
//! and creates missing tables, columns and indexes from [`TableModel`]s.

pub mod config;
pub mod db;
pub mod error;
pub mod schema;
pub mod session;
pub mod utils;

use std::sync::Arc;

// Re-export main types for easier access
pub use config::Config;
pub use db::{
    Connection, ConnectionFactory, IsolationLevel, Param, ResultSet, Row, SqliteFactory, Value,
};
pub use error::{Error, Result};
pub use schema::{
    ColumnModel, DbType, IndexModel, MigrationMode, MigrationReport, SchemaEngine, TableModel,
};
pub use session::{SelectBuilder, Session};

use crate::schema::dialect::SqliteDialect;
use crate::schema::type_map::TypeMap;

/// Initialize session_sync with the specified configuration file
pub async fn init(config_path: &str) -> Result<Database> {
    let config = config::load_from_file(config_path)?;
    Database::connect(&config).await
}

/// Entry point: hands out sessions and schema engines for one database
#[derive(Clone)]
pub struct Database {
    factory: Arc<dyn ConnectionFactory>,
    default_isolation: IsolationLevel,
    dry_run: bool,
}

impl Database {
    /// Wrap an existing connection factory
    pub fn new(factory: Arc<dyn ConnectionFactory>) -> Self {
        Self {
            factory,
            default_isolation: IsolationLevel::default(),
            dry_run: false,
        }
    }

    /// Open the configured database, applying type overrides to its dialect
    pub async fn connect(config: &Config) -> Result<Self> {
        let mut type_map = TypeMap::standard();
        if let Some(overrides) = &config.type_mapping.override_ {
            type_map = type_map.with_overrides(overrides)?;
        }

        let factory = SqliteFactory::connect(&config.database)
            .await?
            .with_dialect(Arc::new(SqliteDialect::with_type_map(type_map)));

        tracing::info!(
            driver = %config.database.driver,
            dialect = factory.dialect().name(),
            mode = %config.migrations.mode,
            "Connected to database"
        );

        Ok(Self {
            factory: Arc::new(factory),
            default_isolation: config.session.default_isolation,
            dry_run: config.migrations.dry_run,
        })
    }

    pub fn factory(&self) -> Arc<dyn ConnectionFactory> {
        self.factory.clone()
    }

    /// Start a new session; it opens no connection until first used
    pub fn session(&self) -> Session {
        Session::new(self.factory.clone()).with_default_isolation(self.default_isolation)
    }

    /// Schema engine for this database
    pub fn schema(&self) -> SchemaEngine {
        SchemaEngine::new(self.factory.clone()).dry_run(self.dry_run)
    }
}

//! Schema engine
//!
//! Reads the live schema, diffs it against desired table models and applies the
//! additive DDL best-effort. Every statement's outcome is kept in a
//! [`MigrationReport`]; a failing statement never stops the ones after it.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;
use tracing::{debug, info, warn};

use crate::db::driver::ConnectionFactory;
use crate::error::{Error, Result};
use crate::schema::analyzer::SchemaAnalyzer;
use crate::schema::diff::SchemaDiff;
use crate::schema::generator::DdlGenerator;
use crate::schema::types::TableModel;
use crate::session::Session;

/// How far `set_tables` may change the database
///
/// Modes are ordered; each one allows everything the previous one does.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize,
)]
#[serde(rename_all = "snake_case")]
pub enum MigrationMode {
    /// Never touch the schema
    #[default]
    Off,
    /// Create tables that do not exist yet
    CreateOnly,
    /// Also add missing columns and indexes to existing tables
    Full,
}

impl fmt::Display for MigrationMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            MigrationMode::Off => "off",
            MigrationMode::CreateOnly => "create_only",
            MigrationMode::Full => "full",
        };
        f.write_str(name)
    }
}

impl std::str::FromStr for MigrationMode {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_lowercase().replace('-', "_").as_str() {
            "off" => Ok(MigrationMode::Off),
            "create_only" | "createonly" => Ok(MigrationMode::CreateOnly),
            "full" => Ok(MigrationMode::Full),
            other => Err(Error::ConfigError(format!("Unknown migration mode: {}", other))),
        }
    }
}

/// What happened to one DDL statement
#[derive(Debug)]
pub enum StepOutcome {
    /// Dry run; the statement was not sent
    Planned,
    /// Executed; carries the affected-row count reported by the driver
    Applied(u64),
    Failed(Error),
}

/// One DDL statement and its outcome
#[derive(Debug)]
pub struct MigrationStep {
    pub sql: String,
    pub outcome: StepOutcome,
}

impl MigrationStep {
    pub fn is_failed(&self) -> bool {
        matches!(self.outcome, StepOutcome::Failed(_))
    }
}

/// Per-statement result of a migration run
#[derive(Debug, Default)]
pub struct MigrationReport {
    pub steps: Vec<MigrationStep>,
    pub dry_run: bool,
}

impl MigrationReport {
    /// The statements in execution order
    pub fn statements(&self) -> Vec<&str> {
        self.steps.iter().map(|s| s.sql.as_str()).collect()
    }

    pub fn applied(&self) -> usize {
        self.steps
            .iter()
            .filter(|s| matches!(s.outcome, StepOutcome::Applied(_)))
            .count()
    }

    pub fn failures(&self) -> Vec<&MigrationStep> {
        self.steps.iter().filter(|s| s.is_failed()).collect()
    }

    /// True when no statement failed
    pub fn is_success(&self) -> bool {
        !self.steps.iter().any(MigrationStep::is_failed)
    }

    pub fn is_empty(&self) -> bool {
        self.steps.is_empty()
    }
}

impl fmt::Display for MigrationReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.steps.is_empty() {
            return writeln!(f, "Database schema is already in sync");
        }
        for step in &self.steps {
            match &step.outcome {
                StepOutcome::Planned => writeln!(f, "{};", step.sql)?,
                StepOutcome::Applied(_) => writeln!(f, "ok     {}", step.sql)?,
                StepOutcome::Failed(e) => writeln!(f, "FAILED {}\n       {}", step.sql, e)?,
            }
        }
        Ok(())
    }
}

/// Introspection and additive migration over one database
pub struct SchemaEngine {
    factory: Arc<dyn ConnectionFactory>,
    analyzer: SchemaAnalyzer,
    dry_run: bool,
}

impl SchemaEngine {
    pub fn new(factory: Arc<dyn ConnectionFactory>) -> Self {
        let analyzer = SchemaAnalyzer::new(factory.clone());
        Self {
            factory,
            analyzer,
            dry_run: false,
        }
    }

    /// Only plan statements; reports list them without executing
    pub fn dry_run(mut self, enabled: bool) -> Self {
        self.dry_run = enabled;
        self
    }

    /// Introspect existing tables, optionally only the named ones
    pub async fn get_tables(&self, names: Option<&[&str]>) -> Result<Vec<TableModel>> {
        self.analyzer.get_tables(names).await
    }

    /// Compute the changes `set_tables` would make
    pub async fn plan(&self, mode: MigrationMode, tables: &[TableModel]) -> Result<SchemaDiff> {
        for table in tables {
            table.validate()?;
        }

        if mode == MigrationMode::Off || tables.is_empty() {
            return Ok(SchemaDiff::default());
        }

        let names: Vec<&str> = tables.iter().map(|t| t.name.as_str()).collect();
        let current = self.analyzer.get_tables(Some(names.as_slice())).await?;

        let dialect = self.factory.dialect();
        let generator = DdlGenerator::new(dialect.as_ref());
        Ok(SchemaDiff::generate(&current, tables, mode, &generator))
    }

    /// Bring the database up to the desired table models, as far as `mode` allows
    pub async fn set_tables(
        &self,
        mode: MigrationMode,
        tables: &[TableModel],
    ) -> Result<MigrationReport> {
        let diff = self.plan(mode, tables).await?;
        if diff.is_empty() {
            debug!(%mode, "Database schema is already in sync");
            return Ok(self.report());
        }

        let dialect = self.factory.dialect();
        let statements = diff.statements(&DdlGenerator::new(dialect.as_ref()))?;
        info!(
            %mode,
            tables_to_create = diff.tables_to_create.len(),
            tables_to_alter = diff.tables_to_alter.len(),
            "Applying schema changes"
        );

        Ok(self.apply(statements).await)
    }

    /// Drop a table if it exists
    pub async fn drop_table(&self, name: &str) -> Result<MigrationReport> {
        let dialect = self.factory.dialect();
        let sql = DdlGenerator::new(dialect.as_ref()).drop_table_sql(name);
        Ok(self.apply(vec![sql]).await)
    }

    /// Drop an index if it exists
    pub async fn drop_index(&self, name: &str) -> Result<MigrationReport> {
        let dialect = self.factory.dialect();
        let sql = DdlGenerator::new(dialect.as_ref()).drop_index_sql(name);
        Ok(self.apply(vec![sql]).await)
    }

    fn report(&self) -> MigrationReport {
        MigrationReport {
            steps: Vec::new(),
            dry_run: self.dry_run,
        }
    }

    // Runs through its own session, never a caller's transaction.
    async fn apply(&self, statements: Vec<String>) -> MigrationReport {
        let mut report = self.report();

        if self.dry_run {
            for sql in statements {
                info!(sql = %sql, "Migration SQL (dry run)");
                report.steps.push(MigrationStep {
                    sql,
                    outcome: StepOutcome::Planned,
                });
            }
            return report;
        }

        let mut session = Session::new(self.factory.clone());
        for (i, sql) in statements.into_iter().enumerate() {
            let outcome = match session.execute(&sql, &[]).await {
                Ok(affected) => {
                    info!(step = i + 1, sql = %sql, "Applied schema change");
                    StepOutcome::Applied(affected)
                }
                Err(e) => {
                    warn!(step = i + 1, sql = %sql, error = %e, "Schema change failed");
                    StepOutcome::Failed(e)
                }
            };
            report.steps.push(MigrationStep { sql, outcome });
        }
        session.close().await;

        report
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_mode_ordering() {
        assert!(MigrationMode::Off < MigrationMode::CreateOnly);
        assert!(MigrationMode::CreateOnly < MigrationMode::Full);
        assert_eq!(MigrationMode::default(), MigrationMode::Off);
    }

    #[test]
    fn test_mode_from_str() {
        assert_eq!("create-only".parse::<MigrationMode>().unwrap(), MigrationMode::CreateOnly);
        assert_eq!("FULL".parse::<MigrationMode>().unwrap(), MigrationMode::Full);
        assert!("everything".parse::<MigrationMode>().is_err());
    }

    #[test]
    fn test_report_counts() {
        let report = MigrationReport {
            steps: vec![
                MigrationStep {
                    sql: "CREATE TABLE \"a\" (\n  \"id\" INTEGER NOT NULL\n)".to_string(),
                    outcome: StepOutcome::Applied(0),
                },
                MigrationStep {
                    sql: "ALTER TABLE \"a\" ADD \"b\" INTEGER NOT NULL".to_string(),
                    outcome: StepOutcome::Failed(Error::MigrationError("boom".to_string())),
                },
            ],
            dry_run: false,
        };

        assert_eq!(report.applied(), 1);
        assert_eq!(report.failures().len(), 1);
        assert!(!report.is_success());
        assert_eq!(report.statements().len(), 2);
        assert!(report.to_string().contains("FAILED"));
    }
}

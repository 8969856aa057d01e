//! Schema module for session_sync
//!
//! This module handles table models, type mapping, DDL generation, schema analysis and
//! additive migration.

pub mod analyzer;
pub mod dialect;
pub mod diff;
pub mod generator;
pub mod migrator;
pub mod type_map;
pub mod types;

// Re-export key types
pub use analyzer::SchemaAnalyzer;
pub use dialect::{Dialect, SqliteDialect};
pub use diff::{SchemaDiff, TableAlteration};
pub use generator::DdlGenerator;
pub use migrator::{MigrationMode, MigrationReport, MigrationStep, SchemaEngine, StepOutcome};
pub use type_map::{ParsedType, TypeMap, TypeRule};
pub use types::{ColumnModel, DbType, IndexModel, TableModel};

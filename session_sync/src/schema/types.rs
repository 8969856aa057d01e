//! Type definitions for table models

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::error::{Error, Result};
use crate::utils::naming::check_identifier_conflicts;

/// Dialect-independent logical column type
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DbType {
    Int16,
    Int32,
    Int64,
    Byte,
    Boolean,
    Decimal,
    Double,
    Float,
    DateTime,
    Guid,
    Binary,
    String,
}

impl DbType {
    pub const ALL: [DbType; 12] = [
        DbType::Int16,
        DbType::Int32,
        DbType::Int64,
        DbType::Byte,
        DbType::Boolean,
        DbType::Decimal,
        DbType::Double,
        DbType::Float,
        DbType::DateTime,
        DbType::Guid,
        DbType::Binary,
        DbType::String,
    ];

    pub fn name(&self) -> &'static str {
        match self {
            DbType::Int16 => "int16",
            DbType::Int32 => "int32",
            DbType::Int64 => "int64",
            DbType::Byte => "byte",
            DbType::Boolean => "boolean",
            DbType::Decimal => "decimal",
            DbType::Double => "double",
            DbType::Float => "float",
            DbType::DateTime => "date_time",
            DbType::Guid => "guid",
            DbType::Binary => "binary",
            DbType::String => "string",
        }
    }
}

impl fmt::Display for DbType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for DbType {
    type Err = Error;

    /// Accepts `date_time`, `DateTime` and `datetime` alike
    fn from_str(s: &str) -> Result<Self> {
        let wanted: String = s
            .chars()
            .filter(|c| *c != '_' && *c != '-')
            .collect::<String>()
            .to_lowercase();

        DbType::ALL
            .iter()
            .copied()
            .find(|t| t.name().replace('_', "") == wanted)
            .ok_or_else(|| Error::TypeMappingError(format!("Unknown logical type: {}", s)))
    }
}

/// Represents a column of a table model
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ColumnModel {
    /// Logical name used by callers
    pub name: String,
    /// Physical column name when it differs from the logical name
    #[serde(default)]
    pub column_name: Option<String>,
    pub db_type: DbType,
    #[serde(default)]
    pub nullable: bool,
    #[serde(default)]
    pub primary_key: bool,
    #[serde(default)]
    pub identity: bool,
    #[serde(default)]
    pub length: Option<u32>,
    #[serde(default)]
    pub precision: Option<u8>,
    #[serde(default)]
    pub scale: Option<u8>,
    #[serde(default)]
    pub default: Option<String>,
}

impl ColumnModel {
    /// Create a new non-nullable column with the given name and type
    pub fn new(name: &str, db_type: DbType) -> Self {
        Self {
            name: name.to_string(),
            column_name: None,
            db_type,
            nullable: false,
            primary_key: false,
            identity: false,
            length: None,
            precision: None,
            scale: None,
            default: None,
        }
    }

    /// Name of the column in the database
    pub fn physical_name(&self) -> &str {
        self.column_name.as_deref().unwrap_or(&self.name)
    }

    /// Whether `name` refers to this column by logical or physical name
    pub fn matches(&self, name: &str) -> bool {
        self.name.eq_ignore_ascii_case(name) || self.physical_name().eq_ignore_ascii_case(name)
    }

    pub fn column_name(mut self, column_name: &str) -> Self {
        self.column_name = Some(column_name.to_string());
        self
    }

    /// Set whether the column is nullable
    pub fn nullable(mut self, nullable: bool) -> Self {
        self.nullable = nullable;
        self
    }

    pub fn primary_key(mut self) -> Self {
        self.primary_key = true;
        self
    }

    pub fn identity(mut self) -> Self {
        self.identity = true;
        self
    }

    pub fn length(mut self, length: u32) -> Self {
        self.length = Some(length);
        self
    }

    pub fn precision(mut self, precision: u8, scale: u8) -> Self {
        self.precision = Some(precision);
        self.scale = Some(scale);
        self
    }

    /// Set a default value expression for the column
    pub fn default(mut self, default: &str) -> Self {
        self.default = Some(default.to_string());
        self
    }
}

/// Represents an index of a table model
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IndexModel {
    /// Explicit index name; generated from table and columns when absent
    #[serde(default)]
    pub name: Option<String>,
    pub columns: Vec<String>,
    #[serde(default)]
    pub unique: bool,
}

impl IndexModel {
    pub fn new<S: AsRef<str>>(columns: &[S]) -> Self {
        Self {
            name: None,
            columns: columns.iter().map(|c| c.as_ref().to_string()).collect(),
            unique: false,
        }
    }

    pub fn named(mut self, name: &str) -> Self {
        self.name = Some(name.to_string());
        self
    }

    pub fn unique(mut self) -> Self {
        self.unique = true;
        self
    }
}

/// Represents a table: ordered columns plus indexes
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TableModel {
    pub name: String,
    pub columns: Vec<ColumnModel>,
    #[serde(default)]
    pub indexes: Vec<IndexModel>,
}

impl TableModel {
    /// Create a new table with the given name
    pub fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
            columns: Vec::new(),
            indexes: Vec::new(),
        }
    }

    /// Add a column to the table
    pub fn add_column(&mut self, column: ColumnModel) {
        self.columns.push(column);
    }

    /// Add an index to the table
    pub fn add_index(&mut self, index: IndexModel) {
        self.indexes.push(index);
    }

    pub fn with_column(mut self, column: ColumnModel) -> Self {
        self.add_column(column);
        self
    }

    pub fn with_index(mut self, index: IndexModel) -> Self {
        self.add_index(index);
        self
    }

    /// Find a column by logical or physical name, ignoring case
    pub fn column(&self, name: &str) -> Option<&ColumnModel> {
        self.columns.iter().find(|c| c.matches(name))
    }

    pub fn has_column(&self, name: &str) -> bool {
        self.column(name).is_some()
    }

    pub fn primary_keys(&self) -> Vec<&ColumnModel> {
        self.columns.iter().filter(|c| c.primary_key).collect()
    }

    pub fn identity_column(&self) -> Option<&ColumnModel> {
        self.columns.iter().find(|c| c.identity)
    }

    /// Check that column names are unique and every index column exists
    pub fn validate(&self) -> Result<()> {
        if self.columns.is_empty() {
            return Err(Error::InvalidModel(format!(
                "Table '{}' has no columns",
                self.name
            )));
        }

        let logical: Vec<&str> = self.columns.iter().map(|c| c.name.as_str()).collect();
        let physical: Vec<&str> = self.columns.iter().map(|c| c.physical_name()).collect();
        for names in [logical, physical] {
            if let Some((_, duplicate)) = check_identifier_conflicts(&names, true) {
                return Err(Error::InvalidModel(format!(
                    "Duplicate column '{}' in table '{}'",
                    duplicate, self.name
                )));
            }
        }

        for index in &self.indexes {
            if index.columns.is_empty() {
                return Err(Error::InvalidModel(format!(
                    "Index on table '{}' has no columns",
                    self.name
                )));
            }
            if let Some(missing) = index.columns.iter().find(|c| !self.has_column(c)) {
                return Err(Error::InvalidModel(format!(
                    "Index column '{}' does not exist in table '{}'",
                    missing, self.name
                )));
            }
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn users() -> TableModel {
        TableModel::new("users")
            .with_column(ColumnModel::new("Id", DbType::Int32).primary_key().identity())
            .with_column(
                ColumnModel::new("UserName", DbType::String)
                    .column_name("user_name")
                    .length(50),
            )
    }

    #[test]
    fn test_db_type_parsing() {
        assert_eq!("guid".parse::<DbType>().unwrap(), DbType::Guid);
        assert_eq!("DateTime".parse::<DbType>().unwrap(), DbType::DateTime);
        assert_eq!("date_time".parse::<DbType>().unwrap(), DbType::DateTime);
        assert!("varchar".parse::<DbType>().is_err());
    }

    #[test]
    fn test_column_lookup_by_either_name() {
        let table = users();
        assert_eq!(table.column("USER_NAME").unwrap().name, "UserName");
        assert_eq!(table.column("username").unwrap().physical_name(), "user_name");
        assert_eq!(table.identity_column().unwrap().name, "Id");
        assert_eq!(table.primary_keys().len(), 1);
    }

    #[test]
    fn test_validate_duplicate_columns() {
        let table = users().with_column(ColumnModel::new("USER_NAME", DbType::String));
        assert!(matches!(table.validate(), Err(Error::InvalidModel(_))));
    }

    #[test]
    fn test_validate_logical_names_ignore_case() {
        let table = TableModel::new("T")
            .with_column(ColumnModel::new("Name", DbType::String).column_name("a"))
            .with_column(ColumnModel::new("name", DbType::String).column_name("b"));
        assert!(matches!(table.validate(), Err(Error::InvalidModel(msg)) if msg.contains("name")));
    }

    #[test]
    fn test_validate_index_columns() {
        assert!(users()
            .with_index(IndexModel::new(&["user_name"]).unique())
            .validate()
            .is_ok());

        let bad = users().with_index(IndexModel::new(&["email"]));
        assert!(matches!(bad.validate(), Err(Error::InvalidModel(msg)) if msg.contains("email")));
    }

    #[test]
    fn test_table_model_from_json() {
        let table: TableModel = serde_json::from_str(
            r#"{
                "name": "T",
                "columns": [
                    { "name": "id", "db_type": "int32", "primary_key": true, "identity": true },
                    { "name": "name", "db_type": "string", "length": 50, "nullable": true }
                ]
            }"#,
        )
        .unwrap();

        assert_eq!(table.columns.len(), 2);
        assert!(table.columns[0].identity);
        assert_eq!(table.columns[1].length, Some(50));
        assert!(table.indexes.is_empty());
    }
}

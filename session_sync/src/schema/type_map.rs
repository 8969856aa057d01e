//! Logical → physical type mapping
//!
//! Every logical [`DbType`] maps through one [`TypeRule`] held in a [`TypeMap`].
//! Adding a logical type means adding a row to [`TypeMap::standard`]; callers only
//! ever go through [`TypeMap::sql_type`] and [`TypeMap::parse`].

use once_cell::sync::Lazy;
use regex::Regex;
use std::collections::HashMap;

use crate::error::{Error, Result};
use crate::schema::types::{ColumnModel, DbType};

/// Longest string length rendered as `VARCHAR(n)`
pub const MAX_VARCHAR_LENGTH: u32 = 4000;

const DEFAULT_DECIMAL_PRECISION: u8 = 18;
const DEFAULT_DECIMAL_SCALE: u8 = 2;

// Preference order when several logical types share one SQL name.
const REVERSE_ORDER: [DbType; 12] = [
    DbType::Int32,
    DbType::Int64,
    DbType::Boolean,
    DbType::Decimal,
    DbType::Double,
    DbType::DateTime,
    DbType::Guid,
    DbType::Binary,
    DbType::String,
    DbType::Int16,
    DbType::Byte,
    DbType::Float,
];

static DECLARED_TYPE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^\s*([A-Za-z][A-Za-z0-9_ ]*?)\s*(?:\(\s*(\d+)\s*(?:,\s*(\d+)\s*)?\))?\s*$")
        .expect("declared type pattern is valid")
});

/// How one logical type is written as SQL
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TypeRule {
    /// A type name used verbatim
    Fixed(String),
    /// `NAME(precision,scale)`
    Decimal {
        name: String,
        precision: u8,
        scale: u8,
    },
    /// `SHORT(length)` for bounded lengths, `LONG` otherwise
    Text {
        short: String,
        long: String,
        max_short: u32,
    },
}

impl TypeRule {
    pub fn fixed(name: &str) -> Self {
        TypeRule::Fixed(name.to_string())
    }

    fn matches(&self, base: &str) -> bool {
        match self {
            TypeRule::Fixed(name) => name.eq_ignore_ascii_case(base),
            TypeRule::Decimal { name, .. } => name.eq_ignore_ascii_case(base),
            TypeRule::Text { short, long, .. } => {
                short.eq_ignore_ascii_case(base) || long.eq_ignore_ascii_case(base)
            }
        }
    }
}

/// A declared SQL type read back into the logical model
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParsedType {
    pub db_type: DbType,
    pub length: Option<u32>,
    pub precision: Option<u8>,
    pub scale: Option<u8>,
}

/// Table of type rules keyed by logical type
#[derive(Debug, Clone, PartialEq)]
pub struct TypeMap {
    rules: HashMap<DbType, TypeRule>,
}

impl TypeMap {
    /// The built-in mapping
    pub fn standard() -> Self {
        let rules = [
            (DbType::Byte, TypeRule::fixed("INTEGER")),
            (DbType::Int16, TypeRule::fixed("INTEGER")),
            (DbType::Int32, TypeRule::fixed("INTEGER")),
            (DbType::Int64, TypeRule::fixed("BIGINT")),
            (DbType::Boolean, TypeRule::fixed("BOOLEAN")),
            (
                DbType::Decimal,
                TypeRule::Decimal {
                    name: "DECIMAL".to_string(),
                    precision: DEFAULT_DECIMAL_PRECISION,
                    scale: DEFAULT_DECIMAL_SCALE,
                },
            ),
            (DbType::Double, TypeRule::fixed("REAL")),
            (DbType::Float, TypeRule::fixed("REAL")),
            (DbType::DateTime, TypeRule::fixed("DATETIME")),
            (DbType::Guid, TypeRule::fixed("UNIQUEIDENTIFIER")),
            (DbType::Binary, TypeRule::fixed("BLOB")),
            (
                DbType::String,
                TypeRule::Text {
                    short: "VARCHAR".to_string(),
                    long: "TEXT".to_string(),
                    max_short: MAX_VARCHAR_LENGTH,
                },
            ),
        ];

        Self {
            rules: rules.into_iter().collect(),
        }
    }

    /// Replace the rule for one logical type
    pub fn set_rule(&mut self, db_type: DbType, rule: TypeRule) {
        self.rules.insert(db_type, rule);
    }

    /// Use a fixed SQL type name for one logical type
    pub fn with_override(mut self, db_type: DbType, sql_type: &str) -> Self {
        self.set_rule(db_type, TypeRule::fixed(sql_type));
        self
    }

    /// Apply `logical type name → SQL type` overrides from configuration
    pub fn with_overrides(mut self, overrides: &HashMap<String, String>) -> Result<Self> {
        for (logical, sql_type) in overrides {
            let db_type: DbType = logical.parse()?;
            self.set_rule(db_type, TypeRule::fixed(sql_type));
        }
        Ok(self)
    }

    pub fn rule(&self, db_type: DbType) -> Option<&TypeRule> {
        self.rules.get(&db_type)
    }

    /// SQL type text for a column
    pub fn sql_type(&self, column: &ColumnModel) -> Result<String> {
        let rule = self.rule(column.db_type).ok_or_else(|| {
            Error::TypeMappingError(format!("No SQL type mapped for {}", column.db_type))
        })?;

        let sql = match rule {
            TypeRule::Fixed(name) => name.clone(),
            TypeRule::Decimal {
                name,
                precision,
                scale,
            } => format!(
                "{}({},{})",
                name,
                column.precision.unwrap_or(*precision),
                column.scale.unwrap_or(*scale)
            ),
            TypeRule::Text {
                short,
                long,
                max_short,
            } => match column.length {
                Some(length) if length > 0 && length <= *max_short => {
                    format!("{}({})", short, length)
                }
                _ => long.clone(),
            },
        };

        Ok(sql)
    }

    /// Read a declared SQL type back into a logical type
    ///
    /// Names produced by this map are recognized first; anything else falls back to
    /// SQLite-style affinity rules.
    pub fn parse(&self, declared: &str) -> ParsedType {
        let (base, first, second) = match DECLARED_TYPE.captures(declared) {
            Some(caps) => (
                caps.get(1).map(|m| m.as_str().to_uppercase()).unwrap_or_default(),
                caps.get(2).and_then(|m| m.as_str().parse::<u32>().ok()),
                caps.get(3).and_then(|m| m.as_str().parse::<u8>().ok()),
            ),
            None => (declared.trim().to_uppercase(), None, None),
        };

        let db_type = REVERSE_ORDER
            .iter()
            .copied()
            .find(|t| self.rule(*t).map_or(false, |r| r.matches(&base)))
            .unwrap_or_else(|| affinity(&base));

        match db_type {
            DbType::String => ParsedType {
                db_type,
                length: first,
                precision: None,
                scale: None,
            },
            DbType::Decimal => ParsedType {
                db_type,
                length: None,
                precision: first.and_then(|p| u8::try_from(p).ok()),
                scale: second,
            },
            _ => ParsedType {
                db_type,
                length: None,
                precision: None,
                scale: None,
            },
        }
    }
}

impl Default for TypeMap {
    fn default() -> Self {
        Self::standard()
    }
}

fn affinity(base: &str) -> DbType {
    if base.contains("BOOL") || base == "BIT" {
        DbType::Boolean
    } else if base.contains("BIGINT") || base.contains("INT8") {
        DbType::Int64
    } else if base.contains("TINYINT") {
        DbType::Byte
    } else if base.contains("SMALLINT") {
        DbType::Int16
    } else if base.contains("INT") {
        DbType::Int64
    } else if base.contains("GUID") || base.contains("UUID") {
        DbType::Guid
    } else if base.contains("CHAR") || base.contains("CLOB") || base.contains("TEXT") {
        DbType::String
    } else if base.is_empty() || base.contains("BLOB") || base.contains("BINARY") {
        DbType::Binary
    } else if base.contains("REAL") || base.contains("FLOA") || base.contains("DOUB") {
        DbType::Double
    } else if base.contains("DATE") || base.contains("TIME") {
        DbType::DateTime
    } else if base.contains("DEC") || base.contains("NUMERIC") || base.contains("MONEY") {
        DbType::Decimal
    } else {
        DbType::String
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use rstest::rstest;

    fn col(db_type: DbType) -> ColumnModel {
        ColumnModel::new("c", db_type)
    }

    #[rstest]
    #[case(DbType::Byte, "INTEGER")]
    #[case(DbType::Int16, "INTEGER")]
    #[case(DbType::Int32, "INTEGER")]
    #[case(DbType::Int64, "BIGINT")]
    #[case(DbType::Boolean, "BOOLEAN")]
    #[case(DbType::Double, "REAL")]
    #[case(DbType::Float, "REAL")]
    #[case(DbType::DateTime, "DATETIME")]
    #[case(DbType::Guid, "UNIQUEIDENTIFIER")]
    #[case(DbType::Binary, "BLOB")]
    #[case(DbType::Decimal, "DECIMAL(18,2)")]
    #[case(DbType::String, "TEXT")]
    fn test_standard_mapping(#[case] db_type: DbType, #[case] expected: &str) {
        assert_eq!(TypeMap::standard().sql_type(&col(db_type)).unwrap(), expected);
    }

    #[test]
    fn test_every_logical_type_is_mapped() {
        let map = TypeMap::standard();
        for db_type in DbType::ALL {
            assert!(map.rule(db_type).is_some(), "{} has no rule", db_type);
        }
    }

    #[rstest]
    #[case(Some(50), "VARCHAR(50)")]
    #[case(Some(4000), "VARCHAR(4000)")]
    #[case(Some(4001), "TEXT")]
    #[case(Some(0), "TEXT")]
    #[case(None, "TEXT")]
    fn test_string_length_boundaries(#[case] length: Option<u32>, #[case] expected: &str) {
        let mut column = col(DbType::String);
        column.length = length;
        assert_eq!(TypeMap::standard().sql_type(&column).unwrap(), expected);
    }

    #[test]
    fn test_decimal_precision() {
        let column = col(DbType::Decimal).precision(10, 4);
        assert_eq!(TypeMap::standard().sql_type(&column).unwrap(), "DECIMAL(10,4)");
    }

    #[test]
    fn test_overrides() {
        let overrides = HashMap::from([("guid".to_string(), "TEXT".to_string())]);
        let map = TypeMap::standard().with_overrides(&overrides).unwrap();
        assert_eq!(map.sql_type(&col(DbType::Guid)).unwrap(), "TEXT");

        let bad = HashMap::from([("money".to_string(), "MONEY".to_string())]);
        assert!(TypeMap::standard().with_overrides(&bad).is_err());
    }

    #[rstest]
    #[case("INTEGER", DbType::Int32, None, None)]
    #[case("bigint", DbType::Int64, None, None)]
    #[case("VARCHAR(50)", DbType::String, Some(50), None)]
    #[case("TEXT", DbType::String, None, None)]
    #[case("DECIMAL(10,4)", DbType::Decimal, None, Some(10))]
    #[case("UNIQUEIDENTIFIER", DbType::Guid, None, None)]
    #[case("REAL", DbType::Double, None, None)]
    #[case("nvarchar(20)", DbType::String, Some(20), None)]
    #[case("", DbType::Binary, None, None)]
    fn test_parse_declared_types(
        #[case] declared: &str,
        #[case] db_type: DbType,
        #[case] length: Option<u32>,
        #[case] precision: Option<u8>,
    ) {
        let parsed = TypeMap::standard().parse(declared);
        assert_eq!(parsed.db_type, db_type);
        assert_eq!(parsed.length, length);
        assert_eq!(parsed.precision, precision);
    }
}

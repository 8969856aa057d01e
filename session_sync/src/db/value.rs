//! Parameter and result values
//!
//! Values cross the driver boundary in both directions: as bound parameters and as
//! materialized result cells.

use chrono::NaiveDateTime;
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// A single SQL value
///
/// Serializes as the plain JSON scalar. `DateTime` and `Guid` become strings and
/// read back as `Text`; the column type decides how to interpret them.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Value {
    Null,
    Bool(bool),
    Int(i64),
    Float(f64),
    Text(String),
    Blob(Vec<u8>),
    DateTime(NaiveDateTime),
    Guid(Uuid),
}

impl Value {
    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }

    /// Whether the value equals the zero value of its type.
    ///
    /// Upserts treat a default primary-key value as "not yet assigned".
    pub fn is_default(&self) -> bool {
        match self {
            Value::Null => true,
            Value::Bool(b) => !b,
            Value::Int(i) => *i == 0,
            Value::Float(f) => *f == 0.0,
            Value::Text(s) => s.is_empty(),
            Value::Blob(b) => b.is_empty(),
            Value::DateTime(dt) => *dt == NaiveDateTime::default(),
            Value::Guid(g) => g.is_nil(),
        }
    }

    pub fn as_i64(&self) -> Option<i64> {
        match self {
            Value::Int(i) => Some(*i),
            Value::Bool(b) => Some(i64::from(*b)),
            Value::Float(f) if f.fract() == 0.0 => Some(*f as i64),
            Value::Text(s) => s.trim().parse().ok(),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::Text(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Value::Bool(b) => Some(*b),
            Value::Int(i) => Some(*i != 0),
            _ => None,
        }
    }
}

macro_rules! value_from {
    ($($ty:ty => $variant:ident),* $(,)?) => {
        $(
            impl From<$ty> for Value {
                fn from(v: $ty) -> Self {
                    Value::$variant(v.into())
                }
            }
        )*
    };
}

value_from! {
    bool => Bool,
    u8 => Int,
    i16 => Int,
    i32 => Int,
    i64 => Int,
    f32 => Float,
    f64 => Float,
    String => Text,
    &str => Text,
    Vec<u8> => Blob,
    NaiveDateTime => DateTime,
    Uuid => Guid,
}

impl<T: Into<Value>> From<Option<T>> for Value {
    fn from(v: Option<T>) -> Self {
        v.map(Into::into).unwrap_or(Value::Null)
    }
}

/// A named statement parameter; the name is written without the `@` prefix
pub type Param = (String, Value);

/// Build a parameter list from `name => value` pairs.
#[macro_export]
macro_rules! params {
    () => { ::std::vec::Vec::<$crate::db::Param>::new() };
    ($($name:expr => $value:expr),+ $(,)?) => {
        vec![$(($name.to_string(), $crate::db::Value::from($value))),+]
    };
}

/// A row of column values keyed by column name, in column order
pub type Row = IndexMap<String, Value>;

/// Look up a column value in a row, falling back to a case-insensitive match
pub fn row_value<'r>(row: &'r Row, column: &str) -> Option<&'r Value> {
    row.get(column).or_else(|| {
        row.iter()
            .find(|(name, _)| name.eq_ignore_ascii_case(column))
            .map(|(_, value)| value)
    })
}

/// A fully materialized query result
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ResultSet {
    pub columns: Vec<String>,
    pub rows: Vec<Vec<Value>>,
}

impl ResultSet {
    pub fn new(columns: Vec<String>) -> Self {
        Self {
            columns,
            rows: Vec::new(),
        }
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Index of a column, matched case-insensitively
    pub fn column_index(&self, name: &str) -> Option<usize> {
        self.columns
            .iter()
            .position(|c| c.eq_ignore_ascii_case(name))
    }

    /// Cell at `row` in the named column
    pub fn get(&self, row: usize, column: &str) -> Option<&Value> {
        let index = self.column_index(column)?;
        self.rows.get(row).and_then(|r| r.get(index))
    }

    /// First column of the first row, the scalar result of a query
    pub fn first_value(&self) -> Value {
        self.rows
            .first()
            .and_then(|r| r.first())
            .cloned()
            .unwrap_or(Value::Null)
    }

    /// Rows as name → value maps
    pub fn to_rows(&self) -> Vec<Row> {
        self.rows
            .iter()
            .map(|values| {
                self.columns
                    .iter()
                    .cloned()
                    .zip(values.iter().cloned())
                    .collect()
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_values() {
        assert!(Value::Null.is_default());
        assert!(Value::Int(0).is_default());
        assert!(Value::Text(String::new()).is_default());
        assert!(Value::Guid(Uuid::nil()).is_default());
        assert!(!Value::Int(7).is_default());
        assert!(!Value::Guid(Uuid::new_v4()).is_default());
    }

    #[test]
    fn test_json_uses_plain_scalars() {
        let stamp = NaiveDateTime::parse_from_str("2024-01-02 03:04:05", "%Y-%m-%d %H:%M:%S")
            .unwrap();
        let json = serde_json::to_string(&vec![Value::Int(3), Value::DateTime(stamp), Value::Null])
            .unwrap();
        assert_eq!(json, r#"[3,"2024-01-02T03:04:05",null]"#);

        let back: Vec<Value> = serde_json::from_str(&json).unwrap();
        assert_eq!(
            back,
            vec![
                Value::Int(3),
                Value::Text("2024-01-02T03:04:05".to_string()),
                Value::Null
            ]
        );
    }

    #[test]
    fn test_option_conversion() {
        assert_eq!(Value::from(None::<i32>), Value::Null);
        assert_eq!(Value::from(Some("a")), Value::Text("a".to_string()));
    }

    #[test]
    fn test_result_set_lookup() {
        let mut rs = ResultSet::new(vec!["ID".to_string(), "name".to_string()]);
        rs.rows.push(vec![Value::Int(1), Value::from("alice")]);

        assert_eq!(rs.get(0, "id"), Some(&Value::Int(1)));
        assert_eq!(rs.get(0, "NAME").and_then(Value::as_str), Some("alice"));
        assert_eq!(rs.get(1, "id"), None);
        assert_eq!(rs.first_value(), Value::Int(1));
        assert_eq!(ResultSet::default().first_value(), Value::Null);

        let rows = rs.to_rows();
        assert_eq!(row_value(&rows[0], "Name"), Some(&Value::from("alice")));
    }

    #[test]
    fn test_params_macro() {
        let params = crate::params! { "id" => 5, "name" => "bob" };
        assert_eq!(params[0], ("id".to_string(), Value::Int(5)));
        assert_eq!(params[1].1, Value::from("bob"));
    }
}

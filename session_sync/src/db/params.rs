//! Named parameter handling
//!
//! Statements are written with `@name` placeholders. Drivers that only understand
//! numbered parameters rewrite them with [`number_placeholders`].

use once_cell::sync::Lazy;
use regex::{Captures, Regex};

use crate::db::value::Param;
use crate::error::{Error, Result};

// String literals and quoted identifiers are matched first so that an `@` inside
// them is left alone.
static PLACEHOLDER: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r#"'(?:[^']|'')*'|"(?:[^"]|"")*"|@([A-Za-z_][A-Za-z0-9_]*)"#)
        .expect("placeholder pattern is valid")
});

/// Name of a parameter without its `@` prefix
pub fn param_name(name: &str) -> &str {
    name.trim_start_matches('@')
}

/// Replace every `@name` with `?N`, where N is the 1-based position of `name` in
/// `params`. Names match case-insensitively; the same name may appear many times.
pub fn number_placeholders(sql: &str, params: &[Param]) -> Result<String> {
    let mut missing: Option<String> = None;

    let rewritten = PLACEHOLDER.replace_all(sql, |caps: &Captures| {
        let Some(name) = caps.get(1) else {
            return caps[0].to_string();
        };

        match params
            .iter()
            .position(|(p, _)| param_name(p).eq_ignore_ascii_case(name.as_str()))
        {
            Some(index) => format!("?{}", index + 1),
            None => {
                missing.get_or_insert_with(|| name.as_str().to_string());
                caps[0].to_string()
            }
        }
    });

    match missing {
        Some(name) => Err(Error::ParameterError(format!(
            "No value supplied for parameter @{}",
            name
        ))),
        None => Ok(rewritten.into_owned()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::Value;
    use pretty_assertions::assert_eq;

    fn p(name: &str) -> Param {
        (name.to_string(), Value::Null)
    }

    #[test]
    fn test_rewrites_in_parameter_order() {
        let sql = number_placeholders(
            "UPDATE \"t\" SET \"a\" = @a, \"b\" = @b WHERE \"id\" = @id",
            &[p("id"), p("a"), p("b")],
        )
        .unwrap();
        assert_eq!(sql, "UPDATE \"t\" SET \"a\" = ?2, \"b\" = ?3 WHERE \"id\" = ?1");
    }

    #[test]
    fn test_repeated_and_prefixed_names() {
        let sql = number_placeholders("SELECT @x + @X", &[p("@x")]).unwrap();
        assert_eq!(sql, "SELECT ?1 + ?1");
    }

    #[test]
    fn test_ignores_literals_and_identifiers() {
        let sql = number_placeholders(
            "SELECT 'mail@example.com', \"@col\" FROM t WHERE a = @a",
            &[p("a")],
        )
        .unwrap();
        assert_eq!(sql, "SELECT 'mail@example.com', \"@col\" FROM t WHERE a = ?1");
    }

    #[test]
    fn test_missing_parameter() {
        let err = number_placeholders("SELECT @nope", &[]).unwrap_err();
        assert!(matches!(err, Error::ParameterError(msg) if msg.contains("@nope")));
    }
}

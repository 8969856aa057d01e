//! Naming utilities for session_sync
//!
//! This module provides utilities for generated identifiers and name comparisons.

use std::collections::HashMap;

/// Pattern used for indexes created without an explicit name
pub const INDEX_NAME_PATTERN: &str = "IX_{table}_{columns}";

/// Format a name according to a pattern with placeholders
pub fn format_name(pattern: &str, replacements: &[(&str, &str)]) -> String {
    let mut result = pattern.to_string();

    for (placeholder, value) in replacements {
        result = result.replace(&format!("{{{}}}", placeholder), value);
    }

    result
}

/// Get index name from table and columns according to pattern
pub fn get_index_name<S: AsRef<str>>(pattern: &str, table_name: &str, columns: &[S]) -> String {
    let columns_str = columns
        .iter()
        .map(|c| sanitize_identifier(c.as_ref()))
        .collect::<Vec<_>>()
        .join("_");

    format_name(
        pattern,
        &[
            ("table", &sanitize_identifier(table_name)),
            ("columns", &columns_str),
        ],
    )
}

/// Sanitize identifiers for SQL
pub fn sanitize_identifier(name: &str) -> String {
    // Replace characters not allowed in bare SQL identifiers
    let mut sanitized = name.replace(|c: char| !c.is_alphanumeric() && c != '_', "_");

    // Ensure identifier doesn't start with a number
    if sanitized.chars().next().map_or(false, |c| c.is_numeric()) {
        sanitized = format!("_{}", sanitized);
    }

    sanitized
}

/// Check for name conflicts in a list of identifiers
pub fn check_identifier_conflicts<S: AsRef<str>>(
    names: &[S],
    ignore_case: bool,
) -> Option<(String, String)> {
    let mut seen = HashMap::<String, String>::new();

    for name in names {
        let name = name.as_ref();
        let key = if ignore_case {
            name.to_lowercase()
        } else {
            name.to_string()
        };

        if let Some(existing) = seen.get(&key) {
            return Some((existing.clone(), name.to_string()));
        }
        seen.insert(key, name.to_string());
    }

    None
}

/// Whether `name` appears in `names`, ignoring ASCII case
pub fn contains_ignore_case<S: AsRef<str>>(names: &[S], name: &str) -> bool {
    names.iter().any(|n| n.as_ref().eq_ignore_ascii_case(name))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_format_name() {
        assert_eq!(
            format_name("ix_{table}_{columns}", &[("table", "users"), ("columns", "email")]),
            "ix_users_email"
        );
    }

    #[test]
    fn test_index_name() {
        assert_eq!(
            get_index_name(INDEX_NAME_PATTERN, "users", &["email"]),
            "IX_users_email"
        );

        assert_eq!(
            get_index_name(INDEX_NAME_PATTERN, "orders", &["customer_id", "order date"]),
            "IX_orders_customer_id_order_date"
        );
    }

    #[test]
    fn test_sanitize_identifier() {
        assert_eq!(sanitize_identifier("user-name"), "user_name");
        assert_eq!(sanitize_identifier("123user"), "_123user");
        assert_eq!(sanitize_identifier("user.name"), "user_name");
    }

    #[test]
    fn test_identifier_conflicts() {
        let names = ["User", "user", "admin"];

        assert!(check_identifier_conflicts(&names, false).is_none());
        assert_eq!(
            check_identifier_conflicts(&names, true),
            Some(("User".to_string(), "user".to_string()))
        );
    }

    #[test]
    fn test_contains_ignore_case() {
        assert!(contains_ignore_case(&["Users", "posts"], "USERS"));
        assert!(!contains_ignore_case(&["Users"], "user"));
    }
}

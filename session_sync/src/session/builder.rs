//! SELECT builder for counted and paged queries
//!
//! Conditions are raw SQL fragments that may reference `@name` parameters; the
//! builder only assembles them. Identifiers are quoted by the dialect at build time.

use crate::schema::dialect::Dialect;

/// A simple single-table SELECT
#[derive(Debug, Clone)]
pub struct SelectBuilder {
    table: String,
    columns: Vec<String>,
    conditions: Vec<String>,
    order_by: Vec<(String, bool)>,
    limit: Option<u64>,
    offset: Option<u64>,
}

impl SelectBuilder {
    /// Select every column of `table`
    #[must_use]
    pub fn new(table: &str) -> Self {
        Self {
            table: table.to_string(),
            columns: Vec::new(),
            conditions: Vec::new(),
            order_by: Vec::new(),
            limit: None,
            offset: None,
        }
    }

    /// Restrict the selected columns
    #[must_use]
    pub fn columns(mut self, cols: &[&str]) -> Self {
        self.columns = cols.iter().map(|s| String::from(*s)).collect();
        self
    }

    /// Add a condition; several conditions are joined with AND
    #[must_use]
    pub fn filter(mut self, condition: &str) -> Self {
        self.conditions.push(condition.to_string());
        self
    }

    #[must_use]
    pub fn order_by(mut self, col: &str) -> Self {
        self.order_by.push((col.to_string(), false));
        self
    }

    #[must_use]
    pub fn order_by_desc(mut self, col: &str) -> Self {
        self.order_by.push((col.to_string(), true));
        self
    }

    #[must_use]
    pub const fn limit(mut self, n: u64) -> Self {
        self.limit = Some(n);
        self
    }

    #[must_use]
    pub const fn offset(mut self, n: u64) -> Self {
        self.offset = Some(n);
        self
    }

    /// Builds the SELECT statement
    pub fn build(&self, dialect: &dyn Dialect) -> String {
        let columns = if self.columns.is_empty() {
            "*".to_string()
        } else {
            self.columns
                .iter()
                .map(|c| dialect.quote_identifier(c))
                .collect::<Vec<_>>()
                .join(", ")
        };

        let mut sql = format!("SELECT {} FROM {}", columns, dialect.quote_identifier(&self.table));
        self.push_where(&mut sql);

        if !self.order_by.is_empty() {
            let order: Vec<String> = self
                .order_by
                .iter()
                .map(|(col, desc)| {
                    let quoted = dialect.quote_identifier(col);
                    if *desc {
                        format!("{quoted} DESC")
                    } else {
                        quoted
                    }
                })
                .collect();
            sql.push_str(" ORDER BY ");
            sql.push_str(&order.join(", "));
        }

        match (self.limit, self.offset) {
            (None, None) => sql,
            (limit, offset) => dialect.paginate(
                &sql,
                offset.unwrap_or(0),
                limit.unwrap_or(i64::MAX as u64),
            ),
        }
    }

    /// Builds `SELECT COUNT(*)` over the same table and conditions
    pub fn count_sql(&self, dialect: &dyn Dialect) -> String {
        let mut sql = format!("SELECT COUNT(*) FROM {}", dialect.quote_identifier(&self.table));
        self.push_where(&mut sql);
        sql
    }

    fn push_where(&self, sql: &mut String) {
        if self.conditions.is_empty() {
            return;
        }
        let conditions: Vec<String> = self.conditions.iter().map(|c| format!("({c})")).collect();
        sql.push_str(" WHERE ");
        sql.push_str(&conditions.join(" AND "));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::dialect::SqliteDialect;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_select_all() {
        let sql = SelectBuilder::new("users").build(&SqliteDialect::new());
        assert_eq!(sql, "SELECT * FROM \"users\"");
    }

    #[test]
    fn test_select_with_where_and_order() {
        let sql = SelectBuilder::new("users")
            .columns(&["id", "name"])
            .filter("active = @active")
            .filter("age > @age")
            .order_by("name")
            .order_by_desc("id")
            .build(&SqliteDialect::new());

        assert_eq!(
            sql,
            "SELECT \"id\", \"name\" FROM \"users\" WHERE (active = @active) AND (age > @age) ORDER BY \"name\", \"id\" DESC"
        );
    }

    #[test]
    fn test_select_with_limit_offset() {
        let dialect = SqliteDialect::new();
        let sql = SelectBuilder::new("users").limit(10).offset(20).build(&dialect);
        assert_eq!(sql, "SELECT * FROM \"users\" LIMIT 10 OFFSET 20");

        let sql = SelectBuilder::new("users").offset(5).build(&dialect);
        assert_eq!(sql, format!("SELECT * FROM \"users\" LIMIT {} OFFSET 5", i64::MAX));
    }

    #[test]
    fn test_count_ignores_order_and_paging() {
        let sql = SelectBuilder::new("users")
            .filter("age > @age")
            .order_by("name")
            .limit(10)
            .count_sql(&SqliteDialect::new());

        assert_eq!(sql, "SELECT COUNT(*) FROM \"users\" WHERE (age > @age)");
    }
}

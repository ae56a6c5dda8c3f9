//! Syntax validation for emitted SQL.
//!
//! Generated statements are parsed back with sqlparser-rs so a malformed
//! projection is caught before it reaches the database.

use sqlparser::dialect::PostgreSqlDialect;
use sqlparser::parser::Parser;

use super::dialect::Dialect;

/// Validates that a SQL string is syntactically valid for the given dialect.
///
/// # Example
///
/// ```ignore
/// use fieldsql::sql::{validate_sql, Dialect};
///
/// validate_sql("SELECT * FROM users", Dialect::Postgres).unwrap();
/// ```
pub fn validate_sql(sql: &str, dialect: Dialect) -> Result<(), String> {
    let parser_dialect: Box<dyn sqlparser::dialect::Dialect> = match dialect {
        Dialect::Postgres => Box::new(PostgreSqlDialect {}),
    };

    Parser::parse_sql(&*parser_dialect, sql)
        .map(|_| ())
        .map_err(|e| format!("Invalid SQL for {:?}: {}\nSQL: {}", dialect, e, sql))
}

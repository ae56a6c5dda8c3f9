//! PostgreSQL SQL dialect.
//!
//! PostgreSQL features relied on by generated statements:
//! - ANSI identifier quoting (`"`)
//! - Native boolean type (true/false)
//! - JSONB operators (`->`, `->>`, `#>>`)
//! - `LATERAL` joins and `WITH ORDINALITY` set-returning functions
//! - `UPDATE ... FROM`

use super::helpers;
use super::SqlDialect;

/// PostgreSQL SQL dialect.
#[derive(Debug, Clone, Copy)]
pub struct Postgres;

impl SqlDialect for Postgres {
    fn name(&self) -> &'static str {
        "postgres"
    }

    fn quote_identifier(&self, ident: &str) -> String {
        helpers::quote_double(ident)
    }

    fn format_bool(&self, b: bool) -> &'static str {
        helpers::format_bool_literal(b)
    }

    fn remap_function(&self, name: &str) -> Option<&'static str> {
        helpers::remap_function_postgres(name)
    }
}

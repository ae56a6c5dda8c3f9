//! SQL Dialect definitions and formatting rules.
//!
//! Computed-field SQL targets PostgreSQL only: it relies on JSONB
//! operators, `LATERAL` joins and `WITH ORDINALITY` table functions.
//! The trait still isolates the lexical rules (quoting, literals,
//! function names) so the renderer never hard-codes them.
//!
//! # Usage
//!
//! ```ignore
//! use fieldsql::sql::dialect::{Dialect, SqlDialect};
//!
//! let dialect = Dialect::Postgres;
//! let quoted = dialect.quote_identifier("user");  // "user"
//! ```

pub mod helpers;
mod postgres;

pub use postgres::Postgres;

/// SQL dialect trait - defines how lexical SQL elements are rendered.
pub trait SqlDialect: std::fmt::Debug {
    /// Dialect name for display/logging.
    fn name(&self) -> &'static str;

    // =========================================================================
    // Identifier & Literal Formatting
    // =========================================================================

    /// Quote an identifier (table, column, alias).
    fn quote_identifier(&self, ident: &str) -> String;

    /// Quote a string literal.
    fn quote_string(&self, s: &str) -> String {
        helpers::quote_string_single(s)
    }

    /// Format a boolean literal.
    fn format_bool(&self, b: bool) -> &'static str;

    /// Format the NULL literal.
    fn format_null(&self) -> &'static str {
        "NULL"
    }

    /// String concatenation operator.
    fn concat_operator(&self) -> &'static str {
        "||"
    }

    // =========================================================================
    // Function Remapping
    // =========================================================================

    /// Remap a generic function name to the dialect's spelling.
    ///
    /// Returns `None` when the function is native to the dialect.
    fn remap_function(&self, _name: &str) -> Option<&'static str> {
        None
    }
}

/// SQL dialect enum for ergonomic usage.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum Dialect {
    #[default]
    Postgres,
}

impl Dialect {
    /// Get the dialect implementation.
    pub fn dialect(&self) -> &'static dyn SqlDialect {
        match self {
            Dialect::Postgres => &Postgres,
        }
    }
}

impl SqlDialect for Dialect {
    fn name(&self) -> &'static str {
        self.dialect().name()
    }

    fn quote_identifier(&self, ident: &str) -> String {
        self.dialect().quote_identifier(ident)
    }

    fn quote_string(&self, s: &str) -> String {
        self.dialect().quote_string(s)
    }

    fn format_bool(&self, b: bool) -> &'static str {
        self.dialect().format_bool(b)
    }

    fn format_null(&self) -> &'static str {
        self.dialect().format_null()
    }

    fn concat_operator(&self) -> &'static str {
        self.dialect().concat_operator()
    }

    fn remap_function(&self, name: &str) -> Option<&'static str> {
        self.dialect().remap_function(name)
    }
}

impl std::fmt::Display for Dialect {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.dialect().name())
    }
}

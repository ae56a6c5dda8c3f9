//! DML statements (UPDATE).
//!
//! Computed columns are persisted with a single set-based
//! `UPDATE ... FROM (<select>) AS src` per batch.

use super::dialect::Dialect;
use super::expr::{Expr, ExprExt};
use super::query::{Layout, TableRef};
use super::token::{Token, TokenStream};

/// UPDATE statement builder.
#[derive(Debug, Clone, PartialEq)]
#[must_use = "builders have no effect until used"]
pub struct Update {
    pub schema: Option<String>,
    pub table: String,
    pub alias: Option<String>,
    pub set: Vec<(String, Expr)>,
    pub from: Option<TableRef>,
    pub filter: Option<Expr>,
}

impl Update {
    /// Create a new UPDATE statement.
    pub fn table(table: impl Into<String>) -> Self {
        Self {
            schema: None,
            table: table.into(),
            alias: None,
            set: Vec::new(),
            from: None,
            filter: None,
        }
    }

    /// Create an UPDATE against a possibly schema-qualified name (`schema.table`).
    pub fn qualified(name: &str) -> Self {
        match name.split_once('.') {
            Some((schema, table)) => Update::table(table).schema(schema),
            None => Update::table(name),
        }
    }

    /// Set the schema.
    pub fn schema(mut self, schema: impl Into<String>) -> Self {
        self.schema = Some(schema.into());
        self
    }

    /// Alias the target table.
    pub fn alias(mut self, alias: impl Into<String>) -> Self {
        self.alias = Some(alias.into());
        self
    }

    /// Set a column to a value.
    pub fn set(mut self, column: impl Into<String>, value: impl Into<Expr>) -> Self {
        self.set.push((column.into(), value.into()));
        self
    }

    /// Add a FROM item (PostgreSQL `UPDATE ... FROM`).
    pub fn from(mut self, source: TableRef) -> Self {
        self.from = Some(source);
        self
    }

    /// Add WHERE clause (ANDed with existing conditions).
    pub fn filter(mut self, expr: Expr) -> Self {
        self.filter = Some(match self.filter {
            Some(existing) => existing.and(expr),
            None => expr,
        });
        self
    }

    /// Convert to PostgreSQL text.
    pub fn to_sql(&self) -> String {
        self.to_tokens().serialize(Dialect::Postgres)
    }

    /// Convert to token stream.
    pub fn to_tokens(&self) -> TokenStream {
        let mut ts = TokenStream::new();

        // UPDATE table
        ts.push(Token::Update).space();
        ts.push(Token::QualifiedIdent {
            schema: self.schema.clone(),
            name: self.table.clone(),
        });
        if let Some(alias) = &self.alias {
            ts.space()
                .push(Token::As)
                .space()
                .push(Token::Ident(alias.clone()));
        }

        // SET clause
        ts.newline().push(Token::Set).space();
        for (i, (col, expr)) in self.set.iter().enumerate() {
            if i > 0 {
                ts.comma().newline().indent(2);
            }
            ts.push(Token::Ident(col.clone()))
                .space()
                .push(Token::Eq)
                .space()
                .append(&expr.to_tokens());
        }

        // FROM clause
        if let Some(source) = &self.from {
            ts.newline()
                .push(Token::From)
                .space()
                .append(&source.to_tokens_with_layout(Layout::Pretty));
        }

        // WHERE clause
        if let Some(filter) = &self.filter {
            ts.newline()
                .push(Token::Where)
                .space()
                .append(&filter.to_tokens());
        }

        ts
    }
}

impl std::fmt::Display for Update {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.to_sql())
    }
}

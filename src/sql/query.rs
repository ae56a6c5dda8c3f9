//! Query builder - construct SQL queries with a fluent API.

use super::dialect::Dialect;
use super::expr::{Expr, ExprExt};
use super::token::{Token, TokenStream};

/// Rendering layout for a query.
///
/// Top-level statements put each clause on its own line; queries nested
/// inside expressions or FROM items render on a single line.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Layout {
    Pretty,
    Inline,
}

impl Layout {
    fn clause_break(self, ts: &mut TokenStream) {
        match self {
            Layout::Pretty => ts.newline(),
            Layout::Inline => ts.space(),
        };
    }

    fn list_item_break(self, ts: &mut TokenStream, first: bool) {
        if !first {
            ts.comma();
        }
        match self {
            Layout::Pretty => {
                ts.newline().indent(1);
            }
            Layout::Inline => {
                ts.space();
            }
        }
    }
}

// =============================================================================
// Select Expression (column with optional alias)
// =============================================================================

/// A SELECT list item: expression with optional alias.
#[derive(Debug, Clone, PartialEq)]
#[must_use = "builders have no effect until used"]
pub struct SelectExpr {
    pub expr: Expr,
    pub alias: Option<String>,
}

impl SelectExpr {
    pub fn new(expr: Expr) -> Self {
        Self { expr, alias: None }
    }

    pub fn with_alias(mut self, alias: &str) -> Self {
        self.alias = Some(alias.into());
        self
    }

    pub fn to_tokens(&self) -> TokenStream {
        let mut ts = self.expr.to_tokens();
        if let Some(alias) = &self.alias {
            ts.space()
                .push(Token::As)
                .space()
                .push(Token::Ident(alias.clone()));
        }
        ts
    }
}

impl From<Expr> for SelectExpr {
    fn from(expr: Expr) -> Self {
        SelectExpr::new(expr)
    }
}

// =============================================================================
// Table Reference
// =============================================================================

/// What a FROM item reads from.
#[derive(Debug, Clone, PartialEq)]
pub enum TableSource {
    /// Physical table or CTE: optional_schema.name
    Table { schema: Option<String>, name: String },
    /// Set-returning function call, optionally `WITH ORDINALITY`.
    Function { call: Expr, with_ordinality: bool },
    /// Derived table: (SELECT ...)
    Subquery(Box<Query>),
}

/// A FROM item with optional alias and column aliases.
#[derive(Debug, Clone, PartialEq)]
#[must_use = "builders have no effect until used"]
pub struct TableRef {
    pub source: TableSource,
    pub alias: Option<String>,
    pub column_aliases: Vec<String>,
}

impl TableRef {
    pub fn new(table: &str) -> Self {
        Self {
            source: TableSource::Table {
                schema: None,
                name: table.into(),
            },
            alias: None,
            column_aliases: vec![],
        }
    }

    /// Build a reference from a possibly schema-qualified name (`schema.table`).
    pub fn qualified(name: &str) -> Self {
        match name.split_once('.') {
            Some((schema, table)) => TableRef::new(table).with_schema(schema),
            None => TableRef::new(name),
        }
    }

    /// FROM item over a set-returning function.
    pub fn function(call: Expr) -> Self {
        Self {
            source: TableSource::Function {
                call,
                with_ordinality: false,
            },
            alias: None,
            column_aliases: vec![],
        }
    }

    /// FROM item over a derived table.
    pub fn subquery(query: Query) -> Self {
        Self {
            source: TableSource::Subquery(Box::new(query)),
            alias: None,
            column_aliases: vec![],
        }
    }

    pub fn with_schema(mut self, schema: &str) -> Self {
        if let TableSource::Table { schema: s, .. } = &mut self.source {
            *s = Some(schema.into());
        }
        self
    }

    pub fn with_alias(mut self, alias: &str) -> Self {
        self.alias = Some(alias.into());
        self
    }

    /// Append `WITH ORDINALITY` to a function source.
    pub fn with_ordinality(mut self) -> Self {
        if let TableSource::Function {
            with_ordinality, ..
        } = &mut self.source
        {
            *with_ordinality = true;
        }
        self
    }

    pub fn with_column_aliases(mut self, columns: &[&str]) -> Self {
        self.column_aliases = columns.iter().map(|c| c.to_string()).collect();
        self
    }

    pub fn to_tokens(&self) -> TokenStream {
        self.to_tokens_with_layout(Layout::Inline)
    }

    pub(crate) fn to_tokens_with_layout(&self, layout: Layout) -> TokenStream {
        let mut ts = TokenStream::new();
        match &self.source {
            TableSource::Table { schema, name } => {
                ts.push(Token::QualifiedIdent {
                    schema: schema.clone(),
                    name: name.clone(),
                });
            }
            TableSource::Function {
                call,
                with_ordinality,
            } => {
                ts.append(&call.to_tokens());
                if *with_ordinality {
                    ts.space().push(Token::WithOrdinality);
                }
            }
            TableSource::Subquery(query) => {
                ts.lparen();
                match layout {
                    Layout::Pretty => {
                        ts.newline()
                            .append(&query.to_tokens_with_layout(Layout::Pretty))
                            .newline();
                    }
                    Layout::Inline => {
                        ts.append(&query.to_inline_tokens());
                    }
                }
                ts.rparen();
            }
        }
        if let Some(alias) = &self.alias {
            ts.space()
                .push(Token::As)
                .space()
                .push(Token::Ident(alias.clone()));
            if !self.column_aliases.is_empty() {
                ts.lparen();
                for (i, column) in self.column_aliases.iter().enumerate() {
                    if i > 0 {
                        ts.comma().space();
                    }
                    ts.push(Token::Ident(column.clone()));
                }
                ts.rparen();
            }
        }
        ts
    }
}

// =============================================================================
// Joins
// =============================================================================

/// Type of join.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JoinType {
    Inner,
    Left,
}

/// A JOIN clause.
#[derive(Debug, Clone, PartialEq)]
pub struct Join {
    pub join_type: JoinType,
    pub lateral: bool,
    pub table: TableRef,
    pub on: Option<Expr>,
}

impl Join {
    pub fn to_tokens(&self) -> TokenStream {
        let mut ts = TokenStream::new();

        match self.join_type {
            JoinType::Inner => ts.push(Token::Inner),
            JoinType::Left => ts.push(Token::Left),
        };

        ts.space().push(Token::Join).space();
        if self.lateral {
            ts.push(Token::Lateral).space();
        }
        ts.append(&self.table.to_tokens());

        if let Some(on) = &self.on {
            ts.space().push(Token::On).space();
            ts.append(&on.to_tokens());
        }

        ts
    }
}

// =============================================================================
// ORDER BY
// =============================================================================

/// Sort direction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SortDir {
    #[default]
    Asc,
}

/// An ORDER BY expression.
#[derive(Debug, Clone, PartialEq)]
#[must_use = "builders have no effect until used"]
pub struct OrderByExpr {
    pub expr: Expr,
    pub dir: Option<SortDir>,
}

impl OrderByExpr {
    pub fn asc(expr: Expr) -> Self {
        Self {
            expr,
            dir: Some(SortDir::Asc),
        }
    }

    pub fn to_tokens(&self) -> TokenStream {
        let mut ts = self.expr.to_tokens();

        if let Some(dir) = &self.dir {
            ts.space().push(match dir {
                SortDir::Asc => Token::Asc,
            });
        }

        ts
    }
}

/// Emit `ORDER BY a, b` into a stream.
pub(crate) fn emit_order_by(ts: &mut TokenStream, order_by: &[OrderByExpr]) {
    ts.push(Token::OrderBy).space();
    for (i, order_expr) in order_by.iter().enumerate() {
        if i > 0 {
            ts.comma().space();
        }
        ts.append(&order_expr.to_tokens());
    }
}

// =============================================================================
// CTE (Common Table Expression)
// =============================================================================

/// A Common Table Expression (WITH clause).
#[derive(Debug, Clone, PartialEq)]
#[must_use = "builders have no effect until used"]
pub struct Cte {
    pub name: String,
    pub query: Box<Query>,
}

impl Cte {
    pub fn new(name: &str, query: Query) -> Self {
        Self {
            name: name.into(),
            query: Box::new(query),
        }
    }

    fn to_tokens_with_layout(&self, layout: Layout) -> TokenStream {
        let mut ts = TokenStream::new();
        ts.push(Token::Ident(self.name.clone()));
        ts.space().push(Token::As).space().lparen();
        match layout {
            Layout::Pretty => {
                ts.newline()
                    .append(&self.query.to_tokens_with_layout(Layout::Pretty))
                    .newline();
            }
            Layout::Inline => {
                ts.append(&self.query.to_inline_tokens());
            }
        }
        ts.rparen();
        ts
    }
}

// =============================================================================
// Query Builder
// =============================================================================

/// A SELECT query.
#[derive(Debug, Clone, Default, PartialEq)]
#[must_use = "Query has no effect until converted to SQL with to_sql() or to_tokens()"]
pub struct Query {
    pub with: Vec<Cte>,
    pub select: Vec<SelectExpr>,
    pub distinct: bool,
    pub from: Option<TableRef>,
    pub joins: Vec<Join>,
    pub where_clause: Option<Expr>,
    pub order_by: Vec<OrderByExpr>,
    pub limit: Option<u64>,
}

impl Query {
    /// Create a new empty query.
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a CTE (WITH clause).
    pub fn with_cte(mut self, cte: Cte) -> Self {
        self.with.push(cte);
        self
    }

    /// Set the SELECT list.
    pub fn select(mut self, exprs: Vec<impl Into<SelectExpr>>) -> Self {
        self.select = exprs.into_iter().map(|e| e.into()).collect();
        self
    }

    /// Set the FROM item.
    pub fn from(mut self, table: TableRef) -> Self {
        self.from = Some(table);
        self
    }

    /// Add a JOIN.
    pub fn join(mut self, join_type: JoinType, table: TableRef, on: Expr) -> Self {
        self.joins.push(Join {
            join_type,
            lateral: false,
            table,
            on: Some(on),
        });
        self
    }

    /// Add an INNER JOIN.
    pub fn inner_join(self, table: TableRef, on: Expr) -> Self {
        self.join(JoinType::Inner, table, on)
    }

    /// Add a `LEFT JOIN LATERAL (...) ON TRUE`.
    pub fn left_join_lateral(mut self, table: TableRef) -> Self {
        self.joins.push(Join {
            join_type: JoinType::Left,
            lateral: true,
            table,
            on: Some(Expr::Literal(super::expr::Literal::Bool(true))),
        });
        self
    }

    /// Add a WHERE condition (ANDed with existing conditions).
    pub fn filter(mut self, condition: Expr) -> Self {
        self.where_clause = Some(match self.where_clause {
            Some(existing) => existing.and(condition),
            None => condition,
        });
        self
    }

    /// Set the ORDER BY clause.
    pub fn order_by(mut self, exprs: Vec<OrderByExpr>) -> Self {
        self.order_by = exprs;
        self
    }

    /// Set LIMIT.
    pub fn limit(mut self, limit: u64) -> Self {
        self.limit = Some(limit);
        self
    }

    /// Convert to a multi-line token stream.
    pub fn to_tokens(&self) -> TokenStream {
        self.to_tokens_with_layout(Layout::Pretty)
    }

    /// Convert to a single-line token stream, as used inside expressions.
    pub fn to_inline_tokens(&self) -> TokenStream {
        self.to_tokens_with_layout(Layout::Inline)
    }

    pub(crate) fn to_tokens_with_layout(&self, layout: Layout) -> TokenStream {
        let mut ts = TokenStream::new();

        // WITH clause
        if !self.with.is_empty() {
            ts.push(Token::With).space();
            for (i, cte) in self.with.iter().enumerate() {
                if i > 0 {
                    ts.comma();
                    layout.clause_break(&mut ts);
                }
                ts.append(&cte.to_tokens_with_layout(layout));
            }
            layout.clause_break(&mut ts);
        }

        // SELECT
        ts.push(Token::Select);
        if self.distinct {
            ts.space().push(Token::Distinct);
        }

        // Columns
        for (i, select_expr) in self.select.iter().enumerate() {
            layout.list_item_break(&mut ts, i == 0);
            ts.append(&select_expr.to_tokens());
        }

        // FROM
        if let Some(from) = &self.from {
            layout.clause_break(&mut ts);
            ts.push(Token::From).space();
            ts.append(&from.to_tokens_with_layout(layout));
        }

        // JOINs
        for join in &self.joins {
            layout.clause_break(&mut ts);
            ts.append(&join.to_tokens());
        }

        // WHERE
        if let Some(where_clause) = &self.where_clause {
            layout.clause_break(&mut ts);
            ts.push(Token::Where).space();
            ts.append(&where_clause.to_tokens());
        }

        // ORDER BY
        if !self.order_by.is_empty() {
            layout.clause_break(&mut ts);
            emit_order_by(&mut ts, &self.order_by);
        }

        // LIMIT
        if let Some(limit) = self.limit {
            layout.clause_break(&mut ts);
            ts.push(Token::Limit)
                .space()
                .push(Token::LitInt(limit as i64));
        }

        ts
    }

    /// Generate the PostgreSQL text of this query.
    pub fn to_sql(&self) -> String {
        self.to_tokens().serialize(Dialect::Postgres)
    }
}

impl std::fmt::Display for Query {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.to_sql())
    }
}

// =============================================================================
// Tests
// =============================================================================

//! SQL generation module.
//!
//! A type-safe PostgreSQL builder:
//!
//! - [`query`] - SELECT query builder (CTEs, lateral joins, table functions)
//! - [`expr`] - Expression AST and builder DSL
//! - [`dml`] - UPDATE ... FROM statements
//! - [`token`] - Token types for SQL generation
//! - [`dialect`] - lexical rules of the target dialect
//! - [`validate`] - parse-back validation with sqlparser

pub mod dialect;
pub mod dml;
pub mod expr;
pub mod query;
pub mod token;
pub mod types;
pub mod validate;

pub use dialect::{Dialect, SqlDialect};
pub use dml::Update;
pub use expr::{
    case_when, cast, coalesce, col, func, func_ordered, lit_bool, lit_float, lit_int, lit_null,
    lit_str, raw_sql, star, table_col, typed_null, BinaryOperator, Expr, ExprExt, Literal,
    UnaryOperator,
};
pub use query::{
    Cte, Join, JoinType, OrderByExpr, Query, SelectExpr, SortDir, TableRef,
    TableSource,
};
pub use token::{Token, TokenStream};
pub use types::DataType;
pub use validate::validate_sql;

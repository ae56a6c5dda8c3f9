//! # fieldsql
//!
//! Compiles the computed fields of a spreadsheet-like table into
//! PostgreSQL.
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────┐
//! │            Table model (fields, kinds, options)          │
//! └─────────────────────────────────────────────────────────┘
//!                          │
//!                          ▼ [output columns, operand resolution]
//! ┌─────────────────────────────────────────────────────────┐
//! │   Per-field SqlExpr  +  lateral join requests (planner)  │
//! └─────────────────────────────────────────────────────────┘
//!                          │
//!            ┌─────────────┴──────────────┐
//!            ▼ [select]                   ▼ [levels + batch]
//! ┌──────────────────────┐     ┌─────────────────────────────┐
//! │  Record read query   │     │ level_0..level_n CTEs,      │
//! │  (display columns)   │     │ SELECT or UPDATE ... FROM   │
//! └──────────────────────┘     └─────────────────────────────┘
//! ```
//!
//! Formula text is handed to a [`compute::FormulaTranslator`]; the crate
//! ships a minimal [`compute::TemplateTranslator`].

pub mod compute;
pub mod config;
pub mod error;
pub mod model;
pub mod sql;

pub use error::{DomainError, DomainResult};

/// Re-exports for convenient usage.
pub mod prelude {
    pub use crate::compute::{
        build_select_query, compute_field_levels, CompileContext, ComputedFieldSelectCompiler,
        DirtyRecords, FieldResolver, FormulaTranslator, LateralJoinPlan, LateralJoinPlanner,
        SameTableBatchCompiler, SameTableFieldLevel, SqlExpr, TemplateTranslator,
    };
    pub use crate::config::Settings;
    pub use crate::error::{DomainError, DomainResult};
    pub use crate::model::{Field, FieldId, FieldKind, Table, TableId};
    pub use crate::sql::{Dialect, Expr, ExprExt, Query, SelectExpr, TableRef};
}

//! Computed-field compilation.
//!
//! - [`output_column`] - physical column of each field
//! - [`reference`] - formula operands
//! - [`lateral`] - cross-table join requests
//! - [`formula`] - translator seam and result shaping
//! - [`select`] - display columns and the record read query
//! - [`levels`] / [`batch`] - dependency-ordered recomputation

pub mod batch;
pub mod context;
pub mod formula;
pub mod lateral;
pub mod levels;
pub mod output_column;
pub mod reference;
pub mod select;
pub mod sql_expr;
pub mod user;

pub use crate::error::{DomainError, DomainResult};
pub use batch::{BatchQuery, ColumnMapping, DirtyRecords, SameTableBatchCompiler, SameTableFieldLevel};
pub use context::CompileContext;
pub use formula::{is_volatile, FormulaTranslator, TemplateTranslator, TranslateError};
pub use lateral::{
    resolve_link_order_by, JoinKey, LateralColumnType, LateralJoinPlan, LateralJoinPlanner,
    LateralJoinRequest, LinkOrderBy,
};
pub use levels::{compute_field_levels, field_references};
pub use output_column::{FieldOutputColumn, OutputColumnResolver};
pub use reference::{FieldReferenceResolver, FieldResolver};
pub use select::{build_select_query, ComputedFieldSelectCompiler};
pub use sql_expr::{ExprOrigin, SqlExpr, StorageKind, ValueType};

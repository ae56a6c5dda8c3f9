//! Formula operand resolution.
//!
//! Every `{fieldId}` token of a formula is turned into a typed operand by
//! [`FieldReferenceResolver`]. Cross-table operands request a lateral join
//! through the planner and reference its output column.

use tracing::warn;

use crate::error::DomainResult;
use crate::model::field::{Field, FieldId, FieldKind};
use crate::model::types::FieldType;
use crate::sql::expr::{coalesce, table_col};

use super::context::CompileContext;
use super::lateral::{resolve_link_order_by, LateralColumnType, LateralJoinPlanner};
use super::output_column::OutputColumnResolver;
use super::sql_expr::{SqlExpr, StorageKind, ValueType};
use super::user::user_name;

/// Callback the formula translator uses for each field token.
pub trait FieldResolver {
    fn resolve_field(&mut self, field_id: &FieldId) -> DomainResult<SqlExpr>;
}

/// Resolves field tokens against the main table, lateral joins and the
/// users table.
pub struct FieldReferenceResolver<'a, 'p> {
    ctx: CompileContext<'a>,
    planner: &'p mut dyn LateralJoinPlanner,
}

impl<'a, 'p> FieldReferenceResolver<'a, 'p> {
    pub fn new(ctx: CompileContext<'a>, planner: &'p mut dyn LateralJoinPlanner) -> Self {
        Self { ctx, planner }
    }

    /// Operand for one field.
    pub fn resolve(&mut self, field: &Field) -> DomainResult<SqlExpr> {
        let value_type = ValueType::from(field.cell_value_type);
        let is_array = field.is_multiple_cell_value;

        if field.has_error || self.ctx.is_foreign_table_missing(field) {
            warn!(
                field_id = %field.id,
                has_error = field.has_error,
                "field operand degraded to NULL"
            );
            return Ok(SqlExpr::typed_null(value_type, is_array)
                .with_origin(&field.id, field.field_type()));
        }

        let column_alias = OutputColumnResolver::resolve(field)?;
        let lateral_storage = if is_array {
            StorageKind::Json
        } else {
            StorageKind::Scalar
        };

        let operand = match &field.kind {
            FieldKind::SingleLineText
            | FieldKind::LongText
            | FieldKind::Number
            | FieldKind::Checkbox
            | FieldKind::Date
            | FieldKind::SingleSelect
            | FieldKind::MultipleSelect
            | FieldKind::Rating
            | FieldKind::AutoNumber
            | FieldKind::CreatedTime
            | FieldKind::LastModifiedTime
            | FieldKind::User
            | FieldKind::Attachment
            | FieldKind::Button
            | FieldKind::Formula(_) => {
                let storage = if field.field_type().is_json_backed() || is_array {
                    StorageKind::Json
                } else {
                    StorageKind::Scalar
                };
                SqlExpr::new(self.ctx.column(field)?, value_type)
                    .with_array(is_array)
                    .with_storage(storage)
            }

            FieldKind::CreatedBy | FieldKind::LastModifiedBy => {
                let columns = &self.ctx.settings.columns;
                let author_column = if matches!(field.kind, FieldKind::CreatedBy) {
                    &columns.created_by
                } else {
                    &columns.last_modified_by
                };
                let author = self.ctx.system_column(author_column);
                let name = user_name(&self.ctx.settings.users, author.clone());
                SqlExpr::new(coalesce(vec![name, author]), ValueType::String)
            }

            FieldKind::Link(link) => {
                let alias = self.planner.add_column(
                    &field.id,
                    &link.foreign_table_id,
                    &column_alias,
                    LateralColumnType::Link {
                        lookup_field_id: link.lookup_field_id.clone(),
                        is_multiple: is_array,
                        order_by: resolve_link_order_by(link),
                    },
                );
                SqlExpr::new(table_col(&alias, &column_alias), value_type)
                    .with_array(is_array)
                    .with_storage(StorageKind::Json)
            }

            FieldKind::Lookup(options) => {
                let Some(link) = self.ctx.lookup_link(field, &options.link_field_id)? else {
                    return Ok(SqlExpr::typed_null(value_type, is_array)
                        .with_origin(&field.id, options.lookup_field_type));
                };
                let alias = self.planner.add_column(
                    &options.link_field_id,
                    &options.foreign_table_id,
                    &column_alias,
                    LateralColumnType::Lookup {
                        foreign_field_id: options.lookup_field_id.clone(),
                        is_multiple: is_array,
                        order_by: resolve_link_order_by(link),
                        filter: options.filter.clone(),
                    },
                );
                return Ok(SqlExpr::new(table_col(&alias, &column_alias), value_type)
                    .with_array(is_array)
                    .with_storage(lateral_storage)
                    .with_origin(&field.id, options.lookup_field_type));
            }

            FieldKind::Rollup(options) => {
                let Some(link) = self.ctx.lookup_link(field, &options.link_field_id)? else {
                    return Ok(SqlExpr::typed_null(value_type, is_array)
                        .with_origin(&field.id, FieldType::Rollup));
                };
                let alias = self.planner.add_column(
                    &options.link_field_id,
                    &options.foreign_table_id,
                    &column_alias,
                    LateralColumnType::Rollup {
                        foreign_field_id: options.lookup_field_id.clone(),
                        expression: options.expression.clone(),
                        order_by: resolve_link_order_by(link),
                    },
                );
                SqlExpr::new(table_col(&alias, &column_alias), value_type)
                    .with_array(is_array)
                    .with_storage(lateral_storage)
            }

            FieldKind::ConditionalLookup(options) => {
                let alias = self.planner.add_conditional_column(
                    &field.id,
                    &options.foreign_table_id,
                    &column_alias,
                    LateralColumnType::ConditionalLookup {
                        foreign_field_id: options.lookup_field_id.clone(),
                        is_multiple: is_array,
                        filter: options.filter.clone(),
                    },
                );
                return Ok(SqlExpr::new(table_col(&alias, &column_alias), value_type)
                    .with_array(is_array)
                    .with_storage(lateral_storage)
                    .with_origin(&field.id, options.lookup_field_type));
            }

            FieldKind::ConditionalRollup(options) => {
                let alias = self.planner.add_conditional_column(
                    &field.id,
                    &options.foreign_table_id,
                    &column_alias,
                    LateralColumnType::ConditionalRollup {
                        foreign_field_id: options.lookup_field_id.clone(),
                        expression: options.expression.clone(),
                        filter: options.filter.clone(),
                    },
                );
                SqlExpr::new(table_col(&alias, &column_alias), value_type)
                    .with_array(is_array)
                    .with_storage(lateral_storage)
            }
        };

        Ok(operand.with_origin(&field.id, field.field_type()))
    }
}

impl FieldResolver for FieldReferenceResolver<'_, '_> {
    fn resolve_field(&mut self, field_id: &FieldId) -> DomainResult<SqlExpr> {
        let field = self.ctx.field(field_id)?;
        self.resolve(field)
    }
}

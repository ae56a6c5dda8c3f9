//! Display-column projection for every field kind.

use tracing::{debug, warn};

use crate::error::{DomainError, DomainResult};
use crate::model::field::{Field, FieldKind, FormulaOptions};
use crate::sql::expr::{
    case_when, coalesce, func, func_ordered, lit_null, lit_str, table_col, typed_null, Expr,
    ExprExt,
};
use crate::sql::query::{OrderByExpr, Query, SelectExpr, TableRef};
use crate::sql::types::DataType;

use super::context::CompileContext;
use super::formula::{finalize_formula_value, is_volatile, FormulaTranslator};
use super::lateral::{resolve_link_order_by, LateralColumnType, LateralJoinPlan, LateralJoinPlanner};
use super::output_column::OutputColumnResolver;
use super::reference::FieldReferenceResolver;
use super::sql_expr::{SqlExpr, ValueType};
use super::user::user_object;

const ELEMENTS_ALIAS: &str = "elem";

/// Builds the SELECT-list entry of each field.
pub struct ComputedFieldSelectCompiler<'a> {
    ctx: CompileContext<'a>,
    translator: &'a dyn FormulaTranslator,
}

impl<'a> ComputedFieldSelectCompiler<'a> {
    pub fn new(ctx: CompileContext<'a>, translator: &'a dyn FormulaTranslator) -> Self {
        Self { ctx, translator }
    }

    /// The field's display column, aliased to its stored column name.
    pub fn compile(
        &self,
        field: &Field,
        planner: &mut dyn LateralJoinPlanner,
    ) -> DomainResult<SelectExpr> {
        let column_alias = OutputColumnResolver::resolve(field)?;
        let value = self.compile_value(field, &column_alias, planner)?;
        Ok(value.alias(&column_alias))
    }

    fn compile_value(
        &self,
        field: &Field,
        column_alias: &str,
        planner: &mut dyn LateralJoinPlanner,
    ) -> DomainResult<Expr> {
        let is_multiple = field.is_multiple_cell_value;

        match &field.kind {
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
            | FieldKind::Attachment
            | FieldKind::Button => self.ctx.column(field),

            FieldKind::User => {
                let stored = self.ctx.column(field)?;
                Ok(self.user_values(stored, is_multiple))
            }

            FieldKind::CreatedBy | FieldKind::LastModifiedBy => {
                let columns = &self.ctx.settings.columns;
                let author_column = if matches!(field.kind, FieldKind::CreatedBy) {
                    &columns.created_by
                } else {
                    &columns.last_modified_by
                };
                let author = self.ctx.system_column(author_column);
                let object = coalesce(vec![
                    user_object(&self.ctx.settings.users, author.clone()),
                    func("jsonb_build_object", vec![lit_str("id"), author.clone()]),
                ]);
                Ok(case_when(author.is_null(), lit_null(), object))
            }

            FieldKind::Formula(options) => self.formula(field, options, planner),

            FieldKind::Link(link) => {
                if self.is_unavailable(field) {
                    return Ok(typed_null(DataType::Jsonb));
                }
                let alias = planner.add_column(
                    &field.id,
                    &link.foreign_table_id,
                    column_alias,
                    LateralColumnType::Link {
                        lookup_field_id: link.lookup_field_id.clone(),
                        is_multiple,
                        order_by: resolve_link_order_by(link),
                    },
                );
                Ok(table_col(&alias, column_alias))
            }

            FieldKind::Lookup(options) => {
                if self.is_unavailable(field) {
                    return Ok(typed_null(DataType::Jsonb));
                }
                let Some(link) = self.ctx.lookup_link(field, &options.link_field_id)? else {
                    return Ok(typed_null(DataType::Jsonb));
                };
                let alias = planner.add_column(
                    &options.link_field_id,
                    &options.foreign_table_id,
                    column_alias,
                    LateralColumnType::Lookup {
                        foreign_field_id: options.lookup_field_id.clone(),
                        is_multiple,
                        order_by: resolve_link_order_by(link),
                        filter: options.filter.clone(),
                    },
                );
                Ok(table_col(&alias, column_alias))
            }

            FieldKind::Rollup(options) => {
                if self.is_unavailable(field) {
                    return Ok(self.rollup_null(field));
                }
                let Some(link) = self.ctx.lookup_link(field, &options.link_field_id)? else {
                    return Ok(self.rollup_null(field));
                };
                let alias = planner.add_column(
                    &options.link_field_id,
                    &options.foreign_table_id,
                    column_alias,
                    LateralColumnType::Rollup {
                        foreign_field_id: options.lookup_field_id.clone(),
                        expression: options.expression.clone(),
                        order_by: resolve_link_order_by(link),
                    },
                );
                Ok(table_col(&alias, column_alias))
            }

            FieldKind::ConditionalLookup(options) => {
                if self.is_unavailable(field) {
                    return Ok(typed_null(DataType::Jsonb));
                }
                let alias = planner.add_conditional_column(
                    &field.id,
                    &options.foreign_table_id,
                    column_alias,
                    LateralColumnType::ConditionalLookup {
                        foreign_field_id: options.lookup_field_id.clone(),
                        is_multiple,
                        filter: options.filter.clone(),
                    },
                );
                Ok(table_col(&alias, column_alias))
            }

            FieldKind::ConditionalRollup(options) => {
                if self.is_unavailable(field) {
                    return Ok(self.rollup_null(field));
                }
                let alias = planner.add_conditional_column(
                    &field.id,
                    &options.foreign_table_id,
                    column_alias,
                    LateralColumnType::ConditionalRollup {
                        foreign_field_id: options.lookup_field_id.clone(),
                        expression: options.expression.clone(),
                        filter: options.filter.clone(),
                    },
                );
                Ok(table_col(&alias, column_alias))
            }
        }
    }

    fn formula(
        &self,
        field: &Field,
        options: &FormulaOptions,
        planner: &mut dyn LateralJoinPlanner,
    ) -> DomainResult<Expr> {
        if field.has_error {
            warn!(field_id = %field.id, "formula has errors, projected as NULL");
            return Ok(lit_null());
        }
        if options.persist_volatile && is_volatile(&options.expression) {
            debug!(field_id = %field.id, "volatile formula read from stored column");
            return self.ctx.column(field);
        }

        let time_zone = options
            .time_zone
            .as_deref()
            .unwrap_or(self.ctx.settings.compile.time_zone.as_str());
        let mut resolver = FieldReferenceResolver::new(self.ctx, planner);
        let translated = self
            .translator
            .translate(&options.expression, &mut resolver, time_zone)
            .map_err(|source| DomainError::Translate {
                field_id: field.id.clone(),
                source,
            })?;

        Ok(finalize_formula_value(
            translated,
            ValueType::from(field.cell_value_type),
            field.is_multiple_cell_value,
        ))
    }

    fn is_unavailable(&self, field: &Field) -> bool {
        if field.has_error || self.ctx.is_foreign_table_missing(field) {
            warn!(field_id = %field.id, "cross-table field projected as NULL");
            return true;
        }
        false
    }

    fn rollup_null(&self, field: &Field) -> Expr {
        SqlExpr::typed_null(
            ValueType::from(field.cell_value_type),
            field.is_multiple_cell_value,
        )
        .value
    }

    /// Stored user ids (or user objects) expanded to full user objects.
    fn user_values(&self, stored: Expr, is_multiple: bool) -> Expr {
        let normalized = Expr::Case {
            operand: None,
            when_clauses: vec![
                (stored.clone().is_null(), lit_str("[]").cast_as(DataType::Jsonb)),
                (
                    func("jsonb_typeof", vec![stored.clone()]).eq(lit_str("array")),
                    stored.clone(),
                ),
            ],
            else_clause: Some(Box::new(func("jsonb_build_array", vec![stored]))),
        };
        let elements = TableRef::function(func("jsonb_array_elements", vec![normalized]))
            .with_ordinality()
            .with_alias(ELEMENTS_ALIAS)
            .with_column_aliases(&["value", "ord"]);

        let element = table_col(ELEMENTS_ALIAS, "value");
        let element_id = coalesce(vec![
            element.clone().json_get_text(lit_str("id")),
            element.clone().json_path_text(&[]),
        ]);
        let object = coalesce(vec![
            user_object(&self.ctx.settings.users, element_id),
            element,
        ]);
        let ordinal = OrderByExpr::asc(table_col(ELEMENTS_ALIAS, "ord"));

        let query = if is_multiple {
            Query::new()
                .select(vec![func_ordered("jsonb_agg", vec![object], vec![ordinal])])
                .from(elements)
        } else {
            Query::new()
                .select(vec![object])
                .from(elements)
                .order_by(vec![ordinal])
                .limit(1)
        };
        query.into()
    }
}

/// SELECT of the record id and every field's display column, in field order.
///
/// Lateral joins requested along the way are recorded in `plan`.
pub fn build_select_query(
    ctx: CompileContext<'_>,
    translator: &dyn FormulaTranslator,
    plan: &mut LateralJoinPlan,
) -> DomainResult<Query> {
    let compiler = ComputedFieldSelectCompiler::new(ctx, translator);
    let mut select = vec![ctx.system_column(ctx.record_id()).alias(ctx.record_id())];
    for field in &ctx.table.fields {
        select.push(compiler.compile(field, plan)?);
    }
    debug!(
        table = %ctx.table.id,
        columns = select.len(),
        lateral_joins = plan.len(),
        "select query built"
    );
    Ok(Query::new().select(select).from(ctx.main_table()))
}

//! Formula translation and result post-processing.
//!
//! The formula language itself is owned by a [`FormulaTranslator`]; this
//! module defines the seam, a minimal [`TemplateTranslator`], and the
//! shaping applied to every translated value before it is projected.

use once_cell::sync::Lazy;
use regex::Regex;

use crate::error::DomainError;
use crate::model::field::FieldId;
use crate::sql::expr::{case_when, func, lit_int, lit_null, lit_str, raw_sql, Expr, ExprExt};
use crate::sql::query::{OrderByExpr, Query, TableRef};
use crate::sql::types::DataType;

use super::reference::FieldResolver;
use super::sql_expr::{SqlExpr, StorageKind, ValueType};

/// Errors raised while translating a formula expression.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum TranslateError {
    #[error("Syntax error at offset {offset}: {message}")]
    Syntax { offset: usize, message: String },

    #[error("Unknown field '{0}'")]
    UnknownField(FieldId),

    #[error("{0}")]
    Resolve(Box<DomainError>),
}

impl From<DomainError> for TranslateError {
    fn from(err: DomainError) -> Self {
        match err {
            DomainError::FieldNotFound { field_id, .. } => TranslateError::UnknownField(field_id),
            other => TranslateError::Resolve(Box::new(other)),
        }
    }
}

/// Turns a formula expression into a typed SQL value.
///
/// The translator calls back into `resolver` for every field token.
pub trait FormulaTranslator {
    fn translate(
        &self,
        expression: &str,
        resolver: &mut dyn FieldResolver,
        time_zone: &str,
    ) -> Result<SqlExpr, TranslateError>;
}

static VOLATILE_REFERENCE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)LAST_MODIFIED_TIME\s*\(\s*\{").expect("valid volatile-formula regex")
});

/// Whether the expression depends on modification time of referenced fields.
pub fn is_volatile(expression: &str) -> bool {
    VOLATILE_REFERENCE.is_match(expression)
}

// =============================================================================
// Template Translator
// =============================================================================

/// Minimal translator: substitutes field tokens into SQL text.
///
/// `{fieldId}` becomes the operand SQL in parentheses; the rest of the
/// expression is passed through as SQL. A lone token returns the operand
/// unchanged. Division by a field operand is guarded against zero.
#[derive(Debug, Clone, Copy, Default)]
pub struct TemplateTranslator;

impl FormulaTranslator for TemplateTranslator {
    fn translate(
        &self,
        expression: &str,
        resolver: &mut dyn FieldResolver,
        _time_zone: &str,
    ) -> Result<SqlExpr, TranslateError> {
        let trimmed = expression.trim();
        let mut sql = String::with_capacity(trimmed.len());
        let mut operands: Vec<SqlExpr> = Vec::new();
        let mut conditions: Vec<Expr> = Vec::new();
        let mut arithmetic = false;
        let mut after_division = false;

        let mut chars = trimmed.char_indices();
        while let Some((offset, c)) = chars.next() {
            match c {
                '{' => {
                    let mut id = String::new();
                    let mut closed = false;
                    for (_, ch) in chars.by_ref() {
                        if ch == '}' {
                            closed = true;
                            break;
                        }
                        id.push(ch);
                    }
                    if !closed {
                        return Err(TranslateError::Syntax {
                            offset,
                            message: "unterminated field reference".into(),
                        });
                    }
                    if id.trim().is_empty() {
                        return Err(TranslateError::Syntax {
                            offset,
                            message: "empty field reference".into(),
                        });
                    }
                    let operand = resolver.resolve_field(&FieldId::new(id.trim()))?;
                    let value_sql = operand.value_sql();
                    if after_division {
                        conditions.push(raw_sql(&format!("({value_sql}) = 0")));
                    }
                    if let Some(condition) = &operand.error_condition {
                        conditions.push(condition.clone().paren());
                    }
                    sql.push('(');
                    sql.push_str(&value_sql);
                    sql.push(')');
                    operands.push(operand);
                    after_division = false;
                }
                '}' => {
                    return Err(TranslateError::Syntax {
                        offset,
                        message: "unmatched '}'".into(),
                    });
                }
                _ => {
                    if matches!(c, '+' | '-' | '*' | '/' | '%') {
                        arithmetic = true;
                    }
                    if c == '/' {
                        after_division = true;
                    } else if !c.is_whitespace() {
                        after_division = false;
                    }
                    sql.push(c);
                }
            }
        }

        let lone_operand = operands.len() == 1 && trimmed.starts_with('{') && trimmed.ends_with('}');
        let error_condition = conditions.into_iter().reduce(|acc, c| acc.or(c));

        if lone_operand {
            if let Some(operand) = operands.pop() {
                return Ok(operand);
            }
        }

        let value_type = if arithmetic {
            ValueType::Number
        } else if let [only] = operands.as_slice() {
            only.value_type
        } else {
            ValueType::Unknown
        };

        Ok(SqlExpr::new(raw_sql(&sql), value_type).with_error_condition(error_condition))
    }
}

// =============================================================================
// Post-processing
// =============================================================================

const ELEMENTS_ALIAS: &str = "elem";

/// Shape a translated value for projection into a scalar-or-JSON column.
///
/// Applied in order: display-text extraction for link, user and button
/// objects; unwrapping of array results for scalar formulas; the error
/// guard.
pub fn finalize_formula_value(
    translated: SqlExpr,
    declared_type: ValueType,
    declared_multiple: bool,
) -> Expr {
    let references_display_object = translated
        .origin
        .as_ref()
        .is_some_and(|o| o.field_type.has_display_object());

    let is_array = translated.is_array;
    let mut value = translated.value;

    if translated.storage_kind == StorageKind::Json && references_display_object {
        value = if is_array {
            display_titles(value)
        } else {
            display_title(value)
        };
    }

    if is_array && !declared_multiple {
        value = first_element(value, translated.storage_kind, declared_type);
    }

    guard(value, translated.error_condition)
}

/// `CASE WHEN <condition> THEN NULL ELSE <value> END`
pub fn guard(value: Expr, condition: Option<Expr>) -> Expr {
    match condition {
        Some(condition) => case_when(condition, lit_null(), value),
        None => value,
    }
}

fn is_json_array(value: &Expr) -> Expr {
    func("jsonb_typeof", vec![value.clone()]).eq(lit_str("array"))
}

/// Title of a single display object (or of the first element of an array).
fn display_title(value: Expr) -> Expr {
    case_when(
        is_json_array(&value),
        value.clone().json_get(lit_int(0)).paren().json_get_text(lit_str("title")),
        value.json_get_text(lit_str("title")),
    )
}

/// Ordered JSON array of the titles of an array of display objects.
fn display_titles(value: Expr) -> Expr {
    let elements = TableRef::function(func("jsonb_array_elements", vec![value.clone()]))
        .with_ordinality()
        .with_alias(ELEMENTS_ALIAS)
        .with_column_aliases(&["value", "ord"]);
    let element = crate::sql::expr::table_col(ELEMENTS_ALIAS, "value");
    let title = case_when(
        func("jsonb_typeof", vec![element.clone()]).eq(lit_str("object")),
        element.clone().json_get_text(lit_str("title")),
        element.json_path_text(&[]),
    );
    let aggregated = Query::new()
        .select(vec![crate::sql::expr::func_ordered(
            "jsonb_agg",
            vec![title],
            vec![OrderByExpr::asc(crate::sql::expr::table_col(ELEMENTS_ALIAS, "ord"))],
        )])
        .from(elements);
    Expr::Case {
        operand: None,
        when_clauses: vec![
            (is_json_array(&value), aggregated.into()),
            (
                func("jsonb_typeof", vec![value.clone()]).eq(lit_str("object")),
                func("jsonb_build_array", vec![value.json_get_text(lit_str("title"))]),
            ),
        ],
        else_clause: Some(Box::new(lit_null())),
    }
}

/// First element of an array value, cast to the declared scalar type.
fn first_element(value: Expr, storage: StorageKind, declared_type: ValueType) -> Expr {
    let data_type = declared_type.scalar_data_type();
    let text = match storage {
        StorageKind::Array => raw_sql(&format!("({})[1]", value.to_sql())).cast_as(DataType::Text),
        _ => case_when(
            is_json_array(&value),
            value.clone().json_get_text(lit_int(0)),
            value.json_path_text(&[]),
        ),
    };
    if data_type == DataType::Text {
        text
    } else {
        text.cast_as(data_type)
    }
}

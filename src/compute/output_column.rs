//! Physical column alias of each field.

use std::collections::HashSet;

use crate::error::{DomainError, DomainResult};
use crate::model::field::{Field, FieldId, FieldKind};
use crate::model::table::Table;

/// A field and the column its value is read from and written to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FieldOutputColumn {
    pub field_id: FieldId,
    pub column_alias: String,
}

pub struct OutputColumnResolver;

impl OutputColumnResolver {
    /// Column alias of a field.
    pub fn resolve(field: &Field) -> DomainResult<String> {
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
            | FieldKind::User
            | FieldKind::CreatedBy
            | FieldKind::LastModifiedBy
            | FieldKind::Attachment
            | FieldKind::Button
            | FieldKind::Formula(_)
            | FieldKind::Link(_)
            | FieldKind::Lookup(_)
            | FieldKind::Rollup(_)
            | FieldKind::ConditionalLookup(_)
            | FieldKind::ConditionalRollup(_) => Self::stored_column(field),
        }
    }

    /// One column per field, in table order.
    pub fn collect(table: &Table) -> DomainResult<Vec<FieldOutputColumn>> {
        let mut seen = HashSet::new();
        let mut columns = Vec::with_capacity(table.fields.len());
        for field in &table.fields {
            if !seen.insert(&field.id) {
                return Err(DomainError::DuplicateField(field.id.clone()));
            }
            columns.push(FieldOutputColumn {
                field_id: field.id.clone(),
                column_alias: Self::resolve(field)?,
            });
        }
        Ok(columns)
    }

    fn stored_column(field: &Field) -> DomainResult<String> {
        match field.db_field_name.as_deref().map(str::trim) {
            Some(name) if !name.is_empty() => Ok(name.to_string()),
            _ => Err(DomainError::MissingColumnAlias {
                field_id: field.id.clone(),
            }),
        }
    }
}

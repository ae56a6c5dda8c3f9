//! Table definitions.

use serde::{Deserialize, Serialize};
use std::collections::HashSet;

use super::field::{Field, FieldId, TableId};
use crate::error::{DomainError, DomainResult};

/// A user table and its ordered fields.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Table {
    pub id: TableId,
    pub name: String,
    /// Physical name, usually `schema.table`.
    pub db_table_name: String,
    #[serde(default)]
    pub fields: Vec<Field>,
}

impl Table {
    pub fn new(id: impl Into<String>, name: impl Into<String>, db_table_name: impl Into<String>) -> Self {
        Self {
            id: TableId::new(id),
            name: name.into(),
            db_table_name: db_table_name.into(),
            fields: Vec::new(),
        }
    }

    #[must_use]
    pub fn with_field(mut self, field: Field) -> Self {
        self.fields.push(field);
        self
    }

    pub fn field(&self, id: &FieldId) -> Option<&Field> {
        self.fields.iter().find(|f| &f.id == id)
    }

    /// Look up a field, failing with `FieldNotFound`.
    pub fn require_field(&self, id: &FieldId) -> DomainResult<&Field> {
        self.field(id).ok_or_else(|| DomainError::FieldNotFound {
            field_id: id.clone(),
            table_id: self.id.clone(),
        })
    }

    /// Position of a field in declaration order.
    pub fn field_position(&self, id: &FieldId) -> Option<usize> {
        self.fields.iter().position(|f| &f.id == id)
    }

    /// Check structural invariants: field ids are unique.
    pub fn validate(&self) -> DomainResult<()> {
        let mut seen = HashSet::new();
        for field in &self.fields {
            if !seen.insert(&field.id) {
                return Err(DomainError::DuplicateField(field.id.clone()));
            }
        }
        Ok(())
    }
}

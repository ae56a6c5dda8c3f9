//! Error types for computed-field compilation.

use std::fmt;

use crate::compute::formula::TranslateError;
use crate::model::field::{FieldId, TableId};

/// Result type for compilation operations.
pub type DomainResult<T> = Result<T, DomainError>;

/// Configuration and validation errors raised while compiling fields.
///
/// Data-dependent failures never surface here: they degrade to NULL
/// inside the generated SQL.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum DomainError {
    /// Field has no physical column to read from or write to.
    #[error("Field '{field_id}' has no database column name")]
    MissingColumnAlias { field_id: FieldId },

    /// Referenced a field that doesn't exist on the table.
    #[error("Field '{field_id}' not found in table '{table_id}'")]
    FieldNotFound { field_id: FieldId, table_id: TableId },

    /// Two fields share an id.
    #[error("Duplicate field id '{0}'")]
    DuplicateField(FieldId),

    /// Field options contradict the table (e.g. lookup through a non-link).
    #[error("Invalid field '{field_id}': {message}")]
    InvalidField { field_id: FieldId, message: String },

    /// Formula fields reference each other in a loop.
    #[error("Cyclic dependency between fields: {}", CyclePath(.0))]
    CyclicDependency(Vec<FieldId>),

    /// Structural validation failure.
    #[error("Validation failed: {0}")]
    Validation(String),

    /// The formula translator rejected an expression.
    #[error("Failed to translate formula of field '{field_id}': {source}")]
    Translate {
        field_id: FieldId,
        #[source]
        source: TranslateError,
    },
}

impl DomainError {
    pub fn invalid_field(field_id: &FieldId, message: impl Into<String>) -> Self {
        DomainError::InvalidField {
            field_id: field_id.clone(),
            message: message.into(),
        }
    }
}

struct CyclePath<'a>(&'a [FieldId]);

impl fmt::Display for CyclePath<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let ids: Vec<&str> = self.0.iter().map(FieldId::as_str).collect();
        write!(f, "{}", ids.join(" -> "))
    }
}

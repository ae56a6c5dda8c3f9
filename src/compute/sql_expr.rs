//! Typed SQL fragments produced for field operands and formula results.

use crate::model::field::FieldId;
use crate::model::types::{CellValueType, FieldType};
use crate::sql::expr::{typed_null, Expr};
use crate::sql::types::DataType;

/// Value classification of a fragment.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ValueType {
    Number,
    Boolean,
    DateTime,
    String,
    Unknown,
}

impl ValueType {
    /// Cast target for a scalar of this type.
    pub fn scalar_data_type(self) -> DataType {
        match self {
            ValueType::Number => DataType::Float64,
            ValueType::Boolean => DataType::Bool,
            ValueType::DateTime => DataType::TimestampTz,
            ValueType::String | ValueType::Unknown => DataType::Text,
        }
    }
}

impl From<CellValueType> for ValueType {
    fn from(value: CellValueType) -> Self {
        match value {
            CellValueType::Number => ValueType::Number,
            CellValueType::Boolean => ValueType::Boolean,
            CellValueType::DateTime => ValueType::DateTime,
            CellValueType::String => ValueType::String,
        }
    }
}

/// Physical shape of the value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum StorageKind {
    #[default]
    Scalar,
    Json,
    Array,
    Unknown,
}

/// Field a fragment was read from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExprOrigin {
    pub field_id: FieldId,
    pub field_type: FieldType,
}

/// A complete SQL scalar expression with its type metadata.
#[derive(Debug, Clone, PartialEq)]
pub struct SqlExpr {
    pub value: Expr,
    pub value_type: ValueType,
    pub is_array: bool,
    pub storage_kind: StorageKind,
    pub origin: Option<ExprOrigin>,
    /// Boolean condition under which the value must be NULL.
    pub error_condition: Option<Expr>,
}

impl SqlExpr {
    pub fn new(value: Expr, value_type: ValueType) -> Self {
        Self {
            value,
            value_type,
            is_array: false,
            storage_kind: StorageKind::Scalar,
            origin: None,
            error_condition: None,
        }
    }

    /// A NULL carrying a concrete type, so it composes with typed operands.
    pub fn typed_null(value_type: ValueType, is_array: bool) -> Self {
        let data_type = if is_array {
            DataType::Jsonb
        } else {
            value_type.scalar_data_type()
        };
        Self {
            is_array,
            storage_kind: if is_array {
                StorageKind::Json
            } else {
                StorageKind::Scalar
            },
            ..Self::new(typed_null(data_type), value_type)
        }
    }

    #[must_use]
    pub fn with_array(mut self, is_array: bool) -> Self {
        self.is_array = is_array;
        self
    }

    #[must_use]
    pub fn with_storage(mut self, storage_kind: StorageKind) -> Self {
        self.storage_kind = storage_kind;
        self
    }

    #[must_use]
    pub fn with_origin(mut self, field_id: &FieldId, field_type: FieldType) -> Self {
        self.origin = Some(ExprOrigin {
            field_id: field_id.clone(),
            field_type,
        });
        self
    }

    #[must_use]
    pub fn with_error_condition(mut self, condition: Option<Expr>) -> Self {
        self.error_condition = condition;
        self
    }

    /// Rendered PostgreSQL text of the value.
    pub fn value_sql(&self) -> String {
        self.value.to_sql()
    }

    pub fn error_condition_sql(&self) -> Option<String> {
        self.error_condition.as_ref().map(Expr::to_sql)
    }

    /// Whether the value holds a JSON document.
    pub fn is_json(&self) -> bool {
        self.storage_kind == StorageKind::Json
    }
}

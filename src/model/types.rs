//! Scalar classifications shared by fields and compiled expressions.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Declared type of a field's cell value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum CellValueType {
    String,
    Number,
    Boolean,
    DateTime,
}

/// Cardinality of a link between two tables, seen from the host table.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum Relationship {
    OneOne,
    ManyOne,
    OneMany,
    ManyMany,
}

impl Relationship {
    /// Whether a host record may link to several foreign records.
    pub fn is_multiple(self) -> bool {
        matches!(self, Relationship::OneMany | Relationship::ManyMany)
    }
}

/// Fieldless tag of a field's kind.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum FieldType {
    SingleLineText,
    LongText,
    Number,
    Checkbox,
    Date,
    SingleSelect,
    MultipleSelect,
    Rating,
    AutoNumber,
    CreatedTime,
    LastModifiedTime,
    User,
    CreatedBy,
    LastModifiedBy,
    Attachment,
    Button,
    Formula,
    Link,
    Lookup,
    Rollup,
    ConditionalLookup,
    ConditionalRollup,
}

impl FieldType {
    /// Whether the physical column stores a JSON document.
    pub fn is_json_backed(self) -> bool {
        matches!(
            self,
            FieldType::MultipleSelect
                | FieldType::User
                | FieldType::Attachment
                | FieldType::Button
                | FieldType::Link
        )
    }

    /// Whether the value is an object carrying a display `title`.
    pub fn has_display_object(self) -> bool {
        matches!(self, FieldType::Link | FieldType::User | FieldType::Button)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            FieldType::SingleLineText => "singleLineText",
            FieldType::LongText => "longText",
            FieldType::Number => "number",
            FieldType::Checkbox => "checkbox",
            FieldType::Date => "date",
            FieldType::SingleSelect => "singleSelect",
            FieldType::MultipleSelect => "multipleSelect",
            FieldType::Rating => "rating",
            FieldType::AutoNumber => "autoNumber",
            FieldType::CreatedTime => "createdTime",
            FieldType::LastModifiedTime => "lastModifiedTime",
            FieldType::User => "user",
            FieldType::CreatedBy => "createdBy",
            FieldType::LastModifiedBy => "lastModifiedBy",
            FieldType::Attachment => "attachment",
            FieldType::Button => "button",
            FieldType::Formula => "formula",
            FieldType::Link => "link",
            FieldType::Lookup => "lookup",
            FieldType::Rollup => "rollup",
            FieldType::ConditionalLookup => "conditionalLookup",
            FieldType::ConditionalRollup => "conditionalRollup",
        }
    }
}

impl fmt::Display for FieldType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

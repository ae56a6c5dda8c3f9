//! Field definitions.
//!
//! A [`Field`] is a column of a user table. Its [`FieldKind`] carries the
//! kind-specific options (formula text, link topology, lookup target).

use serde::{Deserialize, Serialize};
use std::fmt;

use super::types::{CellValueType, FieldType, Relationship};

// =============================================================================
// Identifiers
// =============================================================================

/// Opaque field identifier (`fldXXXXXXXX`).
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct FieldId(String);

impl FieldId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for FieldId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for FieldId {
    fn from(id: &str) -> Self {
        Self(id.into())
    }
}

/// Opaque table identifier (`tblXXXXXXXX`).
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TableId(String);

impl TableId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for TableId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for TableId {
    fn from(id: &str) -> Self {
        Self(id.into())
    }
}

// =============================================================================
// Options
// =============================================================================

/// Opaque filter document attached to lookups and conditional fields.
///
/// The filter is rendered by the lateral-join builder; this layer only
/// forwards it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct FilterCondition(pub serde_json::Value);

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FormulaOptions {
    pub expression: String,
    #[serde(default)]
    pub time_zone: Option<String>,
    /// Keep a stored snapshot of a volatile formula instead of recomputing it.
    #[serde(default)]
    pub persist_volatile: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LinkOptions {
    pub foreign_table_id: TableId,
    /// Field of the foreign table used as the link's display title.
    pub lookup_field_id: FieldId,
    pub relationship: Relationship,
    #[serde(default)]
    pub is_one_way: bool,
    /// Table holding the foreign keys (junction table for many-many).
    pub fk_host_table_name: String,
    pub self_key_name: String,
    pub foreign_key_name: String,
    #[serde(default)]
    pub has_order_column: bool,
}

impl LinkOptions {
    /// Name of the column recording the user-visible link order.
    pub fn order_column_name(&self) -> String {
        format!("{}_order", self.self_key_name)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LookupOptions {
    pub link_field_id: FieldId,
    pub foreign_table_id: TableId,
    pub lookup_field_id: FieldId,
    /// Kind of the looked-up foreign field.
    pub lookup_field_type: FieldType,
    #[serde(default)]
    pub filter: Option<FilterCondition>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RollupOptions {
    pub link_field_id: FieldId,
    pub foreign_table_id: TableId,
    pub lookup_field_id: FieldId,
    /// Aggregation template, e.g. `sum({values})`.
    pub expression: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConditionalLookupOptions {
    pub foreign_table_id: TableId,
    pub lookup_field_id: FieldId,
    pub lookup_field_type: FieldType,
    pub filter: FilterCondition,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConditionalRollupOptions {
    pub foreign_table_id: TableId,
    pub lookup_field_id: FieldId,
    pub expression: String,
    pub filter: FilterCondition,
}

// =============================================================================
// Field
// =============================================================================

/// Kind of a field together with its kind-specific options.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "options", rename_all = "camelCase")]
pub enum FieldKind {
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
    Formula(FormulaOptions),
    Link(LinkOptions),
    Lookup(LookupOptions),
    Rollup(RollupOptions),
    ConditionalLookup(ConditionalLookupOptions),
    ConditionalRollup(ConditionalRollupOptions),
}

/// A column of a user table.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Field {
    pub id: FieldId,
    pub name: String,
    /// Physical column name; absent for fields that were never materialized.
    #[serde(default)]
    pub db_field_name: Option<String>,
    pub cell_value_type: CellValueType,
    #[serde(default)]
    pub is_multiple_cell_value: bool,
    /// Set when the field's configuration is known to be broken.
    #[serde(default)]
    pub has_error: bool,
    #[serde(flatten)]
    pub kind: FieldKind,
}

impl Field {
    /// Create a field with default flags.
    pub fn new(
        id: impl Into<String>,
        name: impl Into<String>,
        cell_value_type: CellValueType,
        kind: FieldKind,
    ) -> Self {
        let id = id.into();
        Self {
            db_field_name: Some(format!("col_{id}")),
            id: FieldId(id),
            name: name.into(),
            cell_value_type,
            is_multiple_cell_value: false,
            has_error: false,
            kind,
        }
    }

    #[must_use]
    pub fn with_db_field_name(mut self, db_field_name: impl Into<String>) -> Self {
        self.db_field_name = Some(db_field_name.into());
        self
    }

    #[must_use]
    pub fn multiple(mut self) -> Self {
        self.is_multiple_cell_value = true;
        self
    }

    #[must_use]
    pub fn with_error(mut self) -> Self {
        self.has_error = true;
        self
    }

    pub fn field_type(&self) -> FieldType {
        match &self.kind {
            FieldKind::SingleLineText => FieldType::SingleLineText,
            FieldKind::LongText => FieldType::LongText,
            FieldKind::Number => FieldType::Number,
            FieldKind::Checkbox => FieldType::Checkbox,
            FieldKind::Date => FieldType::Date,
            FieldKind::SingleSelect => FieldType::SingleSelect,
            FieldKind::MultipleSelect => FieldType::MultipleSelect,
            FieldKind::Rating => FieldType::Rating,
            FieldKind::AutoNumber => FieldType::AutoNumber,
            FieldKind::CreatedTime => FieldType::CreatedTime,
            FieldKind::LastModifiedTime => FieldType::LastModifiedTime,
            FieldKind::User => FieldType::User,
            FieldKind::CreatedBy => FieldType::CreatedBy,
            FieldKind::LastModifiedBy => FieldType::LastModifiedBy,
            FieldKind::Attachment => FieldType::Attachment,
            FieldKind::Button => FieldType::Button,
            FieldKind::Formula(_) => FieldType::Formula,
            FieldKind::Link(_) => FieldType::Link,
            FieldKind::Lookup(_) => FieldType::Lookup,
            FieldKind::Rollup(_) => FieldType::Rollup,
            FieldKind::ConditionalLookup(_) => FieldType::ConditionalLookup,
            FieldKind::ConditionalRollup(_) => FieldType::ConditionalRollup,
        }
    }

    /// Foreign table this field reads from, if any.
    pub fn foreign_table_id(&self) -> Option<&TableId> {
        match &self.kind {
            FieldKind::Link(o) => Some(&o.foreign_table_id),
            FieldKind::Lookup(o) => Some(&o.foreign_table_id),
            FieldKind::Rollup(o) => Some(&o.foreign_table_id),
            FieldKind::ConditionalLookup(o) => Some(&o.foreign_table_id),
            FieldKind::ConditionalRollup(o) => Some(&o.foreign_table_id),
            _ => None,
        }
    }

    /// Whether the value is produced by another table through a lateral join.
    pub fn is_cross_table(&self) -> bool {
        self.foreign_table_id().is_some()
    }

    /// Whether the value is a lookup array (plain or conditional).
    pub fn is_lookup(&self) -> bool {
        matches!(
            self.kind,
            FieldKind::Lookup(_) | FieldKind::ConditionalLookup(_)
        )
    }

    pub fn formula(&self) -> Option<&FormulaOptions> {
        match &self.kind {
            FieldKind::Formula(o) => Some(o),
            _ => None,
        }
    }

    pub fn link(&self) -> Option<&LinkOptions> {
        match &self.kind {
            FieldKind::Link(o) => Some(o),
            _ => None,
        }
    }
}

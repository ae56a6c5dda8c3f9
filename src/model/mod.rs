//! Field and table model.
//!
//! Tables own an ordered list of fields; each field's [`FieldKind`]
//! decides how its value is computed.

pub mod field;
pub mod loader;
pub mod table;
pub mod types;

pub use field::{
    ConditionalLookupOptions, ConditionalRollupOptions, Field, FieldId, FieldKind,
    FilterCondition, FormulaOptions, LinkOptions, LookupOptions, RollupOptions, TableId,
};
pub use loader::{load_table, LoadError};
pub use table::Table;
pub use types::{CellValueType, FieldType, Relationship};

//! Compilation context shared by the field compilers.

use std::collections::HashSet;

use crate::config::Settings;
use tracing::warn;

use crate::error::{DomainError, DomainResult};
use crate::model::field::{Field, FieldId, LinkOptions, TableId};
use crate::model::table::Table;
use crate::sql::expr::{table_col, Expr};
use crate::sql::query::TableRef;

use super::output_column::OutputColumnResolver;

/// Inputs of one compile call: the host table, settings and the set of
/// foreign tables known to be gone.
#[derive(Debug, Clone, Copy)]
pub struct CompileContext<'a> {
    pub table: &'a Table,
    pub settings: &'a Settings,
    pub missing_tables: &'a HashSet<TableId>,
}

impl<'a> CompileContext<'a> {
    pub fn new(
        table: &'a Table,
        settings: &'a Settings,
        missing_tables: &'a HashSet<TableId>,
    ) -> Self {
        Self {
            table,
            settings,
            missing_tables,
        }
    }

    /// Alias of the main table in generated queries.
    pub fn table_alias(&self) -> &'a str {
        &self.settings.compile.table_alias
    }

    /// Record id column name.
    pub fn record_id(&self) -> &'a str {
        &self.settings.columns.record_id
    }

    /// Main table as a FROM item, aliased.
    pub fn main_table(&self) -> TableRef {
        TableRef::qualified(&self.table.db_table_name).with_alias(self.table_alias())
    }

    pub fn field(&self, id: &FieldId) -> DomainResult<&'a Field> {
        self.table.require_field(id)
    }

    pub fn is_table_missing(&self, id: &TableId) -> bool {
        self.missing_tables.contains(id)
    }

    /// Whether a field's foreign table has been removed.
    pub fn is_foreign_table_missing(&self, field: &Field) -> bool {
        field
            .foreign_table_id()
            .is_some_and(|id| self.is_table_missing(id))
    }

    /// Table-qualified reference to a field's stored column.
    pub fn column(&self, field: &Field) -> DomainResult<Expr> {
        let column = OutputColumnResolver::resolve(field)?;
        Ok(table_col(self.table_alias(), &column))
    }

    /// Link options of the field a lookup or rollup goes through.
    ///
    /// `None` when the link itself is broken or its table is gone.
    pub fn lookup_link(
        &self,
        field: &Field,
        link_field_id: &FieldId,
    ) -> DomainResult<Option<&'a LinkOptions>> {
        let link_field = self.field(link_field_id)?;
        let Some(link) = link_field.link() else {
            return Err(DomainError::invalid_field(
                &field.id,
                format!("'{link_field_id}' is not a link field"),
            ));
        };
        if link_field.has_error || self.is_table_missing(&link.foreign_table_id) {
            warn!(field_id = %field.id, link_field_id = %link_field_id, "link unavailable");
            return Ok(None);
        }
        Ok(Some(link))
    }

    /// Table-qualified reference to a system column.
    pub fn system_column(&self, name: &str) -> Expr {
        table_col(self.table_alias(), name)
    }
}

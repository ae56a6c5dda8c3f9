//! Batched recomputation of same-table formula fields.
//!
//! Each dependency level becomes one CTE (`level_0`, `level_1`, ...). A
//! level reads the main table joined to its predecessor, which carries
//! forward every column computed so far. The final SELECT joins all CTEs
//! back to the main table by record id.

use std::collections::HashSet;

use tracing::{debug, warn};

use crate::error::{DomainError, DomainResult};
use crate::model::field::{Field, FieldId};
use crate::sql::dml::Update;
use crate::sql::expr::{lit_null, table_col, Expr, ExprExt};
use crate::sql::query::{Cte, Query, SelectExpr, TableRef};

use super::context::CompileContext;
use super::formula::{finalize_formula_value, FormulaTranslator};
use super::output_column::OutputColumnResolver;
use super::reference::FieldResolver;
use super::sql_expr::{SqlExpr, StorageKind, ValueType};

const DIRTY_ALIAS: &str = "dirty";

/// Staging table restricting the batch to changed records.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DirtyRecords {
    pub table: String,
    pub id_column: String,
}

impl DirtyRecords {
    pub fn new(table: impl Into<String>, id_column: impl Into<String>) -> Self {
        Self {
            table: table.into(),
            id_column: id_column.into(),
        }
    }
}

/// Fields evaluated together at one dependency depth.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SameTableFieldLevel {
    pub level: usize,
    pub field_ids: Vec<FieldId>,
}

impl SameTableFieldLevel {
    pub fn new(level: usize, field_ids: Vec<FieldId>) -> Self {
        Self { level, field_ids }
    }
}

/// Where a computed column can be read in the final SELECT.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ColumnMapping {
    pub field_id: FieldId,
    pub column_name: String,
    pub cte_name: String,
}

/// Output of [`SameTableBatchCompiler::build`].
#[derive(Debug, Clone, PartialEq)]
pub struct BatchQuery {
    pub cte_names: Vec<String>,
    pub column_mappings: Vec<ColumnMapping>,
    /// Physical name of the main table.
    pub table_name: String,
    pub query: Query,
    record_id: String,
    table_alias: String,
    source_alias: String,
}

impl BatchQuery {
    pub fn sql(&self) -> String {
        self.query.to_sql()
    }

    /// `UPDATE <table> SET col = src.col, ... FROM (<select>) AS src`.
    pub fn to_update(&self) -> Update {
        let src = &self.source_alias;
        let update = self.column_mappings.iter().fold(
            Update::qualified(&self.table_name).alias(&self.table_alias),
            |update, mapping| {
                update.set(&mapping.column_name, table_col(src, &mapping.column_name))
            },
        );
        update
            .from(TableRef::subquery(self.query.clone()).with_alias(src))
            .filter(
                table_col(&self.table_alias, &self.record_id)
                    .eq(table_col(src, &self.record_id)),
            )
    }
}

/// Compiles dependency levels into one multi-CTE statement.
pub struct SameTableBatchCompiler<'a> {
    ctx: CompileContext<'a>,
    translator: &'a dyn FormulaTranslator,
    dirty: Option<&'a DirtyRecords>,
}

impl<'a> SameTableBatchCompiler<'a> {
    pub fn new(ctx: CompileContext<'a>, translator: &'a dyn FormulaTranslator) -> Self {
        Self {
            ctx,
            translator,
            dirty: None,
        }
    }

    #[must_use]
    pub fn with_dirty_records(mut self, dirty: &'a DirtyRecords) -> Self {
        self.dirty = Some(dirty);
        self
    }

    pub fn build(&self, levels: &[SameTableFieldLevel]) -> DomainResult<BatchQuery> {
        let mut levels: Vec<&SameTableFieldLevel> =
            levels.iter().filter(|l| !l.field_ids.is_empty()).collect();
        if levels.is_empty() {
            return Err(DomainError::Validation("No field levels provided".into()));
        }
        levels.sort_by_key(|l| l.level);

        let alias = self.ctx.table_alias();
        let record_id = self.ctx.record_id();
        let prefix = &self.ctx.settings.compile.cte_prefix;

        let mut cte_names: Vec<String> = Vec::new();
        let mut mappings: Vec<ColumnMapping> = Vec::new();
        let mut computed: HashSet<FieldId> = HashSet::new();
        let mut ctes: Vec<Cte> = Vec::new();

        for (index, level) in levels.iter().enumerate() {
            let cte_name = format!("{prefix}{index}");
            let previous = cte_names.last().cloned();

            let mut select: Vec<SelectExpr> =
                vec![self.ctx.system_column(record_id).alias(record_id)];
            if let Some(prev) = &previous {
                for mapping in &mappings {
                    select.push(
                        table_col(prev, &mapping.column_name).alias(&mapping.column_name),
                    );
                }
            }

            let mut level_mappings = Vec::new();
            for field_id in &level.field_ids {
                if computed.contains(field_id)
                    || level_mappings
                        .iter()
                        .any(|m: &ColumnMapping| &m.field_id == field_id)
                {
                    return Err(DomainError::DuplicateField(field_id.clone()));
                }
                let field = self.ctx.field(field_id)?;
                let column = OutputColumnResolver::resolve(field)?;
                let value = self.compile_field(field, previous.as_deref(), &computed)?;
                select.push(value.alias(&column));
                level_mappings.push(ColumnMapping {
                    field_id: field_id.clone(),
                    column_name: column,
                    cte_name: cte_name.clone(),
                });
            }

            let mut query = Query::new().select(select).from(self.ctx.main_table());
            match &previous {
                Some(prev) => {
                    query = query.inner_join(
                        TableRef::new(prev),
                        table_col(prev, record_id).eq(table_col(alias, record_id)),
                    );
                }
                None => {
                    if let Some(dirty) = self.dirty {
                        query = query.inner_join(
                            TableRef::qualified(&dirty.table).with_alias(DIRTY_ALIAS),
                            table_col(DIRTY_ALIAS, &dirty.id_column)
                                .eq(table_col(alias, record_id)),
                        );
                    }
                }
            }

            debug!(
                cte = %cte_name,
                level = level.level,
                fields = level_mappings.len(),
                "batch CTE built"
            );

            computed.extend(level_mappings.iter().map(|m| m.field_id.clone()));
            mappings.extend(level_mappings);
            ctes.push(Cte::new(&cte_name, query));
            cte_names.push(cte_name);
        }

        let mut select: Vec<SelectExpr> = vec![self.ctx.system_column(record_id).alias(record_id)];
        for mapping in &mappings {
            select.push(
                table_col(&mapping.cte_name, &mapping.column_name).alias(&mapping.column_name),
            );
        }
        let mut query = Query::new().select(select).from(self.ctx.main_table());
        for cte in ctes {
            let name = cte.name.clone();
            query = query.with_cte(cte).inner_join(
                TableRef::new(&name),
                table_col(&name, record_id).eq(table_col(alias, record_id)),
            );
        }

        Ok(BatchQuery {
            cte_names,
            column_mappings: mappings,
            table_name: self.ctx.table.db_table_name.clone(),
            query,
            record_id: record_id.to_string(),
            table_alias: alias.to_string(),
            source_alias: self.ctx.settings.compile.update_source_alias.clone(),
        })
    }

    fn compile_field(
        &self,
        field: &Field,
        previous: Option<&str>,
        computed: &HashSet<FieldId>,
    ) -> DomainResult<Expr> {
        let Some(options) = field.formula() else {
            return self.ctx.column(field);
        };
        if field.has_error {
            return Ok(lit_null());
        }

        let time_zone = options
            .time_zone
            .as_deref()
            .unwrap_or(self.ctx.settings.compile.time_zone.as_str());
        let mut resolver = LevelFieldResolver {
            ctx: self.ctx,
            previous,
            computed,
        };
        match self
            .translator
            .translate(&options.expression, &mut resolver, time_zone)
        {
            Ok(translated) => Ok(finalize_formula_value(
                translated,
                ValueType::from(field.cell_value_type),
                field.is_multiple_cell_value,
            )),
            Err(err) => {
                warn!(field_id = %field.id, error = %err, "formula translation failed, computing NULL");
                Ok(lit_null())
            }
        }
    }
}

/// Resolves operands against the predecessor CTE or the main table.
struct LevelFieldResolver<'a, 'b> {
    ctx: CompileContext<'a>,
    previous: Option<&'b str>,
    computed: &'b HashSet<FieldId>,
}

impl FieldResolver for LevelFieldResolver<'_, '_> {
    fn resolve_field(&mut self, field_id: &FieldId) -> DomainResult<SqlExpr> {
        let field = self.ctx.field(field_id)?;
        let column = OutputColumnResolver::resolve(field)?;
        let source = match self.previous {
            Some(prev) if self.computed.contains(field_id) => prev,
            _ => self.ctx.table_alias(),
        };
        let is_array = field.is_multiple_cell_value || field.is_lookup();
        let storage = if is_array || field.field_type().is_json_backed() {
            StorageKind::Json
        } else {
            StorageKind::Scalar
        };
        Ok(
            SqlExpr::new(table_col(source, &column), ValueType::from(field.cell_value_type))
                .with_array(is_array)
                .with_storage(storage)
                .with_origin(field_id, field.field_type()),
        )
    }
}

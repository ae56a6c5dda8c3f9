//! Shared fixtures: a tasks table with every cross-table kind, a
//! scriptable translator and a planner that records its calls.

#![allow(dead_code)]

use std::cell::Cell;

use fieldsql::compute::{
    FieldResolver, FormulaTranslator, LateralColumnType, LateralJoinPlanner, SqlExpr,
    TranslateError,
};
use fieldsql::model::{
    CellValueType, ConditionalLookupOptions, ConditionalRollupOptions, Field, FieldId, FieldKind, FieldType,
    FilterCondition, FormulaOptions, LinkOptions, LookupOptions, Relationship, RollupOptions,
    Table, TableId,
};

// =============================================================================
// Translator
// =============================================================================

type Handler = Box<dyn Fn(&str, &mut dyn FieldResolver) -> Result<SqlExpr, TranslateError>>;

/// Translator whose output is scripted per test.
pub struct StubTranslator {
    handler: Handler,
    calls: Cell<usize>,
}

impl StubTranslator {
    pub fn new(
        handler: impl Fn(&str, &mut dyn FieldResolver) -> Result<SqlExpr, TranslateError> + 'static,
    ) -> Self {
        Self {
            handler: Box::new(handler),
            calls: Cell::new(0),
        }
    }

    /// Always returns `expr`, without resolving anything.
    pub fn returning(expr: SqlExpr) -> Self {
        Self::new(move |_, _| Ok(expr.clone()))
    }

    /// Resolves `field_id` and returns its operand unchanged.
    pub fn passthrough(field_id: &str) -> Self {
        let id = FieldId::from(field_id);
        Self::new(move |_, resolver| resolver.resolve_field(&id).map_err(TranslateError::from))
    }

    pub fn calls(&self) -> usize {
        self.calls.get()
    }
}

impl FormulaTranslator for StubTranslator {
    fn translate(
        &self,
        expression: &str,
        resolver: &mut dyn FieldResolver,
        _time_zone: &str,
    ) -> Result<SqlExpr, TranslateError> {
        self.calls.set(self.calls.get() + 1);
        (self.handler)(expression, resolver)
    }
}

// =============================================================================
// Planner
// =============================================================================

#[derive(Debug, Clone, PartialEq)]
pub struct PlannerCall {
    pub conditional: bool,
    pub key_field_id: FieldId,
    pub foreign_table_id: TableId,
    pub output_alias: String,
    pub column_type: LateralColumnType,
    pub alias: String,
}

/// Records every request and mints `join_<n>` aliases.
#[derive(Debug, Default)]
pub struct RecordingPlanner {
    pub calls: Vec<PlannerCall>,
}

impl RecordingPlanner {
    fn record(
        &mut self,
        conditional: bool,
        key_field_id: &FieldId,
        foreign_table_id: &TableId,
        output_alias: &str,
        column_type: LateralColumnType,
    ) -> String {
        let alias = format!("join_{}", self.calls.len());
        self.calls.push(PlannerCall {
            conditional,
            key_field_id: key_field_id.clone(),
            foreign_table_id: foreign_table_id.clone(),
            output_alias: output_alias.to_string(),
            column_type,
            alias: alias.clone(),
        });
        alias
    }
}

impl LateralJoinPlanner for RecordingPlanner {
    fn add_column(
        &mut self,
        link_field_id: &FieldId,
        foreign_table_id: &TableId,
        output_alias: &str,
        column_type: LateralColumnType,
    ) -> String {
        self.record(false, link_field_id, foreign_table_id, output_alias, column_type)
    }

    fn add_conditional_column(
        &mut self,
        host_field_id: &FieldId,
        foreign_table_id: &TableId,
        output_alias: &str,
        column_type: LateralColumnType,
    ) -> String {
        self.record(true, host_field_id, foreign_table_id, output_alias, column_type)
    }
}

// =============================================================================
// Tables
// =============================================================================

pub const PROJECTS: &str = "tblProjects";

pub fn formula(id: &str, column: &str, expression: &str, cell_value_type: CellValueType) -> Field {
    Field::new(
        id,
        id,
        cell_value_type,
        FieldKind::Formula(FormulaOptions {
            expression: expression.into(),
            time_zone: None,
            persist_volatile: false,
        }),
    )
    .with_db_field_name(column)
}

pub fn number(id: &str, column: &str) -> Field {
    Field::new(id, id, CellValueType::Number, FieldKind::Number).with_db_field_name(column)
}

pub fn projects_link() -> Field {
    Field::new(
        "fldLink",
        "Projects",
        CellValueType::String,
        FieldKind::Link(LinkOptions {
            foreign_table_id: PROJECTS.into(),
            lookup_field_id: "fldProjectName".into(),
            relationship: Relationship::ManyMany,
            is_one_way: false,
            fk_host_table_name: "bse1.junction_tasks_projects".into(),
            self_key_name: "__fk_task".into(),
            foreign_key_name: "__fk_project".into(),
            has_order_column: true,
        }),
    )
    .with_db_field_name("projects")
    .multiple()
}

pub fn project_names() -> Field {
    Field::new(
        "fldLookup",
        "Project names",
        CellValueType::String,
        FieldKind::Lookup(LookupOptions {
            link_field_id: "fldLink".into(),
            foreign_table_id: PROJECTS.into(),
            lookup_field_id: "fldProjectName".into(),
            lookup_field_type: FieldType::SingleLineText,
            filter: None,
        }),
    )
    .with_db_field_name("project_names")
    .multiple()
}

pub fn project_budget() -> Field {
    Field::new(
        "fldRollup",
        "Budget",
        CellValueType::Number,
        FieldKind::Rollup(RollupOptions {
            link_field_id: "fldLink".into(),
            foreign_table_id: PROJECTS.into(),
            lookup_field_id: "fldProjectBudget".into(),
            expression: "sum({values})".into(),
        }),
    )
    .with_db_field_name("budget")
}

pub fn open_projects() -> Field {
    Field::new(
        "fldCond",
        "Open projects",
        CellValueType::String,
        FieldKind::ConditionalLookup(ConditionalLookupOptions {
            foreign_table_id: PROJECTS.into(),
            lookup_field_id: "fldProjectName".into(),
            lookup_field_type: FieldType::SingleLineText,
            filter: open_projects_filter(),
        }),
    )
    .with_db_field_name("open_projects")
    .multiple()
}

pub fn open_projects_filter() -> FilterCondition {
    FilterCondition(serde_json::json!({
        "conjunction": "and",
        "filterSet": [{ "fieldId": "fldStatus", "operator": "is", "value": "open" }]
    }))
}

pub fn open_budget() -> Field {
    Field::new(
        "fldCR",
        "Open budget",
        CellValueType::Number,
        FieldKind::ConditionalRollup(ConditionalRollupOptions {
            foreign_table_id: PROJECTS.into(),
            lookup_field_id: "fldProjectBudget".into(),
            expression: "sum({values})".into(),
            filter: open_projects_filter(),
        }),
    )
    .with_db_field_name("open_budget")
}

/// Marks one field of `table` as errored.
pub fn with_errored_field(mut table: Table, id: &str) -> Table {
    for field in &mut table.fields {
        if field.id.as_str() == id {
            field.has_error = true;
        }
    }
    table
}

/// Tasks table with plain, user and cross-table fields.
pub fn tasks_table() -> Table {
    Table::new("tblTasks", "Tasks", "bse1.tasks")
        .with_field(number("fldA", "amount"))
        .with_field(
            Field::new("fldTitle", "Title", CellValueType::String, FieldKind::SingleLineText)
                .with_db_field_name("title"),
        )
        .with_field(
            Field::new("fldOwner", "Owner", CellValueType::String, FieldKind::User)
                .with_db_field_name("owner"),
        )
        .with_field(
            Field::new("fldWatchers", "Watchers", CellValueType::String, FieldKind::User)
                .with_db_field_name("watchers")
                .multiple(),
        )
        .with_field(
            Field::new("fldCreatedBy", "Created by", CellValueType::String, FieldKind::CreatedBy)
                .with_db_field_name("created_by"),
        )
        .with_field(projects_link())
        .with_field(project_names())
        .with_field(project_budget())
        .with_field(open_projects())
        .with_field(open_budget())
}

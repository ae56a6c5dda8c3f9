#[path = "../common/mod.rs"]
mod common;

use std::collections::HashSet;

use common::{
    formula, open_projects_filter, tasks_table, with_errored_field, RecordingPlanner,
    StubTranslator, PROJECTS,
};
use fieldsql::compute::{
    build_select_query, CompileContext, ComputedFieldSelectCompiler, LateralColumnType,
    LateralJoinPlan, LinkOrderBy, SqlExpr, TemplateTranslator, TranslateError, ValueType,
};
use fieldsql::config::Settings;
use fieldsql::model::{
    CellValueType, Field, FieldId, FieldKind, FieldType, FormulaOptions, LookupOptions, Table,
    TableId,
};
use fieldsql::sql::{raw_sql, validate_sql, Dialect};
use fieldsql::DomainError;

fn field(table: &Table, id: &str) -> Field {
    table.field(&FieldId::from(id)).cloned().unwrap()
}

fn compile_sql(
    table: &Table,
    missing: &HashSet<TableId>,
    translator: &StubTranslator,
    planner: &mut RecordingPlanner,
    id: &str,
) -> Result<String, DomainError> {
    let settings = Settings::default();
    let ctx = CompileContext::new(table, &settings, missing);
    let compiler = ComputedFieldSelectCompiler::new(ctx, translator);
    let target = field(table, id);
    compiler
        .compile(&target, planner)
        .map(|select| select.expr.to_sql())
}

fn unused_translator() -> StubTranslator {
    StubTranslator::new(|_, _| panic!("translator must not be called"))
}

// =============================================================================
// Plain and user fields
// =============================================================================

#[test]
fn test_simple_fields_render_as_plain_columns() {
    let table = tasks_table();
    let missing = HashSet::new();
    let translator = unused_translator();
    let mut planner = RecordingPlanner::default();

    let amount = compile_sql(&table, &missing, &translator, &mut planner, "fldA").unwrap();
    let title = compile_sql(&table, &missing, &translator, &mut planner, "fldTitle").unwrap();

    assert_eq!(amount, "\"t\".\"amount\"");
    assert_eq!(title, "\"t\".\"title\"");
    assert!(planner.calls.is_empty());
}

#[test]
fn test_multi_user_field_aggregates_in_stored_order() {
    let table = tasks_table();
    let missing = HashSet::new();
    let mut planner = RecordingPlanner::default();

    let sql = compile_sql(&table, &missing, &unused_translator(), &mut planner, "fldWatchers").unwrap();

    assert!(sql.starts_with("(SELECT JSONB_AGG(COALESCE((SELECT JSONB_BUILD_OBJECT('id', \"u\".\"id\""));
    assert!(sql.contains("COALESCE(\"elem\".\"value\" ->> 'id', \"elem\".\"value\" #>> '{}')"));
    assert!(sql.contains("ORDER BY \"elem\".\"ord\" ASC) FROM JSONB_ARRAY_ELEMENTS(CASE WHEN \"t\".\"watchers\" IS NULL THEN '[]'::jsonb"));
    assert!(sql.ends_with("WITH ORDINALITY AS \"elem\"(\"value\", \"ord\"))"));
}

#[test]
fn test_single_user_wraps_scalar_storage() {
    let table = tasks_table();
    let missing = HashSet::new();
    let mut planner = RecordingPlanner::default();

    let sql = compile_sql(&table, &missing, &unused_translator(), &mut planner, "fldOwner").unwrap();

    assert!(sql.contains(
        "WHEN JSONB_TYPEOF(\"t\".\"owner\") = 'array' THEN \"t\".\"owner\" ELSE JSONB_BUILD_ARRAY(\"t\".\"owner\") END"
    ));
    assert!(sql.ends_with("ORDER BY \"elem\".\"ord\" ASC LIMIT 1)"));
    assert!(!sql.contains("JSONB_AGG"));
}

#[test]
fn test_created_by_builds_user_object_from_system_column() {
    let table = tasks_table();
    let missing = HashSet::new();
    let mut planner = RecordingPlanner::default();

    let sql = compile_sql(&table, &missing, &unused_translator(), &mut planner, "fldCreatedBy").unwrap();

    assert!(sql.starts_with(
        "CASE WHEN \"t\".\"__created_by\" IS NULL THEN NULL ELSE COALESCE((SELECT JSONB_BUILD_OBJECT('id', \"u\".\"id\", 'title', \"u\".\"name\""
    ));
    assert!(sql.contains("'avatarUrl', '/api/attachments/read/public/avatar/' || \"u\".\"id\""));
    assert!(sql.ends_with("JSONB_BUILD_OBJECT('id', \"t\".\"__created_by\")) END"));
}

// =============================================================================
// Cross-table fields
// =============================================================================

#[test]
fn test_missing_foreign_table_yields_typed_null_without_joins() {
    let table = tasks_table();
    let missing = HashSet::from([TableId::from(PROJECTS)]);
    let translator = unused_translator();
    let mut planner = RecordingPlanner::default();

    for id in ["fldLink", "fldLookup", "fldCond"] {
        let sql = compile_sql(&table, &missing, &translator, &mut planner, id).unwrap();
        assert_eq!(sql, "NULL::jsonb", "field {id}");
    }
    for id in ["fldRollup", "fldCR"] {
        let sql = compile_sql(&table, &missing, &translator, &mut planner, id).unwrap();
        assert_eq!(sql, "NULL::double precision", "field {id}");
    }
    assert!(planner.calls.is_empty());
}

#[test]
fn test_lookup_joins_through_its_link() {
    let table = tasks_table();
    let missing = HashSet::new();
    let mut planner = RecordingPlanner::default();

    let sql = compile_sql(&table, &missing, &unused_translator(), &mut planner, "fldLookup").unwrap();

    assert_eq!(sql, "\"join_0\".\"project_names\"");
    assert_eq!(planner.calls.len(), 1);
    let call = &planner.calls[0];
    assert!(!call.conditional);
    assert_eq!(call.key_field_id, FieldId::from("fldLink"));
    assert_eq!(call.foreign_table_id, TableId::from(PROJECTS));
    assert_eq!(call.output_alias, "project_names");
    assert_eq!(
        call.column_type,
        LateralColumnType::Lookup {
            foreign_field_id: "fldProjectName".into(),
            is_multiple: true,
            order_by: Some(LinkOrderBy::Junction {
                junction_table: "bse1.junction_tasks_projects".into(),
                self_key: "__fk_task".into(),
                foreign_key: "__fk_project".into(),
                order_column: Some("__fk_task_order".into()),
            }),
            filter: None,
        }
    );
}

#[test]
fn test_rollup_carries_expression() {
    let table = tasks_table();
    let missing = HashSet::new();
    let mut planner = RecordingPlanner::default();

    let sql = compile_sql(&table, &missing, &unused_translator(), &mut planner, "fldRollup").unwrap();

    assert_eq!(sql, "\"join_0\".\"budget\"");
    assert!(matches!(
        &planner.calls[0].column_type,
        LateralColumnType::Rollup { expression, .. } if expression == "sum({values})"
    ));
}

#[test]
fn test_conditional_lookup_keyed_by_host_field() {
    let table = tasks_table();
    let missing = HashSet::new();
    let mut planner = RecordingPlanner::default();

    let sql = compile_sql(&table, &missing, &unused_translator(), &mut planner, "fldCond").unwrap();

    assert_eq!(sql, "\"join_0\".\"open_projects\"");
    let call = &planner.calls[0];
    assert!(call.conditional);
    assert_eq!(call.key_field_id, FieldId::from("fldCond"));
    assert!(matches!(
        &call.column_type,
        LateralColumnType::ConditionalLookup { is_multiple: true, .. }
    ));
}

#[test]
fn test_conditional_rollup_keyed_by_host_field() {
    let table = tasks_table();
    let missing = HashSet::new();
    let mut planner = RecordingPlanner::default();

    let sql = compile_sql(&table, &missing, &unused_translator(), &mut planner, "fldCR").unwrap();

    assert_eq!(sql, "\"join_0\".\"open_budget\"");
    assert_eq!(planner.calls.len(), 1);
    let call = &planner.calls[0];
    assert!(call.conditional);
    assert_eq!(call.key_field_id, FieldId::from("fldCR"));
    assert_eq!(call.foreign_table_id, TableId::from(PROJECTS));
    assert_eq!(call.output_alias, "open_budget");
    assert_eq!(
        call.column_type,
        LateralColumnType::ConditionalRollup {
            foreign_field_id: "fldProjectBudget".into(),
            expression: "sum({values})".into(),
            filter: open_projects_filter(),
        }
    );
}

#[test]
fn test_errored_cross_table_fields_project_null() {
    let missing = HashSet::new();
    let translator = unused_translator();
    let mut planner = RecordingPlanner::default();

    for (id, expected) in [
        ("fldLookup", "NULL::jsonb"),
        ("fldCond", "NULL::jsonb"),
        ("fldRollup", "NULL::double precision"),
        ("fldCR", "NULL::double precision"),
    ] {
        let table = with_errored_field(tasks_table(), id);
        let sql = compile_sql(&table, &missing, &translator, &mut planner, id).unwrap();
        assert_eq!(sql, expected, "field {id}");
    }
    assert!(planner.calls.is_empty());
}

#[test]
fn test_broken_link_degrades_lookup() {
    let table = with_errored_field(tasks_table(), "fldLink");
    let missing = HashSet::new();
    let mut planner = RecordingPlanner::default();

    let sql = compile_sql(&table, &missing, &unused_translator(), &mut planner, "fldLookup").unwrap();

    assert_eq!(sql, "NULL::jsonb");
    assert!(planner.calls.is_empty());
}

#[test]
fn test_lookup_through_non_link_is_invalid() {
    let table = tasks_table().with_field(
        Field::new(
            "fldBadLookup",
            "Bad",
            CellValueType::String,
            FieldKind::Lookup(LookupOptions {
                link_field_id: "fldA".into(),
                foreign_table_id: PROJECTS.into(),
                lookup_field_id: "fldProjectName".into(),
                lookup_field_type: FieldType::SingleLineText,
                filter: None,
            }),
        )
        .with_db_field_name("bad"),
    );
    let missing = HashSet::new();
    let mut planner = RecordingPlanner::default();

    let err = compile_sql(&table, &missing, &unused_translator(), &mut planner, "fldBadLookup")
        .unwrap_err();
    assert!(matches!(err, DomainError::InvalidField { .. }));
}

// =============================================================================
// Formulas
// =============================================================================

#[test]
fn test_error_condition_guards_formula_value() {
    let table = tasks_table().with_field(formula("fldF", "ratio", "{fldA} / 0", CellValueType::Number));
    let missing = HashSet::new();
    let translator = StubTranslator::returning(
        SqlExpr::new(raw_sql("1 / 0"), ValueType::Number).with_error_condition(Some(raw_sql("0 = 0"))),
    );
    let mut planner = RecordingPlanner::default();

    let sql = compile_sql(&table, &missing, &translator, &mut planner, "fldF").unwrap();

    assert_eq!(sql, "CASE WHEN 0 = 0 THEN NULL ELSE 1 / 0 END");
    assert_eq!(translator.calls(), 1);
}

#[test]
fn test_errored_formula_is_null_without_translation() {
    let table = tasks_table().with_field(
        formula("fldF", "broken", "{fldA} + 1", CellValueType::Number).with_error(),
    );
    let missing = HashSet::new();
    let translator = unused_translator();
    let mut planner = RecordingPlanner::default();

    let sql = compile_sql(&table, &missing, &translator, &mut planner, "fldF").unwrap();

    assert_eq!(sql, "NULL");
    assert_eq!(translator.calls(), 0);
}

#[test]
fn test_persisted_volatile_formula_reads_stored_column() {
    let volatile = Field::new(
        "fldTouched",
        "Touched",
        CellValueType::DateTime,
        FieldKind::Formula(FormulaOptions {
            expression: "LAST_MODIFIED_TIME({fldA})".into(),
            time_zone: None,
            persist_volatile: true,
        }),
    )
    .with_db_field_name("touched");
    let table = tasks_table().with_field(volatile);
    let missing = HashSet::new();
    let translator = unused_translator();
    let mut planner = RecordingPlanner::default();

    let sql = compile_sql(&table, &missing, &translator, &mut planner, "fldTouched").unwrap();

    assert_eq!(sql, "\"t\".\"touched\"");
    assert_eq!(translator.calls(), 0);
}

#[test]
fn test_array_operand_unwrapped_for_scalar_formula() {
    let table = tasks_table().with_field(formula("fldF", "first_name", "{fldLookup}", CellValueType::Number));
    let missing = HashSet::new();
    let translator = StubTranslator::passthrough("fldLookup");
    let mut planner = RecordingPlanner::default();

    let sql = compile_sql(&table, &missing, &translator, &mut planner, "fldF").unwrap();

    assert_eq!(
        sql,
        "(CASE WHEN JSONB_TYPEOF(\"join_0\".\"project_names\") = 'array' THEN \"join_0\".\"project_names\" ->> 0 ELSE \"join_0\".\"project_names\" #>> '{}' END)::double precision"
    );
}

#[test]
fn test_link_operand_extracts_titles_in_order() {
    let table = tasks_table().with_field(
        formula("fldF", "project_list", "{fldLink}", CellValueType::String).multiple(),
    );
    let missing = HashSet::new();
    let translator = StubTranslator::passthrough("fldLink");
    let mut planner = RecordingPlanner::default();

    let sql = compile_sql(&table, &missing, &translator, &mut planner, "fldF").unwrap();

    assert!(sql.starts_with("CASE WHEN JSONB_TYPEOF(\"join_0\".\"projects\") = 'array' THEN (SELECT JSONB_AGG("));
    assert!(sql.contains("JSONB_ARRAY_ELEMENTS(\"join_0\".\"projects\") WITH ORDINALITY AS \"elem\"(\"value\", \"ord\")"));
    assert!(sql.contains("ORDER BY \"elem\".\"ord\" ASC"));
    assert_eq!(planner.calls.len(), 1);
    assert!(matches!(planner.calls[0].column_type, LateralColumnType::Link { .. }));
}

#[test]
fn test_translator_failure_is_reported() {
    let table = tasks_table().with_field(formula("fldF", "bad", "{fldA", CellValueType::Number));
    let missing = HashSet::new();
    let translator = StubTranslator::new(|_, _| {
        Err(TranslateError::Syntax {
            offset: 0,
            message: "unterminated field reference".into(),
        })
    });
    let mut planner = RecordingPlanner::default();

    let err = compile_sql(&table, &missing, &translator, &mut planner, "fldF").unwrap_err();

    match err {
        DomainError::Translate { field_id, .. } => assert_eq!(field_id, FieldId::from("fldF")),
        other => panic!("unexpected error: {other}"),
    }
}

#[test]
fn test_template_formula_over_created_by() {
    let table = tasks_table().with_field(formula("fldF", "author", "{fldCreatedBy}", CellValueType::String));
    let settings = Settings::default();
    let missing = HashSet::new();
    let ctx = CompileContext::new(&table, &settings, &missing);
    let compiler = ComputedFieldSelectCompiler::new(ctx, &TemplateTranslator);
    let mut planner = RecordingPlanner::default();

    let select = compiler.compile(&field(&table, "fldF"), &mut planner).unwrap();

    assert_eq!(
        select.expr.to_sql(),
        "COALESCE((SELECT \"u\".\"name\" FROM \"public\".\"users\" AS \"u\" WHERE \"u\".\"id\" = \"t\".\"__created_by\" LIMIT 1), \"t\".\"__created_by\")"
    );
}

// =============================================================================
// Record read query
// =============================================================================

#[test]
fn test_record_query_is_deterministic() {
    let table = tasks_table().with_field(formula("fldF", "double", "{fldA} * 2", CellValueType::Number));
    let settings = Settings::default();
    let missing = HashSet::new();
    let ctx = CompileContext::new(&table, &settings, &missing);

    let mut first_plan = LateralJoinPlan::default();
    let first = build_select_query(ctx, &TemplateTranslator, &mut first_plan).unwrap();
    let mut second_plan = LateralJoinPlan::default();
    let second = build_select_query(ctx, &TemplateTranslator, &mut second_plan).unwrap();

    assert_eq!(first.to_sql(), second.to_sql());
    assert_eq!(first_plan.requests(), second_plan.requests());
}

#[test]
fn test_record_query_aliases_are_unique_and_sql_parses() {
    let table = tasks_table();
    let settings = Settings::default();
    let missing = HashSet::new();
    let ctx = CompileContext::new(&table, &settings, &missing);
    let mut plan = LateralJoinPlan::default();

    let query = build_select_query(ctx, &TemplateTranslator, &mut plan).unwrap();

    let aliases: HashSet<_> = plan.requests().iter().map(|r| r.alias.clone()).collect();
    assert_eq!(aliases.len(), plan.len());
    assert_eq!(plan.len(), 5);
    assert_eq!(query.select.len(), table.fields.len() + 1);
    validate_sql(&query.to_sql(), Dialect::Postgres).unwrap();
}

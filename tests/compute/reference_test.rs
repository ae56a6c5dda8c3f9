#[path = "../common/mod.rs"]
mod common;

use std::collections::HashSet;

use common::{open_projects_filter, tasks_table, with_errored_field, RecordingPlanner, PROJECTS};
use fieldsql::compute::{
    CompileContext, FieldReferenceResolver, FieldResolver, LateralColumnType, StorageKind,
    ValueType,
};
use fieldsql::config::Settings;
use fieldsql::model::{
    CellValueType, Field, FieldId, FieldKind, FieldType, LookupOptions, TableId,
};
use fieldsql::DomainError;

#[test]
fn test_plain_operand_is_stored_column() {
    let table = tasks_table();
    let settings = Settings::default();
    let missing = HashSet::new();
    let ctx = CompileContext::new(&table, &settings, &missing);
    let mut planner = RecordingPlanner::default();
    let mut resolver = FieldReferenceResolver::new(ctx, &mut planner);

    let operand = resolver.resolve_field(&"fldA".into()).unwrap();

    assert_eq!(operand.value_sql(), "\"t\".\"amount\"");
    assert_eq!(operand.value_type, ValueType::Number);
    assert_eq!(operand.storage_kind, StorageKind::Scalar);
    assert!(!operand.is_array);
}

#[test]
fn test_user_operand_is_json_and_not_unwrapped() {
    let table = tasks_table();
    let settings = Settings::default();
    let missing = HashSet::new();
    let ctx = CompileContext::new(&table, &settings, &missing);
    let mut planner = RecordingPlanner::default();
    let mut resolver = FieldReferenceResolver::new(ctx, &mut planner);

    let operand = resolver.resolve_field(&"fldOwner".into()).unwrap();

    assert_eq!(operand.value_sql(), "\"t\".\"owner\"");
    assert_eq!(operand.storage_kind, StorageKind::Json);
    assert_eq!(operand.origin.unwrap().field_type, FieldType::User);
}

#[test]
fn test_lookup_operand_keyed_by_link_with_inner_type() {
    let table = tasks_table();
    let settings = Settings::default();
    let missing = HashSet::new();
    let ctx = CompileContext::new(&table, &settings, &missing);
    let mut planner = RecordingPlanner::default();

    let operand = {
        let mut resolver = FieldReferenceResolver::new(ctx, &mut planner);
        resolver.resolve_field(&"fldLookup".into()).unwrap()
    };

    assert_eq!(operand.value_sql(), "\"join_0\".\"project_names\"");
    assert!(operand.is_array);
    assert_eq!(operand.origin.unwrap().field_type, FieldType::SingleLineText);
    assert_eq!(planner.calls.len(), 1);
    assert_eq!(planner.calls[0].key_field_id, FieldId::from("fldLink"));
}

#[test]
fn test_lookup_operand_type_follows_declared_cell_value_type() {
    let table = tasks_table().with_field(
        Field::new(
            "fldBudgets",
            "Project budgets",
            CellValueType::Number,
            FieldKind::Lookup(LookupOptions {
                link_field_id: "fldLink".into(),
                foreign_table_id: PROJECTS.into(),
                lookup_field_id: "fldProjectBudget".into(),
                lookup_field_type: FieldType::Number,
                filter: None,
            }),
        )
        .with_db_field_name("project_budgets")
        .multiple(),
    );
    let settings = Settings::default();
    let missing = HashSet::new();
    let ctx = CompileContext::new(&table, &settings, &missing);
    let mut planner = RecordingPlanner::default();
    let mut resolver = FieldReferenceResolver::new(ctx, &mut planner);

    let names = resolver.resolve_field(&"fldLookup".into()).unwrap();
    let budgets = resolver.resolve_field(&"fldBudgets".into()).unwrap();

    assert_eq!(names.value_type, ValueType::String);
    assert_eq!(budgets.value_type, ValueType::Number);
    assert_eq!(budgets.origin.unwrap().field_type, FieldType::Number);
    assert!(budgets.is_array);
}

#[test]
fn test_conditional_operand_keyed_by_host_field() {
    let table = tasks_table();
    let settings = Settings::default();
    let missing = HashSet::new();
    let ctx = CompileContext::new(&table, &settings, &missing);
    let mut planner = RecordingPlanner::default();

    {
        let mut resolver = FieldReferenceResolver::new(ctx, &mut planner);
        resolver.resolve_field(&"fldCond".into()).unwrap();
    }

    let call = &planner.calls[0];
    assert!(call.conditional);
    assert_eq!(call.key_field_id, FieldId::from("fldCond"));
    assert!(matches!(call.column_type, LateralColumnType::ConditionalLookup { .. }));
}

#[test]
fn test_conditional_rollup_operand_carries_expression_and_filter() {
    let table = tasks_table();
    let settings = Settings::default();
    let missing = HashSet::new();
    let ctx = CompileContext::new(&table, &settings, &missing);
    let mut planner = RecordingPlanner::default();

    let operand = {
        let mut resolver = FieldReferenceResolver::new(ctx, &mut planner);
        resolver.resolve_field(&"fldCR".into()).unwrap()
    };

    assert_eq!(operand.value_sql(), "\"join_0\".\"open_budget\"");
    assert_eq!(operand.value_type, ValueType::Number);
    assert_eq!(operand.storage_kind, StorageKind::Scalar);
    assert!(!operand.is_array);

    assert_eq!(planner.calls.len(), 1);
    let call = &planner.calls[0];
    assert!(call.conditional);
    assert_eq!(call.key_field_id, FieldId::from("fldCR"));
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
fn test_errored_field_operands_are_typed_nulls() {
    let settings = Settings::default();
    let missing = HashSet::new();

    for (id, expected, is_array) in [
        ("fldLookup", "NULL::jsonb", true),
        ("fldRollup", "NULL::double precision", false),
        ("fldCR", "NULL::double precision", false),
    ] {
        let table = with_errored_field(tasks_table(), id);
        let ctx = CompileContext::new(&table, &settings, &missing);
        let mut planner = RecordingPlanner::default();

        let operand = {
            let mut resolver = FieldReferenceResolver::new(ctx, &mut planner);
            resolver.resolve_field(&id.into()).unwrap()
        };

        assert_eq!(operand.value_sql(), expected, "field {id}");
        assert_eq!(operand.is_array, is_array, "field {id}");
        assert!(planner.calls.is_empty(), "field {id}");
    }
}

#[test]
fn test_each_reference_gets_its_own_alias() {
    let table = tasks_table();
    let settings = Settings::default();
    let missing = HashSet::new();
    let ctx = CompileContext::new(&table, &settings, &missing);
    let mut planner = RecordingPlanner::default();

    let (first, second) = {
        let mut resolver = FieldReferenceResolver::new(ctx, &mut planner);
        (
            resolver.resolve_field(&"fldLink".into()).unwrap(),
            resolver.resolve_field(&"fldLink".into()).unwrap(),
        )
    };

    assert_eq!(first.value_sql(), "\"join_0\".\"projects\"");
    assert_eq!(second.value_sql(), "\"join_1\".\"projects\"");
}

#[test]
fn test_missing_table_operands_are_typed_nulls() {
    let table = tasks_table();
    let settings = Settings::default();
    let missing = HashSet::from([TableId::from(PROJECTS)]);
    let ctx = CompileContext::new(&table, &settings, &missing);
    let mut planner = RecordingPlanner::default();

    let (lookup, rollup, conditional_rollup) = {
        let mut resolver = FieldReferenceResolver::new(ctx, &mut planner);
        (
            resolver.resolve_field(&"fldLookup".into()).unwrap(),
            resolver.resolve_field(&"fldRollup".into()).unwrap(),
            resolver.resolve_field(&"fldCR".into()).unwrap(),
        )
    };

    assert_eq!(lookup.value_sql(), "NULL::jsonb");
    assert!(lookup.is_array);
    assert_eq!(rollup.value_sql(), "NULL::double precision");
    assert_eq!(conditional_rollup.value_sql(), "NULL::double precision");
    assert!(planner.calls.is_empty());
}

#[test]
fn test_created_by_operand_is_user_name() {
    let table = tasks_table();
    let settings = Settings::default();
    let missing = HashSet::new();
    let ctx = CompileContext::new(&table, &settings, &missing);
    let mut planner = RecordingPlanner::default();
    let mut resolver = FieldReferenceResolver::new(ctx, &mut planner);

    let operand = resolver.resolve_field(&"fldCreatedBy".into()).unwrap();

    assert!(operand.value_sql().starts_with("COALESCE((SELECT \"u\".\"name\""));
    assert_eq!(operand.value_type, ValueType::String);
}

#[test]
fn test_unknown_field_is_not_found() {
    let table = tasks_table();
    let settings = Settings::default();
    let missing = HashSet::new();
    let ctx = CompileContext::new(&table, &settings, &missing);
    let mut planner = RecordingPlanner::default();
    let mut resolver = FieldReferenceResolver::new(ctx, &mut planner);

    let err = resolver.resolve_field(&"fldNope".into()).unwrap_err();

    assert_eq!(
        err,
        DomainError::FieldNotFound {
            field_id: "fldNope".into(),
            table_id: "tblTasks".into(),
        }
    );
}

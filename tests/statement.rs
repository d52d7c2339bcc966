mod common;

use chrono::NaiveDate;
use common::first_row;
use rowmap::{
    MapError, Mapper, MapperOptions, Value,
    convert::{Converter, NamedConverters},
    samples::{STATEMENT_COLUMNS, Statement, StatementError},
    source::Table,
};

fn statement_row(text: Option<&str>, error_code: Option<&str>, orders: &str) -> Vec<Option<Value>> {
    vec![
        text.map(Value::from),
        Some(Value::from("12")),
        error_code.map(Value::from),
        error_code.map(|_| Value::from("validation")),
        Some(Value::from("Ada Lovelace")),
        Some(Value::from(" 36 ")),
        Some(Value::from(orders)),
        Some(Value::from("c-100")),
        Some(Value::from("London")),
        Some(Value::from("W1")),
        Some(Value::from("2016-09-01 10:30:00")),
        Some(Value::from("yes")),
    ]
}

fn statement_table(rows: Vec<Vec<Option<Value>>>) -> Table {
    let mut table = Table::new(STATEMENT_COLUMNS);
    for row in rows {
        table.push_row(row).expect("row width");
    }
    table
}

#[test]
fn statement_maps_every_nested_level_from_one_row() {
    let mapper = Mapper::new();
    mapper.configure::<Statement>().unwrap();

    let table = statement_table(vec![statement_row(Some("hello"), None, "A-1, A-2")]);
    let statement = mapper.map::<Statement>(&first_row(&table)).unwrap();

    let data = &statement.data;
    assert_eq!(data.text.as_deref(), Some("hello"));
    assert_eq!(data.count, 12);
    assert_eq!(data.customer.name, "Ada Lovelace");
    assert_eq!(data.customer.age, 36);
    assert_eq!(data.customer.orders, ["A-1", "A-2"]);
    assert_eq!(data.customer.address.city, "London");
    assert_eq!(data.customer.address.zip, "W1");
    assert_eq!(
        data.activity.last_login,
        NaiveDate::from_ymd_opt(2016, 9, 1)
            .unwrap()
            .and_hms_opt(10, 30, 0)
            .unwrap()
    );
    assert!(data.activity.consent);
    assert!(!statement.has_errors());
}

#[test]
fn statement_with_nulls_keeps_optional_fields_empty() {
    let mapper = Mapper::new();
    mapper.configure::<Statement>().unwrap();

    let table = statement_table(vec![statement_row(None, None, "")]);
    let statement = mapper.map::<Statement>(&first_row(&table)).unwrap();

    assert_eq!(statement.data.text, None);
    assert_eq!(statement.error, StatementError::default());
    assert!(statement.data.customer.orders.is_empty());
}

#[test]
fn statement_reports_error_columns() {
    let mapper = Mapper::new();
    mapper.configure::<Statement>().unwrap();

    let table = statement_table(vec![
        statement_row(Some("ok"), None, "A-1"),
        statement_row(Some("bad"), Some("E42"), "A-2"),
    ]);
    let mut reader = table.reader();
    let statements = mapper
        .map_all::<Statement, _>(&mut reader)
        .collect::<Result<Vec<_>, _>>()
        .unwrap();

    assert_eq!(statements.len(), 2);
    assert!(!statements[0].has_errors());
    assert!(statements[1].has_errors());
    assert_eq!(statements[1].error.code.as_deref(), Some("E42"));
    assert_eq!(statements[1].error.category.as_deref(), Some("validation"));
}

#[test]
fn nested_statement_shapes_map_on_their_own() {
    let mapper = Mapper::new();
    mapper.configure::<Statement>().unwrap();
    assert_eq!(mapper.cache().len(), 6);

    let table = statement_table(vec![statement_row(None, Some("E1"), "A-1")]);
    let error = mapper.map::<StatementError>(&first_row(&table)).unwrap();
    assert_eq!(error.code.as_deref(), Some("E1"));
    assert_eq!(mapper.cache().compilations(), 6);
}

#[test]
fn named_orders_converter_replaces_the_list_default() {
    let named = NamedConverters::new().with(
        "orders",
        Converter::new(|value: &Value| {
            Ok(value
                .as_display()
                .split('/')
                .map(str::to_string)
                .collect::<Vec<_>>())
        }),
    );
    let mapper = Mapper::with_options(MapperOptions {
        named_converters: Some(named),
        ..MapperOptions::default()
    });
    mapper.configure::<Statement>().unwrap();

    let table = statement_table(vec![statement_row(None, None, "A-1/A-2/A-3")]);
    let statement = mapper.map::<Statement>(&first_row(&table)).unwrap();
    assert_eq!(statement.data.customer.orders, ["A-1", "A-2", "A-3"]);
}

#[test]
fn bad_consent_flag_names_the_nested_binding() {
    let mapper = Mapper::new();
    mapper.configure::<Statement>().unwrap();

    let mut row = statement_row(None, None, "A-1");
    row[11] = Some(Value::from("maybe"));
    let table = statement_table(vec![row]);

    let err = mapper.map::<Statement>(&first_row(&table)).unwrap_err();
    match err {
        MapError::CastFailure {
            shape,
            binding,
            column,
            trace,
            ..
        } => {
            assert_eq!(shape, "Statement");
            assert_eq!(binding, "data.activity.consent");
            assert_eq!(column, "boolConsent");
            assert!(trace.contains("Activity.consent <- \"boolConsent\" via by-type bool"));
        }
        other => panic!("expected CastFailure, got {other:?}"),
    }
}

#[test]
fn statement_trace_lists_every_binding() {
    let mapper = Mapper::new();
    mapper.configure::<Statement>().unwrap();

    let trace = mapper.trace::<Statement>().unwrap();
    for expected in [
        "Statement.data <- nested StatementData",
        "Statement.error <- nested StatementError",
        "StatementData.text <- \"strText\" via direct String, nullable",
        "StatementData.count <- \"intCount\" via by-type i32",
        "Customer.orders <- \"listOrders\" via by-type Vec<String>",
        "Address.zip <- \"strZIP\" via direct String",
        "Activity.last_login <- \"datLastLogin\" via by-type NaiveDateTime",
    ] {
        assert!(trace.contains(expected), "missing '{expected}' in:\n{trace}");
    }
}

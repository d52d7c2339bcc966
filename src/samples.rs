//! Shapes bundled with the command-line tool.
//!
//! [`TenColumnRecord`] is a flat record of ten text columns named `1`..`10`,
//! used by the `map` and `bench` commands. [`Statement`] is a nested record
//! spread over a single wide row, exercising nullable columns, converters
//! and several levels of nested shapes.

use chrono::NaiveDateTime;

use crate::{
    error::MapError,
    shape::{Fields, Mappable},
    source::Table,
    value::Value,
};

pub const TEN_COLUMNS: [&str; 10] = ["1", "2", "3", "4", "5", "6", "7", "8", "9", "10"];

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TenColumnRecord {
    pub values: [String; 10],
}

impl Mappable for TenColumnRecord {
    fn declare(fields: &mut Fields<Self>) {
        fields.column("value1", "1", |r| &mut r.values[0]);
        fields.column("value2", "2", |r| &mut r.values[1]);
        fields.column("value3", "3", |r| &mut r.values[2]);
        fields.column("value4", "4", |r| &mut r.values[3]);
        fields.column("value5", "5", |r| &mut r.values[4]);
        fields.column("value6", "6", |r| &mut r.values[5]);
        fields.column("value7", "7", |r| &mut r.values[6]);
        fields.column("value8", "8", |r| &mut r.values[7]);
        fields.column("value9", "9", |r| &mut r.values[8]);
        fields.column("value10", "10", |r| &mut r.values[9]);
    }
}

/// `rows` copies of the same ten-column row.
pub fn ten_column_table(rows: usize) -> Result<Table, MapError> {
    let mut table = Table::new(TEN_COLUMNS);
    let row = [
        "This is a text",
        "Whoa",
        "19/04/2014",
        "Another kind of text",
        "Name",
        "1",
        "1",
        "1",
        "1",
        "1",
    ];
    for _ in 0..rows {
        table.push_row(row.iter().map(|cell| Some(Value::from(*cell))))?;
    }
    Ok(table)
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct Statement {
    pub data: StatementData,
    pub error: StatementError,
}

impl Statement {
    pub fn has_errors(&self) -> bool {
        self.error
            .code
            .as_deref()
            .is_some_and(|code| !code.trim().is_empty())
    }
}

impl Mappable for Statement {
    fn declare(fields: &mut Fields<Self>) {
        fields.nested("data", |s| &mut s.data);
        fields.nested("error", |s| &mut s.error);
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct StatementData {
    pub text: Option<String>,
    pub count: i32,
    pub customer: Customer,
    pub activity: Activity,
}

impl Mappable for StatementData {
    fn declare(fields: &mut Fields<Self>) {
        fields.nullable_column("text", "strText", |d| &mut d.text);
        fields.column("count", "intCount", |d| &mut d.count).convert();
        fields.nested("customer", |d| &mut d.customer);
        fields.nested("activity", |d| &mut d.activity);
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct StatementError {
    pub code: Option<String>,
    pub category: Option<String>,
}

impl Mappable for StatementError {
    fn declare(fields: &mut Fields<Self>) {
        fields.nullable_column("code", "strErrorCode", |e| &mut e.code);
        fields.nullable_column("category", "strErrorCategory", |e| &mut e.category);
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Customer {
    pub name: String,
    pub age: i32,
    pub address: Address,
    pub orders: Vec<String>,
}

impl Mappable for Customer {
    fn declare(fields: &mut Fields<Self>) {
        fields.column("name", "strName", |c| &mut c.name);
        fields.column("age", "intAge", |c| &mut c.age).convert();
        fields
            .column("orders", "listOrders", |c| &mut c.orders)
            .convert_with("orders");
        fields.nested("address", |c| &mut c.address);
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Address {
    pub city: String,
    pub zip: String,
}

impl Mappable for Address {
    fn declare(fields: &mut Fields<Self>) {
        fields.column("city", "strCity", |a| &mut a.city);
        fields.column("zip", "strZIP", |a| &mut a.zip);
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Activity {
    pub last_login: NaiveDateTime,
    pub consent: bool,
}

impl Mappable for Activity {
    fn declare(fields: &mut Fields<Self>) {
        fields
            .column("last_login", "datLastLogin", |a| &mut a.last_login)
            .convert();
        fields.column("consent", "boolConsent", |a| &mut a.consent).convert();
    }
}

pub const STATEMENT_COLUMNS: [&str; 12] = [
    "strText",
    "intCount",
    "strErrorCode",
    "strErrorCategory",
    "strName",
    "intAge",
    "listOrders",
    "strId",
    "strCity",
    "strZIP",
    "datLastLogin",
    "boolConsent",
];

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ten_column_table_holds_the_requested_rows() {
        let table = ten_column_table(3).unwrap();
        assert_eq!(table.len(), 3);
        assert_eq!(table.columns(), TEN_COLUMNS);
        assert!(ten_column_table(0).unwrap().is_empty());
    }
}

mod common;

use std::sync::LazyLock;

use chrono::{NaiveDate, NaiveDateTime};
use common::first_row;
use proptest::prelude::*;
use rowmap::{Fields, Mappable, Mapper, Value, source::Table};
use rust_decimal::Decimal;
use uuid::Uuid;

#[derive(Debug, Default, Clone, PartialEq)]
struct Native {
    text: String,
    wide: i64,
    ratio: f64,
    flag: bool,
    day: NaiveDate,
    moment: NaiveDateTime,
    amount: Decimal,
    key: Uuid,
}

impl Mappable for Native {
    fn declare(fields: &mut Fields<Self>) {
        fields.column("text", "text", |n| &mut n.text);
        fields.column("wide", "wide", |n| &mut n.wide);
        fields.column("ratio", "ratio", |n| &mut n.ratio);
        fields.column("flag", "flag", |n| &mut n.flag);
        fields.column("day", "day", |n| &mut n.day);
        fields.column("moment", "moment", |n| &mut n.moment);
        fields.column("amount", "amount", |n| &mut n.amount);
        fields.column("key", "key", |n| &mut n.key);
    }
}

#[derive(Debug, Default, Clone, PartialEq)]
struct Parsed {
    narrow: i32,
    wide: i64,
    flag: bool,
    day: NaiveDate,
    amount: Decimal,
    key: Uuid,
}

impl Mappable for Parsed {
    fn declare(fields: &mut Fields<Self>) {
        fields.column("narrow", "narrow", |p| &mut p.narrow).convert();
        fields.column("wide", "wide", |p| &mut p.wide).convert();
        fields.column("flag", "flag", |p| &mut p.flag).convert();
        fields.column("day", "day", |p| &mut p.day).convert();
        fields.column("amount", "amount", |p| &mut p.amount).convert();
        fields.column("key", "key", |p| &mut p.key).convert();
    }
}

static MAPPER: LazyLock<Mapper> = LazyLock::new(|| {
    let mapper = Mapper::new();
    mapper.configure::<Native>().expect("native shape");
    mapper.configure::<Parsed>().expect("parsed shape");
    mapper
});

fn date_strategy() -> impl Strategy<Value = NaiveDate> {
    (1i32..=9999, 1u32..=12, 1u32..=28)
        .prop_map(|(y, m, d)| NaiveDate::from_ymd_opt(y, m, d).expect("valid date"))
}

fn native_strategy() -> impl Strategy<Value = Native> {
    (
        "\\PC{0,24}",
        any::<i64>(),
        -1.0e12f64..1.0e12,
        any::<bool>(),
        date_strategy(),
        (date_strategy(), 0u32..86_400),
        (any::<i64>(), 0u32..=12),
        any::<u128>(),
    )
        .prop_map(|(text, wide, ratio, flag, day, (d, secs), (mantissa, scale), key)| Native {
            text,
            wide,
            ratio,
            flag,
            day,
            moment: d
                .and_hms_opt(secs / 3600, (secs / 60) % 60, secs % 60)
                .expect("valid time"),
            amount: Decimal::new(mantissa, scale),
            key: Uuid::from_u128(key),
        })
}

proptest! {
    #[test]
    fn native_values_map_unchanged(expected in native_strategy()) {
        let mut table = Table::new(["text", "wide", "ratio", "flag", "day", "moment", "amount", "key"]);
        table.push_row([
            Some(Value::from(expected.text.clone())),
            Some(Value::from(expected.wide)),
            Some(Value::from(expected.ratio)),
            Some(Value::from(expected.flag)),
            Some(Value::from(expected.day)),
            Some(Value::from(expected.moment)),
            Some(Value::from(expected.amount)),
            Some(Value::from(expected.key)),
        ]).unwrap();

        let mapped = MAPPER.map::<Native>(&first_row(&table)).unwrap();
        prop_assert_eq!(mapped, expected);
    }

    #[test]
    fn text_values_parse_into_typed_fields(
        narrow in any::<i32>(),
        wide in any::<i64>(),
        flag in any::<bool>(),
        day in date_strategy(),
        (mantissa, scale) in (any::<i64>(), 0u32..=12),
        key in any::<u128>(),
    ) {
        let amount = Decimal::new(mantissa, scale);
        let key = Uuid::from_u128(key);
        let mut table = Table::new(["narrow", "wide", "flag", "day", "amount", "key"]);
        table.push_row([
            Some(Value::from(narrow.to_string())),
            Some(Value::from(format!(" {wide} "))),
            Some(Value::from(if flag { "Yes" } else { "no" })),
            Some(Value::from(day.format("%Y-%m-%d").to_string())),
            Some(Value::from(amount.to_string())),
            Some(Value::from(key.to_string())),
        ]).unwrap();

        let mapped = MAPPER.map::<Parsed>(&first_row(&table)).unwrap();
        prop_assert_eq!(mapped, Parsed { narrow, wide, flag, day, amount, key });
    }

    #[test]
    fn out_of_range_integers_fail_for_narrow_fields(
        wide in prop_oneof![i64::MIN..(i32::MIN as i64), (i32::MAX as i64 + 1)..=i64::MAX]
    ) {
        let mut table = Table::new(["narrow", "wide", "flag", "day", "amount", "key"]);
        table.push_row([
            Some(Value::from(wide.to_string())),
            Some(Value::from("1")),
            Some(Value::from("1")),
            Some(Value::from("2024-01-01")),
            Some(Value::from("1")),
            Some(Value::from(Uuid::nil().to_string())),
        ]).unwrap();

        let err = MAPPER.map::<Parsed>(&first_row(&table)).unwrap_err();
        prop_assert!(err.is_cast_failure());
        prop_assert!(err.to_string().contains("out of range"), "{}", err);
    }
}

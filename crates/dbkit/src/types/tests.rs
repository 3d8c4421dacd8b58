use super::*;
use crate::dialect::{Postgres, Sqlite};
use crate::driver::Row;
use chrono::{NaiveDate, TimeZone, Utc};
use rust_decimal::Decimal;
use std::str::FromStr;

fn sqlite() -> Sqlite {
    Sqlite::new()
}

#[test]
fn registry_resolves_builtins_and_lists() {
    let registry = TypeRegistry::with_defaults();
    assert_eq!(registry.build("integer").unwrap().name(), "integer");
    assert_eq!(registry.build("integer[]").unwrap().name(), "integer");
    assert!(registry.has("timestamptimezone"));
    assert!(registry.names().contains(&"binaryuuid"));
}

#[test]
fn unknown_type_is_an_error() {
    let registry = TypeRegistry::with_defaults();
    let err = registry.build("money").unwrap_err();
    assert!(matches!(err, DbError::UnknownType(ref name) if name == "money"));
}

#[test]
fn integer_rejects_non_numeric_strings() {
    let ty = IntegerType::new("integer");
    let d = sqlite();
    assert_eq!(ty.to_database(&Value::from("42"), &d).unwrap(), Value::Int(42));
    assert_eq!(ty.to_database(&Value::from("4.7"), &d).unwrap(), Value::Int(4));
    assert_eq!(ty.to_database(&Value::from(""), &d).unwrap(), Value::Null);
    assert!(ty.to_database(&Value::from("abc"), &d).unwrap_err().is_invalid_argument());
    assert_eq!(ty.binding_kind(&Value::Int(1), &d), BindingKind::Int);
    assert_eq!(ty.marshal(&Value::from("nope")), Value::Null);
}

#[test]
fn boolean_round_trips_database_representations() {
    let ty = BoolType;
    let d = Postgres::new();
    assert_eq!(ty.to_database(&Value::Int(1), &d).unwrap(), Value::Bool(true));
    assert!(ty.to_database(&Value::from("yes"), &d).is_err());
    assert_eq!(ty.to_host(&Value::from("t"), &d).unwrap(), Value::Bool(true));
    assert_eq!(ty.to_host(&Value::from("0"), &d).unwrap(), Value::Bool(false));
    assert_eq!(ty.marshal(&Value::from("on")), Value::Bool(true));
    assert_eq!(ty.marshal(&Value::from("maybe")), Value::Null);
}

#[test]
fn decimal_keeps_precision() {
    let ty = DecimalType;
    let d = sqlite();
    let expected = Decimal::from_str("10.25").unwrap();
    assert_eq!(ty.to_host(&Value::from("10.25"), &d).unwrap(), Value::Decimal(expected));
    assert_eq!(ty.to_database(&Value::Int(3), &d).unwrap(), Value::Decimal(Decimal::from(3)));
}

#[test]
fn datetime_formats_for_database_and_parses_back() {
    let d = sqlite();
    let dt = NaiveDate::from_ymd_opt(2024, 3, 5)
        .unwrap()
        .and_hms_micro_opt(10, 20, 30, 123_456)
        .unwrap();

    let plain = DateTimeType::datetime();
    assert_eq!(
        plain.to_database(&Value::DateTime(dt), &d).unwrap(),
        Value::from("2024-03-05 10:20:30")
    );

    let fractional = DateTimeType::datetime_fractional();
    assert_eq!(
        fractional.to_database(&Value::DateTime(dt), &d).unwrap(),
        Value::from("2024-03-05 10:20:30.123456")
    );
    assert_eq!(
        fractional.to_host(&Value::from("2024-03-05 10:20:30.123456"), &d).unwrap(),
        Value::DateTime(dt)
    );

    let tz = DateTimeType::timestamp_timezone();
    let utc = Utc.with_ymd_and_hms(2024, 3, 5, 10, 20, 30).unwrap();
    assert_eq!(
        tz.to_database(&Value::DateTimeTz(utc), &d).unwrap(),
        Value::from("2024-03-05 10:20:30.000000+00:00")
    );
    assert_eq!(
        tz.to_host(&Value::from("2024-03-05 12:20:30+02:00"), &d).unwrap(),
        Value::DateTimeTz(utc)
    );

    assert_eq!(plain.to_host(&Value::from("0000-00-00 00:00:00"), &d).unwrap(), Value::Null);
}

#[test]
fn date_and_time_types() {
    let d = sqlite();
    let date = NaiveDate::from_ymd_opt(2020, 1, 31).unwrap();
    assert_eq!(DateType.to_database(&Value::Date(date), &d).unwrap(), Value::from("2020-01-31"));
    assert_eq!(DateType.to_host(&Value::from("2020-01-31"), &d).unwrap(), Value::Date(date));
    assert_eq!(
        TimeType.to_host(&Value::from("08:15:00"), &d).unwrap(),
        Value::Time(chrono::NaiveTime::from_hms_opt(8, 15, 0).unwrap())
    );
}

#[test]
fn json_serializes_host_values() {
    let d = sqlite();
    let value = Value::Json(serde_json::json!({"a": [1, 2]}));
    assert_eq!(JsonType.to_database(&value, &d).unwrap(), Value::from(r#"{"a":[1,2]}"#));
    assert_eq!(
        JsonType.to_host(&Value::from(r#"{"a":[1,2]}"#), &d).unwrap(),
        value
    );
    assert_eq!(
        JsonType.to_database(&Value::from(vec![1, 2]), &d).unwrap(),
        Value::from("[1,2]")
    );
}

#[test]
fn uuid_types_generate_ids() {
    let d = sqlite();
    let id = UuidType.new_id().unwrap();
    assert!(matches!(id, Value::Uuid(_)));
    let stored = BinaryUuidType.to_database(&id, &d).unwrap();
    assert!(matches!(stored, Value::Bytes(ref b) if b.len() == 16));
    assert_eq!(BinaryUuidType.to_host(&stored, &d).unwrap(), id);
    assert_eq!(StringType::new("string").new_id(), None);
}

#[test]
fn cast_to_database_converts_lists_elementwise() {
    let registry = TypeRegistry::with_defaults();
    let d = sqlite();
    let (value, kind) = registry
        .cast_to_database(&Value::from(vec!["1", "2"]), Some("integer[]"), &d)
        .unwrap();
    assert_eq!(value, Value::from(vec![1, 2]));
    assert_eq!(kind, BindingKind::Str);

    let (value, kind) = registry.cast_to_database(&Value::from(true), None, &d).unwrap();
    assert_eq!(value, Value::Bool(true));
    assert_eq!(kind, BindingKind::Bool);
}

#[test]
fn type_map_layers() {
    let mut map = TypeMap::from_pairs([("id", "integer"), ("created", "datetime")]);
    map.add_types([("created", "date")]);
    assert_eq!(map.type_of("id"), Some("integer"));
    assert_eq!(map.type_of("created"), Some("date"));
    assert_eq!(map.type_of("missing"), None);

    map.set_types(Vec::<(String, String)>::new());
    assert_eq!(map.type_of("created"), Some("datetime"));
}

#[test]
fn field_type_converter_casts_known_columns() {
    let registry = TypeRegistry::with_defaults();
    let map = TypeMap::from_pairs([("id", "integer"), ("active", "boolean"), ("ghost", "string")]);
    let converter =
        FieldTypeConverter::new(&map, &registry, std::sync::Arc::new(Sqlite::new())).unwrap();

    let row = Row::new(
        vec!["id".to_string(), "active".to_string(), "title".to_string()],
        vec![Value::from("7"), Value::Int(1), Value::from("x")],
    );
    let row = converter.convert(row).unwrap();
    assert_eq!(row.get("id"), Some(&Value::Int(7)));
    assert_eq!(row.get("active"), Some(&Value::Bool(true)));
    assert_eq!(row.get("title"), Some(&Value::from("x")));
}

#[test]
fn converter_fails_fast_on_unknown_type() {
    let registry = TypeRegistry::with_defaults();
    let map = TypeMap::from_pairs([("id", "nope")]);
    assert!(FieldTypeConverter::new(&map, &registry, std::sync::Arc::new(Sqlite::new())).is_err());
}

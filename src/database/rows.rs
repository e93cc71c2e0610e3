//! PgRow to JSON conversion for the generic entity surface.

use chrono::{DateTime, Utc};
use serde_json::{Map, Value};
use sqlx::postgres::{PgRow, PgTypeInfo};
use sqlx::{Column, Row, TypeInfo};

/// Convert a database row to a JSON object, column by column.
pub fn row_to_json(row: &PgRow) -> Value {
    let mut record = Map::new();
    for (i, column) in row.columns().iter().enumerate() {
        record.insert(
            column.name().to_string(),
            column_value(row, i, column.type_info()),
        );
    }
    Value::Object(record)
}

pub fn rows_to_json(rows: &[PgRow]) -> Vec<Value> {
    rows.iter().map(row_to_json).collect()
}

/// Extract one typed column value; unknown types degrade to string or null.
fn column_value(row: &PgRow, index: usize, type_info: &PgTypeInfo) -> Value {
    match type_info.name() {
        "TEXT" | "VARCHAR" => match row.try_get::<Option<String>, _>(index) {
            Ok(text) => text.map(Value::String).unwrap_or(Value::Null),
            Err(_) => Value::Null,
        },
        "BOOL" => match row.try_get::<Option<bool>, _>(index) {
            Ok(flag) => flag.map(Value::Bool).unwrap_or(Value::Null),
            Err(_) => Value::Null,
        },
        "INT4" => match row.try_get::<Option<i32>, _>(index) {
            Ok(num) => num.map(|n| Value::Number(n.into())).unwrap_or(Value::Null),
            Err(_) => Value::Null,
        },
        "INT8" => match row.try_get::<Option<i64>, _>(index) {
            Ok(num) => num.map(|n| Value::Number(n.into())).unwrap_or(Value::Null),
            Err(_) => Value::Null,
        },
        "TIMESTAMPTZ" => match row.try_get::<Option<DateTime<Utc>>, _>(index) {
            Ok(ts) => ts
                .map(|t| Value::String(t.to_rfc3339()))
                .unwrap_or(Value::Null),
            Err(_) => Value::Null,
        },
        "UUID" => match row.try_get::<Option<uuid::Uuid>, _>(index) {
            Ok(id) => id
                .map(|u| Value::String(u.to_string()))
                .unwrap_or(Value::Null),
            Err(_) => Value::Null,
        },
        "JSON" | "JSONB" => match row.try_get::<Option<Value>, _>(index) {
            Ok(json) => json.unwrap_or(Value::Null),
            Err(_) => Value::Null,
        },
        _ => match row.try_get::<Option<String>, _>(index) {
            Ok(text) => text.map(Value::String).unwrap_or(Value::Null),
            Err(_) => Value::Null,
        },
    }
}

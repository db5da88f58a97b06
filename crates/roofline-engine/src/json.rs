//! Conversion from engine values to JSON.
//!
//! The sink writers are strictly field-level: rows become JSON objects,
//! engine lists become arrays, timestamps become ISO-8601 strings, structs
//! become sub-objects. No runtime type introspection happens downstream of
//! this module.

use chrono::DateTime;
use duckdb::types::{TimeUnit, Value};
use serde_json::{Map, Number, json};

/// Convert one row (parallel column/value slices) into a JSON object.
#[must_use]
pub fn row_values_to_json(columns: &[String], values: &[Value]) -> Map<String, serde_json::Value> {
    let mut object = Map::with_capacity(columns.len());
    for (name, value) in columns.iter().zip(values.iter()) {
        object.insert(name.clone(), value_to_json(value));
    }
    object
}

fn number_from_f64(value: f64) -> serde_json::Value {
    Number::from_f64(value).map_or(serde_json::Value::Null, serde_json::Value::Number)
}

fn timestamp_to_micros(unit: TimeUnit, raw: i64) -> i64 {
    match unit {
        TimeUnit::Second => raw.saturating_mul(1_000_000),
        TimeUnit::Millisecond => raw.saturating_mul(1_000),
        TimeUnit::Microsecond => raw,
        TimeUnit::Nanosecond => raw / 1_000,
    }
}

/// Convert a single engine value to JSON.
#[must_use]
pub fn value_to_json(value: &Value) -> serde_json::Value {
    match value {
        Value::Null => serde_json::Value::Null,
        Value::Boolean(b) => json!(b),
        Value::TinyInt(v) => json!(v),
        Value::SmallInt(v) => json!(v),
        Value::Int(v) => json!(v),
        Value::BigInt(v) => json!(v),
        Value::HugeInt(v) => i64::try_from(*v).map_or_else(|_| json!(v.to_string()), |v| json!(v)),
        Value::UTinyInt(v) => json!(v),
        Value::USmallInt(v) => json!(v),
        Value::UInt(v) => json!(v),
        Value::UBigInt(v) => json!(v),
        Value::Float(v) => number_from_f64(f64::from(*v)),
        Value::Double(v) => number_from_f64(*v),
        Value::Decimal(d) => d
            .to_string()
            .parse::<f64>()
            .map_or(serde_json::Value::Null, number_from_f64),
        Value::Timestamp(unit, raw) => {
            let micros = timestamp_to_micros(*unit, *raw);
            DateTime::from_timestamp_micros(micros).map_or(serde_json::Value::Null, |dt| {
                json!(dt.format("%Y-%m-%dT%H:%M:%S%.6fZ").to_string())
            })
        }
        Value::Date32(days) => DateTime::from_timestamp(i64::from(*days) * 86_400, 0)
            .map_or(serde_json::Value::Null, |dt| {
                json!(dt.format("%Y-%m-%d").to_string())
            }),
        Value::Time64(unit, raw) => {
            let micros = timestamp_to_micros(*unit, *raw);
            json!(micros)
        }
        Value::Interval {
            months,
            days,
            nanos,
        } => json!({ "months": months, "days": days, "nanos": nanos }),
        Value::Text(s) => json!(s),
        Value::Blob(bytes) => json!(bytes.len()),
        Value::Enum(tag) => json!(tag),
        Value::List(items) | Value::Array(items) => {
            serde_json::Value::Array(items.iter().map(value_to_json).collect())
        }
        Value::Struct(fields) => {
            let mut object = Map::with_capacity(fields.iter().count());
            for (key, field_value) in fields.iter() {
                object.insert(key.clone(), value_to_json(field_value));
            }
            serde_json::Value::Object(object)
        }
        Value::Map(entries) => {
            let mut object = Map::new();
            for (key, entry_value) in entries.iter() {
                let key_text = match key {
                    Value::Text(s) => s.clone(),
                    other => value_to_json(other).to_string(),
                };
                object.insert(key_text, value_to_json(entry_value));
            }
            serde_json::Value::Object(object)
        }
        Value::Union(inner) => value_to_json(inner),
        _ => serde_json::Value::Null,
    }
}

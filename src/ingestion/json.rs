//! JSON parser.
//!
//! Supported inputs:
//! - An object holding the records under `fields`: `{"fields": [{"a":1}, {"a":2}]}`
//! - A JSON array of objects: `[{"a":1}, {"a":2}]`
//! - A single object: `{"a":1}`
//! - Newline-delimited JSON (NDJSON): `{"a":1}\n{"a":2}\n`
//!
//! The schema is taken from the keys of the first record, in document order, typed by its JSON
//! values. Every record is emitted in schema order; absent keys and `null` become
//! [`Value::Null`].

use std::io::Read;

use crate::error::{DatasetError, DatasetResult};
use crate::inference::infer_value_type;
use crate::types::Value;

use super::{schema_from_headers, ParsedSource, RawRow};

/// Parse a JSON stream.
pub fn parse_json(mut input: Box<dyn Read>) -> DatasetResult<ParsedSource> {
    let mut text = String::new();
    input.read_to_string(&mut text)?;
    parse_json_str(&text)
}

/// Parse JSON from an in-memory string.
pub fn parse_json_str(input: &str) -> DatasetResult<ParsedSource> {
    let records = json_records(input)?;
    let first = records
        .first()
        .ok_or_else(|| DatasetError::parse("json input has no records"))?
        .as_object()
        .ok_or_else(|| DatasetError::parse("first json record is not an object"))?;

    let headers: Vec<String> = first.keys().cloned().collect();
    let types = first
        .values()
        .map(|v| infer_value_type(&to_value(v)))
        .collect();
    let schema = schema_from_headers(headers.iter().cloned(), types)?;

    let rows = records
        .into_iter()
        .enumerate()
        .map(move |(idx0, record)| record_to_row(idx0 + 1, &record, &headers));

    Ok(ParsedSource {
        schema,
        rows: Box::new(rows),
    })
}

fn json_records(input: &str) -> DatasetResult<Vec<serde_json::Value>> {
    let trimmed = input.trim();
    if trimmed.is_empty() {
        return Err(DatasetError::parse("json input is empty"));
    }

    // First try parsing as a single JSON value.
    if let Ok(v) = serde_json::from_str::<serde_json::Value>(trimmed) {
        return match v {
            serde_json::Value::Object(mut obj) => {
                if let Some(serde_json::Value::Array(items)) = obj.get_mut("fields") {
                    return Ok(std::mem::take(items));
                }
                Ok(vec![serde_json::Value::Object(obj)])
            }
            serde_json::Value::Array(items) => Ok(items),
            _ => Err(DatasetError::parse(
                "json must be an object, an array of objects, or NDJSON",
            )),
        };
    }

    // Fall back to NDJSON.
    let mut values = Vec::new();
    for (i, line) in trimmed.lines().enumerate() {
        let line = line.trim();
        if line.is_empty() {
            continue;
        }
        let v = serde_json::from_str::<serde_json::Value>(line).map_err(|e| {
            DatasetError::parse(format!("invalid ndjson at line {}: {}", i + 1, e))
        })?;
        values.push(v);
    }
    Ok(values)
}

fn record_to_row(
    record_num: usize,
    record: &serde_json::Value,
    headers: &[String],
) -> DatasetResult<RawRow> {
    let obj = record.as_object().ok_or_else(|| {
        DatasetError::parse(format!("json record {record_num} is not an object"))
    })?;
    Ok(headers
        .iter()
        .map(|h| obj.get(h).map(to_value).unwrap_or(Value::Null))
        .collect())
}

fn to_value(v: &serde_json::Value) -> Value {
    match v {
        serde_json::Value::Null => Value::Null,
        serde_json::Value::Bool(b) => Value::Bool(*b),
        serde_json::Value::Number(n) => match n.as_i64() {
            Some(i) => Value::Int64(i),
            None => n.as_f64().map(Value::Float64).unwrap_or(Value::Null),
        },
        serde_json::Value::String(s) => Value::Utf8(s.clone()),
        nested => Value::Utf8(nested.to_string()),
    }
}

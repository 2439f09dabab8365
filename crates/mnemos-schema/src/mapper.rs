//! Relational Mapper.
//!
//! [`flatten`] turns a typed record into a [`FlatRow`] with exactly one column
//! per top-level field; [`unflatten`] reads those columns back and validates
//! the reconstructed record.
//!
//! Only the columns named by the schema are read, so a row that combines the
//! columns of both sides of an interaction can be split by handing it to
//! `unflatten` once per side.

use mnemos_types::{ColumnValue, FieldDescriptor, Fields, FlatRow, Kind, RecordSchema, Result};
use serde_json::Value;
use tracing::debug;

use crate::validate::{canonical_number, validate};

/// Suffix of the column holding a composite field as JSON text.
pub const JSON_SUFFIX: &str = "_json";

/// Column name of `field`: `<field>_json` for arrays and objects (through any
/// `Optional` / `Nullable` wrappers), the field name otherwise.
pub fn column_name(field: &str, descriptor: &FieldDescriptor) -> String {
    if descriptor.is_composite() {
        format!("{field}{JSON_SUFFIX}")
    } else {
        field.to_string()
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// flatten
// ─────────────────────────────────────────────────────────────────────────────

/// Flatten `record` into one column per schema field.
///
/// Scalars pass through; composites become canonical (key-sorted, compact)
/// JSON text.  Absent and `null` fields become SQL `NULL`.
pub fn flatten(record: &Fields, schema: &RecordSchema) -> FlatRow {
    schema
        .iter()
        .map(|field| {
            let column = column_name(&field.name, &field.descriptor);
            let cell = match record.get(&field.name) {
                None | Some(Value::Null) => ColumnValue::Null,
                Some(v) if field.descriptor.is_composite() => ColumnValue::Text(v.to_string()),
                Some(v) => scalar_cell(v),
            };
            (column, cell)
        })
        .collect()
}

fn scalar_cell(value: &Value) -> ColumnValue {
    match value {
        Value::Null => ColumnValue::Null,
        Value::Bool(b) => ColumnValue::Integer(i64::from(*b)),
        Value::Number(n) => match n.as_i64() {
            Some(i) => ColumnValue::Integer(i),
            None => ColumnValue::Real(n.as_f64().unwrap_or(f64::NAN)),
        },
        Value::String(s) => ColumnValue::Text(s.clone()),
        composite => ColumnValue::Text(composite.to_string()),
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// unflatten
// ─────────────────────────────────────────────────────────────────────────────

/// Rebuild and validate the record stored in `row`.
///
/// Composite columns hold JSON text; text that fails to parse is kept as a
/// raw string and left for validation to judge.
pub fn unflatten(row: &FlatRow, schema: &RecordSchema) -> Result<Fields> {
    let mut fields = Fields::new();
    for field in schema {
        let descriptor = &field.descriptor;
        let cell = if descriptor.is_composite() {
            row.get(&column_name(&field.name, descriptor))
                .or_else(|| row.get(&field.name))
        } else {
            row.get(&field.name)
        };
        match cell {
            None | Some(ColumnValue::Null) => {
                if descriptor.is_required() && descriptor.is_nullable() {
                    fields.insert(field.name.clone(), Value::Null);
                }
            }
            Some(cell) => {
                fields.insert(field.name.clone(), cell_value(cell, descriptor, &field.name));
            }
        }
    }
    validate(schema, &fields)
}

fn cell_value(cell: &ColumnValue, descriptor: &FieldDescriptor, field: &str) -> Value {
    let base = descriptor.base();
    match (cell, &base.kind) {
        (ColumnValue::Text(text), Kind::Array(_) | Kind::Object(_)) => {
            serde_json::from_str(text).unwrap_or_else(|e| {
                debug!(field, error = %e, "composite column is not valid JSON; keeping raw text");
                Value::String(text.clone())
            })
        }
        (ColumnValue::Integer(i), Kind::Boolean) => Value::Bool(*i != 0),
        (ColumnValue::Text(text), Kind::Number) => text
            .trim()
            .parse::<f64>()
            .ok()
            .and_then(canonical_number)
            .map(Value::Number)
            .unwrap_or_else(|| Value::String(text.clone())),
        (ColumnValue::Integer(i), _) => Value::from(*i),
        (ColumnValue::Real(x), _) => canonical_number(*x).map(Value::Number).unwrap_or(Value::Null),
        (ColumnValue::Text(text), _) => Value::String(text.clone()),
        (ColumnValue::Null, _) => Value::Null,
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────

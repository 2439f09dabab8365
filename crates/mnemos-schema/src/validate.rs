//! Structural validation.
//!
//! Validation walks a value against its descriptor and collects **every**
//! failing path into one [`ValidationReport`] instead of stopping at the
//! first problem.  On success it returns a cleaned copy of the record:
//!
//! * keys not declared by the schema are dropped,
//! * numbers are canonicalized (see [`canonical_number`]),
//! * `null` supplied for an `Optional` field that does not admit `null` is
//!   treated as absence.

use mnemos_types::{FieldDescriptor, Fields, Kind, RecordSchema, Result, ValidationReport};
use serde_json::{Number, Value};

/// Largest magnitude at which every integer is exactly representable as f64.
const MAX_SAFE_INTEGER: f64 = 9_007_199_254_740_992.0;

/// Canonical JSON number for `x`: an integer when `x` is integral and within
/// ±2^53, otherwise a float.  `None` for NaN and infinities.
pub fn canonical_number(x: f64) -> Option<Number> {
    if !x.is_finite() {
        return None;
    }
    if x.fract() == 0.0 && x.abs() < MAX_SAFE_INTEGER {
        Some(Number::from(x as i64))
    } else {
        Number::from_f64(x)
    }
}

fn canonicalize(n: &Number) -> Number {
    if n.is_i64() || n.is_u64() {
        return n.clone();
    }
    n.as_f64()
        .and_then(canonical_number)
        .unwrap_or_else(|| n.clone())
}

/// Validate a complete record: every required field must be present.
pub fn validate(schema: &RecordSchema, value: &Fields) -> Result<Fields> {
    let mut report = ValidationReport::new();
    let cleaned = validate_fields(&schema.fields, value, "", true, &mut report);
    report.into_result(cleaned)
}

/// Validate a partial record: supplied fields must be declared and conform,
/// missing fields are allowed.
pub fn validate_partial(schema: &RecordSchema, value: &Fields) -> Result<Fields> {
    let mut report = ValidationReport::new();
    for key in value.keys() {
        if !schema.contains(key) {
            report.push(key.clone(), "field is not declared by the schema");
        }
    }
    let cleaned = validate_fields(&schema.fields, value, "", false, &mut report);
    report.into_result(cleaned)
}

fn join(path: &str, field: &str) -> String {
    if path.is_empty() {
        field.to_string()
    } else {
        format!("{path}.{field}")
    }
}

fn validate_fields(
    fields: &[mnemos_types::Field],
    value: &Fields,
    path: &str,
    require_all: bool,
    report: &mut ValidationReport,
) -> Fields {
    let mut out = Fields::new();
    for field in fields {
        let field_path = join(path, &field.name);
        let descriptor = &field.descriptor;
        match value.get(&field.name) {
            None => {
                if require_all && descriptor.is_required() {
                    report.push(field_path, "required");
                }
            }
            Some(Value::Null) if !descriptor.is_nullable() && !descriptor.is_required() => {}
            Some(v) => {
                if let Some(cleaned) = validate_value(descriptor, v, &field_path, report) {
                    out.insert(field.name.clone(), cleaned);
                }
            }
        }
    }
    out
}

/// Validate one value against `descriptor`, returning the cleaned value when
/// it conforms.  Issues are appended to `report` under `path`.
pub fn validate_value(
    descriptor: &FieldDescriptor,
    value: &Value,
    path: &str,
    report: &mut ValidationReport,
) -> Option<Value> {
    match (&descriptor.kind, value) {
        (Kind::Optional(inner), v) => validate_value(inner, v, path, report),
        (Kind::Nullable(_), Value::Null) => Some(Value::Null),
        (Kind::Nullable(inner), v) => validate_value(inner, v, path, report),
        (Kind::String, Value::String(s)) => Some(Value::String(s.clone())),
        (Kind::Number, Value::Number(n)) => Some(Value::Number(canonicalize(n))),
        (Kind::Boolean, Value::Bool(b)) => Some(Value::Bool(*b)),
        (Kind::Array(item), Value::Array(items)) => {
            let before = report.len();
            let cleaned: Vec<Value> = items
                .iter()
                .enumerate()
                .filter_map(|(i, v)| validate_value(item, v, &format!("{path}[{i}]"), report))
                .collect();
            (report.len() == before).then_some(Value::Array(cleaned))
        }
        (Kind::Object(fields), Value::Object(map)) => {
            let before = report.len();
            let cleaned = validate_fields(fields, map, path, true, report);
            (report.len() == before).then_some(Value::Object(cleaned))
        }
        (_, other) => {
            report.push(
                path,
                format!(
                    "expected {}, got {}",
                    descriptor.type_name(),
                    json_type_name(other)
                ),
            );
            None
        }
    }
}

fn json_type_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use mnemos_types::{Field, MnemosError};
    use serde_json::json;

    fn fields(v: Value) -> Fields {
        v.as_object().cloned().unwrap()
    }

    fn schema() -> RecordSchema {
        RecordSchema::new()
            .field("answer", FieldDescriptor::string())
            .field("tags", FieldDescriptor::array(FieldDescriptor::string()))
            .field("score", FieldDescriptor::number().optional())
            .field("note", FieldDescriptor::string().nullable())
            .field(
                "meta",
                FieldDescriptor::object(vec![
                    Field::new("source", FieldDescriptor::string()),
                    Field::new("ok", FieldDescriptor::boolean()),
                ])
                .optional(),
            )
    }

    fn issues(err: MnemosError) -> Vec<String> {
        match err {
            MnemosError::Validation(report) => {
                report.issues.into_iter().map(|i| i.to_string()).collect()
            }
            other => panic!("expected validation error, got {other:?}"),
        }
    }

    // ── validate ─────────────────────────────────────────────────────────────

    #[test]
    fn conforming_record_passes_unchanged() {
        let value = fields(json!({
            "answer": "y", "tags": ["a", "b"], "score": 0.5, "note": null,
            "meta": {"source": "doc", "ok": true}
        }));
        assert_eq!(validate(&schema(), &value).unwrap(), value);
    }

    #[test]
    fn every_failing_path_is_reported() {
        let value = fields(json!({
            "tags": ["a", 3], "score": "high", "note": 1,
            "meta": {"source": 2}
        }));
        let found = issues(validate(&schema(), &value).unwrap_err());
        assert_eq!(
            found,
            vec![
                "answer: required",
                "tags[1]: expected string, got number",
                "score: expected number, got string",
                "note: expected string, got number",
                "meta.source: expected string, got number",
                "meta.ok: required",
            ]
        );
    }

    #[test]
    fn nullable_field_must_still_be_present() {
        let value = fields(json!({"answer": "y", "tags": []}));
        let found = issues(validate(&schema(), &value).unwrap_err());
        assert_eq!(found, vec!["note: required"]);
    }

    #[test]
    fn unknown_keys_are_dropped() {
        let value = fields(json!({"answer": "y", "tags": [], "note": null, "extra": 1}));
        let cleaned = validate(&schema(), &value).unwrap();
        assert!(!cleaned.contains_key("extra"));
    }

    #[test]
    fn null_for_optional_is_treated_as_absent() {
        let value = fields(json!({"answer": "y", "tags": [], "note": null, "score": null}));
        let cleaned = validate(&schema(), &value).unwrap();
        assert!(!cleaned.contains_key("score"));
    }

    #[test]
    fn numbers_are_canonicalized() {
        let value = fields(json!({"answer": "y", "tags": [], "note": null, "score": 3.0}));
        let cleaned = validate(&schema(), &value).unwrap();
        assert_eq!(cleaned["score"], json!(3));
    }

    // ── validate_partial ─────────────────────────────────────────────────────

    #[test]
    fn partial_allows_missing_required_fields() {
        let value = fields(json!({"answer": "y"}));
        assert_eq!(validate_partial(&schema(), &value).unwrap(), value);
    }

    #[test]
    fn partial_rejects_undeclared_and_mistyped_fields() {
        let value = fields(json!({"answer": 1, "bogus": true}));
        let found = issues(validate_partial(&schema(), &value).unwrap_err());
        assert_eq!(
            found,
            vec![
                "bogus: field is not declared by the schema",
                "answer: expected string, got number",
            ]
        );
    }

    // ── canonical_number ─────────────────────────────────────────────────────

    #[test]
    fn canonical_number_rules() {
        assert_eq!(canonical_number(4.0), Some(Number::from(4)));
        assert_eq!(canonical_number(-0.25), Number::from_f64(-0.25));
        assert_eq!(canonical_number(1e300), Number::from_f64(1e300));
        assert_eq!(canonical_number(f64::NAN), None);
        assert_eq!(canonical_number(f64::INFINITY), None);
    }
}

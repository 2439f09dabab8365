//! Order-insensitive structural comparison of schemas.
//!
//! Two schemas are structurally equal when they declare the same field names
//! with the same kinds, wrappers and nesting.  Field order and description
//! text are ignored.

use mnemos_types::{Field, FieldDescriptor, Kind, RecordSchema};

/// `true` when `a` and `b` are structurally identical.
pub fn structurally_equal(a: &RecordSchema, b: &RecordSchema) -> bool {
    structural_diff(a, b).is_empty()
}

/// Every structural difference between `stored` and `requested`, as
/// human-readable lines.  Empty when the schemas match.
pub fn structural_diff(stored: &RecordSchema, requested: &RecordSchema) -> Vec<String> {
    let mut diffs = Vec::new();
    diff_fields(&stored.fields, &requested.fields, "", &mut diffs);
    diffs
}

fn diff_fields(stored: &[Field], requested: &[Field], path: &str, out: &mut Vec<String>) {
    let at = |name: &str| {
        if path.is_empty() {
            name.to_string()
        } else {
            format!("{path}.{name}")
        }
    };
    for field in stored {
        match requested.iter().find(|f| f.name == field.name) {
            None => out.push(format!("field '{}' was removed", at(&field.name))),
            Some(other) => diff_descriptor(&field.descriptor, &other.descriptor, &at(&field.name), out),
        }
    }
    for field in requested {
        if !stored.iter().any(|f| f.name == field.name) {
            out.push(format!("field '{}' was added", at(&field.name)));
        }
    }
}

fn diff_descriptor(stored: &FieldDescriptor, requested: &FieldDescriptor, path: &str, out: &mut Vec<String>) {
    match (&stored.kind, &requested.kind) {
        (Kind::String, Kind::String)
        | (Kind::Number, Kind::Number)
        | (Kind::Boolean, Kind::Boolean) => {}
        (Kind::Array(a), Kind::Array(b)) => diff_descriptor(a, b, &format!("{path}[]"), out),
        (Kind::Object(a), Kind::Object(b)) => diff_fields(a, b, path, out),
        (Kind::Optional(a), Kind::Optional(b)) | (Kind::Nullable(a), Kind::Nullable(b)) => {
            diff_descriptor(a, b, path, out)
        }
        (a, b) => out.push(format!(
            "field '{path}' changed from {} to {}",
            kind_label(a),
            kind_label(b)
        )),
    }
}

fn kind_label(kind: &Kind) -> String {
    match kind {
        Kind::String => "string".into(),
        Kind::Number => "number".into(),
        Kind::Boolean => "boolean".into(),
        Kind::Array(_) => "array".into(),
        Kind::Object(_) => "object".into(),
        Kind::Optional(inner) => format!("optional {}", kind_label(&inner.kind)),
        Kind::Nullable(inner) => format!("nullable {}", kind_label(&inner.kind)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn base() -> RecordSchema {
        RecordSchema::new()
            .field("answer", FieldDescriptor::string().describe("old text"))
            .field("tags", FieldDescriptor::array(FieldDescriptor::string()))
            .field(
                "meta",
                FieldDescriptor::object(vec![
                    Field::new("a", FieldDescriptor::number()),
                    Field::new("b", FieldDescriptor::boolean().optional()),
                ]),
            )
    }

    #[test]
    fn reordered_fields_and_new_descriptions_are_equal() {
        let reordered = RecordSchema::new()
            .field(
                "meta",
                FieldDescriptor::object(vec![
                    Field::new("b", FieldDescriptor::boolean().optional()),
                    Field::new("a", FieldDescriptor::number()),
                ]),
            )
            .field("tags", FieldDescriptor::array(FieldDescriptor::string()))
            .field("answer", FieldDescriptor::string().describe("new text"));
        assert!(structurally_equal(&base(), &reordered));
    }

    #[test]
    fn changed_kind_is_reported_with_path() {
        let changed = base().field("tags", FieldDescriptor::array(FieldDescriptor::number()));
        assert_eq!(
            structural_diff(&base(), &changed),
            vec!["field 'tags[]' changed from string to number"]
        );
    }

    #[test]
    fn wrapper_change_is_a_difference() {
        let changed = base().field("answer", FieldDescriptor::string().optional());
        assert_eq!(
            structural_diff(&base(), &changed),
            vec!["field 'answer' changed from string to optional string"]
        );
    }

    #[test]
    fn added_and_removed_fields_are_reported() {
        let mut changed = base().field("extra", FieldDescriptor::boolean());
        changed.fields.retain(|f| f.name != "answer");
        assert_eq!(
            structural_diff(&base(), &changed),
            vec!["field 'answer' was removed", "field 'extra' was added"]
        );
    }

    #[test]
    fn nested_object_difference() {
        let changed = base().field(
            "meta",
            FieldDescriptor::object(vec![Field::new("a", FieldDescriptor::number())]),
        );
        assert_eq!(
            structural_diff(&base(), &changed),
            vec!["field 'meta.b' was removed"]
        );
    }
}

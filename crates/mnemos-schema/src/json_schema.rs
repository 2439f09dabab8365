//! Descriptor import from JSON Schema.
//!
//! Agents are usually declared from an existing type definition rather than
//! by hand.  [`from_json_schema`] accepts the JSON Schema subset that maps
//! onto the closed descriptor kinds, and [`schema_of`] runs
//! `schemars::schema_for!` on a Rust type first.
//!
//! | JSON Schema | Descriptor |
//! |---|---|
//! | `"type": "string"` (incl. `enum` of strings) | `String` |
//! | `"type": "number"` / `"integer"` | `Number` |
//! | `"type": "boolean"` | `Boolean` |
//! | `"type": "array"` + `items` | `Array` |
//! | `"type": "object"` + `properties` | `Object` |
//! | `["T", "null"]`, `anyOf`/`oneOf` with a `null` branch | `Nullable` |
//! | property absent from `required` | `Optional` |
//!
//! `$ref`s into `definitions` / `$defs` are resolved; recursive types are
//! rejected because the descriptor tree must be finite.

use mnemos_types::{Field, FieldDescriptor, Kind, MnemosError, RecordSchema, Result};
use schemars::JsonSchema;
use serde_json::{Map, Value};

const MAX_REF_DEPTH: usize = 32;

/// Build a [`RecordSchema`] from the JSON Schema of `T`.
pub fn schema_of<T: JsonSchema>() -> Result<RecordSchema> {
    let root = serde_json::to_value(schemars::schema_for!(T))?;
    from_json_schema(&root)
}

/// Build a [`RecordSchema`] from a JSON Schema document whose root is an
/// object schema.
pub fn from_json_schema(root: &Value) -> Result<RecordSchema> {
    let descriptor = Importer { root }.descriptor(root, 0)?;
    match descriptor.kind {
        Kind::Object(fields) => Ok(RecordSchema::from_fields(fields)),
        _ => Err(invalid("the root of a record schema must be an object")),
    }
}

fn invalid(msg: impl Into<String>) -> MnemosError {
    MnemosError::InvalidSchema(msg.into())
}

struct Importer<'a> {
    root: &'a Value,
}

impl<'a> Importer<'a> {
    fn resolve(&self, reference: &str) -> Result<&'a Value> {
        let name = reference
            .strip_prefix("#/definitions/")
            .or_else(|| reference.strip_prefix("#/$defs/"))
            .ok_or_else(|| invalid(format!("unsupported $ref '{reference}'")))?;
        ["definitions", "$defs"]
            .iter()
            .find_map(|section| self.root.get(section).and_then(|defs| defs.get(name)))
            .ok_or_else(|| invalid(format!("unresolved $ref '{reference}'")))
    }

    fn descriptor(&self, node: &'a Value, depth: usize) -> Result<FieldDescriptor> {
        if depth > MAX_REF_DEPTH {
            return Err(invalid("schema nesting too deep (recursive type?)"));
        }
        let obj = node
            .as_object()
            .ok_or_else(|| invalid("schema node must be an object"))?;
        let description = obj
            .get("description")
            .and_then(Value::as_str)
            .map(str::to_string);

        let mut descriptor = self.kind_of(obj, depth)?;
        if description.is_some() {
            descriptor.description = description;
        }
        Ok(descriptor)
    }

    fn kind_of(&self, obj: &'a Map<String, Value>, depth: usize) -> Result<FieldDescriptor> {
        if let Some(reference) = obj.get("$ref").and_then(Value::as_str) {
            return self.descriptor(self.resolve(reference)?, depth + 1);
        }
        if let Some(Value::Array(all)) = obj.get("allOf") {
            return match all.as_slice() {
                [single] => self.descriptor(single, depth + 1),
                _ => Err(invalid("allOf with more than one branch is not supported")),
            };
        }
        for key in ["anyOf", "oneOf"] {
            if let Some(Value::Array(branches)) = obj.get(key) {
                let non_null: Vec<&Value> = branches.iter().filter(|b| !is_null_schema(b)).collect();
                return match non_null.as_slice() {
                    [single] if non_null.len() < branches.len() => {
                        Ok(self.descriptor(single, depth + 1)?.nullable())
                    }
                    [single] => self.descriptor(single, depth + 1),
                    _ => Err(invalid(format!("{key} unions are not supported"))),
                };
            }
        }

        let (type_name, nullable) = match obj.get("type") {
            Some(Value::String(t)) => (t.as_str(), false),
            Some(Value::Array(types)) => {
                let names: Vec<&str> = types.iter().filter_map(Value::as_str).collect();
                let non_null: Vec<&str> = names.iter().copied().filter(|t| *t != "null").collect();
                match non_null.as_slice() {
                    [single] => (*single, non_null.len() < names.len()),
                    _ => return Err(invalid(format!("multi-type {names:?} is not supported"))),
                }
            }
            None if obj.contains_key("properties") => ("object", false),
            None if obj.contains_key("enum") => ("string", false),
            _ => return Err(invalid("schema node has no supported 'type'")),
        };

        let descriptor = match type_name {
            "string" => FieldDescriptor::string(),
            "number" | "integer" => FieldDescriptor::number(),
            "boolean" => FieldDescriptor::boolean(),
            "array" => {
                let items = obj
                    .get("items")
                    .ok_or_else(|| invalid("array schema without 'items'"))?;
                FieldDescriptor::array(self.descriptor(items, depth + 1)?)
            }
            "object" => FieldDescriptor::object(self.properties(obj, depth)?),
            other => return Err(invalid(format!("unsupported type '{other}'"))),
        };
        Ok(if nullable { descriptor.nullable() } else { descriptor })
    }

    fn properties(&self, obj: &'a Map<String, Value>, depth: usize) -> Result<Vec<Field>> {
        let required: Vec<&str> = obj
            .get("required")
            .and_then(Value::as_array)
            .map(|r| r.iter().filter_map(Value::as_str).collect())
            .unwrap_or_default();
        let Some(props) = obj.get("properties").and_then(Value::as_object) else {
            return Ok(Vec::new());
        };
        props
            .iter()
            .map(|(name, node)| {
                let descriptor = self.descriptor(node, depth + 1)?;
                let descriptor = if required.contains(&name.as_str()) {
                    descriptor
                } else {
                    descriptor.optional()
                };
                Ok(Field::new(name.clone(), descriptor))
            })
            .collect()
    }
}

fn is_null_schema(node: &Value) -> bool {
    node.get("type").and_then(Value::as_str) == Some("null")
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use serde::{Deserialize, Serialize};
    use serde_json::json;

    #[allow(dead_code)]
    #[derive(Serialize, Deserialize, JsonSchema)]
    struct Source {
        url: String,
        rank: u32,
    }

    #[allow(dead_code)]
    #[derive(Serialize, Deserialize, JsonSchema)]
    struct Answer {
        /// The final answer.
        answer: String,
        tags: Vec<String>,
        confidence: Option<f64>,
        sources: Vec<Source>,
        primary: Option<Source>,
    }

    #[test]
    fn imports_schemars_type() {
        let schema = schema_of::<Answer>().unwrap();
        let answer = schema.get("answer").unwrap();
        assert_eq!(answer.kind, Kind::String);
        assert_eq!(answer.description.as_deref(), Some("The final answer."));

        assert_eq!(
            schema.get("tags").unwrap().kind,
            Kind::Array(Box::new(FieldDescriptor::string()))
        );

        let confidence = schema.get("confidence").unwrap();
        assert!(!confidence.is_required());
        assert!(confidence.is_nullable());
        assert_eq!(confidence.type_name(), "number");

        let sources = schema.get("sources").unwrap();
        match &sources.kind {
            Kind::Array(item) => assert!(matches!(item.kind, Kind::Object(ref f) if f.len() == 2)),
            other => panic!("unexpected {other:?}"),
        }

        let primary = schema.get("primary").unwrap();
        assert!(!primary.is_required());
        assert_eq!(primary.type_name(), "object");
    }

    #[test]
    fn imports_hand_written_schema() {
        let doc = json!({
            "type": "object",
            "required": ["question"],
            "properties": {
                "question": {"type": "string", "description": "What to ask"},
                "lang": {"enum": ["en", "de"]},
                "context": {"type": ["string", "null"]}
            }
        });
        let schema = from_json_schema(&doc).unwrap();
        assert_eq!(schema.get("question").unwrap(), &FieldDescriptor::string().describe("What to ask"));
        assert_eq!(schema.get("lang").unwrap(), &FieldDescriptor::string().optional());
        assert_eq!(
            schema.get("context").unwrap(),
            &FieldDescriptor::string().nullable().optional()
        );
    }

    #[test]
    fn non_object_root_is_rejected() {
        let err = from_json_schema(&json!({"type": "string"})).unwrap_err();
        assert!(matches!(err, MnemosError::InvalidSchema(_)));
    }

    #[test]
    fn real_unions_are_rejected() {
        let doc = json!({
            "type": "object",
            "required": ["v"],
            "properties": {"v": {"anyOf": [{"type": "string"}, {"type": "number"}]}}
        });
        assert!(matches!(from_json_schema(&doc), Err(MnemosError::InvalidSchema(_))));
    }

    #[test]
    fn recursive_refs_are_rejected() {
        let doc = json!({
            "type": "object",
            "required": ["node"],
            "properties": {"node": {"$ref": "#/definitions/Node"}},
            "definitions": {
                "Node": {
                    "type": "object",
                    "required": ["next"],
                    "properties": {"next": {"$ref": "#/definitions/Node"}}
                }
            }
        });
        assert!(matches!(from_json_schema(&doc), Err(MnemosError::InvalidSchema(_))));
    }
}

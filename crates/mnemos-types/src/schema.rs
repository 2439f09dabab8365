//! Structured type descriptors.
//!
//! A [`RecordSchema`] is an ordered list of named [`Field`]s, each carrying a
//! [`FieldDescriptor`]: a [`Kind`] from a closed set plus an optional
//! human-readable description.  The kind set is deliberately small:
//!
//! | Kind | Children | Relational column |
//! |---|---|---|
//! | `String` | – | `TEXT` |
//! | `Number` | – | `NUMERIC` |
//! | `Boolean` | – | `INTEGER` |
//! | `Array` | element descriptor | `<field>_json TEXT` |
//! | `Object` | named fields | `<field>_json TEXT` |
//! | `Optional` | wrapped descriptor | nullable, name of the wrapped kind |
//! | `Nullable` | wrapped descriptor | nullable, name of the wrapped kind |
//!
//! # Example
//!
//! ```rust
//! use mnemos_types::{FieldDescriptor, RecordSchema};
//!
//! let output = RecordSchema::new()
//!     .field("answer", FieldDescriptor::string().describe("The final answer"))
//!     .field("tags", FieldDescriptor::array(FieldDescriptor::string()));
//!
//! assert_eq!(output.len(), 2);
//! assert!(output.get("tags").unwrap().is_composite());
//! ```

use serde::{Deserialize, Serialize};

// ─────────────────────────────────────────────────────────────────────────────
// Kind / FieldDescriptor
// ─────────────────────────────────────────────────────────────────────────────

/// The closed set of descriptor kinds.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Kind {
    String,
    Number,
    Boolean,
    /// Homogeneous list of elements described by the boxed descriptor.
    Array(Box<FieldDescriptor>),
    /// Nested object with its own ordered fields.
    Object(Vec<Field>),
    /// The field may be absent.
    Optional(Box<FieldDescriptor>),
    /// The field may be present with a `null` value.
    Nullable(Box<FieldDescriptor>),
}

/// A kind plus the description text shown to the text generator.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FieldDescriptor {
    pub kind: Kind,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

impl FieldDescriptor {
    pub fn new(kind: Kind) -> Self {
        Self {
            kind,
            description: None,
        }
    }

    pub fn string() -> Self {
        Self::new(Kind::String)
    }

    pub fn number() -> Self {
        Self::new(Kind::Number)
    }

    pub fn boolean() -> Self {
        Self::new(Kind::Boolean)
    }

    pub fn array(item: FieldDescriptor) -> Self {
        Self::new(Kind::Array(Box::new(item)))
    }

    pub fn object(fields: Vec<Field>) -> Self {
        Self::new(Kind::Object(fields))
    }

    /// Wrap `self` so the field may be omitted.
    pub fn optional(self) -> Self {
        Self::new(Kind::Optional(Box::new(self)))
    }

    /// Wrap `self` so the field may hold `null`.
    pub fn nullable(self) -> Self {
        Self::new(Kind::Nullable(Box::new(self)))
    }

    /// Attach a description, replacing any previous one.
    pub fn describe(mut self, text: impl Into<String>) -> Self {
        self.description = Some(text.into());
        self
    }

    /// Peel every `Optional` / `Nullable` wrapper and return the underlying
    /// descriptor.
    pub fn base(&self) -> &FieldDescriptor {
        match &self.kind {
            Kind::Optional(inner) | Kind::Nullable(inner) => inner.base(),
            _ => self,
        }
    }

    /// `true` when the underlying kind is `Array` or `Object`.
    pub fn is_composite(&self) -> bool {
        matches!(self.base().kind, Kind::Array(_) | Kind::Object(_))
    }

    /// `false` only when the outermost wrapper is `Optional`.
    pub fn is_required(&self) -> bool {
        !matches!(self.kind, Kind::Optional(_))
    }

    /// `true` when any wrapper on the way to the base kind admits `null`.
    pub fn is_nullable(&self) -> bool {
        match &self.kind {
            Kind::Nullable(_) => true,
            Kind::Optional(inner) => inner.is_nullable(),
            _ => false,
        }
    }

    /// Lower-case name of the underlying kind (`"string"`, `"array"`, …).
    pub fn type_name(&self) -> &'static str {
        match &self.base().kind {
            Kind::String => "string",
            Kind::Number => "number",
            Kind::Boolean => "boolean",
            Kind::Array(_) => "array",
            Kind::Object(_) => "object",
            Kind::Optional(_) | Kind::Nullable(_) => unreachable!("base() peels wrappers"),
        }
    }

    /// The first description found walking inward through wrappers.
    pub fn effective_description(&self) -> Option<&str> {
        if let Some(d) = self.description.as_deref() {
            return Some(d);
        }
        match &self.kind {
            Kind::Optional(inner) | Kind::Nullable(inner) => inner.effective_description(),
            _ => None,
        }
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Field / RecordSchema
// ─────────────────────────────────────────────────────────────────────────────

/// A named descriptor inside an object or a record schema.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Field {
    pub name: String,
    #[serde(flatten)]
    pub descriptor: FieldDescriptor,
}

impl Field {
    pub fn new(name: impl Into<String>, descriptor: FieldDescriptor) -> Self {
        Self {
            name: name.into(),
            descriptor,
        }
    }
}

/// Ordered mapping of field name → [`FieldDescriptor`] for one side (input or
/// output) of an agent.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RecordSchema {
    pub fields: Vec<Field>,
}

impl RecordSchema {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_fields(fields: Vec<Field>) -> Self {
        Self { fields }
    }

    /// Append a field (builder style).  A field with the same name replaces
    /// the earlier declaration in place.
    pub fn field(mut self, name: impl Into<String>, descriptor: FieldDescriptor) -> Self {
        let name = name.into();
        match self.fields.iter_mut().find(|f| f.name == name) {
            Some(existing) => existing.descriptor = descriptor,
            None => self.fields.push(Field::new(name, descriptor)),
        }
        self
    }

    pub fn get(&self, name: &str) -> Option<&FieldDescriptor> {
        self.fields
            .iter()
            .find(|f| f.name == name)
            .map(|f| &f.descriptor)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.get(name).is_some()
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.fields.iter().map(|f| f.name.as_str())
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Field> {
        self.fields.iter()
    }

    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }
}

impl<'a> IntoIterator for &'a RecordSchema {
    type Item = &'a Field;
    type IntoIter = std::slice::Iter<'a, Field>;

    fn into_iter(self) -> Self::IntoIter {
        self.fields.iter()
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn base_peels_all_wrappers() {
        let d = FieldDescriptor::number().nullable().optional();
        assert_eq!(d.base().kind, Kind::Number);
        assert!(!d.is_required());
        assert!(d.is_nullable());
        assert_eq!(d.type_name(), "number");
    }

    #[test]
    fn composite_detection_sees_through_wrappers() {
        let d = FieldDescriptor::array(FieldDescriptor::string()).optional();
        assert!(d.is_composite());
        assert!(!FieldDescriptor::boolean().nullable().is_composite());
    }

    #[test]
    fn effective_description_walks_inward() {
        let d = FieldDescriptor::string().describe("inner").optional();
        assert_eq!(d.effective_description(), Some("inner"));
        let outer = FieldDescriptor::string().describe("inner").optional().describe("outer");
        assert_eq!(outer.effective_description(), Some("outer"));
    }

    #[test]
    fn builder_replaces_duplicate_field_in_place() {
        let s = RecordSchema::new()
            .field("a", FieldDescriptor::string())
            .field("b", FieldDescriptor::number())
            .field("a", FieldDescriptor::boolean());
        assert_eq!(s.names().collect::<Vec<_>>(), vec!["a", "b"]);
        assert_eq!(s.get("a").unwrap().kind, Kind::Boolean);
    }

    #[test]
    fn schema_serde_roundtrip() {
        let s = RecordSchema::new()
            .field("question", FieldDescriptor::string().describe("asked"))
            .field(
                "meta",
                FieldDescriptor::object(vec![Field::new("n", FieldDescriptor::number())])
                    .optional(),
            );
        let json = serde_json::to_string(&s).unwrap();
        assert!(json.contains("\"name\":\"question\""));
        let back: RecordSchema = serde_json::from_str(&json).unwrap();
        assert_eq!(back, s);
    }
}

//! Schema Compiler.
//!
//! [`compile`] is a pure function from a [`RecordSchema`] to a
//! [`CompiledSchema`] holding three projections:
//!
//! 1. **Relational** – one [`ColumnSpec`] per top-level field.  Scalars map to
//!    typed columns (`string → TEXT`, `number → NUMERIC`,
//!    `boolean → INTEGER`); arrays and objects map to a single `TEXT` column
//!    named `<field>_json`.  `Optional` / `Nullable` only relax nullability.
//! 2. **Encoding** – a [`Shape`] tree telling the markup encoder which tag to
//!    open for every field, where arrays repeat `<item>`, and where scalars
//!    become text content.
//! 3. **Decoding** – a [`Grammar`]: the same tag tree plus the decoder's
//!    root-level switches (currently the `think` splice rule).
//!
//! The compiler rejects schemas whose projections would be ambiguous: two
//! fields mapping to the same column, two sibling fields sanitizing to the
//! same tag, empty field names, or a top-level field named `id` (the join
//! key column).

use std::collections::HashSet;

use mnemos_types::{FieldDescriptor, Kind, MnemosError, RecordSchema, Result};

use crate::mapper::column_name;

/// Name of the join-key column present in every record table.
pub const ID_COLUMN: &str = "id";

/// Field name that activates the think-splice rule when declared at the top
/// level of the schema under decode.
pub const THINK_FIELD: &str = "think";

/// Tag wrapping each element of an encoded array.
pub const ITEM_TAG: &str = "item";

// ─────────────────────────────────────────────────────────────────────────────
// Relational projection
// ─────────────────────────────────────────────────────────────────────────────

/// Storage class of a relational column.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SqlType {
    Text,
    Numeric,
    Integer,
}

impl SqlType {
    pub fn as_sql(self) -> &'static str {
        match self {
            SqlType::Text => "TEXT",
            SqlType::Numeric => "NUMERIC",
            SqlType::Integer => "INTEGER",
        }
    }
}

/// One relational column derived from one top-level field.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ColumnSpec {
    /// Schema field the column stores.
    pub field: String,
    /// Column name: the field name, or `<field>_json` for composites.
    pub name: String,
    pub sql_type: SqlType,
    pub nullable: bool,
    pub composite: bool,
}

impl ColumnSpec {
    /// Column definition fragment for `CREATE TABLE`, with the name quoted.
    pub fn definition(&self) -> String {
        let null = if self.nullable { "" } else { " NOT NULL" };
        format!("{} {}{}", quote_ident(&self.name), self.sql_type.as_sql(), null)
    }
}

/// Quote an SQL identifier, doubling embedded quotes.
pub fn quote_ident(name: &str) -> String {
    format!("\"{}\"", name.replace('"', "\"\""))
}

// ─────────────────────────────────────────────────────────────────────────────
// Markup projections
// ─────────────────────────────────────────────────────────────────────────────

/// How a value of one descriptor is rendered to, and parsed from, markup.
#[derive(Debug, Clone, PartialEq)]
pub enum Shape {
    Text,
    Number,
    Boolean,
    /// Wrapper tag holding one `<item>` per element.
    List(Box<Shape>),
    /// One nested tag per declared field.
    Record(Vec<Slot>),
    Optional(Box<Shape>),
    Nullable(Box<Shape>),
}

impl Shape {
    /// Peel `Optional` / `Nullable` wrappers.
    pub fn base(&self) -> &Shape {
        match self {
            Shape::Optional(inner) | Shape::Nullable(inner) => inner.base(),
            other => other,
        }
    }

    pub fn is_optional(&self) -> bool {
        matches!(self, Shape::Optional(_))
    }

    pub fn admits_null(&self) -> bool {
        match self {
            Shape::Nullable(_) => true,
            Shape::Optional(inner) => inner.admits_null(),
            _ => false,
        }
    }
}

/// A field of a [`Shape::Record`]: the field name and its sanitized tag.
#[derive(Debug, Clone, PartialEq)]
pub struct Slot {
    pub field: String,
    pub tag: String,
    pub shape: Shape,
}

impl Slot {
    pub fn find<'a>(slots: &'a [Slot], tag: &str) -> Option<&'a Slot> {
        slots.iter().find(|s| s.tag == tag)
    }
}

/// Root decoding grammar for one record schema.
#[derive(Debug, Clone, PartialEq)]
pub struct Grammar {
    pub root: Vec<Slot>,
    /// The schema declares a top-level `think` field, so a reasoning block
    /// emitted outside the wrapper is spliced back in before parsing.
    pub splice_think: bool,
}

// ─────────────────────────────────────────────────────────────────────────────
// CompiledSchema
// ─────────────────────────────────────────────────────────────────────────────

/// The three projections of one [`RecordSchema`], plus the schema itself.
#[derive(Debug, Clone, PartialEq)]
pub struct CompiledSchema {
    pub schema: RecordSchema,
    pub columns: Vec<ColumnSpec>,
    pub encoding: Vec<Slot>,
    pub decoding: Grammar,
}

impl CompiledSchema {
    pub fn column(&self, field: &str) -> Option<&ColumnSpec> {
        self.columns.iter().find(|c| c.field == field)
    }

    /// Column names in declaration order.
    pub fn column_names(&self) -> impl Iterator<Item = &str> {
        self.columns.iter().map(|c| c.name.as_str())
    }
}

/// Compile `schema` into its relational, encoding and decoding projections.
///
/// # Errors
///
/// [`MnemosError::InvalidSchema`] for empty field names, a top-level field
/// named `id`, column-name collisions, or sibling tag collisions.
pub fn compile(schema: &RecordSchema) -> Result<CompiledSchema> {
    let mut columns = Vec::with_capacity(schema.len());
    let mut seen_columns: HashSet<String> = HashSet::new();
    seen_columns.insert(ID_COLUMN.to_string());

    for field in schema {
        if field.name == ID_COLUMN {
            return Err(MnemosError::InvalidSchema(format!(
                "field name '{ID_COLUMN}' is reserved for the record id"
            )));
        }
        let spec = column_spec(&field.name, &field.descriptor);
        if !seen_columns.insert(spec.name.clone()) {
            return Err(MnemosError::InvalidSchema(format!(
                "field '{}' maps to column '{}' which is already taken",
                field.name, spec.name
            )));
        }
        columns.push(spec);
    }

    let encoding = slots(&schema.fields, "")?;
    let decoding = Grammar {
        root: encoding.clone(),
        splice_think: schema.contains(THINK_FIELD),
    };

    Ok(CompiledSchema {
        schema: schema.clone(),
        columns,
        encoding,
        decoding,
    })
}

fn column_spec(field: &str, descriptor: &FieldDescriptor) -> ColumnSpec {
    let composite = descriptor.is_composite();
    let sql_type = match descriptor.base().kind {
        Kind::String | Kind::Array(_) | Kind::Object(_) => SqlType::Text,
        Kind::Number => SqlType::Numeric,
        Kind::Boolean => SqlType::Integer,
        Kind::Optional(_) | Kind::Nullable(_) => unreachable!("base() peels wrappers"),
    };
    ColumnSpec {
        field: field.to_string(),
        name: column_name(field, descriptor),
        sql_type,
        nullable: !descriptor.is_required() || descriptor.is_nullable(),
        composite,
    }
}

fn slots(fields: &[mnemos_types::Field], path: &str) -> Result<Vec<Slot>> {
    let mut seen_tags = HashSet::new();
    let mut out = Vec::with_capacity(fields.len());
    for field in fields {
        let field_path = if path.is_empty() {
            field.name.clone()
        } else {
            format!("{path}.{}", field.name)
        };
        if field.name.is_empty() {
            return Err(MnemosError::InvalidSchema(format!(
                "empty field name under '{path}'"
            )));
        }
        let tag = sanitize_tag(&field.name);
        if !seen_tags.insert(tag.clone()) {
            return Err(MnemosError::InvalidSchema(format!(
                "field '{field_path}' sanitizes to tag <{tag}> which collides with a sibling"
            )));
        }
        out.push(Slot {
            field: field.name.clone(),
            tag,
            shape: shape(&field.descriptor, &field_path)?,
        });
    }
    Ok(out)
}

fn shape(descriptor: &FieldDescriptor, path: &str) -> Result<Shape> {
    Ok(match &descriptor.kind {
        Kind::String => Shape::Text,
        Kind::Number => Shape::Number,
        Kind::Boolean => Shape::Boolean,
        Kind::Array(item) => Shape::List(Box::new(shape(item, &format!("{path}[]"))?)),
        Kind::Object(fields) => Shape::Record(slots(fields, path)?),
        Kind::Optional(inner) => Shape::Optional(Box::new(shape(inner, path)?)),
        Kind::Nullable(inner) => Shape::Nullable(Box::new(shape(inner, path)?)),
    })
}

/// Map a field name onto the tag alphabet `[A-Za-z0-9_]`.
///
/// Every other character becomes `_`; a leading digit (or an empty name) is
/// prefixed with `_`.
pub fn sanitize_tag(name: &str) -> String {
    let mut tag: String = name
        .chars()
        .map(|c| if c.is_ascii_alphanumeric() || c == '_' { c } else { '_' })
        .collect();
    if tag.chars().next().is_none_or(|c| c.is_ascii_digit()) {
        tag.insert(0, '_');
    }
    tag
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────

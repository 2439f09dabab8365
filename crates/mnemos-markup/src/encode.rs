//! Markup encoders.
//!
//! Two renderings share the same tag layout:
//!
//! * [`encode`] renders a **value**: one tag per present field, arrays as a
//!   wrapper tag of repeated `<item>` tags, scalars as escaped text, `null`
//!   as a self-closing tag.  Absent optional fields are omitted.
//! * [`describe`] renders a **schema**: one tag per declared field carrying
//!   `<description>`, `<required>`, `<type>` and, recursively, `<fields>` for
//!   objects and `<items>` for arrays.  This is what a generator is shown so
//!   it can answer in the expected shape.
//!
//! Output is indented two spaces per level.  Indentation is insignificant on
//! decode because scalar content is trimmed.

use mnemos_schema::{CompiledSchema, ITEM_TAG, Shape, Slot, sanitize_tag};
use mnemos_types::{Field, FieldDescriptor, Fields, Kind, RecordSchema};
use serde_json::Value;

use crate::WRAPPER_TAG;
use crate::escape::escape;

// ─────────────────────────────────────────────────────────────────────────────
// Values
// ─────────────────────────────────────────────────────────────────────────────

/// Encode `record` inside the protocol wrapper tag.
pub fn encode(record: &Fields, compiled: &CompiledSchema) -> String {
    encode_as(WRAPPER_TAG, record, compiled)
}

/// Encode `record` inside an arbitrary wrapper tag (e.g. `<input>`).
pub fn encode_as(wrapper: &str, record: &Fields, compiled: &CompiledSchema) -> String {
    let mut out = String::new();
    out.push_str(&format!("<{wrapper}>\n"));
    write_slots(&mut out, &compiled.encoding, record, 1);
    out.push_str(&format!("</{wrapper}>"));
    out
}

fn indent(out: &mut String, depth: usize) {
    for _ in 0..depth {
        out.push_str("  ");
    }
}

fn write_slots(out: &mut String, slots: &[Slot], record: &Fields, depth: usize) {
    for slot in slots {
        if let Some(value) = record.get(&slot.field) {
            write_tagged(out, &slot.tag, &slot.shape, value, depth);
        }
    }
}

fn write_tagged(out: &mut String, tag: &str, shape: &Shape, value: &Value, depth: usize) {
    indent(out, depth);
    if value.is_null() {
        out.push_str(&format!("<{tag}/>\n"));
        return;
    }
    match (shape.base(), value) {
        (Shape::List(item), Value::Array(items)) => {
            out.push_str(&format!("<{tag}>\n"));
            for element in items {
                write_tagged(out, ITEM_TAG, item, element, depth + 1);
            }
            indent(out, depth);
            out.push_str(&format!("</{tag}>\n"));
        }
        (Shape::Record(slots), Value::Object(map)) => {
            out.push_str(&format!("<{tag}>\n"));
            write_slots(out, slots, map, depth + 1);
            indent(out, depth);
            out.push_str(&format!("</{tag}>\n"));
        }
        (_, scalar) => {
            out.push_str(&format!("<{tag}>{}</{tag}>\n", scalar_text(scalar)));
        }
    }
}

fn scalar_text(value: &Value) -> String {
    match value {
        Value::String(s) => escape(s),
        Value::Number(n) => n.to_string(),
        Value::Bool(b) => b.to_string(),
        Value::Null => String::new(),
        composite => escape(&composite.to_string()),
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Schema descriptions
// ─────────────────────────────────────────────────────────────────────────────

/// Describe `schema` inside the protocol wrapper tag.
pub fn describe(schema: &RecordSchema) -> String {
    let mut out = String::new();
    out.push_str(&format!("<{WRAPPER_TAG}>\n"));
    describe_fields(&mut out, &schema.fields, 1);
    out.push_str(&format!("</{WRAPPER_TAG}>"));
    out
}

fn describe_fields(out: &mut String, fields: &[Field], depth: usize) {
    for field in fields {
        let tag = sanitize_tag(&field.name);
        indent(out, depth);
        out.push_str(&format!("<{tag}>\n"));
        describe_descriptor(out, &field.descriptor, field.descriptor.is_required(), depth + 1);
        indent(out, depth);
        out.push_str(&format!("</{tag}>\n"));
    }
}

fn describe_descriptor(out: &mut String, descriptor: &FieldDescriptor, required: bool, depth: usize) {
    indent(out, depth);
    match descriptor.effective_description() {
        Some(text) => out.push_str(&format!("<description>{}</description>\n", escape(text))),
        None => out.push_str("<description/>\n"),
    }
    indent(out, depth);
    out.push_str(&format!("<required>{required}</required>\n"));
    indent(out, depth);
    out.push_str(&format!("<type>{}</type>\n", descriptor.type_name()));
    if descriptor.is_nullable() {
        indent(out, depth);
        out.push_str("<nullable>true</nullable>\n");
    }
    match &descriptor.base().kind {
        Kind::Array(item) => {
            indent(out, depth);
            out.push_str("<items>\n");
            describe_descriptor(out, item, true, depth + 1);
            indent(out, depth);
            out.push_str("</items>\n");
        }
        Kind::Object(fields) => {
            indent(out, depth);
            out.push_str("<fields>\n");
            describe_fields(out, fields, depth + 1);
            indent(out, depth);
            out.push_str("</fields>\n");
        }
        _ => {}
    }
}

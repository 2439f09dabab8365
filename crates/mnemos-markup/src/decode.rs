//! Markup decoder.
//!
//! Decoding a generator reply runs four steps:
//!
//! 1. **Locate** the wrapper: count only `<output>` tags so an echoed copy
//!    nested inside the real block cannot end it early, and take the last of
//!    the outermost matches so an earlier spurious block is skipped.
//! 2. **Splice** an external `<think>…</think>` block into the span when the
//!    schema declares a top-level `think` field and the span has none.
//! 3. **Parse** the span into an element tree and walk it against the
//!    compiled [`Grammar`], coercing scalar text into typed values.
//! 4. **Validate** the reconstructed record against the schema.

use std::borrow::Cow;

use mnemos_schema::{CompiledSchema, Grammar, ITEM_TAG, Shape, Slot, THINK_FIELD, canonical_number, validate};
use mnemos_types::{Fields, MnemosError, Result};
use serde_json::Value;
use tracing::debug;

use crate::WRAPPER_TAG;
use crate::escape::unescape;
use crate::tree::{Element, Pair, Tag, TagKind, last_outermost, lex, pairs, parse};

/// Decode the wrapped record in `text` against `compiled`.
///
/// # Errors
///
/// * [`MnemosError::WrapperNotFound`] – no balanced wrapper tag.
/// * [`MnemosError::TypeCoercion`] – a number field holds no parseable
///   finite number.
/// * [`MnemosError::Validation`] – the reconstructed record does not conform;
///   the report lists every failing path.
pub fn decode(text: &str, compiled: &CompiledSchema) -> Result<Fields> {
    let span = locate(text, &compiled.decoding)?;
    let roots = parse(&span);
    let raw = decode_slots(&compiled.decoding.root, &roots, &span, "")?;
    validate(&compiled.schema, &raw)
}

/// Decode the wrapped block of `text` without a schema, using only the shape
/// heuristic.  Handy for inspecting a reply that failed [`decode`].
pub fn decode_loose(text: &str) -> Result<Fields> {
    let tags = lex(text);
    let pair = wrapper(&tags)?;
    let span = &text[pair.inner.clone()];
    let mut out = Fields::new();
    for element in parse(span) {
        out.entry(element.name.to_string())
            .or_insert_with(|| heuristic(&element, span));
    }
    Ok(out)
}

// ─────────────────────────────────────────────────────────────────────────────
// Locate + splice
// ─────────────────────────────────────────────────────────────────────────────

fn wrapper(tags: &[Tag<'_>]) -> Result<Pair> {
    last_outermost(&pairs(tags, WRAPPER_TAG))
        .cloned()
        .ok_or_else(|| MnemosError::WrapperNotFound(WRAPPER_TAG.to_string()))
}

fn locate<'t>(text: &'t str, grammar: &Grammar) -> Result<Cow<'t, str>> {
    let tags = lex(text);
    let pair = wrapper(&tags)?;
    let span = &text[pair.inner.clone()];
    if !grammar.splice_think {
        return Ok(Cow::Borrowed(span));
    }

    let inside = |t: &Tag<'_>| t.start >= pair.inner.start && t.end <= pair.inner.end;
    let has_think = tags
        .iter()
        .any(|t| t.name == THINK_FIELD && t.kind != TagKind::Close && inside(t));
    if has_think {
        return Ok(Cow::Borrowed(span));
    }

    // Only a standalone block qualifies: one inside any wrapper occurrence,
    // including an earlier echoed one, belongs to that wrapper.
    let wrappers = pairs(&tags, WRAPPER_TAG);
    let within = |p: &Pair, w: &Pair| p.outer.start >= w.outer.start && p.outer.end <= w.outer.end;
    let outside = pairs(&tags, THINK_FIELD)
        .into_iter()
        .find(|p| p.depth == 0 && !wrappers.iter().any(|w| within(p, w)));
    match outside {
        Some(think) => {
            debug!(bytes = think.inner.len(), "splicing external think block into wrapper");
            Ok(Cow::Owned(format!(
                "{span}<{THINK_FIELD}>{}</{THINK_FIELD}>",
                &text[think.inner]
            )))
        }
        None => Ok(Cow::Borrowed(span)),
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Typed walk
// ─────────────────────────────────────────────────────────────────────────────

fn join(path: &str, field: &str) -> String {
    if path.is_empty() {
        field.to_string()
    } else {
        format!("{path}.{field}")
    }
}

fn decode_slots(slots: &[Slot], children: &[Element<'_>], src: &str, path: &str) -> Result<Fields> {
    let mut out = Fields::new();
    for slot in slots {
        let field_path = join(path, &slot.field);
        match children.iter().find(|c| c.name == slot.tag) {
            None => {
                if slot.shape.admits_null() && !slot.shape.is_optional() {
                    out.insert(slot.field.clone(), Value::Null);
                }
            }
            Some(element) => {
                if let Some(value) = decode_element(&slot.shape, element, src, &field_path)? {
                    out.insert(slot.field.clone(), value);
                }
            }
        }
    }
    // Tags no slot claims; validation drops them again, but nested objects
    // keep their shape until then.
    for child in children {
        if Slot::find(slots, child.name).is_none() {
            out.entry(child.name.to_string())
                .or_insert_with(|| heuristic(child, src));
        }
    }
    Ok(out)
}

/// `None` when the element stands for an absent optional value.
fn decode_element(shape: &Shape, element: &Element<'_>, src: &str, path: &str) -> Result<Option<Value>> {
    if element.self_closing {
        if shape.admits_null() {
            return Ok(Some(Value::Null));
        }
        if shape.is_optional() {
            return Ok(None);
        }
    }
    decode_value(shape, element, src, path).map(Some)
}

fn decode_value(shape: &Shape, element: &Element<'_>, src: &str, path: &str) -> Result<Value> {
    match shape {
        Shape::Optional(inner) | Shape::Nullable(inner) => decode_value(inner, element, src, path),
        Shape::Text => Ok(Value::String(unescape(element.raw(src).trim()))),
        Shape::Number => coerce_number(element.raw(src), path),
        Shape::Boolean => Ok(Value::Bool(element.raw(src).trim().eq_ignore_ascii_case("true"))),
        Shape::List(item) => {
            let items: Vec<&Element<'_>> = element.children_named(ITEM_TAG).collect();
            if items.is_empty() {
                if element.raw(src).trim().is_empty() {
                    return Ok(Value::Array(Vec::new()));
                }
                // The whole span is the only element.
                let single = decode_element(item, element, src, &format!("{path}[0]"))?;
                return Ok(Value::Array(single.into_iter().collect()));
            }
            let mut values = Vec::with_capacity(items.len());
            for (i, el) in items.into_iter().enumerate() {
                if let Some(v) = decode_element(item, el, src, &format!("{path}[{i}]"))? {
                    values.push(v);
                }
            }
            Ok(Value::Array(values))
        }
        Shape::Record(slots) => Ok(Value::Object(decode_slots(slots, &element.children, src, path)?)),
    }
}

/// Shape guess for a tag no schema field claims: `<item>` children make an
/// array of strings, any other children make an object, otherwise a string.
fn heuristic(element: &Element<'_>, src: &str) -> Value {
    if element.self_closing {
        return Value::Null;
    }
    if element.child(ITEM_TAG).is_some() {
        return Value::Array(
            element
                .children_named(ITEM_TAG)
                .map(|item| Value::String(unescape(item.raw(src).trim())))
                .collect(),
        );
    }
    if !element.children.is_empty() {
        let mut map = Fields::new();
        for child in &element.children {
            map.entry(child.name.to_string())
                .or_insert_with(|| heuristic(child, src));
        }
        return Value::Object(map);
    }
    Value::String(unescape(element.raw(src).trim()))
}

// ─────────────────────────────────────────────────────────────────────────────
// Scalar coercion
// ─────────────────────────────────────────────────────────────────────────────

fn coerce_number(raw: &str, path: &str) -> Result<Value> {
    let text = unescape(raw.trim());
    numeric_chars(&text)
        .parse::<f64>()
        .ok()
        .and_then(canonical_number)
        .map(Value::Number)
        .ok_or_else(|| MnemosError::TypeCoercion {
            path: path.to_string(),
            value: text.clone(),
            kind: "number".to_string(),
        })
}

/// Keep digits, signs, decimal points, and an exponent marker that sits
/// between a digit and a digit or sign.  Everything else is stripped.
fn numeric_chars(text: &str) -> String {
    let chars: Vec<char> = text.chars().collect();
    chars
        .iter()
        .enumerate()
        .filter(|&(i, &c)| match c {
            '0'..='9' | '.' | '-' | '+' => true,
            'e' | 'E' => {
                let before = i.checked_sub(1).and_then(|j| chars.get(j));
                let after = chars.get(i + 1);
                before.is_some_and(char::is_ascii_digit)
                    && after.is_some_and(|a| a.is_ascii_digit() || *a == '-' || *a == '+')
            }
            _ => false,
        })
        .map(|(_, c)| *c)
        .collect()
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────

//! `mnemos-schema` – the Schema Compiler and the Relational Mapper.
//!
//! Turns a [`RecordSchema`][mnemos_types::RecordSchema] into everything the
//! rest of the system needs to know about it, without doing any I/O.
//!
//! # Modules
//!
//! - [`compile`] – [`compile`][compile::compile]: the three deterministic
//!   projections of a schema (relational columns, markup encoding shape,
//!   markup decoding grammar) bundled as a
//!   [`CompiledSchema`][compile::CompiledSchema].
//! - [`validate`] – structural validation of [`Fields`][mnemos_types::Fields]
//!   against a schema, reporting every failing path at once, plus number
//!   canonicalization.
//! - [`compare`] – order-insensitive structural comparison used when an
//!   existing agent is reopened.
//! - [`mapper`] – [`flatten`][mapper::flatten] / [`unflatten`][mapper::unflatten]
//!   between typed records and column-oriented [`FlatRow`][mnemos_types::FlatRow]s.
//! - [`json_schema`] – import a descriptor tree from a JSON Schema document or
//!   from any `schemars::JsonSchema` type.

pub mod compare;
pub mod compile;
pub mod json_schema;
pub mod mapper;
pub mod validate;

pub use compare::{structural_diff, structurally_equal};
pub use compile::{
    ColumnSpec, CompiledSchema, Grammar, ID_COLUMN, ITEM_TAG, Shape, Slot, SqlType, THINK_FIELD,
    compile, quote_ident, sanitize_tag,
};
pub use json_schema::{from_json_schema, schema_of};
pub use mapper::{JSON_SUFFIX, column_name, flatten, unflatten};
pub use validate::{canonical_number, validate, validate_partial, validate_value};

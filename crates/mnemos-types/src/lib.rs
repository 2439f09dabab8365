//! `mnemos-types` – shared vocabulary of the mnemos workspace.
//!
//! Every other crate speaks in these types: the structured type descriptors
//! an agent is declared with, the records that flow through the store, the
//! column-oriented rows they are flattened into, and the single error enum
//! surfaced by every operation.
//!
//! # Modules
//!
//! - [`schema`] – [`Kind`], [`FieldDescriptor`], [`Field`] and
//!   [`RecordSchema`]: the closed descriptor tree an agent's input and output
//!   sides are declared with.
//! - [`record`] – [`Record`], [`FlatRow`], [`ColumnValue`],
//!   [`EmbeddingPair`], plus the validated identifiers [`AgentName`] and
//!   [`RecordId`].
//! - [`deadline`] – [`Deadline`]: an explicit time budget threaded through
//!   every provider call.
//! - [`error`] – [`MnemosError`] and the per-field [`ValidationReport`].

pub mod deadline;
pub mod error;
pub mod record;
pub mod schema;

pub use deadline::Deadline;
pub use error::{MnemosError, Result, ValidationIssue, ValidationReport};
pub use record::{
    AgentName, ColumnValue, EmbeddingPair, Fields, FlatRow, Record, RecordId, Side,
};
pub use schema::{Field, FieldDescriptor, Kind, RecordSchema};

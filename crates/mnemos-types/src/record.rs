//! Records, flattened rows, and validated identifiers.

use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::MnemosError;

/// Field values of one side of a record, keyed by field name.
pub type Fields = serde_json::Map<String, serde_json::Value>;

// ─────────────────────────────────────────────────────────────────────────────
// AgentName
// ─────────────────────────────────────────────────────────────────────────────

/// Maximum length of an agent name.
pub const MAX_AGENT_NAME_LEN: usize = 64;

const RESERVED_PREFIX: &str = "sqlite_";

/// A validated agent identifier: `[A-Za-z_][A-Za-z0-9_]*`, at most
/// [`MAX_AGENT_NAME_LEN`] bytes, not starting with SQLite's reserved
/// `sqlite_` prefix (in any case).
///
/// The name doubles as the vector-index partition key and as the prefix of
/// the agent's two relational tables, so it must be safe to splice into SQL.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct AgentName(String);

impl AgentName {
    pub fn parse(raw: impl Into<String>) -> Result<Self, MnemosError> {
        let raw = raw.into();
        let mut chars = raw.chars();
        let head_ok = chars
            .next()
            .is_some_and(|c| c.is_ascii_alphabetic() || c == '_');
        let tail_ok = chars.all(|c| c.is_ascii_alphanumeric() || c == '_');
        let reserved = raw
            .get(..RESERVED_PREFIX.len())
            .is_some_and(|p| p.eq_ignore_ascii_case(RESERVED_PREFIX));
        if !head_ok || !tail_ok || reserved || raw.len() > MAX_AGENT_NAME_LEN {
            return Err(MnemosError::InvalidAgentName(raw));
        }
        Ok(Self(raw))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Name of the table holding this agent's input rows.
    pub fn input_table(&self) -> String {
        format!("{}_input", self.0)
    }

    /// Name of the table holding this agent's output rows.
    pub fn output_table(&self) -> String {
        format!("{}_output", self.0)
    }
}

impl TryFrom<String> for AgentName {
    type Error = MnemosError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::parse(value)
    }
}

impl From<AgentName> for String {
    fn from(value: AgentName) -> Self {
        value.0
    }
}

impl fmt::Display for AgentName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// RecordId
// ─────────────────────────────────────────────────────────────────────────────

/// Opaque short identifier shared by the input row, output row and vector
/// row of one interaction.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RecordId(String);

impl RecordId {
    /// Allocate a fresh random id (16 lowercase hex characters).
    pub fn generate() -> Self {
        let mut simple = Uuid::new_v4().simple().to_string();
        simple.truncate(16);
        Self(simple)
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<&str> for RecordId {
    fn from(value: &str) -> Self {
        Self(value.to_string())
    }
}

impl From<String> for RecordId {
    fn from(value: String) -> Self {
        Self(value)
    }
}

impl fmt::Display for RecordId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Side
// ─────────────────────────────────────────────────────────────────────────────

/// Which half of an interaction a value belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Side {
    Input,
    Output,
}

impl Side {
    pub fn as_str(self) -> &'static str {
        match self {
            Side::Input => "input",
            Side::Output => "output",
        }
    }
}

impl fmt::Display for Side {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Record
// ─────────────────────────────────────────────────────────────────────────────

/// One stored interaction: the shared id plus both validated sides.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Record {
    pub id: RecordId,
    pub input: Fields,
    pub output: Fields,
}

impl Record {
    pub fn side(&self, side: Side) -> &Fields {
        match side {
            Side::Input => &self.input,
            Side::Output => &self.output,
        }
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// FlatRow
// ─────────────────────────────────────────────────────────────────────────────

/// A scalar cell value as stored in a relational column.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ColumnValue {
    Null,
    Integer(i64),
    Real(f64),
    Text(String),
}

impl ColumnValue {
    pub fn is_null(&self) -> bool {
        matches!(self, ColumnValue::Null)
    }
}

/// Column name → cell value for one side of one record.
///
/// Composite fields live under `<field>_json` as canonical JSON text.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct FlatRow(BTreeMap<String, ColumnValue>);

impl FlatRow {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, column: impl Into<String>, value: ColumnValue) {
        self.0.insert(column.into(), value);
    }

    pub fn get(&self, column: &str) -> Option<&ColumnValue> {
        self.0.get(column)
    }

    pub fn columns(&self) -> impl Iterator<Item = &str> {
        self.0.keys().map(String::as_str)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &ColumnValue)> {
        self.0.iter().map(|(k, v)| (k.as_str(), v))
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl FromIterator<(String, ColumnValue)> for FlatRow {
    fn from_iter<T: IntoIterator<Item = (String, ColumnValue)>>(iter: T) -> Self {
        Self(iter.into_iter().collect())
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// EmbeddingPair
// ─────────────────────────────────────────────────────────────────────────────

/// The vector-index row of one reinforced interaction.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EmbeddingPair {
    pub id: RecordId,
    /// Partition key.
    pub agent: AgentName,
    pub input: Vec<f32>,
    pub output: Vec<f32>,
}

impl EmbeddingPair {
    pub fn side(&self, side: Side) -> &[f32] {
        match side {
            Side::Input => &self.input,
            Side::Output => &self.output,
        }
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    // ── AgentName ────────────────────────────────────────────────────────────

    #[test]
    fn agent_name_accepts_identifiers() {
        for ok in ["qa", "_hidden", "Agent_42", "sqlite"] {
            assert!(AgentName::parse(ok).is_ok(), "{ok} should be accepted");
        }
    }

    #[test]
    fn agent_name_rejects_unsafe_names() {
        let too_long = "a".repeat(65);
        for bad in ["", "1abc", "drop table", "a-b", "x;--", "sqlite_stat1", "SQLite_x", too_long.as_str()] {
            let err = AgentName::parse(bad).unwrap_err();
            assert!(matches!(err, MnemosError::InvalidAgentName(_)), "{bad}");
        }
    }

    #[test]
    fn agent_name_table_names() {
        let name = AgentName::parse("qa").unwrap();
        assert_eq!(name.input_table(), "qa_input");
        assert_eq!(name.output_table(), "qa_output");
    }

    #[test]
    fn agent_name_deserialize_validates() {
        let err = serde_json::from_str::<AgentName>("\"no spaces\"");
        assert!(err.is_err());
        let ok: AgentName = serde_json::from_str("\"fine\"").unwrap();
        assert_eq!(ok.as_str(), "fine");
    }

    // ── RecordId ─────────────────────────────────────────────────────────────

    #[test]
    fn record_ids_are_short_and_distinct() {
        let a = RecordId::generate();
        let b = RecordId::generate();
        assert_eq!(a.as_str().len(), 16);
        assert_ne!(a, b);
    }

    // ── FlatRow ──────────────────────────────────────────────────────────────

    #[test]
    fn flat_row_insert_and_get() {
        let mut row = FlatRow::new();
        row.insert("question", ColumnValue::Text("x".into()));
        row.insert("tags_json", ColumnValue::Text("[]".into()));
        assert_eq!(row.len(), 2);
        assert_eq!(row.get("question"), Some(&ColumnValue::Text("x".into())));
        assert!(row.get("missing").is_none());
    }
}

//! The workspace-wide error type.
//!
//! Every operation surfaces failures as a [`MnemosError`].  None of them are
//! retried automatically; the only local recovery in the system is the recall
//! engine dropping individually unreconstructible rows, and that is reported
//! through its result type rather than through this enum.

use std::fmt;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Convenience alias used across the workspace.
pub type Result<T, E = MnemosError> = std::result::Result<T, E>;

// ─────────────────────────────────────────────────────────────────────────────
// ValidationReport
// ─────────────────────────────────────────────────────────────────────────────

/// One failing field path and what was wrong with it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ValidationIssue {
    /// Dotted path from the record root, e.g. `meta.tags[2]`.  Empty for the
    /// root itself.
    pub path: String,
    pub message: String,
}

impl ValidationIssue {
    pub fn new(path: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            message: message.into(),
        }
    }
}

impl fmt::Display for ValidationIssue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.path.is_empty() {
            write!(f, "<root>: {}", self.message)
        } else {
            write!(f, "{}: {}", self.path, self.message)
        }
    }
}

/// Every issue found while validating one value, reported together.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ValidationReport {
    pub issues: Vec<ValidationIssue>,
}

impl ValidationReport {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, path: impl Into<String>, message: impl Into<String>) {
        self.issues.push(ValidationIssue::new(path, message));
    }

    pub fn is_empty(&self) -> bool {
        self.issues.is_empty()
    }

    pub fn len(&self) -> usize {
        self.issues.len()
    }

    /// `Ok(value)` when no issue was recorded, otherwise
    /// [`MnemosError::Validation`].
    pub fn into_result<T>(self, value: T) -> Result<T> {
        if self.is_empty() {
            Ok(value)
        } else {
            Err(MnemosError::Validation(self))
        }
    }
}

impl fmt::Display for ValidationReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, issue) in self.issues.iter().enumerate() {
            if i > 0 {
                f.write_str("; ")?;
            }
            write!(f, "{issue}")?;
        }
        Ok(())
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// MnemosError
// ─────────────────────────────────────────────────────────────────────────────

/// Terminal failure of a single mnemos operation.
///
/// Serializable so the remote-forwarding client can carry errors across the
/// wire unchanged.
#[derive(Error, Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum MnemosError {
    /// An existing agent was reopened with a structurally different schema.
    #[error("Schema mismatch for agent '{agent}': {detail}")]
    SchemaMismatch { agent: String, detail: String },

    /// A record (supplied or decoded) failed structural validation.
    #[error("Validation failed: {0}")]
    Validation(ValidationReport),

    /// Decode could not locate the protocol wrapper tag.
    #[error("Wrapper tag <{0}> not found in generated text")]
    WrapperNotFound(String),

    /// A scalar could not be converted to its declared kind.
    #[error("Cannot coerce {value:?} at '{path}' to {kind}")]
    TypeCoercion {
        path: String,
        value: String,
        kind: String,
    },

    /// An embedding or generation backend answered with a failure.
    #[error("Provider '{provider}' failed: {message}")]
    Provider { provider: String, message: String },

    #[error("Record not found: {0}")]
    RecordNotFound(String),

    /// Operation attempted in an unsupported local/remote combination.
    #[error("Operation '{operation}' is not available in {mode} mode")]
    InvalidMode { operation: String, mode: String },

    /// A descriptor cannot be compiled (column or tag collisions, unsupported
    /// JSON Schema constructs, …).
    #[error("Invalid schema: {0}")]
    InvalidSchema(String),

    #[error("Invalid agent name '{0}': expected [A-Za-z_][A-Za-z0-9_]*, at most 64 bytes, not starting with 'sqlite_'")]
    InvalidAgentName(String),

    /// Table names are case-insensitive, so a new agent may not differ from
    /// an existing one only by letter case.
    #[error("Agent name '{requested}' conflicts with existing agent '{existing}'")]
    AgentNameConflict { requested: String, existing: String },

    #[error("Agent not found: {0}")]
    AgentNotFound(String),

    /// Malformed request, e.g. recall with both or neither target.
    #[error("Invalid query: {0}")]
    InvalidQuery(String),

    #[error("Embedding dimension mismatch: expected {expected}, got {actual}")]
    DimensionMismatch { expected: usize, actual: usize },

    /// A provider call outlived the caller's deadline.
    #[error("Deadline exceeded while waiting for {0}")]
    DeadlineExceeded(String),

    #[error("Storage error: {0}")]
    Storage(String),

    #[error("Serialization error: {0}")]
    Serialization(String),
}

impl MnemosError {
    pub fn provider(provider: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Provider {
            provider: provider.into(),
            message: message.into(),
        }
    }

    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::RecordNotFound(_) | Self::AgentNotFound(_))
    }

    pub fn is_validation(&self) -> bool {
        matches!(self, Self::Validation(_))
    }
}

impl From<serde_json::Error> for MnemosError {
    fn from(e: serde_json::Error) -> Self {
        Self::Serialization(e.to_string())
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────

//! `mnemos-memory` – the Record Store and the Recall Engine.
//!
//! Persists validated interactions of named agents to a local SQLite
//! substrate and recalls them by semantic similarity.
//!
//! # Modules
//!
//! - [`db`] – [`Database`]: the single shared connection holding the agent
//!   registry, every agent's tables and the vector index.
//! - [`registry`] – [`CompiledAgent`] / [`Registry`]: persisted agent schemas
//!   and the in-process cache of their compiled form.
//! - [`rows`] – relational reads and writes of one agent's input and output
//!   tables.
//! - [`vector`] – the embedding index: BLOB encoding, cosine distance and
//!   per-agent nearest-neighbour search.
//! - [`embed`] – the [`Embedder`] seam and the offline [`HashEmbedder`].
//! - [`store`] – [`Memory`] / [`AgentMemory`]: `init`, `open`, `store`,
//!   `reinforce`, `edit`, `delete`, `find`, `erase`.
//! - [`recall`] – [`RecallQuery`] → [`RecallResult`].

pub mod db;
pub mod embed;
pub mod recall;
pub mod registry;
pub mod rows;
pub mod store;
pub mod vector;

pub use db::Database;
pub use embed::{DEFAULT_DIMENSIONS, Embedder, HashEmbedder, check_dimensions};
pub use recall::{RECALL_LIMIT, RecallMatch, RecallQuery, RecallResult};
pub use registry::{AgentInfo, CompiledAgent, Registry};
pub use store::{AgentMemory, Memory};

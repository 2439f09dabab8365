//! Record Store.
//!
//! [`Memory`] is the explicit store handle: a shared [`Database`], the
//! [`Embedder`] used for reinforcement and recall, and the per-process
//! [`Registry`] of compiled agents.  [`Memory::init`] / [`Memory::open`]
//! yield an [`AgentMemory`] bound to one agent, which carries the record
//! operations.
//!
//! Every operation that writes more than one row (`store`, `reinforce`,
//! `edit`, `delete`, `erase`) does so inside one SQLite transaction.
//! Embeddings are computed *before* the transaction opens, so a slow or
//! failing provider never leaves a half-written record behind.
//!
//! Concurrent edits of the same record are last-write-wins.

use std::sync::Arc;

use mnemos_markup::encode;
use mnemos_schema::{structural_diff, validate, validate_partial};
use mnemos_types::{
    AgentName, Deadline, EmbeddingPair, Fields, MnemosError, Record, RecordId, RecordSchema, Result,
    Side,
};
use tracing::{debug, info, warn};

use crate::db::{Database, storage};
use crate::embed::{Embedder, check_dimensions};
use crate::registry::{self, AgentInfo, CompiledAgent, Registry};
use crate::rows::{self, Filter};
use crate::vector;

// ─────────────────────────────────────────────────────────────────────────────
// Memory
// ─────────────────────────────────────────────────────────────────────────────

/// Shared store handle.  Cloning is cheap and every clone sees the same
/// database, embedder and agent cache.
#[derive(Clone)]
pub struct Memory {
    pub(crate) db: Arc<Database>,
    embedder: Arc<dyn Embedder>,
    registry: Arc<Registry>,
}

impl std::fmt::Debug for Memory {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Memory")
            .field("db", &self.db)
            .field("embedder", &self.embedder.name())
            .finish_non_exhaustive()
    }
}

impl Memory {
    pub fn new(db: Arc<Database>, embedder: Arc<dyn Embedder>) -> Self {
        Self {
            db,
            embedder,
            registry: Arc::new(Registry::new()),
        }
    }

    pub fn embedder(&self) -> &Arc<dyn Embedder> {
        &self.embedder
    }

    /// Create `name` with the given schemas, or reopen it.
    ///
    /// Reopening compares both schemas structurally (field set, kinds and
    /// nesting, ignoring order and descriptions) against the stored ones.
    /// Any difference fails with [`MnemosError::SchemaMismatch`]; otherwise
    /// the stored schemas are reused and nothing is written.
    pub fn init(&self, name: &AgentName, input: &RecordSchema, output: &RecordSchema) -> Result<AgentMemory> {
        let candidate = CompiledAgent::new(name.clone(), input, output)?;

        let agent = {
            let mut conn = self.db.lock()?;
            let tx = conn.transaction().map_err(storage)?;
            match registry::load(&tx, name)? {
                Some(stored) => {
                    let mut detail: Vec<String> = Vec::new();
                    detail.extend(
                        structural_diff(&stored.input.schema, input)
                            .into_iter()
                            .map(|d| format!("input: {d}")),
                    );
                    detail.extend(
                        structural_diff(&stored.output.schema, output)
                            .into_iter()
                            .map(|d| format!("output: {d}")),
                    );
                    if !detail.is_empty() {
                        warn!(agent = %name.as_str(), differences = detail.len(), "schema mismatch on reopen");
                        return Err(MnemosError::SchemaMismatch {
                            agent: name.as_str().to_string(),
                            detail: detail.join("; "),
                        });
                    }
                    debug!(agent = %name.as_str(), "reopened existing agent");
                    stored
                }
                None => {
                    if let Some(existing) = registry::conflicting(&tx, name)? {
                        return Err(MnemosError::AgentNameConflict {
                            requested: name.as_str().to_string(),
                            existing,
                        });
                    }
                    registry::create(&tx, &candidate)?;
                    tx.commit().map_err(storage)?;
                    info!(agent = %name.as_str(), "agent created");
                    candidate
                }
            }
        };

        let agent = self.registry.insert(agent)?;
        Ok(self.bind(agent))
    }

    /// Open an existing agent without supplying its schemas.
    pub fn open(&self, name: &AgentName) -> Result<AgentMemory> {
        if let Some(agent) = self.registry.get(name)? {
            return Ok(self.bind(agent));
        }
        let loaded = {
            let conn = self.db.lock()?;
            registry::load(&conn, name)?
        };
        let agent = loaded.ok_or_else(|| MnemosError::AgentNotFound(name.as_str().to_string()))?;
        let agent = self.registry.insert(agent)?;
        Ok(self.bind(agent))
    }

    pub fn list_agents(&self) -> Result<Vec<AgentInfo>> {
        let conn = self.db.lock()?;
        registry::list(&conn)
    }

    /// Remove `name` entirely: both record tables, its vector partition and
    /// its registry row, in one transaction; then drop its cache entry.
    /// Returns `false` when no such agent existed.
    pub fn erase(&self, name: &AgentName) -> Result<bool> {
        let existed = {
            let mut conn = self.db.lock()?;
            let tx = conn.transaction().map_err(storage)?;
            let vectors = vector::delete_partition(&tx, name)?;
            let existed = registry::drop_agent(&tx, name)?;
            tx.commit().map_err(storage)?;
            if existed {
                info!(agent = %name.as_str(), vectors, "agent erased");
            }
            existed
        };
        self.registry.invalidate(name)?;
        Ok(existed)
    }

    fn bind(&self, agent: Arc<CompiledAgent>) -> AgentMemory {
        AgentMemory {
            memory: self.clone(),
            agent,
        }
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// AgentMemory
// ─────────────────────────────────────────────────────────────────────────────

/// Record operations bound to one agent.
#[derive(Clone, Debug)]
pub struct AgentMemory {
    pub(crate) memory: Memory,
    pub(crate) agent: Arc<CompiledAgent>,
}

impl AgentMemory {
    pub fn name(&self) -> &AgentName {
        &self.agent.name
    }

    pub fn agent(&self) -> &CompiledAgent {
        &self.agent
    }

    pub fn info(&self) -> AgentInfo {
        self.agent.info()
    }

    fn validate_pair(&self, input: &Fields, output: &Fields) -> Result<(Fields, Fields)> {
        Ok((
            validate(&self.agent.input.schema, input)?,
            validate(&self.agent.output.schema, output)?,
        ))
    }

    /// Encode and embed one side.
    pub(crate) async fn embed_side(&self, side: Side, fields: &Fields, deadline: Deadline) -> Result<Vec<f32>> {
        let text = encode(fields, self.agent.compiled(side));
        let embedder = self.memory.embedder.as_ref();
        let vector = embedder.embed(&text, deadline).await?;
        check_dimensions(embedder, &vector)?;
        Ok(vector)
    }

    // ── store / reinforce ────────────────────────────────────────────────────

    /// Validate both sides and insert them under a fresh id.  No embedding
    /// is computed.
    pub fn store(&self, input: &Fields, output: &Fields) -> Result<RecordId> {
        let (input, output) = self.validate_pair(input, output)?;
        let id = RecordId::generate();
        self.write_new(&id, &input, &output, None)?;
        debug!(agent = %self.name().as_str(), id = %id, "record stored");
        Ok(id)
    }

    /// [`store`](Self::store), plus an embedding pair in the vector index.
    pub async fn reinforce(&self, input: &Fields, output: &Fields, deadline: Deadline) -> Result<RecordId> {
        let (input, output) = self.validate_pair(input, output)?;
        let input_vec = self.embed_side(Side::Input, &input, deadline).await?;
        let output_vec = self.embed_side(Side::Output, &output, deadline).await?;
        let id = RecordId::generate();
        let pair = EmbeddingPair {
            id: id.clone(),
            agent: self.agent.name.clone(),
            input: input_vec,
            output: output_vec,
        };
        self.write_new(&id, &input, &output, Some(&pair))?;
        debug!(agent = %self.name().as_str(), id = %id, "record reinforced");
        Ok(id)
    }

    fn write_new(&self, id: &RecordId, input: &Fields, output: &Fields, pair: Option<&EmbeddingPair>) -> Result<()> {
        let mut conn = self.memory.db.lock()?;
        let tx = conn.transaction().map_err(storage)?;
        rows::insert(&tx, &self.agent, Side::Input, id, input)?;
        rows::insert(&tx, &self.agent, Side::Output, id, output)?;
        if let Some(pair) = pair {
            vector::upsert(&tx, pair)?;
        }
        tx.commit().map_err(storage)
    }

    // ── edit ─────────────────────────────────────────────────────────────────

    /// Merge `input_patch` / `output_patch` into the stored record.
    ///
    /// Patch keys must be declared and conform; the *merged* side is then
    /// validated in full.  Only patched sides are rewritten, and only their
    /// embeddings are recomputed (when the record was reinforced at all).
    /// A `null` patch value for an optional field removes it.
    pub async fn edit(
        &self,
        id: &RecordId,
        input_patch: Option<&Fields>,
        output_patch: Option<&Fields>,
        deadline: Deadline,
    ) -> Result<Record> {
        let current = self.get(id)?;
        let input = match input_patch {
            Some(patch) => Some(merge(&self.agent.input.schema, &current.input, patch)?),
            None => None,
        };
        let output = match output_patch {
            Some(patch) => Some(merge(&self.agent.output.schema, &current.output, patch)?),
            None => None,
        };

        let reinforced = {
            let conn = self.memory.db.lock()?;
            vector::fetch(&conn, &self.agent.name, id)?.is_some()
        };
        let mut vectors: Vec<(Side, Vec<f32>)> = Vec::new();
        if reinforced {
            for (side, fields) in [(Side::Input, &input), (Side::Output, &output)] {
                if let Some(fields) = fields {
                    vectors.push((side, self.embed_side(side, fields, deadline).await?));
                }
            }
        }

        {
            let mut conn = self.memory.db.lock()?;
            let tx = conn.transaction().map_err(storage)?;
            for (side, fields) in [(Side::Input, &input), (Side::Output, &output)] {
                if let Some(fields) = fields {
                    if !rows::update(&tx, &self.agent, side, id, fields)? {
                        return Err(MnemosError::RecordNotFound(id.to_string()));
                    }
                }
            }
            for (side, vec) in &vectors {
                vector::update_side(&tx, &self.agent.name, id, *side, vec)?;
            }
            tx.commit().map_err(storage)?;
        }
        debug!(
            agent = %self.name().as_str(),
            id = %id,
            input = input.is_some(),
            output = output.is_some(),
            reembedded = vectors.len(),
            "record edited"
        );

        Ok(Record {
            id: id.clone(),
            input: input.unwrap_or(current.input),
            output: output.unwrap_or(current.output),
        })
    }

    // ── delete ───────────────────────────────────────────────────────────────

    /// Remove `id` from both tables and the vector index.  Deleting an id
    /// that does not exist is not an error; the return value tells whether
    /// anything was removed.
    pub fn delete(&self, id: &RecordId) -> Result<bool> {
        let mut conn = self.memory.db.lock()?;
        let tx = conn.transaction().map_err(storage)?;
        let rows_removed = rows::delete(&tx, &self.agent, id)?;
        let vector_removed = vector::delete(&tx, &self.agent.name, id)?;
        tx.commit().map_err(storage)?;
        debug!(agent = %self.name().as_str(), id = %id, rows_removed, vector_removed, "record deleted");
        Ok(rows_removed || vector_removed)
    }

    // ── lookup ───────────────────────────────────────────────────────────────

    pub fn get(&self, id: &RecordId) -> Result<Record> {
        let row = {
            let conn = self.memory.db.lock()?;
            rows::fetch(&conn, &self.agent, id)?
        };
        row.ok_or_else(|| MnemosError::RecordNotFound(id.to_string()))?
            .reconstruct(&self.agent)
    }

    /// Every record whose fields equal the supplied filter values, in
    /// insertion order.  Filters are partial records and are validated as
    /// such.
    pub fn find(&self, input: Option<&Fields>, output: Option<&Fields>) -> Result<Vec<Record>> {
        let input = input
            .map(|f| validate_partial(&self.agent.input.schema, f))
            .transpose()?;
        let output = output
            .map(|f| validate_partial(&self.agent.output.schema, f))
            .transpose()?;
        let filter = Filter {
            input: input.as_ref(),
            output: output.as_ref(),
        };
        let found = {
            let conn = self.memory.db.lock()?;
            rows::find(&conn, &self.agent, &filter)?
        };
        found.iter().map(|row| row.reconstruct(&self.agent)).collect()
    }

    pub fn count(&self) -> Result<usize> {
        let conn = self.memory.db.lock()?;
        rows::count(&conn, &self.agent)
    }

    /// The stored embedding pair of `id`, if the record was reinforced.
    pub fn embeddings(&self, id: &RecordId) -> Result<Option<EmbeddingPair>> {
        let conn = self.memory.db.lock()?;
        vector::fetch(&conn, &self.agent.name, id)
    }
}

fn merge(schema: &RecordSchema, current: &Fields, patch: &Fields) -> Result<Fields> {
    let cleaned = validate_partial(schema, patch)?;
    let mut merged = current.clone();
    for (key, value) in patch {
        match cleaned.get(key) {
            Some(v) => {
                merged.insert(key.clone(), v.clone());
            }
            // Partial validation drops `null` for optional fields that do not
            // admit it: that is a removal.
            None if value.is_null() => {
                merged.remove(key);
            }
            None => {}
        }
    }
    validate(schema, &merged)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::embed::HashEmbedder;
    use async_trait::async_trait;
    use mnemos_types::FieldDescriptor;
    use serde_json::json;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn fields(v: serde_json::Value) -> Fields {
        v.as_object().cloned().unwrap()
    }

    fn input_schema() -> RecordSchema {
        RecordSchema::new()
            .field("question", FieldDescriptor::string())
            .field("context", FieldDescriptor::string().optional())
    }

    fn output_schema() -> RecordSchema {
        RecordSchema::new()
            .field("answer", FieldDescriptor::string())
            .field("tags", FieldDescriptor::array(FieldDescriptor::string()))
    }

    /// Wraps a hash embedder and counts calls.
    struct Counting {
        inner: HashEmbedder,
        calls: AtomicUsize,
    }

    #[async_trait]
    impl Embedder for Counting {
        async fn embed(&self, text: &str, deadline: Deadline) -> Result<Vec<f32>> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            self.inner.embed(text, deadline).await
        }
        fn dimensions(&self) -> usize {
            self.inner.dimensions()
        }
        fn name(&self) -> &str {
            "counting"
        }
    }

    struct Failing;

    #[async_trait]
    impl Embedder for Failing {
        async fn embed(&self, _text: &str, _deadline: Deadline) -> Result<Vec<f32>> {
            Err(MnemosError::provider("failing", "unreachable"))
        }
        fn dimensions(&self) -> usize {
            8
        }
        fn name(&self) -> &str {
            "failing"
        }
    }

    fn memory_with(embedder: Arc<dyn Embedder>) -> Memory {
        Memory::new(Arc::new(Database::open_in_memory().unwrap()), embedder)
    }

    fn qa(memory: &Memory) -> AgentMemory {
        memory
            .init(&AgentName::parse("qa").unwrap(), &input_schema(), &output_schema())
            .unwrap()
    }

    // ── init / open / erase ──────────────────────────────────────────────────

    #[test]
    fn reinit_with_reordered_schema_succeeds() {
        let memory = memory_with(Arc::new(HashEmbedder::new(16)));
        qa(&memory);
        let reordered = RecordSchema::new()
            .field("context", FieldDescriptor::string().optional())
            .field("question", FieldDescriptor::string());
        let again = memory
            .init(&AgentName::parse("qa").unwrap(), &reordered, &output_schema())
            .unwrap();
        // The stored field order is kept.
        assert_eq!(again.agent().input.schema, input_schema());
    }

    #[test]
    fn reinit_with_altered_schema_is_rejected() {
        let memory = memory_with(Arc::new(HashEmbedder::new(16)));
        qa(&memory);
        let altered = output_schema().field("score", FieldDescriptor::number());
        let err = memory
            .init(&AgentName::parse("qa").unwrap(), &input_schema(), &altered)
            .unwrap_err();
        match err {
            MnemosError::SchemaMismatch { agent, detail } => {
                assert_eq!(agent, "qa");
                assert!(detail.starts_with("output: "), "{detail}");
            }
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn open_unknown_agent_fails() {
        let memory = memory_with(Arc::new(HashEmbedder::new(16)));
        let err = memory.open(&AgentName::parse("ghost").unwrap()).unwrap_err();
        assert_eq!(err, MnemosError::AgentNotFound("ghost".into()));
    }

    #[test]
    fn erase_removes_agent_and_cache_entry() {
        let memory = memory_with(Arc::new(HashEmbedder::new(16)));
        let agent = qa(&memory);
        agent
            .store(&fields(json!({"question": "q"})), &fields(json!({"answer": "a", "tags": []})))
            .unwrap();
        assert!(memory.erase(agent.name()).unwrap());
        assert!(!memory.erase(agent.name()).unwrap());
        assert!(memory.open(agent.name()).unwrap_err().is_not_found());
        assert!(memory.list_agents().unwrap().is_empty());
    }

    #[test]
    fn names_differing_only_by_case_do_not_share_tables() {
        let memory = memory_with(Arc::new(HashEmbedder::new(16)));
        let lower = qa(&memory);
        lower
            .store(&fields(json!({"question": "secret"})), &fields(json!({"answer": "a", "tags": []})))
            .unwrap();

        let upper = AgentName::parse("QA").unwrap();
        let err = memory.init(&upper, &input_schema(), &output_schema()).unwrap_err();
        assert_eq!(
            err,
            MnemosError::AgentNameConflict {
                requested: "QA".into(),
                existing: "qa".into(),
            }
        );
        let other = RecordSchema::new().field("prompt", FieldDescriptor::number());
        let err = memory
            .init(&AgentName::parse("Qa").unwrap(), &other, &output_schema())
            .unwrap_err();
        assert!(matches!(err, MnemosError::AgentNameConflict { .. }));

        assert!(memory.open(&upper).unwrap_err().is_not_found());
        assert!(!memory.erase(&upper).unwrap());
        assert_eq!(lower.count().unwrap(), 1);
        assert_eq!(memory.list_agents().unwrap().len(), 1);
    }

    // ── store / get / find ───────────────────────────────────────────────────

    #[test]
    fn store_validates_and_roundtrips() {
        let memory = memory_with(Arc::new(HashEmbedder::new(16)));
        let agent = qa(&memory);
        let id = agent
            .store(
                &fields(json!({"question": "capital?", "extra": 1})),
                &fields(json!({"answer": "Paris", "tags": ["geo"]})),
            )
            .unwrap();
        let record = agent.get(&id).unwrap();
        assert_eq!(record.input, fields(json!({"question": "capital?"})));
        assert_eq!(record.output, fields(json!({"answer": "Paris", "tags": ["geo"]})));
        assert!(agent.embeddings(&id).unwrap().is_none());
    }

    #[test]
    fn store_rejects_invalid_record_without_writing() {
        let memory = memory_with(Arc::new(HashEmbedder::new(16)));
        let agent = qa(&memory);
        let err = agent
            .store(&fields(json!({})), &fields(json!({"answer": "a", "tags": []})))
            .unwrap_err();
        assert!(err.is_validation());
        assert_eq!(agent.count().unwrap(), 0);
    }

    #[test]
    fn find_filters_on_both_sides() {
        let memory = memory_with(Arc::new(HashEmbedder::new(16)));
        let agent = qa(&memory);
        agent
            .store(&fields(json!({"question": "x"})), &fields(json!({"answer": "1", "tags": ["a"]})))
            .unwrap();
        agent
            .store(&fields(json!({"question": "y"})), &fields(json!({"answer": "1", "tags": []})))
            .unwrap();

        let by_input = agent.find(Some(&fields(json!({"question": "x"}))), None).unwrap();
        assert_eq!(by_input.len(), 1);
        let by_output = agent.find(None, Some(&fields(json!({"answer": "1"})))).unwrap();
        assert_eq!(by_output.len(), 2);
        let by_tags = agent.find(None, Some(&fields(json!({"tags": []})))).unwrap();
        assert_eq!(by_tags[0].input["question"], "y");
        assert_eq!(agent.find(None, None).unwrap().len(), 2);

        let err = agent.find(Some(&fields(json!({"nope": 1}))), None).unwrap_err();
        assert!(err.is_validation());
    }

    #[test]
    fn get_missing_record_is_not_found() {
        let memory = memory_with(Arc::new(HashEmbedder::new(16)));
        let agent = qa(&memory);
        assert!(agent.get(&RecordId::from("missing")).unwrap_err().is_not_found());
    }

    // ── reinforce / edit / delete ────────────────────────────────────────────

    #[tokio::test]
    async fn reinforce_writes_embedding_pair() {
        let memory = memory_with(Arc::new(HashEmbedder::new(16)));
        let agent = qa(&memory);
        let id = agent
            .reinforce(
                &fields(json!({"question": "q"})),
                &fields(json!({"answer": "a", "tags": []})),
                Deadline::none(),
            )
            .await
            .unwrap();
        let pair = agent.embeddings(&id).unwrap().unwrap();
        assert_eq!(pair.input.len(), 16);
        assert_eq!(pair.output.len(), 16);
    }

    #[tokio::test]
    async fn failed_embedding_leaves_nothing_behind() {
        let memory = memory_with(Arc::new(Failing));
        let agent = qa(&memory);
        let err = agent
            .reinforce(
                &fields(json!({"question": "q"})),
                &fields(json!({"answer": "a", "tags": []})),
                Deadline::none(),
            )
            .await
            .unwrap_err();
        assert!(matches!(err, MnemosError::Provider { .. }));
        assert_eq!(agent.count().unwrap(), 0);
    }

    #[tokio::test]
    async fn edit_touches_only_the_patched_side() {
        let counting = Arc::new(Counting {
            inner: HashEmbedder::new(32),
            calls: AtomicUsize::new(0),
        });
        let memory = memory_with(counting.clone());
        let agent = qa(&memory);
        let id = agent
            .reinforce(
                &fields(json!({"question": "q", "context": "c"})),
                &fields(json!({"answer": "a", "tags": ["t"]})),
                Deadline::none(),
            )
            .await
            .unwrap();
        let before = agent.embeddings(&id).unwrap().unwrap();
        assert_eq!(counting.calls.load(Ordering::SeqCst), 2);

        let edited = agent
            .edit(&id, Some(&fields(json!({"question": "new question"}))), None, Deadline::none())
            .await
            .unwrap();
        assert_eq!(counting.calls.load(Ordering::SeqCst), 3);
        assert_eq!(edited.input, fields(json!({"question": "new question", "context": "c"})));

        let after = agent.embeddings(&id).unwrap().unwrap();
        assert_eq!(after.output, before.output);
        assert_ne!(after.input, before.input);
        assert_eq!(agent.get(&id).unwrap(), edited);
    }

    #[tokio::test]
    async fn edit_null_removes_optional_field() {
        let memory = memory_with(Arc::new(HashEmbedder::new(16)));
        let agent = qa(&memory);
        let id = agent
            .store(
                &fields(json!({"question": "q", "context": "c"})),
                &fields(json!({"answer": "a", "tags": []})),
            )
            .unwrap();
        let edited = agent
            .edit(&id, Some(&fields(json!({"context": null}))), None, Deadline::none())
            .await
            .unwrap();
        assert_eq!(edited.input, fields(json!({"question": "q"})));
        assert_eq!(agent.get(&id).unwrap().input, edited.input);
    }

    #[tokio::test]
    async fn edit_rejects_bad_patch_and_missing_record() {
        let memory = memory_with(Arc::new(HashEmbedder::new(16)));
        let agent = qa(&memory);
        let id = agent
            .store(&fields(json!({"question": "q"})), &fields(json!({"answer": "a", "tags": []})))
            .unwrap();
        let err = agent
            .edit(&id, None, Some(&fields(json!({"tags": "not a list"}))), Deadline::none())
            .await
            .unwrap_err();
        assert!(err.is_validation());

        let err = agent
            .edit(&RecordId::from("missing"), None, None, Deadline::none())
            .await
            .unwrap_err();
        assert!(err.is_not_found());
    }

    #[tokio::test]
    async fn delete_is_idempotent() {
        let memory = memory_with(Arc::new(HashEmbedder::new(16)));
        let agent = qa(&memory);
        let id = agent
            .reinforce(
                &fields(json!({"question": "q"})),
                &fields(json!({"answer": "a", "tags": []})),
                Deadline::none(),
            )
            .await
            .unwrap();
        assert!(agent.delete(&id).unwrap());
        assert!(!agent.delete(&id).unwrap());
        assert!(agent.embeddings(&id).unwrap().is_none());
        assert_eq!(agent.count().unwrap(), 0);
    }

    #[test]
    fn merge_replaces_and_keeps() {
        let merged = merge(
            &input_schema(),
            &fields(json!({"question": "q", "context": "c"})),
            &fields(json!({"question": "r"})),
        )
        .unwrap();
        assert_eq!(merged, fields(json!({"question": "r", "context": "c"})));
    }
}

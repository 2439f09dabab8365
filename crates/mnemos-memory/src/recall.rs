//! Recall Engine.
//!
//! Semantic lookup of past interactions of one agent:
//!
//! 1. exactly one side of the [`RecallQuery`] is supplied, and it is
//!    validated as a partial record,
//! 2. the partial record is encoded as markup and embedded,
//! 3. the vector index returns the [`RECALL_LIMIT`] nearest rows of that
//!    side's embedding column inside the agent's partition,
//! 4. each hit is joined back to its input and output rows and rebuilt.
//!
//! Hits that cannot be rebuilt (no relational row, or stored data that no
//! longer validates) are dropped rather than failing the query.  The number
//! of dropped hits is part of the [`RecallResult`].

use mnemos_schema::validate_partial;
use mnemos_types::{Deadline, Fields, MnemosError, RecordId, Result, Side};
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::rows;
use crate::store::AgentMemory;
use crate::vector;

/// Maximum number of matches returned by one recall.
pub const RECALL_LIMIT: usize = 10;

/// A recall target: a partial input record *or* a partial output record.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RecallQuery {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub input: Option<Fields>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub output: Option<Fields>,
}

impl RecallQuery {
    pub fn by_input(input: Fields) -> Self {
        Self {
            input: Some(input),
            output: None,
        }
    }

    pub fn by_output(output: Fields) -> Self {
        Self {
            input: None,
            output: Some(output),
        }
    }

    /// The single supplied target, or [`MnemosError::InvalidQuery`] when both
    /// or neither are set.
    pub fn target(&self) -> Result<(Side, &Fields)> {
        match (&self.input, &self.output) {
            (Some(input), None) => Ok((Side::Input, input)),
            (None, Some(output)) => Ok((Side::Output, output)),
            (Some(_), Some(_)) => Err(MnemosError::InvalidQuery(
                "recall takes an input target or an output target, not both".into(),
            )),
            (None, None) => Err(MnemosError::InvalidQuery(
                "recall needs an input target or an output target".into(),
            )),
        }
    }
}

/// One rebuilt neighbour.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RecallMatch {
    pub id: RecordId,
    pub input: Fields,
    pub output: Fields,
    /// Cosine distance to the query; smaller is closer.
    pub distance: f32,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RecallResult {
    /// Ascending by distance, at most [`RECALL_LIMIT`] entries.
    pub matches: Vec<RecallMatch>,
    /// Index hits excluded because their record could not be rebuilt.
    pub dropped: usize,
}

impl AgentMemory {
    /// Find the reinforced records nearest to `query`.
    pub async fn recall(&self, query: &RecallQuery, deadline: Deadline) -> Result<RecallResult> {
        let (side, target) = query.target()?;
        let target = validate_partial(&self.agent.compiled(side).schema, target)?;
        let embedding = self.embed_side(side, &target, deadline).await?;

        let (hits, joined) = {
            let conn = self.memory.db.lock()?;
            let hits = vector::knn(&conn, &self.agent.name, side, &embedding, RECALL_LIMIT)?;
            let mut joined = Vec::with_capacity(hits.len());
            for (id, _) in &hits {
                joined.push(rows::fetch(&conn, &self.agent, id)?);
            }
            (hits, joined)
        };

        let mut result = RecallResult::default();
        for ((id, distance), row) in hits.into_iter().zip(joined) {
            let rebuilt = match row {
                Some(row) => row.reconstruct(&self.agent),
                None => Err(MnemosError::RecordNotFound(id.to_string())),
            };
            match rebuilt {
                Ok(record) => result.matches.push(RecallMatch {
                    id,
                    input: record.input,
                    output: record.output,
                    distance,
                }),
                Err(e) => {
                    warn!(agent = %self.name().as_str(), id = %id, error = %e, "dropping unreconstructible recall hit");
                    result.dropped += 1;
                }
            }
        }
        result.matches.sort_by(|a, b| a.distance.total_cmp(&b.distance));
        debug!(
            agent = %self.name().as_str(),
            side = side.as_str(),
            matches = result.matches.len(),
            dropped = result.dropped,
            "recall"
        );
        Ok(result)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::Database;
    use crate::embed::HashEmbedder;
    use crate::store::Memory;
    use mnemos_types::{AgentName, FieldDescriptor, RecordSchema};
    use serde_json::json;
    use std::sync::Arc;

    fn fields(v: serde_json::Value) -> Fields {
        v.as_object().cloned().unwrap()
    }

    #[test]
    fn exactly_one_target_is_required() {
        let both = RecallQuery {
            input: Some(fields(json!({"q": "x"}))),
            output: Some(fields(json!({"a": "y"}))),
        };
        assert!(matches!(both.target(), Err(MnemosError::InvalidQuery(_))));
        assert!(matches!(RecallQuery::default().target(), Err(MnemosError::InvalidQuery(_))));

        let by_output = RecallQuery::by_output(fields(json!({"a": "y"})));
        assert_eq!(by_output.target().unwrap().0, Side::Output);
    }

    #[test]
    fn query_serializes_only_the_supplied_side() {
        let q = RecallQuery::by_input(fields(json!({"q": "x"})));
        assert_eq!(serde_json::to_value(&q).unwrap(), json!({"input": {"q": "x"}}));
    }

    // ── unreconstructible hits ───────────────────────────────────────────────

    async fn two_reinforced() -> (AgentMemory, RecordId, RecordId) {
        let memory = Memory::new(
            Arc::new(Database::open_in_memory().unwrap()),
            Arc::new(HashEmbedder::new(64)),
        );
        let agent = memory
            .init(
                &AgentName::parse("qa").unwrap(),
                &RecordSchema::new().field("question", FieldDescriptor::string()),
                &RecordSchema::new()
                    .field("answer", FieldDescriptor::string())
                    .field("tags", FieldDescriptor::array(FieldDescriptor::string())),
            )
            .unwrap();
        let mut ids = Vec::new();
        for (question, answer) in [("capital of france", "paris"), ("capital of italy", "rome")] {
            ids.push(
                agent
                    .reinforce(
                        &fields(json!({"question": question})),
                        &fields(json!({"answer": answer, "tags": ["geo"]})),
                        Deadline::none(),
                    )
                    .await
                    .unwrap(),
            );
        }
        let second = ids.pop().unwrap();
        let first = ids.pop().unwrap();
        (agent, first, second)
    }

    fn capital_query() -> RecallQuery {
        RecallQuery::by_input(fields(json!({"question": "capital"})))
    }

    #[tokio::test]
    async fn hit_without_output_row_is_dropped_not_fatal() {
        let (agent, kept, broken) = two_reinforced().await;
        {
            let conn = agent.memory.db.lock().unwrap();
            conn.execute("DELETE FROM qa_output WHERE id = ?1", [broken.as_str()])
                .unwrap();
        }

        let result = agent.recall(&capital_query(), Deadline::none()).await.unwrap();
        assert_eq!(result.matches.len(), 1);
        assert_eq!(result.dropped, 1);
        assert_eq!(result.matches[0].id, kept);
    }

    #[tokio::test]
    async fn hit_with_corrupt_json_column_is_dropped() {
        let (agent, kept, broken) = two_reinforced().await;
        {
            let conn = agent.memory.db.lock().unwrap();
            conn.execute(
                "UPDATE qa_output SET tags_json = '{\"not\": \"a list\"}' WHERE id = ?1",
                [broken.as_str()],
            )
            .unwrap();
        }

        let result = agent.recall(&capital_query(), Deadline::none()).await.unwrap();
        assert_eq!(result.matches.len(), 1);
        assert_eq!(result.dropped, 1);
        assert_eq!(result.matches[0].id, kept);
        assert_eq!(result.matches[0].output, fields(json!({"answer": "paris", "tags": ["geo"]})));
    }
}

//! Vector index.
//!
//! One row per reinforced interaction in `mnemos_vectors`, partitioned by
//! agent name and keyed by record id.  Each row carries an input and an
//! output embedding; k-NN search ranks one of the two columns by cosine
//! distance (`1 − cos`) inside a single partition, so recall never crosses
//! agents.
//!
//! Every function takes a plain [`Connection`] so callers can pass a
//! transaction and keep vector writes atomic with the relational rows.

use mnemos_types::{AgentName, EmbeddingPair, RecordId, Result, Side};
use rusqlite::{Connection, OptionalExtension, params};

use crate::db::storage;

fn column(side: Side) -> &'static str {
    match side {
        Side::Input => "input_embedding",
        Side::Output => "output_embedding",
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Embedding serialisation helpers
// ─────────────────────────────────────────────────────────────────────────────

pub(crate) fn embedding_to_bytes(embedding: &[f32]) -> Vec<u8> {
    embedding.iter().flat_map(|f| f.to_le_bytes()).collect()
}

pub(crate) fn bytes_to_embedding(bytes: &[u8]) -> Vec<f32> {
    bytes
        .chunks_exact(4)
        .map(|c| f32::from_le_bytes([c[0], c[1], c[2], c[3]]))
        .collect()
}

// ─────────────────────────────────────────────────────────────────────────────
// Distance
// ─────────────────────────────────────────────────────────────────────────────

/// Cosine similarity of two equal-length vectors; `0.0` if either has zero
/// norm.
pub fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    let dot: f32 = a.iter().zip(b).map(|(x, y)| x * y).sum();
    let norm_a: f32 = a.iter().map(|x| x * x).sum::<f32>().sqrt();
    let norm_b: f32 = b.iter().map(|x| x * x).sum::<f32>().sqrt();
    if norm_a == 0.0 || norm_b == 0.0 {
        0.0
    } else {
        dot / (norm_a * norm_b)
    }
}

/// Cosine distance in `[0, 2]`: `0` for identical directions.
pub fn cosine_distance(a: &[f32], b: &[f32]) -> f32 {
    1.0 - cosine_similarity(a, b)
}

// ─────────────────────────────────────────────────────────────────────────────
// Operations
// ─────────────────────────────────────────────────────────────────────────────

/// Insert or replace the pair for `(pair.agent, pair.id)`.
pub fn upsert(conn: &Connection, pair: &EmbeddingPair) -> Result<()> {
    conn.execute(
        "INSERT OR REPLACE INTO mnemos_vectors (agent, id, input_embedding, output_embedding)
         VALUES (?1, ?2, ?3, ?4)",
        params![
            pair.agent.as_str(),
            pair.id.as_str(),
            embedding_to_bytes(&pair.input),
            embedding_to_bytes(&pair.output),
        ],
    )
    .map_err(storage)?;
    Ok(())
}

/// Replace one side's embedding.  Returns `false` when the record has no
/// vector row.
pub fn update_side(
    conn: &Connection,
    agent: &AgentName,
    id: &RecordId,
    side: Side,
    embedding: &[f32],
) -> Result<bool> {
    let sql = format!(
        "UPDATE mnemos_vectors SET {} = ?1 WHERE agent = ?2 AND id = ?3",
        column(side)
    );
    let changed = conn
        .execute(
            &sql,
            params![embedding_to_bytes(embedding), agent.as_str(), id.as_str()],
        )
        .map_err(storage)?;
    Ok(changed > 0)
}

/// Delete the vector row of one record.  A missing row is not an error.
pub fn delete(conn: &Connection, agent: &AgentName, id: &RecordId) -> Result<bool> {
    let changed = conn
        .execute(
            "DELETE FROM mnemos_vectors WHERE agent = ?1 AND id = ?2",
            params![agent.as_str(), id.as_str()],
        )
        .map_err(storage)?;
    Ok(changed > 0)
}

/// Delete every vector row of `agent`.
pub fn delete_partition(conn: &Connection, agent: &AgentName) -> Result<usize> {
    conn.execute("DELETE FROM mnemos_vectors WHERE agent = ?1", params![agent.as_str()])
        .map_err(storage)
}

pub fn fetch(conn: &Connection, agent: &AgentName, id: &RecordId) -> Result<Option<EmbeddingPair>> {
    conn.query_row(
        "SELECT input_embedding, output_embedding FROM mnemos_vectors
         WHERE agent = ?1 AND id = ?2",
        params![agent.as_str(), id.as_str()],
        |row| {
            let input: Vec<u8> = row.get(0)?;
            let output: Vec<u8> = row.get(1)?;
            Ok((input, output))
        },
    )
    .optional()
    .map_err(storage)
    .map(|found| {
        found.map(|(input, output)| EmbeddingPair {
            id: id.clone(),
            agent: agent.clone(),
            input: bytes_to_embedding(&input),
            output: bytes_to_embedding(&output),
        })
    })
}

/// The `k` ids of `agent` whose `side` embedding is closest to `query`,
/// ascending by cosine distance.  Rows of a different width are skipped.
pub fn knn(
    conn: &Connection,
    agent: &AgentName,
    side: Side,
    query: &[f32],
    k: usize,
) -> Result<Vec<(RecordId, f32)>> {
    let sql = format!(
        "SELECT id, {} FROM mnemos_vectors WHERE agent = ?1",
        column(side)
    );
    let mut stmt = conn.prepare(&sql).map_err(storage)?;
    let rows = stmt
        .query_map(params![agent.as_str()], |row| {
            let id: String = row.get(0)?;
            let blob: Vec<u8> = row.get(1)?;
            Ok((id, blob))
        })
        .map_err(storage)?;

    let mut scored = Vec::new();
    for row in rows {
        let (id, blob) = row.map_err(storage)?;
        let embedding = bytes_to_embedding(&blob);
        if embedding.len() == query.len() {
            scored.push((RecordId::from(id), cosine_distance(&embedding, query)));
        }
    }
    scored.sort_by(|a, b| a.1.total_cmp(&b.1));
    scored.truncate(k);
    Ok(scored)
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────

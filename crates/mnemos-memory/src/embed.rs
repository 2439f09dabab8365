//! Embedding providers.
//!
//! [`Embedder`] is the seam between the store and whatever turns text into a
//! fixed-width vector.  The HTTP provider lives in `mnemos-runtime`; this
//! crate ships [`HashEmbedder`], a deterministic offline embedder used as the
//! default when no endpoint is configured and as the test double.

use async_trait::async_trait;
use mnemos_types::{Deadline, MnemosError, Result};
use sha2::{Digest, Sha256};

/// Default embedding width.
pub const DEFAULT_DIMENSIONS: usize = 1536;

/// Text → fixed-width embedding vector.
#[async_trait]
pub trait Embedder: Send + Sync {
    /// Embed `text`, giving up when `deadline` passes.
    async fn embed(&self, text: &str, deadline: Deadline) -> Result<Vec<f32>>;

    /// Width of every vector this embedder returns.
    fn dimensions(&self) -> usize;

    /// Provider label used in logs and errors.
    fn name(&self) -> &str;
}

/// Reject vectors whose width differs from the embedder's declared one.
pub fn check_dimensions(embedder: &dyn Embedder, vector: &[f32]) -> Result<()> {
    if vector.len() == embedder.dimensions() {
        Ok(())
    } else {
        Err(MnemosError::DimensionMismatch {
            expected: embedder.dimensions(),
            actual: vector.len(),
        })
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// HashEmbedder
// ─────────────────────────────────────────────────────────────────────────────

/// Bag-of-tokens embedder: each alphanumeric token is lowercased and hashed
/// with SHA-256 into one signed bucket, and the result is L2-normalized.
///
/// Texts sharing tokens land close together, which is enough for recall to
/// behave sensibly without a network provider.
#[derive(Debug, Clone)]
pub struct HashEmbedder {
    dimensions: usize,
}

impl HashEmbedder {
    pub fn new(dimensions: usize) -> Self {
        Self {
            dimensions: dimensions.max(1),
        }
    }

    /// Synchronous embedding; [`Embedder::embed`] delegates here.
    pub fn embed_now(&self, text: &str) -> Vec<f32> {
        let mut v = vec![0.0f32; self.dimensions];
        for token in text.split(|c: char| !c.is_alphanumeric()).filter(|t| !t.is_empty()) {
            let digest = Sha256::digest(token.to_lowercase().as_bytes());
            let idx = u32::from_le_bytes([digest[0], digest[1], digest[2], digest[3]]) as usize
                % self.dimensions;
            let sign = if digest[4] % 2 == 0 { 1.0 } else { -1.0 };
            v[idx] += sign;
        }
        let norm: f32 = v.iter().map(|x| x * x).sum::<f32>().sqrt();
        if norm > 0.0 {
            for x in v.iter_mut() {
                *x /= norm;
            }
        }
        v
    }
}

impl Default for HashEmbedder {
    fn default() -> Self {
        Self::new(DEFAULT_DIMENSIONS)
    }
}

#[async_trait]
impl Embedder for HashEmbedder {
    async fn embed(&self, text: &str, _deadline: Deadline) -> Result<Vec<f32>> {
        Ok(self.embed_now(text))
    }

    fn dimensions(&self) -> usize {
        self.dimensions
    }

    fn name(&self) -> &str {
        "hash"
    }
}

//! Embedding model contract and process-wide model registry.
//!
//! The engine treats an [`Embedder`] as a pure function from text to a
//! unit-norm vector of fixed dimension, which is what makes cache keying
//! by (text, model) sound. Models are process-wide resources: they load
//! on first registration, are shared by id, and stay resident until
//! explicitly released.

use crate::cache::murmur3_32;
use crate::error::{Result, SearchError};
use once_cell::sync::Lazy;
use parking_lot::RwLock;
use std::collections::HashMap;
use std::sync::Arc;

/// A text embedding model.
///
/// Implementations must be pure and idempotent: the same text always
/// produces the same vector, and every vector is unit-norm with exactly
/// [`dim`](Self::dim) components.
pub trait Embedder: Send + Sync {
    /// Stable identifier of the model, used for cache keying.
    fn model_id(&self) -> &str;

    /// Dimensionality of produced vectors.
    fn dim(&self) -> usize;

    /// Embeds one text.
    fn embed(&self, text: &str) -> Result<Vec<f32>>;

    /// Embeds a batch of texts. The default maps [`embed`](Self::embed)
    /// over the batch; implementations with real batch inference should
    /// override it.
    fn embed_batch(&self, texts: &[&str]) -> Result<Vec<Vec<f32>>> {
        texts.iter().map(|t| self.embed(t)).collect()
    }
}

static REGISTRY: Lazy<RwLock<HashMap<String, Arc<dyn Embedder>>>> =
    Lazy::new(|| RwLock::new(HashMap::new()));

/// Registers a model under its id, replacing any previous registration.
pub fn register(embedder: Arc<dyn Embedder>) {
    let id = embedder.model_id().to_string();
    tracing::debug!(model = %id, "registering embedder");
    REGISTRY.write().insert(id, embedder);
}

/// Looks up a registered model by id.
pub fn get(model_id: &str) -> Option<Arc<dyn Embedder>> {
    REGISTRY.read().get(model_id).cloned()
}

/// Releases a registered model. Returns `true` if it was present.
pub fn release(model_id: &str) -> bool {
    REGISTRY.write().remove(model_id).is_some()
}

/// Deterministic token-hash embedder.
///
/// Hashes lowercased alphanumeric tokens into `dim` buckets and
/// L2-normalizes the resulting counts. Texts sharing tokens land near
/// each other, which is enough to exercise the full retrieval pipeline
/// offline; it is the reference embedder for tests and demos, not a
/// substitute for a learned model.
#[derive(Debug, Clone)]
pub struct HashEmbedder {
    model_id: String,
    dim: usize,
}

impl HashEmbedder {
    /// Creates a hash embedder producing `dim`-dimensional vectors.
    pub fn new(dim: usize) -> Self {
        Self {
            model_id: format!("hash-bow-{dim}"),
            dim,
        }
    }
}

impl Embedder for HashEmbedder {
    fn model_id(&self) -> &str {
        &self.model_id
    }

    fn dim(&self) -> usize {
        self.dim
    }

    fn embed(&self, text: &str) -> Result<Vec<f32>> {
        if self.dim == 0 {
            return Err(SearchError::Embedding("embedder dimension is 0".into()));
        }
        let mut vector = vec![0.0f32; self.dim];
        let lowered = text.to_lowercase();
        for token in lowered.split(|c: char| !c.is_alphanumeric()) {
            if token.is_empty() {
                continue;
            }
            let bucket = murmur3_32(token.as_bytes(), 0) as usize % self.dim;
            vector[bucket] += 1.0;
        }
        let norm: f32 = vector.iter().map(|v| v * v).sum::<f32>().sqrt();
        if norm == 0.0 {
            // No tokens at all; fall back to a fixed basis vector so the
            // unit-norm contract still holds.
            vector[0] = 1.0;
        } else {
            for v in vector.iter_mut() {
                *v /= norm;
            }
        }
        Ok(vector)
    }
}

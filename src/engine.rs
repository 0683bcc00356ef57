//! Engine façade owning the item table, vector store, HNSW index, and
//! embedding cache.
//!
//! The engine maps item ids to dense internal indices; internal index
//! `i` is simultaneously the position in the item table, the position in
//! the vector store, and the HNSW node id. Removal compacts the tables
//! and rebuilds the graph, so the mapping stays bijective over live
//! items.

use crate::cache::{cache_key, CacheStats, EmbeddingCache};
use crate::config;
use crate::embedder::Embedder;
use crate::error::{Result, SearchError};
use crate::hnsw::{HnswConfig, HnswIndex};
use crate::item::Item;
use crate::quantization::{Quantization, StoredVector};
use crate::search::ranker::{rank, Candidate};
use crate::search::types::{Explanation, IndexInfo, SearchOptions, SearchResult, ScoreBreakdown};
use crate::search::Weights;
use crate::similarity;
use crate::snapshot::Snapshot;
use once_cell::sync::Lazy;
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Arc;

/// Process-wide embedding cache, shared by engines that opt in via
/// [`EngineConfig::use_global_cache`].
static GLOBAL_CACHE: Lazy<Mutex<EmbeddingCache>> =
    Lazy::new(|| Mutex::new(EmbeddingCache::with_stats(config::DEFAULT_CACHE_SIZE)));

/// Replaces the process-wide cache with a fresh one of the given capacity.
pub fn install_global_cache(capacity: usize) {
    *GLOBAL_CACHE.lock() = EmbeddingCache::with_stats(capacity);
}

/// Engine construction parameters.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EngineConfig {
    /// Encoding of stored vectors.
    pub quantization: Quantization,
    /// Score combination weights.
    pub weights: Weights,
    /// Min-max normalize component scores across each candidate batch.
    pub normalize_scores: bool,
    /// Item count at which HNSW is built automatically.
    pub ann_threshold: usize,
    /// HNSW tuning parameters.
    pub hnsw: HnswConfig,
    /// Embedding cache capacity.
    pub cache_size: usize,
    /// Force HNSW on or off regardless of `ann_threshold`.
    pub use_ann: Option<bool>,
    /// Share the process-wide embedding cache instead of a per-engine one.
    pub use_global_cache: bool,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            quantization: Quantization::Float32,
            weights: Weights::default(),
            normalize_scores: true,
            ann_threshold: config::DEFAULT_ANN_THRESHOLD,
            hnsw: HnswConfig::default(),
            cache_size: config::DEFAULT_CACHE_SIZE,
            use_ann: None,
            use_global_cache: false,
        }
    }
}

/// Hybrid search engine over a catalog of items.
pub struct SearchEngine {
    config: EngineConfig,
    embedder: Arc<dyn Embedder>,
    items: Vec<Item>,
    id_to_index: HashMap<String, usize>,
    vectors: Vec<StoredVector>,
    hnsw: Option<HnswIndex>,
    cache: EmbeddingCache,
    text_paths: Option<Vec<String>>,
    closed: bool,
}

impl SearchEngine {
    /// Creates an empty engine.
    pub fn new(embedder: Arc<dyn Embedder>, config: EngineConfig) -> Self {
        let cache = EmbeddingCache::with_stats(config.cache_size);
        Self {
            config,
            embedder,
            items: Vec::new(),
            id_to_index: HashMap::new(),
            vectors: Vec::new(),
            hnsw: None,
            cache,
            text_paths: None,
            closed: false,
        }
    }

    /// Creates an engine and indexes the given items.
    pub fn build(
        embedder: Arc<dyn Embedder>,
        config: EngineConfig,
        items: Vec<Item>,
    ) -> Result<Self> {
        let mut engine = Self::new(embedder, config);
        let count = items.len();
        engine.add(items)?;
        tracing::info!(
            items = count,
            ann = engine.hnsw.is_some(),
            "engine built"
        );
        Ok(engine)
    }

    /// Restores an engine from a snapshot. No embedding calls are made;
    /// vectors are decoded from the snapshot payloads.
    pub fn load(embedder: Arc<dyn Embedder>, config: EngineConfig, snapshot: Snapshot) -> Result<Self> {
        snapshot.validate()?;
        if snapshot.model != embedder.model_id() {
            tracing::warn!(
                snapshot_model = %snapshot.model,
                embedder_model = %embedder.model_id(),
                "snapshot was produced by a different model"
            );
        }
        let quantization = snapshot.quantization();
        let mut engine = Self::new(embedder, EngineConfig {
            quantization,
            ..config
        });
        engine.text_paths = snapshot.text_paths.clone();

        let dim = engine.embedder.dim();
        for (item, encoded) in snapshot.items.into_iter().zip(snapshot.vectors) {
            let stored = StoredVector::from_base64(&encoded, quantization)?;
            if stored.dim() != dim {
                return Err(SearchError::Snapshot(format!(
                    "vector for item '{}' has {} dimensions, expected {dim}",
                    item.id,
                    stored.dim()
                )));
            }
            if engine.id_to_index.contains_key(&item.id) {
                return Err(SearchError::Snapshot(format!(
                    "duplicate item id '{}'",
                    item.id
                )));
            }
            engine.id_to_index.insert(item.id.clone(), engine.items.len());
            engine.items.push(item);
            engine.vectors.push(stored);
        }

        if engine.ann_wanted(engine.items.len()) {
            engine.build_hnsw()?;
        }
        tracing::info!(items = engine.items.len(), "engine loaded from snapshot");
        Ok(engine)
    }

    /// Captures the engine state as a snapshot.
    pub fn save(&self) -> Result<Snapshot> {
        self.check_open()?;
        Ok(Snapshot {
            version: config::SNAPSHOT_VERSION.to_string(),
            model: self.embedder.model_id().to_string(),
            items: self.items.clone(),
            vectors: self.vectors.iter().map(|v| v.to_base64()).collect(),
            created_at: chrono::Utc::now().to_rfc3339(),
            text_paths: self.text_paths.clone(),
            quantization: match self.config.quantization {
                Quantization::Float32 => None,
                other => Some(other),
            },
        })
    }

    /// Adds items, replacing any whose id already exists.
    ///
    /// Embeddings for the whole batch are resolved before any state is
    /// touched, so an embedder failure leaves the engine unchanged.
    pub fn add(&mut self, items: Vec<Item>) -> Result<()> {
        self.check_open()?;
        if items.is_empty() {
            return Ok(());
        }
        let embeddings = self.resolve_embeddings(&items)?;

        for (item, embedding) in items.into_iter().zip(embeddings) {
            let stored = StoredVector::encode(&embedding, self.config.quantization);
            match self.id_to_index.get(&item.id).copied() {
                Some(index) => {
                    // Whole-item replace at the same internal index.
                    self.items[index] = item;
                    self.vectors[index] = stored;
                    if let Some(hnsw) = self.hnsw.as_mut() {
                        hnsw.remove(index as u32);
                        hnsw.insert(index as u32, embedding)?;
                    }
                }
                None => {
                    let index = self.items.len();
                    self.id_to_index.insert(item.id.clone(), index);
                    self.items.push(item);
                    self.vectors.push(stored);
                    if let Some(hnsw) = self.hnsw.as_mut() {
                        hnsw.insert(index as u32, embedding)?;
                    }
                }
            }
        }

        if self.hnsw.is_none() && self.ann_wanted(self.items.len()) {
            self.build_hnsw()?;
        }
        Ok(())
    }

    /// Removes items by id, compacting the internal tables. Missing ids
    /// are skipped. Returns how many items were removed.
    pub fn remove<S: AsRef<str>>(&mut self, ids: &[S]) -> Result<usize> {
        self.check_open()?;
        let targets: Vec<usize> = ids
            .iter()
            .filter_map(|id| self.id_to_index.get(id.as_ref()).copied())
            .collect();
        if targets.is_empty() {
            return Ok(0);
        }

        let drop_set: std::collections::HashSet<usize> = targets.iter().copied().collect();
        let removed = drop_set.len();

        let mut items = Vec::with_capacity(self.items.len() - removed);
        let mut vectors = Vec::with_capacity(self.vectors.len() - removed);
        self.id_to_index.clear();
        for (index, (item, vector)) in self
            .items
            .drain(..)
            .zip(self.vectors.drain(..))
            .enumerate()
        {
            if drop_set.contains(&index) {
                continue;
            }
            self.id_to_index.insert(item.id.clone(), items.len());
            items.push(item);
            vectors.push(vector);
        }
        self.items = items;
        self.vectors = vectors;

        // Internal indices shifted; the graph is rebuilt from scratch.
        if self.hnsw.is_some() {
            self.build_hnsw()?;
        }
        tracing::debug!(removed, remaining = self.items.len(), "items removed");
        Ok(removed)
    }

    /// The last added state of an item, `None` once removed.
    pub fn get(&self, id: &str) -> Option<&Item> {
        self.id_to_index.get(id).map(|&index| &self.items[index])
    }

    /// All live items in internal order.
    pub fn get_all(&self) -> &[Item] {
        &self.items
    }

    /// Number of live items.
    pub fn len(&self) -> usize {
        self.items.len()
    }

    /// Whether the engine holds no items.
    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    /// Replaces the score combination weights.
    pub fn set_weights(&mut self, weights: Weights) {
        self.config.weights = weights;
    }

    /// Current score combination weights.
    pub fn weights(&self) -> Weights {
        self.config.weights
    }

    /// Hybrid search: semantic candidates (ANN or linear scan) scored
    /// with all three kernels, combined, thresholded, and truncated.
    pub fn search(&mut self, query: &str, options: &SearchOptions<'_>) -> Result<Vec<SearchResult>> {
        self.check_open()?;
        if query.chars().count() < options.min_length {
            return Ok(Vec::new());
        }
        if self.items.is_empty() {
            return Ok(Vec::new());
        }

        let query_vector = self.embed_cached(query)?;

        let ann_index = match (&self.hnsw, options.use_ann) {
            (Some(hnsw), use_ann) if use_ann != Some(false) => Some(hnsw),
            _ => None,
        };
        let semantic_hits: Vec<(usize, f32)> = match ann_index {
            Some(hnsw) => hnsw
                .search(&query_vector, options.top_k * config::ANN_CANDIDATE_FACTOR)?
                .into_iter()
                .map(|(id, distance)| (id as usize, 1.0 - distance))
                .collect(),
            None => self
                .vectors
                .iter()
                .enumerate()
                .map(|(index, stored)| {
                    let vector = stored.decode();
                    (index, similarity::cosine(&query_vector, &vector))
                })
                .collect(),
        };

        let mut candidates: Vec<Candidate> = Vec::with_capacity(semantic_hits.len());
        for (index, semantic) in semantic_hits {
            let item = &self.items[index];
            if let Some(filter) = options.filter {
                if !filter.keep(item.metadata.as_ref()) {
                    continue;
                }
            }
            candidates.push(Candidate {
                index,
                raw: ScoreBreakdown {
                    semantic,
                    fuzzy: similarity::fuzzy(query, &item.text),
                    keyword: similarity::keyword(query, &item.text),
                },
            });
        }

        let ranked = rank(&candidates, self.config.weights, self.config.normalize_scores);

        Ok(ranked
            .into_iter()
            .filter(|r| r.score >= options.threshold)
            .take(options.top_k)
            .map(|r| SearchResult {
                item: self.items[r.index].clone(),
                score: r.score,
                explain: options.explain.then_some(Explanation {
                    raw: r.raw,
                    normalized: r.normalized,
                }),
            })
            .collect())
    }

    /// Shape of the active index.
    pub fn index_info(&self) -> IndexInfo {
        match &self.hnsw {
            Some(hnsw) => IndexInfo {
                kind: "hnsw".to_string(),
                items: self.items.len(),
                dimension: self.embedder.dim(),
                graph_nodes: hnsw.len(),
                max_level: Some(hnsw.max_level()),
            },
            None => IndexInfo {
                kind: "linear".to_string(),
                items: self.items.len(),
                dimension: self.embedder.dim(),
                graph_nodes: 0,
                max_level: None,
            },
        }
    }

    /// Embedding cache counters for this engine (or the global cache
    /// when that is in use).
    pub fn cache_stats(&self) -> CacheStats {
        if self.config.use_global_cache {
            GLOBAL_CACHE.lock().stats()
        } else {
            self.cache.stats()
        }
    }

    /// Rough in-memory footprint of the engine's tables.
    pub fn estimated_memory_bytes(&self) -> usize {
        let mut total = 0usize;
        for item in &self.items {
            total += item.id.len() + item.text.len() + 48;
            if let Some(metadata) = &item.metadata {
                total += metadata.to_string().len();
            }
        }
        for vector in &self.vectors {
            total += vector.dim()
                * match vector.quantization() {
                    Quantization::Float32 => 4,
                    Quantization::Float16 => 2,
                    Quantization::Int8 => 1,
                }
                + 16;
        }
        total += self.id_to_index.len() * 32;
        if let Some(hnsw) = &self.hnsw {
            total += hnsw.len() * (self.embedder.dim() * 4 + 64);
        }
        total
    }

    /// Marks the engine closed; every subsequent operation fails with
    /// [`SearchError::EngineClosed`].
    pub fn close(&mut self) {
        self.closed = true;
        self.items.clear();
        self.id_to_index.clear();
        self.vectors.clear();
        self.hnsw = None;
        self.cache.clear();
    }

    fn check_open(&self) -> Result<()> {
        if self.closed {
            return Err(SearchError::EngineClosed);
        }
        Ok(())
    }

    /// Whether HNSW should back `item_count` items.
    fn ann_wanted(&self, item_count: usize) -> bool {
        match self.config.use_ann {
            Some(forced) => forced,
            None => item_count >= self.config.ann_threshold,
        }
    }

    /// Builds the HNSW graph from the stored vectors.
    fn build_hnsw(&mut self) -> Result<()> {
        let mut hnsw = HnswIndex::new(self.embedder.dim(), self.config.hnsw.clone());
        for (index, stored) in self.vectors.iter().enumerate() {
            hnsw.insert(index as u32, stored.decode())?;
        }
        tracing::info!(nodes = hnsw.len(), "HNSW index built");
        self.hnsw = Some(hnsw);
        Ok(())
    }

    /// Resolves embeddings for a batch, using the cache for repeats and
    /// one `embed_batch` call for the misses. The cache is only written
    /// after the whole batch succeeds.
    fn resolve_embeddings(&mut self, items: &[Item]) -> Result<Vec<Vec<f32>>> {
        let model = self.embedder.model_id().to_string();
        let mut resolved: Vec<Option<Vec<f32>>> = Vec::with_capacity(items.len());
        let mut miss_texts: Vec<&str> = Vec::new();
        let mut miss_slots: Vec<usize> = Vec::new();

        for (slot, item) in items.iter().enumerate() {
            let key = cache_key(&item.text, &model);
            let hit = if self.config.use_global_cache {
                GLOBAL_CACHE.lock().get(key).map(|v| v.to_vec())
            } else {
                self.cache.get(key).map(|v| v.to_vec())
            };
            match hit {
                Some(vector) => resolved.push(Some(vector)),
                None => {
                    resolved.push(None);
                    miss_texts.push(&item.text);
                    miss_slots.push(slot);
                }
            }
        }

        if !miss_texts.is_empty() {
            let embedded = self.embedder.embed_batch(&miss_texts)?;
            let dim = self.embedder.dim();
            for (slot, vector) in miss_slots.into_iter().zip(embedded) {
                if vector.len() != dim {
                    return Err(SearchError::Embedding(format!(
                        "embedder returned {} dimensions, expected {dim}",
                        vector.len()
                    )));
                }
                let key = cache_key(&items[slot].text, &model);
                if self.config.use_global_cache {
                    GLOBAL_CACHE.lock().set(key, vector.clone());
                } else {
                    self.cache.set(key, vector.clone());
                }
                resolved[slot] = Some(vector);
            }
        }

        Ok(resolved
            .into_iter()
            .map(|v| v.expect("every slot resolved by hit or batch"))
            .collect())
    }

    /// Embeds one query text through the cache.
    fn embed_cached(&mut self, text: &str) -> Result<Vec<f32>> {
        let key = cache_key(text, self.embedder.model_id());
        let hit = if self.config.use_global_cache {
            GLOBAL_CACHE.lock().get(key).map(|v| v.to_vec())
        } else {
            self.cache.get(key).map(|v| v.to_vec())
        };
        if let Some(vector) = hit {
            return Ok(vector);
        }
        let vector = self.embedder.embed(text)?;
        if self.config.use_global_cache {
            GLOBAL_CACHE.lock().set(key, vector.clone());
        } else {
            self.cache.set(key, vector.clone());
        }
        Ok(vector)
    }
}

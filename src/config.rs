//! Global configuration constants for hybridsearch.
//!
//! All tuning parameters and defaults are defined here. Runtime
//! configuration is handled via [`EngineConfig`](crate::engine::EngineConfig)
//! and [`HnswConfig`](crate::hnsw::HnswConfig).

/// Default number of bidirectional links per HNSW node.
///
/// Higher values improve recall but increase memory and build time.
/// Typical range: 8–64. Default: 16.
pub const HNSW_DEFAULT_M: usize = 16;

/// Default ef parameter during HNSW index construction.
///
/// Controls the size of the dynamic candidate list during insertion.
/// Higher values produce a better graph but slow down build time.
pub const HNSW_DEFAULT_EF_CONSTRUCTION: usize = 200;

/// Default ef parameter during HNSW search.
///
/// Controls the size of the dynamic candidate list during query.
/// Higher values improve recall at the cost of latency.
pub const HNSW_DEFAULT_EF_SEARCH: usize = 50;

/// Maximum layer a node can be assigned during level generation.
pub const HNSW_MAX_LEVEL: usize = 16;

/// Item count at which the engine switches from a linear scan to HNSW.
pub const DEFAULT_ANN_THRESHOLD: usize = 1000;

/// Default weight of the semantic (embedding cosine) component.
pub const DEFAULT_SEMANTIC_WEIGHT: f32 = 0.7;

/// Default weight of the fuzzy (Levenshtein) component.
pub const DEFAULT_FUZZY_WEIGHT: f32 = 0.15;

/// Default weight of the keyword-containment component.
pub const DEFAULT_KEYWORD_WEIGHT: f32 = 0.15;

/// Default number of results returned by a search.
pub const DEFAULT_TOP_K: usize = 5;

/// Default minimum final score for a result to be returned.
pub const DEFAULT_SCORE_THRESHOLD: f32 = 0.0;

/// Default minimum query length (in characters) for a search to run.
pub const DEFAULT_MIN_QUERY_LEN: usize = 1;

/// Default capacity of the per-engine embedding cache.
pub const DEFAULT_CACHE_SIZE: usize = 500;

/// Default debounce delay before the background updater processes a batch.
pub const DEFAULT_BATCH_DELAY_MS: u64 = 100;

/// Default maximum number of items the updater applies per batch.
pub const DEFAULT_MAX_BATCH_SIZE: usize = 32;

/// Snapshot format version emitted by `SearchEngine::save`.
pub const SNAPSHOT_VERSION: &str = "1";

/// Candidate over-fetch factor when retrieving from HNSW before reranking.
pub const ANN_CANDIDATE_FACTOR: usize = 2;

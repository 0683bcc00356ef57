//! Search request options and result types.

use crate::config;
use crate::item::Item;
use crate::search::filter::MetadataFilter;
use serde::{Deserialize, Serialize};

/// Per-query options. `Default` mirrors the engine defaults: five
/// results, no threshold, single-character minimum query.
pub struct SearchOptions<'a> {
    /// Maximum number of results.
    pub top_k: usize,
    /// Minimum final score for a result to be kept.
    pub threshold: f32,
    /// Queries shorter than this (in characters) return no results.
    pub min_length: usize,
    /// Attach raw and normalized component scores to each result.
    pub explain: bool,
    /// Force ANN on/off; `None` lets the engine decide.
    pub use_ann: Option<bool>,
    /// Candidate filter applied to item metadata before scoring.
    pub filter: Option<&'a dyn MetadataFilter>,
}

impl Default for SearchOptions<'_> {
    fn default() -> Self {
        Self {
            top_k: config::DEFAULT_TOP_K,
            threshold: config::DEFAULT_SCORE_THRESHOLD,
            min_length: config::DEFAULT_MIN_QUERY_LEN,
            explain: false,
            use_ann: None,
            filter: None,
        }
    }
}

/// Raw or normalized component scores of one candidate.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ScoreBreakdown {
    pub semantic: f32,
    pub fuzzy: f32,
    pub keyword: f32,
}

/// Component scores attached to a result when `explain` is requested.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct Explanation {
    /// Kernel outputs before batch normalization.
    pub raw: ScoreBreakdown,
    /// Scores actually combined into the final value.
    pub normalized: ScoreBreakdown,
}

/// One ranked search hit.
#[derive(Debug, Clone)]
pub struct SearchResult {
    /// The matched item.
    pub item: Item,
    /// Final combined score; results are sorted descending by it.
    pub score: f32,
    /// Present only when the query asked for an explanation.
    pub explain: Option<Explanation>,
}

/// Shape of the index backing a search, as reported by
/// [`index_info`](crate::engine::SearchEngine::index_info).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IndexInfo {
    /// `"hnsw"` or `"linear"`.
    pub kind: String,
    /// Number of items currently indexed.
    pub items: usize,
    /// Embedding dimensionality.
    pub dimension: usize,
    /// HNSW node count; zero for the linear scan.
    pub graph_nodes: usize,
    /// Entry-point level of the HNSW graph, if one exists.
    pub max_level: Option<usize>,
}

//! Search primitives: request options, result types, metadata
//! filtering, and hybrid score combination.

/// Candidate filtering over item metadata.
pub mod filter;
/// Weight normalization, batch min-max scaling, and score combination.
pub mod ranker;
/// Options and result types.
pub mod types;

pub use filter::{FieldEquals, MetadataFilter};
pub use ranker::Weights;
pub use types::{Explanation, IndexInfo, ScoreBreakdown, SearchOptions, SearchResult};

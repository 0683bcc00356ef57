//! Error types for the hybridsearch engine.

/// Errors surfaced by engine, index, and snapshot operations.
///
/// Contract violations (`DimensionMismatch`, `EngineClosed`) indicate
/// caller bugs; the remaining variants wrap failures of external
/// collaborators (embedder, snapshot decoding) and never leave the
/// engine in a partially-mutated state.
#[derive(Debug, thiserror::Error)]
pub enum SearchError {
    /// A vector of the wrong dimensionality was handed to the index.
    #[error("dimension mismatch: expected {expected}, got {got}")]
    DimensionMismatch { expected: usize, got: usize },

    /// The embedder failed; the underlying message is passed through unchanged.
    #[error("embedding failed: {0}")]
    Embedding(String),

    /// A snapshot could not be decoded or failed validation.
    #[error("invalid snapshot: {0}")]
    Snapshot(String),

    /// Snapshot JSON could not be parsed.
    #[error("snapshot JSON error: {0}")]
    SnapshotJson(#[from] serde_json::Error),

    /// Snapshot file could not be read or written.
    #[error("snapshot I/O error: {0}")]
    SnapshotIo(#[from] std::io::Error),

    /// An operation was invoked on an engine after `close()`.
    #[error("engine is closed")]
    EngineClosed,
}

/// Convenience alias used throughout the crate.
pub type Result<T> = std::result::Result<T, SearchError>;

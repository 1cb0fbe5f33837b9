//! Error type shared by every core operation.
//!
//! The core only ever fails in two ways: it was configured or called with
//! inputs it cannot accept, or it was handed nothing to work with where
//! something was required. Both are recoverable by the caller, and no
//! operation leaves partially-built state behind when it returns one.

use thiserror::Error;

/// Result alias for core operations.
pub type Result<T> = std::result::Result<T, RagError>;

/// Errors raised by the embedder, chunker, index, and pipeline.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RagError {
    /// Invalid chunk size/overlap, dimension mismatch, unknown metric,
    /// mismatched vector/metadata lengths, or non-finite vector values.
    #[error("configuration error: {0}")]
    Configuration(String),

    /// An operation that needs input received none (no documents, no chunks
    /// left after filtering, or no index built yet).
    #[error("empty input: {0}")]
    EmptyInput(String),
}

impl RagError {
    pub(crate) fn config(msg: impl Into<String>) -> Self {
        RagError::Configuration(msg.into())
    }

    pub(crate) fn empty(msg: impl Into<String>) -> Self {
        RagError::EmptyInput(msg.into())
    }

    /// Shorthand for the most common configuration failure.
    pub(crate) fn dimension_mismatch(expected: usize, actual: usize) -> Self {
        RagError::Configuration(format!(
            "vector dimension mismatch: expected {}, got {}",
            expected, actual
        ))
    }
}

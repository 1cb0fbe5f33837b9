//! Sliding-window text chunker.
//!
//! Splits each document into fixed-size character windows that overlap by
//! a configurable number of characters. Every emitted [`Chunk`] records
//! which document it came from, its position within that document, and the
//! half-open character range it covers.
//!
//! # Algorithm
//!
//! For each document:
//!
//! 1. Start at character offset 0.
//! 2. Take the window `start..min(start + chunk_size, len)`.
//! 3. Trim surrounding whitespace; emit a chunk only if something is left.
//! 4. Advance `start` by `chunk_size - chunk_overlap` and repeat while
//!    `start < len`.
//!
//! Chunk ids restart at 0 for every document and only count emitted
//! chunks, so a whitespace-only window never leaves a gap in the ids.
//!
//! # Example
//!
//! ```rust
//! use rag_harness_core::chunk::{chunk_documents, ChunkConfig};
//!
//! let config = ChunkConfig::new(10, 3).unwrap();
//! let chunks = chunk_documents(&["hello world"], &config);
//! assert_eq!(chunks.len(), 2);
//! assert_eq!((chunks[0].start, chunks[0].end), (0, 10));
//! assert_eq!((chunks[1].start, chunks[1].end), (7, 11));
//! assert_eq!(chunks[1].text, "orld");
//! ```

use serde::{Deserialize, Serialize};

use crate::error::{RagError, Result};
use crate::models::Chunk;

/// Window size and overlap, both in characters.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChunkConfig {
    pub chunk_size: usize,
    pub chunk_overlap: usize,
}

impl Default for ChunkConfig {
    fn default() -> Self {
        Self {
            chunk_size: 200,
            chunk_overlap: 50,
        }
    }
}

impl ChunkConfig {
    pub fn new(chunk_size: usize, chunk_overlap: usize) -> Result<Self> {
        let config = Self {
            chunk_size,
            chunk_overlap,
        };
        config.validate()?;
        Ok(config)
    }

    /// Rejects a zero size, or an overlap that would stop the window from
    /// advancing.
    pub fn validate(&self) -> Result<()> {
        if self.chunk_size == 0 {
            return Err(RagError::config("chunk_size must be > 0"));
        }
        if self.chunk_overlap >= self.chunk_size {
            return Err(RagError::config(format!(
                "chunk_overlap ({}) must be smaller than chunk_size ({})",
                self.chunk_overlap, self.chunk_size
            )));
        }
        Ok(())
    }

    /// Distance between consecutive window starts.
    pub fn stride(&self) -> usize {
        self.chunk_size - self.chunk_overlap
    }
}

/// Chunk every document, tagging each chunk with the document's position
/// in `documents` as its `doc_id`.
///
/// `config` is assumed valid; [`ChunkConfig::new`] and
/// [`try_chunk_documents`] are the checked entry points.
pub fn chunk_documents<S: AsRef<str>>(documents: &[S], config: &ChunkConfig) -> Vec<Chunk> {
    documents
        .iter()
        .enumerate()
        .flat_map(|(doc_id, doc)| chunk_document(doc_id, doc.as_ref(), config))
        .collect()
}

/// Validate `config` before chunking anything.
pub fn try_chunk_documents<S: AsRef<str>>(
    documents: &[S],
    config: &ChunkConfig,
) -> Result<Vec<Chunk>> {
    config.validate()?;
    Ok(chunk_documents(documents, config))
}

/// Chunk a single document.
pub fn chunk_document(doc_id: usize, text: &str, config: &ChunkConfig) -> Vec<Chunk> {
    // Byte offset of every character, plus the end of the string, so that
    // character offsets can be sliced without splitting a code point.
    let bounds: Vec<usize> = text
        .char_indices()
        .map(|(i, _)| i)
        .chain(std::iter::once(text.len()))
        .collect();
    let len = bounds.len() - 1;
    let stride = config.stride().max(1);

    let mut chunks = Vec::new();
    let mut chunk_id = 0;
    let mut start = 0;

    while start < len {
        let end = (start + config.chunk_size).min(len);
        let window = text[bounds[start]..bounds[end]].trim();
        if !window.is_empty() {
            chunks.push(Chunk::new(window, doc_id, chunk_id, start, end));
            chunk_id += 1;
        }
        start += stride;
    }

    chunks
}

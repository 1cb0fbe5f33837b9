//! Core data models shared by the chunker, index, and pipeline.

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

/// A contiguous window of a document's text.
///
/// Offsets count characters (Unicode scalar values), not bytes, and are
/// half-open: `start..end`. `text` is the window with surrounding
/// whitespace trimmed, so it may be shorter than `end - start`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Chunk {
    pub text: String,
    /// Position of the source document in the indexed batch.
    pub doc_id: usize,
    /// Sequential within a document, starting at 0.
    pub chunk_id: usize,
    pub start: usize,
    pub end: usize,
    /// SHA-256 hex digest of `text`.
    pub hash: String,
    /// Label of the source document (e.g. its relative path), when the
    /// caller supplied one.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source: Option<String>,
}

impl Chunk {
    pub fn new(text: &str, doc_id: usize, chunk_id: usize, start: usize, end: usize) -> Self {
        Self {
            text: text.to_string(),
            doc_id,
            chunk_id,
            start,
            end,
            hash: content_hash(text),
            source: None,
        }
    }

    /// True when `hash` still matches `text`.
    pub fn verify_hash(&self) -> bool {
        self.hash == content_hash(&self.text)
    }
}

/// SHA-256 hex digest of a chunk's text.
pub fn content_hash(text: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(text.as_bytes());
    format!("{:x}", hasher.finalize())
}

/// One vector in a [`VectorIndex`](crate::index::VectorIndex) plus its payload.
///
/// `id` equals the entry's insertion position and never changes.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IndexEntry<M> {
    pub id: usize,
    pub vector: Vec<f32>,
    pub metadata: M,
}

/// A ranked hit borrowed from the index that produced it.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SearchResult<'a, M> {
    pub id: usize,
    /// Cosine similarity (higher is closer) or L2 distance (lower is closer).
    pub score: f32,
    pub metadata: &'a M,
}

/// A chunk selected as grounding material for a query.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RetrievedContext {
    /// Entry id in the index the chunk came from.
    pub id: usize,
    pub score: f32,
    pub chunk: Chunk,
}

impl RetrievedContext {
    pub fn text(&self) -> &str {
        &self.chunk.text
    }

    pub fn source(&self) -> Option<&str> {
        self.chunk.source.as_deref()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_chunk_hash_matches_text() {
        let c = Chunk::new("hello", 0, 0, 0, 5);
        assert!(c.verify_hash());
        assert_eq!(c.hash.len(), 64);
    }

    #[test]
    fn test_tampered_chunk_fails_verification() {
        let mut c = Chunk::new("hello", 0, 0, 0, 5);
        c.text.push('!');
        assert!(!c.verify_hash());
    }

    #[test]
    fn test_retrieved_context_serializes() {
        let ctx = RetrievedContext {
            id: 3,
            score: 0.5,
            chunk: Chunk::new("abc", 1, 2, 10, 13),
        };
        let json = serde_json::to_value(&ctx).unwrap();
        assert_eq!(json["chunk"]["text"], "abc");
        assert_eq!(json["id"], 3);
        assert_eq!(ctx.text(), "abc");
        assert!(json["chunk"].get("source").is_none());
        assert_eq!(ctx.source(), None);
    }

    #[test]
    fn test_chunk_source_round_trips() {
        let mut c = Chunk::new("abc", 0, 0, 0, 3);
        c.source = Some("guides/intro.md".to_string());
        let back: Chunk = serde_json::from_str(&serde_json::to_string(&c).unwrap()).unwrap();
        assert_eq!(back, c);

        let legacy: Chunk = serde_json::from_str(
            r#"{"text":"abc","doc_id":0,"chunk_id":0,"start":0,"end":3,"hash":"x"}"#,
        )
        .unwrap();
        assert_eq!(legacy.source, None);
    }
}

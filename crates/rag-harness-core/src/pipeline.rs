//! Retrieval pipeline: documents in, ranked contexts and a prompt out.
//!
//! ```text
//! index time:  documents ─▶ chunk ─▶ embed ─▶ VectorIndex::build
//! query time:  query ─▶ embed ─▶ VectorIndex::search ─▶ contexts ─▶ prompt
//! ```
//!
//! The same [`Embedder`] handles both sides, so query vectors are
//! comparable with chunk vectors. Generation is not part of this module;
//! the prompt and contexts are handed to a [`Generator`](crate::generate::Generator).
//!
//! # Example
//!
//! ```rust
//! use rag_harness_core::chunk::ChunkConfig;
//! use rag_harness_core::embedding::Embedder;
//! use rag_harness_core::pipeline::{build_prompt, RetrievalPipeline};
//!
//! let mut pipeline = RetrievalPipeline::new(
//!     ChunkConfig::new(40, 10).unwrap(),
//!     Embedder::hash_seeded(32).unwrap(),
//! )
//! .unwrap();
//! pipeline
//!     .index_documents(&["Rust is a systems language.", "Vectors live in an index."])
//!     .unwrap();
//!
//! let contexts = pipeline.retrieve("Rust is a systems language.", 1).unwrap();
//! assert_eq!(contexts[0].chunk.doc_id, 0);
//! let prompt = build_prompt("What is Rust?", &contexts);
//! assert!(prompt.contains("[Document 1] (similarity: 1.0000)"));
//! ```

use tracing::{debug, info};

use crate::chunk::{chunk_documents, ChunkConfig};
use crate::embedding::{Embedder, EmbeddingProvider};
use crate::error::{RagError, Result};
use crate::index::{Metric, VectorIndex};
use crate::models::{Chunk, RetrievedContext};

const PROMPT_HEADER: &str = "You are a professional question-answering assistant. \
Answer the user's question using the reference documents below.";

const PROMPT_RULES: &str = "Requirements:
1. Answer only from the reference documents; do not invent information.
2. If the documents do not contain the answer, say so explicitly.
3. Cite the document numbers you rely on (e.g. \"According to document 1...\").
4. Keep the answer concise and professional.";

/// Chunker, embedder, and the index they produced.
#[derive(Debug, Clone)]
pub struct RetrievalPipeline {
    chunk_config: ChunkConfig,
    embedder: Embedder,
    index: Option<VectorIndex<Chunk>>,
}

impl RetrievalPipeline {
    pub fn new(chunk_config: ChunkConfig, embedder: Embedder) -> Result<Self> {
        chunk_config.validate()?;
        Ok(Self {
            chunk_config,
            embedder,
            index: None,
        })
    }

    pub fn chunk_config(&self) -> &ChunkConfig {
        &self.chunk_config
    }

    pub fn embedder(&self) -> &Embedder {
        &self.embedder
    }

    pub fn index(&self) -> Option<&VectorIndex<Chunk>> {
        self.index.as_ref()
    }

    pub fn is_indexed(&self) -> bool {
        self.index.is_some()
    }

    /// Chunk, embed, and index `documents` without touching `self`.
    ///
    /// # Errors
    ///
    /// [`RagError::EmptyInput`] when `documents` is empty or every document
    /// is blank.
    pub fn build_index<S: AsRef<str>>(&self, documents: &[S]) -> Result<VectorIndex<Chunk>> {
        self.build(documents, None::<&[&str]>)
    }

    /// Like [`build_index`](Self::build_index), stamping every chunk with the
    /// label of the document it came from. `labels[i]` names `documents[i]`.
    ///
    /// # Errors
    ///
    /// [`RagError::Configuration`] when the two slices differ in length,
    /// otherwise as [`build_index`](Self::build_index).
    pub fn build_labeled_index<S, L>(
        &self,
        documents: &[S],
        labels: &[L],
    ) -> Result<VectorIndex<Chunk>>
    where
        S: AsRef<str>,
        L: AsRef<str>,
    {
        if labels.len() != documents.len() {
            return Err(RagError::config(format!(
                "got {} documents but {} labels",
                documents.len(),
                labels.len()
            )));
        }
        self.build(documents, Some(labels))
    }

    fn build<S, L>(&self, documents: &[S], labels: Option<&[L]>) -> Result<VectorIndex<Chunk>>
    where
        S: AsRef<str>,
        L: AsRef<str>,
    {
        if documents.is_empty() {
            return Err(RagError::empty("no documents to index"));
        }

        let mut chunks = chunk_documents(documents, &self.chunk_config);
        if chunks.is_empty() {
            return Err(RagError::empty(format!(
                "{} documents produced no non-blank chunks",
                documents.len()
            )));
        }
        if let Some(labels) = labels {
            for chunk in &mut chunks {
                chunk.source = Some(labels[chunk.doc_id].as_ref().to_string());
            }
        }
        debug!(
            documents = documents.len(),
            chunks = chunks.len(),
            "chunked documents"
        );

        let vectors: Vec<Vec<f32>> = chunks.iter().map(|c| self.embedder.embed(&c.text)).collect();
        VectorIndex::build(vectors, chunks)
    }

    /// Replace the current index with one built from `documents`.
    ///
    /// Returns the number of chunks indexed. On error the previous index,
    /// if any, is left exactly as it was.
    pub fn index_documents<S: AsRef<str>>(&mut self, documents: &[S]) -> Result<usize> {
        let index = self.build_index(documents)?;
        Ok(self.install(index, documents.len()))
    }

    /// [`index_documents`](Self::index_documents) with per-document labels,
    /// carried into every [`Chunk::source`].
    pub fn index_labeled_documents<S, L>(&mut self, documents: &[S], labels: &[L]) -> Result<usize>
    where
        S: AsRef<str>,
        L: AsRef<str>,
    {
        let index = self.build_labeled_index(documents, labels)?;
        Ok(self.install(index, documents.len()))
    }

    fn install(&mut self, index: VectorIndex<Chunk>, documents: usize) -> usize {
        let count = index.len();
        info!(
            documents,
            chunks = count,
            model = self.embedder.model_name(),
            "indexed documents"
        );
        self.index = Some(index);
        count
    }

    /// Install an index built elsewhere (e.g. loaded from a snapshot).
    ///
    /// # Errors
    ///
    /// [`RagError::Configuration`] when the index's dimension differs from
    /// the embedder's.
    pub fn restore_index(&mut self, index: VectorIndex<Chunk>) -> Result<()> {
        if !index.is_empty() && index.dims() != self.embedder.dims() {
            return Err(RagError::dimension_mismatch(
                self.embedder.dims(),
                index.dims(),
            ));
        }
        self.index = Some(index);
        Ok(())
    }

    /// Top `top_k` chunks for `query` by cosine similarity.
    pub fn retrieve(&self, query: &str, top_k: usize) -> Result<Vec<RetrievedContext>> {
        self.retrieve_with_metric(query, top_k, Metric::Cosine)
    }

    /// Top `top_k` chunks for `query` under `metric`.
    ///
    /// `top_k = 0` yields an empty list.
    ///
    /// # Errors
    ///
    /// [`RagError::EmptyInput`] when no index has been built yet.
    pub fn retrieve_with_metric(
        &self,
        query: &str,
        top_k: usize,
        metric: Metric,
    ) -> Result<Vec<RetrievedContext>> {
        if top_k == 0 {
            return Ok(Vec::new());
        }
        let index = self
            .index
            .as_ref()
            .ok_or_else(|| RagError::empty("no index has been built; call index_documents first"))?;

        let query_vec = self.embedder.embed(query);
        let results = index.search(&query_vec, top_k, metric)?;

        Ok(results
            .into_iter()
            .map(|r| RetrievedContext {
                id: r.id,
                score: r.score,
                chunk: r.metadata.clone(),
            })
            .collect())
    }

    /// See [`build_prompt`].
    pub fn build_prompt(&self, query: &str, contexts: &[RetrievedContext]) -> String {
        build_prompt(query, contexts)
    }
}

/// Render the grounding prompt for `query`.
///
/// Contexts are numbered from 1 in the order given, each with its score to
/// four decimal places. The output depends only on the arguments.
pub fn build_prompt(query: &str, contexts: &[RetrievedContext]) -> String {
    let context_text = contexts
        .iter()
        .enumerate()
        .map(|(i, ctx)| {
            format!(
                "[Document {}] (similarity: {:.4})\n{}",
                i + 1,
                ctx.score,
                ctx.text()
            )
        })
        .collect::<Vec<_>>()
        .join("\n\n");

    format!(
        "{}\n\nReference documents:\n{}\n\nQuestion: {}\n\n{}\n\nAnswer:",
        PROMPT_HEADER, context_text, query, PROMPT_RULES
    )
}

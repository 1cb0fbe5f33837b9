//! A retrieval pipeline shared between concurrent readers and a rebuilder.
//!
//! Readers call [`SharedPipeline::snapshot`] and search the returned
//! `Arc<RetrievalPipeline>` without holding any lock. A rebuild indexes the
//! new documents into a fresh pipeline first and only then swaps it in, so
//! in-flight searches keep the index they started with and a failed rebuild
//! changes nothing.

use std::sync::{Arc, PoisonError, RwLock};

use rag_harness_core::pipeline::RetrievalPipeline;
use rag_harness_core::Result;
use tracing::info;

pub struct SharedPipeline {
    current: RwLock<Arc<RetrievalPipeline>>,
}

impl SharedPipeline {
    pub fn new(pipeline: RetrievalPipeline) -> Self {
        Self {
            current: RwLock::new(Arc::new(pipeline)),
        }
    }

    /// The currently published pipeline.
    pub fn snapshot(&self) -> Arc<RetrievalPipeline> {
        // The lock only guards an Arc swap, so a poisoned lock still holds a
        // complete pipeline.
        let guard = self.current.read().unwrap_or_else(PoisonError::into_inner);
        Arc::clone(&guard)
    }

    /// Index `documents` with the current chunker and embedder and publish
    /// the result. Returns the number of chunks indexed.
    ///
    /// On error the published pipeline is unchanged.
    pub fn rebuild<S: AsRef<str>>(&self, documents: &[S]) -> Result<usize> {
        self.publish(|next| next.index_documents(documents))
    }

    /// [`rebuild`](Self::rebuild) with a source label per document.
    pub fn rebuild_labeled<S, L>(&self, documents: &[S], labels: &[L]) -> Result<usize>
    where
        S: AsRef<str>,
        L: AsRef<str>,
    {
        self.publish(|next| next.index_labeled_documents(documents, labels))
    }

    fn publish<F>(&self, index: F) -> Result<usize>
    where
        F: FnOnce(&mut RetrievalPipeline) -> Result<usize>,
    {
        let base = self.snapshot();
        let mut next = RetrievalPipeline::new(*base.chunk_config(), base.embedder().clone())?;
        let count = index(&mut next)?;
        self.replace(next);
        info!(chunks = count, "published rebuilt index");
        Ok(count)
    }

    /// Publish `pipeline` as is (e.g. one restored from a snapshot).
    pub fn replace(&self, pipeline: RetrievalPipeline) {
        let mut guard = self.current.write().unwrap_or_else(PoisonError::into_inner);
        *guard = Arc::new(pipeline);
    }
}

//! Index construction from configuration.
//!
//! Ties the loader, pipeline, and snapshot modules together: build an empty
//! pipeline from `[chunking]` and `[embedding]`, then either restore it from
//! `[index].snapshot_path` or index the documents under `[sources]`.

use anyhow::{Context, Result};
use tracing::{info, warn};

use rag_harness_core::pipeline::RetrievalPipeline;

use crate::config::Config;
use crate::loader::{self, DocumentKind, LoadedDocument};
use crate::shared::SharedPipeline;
use crate::snapshot;

/// An unindexed pipeline with the configured chunker and embedder.
pub fn build_pipeline(config: &Config) -> Result<RetrievalPipeline> {
    Ok(RetrievalPipeline::new(
        config.chunk_config()?,
        config.build_embedder()?,
    )?)
}

/// A ready-to-query pipeline.
///
/// Uses the snapshot when one is configured and loads cleanly. Otherwise
/// indexes `[sources]` and, if a snapshot path is configured, writes it.
pub fn open_index(config: &Config) -> Result<RetrievalPipeline> {
    let mut pipeline = build_pipeline(config)?;

    if let Some(path) = config.index.snapshot_path.as_deref() {
        if path.exists() {
            match snapshot::load_index(path, &mut pipeline) {
                Ok(_) => return Ok(pipeline),
                Err(e) => warn!(path = %path.display(), "ignoring snapshot: {:#}", e),
            }
        }
    }

    let documents = loader::load_documents(&config.sources)?;
    index_loaded(&mut pipeline, &documents)?;

    if let Some(path) = config.index.snapshot_path.as_deref() {
        snapshot::save_index(path, &pipeline)?;
    }
    Ok(pipeline)
}

/// Reload `[sources]`, rebuild the shared index, and refresh the snapshot.
/// Returns the number of chunks indexed.
pub fn reindex(config: &Config, shared: &SharedPipeline) -> Result<usize> {
    let documents = loader::load_documents(&config.sources)?;
    let count = shared
        .rebuild_labeled(&loader::bodies(&documents), &loader::labels(&documents))
        .with_context(|| format!("Failed to index {}", config.sources.root.display()))?;

    if let Some(path) = config.index.snapshot_path.as_deref() {
        snapshot::save_index(path, &shared.snapshot())?;
    }
    Ok(count)
}

fn index_loaded(pipeline: &mut RetrievalPipeline, documents: &[LoadedDocument]) -> Result<usize> {
    let count = pipeline
        .index_labeled_documents(&loader::bodies(documents), &loader::labels(documents))
        .context("No indexable documents found")?;
    let pdfs = documents
        .iter()
        .filter(|d| d.kind == DocumentKind::Pdf)
        .count();
    info!(documents = documents.len(), pdfs, chunks = count, "indexed sources");
    Ok(count)
}

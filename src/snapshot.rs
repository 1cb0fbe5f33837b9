//! Index snapshots on disk.
//!
//! A snapshot is a pretty-printed JSON document holding the embedder
//! identity, the chunk configuration, and every index entry with its vector
//! stored as base64 over little-endian `f32` bytes. Raw vectors are stored
//! rather than normalized ones, so loading rebuilds the cached matrix exactly
//! as the original build did and search results match bit for bit.
//!
//! Loading refuses a snapshot written by a different embedder or dimension,
//! one whose chunk hashes no longer match their text, or one whose entry ids
//! are not `0..n`. The target pipeline is only modified once every check
//! has passed.

use anyhow::{bail, Context, Result};
use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use serde::{Deserialize, Serialize};
use std::path::Path;
use tracing::{info, warn};

use rag_harness_core::chunk::ChunkConfig;
use rag_harness_core::embedding::{blob_to_vec, vec_to_blob, EmbeddingProvider};
use rag_harness_core::index::VectorIndex;
use rag_harness_core::models::{Chunk, IndexEntry};
use rag_harness_core::pipeline::RetrievalPipeline;

pub const FORMAT_VERSION: u32 = 1;

#[derive(Debug, Serialize, Deserialize)]
struct SnapshotFile {
    format_version: u32,
    model: String,
    dims: usize,
    chunk_config: ChunkConfig,
    entries: Vec<SnapshotEntry>,
}

#[derive(Debug, Serialize, Deserialize)]
struct SnapshotEntry {
    id: usize,
    chunk: Chunk,
    /// Base64 of the little-endian f32 bytes.
    vector: String,
}

/// Write the pipeline's current index to `path`, replacing any existing file.
pub fn save_index(path: &Path, pipeline: &RetrievalPipeline) -> Result<()> {
    let index = pipeline
        .index()
        .context("Cannot save snapshot: no index has been built")?;

    let snapshot = SnapshotFile {
        format_version: FORMAT_VERSION,
        model: pipeline.embedder().model_name().to_string(),
        dims: pipeline.embedder().dims(),
        chunk_config: *pipeline.chunk_config(),
        entries: index
            .entries()
            .iter()
            .map(|e| SnapshotEntry {
                id: e.id,
                chunk: e.metadata.clone(),
                vector: STANDARD.encode(vec_to_blob(&e.vector)),
            })
            .collect(),
    };

    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("Failed to create {}", parent.display()))?;
    }

    // Write-then-rename so a crash never leaves a truncated snapshot behind.
    let tmp = path.with_extension("tmp");
    let json = serde_json::to_string_pretty(&snapshot)?;
    std::fs::write(&tmp, json).with_context(|| format!("Failed to write {}", tmp.display()))?;
    std::fs::rename(&tmp, path)
        .with_context(|| format!("Failed to move snapshot into {}", path.display()))?;

    info!(
        path = %path.display(),
        entries = snapshot.entries.len(),
        model = %snapshot.model,
        "saved index snapshot"
    );
    Ok(())
}

/// Load a snapshot from `path` into `pipeline`, replacing its index.
///
/// Returns the number of entries restored.
pub fn load_index(path: &Path, pipeline: &mut RetrievalPipeline) -> Result<usize> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read snapshot: {}", path.display()))?;
    let snapshot: SnapshotFile = serde_json::from_str(&content)
        .with_context(|| format!("Failed to parse snapshot: {}", path.display()))?;

    if snapshot.format_version != FORMAT_VERSION {
        bail!(
            "Unsupported snapshot format version {} (expected {})",
            snapshot.format_version,
            FORMAT_VERSION
        );
    }

    let model = pipeline.embedder().model_name();
    if snapshot.model != model {
        bail!(
            "Snapshot was built with embedder '{}', but the pipeline uses '{}'",
            snapshot.model,
            model
        );
    }
    let dims = pipeline.embedder().dims();
    if snapshot.dims != dims {
        bail!(
            "Snapshot dimension {} does not match embedder dimension {}",
            snapshot.dims,
            dims
        );
    }
    if snapshot.chunk_config != *pipeline.chunk_config() {
        warn!(
            snapshot = ?snapshot.chunk_config,
            pipeline = ?pipeline.chunk_config(),
            "snapshot was chunked with different settings; re-index to apply the current ones"
        );
    }
    if snapshot.entries.is_empty() {
        bail!("Snapshot contains no entries");
    }

    let mut entries = Vec::with_capacity(snapshot.entries.len());
    for entry in snapshot.entries {
        if !entry.chunk.verify_hash() {
            bail!("Chunk hash mismatch for entry {}", entry.id);
        }
        let blob = STANDARD
            .decode(entry.vector.as_bytes())
            .with_context(|| format!("Invalid vector encoding for entry {}", entry.id))?;
        if blob.len() != dims * 4 {
            bail!(
                "Entry {} has {} vector bytes, expected {}",
                entry.id,
                blob.len(),
                dims * 4
            );
        }
        entries.push(IndexEntry {
            id: entry.id,
            vector: blob_to_vec(&blob),
            metadata: entry.chunk,
        });
    }

    let index = VectorIndex::from_entries(entries).context("Snapshot entries are invalid")?;
    let count = index.len();
    pipeline.restore_index(index)?;

    info!(path = %path.display(), entries = count, "loaded index snapshot");
    Ok(count)
}

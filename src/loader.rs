//! Document loading from a local directory tree.
//!
//! Walks `sources.root`, keeps files matching the include globs and none of
//! the exclude globs, and turns each into a [`LoadedDocument`]. Plain-text
//! files are read as UTF-8; `.pdf` files go through `pdf-extract`.
//!
//! A file that cannot be read, is not valid UTF-8, fails PDF extraction, is
//! larger than `max_file_bytes`, or has no text is skipped with a warning
//! rather than failing the whole load. Results are sorted by relative path,
//! so the position of a document in the returned list (its `doc_id` once
//! indexed) is stable across runs.

use anyhow::{bail, Context, Result};
use globset::{Glob, GlobSet, GlobSetBuilder};
use std::path::Path;
use tracing::{debug, warn};
use walkdir::WalkDir;

use crate::config::SourcesConfig;

/// Directories never worth indexing.
const ALWAYS_EXCLUDED: &[&str] = &["**/.git/**", "**/target/**", "**/node_modules/**"];

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DocumentKind {
    Text,
    Pdf,
}

#[derive(Debug, Clone)]
pub struct LoadedDocument {
    /// Path relative to the sources root, `/`-separated as produced by the
    /// walk. Becomes the chunk source label once indexed.
    pub relative_path: String,
    pub kind: DocumentKind,
    pub body: String,
}

pub fn load_documents(sources: &SourcesConfig) -> Result<Vec<LoadedDocument>> {
    let root = &sources.root;
    if !root.exists() {
        bail!("Sources root does not exist: {}", root.display());
    }

    let include_set = build_globset(&sources.include_globs)?;
    let mut excludes: Vec<String> = ALWAYS_EXCLUDED.iter().map(|s| s.to_string()).collect();
    excludes.extend(sources.exclude_globs.iter().cloned());
    let exclude_set = build_globset(&excludes)?;

    let mut documents = Vec::new();

    for entry in WalkDir::new(root).follow_links(sources.follow_symlinks) {
        let entry = match entry {
            Ok(e) => e,
            Err(e) => {
                warn!("skipping unreadable entry: {}", e);
                continue;
            }
        };
        if !entry.file_type().is_file() {
            continue;
        }

        let path = entry.path();
        let relative = path.strip_prefix(root).unwrap_or(path);
        let rel_str = relative.to_string_lossy().to_string();

        if exclude_set.is_match(&rel_str) || !include_set.is_match(&rel_str) {
            continue;
        }

        let size = match entry.metadata() {
            Ok(m) => m.len(),
            Err(e) => {
                warn!(path = %rel_str, "skipping file: {}", e);
                continue;
            }
        };
        if size > sources.max_file_bytes {
            warn!(
                path = %rel_str,
                size,
                limit = sources.max_file_bytes,
                "skipping file over size limit"
            );
            continue;
        }

        match read_document(path, rel_str.clone()) {
            Ok(doc) if doc.body.trim().is_empty() => {
                warn!(path = %rel_str, "skipping file with no text");
            }
            Ok(doc) => documents.push(doc),
            Err(e) => warn!(path = %rel_str, "skipping file: {:#}", e),
        }
    }

    documents.sort_by(|a, b| a.relative_path.cmp(&b.relative_path));
    debug!(count = documents.len(), root = %root.display(), "loaded documents");

    Ok(documents)
}

/// Load one file, text or PDF. Unlike [`load_documents`], failures are
/// returned rather than skipped. The file name stands in for the relative
/// path.
pub fn load_file(path: &Path) -> Result<LoadedDocument> {
    if !path.is_file() {
        bail!("Not a file: {}", path.display());
    }
    let name = path
        .file_name()
        .map(|n| n.to_string_lossy().to_string())
        .unwrap_or_default();
    read_document(path, name)
}

/// Document bodies in load order, ready for the pipeline.
pub fn bodies(documents: &[LoadedDocument]) -> Vec<&str> {
    documents.iter().map(|d| d.body.as_str()).collect()
}

/// Source labels matching [`bodies`].
pub fn labels(documents: &[LoadedDocument]) -> Vec<&str> {
    documents.iter().map(|d| d.relative_path.as_str()).collect()
}

fn read_document(path: &Path, relative_path: String) -> Result<LoadedDocument> {
    let kind = if is_pdf(path) {
        DocumentKind::Pdf
    } else {
        DocumentKind::Text
    };

    let body = match kind {
        DocumentKind::Pdf => {
            let bytes = std::fs::read(path)
                .with_context(|| format!("Failed to read {}", path.display()))?;
            extract_pdf(&bytes)
                .with_context(|| format!("Failed to extract {}", path.display()))?
        }
        DocumentKind::Text => std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read {}", path.display()))?,
    };

    Ok(LoadedDocument {
        relative_path,
        kind,
        body,
    })
}

fn is_pdf(path: &Path) -> bool {
    path.extension()
        .map(|e| e.eq_ignore_ascii_case("pdf"))
        .unwrap_or(false)
}

fn extract_pdf(bytes: &[u8]) -> Result<String> {
    pdf_extract::extract_text_from_mem(bytes)
        .map_err(|e| anyhow::anyhow!("PDF extraction failed: {}", e))
}

fn build_globset(patterns: &[String]) -> Result<GlobSet> {
    let mut builder = GlobSetBuilder::new();
    for pattern in patterns {
        builder.add(Glob::new(pattern).with_context(|| format!("Invalid glob: {}", pattern))?);
    }
    Ok(builder.build()?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    fn sources(root: &Path) -> SourcesConfig {
        SourcesConfig {
            root: root.to_path_buf(),
            ..SourcesConfig::default()
        }
    }

    #[test]
    fn test_loads_sorted_and_filtered() {
        let tmp = TempDir::new().unwrap();
        fs::create_dir_all(tmp.path().join("sub")).unwrap();
        fs::create_dir_all(tmp.path().join(".git")).unwrap();
        fs::write(tmp.path().join("b.md"), "second").unwrap();
        fs::write(tmp.path().join("a.txt"), "first").unwrap();
        fs::write(tmp.path().join("sub/c.md"), "third").unwrap();
        fs::write(tmp.path().join("skip.rs"), "fn main() {}").unwrap();
        fs::write(tmp.path().join(".git/config.md"), "git").unwrap();

        let docs = load_documents(&sources(tmp.path())).unwrap();
        let paths: Vec<_> = docs.iter().map(|d| d.relative_path.as_str()).collect();
        assert_eq!(paths, vec!["a.txt", "b.md", "sub/c.md"]);
        assert_eq!(bodies(&docs), vec!["first", "second", "third"]);
        assert_eq!(labels(&docs), paths);
    }

    #[test]
    fn test_exclude_globs_and_size_limit() {
        let tmp = TempDir::new().unwrap();
        fs::write(tmp.path().join("keep.md"), "keep").unwrap();
        fs::write(tmp.path().join("draft.md"), "draft").unwrap();
        fs::write(tmp.path().join("big.md"), "x".repeat(64)).unwrap();

        let mut cfg = sources(tmp.path());
        cfg.exclude_globs = vec!["draft.md".to_string()];
        cfg.max_file_bytes = 32;

        let docs = load_documents(&cfg).unwrap();
        assert_eq!(docs.len(), 1);
        assert_eq!(docs[0].relative_path, "keep.md");
    }

    #[test]
    fn test_invalid_utf8_and_empty_files_skipped() {
        let tmp = TempDir::new().unwrap();
        fs::write(tmp.path().join("bad.txt"), b"\xff\xfe\x00").unwrap();
        fs::write(tmp.path().join("blank.txt"), "  \n ").unwrap();
        fs::write(tmp.path().join("ok.txt"), "fine").unwrap();

        let docs = load_documents(&sources(tmp.path())).unwrap();
        assert_eq!(docs.len(), 1);
        assert_eq!(docs[0].body, "fine");
    }

    #[test]
    fn test_missing_root_is_error() {
        let err = load_documents(&sources(Path::new("/nonexistent/docs"))).unwrap_err();
        assert!(err.to_string().contains("does not exist"));
    }

    #[test]
    fn test_invalid_glob_is_error() {
        let tmp = TempDir::new().unwrap();
        let mut cfg = sources(tmp.path());
        cfg.include_globs = vec!["[".to_string()];
        assert!(load_documents(&cfg).is_err());
    }

    #[test]
    fn test_load_file_text_and_bad_pdf() {
        let tmp = TempDir::new().unwrap();
        let txt = tmp.path().join("notes.txt");
        fs::write(&txt, "hello").unwrap();
        let doc = load_file(&txt).unwrap();
        assert_eq!(doc.kind, DocumentKind::Text);
        assert_eq!(doc.relative_path, "notes.txt");

        let pdf = tmp.path().join("broken.PDF");
        fs::write(&pdf, b"not a pdf").unwrap();
        assert!(load_file(&pdf).is_err());

        assert!(load_file(tmp.path()).is_err());
    }
}

//! Exact (brute-force) vector index.
//!
//! [`VectorIndex`] owns a fixed set of [`IndexEntry`] values and answers
//! top-K queries by scoring the query against every entry. Results are
//! exact; the cost is `O(entries × dims)` per search.
//!
//! # Cosine fast path
//!
//! Every entry vector is L2-normalized once at build time into a flat
//! row-major matrix. A cosine query then normalizes the query vector once
//! and takes a dot product per row, which equals the pairwise cosine
//! formula without recomputing entry norms per search. Zero vectors (entry
//! or query) normalize to themselves, giving a similarity of 0 instead of
//! NaN.
//!
//! # Ordering
//!
//! Cosine ranks by descending score, L2 by ascending distance. Equal
//! scores are ordered by ascending entry id, so output is fully
//! deterministic.
//!
//! # Concurrency
//!
//! An index is immutable after [`VectorIndex::build`]; `&VectorIndex` can
//! be shared across threads and searched in parallel. Rebuilding means
//! building a new index.

use std::cmp::Ordering;
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::embedding::{dot, l2_distance, normalize_in_place};
use crate::error::{RagError, Result};
use crate::models::{IndexEntry, SearchResult};

/// Similarity measure used to rank entries.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Metric {
    /// Cosine similarity; higher is more similar.
    #[default]
    Cosine,
    /// Euclidean distance over raw vectors; lower is more similar.
    L2,
}

impl Metric {
    pub fn as_str(&self) -> &'static str {
        match self {
            Metric::Cosine => "cosine",
            Metric::L2 => "l2",
        }
    }

    /// Ordering that puts the better of two scores first.
    ///
    /// Adding `0.0` folds `-0.0` into `+0.0`, so zero scores tie and fall
    /// through to the id order.
    fn compare(&self, a: f32, b: f32) -> Ordering {
        let (a, b) = (a + 0.0, b + 0.0);
        match self {
            Metric::Cosine => b.total_cmp(&a),
            Metric::L2 => a.total_cmp(&b),
        }
    }
}

impl FromStr for Metric {
    type Err = RagError;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "cosine" => Ok(Metric::Cosine),
            "l2" => Ok(Metric::L2),
            other => Err(RagError::config(format!(
                "unknown metric: '{}'. Use cosine or l2.",
                other
            ))),
        }
    }
}

impl fmt::Display for Metric {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Immutable collection of vectors with a cached normalized copy.
#[derive(Debug, Clone)]
pub struct VectorIndex<M> {
    entries: Vec<IndexEntry<M>>,
    /// `entries.len() * dims` values; row `i` is `entries[i].vector / ||entries[i].vector||`.
    normalized: Vec<f32>,
    dims: usize,
}

impl<M> VectorIndex<M> {
    /// Build an index from parallel `vectors` and `metadata`.
    ///
    /// Entry ids are positions in the input. An empty input builds an empty
    /// index, which answers every search with no results.
    ///
    /// # Errors
    ///
    /// [`RagError::Configuration`] when the two inputs differ in length,
    /// vectors differ in dimension, a vector is empty, or any component is
    /// not finite. Nothing is built in that case.
    pub fn build(vectors: Vec<Vec<f32>>, metadata: Vec<M>) -> Result<Self> {
        if vectors.len() != metadata.len() {
            return Err(RagError::config(format!(
                "got {} vectors but {} metadata values",
                vectors.len(),
                metadata.len()
            )));
        }

        let dims = vectors.first().map(Vec::len).unwrap_or(0);
        for (i, v) in vectors.iter().enumerate() {
            if v.len() != dims {
                return Err(RagError::config(format!(
                    "vector {} has dimension {}, expected {}",
                    i,
                    v.len(),
                    dims
                )));
            }
            if dims == 0 {
                return Err(RagError::config("vectors must not be empty"));
            }
            check_finite(v, || format!("vector {}", i))?;
        }

        let entries = vectors
            .into_iter()
            .zip(metadata)
            .enumerate()
            .map(|(id, (vector, metadata))| IndexEntry {
                id,
                vector,
                metadata,
            })
            .collect();

        let mut index = Self {
            entries,
            normalized: Vec::new(),
            dims,
        };
        index.normalize();
        debug!(entries = index.len(), dims, "built vector index");
        Ok(index)
    }

    /// Rebuild an index from entries previously taken out of one, checking
    /// that ids are still `0..n` in order.
    pub fn from_entries(entries: Vec<IndexEntry<M>>) -> Result<Self> {
        if let Some((pos, e)) = entries.iter().enumerate().find(|(pos, e)| e.id != *pos) {
            return Err(RagError::config(format!(
                "entry at position {} has id {}",
                pos, e.id
            )));
        }
        let (vectors, metadata) = entries
            .into_iter()
            .map(|e| (e.vector, e.metadata))
            .unzip();
        Self::build(vectors, metadata)
    }

    /// Recompute the normalized matrix from the raw vectors.
    fn normalize(&mut self) {
        let mut normalized = Vec::with_capacity(self.entries.len() * self.dims);
        for entry in &self.entries {
            let start = normalized.len();
            normalized.extend_from_slice(&entry.vector);
            normalize_in_place(&mut normalized[start..]);
        }
        self.normalized = normalized;
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Vector dimension shared by all entries; 0 for an empty index.
    pub fn dims(&self) -> usize {
        self.dims
    }

    pub fn entries(&self) -> &[IndexEntry<M>] {
        &self.entries
    }

    pub fn get(&self, id: usize) -> Option<&IndexEntry<M>> {
        self.entries.get(id)
    }

    pub fn into_entries(self) -> Vec<IndexEntry<M>> {
        self.entries
    }

    /// Normalized row for entry `id`.
    pub fn normalized_vector(&self, id: usize) -> Option<&[f32]> {
        if id >= self.entries.len() {
            return None;
        }
        Some(&self.normalized[id * self.dims..(id + 1) * self.dims])
    }

    /// Cosine similarity of `query` against every entry, in id order.
    pub fn score_cosine(&self, query: &[f32]) -> Result<Vec<f32>> {
        if self.is_empty() {
            return Ok(Vec::new());
        }
        self.check_query(query)?;

        let mut q = query.to_vec();
        normalize_in_place(&mut q);

        Ok(self
            .normalized
            .chunks_exact(self.dims)
            .map(|row| dot(row, &q))
            .collect())
    }

    /// Euclidean distance from `query` to every raw entry vector, in id order.
    pub fn score_l2(&self, query: &[f32]) -> Result<Vec<f32>> {
        if self.is_empty() {
            return Ok(Vec::new());
        }
        self.check_query(query)?;

        Ok(self
            .entries
            .iter()
            .map(|e| l2_distance(&e.vector, query))
            .collect())
    }

    /// Score every entry under `metric`.
    pub fn score(&self, query: &[f32], metric: Metric) -> Result<Vec<f32>> {
        match metric {
            Metric::Cosine => self.score_cosine(query),
            Metric::L2 => self.score_l2(query),
        }
    }

    /// Return the `min(k, len)` best entries for `query`, best first.
    ///
    /// `k = 0` and an empty index both yield an empty result.
    ///
    /// # Errors
    ///
    /// [`RagError::Configuration`] when the query's dimension differs from
    /// the index's or it contains non-finite values.
    pub fn search(
        &self,
        query: &[f32],
        k: usize,
        metric: Metric,
    ) -> Result<Vec<SearchResult<'_, M>>> {
        if k == 0 || self.is_empty() {
            return Ok(Vec::new());
        }

        let scores = self.score(query, metric)?;
        let ranked = top_k(&scores, k, metric);
        debug!(k, %metric, candidates = scores.len(), returned = ranked.len(), "vector search");

        Ok(ranked
            .into_iter()
            .map(|id| SearchResult {
                id,
                score: scores[id],
                metadata: &self.entries[id].metadata,
            })
            .collect())
    }

    /// Like [`search`](Self::search) but takes the metric by name.
    pub fn search_by_name(
        &self,
        query: &[f32],
        k: usize,
        metric: &str,
    ) -> Result<Vec<SearchResult<'_, M>>> {
        let metric = metric.parse::<Metric>()?;
        self.search(query, k, metric)
    }

    fn check_query(&self, query: &[f32]) -> Result<()> {
        if query.len() != self.dims {
            return Err(RagError::dimension_mismatch(self.dims, query.len()));
        }
        check_finite(query, || "query vector".to_string())
    }
}

/// Ids of the `k` best scores, best first, ties broken by lower id.
///
/// Partially selects the best `k` before sorting them, so the cost is
/// `O(n + k log k)` instead of a full sort.
pub fn top_k(scores: &[f32], k: usize, metric: Metric) -> Vec<usize> {
    let k = k.min(scores.len());
    if k == 0 {
        return Vec::new();
    }

    let cmp = |a: &usize, b: &usize| metric.compare(scores[*a], scores[*b]).then(a.cmp(b));

    let mut ids: Vec<usize> = (0..scores.len()).collect();
    if k < ids.len() {
        ids.select_nth_unstable_by(k - 1, cmp);
        ids.truncate(k);
    }
    ids.sort_unstable_by(cmp);
    ids
}

fn check_finite(v: &[f32], what: impl FnOnce() -> String) -> Result<()> {
    match v.iter().position(|x| !x.is_finite()) {
        Some(pos) => Err(RagError::config(format!(
            "{} has a non-finite value at position {}",
            what(),
            pos
        ))),
        None => Ok(()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::embedding::{cosine_similarity, l2_norm};

    fn abc_index() -> VectorIndex<&'static str> {
        VectorIndex::build(
            vec![vec![1.0, 0.0], vec![0.0, 1.0], vec![1.0, 1.0]],
            vec!["A", "B", "C"],
        )
        .unwrap()
    }

    /// Small deterministic pseudo-random vectors without pulling in an RNG.
    fn lcg_vectors(n: usize, dims: usize, mut state: u64) -> Vec<Vec<f32>> {
        (0..n)
            .map(|_| {
                (0..dims)
                    .map(|_| {
                        state = state
                            .wrapping_mul(6364136223846793005)
                            .wrapping_add(1442695040888963407);
                        ((state >> 33) as f32 / (1u64 << 31) as f32) - 0.5
                    })
                    .collect()
            })
            .collect()
    }

    #[test]
    fn test_cosine_scenario() {
        let index = abc_index();
        let results = index.search(&[1.0, 0.0], 2, Metric::Cosine).unwrap();
        let labels: Vec<&str> = results.iter().map(|r| *r.metadata).collect();
        assert_eq!(labels, vec!["A", "C"]);
        assert!((results[0].score - 1.0).abs() < 1e-6);
        assert!((results[1].score - std::f32::consts::FRAC_1_SQRT_2).abs() < 1e-6);
    }

    #[test]
    fn test_k_zero_returns_empty() {
        let index = abc_index();
        assert!(index.search(&[1.0, 0.0], 0, Metric::Cosine).unwrap().is_empty());
        assert!(index.search(&[1.0, 0.0], 0, Metric::L2).unwrap().is_empty());
    }

    #[test]
    fn test_k_larger_than_len_is_clamped() {
        let index = abc_index();
        assert_eq!(index.search(&[1.0, 0.0], 10, Metric::Cosine).unwrap().len(), 3);
    }

    #[test]
    fn test_empty_index_search_is_empty() {
        let index: VectorIndex<()> = VectorIndex::build(Vec::new(), Vec::new()).unwrap();
        assert!(index.is_empty());
        assert_eq!(index.dims(), 0);
        assert!(index.search(&[1.0, 2.0, 3.0], 5, Metric::Cosine).unwrap().is_empty());
    }

    #[test]
    fn test_build_rejects_bad_input() {
        assert!(matches!(
            VectorIndex::build(vec![vec![1.0]], vec!["a", "b"]),
            Err(RagError::Configuration(_))
        ));
        assert!(matches!(
            VectorIndex::build(vec![vec![1.0, 2.0], vec![1.0]], vec!["a", "b"]),
            Err(RagError::Configuration(_))
        ));
        assert!(VectorIndex::build(vec![vec![f32::NAN, 1.0]], vec!["a"]).is_err());
        assert!(VectorIndex::build(vec![Vec::new()], vec!["a"]).is_err());
    }

    #[test]
    fn test_query_dimension_mismatch_rejected() {
        let index = abc_index();
        assert!(matches!(
            index.search(&[1.0, 0.0, 0.0], 1, Metric::Cosine),
            Err(RagError::Configuration(_))
        ));
        assert!(index.score_l2(&[1.0]).is_err());
        assert!(index.score_cosine(&[f32::INFINITY, 0.0]).is_err());
    }

    #[test]
    fn test_unknown_metric_rejected() {
        let index = abc_index();
        assert!(matches!(
            index.search_by_name(&[1.0, 0.0], 1, "dot"),
            Err(RagError::Configuration(_))
        ));
        assert_eq!("l2".parse::<Metric>().unwrap(), Metric::L2);
        assert_eq!(Metric::Cosine.to_string(), "cosine");
    }

    #[test]
    fn test_normalized_rows_are_unit_length() {
        let vectors = lcg_vectors(20, 16, 7);
        let index = VectorIndex::build(vectors, vec![(); 20]).unwrap();
        for id in 0..index.len() {
            let n = l2_norm(index.normalized_vector(id).unwrap());
            assert!((n - 1.0).abs() < 1e-5, "row {} has norm {}", id, n);
        }
        assert!(index.normalized_vector(20).is_none());
    }

    #[test]
    fn test_zero_vectors_score_zero() {
        let index = VectorIndex::build(vec![vec![0.0, 0.0], vec![1.0, 0.0]], vec![0, 1]).unwrap();
        assert_eq!(index.normalized_vector(0).unwrap(), &[0.0, 0.0]);
        let scores = index.score_cosine(&[1.0, 0.0]).unwrap();
        assert_eq!(scores[0], 0.0);

        let zero_query = index.score_cosine(&[0.0, 0.0]).unwrap();
        assert!(zero_query.iter().all(|s| *s == 0.0));
    }

    #[test]
    fn test_batch_cosine_matches_pairwise() {
        let vectors = lcg_vectors(50, 24, 99);
        let query = lcg_vectors(1, 24, 12345).remove(0);
        let index = VectorIndex::build(vectors.clone(), vec![(); 50]).unwrap();
        let batch = index.score_cosine(&query).unwrap();
        for (i, v) in vectors.iter().enumerate() {
            let reference = cosine_similarity(&query, v);
            assert!(
                (batch[i] - reference).abs() < 1e-5,
                "entry {}: {} vs {}",
                i,
                batch[i],
                reference
            );
        }
    }

    #[test]
    fn test_top_k_consistent_with_full_sort() {
        let vectors = lcg_vectors(40, 8, 3);
        let query = lcg_vectors(1, 8, 4).remove(0);
        let index = VectorIndex::build(vectors, vec![(); 40]).unwrap();

        for metric in [Metric::Cosine, Metric::L2] {
            let scores = index.score(&query, metric).unwrap();
            let mut expected: Vec<usize> = (0..scores.len()).collect();
            expected.sort_by(|a, b| metric.compare(scores[*a], scores[*b]).then(a.cmp(b)));

            for k in [1, 5, 17, 40] {
                let got: Vec<usize> = index
                    .search(&query, k, metric)
                    .unwrap()
                    .iter()
                    .map(|r| r.id)
                    .collect();
                assert_eq!(got, expected[..k].to_vec(), "{} k={}", metric, k);
            }
        }
    }

    #[test]
    fn test_cosine_scores_strictly_ordered() {
        let vectors = lcg_vectors(30, 8, 11);
        let index = VectorIndex::build(vectors, vec![(); 30]).unwrap();
        let results = index.search(&[0.3; 8], 10, Metric::Cosine).unwrap();
        for pair in results.windows(2) {
            assert!(
                pair[0].score > pair[1].score
                    || (pair[0].score == pair[1].score && pair[0].id < pair[1].id)
            );
        }
    }

    #[test]
    fn test_ties_broken_by_lower_id() {
        let index = VectorIndex::build(
            vec![vec![0.0, 1.0], vec![2.0, 0.0], vec![1.0, 0.0], vec![5.0, 0.0]],
            vec!["w", "x", "y", "z"],
        )
        .unwrap();
        let results = index.search(&[1.0, 0.0], 3, Metric::Cosine).unwrap();
        let ids: Vec<usize> = results.iter().map(|r| r.id).collect();
        assert_eq!(ids, vec![1, 2, 3]);
    }

    #[test]
    fn test_zero_query_ties_follow_id_order() {
        // Dot products against an all-negative row come out as -0.0.
        let index = VectorIndex::build(
            vec![vec![-1.0, -1.0], vec![1.0, 1.0], vec![-2.0, -3.0]],
            vec!["a", "b", "c"],
        )
        .unwrap();
        let results = index.search(&[0.0, 0.0], 3, Metric::Cosine).unwrap();
        let ids: Vec<usize> = results.iter().map(|r| r.id).collect();
        assert_eq!(ids, vec![0, 1, 2]);
        assert!(results.iter().all(|r| r.score == 0.0));

        assert_eq!(top_k(&[0.0, -0.0, 0.0], 2, Metric::Cosine), vec![0, 1]);
        assert_eq!(top_k(&[-0.0, 0.0], 2, Metric::L2), vec![0, 1]);
    }

    #[test]
    fn test_l2_ranks_ascending() {
        let index = VectorIndex::build(
            vec![vec![10.0, 0.0], vec![1.0, 0.0], vec![0.0, 3.0]],
            vec!["far", "near", "mid"],
        )
        .unwrap();
        let results = index.search(&[0.0, 0.0], 3, Metric::L2).unwrap();
        let labels: Vec<&str> = results.iter().map(|r| *r.metadata).collect();
        assert_eq!(labels, vec!["near", "mid", "far"]);
        assert!((results[1].score - 3.0).abs() < 1e-6);
    }

    #[test]
    fn test_from_entries_roundtrip() {
        let index = abc_index();
        let entries = index.clone().into_entries();
        let rebuilt = VectorIndex::from_entries(entries).unwrap();
        assert_eq!(rebuilt.entries(), index.entries());

        let mut shuffled = index.into_entries();
        shuffled.swap(0, 1);
        assert!(VectorIndex::from_entries(shuffled).is_err());
    }

    #[test]
    fn test_concurrent_searches_share_index() {
        let vectors = lcg_vectors(100, 16, 5);
        let index = VectorIndex::build(vectors, (0..100).collect::<Vec<usize>>()).unwrap();
        let query = lcg_vectors(1, 16, 6).remove(0);
        let expected: Vec<usize> = index
            .search(&query, 5, Metric::Cosine)
            .unwrap()
            .iter()
            .map(|r| r.id)
            .collect();

        std::thread::scope(|s| {
            let handles: Vec<_> = (0..4)
                .map(|_| {
                    s.spawn(|| {
                        index
                            .search(&query, 5, Metric::Cosine)
                            .unwrap()
                            .iter()
                            .map(|r| r.id)
                            .collect::<Vec<usize>>()
                    })
                })
                .collect();
            for h in handles {
                assert_eq!(h.join().unwrap(), expected);
            }
        });
    }
}

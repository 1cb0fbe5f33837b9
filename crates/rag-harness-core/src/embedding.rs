//! Deterministic text embedders and vector utilities.
//!
//! Two embedders live behind the [`Embedder`] enum:
//!
//! - **[`HashEmbedder`]**: seeds a pseudo-random generator from a stable
//!   hash of the text and draws a unit-length Gaussian vector. Useful for
//!   simulation and tests: identical text always lands on the identical
//!   vector, unrelated text lands somewhere uncorrelated.
//! - **[`VocabularyEmbedder`]**: tokenizes into known subword units,
//!   maps them to ids, and looks rows up in a fixed embedding matrix.
//!
//! Both are pure functions of their construction parameters and the input
//! text, in this process and in any other built from the same code. The
//! hash is FNV-1a over UTF-8 bytes, never the runtime's randomized hasher,
//! and the generator is ChaCha8, whose output stream is specified.
//!
//! # Example
//!
//! ```rust
//! use rag_harness_core::embedding::{l2_norm, Embedder};
//!
//! let embedder = Embedder::hash_seeded(64).unwrap();
//! let a = embedder.embed("retrieval augmented generation");
//! let b = embedder.embed("retrieval augmented generation");
//! assert_eq!(a, b);
//! assert!((l2_norm(&a) - 1.0).abs() < 1e-5);
//! ```

use std::collections::HashMap;

use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;
use rand_distr::{Distribution, StandardNormal};

use crate::error::{RagError, Result};

/// Token emitted when no vocabulary entry matches.
pub const UNK_TOKEN: &str = "<UNK>";
/// Padding token; reserved id 0 in the built-in vocabulary.
pub const PAD_TOKEN: &str = "<PAD>";

/// Scale applied to vocabulary matrix rows.
const MATRIX_SCALE: f32 = 0.01;
/// Upper bound on `vocab_size * dims` (256 MiB of f32).
pub const MAX_MATRIX_VALUES: usize = 1 << 26;

const FNV_OFFSET_BASIS: u64 = 0xcbf2_9ce4_8422_2325;
const FNV_PRIME: u64 = 0x0000_0100_0000_01b3;

/// Trait for embedding providers.
///
/// Exposes the metadata callers need to check that two embedders (or an
/// embedder and a persisted index) produce comparable vectors.
pub trait EmbeddingProvider: Send + Sync {
    /// Identifier that changes whenever the produced vectors would change.
    fn model_name(&self) -> &str;
    /// Output vector dimensionality.
    fn dims(&self) -> usize;
}

/// Selects one embedding strategy at construction time.
#[derive(Debug, Clone)]
pub enum Embedder {
    HashSeeded(HashEmbedder),
    Vocabulary(VocabularyEmbedder),
}

impl Embedder {
    /// Hash-seeded Gaussian embedder with `dims` outputs.
    pub fn hash_seeded(dims: usize) -> Result<Self> {
        Ok(Embedder::HashSeeded(HashEmbedder::new(dims)?))
    }

    /// Vocabulary-lookup embedder over the built-in vocabulary.
    pub fn vocabulary(vocab_size: usize, dims: usize, seed: u64) -> Result<Self> {
        Ok(Embedder::Vocabulary(VocabularyEmbedder::new(
            vocab_size, dims, seed,
        )?))
    }

    /// Embed one text. Never fails; empty text has a defined vector too.
    pub fn embed(&self, text: &str) -> Vec<f32> {
        match self {
            Embedder::HashSeeded(e) => e.embed(text),
            Embedder::Vocabulary(e) => e.embed(text),
        }
    }

    pub fn embed_batch<S: AsRef<str>>(&self, texts: &[S]) -> Vec<Vec<f32>> {
        texts.iter().map(|t| self.embed(t.as_ref())).collect()
    }
}

impl EmbeddingProvider for Embedder {
    fn model_name(&self) -> &str {
        match self {
            Embedder::HashSeeded(e) => e.model_name(),
            Embedder::Vocabulary(e) => e.model_name(),
        }
    }

    fn dims(&self) -> usize {
        match self {
            Embedder::HashSeeded(e) => e.dims(),
            Embedder::Vocabulary(e) => e.dims(),
        }
    }
}

// ============ Hash-seeded embedder ============

/// Maps text to a unit vector drawn from a generator seeded by its hash.
#[derive(Debug, Clone)]
pub struct HashEmbedder {
    dims: usize,
    model: String,
}

impl HashEmbedder {
    pub fn new(dims: usize) -> Result<Self> {
        if dims == 0 {
            return Err(RagError::config("embedding dims must be > 0"));
        }
        Ok(Self {
            dims,
            model: format!("hash-seeded/fnv1a-chacha8/d{}", dims),
        })
    }

    /// Seed used for `text`: FNV-1a 64-bit reduced modulo 2^32.
    pub fn seed_for(text: &str) -> u64 {
        fnv1a_64(text.as_bytes()) % (1u64 << 32)
    }

    pub fn embed(&self, text: &str) -> Vec<f32> {
        let mut rng = ChaCha8Rng::seed_from_u64(Self::seed_for(text));
        let mut vec: Vec<f32> = (0..self.dims)
            .map(|_| StandardNormal.sample(&mut rng))
            .collect();
        normalize_in_place(&mut vec);
        vec
    }
}

impl EmbeddingProvider for HashEmbedder {
    fn model_name(&self) -> &str {
        &self.model
    }
    fn dims(&self) -> usize {
        self.dims
    }
}

/// 64-bit FNV-1a.
pub fn fnv1a_64(bytes: &[u8]) -> u64 {
    bytes.iter().fold(FNV_OFFSET_BASIS, |hash, &b| {
        (hash ^ u64::from(b)).wrapping_mul(FNV_PRIME)
    })
}

// ============ Vocabulary-lookup embedder ============

/// Subword vocabulary plus a `vocab_size × dims` embedding matrix.
///
/// Every token the vocabulary does not know maps to the `<UNK>` id, so all
/// unknown tokens share one matrix row.
#[derive(Debug, Clone)]
pub struct VocabularyEmbedder {
    dims: usize,
    vocab_size: usize,
    token_to_id: HashMap<String, usize>,
    unk_id: usize,
    /// Row-major, `vocab_size * dims` values.
    matrix: Vec<f32>,
    model: String,
}

/// The built-in toy vocabulary.
pub fn default_vocabulary() -> Vec<(String, usize)> {
    [
        (PAD_TOKEN, 0),
        (UNK_TOKEN, 1),
        ("hello", 2),
        ("world", 3),
        ("##ing", 4),
        ("embed", 5),
        ("##ding", 6),
        ("test", 7),
        ("rag", 8),
    ]
    .into_iter()
    .map(|(t, id)| (t.to_string(), id))
    .collect()
}

impl VocabularyEmbedder {
    pub fn new(vocab_size: usize, dims: usize, seed: u64) -> Result<Self> {
        Self::with_vocabulary(default_vocabulary(), vocab_size, dims, seed)
    }

    /// Build from a custom vocabulary. It must contain `<UNK>` and every id
    /// must fit in `vocab_size` rows.
    pub fn with_vocabulary<I>(vocab: I, vocab_size: usize, dims: usize, seed: u64) -> Result<Self>
    where
        I: IntoIterator<Item = (String, usize)>,
    {
        if dims == 0 {
            return Err(RagError::config("embedding dims must be > 0"));
        }
        let token_to_id: HashMap<String, usize> = vocab.into_iter().collect();
        if let Some((token, id)) = token_to_id.iter().find(|(_, &id)| id >= vocab_size) {
            return Err(RagError::config(format!(
                "token '{}' has id {} outside vocab_size {}",
                token, id, vocab_size
            )));
        }
        let unk_id = *token_to_id
            .get(UNK_TOKEN)
            .ok_or_else(|| RagError::config("vocabulary must contain <UNK>"))?;

        let cells = vocab_size
            .checked_mul(dims)
            .filter(|&n| n <= MAX_MATRIX_VALUES)
            .ok_or_else(|| {
                RagError::config(format!(
                    "embedding matrix of {} x {} exceeds {} values",
                    vocab_size, dims, MAX_MATRIX_VALUES
                ))
            })?;

        let mut rng = ChaCha8Rng::seed_from_u64(seed);
        let matrix = (0..cells)
            .map(|_| {
                let v: f32 = StandardNormal.sample(&mut rng);
                v * MATRIX_SCALE
            })
            .collect();

        Ok(Self {
            dims,
            vocab_size,
            token_to_id,
            unk_id,
            matrix,
            model: format!("vocabulary-lookup/v{}/seed{}/d{}", vocab_size, seed, dims),
        })
    }

    pub fn vocab_size(&self) -> usize {
        self.vocab_size
    }

    pub fn unk_id(&self) -> usize {
        self.unk_id
    }

    /// Lowercase, split on whitespace, then match each word against the
    /// vocabulary: whole word, else longest known prefix followed by the
    /// `##`-marked remainder (or `<UNK>` when the remainder is unknown),
    /// else `<UNK>`.
    pub fn tokenize(&self, text: &str) -> Vec<String> {
        let lowered = text.to_lowercase();
        let mut tokens = Vec::new();

        for word in lowered.split_whitespace() {
            if self.token_to_id.contains_key(word) {
                tokens.push(word.to_string());
                continue;
            }

            let boundaries: Vec<usize> = word.char_indices().map(|(i, _)| i).skip(1).collect();
            let prefix_split = boundaries
                .into_iter()
                .rev()
                .find(|&i| self.token_to_id.contains_key(&word[..i]));

            match prefix_split {
                Some(i) => {
                    tokens.push(word[..i].to_string());
                    let suffix = format!("##{}", &word[i..]);
                    if self.token_to_id.contains_key(&suffix) {
                        tokens.push(suffix);
                    } else {
                        tokens.push(UNK_TOKEN.to_string());
                    }
                }
                None => tokens.push(UNK_TOKEN.to_string()),
            }
        }

        tokens
    }

    pub fn encode<S: AsRef<str>>(&self, tokens: &[S]) -> Vec<usize> {
        tokens
            .iter()
            .map(|t| {
                self.token_to_id
                    .get(t.as_ref())
                    .copied()
                    .unwrap_or(self.unk_id)
            })
            .collect()
    }

    /// Matrix rows for `ids`, in order.
    pub fn lookup(&self, ids: &[usize]) -> Result<Vec<&[f32]>> {
        ids.iter()
            .map(|&id| {
                if id >= self.vocab_size {
                    return Err(RagError::config(format!(
                        "token id {} outside vocab_size {}",
                        id, self.vocab_size
                    )));
                }
                Ok(&self.matrix[id * self.dims..(id + 1) * self.dims])
            })
            .collect()
    }

    /// One row per token of `text`.
    pub fn token_vectors(&self, text: &str) -> Vec<Vec<f32>> {
        self.encode(&self.tokenize(text))
            .into_iter()
            .map(|id| self.row(id).to_vec())
            .collect()
    }

    /// Mean of the token rows; the zero vector when `text` has no tokens.
    /// Not normalized.
    pub fn embed(&self, text: &str) -> Vec<f32> {
        let ids = self.encode(&self.tokenize(text));
        let mut pooled = vec![0.0f32; self.dims];
        if ids.is_empty() {
            return pooled;
        }
        for &id in &ids {
            for (acc, v) in pooled.iter_mut().zip(self.row(id)) {
                *acc += v;
            }
        }
        let n = ids.len() as f32;
        pooled.iter_mut().for_each(|v| *v /= n);
        pooled
    }

    // Callers only pass ids produced by `encode`, which are always < vocab_size.
    fn row(&self, id: usize) -> &[f32] {
        &self.matrix[id * self.dims..(id + 1) * self.dims]
    }
}

impl EmbeddingProvider for VocabularyEmbedder {
    fn model_name(&self) -> &str {
        &self.model
    }
    fn dims(&self) -> usize {
        self.dims
    }
}

// ============ Vector utilities ============

/// Euclidean norm.
pub fn l2_norm(v: &[f32]) -> f32 {
    v.iter().map(|x| x * x).sum::<f32>().sqrt()
}

/// Divide by the norm, treating a zero norm as 1 so the zero vector maps
/// to itself instead of NaN.
pub fn normalize(v: &[f32]) -> Vec<f32> {
    let mut out = v.to_vec();
    normalize_in_place(&mut out);
    out
}

pub fn normalize_in_place(v: &mut [f32]) {
    let norm = l2_norm(v);
    let norm = if norm == 0.0 { 1.0 } else { norm };
    v.iter_mut().for_each(|x| *x /= norm);
}

/// Dot product over the shared prefix of `a` and `b`.
pub fn dot(a: &[f32], b: &[f32]) -> f32 {
    a.iter().zip(b).map(|(x, y)| x * y).sum()
}

/// Euclidean distance; callers guarantee equal lengths.
pub fn l2_distance(a: &[f32], b: &[f32]) -> f32 {
    a.iter()
        .zip(b)
        .map(|(x, y)| {
            let d = x - y;
            d * d
        })
        .sum::<f32>()
        .sqrt()
}

/// Pairwise cosine similarity, computed from scratch.
///
/// The index never calls this on its hot path (it pre-normalizes and takes
/// dot products instead); it exists as the reference formula.
///
/// Returns `0.0` for empty vectors, vectors of different lengths, or when
/// either vector is zero.
pub fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    if a.len() != b.len() || a.is_empty() {
        return 0.0;
    }

    let mut dot = 0.0f32;
    let mut norm_a = 0.0f32;
    let mut norm_b = 0.0f32;

    for (x, y) in a.iter().zip(b.iter()) {
        dot += x * y;
        norm_a += x * x;
        norm_b += y * y;
    }

    let denom = norm_a.sqrt() * norm_b.sqrt();
    if denom < f32::EPSILON {
        return 0.0;
    }

    dot / denom
}

/// Encode a float vector as little-endian f32 bytes.
///
/// ```rust
/// use rag_harness_core::embedding::{vec_to_blob, blob_to_vec};
///
/// let v = vec![1.0f32, -2.5, 3.125];
/// let blob = vec_to_blob(&v);
/// assert_eq!(blob.len(), 12);
/// assert_eq!(blob_to_vec(&blob), v);
/// ```
pub fn vec_to_blob(vec: &[f32]) -> Vec<u8> {
    let mut bytes = Vec::with_capacity(vec.len() * 4);
    for &v in vec {
        bytes.extend_from_slice(&v.to_le_bytes());
    }
    bytes
}

/// Reverses [`vec_to_blob`]. Trailing bytes that do not form a whole f32
/// are ignored.
pub fn blob_to_vec(blob: &[u8]) -> Vec<f32> {
    blob.chunks_exact(4)
        .map(|chunk| f32::from_le_bytes([chunk[0], chunk[1], chunk[2], chunk[3]]))
        .collect()
}

//! TOML configuration.
//!
//! Every section is optional; a missing file section falls back to the
//! defaults below, and [`Config::default`] is itself a valid configuration.
//! [`load_config`] validates everything up front so that misconfiguration
//! surfaces before any document is read or any index is built.

use anyhow::{bail, Context, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};

use rag_harness_core::chunk::ChunkConfig;
use rag_harness_core::embedding::Embedder;
use rag_harness_core::index::Metric;

#[derive(Debug, Deserialize, Clone, Default)]
pub struct Config {
    #[serde(default)]
    pub chunking: ChunkingConfig,
    #[serde(default)]
    pub embedding: EmbeddingConfig,
    #[serde(default)]
    pub retrieval: RetrievalConfig,
    #[serde(default)]
    pub generation: GenerationConfig,
    #[serde(default)]
    pub sources: SourcesConfig,
    #[serde(default)]
    pub history: HistoryConfig,
    #[serde(default)]
    pub index: IndexConfig,
}

#[derive(Debug, Deserialize, Clone)]
pub struct ChunkingConfig {
    #[serde(default = "default_chunk_size")]
    pub chunk_size: usize,
    #[serde(default = "default_chunk_overlap")]
    pub chunk_overlap: usize,
}

impl Default for ChunkingConfig {
    fn default() -> Self {
        Self {
            chunk_size: default_chunk_size(),
            chunk_overlap: default_chunk_overlap(),
        }
    }
}

fn default_chunk_size() -> usize {
    1000
}
fn default_chunk_overlap() -> usize {
    200
}

#[derive(Debug, Deserialize, Clone)]
pub struct EmbeddingConfig {
    #[serde(default = "default_embedding_provider")]
    pub provider: String,
    #[serde(default = "default_dims")]
    pub dims: usize,
    #[serde(default = "default_vocab_size")]
    pub vocab_size: usize,
    #[serde(default = "default_seed")]
    pub seed: u64,
}

impl Default for EmbeddingConfig {
    fn default() -> Self {
        Self {
            provider: default_embedding_provider(),
            dims: default_dims(),
            vocab_size: default_vocab_size(),
            seed: default_seed(),
        }
    }
}

fn default_embedding_provider() -> String {
    "hash".to_string()
}
fn default_dims() -> usize {
    128
}
fn default_vocab_size() -> usize {
    5000
}
fn default_seed() -> u64 {
    42
}

#[derive(Debug, Deserialize, Clone)]
pub struct RetrievalConfig {
    #[serde(default = "default_top_k")]
    pub top_k: usize,
    #[serde(default = "default_metric")]
    pub metric: String,
}

impl Default for RetrievalConfig {
    fn default() -> Self {
        Self {
            top_k: default_top_k(),
            metric: default_metric(),
        }
    }
}

fn default_top_k() -> usize {
    3
}
fn default_metric() -> String {
    "cosine".to_string()
}

impl RetrievalConfig {
    pub fn metric(&self) -> Result<Metric> {
        Ok(self.metric.parse::<Metric>()?)
    }
}

#[derive(Debug, Deserialize, Clone)]
pub struct GenerationConfig {
    #[serde(default = "default_generation_provider")]
    pub provider: String,
    #[serde(default)]
    pub model: Option<String>,
    #[serde(default)]
    pub temperature: f32,
    #[serde(default)]
    pub base_url: Option<String>,
    #[serde(default)]
    pub api_key_env: Option<String>,
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

impl Default for GenerationConfig {
    fn default() -> Self {
        Self {
            provider: default_generation_provider(),
            model: None,
            temperature: 0.0,
            base_url: None,
            api_key_env: None,
            timeout_secs: default_timeout_secs(),
        }
    }
}

fn default_generation_provider() -> String {
    "extractive".to_string()
}
fn default_timeout_secs() -> u64 {
    60
}

impl GenerationConfig {
    /// True for providers that call a remote chat-completions API.
    pub fn is_remote(&self) -> bool {
        matches!(self.provider.as_str(), "openai" | "qwen")
    }
}

#[derive(Debug, Deserialize, Clone)]
pub struct SourcesConfig {
    #[serde(default = "default_root")]
    pub root: PathBuf,
    #[serde(default = "default_include_globs")]
    pub include_globs: Vec<String>,
    #[serde(default)]
    pub exclude_globs: Vec<String>,
    #[serde(default)]
    pub follow_symlinks: bool,
    #[serde(default = "default_max_file_bytes")]
    pub max_file_bytes: u64,
}

impl Default for SourcesConfig {
    fn default() -> Self {
        Self {
            root: default_root(),
            include_globs: default_include_globs(),
            exclude_globs: Vec::new(),
            follow_symlinks: false,
            max_file_bytes: default_max_file_bytes(),
        }
    }
}

fn default_root() -> PathBuf {
    PathBuf::from("./docs")
}
fn default_include_globs() -> Vec<String> {
    vec![
        "**/*.md".to_string(),
        "**/*.txt".to_string(),
        "**/*.pdf".to_string(),
    ]
}
fn default_max_file_bytes() -> u64 {
    20 * 1024 * 1024
}

#[derive(Debug, Deserialize, Clone)]
pub struct HistoryConfig {
    #[serde(default = "default_history_enabled")]
    pub enabled: bool,
    #[serde(default = "default_export_dir")]
    pub export_dir: PathBuf,
}

impl Default for HistoryConfig {
    fn default() -> Self {
        Self {
            enabled: default_history_enabled(),
            export_dir: default_export_dir(),
        }
    }
}

fn default_history_enabled() -> bool {
    true
}
fn default_export_dir() -> PathBuf {
    PathBuf::from("./exports")
}

#[derive(Debug, Deserialize, Clone, Default)]
pub struct IndexConfig {
    #[serde(default)]
    pub snapshot_path: Option<PathBuf>,
}

impl Config {
    /// Chunker settings as the core type.
    pub fn chunk_config(&self) -> Result<ChunkConfig> {
        Ok(ChunkConfig::new(
            self.chunking.chunk_size,
            self.chunking.chunk_overlap,
        )?)
    }

    /// Construct the configured embedder.
    pub fn build_embedder(&self) -> Result<Embedder> {
        let e = &self.embedding;
        let embedder = match e.provider.as_str() {
            "hash" => Embedder::hash_seeded(e.dims)?,
            "vocabulary" => Embedder::vocabulary(e.vocab_size, e.dims, e.seed)?,
            other => bail!(
                "Unknown embedding provider: '{}'. Must be hash or vocabulary.",
                other
            ),
        };
        Ok(embedder)
    }

    /// Check every section. Called by [`load_config`]; exposed for configs
    /// built in code.
    pub fn validate(&self) -> Result<()> {
        self.chunk_config()
            .context("invalid [chunking] section")?;

        if self.embedding.dims == 0 {
            bail!("embedding.dims must be > 0");
        }
        // Cheap for both providers, and catches a vocab_size too small for
        // the vocabulary.
        self.build_embedder()
            .context("invalid [embedding] section")?;

        self.retrieval
            .metric()
            .context("invalid retrieval.metric")?;

        let gen = &self.generation;
        match gen.provider.as_str() {
            "extractive" | "openai" | "qwen" => {}
            other => bail!(
                "Unknown generation provider: '{}'. Must be extractive, openai, or qwen.",
                other
            ),
        }
        if gen.is_remote() && gen.model.as_deref().map_or(true, str::is_empty) {
            bail!(
                "generation.model must be specified when provider is '{}'",
                gen.provider
            );
        }
        if !(0.0..=2.0).contains(&gen.temperature) {
            bail!("generation.temperature must be in [0.0, 2.0]");
        }
        if gen.timeout_secs == 0 {
            bail!("generation.timeout_secs must be > 0");
        }

        if self.sources.max_file_bytes == 0 {
            bail!("sources.max_file_bytes must be > 0");
        }

        Ok(())
    }
}

pub fn load_config(path: &Path) -> Result<Config> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read config file: {}", path.display()))?;

    let config: Config = toml::from_str(&content).with_context(|| "Failed to parse config file")?;
    config.validate()?;

    Ok(config)
}

//! TOML configuration.
//!
//! Every section is optional; an empty file yields the defaults below.
//!
//! ```toml
//! rounds = 3
//! model = "llama3:8b"
//!
//! [paper]
//! path = "sample.pdf"
//!
//! [models]
//! explainer = "llama3:8b"   # defaults to `model`
//! reviewer = "llama3:8b"    # defaults to `model`
//!
//! [retrieval]
//! chunk_size = 800
//! chunk_overlap = 200
//! chunk_strategy = "page"
//! top_k = 3
//! persist_directory = ".debator"
//! max_history_tokens = 2000
//!
//! [generation]
//! backend = "ollama"
//! url = "http://localhost:11434"
//!
//! [embedding]
//! provider = "ollama"       # ollama | openai | local | hash
//! model = "nomic-embed-text"
//! dims = 768
//!
//! [output]
//! path = "discussion.md"
//! ```

use anyhow::{Context, Result};
use debator_core::chunk::{ChunkParams, ChunkStrategy, DEFAULT_CHUNK_OVERLAP, DEFAULT_CHUNK_SIZE};
use debator_core::context::DEFAULT_TOP_K;
use debator_core::debate::DEFAULT_ROUNDS;
use debator_core::generation::{HistoryWindow, DEFAULT_MAX_HISTORY_TOKENS};
use serde::Deserialize;
use std::path::{Path, PathBuf};

/// File name of the SQLite index inside `retrieval.persist_directory`.
pub const INDEX_FILE_NAME: &str = "index.sqlite";

pub const DEFAULT_OLLAMA_URL: &str = "http://localhost:11434";

#[derive(Debug, Deserialize, Clone)]
pub struct Config {
    #[serde(default = "default_rounds")]
    pub rounds: usize,
    /// Model used by any role without its own entry in `[models]`.
    #[serde(default = "default_model")]
    pub model: String,
    #[serde(default)]
    pub paper: PaperConfig,
    #[serde(default)]
    pub models: ModelsConfig,
    #[serde(default)]
    pub retrieval: RetrievalConfig,
    #[serde(default)]
    pub generation: GenerationConfig,
    #[serde(default)]
    pub embedding: EmbeddingConfig,
    #[serde(default)]
    pub output: OutputConfig,
}

fn default_rounds() -> usize {
    DEFAULT_ROUNDS
}
fn default_model() -> String {
    "llama3:8b".to_string()
}

impl Default for Config {
    fn default() -> Self {
        Self {
            rounds: default_rounds(),
            model: default_model(),
            paper: PaperConfig::default(),
            models: ModelsConfig::default(),
            retrieval: RetrievalConfig::default(),
            generation: GenerationConfig::default(),
            embedding: EmbeddingConfig::default(),
            output: OutputConfig::default(),
        }
    }
}

impl Config {
    pub fn explainer_model(&self) -> &str {
        self.models.explainer.as_deref().unwrap_or(&self.model)
    }

    pub fn reviewer_model(&self) -> &str {
        self.models.reviewer.as_deref().unwrap_or(&self.model)
    }

    /// Location of the SQLite index file.
    pub fn index_path(&self) -> PathBuf {
        self.retrieval.persist_directory.join(INDEX_FILE_NAME)
    }

    pub fn chunk_params(&self) -> ChunkParams {
        ChunkParams::new(self.retrieval.chunk_size, self.retrieval.chunk_overlap)
    }

    pub fn history_window(&self) -> HistoryWindow {
        HistoryWindow::new(self.retrieval.max_history_tokens)
    }
}

#[derive(Debug, Deserialize, Clone)]
pub struct PaperConfig {
    #[serde(default = "default_paper_path")]
    pub path: PathBuf,
}

fn default_paper_path() -> PathBuf {
    PathBuf::from("sample.pdf")
}

impl Default for PaperConfig {
    fn default() -> Self {
        Self {
            path: default_paper_path(),
        }
    }
}

#[derive(Debug, Deserialize, Clone, Default)]
pub struct ModelsConfig {
    #[serde(default)]
    pub explainer: Option<String>,
    #[serde(default)]
    pub reviewer: Option<String>,
}

#[derive(Debug, Deserialize, Clone)]
pub struct RetrievalConfig {
    #[serde(default = "default_chunk_size")]
    pub chunk_size: usize,
    #[serde(default = "default_chunk_overlap")]
    pub chunk_overlap: usize,
    #[serde(default)]
    pub chunk_strategy: ChunkStrategy,
    #[serde(default = "default_top_k")]
    pub top_k: usize,
    #[serde(default = "default_persist_directory")]
    pub persist_directory: PathBuf,
    #[serde(default = "default_max_history_tokens")]
    pub max_history_tokens: usize,
}

fn default_chunk_size() -> usize {
    DEFAULT_CHUNK_SIZE
}
fn default_chunk_overlap() -> usize {
    DEFAULT_CHUNK_OVERLAP
}
fn default_top_k() -> usize {
    DEFAULT_TOP_K
}
fn default_persist_directory() -> PathBuf {
    PathBuf::from(".debator")
}
fn default_max_history_tokens() -> usize {
    DEFAULT_MAX_HISTORY_TOKENS
}

impl Default for RetrievalConfig {
    fn default() -> Self {
        Self {
            chunk_size: default_chunk_size(),
            chunk_overlap: default_chunk_overlap(),
            chunk_strategy: ChunkStrategy::default(),
            top_k: default_top_k(),
            persist_directory: default_persist_directory(),
            max_history_tokens: default_max_history_tokens(),
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
pub struct GenerationConfig {
    #[serde(default = "default_backend")]
    pub backend: String,
    #[serde(default = "default_ollama_url")]
    pub url: String,
    #[serde(default = "default_num_ctx")]
    pub num_ctx: u32,
    #[serde(default = "default_generation_timeout_secs")]
    pub timeout_secs: u64,
}

fn default_backend() -> String {
    "ollama".to_string()
}
fn default_ollama_url() -> String {
    DEFAULT_OLLAMA_URL.to_string()
}
fn default_num_ctx() -> u32 {
    4096
}
fn default_generation_timeout_secs() -> u64 {
    300
}

impl Default for GenerationConfig {
    fn default() -> Self {
        Self {
            backend: default_backend(),
            url: default_ollama_url(),
            num_ctx: default_num_ctx(),
            timeout_secs: default_generation_timeout_secs(),
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
pub struct EmbeddingConfig {
    #[serde(default = "default_provider")]
    pub provider: String,
    #[serde(default = "default_embedding_model")]
    pub model: String,
    #[serde(default = "default_dims")]
    pub dims: usize,
    #[serde(default)]
    pub url: Option<String>,
    #[serde(default = "default_batch_size")]
    pub batch_size: usize,
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

impl Default for EmbeddingConfig {
    fn default() -> Self {
        Self {
            provider: default_provider(),
            model: default_embedding_model(),
            dims: default_dims(),
            url: None,
            batch_size: default_batch_size(),
            max_retries: default_max_retries(),
            timeout_secs: default_timeout_secs(),
        }
    }
}

fn default_provider() -> String {
    "ollama".to_string()
}
fn default_embedding_model() -> String {
    "nomic-embed-text".to_string()
}
fn default_dims() -> usize {
    768
}
fn default_batch_size() -> usize {
    64
}
fn default_max_retries() -> u32 {
    5
}
fn default_timeout_secs() -> u64 {
    30
}

#[derive(Debug, Deserialize, Clone)]
pub struct OutputConfig {
    #[serde(default = "default_output_path")]
    pub path: PathBuf,
}

fn default_output_path() -> PathBuf {
    PathBuf::from("discussion.md")
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            path: default_output_path(),
        }
    }
}

pub fn load_config(path: &Path) -> Result<Config> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read config file: {}", path.display()))?;
    parse_config(&content)
}

/// Parse and validate configuration text.
pub fn parse_config(content: &str) -> Result<Config> {
    let config: Config = toml::from_str(content).with_context(|| "Failed to parse config file")?;
    validate(&config)?;
    Ok(config)
}

fn validate(config: &Config) -> Result<()> {
    if config.rounds < 1 {
        anyhow::bail!("rounds must be >= 1");
    }

    if config.retrieval.top_k < 1 {
        anyhow::bail!("retrieval.top_k must be >= 1");
    }

    if config.explainer_model().trim().is_empty() || config.reviewer_model().trim().is_empty() {
        anyhow::bail!("model identifiers must not be empty");
    }

    match config.generation.backend.as_str() {
        "ollama" => {}
        other => anyhow::bail!("Unknown generation backend: '{}'. Must be ollama.", other),
    }

    match config.embedding.provider.as_str() {
        "ollama" | "openai" | "local" => {
            if config.embedding.model.trim().is_empty() {
                anyhow::bail!(
                    "embedding.model must be specified when provider is '{}'",
                    config.embedding.provider
                );
            }
        }
        "hash" => {}
        other => anyhow::bail!(
            "Unknown embedding provider: '{}'. Must be ollama, openai, local, or hash.",
            other
        ),
    }

    if config.embedding.dims == 0 {
        anyhow::bail!(
            "embedding.dims must be > 0 when provider is '{}'",
            config.embedding.provider
        );
    }

    if config.embedding.batch_size == 0 {
        anyhow::bail!("embedding.batch_size must be > 0");
    }

    Ok(())
}

//! TOML configuration.
//!
//! Every section and field has a default, so an empty file is a valid
//! configuration. See `config/astro.example.toml` for a commented example.

use anyhow::{Context, Result};
use serde::de::{MapAccess, Visitor};
use serde::{Deserialize, Deserializer};
use std::fmt;
use std::path::{Path, PathBuf};

#[derive(Debug, Deserialize, Clone, Default)]
pub struct Config {
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub index: IndexConfig,
    #[serde(default)]
    pub ingest: IngestConfig,
    #[serde(default)]
    pub chunking: ChunkingConfig,
    #[serde(default)]
    pub embedding: EmbeddingConfig,
    #[serde(default)]
    pub llm: LlmConfig,
    #[serde(default)]
    pub chart: ChartConfig,
}

#[derive(Debug, Deserialize, Clone)]
pub struct ServerConfig {
    #[serde(default = "default_bind")]
    pub bind: String,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind: default_bind(),
        }
    }
}

fn default_bind() -> String {
    "127.0.0.1:5000".to_string()
}

#[derive(Debug, Deserialize, Clone)]
pub struct IndexConfig {
    #[serde(default = "default_index_path")]
    pub path: PathBuf,
    /// Number of chunks retrieved per query.
    #[serde(default = "default_top_k")]
    pub top_k: usize,
}

impl Default for IndexConfig {
    fn default() -> Self {
        Self {
            path: default_index_path(),
            top_k: default_top_k(),
        }
    }
}

fn default_index_path() -> PathBuf {
    PathBuf::from("data/vector_index.json")
}
fn default_top_k() -> usize {
    4
}

#[derive(Debug, Deserialize, Clone)]
pub struct IngestConfig {
    #[serde(default = "default_documents_path")]
    pub documents_path: PathBuf,
    #[serde(default = "default_include_globs")]
    pub include_globs: Vec<String>,
    #[serde(default)]
    pub exclude_globs: Vec<String>,
    #[serde(default)]
    pub follow_symlinks: bool,
}

impl Default for IngestConfig {
    fn default() -> Self {
        Self {
            documents_path: default_documents_path(),
            include_globs: default_include_globs(),
            exclude_globs: Vec::new(),
            follow_symlinks: false,
        }
    }
}

fn default_documents_path() -> PathBuf {
    PathBuf::from("knowledge_base")
}
fn default_include_globs() -> Vec<String> {
    vec![
        "**/*.pdf".to_string(),
        "**/*.txt".to_string(),
        "**/*.md".to_string(),
    ]
}

#[derive(Debug, Deserialize, Clone)]
pub struct ChunkingConfig {
    /// Maximum chunk length in characters.
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
    #[serde(default = "default_provider")]
    pub provider: String,
    #[serde(default = "default_embedding_model")]
    pub model: String,
    /// Provider default when unset (see [`EmbeddingConfig::effective_base_url`]).
    #[serde(default)]
    pub base_url: Option<String>,
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
            base_url: None,
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
fn default_batch_size() -> usize {
    32
}
fn default_max_retries() -> u32 {
    3
}
fn default_timeout_secs() -> u64 {
    60
}

impl EmbeddingConfig {
    pub fn effective_base_url(&self) -> String {
        if let Some(url) = &self.base_url {
            return url.trim_end_matches('/').to_string();
        }
        match self.provider.as_str() {
            "openai" => "https://api.openai.com/v1".to_string(),
            _ => "http://localhost:11434".to_string(),
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
pub struct LlmConfig {
    #[serde(default = "default_llm_model")]
    pub model: String,
    #[serde(default = "default_llm_base_url")]
    pub base_url: String,
    /// Name of the environment variable holding the API key.
    #[serde(default = "default_api_key_env")]
    pub api_key_env: String,
    #[serde(default)]
    pub temperature: Option<f64>,
    /// No timeout beyond the HTTP client default when unset.
    #[serde(default)]
    pub timeout_secs: Option<u64>,
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            model: default_llm_model(),
            base_url: default_llm_base_url(),
            api_key_env: default_api_key_env(),
            temperature: None,
            timeout_secs: None,
        }
    }
}

fn default_llm_model() -> String {
    "gemma2-9b-it".to_string()
}
fn default_llm_base_url() -> String {
    "https://api.groq.com/openai/v1".to_string()
}
fn default_api_key_env() -> String {
    "GROQ_API_KEY".to_string()
}

#[derive(Debug, Deserialize, Clone, Default)]
pub struct ChartConfig {
    /// Planet name → house number, in file order. Replaces the built-in
    /// placeholder table when present.
    #[serde(default, deserialize_with = "ordered_positions")]
    pub positions: Option<Vec<(String, i64)>>,
}

/// Reads `[chart.positions]` as a list so that, when two planets name the
/// same house, the one written last is applied last.
fn ordered_positions<'de, D>(
    deserializer: D,
) -> std::result::Result<Option<Vec<(String, i64)>>, D::Error>
where
    D: Deserializer<'de>,
{
    struct PositionsVisitor;

    impl<'de> Visitor<'de> for PositionsVisitor {
        type Value = Vec<(String, i64)>;

        fn expecting(&self, f: &mut fmt::Formatter) -> fmt::Result {
            f.write_str("a table of planet = house entries")
        }

        fn visit_map<A>(self, mut map: A) -> std::result::Result<Self::Value, A::Error>
        where
            A: MapAccess<'de>,
        {
            let mut entries = Vec::with_capacity(map.size_hint().unwrap_or(0));
            while let Some((planet, house)) = map.next_entry::<String, i64>()? {
                entries.push((planet, house));
            }
            Ok(entries)
        }
    }

    deserializer.deserialize_map(PositionsVisitor).map(Some)
}

impl Config {
    /// All defaults. Used by commands that can run without a config file.
    pub fn minimal() -> Self {
        Self::default()
    }
}

pub fn load_config(path: &Path) -> Result<Config> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read config file: {}", path.display()))?;

    let config: Config = toml::from_str(&content).with_context(|| "Failed to parse config file")?;

    validate(&config)?;
    Ok(config)
}

pub fn validate(config: &Config) -> Result<()> {
    if config.index.top_k < 1 {
        anyhow::bail!("index.top_k must be >= 1");
    }

    if config.chunking.chunk_size == 0 {
        anyhow::bail!("chunking.chunk_size must be > 0");
    }
    if config.chunking.chunk_overlap >= config.chunking.chunk_size {
        anyhow::bail!("chunking.chunk_overlap must be smaller than chunking.chunk_size");
    }

    if config.embedding.batch_size == 0 {
        anyhow::bail!("embedding.batch_size must be > 0");
    }
    match config.embedding.provider.as_str() {
        "ollama" | "openai" => {}
        other => anyhow::bail!(
            "Unknown embedding provider: '{}'. Must be ollama or openai.",
            other
        ),
    }
    if config.embedding.model.trim().is_empty() {
        anyhow::bail!("embedding.model must not be empty");
    }

    if config.llm.model.trim().is_empty() {
        anyhow::bail!("llm.model must not be empty");
    }
    if config.llm.api_key_env.trim().is_empty() {
        anyhow::bail!("llm.api_key_env must not be empty");
    }

    Ok(())
}

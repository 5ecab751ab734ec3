//! Configuration management for ragdex
//!
//! TOML-backed configuration with defaults, validation at load time and
//! environment variable overrides for credentials.

use crate::error::{RagdexError, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Main configuration structure
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub storage: StorageConfig,
    #[serde(default)]
    pub chunking: ChunkingConfig,
    #[serde(default)]
    pub embedding: EmbeddingConfig,
    #[serde(default)]
    pub index: IndexConfig,
    #[serde(default)]
    pub retrieval: RetrievalConfig,
    #[serde(default)]
    pub llm: LlmConfig,
}

/// Storage configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StorageConfig {
    /// Directory holding the manifest and both indexes
    pub data_dir: PathBuf,
    /// Directory scanned for source documents during ingestion
    pub documents_dir: PathBuf,
}

impl Default for StorageConfig {
    fn default() -> Self {
        let base = dirs::data_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("ragdex");
        Self {
            data_dir: base.join("indexes"),
            documents_dir: base.join("documents"),
        }
    }
}

/// Chunking configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChunkingConfig {
    /// Maximum chunk size in characters
    pub max_size: usize,
    /// Characters of overlap between consecutive chunks
    pub overlap: usize,
    /// Ordered separator preference list
    pub separators: Vec<String>,
}

impl Default for ChunkingConfig {
    fn default() -> Self {
        Self {
            max_size: 500,
            overlap: 20,
            separators: vec![
                "\n".to_string(),
                " ".to_string(),
                ".".to_string(),
                ",".to_string(),
            ],
        }
    }
}

/// Embedding configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EmbeddingConfig {
    /// Model name (must stay fixed for the lifetime of an index)
    pub model: String,
    /// Batch size for embedding generation
    pub batch_size: usize,
}

impl Default for EmbeddingConfig {
    fn default() -> Self {
        Self {
            model: "bge-base-en-v1.5".to_string(),
            batch_size: 32,
        }
    }
}

/// Vector index (HNSW) configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IndexConfig {
    pub hnsw_ef_construction: usize,
    pub hnsw_m: usize,
    pub hnsw_ef_search: usize,
}

impl Default for IndexConfig {
    fn default() -> Self {
        Self {
            hnsw_ef_construction: 200,
            hnsw_m: 16,
            hnsw_ef_search: 64,
        }
    }
}

/// Retrieval mode
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SearchMode {
    /// Fuse vector and lexical candidates by recomputed cosine similarity
    Hybrid,
    /// Vector index only
    Semantic,
}

/// Retrieval configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RetrievalConfig {
    /// Number of results returned per query
    pub top_k: usize,
    /// Per-user-turn decay applied to history embeddings
    pub weight_decay: f32,
    pub mode: SearchMode,
    /// Workers embedding ingestion batches concurrently
    pub ingest_workers: usize,
    /// Chunks per ingestion batch
    pub ingest_batch_size: usize,
}

impl Default for RetrievalConfig {
    fn default() -> Self {
        Self {
            top_k: 5,
            weight_decay: 0.5,
            mode: SearchMode::Hybrid,
            ingest_workers: 4,
            ingest_batch_size: 64,
        }
    }
}

/// Completion service configuration (query refinement only)
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LlmConfig {
    /// When false the refiner is skipped entirely
    pub enabled: bool,
    /// OpenAI-compatible chat completions endpoint
    pub api_url: String,
    /// Environment variable holding the API key
    pub api_key_env: String,
    pub model: String,
    /// Refinement call budget before falling back to the raw question
    pub timeout_secs: u64,
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            api_url: "https://api.groq.com/openai/v1/chat/completions".to_string(),
            api_key_env: "GROQ_API_KEY".to_string(),
            model: "llama3-8b-8192".to_string(),
            timeout_secs: 10,
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            storage: StorageConfig::default(),
            chunking: ChunkingConfig::default(),
            embedding: EmbeddingConfig::default(),
            index: IndexConfig::default(),
            retrieval: RetrievalConfig::default(),
            llm: LlmConfig::default(),
        }
    }
}

impl Config {
    /// Load configuration from a file
    pub fn load(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Err(RagdexError::ConfigNotFound {
                path: path.to_path_buf(),
            });
        }

        let content = std::fs::read_to_string(path).map_err(|e| RagdexError::Io {
            source: e,
            context: format!("Failed to read config file: {:?}", path),
        })?;
        let config: Config = toml::from_str(&content)?;
        config.validate()?;
        Ok(config)
    }

    /// Load from the given path, or fall back to defaults when the default
    /// config location does not exist yet
    pub fn load_or_default(path: Option<PathBuf>) -> Result<Self> {
        match path {
            Some(p) => Self::load(&p),
            None => {
                let default_path = Self::default_path()?;
                if default_path.exists() {
                    Self::load(&default_path)
                } else {
                    Ok(Self::default())
                }
            }
        }
    }

    /// Save configuration to a file
    pub fn save(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).map_err(|e| RagdexError::Io {
                source: e,
                context: format!("Failed to create config directory: {:?}", parent),
            })?;
        }
        let content = toml::to_string_pretty(self)?;
        std::fs::write(path, content).map_err(|e| RagdexError::Io {
            source: e,
            context: format!("Failed to write config file: {:?}", path),
        })?;
        Ok(())
    }

    /// Default config file location (~/.config/ragdex/config.toml)
    pub fn default_path() -> Result<PathBuf> {
        let config_dir = dirs::config_dir()
            .ok_or_else(|| RagdexError::Config("Cannot determine config directory".to_string()))?;
        Ok(config_dir.join("ragdex").join("config.toml"))
    }

    /// Read the completion service API key from the configured environment
    /// variable. Missing credentials with the refiner enabled are fatal at
    /// startup, not at query time.
    pub fn llm_api_key(&self) -> Result<String> {
        std::env::var(&self.llm.api_key_env).map_err(|_| {
            RagdexError::Config(format!(
                "Environment variable {} is not set (required while llm.enabled = true)",
                self.llm.api_key_env
            ))
        })
    }

    /// Validate configuration values
    pub fn validate(&self) -> Result<()> {
        if self.chunking.max_size == 0 {
            return Err(RagdexError::InvalidConfigValue {
                path: "chunking.max_size".to_string(),
                message: "must be greater than zero".to_string(),
            });
        }
        if self.chunking.overlap >= self.chunking.max_size {
            return Err(RagdexError::InvalidConfigValue {
                path: "chunking.overlap".to_string(),
                message: "must be smaller than chunking.max_size".to_string(),
            });
        }
        if !(0.0..1.0).contains(&self.retrieval.weight_decay) {
            return Err(RagdexError::InvalidConfigValue {
                path: "retrieval.weight_decay".to_string(),
                message: "must be in [0, 1)".to_string(),
            });
        }
        if self.retrieval.top_k == 0 {
            return Err(RagdexError::InvalidConfigValue {
                path: "retrieval.top_k".to_string(),
                message: "must be greater than zero".to_string(),
            });
        }
        if self.retrieval.ingest_workers == 0 {
            return Err(RagdexError::InvalidConfigValue {
                path: "retrieval.ingest_workers".to_string(),
                message: "must be greater than zero".to_string(),
            });
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_default_config_is_valid() {
        let config = Config::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.chunking.max_size, 500);
        assert_eq!(config.chunking.overlap, 20);
        assert_eq!(config.retrieval.weight_decay, 0.5);
        assert_eq!(config.retrieval.mode, SearchMode::Hybrid);
    }

    #[test]
    fn test_save_and_load_roundtrip() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("config.toml");

        let mut config = Config::default();
        config.retrieval.top_k = 7;
        config.save(&path).unwrap();

        let loaded = Config::load(&path).unwrap();
        assert_eq!(loaded.retrieval.top_k, 7);
        assert_eq!(loaded.embedding.model, "bge-base-en-v1.5");
    }

    #[test]
    fn test_load_missing_file() {
        let result = Config::load(Path::new("/nonexistent/config.toml"));
        assert!(matches!(result, Err(RagdexError::ConfigNotFound { .. })));
    }

    #[test]
    fn test_invalid_overlap_rejected() {
        let mut config = Config::default();
        config.chunking.overlap = 500;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_mode_serde_lowercase() {
        let toml_str = "[retrieval]\ntop_k = 3\nweight_decay = 0.5\nmode = \"semantic\"\ningest_workers = 4\ningest_batch_size = 64\n";
        let config: Config = toml::from_str(toml_str).unwrap();
        assert_eq!(config.retrieval.mode, SearchMode::Semantic);
    }
}

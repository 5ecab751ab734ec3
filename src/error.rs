use std::path::PathBuf;
use thiserror::Error;

/// Main error type for the ragdex application
#[derive(Error, Debug)]
pub enum RagdexError {
    /// Configuration related errors (fatal at startup, never retried)
    #[error("Configuration error: {0}")]
    Config(String),

    /// Configuration file not found
    #[error("Configuration file not found: {path}")]
    ConfigNotFound { path: PathBuf },

    /// Invalid configuration value
    #[error("Invalid configuration value at {path}: {message}")]
    InvalidConfigValue { path: String, message: String },

    /// Per-file ingestion failure; logged and retried on the next run
    /// via the processed-files manifest
    #[error("Ingestion failed for {path}: {message}")]
    Ingestion { path: PathBuf, message: String },

    /// Embedding service unreachable or misbehaving during a query.
    /// Surfaced to the caller; an empty result set here would be
    /// indistinguishable from "no relevant documents".
    #[error("Embedding unavailable: {0}")]
    EmbeddingUnavailable(String),

    /// Degenerate numeric input (zero-vector normalization)
    #[error("Numeric error: {0}")]
    Numeric(String),

    /// IO errors
    #[error("IO error: {context}: {source}")]
    Io {
        source: std::io::Error,
        context: String,
    },

    /// TOML deserialization errors
    #[error("TOML error: {0}")]
    Toml(#[from] toml::de::Error),

    /// TOML serialization errors
    #[error("TOML serialization error: {0}")]
    TomlSerialization(#[from] toml::ser::Error),

    /// JSON errors
    #[error("JSON error: {context}: {source}")]
    Json {
        source: serde_json::Error,
        context: String,
    },

    /// Generic errors
    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

/// Result type for ragdex operations
pub type Result<T> = std::result::Result<T, RagdexError>;

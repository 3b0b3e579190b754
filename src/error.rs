//! Error types
//!
//! - `ConfigError`: required configuration missing or invalid
//! - `LoadError`: knowledge base construction failed (store / embedding provider)
//! - `MissRecordError`: unanswered-question logging failed (always swallowed)
//!
//! A query that matches nothing is not an error; see `matcher::QueryResult`.

use std::path::PathBuf;

use thiserror::Error;

/// Configuration error
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Database path not configured. Set FAQ_DATABASE_PATH, pass --db, or add [database] path to config.toml")]
    MissingDatabasePath,

    #[error("API key not found. Set GEMINI_API_KEY or GOOGLE_AI_API_KEY environment variable")]
    MissingApiKey,

    #[error("Unknown embedding provider: {0} (expected \"ollama\" or \"gemini\")")]
    UnknownProvider(String),

    #[error("Invalid embedding dimension: {0}")]
    InvalidDimension(usize),

    #[error("Invalid URL: {0}")]
    InvalidUrl(String),

    #[error("Invalid value for {key}: {value}")]
    InvalidValue { key: String, value: String },

    #[error("Failed to read config file {path:?}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to parse config file {path:?}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },
}

/// Knowledge base construction error
///
/// Construction is all-or-nothing: any of these leaves the knowledge base absent.
#[derive(Debug, Error)]
pub enum LoadError {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error("Knowledge store unavailable: {0}")]
    Store(#[source] anyhow::Error),

    #[error("Embedding provider unavailable: {0}")]
    Embedding(#[source] anyhow::Error),

    #[error("Embedding provider returned {got} vectors for {expected} questions")]
    EmbeddingCount { expected: usize, got: usize },

    #[error("Knowledge base is empty: no FAQ entries in the store")]
    Empty,
}

impl LoadError {
    /// Failure caused by the embedding provider (eligible for fuzzy fallback)
    pub fn is_embedding_failure(&self) -> bool {
        matches!(self, LoadError::Embedding(_) | LoadError::EmbeddingCount { .. })
    }
}

/// Unanswered-question logging error
#[derive(Debug, Error)]
#[error("Failed to record unanswered question: {0}")]
pub struct MissRecordError(#[source] pub anyhow::Error);

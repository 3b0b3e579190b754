//! Configuration
//!
//! Layers, lowest to highest priority:
//! 1. built-in defaults
//! 2. `~/.faq-assistant/config.toml` (or an explicit path)
//! 3. `.env` file + process environment (`FAQ_*`, `DATABASE_URL` as a fallback)
//! 4. CLI flags (applied by the caller)

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::embedding::{DEFAULT_GEMINI_MODEL, DEFAULT_OLLAMA_MODEL};
use crate::error::ConfigError;
use crate::knowledge::get_data_dir;

/// Default "not understood" reply
pub const DEFAULT_NOT_UNDERSTOOD: &str =
    "Lo siento, no entiendo tu pregunta. 😅 ¿Podrías reformularla?";

/// Default reply when the knowledge base could not be loaded
pub const DEFAULT_SERVICE_UNAVAILABLE: &str =
    "Error: No pude cargar mi base de conocimiento. El bot no está operativo. Inténtalo más tarde.";

// ============================================================================
// Types
// ============================================================================

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct Config {
    pub database: DatabaseConfig,
    pub matcher: MatcherSettings,
    pub embedding: EmbeddingConfig,
    pub messages: Messages,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct DatabaseConfig {
    /// SQLite file holding `faq_entries` and `unanswered_questions`
    pub path: Option<PathBuf>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct MatcherSettings {
    pub semantic_matching_enabled: bool,
    pub miss_logging_enabled: bool,
    /// Cosine similarity cut-off (0.0 ~ 1.0)
    pub similarity_threshold: f32,
    /// Token-set ratio cut-off (0 ~ 100)
    pub fuzzy_threshold: u8,
    /// Use the fuzzy stage when the embedding provider cannot be loaded
    pub fallback_to_fuzzy: bool,
    /// Extra stop words on top of the Spanish set
    pub extra_stop_words: Vec<String>,
}

impl Default for MatcherSettings {
    fn default() -> Self {
        Self {
            semantic_matching_enabled: true,
            miss_logging_enabled: true,
            similarity_threshold: 0.65,
            fuzzy_threshold: 70,
            fallback_to_fuzzy: false,
            extra_stop_words: Vec::new(),
        }
    }
}

#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum ProviderKind {
    #[default]
    Ollama,
    Gemini,
}

impl std::str::FromStr for ProviderKind {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "ollama" => Ok(Self::Ollama),
            "gemini" => Ok(Self::Gemini),
            other => Err(ConfigError::UnknownProvider(other.to_string())),
        }
    }
}

impl std::fmt::Display for ProviderKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Ollama => write!(f, "ollama"),
            Self::Gemini => write!(f, "gemini"),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct EmbeddingConfig {
    pub provider: ProviderKind,
    /// Model name; provider default when unset
    pub model: Option<String>,
    pub dimension: usize,
    pub ollama_url: String,
}

impl Default for EmbeddingConfig {
    fn default() -> Self {
        Self {
            provider: ProviderKind::Ollama,
            model: None,
            dimension: 768,
            ollama_url: "http://localhost:11434".to_string(),
        }
    }
}

impl EmbeddingConfig {
    pub fn model_name(&self) -> &str {
        match (&self.model, self.provider) {
            (Some(model), _) => model,
            (None, ProviderKind::Ollama) => DEFAULT_OLLAMA_MODEL,
            (None, ProviderKind::Gemini) => DEFAULT_GEMINI_MODEL,
        }
    }
}

/// Fixed replies shown to the user
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct Messages {
    pub not_understood: String,
    pub service_unavailable: String,
}

impl Default for Messages {
    fn default() -> Self {
        Self {
            not_understood: DEFAULT_NOT_UNDERSTOOD.to_string(),
            service_unavailable: DEFAULT_SERVICE_UNAVAILABLE.to_string(),
        }
    }
}

// ============================================================================
// Loading
// ============================================================================

impl Config {
    /// 설정 디렉토리 (~/.faq-assistant/)
    pub fn config_dir() -> PathBuf {
        get_data_dir()
    }

    pub fn default_path() -> PathBuf {
        Self::config_dir().join("config.toml")
    }

    /// Load file + environment
    ///
    /// An explicit `path` must exist; the default path is optional.
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        // .env 파일 (없어도 무시)
        if let Ok(env_path) = dotenvy::dotenv() {
            tracing::debug!("Loaded environment from {:?}", env_path);
        }

        let mut config = match Self::source_path(path) {
            Some(p) => Self::from_file(&p)?,
            None => Self::default(),
        };

        config.apply_env(|key| std::env::var(key).ok())?;
        Ok(config)
    }

    /// Config file `load` reads: the explicit path, else the default path if present
    pub fn source_path(explicit: Option<&Path>) -> Option<PathBuf> {
        match explicit {
            Some(p) => Some(p.to_path_buf()),
            None => Some(Self::default_path()).filter(|p| p.exists()),
        }
    }

    /// TOML 파일에서 로드
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;

        let config: Self = toml::from_str(&content).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })?;

        tracing::debug!("Loaded config from {:?}", path);
        Ok(config)
    }

    /// Apply `FAQ_*` overrides from an environment lookup
    pub fn apply_env<F>(&mut self, lookup: F) -> Result<(), ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        if let Some(path) = get("FAQ_DATABASE_PATH") {
            self.database.path = Some(PathBuf::from(path.trim()));
        } else if let Some(url) = get("DATABASE_URL") {
            match sqlite_path_from_url(&url) {
                Some(path) => self.database.path = Some(path),
                None => tracing::warn!("Ignoring DATABASE_URL: not a SQLite path"),
            }
        }
        if let Some(provider) = get("FAQ_EMBEDDING_PROVIDER") {
            self.embedding.provider = provider.parse()?;
        }
        if let Some(model) = get("FAQ_EMBEDDING_MODEL") {
            self.embedding.model = Some(model.trim().to_string());
        }
        if let Some(url) = get("FAQ_OLLAMA_URL") {
            self.embedding.ollama_url = url.trim().to_string();
        }
        if let Some(value) = get("FAQ_SEMANTIC_MATCHING") {
            self.matcher.semantic_matching_enabled = parse_bool("FAQ_SEMANTIC_MATCHING", &value)?;
        }
        if let Some(value) = get("FAQ_MISS_LOGGING") {
            self.matcher.miss_logging_enabled = parse_bool("FAQ_MISS_LOGGING", &value)?;
        }
        if let Some(value) = get("FAQ_FALLBACK_TO_FUZZY") {
            self.matcher.fallback_to_fuzzy = parse_bool("FAQ_FALLBACK_TO_FUZZY", &value)?;
        }

        Ok(())
    }

    /// Resolved database path (the store's connection target)
    pub fn database_path(&self) -> Result<&Path, ConfigError> {
        self.database
            .path
            .as_deref()
            .ok_or(ConfigError::MissingDatabasePath)
    }

    /// Range checks that serde cannot express
    pub fn validate(&self) -> Result<(), ConfigError> {
        let threshold = self.matcher.similarity_threshold;
        if !(0.0..=1.0).contains(&threshold) {
            return Err(ConfigError::InvalidValue {
                key: "matcher.similarity_threshold".to_string(),
                value: threshold.to_string(),
            });
        }
        if self.matcher.fuzzy_threshold > 100 {
            return Err(ConfigError::InvalidValue {
                key: "matcher.fuzzy_threshold".to_string(),
                value: self.matcher.fuzzy_threshold.to_string(),
            });
        }
        Ok(())
    }
}

fn parse_bool(key: &str, value: &str) -> Result<bool, ConfigError> {
    match value.trim().to_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "0" | "false" | "no" | "off" => Ok(false),
        _ => Err(ConfigError::InvalidValue {
            key: key.to_string(),
            value: value.to_string(),
        }),
    }
}

// ============================================================================
// Tests
// ============================================================================

/// `DATABASE_URL` → SQLite file path
///
/// Accepts a bare path, `sqlite:path` or `sqlite://path`; other schemes → `None`.
fn sqlite_path_from_url(url: &str) -> Option<PathBuf> {
    let url = url.trim();
    let path = match url.split_once("://") {
        Some(("sqlite", rest)) => rest,
        Some(_) => return None,
        None => url.strip_prefix("sqlite:").unwrap_or(url),
    };

    if path.is_empty() {
        None
    } else {
        Some(PathBuf::from(path))
    }
}

//! 임베딩 모듈 - 문장 임베딩 프로바이더
//!
//! 텍스트를 고정 길이 벡터로 변환합니다. 시맨틱 매칭 단계에서 사용됩니다.
//!
//! - `OllamaEmbedding`: local sentence-embedding model served by Ollama
//! - `GeminiEmbedding`: Google Gemini embedding API
//!
//! ## 사용법
//! ```rust,ignore
//! let embedder = create_embedder(&config.embedding)?;
//! let vectors = embedder.embed_batch(&questions).await?;
//! ```

mod gemini;
mod ollama;

use std::sync::Arc;

use anyhow::Result;
use async_trait::async_trait;

use crate::config::{EmbeddingConfig, ProviderKind};
use crate::error::{ConfigError, LoadError};

pub use gemini::{GeminiEmbedding, DEFAULT_GEMINI_MODEL, GEMINI_DIMENSIONS};
pub use ollama::{OllamaEmbedding, DEFAULT_OLLAMA_MODEL};

// ============================================================================
// EmbeddingProvider Trait
// ============================================================================

/// 임베딩 프로바이더 트레이트
///
/// Implementations must be deterministic for a fixed model and safe to call
/// concurrently (`&self` only).
#[async_trait]
pub trait EmbeddingProvider: Send + Sync {
    /// 단일 텍스트 임베딩
    async fn embed(&self, text: &str) -> Result<Vec<f32>>;

    /// 배치 임베딩 (기본 구현: 순차 호출)
    ///
    /// Returns exactly one vector per input, in input order.
    async fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        let mut results = Vec::with_capacity(texts.len());
        for text in texts {
            results.push(self.embed(text).await?);
        }
        Ok(results)
    }

    /// 임베딩 차원 수
    fn dimension(&self) -> usize;

    /// 프로바이더 이름
    fn name(&self) -> &str;
}

// ============================================================================
// API Key Management
// ============================================================================

/// API 키 로드 (환경변수에서)
///
/// 우선순위:
/// 1. `GEMINI_API_KEY` 환경변수
/// 2. `GOOGLE_AI_API_KEY` 환경변수
pub fn get_api_key() -> std::result::Result<String, ConfigError> {
    for var in ["GEMINI_API_KEY", "GOOGLE_AI_API_KEY"] {
        if let Ok(key) = std::env::var(var) {
            if !key.is_empty() {
                tracing::debug!("Using API key from {}", var);
                return Ok(key);
            }
        }
    }

    Err(ConfigError::MissingApiKey)
}

/// API 키 존재 여부 확인
pub fn has_api_key() -> bool {
    get_api_key().is_ok()
}

// ============================================================================
// Factory Function
// ============================================================================

/// 설정에 따라 임베딩 프로바이더 생성
pub fn create_embedder(
    config: &EmbeddingConfig,
) -> std::result::Result<Arc<dyn EmbeddingProvider>, LoadError> {
    let embedder: Arc<dyn EmbeddingProvider> = match config.provider {
        ProviderKind::Ollama => Arc::new(
            OllamaEmbedding::new(&config.ollama_url, config.model_name(), config.dimension)
                .map_err(into_load_error)?,
        ),
        ProviderKind::Gemini => {
            let api_key = get_api_key()?;
            Arc::new(
                GeminiEmbedding::with_model(api_key, config.model_name(), config.dimension)
                    .map_err(into_load_error)?,
            )
        }
    };

    tracing::info!(
        "Using {} embedding (dimension: {})",
        embedder.name(),
        embedder.dimension()
    );
    Ok(embedder)
}

/// Configuration mistakes stay `ConfigError`; anything else is a provider failure
fn into_load_error(err: anyhow::Error) -> LoadError {
    match err.downcast::<ConfigError>() {
        Ok(config) => LoadError::Config(config),
        Err(err) => LoadError::Embedding(err),
    }
}

/// Fill positions of blank texts with zero vectors
///
/// Backends reject empty input; a question that normalizes to nothing still
/// needs a vector at its index. `encode` is called once with the non-blank texts.
pub(crate) async fn embed_non_blank<'a, F, Fut>(
    texts: &'a [String],
    dimension: usize,
    encode: F,
) -> Result<Vec<Vec<f32>>>
where
    F: FnOnce(Vec<&'a str>) -> Fut,
    Fut: std::future::Future<Output = Result<Vec<Vec<f32>>>>,
{
    let non_blank: Vec<&str> = texts
        .iter()
        .map(String::as_str)
        .filter(|t| !t.trim().is_empty())
        .collect();

    let mut encoded = if non_blank.is_empty() {
        Vec::new()
    } else {
        let expected = non_blank.len();
        let vectors = encode(non_blank).await?;
        if vectors.len() != expected {
            anyhow::bail!(
                "Embedding backend returned {} vectors for {} inputs",
                vectors.len(),
                expected
            );
        }
        vectors
    }
    .into_iter();

    let results = texts
        .iter()
        .map(|t| {
            if t.trim().is_empty() {
                Some(vec![0.0; dimension])
            } else {
                encoded.next()
            }
        })
        .collect::<Option<Vec<_>>>()
        .ok_or_else(|| anyhow::anyhow!("Embedding backend returned too few vectors"))?;

    Ok(results)
}

// ============================================================================
// Tests
// ============================================================================

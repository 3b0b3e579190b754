//! Ollama 임베딩 - local sentence-embedding model
//!
//! `POST /api/embed` accepts a list of inputs, so a whole knowledge base is
//! encoded with a single request.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use anyhow::{Context, Result};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use url::Url;

use super::{embed_non_blank, EmbeddingProvider};
use crate::error::ConfigError;

/// 기본 모델 (multilingual sentence embeddings)
pub const DEFAULT_OLLAMA_MODEL: &str = "paraphrase-multilingual";

const DEFAULT_TIMEOUT_SECONDS: u64 = 60;

#[derive(Debug)]
pub struct OllamaEmbedding {
    base_url: Url,
    model: String,
    client: reqwest::Client,
    /// Configured dimension, replaced by the one the server actually returns
    dimension: AtomicUsize,
}

#[derive(Debug, Serialize)]
struct EmbedRequest<'a> {
    model: &'a str,
    input: Vec<&'a str>,
}

#[derive(Debug, Deserialize)]
struct EmbedResponse {
    embeddings: Vec<Vec<f32>>,
}

#[derive(Debug, Deserialize)]
struct ModelsResponse {
    models: Vec<ModelInfo>,
}

#[derive(Debug, Deserialize)]
struct ModelInfo {
    name: String,
}

#[derive(Debug, Deserialize)]
struct ErrorResponse {
    error: String,
}

impl OllamaEmbedding {
    /// # Arguments
    /// * `base_url` - Ollama 서버 주소 (예: `http://localhost:11434`)
    /// * `model` - 임베딩 모델 이름
    /// * `dimension` - 예상 차원 (zero vectors for blank input)
    pub fn new(base_url: &str, model: &str, dimension: usize) -> Result<Self> {
        let base_url = parse_base_url(base_url)?;

        if model.trim().is_empty() {
            return Err(ConfigError::InvalidValue {
                key: "embedding.model".to_string(),
                value: model.to_string(),
            }
            .into());
        }
        if dimension == 0 {
            return Err(ConfigError::InvalidDimension(dimension).into());
        }

        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(DEFAULT_TIMEOUT_SECONDS))
            .build()
            .context("Failed to create HTTP client")?;

        Ok(Self {
            base_url,
            model: model.to_string(),
            client,
            dimension: AtomicUsize::new(dimension),
        })
    }

    pub fn model(&self) -> &str {
        &self.model
    }

    /// Check the server is reachable and the model is pulled
    pub async fn health_check(&self) -> Result<()> {
        let url = self
            .base_url
            .join("api/tags")
            .context("Failed to build models URL")?;

        let response = self
            .client
            .get(url)
            .send()
            .await
            .with_context(|| format!("Failed to reach Ollama at {}", self.base_url))?;

        let models: ModelsResponse = response
            .error_for_status()
            .context("Ollama returned an error status")?
            .json()
            .await
            .context("Failed to parse models response")?;

        // Ollama reports "name:tag"; accept a bare name for ":latest"
        let found = models.models.iter().any(|m| {
            m.name == self.model || m.name.split(':').next() == Some(self.model.as_str())
        });

        if !found {
            let available: Vec<&str> = models.models.iter().map(|m| m.name.as_str()).collect();
            anyhow::bail!(
                "Model '{}' is not available. Available models: {:?}",
                self.model,
                available
            );
        }

        tracing::debug!("Health check passed for Ollama model {}", self.model);
        Ok(())
    }

    async fn request(&self, input: Vec<&str>) -> Result<Vec<Vec<f32>>> {
        let url = self
            .base_url
            .join("api/embed")
            .context("Failed to build embedding URL")?;

        tracing::debug!("Requesting {} embeddings from {}", input.len(), url);

        let response = self
            .client
            .post(url)
            .json(&EmbedRequest {
                model: &self.model,
                input,
            })
            .send()
            .await
            .context("Failed to send embedding request")?;

        let status = response.status();
        let body = response
            .text()
            .await
            .context("Failed to read response body")?;

        if !status.is_success() {
            if let Ok(error) = serde_json::from_str::<ErrorResponse>(&body) {
                anyhow::bail!("Ollama API error ({}): {}", status, error.error);
            }
            anyhow::bail!("Ollama API error ({}): {}", status, body);
        }

        let parsed: EmbedResponse =
            serde_json::from_str(&body).context("Failed to parse embedding response")?;

        if let Some(first) = parsed.embeddings.first() {
            let previous = self.dimension.swap(first.len(), Ordering::Relaxed);
            if previous != first.len() {
                tracing::debug!("Ollama model dimension is {} (configured {})", first.len(), previous);
            }
        }

        Ok(parsed.embeddings)
    }
}

/// Base URL ending in `/`, so relative joins keep a proxy path prefix
fn parse_base_url(raw: &str) -> Result<Url> {
    let mut url =
        Url::parse(raw.trim()).map_err(|_| ConfigError::InvalidUrl(raw.to_string()))?;

    if !url.path().ends_with('/') {
        let path = format!("{}/", url.path());
        url.set_path(&path);
    }
    Ok(url)
}

#[async_trait]
impl EmbeddingProvider for OllamaEmbedding {
    async fn embed(&self, text: &str) -> Result<Vec<f32>> {
        if text.trim().is_empty() {
            return Ok(vec![0.0; self.dimension()]);
        }

        self.request(vec![text])
            .await?
            .into_iter()
            .next()
            .context("Ollama returned no embedding")
    }

    async fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        // Dimension for blank entries is only known after the request
        let mut vectors =
            embed_non_blank(texts, 0, |inputs| async move { self.request(inputs).await }).await?;

        let dimension = self.dimension();
        for v in vectors.iter_mut().filter(|v| v.is_empty()) {
            v.resize(dimension, 0.0);
        }

        Ok(vectors)
    }

    fn dimension(&self) -> usize {
        self.dimension.load(Ordering::Relaxed)
    }

    fn name(&self) -> &str {
        "ollama"
    }
}

// ============================================================================
// Tests
// ============================================================================

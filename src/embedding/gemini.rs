//! Google Gemini 임베딩
//!
//! `embedContent` for single texts, `batchEmbedContents` for the knowledge-base
//! load (at most `MAX_BATCH_SIZE` questions per request).
//!
//! ref: https://ai.google.dev/gemini-api/docs/embeddings

use std::time::Duration;

use anyhow::{Context, Result};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use super::{embed_non_blank, EmbeddingProvider};
use crate::error::ConfigError;

const GEMINI_API_BASE: &str = "https://generativelanguage.googleapis.com/v1beta";

/// 기본 모델
pub const DEFAULT_GEMINI_MODEL: &str = "gemini-embedding-001";

/// 지원 차원 (MRL)
pub const GEMINI_DIMENSIONS: [usize; 3] = [768, 1536, 3072];

/// Query and stored question are compared symmetrically
const TASK_TYPE: &str = "SEMANTIC_SIMILARITY";

/// `batchEmbedContents` request limit
const MAX_BATCH_SIZE: usize = 100;

/// 429 에러 시 최대 재시도 횟수
const MAX_RETRIES: u32 = 3;
/// 재시도 시 초기 백오프 (ms)
const INITIAL_BACKOFF_MS: u64 = 2000;

/// Google Gemini 임베딩 구현체
#[derive(Debug)]
pub struct GeminiEmbedding {
    api_key: String,
    model: String,
    client: reqwest::Client,
    dimension: usize,
    base_url: String,
}

impl GeminiEmbedding {
    /// 차원을 지정하여 생성
    ///
    /// # Arguments
    /// * `api_key` - Google AI API 키
    /// * `dimension` - 임베딩 차원 (768, 1536, 3072 중 선택)
    pub fn with_dimension(api_key: String, dimension: usize) -> Result<Self> {
        Self::with_model(api_key, DEFAULT_GEMINI_MODEL, dimension)
    }

    /// 모델과 차원을 지정하여 생성
    pub fn with_model(api_key: String, model: &str, dimension: usize) -> Result<Self> {
        if !GEMINI_DIMENSIONS.contains(&dimension) {
            return Err(ConfigError::InvalidDimension(dimension).into());
        }

        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(30))
            .build()
            .context("Failed to create HTTP client")?;

        Ok(Self {
            api_key,
            model: model.trim_start_matches("models/").to_string(),
            client,
            dimension,
            base_url: GEMINI_API_BASE.to_string(),
        })
    }

    /// API 엔드포인트 변경 (테스트 / 프록시)
    pub fn with_base_url(mut self, base_url: &str) -> Self {
        self.base_url = base_url.trim_end_matches('/').to_string();
        self
    }

    fn endpoint(&self, method: &str) -> String {
        format!("{}/models/{}:{}", self.base_url, self.model, method)
    }

    fn request_for(&self, text: &str) -> EmbedRequest {
        EmbedRequest {
            model: format!("models/{}", self.model),
            content: EmbedContent {
                parts: vec![EmbedPart {
                    text: text.to_string(),
                }],
            },
            task_type: TASK_TYPE.to_string(),
            output_dimensionality: Some(self.dimension),
        }
    }

    /// POST with exponential backoff on 429 / transport errors
    async fn post_with_retry<T: Serialize + ?Sized>(&self, url: &str, body: &T) -> Result<String> {
        let mut last_error: Option<anyhow::Error> = None;

        for attempt in 0..=MAX_RETRIES {
            let backoff = Duration::from_millis(INITIAL_BACKOFF_MS * 2u64.pow(attempt));

            // API 키는 URL이 아닌 헤더로 전송
            let response = match self
                .client
                .post(url)
                .header("x-goog-api-key", &self.api_key)
                .json(body)
                .send()
                .await
            {
                Ok(resp) => resp,
                Err(e) => {
                    last_error = Some(anyhow::anyhow!("Failed to send embedding request: {}", e));
                    if attempt < MAX_RETRIES {
                        tracing::warn!(
                            "Request failed, retrying in {:?} (attempt {}/{})",
                            backoff,
                            attempt + 1,
                            MAX_RETRIES
                        );
                        tokio::time::sleep(backoff).await;
                        continue;
                    }
                    break;
                }
            };

            let status = response.status();
            let body = response
                .text()
                .await
                .context("Failed to read response body")?;

            if status.is_success() {
                return Ok(body);
            }

            if status.as_u16() == 429 {
                tracing::warn!(
                    "Rate limit hit (429), backing off {:?} (attempt {}/{})",
                    backoff,
                    attempt + 1,
                    MAX_RETRIES
                );
                last_error = Some(anyhow::anyhow!("Rate limit exceeded (429)"));

                if attempt < MAX_RETRIES {
                    tokio::time::sleep(backoff).await;
                    continue;
                }
            } else {
                // 다른 에러 - 즉시 실패
                if let Ok(error) = serde_json::from_str::<GeminiError>(&body) {
                    anyhow::bail!(
                        "Gemini API error ({}): {}",
                        error.error.status,
                        error.error.message
                    );
                }
                anyhow::bail!("Gemini API error ({}): {}", status, body);
            }
        }

        Err(last_error
            .unwrap_or_else(|| anyhow::anyhow!("Embedding failed after {} retries", MAX_RETRIES)))
    }
}

/// Gemini API 요청 본문
#[derive(Debug, Serialize)]
struct EmbedRequest {
    model: String,
    content: EmbedContent,
    #[serde(rename = "taskType")]
    task_type: String,
    #[serde(rename = "outputDimensionality", skip_serializing_if = "Option::is_none")]
    output_dimensionality: Option<usize>,
}

#[derive(Debug, Serialize)]
struct EmbedContent {
    parts: Vec<EmbedPart>,
}

#[derive(Debug, Serialize)]
struct EmbedPart {
    text: String,
}

#[derive(Debug, Serialize)]
struct BatchEmbedRequest {
    requests: Vec<EmbedRequest>,
}

/// Gemini API 응답
#[derive(Debug, Deserialize)]
struct EmbedResponse {
    embedding: EmbeddingValues,
}

#[derive(Debug, Deserialize)]
struct BatchEmbedResponse {
    embeddings: Vec<EmbeddingValues>,
}

#[derive(Debug, Deserialize)]
struct EmbeddingValues {
    values: Vec<f32>,
}

/// Gemini API 에러 응답
#[derive(Debug, Deserialize)]
struct GeminiError {
    error: GeminiErrorDetail,
}

#[derive(Debug, Deserialize)]
struct GeminiErrorDetail {
    message: String,
    #[serde(default)]
    status: String,
}

#[async_trait]
impl EmbeddingProvider for GeminiEmbedding {
    async fn embed(&self, text: &str) -> Result<Vec<f32>> {
        // 빈 텍스트 처리
        if text.trim().is_empty() {
            return Ok(vec![0.0; self.dimension]);
        }

        let body = self
            .post_with_retry(&self.endpoint("embedContent"), &self.request_for(text))
            .await?;
        let response: EmbedResponse =
            serde_json::from_str(&body).context("Failed to parse embedding response")?;

        Ok(response.embedding.values)
    }

    async fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        embed_non_blank(texts, self.dimension, |inputs| async move {
            let mut vectors = Vec::with_capacity(inputs.len());

            for chunk in inputs.chunks(MAX_BATCH_SIZE) {
                tracing::debug!("Embedding batch of {} texts", chunk.len());

                let request = BatchEmbedRequest {
                    requests: chunk.iter().map(|t| self.request_for(t)).collect(),
                };
                let body = self
                    .post_with_retry(&self.endpoint("batchEmbedContents"), &request)
                    .await?;
                let response: BatchEmbedResponse = serde_json::from_str(&body)
                    .context("Failed to parse batch embedding response")?;

                if response.embeddings.len() != chunk.len() {
                    anyhow::bail!(
                        "Gemini returned {} embeddings for a batch of {}",
                        response.embeddings.len(),
                        chunk.len()
                    );
                }
                vectors.extend(response.embeddings.into_iter().map(|e| e.values));
            }

            Ok(vectors)
        })
        .await
    }

    fn dimension(&self) -> usize {
        self.dimension
    }

    fn name(&self) -> &str {
        "gemini"
    }
}

// ============================================================================
// Tests
// ============================================================================

//! Knowledge Base - 메모리 내 FAQ 스냅샷
//!
//! Built once from the store and never mutated afterwards. When semantic
//! matching is enabled, all normalized questions are encoded with a single
//! batch call; `embeddings[i]` belongs to `entries[i]`.

use crate::embedding::EmbeddingProvider;
use crate::error::LoadError;
use crate::text::TextNormalizer;

use super::store::FaqRow;

// ============================================================================
// Types
// ============================================================================

/// FAQ 항목
#[derive(Debug, Clone, PartialEq)]
pub struct KnowledgeEntry {
    /// 원본 질문
    pub question_raw: String,
    /// 정규화된 질문
    pub question_clean: String,
    /// Lowercase, trimmed, never empty
    pub keywords: Vec<String>,
    /// 답변 (returned verbatim)
    pub answer: String,
}

impl KnowledgeEntry {
    pub fn from_row(row: &FaqRow, normalizer: &TextNormalizer) -> Self {
        Self {
            question_raw: row.question.clone(),
            question_clean: normalizer.normalize(&row.question),
            keywords: parse_keywords(row.keywords.as_deref()),
            answer: row.answer.clone(),
        }
    }

    /// First keyword that occurs as a literal substring of `normalized_query`
    pub fn matching_keyword(&self, normalized_query: &str) -> Option<&str> {
        self.keywords
            .iter()
            .map(String::as_str)
            .find(|k| normalized_query.contains(k))
    }
}

/// 지식 베이스 (immutable snapshot)
#[derive(Debug, Clone)]
pub struct KnowledgeBase {
    entries: Vec<KnowledgeEntry>,
    embeddings: Option<Vec<Vec<f32>>>,
}

impl KnowledgeBase {
    /// 지식 베이스 생성
    ///
    /// # Arguments
    /// * `rows` - 저장소 행 (stored order is kept)
    /// * `normalizer` - 질문 정규화
    /// * `embedder` - `Some` to encode questions for semantic matching
    ///
    /// All-or-nothing: an empty row set or an embedding failure yields `LoadError`.
    pub async fn build(
        rows: &[FaqRow],
        normalizer: &TextNormalizer,
        embedder: Option<&dyn EmbeddingProvider>,
    ) -> Result<Self, LoadError> {
        if rows.is_empty() {
            return Err(LoadError::Empty);
        }

        let entries: Vec<KnowledgeEntry> = rows
            .iter()
            .map(|row| KnowledgeEntry::from_row(row, normalizer))
            .collect();

        let embeddings = match embedder {
            Some(embedder) => {
                let questions: Vec<String> =
                    entries.iter().map(|e| e.question_clean.clone()).collect();

                tracing::info!(
                    "Encoding {} questions with {}",
                    questions.len(),
                    embedder.name()
                );

                let vectors = embedder
                    .embed_batch(&questions)
                    .await
                    .map_err(LoadError::Embedding)?;

                if vectors.len() != entries.len() {
                    return Err(LoadError::EmbeddingCount {
                        expected: entries.len(),
                        got: vectors.len(),
                    });
                }
                Some(vectors)
            }
            None => None,
        };

        Ok(Self {
            entries,
            embeddings,
        })
    }

    pub fn entries(&self) -> &[KnowledgeEntry] {
        &self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Stored question embeddings, index-aligned with `entries()`
    pub fn embeddings(&self) -> Option<&[Vec<f32>]> {
        self.embeddings.as_deref()
    }

    pub fn has_embeddings(&self) -> bool {
        self.embeddings.is_some()
    }
}

// ============================================================================
// Helper Functions
// ============================================================================

/// `;`-delimited keyword field → lowercase, trimmed, non-empty keywords
pub fn parse_keywords(field: Option<&str>) -> Vec<String> {
    field
        .map(|f| {
            f.split(';')
                .map(|k| k.trim().to_lowercase())
                .filter(|k| !k.is_empty())
                .collect()
        })
        .unwrap_or_default()
}

// ============================================================================
// Tests
// ============================================================================

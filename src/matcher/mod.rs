//! Matcher - 질문 → 답변 결정 엔진
//!
//! Strict order per query:
//! 1. normalize; empty → `Unanswered(NoContent)` without touching the knowledge base
//! 2. keyword stage: first entry (stored order) with a keyword contained in the query wins
//! 3. similarity stage, one of:
//!    - semantic: cosine similarity against stored embeddings, accept ≥ `similarity_threshold`
//!    - fuzzy: token-set ratio against cleaned questions, accept ≥ `fuzzy_threshold`
//! 4. below threshold → `Unanswered(NotConfident)` and the original query is logged
//!
//! The matcher keeps no state between calls.

mod fuzzy;

use crate::config::MatcherSettings;
use crate::embedding::EmbeddingProvider;
use crate::knowledge::{argmax, cosine_similarity, KnowledgeBase, LoadedKnowledge, MissRecorder};
use crate::text::TextNormalizer;

pub use fuzzy::{ratio, token_set_ratio};

// ============================================================================
// Types
// ============================================================================

/// 매칭 결과
#[derive(Debug, Clone, PartialEq)]
pub enum QueryResult {
    Answered(String),
    Unanswered(UnansweredReason),
}

impl QueryResult {
    pub fn answer(&self) -> Option<&str> {
        match self {
            Self::Answered(answer) => Some(answer),
            Self::Unanswered(_) => None,
        }
    }

    pub fn is_answered(&self) -> bool {
        matches!(self, Self::Answered(_))
    }
}

/// 미응답 사유
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UnansweredReason {
    /// Query normalized to nothing (only punctuation / stop words)
    NoContent,
    /// Best similarity below threshold
    NotConfident,
    /// Query could not be encoded by the embedding provider
    EncodingFailed,
}

/// Stage that produced an answer (logging)
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MatchStage {
    Keyword,
    Semantic,
    Fuzzy,
}

/// 매처 설정
#[derive(Debug, Clone, PartialEq)]
pub struct MatcherConfig {
    pub semantic_matching_enabled: bool,
    pub miss_logging_enabled: bool,
    /// 0.0 ~ 1.0
    pub similarity_threshold: f32,
    /// 0 ~ 100
    pub fuzzy_threshold: u8,
}

impl Default for MatcherConfig {
    fn default() -> Self {
        Self::from(&MatcherSettings::default())
    }
}

impl From<&MatcherSettings> for MatcherConfig {
    fn from(settings: &MatcherSettings) -> Self {
        Self {
            semantic_matching_enabled: settings.semantic_matching_enabled,
            miss_logging_enabled: settings.miss_logging_enabled,
            similarity_threshold: settings.similarity_threshold,
            fuzzy_threshold: settings.fuzzy_threshold,
        }
    }
}

/// Similarity stage verdict
enum StageOutcome {
    Accepted { index: usize },
    Rejected,
}

// ============================================================================
// Matcher
// ============================================================================

#[derive(Debug, Clone)]
pub struct Matcher {
    config: MatcherConfig,
    normalizer: TextNormalizer,
}

impl Matcher {
    /// # Arguments
    /// * `config` - 매처 설정
    /// * `normalizer` - must be the one the knowledge base was built with
    pub fn new(config: MatcherConfig, normalizer: TextNormalizer) -> Self {
        Self { config, normalizer }
    }

    pub fn config(&self) -> &MatcherConfig {
        &self.config
    }

    pub fn normalizer(&self) -> &TextNormalizer {
        &self.normalizer
    }

    /// 질문 매칭
    pub async fn match_query(&self, query: &str, knowledge: &LoadedKnowledge) -> QueryResult {
        let normalized = self.normalizer.normalize(query);
        if normalized.is_empty() {
            tracing::debug!("No usable content in query: {:?}", query);
            return QueryResult::Unanswered(UnansweredReason::NoContent);
        }

        let base = &knowledge.base;

        if let Some(index) = keyword_stage(&normalized, base) {
            return self.answered(base, index, MatchStage::Keyword);
        }

        let semantic = match (
            self.config.semantic_matching_enabled,
            knowledge.embedder.as_deref(),
            base.embeddings(),
        ) {
            (true, Some(embedder), Some(embeddings)) => Some((embedder, embeddings)),
            _ => None,
        };

        let (outcome, stage) = match semantic {
            Some((embedder, embeddings)) => {
                match self.semantic_stage(&normalized, embedder, embeddings).await {
                    Ok(outcome) => (outcome, MatchStage::Semantic),
                    Err(e) => {
                        tracing::warn!("Failed to encode query {:?}: {}", query, e);
                        return QueryResult::Unanswered(UnansweredReason::EncodingFailed);
                    }
                }
            }
            None => (self.fuzzy_stage(&normalized, base), MatchStage::Fuzzy),
        };

        match outcome {
            StageOutcome::Accepted { index } => self.answered(base, index, stage),
            StageOutcome::Rejected => {
                tracing::info!("Unanswered question: {:?}", query);
                if self.config.miss_logging_enabled {
                    if let Some(recorder) = knowledge.recorder.as_deref() {
                        record_miss(recorder, query);
                    }
                }
                QueryResult::Unanswered(UnansweredReason::NotConfident)
            }
        }
    }

    async fn semantic_stage(
        &self,
        normalized: &str,
        embedder: &dyn EmbeddingProvider,
        embeddings: &[Vec<f32>],
    ) -> anyhow::Result<StageOutcome> {
        let query_embedding = embedder.embed(normalized).await?;

        let best = argmax(embeddings.iter().map(|e| cosine_similarity(&query_embedding, e)));

        Ok(match best {
            Some((index, score)) if score >= self.config.similarity_threshold => {
                tracing::debug!("Semantic match #{} (score {:.3})", index, score);
                StageOutcome::Accepted { index }
            }
            Some((index, score)) => {
                tracing::debug!(
                    "Best semantic candidate #{} below threshold ({:.3} < {:.2})",
                    index,
                    score,
                    self.config.similarity_threshold
                );
                StageOutcome::Rejected
            }
            None => StageOutcome::Rejected,
        })
    }

    fn fuzzy_stage(&self, normalized: &str, base: &KnowledgeBase) -> StageOutcome {
        let best = argmax(
            base.entries()
                .iter()
                .map(|e| token_set_ratio(normalized, &e.question_clean)),
        );

        match best {
            Some((index, score)) if score > 0 && score >= self.config.fuzzy_threshold => {
                tracing::debug!("Fuzzy match #{} (ratio {})", index, score);
                StageOutcome::Accepted { index }
            }
            Some((index, score)) => {
                tracing::debug!(
                    "Best fuzzy candidate #{} below threshold ({} < {})",
                    index,
                    score,
                    self.config.fuzzy_threshold
                );
                StageOutcome::Rejected
            }
            None => StageOutcome::Rejected,
        }
    }

    fn answered(&self, base: &KnowledgeBase, index: usize, stage: MatchStage) -> QueryResult {
        let entry = &base.entries()[index];
        tracing::debug!("{:?} stage matched: {:?}", stage, entry.question_raw);
        QueryResult::Answered(entry.answer.clone())
    }
}

// ============================================================================
// Helper Functions
// ============================================================================

/// Index of the first entry with a keyword contained in the normalized query
fn keyword_stage(normalized: &str, base: &KnowledgeBase) -> Option<usize> {
    base.entries()
        .iter()
        .enumerate()
        .find_map(|(index, entry)| {
            let keyword = entry.matching_keyword(normalized)?;
            tracing::debug!("Keyword hit: {:?}", keyword);
            Some(index)
        })
}

/// Failures are logged and swallowed
fn record_miss(recorder: &dyn MissRecorder, query: &str) {
    if let Err(e) = recorder.record_miss(query) {
        tracing::warn!("{}", e);
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::MissRecordError;
    use crate::knowledge::FaqRow;
    use anyhow::Result;
    use async_trait::async_trait;
    use std::collections::HashMap;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::{Arc, Mutex};

    /// Provider with a fixed text → vector table; unknown text → `fallback`
    struct TableEmbedding {
        table: HashMap<String, Vec<f32>>,
        fallback: Vec<f32>,
        calls: AtomicUsize,
    }

    impl TableEmbedding {
        fn new(pairs: &[(&str, [f32; 3])], fallback: [f32; 3]) -> Self {
            Self {
                table: pairs
                    .iter()
                    .map(|(k, v)| (k.to_string(), v.to_vec()))
                    .collect(),
                fallback: fallback.to_vec(),
                calls: AtomicUsize::new(0),
            }
        }
    }

    #[async_trait]
    impl EmbeddingProvider for TableEmbedding {
        async fn embed(&self, text: &str) -> Result<Vec<f32>> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Ok(self.table.get(text).cloned().unwrap_or_else(|| self.fallback.clone()))
        }

        async fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
            Ok(texts
                .iter()
                .map(|t| self.table.get(t).cloned().unwrap_or_else(|| self.fallback.clone()))
                .collect())
        }

        fn dimension(&self) -> usize {
            3
        }

        fn name(&self) -> &str {
            "table"
        }
    }

    struct DownAfterLoad;

    #[async_trait]
    impl EmbeddingProvider for DownAfterLoad {
        async fn embed(&self, _text: &str) -> Result<Vec<f32>> {
            anyhow::bail!("connection reset")
        }

        async fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
            Ok(texts.iter().map(|_| vec![1.0, 0.0, 0.0]).collect())
        }

        fn dimension(&self) -> usize {
            3
        }

        fn name(&self) -> &str {
            "down"
        }
    }

    #[derive(Default)]
    struct MemoryRecorder {
        misses: Mutex<Vec<String>>,
    }

    impl MissRecorder for MemoryRecorder {
        fn record_miss(&self, query_text: &str) -> std::result::Result<(), MissRecordError> {
            self.misses.lock().unwrap().push(query_text.to_string());
            Ok(())
        }
    }

    struct FailingRecorder {
        attempts: AtomicUsize,
    }

    impl MissRecorder for FailingRecorder {
        fn record_miss(&self, _query_text: &str) -> std::result::Result<(), MissRecordError> {
            self.attempts.fetch_add(1, Ordering::SeqCst);
            Err(MissRecordError(anyhow::anyhow!("disk full")))
        }
    }

    const HORARIO: &str = "Atendemos de lunes a sábado de 8am a 6pm.";
    const ENVIOS: &str = "Enviamos a todo el Perú por Olva Courier.";
    const PAGOS: &str = "Aceptamos efectivo, Visa y Mastercard.";

    fn rows() -> Vec<FaqRow> {
        vec![
            FaqRow::new("¿Cuál es su horario?", Some("horario;atencion"), HORARIO),
            FaqRow::new("¿Hacen envíos a provincia?", Some("envio;provincia"), ENVIOS),
            FaqRow::new("¿Qué formas de pago aceptan?", None, PAGOS),
        ]
    }

    /// Stored questions: "cuál horario" → x, "hacen envíos provincia" → y, "formas pago aceptan" → z
    fn table() -> TableEmbedding {
        TableEmbedding::new(
            &[
                ("cuál horario", [1.0, 0.0, 0.0]),
                ("hacen envíos provincia", [0.0, 1.0, 0.0]),
                ("formas pago aceptan", [0.0, 0.0, 1.0]),
                ("puedo pagar tarjeta", [0.0, 0.0, 1.0]),
                ("mandan lima", [0.1, 0.99, 0.0]),
            ],
            [0.0, 0.0, 0.0],
        )
    }

    /// Payment question collapsed onto shipping so no stored vector points along z
    fn without_payment_axis(fallback: [f32; 3]) -> TableEmbedding {
        TableEmbedding::new(
            &[
                ("cuál horario", [1.0, 0.0, 0.0]),
                ("hacen envíos provincia", [0.0, 1.0, 0.0]),
                ("formas pago aceptan", [0.0, 1.0, 0.0]),
            ],
            fallback,
        )
    }

    async fn semantic(
        embedder: Arc<dyn EmbeddingProvider>,
        recorder: Option<Arc<dyn MissRecorder>>,
    ) -> LoadedKnowledge {
        let base = KnowledgeBase::build(&rows(), &TextNormalizer::spanish(), Some(embedder.as_ref()))
            .await
            .unwrap();
        LoadedKnowledge {
            base,
            embedder: Some(embedder),
            recorder,
        }
    }

    async fn fuzzy(recorder: Option<Arc<dyn MissRecorder>>) -> LoadedKnowledge {
        let base = KnowledgeBase::build(&rows(), &TextNormalizer::spanish(), None)
            .await
            .unwrap();
        LoadedKnowledge {
            base,
            embedder: None,
            recorder,
        }
    }

    fn matcher() -> Matcher {
        Matcher::new(MatcherConfig::default(), TextNormalizer::spanish())
    }

    #[tokio::test]
    async fn test_keyword_stage_example() {
        let knowledge = fuzzy(None).await;
        let result = matcher()
            .match_query("cual es el horario de atencion", &knowledge)
            .await;
        assert_eq!(result, QueryResult::Answered(HORARIO.to_string()));
    }

    #[tokio::test]
    async fn test_keyword_is_substring_of_normalized_query() {
        let knowledge = fuzzy(None).await;
        // "envio" ⊂ "envios"
        let result = matcher().match_query("¿Tienen ENVIOS?", &knowledge).await;
        assert_eq!(result.answer(), Some(ENVIOS));
    }

    #[tokio::test]
    async fn test_keyword_beats_semantic() {
        let embedder = Arc::new(table());
        let knowledge = semantic(embedder.clone(), None).await;

        // Semantically closest to the shipping entry, but mentions "horario"
        let result = matcher()
            .match_query("mandan lima horario", &knowledge)
            .await;
        assert_eq!(result.answer(), Some(HORARIO));
        assert_eq!(embedder.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_first_keyword_match_wins() {
        let knowledge = fuzzy(None).await;
        // both "horario" (entry 0) and "provincia" (entry 1) appear
        let result = matcher()
            .match_query("envio provincia horario", &knowledge)
            .await;
        assert_eq!(result.answer(), Some(HORARIO));
    }

    #[tokio::test]
    async fn test_empty_normalization_short_circuits() {
        let embedder = Arc::new(table());
        let recorder = Arc::new(MemoryRecorder::default());
        let knowledge = semantic(embedder.clone(), Some(recorder.clone())).await;

        for query in ["¿¡...!?", "de la que el", "   ", ""] {
            let result = matcher().match_query(query, &knowledge).await;
            assert_eq!(
                result,
                QueryResult::Unanswered(UnansweredReason::NoContent)
            );
        }

        assert_eq!(embedder.calls.load(Ordering::SeqCst), 0);
        assert!(recorder.misses.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_semantic_identical_vector_answers() {
        let embedder = Arc::new(table());
        let recorder = Arc::new(MemoryRecorder::default());
        let knowledge = semantic(embedder.clone(), Some(recorder.clone())).await;

        // normalizes to "pagar tarjeta" → same vector as "formas pago aceptan"
        let result = matcher().match_query("¿Puedo pagar con tarjeta?", &knowledge).await;
        assert_eq!(result.answer(), Some(PAGOS));
        assert_eq!(embedder.calls.load(Ordering::SeqCst), 1);
        assert!(recorder.misses.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_semantic_above_threshold() {
        let knowledge = semantic(Arc::new(table()), None).await;
        let result = matcher().match_query("¿Mandan a Lima?", &knowledge).await;
        assert_eq!(result.answer(), Some(ENVIOS));
    }

    #[tokio::test]
    async fn test_semantic_orthogonal_records_one_miss() {
        let embedder = Arc::new(without_payment_axis([0.0, 0.0, 1.0]));
        let recorder = Arc::new(MemoryRecorder::default());
        let knowledge = semantic(embedder, Some(recorder.clone())).await;

        let result = matcher()
            .match_query("no puedo pagar con tarjeta", &knowledge)
            .await;

        assert_eq!(
            result,
            QueryResult::Unanswered(UnansweredReason::NotConfident)
        );
        assert_eq!(
            *recorder.misses.lock().unwrap(),
            vec!["no puedo pagar con tarjeta".to_string()]
        );
    }

    #[tokio::test]
    async fn test_semantic_below_threshold_example() {
        // best cosine = 0.40 against "cuál horario" → not confident
        let embedder = Arc::new(without_payment_axis([0.4, 0.0, 0.916_515_1]));
        let recorder = Arc::new(MemoryRecorder::default());
        let knowledge = semantic(embedder, Some(recorder.clone())).await;

        let result = matcher()
            .match_query("no puedo pagar con tarjeta", &knowledge)
            .await;
        assert!(!result.is_answered());
        assert_eq!(recorder.misses.lock().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_semantic_tie_takes_first_entry() {
        // entries 1 and 2 both score 1.0
        let embedder = Arc::new(without_payment_axis([0.0, 1.0, 0.0]));
        let knowledge = semantic(embedder, None).await;

        let result = matcher().match_query("mandan lima", &knowledge).await;
        assert_eq!(result.answer(), Some(ENVIOS));
    }

    #[tokio::test]
    async fn test_threshold_boundary_is_inclusive() {
        let knowledge = semantic(Arc::new(table()), None).await;

        // identical unit vectors score exactly 1.0
        let config = MatcherConfig {
            similarity_threshold: 1.0,
            ..MatcherConfig::default()
        };
        let result = Matcher::new(config, TextNormalizer::spanish())
            .match_query("¿Puedo pagar con tarjeta?", &knowledge)
            .await;
        assert_eq!(result.answer(), Some(PAGOS));
    }

    #[tokio::test]
    async fn test_miss_logging_disabled() {
        let recorder = Arc::new(MemoryRecorder::default());
        let knowledge = fuzzy(Some(recorder.clone())).await;

        let config = MatcherConfig {
            miss_logging_enabled: false,
            ..MatcherConfig::default()
        };
        let result = Matcher::new(config, TextNormalizer::spanish())
            .match_query("¿venden llantas michelin?", &knowledge)
            .await;

        assert!(!result.is_answered());
        assert!(recorder.misses.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_recorder_failure_is_swallowed() {
        let recorder = Arc::new(FailingRecorder {
            attempts: AtomicUsize::new(0),
        });
        let knowledge = fuzzy(Some(recorder.clone())).await;

        let result = matcher()
            .match_query("¿venden llantas michelin?", &knowledge)
            .await;

        assert_eq!(
            result,
            QueryResult::Unanswered(UnansweredReason::NotConfident)
        );
        assert_eq!(recorder.attempts.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_fuzzy_stage_accepts_overlap() {
        let knowledge = fuzzy(None).await;
        // "formas pago" ⊂ "formas pago aceptan" → ratio 100
        let result = matcher().match_query("¿Formas de pago?", &knowledge).await;
        assert_eq!(result.answer(), Some(PAGOS));
    }

    #[tokio::test]
    async fn test_fuzzy_stage_ignores_accents() {
        let rows = vec![FaqRow::new(
            "¿Dirección del local?",
            None,
            "Av. Argentina 1234, Lima.",
        )];
        let base = KnowledgeBase::build(&rows, &TextNormalizer::spanish(), None)
            .await
            .unwrap();
        assert_eq!(base.entries()[0].question_clean, "dirección local");

        let knowledge = LoadedKnowledge {
            base,
            embedder: None,
            recorder: None,
        };
        let result = matcher().match_query("direccion?", &knowledge).await;
        assert_eq!(result.answer(), Some("Av. Argentina 1234, Lima."));
    }

    #[tokio::test]
    async fn test_fuzzy_stage_rejects_unrelated() {
        let recorder = Arc::new(MemoryRecorder::default());
        let knowledge = fuzzy(Some(recorder.clone())).await;

        let result = matcher()
            .match_query("¿Venden llantas Michelin?", &knowledge)
            .await;
        assert_eq!(
            result,
            QueryResult::Unanswered(UnansweredReason::NotConfident)
        );
        assert_eq!(
            *recorder.misses.lock().unwrap(),
            vec!["¿Venden llantas Michelin?".to_string()]
        );
    }

    #[tokio::test]
    async fn test_semantic_disabled_uses_fuzzy() {
        let embedder = Arc::new(table());
        let knowledge = semantic(embedder.clone(), None).await;

        let config = MatcherConfig {
            semantic_matching_enabled: false,
            ..MatcherConfig::default()
        };
        let result = Matcher::new(config, TextNormalizer::spanish())
            .match_query("¿Formas de pago?", &knowledge)
            .await;

        assert_eq!(result.answer(), Some(PAGOS));
        assert_eq!(embedder.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_query_encoding_failure() {
        let recorder = Arc::new(MemoryRecorder::default());
        let knowledge = semantic(Arc::new(DownAfterLoad), Some(recorder.clone())).await;

        let result = matcher().match_query("¿Mandan a Lima?", &knowledge).await;
        assert_eq!(
            result,
            QueryResult::Unanswered(UnansweredReason::EncodingFailed)
        );
        assert!(recorder.misses.lock().unwrap().is_empty());
    }
}

//! Knowledge Base loader - 프로세스당 1회 로드
//!
//! Lifecycle: `Unloaded → Loading → Ready` or `Unloaded → Loading → Failed`.
//! The outcome is memoized for the process lifetime, failures included;
//! retrying means restarting the process.

use std::future::Future;
use std::sync::atomic::{AtomicU8, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::OnceCell;

use crate::config::Config;
use crate::embedding::{create_embedder, EmbeddingProvider};
use crate::error::LoadError;
use crate::text::TextNormalizer;

use super::base::KnowledgeBase;
use super::store::{KnowledgeSource, KnowledgeStore, MissRecorder};

// ============================================================================
// Types
// ============================================================================

/// Knowledge base lifecycle state
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoadState {
    Unloaded,
    Loading,
    Ready,
    Failed,
}

impl LoadState {
    fn from_u8(value: u8) -> Self {
        match value {
            1 => Self::Loading,
            2 => Self::Ready,
            3 => Self::Failed,
            _ => Self::Unloaded,
        }
    }

    fn as_u8(self) -> u8 {
        match self {
            Self::Unloaded => 0,
            Self::Loading => 1,
            Self::Ready => 2,
            Self::Failed => 3,
        }
    }
}

/// Everything the matcher needs once loading succeeded
pub struct LoadedKnowledge {
    pub base: KnowledgeBase,
    /// Present only when `base` carries embeddings
    pub embedder: Option<Arc<dyn EmbeddingProvider>>,
    /// Present only when miss logging is enabled
    pub recorder: Option<Arc<dyn MissRecorder>>,
}

impl std::fmt::Debug for LoadedKnowledge {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LoadedKnowledge")
            .field("entries", &self.base.len())
            .field("semantic", &self.base.has_embeddings())
            .field("embedder", &self.embedder.as_ref().map(|e| e.name().to_string()))
            .field("recorder", &self.recorder.is_some())
            .finish()
    }
}

pub type LoadResult = Result<Arc<LoadedKnowledge>, Arc<LoadError>>;

// ============================================================================
// KnowledgeBaseCell
// ============================================================================

/// Single-construction holder
///
/// Concurrent callers during construction wait for the first one; the
/// builder runs at most once per cell.
#[derive(Default)]
pub struct KnowledgeBaseCell {
    cell: OnceCell<LoadResult>,
    state: AtomicU8,
}

impl KnowledgeBaseCell {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn state(&self) -> LoadState {
        LoadState::from_u8(self.state.load(Ordering::Acquire))
    }

    /// Memoized result, building it on first call
    pub async fn get_or_build<F, Fut>(&self, build: F) -> LoadResult
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<LoadedKnowledge, LoadError>>,
    {
        self.cell
            .get_or_init(|| async {
                self.set_state(LoadState::Loading);

                let result = build().await.map(Arc::new).map_err(Arc::new);
                match &result {
                    Ok(loaded) => {
                        tracing::info!(
                            "Knowledge base ready: {} entries (semantic: {})",
                            loaded.base.len(),
                            loaded.base.has_embeddings()
                        );
                        self.set_state(LoadState::Ready);
                    }
                    Err(e) => {
                        tracing::error!("Failed to load knowledge base: {}", e);
                        self.set_state(LoadState::Failed);
                    }
                }
                result
            })
            .await
            .clone()
    }

    /// Memoized result without triggering a build
    pub fn get(&self) -> Option<LoadResult> {
        self.cell.get().cloned()
    }

    fn set_state(&self, state: LoadState) {
        self.state.store(state.as_u8(), Ordering::Release);
    }
}

// ============================================================================
// KnowledgeLoader
// ============================================================================

/// Builds the knowledge base and its collaborators
#[async_trait]
pub trait KnowledgeLoader: Send + Sync {
    async fn load(&self) -> Result<LoadedKnowledge, LoadError>;
}

/// Loader backed by the SQLite store and the configured embedding provider
pub struct StoreLoader {
    config: Config,
    normalizer: TextNormalizer,
}

impl StoreLoader {
    pub fn new(config: Config, normalizer: TextNormalizer) -> Self {
        Self { config, normalizer }
    }
}

#[async_trait]
impl KnowledgeLoader for StoreLoader {
    async fn load(&self) -> Result<LoadedKnowledge, LoadError> {
        let db_path = self.config.database_path()?;

        let store = Arc::new(KnowledgeStore::open_existing(db_path).map_err(LoadError::Store)?);

        let embedder = self
            .config
            .matcher
            .semantic_matching_enabled
            .then(|| create_embedder(&self.config.embedding));

        let recorder: Option<Arc<dyn MissRecorder>> = self
            .config
            .matcher
            .miss_logging_enabled
            .then(|| store.clone() as Arc<dyn MissRecorder>);

        assemble(
            store.as_ref(),
            recorder,
            embedder,
            &self.normalizer,
            self.config.matcher.fallback_to_fuzzy,
        )
        .await
    }
}

/// Fetch rows and build the knowledge base
///
/// `embedder`: `None` when semantic matching is disabled, otherwise the
/// outcome of creating the provider. With `fallback_to_fuzzy`, a provider
/// failure (creation or batch encoding) degrades to a knowledge base without
/// embeddings instead of failing the load.
pub async fn assemble(
    source: &dyn KnowledgeSource,
    recorder: Option<Arc<dyn MissRecorder>>,
    embedder: Option<Result<Arc<dyn EmbeddingProvider>, LoadError>>,
    normalizer: &TextNormalizer,
    fallback_to_fuzzy: bool,
) -> Result<LoadedKnowledge, LoadError> {
    let rows = source.fetch_all().map_err(LoadError::Store)?;

    let embedder = match embedder {
        None => None,
        Some(Ok(embedder)) => Some(embedder),
        Some(Err(e)) if fallback_to_fuzzy => {
            tracing::warn!("Embedding provider unavailable, using fuzzy matching: {}", e);
            None
        }
        Some(Err(e)) => return Err(e),
    };

    let Some(embedder) = embedder else {
        let base = KnowledgeBase::build(&rows, normalizer, None).await?;
        return Ok(LoadedKnowledge {
            base,
            embedder: None,
            recorder,
        });
    };

    match KnowledgeBase::build(&rows, normalizer, Some(embedder.as_ref())).await {
        Ok(base) => Ok(LoadedKnowledge {
            base,
            embedder: Some(embedder),
            recorder,
        }),
        Err(e) if fallback_to_fuzzy && e.is_embedding_failure() => {
            tracing::warn!("Question encoding failed, using fuzzy matching: {}", e);
            let base = KnowledgeBase::build(&rows, normalizer, None).await?;
            Ok(LoadedKnowledge {
                base,
                embedder: None,
                recorder,
            })
        }
        Err(e) => Err(e),
    }
}

// ============================================================================
// Tests
// ============================================================================

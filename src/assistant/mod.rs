//! FAQ Assistant - 사용자 질문 응답
//!
//! Every query gets exactly one of three replies: the stored answer, the
//! "not understood" message, or the "service unavailable" message. The
//! knowledge base is loaded lazily on the first query and memoized, so a
//! failed load keeps answering "service unavailable" until restart.

use std::sync::Arc;

use crate::config::{Config, Messages};
use crate::error::{ConfigError, LoadError};
use crate::knowledge::{KnowledgeBaseCell, KnowledgeLoader, LoadState, StoreLoader};
use crate::matcher::{Matcher, MatcherConfig, QueryResult};
use crate::text::TextNormalizer;

/// 응답 종류
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Response {
    Answer(String),
    NotUnderstood,
    Unavailable,
}

impl Response {
    /// User-facing text
    pub fn into_text(self, messages: &Messages) -> String {
        match self {
            Self::Answer(answer) => answer,
            Self::NotUnderstood => messages.not_understood.clone(),
            Self::Unavailable => messages.service_unavailable.clone(),
        }
    }
}

pub struct FaqAssistant {
    loader: Box<dyn KnowledgeLoader>,
    cell: KnowledgeBaseCell,
    matcher: Matcher,
    messages: Messages,
}

impl FaqAssistant {
    pub fn new(loader: Box<dyn KnowledgeLoader>, matcher: Matcher, messages: Messages) -> Self {
        Self {
            loader,
            cell: KnowledgeBaseCell::new(),
            matcher,
            messages,
        }
    }

    /// SQLite store + configured embedding provider
    ///
    /// Only range errors surface here; anything that prevents loading the
    /// knowledge base (missing path, unreachable provider) is reported through
    /// the "service unavailable" reply on first use.
    pub fn from_config(config: Config) -> Result<Self, ConfigError> {
        config.validate()?;

        let normalizer =
            TextNormalizer::spanish().extend_stop_words(&config.matcher.extra_stop_words);
        let matcher = Matcher::new(MatcherConfig::from(&config.matcher), normalizer.clone());
        let messages = config.messages.clone();
        let loader = StoreLoader::new(config, normalizer);

        Ok(Self::new(Box::new(loader), matcher, messages))
    }

    /// 질문 응답
    pub async fn respond(&self, query: &str) -> Response {
        let knowledge = match self.cell.get_or_build(|| self.loader.load()).await {
            Ok(knowledge) => knowledge,
            Err(e) => {
                tracing::debug!("Knowledge base unavailable: {}", e);
                return Response::Unavailable;
            }
        };

        match self.matcher.match_query(query, &knowledge).await {
            QueryResult::Answered(answer) => Response::Answer(answer),
            QueryResult::Unanswered(reason) => {
                tracing::debug!("Unanswered ({:?}): {:?}", reason, query);
                Response::NotUnderstood
            }
        }
    }

    /// 질문 응답 (텍스트)
    pub async fn answer(&self, query: &str) -> String {
        self.respond(query).await.into_text(&self.messages)
    }

    /// Trigger loading without answering anything
    pub async fn preload(&self) -> Result<(), Arc<LoadError>> {
        self.cell
            .get_or_build(|| self.loader.load())
            .await
            .map(|_| ())
    }

    pub fn load_state(&self) -> LoadState {
        self.cell.state()
    }

    pub fn messages(&self) -> &Messages {
        &self.messages
    }

    pub fn matcher(&self) -> &Matcher {
        &self.matcher
    }
}

impl std::fmt::Debug for FaqAssistant {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FaqAssistant")
            .field("state", &self.load_state())
            .field("matcher", self.matcher.config())
            .finish()
    }
}

// ============================================================================
// Tests
// ============================================================================

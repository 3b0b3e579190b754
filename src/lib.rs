//! faq-assistant - 키워드 + 문장 임베딩 2단계 FAQ 응답기
//!
//! Answers customer questions from a fixed FAQ table: a keyword stage first,
//! then either sentence-embedding cosine similarity or a fuzzy token-set
//! ratio. Questions nobody could answer are logged back to the database.

pub mod assistant;
pub mod cli;
pub mod config;
pub mod embedding;
pub mod error;
pub mod knowledge;
pub mod matcher;
pub mod text;

// Re-exports
pub use assistant::{FaqAssistant, Response};
pub use config::{Config, Messages};
pub use embedding::{create_embedder, EmbeddingProvider, GeminiEmbedding, OllamaEmbedding};
pub use error::{ConfigError, LoadError, MissRecordError};
pub use knowledge::{
    FaqRow, KnowledgeBase, KnowledgeEntry, KnowledgeStore, LoadState, MissRecord, MissRecorder,
};
pub use matcher::{Matcher, MatcherConfig, QueryResult, UnansweredReason};
pub use text::TextNormalizer;

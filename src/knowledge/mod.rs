//! Knowledge 모듈 - FAQ 지식 저장소
//!
//! - SQLite: FAQ 행 + 미응답 질문 로그
//! - Base: 정규화된 질문 + 키워드 + (선택) 임베딩 스냅샷
//! - Loader: 프로세스당 1회 로드 (memoized, failures included)

mod base;
mod loader;
mod store;
mod vector;

// Re-exports
pub use base::{parse_keywords, KnowledgeBase, KnowledgeEntry};
pub use loader::{
    assemble, KnowledgeBaseCell, KnowledgeLoader, LoadResult, LoadState, LoadedKnowledge,
    StoreLoader,
};
pub use store::{
    get_data_dir, FaqRow, KnowledgeSource, KnowledgeStore, MissRecord, MissRecorder, StoreStats,
    StoredEntry,
};
pub use vector::{argmax, cosine_similarity};

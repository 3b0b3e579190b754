//! Knowledge Store - rusqlite 기반 FAQ 저장소
//!
//! FAQ rows `(question, keywords, answer)` and the unanswered-question log.
//! Keywords are stored as one `;`-delimited text column, as curated by operators.

use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, MutexGuard};

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use rusqlite::{params, Connection, OpenFlags};
use serde::Serialize;

use crate::error::MissRecordError;

// ============================================================================
// Data Directory
// ============================================================================

/// 데이터 디렉토리 경로 (~/.faq-assistant/)
pub fn get_data_dir() -> PathBuf {
    dirs::home_dir()
        .or_else(dirs::data_local_dir)
        .unwrap_or_else(|| PathBuf::from("."))
        .join(".faq-assistant")
}

// ============================================================================
// Types
// ============================================================================

/// Raw FAQ row, as stored
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FaqRow {
    pub question: String,
    /// `;`-delimited keyword field (may be NULL)
    pub keywords: Option<String>,
    pub answer: String,
}

impl FaqRow {
    pub fn new(question: impl Into<String>, keywords: Option<&str>, answer: impl Into<String>) -> Self {
        Self {
            question: question.into(),
            keywords: keywords.map(str::to_string),
            answer: answer.into(),
        }
    }
}

/// Stored FAQ entry (listing)
#[derive(Debug, Clone, Serialize)]
pub struct StoredEntry {
    pub id: i64,
    pub question: String,
    pub keywords: Option<String>,
    pub answer: String,
}

/// Logged unanswered question
#[derive(Debug, Clone, Serialize)]
pub struct MissRecord {
    pub id: i64,
    pub question: String,
    pub created_at: DateTime<Utc>,
}

/// 저장소 통계
#[derive(Debug, Clone, Serialize)]
pub struct StoreStats {
    pub entry_count: usize,
    pub miss_count: usize,
    pub db_path: PathBuf,
}

// ============================================================================
// Collaborator Traits
// ============================================================================

/// Read-only source of FAQ rows
pub trait KnowledgeSource: Send + Sync {
    /// All FAQ rows in stored order
    fn fetch_all(&self) -> Result<Vec<FaqRow>>;
}

/// Append-only log of unanswered questions
pub trait MissRecorder: Send + Sync {
    fn record_miss(&self, query_text: &str) -> std::result::Result<(), MissRecordError>;
}

// ============================================================================
// KnowledgeStore
// ============================================================================

/// Knowledge Store - SQLite FAQ 저장소
pub struct KnowledgeStore {
    conn: Arc<Mutex<Connection>>,
    db_path: PathBuf,
}

impl KnowledgeStore {
    /// 저장소 열기 (없으면 생성)
    ///
    /// # Arguments
    /// * `path` - DB 파일 경로 (없으면 생성)
    pub fn open(path: &Path) -> Result<Self> {
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() && !parent.exists() {
                std::fs::create_dir_all(parent)
                    .context("Failed to create database directory")?;
            }
        }

        Self::open_with_flags(
            path,
            OpenFlags::SQLITE_OPEN_READ_WRITE
                | OpenFlags::SQLITE_OPEN_CREATE
                | OpenFlags::SQLITE_OPEN_NO_MUTEX,
        )
    }

    /// Open an existing database; fails if the file is missing
    ///
    /// Used when loading the knowledge base, so a mistyped path surfaces as an
    /// unreachable store instead of an empty one.
    pub fn open_existing(path: &Path) -> Result<Self> {
        if !path.exists() {
            anyhow::bail!("Database file not found: {}", path.display());
        }

        Self::open_with_flags(
            path,
            OpenFlags::SQLITE_OPEN_READ_WRITE | OpenFlags::SQLITE_OPEN_NO_MUTEX,
        )
    }

    fn open_with_flags(path: &Path, flags: OpenFlags) -> Result<Self> {
        let conn = Connection::open_with_flags(path, flags)
            .with_context(|| format!("Failed to open SQLite database: {}", path.display()))?;

        let store = Self {
            conn: Arc::new(Mutex::new(conn)),
            db_path: path.to_path_buf(),
        };

        store.initialize()?;
        Ok(store)
    }

    /// DB 경로 반환
    pub fn db_path(&self) -> &Path {
        &self.db_path
    }

    fn lock(&self) -> Result<MutexGuard<'_, Connection>> {
        self.conn
            .lock()
            .map_err(|e| anyhow::anyhow!("Lock error: {}", e))
    }

    /// 스키마 초기화
    fn initialize(&self) -> Result<()> {
        let conn = self.lock()?;

        conn.execute_batch(
            r#"
            CREATE TABLE IF NOT EXISTS faq_entries (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                question TEXT NOT NULL,
                keywords TEXT,
                answer TEXT NOT NULL
            );

            CREATE TABLE IF NOT EXISTS unanswered_questions (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                question TEXT NOT NULL,
                created_at TEXT NOT NULL
            );
            "#,
        )
        .context("Failed to create tables")?;

        tracing::debug!("Knowledge store initialized at {:?}", self.db_path);
        Ok(())
    }

    /// FAQ 항목 추가
    pub fn add_entry(&self, row: &FaqRow) -> Result<i64> {
        let conn = self.lock()?;

        conn.execute(
            "INSERT INTO faq_entries (question, keywords, answer) VALUES (?1, ?2, ?3)",
            params![row.question, row.keywords, row.answer],
        )
        .context("Failed to insert FAQ entry")?;

        let id = conn.last_insert_rowid();
        tracing::info!("Added FAQ entry: {} (id={})", row.question, id);

        Ok(id)
    }

    /// FAQ 목록 조회 (stored order)
    pub fn list_entries(&self, limit: usize) -> Result<Vec<StoredEntry>> {
        let conn = self.lock()?;

        let mut stmt = conn.prepare(
            "SELECT id, question, keywords, answer FROM faq_entries ORDER BY id LIMIT ?1",
        )?;

        let entries = stmt
            .query_map(params![limit as i64], |row| {
                Ok(StoredEntry {
                    id: row.get(0)?,
                    question: row.get(1)?,
                    keywords: row.get(2)?,
                    answer: row.get(3)?,
                })
            })?
            .collect::<rusqlite::Result<Vec<_>>>()?;

        Ok(entries)
    }

    /// 미응답 질문 목록 (newest first)
    pub fn list_misses(&self, limit: usize) -> Result<Vec<MissRecord>> {
        let conn = self.lock()?;

        let mut stmt = conn.prepare(
            "SELECT id, question, created_at FROM unanswered_questions
             ORDER BY id DESC
             LIMIT ?1",
        )?;

        let misses = stmt
            .query_map(params![limit as i64], |row| {
                Ok(MissRecord {
                    id: row.get(0)?,
                    question: row.get(1)?,
                    created_at: parse_datetime(row.get::<_, String>(2)?),
                })
            })?
            .collect::<rusqlite::Result<Vec<_>>>()?;

        Ok(misses)
    }

    /// 저장소 통계
    pub fn stats(&self) -> Result<StoreStats> {
        let conn = self.lock()?;

        let entry_count: i64 =
            conn.query_row("SELECT COUNT(*) FROM faq_entries", [], |row| row.get(0))?;
        let miss_count: i64 =
            conn.query_row("SELECT COUNT(*) FROM unanswered_questions", [], |row| row.get(0))?;

        Ok(StoreStats {
            entry_count: entry_count as usize,
            miss_count: miss_count as usize,
            db_path: self.db_path.clone(),
        })
    }
}

impl KnowledgeSource for KnowledgeStore {
    fn fetch_all(&self) -> Result<Vec<FaqRow>> {
        let conn = self.lock()?;

        let mut stmt = conn
            .prepare("SELECT question, keywords, answer FROM faq_entries ORDER BY id")
            .context("Failed to query FAQ entries")?;

        let rows = stmt
            .query_map([], |row| {
                Ok(FaqRow {
                    question: row.get(0)?,
                    keywords: row.get(1)?,
                    answer: row.get(2)?,
                })
            })?
            .collect::<rusqlite::Result<Vec<_>>>()
            .context("Failed to read FAQ entries")?;

        tracing::debug!("Fetched {} FAQ rows from {:?}", rows.len(), self.db_path);
        Ok(rows)
    }
}

impl MissRecorder for KnowledgeStore {
    fn record_miss(&self, query_text: &str) -> std::result::Result<(), MissRecordError> {
        let conn = self.lock().map_err(MissRecordError)?;
        let now = Utc::now().to_rfc3339();

        conn.execute(
            "INSERT INTO unanswered_questions (question, created_at) VALUES (?1, ?2)",
            params![query_text, now],
        )
        .map_err(|e| MissRecordError(e.into()))?;

        tracing::debug!("Recorded unanswered question: {}", query_text);
        Ok(())
    }
}

// ============================================================================
// Helper Functions
// ============================================================================

/// RFC3339 문자열을 DateTime<Utc>로 파싱
fn parse_datetime(s: String) -> DateTime<Utc> {
    DateTime::parse_from_rfc3339(&s)
        .map(|dt| dt.with_timezone(&Utc))
        .unwrap_or_else(|_| Utc::now())
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn create_test_store() -> (TempDir, KnowledgeStore) {
        let dir = TempDir::new().unwrap();
        let db_path = dir.path().join("test.db");
        let store = KnowledgeStore::open(&db_path).unwrap();
        (dir, store)
    }

    #[test]
    fn test_data_dir_is_home_dotdir() {
        let dir = get_data_dir();
        assert!(dir.ends_with(".faq-assistant"));
        if let Some(home) = dirs::home_dir() {
            assert_eq!(dir, home.join(".faq-assistant"));
        }
    }

    #[test]
    fn test_add_and_fetch_all_in_stored_order() {
        let (_dir, store) = create_test_store();

        store
            .add_entry(&FaqRow::new(
                "¿Cuál es su horario?",
                Some("horario;atencion"),
                "Atendemos de 8am a 6pm.",
            ))
            .unwrap();
        store
            .add_entry(&FaqRow::new("¿Hacen envíos?", None, "Sí, a todo el país."))
            .unwrap();

        let rows = store.fetch_all().unwrap();
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0].question, "¿Cuál es su horario?");
        assert_eq!(rows[0].keywords.as_deref(), Some("horario;atencion"));
        assert_eq!(rows[1].keywords, None);
        assert_eq!(rows[1].answer, "Sí, a todo el país.");
    }

    #[test]
    fn test_open_existing_missing_file() {
        let dir = TempDir::new().unwrap();
        let result = KnowledgeStore::open_existing(&dir.path().join("missing.db"));
        assert!(result.is_err());
        assert!(!dir.path().join("missing.db").exists());
    }

    #[test]
    fn test_open_existing_after_create() {
        let dir = TempDir::new().unwrap();
        let db_path = dir.path().join("faq.db");

        {
            let store = KnowledgeStore::open(&db_path).unwrap();
            store
                .add_entry(&FaqRow::new("q", Some("k"), "a"))
                .unwrap();
        }

        let store = KnowledgeStore::open_existing(&db_path).unwrap();
        assert_eq!(store.fetch_all().unwrap().len(), 1);
    }

    #[test]
    fn test_record_and_list_misses() {
        let (_dir, store) = create_test_store();

        store.record_miss("no puedo pagar con tarjeta").unwrap();
        store.record_miss("¿venden llantas?").unwrap();

        let misses = store.list_misses(10).unwrap();
        assert_eq!(misses.len(), 2);
        // newest first
        assert_eq!(misses[0].question, "¿venden llantas?");
        assert_eq!(misses[1].question, "no puedo pagar con tarjeta");

        let misses = store.list_misses(1).unwrap();
        assert_eq!(misses.len(), 1);
    }

    #[test]
    fn test_list_entries_limit() {
        let (_dir, store) = create_test_store();

        for i in 0..5 {
            store
                .add_entry(&FaqRow::new(format!("Pregunta {}", i), None, format!("Respuesta {}", i)))
                .unwrap();
        }

        let list = store.list_entries(3).unwrap();
        assert_eq!(list.len(), 3);
        assert_eq!(list[0].question, "Pregunta 0");
    }

    #[test]
    fn test_stats() {
        let (_dir, store) = create_test_store();

        store.add_entry(&FaqRow::new("q", None, "a")).unwrap();
        store.record_miss("miss").unwrap();
        store.record_miss("miss 2").unwrap();

        let stats = store.stats().unwrap();
        assert_eq!(stats.entry_count, 1);
        assert_eq!(stats.miss_count, 2);
    }
}

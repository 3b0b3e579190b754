//! CLI 모듈
//!
//! faq-assistant CLI 명령어 정의 및 구현

use std::io::Write;
use std::path::PathBuf;

use anyhow::{bail, Context, Result};
use clap::{Args, Parser, Subcommand};
use tokio::io::{AsyncBufReadExt, BufReader};

use crate::assistant::FaqAssistant;
use crate::config::{Config, ProviderKind};
use crate::embedding::{has_api_key, OllamaEmbedding};
use crate::knowledge::{FaqRow, KnowledgeStore, LoadState};

// ============================================================================
// CLI Definition
// ============================================================================

#[derive(Parser)]
#[command(name = "faq-assistant")]
#[command(version, about = "FAQ 자동 응답기 (keyword + semantic matching)", long_about = None)]
pub struct Cli {
    #[command(flatten)]
    pub global: GlobalArgs,

    #[command(subcommand)]
    pub command: Commands,
}

/// Overrides applied on top of the config file and environment
#[derive(Args, Debug, Default)]
pub struct GlobalArgs {
    /// 설정 파일 경로 (기본: ~/.faq-assistant/config.toml)
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    /// SQLite 데이터베이스 경로
    #[arg(long, global = true)]
    pub db: Option<PathBuf>,

    /// 임베딩 대신 fuzzy 매칭 사용
    #[arg(long, global = true)]
    pub no_semantic: bool,

    /// 미응답 질문 기록 비활성화
    #[arg(long, global = true)]
    pub no_miss_log: bool,

    /// 임베딩 제공자 (ollama | gemini)
    #[arg(long, global = true)]
    pub provider: Option<ProviderKind>,

    /// 상세 로그 출력
    #[arg(short, long, global = true)]
    pub verbose: bool,
}

#[derive(Subcommand)]
pub enum Commands {
    /// 질문 하나에 답변
    Ask {
        /// 질문
        query: String,
    },

    /// 대화 모드 (stdin)
    Chat,

    /// FAQ 항목 추가
    Add {
        /// 질문
        #[arg(short, long)]
        question: String,

        /// 키워드 (';' 구분)
        #[arg(short, long)]
        keywords: Option<String>,

        /// 답변
        #[arg(short, long)]
        answer: String,
    },

    /// 저장된 FAQ 목록
    List {
        /// 결과 개수 제한
        #[arg(short, long, default_value = "20")]
        limit: usize,
    },

    /// 미응답 질문 목록
    Misses {
        /// 결과 개수 제한
        #[arg(short, long, default_value = "20")]
        limit: usize,
    },

    /// 상태 확인
    Status,
}

impl Cli {
    pub fn log_level(&self) -> tracing::Level {
        if self.global.verbose {
            tracing::Level::DEBUG
        } else {
            tracing::Level::WARN
        }
    }
}

impl GlobalArgs {
    /// Config file + environment, then flags
    pub fn load_config(&self) -> Result<Config> {
        let mut config = Config::load(self.config.as_deref()).context("Failed to load config")?;
        self.apply(&mut config);
        Ok(config)
    }

    fn apply(&self, config: &mut Config) {
        if let Some(ref db) = self.db {
            config.database.path = Some(db.clone());
        }
        if self.no_semantic {
            config.matcher.semantic_matching_enabled = false;
        }
        if self.no_miss_log {
            config.matcher.miss_logging_enabled = false;
        }
        if let Some(provider) = self.provider {
            config.embedding.provider = provider;
        }
    }
}

// ============================================================================
// CLI Runner
// ============================================================================

/// CLI 명령어 실행
pub async fn run(cli: Cli) -> Result<()> {
    let config = cli.global.load_config()?;

    match cli.command {
        Commands::Ask { query } => cmd_ask(config, &query).await,
        Commands::Chat => cmd_chat(config).await,
        Commands::Add {
            question,
            keywords,
            answer,
        } => cmd_add(&config, &question, keywords.as_deref(), &answer),
        Commands::List { limit } => cmd_list(&config, limit),
        Commands::Misses { limit } => cmd_misses(&config, limit),
        Commands::Status => cmd_status(config, cli.global.config.as_deref()).await,
    }
}

// ============================================================================
// Command Implementations
// ============================================================================

/// 단일 질문 (ask)
async fn cmd_ask(config: Config, query: &str) -> Result<()> {
    let assistant = FaqAssistant::from_config(config).context("Invalid configuration")?;
    println!("{}", assistant.answer(query).await);
    Ok(())
}

/// 대화 모드 (chat)
///
/// One question is answered to completion before the next line is read.
async fn cmd_chat(config: Config) -> Result<()> {
    let assistant = FaqAssistant::from_config(config).context("Invalid configuration")?;

    println!("[*] Loading knowledge base...");
    match assistant.preload().await {
        Ok(()) => println!("[OK] Ready. Type 'salir' to quit.\n"),
        Err(e) => println!("[!] {}\n", e),
    }

    let mut lines = BufReader::new(tokio::io::stdin()).lines();

    loop {
        print!("> ");
        std::io::stdout().flush()?;

        let Some(line) = lines.next_line().await? else {
            println!();
            break;
        };

        let query = line.trim();
        if is_exit_command(query) {
            break;
        }
        if query.is_empty() {
            continue;
        }

        println!("{}\n", assistant.answer(query).await);
    }

    Ok(())
}

/// FAQ 추가 (add)
fn cmd_add(config: &Config, question: &str, keywords: Option<&str>, answer: &str) -> Result<()> {
    if question.trim().is_empty() || answer.trim().is_empty() {
        bail!("--question and --answer must not be empty");
    }

    let store = open_store(config, true)?;
    let id = store
        .add_entry(&FaqRow::new(question, keywords, answer))
        .context("Failed to add FAQ entry")?;

    println!("[OK] FAQ entry added (ID: {})", id);
    println!("     DB: {}", store.db_path().display());

    Ok(())
}

/// FAQ 목록 (list)
fn cmd_list(config: &Config, limit: usize) -> Result<()> {
    let store = open_store(config, false)?;
    let entries = store.list_entries(limit).context("Failed to list FAQ entries")?;

    if entries.is_empty() {
        println!("[!] No FAQ entries stored.");
        return Ok(());
    }

    println!("[OK] FAQ entries ({}):\n", entries.len());

    for entry in entries {
        println!("  #{:<4} {}", entry.id, truncate_text(&entry.question, 60));
        println!("        Keywords: {}", entry.keywords.as_deref().unwrap_or("-"));
        println!("        Answer: {}", truncate_text(&entry.answer, 80));
        println!();
    }

    Ok(())
}

/// 미응답 질문 (misses)
fn cmd_misses(config: &Config, limit: usize) -> Result<()> {
    let store = open_store(config, false)?;
    let misses = store.list_misses(limit).context("Failed to list misses")?;

    if misses.is_empty() {
        println!("[!] No unanswered questions logged.");
        return Ok(());
    }

    println!("[OK] Unanswered questions ({}, newest first):\n", misses.len());

    for miss in misses {
        println!(
            "  {} | {}",
            miss.created_at.format("%Y-%m-%d %H:%M"),
            truncate_text(&miss.question, 80)
        );
    }

    Ok(())
}

/// 상태 확인 (status)
async fn cmd_status(config: Config, config_arg: Option<&std::path::Path>) -> Result<()> {
    println!("faq-assistant v{}", env!("CARGO_PKG_VERSION"));
    println!();

    match Config::source_path(config_arg) {
        Some(path) => println!("[*] Config file: {}", path.display()),
        None => println!("[*] Config file: none (defaults + environment)"),
    }

    let matcher = &config.matcher;
    if matcher.semantic_matching_enabled {
        println!(
            "[*] Matching: keyword + semantic (threshold {:.2})",
            matcher.similarity_threshold
        );
    } else {
        println!(
            "[*] Matching: keyword + fuzzy (threshold {})",
            matcher.fuzzy_threshold
        );
    }
    println!(
        "[*] Miss logging: {}",
        if matcher.miss_logging_enabled { "on" } else { "off" }
    );

    // 데이터베이스
    match config.database.path.as_deref() {
        Some(path) => match KnowledgeStore::open_existing(path).and_then(|s| s.stats()) {
            Ok(stats) => {
                println!("[OK] Database: {}", stats.db_path.display());
                println!(
                    "     FAQ entries: {}, unanswered: {} ({})",
                    stats.entry_count,
                    stats.miss_count,
                    format_file_size(path)
                );
            }
            Err(e) => println!("[!] Database: {:#}", e),
        },
        None => {
            println!("[!] Database: not configured");
            println!("    Set: export FAQ_DATABASE_PATH=/path/to/faq.db");
        }
    }

    // 임베딩 제공자
    if matcher.semantic_matching_enabled {
        print_provider_status(&config).await;
    }

    // 지식 베이스 로드
    let assistant = FaqAssistant::from_config(config).context("Invalid configuration")?;
    if let Err(e) = assistant.preload().await {
        tracing::debug!("Preload failed: {:?}", e);
    }
    match assistant.load_state() {
        LoadState::Ready => println!("[OK] Knowledge base: ready"),
        state => println!("[!] Knowledge base: {:?}", state),
    }

    Ok(())
}

async fn print_provider_status(config: &Config) {
    let embedding = &config.embedding;
    println!(
        "[*] Embedding: {} / {}",
        embedding.provider,
        embedding.model_name()
    );

    match embedding.provider {
        ProviderKind::Ollama => {
            let health = match OllamaEmbedding::new(
                &embedding.ollama_url,
                embedding.model_name(),
                embedding.dimension,
            ) {
                Ok(provider) => provider.health_check().await,
                Err(e) => Err(e),
            };
            match health {
                Ok(()) => println!("[OK] Ollama: {}", embedding.ollama_url),
                Err(e) => println!("[!] Ollama: {}", e),
            }
        }
        ProviderKind::Gemini => {
            if has_api_key() {
                println!("[OK] API key: set");
            } else {
                println!("[!] API key: not set");
                println!("    Set: export GEMINI_API_KEY=your-key");
            }
        }
    }
}

// ============================================================================
// Helper Functions
// ============================================================================

fn open_store(config: &Config, create: bool) -> Result<KnowledgeStore> {
    let path = config.database_path().context(
        "No database configured (use --db, FAQ_DATABASE_PATH or database.path in config.toml)",
    )?;

    let store = if create {
        KnowledgeStore::open(path)
    } else {
        KnowledgeStore::open_existing(path)
    };
    store.context("Failed to open database")
}

fn is_exit_command(input: &str) -> bool {
    matches!(input.to_lowercase().as_str(), "salir" | "exit")
}

/// 텍스트 자르기 (UTF-8 안전)
fn truncate_text(text: &str, max_chars: usize) -> String {
    let cleaned = text.replace('\n', " ").replace('\r', "");
    let cleaned = cleaned.trim();

    if cleaned.chars().count() <= max_chars {
        cleaned.to_string()
    } else {
        let truncated: String = cleaned.chars().take(max_chars).collect();
        format!("{}...", truncated)
    }
}

/// 파일 크기 포맷팅
fn format_file_size(path: &std::path::Path) -> String {
    std::fs::metadata(path)
        .map(|m| format_bytes(m.len()))
        .unwrap_or_else(|_| "-".to_string())
}

fn format_bytes(bytes: u64) -> String {
    const KB: u64 = 1024;
    const MB: u64 = KB * 1024;

    if bytes >= MB {
        format!("{:.2} MB", bytes as f64 / MB as f64)
    } else if bytes >= KB {
        format!("{:.2} KB", bytes as f64 / KB as f64)
    } else {
        format!("{} B", bytes)
    }
}

// ============================================================================
// Tests
// ============================================================================

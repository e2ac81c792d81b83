//! CLI 모듈
//!
//! knowbase CLI 명령어 정의 및 구현. 라이브러리 코어 위의 얇은 셸입니다.

use std::path::{Path, PathBuf};

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};

use crate::collector::DocumentKind;
use crate::config::{get_data_dir, RagConfig};
use crate::knowledge::{DocumentProcessor, LanceVectorStore, VectorStore};
use crate::rag::{QueryResult, RagManager};

// ============================================================================
// CLI Definition
// ============================================================================

#[derive(Parser)]
#[command(name = "knowbase")]
#[command(version, about = "문서 기반 질의응답 RAG 시스템", long_about = None)]
pub struct Cli {
    /// 설정 파일 경로 (기본: 데이터 디렉토리/config.toml)
    #[arg(short, long, global = true)]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// 지식베이스 빌드 (기존 인덱스가 있으면 재사용)
    Build {
        /// 강제 재빌드
        #[arg(long)]
        rebuild: bool,
    },

    /// 질문 하나에 답변
    Ask {
        /// 질문
        question: String,

        /// 강제 재빌드 후 질문
        #[arg(long)]
        rebuild: bool,

        /// JSON으로 출력
        #[arg(long)]
        json: bool,
    },

    /// 대화형 질의 (각 줄은 독립 질문)
    Chat {
        /// 강제 재빌드 후 시작
        #[arg(long)]
        rebuild: bool,
    },

    /// 문서 디렉토리 통계
    Stats {
        /// 문서 디렉토리 (기본: 설정값)
        #[arg(short, long)]
        dir: Option<PathBuf>,
    },

    /// 상태 확인
    Status,
}

// ============================================================================
// CLI Runner
// ============================================================================

/// CLI 명령어 실행
pub async fn run(cli: Cli) -> Result<()> {
    let config = RagConfig::load(cli.config.as_deref()).context("설정 로드 실패")?;

    match cli.command {
        Commands::Build { rebuild } => cmd_build(config, rebuild).await,
        Commands::Ask {
            question,
            rebuild,
            json,
        } => cmd_ask(config, &question, rebuild, json).await,
        Commands::Chat { rebuild } => cmd_chat(config, rebuild).await,
        Commands::Stats { dir } => cmd_stats(&config, dir),
        Commands::Status => cmd_status(&config).await,
    }
}

// ============================================================================
// Command Implementations
// ============================================================================

/// 매니저 생성 + 초기화
async fn ready_manager(config: RagConfig, rebuild: bool) -> Result<RagManager> {
    let documents_dir = config.documents_dir.clone();

    println!("[*] 임베딩 모델 로드 중: {}", config.embedding.model);
    let mut manager = RagManager::new(config)
        .await
        .context("RAG 시스템 생성 실패")?;

    if rebuild {
        println!("[*] 지식베이스 재빌드 중: {}", documents_dir.display());
    }

    if !manager.initialize(rebuild).await {
        bail!(
            "지식베이스 초기화 실패.\n\n\
             확인 사항:\n  \
             문서 디렉토리: {}\n  \
             지원 형식: {}\n  \
             (자세한 내용은 RUST_LOG=debug 로 확인)",
            documents_dir.display(),
            DocumentKind::supported_extensions()
        );
    }

    Ok(manager)
}

/// 빌드 명령어 (build)
async fn cmd_build(config: RagConfig, rebuild: bool) -> Result<()> {
    let manager = ready_manager(config, rebuild).await?;

    let stats = manager.index().stats().await.context("인덱스 통계 조회 실패")?;
    println!("[OK] 지식베이스 준비 완료");
    println!("     컬렉션: {}", stats.collection);
    println!("     프래그먼트: {} 건", stats.record_count);
    println!("     모델: {} ({}차원)", stats.model, stats.dimension);

    Ok(())
}

/// 질문 명령어 (ask)
async fn cmd_ask(config: RagConfig, question: &str, rebuild: bool, json: bool) -> Result<()> {
    let manager = ready_manager(config, rebuild).await?;
    let result = manager.query(question).await;

    if json {
        let text = serde_json::to_string_pretty(&result).context("결과 직렬화 실패")?;
        println!("{}", text);
    } else {
        print_result(&result);
    }

    Ok(())
}

/// 대화 명령어 (chat)
///
/// 대화 기록은 유지하지 않습니다. `exit` / `quit`으로 종료합니다.
async fn cmd_chat(config: RagConfig, rebuild: bool) -> Result<()> {
    let manager = ready_manager(config, rebuild).await?;

    let mode = if manager.is_generative() {
        "생성"
    } else {
        "발췌"
    };
    println!("[OK] 준비 완료 ({} 모드). 종료: exit", mode);

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    let mut stdout = tokio::io::stdout();

    loop {
        stdout.write_all(b"\n> ").await?;
        stdout.flush().await?;

        let Some(line) = lines.next_line().await.context("입력 읽기 실패")? else {
            break;
        };

        let question = line.trim();
        if matches!(question, "exit" | "quit") {
            break;
        }
        if question.is_empty() {
            continue;
        }

        let result = manager.query(question).await;
        print_result(&result);
    }

    Ok(())
}

/// 통계 명령어 (stats)
fn cmd_stats(config: &RagConfig, dir: Option<PathBuf>) -> Result<()> {
    let dir = dir.unwrap_or_else(|| config.documents_dir.clone());
    let stats = DocumentProcessor::new(config.chunk.clone()).document_stats(&dir);

    println!("[*] 문서 디렉토리: {}", dir.display());

    if stats.file_count == 0 {
        println!("[!] 지원 문서가 없습니다.");
        return Ok(());
    }

    println!("[OK] 문서: {} 건", stats.file_count);
    println!("     총 크기: {:.2} MB", stats.size_in_mb());
    for (ext, count) in &stats.counts_by_extension {
        println!("     {:<6} {}", ext, count);
    }

    Ok(())
}

/// 상태 명령어 (status)
///
/// 임베딩 모델을 로드하지 않고 설정과 저장된 인덱스를 확인합니다.
async fn cmd_status(config: &RagConfig) -> Result<()> {
    println!("knowbase v{}", env!("CARGO_PKG_VERSION"));
    println!();

    println!("[*] 데이터 디렉토리: {}", get_data_dir().display());

    // 문서 디렉토리
    let stats = DocumentProcessor::new(config.chunk.clone()).document_stats(&config.documents_dir);
    if stats.file_count > 0 {
        println!(
            "[OK] 문서 디렉토리: {} ({} 건, {})",
            config.documents_dir.display(),
            stats.file_count,
            format_bytes(stats.total_bytes)
        );
    } else {
        println!(
            "[!] 문서 디렉토리: {} (지원 문서 없음)",
            config.documents_dir.display()
        );
    }

    // API 키 상태
    if config.generation.has_api_key() {
        println!("[OK] API 키: 설정됨 (생성 모드, {})", config.generation.model);
    } else {
        println!("[!] API 키: 미설정 (발췌 모드)");
        println!("    설정: export OPENAI_API_KEY=your-key");
    }

    // 벡터 인덱스
    match index_record_count(&config.index_dir, &config.collection_name).await {
        Ok(Some(count)) => println!("[OK] 벡터 인덱스: {} 프래그먼트", count),
        Ok(None) => println!("[!] 벡터 인덱스: 없음 (knowbase build 실행)"),
        Err(e) => println!("[!] 벡터 인덱스 조회 실패: {}", e),
    }

    Ok(())
}

/// 저장된 컬렉션 레코드 수 (없으면 None)
async fn index_record_count(index_dir: &Path, collection: &str) -> Result<Option<usize>> {
    if !index_dir.exists() {
        return Ok(None);
    }

    let store = LanceVectorStore::open(index_dir, collection).await?;
    if !store.exists().await? {
        return Ok(None);
    }
    Ok(Some(store.count().await?))
}

// ============================================================================
// Helper Functions
// ============================================================================

/// 답변 + 출처 출력
fn print_result(result: &QueryResult) {
    if let Some(ref error) = result.error {
        tracing::debug!("Query returned error: {}", error);
        println!("\n[!] {}", result.answer);
        return;
    }

    println!("\n{}", result.answer);

    if result.sources.is_empty() {
        return;
    }

    println!("\n[출처]");
    for (i, source) in result.sources.iter().enumerate() {
        let score = result
            .scores
            .as_ref()
            .and_then(|s| s.get(i))
            .map(|s| format!(" [거리: {:.4}]", s))
            .unwrap_or_default();

        println!("{}. {}{}", i + 1, source.citation(), score);
        println!("   {}", truncate_text(&source.content, 200));
    }
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

/// 바이트 크기 포맷팅
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

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_truncate_text() {
        assert_eq!(truncate_text("hello", 10), "hello");
        assert_eq!(truncate_text("hello world", 5), "hello...");
        assert_eq!(truncate_text("hello\nworld", 20), "hello world");
    }

    #[test]
    fn test_format_bytes() {
        assert_eq!(format_bytes(500), "500 B");
        assert_eq!(format_bytes(1536), "1.50 KB");
        assert_eq!(format_bytes(1048576), "1.00 MB");
    }

    #[test]
    fn test_truncate_unicode() {
        let korean = "안녕하세요 세계";
        assert_eq!(truncate_text(korean, 5), "안녕하세요...");
    }

    #[test]
    fn test_parse_ask_command() {
        let cli = Cli::parse_from(["knowbase", "--config", "kb.toml", "ask", "What?", "--json"]);
        assert_eq!(cli.config, Some(PathBuf::from("kb.toml")));
        match cli.command {
            Commands::Ask {
                question,
                rebuild,
                json,
            } => {
                assert_eq!(question, "What?");
                assert!(!rebuild);
                assert!(json);
            }
            _ => panic!("expected ask command"),
        }
    }

    #[tokio::test]
    async fn test_index_record_count_without_index() {
        let dir = TempDir::new().unwrap();
        let missing = dir.path().join("vector_db");

        assert_eq!(index_record_count(&missing, "kb").await.unwrap(), None);
        assert!(!missing.exists());
    }
}

//! CLI 모듈
//!
//! privdoc-rag CLI 명령어 정의 및 구현

use std::io::Write;
use std::path::{Path, PathBuf};

use anyhow::{bail, Context, Result};
use clap::{Args, Parser, Subcommand};
use tokio::io::{AsyncBufReadExt, BufReader};

use crate::answer::{GeminiAnswer, QaResponse, RetrievalQa, DEFAULT_TOP_K};
use crate::collector::{CollectorConfig, FileFormat, LoaderRegistry};
use crate::embedding::{create_embedder, has_api_key};
use crate::knowledge::{
    default_persist_dir, get_data_dir, LanceVectorStore, SplitterConfig, VectorStore,
};
use crate::pipeline::{IngestPipeline, IngestReport};

// ============================================================================
// CLI Definition
// ============================================================================

#[derive(Parser, Debug)]
#[command(name = "privdoc-rag")]
#[command(version, about = "로컬 문서 RAG 시스템", long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// 폴더(또는 파일)의 문서를 분할하여 벡터 저장소에 저장
    Ingest(IngestArgs),

    /// 저장된 문서에 질문
    Query(QueryArgs),

    /// 상태 확인
    Status(StoreArgs),
}

/// 벡터 저장소 위치
#[derive(Args, Debug, Clone)]
pub struct StoreArgs {
    /// LanceDB 디렉토리 (기본: 데이터 디렉토리/vectors.lance)
    #[arg(long, env = "PERSIST_DIRECTORY")]
    pub persist_dir: Option<PathBuf>,
}

impl StoreArgs {
    fn resolve(&self) -> PathBuf {
        self.persist_dir.clone().unwrap_or_else(default_persist_dir)
    }
}

#[derive(Args, Debug, Clone)]
pub struct IngestArgs {
    /// 수집할 폴더 또는 파일
    #[arg(short, long, env = "SOURCE_DIRECTORY", default_value = "source_documents")]
    pub source: PathBuf,

    /// 최대 청크 크기 (문자 수)
    #[arg(long, env = "CHUNK_SIZE", default_value_t = 500)]
    pub chunk_size: usize,

    /// 청크 간 겹침 (문자 수)
    #[arg(long, env = "CHUNK_OVERLAP", default_value_t = 50)]
    pub chunk_overlap: usize,

    /// 특정 확장자만 수집 (쉼표 구분)
    #[arg(short, long, value_delimiter = ',')]
    pub ext: Vec<String>,

    /// 분할까지만 수행 (임베딩/저장 생략, API 키 불필요)
    #[arg(long)]
    pub dry_run: bool,

    /// 숨김 파일 포함
    #[arg(long)]
    pub include_hidden: bool,

    /// .gitignore/.ignore 규칙 적용 (기본: 등록된 확장자 파일은 모두 수집)
    #[arg(long)]
    pub respect_gitignore: bool,

    #[command(flatten)]
    pub store: StoreArgs,
}

#[derive(Args, Debug, Clone)]
pub struct QueryArgs {
    /// 질문 (생략하면 대화형 모드, `exit`로 종료)
    pub question: Option<String>,

    /// 검색할 청크 수
    #[arg(short = 'k', long, default_value_t = DEFAULT_TOP_K)]
    pub top_k: usize,

    /// 답변 생성 없이 근거 청크만 출력
    #[arg(long)]
    pub sources_only: bool,

    /// 세션 전체에서 출력할 최대 근거 청크 수
    #[arg(long, default_value_t = 1000)]
    pub doc_limit: usize,

    #[command(flatten)]
    pub store: StoreArgs,
}

// ============================================================================
// CLI Runner
// ============================================================================

/// CLI 명령어 실행
pub async fn run(cli: Cli) -> Result<()> {
    match cli.command {
        Commands::Ingest(args) => cmd_ingest(args).await,
        Commands::Query(args) => cmd_query(args).await,
        Commands::Status(args) => cmd_status(args).await,
    }
}

// ============================================================================
// Command Implementations
// ============================================================================

/// 문서 수집 명령어 (ingest)
///
/// 열거 → 파싱 → 분할 후, 모든 청크를 한 번에 임베딩하여 저장합니다.
async fn cmd_ingest(args: IngestArgs) -> Result<()> {
    let collector = CollectorConfig {
        respect_gitignore: args.respect_gitignore,
        include_hidden: args.include_hidden,
        extensions: args.ext.clone(),
        ..Default::default()
    };
    let splitter = SplitterConfig::new(args.chunk_size, args.chunk_overlap);
    let pipeline = IngestPipeline::with_config(collector, splitter).context("잘못된 수집 설정")?;

    // API 키 확인 (분할 전에 실패하도록)
    if !args.dry_run && !has_api_key() {
        bail!(
            "API 키가 설정되지 않았습니다.\n\n\
             설정 방법:\n  \
             export GEMINI_API_KEY=your-api-key\n  \
             또는\n  \
             export GOOGLE_AI_API_KEY=your-api-key\n\n\
             API 키 발급: https://aistudio.google.com/app/apikey\n\
             (--dry-run 으로 분할 결과만 확인할 수 있습니다)"
        );
    }

    println!("[*] 수집 경로: {}", args.source.display());
    let sources = pipeline
        .registry()
        .source_set(&args.source)
        .with_context(|| format!("수집 경로를 열 수 없습니다: {}", args.source.display()))?;

    if sources.is_empty() {
        println!("[!] 수집할 파일이 없습니다.");
        return Ok(());
    }

    // 통계 표시
    let stats = sources.stats();
    println!("[*] 수집 대상: {} 파일", stats.total_files);
    let breakdown: Vec<String> = stats
        .by_format
        .iter()
        .map(|(format, count)| format!("{}: {}", format.label(), count))
        .collect();
    println!("    {}", breakdown.join(", "));
    println!("    총 크기: {}", format_bytes(stats.total_size as usize));
    if stats.count(FileFormat::Pdf) > 0 {
        println!("[!] 스캔 PDF는 텍스트가 없어 청크가 생성되지 않을 수 있습니다.");
    }
    println!();

    if args.dry_run {
        let output = pipeline.split_sources(sources)?;
        print_split_report(&output.report, &args);
        println!("[*] --dry-run: 임베딩 및 저장을 건너뜁니다.");
        return Ok(());
    }

    let persist_dir = args.store.resolve();
    let embedder = create_embedder()?;
    let store = LanceVectorStore::open(&persist_dir)
        .await
        .context("LanceDB 열기 실패")?;

    println!("[*] 분할, 임베딩 생성 및 저장 중...");
    let report = pipeline
        .run(&args.source, &embedder, &store)
        .await
        .context("청크 저장 실패")?;
    print_split_report(&report, &args);

    if report.chunks_produced == 0 {
        println!("[!] 저장할 청크가 없습니다.");
        return Ok(());
    }

    println!("[OK] 저장 완료: {} 청크", report.chunks_stored);
    println!("     저장소: {}", persist_dir.display());

    Ok(())
}

/// 분할 결과 출력 (건너뛴 파일 + 요약)
fn print_split_report(report: &IngestReport, args: &IngestArgs) {
    for failure in &report.failures {
        println!(
            "[!] 건너뜀: {} ({})",
            failure.path.display(),
            truncate_text(&failure.message, 120)
        );
    }

    println!(
        "[OK] 문서 {} 개 → 청크 {} 개 (청크 크기 {}, 겹침 {}), 실패 {}",
        report.documents_loaded,
        report.chunks_produced,
        args.chunk_size,
        args.chunk_overlap,
        report.failures.len()
    );
}

/// 질문 명령어 (query)
///
/// 질문이 없으면 `exit`를 입력할 때까지 표준 입력에서 질문을 읽습니다.
async fn cmd_query(args: QueryArgs) -> Result<()> {
    if !has_api_key() {
        bail!(
            "API 키가 설정되지 않았습니다.\n\
             설정: export GEMINI_API_KEY=your-key"
        );
    }

    let persist_dir = args.store.resolve();
    if !persist_dir.exists() {
        println!("[!] 저장소가 없습니다: {}", persist_dir.display());
        println!("    먼저 `privdoc-rag ingest`를 실행하세요.");
        return Ok(());
    }

    let embedder = create_embedder()?;
    let store = LanceVectorStore::open(&persist_dir)
        .await
        .context("LanceDB 열기 실패")?;

    if store.count().await? == 0 {
        println!("[!] 저장된 청크가 없습니다. 먼저 `privdoc-rag ingest`를 실행하세요.");
        return Ok(());
    }

    let generator = if args.sources_only {
        None
    } else {
        Some(GeminiAnswer::from_env()?)
    };

    let mut qa = RetrievalQa::new(&embedder, &store).with_top_k(args.top_k);
    if let Some(ref generator) = generator {
        qa = qa.with_generator(generator);
    }

    let mut budget = SourceBudget::new(args.doc_limit);

    if let Some(question) = args.question {
        let response = qa.ask(&question).await.context("질문 처리 실패")?;
        print!("{}", render_response(&question, &response, &mut budget));
        return Ok(());
    }

    // 대화형 모드
    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    loop {
        print!("\n질문을 입력하세요: ");
        std::io::stdout().flush()?;

        let Some(line) = lines.next_line().await? else {
            break;
        };
        let question = line.trim();
        if question == "exit" {
            break;
        }
        if question.is_empty() {
            continue;
        }

        match qa.ask(question).await {
            Ok(response) => print!("{}", render_response(question, &response, &mut budget)),
            Err(e) => println!("[!] 질문 처리 실패: {:#}", e),
        }
    }

    Ok(())
}

/// 상태 명령어 (status)
///
/// 시스템 상태를 확인합니다.
async fn cmd_status(args: StoreArgs) -> Result<()> {
    println!("privdoc-rag v{}", env!("CARGO_PKG_VERSION"));
    println!();

    // 데이터 디렉토리
    println!("[*] 데이터 디렉토리: {}", get_data_dir().display());

    // API 키 상태
    if has_api_key() {
        println!("[OK] API 키: 설정됨");
    } else {
        println!("[!] API 키: 미설정");
        println!("    설정: export GEMINI_API_KEY=your-key");
    }

    // 지원 확장자
    let registry = LoaderRegistry::with_builtin_parsers(CollectorConfig::default())?;
    println!("[*] 지원 확장자: {}", registry.extensions().join(", "));

    // 벡터 저장소 상태
    let persist_dir = args.resolve();
    println!("[*] 벡터 저장소: {}", persist_dir.display());
    if !persist_dir.exists() {
        println!("[!] 아직 수집된 문서가 없습니다.");
        return Ok(());
    }

    match LanceVectorStore::open(&persist_dir).await {
        Ok(store) => match store.count().await {
            Ok(count) => println!("[OK] 저장된 청크: {} 개", count),
            Err(e) => println!("[!] 청크 수 조회 실패: {}", e),
        },
        Err(e) => {
            tracing::debug!("LanceDB open failed: {}", e);
            println!("[!] 벡터 저장소 열기 실패: {}", e);
        }
    }

    Ok(())
}

// ============================================================================
// Output
// ============================================================================

/// 세션 전체 근거 청크 출력 한도
#[derive(Debug)]
struct SourceBudget {
    printed: usize,
    limit: usize,
}

impl SourceBudget {
    fn new(limit: usize) -> Self {
        Self { printed: 0, limit }
    }

    fn exhausted(&self) -> bool {
        self.printed >= self.limit
    }
}

/// 질문 / 답변 / 근거 청크 출력 텍스트
fn render_response(question: &str, response: &QaResponse, budget: &mut SourceBudget) -> String {
    let mut out = String::new();
    out.push_str("\n\n> Question:\n");
    out.push_str(question);
    out.push('\n');

    if let Some(ref answer) = response.answer {
        out.push_str("\n> Answer:\n");
        out.push_str(answer);
        out.push('\n');
    }

    if response.sources.is_empty() {
        out.push_str("\n[!] 관련 문서를 찾지 못했습니다.\n");
    }

    for source in &response.sources {
        if budget.exhausted() {
            break;
        }

        out.push_str(&format!("\n> {}:\n", source_label(&source.source)));
        out.push_str(source.chunk_text.trim_end());
        out.push('\n');

        budget.printed += 1;
        if budget.exhausted() {
            out.push_str(&format!("\n문서 출력 한도({})에 도달했습니다.\n", budget.limit));
        }
    }

    out
}

/// 현재 디렉토리 아래 경로는 상대 경로로 표시
fn source_label(source: &str) -> String {
    let path = Path::new(source);
    std::env::current_dir()
        .ok()
        .and_then(|cwd| path.strip_prefix(cwd).ok().map(Path::to_path_buf))
        .unwrap_or_else(|| path.to_path_buf())
        .display()
        .to_string()
}

// ============================================================================
// Helper Functions
// ============================================================================

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
fn format_bytes(bytes: usize) -> String {
    const KB: usize = 1024;
    const MB: usize = KB * 1024;

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

//! 수집 파이프라인
//!
//! 열거 → 문서 지연 생성 → 분할 → (임베딩 + 저장) 순서로 진행합니다.
//! 파일 하나의 실패는 기록만 하고 건너뛰며, 루트 경로 에러만 실행을 중단합니다.

use std::collections::{BTreeSet, HashSet};
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};

use crate::collector::{CollectorConfig, LoaderRegistry, SourceSet};
use crate::embedding::EmbeddingProvider;
use crate::error::IngestError;
use crate::knowledge::{Chunk, Chunker, RecursiveSplitter, SplitterConfig, VectorEntry, VectorStore};

// ============================================================================
// Report Types
// ============================================================================

/// 건너뛴 파일
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IngestFailure {
    pub path: PathBuf,
    pub message: String,
}

/// 실행 결과 요약 (관찰용)
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct IngestReport {
    /// 파싱에 성공한 문서 수
    pub documents_loaded: usize,
    /// 생성된 청크 수
    pub chunks_produced: usize,
    /// 건너뛴 파일과 사유
    pub failures: Vec<IngestFailure>,
    /// 저장소에 기록된 청크 수
    pub chunks_stored: usize,
}

/// 분할 단계 결과
#[derive(Debug, Clone)]
pub struct IngestOutput {
    pub chunks: Vec<Chunk>,
    pub report: IngestReport,
}

// ============================================================================
// IngestPipeline
// ============================================================================

/// 로더 레지스트리 + 청커
pub struct IngestPipeline {
    registry: LoaderRegistry,
    chunker: Box<dyn Chunker>,
}

impl IngestPipeline {
    pub fn new(registry: LoaderRegistry, chunker: Box<dyn Chunker>) -> Self {
        Self { registry, chunker }
    }

    /// 기본 파서 + 재귀 분할기로 생성
    pub fn with_config(
        collector: CollectorConfig,
        splitter: SplitterConfig,
    ) -> Result<Self, IngestError> {
        let registry = LoaderRegistry::with_builtin_parsers(collector)?;
        let chunker = RecursiveSplitter::new(splitter)?;
        Ok(Self::new(registry, Box::new(chunker)))
    }

    pub fn registry(&self) -> &LoaderRegistry {
        &self.registry
    }

    /// 루트 아래 모든 문서를 청크로 분할
    ///
    /// 문서는 하나씩 만들어 바로 분할하므로 한 번에 하나만 메모리에 있습니다.
    pub fn split_corpus(&self, root: &Path) -> Result<IngestOutput, IngestError> {
        let sources = self.registry.source_set(root)?;
        self.split_sources(sources)
    }

    /// 이미 열거한 파일 목록을 청크로 분할
    pub fn split_sources(&self, sources: SourceSet) -> Result<IngestOutput, IngestError> {
        tracing::info!(
            "Loading {} files from {:?} ({})",
            sources.len(),
            sources.root(),
            self.chunker.name()
        );

        let mut report = IngestReport::default();
        let mut chunks = Vec::new();

        for result in self.registry.documents(sources) {
            match result {
                Ok(document) => {
                    report.documents_loaded += 1;
                    let produced = self.chunker.split(&document);
                    tracing::debug!(
                        "{} -> {} chunks",
                        document.metadata.source,
                        produced.len()
                    );
                    chunks.extend(produced);
                }
                Err(e) if e.is_per_file() => {
                    tracing::warn!("Skipping file: {}", e);
                    report.failures.push(IngestFailure {
                        path: e.path().map(Path::to_path_buf).unwrap_or_default(),
                        message: e.to_string(),
                    });
                }
                Err(e) => return Err(e),
            }
        }

        report.chunks_produced = chunks.len();
        tracing::info!(
            "Loaded {} documents, {} chunks, {} failures",
            report.documents_loaded,
            report.chunks_produced,
            report.failures.len()
        );

        Ok(IngestOutput { chunks, report })
    }

    /// 분할 후 한 번의 배치로 임베딩 + 저장
    pub async fn run(
        &self,
        root: &Path,
        embedder: &dyn EmbeddingProvider,
        store: &dyn VectorStore,
    ) -> Result<IngestReport> {
        let IngestOutput { chunks, mut report } = self.split_corpus(root)?;
        report.chunks_stored = persist(&chunks, embedder, store).await?;
        Ok(report)
    }
}

// ============================================================================
// Persistence
// ============================================================================

/// 청크 임베딩 후 저장
///
/// 새 청크를 먼저 넣고, 그다음 같은 출처에서 더 이상 만들어지지 않는 청크를
/// 지웁니다. 저장에 실패하면 기존 청크는 그대로 남습니다. ID가 내용 해시라서
/// 바뀌지 않은 코퍼스를 다시 넣어도 저장소 내용은 그대로입니다.
pub async fn persist(
    chunks: &[Chunk],
    embedder: &dyn EmbeddingProvider,
    store: &dyn VectorStore,
) -> Result<usize> {
    if chunks.is_empty() {
        return Ok(0);
    }

    let texts: Vec<String> = chunks.iter().map(|c| c.text.clone()).collect();
    tracing::info!("Embedding {} chunks with {}", texts.len(), embedder.name());

    let embeddings = embedder
        .embed_batch(&texts)
        .await
        .context("Failed to embed chunks")?;

    if embeddings.len() != chunks.len() {
        anyhow::bail!(
            "Embedding count mismatch: {} chunks, {} embeddings",
            chunks.len(),
            embeddings.len()
        );
    }

    let entries: Vec<VectorEntry> = chunks
        .iter()
        .zip(embeddings)
        .map(|(chunk, embedding)| VectorEntry::from_chunk(chunk, embedding))
        .collect();
    let total = entries.len();
    let keep: HashSet<String> = entries.iter().map(|e| e.id.clone()).collect();

    let sources: BTreeSet<&str> = chunks.iter().map(|c| c.metadata.source.as_str()).collect();
    let mut existing = HashSet::new();
    for source in &sources {
        existing.extend(
            store
                .source_ids(source)
                .await
                .with_context(|| format!("Failed to read stored chunks of {}", source))?,
        );
    }

    let fresh: Vec<VectorEntry> = entries
        .into_iter()
        .filter(|e| !existing.contains(&e.id))
        .collect();
    let inserted = store
        .insert_batch(&fresh)
        .await
        .context("Failed to store chunks")?;

    let stale: Vec<String> = existing
        .into_iter()
        .filter(|id| !keep.contains(id))
        .collect();
    let removed = store
        .delete_ids(&stale)
        .await
        .context("Failed to remove replaced chunks")?;

    tracing::info!(
        "Stored {} chunks from {} sources ({} new, {} removed)",
        total,
        sources.len(),
        inserted,
        removed
    );
    Ok(total)
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::knowledge::SearchResult;
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicBool, Ordering};
    use std::sync::Mutex;

    /// 텍스트 바이트로 만든 결정적 벡터
    struct HashEmbedder;

    #[async_trait]
    impl EmbeddingProvider for HashEmbedder {
        async fn embed(&self, text: &str) -> Result<Vec<f32>> {
            let mut v = vec![0.0f32; 4];
            for (i, b) in text.bytes().enumerate() {
                v[i % 4] += b as f32;
            }
            Ok(v)
        }

        fn dimension(&self) -> usize {
            4
        }

        fn name(&self) -> &str {
            "hash"
        }
    }

    struct FailingEmbedder;

    #[async_trait]
    impl EmbeddingProvider for FailingEmbedder {
        async fn embed(&self, _text: &str) -> Result<Vec<f32>> {
            anyhow::bail!("quota exceeded")
        }

        fn dimension(&self) -> usize {
            4
        }

        fn name(&self) -> &str {
            "failing"
        }
    }

    #[derive(Default)]
    struct MemoryStore {
        rows: Mutex<Vec<VectorEntry>>,
        reject_inserts: AtomicBool,
    }

    impl MemoryStore {
        fn ids(&self) -> BTreeSet<String> {
            self.rows.lock().unwrap().iter().map(|e| e.id.clone()).collect()
        }
    }

    #[async_trait]
    impl VectorStore for MemoryStore {
        async fn insert_batch(&self, entries: &[VectorEntry]) -> Result<usize> {
            if self.reject_inserts.load(Ordering::SeqCst) {
                anyhow::bail!("disk full");
            }
            self.rows.lock().unwrap().extend_from_slice(entries);
            Ok(entries.len())
        }

        async fn search(&self, _query: &[f32], limit: usize) -> Result<Vec<SearchResult>> {
            Ok(self
                .rows
                .lock()
                .unwrap()
                .iter()
                .take(limit)
                .map(|e| SearchResult {
                    source: e.source.clone(),
                    chunk_text: e.chunk_text.clone(),
                    start_offset: e.start_offset,
                    similarity: 1.0,
                })
                .collect())
        }

        async fn source_ids(&self, source: &str) -> Result<HashSet<String>> {
            Ok(self
                .rows
                .lock()
                .unwrap()
                .iter()
                .filter(|e| e.source == source)
                .map(|e| e.id.clone())
                .collect())
        }

        async fn delete_ids(&self, ids: &[String]) -> Result<usize> {
            let mut rows = self.rows.lock().unwrap();
            let before = rows.len();
            rows.retain(|e| !ids.contains(&e.id));
            Ok(before - rows.len())
        }

        async fn count(&self) -> Result<usize> {
            Ok(self.rows.lock().unwrap().len())
        }
    }

    fn write(dir: &Path, name: &str, content: &str) -> PathBuf {
        let path = dir.join(name);
        std::fs::write(&path, content).unwrap();
        path
    }

    fn pipeline(size: usize, overlap: usize) -> IngestPipeline {
        IngestPipeline::with_config(CollectorConfig::default(), SplitterConfig::new(size, overlap))
            .unwrap()
    }

    fn sorted_texts(chunks: &[Chunk]) -> Vec<String> {
        let mut texts: Vec<String> = chunks.iter().map(|c| c.text.clone()).collect();
        texts.sort();
        texts
    }

    fn corpus() -> tempfile::TempDir {
        let dir = tempfile::tempdir().unwrap();
        write(
            dir.path(),
            "guide.md",
            &"Install the tool. Configure the source directory. Run ingest. ".repeat(20),
        );
        write(dir.path(), "app.ini", "[server]\nhost=localhost\nport=8080\n");
        write(dir.path(), "deploy.yaml", "replicas: 2\nimage: app:latest\n");
        write(dir.path(), "people.csv", "name,role\nAda,engineer\nGrace,admiral\n");
        dir
    }

    #[test]
    fn test_split_corpus_counts() {
        let dir = corpus();
        write(dir.path(), "broken.yaml", "key: [unclosed\n  x: : :");
        write(dir.path(), "binary.exe", "MZ");

        let output = pipeline(200, 20).split_corpus(dir.path()).unwrap();
        assert_eq!(output.report.documents_loaded, 4);
        assert_eq!(output.report.failures.len(), 1);
        assert!(output.report.failures[0].path.ends_with("broken.yaml"));
        assert_eq!(output.report.chunks_produced, output.chunks.len());
        assert!(output.chunks.len() > 4);
        assert!(output.chunks.iter().all(|c| c.text.chars().count() <= 200));
    }

    #[test]
    fn test_malformed_yaml_with_two_valid() {
        let dir = tempfile::tempdir().unwrap();
        write(dir.path(), "a.yaml", "a: 1");
        write(dir.path(), "b.yml", "b: [1, 2]");
        write(dir.path(), "c.yaml", "key: [unclosed\n  x: : :");

        let output = pipeline(500, 50).split_corpus(dir.path()).unwrap();
        assert_eq!(output.report.documents_loaded, 2);
        assert_eq!(output.report.failures.len(), 1);

        let sources: BTreeSet<&str> = output
            .chunks
            .iter()
            .map(|c| c.metadata.source.as_str())
            .collect();
        assert_eq!(sources.len(), 2);
    }

    #[test]
    fn test_rerun_produces_identical_chunks() {
        let dir = corpus();
        let pipeline = pipeline(120, 30);

        let first = pipeline.split_corpus(dir.path()).unwrap();
        let second = pipeline.split_corpus(dir.path()).unwrap();
        assert_eq!(sorted_texts(&first.chunks), sorted_texts(&second.chunks));
        assert_eq!(first.report, second.report);
    }

    #[test]
    fn test_root_errors_abort() {
        let dir = tempfile::tempdir().unwrap();
        let exe = write(dir.path(), "file.exe", "MZ");

        assert!(matches!(
            pipeline(500, 50).split_corpus(&exe),
            Err(IngestError::UnsupportedFormat { .. })
        ));
        assert!(matches!(
            pipeline(500, 50).split_corpus(&dir.path().join("missing")),
            Err(IngestError::Filesystem { .. })
        ));
    }

    #[test]
    fn test_invalid_splitter_config() {
        let result = IngestPipeline::with_config(CollectorConfig::default(), SplitterConfig::new(50, 50));
        assert!(matches!(result, Err(IngestError::InvalidConfig(_))));
    }

    #[tokio::test]
    async fn test_run_stores_every_chunk() {
        let dir = corpus();
        let store = MemoryStore::default();

        let report = pipeline(200, 20)
            .run(dir.path(), &HashEmbedder, &store)
            .await
            .unwrap();

        assert_eq!(report.documents_loaded, 4);
        assert_eq!(report.chunks_stored, report.chunks_produced);
        assert_eq!(store.count().await.unwrap(), report.chunks_produced);
    }

    #[tokio::test]
    async fn test_rerun_is_idempotent_in_store() {
        let dir = corpus();
        let store = MemoryStore::default();
        let pipeline = pipeline(200, 20);

        pipeline.run(dir.path(), &HashEmbedder, &store).await.unwrap();
        let first_ids = store.ids();
        let first_count = store.count().await.unwrap();

        pipeline.run(dir.path(), &HashEmbedder, &store).await.unwrap();
        assert_eq!(store.ids(), first_ids);
        assert_eq!(store.count().await.unwrap(), first_count);
    }

    #[tokio::test]
    async fn test_changed_file_replaces_its_chunks() {
        let dir = corpus();
        let store = MemoryStore::default();
        let pipeline = pipeline(200, 20);

        pipeline.run(dir.path(), &HashEmbedder, &store).await.unwrap();
        write(dir.path(), "app.ini", "[server]\nport=9090\n");
        pipeline.run(dir.path(), &HashEmbedder, &store).await.unwrap();

        let rows = store.rows.lock().unwrap();
        let ini_rows: Vec<_> = rows.iter().filter(|e| e.source.ends_with("app.ini")).collect();
        assert_eq!(ini_rows.len(), 1);
        assert!(ini_rows[0].chunk_text.contains("9090"));
    }

    #[tokio::test]
    async fn test_failed_store_keeps_previous_chunks() {
        let dir = corpus();
        let store = MemoryStore::default();
        let pipeline = pipeline(200, 20);

        pipeline.run(dir.path(), &HashEmbedder, &store).await.unwrap();
        let before = store.ids();

        write(dir.path(), "app.ini", "[server]\nport=9090\n");
        store.reject_inserts.store(true, Ordering::SeqCst);
        let err = pipeline
            .run(dir.path(), &HashEmbedder, &store)
            .await
            .unwrap_err();
        assert!(err.to_string().contains("Failed to store chunks"));

        assert_eq!(store.ids(), before);
        let rows = store.rows.lock().unwrap();
        assert!(rows
            .iter()
            .any(|e| e.source.ends_with("app.ini") && e.chunk_text.contains("8080")));
    }

    #[tokio::test]
    async fn test_embedding_failure_propagates() {
        let dir = corpus();
        let store = MemoryStore::default();

        let err = pipeline(200, 20)
            .run(dir.path(), &FailingEmbedder, &store)
            .await
            .unwrap_err();
        assert!(err.to_string().contains("Failed to embed chunks"));
        assert_eq!(store.count().await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_persist_empty_is_noop() {
        let store = MemoryStore::default();
        assert_eq!(persist(&[], &HashEmbedder, &store).await.unwrap(), 0);
    }
}

//! 파일 수집 및 로더 레지스트리
//!
//! 확장자 → 파서 테이블로 포맷을 결정하고, 루트(파일 또는 폴더)에서
//! 수집 대상 파일 목록(`SourceSet`)을 만든 뒤 문서를 하나씩 지연 생성합니다.
//! 등록된 확장자를 가진 파일은 모두 수집합니다. .gitignore/.ignore 규칙은
//! `respect_gitignore`를 켰을 때만 적용합니다.

use std::collections::{BTreeMap, HashMap};
use std::iter::FusedIterator;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use ignore::WalkBuilder;

use crate::error::IngestError;
use crate::extractor::{builtin_parsers, Document, FormatParser};

// ============================================================================
// File Formats
// ============================================================================

/// 지원하는 포맷 분류
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum FileFormat {
    /// 텍스트 파일 (코드, Markdown, JSON, TOML 등)
    Text,
    /// PDF 파일
    Pdf,
    /// CSV 파일
    Csv,
    /// INI/CFG/ENV 설정 파일
    Config,
    /// YAML 파일
    Yaml,
}

impl FileFormat {
    /// 진행 표시용 짧은 이름
    pub fn label(&self) -> &'static str {
        match self {
            FileFormat::Text => "TXT",
            FileFormat::Pdf => "PDF",
            FileFormat::Csv => "CSV",
            FileFormat::Config => "CFG",
            FileFormat::Yaml => "YML",
        }
    }
}

/// 경로에서 소문자 확장자 추출
///
/// `.env`처럼 확장자 없는 점 파일은 이름 자체를 확장자로 봅니다.
pub fn extension_of(path: &Path) -> Option<String> {
    if let Some(ext) = path.extension().and_then(|e| e.to_str()) {
        return Some(ext.to_lowercase());
    }

    path.file_name()
        .and_then(|n| n.to_str())
        .and_then(|n| n.strip_prefix('.'))
        .filter(|n| !n.is_empty())
        .map(str::to_lowercase)
}

// ============================================================================
// Collected File
// ============================================================================

/// 수집된 파일 정보
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CollectedFile {
    /// 파일 절대 경로
    pub path: PathBuf,
    /// 소문자 확장자 (레지스트리 키)
    pub extension: String,
    /// 파일 포맷
    pub format: FileFormat,
    /// 파일 크기 (바이트)
    pub size: u64,
}

// ============================================================================
// Collector Config
// ============================================================================

/// 파일 수집기 설정
#[derive(Debug, Clone)]
pub struct CollectorConfig {
    /// .gitignore/.ignore 패턴 존중 여부 (기본값: 끔)
    pub respect_gitignore: bool,
    /// 숨김 파일 포함 여부
    pub include_hidden: bool,
    /// 최대 파일 크기 (바이트, 0이면 제한 없음)
    pub max_file_size: u64,
    /// 특정 확장자만 수집 (비어있으면 모든 등록 확장자)
    pub extensions: Vec<String>,
}

impl Default for CollectorConfig {
    fn default() -> Self {
        Self {
            respect_gitignore: false,
            include_hidden: false,
            max_file_size: 10 * 1024 * 1024, // 10MB
            extensions: vec![],
        }
    }
}

// ============================================================================
// Source Set
// ============================================================================

/// 한 번의 수집 실행에서 선택된 파일 목록
#[derive(Debug, Clone)]
pub struct SourceSet {
    root: PathBuf,
    files: Vec<CollectedFile>,
}

impl SourceSet {
    /// 수집 루트 (절대 경로)
    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn files(&self) -> &[CollectedFile] {
        &self.files
    }

    pub fn len(&self) -> usize {
        self.files.len()
    }

    pub fn is_empty(&self) -> bool {
        self.files.is_empty()
    }

    /// 확장자별로 분할
    pub fn by_extension(&self) -> BTreeMap<&str, Vec<&CollectedFile>> {
        let mut groups: BTreeMap<&str, Vec<&CollectedFile>> = BTreeMap::new();
        for file in &self.files {
            groups.entry(file.extension.as_str()).or_default().push(file);
        }
        groups
    }

    /// 수집 통계
    pub fn stats(&self) -> CollectionStats {
        CollectionStats::from_files(&self.files)
    }

    pub fn into_files(self) -> Vec<CollectedFile> {
        self.files
    }
}

// ============================================================================
// Loader Registry
// ============================================================================

/// 확장자 → 파서 테이블
///
/// 확장자 하나는 파서 하나에만 등록될 수 있습니다.
pub struct LoaderRegistry {
    parsers: HashMap<String, Arc<dyn FormatParser>>,
    config: CollectorConfig,
}

impl LoaderRegistry {
    /// 빈 레지스트리 생성
    pub fn new(config: CollectorConfig) -> Self {
        Self {
            parsers: HashMap::new(),
            config,
        }
    }

    /// 기본 제공 파서를 모두 등록한 레지스트리
    pub fn with_builtin_parsers(config: CollectorConfig) -> Result<Self, IngestError> {
        let mut registry = Self::new(config);
        for parser in builtin_parsers() {
            registry.register(parser)?;
        }
        Ok(registry)
    }

    /// 파서 등록
    ///
    /// 확장자가 하나라도 이미 등록되어 있으면 아무것도 등록하지 않고 실패합니다.
    pub fn register(&mut self, parser: Arc<dyn FormatParser>) -> Result<(), IngestError> {
        let extensions: Vec<String> = parser.extensions().iter().map(|e| e.to_lowercase()).collect();

        if let Some(taken) = extensions.iter().find(|e| self.parsers.contains_key(*e)) {
            return Err(IngestError::DuplicateExtension {
                extension: taken.clone(),
            });
        }

        tracing::debug!("Registering {} for {:?}", parser.name(), extensions);
        for ext in extensions {
            self.parsers.insert(ext, Arc::clone(&parser));
        }
        Ok(())
    }

    /// 수집기 설정
    pub fn config(&self) -> &CollectorConfig {
        &self.config
    }

    /// 등록된 확장자 (정렬됨, 허용 목록 적용)
    pub fn extensions(&self) -> Vec<&str> {
        let mut exts: Vec<&str> = self
            .parsers
            .keys()
            .map(String::as_str)
            .filter(|ext| self.is_allowed(ext))
            .collect();
        exts.sort_unstable();
        exts
    }

    /// 경로에 맞는 파서 조회
    pub fn parser_for(&self, path: &Path) -> Option<&Arc<dyn FormatParser>> {
        let ext = extension_of(path)?;
        self.parser_for_extension(&ext)
    }

    fn parser_for_extension(&self, ext: &str) -> Option<&Arc<dyn FormatParser>> {
        if !self.is_allowed(ext) {
            return None;
        }
        self.parsers.get(ext)
    }

    /// 설정의 확장자 허용 목록 확인
    fn is_allowed(&self, ext: &str) -> bool {
        self.config.extensions.is_empty()
            || self
                .config
                .extensions
                .iter()
                .any(|e| e.eq_ignore_ascii_case(ext))
    }

    /// 루트에서 수집 대상 파일 목록 생성
    ///
    /// - 파일 루트: 등록되지 않은 확장자면 `UnsupportedFormat`
    /// - 폴더 루트: 재귀 탐색, 등록되지 않은 확장자는 조용히 건너뜀
    /// - 루트가 없거나 읽을 수 없으면 `Filesystem`
    pub fn source_set(&self, root: &Path) -> Result<SourceSet, IngestError> {
        let abs_root = absolutize(root)?;
        let metadata = std::fs::metadata(&abs_root).map_err(|e| IngestError::io(&abs_root, e))?;

        let files = if metadata.is_file() {
            vec![self.collect_file(&abs_root, metadata.len())?]
        } else if metadata.is_dir() {
            self.collect_directory(&abs_root)
        } else {
            return Err(IngestError::UnsupportedFormat { path: abs_root });
        };

        Ok(SourceSet {
            root: abs_root,
            files,
        })
    }

    /// 문서를 지연 생성하는 반복자
    ///
    /// 파일 목록은 즉시 만들지만, 각 파일은 `next()` 호출 시점에 읽고 파싱합니다.
    pub fn lazy_load(&self, root: &Path) -> Result<DocumentIter<'_>, IngestError> {
        let sources = self.source_set(root)?;
        Ok(self.documents(sources))
    }

    /// 이미 만든 파일 목록으로 반복자 생성
    pub fn documents(&self, sources: SourceSet) -> DocumentIter<'_> {
        DocumentIter {
            registry: self,
            files: sources.into_files().into_iter(),
        }
    }

    /// 모든 파일을 한 번에 로드 (파일별 결과)
    pub fn load(&self, root: &Path) -> Result<Vec<Result<Document, IngestError>>, IngestError> {
        Ok(self.lazy_load(root)?.collect())
    }

    /// 수집된 파일 하나를 파싱
    pub fn load_file(&self, file: &CollectedFile) -> Result<Document, IngestError> {
        let parser = self
            .parsers
            .get(&file.extension)
            .ok_or_else(|| IngestError::UnsupportedFormat {
                path: file.path.clone(),
            })?;

        tracing::debug!("Parsing {:?} with {}", file.path, parser.name());
        parser.parse(&file.path)
    }

    /// 단일 파일 루트 처리
    fn collect_file(&self, path: &Path, size: u64) -> Result<CollectedFile, IngestError> {
        let (extension, parser) = extension_of(path)
            .and_then(|ext| {
                let parser = self.parser_for_extension(&ext)?;
                Some((ext, parser))
            })
            .ok_or_else(|| IngestError::UnsupportedFormat {
                path: path.to_path_buf(),
            })?;

        let limit = self.config.max_file_size;
        if limit > 0 && size > limit {
            return Err(IngestError::FileTooLarge {
                path: path.to_path_buf(),
                size,
                limit,
            });
        }

        Ok(CollectedFile {
            path: path.to_path_buf(),
            extension,
            format: parser.format(),
            size,
        })
    }

    /// 폴더 재귀 수집
    fn collect_directory(&self, root: &Path) -> Vec<CollectedFile> {
        let mut files = Vec::new();

        // ignore 규칙은 명시적으로 켰을 때만 적용
        let respect = self.config.respect_gitignore;
        let walker = WalkBuilder::new(root)
            .hidden(!self.config.include_hidden)
            .ignore(respect)
            .parents(respect)
            .git_ignore(respect)
            .git_global(respect)
            .git_exclude(respect)
            .sort_by_file_name(|a, b| a.cmp(b))
            .build();

        for entry in walker {
            let entry = match entry {
                Ok(e) => e,
                Err(e) => {
                    tracing::warn!("Failed to read entry: {}", e);
                    continue;
                }
            };

            // 파일만 처리
            if !entry.file_type().map(|ft| ft.is_file()).unwrap_or(false) {
                continue;
            }

            let path = entry.path();
            let Some(ext) = extension_of(path) else {
                continue;
            };
            // 지원하지 않는 확장자
            let Some(parser) = self.parser_for_extension(&ext) else {
                continue;
            };

            let size = match std::fs::metadata(path) {
                Ok(m) => m.len(),
                Err(e) => {
                    tracing::warn!("Failed to read metadata: {:?}: {}", path, e);
                    continue;
                }
            };

            let limit = self.config.max_file_size;
            if limit > 0 && size > limit {
                tracing::debug!("Skipping large file: {:?} ({} bytes)", path, size);
                continue;
            }

            files.push(CollectedFile {
                path: path.to_path_buf(),
                extension: ext,
                format: parser.format(),
                size,
            });
        }

        tracing::info!("Collected {} files from {:?}", files.len(), root);
        files
    }
}

/// 상대 경로를 현재 디렉토리 기준 절대 경로로
fn absolutize(path: &Path) -> Result<PathBuf, IngestError> {
    if path.is_absolute() {
        Ok(path.to_path_buf())
    } else {
        let cwd = std::env::current_dir().map_err(|e| IngestError::io(path, e))?;
        Ok(cwd.join(path))
    }
}

// ============================================================================
// Document Iterator
// ============================================================================

/// 파일당 문서 하나를 지연 생성하는 반복자
///
/// 한 번 소진되면 다시 시작할 수 없습니다.
pub struct DocumentIter<'a> {
    registry: &'a LoaderRegistry,
    files: std::vec::IntoIter<CollectedFile>,
}

impl Iterator for DocumentIter<'_> {
    type Item = Result<Document, IngestError>;

    fn next(&mut self) -> Option<Self::Item> {
        let file = self.files.next()?;
        Some(self.registry.load_file(&file))
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        self.files.size_hint()
    }
}

impl ExactSizeIterator for DocumentIter<'_> {}

impl FusedIterator for DocumentIter<'_> {}

// ============================================================================
// Statistics
// ============================================================================

/// 수집 통계
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct CollectionStats {
    pub total_files: usize,
    pub total_size: u64,
    pub by_format: BTreeMap<FileFormat, usize>,
}

impl CollectionStats {
    /// 수집된 파일 목록에서 통계 계산
    pub fn from_files(files: &[CollectedFile]) -> Self {
        let mut stats = Self::default();

        for file in files {
            stats.total_files += 1;
            stats.total_size += file.size;
            *stats.by_format.entry(file.format).or_insert(0) += 1;
        }

        stats
    }

    /// 특정 포맷 파일 수
    pub fn count(&self, format: FileFormat) -> usize {
        self.by_format.get(&format).copied().unwrap_or(0)
    }
}

// ============================================================================
// Tests
// ============================================================================

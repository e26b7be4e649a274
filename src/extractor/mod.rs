//! 콘텐츠 추출 모듈
//!
//! 파일 하나를 읽어 정규화된 [`Document`]로 변환합니다.
//! - 텍스트/코드/Markdown/JSON/TOML: UTF-8 그대로
//! - PDF: pdf-extract로 텍스트 추출
//! - CSV: 레코드별 `헤더: 값` 텍스트
//! - INI/CFG/ENV, YAML: 중첩 구조로 파싱 후 결정적인 텍스트로 직렬화

pub mod keyvalue;
pub mod pdf;
pub mod structured;
pub mod table;
pub mod text;
pub mod yaml;

use std::path::Path;
use std::sync::Arc;

use crate::collector::FileFormat;
use crate::error::IngestError;

pub use keyvalue::IniParser;
pub use pdf::PdfParser;
pub use table::CsvParser;
pub use text::TextParser;
pub use yaml::YamlParser;

// ============================================================================
// Document
// ============================================================================

/// 파일 하나에서 추출된 문서
#[derive(Debug, Clone, PartialEq)]
pub struct Document {
    /// 추출된 텍스트
    pub content: String,
    /// 출처 메타데이터
    pub metadata: DocumentMetadata,
}

/// 문서 메타데이터 (청크에 그대로 복사됨)
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DocumentMetadata {
    /// 원본 파일 경로 (검색 결과 출처 표시용)
    pub source: String,
    /// 문서를 만든 파서의 포맷
    pub format: FileFormat,
}

impl Document {
    /// 경로와 추출 텍스트로 문서 생성
    pub fn new(path: &Path, format: FileFormat, content: String) -> Self {
        Self {
            content,
            metadata: DocumentMetadata {
                source: path.display().to_string(),
                format,
            },
        }
    }
}

// ============================================================================
// FormatParser Trait
// ============================================================================

/// 포맷별 파서 트레이트
///
/// 모든 파서는 같은 모양의 [`Document`]를 반환합니다.
/// 파일 하나당 문서 하나를 만들며, 실패는 해당 파일에만 국한됩니다.
pub trait FormatParser: Send + Sync {
    /// 파일을 읽어 문서로 변환
    fn parse(&self, path: &Path) -> Result<Document, IngestError>;

    /// 지연 파싱 (반복자를 소비할 때 파일을 읽음)
    fn lazy_parse<'a>(
        &'a self,
        path: &'a Path,
    ) -> Box<dyn Iterator<Item = Result<Document, IngestError>> + 'a> {
        Box::new(std::iter::once_with(move || self.parse(path)))
    }

    /// 처리하는 확장자 (소문자, 점 없이)
    fn extensions(&self) -> &[&'static str];

    /// 포맷 분류
    fn format(&self) -> FileFormat;

    /// 파서 이름
    fn name(&self) -> &'static str;
}

/// 기본 제공 파서 목록
pub fn builtin_parsers() -> Vec<Arc<dyn FormatParser>> {
    vec![
        Arc::new(TextParser),
        Arc::new(PdfParser),
        Arc::new(CsvParser),
        Arc::new(IniParser),
        Arc::new(YamlParser),
    ]
}

// ============================================================================
// Helper Functions
// ============================================================================

/// 파일을 바이트로 읽기 (핸들은 함수 안에서 닫힘)
pub(crate) fn read_bytes(path: &Path) -> Result<Vec<u8>, IngestError> {
    std::fs::read(path).map_err(|e| IngestError::io(path, e))
}

/// 파일을 UTF-8 문자열로 읽기
pub(crate) fn read_utf8(path: &Path) -> Result<String, IngestError> {
    let bytes = read_bytes(path)?;
    String::from_utf8(bytes).map_err(|e| IngestError::parse(path, format!("invalid UTF-8: {}", e)))
}

// ============================================================================
// Tests
// ============================================================================

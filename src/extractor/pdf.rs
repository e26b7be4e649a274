//! PDF 텍스트 추출 모듈
//!
//! pdf-extract 크레이트를 사용하여 PDF에서 텍스트를 추출합니다.

use std::fmt::Display;
use std::path::Path;
use std::sync::{mpsc, OnceLock};
use std::thread;
use std::time::Duration;

use regex::Regex;

use super::{read_bytes, Document, FormatParser};
use crate::collector::FileFormat;
use crate::error::IngestError;

/// PDF 한 개의 텍스트 추출 제한 시간
const EXTRACT_TIMEOUT: Duration = Duration::from_secs(60);

/// PDF 파서
#[derive(Debug, Default, Clone, Copy)]
pub struct PdfParser;

impl FormatParser for PdfParser {
    fn parse(&self, path: &Path) -> Result<Document, IngestError> {
        let bytes = read_bytes(path)?;
        let text = extract_text_from_pdf(path, &bytes)?;
        Ok(Document::new(path, FileFormat::Pdf, text))
    }

    fn extensions(&self) -> &[&'static str] {
        &["pdf"]
    }

    fn format(&self) -> FileFormat {
        FileFormat::Pdf
    }

    fn name(&self) -> &'static str {
        "PdfParser"
    }
}

/// PDF 바이트에서 텍스트 추출
///
/// 페이지 구분(폼피드)은 빈 줄로 바꿔 청커가 문단 경계로 인식하게 합니다.
fn extract_text_from_pdf(path: &Path, bytes: &[u8]) -> Result<String, IngestError> {
    let data = bytes.to_vec();
    let text = extract_with_timeout(path, EXTRACT_TIMEOUT, move || {
        pdf_extract::extract_text_from_mem(&data)
    })?;

    // 텍스트가 비어있으면 경고
    if text.trim().is_empty() {
        tracing::warn!(
            "No text extracted from PDF: {:?}. It might be a scanned document.",
            path
        );
        return Ok(String::new());
    }

    Ok(join_pages(&text))
}

/// 별도 스레드에서 추출하고 제한 시간까지만 기다림
///
/// pdf-extract는 손상된 폰트 테이블에서 panic하거나 멈출 수 있습니다.
/// 시간 초과된 스레드는 멈출 수 없으므로 결과만 버립니다.
fn extract_with_timeout<F, E>(path: &Path, timeout: Duration, extract: F) -> Result<String, IngestError>
where
    F: FnOnce() -> Result<String, E> + Send + 'static,
    E: Display + Send + 'static,
{
    let (tx, rx) = mpsc::channel();
    let handle = thread::spawn(move || {
        let _ = tx.send(extract());
    });

    match rx.recv_timeout(timeout) {
        Ok(result) => {
            let _ = handle.join();
            result.map_err(|e| IngestError::parse(path, e))
        }
        Err(mpsc::RecvTimeoutError::Timeout) => {
            tracing::error!("PDF extraction timed out after {:?}: {:?}", timeout, path);
            Err(IngestError::parse(
                path,
                format!("PDF extraction timed out after {}s", timeout.as_secs()),
            ))
        }
        Err(mpsc::RecvTimeoutError::Disconnected) => {
            Err(IngestError::parse(path, "PDF extraction thread crashed"))
        }
    }
}

/// 폼피드로 나뉜 페이지를 빈 줄로 연결하고 과도한 빈 줄을 정리
fn join_pages(text: &str) -> String {
    static BLANK_RUNS: OnceLock<Regex> = OnceLock::new();
    let blank_runs = BLANK_RUNS.get_or_init(|| Regex::new(r"\n[ \t]*(?:\n[ \t]*){2,}").expect("Invalid regex"));

    let pages: Vec<&str> = text
        .split('\x0c')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .collect();

    blank_runs.replace_all(&pages.join("\n\n"), "\n\n").into_owned()
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_join_pages_with_formfeed() {
        let text = "Page 1 content\x0cPage 2 content\x0c\x0cPage 3 content";
        assert_eq!(
            join_pages(text),
            "Page 1 content\n\nPage 2 content\n\nPage 3 content"
        );
    }

    #[test]
    fn test_join_pages_collapses_blank_runs() {
        let text = "Title\n\n\n\n  \nBody";
        assert_eq!(join_pages(text), "Title\n\nBody");
    }

    #[test]
    fn test_extraction_timeout_is_parse_error() {
        let path = Path::new("/docs/slow.pdf");
        let err = extract_with_timeout(path, Duration::from_millis(20), || {
            thread::sleep(Duration::from_millis(500));
            Ok::<_, String>("late".to_string())
        })
        .unwrap_err();
        assert!(matches!(err, IngestError::Parse { .. }));
        assert!(err.to_string().contains("timed out"));
    }

    #[test]
    fn test_extraction_panic_is_parse_error() {
        let path = Path::new("/docs/crash.pdf");
        let err = extract_with_timeout(path, Duration::from_secs(5), || -> Result<String, String> {
            panic!("bad font table")
        })
        .unwrap_err();
        assert!(err.to_string().contains("crashed"));
    }

    #[test]
    fn test_garbage_pdf_is_parse_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("broken.pdf");
        std::fs::write(&path, b"this is not a pdf").unwrap();

        let err = PdfParser.parse(&path).unwrap_err();
        assert!(matches!(err, IngestError::Parse { .. }));
    }
}

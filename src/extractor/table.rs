//! CSV 파서
//!
//! 각 레코드를 `헤더: 값` 줄로 풀어 쓰고, 레코드 사이는 빈 줄로 구분합니다.
//! 청커가 빈 줄을 우선 경계로 쓰므로 한 레코드가 여러 청크로 쪼개지는 일이 적습니다.

use std::path::Path;

use super::{read_bytes, Document, FormatParser};
use crate::collector::FileFormat;
use crate::error::IngestError;

/// CSV 파서
#[derive(Debug, Default, Clone, Copy)]
pub struct CsvParser;

impl FormatParser for CsvParser {
    fn parse(&self, path: &Path) -> Result<Document, IngestError> {
        let bytes = read_bytes(path)?;
        let content = render_records(&bytes).map_err(|e| IngestError::parse(path, e))?;
        Ok(Document::new(path, FileFormat::Csv, content))
    }

    fn extensions(&self) -> &[&'static str] {
        &["csv"]
    }

    fn format(&self) -> FileFormat {
        FileFormat::Csv
    }

    fn name(&self) -> &'static str {
        "CsvParser"
    }
}

/// CSV 바이트를 레코드별 텍스트로 변환
fn render_records(data: &[u8]) -> Result<String, csv::Error> {
    let mut reader = csv::ReaderBuilder::new().has_headers(true).from_reader(data);
    let headers: Vec<String> = reader
        .headers()?
        .iter()
        .map(|h| h.trim().to_string())
        .collect();

    let mut records = Vec::new();
    for result in reader.records() {
        let record = result?;
        let lines: Vec<String> = headers
            .iter()
            .zip(record.iter())
            .map(|(header, value)| format!("{}: {}", header, value.trim()))
            .collect();
        records.push(lines.join("\n"));
    }

    Ok(records.join("\n\n"))
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_records_rendered_with_headers() {
        let text = render_records(b"name,role\nAda, engineer\nGrace,admiral\n").unwrap();
        assert_eq!(text, "name: Ada\nrole: engineer\n\nname: Grace\nrole: admiral");
    }

    #[test]
    fn test_header_only_is_empty() {
        assert_eq!(render_records(b"a,b,c\n").unwrap(), "");
    }

    #[test]
    fn test_ragged_rows_are_parse_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("ragged.csv");
        std::fs::write(&path, "a,b\n1,2\n3,4,5\n").unwrap();

        let err = CsvParser.parse(&path).unwrap_err();
        assert!(matches!(err, IngestError::Parse { .. }));
    }

    #[test]
    fn test_invalid_utf8_is_parse_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("latin1.csv");
        std::fs::write(&path, [b'a', b'\n', 0xff, 0xfe, b'\n']).unwrap();

        let err = CsvParser.parse(&path).unwrap_err();
        assert!(matches!(err, IngestError::Parse { .. }));
    }
}

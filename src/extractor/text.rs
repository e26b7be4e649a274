//! 텍스트 파일 파서
//!
//! 코드, Markdown, JSON, TOML 등 텍스트 파일을 그대로 읽습니다.

use std::path::Path;

use super::{read_utf8, Document, FormatParser};
use crate::collector::FileFormat;
use crate::error::IngestError;

/// 텍스트 파서 (UTF-8 그대로)
#[derive(Debug, Default, Clone, Copy)]
pub struct TextParser;

impl FormatParser for TextParser {
    fn parse(&self, path: &Path) -> Result<Document, IngestError> {
        let content = read_utf8(path)?;
        Ok(Document::new(path, FileFormat::Text, content))
    }

    fn extensions(&self) -> &[&'static str] {
        &["txt", "md", "go", "js", "ts", "py", "json", "toml"]
    }

    fn format(&self) -> FileFormat {
        FileFormat::Text
    }

    fn name(&self) -> &'static str {
        "TextParser"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_text_is_verbatim() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("main.py");
        let source = "def main():\n    print(\"안녕\")\n";
        std::fs::write(&path, source).unwrap();

        let doc = TextParser.parse(&path).unwrap();
        assert_eq!(doc.content, source);
        assert_eq!(doc.metadata.source, path.display().to_string());
        assert_eq!(doc.metadata.format, FileFormat::Text);
    }

    #[test]
    fn test_empty_file_gives_empty_document() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("empty.md");
        std::fs::write(&path, "").unwrap();

        let doc = TextParser.parse(&path).unwrap();
        assert!(doc.content.is_empty());
    }
}

//! YAML 파서
//!
//! 임의의 중첩 값(맵, 시퀀스, 스칼라)으로 파싱한 뒤 INI와 같은 방식으로
//! 직렬화합니다. 문법 오류는 해당 파일의 `Parse` 에러가 되고
//! 나머지 파일 수집은 계속됩니다.

use std::path::Path;

use serde::Deserialize;

use super::{read_utf8, structured, Document, FormatParser};
use crate::collector::FileFormat;
use crate::error::IngestError;

/// YAML 파서
#[derive(Debug, Default, Clone, Copy)]
pub struct YamlParser;

impl FormatParser for YamlParser {
    fn parse(&self, path: &Path) -> Result<Document, IngestError> {
        let text = read_utf8(path)?;
        let value = parse_value(&text).map_err(|e| IngestError::parse(path, e))?;
        Ok(Document::new(path, FileFormat::Yaml, structured::render(&value)))
    }

    fn extensions(&self) -> &[&'static str] {
        &["yaml", "yml"]
    }

    fn format(&self) -> FileFormat {
        FileFormat::Yaml
    }

    fn name(&self) -> &'static str {
        "YamlParser"
    }
}

/// YAML 텍스트를 JSON 값으로 파싱
///
/// `---`로 구분된 다중 문서 스트림은 문서 배열이 됩니다.
pub fn parse_value(text: &str) -> Result<serde_json::Value, serde_yaml::Error> {
    let mut documents = Vec::new();
    for document in serde_yaml::Deserializer::from_str(text) {
        let value = serde_yaml::Value::deserialize(document)?;
        documents.push(structured::from_yaml(value));
    }

    Ok(match documents.len() {
        0 => serde_json::Value::Null,
        1 => documents.remove(0),
        _ => serde_json::Value::Array(documents),
    })
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_nested_mapping() {
        let value = parse_value("server:\n  host: localhost\n  ports:\n    - 80\n    - 443\n").unwrap();
        assert_eq!(
            value,
            json!({"server": {"host": "localhost", "ports": [80, 443]}})
        );
    }

    #[test]
    fn test_scalar_document() {
        assert_eq!(parse_value("just text").unwrap(), json!("just text"));
    }

    #[test]
    fn test_multi_document_stream() {
        let value = parse_value("a: 1\n---\nb: 2\n").unwrap();
        assert_eq!(value, json!([{"a": 1}, {"b": 2}]));
    }

    #[test]
    fn test_malformed_yaml_is_parse_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("bad.yaml");
        std::fs::write(&path, "key: [unclosed\n  other: : :\n").unwrap();

        let err = YamlParser.parse(&path).unwrap_err();
        match err {
            IngestError::Parse { path: p, message } => {
                assert_eq!(p, path);
                assert!(!message.is_empty());
            }
            other => panic!("expected parse error, got {other:?}"),
        }
    }

    #[test]
    fn test_document_content_is_rendered_json() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("app.yml");
        std::fs::write(&path, "name: demo\nreplicas: 2\n").unwrap();

        let doc = YamlParser.parse(&path).unwrap();
        assert_eq!(doc.metadata.format, FileFormat::Yaml);
        assert_eq!(
            serde_json::from_str::<serde_json::Value>(&doc.content).unwrap(),
            json!({"name": "demo", "replicas": 2})
        );
    }
}

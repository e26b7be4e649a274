//! INI / CFG / ENV 파서
//!
//! `섹션 → 키 → 값` 중첩 맵으로 파싱한 뒤 결정적인 텍스트로 직렬화합니다.
//! 키는 소문자로 정규화하고, 첫 섹션 헤더 이전의 키는 `default` 섹션에 넣습니다.

use std::collections::BTreeMap;
use std::path::Path;

use ini::{Ini, ParseOption};

use super::{read_utf8, structured, Document, FormatParser};
use crate::collector::FileFormat;
use crate::error::IngestError;

/// 섹션 없는 키를 담는 섹션 이름
pub const DEFAULT_SECTION: &str = "default";

/// 섹션 → 키 → 값
pub type SectionMap = BTreeMap<String, BTreeMap<String, String>>;

/// INI 계열 설정 파일 파서
#[derive(Debug, Default, Clone, Copy)]
pub struct IniParser;

impl FormatParser for IniParser {
    fn parse(&self, path: &Path) -> Result<Document, IngestError> {
        let text = read_utf8(path)?;
        let sections = parse_sections(&text).map_err(|e| IngestError::parse(path, e))?;
        let value = serde_json::to_value(&sections).map_err(|e| IngestError::parse(path, e))?;
        Ok(Document::new(path, FileFormat::Config, structured::render(&value)))
    }

    fn extensions(&self) -> &[&'static str] {
        &["ini", "cfg", "env"]
    }

    fn format(&self) -> FileFormat {
        FileFormat::Config
    }

    fn name(&self) -> &'static str {
        "IniParser"
    }
}

/// INI 텍스트를 중첩 맵으로 파싱
///
/// 섹션도 키도 없으면 빈 맵을 반환합니다 (에러 아님).
pub fn parse_sections(text: &str) -> Result<SectionMap, ini::ParseError> {
    // Windows 경로 같은 값이 이스케이프로 깨지지 않도록 원문 그대로 유지
    let option = ParseOption {
        enabled_quote: false,
        enabled_escape: false,
        ..ParseOption::default()
    };
    let ini = Ini::load_from_str_opt(text, option)?;

    let mut sections = SectionMap::new();
    for (section, properties) in ini.iter() {
        let entries: BTreeMap<String, String> = properties
            .iter()
            .map(|(key, value)| (key.trim().to_lowercase(), value.to_string()))
            .collect();

        match section {
            Some(name) => {
                sections.entry(name.to_string()).or_default().extend(entries);
            }
            // 섹션 없는 키가 있을 때만 default 섹션 생성
            None if !entries.is_empty() => {
                sections
                    .entry(DEFAULT_SECTION.to_string())
                    .or_default()
                    .extend(entries);
            }
            None => {}
        }
    }

    Ok(sections)
}

// ============================================================================
// Tests
// ============================================================================
